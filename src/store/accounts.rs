//! Account storage: candidates, enterprises and admins

use super::{conflict_or, parse_uuid, Store, StoreError, StoreResult};
use crate::auth::models::{
    Account, AccountKind, Admin, AdminStatus, Candidate, Enterprise, Role,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

const CANDIDATE_COLUMNS: &str =
    "id, email, password_hash, name, student_id, program, active, created_at, updated_at";
const ENTERPRISE_COLUMNS: &str = "id, email, password_hash, company_name, industry, \
     contact_person, is_approved, active, created_at, updated_at";
const ADMIN_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, \
     permissions_json, status, password_changed_at, created_at, updated_at";

/// Fields for a new candidate; `password_hash` is already hashed
pub struct NewCandidate {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub student_id: String,
    pub program: String,
}

pub struct NewEnterprise {
    pub company_name: String,
    pub email: String,
    pub password_hash: String,
    pub industry: String,
    pub contact_person: String,
}

pub struct NewAdmin {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub permissions: Vec<String>,
}

/// Partial candidate profile update; `None` leaves a field unchanged
#[derive(Debug, Default)]
pub struct CandidateUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub student_id: Option<String>,
    pub program: Option<String>,
}

#[derive(Debug, Default)]
pub struct EnterpriseUpdate {
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub industry: Option<String>,
    pub contact_person: Option<String>,
}

/// Account counts for the admin dashboard
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountStats {
    pub candidates: i64,
    pub active_candidates: i64,
    pub enterprises: i64,
    pub approved_enterprises: i64,
    pub pending_enterprises: i64,
    pub admins: i64,
}

fn table(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::Candidate => "candidates",
        AccountKind::Enterprise => "enterprises",
        AccountKind::Admin => "admins",
    }
}

fn columns(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::Candidate => CANDIDATE_COLUMNS,
        AccountKind::Enterprise => ENTERPRISE_COLUMNS,
        AccountKind::Admin => ADMIN_COLUMNS,
    }
}

fn candidate_from_row(row: &Row<'_>) -> rusqlite::Result<Candidate> {
    Ok(Candidate {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role: Role::Candidate,
        name: row.get(3)?,
        student_id: row.get(4)?,
        program: row.get(5)?,
        active: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn enterprise_from_row(row: &Row<'_>) -> rusqlite::Result<Enterprise> {
    Ok(Enterprise {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role: Role::Enterprise,
        company_name: row.get(3)?,
        industry: row.get(4)?,
        contact_person: row.get(5)?,
        is_approved: row.get(6)?,
        active: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn admin_from_row(row: &Row<'_>) -> rusqlite::Result<Admin> {
    let role_str: String = row.get(5)?;
    let permissions_json: String = row.get(6)?;
    let status_str: String = row.get(7)?;

    let conversion = |idx: usize, msg: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(StoreError::Corrupt(msg)),
        )
    };

    Ok(Admin {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        role: Role::parse(&role_str)
            .filter(|r| r.kind() == AccountKind::Admin)
            .ok_or_else(|| conversion(5, format!("unknown admin role {}", role_str)))?,
        permissions: serde_json::from_str(&permissions_json)
            .map_err(|e| conversion(6, e.to_string()))?,
        status: AdminStatus::parse(&status_str)
            .ok_or_else(|| conversion(7, format!("unknown admin status {}", status_str)))?,
        password_changed_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn account_from_row(kind: AccountKind, row: &Row<'_>) -> rusqlite::Result<Account> {
    match kind {
        AccountKind::Candidate => candidate_from_row(row).map(Account::Candidate),
        AccountKind::Enterprise => enterprise_from_row(row).map(Account::Enterprise),
        AccountKind::Admin => admin_from_row(row).map(Account::Admin),
    }
}

fn find_in(conn: &Connection, kind: AccountKind, id: &Uuid) -> StoreResult<Option<Account>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?1",
        columns(kind),
        table(kind)
    );
    let account = conn
        .query_row(&sql, params![id.to_string()], |row| {
            account_from_row(kind, row)
        })
        .optional()?;
    Ok(account)
}

impl Store {
    /// Create a candidate account
    pub fn create_candidate(&self, new: NewCandidate) -> StoreResult<Candidate> {
        let now = Utc::now().to_rfc3339();
        let candidate = Candidate {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: Role::Candidate,
            student_id: new.student_id,
            program: new.program,
            active: true,
            created_at: now.clone(),
            updated_at: now,
        };

        self.conn()
            .execute(
                "INSERT INTO candidates (id, email, password_hash, name, student_id, program, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    candidate.id.to_string(),
                    candidate.email,
                    candidate.password_hash,
                    candidate.name,
                    candidate.student_id,
                    candidate.program,
                    candidate.active,
                    candidate.created_at,
                    candidate.updated_at,
                ],
            )
            .map_err(|e| conflict_or(e, "Email is already registered"))?;

        info!("✅ Created candidate: {} ({})", candidate.email, candidate.id);
        Ok(candidate)
    }

    /// Create an enterprise account; it starts unapproved
    pub fn create_enterprise(&self, new: NewEnterprise) -> StoreResult<Enterprise> {
        let now = Utc::now().to_rfc3339();
        let enterprise = Enterprise {
            id: Uuid::new_v4(),
            company_name: new.company_name,
            email: new.email,
            password_hash: new.password_hash,
            role: Role::Enterprise,
            industry: new.industry,
            contact_person: new.contact_person,
            is_approved: false,
            active: true,
            created_at: now.clone(),
            updated_at: now,
        };

        self.conn()
            .execute(
                "INSERT INTO enterprises (id, email, password_hash, company_name, industry, contact_person, is_approved, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    enterprise.id.to_string(),
                    enterprise.email,
                    enterprise.password_hash,
                    enterprise.company_name,
                    enterprise.industry,
                    enterprise.contact_person,
                    enterprise.is_approved,
                    enterprise.active,
                    enterprise.created_at,
                    enterprise.updated_at,
                ],
            )
            .map_err(|e| conflict_or(e, "Email is already registered"))?;

        info!(
            "✅ Created enterprise: {} ({}), pending approval",
            enterprise.email, enterprise.id
        );
        Ok(enterprise)
    }

    pub fn create_admin(&self, new: NewAdmin) -> StoreResult<Admin> {
        if new.role.kind() != AccountKind::Admin {
            return Err(StoreError::Corrupt(format!(
                "role {} is not an admin role",
                new.role
            )));
        }

        let now = Utc::now().to_rfc3339();
        let admin = Admin {
            id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            permissions: new.permissions,
            status: AdminStatus::Active,
            password_changed_at: None,
            created_at: now.clone(),
            updated_at: now,
        };

        self.conn()
            .execute(
                "INSERT INTO admins (id, email, password_hash, first_name, last_name, role, permissions_json, status, password_changed_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    admin.id.to_string(),
                    admin.email,
                    admin.password_hash,
                    admin.first_name,
                    admin.last_name,
                    admin.role.as_str(),
                    serde_json::to_string(&admin.permissions)?,
                    admin.status.as_str(),
                    admin.password_changed_at,
                    admin.created_at,
                    admin.updated_at,
                ],
            )
            .map_err(|e| conflict_or(e, "Email is already registered"))?;

        info!("🔐 Created {}: {} ({})", admin.role, admin.email, admin.id);
        Ok(admin)
    }

    /// Load an account from the table for `kind`
    pub fn find_account(&self, kind: AccountKind, id: &Uuid) -> StoreResult<Option<Account>> {
        find_in(&self.conn(), kind, id)
    }

    /// Look up an account by (normalized) email within one variant table
    pub fn find_account_by_email(
        &self,
        kind: AccountKind,
        email: &str,
    ) -> StoreResult<Option<Account>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE email = ?1",
            columns(kind),
            table(kind)
        );
        let account = self
            .conn()
            .query_row(&sql, params![email], |row| account_from_row(kind, row))
            .optional()?;
        Ok(account)
    }

    /// Apply a profile update without touching the password hash
    pub fn update_candidate(&self, id: &Uuid, update: CandidateUpdate) -> StoreResult<Candidate> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE candidates SET
                    name = COALESCE(?2, name),
                    email = COALESCE(?3, email),
                    student_id = COALESCE(?4, student_id),
                    program = COALESCE(?5, program),
                    updated_at = ?6
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    update.name,
                    update.email,
                    update.student_id,
                    update.program,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| conflict_or(e, "Email is already registered"))?;

        if changed == 0 {
            return Err(StoreError::NotFound("Candidate not found".to_string()));
        }

        match find_in(&conn, AccountKind::Candidate, id)? {
            Some(Account::Candidate(candidate)) => Ok(candidate),
            _ => Err(StoreError::NotFound("Candidate not found".to_string())),
        }
    }

    pub fn update_enterprise(
        &self,
        id: &Uuid,
        update: EnterpriseUpdate,
    ) -> StoreResult<Enterprise> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE enterprises SET
                    company_name = COALESCE(?2, company_name),
                    email = COALESCE(?3, email),
                    industry = COALESCE(?4, industry),
                    contact_person = COALESCE(?5, contact_person),
                    updated_at = ?6
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    update.company_name,
                    update.email,
                    update.industry,
                    update.contact_person,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| conflict_or(e, "Email is already registered"))?;

        if changed == 0 {
            return Err(StoreError::NotFound("Enterprise not found".to_string()));
        }

        match find_in(&conn, AccountKind::Enterprise, id)? {
            Some(Account::Enterprise(enterprise)) => Ok(enterprise),
            _ => Err(StoreError::NotFound("Enterprise not found".to_string())),
        }
    }

    /// Replace the password hash. For admins this also stamps
    /// `password_changed_at`, invalidating previously issued tokens.
    pub fn set_password_hash(
        &self,
        kind: AccountKind,
        id: &Uuid,
        password_hash: &str,
    ) -> StoreResult<()> {
        let now = Utc::now();
        let conn = self.conn();
        let changed = match kind {
            AccountKind::Admin => conn.execute(
                "UPDATE admins SET password_hash = ?2, password_changed_at = ?3, updated_at = ?4 WHERE id = ?1",
                params![id.to_string(), password_hash, now.timestamp(), now.to_rfc3339()],
            )?,
            _ => conn.execute(
                &format!(
                    "UPDATE {} SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
                    table(kind)
                ),
                params![id.to_string(), password_hash, now.to_rfc3339()],
            )?,
        };

        if changed == 0 {
            return Err(StoreError::NotFound("Account not found".to_string()));
        }

        info!("🔑 Password changed for {} {}", kind.as_str(), id);
        Ok(())
    }

    /// Activate or deactivate an account
    pub fn set_active(&self, kind: AccountKind, id: &Uuid, active: bool) -> StoreResult<Account> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        let changed = match kind {
            AccountKind::Admin => {
                let status = if active {
                    AdminStatus::Active
                } else {
                    AdminStatus::Inactive
                };
                conn.execute(
                    "UPDATE admins SET status = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id.to_string(), status.as_str(), now],
                )?
            }
            _ => conn.execute(
                &format!(
                    "UPDATE {} SET active = ?2, updated_at = ?3 WHERE id = ?1",
                    table(kind)
                ),
                params![id.to_string(), active, now],
            )?,
        };

        if changed == 0 {
            return Err(StoreError::NotFound("Account not found".to_string()));
        }

        info!(
            "{} {} {}",
            if active { "✅ Activated" } else { "⛔ Deactivated" },
            kind.as_str(),
            id
        );

        find_in(&conn, kind, id)?.ok_or_else(|| StoreError::NotFound("Account not found".to_string()))
    }

    pub fn set_enterprise_approval(&self, id: &Uuid, approved: bool) -> StoreResult<Enterprise> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE enterprises SET is_approved = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), approved, Utc::now().to_rfc3339()],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound("Enterprise not found".to_string()));
        }

        info!("🏢 Enterprise {} approval set to {}", id, approved);

        match find_in(&conn, AccountKind::Enterprise, id)? {
            Some(Account::Enterprise(enterprise)) => Ok(enterprise),
            _ => Err(StoreError::NotFound("Enterprise not found".to_string())),
        }
    }

    /// Delete an account together with its refresh tokens
    pub fn delete_account(&self, kind: AccountKind, id: &Uuid) -> StoreResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows_affected = tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1", table(kind)),
            params![id.to_string()],
        )?;
        if rows_affected == 0 {
            return Err(StoreError::NotFound("Account not found".to_string()));
        }
        tx.execute(
            "DELETE FROM refresh_tokens WHERE account_id = ?1",
            params![id.to_string()],
        )?;
        tx.commit()?;

        info!("🗑️  Deleted {} {}", kind.as_str(), id);
        Ok(())
    }

    /// List accounts of one kind, newest first
    pub fn list_accounts(&self, kind: AccountKind) -> StoreResult<Vec<Account>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY created_at DESC",
            columns(kind),
            table(kind)
        );
        let mut stmt = conn.prepare(&sql)?;
        let accounts = stmt
            .query_map([], |row| account_from_row(kind, row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    pub fn account_stats(&self) -> StoreResult<AccountStats> {
        let conn = self.conn();
        let count = |sql: &str| -> StoreResult<i64> {
            Ok(conn.query_row(sql, [], |row| row.get(0))?)
        };

        Ok(AccountStats {
            candidates: count("SELECT COUNT(*) FROM candidates")?,
            active_candidates: count("SELECT COUNT(*) FROM candidates WHERE active = 1")?,
            enterprises: count("SELECT COUNT(*) FROM enterprises")?,
            approved_enterprises: count("SELECT COUNT(*) FROM enterprises WHERE is_approved = 1")?,
            pending_enterprises: count("SELECT COUNT(*) FROM enterprises WHERE is_approved = 0")?,
            admins: count("SELECT COUNT(*) FROM admins")?,
        })
    }
}
