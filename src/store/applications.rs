//! Job application storage

use super::{conflict_or, parse_uuid, Store, StoreError, StoreResult};
use crate::models::{Application, ApplicationStatus};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

const APPLICATION_COLUMNS: &str =
    "id, job_id, candidate_id, cover_letter, status, created_at, updated_at";

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<Application> {
    let status: String = row.get(4)?;
    Ok(Application {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        job_id: parse_uuid(&row.get::<_, String>(1)?)?,
        candidate_id: parse_uuid(&row.get::<_, String>(2)?)?,
        cover_letter: row.get(3)?,
        status: ApplicationStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                Box::new(StoreError::Corrupt(format!(
                    "unknown application status {}",
                    status
                ))),
            )
        })?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl Store {
    /// Record an application. A candidate may apply to a job only once.
    pub fn create_application(
        &self,
        job_id: &Uuid,
        candidate_id: &Uuid,
        cover_letter: Option<String>,
    ) -> StoreResult<Application> {
        let now = Utc::now().to_rfc3339();
        let application = Application {
            id: Uuid::new_v4(),
            job_id: *job_id,
            candidate_id: *candidate_id,
            cover_letter,
            status: ApplicationStatus::Pending,
            created_at: now.clone(),
            updated_at: now,
        };

        self.conn()
            .execute(
                "INSERT INTO applications (id, job_id, candidate_id, cover_letter, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    application.id.to_string(),
                    application.job_id.to_string(),
                    application.candidate_id.to_string(),
                    application.cover_letter,
                    application.status.as_str(),
                    application.created_at,
                    application.updated_at,
                ],
            )
            .map_err(|e| conflict_or(e, "You have already applied to this job"))?;

        info!(
            "📨 Application {} from {} to job {}",
            application.id, application.candidate_id, application.job_id
        );
        Ok(application)
    }

    pub fn get_application(&self, id: &Uuid) -> StoreResult<Option<Application>> {
        let application = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {} FROM applications WHERE id = ?1",
                    APPLICATION_COLUMNS
                ),
                params![id.to_string()],
                application_from_row,
            )
            .optional()?;
        Ok(application)
    }

    pub fn list_applications_for_candidate(
        &self,
        candidate_id: &Uuid,
    ) -> StoreResult<Vec<Application>> {
        self.list_applications_where("candidate_id", candidate_id)
    }

    pub fn list_applications_for_job(&self, job_id: &Uuid) -> StoreResult<Vec<Application>> {
        self.list_applications_where("job_id", job_id)
    }

    fn list_applications_where(&self, column: &str, id: &Uuid) -> StoreResult<Vec<Application>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM applications WHERE {} = ?1 ORDER BY created_at DESC",
            APPLICATION_COLUMNS, column
        ))?;
        let applications = stmt
            .query_map(params![id.to_string()], application_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(applications)
    }

    pub fn set_application_status(
        &self,
        id: &Uuid,
        status: ApplicationStatus,
    ) -> StoreResult<Application> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE applications SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), status.as_str(), Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound("Application not found".to_string()));
        }

        conn.query_row(
            &format!(
                "SELECT {} FROM applications WHERE id = ?1",
                APPLICATION_COLUMNS
            ),
            params![id.to_string()],
            application_from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound("Application not found".to_string()))
    }

    pub fn delete_application(&self, id: &Uuid) -> StoreResult<()> {
        let rows_affected = self.conn().execute(
            "DELETE FROM applications WHERE id = ?1",
            params![id.to_string()],
        )?;
        if rows_affected == 0 {
            return Err(StoreError::NotFound("Application not found".to_string()));
        }
        Ok(())
    }

    pub fn application_count(&self) -> StoreResult<i64> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) FROM applications", [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobType;
    use crate::store::{NewCandidate, NewEnterprise, NewJob};

    fn seed(store: &Store) -> (Uuid, Uuid) {
        let enterprise = store
            .create_enterprise(NewEnterprise {
                company_name: "Acme".to_string(),
                email: "hr@acme.com".to_string(),
                password_hash: "hash".to_string(),
                industry: "Software".to_string(),
                contact_person: "Jo".to_string(),
            })
            .unwrap();
        let job = store
            .create_job(NewJob {
                enterprise_id: enterprise.id,
                title: "Backend Intern".to_string(),
                description: "A role for curious engineers".to_string(),
                location: "Tunis".to_string(),
                job_type: JobType::Internship,
                skills: vec![],
                salary: None,
            })
            .unwrap();
        let candidate = store
            .create_candidate(NewCandidate {
                name: "A".to_string(),
                email: "a@x.com".to_string(),
                password_hash: "hash".to_string(),
                student_id: "S1".to_string(),
                program: "informatique".to_string(),
            })
            .unwrap();
        (job.id, candidate.id)
    }

    #[test]
    fn test_apply_once_per_job() {
        let store = Store::in_memory().unwrap();
        let (job_id, candidate_id) = seed(&store);

        let application = store
            .create_application(&job_id, &candidate_id, Some("Hello".to_string()))
            .unwrap();
        assert_eq!(application.status, ApplicationStatus::Pending);

        let err = store
            .create_application(&job_id, &candidate_id, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_list_and_review() {
        let store = Store::in_memory().unwrap();
        let (job_id, candidate_id) = seed(&store);
        let application = store
            .create_application(&job_id, &candidate_id, None)
            .unwrap();

        assert_eq!(store.list_applications_for_job(&job_id).unwrap().len(), 1);
        assert_eq!(
            store
                .list_applications_for_candidate(&candidate_id)
                .unwrap()
                .len(),
            1
        );

        let reviewed = store
            .set_application_status(&application.id, ApplicationStatus::Accepted)
            .unwrap();
        assert_eq!(reviewed.status, ApplicationStatus::Accepted);
    }

    #[test]
    fn test_deleting_job_removes_applications() {
        let store = Store::in_memory().unwrap();
        let (job_id, candidate_id) = seed(&store);
        let application = store
            .create_application(&job_id, &candidate_id, None)
            .unwrap();

        store.delete_job(&job_id).unwrap();
        assert!(store.get_application(&application.id).unwrap().is_none());
        assert_eq!(store.application_count().unwrap(), 0);
    }
}
