//! Job posting storage

use super::{parse_uuid, Store, StoreError, StoreResult};
use crate::models::{Job, JobQuery, JobStatus, JobType, UpdateJobRequest};
use chrono::Utc;
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

const JOB_COLUMNS: &str = "id, enterprise_id, title, description, location, job_type, \
     skills_json, salary, status, created_at, updated_at";

/// Fields for a new job posting
pub struct NewJob {
    pub enterprise_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub job_type: JobType,
    pub skills: Vec<String>,
    pub salary: Option<String>,
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    let corrupt = |idx: usize, msg: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(StoreError::Corrupt(msg)),
        )
    };
    let job_type: String = row.get(5)?;
    let skills_json: String = row.get(6)?;
    let status: String = row.get(8)?;

    Ok(Job {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        enterprise_id: parse_uuid(&row.get::<_, String>(1)?)?,
        title: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        job_type: JobType::parse(&job_type)
            .ok_or_else(|| corrupt(5, format!("unknown job type {}", job_type)))?,
        skills: serde_json::from_str(&skills_json).map_err(|e| corrupt(6, e.to_string()))?,
        salary: row.get(7)?,
        status: JobStatus::parse(&status)
            .ok_or_else(|| corrupt(8, format!("unknown job status {}", status)))?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Escapes LIKE wildcards so user input matches literally
fn like_pattern(input: &str) -> String {
    let escaped = input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

impl Store {
    pub fn create_job(&self, new: NewJob) -> StoreResult<Job> {
        let now = Utc::now().to_rfc3339();
        let job = Job {
            id: Uuid::new_v4(),
            enterprise_id: new.enterprise_id,
            title: new.title,
            description: new.description,
            location: new.location,
            job_type: new.job_type,
            skills: new.skills,
            salary: new.salary,
            status: JobStatus::Open,
            created_at: now.clone(),
            updated_at: now,
        };

        let conn = self.conn();
        let enterprise_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM enterprises WHERE id = ?1)",
            params![job.enterprise_id.to_string()],
            |row| row.get(0),
        )?;
        if !enterprise_exists {
            return Err(StoreError::NotFound("Enterprise not found".to_string()));
        }

        conn.execute(
            "INSERT INTO jobs (id, enterprise_id, title, description, location, job_type, skills_json, salary, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                job.id.to_string(),
                job.enterprise_id.to_string(),
                job.title,
                job.description,
                job.location,
                job.job_type.as_str(),
                serde_json::to_string(&job.skills)?,
                job.salary,
                job.status.as_str(),
                job.created_at,
                job.updated_at,
            ],
        )?;

        info!("📌 Job posted: {} ({}) by {}", job.title, job.id, job.enterprise_id);
        Ok(job)
    }

    pub fn get_job(&self, id: &Uuid) -> StoreResult<Option<Job>> {
        let job = self
            .conn()
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
                params![id.to_string()],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    pub fn update_job(&self, id: &Uuid, update: UpdateJobRequest) -> StoreResult<Job> {
        let skills_json = update
            .skills
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE jobs SET
                title = COALESCE(?2, title),
                description = COALESCE(?3, description),
                location = COALESCE(?4, location),
                job_type = COALESCE(?5, job_type),
                skills_json = COALESCE(?6, skills_json),
                salary = CASE WHEN ?10 THEN ?7 ELSE salary END,
                status = COALESCE(?8, status),
                updated_at = ?9
             WHERE id = ?1",
            params![
                id.to_string(),
                update.title,
                update.description,
                update.location,
                update.job_type.map(|t| t.as_str()),
                skills_json,
                update.salary.clone().flatten(),
                update.status.map(|s| s.as_str()),
                Utc::now().to_rfc3339(),
                update.salary.is_some(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound("Job not found".to_string()));
        }

        conn.query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
            params![id.to_string()],
            job_from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound("Job not found".to_string()))
    }

    /// Delete a job; its applications go with it
    pub fn delete_job(&self, id: &Uuid) -> StoreResult<()> {
        let rows_affected = self
            .conn()
            .execute("DELETE FROM jobs WHERE id = ?1", params![id.to_string()])?;
        if rows_affected == 0 {
            return Err(StoreError::NotFound("Job not found".to_string()));
        }

        info!("🗑️  Deleted job {}", id);
        Ok(())
    }

    /// Search jobs, newest first. Returns the page and the total match count.
    pub fn search_jobs(
        &self,
        query: &JobQuery,
        enterprise_id: Option<&Uuid>,
    ) -> StoreResult<(Vec<Job>, i64)> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            clauses.push(
                "(title LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\' OR skills_json LIKE ? ESCAPE '\\')",
            );
            let pattern = like_pattern(q);
            args.extend(std::iter::repeat(Value::Text(pattern)).take(3));
        }
        if let Some(location) = query
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
        {
            clauses.push("location LIKE ? ESCAPE '\\'");
            args.push(Value::Text(like_pattern(location)));
        }
        if let Some(job_type) = query.job_type {
            clauses.push("job_type = ?");
            args.push(Value::Text(job_type.as_str().to_string()));
        }
        if let Some(status) = query.status {
            clauses.push("status = ?");
            args.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(enterprise_id) = enterprise_id {
            clauses.push("enterprise_id = ?");
            args.push(Value::Text(enterprise_id.to_string()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let conn = self.conn();
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM jobs {}", where_sql),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        let limit = query.limit();
        let offset = i64::from(query.page() - 1) * i64::from(limit);
        let mut page_args = args;
        page_args.push(Value::Integer(i64::from(limit)));
        page_args.push(Value::Integer(offset));

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM jobs {} ORDER BY created_at DESC, id LIMIT ? OFFSET ?",
            JOB_COLUMNS, where_sql
        ))?;
        let jobs = stmt
            .query_map(params_from_iter(page_args.iter()), job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((jobs, total))
    }

    pub fn job_counts(&self) -> StoreResult<(i64, i64)> {
        let conn = self.conn();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        let open: i64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = 'open'",
            [],
            |row| row.get(0),
        )?;
        Ok((total, open))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewEnterprise;

    fn seed_enterprise(store: &Store) -> Uuid {
        store
            .create_enterprise(NewEnterprise {
                company_name: "Acme".to_string(),
                email: "hr@acme.com".to_string(),
                password_hash: "hash".to_string(),
                industry: "Software".to_string(),
                contact_person: "Jo".to_string(),
            })
            .unwrap()
            .id
    }

    fn new_job(enterprise_id: Uuid, title: &str, location: &str, job_type: JobType) -> NewJob {
        NewJob {
            enterprise_id,
            title: title.to_string(),
            description: "A role for curious engineers".to_string(),
            location: location.to_string(),
            job_type,
            skills: vec!["rust".to_string(), "sql".to_string()],
            salary: None,
        }
    }

    #[test]
    fn test_create_and_get_job() {
        let store = Store::in_memory().unwrap();
        let enterprise_id = seed_enterprise(&store);

        let job = store
            .create_job(new_job(enterprise_id, "Backend Intern", "Tunis", JobType::Internship))
            .unwrap();
        assert_eq!(job.status, JobStatus::Open);

        let found = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(found.title, "Backend Intern");
        assert_eq!(found.skills, vec!["rust", "sql"]);
    }

    #[test]
    fn test_job_for_unknown_enterprise_is_not_found() {
        let store = Store::in_memory().unwrap();
        let err = store
            .create_job(new_job(Uuid::new_v4(), "Ghost", "Nowhere", JobType::Contract))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_search_filters_and_paging() {
        let store = Store::in_memory().unwrap();
        let enterprise_id = seed_enterprise(&store);
        store
            .create_job(new_job(enterprise_id, "Backend Intern", "Tunis", JobType::Internship))
            .unwrap();
        store
            .create_job(new_job(enterprise_id, "Frontend Developer", "Sfax", JobType::FullTime))
            .unwrap();
        store
            .create_job(new_job(enterprise_id, "Data Intern", "Tunis", JobType::Internship))
            .unwrap();

        let by_type = JobQuery {
            job_type: Some(JobType::Internship),
            ..Default::default()
        };
        let (jobs, total) = store.search_jobs(&by_type, None).unwrap();
        assert_eq!(total, 2);
        assert_eq!(jobs.len(), 2);

        let by_text = JobQuery {
            q: Some("frontend".to_string()),
            ..Default::default()
        };
        let (jobs, total) = store.search_jobs(&by_text, None).unwrap();
        assert_eq!(total, 1);
        assert_eq!(jobs[0].title, "Frontend Developer");

        let paged = JobQuery {
            location: Some("tunis".to_string()),
            page: Some(2),
            limit: Some(1),
            ..Default::default()
        };
        let (jobs, total) = store.search_jobs(&paged, None).unwrap();
        assert_eq!(total, 2);
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let store = Store::in_memory().unwrap();
        let enterprise_id = seed_enterprise(&store);
        store
            .create_job(new_job(enterprise_id, "Backend Intern", "Tunis", JobType::Internship))
            .unwrap();

        let query = JobQuery {
            q: Some("%".to_string()),
            ..Default::default()
        };
        let (_, total) = store.search_jobs(&query, None).unwrap();
        assert_eq!(total, 0);
    }

    #[test]
    fn test_update_and_delete_job() {
        let store = Store::in_memory().unwrap();
        let enterprise_id = seed_enterprise(&store);
        let job = store
            .create_job(new_job(enterprise_id, "Backend Intern", "Tunis", JobType::Internship))
            .unwrap();

        let updated = store
            .update_job(
                &job.id,
                UpdateJobRequest {
                    status: Some(JobStatus::Closed),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, JobStatus::Closed);
        assert_eq!(updated.title, "Backend Intern");
        assert_eq!(store.job_counts().unwrap(), (1, 0));

        store.delete_job(&job.id).unwrap();
        assert!(store.get_job(&job.id).unwrap().is_none());
        assert!(matches!(
            store.delete_job(&job.id).unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn test_salary_is_kept_when_absent_and_cleared_by_null() {
        let store = Store::in_memory().unwrap();
        let enterprise_id = seed_enterprise(&store);
        let mut new = new_job(enterprise_id, "Backend Intern", "Tunis", JobType::Internship);
        new.salary = Some("1200 TND".to_string());
        let job = store.create_job(new).unwrap();

        let untouched: UpdateJobRequest =
            serde_json::from_str(r#"{"title":"Backend Engineer"}"#).unwrap();
        let updated = store.update_job(&job.id, untouched).unwrap();
        assert_eq!(updated.salary.as_deref(), Some("1200 TND"));

        let cleared: UpdateJobRequest = serde_json::from_str(r#"{"salary":null}"#).unwrap();
        let updated = store.update_job(&job.id, cleared).unwrap();
        assert_eq!(updated.salary, None);
        assert_eq!(updated.title, "Backend Engineer");
    }
}
