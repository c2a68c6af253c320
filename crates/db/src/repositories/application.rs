use chrono::{DateTime, Utc};
use sqlx::Row;

use campusflow_core::domain::academics::{StaffId, StudentId};
use campusflow_core::domain::actor::ActorId;
use campusflow_core::domain::application::{
    Application, ApplicationId, ApplicationState, ApplicationTypeCode,
};
use campusflow_core::domain::flow::StepId;

use super::{ApplicationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlApplicationRepository {
    pool: DbPool,
}

impl SqlApplicationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_state(s: &str) -> Result<ApplicationState, RepositoryError> {
    match s {
        "draft" => Ok(ApplicationState::Draft),
        "submitted" => Ok(ApplicationState::Submitted),
        "in_review" => Ok(ApplicationState::InReview),
        "approved" => Ok(ApplicationState::Approved),
        "rejected" => Ok(ApplicationState::Rejected),
        "cancelled" => Ok(ApplicationState::Cancelled),
        other => Err(RepositoryError::Decode(format!("unknown application state `{other}`"))),
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_application(row: &sqlx::sqlite::SqliteRow) -> Result<Application, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let application_type: String =
        row.try_get("application_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let applicant: String =
        row.try_get("applicant_actor_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let student: Option<String> =
        row.try_get("student_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let staff: Option<String> =
        row.try_get("staff_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let state: String =
        row.try_get("state").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let current_step: Option<String> =
        row.try_get("current_step_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let submitted_at: Option<String> =
        row.try_get("submitted_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let decided_at: Option<String> =
        row.try_get("decided_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let state_version: i64 =
        row.try_get("state_version").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Application {
        id: ApplicationId(id),
        application_type: ApplicationTypeCode(application_type),
        applicant: ActorId(applicant),
        student: student.map(StudentId),
        staff: staff.map(StaffId),
        state: parse_state(&state)?,
        current_step: current_step.map(StepId),
        submitted_at: submitted_at.as_deref().map(parse_timestamp).transpose()?,
        decided_at: decided_at.as_deref().map(parse_timestamp).transpose()?,
        state_version: state_version as u32,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Versioned write usable inside a caller-owned transaction; the service
/// pairs it with action appends so both land or neither does.
pub async fn update_versioned_with<'e, E>(
    executor: E,
    application: &Application,
    expected_version: u32,
) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query(
        "UPDATE application SET
             state = ?,
             current_step_id = ?,
             submitted_at = ?,
             decided_at = ?,
             state_version = ?,
             updated_at = ?
         WHERE id = ? AND state_version = ?",
    )
    .bind(application.legacy_status())
    .bind(application.current_step.as_ref().map(|step| step.0.clone()))
    .bind(application.submitted_at.map(|dt| dt.to_rfc3339()))
    .bind(application.decided_at.map(|dt| dt.to_rfc3339()))
    .bind(application.state_version as i64)
    .bind(application.updated_at.to_rfc3339())
    .bind(&application.id.0)
    .bind(expected_version as i64)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict(format!(
            "application `{}` no longer at version {expected_version}",
            application.id
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl ApplicationRepository for SqlApplicationRepository {
    async fn find_by_id(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, application_type, applicant_actor_id, student_id, staff_id, state,
                    current_step_id, submitted_at, decided_at, state_version,
                    created_at, updated_at
             FROM application WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_application(r)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, application: &Application) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO application (id, application_type, applicant_actor_id, student_id,
                                      staff_id, state, current_step_id, submitted_at,
                                      decided_at, state_version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&application.id.0)
        .bind(&application.application_type.0)
        .bind(&application.applicant.0)
        .bind(application.student.as_ref().map(|s| s.0.clone()))
        .bind(application.staff.as_ref().map(|s| s.0.clone()))
        .bind(application.legacy_status())
        .bind(application.current_step.as_ref().map(|step| step.0.clone()))
        .bind(application.submitted_at.map(|dt| dt.to_rfc3339()))
        .bind(application.decided_at.map(|dt| dt.to_rfc3339()))
        .bind(application.state_version as i64)
        .bind(application.created_at.to_rfc3339())
        .bind(application.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_versioned(
        &self,
        application: &Application,
        expected_version: u32,
    ) -> Result<(), RepositoryError> {
        update_versioned_with(&self.pool, application, expected_version).await
    }

    async fn list_for_applicant(
        &self,
        applicant: &str,
    ) -> Result<Vec<Application>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, application_type, applicant_actor_id, student_id, staff_id, state,
                    current_step_id, submitted_at, decided_at, state_version,
                    created_at, updated_at
             FROM application WHERE applicant_actor_id = ? ORDER BY created_at DESC",
        )
        .bind(applicant)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_application).collect()
    }
}
