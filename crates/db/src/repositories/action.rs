use chrono::{DateTime, Utc};
use sqlx::Row;

use campusflow_core::domain::action::{ActionId, ActionKind, ApprovalAction};
use campusflow_core::domain::actor::ActorId;
use campusflow_core::domain::application::ApplicationId;
use campusflow_core::domain::flow::StepId;

use super::{ActionRepository, RepositoryError};
use crate::DbPool;

pub struct SqlActionRepository {
    pool: DbPool,
}

impl SqlActionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn kind_as_str(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Approved => "approved",
        ActionKind::Rejected => "rejected",
        ActionKind::Skipped => "skipped",
    }
}

fn parse_kind(s: &str) -> Result<ActionKind, RepositoryError> {
    match s {
        "approved" => Ok(ActionKind::Approved),
        "rejected" => Ok(ActionKind::Rejected),
        "skipped" => Ok(ActionKind::Skipped),
        other => Err(RepositoryError::Decode(format!("unknown action kind `{other}`"))),
    }
}

fn row_to_action(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalAction, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let application_id: String =
        row.try_get("application_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let step_id: Option<String> =
        row.try_get("step_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actor: Option<String> =
        row.try_get("actor_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let kind: String = row.try_get("kind").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let remarks: Option<String> =
        row.try_get("remarks").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let acted_at: String =
        row.try_get("acted_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ApprovalAction {
        id: ActionId(id),
        application_id: ApplicationId(application_id),
        step_id: step_id.map(StepId),
        actor: actor.map(ActorId),
        kind: parse_kind(&kind)?,
        remarks,
        acted_at: DateTime::parse_from_rfc3339(&acted_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
    })
}

/// Append usable inside a caller-owned transaction. A violation of the
/// one-approval-per-step index comes back as [`RepositoryError::Conflict`].
pub async fn append_with<'e, E>(
    executor: E,
    action: &ApprovalAction,
) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO approval_action (id, application_id, step_id, actor_id, kind, remarks, acted_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&action.id.0)
    .bind(&action.application_id.0)
    .bind(action.step_id.as_ref().map(|step| step.0.clone()))
    .bind(action.actor.as_ref().map(|actor| actor.0.clone()))
    .bind(kind_as_str(action.kind))
    .bind(&action.remarks)
    .bind(action.acted_at.to_rfc3339())
    .execute(executor)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
            Err(RepositoryError::Conflict(format!(
                "step already carries an approval for application `{}`",
                action.application_id
            )))
        }
        Err(error) => Err(error.into()),
    }
}

#[async_trait::async_trait]
impl ActionRepository for SqlActionRepository {
    async fn append(&self, action: &ApprovalAction) -> Result<(), RepositoryError> {
        append_with(&self.pool, action).await
    }

    async fn list_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<ApprovalAction>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, application_id, step_id, actor_id, kind, remarks, acted_at
             FROM approval_action WHERE application_id = ? ORDER BY acted_at ASC, id ASC",
        )
        .bind(&application_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_action).collect()
    }
}

#[cfg(test)]
mod tests {
    use campusflow_core::domain::action::{ActionKind, ApprovalAction};
    use campusflow_core::domain::actor::ActorId;
    use campusflow_core::domain::application::{Application, ApplicationId, ApplicationTypeCode};
    use campusflow_core::domain::flow::StepId;

    use super::SqlActionRepository;
    use crate::repositories::{
        ActionRepository, ApplicationRepository, RepositoryError, SqlApplicationRepository,
    };
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        sqlx::query("INSERT INTO application_type (code, name) VALUES ('LEAVE', 'Leave Request')")
            .execute(&pool)
            .await
            .expect("seed type");
        sqlx::query("INSERT INTO actor (id, display_name) VALUES ('stu-rahul', 'Rahul')")
            .execute(&pool)
            .await
            .expect("seed actor");

        let applications = SqlApplicationRepository::new(pool.clone());
        applications
            .insert(&Application::draft(
                ApplicationId("app-1".to_string()),
                ApplicationTypeCode("LEAVE".to_string()),
                ActorId("stu-rahul".to_string()),
            ))
            .await
            .expect("insert parent application");
        pool
    }

    fn approval(step: &str) -> ApprovalAction {
        ApprovalAction::recorded_by(
            ApplicationId("app-1".to_string()),
            StepId(step.to_string()),
            ActorId("mentor-meera".to_string()),
            ActionKind::Approved,
            None,
        )
    }

    #[tokio::test]
    async fn append_and_list_preserves_order() {
        let pool = setup().await;
        let repo = SqlActionRepository::new(pool);

        repo.append(&approval("step-1")).await.expect("append 1");
        repo.append(&ApprovalAction::system_skip(
            ApplicationId("app-1".to_string()),
            StepId("step-2".to_string()),
            "auto-skipped: approver unavailable",
        ))
        .await
        .expect("append skip");

        let trail =
            repo.list_for_application(&ApplicationId("app-1".to_string())).await.expect("list");
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].kind, ActionKind::Approved);
        assert_eq!(trail[1].kind, ActionKind::Skipped);
        assert!(trail[1].actor.is_none());
    }

    #[tokio::test]
    async fn second_approval_of_same_step_conflicts() {
        let pool = setup().await;
        let repo = SqlActionRepository::new(pool);

        repo.append(&approval("step-1")).await.expect("first approval");
        let error = repo.append(&approval("step-1")).await.expect_err("duplicate approval");
        assert!(matches!(error, RepositoryError::Conflict(_)));

        // A rejection of the same step is a distinct kind and still lands.
        let rejection = ApprovalAction::recorded_by(
            ApplicationId("app-1".to_string()),
            StepId("step-1".to_string()),
            ActorId("mentor-meera".to_string()),
            ActionKind::Rejected,
            Some("second thoughts".to_string()),
        );
        repo.append(&rejection).await.expect("rejection appends");
    }
}
