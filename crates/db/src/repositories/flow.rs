use sqlx::Row;

use campusflow_core::domain::academics::DepartmentId;
use campusflow_core::domain::actor::RoleId;
use campusflow_core::domain::application::ApplicationTypeCode;
use campusflow_core::domain::flow::{ApprovalFlow, ApprovalStep, FlowId, StepId};

use super::{FlowRepository, RepositoryError};
use crate::DbPool;

pub struct SqlFlowRepository {
    pool: DbPool,
}

impl SqlFlowRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_steps(&self, flow_id: &FlowId) -> Result<Vec<ApprovalStep>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, step_order, role, sla_hours, escalate_to_role, auto_skip_if_unavailable
             FROM approval_step WHERE flow_id = ? ORDER BY step_order ASC",
        )
        .bind(&flow_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let id: String =
                    row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let step_order: i64 =
                    row.try_get("step_order").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let role: String =
                    row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let sla_hours: Option<i64> =
                    row.try_get("sla_hours").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let escalate_to_role: Option<String> = row
                    .try_get("escalate_to_role")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let auto_skip: i64 = row
                    .try_get("auto_skip_if_unavailable")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;

                Ok(ApprovalStep {
                    id: StepId(id),
                    order: step_order as u32,
                    role: RoleId::new(role),
                    sla_hours,
                    escalate_to_role: escalate_to_role.map(RoleId::new),
                    auto_skip_if_unavailable: auto_skip != 0,
                })
            })
            .collect()
    }

    async fn row_to_flow(
        &self,
        row: &sqlx::sqlite::SqliteRow,
    ) -> Result<ApprovalFlow, RepositoryError> {
        let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let application_type: String =
            row.try_get("application_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let department: Option<String> =
            row.try_get("department_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let override_roles: String =
            row.try_get("override_roles").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let is_active: i64 =
            row.try_get("is_active").map_err(|e| RepositoryError::Decode(e.to_string()))?;

        let override_names: Vec<String> = serde_json::from_str(&override_roles)
            .map_err(|e| RepositoryError::Decode(format!("override_roles: {e}")))?;

        let flow_id = FlowId(id);
        let steps = self.load_steps(&flow_id).await?;

        Ok(ApprovalFlow {
            id: flow_id,
            application_type: ApplicationTypeCode(application_type),
            department: department.map(DepartmentId),
            override_roles: override_names.into_iter().map(RoleId::new).collect(),
            steps,
            active: is_active != 0,
        })
    }
}

#[async_trait::async_trait]
impl FlowRepository for SqlFlowRepository {
    async fn active_flow(
        &self,
        application_type: &ApplicationTypeCode,
        department: Option<&DepartmentId>,
    ) -> Result<Option<ApprovalFlow>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, application_type, department_id, override_roles, is_active
             FROM approval_flow
             WHERE application_type = ?
               AND IFNULL(department_id, '') = IFNULL(?, '')
               AND is_active = 1",
        )
        .bind(&application_type.0)
        .bind(department.map(|d| d.0.clone()))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(self.row_to_flow(r).await?)),
            None => Ok(None),
        }
    }

    async fn active_flows_for_type(
        &self,
        application_type: &ApplicationTypeCode,
    ) -> Result<Vec<ApprovalFlow>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, application_type, department_id, override_roles, is_active
             FROM approval_flow WHERE application_type = ? AND is_active = 1",
        )
        .bind(&application_type.0)
        .fetch_all(&self.pool)
        .await?;

        let mut flows = Vec::with_capacity(rows.len());
        for row in &rows {
            flows.push(self.row_to_flow(row).await?);
        }
        Ok(flows)
    }

    async fn save(&self, flow: &ApprovalFlow) -> Result<(), RepositoryError> {
        let override_roles = serde_json::to_string(
            &flow.override_roles.iter().map(|role| role.0.clone()).collect::<Vec<_>>(),
        )
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO approval_flow (id, application_type, department_id, override_roles, is_active)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 application_type = excluded.application_type,
                 department_id = excluded.department_id,
                 override_roles = excluded.override_roles,
                 is_active = excluded.is_active",
        )
        .bind(&flow.id.0)
        .bind(&flow.application_type.0)
        .bind(flow.department.as_ref().map(|d| d.0.clone()))
        .bind(&override_roles)
        .bind(flow.active as i64)
        .execute(&mut *tx)
        .await?;

        // Steps are replaced wholesale; the flow is the configuration unit.
        sqlx::query("DELETE FROM approval_step WHERE flow_id = ?")
            .bind(&flow.id.0)
            .execute(&mut *tx)
            .await?;

        for step in &flow.steps {
            sqlx::query(
                "INSERT INTO approval_step (id, flow_id, step_order, role, sla_hours,
                                            escalate_to_role, auto_skip_if_unavailable)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&step.id.0)
            .bind(&flow.id.0)
            .bind(step.order as i64)
            .bind(&step.role.0)
            .bind(step.sla_hours)
            .bind(step.escalate_to_role.as_ref().map(|role| role.0.clone()))
            .bind(step.auto_skip_if_unavailable as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
