use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::actor::ActorId;
use crate::domain::application::ApplicationId;
use crate::domain::flow::StepId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Approved,
    Rejected,
    Skipped,
}

/// Append-only audit record for one approve/reject/skip event. Never mutated
/// or deleted after the fact; a system-generated skip has no actor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalAction {
    pub id: ActionId,
    pub application_id: ApplicationId,
    pub step_id: Option<StepId>,
    pub actor: Option<ActorId>,
    pub kind: ActionKind,
    pub remarks: Option<String>,
    pub acted_at: DateTime<Utc>,
}

impl ApprovalAction {
    pub fn recorded_by(
        application_id: ApplicationId,
        step_id: StepId,
        actor: ActorId,
        kind: ActionKind,
        remarks: Option<String>,
    ) -> Self {
        Self {
            id: ActionId(Uuid::new_v4().to_string()),
            application_id,
            step_id: Some(step_id),
            actor: Some(actor),
            kind,
            remarks,
            acted_at: Utc::now(),
        }
    }

    pub fn system_skip(
        application_id: ApplicationId,
        step_id: StepId,
        remarks: impl Into<String>,
    ) -> Self {
        Self {
            id: ActionId(Uuid::new_v4().to_string()),
            application_id,
            step_id: Some(step_id),
            actor: None,
            kind: ActionKind::Skipped,
            remarks: Some(remarks.into()),
            acted_at: Utc::now(),
        }
    }

    pub fn is_approval_of(&self, step_id: &StepId) -> bool {
        self.kind == ActionKind::Approved && self.step_id.as_ref() == Some(step_id)
    }
}
