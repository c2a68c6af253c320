use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::academics::{StaffId, StudentId};
use crate::domain::actor::ActorId;
use crate::domain::flow::StepId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable category identity for a request ("LEAVE", "BONAFIDE", ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationTypeCode(pub String);

impl fmt::Display for ApplicationTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationType {
    pub code: ApplicationTypeCode,
    pub name: String,
    pub active: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationState {
    Draft,
    Submitted,
    InReview,
    Approved,
    Rejected,
    Cancelled,
}

impl ApplicationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Cancelled)
    }
}

/// A routed request instance. `state` and `current_step` are written exclusively
/// through the lifecycle mutator; everything else treats them as read-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub application_type: ApplicationTypeCode,
    pub applicant: ActorId,
    pub student: Option<StudentId>,
    pub staff: Option<StaffId>,
    pub state: ApplicationState,
    pub current_step: Option<StepId>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub state_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn draft(
        id: ApplicationId,
        application_type: ApplicationTypeCode,
        applicant: ActorId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            application_type,
            applicant,
            student: None,
            staff: None,
            state: ApplicationState::Draft,
            current_step: None,
            submitted_at: None,
            decided_at: None,
            state_version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_student(mut self, student: StudentId) -> Self {
        self.student = Some(student);
        self
    }

    pub fn with_staff(mut self, staff: StaffId) -> Self {
        self.staff = Some(staff);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Lowercase status string kept for serializers that still expose the old
    /// dual-field shape. Derived, never stored.
    pub fn legacy_status(&self) -> &'static str {
        match self.state {
            ApplicationState::Draft => "draft",
            ApplicationState::Submitted => "submitted",
            ApplicationState::InReview => "in_review",
            ApplicationState::Approved => "approved",
            ApplicationState::Rejected => "rejected",
            ApplicationState::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Application, ApplicationId, ApplicationState, ApplicationTypeCode};
    use crate::domain::actor::ActorId;

    #[test]
    fn draft_starts_unbound() {
        let application = Application::draft(
            ApplicationId("app-1".to_string()),
            ApplicationTypeCode("LEAVE".to_string()),
            ActorId("stu-1".to_string()),
        );

        assert_eq!(application.state, ApplicationState::Draft);
        assert!(application.current_step.is_none());
        assert!(application.submitted_at.is_none());
        assert_eq!(application.state_version, 1);
    }

    #[test]
    fn legacy_status_tracks_state() {
        let mut application = Application::draft(
            ApplicationId("app-1".to_string()),
            ApplicationTypeCode("LEAVE".to_string()),
            ActorId("stu-1".to_string()),
        );
        assert_eq!(application.legacy_status(), "draft");

        application.state = ApplicationState::InReview;
        assert_eq!(application.legacy_status(), "in_review");

        application.state = ApplicationState::Rejected;
        assert_eq!(application.legacy_status(), "rejected");
        assert!(application.is_terminal());
    }
}
