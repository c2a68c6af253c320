//! Deadline math for the current step. Read-only: nothing here mutates
//! application or step state, and nothing ever auto-approves.

use chrono::{DateTime, Duration, Utc};

use crate::domain::action::ApprovalAction;
use crate::domain::application::Application;
use crate::domain::flow::ApprovalStep;

/// Deadline for `step`, or `None` when the step carries no SLA budget.
///
/// The clock starts at the most recent recorded action, else the submission
/// time, else the application's creation time.
pub fn step_deadline(
    application: &Application,
    step: &ApprovalStep,
    actions: &[ApprovalAction],
) -> Option<DateTime<Utc>> {
    let hours = step.sla_hours?;
    let start = actions
        .iter()
        .filter(|action| action.application_id == application.id)
        .map(|action| action.acted_at)
        .max()
        .or(application.submitted_at)
        .unwrap_or(application.created_at);
    Some(start + Duration::hours(hours))
}

pub fn is_overdue_at(
    application: &Application,
    step: &ApprovalStep,
    actions: &[ApprovalAction],
    now: DateTime<Utc>,
) -> bool {
    step_deadline(application, step, actions).map_or(false, |deadline| now > deadline)
}

pub fn is_overdue(
    application: &Application,
    step: &ApprovalStep,
    actions: &[ApprovalAction],
) -> bool {
    is_overdue_at(application, step, actions, Utc::now())
}
