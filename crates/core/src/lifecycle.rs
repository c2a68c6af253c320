//! The one authorized writer of `Application.state` and `current_step`.
//!
//! Every state change funnels through these functions so the legal-transition
//! table lives in exactly one place. The engine and the persistence layer call
//! in; nothing else writes those fields.

use chrono::Utc;
use thiserror::Error;

use crate::domain::application::{Application, ApplicationState};
use crate::domain::flow::ApprovalStep;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("invalid application transition from {from:?} to {to:?}")]
    InvalidTransition { from: ApplicationState, to: ApplicationState },
}

fn guard(
    application: &Application,
    allowed_from: &[ApplicationState],
    to: ApplicationState,
) -> Result<(), LifecycleError> {
    if allowed_from.contains(&application.state) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition { from: application.state, to })
    }
}

fn stamp(application: &mut Application) {
    application.updated_at = Utc::now();
    application.state_version += 1;
}

/// Draft -> Submitted: binds the flow's first reviewable step.
pub fn submit(application: &mut Application, step: &ApprovalStep) -> Result<(), LifecycleError> {
    guard(application, &[ApplicationState::Draft], ApplicationState::Submitted)?;
    application.state = ApplicationState::Submitted;
    application.current_step = Some(step.id.clone());
    application.submitted_at = Some(Utc::now());
    stamp(application);
    Ok(())
}

/// Submitted|InReview -> InReview: advances the current-step pointer.
pub fn move_to_in_review(
    application: &mut Application,
    step: &ApprovalStep,
) -> Result<(), LifecycleError> {
    guard(
        application,
        &[ApplicationState::Submitted, ApplicationState::InReview],
        ApplicationState::InReview,
    )?;
    application.state = ApplicationState::InReview;
    application.current_step = Some(step.id.clone());
    stamp(application);
    Ok(())
}

/// Submitted|InReview -> Approved: terminal, clears the step pointer.
pub fn approve(application: &mut Application) -> Result<(), LifecycleError> {
    guard(
        application,
        &[ApplicationState::Submitted, ApplicationState::InReview],
        ApplicationState::Approved,
    )?;
    application.state = ApplicationState::Approved;
    application.current_step = None;
    application.decided_at = Some(Utc::now());
    stamp(application);
    Ok(())
}

/// Submitted|InReview -> Rejected: terminal and one-way.
pub fn reject(application: &mut Application) -> Result<(), LifecycleError> {
    guard(
        application,
        &[ApplicationState::Submitted, ApplicationState::InReview],
        ApplicationState::Rejected,
    )?;
    application.state = ApplicationState::Rejected;
    application.current_step = None;
    application.decided_at = Some(Utc::now());
    stamp(application);
    Ok(())
}
