use thiserror::Error;

use crate::domain::actor::ActorId;
use crate::domain::application::{ApplicationState, ApplicationTypeCode};
use crate::domain::flow::StepId;
use crate::lifecycle::LifecycleError;

/// Failures a decision attempt reports to its caller. Collaborator failures
/// (notification delivery, availability probes) never appear here; they are
/// absorbed at their boundaries.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecisionError {
    #[error("no approval flow configured for application type `{application_type}`")]
    NoFlowConfigured { application_type: ApplicationTypeCode },
    #[error("actor `{actor}` is not authorized to act on the current step")]
    NotAuthorized { actor: ActorId },
    #[error("step `{step}` already carries an approval")]
    AlreadyApproved { step: StepId },
    #[error("application is closed in state {state:?}")]
    Closed { state: ApplicationState },
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Decision(#[from] DecisionError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

/// HTTP-layer-facing shape: the view layer translates these to status codes.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You are not allowed to act on this application.",
            Self::Conflict { .. } => "This step has already been decided.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = "unassigned".to_owned();
        match value {
            ApplicationError::Decision(error @ DecisionError::NoFlowConfigured { .. })
            | ApplicationError::Decision(error @ DecisionError::Lifecycle(_)) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned }
            }
            ApplicationError::Decision(error @ DecisionError::NotAuthorized { .. }) => {
                Self::Forbidden { message: error.to_string(), correlation_id: unassigned }
            }
            ApplicationError::Decision(error @ DecisionError::AlreadyApproved { .. })
            | ApplicationError::Decision(error @ DecisionError::Closed { .. }) => {
                Self::Conflict { message: error.to_string(), correlation_id: unassigned }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned }
            }
        }
    }
}
