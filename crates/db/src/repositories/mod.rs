use async_trait::async_trait;
use thiserror::Error;

use campusflow_core::domain::academics::DepartmentId;
use campusflow_core::domain::action::ApprovalAction;
use campusflow_core::domain::application::{Application, ApplicationId, ApplicationTypeCode};
use campusflow_core::domain::flow::ApprovalFlow;

pub mod action;
pub mod application;
pub mod flow;
pub mod memory;

pub use action::SqlActionRepository;
pub use application::SqlApplicationRepository;
pub use flow::SqlFlowRepository;
pub use memory::{InMemoryActionRepository, InMemoryApplicationRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn find_by_id(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;

    async fn insert(&self, application: &Application) -> Result<(), RepositoryError>;

    /// Compare-and-swap on `state_version`: the write lands only when the
    /// stored row still carries `expected_version`. A lost race is reported
    /// as [`RepositoryError::Conflict`], never silently overwritten.
    async fn update_versioned(
        &self,
        application: &Application,
        expected_version: u32,
    ) -> Result<(), RepositoryError>;

    async fn list_for_applicant(
        &self,
        applicant: &str,
    ) -> Result<Vec<Application>, RepositoryError>;
}

#[async_trait]
pub trait FlowRepository: Send + Sync {
    async fn active_flow(
        &self,
        application_type: &ApplicationTypeCode,
        department: Option<&DepartmentId>,
    ) -> Result<Option<ApprovalFlow>, RepositoryError>;

    async fn active_flows_for_type(
        &self,
        application_type: &ApplicationTypeCode,
    ) -> Result<Vec<ApprovalFlow>, RepositoryError>;

    async fn save(&self, flow: &ApprovalFlow) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ActionRepository: Send + Sync {
    /// Append-only; a second approval for the same (application, step) is
    /// rejected by the schema and surfaces as a conflict.
    async fn append(&self, action: &ApprovalAction) -> Result<(), RepositoryError>;

    async fn list_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<ApprovalAction>, RepositoryError>;
}
