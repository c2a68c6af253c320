//! Transactional shell around the synchronous engine: load a snapshot, run
//! the decision, and persist the audit rows together with the versioned
//! application write. The version check turns a lost race into a conflict
//! instead of a silent overwrite.

use thiserror::Error;

use campusflow_core::access::AccessGate;
use campusflow_core::domain::action::ApprovalAction;
use campusflow_core::domain::actor::ActorId;
use campusflow_core::domain::application::{Application, ApplicationId};
use campusflow_core::engine::Decision;
use campusflow_core::errors::{ApplicationError, DecisionError};
use campusflow_core::notify::{InMemoryNotificationSink, NotificationSink};

use crate::context::DecisionContext;
use crate::repositories::{
    action, application, ActionRepository, ApplicationRepository, RepositoryError,
    SqlActionRepository, SqlApplicationRepository,
};
use crate::DbPool;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("application `{0}` not found")]
    NotFound(ApplicationId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Decision(#[from] DecisionError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(value: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::from(value))
    }
}

impl From<ServiceError> for ApplicationError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::NotFound(id) => {
                ApplicationError::Configuration(format!("application `{id}` not found"))
            }
            ServiceError::Repository(error) => ApplicationError::Persistence(error.to_string()),
            ServiceError::Decision(error) => ApplicationError::Decision(error),
        }
    }
}

pub struct DecisionService {
    pool: DbPool,
}

impl DecisionService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn file_draft(&self, draft: &Application) -> Result<(), ServiceError> {
        let applications = SqlApplicationRepository::new(self.pool.clone());
        applications.insert(draft).await?;
        Ok(())
    }

    pub async fn submit<N: NotificationSink>(
        &self,
        id: &ApplicationId,
        sink: N,
    ) -> Result<Application, ServiceError> {
        let stored = self.load(id).await?;
        let context = DecisionContext::load(&self.pool, &stored.application_type).await?;
        let engine = context.engine(sink);

        let before_version = stored.state_version;
        let submitted = engine.submit(&stored)?;

        let applications = SqlApplicationRepository::new(self.pool.clone());
        applications.update_versioned(&submitted, before_version).await?;

        tracing::info!(application_id = %id, step = ?submitted.current_step, "application submitted");
        Ok(submitted)
    }

    pub async fn decide<N: NotificationSink>(
        &self,
        id: &ApplicationId,
        actor: &ActorId,
        decision: Decision,
        remarks: Option<String>,
        sink: N,
    ) -> Result<Application, ServiceError> {
        let stored = self.load(id).await?;
        let trail = self.trail(id).await?;
        let context = DecisionContext::load(&self.pool, &stored.application_type).await?;
        let engine = context.engine(sink);

        let before_version = stored.state_version;
        let outcome = engine.process_decision(&stored, actor, decision, remarks, &trail)?;

        let mut tx = self.pool.begin().await?;
        for recorded in &outcome.recorded {
            action::append_with(&mut *tx, recorded).await?;
        }
        application::update_versioned_with(&mut *tx, &outcome.application, before_version).await?;
        tx.commit().await?;

        tracing::info!(
            application_id = %id,
            actor = %actor,
            state = outcome.application.legacy_status(),
            "decision recorded",
        );
        Ok(outcome.application)
    }

    /// Fires escalation notifications for an overdue current step; read-only
    /// with respect to application state.
    pub async fn escalate_overdue<N: NotificationSink>(
        &self,
        id: &ApplicationId,
        sink: N,
    ) -> Result<bool, ServiceError> {
        let stored = self.load(id).await?;
        let trail = self.trail(id).await?;
        let context = DecisionContext::load(&self.pool, &stored.application_type).await?;
        let engine = context.engine(sink);
        Ok(engine.escalate_if_overdue(&stored, &trail))
    }

    pub async fn can_act(
        &self,
        id: &ApplicationId,
        actor: &ActorId,
    ) -> Result<bool, ServiceError> {
        let stored = self.load(id).await?;
        let trail = self.trail(id).await?;
        let context = DecisionContext::load(&self.pool, &stored.application_type).await?;
        let engine = context.engine(InMemoryNotificationSink::default());
        Ok(engine.can_act(&stored, actor, &trail))
    }

    pub async fn can_view(
        &self,
        id: &ApplicationId,
        actor: &ActorId,
    ) -> Result<bool, ServiceError> {
        let stored = self.load(id).await?;
        let trail = self.trail(id).await?;
        let context = DecisionContext::load(&self.pool, &stored.application_type).await?;
        let engine = context.engine(InMemoryNotificationSink::default());
        let gate = AccessGate::new(&engine, &context.directory);
        Ok(gate.can_view(&stored, actor, &trail))
    }

    pub async fn trail(&self, id: &ApplicationId) -> Result<Vec<ApprovalAction>, ServiceError> {
        let actions = SqlActionRepository::new(self.pool.clone());
        Ok(actions.list_for_application(id).await?)
    }

    async fn load(&self, id: &ApplicationId) -> Result<Application, ServiceError> {
        let applications = SqlApplicationRepository::new(self.pool.clone());
        applications.find_by_id(id).await?.ok_or_else(|| ServiceError::NotFound(id.clone()))
    }
}
