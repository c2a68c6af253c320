use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::actor::ActorId;
use crate::domain::application::ApplicationId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    Submitted,
    StepApproved,
    FinalApproved,
    Rejected,
    AutoSkipped,
    OverrideUsed,
    Escalated,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub application_id: ApplicationId,
    pub targets: Vec<ActorId>,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        application_id: ApplicationId,
        targets: Vec<ActorId>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            application_id,
            targets,
            reason: reason.into(),
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("notification delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Opaque delivery boundary (mail, messaging, in-app). Implementations may
/// fail; callers go through [`emit_best_effort`], which absorbs the failure.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: Notification) -> Result<(), DeliveryError>;
}

/// Failure-absorbing emit: a refused delivery is logged and dropped, never
/// surfaced to the decision path.
pub fn emit_best_effort<S: NotificationSink + ?Sized>(sink: &S, notification: Notification) {
    let kind = notification.kind;
    let application_id = notification.application_id.clone();
    if let Err(error) = sink.deliver(notification) {
        tracing::warn!(
            application_id = %application_id,
            kind = ?kind,
            error = %error,
            "notification delivery failed; continuing",
        );
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationSink {
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotificationSink {
    pub fn delivered(&self) -> Vec<Notification> {
        match self.delivered.lock() {
            Ok(delivered) => delivered.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.delivered().iter().map(|notification| notification.kind).collect()
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn deliver(&self, notification: Notification) -> Result<(), DeliveryError> {
        match self.delivered.lock() {
            Ok(mut delivered) => delivered.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
        Ok(())
    }
}

/// Sink that refuses every delivery; exercises the absorption contract.
#[derive(Clone, Debug, Default)]
pub struct FailingNotificationSink;

impl NotificationSink for FailingNotificationSink {
    fn deliver(&self, _notification: Notification) -> Result<(), DeliveryError> {
        Err(DeliveryError("transport offline".to_string()))
    }
}
