pub mod access;
pub mod authority;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod lifecycle;
pub mod notify;
pub mod roles;
pub mod sla;

pub use access::AccessGate;
pub use authority::{
    AcademicDirectory, AuthorityLookup, AuthorityResolver, AvailabilityProbe,
    CurrentPeriodProvider, FixedPeriodProvider, InMemoryAcademicDirectory,
    InMemoryAvailabilityProbe, RoleToken,
};
pub use config::{FlowConfigStore, InMemoryFlowConfigStore};
pub use domain::academics::{
    AcademicYearId, BatchId, CourseId, DepartmentId, SectionId, StaffId, StudentId,
};
pub use domain::action::{ActionId, ActionKind, ApprovalAction};
pub use domain::actor::{ActorId, RoleId};
pub use domain::application::{
    Application, ApplicationId, ApplicationState, ApplicationType, ApplicationTypeCode,
};
pub use domain::flow::{ApprovalFlow, ApprovalStep, FlowId, StepId};
pub use engine::{ApprovalEngine, Decision, DecisionOutcome, SkipOutcome};
pub use errors::{ApplicationError, DecisionError, InterfaceError};
pub use lifecycle::LifecycleError;
pub use notify::{
    DeliveryError, FailingNotificationSink, InMemoryNotificationSink, Notification,
    NotificationKind, NotificationSink,
};
pub use roles::{InMemoryRoleDirectory, RoleDirectory, RolePermission};
