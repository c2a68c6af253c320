//! Read-side visibility rule for applications. Deny by default; every grant
//! below is an explicit reason a person may see a request.

use crate::authority::{AcademicDirectory, AuthorityLookup, AvailabilityProbe};
use crate::config::FlowConfigStore;
use crate::domain::action::ApprovalAction;
use crate::domain::actor::ActorId;
use crate::domain::application::Application;
use crate::engine::ApprovalEngine;
use crate::notify::NotificationSink;
use crate::roles::RoleDirectory;

pub struct AccessGate<'a, F, R, A, V, N, D> {
    engine: &'a ApprovalEngine<F, R, A, V, N>,
    directory: &'a D,
}

impl<'a, F, R, A, V, N, D> AccessGate<'a, F, R, A, V, N, D>
where
    F: FlowConfigStore,
    R: RoleDirectory,
    A: AuthorityLookup,
    V: AvailabilityProbe,
    N: NotificationSink,
    D: AcademicDirectory,
{
    pub fn new(engine: &'a ApprovalEngine<F, R, A, V, N>, directory: &'a D) -> Self {
        Self { engine, directory }
    }

    /// Whether `actor` may see `application`: superusers, the applicant,
    /// anyone currently able to act, anyone who already acted, and staff in
    /// (or chairing) the applicant's department.
    pub fn can_view(
        &self,
        application: &Application,
        actor: &ActorId,
        actions: &[ApprovalAction],
    ) -> bool {
        if self.engine.roles().is_superuser(actor) {
            return true;
        }
        if application.applicant == *actor {
            return true;
        }
        if self.engine.can_act(application, actor, actions) {
            return true;
        }
        let acted_here = actions.iter().any(|action| {
            action.application_id == application.id && action.actor.as_ref() == Some(actor)
        });
        if acted_here {
            return true;
        }
        self.department_grant(application, actor)
    }

    fn department_grant(&self, application: &Application, actor: &ActorId) -> bool {
        let Some(department) = self.engine.authority().department_of(application) else {
            return false;
        };
        if self.directory.is_hod_of(actor, &department) {
            return true;
        }
        self.directory.department_of_staff(actor) == Some(department)
    }
}
