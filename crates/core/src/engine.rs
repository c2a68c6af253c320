//! The approval state machine.
//!
//! `process_decision` is the sole mutator; every other operation is a
//! read path over the same flow/step resolution rules. Flow configuration is
//! re-resolved on every call, since administrators may change it between
//! calls; the engine must never act on a cached view.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::authority::{AuthorityLookup, AvailabilityProbe};
use crate::config::FlowConfigStore;
use crate::domain::action::{ActionKind, ApprovalAction};
use crate::domain::actor::{ActorId, RoleId};
use crate::domain::application::{Application, ApplicationTypeCode};
use crate::domain::flow::{ApprovalFlow, ApprovalStep, StepId};
use crate::errors::DecisionError;
use crate::lifecycle;
use crate::notify::{emit_best_effort, Notification, NotificationKind, NotificationSink};
use crate::roles::RoleDirectory;
use crate::sla;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// Result of a successful decision: the advanced application plus the audit
/// rows to append. Persistence happens outside the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub application: Application,
    pub recorded: Vec<ApprovalAction>,
}

/// Result of the forward auto-skip walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkipOutcome {
    /// First step with a reachable approver, if the walk found one.
    pub landed: Option<ApprovalStep>,
    /// SKIPPED audit rows for steps bypassed along the way.
    pub skipped: Vec<ApprovalAction>,
    /// Step the walk halted on: unreachable and not skippable. The flow
    /// pauses there; this is a valid waiting state, not an error.
    pub blocked_at: Option<StepId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AuthorizationPath {
    StepRole,
    Override,
    Escalation,
}

pub struct ApprovalEngine<F, R, A, V, N> {
    flows: F,
    roles: R,
    authority: A,
    probe: V,
    sink: N,
}

impl<F, R, A, V, N> ApprovalEngine<F, R, A, V, N>
where
    F: FlowConfigStore,
    R: RoleDirectory,
    A: AuthorityLookup,
    V: AvailabilityProbe,
    N: NotificationSink,
{
    pub fn new(flows: F, roles: R, authority: A, probe: V, sink: N) -> Self {
        Self { flows, roles, authority, probe, sink }
    }

    pub fn roles(&self) -> &R {
        &self.roles
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }

    /// Department-scoped flow when the applicant's department resolves and a
    /// flow exists for it; otherwise the type's global fallback flow.
    pub fn matching_flow(&self, application: &Application) -> Option<ApprovalFlow> {
        if let Some(department) = self.authority.department_of(application) {
            if let Some(flow) =
                self.flows.active_flow(&application.application_type, Some(&department))
            {
                return Some(flow);
            }
        }
        self.flows.active_flow(&application.application_type, None)
    }

    /// The bound current step (refetched from configuration, never cached),
    /// else the matched flow's first step.
    pub fn current_step(&self, application: &Application) -> Option<ApprovalStep> {
        let flow = self.matching_flow(application)?;
        self.current_step_in(&flow, application)
    }

    fn current_step_in(
        &self,
        flow: &ApprovalFlow,
        application: &Application,
    ) -> Option<ApprovalStep> {
        if let Some(step_id) = &application.current_step {
            if let Some(step) = flow.step(step_id) {
                return Some(step.clone());
            }
        }
        flow.first_step().cloned()
    }

    /// Step with the smallest order strictly greater than `current`; the first
    /// step when `current` is `None`.
    pub fn next_step(
        &self,
        flow: &ApprovalFlow,
        current: Option<&ApprovalStep>,
    ) -> Option<ApprovalStep> {
        match current {
            Some(step) => flow.step_after(step.order).cloned(),
            None => flow.first_step().cloned(),
        }
    }

    /// Whether any of the actor's roles grants flow-wide override authority:
    /// membership in the flow's override set, or a per-(role, type) grant.
    pub fn is_authorized_override(&self, actor: &ActorId, application: &Application) -> bool {
        let Some(flow) = self.matching_flow(application) else {
            return false;
        };
        let roles = self.roles.roles_of(actor);
        self.override_grant(&roles, &flow, &application.application_type)
    }

    fn override_grant(
        &self,
        roles: &BTreeSet<RoleId>,
        flow: &ApprovalFlow,
        application_type: &ApplicationTypeCode,
    ) -> bool {
        roles.iter().any(|role| {
            flow.override_roles.contains(role)
                || self
                    .roles
                    .type_permission(role, application_type)
                    .map(|permission| permission.grants_override())
                    .unwrap_or(false)
        })
    }

    /// Single authorization rule shared by `can_act` and `process_decision`.
    fn authorization(
        &self,
        flow: &ApprovalFlow,
        step: &ApprovalStep,
        application: &Application,
        actor: &ActorId,
        actions: &[ApprovalAction],
        now: DateTime<Utc>,
    ) -> Option<AuthorizationPath> {
        if !self.roles.is_active(actor) {
            return None;
        }
        let roles = self.roles.roles_of(actor);
        if roles.contains(&step.role) {
            return Some(AuthorizationPath::StepRole);
        }
        if self.override_grant(&roles, flow, &application.application_type) {
            return Some(AuthorizationPath::Override);
        }
        if let Some(escalate_to) = &step.escalate_to_role {
            if roles.contains(escalate_to) && sla::is_overdue_at(application, step, actions, now) {
                return Some(AuthorizationPath::Escalation);
            }
        }
        None
    }

    pub fn can_act(
        &self,
        application: &Application,
        actor: &ActorId,
        actions: &[ApprovalAction],
    ) -> bool {
        self.can_act_at(application, actor, actions, Utc::now())
    }

    pub fn can_act_at(
        &self,
        application: &Application,
        actor: &ActorId,
        actions: &[ApprovalAction],
        now: DateTime<Utc>,
    ) -> bool {
        let Some(flow) = self.matching_flow(application) else {
            return false;
        };
        let Some(step) = self.current_step_in(&flow, application) else {
            // Stepless flow: only override authority applies.
            return self.roles.is_active(actor)
                && self.override_grant(
                    &self.roles.roles_of(actor),
                    &flow,
                    &application.application_type,
                );
        };
        self.authorization(&flow, &step, application, actor, actions, now).is_some()
    }

    /// A step is reachable when its role resolves to a concrete approver who
    /// passes the engine's availability probe.
    fn step_reachable(&self, step: &ApprovalStep, application: &Application) -> bool {
        match self.authority.resolve_approver(&step.role, application) {
            Some(approver) => self.probe.is_available(&approver).unwrap_or(false),
            None => false,
        }
    }

    /// Forward walk strictly after `from` (from the start when `None`): stop
    /// on the first reachable step; bypass unreachable steps marked
    /// auto-skippable, recording a SKIPPED row each; halt on an unreachable
    /// step that is not skippable.
    pub fn auto_skip_unavailable(
        &self,
        application: &Application,
        flow: &ApprovalFlow,
        from: Option<&ApprovalStep>,
    ) -> SkipOutcome {
        let mut skipped = Vec::new();
        for step in flow.steps_after(from.map(|step| step.order)) {
            if self.step_reachable(step, application) {
                return SkipOutcome { landed: Some(step.clone()), skipped, blocked_at: None };
            }
            if !step.auto_skip_if_unavailable {
                return SkipOutcome { landed: None, skipped, blocked_at: Some(step.id.clone()) };
            }
            skipped.push(ApprovalAction::system_skip(
                application.id.clone(),
                step.id.clone(),
                "auto-skipped: approver unavailable",
            ));
            emit_best_effort(
                &self.sink,
                Notification::new(
                    NotificationKind::AutoSkipped,
                    application.id.clone(),
                    vec![application.applicant.clone()],
                    format!("step {} ({}) skipped: approver unavailable", step.order, step.role),
                ),
            );
        }
        SkipOutcome { landed: None, skipped, blocked_at: None }
    }

    /// Draft -> Submitted: resolves the matching flow and binds its first step.
    pub fn submit(&self, application: &Application) -> Result<Application, DecisionError> {
        let flow = self.matching_flow(application).ok_or_else(|| {
            DecisionError::NoFlowConfigured {
                application_type: application.application_type.clone(),
            }
        })?;
        let first = flow.first_step().ok_or_else(|| DecisionError::NoFlowConfigured {
            application_type: application.application_type.clone(),
        })?;

        let mut application = application.clone();
        lifecycle::submit(&mut application, first)?;

        let mut targets = vec![application.applicant.clone()];
        if let Some(approver) = self.authority.resolve_approver(&first.role, &application) {
            targets.push(approver);
        }
        emit_best_effort(
            &self.sink,
            Notification::new(
                NotificationKind::Submitted,
                application.id.clone(),
                targets,
                format!("application submitted; awaiting {}", first.role),
            ),
        );
        Ok(application)
    }

    pub fn process_decision(
        &self,
        application: &Application,
        actor: &ActorId,
        decision: Decision,
        remarks: Option<String>,
        prior_actions: &[ApprovalAction],
    ) -> Result<DecisionOutcome, DecisionError> {
        self.process_decision_at(application, actor, decision, remarks, prior_actions, Utc::now())
    }

    pub fn process_decision_at(
        &self,
        application: &Application,
        actor: &ActorId,
        decision: Decision,
        remarks: Option<String>,
        prior_actions: &[ApprovalAction],
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, DecisionError> {
        if application.is_terminal() {
            return Err(DecisionError::Closed { state: application.state });
        }
        let flow = self.matching_flow(application).ok_or_else(|| {
            DecisionError::NoFlowConfigured {
                application_type: application.application_type.clone(),
            }
        })?;
        // A matched flow without steps is a configuration gap, not a decision.
        let step = self.current_step_in(&flow, application).ok_or_else(|| {
            DecisionError::NoFlowConfigured {
                application_type: application.application_type.clone(),
            }
        })?;
        let path = self
            .authorization(&flow, &step, application, actor, prior_actions, now)
            .ok_or_else(|| DecisionError::NotAuthorized { actor: actor.clone() })?;

        let mut application = application.clone();
        let mut recorded = Vec::new();

        match decision {
            Decision::Approve => {
                if prior_actions.iter().any(|action| action.is_approval_of(&step.id)) {
                    return Err(DecisionError::AlreadyApproved { step: step.id.clone() });
                }
                recorded.push(ApprovalAction::recorded_by(
                    application.id.clone(),
                    step.id.clone(),
                    actor.clone(),
                    ActionKind::Approved,
                    remarks,
                ));
                if path == AuthorizationPath::Override {
                    self.emit_override_used(&application, actor, &step);
                }
                emit_best_effort(
                    &self.sink,
                    Notification::new(
                        NotificationKind::StepApproved,
                        application.id.clone(),
                        vec![application.applicant.clone()],
                        format!("step {} ({}) approved by {actor}", step.order, step.role),
                    ),
                );

                let skip = self.auto_skip_unavailable(&application, &flow, Some(&step));
                let target = match (&skip.landed, &skip.blocked_at) {
                    (Some(next), _) => Some(next.clone()),
                    // Paused on the unreachable, non-skippable step.
                    (None, Some(blocked)) => flow.step(blocked).cloned(),
                    (None, None) => None,
                };
                recorded.extend(skip.skipped);

                match target {
                    Some(next) => lifecycle::move_to_in_review(&mut application, &next)?,
                    None => {
                        lifecycle::approve(&mut application)?;
                        emit_best_effort(
                            &self.sink,
                            Notification::new(
                                NotificationKind::FinalApproved,
                                application.id.clone(),
                                vec![application.applicant.clone()],
                                "all approval steps cleared",
                            ),
                        );
                    }
                }
            }
            Decision::Reject => {
                recorded.push(ApprovalAction::recorded_by(
                    application.id.clone(),
                    step.id.clone(),
                    actor.clone(),
                    ActionKind::Rejected,
                    remarks,
                ));
                if path == AuthorizationPath::Override {
                    self.emit_override_used(&application, actor, &step);
                }
                lifecycle::reject(&mut application)?;
                emit_best_effort(
                    &self.sink,
                    Notification::new(
                        NotificationKind::Rejected,
                        application.id.clone(),
                        vec![application.applicant.clone()],
                        format!("rejected at step {} ({}) by {actor}", step.order, step.role),
                    ),
                );
            }
        }

        Ok(DecisionOutcome { application, recorded })
    }

    fn emit_override_used(
        &self,
        application: &Application,
        actor: &ActorId,
        step: &ApprovalStep,
    ) {
        emit_best_effort(
            &self.sink,
            Notification::new(
                NotificationKind::OverrideUsed,
                application.id.clone(),
                vec![application.applicant.clone()],
                format!("{actor} acted on step {} ({}) via override", step.order, step.role),
            ),
        );
    }

    pub fn step_deadline(
        &self,
        application: &Application,
        actions: &[ApprovalAction],
    ) -> Option<DateTime<Utc>> {
        let step = self.current_step(application)?;
        sla::step_deadline(application, &step, actions)
    }

    pub fn escalate_if_overdue(
        &self,
        application: &Application,
        actions: &[ApprovalAction],
    ) -> bool {
        self.escalate_if_overdue_at(application, actions, Utc::now())
    }

    /// Emits an escalation notification for an overdue current step. Never
    /// mutates application or step state, and never auto-approves; repeated
    /// calls on a still-overdue step re-notify.
    pub fn escalate_if_overdue_at(
        &self,
        application: &Application,
        actions: &[ApprovalAction],
        now: DateTime<Utc>,
    ) -> bool {
        if application.is_terminal() {
            return false;
        }
        let Some(flow) = self.matching_flow(application) else {
            return false;
        };
        let Some(step_id) = &application.current_step else {
            return false;
        };
        let Some(step) = flow.step(step_id) else {
            return false;
        };
        if !sla::is_overdue_at(application, step, actions, now) {
            return false;
        }
        let Some(escalate_to) = &step.escalate_to_role else {
            return false;
        };

        let targets = match self.authority.resolve_approver(escalate_to, application) {
            Some(approver) => vec![approver],
            None => Vec::new(),
        };
        emit_best_effort(
            &self.sink,
            Notification::new(
                NotificationKind::Escalated,
                application.id.clone(),
                targets,
                format!(
                    "step {} ({}) overdue; escalated to {escalate_to}",
                    step.order, step.role
                ),
            ),
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{ApprovalEngine, Decision, SkipOutcome};
    use crate::authority::{
        AuthorityResolver, FixedPeriodProvider, InMemoryAcademicDirectory,
        InMemoryAvailabilityProbe,
    };
    use crate::config::InMemoryFlowConfigStore;
    use crate::domain::academics::{
        AcademicYearId, BatchId, CourseId, DepartmentId, SectionId, StudentId,
    };
    use crate::domain::action::{ActionKind, ApprovalAction};
    use crate::domain::actor::{ActorId, RoleId};
    use crate::domain::application::{
        Application, ApplicationId, ApplicationState, ApplicationTypeCode,
    };
    use crate::domain::flow::{ApprovalFlow, ApprovalStep, StepId};
    use crate::errors::DecisionError;
    use crate::notify::{FailingNotificationSink, InMemoryNotificationSink, NotificationKind};
    use crate::roles::{InMemoryRoleDirectory, RolePermission};

    const MENTOR: &str = "mentor-meera";
    const ADVISOR: &str = "advisor-arun";
    const HOD: &str = "hod-priya";
    const AHOD: &str = "ahod-vikram";
    const REGISTRAR: &str = "registrar-devi";
    const APPLICANT: &str = "stu-rahul";

    fn actor(id: &str) -> ActorId {
        ActorId(id.to_string())
    }

    fn leave() -> ApplicationTypeCode {
        ApplicationTypeCode("LEAVE".to_string())
    }

    fn year() -> AcademicYearId {
        AcademicYearId("ay-2025".to_string())
    }

    fn student() -> StudentId {
        StudentId("stu-rahul".to_string())
    }

    fn directory() -> InMemoryAcademicDirectory {
        InMemoryAcademicDirectory::default()
            .with_enrollment(
                student(),
                SectionId("sec-a".to_string()),
                BatchId("batch-2023".to_string()),
                CourseId("course-cse".to_string()),
                DepartmentId("dept-cse".to_string()),
            )
            .with_mentor(student(), year(), actor(MENTOR))
            .with_advisor(SectionId("sec-a".to_string()), year(), actor(ADVISOR))
            .with_hod(DepartmentId("dept-cse".to_string()), actor(HOD))
            .with_ahod("dr-01", actor(AHOD))
    }

    fn role_directory() -> InMemoryRoleDirectory {
        InMemoryRoleDirectory::default()
            .with_actor(actor(MENTOR), vec![RoleId::new("MENTOR")])
            .with_actor(actor(ADVISOR), vec![RoleId::new("ADVISOR")])
            .with_actor(actor(HOD), vec![RoleId::new("HOD")])
            .with_actor(actor(AHOD), vec![RoleId::new("AHOD")])
            .with_actor(actor(REGISTRAR), vec![RoleId::new("REGISTRAR")])
    }

    fn three_step_flow() -> ApprovalFlow {
        ApprovalFlow::new("flow-leave", leave())
            .with_step(ApprovalStep::new("step-1", 1, RoleId::new("MENTOR")))
            .with_step(
                ApprovalStep::new("step-2", 2, RoleId::new("ADVISOR"))
                    .auto_skippable()
                    .with_sla_hours(24)
                    .escalating_to(RoleId::new("AHOD")),
            )
            .with_step(ApprovalStep::new("step-3", 3, RoleId::new("HOD")))
    }

    struct Harness {
        engine: ApprovalEngine<
            InMemoryFlowConfigStore,
            InMemoryRoleDirectory,
            AuthorityResolver<
                InMemoryAcademicDirectory,
                FixedPeriodProvider,
                InMemoryAvailabilityProbe,
            >,
            InMemoryAvailabilityProbe,
            InMemoryNotificationSink,
        >,
        sink: InMemoryNotificationSink,
    }

    fn harness(flow: ApprovalFlow, unavailable: Vec<&str>) -> Harness {
        harness_with(flow, unavailable, role_directory())
    }

    fn harness_with(
        flow: ApprovalFlow,
        unavailable: Vec<&str>,
        roles: InMemoryRoleDirectory,
    ) -> Harness {
        let probe = InMemoryAvailabilityProbe::with_unavailable(
            unavailable.into_iter().map(actor).collect(),
        );
        let sink = InMemoryNotificationSink::default();
        let engine = ApprovalEngine::new(
            InMemoryFlowConfigStore::default().with_flow(flow),
            roles,
            AuthorityResolver::new(directory(), FixedPeriodProvider::year("ay-2025"), probe.clone()),
            probe,
            sink.clone(),
        );
        Harness { engine, sink }
    }

    fn submitted(harness: &Harness) -> Application {
        let draft = Application::draft(
            ApplicationId("app-1".to_string()),
            leave(),
            actor(APPLICANT),
        )
        .with_student(student());
        harness.engine.submit(&draft).expect("submit")
    }

    #[test]
    fn submit_binds_first_step_and_notifies() {
        let harness = harness(three_step_flow(), vec![]);
        let application = submitted(&harness);

        assert_eq!(application.state, ApplicationState::Submitted);
        assert_eq!(application.current_step, Some(StepId("step-1".to_string())));
        assert_eq!(harness.sink.kinds(), vec![NotificationKind::Submitted]);

        let delivered = harness.sink.delivered();
        assert!(delivered[0].targets.contains(&actor(APPLICANT)));
        assert!(delivered[0].targets.contains(&actor(MENTOR)));
    }

    #[test]
    fn submit_without_flow_fails() {
        let harness = harness(three_step_flow(), vec![]);
        let draft = Application::draft(
            ApplicationId("app-2".to_string()),
            ApplicationTypeCode("BONAFIDE".to_string()),
            actor(APPLICANT),
        );
        assert!(matches!(
            harness.engine.submit(&draft),
            Err(DecisionError::NoFlowConfigured { .. })
        ));
    }

    #[test]
    fn full_chain_approves_in_step_order() {
        let harness = harness(three_step_flow(), vec![]);
        let mut application = submitted(&harness);
        let mut actions: Vec<ApprovalAction> = Vec::new();

        for approver in [MENTOR, ADVISOR, HOD] {
            let outcome = harness
                .engine
                .process_decision(&application, &actor(approver), Decision::Approve, None, &actions)
                .expect("approve");
            actions.extend(outcome.recorded);
            application = outcome.application;
        }

        assert_eq!(application.state, ApplicationState::Approved);
        assert!(application.current_step.is_none());
        assert!(application.decided_at.is_some());

        let approved: Vec<&ApprovalAction> =
            actions.iter().filter(|action| action.kind == ActionKind::Approved).collect();
        assert_eq!(approved.len(), 3);
        assert_eq!(
            approved.iter().map(|action| action.step_id.clone().unwrap().0).collect::<Vec<_>>(),
            vec!["step-1", "step-2", "step-3"]
        );
        assert!(harness.sink.kinds().contains(&NotificationKind::FinalApproved));
    }

    #[test]
    fn reject_is_terminal_and_one_way() {
        let harness = harness(three_step_flow(), vec![]);
        let application = submitted(&harness);

        let outcome = harness
            .engine
            .process_decision(
                &application,
                &actor(MENTOR),
                Decision::Reject,
                Some("incomplete form".to_string()),
                &[],
            )
            .expect("reject");
        assert_eq!(outcome.application.state, ApplicationState::Rejected);
        assert_eq!(outcome.recorded.len(), 1);
        assert_eq!(outcome.recorded[0].kind, ActionKind::Rejected);

        let error = harness
            .engine
            .process_decision(
                &outcome.application,
                &actor(HOD),
                Decision::Approve,
                None,
                &outcome.recorded,
            )
            .expect_err("rejected is final");
        assert_eq!(error, DecisionError::Closed { state: ApplicationState::Rejected });
    }

    #[test]
    fn unauthorized_actor_changes_nothing() {
        let harness = harness(three_step_flow(), vec![]);
        let application = submitted(&harness);

        let error = harness
            .engine
            .process_decision(&application, &actor(REGISTRAR), Decision::Approve, None, &[])
            .expect_err("no role match, no override");
        assert_eq!(error, DecisionError::NotAuthorized { actor: actor(REGISTRAR) });
    }

    #[test]
    fn inactive_actor_cannot_act_even_with_matching_role() {
        let roles = role_directory().with_inactive(actor(MENTOR));
        let harness = harness_with(three_step_flow(), vec![], roles);
        let application = submitted(&harness);

        assert!(!harness.engine.can_act(&application, &actor(MENTOR), &[]));
        assert!(harness
            .engine
            .process_decision(&application, &actor(MENTOR), Decision::Approve, None, &[])
            .is_err());
    }

    #[test]
    fn missing_flow_is_a_hard_failure_with_no_actions() {
        let harness = harness(three_step_flow(), vec![]);
        let application = Application::draft(
            ApplicationId("app-3".to_string()),
            ApplicationTypeCode("BONAFIDE".to_string()),
            actor(APPLICANT),
        );

        let error = harness
            .engine
            .process_decision(&application, &actor(MENTOR), Decision::Approve, None, &[])
            .expect_err("no flow for type");
        assert!(matches!(error, DecisionError::NoFlowConfigured { .. }));
    }

    #[test]
    fn double_approve_on_settled_step_conflicts() {
        let harness = harness(three_step_flow(), vec![]);
        let application = submitted(&harness);

        let first = harness
            .engine
            .process_decision(&application, &actor(MENTOR), Decision::Approve, None, &[])
            .expect("first approve");

        // Replay against the pre-advance application with the winner's audit
        // trail visible: the loser of the race must conflict, not double-log.
        let error = harness
            .engine
            .process_decision(&application, &actor(MENTOR), Decision::Approve, None, &first.recorded)
            .expect_err("duplicate approve");
        assert_eq!(error, DecisionError::AlreadyApproved { step: StepId("step-1".to_string()) });
    }

    #[test]
    fn auto_skip_lands_past_unavailable_advisor() {
        let harness = harness(three_step_flow(), vec![ADVISOR]);
        let application = submitted(&harness);

        let outcome = harness
            .engine
            .process_decision(&application, &actor(MENTOR), Decision::Approve, None, &[])
            .expect("approve step 1");

        assert_eq!(outcome.application.current_step, Some(StepId("step-3".to_string())));
        assert_eq!(outcome.application.state, ApplicationState::InReview);

        let skips: Vec<&ApprovalAction> =
            outcome.recorded.iter().filter(|action| action.kind == ActionKind::Skipped).collect();
        assert_eq!(skips.len(), 1);
        assert_eq!(skips[0].step_id, Some(StepId("step-2".to_string())));
        assert!(skips[0].actor.is_none());
        assert_eq!(skips[0].remarks.as_deref(), Some("auto-skipped: approver unavailable"));
        assert!(harness.sink.kinds().contains(&NotificationKind::AutoSkipped));
    }

    #[test]
    fn unreachable_non_skippable_step_pauses_the_flow() {
        let flow = ApprovalFlow::new("flow-leave", leave())
            .with_step(ApprovalStep::new("step-1", 1, RoleId::new("MENTOR")))
            .with_step(ApprovalStep::new("step-2", 2, RoleId::new("ADVISOR")))
            .with_step(ApprovalStep::new("step-3", 3, RoleId::new("HOD")));
        let harness = harness(flow, vec![ADVISOR]);
        let application = submitted(&harness);

        let outcome = harness
            .engine
            .process_decision(&application, &actor(MENTOR), Decision::Approve, None, &[])
            .expect("approve step 1");

        // Paused on step 2, waiting. Not an error, and step 3 is not reached
        // even though its approver is available.
        assert_eq!(outcome.application.state, ApplicationState::InReview);
        assert_eq!(outcome.application.current_step, Some(StepId("step-2".to_string())));
        assert!(outcome.recorded.iter().all(|action| action.kind != ActionKind::Skipped));
    }

    #[test]
    fn trailing_skippable_steps_finalize_the_flow() {
        let flow = ApprovalFlow::new("flow-leave", leave())
            .with_step(ApprovalStep::new("step-1", 1, RoleId::new("MENTOR")))
            .with_step(ApprovalStep::new("step-2", 2, RoleId::new("ADVISOR")).auto_skippable());
        let harness = harness(flow, vec![ADVISOR]);
        let application = submitted(&harness);

        let outcome = harness
            .engine
            .process_decision(&application, &actor(MENTOR), Decision::Approve, None, &[])
            .expect("approve step 1");

        assert_eq!(outcome.application.state, ApplicationState::Approved);
        assert_eq!(
            outcome.recorded.iter().map(|action| action.kind).collect::<Vec<_>>(),
            vec![ActionKind::Approved, ActionKind::Skipped]
        );
    }

    #[test]
    fn auto_skip_walk_reports_blockage_position() {
        let flow = ApprovalFlow::new("flow-leave", leave())
            .with_step(ApprovalStep::new("step-1", 1, RoleId::new("MENTOR")))
            .with_step(ApprovalStep::new("step-2", 2, RoleId::new("ADVISOR")).auto_skippable())
            .with_step(ApprovalStep::new("step-3", 3, RoleId::new("HOD")));
        let harness = harness(flow.clone(), vec![ADVISOR, HOD, AHOD]);
        let application = submitted(&harness);

        let SkipOutcome { landed, skipped, blocked_at } = harness.engine.auto_skip_unavailable(
            &application,
            &flow,
            flow.first_step(),
        );
        assert!(landed.is_none());
        assert_eq!(skipped.len(), 1);
        assert_eq!(blocked_at, Some(StepId("step-3".to_string())));
    }

    #[test]
    fn override_role_bypasses_step_ownership() {
        let flow = three_step_flow().with_override_role(RoleId::new("REGISTRAR"));
        let harness = harness(flow, vec![]);
        let application = submitted(&harness);

        assert!(harness.engine.is_authorized_override(&actor(REGISTRAR), &application));

        let outcome = harness
            .engine
            .process_decision(&application, &actor(REGISTRAR), Decision::Approve, None, &[])
            .expect("override approve");
        assert_eq!(outcome.application.current_step, Some(StepId("step-2".to_string())));
        assert!(harness.sink.kinds().contains(&NotificationKind::OverrideUsed));
    }

    #[test]
    fn type_permission_grants_override_without_flow_membership() {
        let roles = role_directory().with_permission(
            RoleId::new("REGISTRAR"),
            leave(),
            RolePermission { can_override_flow: true, can_edit_all: false },
        );
        let harness = harness_with(three_step_flow(), vec![], roles);
        let application = submitted(&harness);

        assert!(harness.engine.is_authorized_override(&actor(REGISTRAR), &application));
        assert!(harness.engine.can_act(&application, &actor(REGISTRAR), &[]));
    }

    #[test]
    fn overdue_step_admits_escalation_role() {
        let harness = harness(three_step_flow(), vec![]);
        let mut application = submitted(&harness);

        let first = harness
            .engine
            .process_decision(&application, &actor(MENTOR), Decision::Approve, None, &[])
            .expect("approve step 1");
        application = first.application;

        // Step 2 carries a 24h SLA escalating to AHOD.
        let fresh = Utc::now();
        let overdue = Utc::now() + Duration::hours(30);

        assert!(!harness.engine.can_act_at(&application, &actor(AHOD), &first.recorded, fresh));
        assert!(harness.engine.can_act_at(&application, &actor(AHOD), &first.recorded, overdue));

        let outcome = harness
            .engine
            .process_decision_at(
                &application,
                &actor(AHOD),
                Decision::Approve,
                None,
                &first.recorded,
                overdue,
            )
            .expect("escalated approve");
        assert_eq!(outcome.application.current_step, Some(StepId("step-3".to_string())));
    }

    #[test]
    fn can_act_agrees_with_process_decision() {
        let harness = harness(three_step_flow(), vec![]);
        let application = submitted(&harness);
        let now = Utc::now();

        for candidate in [MENTOR, ADVISOR, HOD, AHOD, REGISTRAR, APPLICANT] {
            let predicted = harness.engine.can_act_at(&application, &actor(candidate), &[], now);
            let attempted = harness
                .engine
                .process_decision_at(&application, &actor(candidate), Decision::Approve, None, &[], now)
                .is_ok();
            assert_eq!(predicted, attempted, "divergence for {candidate}");
        }
    }

    #[test]
    fn escalation_fires_only_when_armed_and_overdue() {
        let harness = harness(three_step_flow(), vec![]);
        let mut application = submitted(&harness);
        let first = harness
            .engine
            .process_decision(&application, &actor(MENTOR), Decision::Approve, None, &[])
            .expect("approve step 1");
        application = first.application;

        // Not yet overdue.
        assert!(!harness.engine.escalate_if_overdue_at(&application, &first.recorded, Utc::now()));

        let overdue = Utc::now() + Duration::hours(30);
        assert!(harness.engine.escalate_if_overdue_at(&application, &first.recorded, overdue));
        assert!(harness.sink.kinds().contains(&NotificationKind::Escalated));

        let escalations = harness
            .sink
            .delivered()
            .into_iter()
            .filter(|notification| notification.kind == NotificationKind::Escalated)
            .collect::<Vec<_>>();
        assert_eq!(escalations[0].targets, vec![actor(AHOD)]);

        // Step 1 and step 3 carry no SLA; nothing to escalate there.
        let fresh = submitted(&harness);
        assert!(!harness.engine.escalate_if_overdue_at(&fresh, &[], overdue));
    }

    #[test]
    fn escalation_never_mutates_state() {
        let harness = harness(three_step_flow(), vec![]);
        let mut application = submitted(&harness);
        let first = harness
            .engine
            .process_decision(&application, &actor(MENTOR), Decision::Approve, None, &[])
            .expect("approve step 1");
        application = first.application;

        let before = application.clone();
        let overdue = Utc::now() + Duration::hours(30);
        harness.engine.escalate_if_overdue_at(&application, &first.recorded, overdue);
        assert_eq!(application, before);
    }

    #[test]
    fn decisions_survive_a_dead_notification_transport() {
        let probe = InMemoryAvailabilityProbe::default();
        let engine = ApprovalEngine::new(
            InMemoryFlowConfigStore::default().with_flow(three_step_flow()),
            role_directory(),
            AuthorityResolver::new(directory(), FixedPeriodProvider::year("ay-2025"), probe.clone()),
            probe,
            FailingNotificationSink,
        );

        let draft = Application::draft(
            ApplicationId("app-1".to_string()),
            leave(),
            actor(APPLICANT),
        )
        .with_student(student());
        let application = engine.submit(&draft).expect("submit despite sink failure");

        let outcome = engine
            .process_decision(&application, &actor(MENTOR), Decision::Approve, None, &[])
            .expect("approve despite sink failure");
        assert_eq!(outcome.application.current_step, Some(StepId("step-2".to_string())));
    }

    #[test]
    fn department_flow_outranks_global_fallback() {
        let global = ApprovalFlow::new("flow-global", leave())
            .with_step(ApprovalStep::new("g-1", 1, RoleId::new("REGISTRAR")));
        let scoped = three_step_flow().for_department(DepartmentId("dept-cse".to_string()));
        let probe = InMemoryAvailabilityProbe::default();
        let engine = ApprovalEngine::new(
            InMemoryFlowConfigStore::default().with_flow(global).with_flow(scoped),
            role_directory(),
            AuthorityResolver::new(directory(), FixedPeriodProvider::year("ay-2025"), probe.clone()),
            probe,
            InMemoryNotificationSink::default(),
        );

        // Student applicant: department resolves, scoped flow wins.
        let with_subject = Application::draft(
            ApplicationId("app-1".to_string()),
            leave(),
            actor(APPLICANT),
        )
        .with_student(student());
        assert_eq!(engine.matching_flow(&with_subject).map(|flow| flow.id.0), Some("flow-leave".to_string()));

        // No subject: falls back to the global flow.
        let without_subject = Application::draft(
            ApplicationId("app-2".to_string()),
            leave(),
            actor("staff-kumar"),
        );
        assert_eq!(
            engine.matching_flow(&without_subject).map(|flow| flow.id.0),
            Some("flow-global".to_string())
        );
    }
}
