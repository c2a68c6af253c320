use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::academics::DepartmentId;
use crate::domain::actor::RoleId;
use crate::domain::application::ApplicationTypeCode;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One stage of an approval flow. `order` is unique within the owning flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub id: StepId,
    pub order: u32,
    pub role: RoleId,
    pub sla_hours: Option<i64>,
    pub escalate_to_role: Option<RoleId>,
    pub auto_skip_if_unavailable: bool,
}

impl ApprovalStep {
    pub fn new(id: impl Into<String>, order: u32, role: RoleId) -> Self {
        Self {
            id: StepId(id.into()),
            order,
            role,
            sla_hours: None,
            escalate_to_role: None,
            auto_skip_if_unavailable: false,
        }
    }

    pub fn with_sla_hours(mut self, hours: i64) -> Self {
        self.sla_hours = Some(hours);
        self
    }

    pub fn escalating_to(mut self, role: RoleId) -> Self {
        self.escalate_to_role = Some(role);
        self
    }

    pub fn auto_skippable(mut self) -> Self {
        self.auto_skip_if_unavailable = true;
        self
    }
}

/// Ordered step template for one (application type, department) pair. A flow
/// without a department is the global fallback for its type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalFlow {
    pub id: FlowId,
    pub application_type: ApplicationTypeCode,
    pub department: Option<DepartmentId>,
    pub override_roles: BTreeSet<RoleId>,
    pub steps: Vec<ApprovalStep>,
    pub active: bool,
}

impl ApprovalFlow {
    pub fn new(id: impl Into<String>, application_type: ApplicationTypeCode) -> Self {
        Self {
            id: FlowId(id.into()),
            application_type,
            department: None,
            override_roles: BTreeSet::new(),
            steps: Vec::new(),
            active: true,
        }
    }

    pub fn for_department(mut self, department: DepartmentId) -> Self {
        self.department = Some(department);
        self
    }

    pub fn with_override_role(mut self, role: RoleId) -> Self {
        self.override_roles.insert(role);
        self
    }

    pub fn with_step(mut self, step: ApprovalStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step(&self, id: &StepId) -> Option<&ApprovalStep> {
        self.steps.iter().find(|step| &step.id == id)
    }

    pub fn first_step(&self) -> Option<&ApprovalStep> {
        self.steps.iter().min_by_key(|step| step.order)
    }

    /// Step with the smallest order strictly greater than `order`.
    pub fn step_after(&self, order: u32) -> Option<&ApprovalStep> {
        self.steps.iter().filter(|step| step.order > order).min_by_key(|step| step.order)
    }

    /// Steps strictly after `order` (all steps when `None`), in ascending order.
    pub fn steps_after(&self, order: Option<u32>) -> Vec<&ApprovalStep> {
        let mut following: Vec<&ApprovalStep> = self
            .steps
            .iter()
            .filter(|step| order.map_or(true, |after| step.order > after))
            .collect();
        following.sort_by_key(|step| step.order);
        following
    }
}

#[cfg(test)]
mod tests {
    use super::{ApprovalFlow, ApprovalStep, StepId};
    use crate::domain::actor::RoleId;
    use crate::domain::application::ApplicationTypeCode;

    fn flow() -> ApprovalFlow {
        ApprovalFlow::new("flow-leave", ApplicationTypeCode("LEAVE".to_string()))
            .with_step(ApprovalStep::new("step-3", 3, RoleId::new("hod")))
            .with_step(ApprovalStep::new("step-1", 1, RoleId::new("mentor")))
            .with_step(ApprovalStep::new("step-2", 2, RoleId::new("advisor")))
    }

    #[test]
    fn first_step_is_lowest_order_regardless_of_insertion() {
        assert_eq!(flow().first_step().map(|s| s.id.clone()), Some(StepId("step-1".to_string())));
    }

    #[test]
    fn step_after_walks_in_order() {
        let flow = flow();
        assert_eq!(flow.step_after(1).map(|s| s.order), Some(2));
        assert_eq!(flow.step_after(2).map(|s| s.order), Some(3));
        assert_eq!(flow.step_after(3), None);
    }

    #[test]
    fn steps_after_none_returns_all_sorted() {
        let orders: Vec<u32> = flow().steps_after(None).iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[test]
    fn role_ids_normalize_to_uppercase() {
        assert_eq!(RoleId::new(" mentor "), RoleId("MENTOR".to_string()));
    }
}
