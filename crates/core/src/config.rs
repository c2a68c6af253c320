use std::collections::HashMap;

use crate::domain::academics::DepartmentId;
use crate::domain::application::ApplicationTypeCode;
use crate::domain::flow::ApprovalFlow;

/// Read-only view over configured approval flows. Administrators mutate flows
/// out-of-band; the engine re-resolves on every call and never caches.
pub trait FlowConfigStore: Send + Sync {
    /// The single active flow for (type, department). `department: None`
    /// addresses the global fallback flow for the type.
    fn active_flow(
        &self,
        application_type: &ApplicationTypeCode,
        department: Option<&DepartmentId>,
    ) -> Option<ApprovalFlow>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryFlowConfigStore {
    flows: HashMap<(ApplicationTypeCode, Option<DepartmentId>), ApprovalFlow>,
}

impl InMemoryFlowConfigStore {
    pub fn with_flow(mut self, flow: ApprovalFlow) -> Self {
        let key = (flow.application_type.clone(), flow.department.clone());
        self.flows.insert(key, flow);
        self
    }
}

impl FlowConfigStore for InMemoryFlowConfigStore {
    fn active_flow(
        &self,
        application_type: &ApplicationTypeCode,
        department: Option<&DepartmentId>,
    ) -> Option<ApprovalFlow> {
        self.flows
            .get(&(application_type.clone(), department.cloned()))
            .filter(|flow| flow.active)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::{FlowConfigStore, InMemoryFlowConfigStore};
    use crate::domain::academics::DepartmentId;
    use crate::domain::application::ApplicationTypeCode;
    use crate::domain::flow::ApprovalFlow;

    fn leave() -> ApplicationTypeCode {
        ApplicationTypeCode("LEAVE".to_string())
    }

    #[test]
    fn department_and_global_flows_are_distinct_scopes() {
        let department = DepartmentId("dept-cse".to_string());
        let store = InMemoryFlowConfigStore::default()
            .with_flow(ApprovalFlow::new("flow-global", leave()))
            .with_flow(ApprovalFlow::new("flow-cse", leave()).for_department(department.clone()));

        let global = store.active_flow(&leave(), None).expect("global flow");
        assert_eq!(global.id.0, "flow-global");

        let scoped = store.active_flow(&leave(), Some(&department)).expect("scoped flow");
        assert_eq!(scoped.id.0, "flow-cse");
    }

    #[test]
    fn inactive_flows_are_invisible() {
        let mut flow = ApprovalFlow::new("flow-global", leave());
        flow.active = false;
        let store = InMemoryFlowConfigStore::default().with_flow(flow);

        assert!(store.active_flow(&leave(), None).is_none());
    }
}
