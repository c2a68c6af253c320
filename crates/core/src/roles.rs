use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::actor::{ActorId, RoleId};
use crate::domain::application::ApplicationTypeCode;

/// Per-(role, application type) grant consulted by the override check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermission {
    pub can_override_flow: bool,
    pub can_edit_all: bool,
}

impl RolePermission {
    pub fn grants_override(self) -> bool {
        self.can_override_flow || self.can_edit_all
    }
}

/// Set-membership view over role assignments. The engine only ever needs
/// membership tests, never the backing storage.
pub trait RoleDirectory: Send + Sync {
    fn roles_of(&self, actor: &ActorId) -> BTreeSet<RoleId>;
    fn is_active(&self, actor: &ActorId) -> bool;
    fn is_superuser(&self, actor: &ActorId) -> bool;
    fn type_permission(
        &self,
        role: &RoleId,
        application_type: &ApplicationTypeCode,
    ) -> Option<RolePermission>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryRoleDirectory {
    roles: HashMap<ActorId, BTreeSet<RoleId>>,
    inactive: HashSet<ActorId>,
    superusers: HashSet<ActorId>,
    permissions: HashMap<(RoleId, ApplicationTypeCode), RolePermission>,
}

impl InMemoryRoleDirectory {
    pub fn with_actor(mut self, actor: ActorId, roles: Vec<RoleId>) -> Self {
        self.roles.entry(actor).or_default().extend(roles);
        self
    }

    pub fn with_inactive(mut self, actor: ActorId) -> Self {
        self.inactive.insert(actor);
        self
    }

    pub fn with_superuser(mut self, actor: ActorId) -> Self {
        self.superusers.insert(actor);
        self
    }

    pub fn with_permission(
        mut self,
        role: RoleId,
        application_type: ApplicationTypeCode,
        permission: RolePermission,
    ) -> Self {
        self.permissions.insert((role, application_type), permission);
        self
    }

    pub fn set_active(&mut self, actor: &ActorId, active: bool) {
        if active {
            self.inactive.remove(actor);
        } else {
            self.inactive.insert(actor.clone());
        }
    }
}

impl RoleDirectory for InMemoryRoleDirectory {
    fn roles_of(&self, actor: &ActorId) -> BTreeSet<RoleId> {
        self.roles.get(actor).cloned().unwrap_or_default()
    }

    fn is_active(&self, actor: &ActorId) -> bool {
        !self.inactive.contains(actor)
    }

    fn is_superuser(&self, actor: &ActorId) -> bool {
        self.superusers.contains(actor)
    }

    fn type_permission(
        &self,
        role: &RoleId,
        application_type: &ApplicationTypeCode,
    ) -> Option<RolePermission> {
        self.permissions.get(&(role.clone(), application_type.clone())).copied()
    }
}
