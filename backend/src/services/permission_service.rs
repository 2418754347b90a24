//! Role hierarchy and permission checks.
//!
//! Each role lists the grants it adds and the role it inherits from; the
//! effective set is the union along that chain. The default marketplace
//! hierarchy is `Player -> Developer -> Admin`, with `Moderator` branching
//! off `Player`.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::models::permission::Permission;
use crate::models::role::Role;

#[derive(Debug, Clone)]
struct RoleDefinition {
    inherits: Option<Role>,
    grants: Vec<Permission>,
}

/// Explicit role hierarchy with precomputed effective permission sets.
#[derive(Debug, Clone)]
pub struct RoleHierarchy {
    definitions: HashMap<Role, RoleDefinition>,
    effective: HashMap<Role, Vec<Permission>>,
}

impl RoleHierarchy {
    pub fn builder() -> RoleHierarchyBuilder {
        RoleHierarchyBuilder::default()
    }

    /// Every permission the role holds, inherited grants first.
    pub fn effective_permissions(&self, role: Role) -> &[Permission] {
        self.effective.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The role this one inherits from, if any.
    pub fn parent(&self, role: Role) -> Option<Role> {
        self.definitions.get(&role).and_then(|d| d.inherits)
    }

    /// True when `role` holds every permission `other` holds.
    pub fn is_superset(&self, role: Role, other: Role) -> bool {
        let held = self.effective_permissions(role);
        self.effective_permissions(other)
            .iter()
            .all(|p| held.contains(p))
    }

    /// Decide whether `role` may perform `permission.action` on
    /// `permission.resource`.
    ///
    /// Only resource and action of the requested permission are matched;
    /// conditions come from the granted permissions and are evaluated
    /// against `context`. Access is granted when any matching grant is
    /// satisfied.
    pub fn has_permission(
        &self,
        role: Role,
        permission: &Permission,
        context: Option<&Map<String, Value>>,
    ) -> bool {
        self.effective_permissions(role)
            .iter()
            .filter(|granted| granted.matches(&permission.resource, &permission.action))
            .any(|granted| granted.conditions_met(context))
    }

    /// Like [`has_permission`](Self::has_permission) for a role name from an
    /// untrusted source. Unknown names are denied.
    pub fn has_permission_for_role_name(
        &self,
        role: &str,
        permission: &Permission,
        context: Option<&Map<String, Value>>,
    ) -> bool {
        match role.parse::<Role>() {
            Ok(role) => self.has_permission(role, permission, context),
            Err(_) => {
                tracing::debug!(role, "Denying permission for unknown role");
                false
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RoleHierarchyBuilder {
    definitions: HashMap<Role, RoleDefinition>,
    order: Vec<Role>,
}

impl RoleHierarchyBuilder {
    /// Define `role`. `inherits` must already be defined.
    pub fn role(mut self, role: Role, inherits: Option<Role>, grants: Vec<Permission>) -> Self {
        if let Some(parent) = inherits {
            assert!(
                self.definitions.contains_key(&parent),
                "{role} inherits from undefined role {parent}"
            );
        }
        self.definitions.insert(role, RoleDefinition { inherits, grants });
        self.order.push(role);
        self
    }

    pub fn build(self) -> RoleHierarchy {
        let mut effective: HashMap<Role, Vec<Permission>> = HashMap::new();
        // Parents are always defined before children.
        for role in &self.order {
            let def = &self.definitions[role];
            let mut set = def
                .inherits
                .and_then(|parent| effective.get(&parent).cloned())
                .unwrap_or_default();
            for grant in &def.grants {
                if !set.contains(grant) {
                    set.push(grant.clone());
                }
            }
            effective.insert(*role, set);
        }
        RoleHierarchy {
            definitions: self.definitions,
            effective,
        }
    }
}

fn player_grants() -> Vec<Permission> {
    vec![
        Permission::new("games", "read"),
        Permission::new("games", "play"),
        Permission::new("reviews", "read"),
        Permission::new("reviews", "create"),
        Permission::new("reviews", "update").owned(),
        Permission::new("reviews", "delete").owned(),
        Permission::new("comments", "create"),
        Permission::new("comments", "update").owned(),
        Permission::new("comments", "delete").owned(),
        Permission::new("profile", "read"),
        Permission::new("profile", "update").owned(),
        Permission::new("wallet", "read").owned(),
        Permission::new("wallet", "deposit").owned(),
        Permission::new("subscriptions", "manage").owned(),
        Permission::new("communities", "read"),
        Permission::new("communities", "join"),
        Permission::new("achievements", "read"),
    ]
}

fn developer_grants() -> Vec<Permission> {
    vec![
        Permission::new("games", "create"),
        Permission::new("games", "update").owned(),
        Permission::new("games", "delete").owned(),
        Permission::new("games", "publish").owned(),
        Permission::new("analytics", "read").owned(),
        Permission::new("monetization", "manage").owned(),
        Permission::new("achievements", "create").owned(),
        Permission::new("payouts", "request").owned(),
    ]
}

fn moderator_grants() -> Vec<Permission> {
    vec![
        Permission::new("reviews", "moderate"),
        Permission::new("reviews", "delete"),
        Permission::new("comments", "moderate"),
        Permission::new("comments", "delete"),
        Permission::new("communities", "moderate"),
        Permission::new("users", "warn"),
    ]
}

fn admin_grants() -> Vec<Permission> {
    vec![
        Permission::new("games", "update"),
        Permission::new("games", "delete"),
        Permission::new("games", "moderate"),
        Permission::new("reviews", "moderate"),
        Permission::new("reviews", "delete"),
        Permission::new("comments", "moderate"),
        Permission::new("comments", "delete"),
        Permission::new("users", "read"),
        Permission::new("users", "manage"),
        Permission::new("roles", "assign"),
        Permission::new("analytics", "read"),
        Permission::new("communities", "manage"),
        Permission::new("backups", "read"),
        Permission::new("backups", "create"),
        Permission::new("backups", "restore"),
        Permission::new("backups", "delete"),
        Permission::new("audit", "read"),
    ]
}

/// The marketplace hierarchy.
pub fn default_hierarchy() -> RoleHierarchy {
    RoleHierarchy::builder()
        .role(Role::Player, None, player_grants())
        .role(Role::Developer, Some(Role::Player), developer_grants())
        .role(Role::Moderator, Some(Role::Player), moderator_grants())
        .role(Role::Admin, Some(Role::Developer), admin_grants())
        .build()
}

/// Process-wide permission table.
pub fn permission_table() -> &'static RoleHierarchy {
    static TABLE: OnceLock<RoleHierarchy> = OnceLock::new();
    TABLE.get_or_init(default_hierarchy)
}

/// Check `permission` for `role` against the process-wide table.
pub fn has_permission(
    role: Role,
    permission: &Permission,
    context: Option<&Map<String, Value>>,
) -> bool {
    permission_table().has_permission(role, permission, context)
}
