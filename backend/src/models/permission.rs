//! Permission and authorization context models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use super::role::Role;

/// An atomic `(resource, action)` capability, optionally qualified by
/// runtime conditions such as `{"owner": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub resource: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<BTreeMap<String, Value>>,
}

impl Permission {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            conditions: None,
        }
    }

    /// Add a condition that the caller's context must satisfy.
    pub fn when(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Shorthand for `.when("owner", true)`.
    pub fn owned(self) -> Self {
        self.when("owner", true)
    }

    /// Same resource and action, ignoring conditions.
    pub fn matches(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }

    /// True when every declared condition is present in `context` with an
    /// equal value. Unconditional permissions are always satisfied.
    pub fn conditions_met(&self, context: Option<&Map<String, Value>>) -> bool {
        let Some(conditions) = self.conditions.as_ref().filter(|c| !c.is_empty()) else {
            return true;
        };
        let Some(context) = context else {
            return false;
        };
        conditions
            .iter()
            .all(|(key, expected)| context.get(key) == Some(expected))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

/// Per-request identity and attributes used to evaluate conditional grants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizationContext {
    pub user_id: String,
    pub role: Role,
    pub attributes: Map<String, Value>,
}

impl AuthorizationContext {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            attributes: Map::new(),
        }
    }
}
