//! Field-level policy table.
//!
//! The table is plain data: `resource → role → {canRead, canCreate, canUpdate}`
//! plus the scope each role is granted at. It is deserialized once and never
//! mutated afterwards; every permission question is answered by
//! [`PolicyTable::evaluate`].

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Deserialize;
use thiserror::Error;

use crate::permissions::{Action, AttributeSet, Grant, Scope};
use crate::roles::Role;

const BUILTIN_POLICY: &str = include_str!("../policy/field_access.json");

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("malformed policy document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("policy grants role '{0}' on resources but gives it no scope")]
    MissingScope(String),
}

/// The three allowlists a role has on one resource.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleLists {
    #[serde(default)]
    pub can_read: AttributeSet,
    #[serde(default)]
    pub can_create: AttributeSet,
    #[serde(default)]
    pub can_update: AttributeSet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTable {
    role_scopes: HashMap<String, Scope>,
    resources: HashMap<String, HashMap<String, RoleLists>>,
}

impl PolicyTable {
    /// Parse a policy document.
    ///
    /// Every role that appears under a resource must also have a scope, so a
    /// typo in `roleScopes` cannot silently lock a role out.
    pub fn from_json(document: &str) -> Result<Self, PolicyError> {
        let table: PolicyTable = serde_json::from_str(document)?;

        for roles in table.resources.values() {
            for role in roles.keys() {
                if !table.role_scopes.contains_key(role) {
                    return Err(PolicyError::MissingScope(role.clone()));
                }
            }
        }

        tracing::debug!(resources = table.resources.len(), "policy table loaded");
        Ok(table)
    }

    /// The policy shipped with the portal.
    pub fn builtin() -> &'static PolicyTable {
        static TABLE: OnceLock<PolicyTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            PolicyTable::from_json(BUILTIN_POLICY).expect("embedded field access policy is valid")
        })
    }

    /// Pure lookup: never fails, unknown entries are denied.
    pub fn evaluate(
        &self,
        role: Role,
        resource: impl AsRef<str>,
        action: Action,
        scope: Scope,
    ) -> Grant {
        self.evaluate_named(role.as_str(), resource.as_ref(), action, scope)
    }

    /// String-keyed variant of [`evaluate`](Self::evaluate) for names that
    /// arrive from outside the type system.
    pub fn evaluate_named(&self, role: &str, resource: &str, action: Action, scope: Scope) -> Grant {
        let Some(role_scope) = self.role_scopes.get(role) else {
            return Grant::denied();
        };
        if !role_scope.covers(scope) {
            return Grant::denied();
        }

        let Some(lists) = self.resources.get(resource).and_then(|roles| roles.get(role)) else {
            return Grant::denied();
        };

        match action {
            Action::Read => Grant::from_attributes(&lists.can_read),
            Action::Create => Grant::from_attributes(&lists.can_create),
            Action::Update => Grant::from_attributes(&lists.can_update),
            Action::Delete => delete_follows_update(lists),
        }
    }

    /// Scope a role is granted at, if the role is known to the table.
    pub fn scope_of(&self, role: Role) -> Option<Scope> {
        self.role_scopes.get(role.as_str()).copied()
    }
}

/// Delete has no field list of its own: a role may delete in a scope exactly
/// when it may update in that scope.
fn delete_follows_update(lists: &RoleLists) -> Grant {
    if lists.can_update.is_empty() {
        Grant::denied()
    } else {
        Grant::presence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;
    use proptest::prelude::*;

    fn table() -> &'static PolicyTable {
        PolicyTable::builtin()
    }

    #[test]
    fn builtin_policy_parses() {
        assert_eq!(table().scope_of(Role::Student), Some(Scope::Own));
        assert_eq!(table().scope_of(Role::SuperAdmin), Some(Scope::Any));
        assert_eq!(table().scope_of(Role::Admin), Some(Scope::Any));
    }

    #[test]
    fn student_reads_own_orders_but_not_any() {
        let own = table().evaluate(Role::Student, Resource::Order, Action::Read, Scope::Own);
        assert!(own.granted);
        assert!(own.attributes.allows("validityErrors"));
        assert!(!own.attributes.allows("lastModifiedBy"));

        let any = table().evaluate(Role::Student, Resource::Order, Action::Read, Scope::Any);
        assert!(!any.granted);
    }

    #[test]
    fn super_admin_cannot_create_orders() {
        let grant = table().evaluate(Role::SuperAdmin, Resource::Order, Action::Create, Scope::Any);
        assert!(!grant.granted);
        assert!(grant.attributes.is_empty());
    }

    #[test]
    fn delete_mirrors_update() {
        let student_delete =
            table().evaluate(Role::Student, Resource::Order, Action::Delete, Scope::Own);
        assert!(student_delete.granted);
        assert!(student_delete.attributes.is_empty());

        let news_delete = table().evaluate(Role::Student, Resource::News, Action::Delete, Scope::Own);
        assert!(!news_delete.granted);
    }

    #[test]
    fn wildcard_entries_survive_loading() {
        let grant = table().evaluate(
            Role::SuperAdmin,
            Resource::ChangeResourceStatus,
            Action::Update,
            Scope::Any,
        );
        assert!(grant.granted);
        assert!(grant.attributes.is_wildcard());

        let student = table().evaluate(
            Role::Student,
            Resource::ChangeResourceStatus,
            Action::Update,
            Scope::Own,
        );
        assert!(!student.granted);
    }

    #[test]
    fn admin_may_change_order_status() {
        let grant = table().evaluate(
            Role::Admin,
            Resource::ChangeResourceStatus,
            Action::Update,
            Scope::Any,
        );
        assert!(grant.granted);
    }

    #[test]
    fn roles_without_scope_are_rejected_at_load() {
        let doc = r#"{
            "roleScopes": {"student": "own"},
            "resources": {"News": {"registrar": {"canRead": ["message"]}}}
        }"#;
        assert!(matches!(
            PolicyTable::from_json(doc),
            Err(PolicyError::MissingScope(role)) if role == "registrar"
        ));
    }

    #[test]
    fn missing_lists_default_to_no_access() {
        let doc = r#"{
            "roleScopes": {"student": "own"},
            "resources": {"News": {"student": {"canRead": ["message"]}}}
        }"#;
        let table = PolicyTable::from_json(doc).unwrap();
        assert!(table.evaluate(Role::Student, "News", Action::Read, Scope::Own).granted);
        assert!(!table.evaluate(Role::Student, "News", Action::Update, Scope::Own).granted);
    }

    proptest! {
        #[test]
        fn unknown_resources_are_always_denied(name in "[a-z]{1,12}Thing", any_scope in any::<bool>()) {
            let scope = if any_scope { Scope::Any } else { Scope::Own };
            for role in [Role::Student, Role::Admin, Role::SuperAdmin] {
                for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
                    let grant = table().evaluate(role, name.as_str(), action, scope);
                    prop_assert!(!grant.granted);
                    prop_assert!(grant.attributes.is_empty());
                }
            }
        }

        #[test]
        fn unknown_roles_are_always_denied(role in "[A-Z][a-z]{2,10}") {
            for resource in ["Order", "Cart", "Service", "News"] {
                let grant = table().evaluate_named(&role, resource, Action::Read, Scope::Own);
                prop_assert!(!grant.granted);
            }
        }
    }
}
