use serde::Serialize;
use thiserror::Error;

use crate::permissions::{Action, Grant, Scope};
use crate::policy::PolicyTable;
use crate::roles::Role;
use crate::Principal;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: {role} may not {action} {resource}")]
    Forbidden {
        role: Role,
        action: Action,
        resource: String,
    },
}

impl AuthzError {
    fn forbidden(principal: &Principal, action: Action, resource: &str) -> Self {
        AuthzError::Forbidden {
            role: principal.role,
            action,
            resource: resource.to_string(),
        }
    }
}

/// A granted permission together with the scope it was granted at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopedGrant {
    pub scope: Scope,
    pub grant: Grant,
}

impl ScopedGrant {
    /// True when the caller is restricted to records they own.
    pub fn is_own_only(&self) -> bool {
        self.scope == Scope::Own
    }
}

/// Require a grant at exactly `scope`.
///
/// - No IO
/// - No panics
/// - A denial is reported, never downgraded to a narrower scope
pub fn authorize(
    policy: &PolicyTable,
    principal: &Principal,
    resource: impl AsRef<str>,
    action: Action,
    scope: Scope,
) -> Result<Grant, AuthzError> {
    let resource = resource.as_ref();
    let grant = policy.evaluate(principal.role, resource, action, scope);
    if grant.granted {
        Ok(grant)
    } else {
        tracing::debug!(
            role = %principal.role,
            %action,
            %scope,
            resource,
            "permission denied"
        );
        Err(AuthzError::forbidden(principal, action, resource))
    }
}

/// Resolve the widest grant the caller holds: `any` first, then `own`.
///
/// Callers receiving an `own` grant must add the ownership predicate to
/// whatever they query next.
pub fn authorize_widest(
    policy: &PolicyTable,
    principal: &Principal,
    resource: impl AsRef<str>,
    action: Action,
) -> Result<ScopedGrant, AuthzError> {
    let resource = resource.as_ref();
    for scope in [Scope::Any, Scope::Own] {
        let grant = policy.evaluate(principal.role, resource, action, scope);
        if grant.granted {
            return Ok(ScopedGrant { scope, grant });
        }
    }
    Err(AuthzError::forbidden(principal, action, resource))
}
