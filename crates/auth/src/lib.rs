//! `campusdesk-auth`: attribute-level access control.
//!
//! Decoupled from HTTP and storage: a static policy table answers
//! "may this role do this to that resource, and which fields may it see",
//! and [`filter`] shapes entities down to that answer.

pub mod authorize;
pub mod claims;
pub mod filter;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod resource;
pub mod roles;

pub use authorize::{authorize, authorize_widest, AuthzError, ScopedGrant};
pub use claims::{validate_claims, Claims, TokenValidationError};
pub use filter::{filter, filter_entity};
pub use permissions::{Action, AttributeSet, Grant, Scope, WILDCARD};
pub use policy::{PolicyError, PolicyTable, RoleLists};
pub use principal::Principal;
pub use resource::Resource;
pub use roles::{Role, UnknownRole};
