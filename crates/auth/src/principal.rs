use serde::{Deserialize, Serialize};

use campusdesk_core::InstituteId;

use crate::Role;

/// An authenticated caller: who they are and which tier they act under.
///
/// Construction is left to the transport layer (token → user record → role
/// derivation); the access engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub institute_id: InstituteId,
    pub role: Role,
}

impl Principal {
    pub fn new(institute_id: InstituteId, role: Role) -> Self {
        Self { institute_id, role }
    }

    /// Ownership predicate applied by callers holding only an `own` grant.
    pub fn owns(&self, owner: &InstituteId) -> bool {
        &self.institute_id == owner
    }
}
