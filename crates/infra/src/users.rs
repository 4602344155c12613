//! Stored user accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campusdesk_auth::{Principal, Role};
use campusdesk_core::{CartId, InstituteId};
use campusdesk_orders::InstitutionalProfile;

use crate::store::Document;

/// A user as persisted: the stored role plus the institutional profile the
/// session role is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(rename = "_id")]
    pub institute_id: InstituteId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub cart_id: CartId,
    #[serde(default)]
    pub profile: InstitutionalProfile,
    pub is_active: bool,
    pub created_on: DateTime<Utc>,
}

impl UserRecord {
    /// Role and identity for a session, re-derived on every sign-in.
    pub fn principal(&self) -> Principal {
        let role = Role::at_sign_in(
            self.role,
            self.profile.user_type.as_deref(),
            self.profile.user_status.as_deref(),
        );
        Principal::new(self.institute_id.clone(), role)
    }
}

impl Document for UserRecord {
    type Key = InstituteId;
    const COLLECTION: &'static str = "users";

    fn key(&self) -> InstituteId {
        self.institute_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(user_type: &str, status: &str) -> UserRecord {
        UserRecord {
            institute_id: InstituteId::new("E1042"),
            name: "R. Iyer".into(),
            email: "riyer@campus.example".into(),
            role: Role::Student,
            cart_id: CartId::new(),
            profile: InstitutionalProfile {
                user_type: Some(user_type.into()),
                user_status: Some(status.into()),
                ..InstitutionalProfile::default()
            },
            is_active: true,
            created_on: Utc::now(),
        }
    }

    #[test]
    fn in_service_staff_act_as_admin() {
        assert_eq!(user("STAFF", "U").principal().role, Role::Admin);
        assert_eq!(user("STAFF", "R").principal().role, Role::Student);
        assert_eq!(user("STUDENT", "U").principal().role, Role::Student);
    }
}
