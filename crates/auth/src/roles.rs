use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Access tier of an authenticated principal.
///
/// The set is closed; every permission lookup is keyed by one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Student,
    Admin,
    SuperAdmin,
}

/// Institutional user type that never qualifies for staff access.
const STUDENT_USER_TYPE: &str = "STUDENT";
/// Institutional status code of staff in active service.
const IN_SERVICE_STATUS: &str = "U";

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
            Role::SuperAdmin => "superAdmin",
        }
    }

    /// Role a user acts under for the session they are signing in to.
    ///
    /// `superAdmin` is stored and kept as is. Everyone else is re-derived from
    /// the institutional record: non-students in service act as `admin`, the
    /// rest as `student`.
    pub fn at_sign_in(
        stored: Role,
        institutional_type: Option<&str>,
        institutional_status: Option<&str>,
    ) -> Role {
        if stored == Role::SuperAdmin {
            return Role::SuperAdmin;
        }

        let non_student = institutional_type != Some(STUDENT_USER_TYPE);
        if non_student && institutional_status == Some(IN_SERVICE_STATUS) {
            Role::Admin
        } else {
            Role::Student
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            "superAdmin" => Ok(Role::SuperAdmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);
