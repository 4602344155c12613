use std::collections::BTreeSet;

use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Wildcard entry: every field of the entity, resolved at filter time.
pub const WILDCARD: &str = "*";

/// What the caller wants to do with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Action::Read),
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            _ => Err(()),
        }
    }
}

/// Ownership scope of a grant.
///
/// `Any` covers `Own`: a role allowed to touch every record may also touch
/// its own. The engine never applies the ownership predicate itself; callers
/// holding only `Own` must constrain their queries to the principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Own,
    Any,
}

impl Scope {
    pub fn covers(self, requested: Scope) -> bool {
        matches!((self, requested), (Scope::Any, _) | (Scope::Own, Scope::Own))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Own => "own",
            Scope::Any => "any",
        }
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field allowlist for one (resource, role, action) entry.
///
/// An empty set means *no* access, never "all fields".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct AttributeSet {
    fields: BTreeSet<String>,
}

impl AttributeSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self::from_fields([WILDCARD])
    }

    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn is_wildcard(&self) -> bool {
        self.fields.contains(WILDCARD)
    }

    pub fn allows(&self, field: &str) -> bool {
        self.is_wildcard() || self.fields.contains(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for AttributeSet {
    fn from(value: Vec<String>) -> Self {
        Self::from_fields(value)
    }
}

impl From<AttributeSet> for Vec<String> {
    fn from(value: AttributeSet) -> Self {
        value.fields.into_iter().collect()
    }
}

/// Outcome of a permission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    pub granted: bool,
    pub attributes: AttributeSet,
}

impl Grant {
    pub fn denied() -> Self {
        Self {
            granted: false,
            attributes: AttributeSet::none(),
        }
    }

    /// Granted iff the allowlist is non-empty.
    pub fn from_attributes(attributes: &AttributeSet) -> Self {
        if attributes.is_empty() {
            Self::denied()
        } else {
            Self {
                granted: true,
                attributes: attributes.clone(),
            }
        }
    }

    /// A presence-only grant (used for delete, which has no field list).
    pub fn presence() -> Self {
        Self {
            granted: true,
            attributes: AttributeSet::none(),
        }
    }
}
