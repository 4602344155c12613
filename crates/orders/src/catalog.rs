//! Service catalog and the cost model built on it.
//!
//! Costing never fails a request: a [`CostError`] is recorded on the order
//! as a validity error and the order drops to `invalidOrder`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use campusdesk_core::{DomainError, DomainResult, Entity, InstituteId, ParameterId, ServiceId};

/// List entry that admits every value of an eligibility attribute.
pub const ANY_VALUE: &str = "*";

/// A requestable administrative service (transcript copy, bonafide letter, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(rename = "_id")]
    pub id: ServiceId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
    #[serde(default)]
    pub is_special_service: bool,
    #[serde(default)]
    pub special_service_users: Vec<InstituteId>,
    pub max_units: i64,
    pub base_charge: u64,
    /// Parameters this service accepts. `None` accepts any active parameter.
    #[serde(default)]
    pub available_parameters: Option<Vec<ParameterId>>,
    #[serde(default)]
    pub allowed_batches: Vec<String>,
    #[serde(default)]
    pub allowed_programmes: Vec<String>,
    #[serde(default)]
    pub allowed_user_status: Vec<String>,
    #[serde(default)]
    pub collection_types: Vec<String>,
    #[serde(default)]
    pub available_payment_modes: Vec<String>,
    pub created_on: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<InstituteId>,
}

/// Catalog edit from an administrator. Absent fields are left alone; on
/// create, `name`, `maxUnits` and `baseCharge` are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_special_service: Option<bool>,
    #[serde(default)]
    pub special_service_users: Option<Vec<InstituteId>>,
    #[serde(default)]
    pub max_units: Option<i64>,
    #[serde(default)]
    pub base_charge: Option<u64>,
    #[serde(default)]
    pub available_parameters: Option<Vec<ParameterId>>,
    #[serde(default)]
    pub allowed_batches: Option<Vec<String>>,
    #[serde(default)]
    pub allowed_programmes: Option<Vec<String>>,
    #[serde(default)]
    pub allowed_user_status: Option<Vec<String>>,
    #[serde(default)]
    pub collection_types: Option<Vec<String>>,
    #[serde(default)]
    pub available_payment_modes: Option<Vec<String>>,
}

impl ServiceChanges {
    pub fn touched_fields(&self) -> Vec<&'static str> {
        [
            ("name", self.name.is_some()),
            ("description", self.description.is_some()),
            ("isActive", self.is_active.is_some()),
            ("isSpecialService", self.is_special_service.is_some()),
            ("specialServiceUsers", self.special_service_users.is_some()),
            ("maxUnits", self.max_units.is_some()),
            ("baseCharge", self.base_charge.is_some()),
            ("availableParameters", self.available_parameters.is_some()),
            ("allowedBatches", self.allowed_batches.is_some()),
            ("allowedProgrammes", self.allowed_programmes.is_some()),
            ("allowedUserStatus", self.allowed_user_status.is_some()),
            ("collectionTypes", self.collection_types.is_some()),
            ("availablePaymentModes", self.available_payment_modes.is_some()),
        ]
        .into_iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| name)
        .collect()
    }

    fn check(&self) -> DomainResult<()> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DomainError::validation("service name must not be empty"));
        }
        if let Some(max) = self.max_units {
            if max < 1 {
                return Err(DomainError::validation(format!(
                    "maxUnits must be at least 1 (got {max})"
                )));
            }
        }
        Ok(())
    }
}

/// Optional add-on charged per unit on top of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    #[serde(rename = "_id")]
    pub id: ParameterId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_charge: u64,
    pub is_active: bool,
    pub created_on: DateTime<Utc>,
}

pub type ParameterCatalog = HashMap<ParameterId, Parameter>;

impl Entity for Service {
    type Id = ServiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Entity for Parameter {
    type Id = ParameterId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Institutional attributes of a user, as synced from the student/staff
/// directory. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionalProfile {
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub user_status: Option<String>,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub programme: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// The person an order is costed for.
#[derive(Debug, Clone, Copy)]
pub struct Requester<'a> {
    pub institute_id: &'a InstituteId,
    pub profile: &'a InstitutionalProfile,
}

impl<'a> Requester<'a> {
    pub fn new(institute_id: &'a InstituteId, profile: &'a InstitutionalProfile) -> Self {
        Self {
            institute_id,
            profile,
        }
    }
}

/// Why an order cannot be costed. The message is what ends up in
/// `validityErrors`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CostError {
    #[error("service is no longer available")]
    ServiceMissing,

    #[error("service '{0}' is not active")]
    ServiceInactive(String),

    #[error("requested units must be between 1 and {max} (got {requested})")]
    UnitsOutOfRange { requested: i64, max: i64 },

    #[error("service '{0}' is not offered to your batch, programme or status")]
    NotEligible(String),

    #[error("service '{0}' is only available to invited users")]
    NotInvited(String),

    #[error("parameter {0} does not exist")]
    ParameterMissing(ParameterId),

    #[error("parameter '{0}' is not active")]
    ParameterInactive(String),

    #[error("parameter '{0}' cannot be used with this service")]
    ParameterNotOffered(String),
}

/// Unset user attribute, empty constraint list or a `*` entry all pass.
fn admits(allowed: &[String], value: Option<&str>) -> bool {
    let Some(value) = value else {
        return true;
    };
    allowed.is_empty() || allowed.iter().any(|a| a == ANY_VALUE || a == value)
}

impl Service {
    /// Batch, programme and user-status predicates.
    pub fn is_eligible(&self, profile: &InstitutionalProfile) -> bool {
        admits(&self.allowed_batches, profile.batch.as_deref())
            && admits(&self.allowed_programmes, profile.programme.as_deref())
            && admits(&self.allowed_user_status, profile.user_status.as_deref())
    }

    pub fn is_invited(&self, user: &InstituteId) -> bool {
        self.special_service_users.iter().any(|u| u == user)
    }

    /// Catalog visibility for listings.
    ///
    /// `see_inactive` and `see_special` come from the caller's grants on the
    /// synthetic `InActiveResource` / `SpecialService` resources.
    pub fn is_visible_to(&self, user: &InstituteId, see_inactive: bool, see_special: bool) -> bool {
        (self.is_active || see_inactive)
            && (!self.is_special_service || see_special || self.is_invited(user))
    }

    /// Build a new catalog entry. New services are active unless the
    /// changes say otherwise.
    pub fn create(
        changes: ServiceChanges,
        by: InstituteId,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        changes.check()?;
        let (Some(name), Some(max_units), Some(base_charge)) =
            (changes.name, changes.max_units, changes.base_charge)
        else {
            return Err(DomainError::validation(
                "name, maxUnits and baseCharge are required",
            ));
        };
        Ok(Self {
            id: ServiceId::new(),
            name: name.trim().to_string(),
            description: changes.description.unwrap_or_default(),
            is_active: changes.is_active.unwrap_or(true),
            is_special_service: changes.is_special_service.unwrap_or(false),
            special_service_users: changes.special_service_users.unwrap_or_default(),
            max_units,
            base_charge,
            available_parameters: changes.available_parameters,
            allowed_batches: changes.allowed_batches.unwrap_or_default(),
            allowed_programmes: changes.allowed_programmes.unwrap_or_default(),
            allowed_user_status: changes.allowed_user_status.unwrap_or_default(),
            collection_types: changes.collection_types.unwrap_or_default(),
            available_payment_modes: changes.available_payment_modes.unwrap_or_default(),
            created_on: at,
            created_by: Some(by),
        })
    }

    /// Apply an edit. Nothing changes when the edit is rejected.
    pub fn apply(&mut self, changes: ServiceChanges) -> DomainResult<()> {
        changes.check()?;
        if let Some(name) = changes.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(is_active) = changes.is_active {
            self.is_active = is_active;
        }
        if let Some(special) = changes.is_special_service {
            self.is_special_service = special;
        }
        if let Some(users) = changes.special_service_users {
            self.special_service_users = users;
        }
        if let Some(max_units) = changes.max_units {
            self.max_units = max_units;
        }
        if let Some(base_charge) = changes.base_charge {
            self.base_charge = base_charge;
        }
        if let Some(parameters) = changes.available_parameters {
            self.available_parameters = Some(parameters);
        }
        if let Some(batches) = changes.allowed_batches {
            self.allowed_batches = batches;
        }
        if let Some(programmes) = changes.allowed_programmes {
            self.allowed_programmes = programmes;
        }
        if let Some(statuses) = changes.allowed_user_status {
            self.allowed_user_status = statuses;
        }
        if let Some(types) = changes.collection_types {
            self.collection_types = types;
        }
        if let Some(modes) = changes.available_payment_modes {
            self.available_payment_modes = modes;
        }
        Ok(())
    }

    /// `units × baseCharge`, or the first reason the requester may not order it.
    pub fn cost(&self, units: i64, requester: Requester<'_>) -> Result<u64, CostError> {
        if self.is_special_service && !self.is_invited(requester.institute_id) {
            return Err(CostError::NotInvited(self.name.clone()));
        }
        if !self.is_eligible(requester.profile) {
            return Err(CostError::NotEligible(self.name.clone()));
        }
        if !self.is_active {
            return Err(CostError::ServiceInactive(self.name.clone()));
        }
        if units <= 0 || units > self.max_units {
            return Err(CostError::UnitsOutOfRange {
                requested: units,
                max: self.max_units,
            });
        }
        Ok((units as u64).saturating_mul(self.base_charge))
    }

    /// `units × Σ parameter.baseCharge` over the requested parameters.
    pub fn parameter_cost(
        &self,
        requested: &[ParameterId],
        units: i64,
        catalog: &ParameterCatalog,
    ) -> Result<u64, CostError> {
        let mut sum: u64 = 0;
        for id in requested {
            let parameter = catalog.get(id).ok_or(CostError::ParameterMissing(*id))?;
            if !parameter.is_active {
                return Err(CostError::ParameterInactive(parameter.name.clone()));
            }
            let offered = self
                .available_parameters
                .as_ref()
                .is_none_or(|offered| offered.contains(id));
            if !offered {
                return Err(CostError::ParameterNotOffered(parameter.name.clone()));
            }
            sum = sum.saturating_add(parameter.base_charge);
        }
        Ok(sum.saturating_mul(units.max(0) as u64))
    }
}
