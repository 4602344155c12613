//! Delivery (courier) and pickup (collector) records linked to a cart.
//!
//! Only their status matters here: cancelling a cart cancels the linked
//! record so the dispatch desk stops acting on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campusdesk_core::{CollectorId, CourierId, Entity, InstituteId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HandoffStatus {
    Active,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Courier {
    #[serde(rename = "_id")]
    pub id: CourierId,
    pub requested_by: InstituteId,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub contact: Option<String>,
    pub status: HandoffStatus,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collector {
    #[serde(rename = "_id")]
    pub id: CollectorId,
    pub requested_by: InstituteId,
    pub name: String,
    #[serde(default)]
    pub contact: Option<String>,
    pub status: HandoffStatus,
    pub last_modified: DateTime<Utc>,
}

impl Courier {
    /// Returns false when it was already cancelled.
    pub fn cancel(&mut self, at: DateTime<Utc>) -> bool {
        if self.status == HandoffStatus::Cancelled {
            return false;
        }
        self.status = HandoffStatus::Cancelled;
        self.last_modified = at;
        true
    }
}

impl Collector {
    pub fn cancel(&mut self, at: DateTime<Utc>) -> bool {
        if self.status == HandoffStatus::Cancelled {
            return false;
        }
        self.status = HandoffStatus::Cancelled;
        self.last_modified = at;
        true
    }
}

impl Entity for Courier {
    type Id = CourierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Entity for Collector {
    type Id = CollectorId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
