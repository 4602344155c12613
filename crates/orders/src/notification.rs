//! In-app notifications raised by status transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campusdesk_core::{Entity, InstituteId, NotificationId};

use crate::cart::CartStatus;
use crate::order::OrderStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: NotificationId,
    pub recipient: InstituteId,
    pub created_by: InstituteId,
    pub message: String,
    pub is_read: bool,
    pub created_on: DateTime<Utc>,
}

impl Entity for Notification {
    type Id = NotificationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Notification {
    pub fn new(
        recipient: InstituteId,
        created_by: InstituteId,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            recipient,
            created_by,
            message: message.into(),
            is_read: false,
            created_on: at,
        }
    }
}

pub fn order_status_notification(
    recipient: InstituteId,
    actor: InstituteId,
    service_name: &str,
    status: OrderStatus,
    at: DateTime<Utc>,
) -> Notification {
    let message = format!("Your order for {service_name} is {}.", status.label());
    Notification::new(recipient, actor, message, at)
}

pub fn cart_status_notification(
    recipient: InstituteId,
    actor: InstituteId,
    order_count: usize,
    status: CartStatus,
    at: DateTime<Utc>,
) -> Notification {
    let noun = if order_count == 1 { "order" } else { "orders" };
    let message = format!("Your cart with {order_count} {noun} is {}.", status.label());
    Notification::new(recipient, actor, message, at)
}
