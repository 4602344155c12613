//! Read-only audit copies written when a cart is placed.
//!
//! The ledger is never edited by users. Only cancellations are mirrored onto
//! it so the audit trail shows why a placed order did not complete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campusdesk_core::{AggregateRoot, CartId, Entity, InstituteId, OrderId, ServiceId};

use crate::cart::{Cart, CartStatus};
use crate::order::{Order, OrderStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    #[serde(rename = "_id")]
    pub order_id: OrderId,
    pub cart_id: CartId,
    pub requested_by: InstituteId,
    pub service: ServiceId,
    pub service_name: String,
    pub units_requested: i64,
    pub total_cost: u64,
    pub status: OrderStatus,
    pub cancel_reason: Option<String>,
    pub placed_on: DateTime<Utc>,
}

impl PlacedOrder {
    pub fn of(order: &Order, placed_on: DateTime<Utc>) -> Self {
        Self {
            order_id: *order.id(),
            cart_id: order.cart_id(),
            requested_by: order.requested_by().clone(),
            service: order.service(),
            service_name: order.service_name().to_string(),
            units_requested: order.units_requested(),
            total_cost: order.total_cost(),
            status: OrderStatus::Placed,
            cancel_reason: None,
            placed_on,
        }
    }

    pub fn mirror_cancel(&mut self, reason: Option<&str>) {
        self.status = OrderStatus::Cancelled;
        self.cancel_reason = reason.map(str::to_string);
    }
}

impl Entity for PlacedOrder {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.order_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedCart {
    #[serde(rename = "_id")]
    pub cart_id: CartId,
    pub requested_by: InstituteId,
    pub orders: Vec<OrderId>,
    pub total_cost: u64,
    pub status: CartStatus,
    pub cancel_reason: Option<String>,
    pub placed_on: DateTime<Utc>,
}

impl PlacedCart {
    pub fn of(cart: &Cart, placed_on: DateTime<Utc>) -> Self {
        Self {
            cart_id: *cart.id(),
            requested_by: cart.requested_by().clone(),
            orders: cart.orders().to_vec(),
            total_cost: cart.total_cost(),
            status: CartStatus::Placed,
            cancel_reason: None,
            placed_on,
        }
    }

    pub fn mirror_cancel(&mut self, reason: Option<&str>) {
        self.status = CartStatus::Cancelled;
        self.cancel_reason = reason.map(str::to_string);
    }
}

impl Entity for PlacedCart {
    type Id = CartId;

    fn id(&self) -> &Self::Id {
        &self.cart_id
    }
}
