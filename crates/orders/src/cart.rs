use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campusdesk_core::{
    Aggregate, AggregateRoot, CartId, CollectorId, CourierId, DomainError, InstituteId, OrderId,
};
use campusdesk_events::Event;

use crate::order::{OrderStatus, StatusStamp};

pub const ALL_ORDERS_CANCELLED: &str = "All orders cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CartStatus {
    Unplaced,
    Placed,
    Processing,
    ReadyToDeliver,
    ReadyToPickup,
    Completed,
    Cancelled,
}

impl CartStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CartStatus::Unplaced => "unplaced",
            CartStatus::Placed => "placed",
            CartStatus::Processing => "processing",
            CartStatus::ReadyToDeliver => "readyToDeliver",
            CartStatus::ReadyToPickup => "readyToPickup",
            CartStatus::Completed => "completed",
            CartStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CartStatus::Unplaced => "not yet placed",
            CartStatus::Placed => "placed",
            CartStatus::Processing => "being processed",
            CartStatus::ReadyToDeliver => "ready for delivery",
            CartStatus::ReadyToPickup => "ready for pickup",
            CartStatus::Completed => "completed",
            CartStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_ready(self) -> bool {
        matches!(self, CartStatus::ReadyToDeliver | CartStatus::ReadyToPickup)
    }

    /// A new cycle starts when an order is added in one of these.
    pub fn is_terminal(self) -> bool {
        matches!(self, CartStatus::Completed | CartStatus::Cancelled)
    }
}

impl core::fmt::Display for CartStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a ready cart leaves the office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectionCategory {
    Delivery,
    Pickup,
}

/// Owner edits to payment and collection details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CartPatch {
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub is_payment_done: Option<bool>,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub collection_type: Option<String>,
    #[serde(default)]
    pub delivery: Option<CourierId>,
    #[serde(default)]
    pub pickup: Option<CollectorId>,
}

impl CartPatch {
    pub fn touched_fields(&self) -> Vec<&'static str> {
        [
            ("paymentType", self.payment_type.is_some()),
            ("isPaymentDone", self.is_payment_done.is_some()),
            ("paymentId", self.payment_id.is_some()),
            ("collectionType", self.collection_type.is_some()),
            ("delivery", self.delivery.is_some()),
            ("pickup", self.pickup.is_some()),
        ]
        .into_iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| name)
        .collect()
    }
}

/// A user's cart: the aggregate root over their orders. Created with the
/// account and never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(rename = "_id")]
    id: CartId,
    requested_by: InstituteId,
    orders: Vec<OrderId>,
    status: CartStatus,
    status_change_time: BTreeMap<String, StatusStamp>,
    orders_cost: u64,
    total_cost: u64,
    collection_type: Option<String>,
    collection_type_category: Option<CollectionCategory>,
    delivery: Option<CourierId>,
    pickup: Option<CollectorId>,
    payment_type: Option<String>,
    is_payment_done: bool,
    payment_id: Option<String>,
    cancel_reason: Option<String>,
    created_on: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    last_modified_by: InstituteId,
    version: u64,
}

impl Cart {
    pub fn new(id: CartId, owner: InstituteId, at: DateTime<Utc>) -> Self {
        Self {
            id,
            requested_by: owner.clone(),
            orders: Vec::new(),
            status: CartStatus::Unplaced,
            status_change_time: BTreeMap::new(),
            orders_cost: 0,
            total_cost: 0,
            collection_type: None,
            collection_type_category: None,
            delivery: None,
            pickup: None,
            payment_type: None,
            is_payment_done: false,
            payment_id: None,
            cancel_reason: None,
            created_on: at,
            last_modified: at,
            last_modified_by: owner,
            version: 0,
        }
    }

    pub fn requested_by(&self) -> &InstituteId {
        &self.requested_by
    }

    pub fn orders(&self) -> &[OrderId] {
        &self.orders
    }

    pub fn status(&self) -> CartStatus {
        self.status
    }

    pub fn stamp(&self, status: CartStatus) -> Option<&StatusStamp> {
        self.status_change_time.get(status.as_str())
    }

    pub fn orders_cost(&self) -> u64 {
        self.orders_cost
    }

    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }

    pub fn collection_category(&self) -> Option<CollectionCategory> {
        self.collection_type_category
    }

    pub fn delivery(&self) -> Option<CourierId> {
        self.delivery
    }

    pub fn pickup(&self) -> Option<CollectorId> {
        self.pickup
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Ready status for the chosen collection method. Carts without an
    /// explicit delivery choice are picked up.
    pub fn ready_status(&self) -> CartStatus {
        match self.collection_type_category {
            Some(CollectionCategory::Delivery) => CartStatus::ReadyToDeliver,
            _ => CartStatus::ReadyToPickup,
        }
    }
}

/// Status a cart should hold given its members, if the members force one.
///
/// All cancelled wins over all ready; "ready" needs at least one member that
/// is actually ready.
pub fn derived_status(cart: &Cart, members: &[OrderStatus]) -> Option<CartStatus> {
    if members.is_empty() {
        return None;
    }
    if members.iter().all(|s| *s == OrderStatus::Cancelled) {
        return Some(CartStatus::Cancelled);
    }
    let settled = members
        .iter()
        .all(|s| matches!(s, OrderStatus::Ready | OrderStatus::Cancelled));
    let any_ready = members.contains(&OrderStatus::Ready);
    (settled && any_ready).then(|| cart.ready_status())
}

impl AggregateRoot for Cart {
    type Id = CartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOrderToCart {
    pub order_id: OrderId,
    pub actor: InstituteId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveOrderFromCart {
    pub order_id: OrderId,
    pub actor: InstituteId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseCart {
    pub actor: InstituteId,
    pub patch: CartPatch,
    pub occurred_at: DateTime<Utc>,
}

/// Submit the cart. `members` are the statuses of its orders and
/// `orders_cost` their summed total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceCart {
    pub actor: InstituteId,
    pub members: Vec<OrderStatus>,
    pub orders_cost: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceCart {
    pub actor: InstituteId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelCart {
    pub actor: InstituteId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Re-derive the cart status from member statuses read after an order write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeCart {
    pub members: Vec<OrderStatus>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartCommand {
    AddOrder(AddOrderToCart),
    RemoveOrder(RemoveOrderFromCart),
    Revise(ReviseCart),
    Place(PlaceCart),
    Accept(AdvanceCart),
    /// An order left `onHold`; the cart is back in processing.
    Resume(AdvanceCart),
    Complete(AdvanceCart),
    Cancel(CancelCart),
    Recompute(RecomputeCart),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAdded {
    pub cart_id: CartId,
    pub order_id: OrderId,
    /// The cart was terminal and starts a fresh cycle with this order.
    pub reset: bool,
    pub actor: InstituteId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRemoved {
    pub cart_id: CartId,
    pub order_id: OrderId,
    pub actor: InstituteId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartRevised {
    pub cart_id: CartId,
    pub patch: CartPatch,
    pub actor: InstituteId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartStatusChanged {
    pub cart_id: CartId,
    pub actor: InstituteId,
    pub from: CartStatus,
    pub to: CartStatus,
    pub reason: Option<String>,
    /// Set on placement only.
    pub orders_cost: Option<u64>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartEvent {
    OrderAdded(OrderAdded),
    OrderRemoved(OrderRemoved),
    Revised(CartRevised),
    StatusChanged(CartStatusChanged),
}

impl CartEvent {
    pub fn status_change(&self) -> Option<&CartStatusChanged> {
        match self {
            CartEvent::StatusChanged(e) => Some(e),
            _ => None,
        }
    }
}

impl Event for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::OrderAdded(_) => "cart.order_added",
            CartEvent::OrderRemoved(_) => "cart.order_removed",
            CartEvent::Revised(_) => "cart.revised",
            CartEvent::StatusChanged(_) => "cart.status_changed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CartEvent::OrderAdded(e) => e.occurred_at,
            CartEvent::OrderRemoved(e) => e.occurred_at,
            CartEvent::Revised(e) => e.occurred_at,
            CartEvent::StatusChanged(e) => e.occurred_at,
        }
    }

    fn actor(&self) -> &InstituteId {
        match self {
            CartEvent::OrderAdded(e) => &e.actor,
            CartEvent::OrderRemoved(e) => &e.actor,
            CartEvent::Revised(e) => &e.actor,
            CartEvent::StatusChanged(e) => &e.actor,
        }
    }
}

impl Aggregate for Cart {
    type Command = CartCommand;
    type Event = CartEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CartEvent::OrderAdded(e) => {
                if e.reset {
                    self.orders.clear();
                    self.status = CartStatus::Unplaced;
                    self.status_change_time.clear();
                    self.cancel_reason = None;
                    self.orders_cost = 0;
                    self.total_cost = 0;
                    self.is_payment_done = false;
                    self.payment_id = None;
                }
                self.orders.push(e.order_id);
                self.touch(&e.actor, e.occurred_at);
            }
            CartEvent::OrderRemoved(e) => {
                self.orders.retain(|id| *id != e.order_id);
                self.touch(&e.actor, e.occurred_at);
            }
            CartEvent::Revised(e) => {
                let p = &e.patch;
                if let Some(payment_type) = &p.payment_type {
                    self.payment_type = Some(payment_type.clone());
                }
                if let Some(done) = p.is_payment_done {
                    self.is_payment_done = done;
                }
                if let Some(payment_id) = &p.payment_id {
                    self.payment_id = Some(payment_id.clone());
                }
                if let Some(collection_type) = &p.collection_type {
                    self.collection_type = Some(collection_type.clone());
                }
                if let Some(delivery) = p.delivery {
                    self.delivery = Some(delivery);
                    self.pickup = None;
                    self.collection_type_category = Some(CollectionCategory::Delivery);
                }
                if let Some(pickup) = p.pickup {
                    self.pickup = Some(pickup);
                    self.delivery = None;
                    self.collection_type_category = Some(CollectionCategory::Pickup);
                }
                self.touch(&e.actor, e.occurred_at);
            }
            CartEvent::StatusChanged(e) => {
                self.status = e.to;
                self.status_change_time.insert(
                    e.to.as_str().to_string(),
                    StatusStamp {
                        time: e.occurred_at,
                        by: e.actor.clone(),
                    },
                );
                if let Some(cost) = e.orders_cost {
                    self.orders_cost = cost;
                    self.total_cost = cost;
                }
                if e.to == CartStatus::Cancelled {
                    self.cancel_reason = e.reason.clone();
                }
                self.touch(&e.actor, e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CartCommand::AddOrder(cmd) => self.handle_add_order(cmd),
            CartCommand::RemoveOrder(cmd) => self.handle_remove_order(cmd),
            CartCommand::Revise(cmd) => self.handle_revise(cmd),
            CartCommand::Place(cmd) => self.handle_place(cmd),
            CartCommand::Accept(cmd) => self.handle_accept(cmd),
            CartCommand::Resume(cmd) => self.handle_resume(cmd),
            CartCommand::Complete(cmd) => self.handle_complete(cmd),
            CartCommand::Cancel(cmd) => self.handle_cancel(cmd),
            CartCommand::Recompute(cmd) => Ok(self.handle_recompute(cmd)),
        }
    }
}

impl Cart {
    fn touch(&mut self, actor: &InstituteId, at: DateTime<Utc>) {
        self.last_modified = at;
        self.last_modified_by = actor.clone();
    }

    fn status_changed(
        &self,
        actor: &InstituteId,
        to: CartStatus,
        at: DateTime<Utc>,
    ) -> CartStatusChanged {
        CartStatusChanged {
            cart_id: self.id,
            actor: actor.clone(),
            from: self.status,
            to,
            reason: None,
            orders_cost: None,
            occurred_at: at,
        }
    }

    fn ensure_owner(&self, actor: &InstituteId) -> Result<(), DomainError> {
        if actor != &self.requested_by {
            return Err(DomainError::Unauthorized);
        }
        Ok(())
    }

    fn handle_add_order(&self, cmd: &AddOrderToCart) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_owner(&cmd.actor)?;
        let reset = match self.status {
            CartStatus::Unplaced => false,
            s if s.is_terminal() => true,
            s => {
                return Err(DomainError::invalid_transition(format!(
                    "your cart is {}; new orders can be added once it is completed",
                    s.label()
                )));
            }
        };
        if !reset && self.orders.contains(&cmd.order_id) {
            return Err(DomainError::conflict("order is already in the cart"));
        }
        Ok(vec![CartEvent::OrderAdded(OrderAdded {
            cart_id: self.id,
            order_id: cmd.order_id,
            reset,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_order(
        &self,
        cmd: &RemoveOrderFromCart,
    ) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_owner(&cmd.actor)?;
        if !self.orders.contains(&cmd.order_id) {
            return Ok(Vec::new());
        }
        Ok(vec![CartEvent::OrderRemoved(OrderRemoved {
            cart_id: self.id,
            order_id: cmd.order_id,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revise(&self, cmd: &ReviseCart) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_owner(&cmd.actor)?;
        if self.status != CartStatus::Unplaced {
            return Err(DomainError::invalid_transition(format!(
                "a {} cart can no longer be modified",
                self.status
            )));
        }
        if cmd.patch.delivery.is_some() && cmd.patch.pickup.is_some() {
            return Err(DomainError::validation(
                "choose either delivery or pickup, not both",
            ));
        }
        Ok(vec![CartEvent::Revised(CartRevised {
            cart_id: self.id,
            patch: cmd.patch.clone(),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_place(&self, cmd: &PlaceCart) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_owner(&cmd.actor)?;
        if self.status != CartStatus::Unplaced {
            return Err(DomainError::invalid_transition(format!(
                "a {} cart cannot be placed again",
                self.status
            )));
        }
        if cmd.members.is_empty() {
            return Err(DomainError::validation("cart is empty"));
        }
        if cmd.members.iter().any(|s| *s != OrderStatus::Unplaced) {
            return Err(DomainError::invalid_transition(
                "every order must be valid and unplaced before the cart is placed",
            ));
        }
        let mut ev = self.status_changed(&cmd.actor, CartStatus::Placed, cmd.occurred_at);
        ev.orders_cost = Some(cmd.orders_cost);
        Ok(vec![CartEvent::StatusChanged(ev)])
    }

    fn handle_accept(&self, cmd: &AdvanceCart) -> Result<Vec<CartEvent>, DomainError> {
        if self.status != CartStatus::Placed {
            return Err(DomainError::invalid_transition(format!(
                "only placed carts can be accepted (cart is {})",
                self.status
            )));
        }
        Ok(vec![CartEvent::StatusChanged(self.status_changed(
            &cmd.actor,
            CartStatus::Processing,
            cmd.occurred_at,
        ))])
    }

    fn handle_resume(&self, cmd: &AdvanceCart) -> Result<Vec<CartEvent>, DomainError> {
        match self.status {
            CartStatus::Processing => Ok(Vec::new()),
            CartStatus::Placed => Ok(vec![CartEvent::StatusChanged(self.status_changed(
                &cmd.actor,
                CartStatus::Processing,
                cmd.occurred_at,
            ))]),
            s => Err(DomainError::invalid_transition(format!(
                "a {s} cart cannot resume processing"
            ))),
        }
    }

    fn handle_complete(&self, cmd: &AdvanceCart) -> Result<Vec<CartEvent>, DomainError> {
        if !self.status.is_ready() {
            return Err(DomainError::invalid_transition(format!(
                "only ready carts can be completed (cart is {})",
                self.status
            )));
        }
        Ok(vec![CartEvent::StatusChanged(self.status_changed(
            &cmd.actor,
            CartStatus::Completed,
            cmd.occurred_at,
        ))])
    }

    fn handle_cancel(&self, cmd: &CancelCart) -> Result<Vec<CartEvent>, DomainError> {
        if matches!(self.status, CartStatus::Unplaced) || self.status.is_terminal() {
            return Err(DomainError::invalid_transition(format!(
                "a {} cart cannot be cancelled",
                self.status
            )));
        }
        let reason = cmd.reason.trim();
        if reason.is_empty() {
            return Err(DomainError::validation("a cancellation reason is required"));
        }
        let mut ev = self.status_changed(&cmd.actor, CartStatus::Cancelled, cmd.occurred_at);
        ev.reason = Some(reason.to_string());
        Ok(vec![CartEvent::StatusChanged(ev)])
    }

    fn handle_recompute(&self, cmd: &RecomputeCart) -> Vec<CartEvent> {
        let Some(target) = derived_status(self, &cmd.members) else {
            return Vec::new();
        };
        if target == self.status {
            return Vec::new();
        }
        let mut ev = self.status_changed(&InstituteId::system(), target, cmd.occurred_at);
        if target == CartStatus::Cancelled {
            ev.reason = Some(ALL_ORDERS_CANCELLED.to_string());
        }
        vec![CartEvent::StatusChanged(ev)]
    }
}
