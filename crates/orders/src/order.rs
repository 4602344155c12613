use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campusdesk_core::{
    Aggregate, AggregateRoot, CartId, CollectorId, CourierId, DomainError, InstituteId, OrderId,
    ParameterId, ServiceId,
};
use campusdesk_events::Event;

use crate::catalog::{CostError, ParameterCatalog, Requester, Service};

/// Order lifecycle, declared in ascending order so range checks read
/// naturally (`placed <= s < completed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
    Unplaced,
    InvalidOrder,
    Placed,
    Processing,
    OnHold,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Unplaced => "unplaced",
            OrderStatus::InvalidOrder => "invalidOrder",
            OrderStatus::Placed => "placed",
            OrderStatus::Processing => "processing",
            OrderStatus::OnHold => "onHold",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Human wording used in notifications and mail.
    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Unplaced => "not yet placed",
            OrderStatus::InvalidOrder => "invalid",
            OrderStatus::Placed => "placed",
            OrderStatus::Processing => "being processed",
            OrderStatus::OnHold => "on hold",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Owner still controls the order; costs are recomputed on every touch.
    pub fn is_editable(self) -> bool {
        matches!(self, OrderStatus::Unplaced | OrderStatus::InvalidOrder)
    }

    pub fn is_cancellable(self) -> bool {
        self >= OrderStatus::Placed && self < OrderStatus::Completed
    }

    /// Statuses an administrator can see in listings.
    pub fn is_submitted(self) -> bool {
        self >= OrderStatus::Placed
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s {
            "unplaced" => OrderStatus::Unplaced,
            "invalidOrder" => OrderStatus::InvalidOrder,
            "placed" => OrderStatus::Placed,
            "processing" => OrderStatus::Processing,
            "onHold" => OrderStatus::OnHold,
            "ready" => OrderStatus::Ready,
            "completed" => OrderStatus::Completed,
            "cancelled" => OrderStatus::Cancelled,
            other => return Err(DomainError::validation(format!("unknown order status '{other}'"))),
        };
        Ok(status)
    }
}

/// Who moved an entity into a status, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusStamp {
    pub time: DateTime<Utc>,
    pub by: InstituteId,
}

/// Fields a student supplies when requesting a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderDraft {
    pub service: ServiceId,
    #[serde(default)]
    pub parameters: Vec<ParameterId>,
    pub units_requested: i64,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub collection_type: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub is_payment_done: Option<bool>,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub delivery: Option<CourierId>,
    #[serde(default)]
    pub pickup: Option<CollectorId>,
}

impl OrderDraft {
    /// Serialized names of the fields this draft sets.
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = vec!["service", "unitsRequested"];
        if !self.parameters.is_empty() {
            fields.push("parameters");
        }
        let optional = [
            ("comment", self.comment.is_some()),
            ("collectionType", self.collection_type.is_some()),
            ("paymentType", self.payment_type.is_some()),
            ("isPaymentDone", self.is_payment_done.is_some()),
            ("paymentId", self.payment_id.is_some()),
            ("delivery", self.delivery.is_some()),
            ("pickup", self.pickup.is_some()),
        ];
        fields.extend(optional.into_iter().filter(|(_, set)| *set).map(|(name, _)| name));
        fields
    }
}

/// Owner edits. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderPatch {
    #[serde(default)]
    pub units_requested: Option<i64>,
    #[serde(default)]
    pub parameters: Option<Vec<ParameterId>>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub is_payment_done: Option<bool>,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub delivery: Option<CourierId>,
    #[serde(default)]
    pub pickup: Option<CollectorId>,
}

impl OrderPatch {
    pub fn touched_fields(&self) -> Vec<&'static str> {
        [
            ("unitsRequested", self.units_requested.is_some()),
            ("parameters", self.parameters.is_some()),
            ("comment", self.comment.is_some()),
            ("paymentType", self.payment_type.is_some()),
            ("isPaymentDone", self.is_payment_done.is_some()),
            ("paymentId", self.payment_id.is_some()),
            ("delivery", self.delivery.is_some()),
            ("pickup", self.pickup.is_some()),
        ]
        .into_iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| name)
        .collect()
    }

    /// A hold can only be acknowledged with a bare comment.
    fn hold_acknowledgement(&self) -> Option<&str> {
        let only_comment = self.touched_fields() == ["comment"];
        self.comment
            .as_deref()
            .map(str::trim)
            .filter(|c| only_comment && !c.is_empty())
    }
}

/// One requested service. Owned by a requester and a member of their cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    id: OrderId,
    requested_by: InstituteId,
    cart_id: CartId,
    service: ServiceId,
    service_name: String,
    parameters: Vec<ParameterId>,
    units_requested: i64,
    service_cost: u64,
    parameter_cost: u64,
    total_cost: u64,
    status: OrderStatus,
    validity_errors: Vec<String>,
    status_change_time: BTreeMap<String, StatusStamp>,
    cancel_reason: Option<String>,
    hold_reason: Option<String>,
    comment: Option<String>,
    collection_type: Option<String>,
    delivery: Option<CourierId>,
    pickup: Option<CollectorId>,
    payment_type: Option<String>,
    is_payment_done: bool,
    payment_id: Option<String>,
    created_on: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    last_modified_by: InstituteId,
    version: u64,
}

impl Order {
    /// A fresh, not-yet-costed order in `unplaced`.
    pub fn new(
        id: OrderId,
        owner: InstituteId,
        cart_id: CartId,
        service_name: impl Into<String>,
        draft: OrderDraft,
        at: DateTime<Utc>,
    ) -> Self {
        let mut status_change_time = BTreeMap::new();
        status_change_time.insert(
            OrderStatus::Unplaced.as_str().to_string(),
            StatusStamp {
                time: at,
                by: owner.clone(),
            },
        );
        Self {
            id,
            requested_by: owner.clone(),
            cart_id,
            service: draft.service,
            service_name: service_name.into(),
            parameters: draft.parameters,
            units_requested: draft.units_requested,
            service_cost: 0,
            parameter_cost: 0,
            total_cost: 0,
            status: OrderStatus::Unplaced,
            validity_errors: Vec::new(),
            status_change_time,
            cancel_reason: None,
            hold_reason: None,
            comment: draft.comment,
            collection_type: draft.collection_type,
            delivery: draft.delivery,
            pickup: draft.pickup,
            payment_type: draft.payment_type,
            is_payment_done: draft.is_payment_done.unwrap_or(false),
            payment_id: draft.payment_id,
            created_on: at,
            last_modified: at,
            last_modified_by: owner,
            version: 0,
        }
    }

    pub fn requested_by(&self) -> &InstituteId {
        &self.requested_by
    }

    pub fn cart_id(&self) -> CartId {
        self.cart_id
    }

    pub fn service(&self) -> ServiceId {
        self.service
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn parameters(&self) -> &[ParameterId] {
        &self.parameters
    }

    pub fn units_requested(&self) -> i64 {
        self.units_requested
    }

    pub fn service_cost(&self) -> u64 {
        self.service_cost
    }

    pub fn parameter_cost(&self) -> u64 {
        self.parameter_cost
    }

    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn validity_errors(&self) -> &[String] {
        &self.validity_errors
    }

    pub fn stamp(&self, status: OrderStatus) -> Option<&StatusStamp> {
        self.status_change_time.get(status.as_str())
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn hold_reason(&self) -> Option<&str> {
        self.hold_reason.as_deref()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn delivery(&self) -> Option<CourierId> {
        self.delivery
    }

    pub fn pickup(&self) -> Option<CollectorId> {
        self.pickup
    }

    pub fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Orders in `unplaced`/`invalidOrder` are deleted by their owner, never
    /// by anyone else and never later in the lifecycle.
    pub fn ensure_deletable_by(&self, actor: &InstituteId) -> Result<(), DomainError> {
        if &self.requested_by != actor {
            return Err(DomainError::Unauthorized);
        }
        if !self.status.is_editable() {
            return Err(DomainError::invalid_transition(format!(
                "a {} order can no longer be deleted",
                self.status
            )));
        }
        Ok(())
    }

    /// Recompute costs and validity from the current catalog.
    ///
    /// Only acts while the order is editable; later statuses keep the price
    /// they were placed at. Returns whether anything changed.
    pub fn revalidate(
        &mut self,
        service: Option<&Service>,
        parameters: &ParameterCatalog,
        requester: Requester<'_>,
    ) -> bool {
        if !self.status.is_editable() {
            return false;
        }

        let costed = service.ok_or(CostError::ServiceMissing).and_then(|svc| {
            let service_cost = svc.cost(self.units_requested, requester)?;
            let parameter_cost =
                svc.parameter_cost(&self.parameters, self.units_requested, parameters)?;
            Ok((service_cost, parameter_cost))
        });

        let before = (
            self.status,
            self.service_cost,
            self.parameter_cost,
            self.total_cost,
            self.validity_errors.clone(),
        );

        self.validity_errors.clear();
        match costed {
            Ok((service_cost, parameter_cost)) => {
                self.status = OrderStatus::Unplaced;
                self.service_cost = service_cost;
                self.parameter_cost = parameter_cost;
                self.total_cost = service_cost.saturating_add(parameter_cost);
            }
            Err(reason) => {
                self.status = OrderStatus::InvalidOrder;
                self.service_cost = 0;
                self.parameter_cost = 0;
                self.total_cost = 0;
                self.validity_errors.push(reason.to_string());
            }
        }

        let changed = before
            != (
                self.status,
                self.service_cost,
                self.parameter_cost,
                self.total_cost,
                self.validity_errors.clone(),
            );
        if changed {
            self.version += 1;
        }
        changed
    }

    /// Used by stores when rehydrating a document at a known revision.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Units of `service` already committed in a cart, excluding cancelled orders.
/// Non-positive requests count as nothing; the sum saturates.
pub fn committed_units<'a>(service: ServiceId, members: impl IntoIterator<Item = &'a Order>) -> i64 {
    members
        .into_iter()
        .filter(|o| o.service == service && o.status != OrderStatus::Cancelled)
        .fold(0i64, |sum, o| sum.saturating_add(o.units_requested.max(0)))
}

/// Reject units that would push the cart past the service cap. `members`
/// are the other orders in the cart.
pub fn check_unit_cap<'a>(
    service: &Service,
    members: impl IntoIterator<Item = &'a Order>,
    requested: i64,
) -> Result<(), DomainError> {
    let committed = committed_units(service.id, members);
    if committed.saturating_add(requested.max(0)) > service.max_units {
        return Err(DomainError::validation(format!(
            "'{}' is limited to {} units per cart ({} already in your cart)",
            service.name, service.max_units, committed
        )));
    }
    Ok(())
}

/// Owner edit (free edit or hold acknowledgement, decided by status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseOrder {
    pub actor: InstituteId,
    pub patch: OrderPatch,
    pub occurred_at: DateTime<Utc>,
}

/// Administrator status change: `ready` or `onHold`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOrderStatus {
    pub actor: InstituteId,
    pub target: OrderStatus,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub actor: InstituteId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Transitions driven by the cart lifecycle (place, accept, complete).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceOrder {
    pub actor: InstituteId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    Revise(ReviseOrder),
    ChangeStatus(ChangeOrderStatus),
    Cancel(CancelOrder),
    Place(AdvanceOrder),
    Accept(AdvanceOrder),
    Complete(AdvanceOrder),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRevised {
    pub order_id: OrderId,
    pub actor: InstituteId,
    pub patch: OrderPatch,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: OrderId,
    pub actor: InstituteId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Hold or cancellation reason.
    pub reason: Option<String>,
    /// Owner's acknowledgement when leaving `onHold`.
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    Revised(OrderRevised),
    StatusChanged(OrderStatusChanged),
}

impl OrderEvent {
    pub fn status_change(&self) -> Option<&OrderStatusChanged> {
        match self {
            OrderEvent::StatusChanged(e) => Some(e),
            OrderEvent::Revised(_) => None,
        }
    }
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Revised(_) => "order.revised",
            OrderEvent::StatusChanged(_) => "order.status_changed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Revised(e) => e.occurred_at,
            OrderEvent::StatusChanged(e) => e.occurred_at,
        }
    }

    fn actor(&self) -> &InstituteId {
        match self {
            OrderEvent::Revised(e) => &e.actor,
            OrderEvent::StatusChanged(e) => &e.actor,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::Revised(e) => {
                let p = &e.patch;
                if let Some(units) = p.units_requested {
                    self.units_requested = units;
                }
                if let Some(parameters) = &p.parameters {
                    self.parameters = parameters.clone();
                }
                if let Some(comment) = &p.comment {
                    self.comment = Some(comment.clone());
                }
                if let Some(payment_type) = &p.payment_type {
                    self.payment_type = Some(payment_type.clone());
                }
                if let Some(done) = p.is_payment_done {
                    self.is_payment_done = done;
                }
                if let Some(payment_id) = &p.payment_id {
                    self.payment_id = Some(payment_id.clone());
                }
                if let Some(delivery) = p.delivery {
                    self.delivery = Some(delivery);
                    self.pickup = None;
                }
                if let Some(pickup) = p.pickup {
                    self.pickup = Some(pickup);
                    self.delivery = None;
                }
                self.touch(&e.actor, e.occurred_at);
            }
            OrderEvent::StatusChanged(e) => {
                self.status = e.to;
                self.status_change_time.insert(
                    e.to.as_str().to_string(),
                    StatusStamp {
                        time: e.occurred_at,
                        by: e.actor.clone(),
                    },
                );
                match e.to {
                    OrderStatus::OnHold => self.hold_reason = e.reason.clone(),
                    OrderStatus::Cancelled => self.cancel_reason = e.reason.clone(),
                    _ => {}
                }
                if let Some(comment) = &e.comment {
                    self.comment = Some(comment.clone());
                }
                self.touch(&e.actor, e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::Revise(cmd) => self.handle_revise(cmd),
            OrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            OrderCommand::Cancel(cmd) => self.handle_cancel(cmd),
            OrderCommand::Place(cmd) => {
                self.advance(cmd, OrderStatus::Unplaced, OrderStatus::Placed)
            }
            OrderCommand::Accept(cmd) => {
                self.advance(cmd, OrderStatus::Placed, OrderStatus::Processing)
            }
            OrderCommand::Complete(cmd) => {
                self.advance(cmd, OrderStatus::Ready, OrderStatus::Completed)
            }
        }
    }
}

impl Order {
    fn touch(&mut self, actor: &InstituteId, at: DateTime<Utc>) {
        self.last_modified = at;
        self.last_modified_by = actor.clone();
    }

    fn status_changed(
        &self,
        actor: &InstituteId,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> OrderStatusChanged {
        OrderStatusChanged {
            order_id: self.id,
            actor: actor.clone(),
            from: self.status,
            to,
            reason: None,
            comment: None,
            occurred_at: at,
        }
    }

    fn handle_revise(&self, cmd: &ReviseOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if cmd.actor != self.requested_by {
            return Err(DomainError::Unauthorized);
        }

        if self.status.is_editable() {
            return Ok(vec![OrderEvent::Revised(OrderRevised {
                order_id: self.id,
                actor: cmd.actor.clone(),
                patch: cmd.patch.clone(),
                occurred_at: cmd.occurred_at,
            })]);
        }

        if self.status == OrderStatus::OnHold {
            let Some(comment) = cmd.patch.hold_acknowledgement() else {
                return Err(DomainError::invalid_transition(
                    "an order on hold only accepts a comment",
                ));
            };
            let mut ev = self.status_changed(&cmd.actor, OrderStatus::Processing, cmd.occurred_at);
            ev.comment = Some(comment.to_string());
            return Ok(vec![OrderEvent::StatusChanged(ev)]);
        }

        Err(DomainError::invalid_transition(format!(
            "a {} order can no longer be modified",
            self.status
        )))
    }

    fn handle_change_status(
        &self,
        cmd: &ChangeOrderStatus,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        let allowed = match cmd.target {
            OrderStatus::Ready => self.status == OrderStatus::Processing,
            OrderStatus::OnHold => {
                self.status > OrderStatus::Placed && self.status < OrderStatus::Ready
            }
            _ => {
                return Err(DomainError::invalid_transition(format!(
                    "orders cannot be moved to {} directly",
                    cmd.target
                )));
            }
        };
        if !allowed {
            return Err(DomainError::invalid_transition(format!(
                "cannot move a {} order to {}",
                self.status, cmd.target
            )));
        }

        let mut ev = self.status_changed(&cmd.actor, cmd.target, cmd.occurred_at);
        if cmd.target == OrderStatus::OnHold {
            let reason = cmd
                .reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| DomainError::validation("a reason is required to hold an order"))?;
            ev.reason = Some(reason.to_string());
        }
        Ok(vec![OrderEvent::StatusChanged(ev)])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.status.is_cancellable() {
            return Err(DomainError::invalid_transition(format!(
                "a {} order cannot be cancelled",
                self.status
            )));
        }
        let reason = cmd.reason.trim();
        if reason.is_empty() {
            return Err(DomainError::validation("a cancellation reason is required"));
        }
        let mut ev = self.status_changed(&cmd.actor, OrderStatus::Cancelled, cmd.occurred_at);
        ev.reason = Some(reason.to_string());
        Ok(vec![OrderEvent::StatusChanged(ev)])
    }

    fn advance(
        &self,
        cmd: &AdvanceOrder,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        if self.status != from {
            return Err(DomainError::invalid_transition(format!(
                "cannot move a {} order to {}",
                self.status, to
            )));
        }
        Ok(vec![OrderEvent::StatusChanged(self.status_changed(
            &cmd.actor,
            to,
            cmd.occurred_at,
        ))])
    }
}
