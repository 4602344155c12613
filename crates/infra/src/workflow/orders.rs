//! Order operations: listing, creation, owner edits and staff transitions.

use chrono::Utc;
use serde_json::Value as JsonValue;

use campusdesk_auth::{Action, Principal, Resource, Scope};
use campusdesk_core::{AggregateRoot, ExpectedVersion, OrderId};
use campusdesk_events::execute;
use campusdesk_orders::{
    check_unit_cap, AddOrderToCart, AdvanceCart, CancelOrder, CartCommand, CartStatus,
    ChangeOrderStatus, Order, OrderCommand, OrderDraft, OrderEvent, OrderPatch, OrderStatus,
    RemoveOrderFromCart, ReviseOrder,
};

use super::{check_writable, shape, Workflow, WorkflowError, WorkflowResult};
use crate::effects::PostCommit;

impl Workflow {
    /// Own-scope callers see their orders; any-scope callers see only
    /// submitted ones. Newest first.
    #[tracing::instrument(skip(self, principal), fields(actor = %principal.institute_id), err)]
    pub async fn list_orders(
        &self,
        principal: &Principal,
        status: Option<OrderStatus>,
    ) -> WorkflowResult<JsonValue> {
        let scoped = self.widest(principal, Resource::Order, Action::Read)?;

        let orders = if scoped.is_own_only() {
            let me = principal.institute_id.clone();
            let mine = self
                .persistence
                .orders
                .find(&move |o: &Order| o.requested_by() == &me)
                .await?;
            let mut refreshed = Vec::with_capacity(mine.len());
            for order in mine {
                refreshed.push(self.refresh(order).await?);
            }
            refreshed
        } else {
            if status.is_some_and(|s| !s.is_submitted()) {
                return Ok(JsonValue::Array(Vec::new()));
            }
            self.persistence
                .orders
                .find(&|o: &Order| o.status().is_submitted())
                .await?
        };

        let mut orders: Vec<Order> = orders
            .into_iter()
            .filter(|o| status.is_none_or(|s| o.status() == s))
            .collect();
        orders.sort_by(|a, b| b.created_on().cmp(&a.created_on()));
        shape(&orders, &scoped.grant)
    }

    #[tracing::instrument(skip(self, principal), fields(actor = %principal.institute_id), err)]
    pub async fn get_order(&self, principal: &Principal, id: OrderId) -> WorkflowResult<JsonValue> {
        let scoped = self.widest(principal, Resource::Order, Action::Read)?;
        let order = self.load_order(&id).await?;

        let visible = if scoped.is_own_only() {
            principal.owns(order.requested_by())
        } else {
            order.status().is_submitted()
        };
        if !visible {
            return Err(WorkflowError::NotFound("order".into()));
        }

        let order = self.refresh(order).await?;
        shape(&order, &scoped.grant)
    }

    /// Request a service into the caller's cart.
    #[tracing::instrument(
        skip(self, principal, draft),
        fields(actor = %principal.institute_id, service = %draft.service),
        err
    )]
    pub async fn add_order(
        &self,
        principal: &Principal,
        draft: OrderDraft,
    ) -> WorkflowResult<JsonValue> {
        let grant = self.require(principal, Resource::Order, Action::Create, Scope::Own)?;
        check_writable(&grant, &draft.touched_fields())?;

        let owner = self.load_user(&principal.institute_id).await?;
        let service = self
            .persistence
            .services
            .find_by_id(&draft.service)
            .await?
            .ok_or_else(|| WorkflowError::NotFound("service".into()))?;

        let order = {
            let _guard = self.locks.lock(owner.cart_id).await;
            let mut cart = self.load_cart(&owner.cart_id).await?;
            let cart_version = cart.version();

            match cart.status() {
                CartStatus::Unplaced => {
                    let members = self.members(&cart).await?;
                    check_unit_cap(&service, &members, draft.units_requested)?;
                }
                // The add empties a finished cart, so only the new units count.
                status if status.is_terminal() => {
                    check_unit_cap(&service, std::iter::empty::<&Order>(), draft.units_requested)?;
                }
                _ => {}
            }

            let now = Utc::now();
            let order_id = OrderId::new();
            execute(
                &mut cart,
                &CartCommand::AddOrder(AddOrderToCart {
                    order_id,
                    actor: principal.institute_id.clone(),
                    occurred_at: now,
                }),
            )?;

            let mut order = Order::new(
                order_id,
                principal.institute_id.clone(),
                *cart.id(),
                service.name.clone(),
                draft,
                now,
            );
            self.revalidate(&mut order).await?;

            let order = self.persistence.orders.create(order).await?;
            self.persistence
                .carts
                .save(cart, ExpectedVersion::Exact(cart_version))
                .await?;
            order
        };

        tracing::info!(order_id = %order.id(), status = %order.status(), "order created");
        let read = self.require(principal, Resource::Order, Action::Read, Scope::Own)?;
        shape(&order, &read)
    }

    /// Owner edit. While on hold only a comment is accepted, which hands the
    /// order (and its cart) back to processing.
    #[tracing::instrument(
        skip(self, principal, patch),
        fields(actor = %principal.institute_id, order_id = %id),
        err
    )]
    pub async fn update_order(
        &self,
        principal: &Principal,
        id: OrderId,
        patch: OrderPatch,
    ) -> WorkflowResult<JsonValue> {
        let grant = self.require(principal, Resource::Order, Action::Update, Scope::Own)?;
        check_writable(&grant, &patch.touched_fields())?;

        let cart_id = self.load_own_order(principal, &id).await?.cart_id();
        let (order, effects) = {
            let _guard = self.locks.lock(cart_id).await;
            let mut order = self.load_own_order(principal, &id).await?;
            let loaded = order.version();
            let now = Utc::now();

            if let Some(units) = patch.units_requested {
                if order.status().is_editable() {
                    self.check_revised_units(&order, units).await?;
                }
            }

            let events = execute(
                &mut order,
                &OrderCommand::Revise(ReviseOrder {
                    actor: principal.institute_id.clone(),
                    patch,
                    occurred_at: now,
                }),
            )?;
            self.revalidate(&mut order).await?;
            let order = self
                .persistence
                .orders
                .save(order, ExpectedVersion::Exact(loaded))
                .await?;

            let mut effects = PostCommit::new();
            let resumed = events
                .iter()
                .filter_map(OrderEvent::status_change)
                .any(|change| change.to == OrderStatus::Processing);
            if resumed {
                let owner = self.load_user(order.requested_by()).await?;
                self.queue_order_effects(&mut effects, &order, &owner, &principal.institute_id, false);

                let mut cart = self.load_cart(&order.cart_id()).await?;
                let cart_version = cart.version();
                let cart_events = execute(
                    &mut cart,
                    &CartCommand::Resume(AdvanceCart {
                        actor: principal.institute_id.clone(),
                        occurred_at: now,
                    }),
                )?;
                if !cart_events.is_empty() {
                    let cart = self
                        .persistence
                        .carts
                        .save(cart, ExpectedVersion::Exact(cart_version))
                        .await?;
                    self.queue_cart_effects(&mut effects, &cart, &owner, &principal.institute_id);
                }
                tracing::info!(order_id = %order.id(), "hold acknowledged");
            }
            (order, effects)
        };

        self.run_effects(effects).await?;
        let read = self.require(principal, Resource::Order, Action::Read, Scope::Own)?;
        shape(&order, &read)
    }

    #[tracing::instrument(skip(self, principal), fields(actor = %principal.institute_id), err)]
    pub async fn delete_order(&self, principal: &Principal, id: OrderId) -> WorkflowResult<()> {
        self.require(principal, Resource::Order, Action::Delete, Scope::Own)?;

        let cart_id = self.load_own_order(principal, &id).await?.cart_id();
        let _guard = self.locks.lock(cart_id).await;
        let order = self.load_own_order(principal, &id).await?;
        order.ensure_deletable_by(&principal.institute_id)?;

        let mut cart = self.load_cart(&cart_id).await?;
        let cart_version = cart.version();
        let events = execute(
            &mut cart,
            &CartCommand::RemoveOrder(RemoveOrderFromCart {
                order_id: id,
                actor: principal.institute_id.clone(),
                occurred_at: Utc::now(),
            }),
        )?;
        if !events.is_empty() {
            self.persistence
                .carts
                .save(cart, ExpectedVersion::Exact(cart_version))
                .await?;
        }
        self.persistence.orders.delete(&id).await?;

        tracing::info!(order_id = %id, "order deleted");
        Ok(())
    }

    /// Staff transition to `ready` or `onHold`, followed by the cart
    /// recomputation.
    #[tracing::instrument(
        skip(self, principal, reason),
        fields(actor = %principal.institute_id, order_id = %id, to = %target),
        err
    )]
    pub async fn change_status(
        &self,
        principal: &Principal,
        id: OrderId,
        target: OrderStatus,
        reason: Option<String>,
    ) -> WorkflowResult<JsonValue> {
        self.require_status_authority(principal)?;
        let read = self.require(principal, Resource::Order, Action::Read, Scope::Any)?;

        let command = OrderCommand::ChangeStatus(ChangeOrderStatus {
            actor: principal.institute_id.clone(),
            target,
            reason,
            occurred_at: Utc::now(),
        });
        let order = self.transition(principal, id, command).await?;

        tracing::info!(order_id = %id, status = %order.status(), "order status changed");
        shape(&order, &read)
    }

    #[tracing::instrument(
        skip(self, principal, reason),
        fields(actor = %principal.institute_id, order_id = %id),
        err
    )]
    pub async fn cancel_order(
        &self,
        principal: &Principal,
        id: OrderId,
        reason: String,
    ) -> WorkflowResult<JsonValue> {
        self.require_status_authority(principal)?;
        let read = self.require(principal, Resource::Order, Action::Read, Scope::Any)?;

        let command = OrderCommand::Cancel(CancelOrder {
            actor: principal.institute_id.clone(),
            reason,
            occurred_at: Utc::now(),
        });
        let order = self.transition(principal, id, command).await?;

        tracing::info!(order_id = %id, "order cancelled");
        shape(&order, &read)
    }

    /// Apply a staff command to one order under its cart's lock, then
    /// re-derive the cart. Effects run after the lock is released.
    async fn transition(
        &self,
        principal: &Principal,
        id: OrderId,
        command: OrderCommand,
    ) -> WorkflowResult<Order> {
        let cart_id = self.load_order(&id).await?.cart_id();
        let (order, effects) = {
            let _guard = self.locks.lock(cart_id).await;
            let mut order = self.load_order(&id).await?;
            let loaded = order.version();

            execute(&mut order, &command)?;
            let order = self
                .persistence
                .orders
                .save(order, ExpectedVersion::Exact(loaded))
                .await?;
            if order.status() == OrderStatus::Cancelled {
                self.mirror_order_cancel(&order).await?;
            }

            let owner = self.load_user(order.requested_by()).await?;
            let mut effects = PostCommit::new();
            self.queue_order_effects(&mut effects, &order, &owner, &principal.institute_id, true);
            self.recompute_cart(&cart_id, &owner, &mut effects).await?;
            (order, effects)
        };

        self.run_effects(effects).await?;
        Ok(order)
    }

    /// An order the caller owns. Anyone else's order reads as absent.
    async fn load_own_order(&self, principal: &Principal, id: &OrderId) -> WorkflowResult<Order> {
        let order = self.load_order(id).await?;
        if !principal.owns(order.requested_by()) {
            return Err(WorkflowError::NotFound("order".into()));
        }
        Ok(order)
    }

    /// A unit change must keep the cart within the service cap, counting the
    /// other orders in the cart. A missing service is left to revalidation.
    async fn check_revised_units(&self, order: &Order, units: i64) -> WorkflowResult<()> {
        let Some(service) = self.persistence.services.find_by_id(&order.service()).await? else {
            return Ok(());
        };
        let cart = self.load_cart(&order.cart_id()).await?;
        let others: Vec<Order> = self
            .members(&cart)
            .await?
            .into_iter()
            .filter(|o| o.id() != order.id())
            .collect();
        check_unit_cap(&service, &others, units)?;
        Ok(())
    }

    /// Re-cost an editable order under its cart's lock and persist it when
    /// the price or validity moved.
    async fn refresh(&self, order: Order) -> WorkflowResult<Order> {
        if !order.status().is_editable() {
            return Ok(order);
        }
        let _guard = self.locks.lock(order.cart_id()).await;
        let mut order = self.load_order(order.id()).await?;
        let loaded = order.version();
        if self.revalidate(&mut order).await? {
            order = self
                .persistence
                .orders
                .save(order, ExpectedVersion::Exact(loaded))
                .await?;
        }
        Ok(order)
    }

    /// Copy a cancellation onto the placed-order ledger entry, if there is one.
    pub(super) async fn mirror_order_cancel(&self, order: &Order) -> WorkflowResult<()> {
        if let Some(mut placed) = self.persistence.placed_orders.find_by_id(order.id()).await? {
            placed.mirror_cancel(order.cancel_reason());
            self.persistence
                .placed_orders
                .save(placed, ExpectedVersion::Any)
                .await?;
        }
        Ok(())
    }
}
