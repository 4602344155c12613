//! Cart operations and the cart recomputation that follows every order
//! status change.

use chrono::Utc;
use serde_json::Value as JsonValue;

use campusdesk_auth::{Action, Principal, Resource, Scope};
use campusdesk_core::{AggregateRoot, CartId, ExpectedVersion, InstituteId};
use campusdesk_events::execute;
use campusdesk_orders::{
    AdvanceCart, AdvanceOrder, CancelCart, CancelOrder, Cart, CartCommand, CartPatch, CartStatus,
    Order, OrderCommand, OrderStatus, PlaceCart, PlacedCart, PlacedOrder, RecomputeCart,
    ReviseCart,
};

use super::{check_writable, shape, Workflow, WorkflowResult};
use crate::effects::PostCommit;
use crate::users::UserRecord;

impl Workflow {
    #[tracing::instrument(skip(self, principal), fields(actor = %principal.institute_id), err)]
    pub async fn get_cart(&self, principal: &Principal) -> WorkflowResult<JsonValue> {
        let read = self.require(principal, Resource::Cart, Action::Read, Scope::Own)?;
        let user = self.load_user(&principal.institute_id).await?;
        let cart = self.load_cart(&user.cart_id).await?;
        shape(&cart, &read)
    }

    /// Payment and collection details, editable until the cart is placed.
    #[tracing::instrument(skip(self, principal, patch), fields(actor = %principal.institute_id), err)]
    pub async fn update_cart(
        &self,
        principal: &Principal,
        patch: CartPatch,
    ) -> WorkflowResult<JsonValue> {
        let grant = self.require(principal, Resource::Cart, Action::Update, Scope::Own)?;
        check_writable(&grant, &patch.touched_fields())?;

        let user = self.load_user(&principal.institute_id).await?;
        let cart = {
            let _guard = self.locks.lock(user.cart_id).await;
            let mut cart = self.load_cart(&user.cart_id).await?;
            let loaded = cart.version();
            execute(
                &mut cart,
                &CartCommand::Revise(ReviseCart {
                    actor: principal.institute_id.clone(),
                    patch,
                    occurred_at: Utc::now(),
                }),
            )?;
            self.persistence
                .carts
                .save(cart, ExpectedVersion::Exact(loaded))
                .await?
        };

        let read = self.require(principal, Resource::Cart, Action::Read, Scope::Own)?;
        shape(&cart, &read)
    }

    /// Submit the caller's cart. Members are re-costed first; any order that
    /// turns out invalid keeps the cart unplaced.
    #[tracing::instrument(skip(self, principal), fields(actor = %principal.institute_id), err)]
    pub async fn place_cart(&self, principal: &Principal) -> WorkflowResult<JsonValue> {
        self.require(principal, Resource::Cart, Action::Update, Scope::Own)?;
        let user = self.load_user(&principal.institute_id).await?;
        let actor = principal.institute_id.clone();

        let (cart, effects) = {
            let _guard = self.locks.lock(user.cart_id).await;
            let mut cart = self.load_cart(&user.cart_id).await?;
            let cart_version = cart.version();

            let mut members = Vec::new();
            for mut order in self.members(&cart).await? {
                let loaded = order.version();
                if self.revalidate(&mut order).await? {
                    order = self
                        .persistence
                        .orders
                        .save(order, ExpectedVersion::Exact(loaded))
                        .await?;
                }
                members.push(order);
            }

            let now = Utc::now();
            let orders_cost = members
                .iter()
                .fold(0u64, |sum, o| sum.saturating_add(o.total_cost()));
            execute(
                &mut cart,
                &CartCommand::Place(PlaceCart {
                    actor: actor.clone(),
                    members: members.iter().map(Order::status).collect(),
                    orders_cost,
                    occurred_at: now,
                }),
            )?;

            for mut order in members {
                let loaded = order.version();
                execute(
                    &mut order,
                    &OrderCommand::Place(AdvanceOrder {
                        actor: actor.clone(),
                        occurred_at: now,
                    }),
                )?;
                let order = self
                    .persistence
                    .orders
                    .save(order, ExpectedVersion::Exact(loaded))
                    .await?;
                self.persistence
                    .placed_orders
                    .save(PlacedOrder::of(&order, now), ExpectedVersion::Any)
                    .await?;
            }

            let cart = self
                .persistence
                .carts
                .save(cart, ExpectedVersion::Exact(cart_version))
                .await?;
            self.persistence
                .placed_carts
                .save(PlacedCart::of(&cart, now), ExpectedVersion::Any)
                .await?;

            let mut effects = PostCommit::new();
            self.queue_cart_effects(&mut effects, &cart, &user, &actor);
            (cart, effects)
        };

        self.run_effects(effects).await?;
        tracing::info!(cart_id = %cart.id(), orders = cart.orders().len(), "cart placed");
        let read = self.require(principal, Resource::Cart, Action::Read, Scope::Own)?;
        shape(&cart, &read)
    }

    /// Staff accept a placed cart; its placed orders move to processing.
    #[tracing::instrument(skip(self, principal), fields(actor = %principal.institute_id), err)]
    pub async fn accept_cart(&self, principal: &Principal, id: CartId) -> WorkflowResult<JsonValue> {
        let command = CartCommand::Accept(AdvanceCart {
            actor: principal.institute_id.clone(),
            occurred_at: Utc::now(),
        });
        self.advance_cart(principal, id, command, OrderStatus::Placed, OrderCommand::Accept)
            .await
    }

    /// Staff hand over a ready cart; its ready orders complete.
    #[tracing::instrument(skip(self, principal), fields(actor = %principal.institute_id), err)]
    pub async fn complete_cart(
        &self,
        principal: &Principal,
        id: CartId,
    ) -> WorkflowResult<JsonValue> {
        let command = CartCommand::Complete(AdvanceCart {
            actor: principal.institute_id.clone(),
            occurred_at: Utc::now(),
        });
        self.advance_cart(principal, id, command, OrderStatus::Ready, OrderCommand::Complete)
            .await
    }

    /// Staff cancel a whole cart: every cancellable order goes with it and
    /// the linked delivery or pickup record is withdrawn.
    #[tracing::instrument(skip(self, principal, reason), fields(actor = %principal.institute_id), err)]
    pub async fn cancel_cart(
        &self,
        principal: &Principal,
        id: CartId,
        reason: String,
    ) -> WorkflowResult<JsonValue> {
        self.require_status_authority(principal)?;
        let read = self.require(principal, Resource::Cart, Action::Read, Scope::Any)?;
        let actor = principal.institute_id.clone();

        let (cart, effects) = {
            let _guard = self.locks.lock(id).await;
            let mut cart = self.load_cart(&id).await?;
            let cart_version = cart.version();
            let now = Utc::now();

            execute(
                &mut cart,
                &CartCommand::Cancel(CancelCart {
                    actor: actor.clone(),
                    reason: reason.clone(),
                    occurred_at: now,
                }),
            )?;

            let owner = self.load_user(cart.requested_by()).await?;
            let mut effects = PostCommit::new();
            for mut order in self.members(&cart).await? {
                if !order.status().is_cancellable() {
                    continue;
                }
                let loaded = order.version();
                execute(
                    &mut order,
                    &OrderCommand::Cancel(CancelOrder {
                        actor: actor.clone(),
                        reason: reason.clone(),
                        occurred_at: now,
                    }),
                )?;
                let order = self
                    .persistence
                    .orders
                    .save(order, ExpectedVersion::Exact(loaded))
                    .await?;
                self.mirror_order_cancel(&order).await?;
                self.queue_order_effects(&mut effects, &order, &owner, &actor, false);
            }

            let cart = self
                .persistence
                .carts
                .save(cart, ExpectedVersion::Exact(cart_version))
                .await?;
            self.withdraw_cart(&cart).await?;
            self.queue_cart_effects(&mut effects, &cart, &owner, &actor);
            (cart, effects)
        };

        self.run_effects(effects).await?;
        tracing::info!(cart_id = %id, "cart cancelled");
        shape(&cart, &read)
    }

    /// Shared shape of accept and complete: move the cart, then every member
    /// sitting at `from` with the matching order command.
    async fn advance_cart(
        &self,
        principal: &Principal,
        id: CartId,
        command: CartCommand,
        from: OrderStatus,
        order_command: fn(AdvanceOrder) -> OrderCommand,
    ) -> WorkflowResult<JsonValue> {
        self.require_status_authority(principal)?;
        let read = self.require(principal, Resource::Cart, Action::Read, Scope::Any)?;
        let actor = principal.institute_id.clone();

        let (cart, effects) = {
            let _guard = self.locks.lock(id).await;
            let mut cart = self.load_cart(&id).await?;
            let cart_version = cart.version();
            execute(&mut cart, &command)?;

            let owner = self.load_user(cart.requested_by()).await?;
            let mut effects = PostCommit::new();
            let now = Utc::now();
            for mut order in self.members(&cart).await? {
                if order.status() != from {
                    continue;
                }
                let loaded = order.version();
                let advance = AdvanceOrder {
                    actor: actor.clone(),
                    occurred_at: now,
                };
                execute(&mut order, &order_command(advance))?;
                let order = self
                    .persistence
                    .orders
                    .save(order, ExpectedVersion::Exact(loaded))
                    .await?;
                self.queue_order_effects(&mut effects, &order, &owner, &actor, false);
            }

            let cart = self
                .persistence
                .carts
                .save(cart, ExpectedVersion::Exact(cart_version))
                .await?;
            self.queue_cart_effects(&mut effects, &cart, &owner, &actor);
            (cart, effects)
        };

        self.run_effects(effects).await?;
        tracing::info!(cart_id = %id, status = %cart.status(), "cart advanced");
        shape(&cart, &read)
    }

    /// Re-derive the cart status from its members after an order write.
    /// Callers hold the cart lock. Automatic transitions are stamped by the
    /// system actor.
    pub(super) async fn recompute_cart(
        &self,
        id: &CartId,
        owner: &UserRecord,
        effects: &mut PostCommit,
    ) -> WorkflowResult<()> {
        let mut cart = self.load_cart(id).await?;
        let loaded = cart.version();
        let members: Vec<OrderStatus> = self
            .members(&cart)
            .await?
            .iter()
            .map(Order::status)
            .collect();

        let events = execute(
            &mut cart,
            &CartCommand::Recompute(RecomputeCart {
                members,
                occurred_at: Utc::now(),
            }),
        )?;
        if events.is_empty() {
            return Ok(());
        }

        let cart = self
            .persistence
            .carts
            .save(cart, ExpectedVersion::Exact(loaded))
            .await?;
        if cart.status() == CartStatus::Cancelled {
            self.withdraw_cart(&cart).await?;
        }
        self.queue_cart_effects(effects, &cart, owner, &InstituteId::system());
        tracing::info!(cart_id = %id, status = %cart.status(), "cart status derived");
        Ok(())
    }

    /// Follow-up writes for a cancelled cart: the linked courier or collector
    /// is cancelled and the placed-cart ledger entry mirrors the reason.
    async fn withdraw_cart(&self, cart: &Cart) -> WorkflowResult<()> {
        let now = Utc::now();
        if let Some(courier_id) = cart.delivery() {
            if let Some(mut courier) = self.persistence.couriers.find_by_id(&courier_id).await? {
                if courier.cancel(now) {
                    self.persistence
                        .couriers
                        .save(courier, ExpectedVersion::Any)
                        .await?;
                }
            }
        }
        if let Some(collector_id) = cart.pickup() {
            if let Some(mut collector) = self.persistence.collectors.find_by_id(&collector_id).await?
            {
                if collector.cancel(now) {
                    self.persistence
                        .collectors
                        .save(collector, ExpectedVersion::Any)
                        .await?;
                }
            }
        }
        if let Some(mut placed) = self.persistence.placed_carts.find_by_id(cart.id()).await? {
            placed.mirror_cancel(cart.cancel_reason());
            self.persistence
                .placed_carts
                .save(placed, ExpectedVersion::Any)
                .await?;
        }
        Ok(())
    }
}
