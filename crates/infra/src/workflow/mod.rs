//! Order and cart workflow services.
//!
//! Each operation follows the same shape: resolve the caller's grant, load,
//! decide through the aggregate, write with a version check, then run the
//! queued side effects and return the result filtered to the caller's read
//! grant. Order and cart writes for one cart happen under that cart's lock.

pub mod carts;
pub mod catalog;
pub mod news;
pub mod orders;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use campusdesk_auth::{
    authorize, authorize_widest, filter_entity, Action, AuthzError, Grant, PolicyTable, Principal,
    Resource, Scope, ScopedGrant,
};
use campusdesk_core::{AggregateRoot, CartId, DomainError, InstituteId, OrderId};
use campusdesk_orders::{
    cart_status_notification, order_status_notification, Cart, CartStatus, Order, OrderStatus,
    Parameter, ParameterCatalog, Requester,
};

use crate::effects::PostCommit;
use crate::locks::CartLocks;
use crate::mail::{MailError, MailTemplates, Mailer, TemplateKey};
use crate::store::{Persistence, StoreError};
use crate::users::UserRecord;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error("field '{0}' may not be written")]
    FieldNotWritable(String),

    #[error("only the owner may do this")]
    NotOwner,

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("{0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for WorkflowError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency { .. } => WorkflowError::Conflict(value.to_string()),
            StoreError::NotFound { collection, .. } => WorkflowError::NotFound(collection.into()),
            other => WorkflowError::Store(other),
        }
    }
}

impl From<DomainError> for WorkflowError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                WorkflowError::Validation(msg)
            }
            DomainError::InvalidTransition(msg) => WorkflowError::InvalidTransition(msg),
            DomainError::NotFound(what) => WorkflowError::NotFound(what.to_string()),
            DomainError::Conflict(msg) => WorkflowError::Conflict(msg),
            DomainError::Unauthorized => WorkflowError::NotOwner,
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

const DEFAULT_NEWS_WINDOW_DAYS: i64 = 7;

/// Everything a workflow operation needs. Cheap to clone.
#[derive(Clone)]
pub struct Workflow {
    pub persistence: Persistence,
    pub policy: Arc<PolicyTable>,
    pub mailer: Arc<dyn Mailer>,
    pub templates: Arc<MailTemplates>,
    pub locks: Arc<CartLocks>,
    pub news_window: chrono::Duration,
}

impl Workflow {
    pub fn new(
        persistence: Persistence,
        policy: PolicyTable,
        mailer: Arc<dyn Mailer>,
        templates: MailTemplates,
    ) -> Self {
        Self {
            persistence,
            policy: Arc::new(policy),
            mailer,
            templates: Arc::new(templates),
            locks: Arc::new(CartLocks::new()),
            news_window: chrono::Duration::days(DEFAULT_NEWS_WINDOW_DAYS),
        }
    }

    /// How far back the news board reaches.
    pub fn with_news_window(mut self, days: u32) -> Self {
        self.news_window = chrono::Duration::days(i64::from(days));
        self
    }

    fn widest(
        &self,
        principal: &Principal,
        resource: Resource,
        action: Action,
    ) -> WorkflowResult<ScopedGrant> {
        Ok(authorize_widest(&self.policy, principal, resource, action)?)
    }

    fn require(
        &self,
        principal: &Principal,
        resource: Resource,
        action: Action,
        scope: Scope,
    ) -> WorkflowResult<Grant> {
        Ok(authorize(&self.policy, principal, resource, action, scope)?)
    }

    /// Administrative status changes need an `any` update grant on the
    /// synthetic status resource.
    fn require_status_authority(&self, principal: &Principal) -> WorkflowResult<()> {
        self.require(
            principal,
            Resource::ChangeResourceStatus,
            Action::Update,
            Scope::Any,
        )?;
        Ok(())
    }

    async fn run_effects(&self, effects: PostCommit) -> WorkflowResult<()> {
        effects
            .run(&self.persistence, self.mailer.as_ref(), &self.templates)
            .await
    }

    async fn load_user(&self, id: &InstituteId) -> WorkflowResult<UserRecord> {
        self.persistence
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound("user".into()))
    }

    async fn parameter_catalog(&self) -> WorkflowResult<ParameterCatalog> {
        let parameters = self.persistence.parameters.find(&|_: &Parameter| true).await?;
        Ok(parameters.into_iter().map(|p| (p.id, p)).collect())
    }

    /// Re-cost an editable order against the live catalog and its owner's
    /// profile. Returns whether the order changed.
    async fn revalidate(&self, order: &mut Order) -> WorkflowResult<bool> {
        if !order.status().is_editable() {
            return Ok(false);
        }
        let service = self.persistence.services.find_by_id(&order.service()).await?;
        let parameters = self.parameter_catalog().await?;
        let owner = self.load_user(order.requested_by()).await?;
        let requester = Requester::new(&owner.institute_id, &owner.profile);
        Ok(order.revalidate(service.as_ref(), &parameters, requester))
    }

    async fn load_order(&self, id: &OrderId) -> WorkflowResult<Order> {
        self.persistence
            .orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound("order".into()))
    }

    async fn load_cart(&self, id: &CartId) -> WorkflowResult<Cart> {
        self.persistence
            .carts
            .find_by_id(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound("cart".into()))
    }

    /// Member orders of a cart, in cart order.
    async fn members(&self, cart: &Cart) -> WorkflowResult<Vec<Order>> {
        let ids = cart.orders().to_vec();
        let mut found = self
            .persistence
            .orders
            .find(&move |o: &Order| ids.contains(o.id()))
            .await?;
        found.sort_by_key(|o| {
            cart.orders()
                .iter()
                .position(|id| id == o.id())
        });
        Ok(found)
    }

    /// Queue the owner notification and, for statuses that have one, the
    /// status mail for an order transition.
    fn queue_order_effects(
        &self,
        effects: &mut PostCommit,
        order: &Order,
        owner: &UserRecord,
        actor: &InstituteId,
        with_mail: bool,
    ) {
        let status = order.status();
        effects.notify(order_status_notification(
            owner.institute_id.clone(),
            actor.clone(),
            order.service_name(),
            status,
            chrono::Utc::now(),
        ));
        if !with_mail {
            return;
        }
        let template = match status {
            OrderStatus::Ready => TemplateKey::ServiceOrderReady,
            OrderStatus::OnHold => TemplateKey::ServiceOrderOnHold,
            OrderStatus::Cancelled => TemplateKey::CancelOrder,
            _ => return,
        };
        effects.mail(
            owner.email.clone(),
            template,
            vec![
                ("name", owner.name.clone()),
                ("orderId", order.cart_id().to_string()),
                ("serviceName", order.service_name().to_string()),
                ("holdReason", order.hold_reason().unwrap_or_default().to_string()),
                ("cancelReason", order.cancel_reason().unwrap_or_default().to_string()),
            ],
        );
    }

    /// One notification and one mail per cart transition.
    fn queue_cart_effects(
        &self,
        effects: &mut PostCommit,
        cart: &Cart,
        owner: &UserRecord,
        actor: &InstituteId,
    ) {
        let status = cart.status();
        effects.notify(cart_status_notification(
            owner.institute_id.clone(),
            actor.clone(),
            cart.orders().len(),
            status,
            chrono::Utc::now(),
        ));
        let template = match status {
            CartStatus::Placed => TemplateKey::CartPlaced,
            CartStatus::Processing => TemplateKey::CartAccepted,
            CartStatus::ReadyToDeliver => TemplateKey::OrderReadyDelivery,
            CartStatus::ReadyToPickup => TemplateKey::OrderReadyPickup,
            CartStatus::Completed => TemplateKey::CartCompleted,
            CartStatus::Cancelled => TemplateKey::CancelCart,
            CartStatus::Unplaced => return,
        };
        effects.mail(
            owner.email.clone(),
            template,
            vec![
                ("name", owner.name.clone()),
                ("orderId", cart.id().to_string()),
                ("cartLength", cart.orders().len().to_string()),
                ("totalCost", cart.total_cost().to_string()),
                ("cancelReason", cart.cancel_reason().unwrap_or_default().to_string()),
            ],
        );
    }
}

/// Reject writes to fields outside the grant's allowlist.
fn check_writable(grant: &Grant, fields: &[&str]) -> WorkflowResult<()> {
    match fields.iter().find(|f| !grant.attributes.allows(f)) {
        Some(field) => Err(WorkflowError::FieldNotWritable(field.to_string())),
        None => Ok(()),
    }
}

fn shape<T: Serialize + ?Sized>(entity: &T, grant: &Grant) -> WorkflowResult<JsonValue> {
    Ok(filter_entity(entity, &grant.attributes)?)
}

#[cfg(test)]
pub(crate) mod testkit;
