//! In-memory workflow fixtures and end-to-end workflow tests.

use std::sync::Arc;

use chrono::Utc;

use campusdesk_auth::{PolicyTable, Principal, Role};
use campusdesk_core::{AggregateRoot, CartId, InstituteId, OrderId, ParameterId, ServiceId};
use campusdesk_orders::{
    Cart, InstitutionalProfile, Order, OrderDraft, Parameter, Service, ANY_VALUE,
};

use super::Workflow;
use crate::mail::{InMemoryMailer, MailTemplates};
use crate::store::Persistence;
use crate::users::UserRecord;

pub(crate) const STUDENT: &str = "201501001";
pub(crate) const STAFF: &str = "staff042";

pub(crate) struct Kit {
    pub workflow: Workflow,
    pub mailer: Arc<InMemoryMailer>,
}

impl Kit {
    pub fn new() -> Self {
        let mailer = Arc::new(InMemoryMailer::new());
        let workflow = Workflow::new(
            Persistence::in_memory(),
            PolicyTable::builtin().clone(),
            mailer.clone(),
            MailTemplates::builtin().expect("built-in templates"),
        );
        Self { workflow, mailer }
    }

    async fn seed_user(&self, id: &str, role: Role, profile: InstitutionalProfile) -> Principal {
        let institute_id = InstituteId::new(id);
        let cart = Cart::new(CartId::new(), institute_id.clone(), Utc::now());
        let user = UserRecord {
            institute_id,
            name: format!("User {id}"),
            email: format!("{id}@campus.example"),
            role,
            cart_id: *cart.id(),
            profile,
            is_active: true,
            created_on: Utc::now(),
        };
        let principal = user.principal();
        self.workflow.persistence.carts.create(cart).await.unwrap();
        self.workflow.persistence.users.create(user).await.unwrap();
        principal
    }

    pub async fn student(&self, id: &str) -> Principal {
        let profile = InstitutionalProfile {
            user_type: Some("STUDENT".into()),
            user_status: Some("C".into()),
            batch: Some("2015".into()),
            programme: Some("B.Tech".into()),
            email: None,
        };
        self.seed_user(id, Role::Student, profile).await
    }

    pub async fn admin(&self) -> Principal {
        let profile = InstitutionalProfile {
            user_type: Some("STAFF".into()),
            user_status: Some("U".into()),
            ..InstitutionalProfile::default()
        };
        self.seed_user(STAFF, Role::Admin, profile).await
    }

    pub async fn service(&self, name: &str, max_units: i64, base_charge: u64) -> Service {
        let service = Service {
            id: ServiceId::new(),
            name: name.into(),
            description: String::new(),
            is_active: true,
            is_special_service: false,
            special_service_users: Vec::new(),
            max_units,
            base_charge,
            available_parameters: None,
            allowed_batches: vec![ANY_VALUE.into()],
            allowed_programmes: vec![ANY_VALUE.into()],
            allowed_user_status: vec![ANY_VALUE.into()],
            collection_types: Vec::new(),
            available_payment_modes: Vec::new(),
            created_on: Utc::now(),
            created_by: None,
        };
        self.workflow
            .persistence
            .services
            .create(service)
            .await
            .unwrap()
    }

    pub async fn parameter(&self, name: &str, base_charge: u64, is_active: bool) -> Parameter {
        let parameter = Parameter {
            id: ParameterId::new(),
            name: name.into(),
            description: String::new(),
            base_charge,
            is_active,
            created_on: Utc::now(),
        };
        self.workflow
            .persistence
            .parameters
            .create(parameter)
            .await
            .unwrap()
    }

    /// Add an order and return its id.
    pub async fn order(&self, who: &Principal, service: &Service, units: i64) -> OrderId {
        let created = self
            .workflow
            .add_order(who, draft(service, units))
            .await
            .unwrap();
        created["_id"].as_str().unwrap().parse().unwrap()
    }

    /// Place the student's cart and have staff accept it.
    pub async fn process(&self, student: &Principal, staff: &Principal) -> CartId {
        self.workflow.place_cart(student).await.unwrap();
        let cart_id = self.user_cart(student).await;
        self.workflow.accept_cart(staff, cart_id).await.unwrap();
        cart_id
    }

    pub async fn user_cart(&self, who: &Principal) -> CartId {
        self.workflow
            .persistence
            .users
            .find_by_id(&who.institute_id)
            .await
            .unwrap()
            .unwrap()
            .cart_id
    }

    pub async fn cart(&self, id: CartId) -> Cart {
        self.workflow
            .persistence
            .carts
            .find_by_id(&id)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn stored_order(&self, id: OrderId) -> Option<Order> {
        self.workflow.persistence.orders.find_by_id(&id).await.unwrap()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.mailer.sent().into_iter().map(|m| m.subject).collect()
    }
}

/// Super admins manage the catalog and the news board without a stored
/// user record.
pub(crate) fn super_admin(id: &str) -> Principal {
    Principal::new(InstituteId::new(id), Role::SuperAdmin)
}

pub(crate) fn draft(service: &Service, units: i64) -> OrderDraft {
    OrderDraft {
        service: service.id,
        parameters: Vec::new(),
        units_requested: units,
        comment: None,
        collection_type: None,
        payment_type: None,
        is_payment_done: None,
        payment_id: None,
        delivery: None,
        pickup: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowError;
    use campusdesk_core::{CourierId, ExpectedVersion};
    use campusdesk_orders::{
        CartPatch, CartStatus, Courier, HandoffStatus, OrderPatch, OrderStatus,
        ALL_ORDERS_CANCELLED,
    };

    #[tokio::test]
    async fn unit_cap_counts_units_already_in_the_cart() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let svc = kit.service("Transcript", 5, 40).await;

        kit.workflow.add_order(&student, draft(&svc, 3)).await.unwrap();
        let err = kit
            .workflow
            .add_order(&student, draft(&svc, 3))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Validation(_)));
        let cart = kit.cart(kit.user_cart(&student).await).await;
        assert_eq!(cart.orders().len(), 1);
    }

    #[tokio::test]
    async fn inactive_parameter_makes_the_order_invalid() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let svc = kit.service("Transcript", 5, 40).await;
        let sealed = kit.parameter("Sealed envelope", 10, false).await;

        let mut request = draft(&svc, 2);
        request.parameters = vec![sealed.id];
        let created = kit.workflow.add_order(&student, request).await.unwrap();

        assert_eq!(created["status"], "invalidOrder");
        assert_eq!(created["totalCost"], 0);
        let reason = created["validityErrors"][0].as_str().unwrap();
        assert!(reason.contains("Sealed envelope"));
        assert!(reason.contains("not active"));
    }

    #[tokio::test]
    async fn valid_order_is_costed_with_its_parameters() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let svc = kit.service("Transcript", 5, 40).await;
        let courier = kit.parameter("Courier copy", 15, true).await;

        let mut request = draft(&svc, 2);
        request.parameters = vec![courier.id];
        let created = kit.workflow.add_order(&student, request).await.unwrap();

        assert_eq!(created["status"], "unplaced");
        assert_eq!(created["serviceCost"], 80);
        assert_eq!(created["parameterCost"], 30);
        assert_eq!(created["totalCost"], 110);
    }

    #[tokio::test]
    async fn deactivated_service_is_caught_on_read() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let mut svc = kit.service("Transcript", 5, 40).await;
        let id = kit.order(&student, &svc, 1).await;

        svc.is_active = false;
        kit.workflow
            .persistence
            .services
            .save(svc, ExpectedVersion::Any)
            .await
            .unwrap();

        let order = kit.workflow.get_order(&student, id).await.unwrap();
        assert_eq!(order["status"], "invalidOrder");
        assert_eq!(
            kit.stored_order(id).await.unwrap().status(),
            OrderStatus::InvalidOrder
        );

        let err = kit.workflow.place_cart(&student).await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn cart_becomes_ready_only_when_every_sibling_is_ready() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let staff = kit.admin().await;
        let svc = kit.service("Transcript", 5, 40).await;
        let first = kit.order(&student, &svc, 1).await;
        let second = kit.order(&student, &svc, 1).await;
        let cart_id = kit.process(&student, &staff).await;

        kit.workflow
            .change_status(&staff, first, OrderStatus::Ready, None)
            .await
            .unwrap();
        assert_eq!(kit.cart(cart_id).await.status(), CartStatus::Processing);

        kit.workflow
            .change_status(&staff, second, OrderStatus::Ready, None)
            .await
            .unwrap();
        let cart = kit.cart(cart_id).await;
        assert_eq!(cart.status(), CartStatus::ReadyToPickup);
        assert!(cart.stamp(CartStatus::ReadyToPickup).unwrap().by.is_system());

        let subjects = kit.subjects();
        assert_eq!(
            subjects.iter().filter(|s| s.contains("is ready")).count(),
            2
        );
        assert_eq!(
            subjects.iter().filter(|s| s.contains("ready for pickup")).count(),
            1
        );
    }

    #[tokio::test]
    async fn concurrent_sibling_transitions_derive_the_cart_once() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let staff = kit.admin().await;
        let svc = kit.service("Transcript", 5, 40).await;
        let first = kit.order(&student, &svc, 1).await;
        let second = kit.order(&student, &svc, 1).await;
        let cart_id = kit.process(&student, &staff).await;

        let (a, b) = tokio::join!(
            kit.workflow
                .change_status(&staff, first, OrderStatus::Ready, None),
            kit.workflow
                .change_status(&staff, second, OrderStatus::Ready, None),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(kit.cart(cart_id).await.status(), CartStatus::ReadyToPickup);
        let ready_mails = kit
            .subjects()
            .into_iter()
            .filter(|s| s.contains("ready for pickup"))
            .count();
        assert_eq!(ready_mails, 1);
    }

    #[tokio::test]
    async fn completed_order_rejects_owner_edits() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let staff = kit.admin().await;
        let svc = kit.service("Transcript", 5, 40).await;
        let id = kit.order(&student, &svc, 1).await;
        let cart_id = kit.process(&student, &staff).await;
        kit.workflow
            .change_status(&staff, id, OrderStatus::Ready, None)
            .await
            .unwrap();
        kit.workflow.complete_cart(&staff, cart_id).await.unwrap();

        let patch = OrderPatch {
            comment: Some("thanks".into()),
            ..OrderPatch::default()
        };
        let err = kit
            .workflow
            .update_order(&student, id, patch)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::InvalidTransition(_)));
        let order = kit.stored_order(id).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Completed);
        assert_eq!(order.comment(), None);
        assert_eq!(kit.cart(cart_id).await.status(), CartStatus::Completed);
    }

    #[tokio::test]
    async fn new_order_after_completion_starts_a_fresh_cart_cycle() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let staff = kit.admin().await;
        let svc = kit.service("Transcript", 1, 40).await;
        let first = kit.order(&student, &svc, 1).await;
        let cart_id = kit.process(&student, &staff).await;
        kit.workflow
            .change_status(&staff, first, OrderStatus::Ready, None)
            .await
            .unwrap();
        kit.workflow.complete_cart(&staff, cart_id).await.unwrap();

        let second = kit.order(&student, &svc, 1).await;

        let cart = kit.cart(cart_id).await;
        assert_eq!(cart.status(), CartStatus::Unplaced);
        assert_eq!(cart.orders(), &[second]);
    }

    #[tokio::test]
    async fn a_finished_cart_still_enforces_the_unit_cap() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let staff = kit.admin().await;
        let svc = kit.service("Transcript", 5, 40).await;
        let first = kit.order(&student, &svc, 1).await;
        let cart_id = kit.process(&student, &staff).await;
        kit.workflow
            .change_status(&staff, first, OrderStatus::Ready, None)
            .await
            .unwrap();
        kit.workflow.complete_cart(&staff, cart_id).await.unwrap();

        let err = kit
            .workflow
            .add_order(&student, draft(&svc, 6))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(kit.cart(cart_id).await.status(), CartStatus::Completed);

        kit.order(&student, &svc, 5).await;
        assert_eq!(kit.cart(cart_id).await.status(), CartStatus::Unplaced);
    }

    #[tokio::test]
    async fn unit_changes_are_held_to_the_cart_cap() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let svc = kit.service("Transcript", 5, 40).await;
        let id = kit.order(&student, &svc, 1).await;
        kit.order(&student, &svc, 2).await;

        let patch = OrderPatch {
            units_requested: Some(i64::MAX),
            ..OrderPatch::default()
        };
        let err = kit
            .workflow
            .update_order(&student, id, patch)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(kit.stored_order(id).await.unwrap().units_requested(), 1);

        let patch = OrderPatch {
            units_requested: Some(3),
            ..OrderPatch::default()
        };
        let updated = kit.workflow.update_order(&student, id, patch).await.unwrap();
        assert_eq!(updated["unitsRequested"], 3);

        let err = kit
            .workflow
            .add_order(&student, draft(&svc, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn zero_units_on_update_are_recorded_as_invalid() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let svc = kit.service("Transcript", 5, 40).await;
        let id = kit.order(&student, &svc, 2).await;

        let patch = OrderPatch {
            units_requested: Some(0),
            ..OrderPatch::default()
        };
        let updated = kit.workflow.update_order(&student, id, patch).await.unwrap();

        assert_eq!(updated["status"], "invalidOrder");
        assert_eq!(updated["totalCost"], 0);
        assert_eq!(
            updated["validityErrors"][0],
            "requested units must be between 1 and 5 (got 0)"
        );
    }

    #[tokio::test]
    async fn cancelling_every_order_cancels_the_cart() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let staff = kit.admin().await;
        let svc = kit.service("Transcript", 5, 40).await;
        let first = kit.order(&student, &svc, 1).await;
        let second = kit.order(&student, &svc, 1).await;
        let cart_id = kit.process(&student, &staff).await;

        kit.workflow
            .cancel_order(&staff, first, "Duplicate request".into())
            .await
            .unwrap();
        assert_eq!(kit.cart(cart_id).await.status(), CartStatus::Processing);

        kit.workflow
            .cancel_order(&staff, second, "Duplicate request".into())
            .await
            .unwrap();

        let cart = kit.cart(cart_id).await;
        assert_eq!(cart.status(), CartStatus::Cancelled);
        assert_eq!(cart.cancel_reason(), Some(ALL_ORDERS_CANCELLED));
        assert!(cart.stamp(CartStatus::Cancelled).unwrap().by.is_system());

        let cart_mail = format!("Your cart {cart_id} was cancelled");
        assert_eq!(
            kit.subjects().iter().filter(|s| **s == cart_mail).count(),
            1
        );

        let ledger = kit
            .workflow
            .persistence
            .placed_orders
            .find_by_id(&first)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ledger.status, OrderStatus::Cancelled);
        assert_eq!(ledger.cancel_reason.as_deref(), Some("Duplicate request"));
        let placed_cart = kit
            .workflow
            .persistence
            .placed_carts
            .find_by_id(&cart_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(placed_cart.status, CartStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancelling_a_cart_withdraws_its_courier() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let staff = kit.admin().await;
        let svc = kit.service("Transcript", 5, 40).await;
        let courier = Courier {
            id: CourierId::new(),
            requested_by: student.institute_id.clone(),
            name: "R. Iyer".into(),
            address: "12 Hostel Road".into(),
            contact: None,
            status: HandoffStatus::Active,
            last_modified: Utc::now(),
        };
        let courier_id = courier.id;
        kit.workflow
            .persistence
            .couriers
            .create(courier)
            .await
            .unwrap();

        let id = kit.order(&student, &svc, 1).await;
        let patch = CartPatch {
            delivery: Some(courier_id),
            ..CartPatch::default()
        };
        kit.workflow.update_cart(&student, patch).await.unwrap();
        let cart_id = kit.process(&student, &staff).await;

        kit.workflow
            .cancel_cart(&staff, cart_id, "Fee not received".into())
            .await
            .unwrap();

        let cart = kit.cart(cart_id).await;
        assert_eq!(cart.status(), CartStatus::Cancelled);
        assert_eq!(cart.cancel_reason(), Some("Fee not received"));
        assert_eq!(
            kit.stored_order(id).await.unwrap().status(),
            OrderStatus::Cancelled
        );
        let courier = kit
            .workflow
            .persistence
            .couriers
            .find_by_id(&courier_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(courier.status, HandoffStatus::Cancelled);
    }

    #[tokio::test]
    async fn delivery_carts_become_ready_to_deliver() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let staff = kit.admin().await;
        let svc = kit.service("Transcript", 5, 40).await;
        let id = kit.order(&student, &svc, 1).await;
        let patch = CartPatch {
            delivery: Some(CourierId::new()),
            ..CartPatch::default()
        };
        kit.workflow.update_cart(&student, patch).await.unwrap();
        let cart_id = kit.process(&student, &staff).await;

        kit.workflow
            .change_status(&staff, id, OrderStatus::Ready, None)
            .await
            .unwrap();

        assert_eq!(kit.cart(cart_id).await.status(), CartStatus::ReadyToDeliver);
        assert!(kit.subjects().iter().any(|s| s.contains("ready for dispatch")));
    }

    #[tokio::test]
    async fn staff_listing_hides_unplaced_orders() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let staff = kit.admin().await;
        let svc = kit.service("Transcript", 5, 40).await;
        let id = kit.order(&student, &svc, 1).await;

        let all = kit.workflow.list_orders(&staff, None).await.unwrap();
        assert!(all.as_array().unwrap().is_empty());
        let unplaced = kit
            .workflow
            .list_orders(&staff, Some(OrderStatus::Unplaced))
            .await
            .unwrap();
        assert!(unplaced.as_array().unwrap().is_empty());
        let err = kit.workflow.get_order(&staff, id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));

        let own = kit.workflow.list_orders(&student, None).await.unwrap();
        assert_eq!(own.as_array().unwrap().len(), 1);

        kit.workflow.place_cart(&student).await.unwrap();
        let placed = kit.workflow.list_orders(&staff, None).await.unwrap();
        assert_eq!(placed.as_array().unwrap().len(), 1);
        assert_eq!(placed[0]["status"], "placed");
    }

    #[tokio::test]
    async fn students_never_see_each_others_orders() {
        let kit = Kit::new();
        let alice = kit.student(STUDENT).await;
        let bob = kit.student("201501002").await;
        let svc = kit.service("Transcript", 5, 40).await;
        let id = kit.order(&alice, &svc, 1).await;

        let listed = kit.workflow.list_orders(&bob, None).await.unwrap();
        assert!(listed.as_array().unwrap().is_empty());
        let err = kit.workflow.get_order(&bob, id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    #[tokio::test]
    async fn acknowledging_a_hold_resumes_processing() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let staff = kit.admin().await;
        let svc = kit.service("Transcript", 5, 40).await;
        let id = kit.order(&student, &svc, 1).await;
        let cart_id = kit.process(&student, &staff).await;

        let held = kit
            .workflow
            .change_status(&staff, id, OrderStatus::OnHold, Some("Upload the fee receipt".into()))
            .await
            .unwrap();
        assert_eq!(held["status"], "onHold");
        assert_eq!(held["holdReason"], "Upload the fee receipt");
        assert!(kit.subjects().iter().any(|s| s.starts_with("Action needed")));

        let more_units = OrderPatch {
            units_requested: Some(2),
            ..OrderPatch::default()
        };
        let err = kit
            .workflow
            .update_order(&student, id, more_units)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition(_)));

        let ack = OrderPatch {
            comment: Some("Receipt uploaded".into()),
            ..OrderPatch::default()
        };
        let resumed = kit.workflow.update_order(&student, id, ack).await.unwrap();
        assert_eq!(resumed["status"], "processing");
        assert_eq!(resumed["comment"], "Receipt uploaded");
        assert_eq!(kit.cart(cart_id).await.status(), CartStatus::Processing);
    }

    #[tokio::test]
    async fn hold_requires_a_reason() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let staff = kit.admin().await;
        let svc = kit.service("Transcript", 5, 40).await;
        let id = kit.order(&student, &svc, 1).await;
        kit.process(&student, &staff).await;

        let err = kit
            .workflow
            .change_status(&staff, id, OrderStatus::OnHold, Some("  ".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(
            kit.stored_order(id).await.unwrap().status(),
            OrderStatus::Processing
        );
    }

    #[tokio::test]
    async fn students_cannot_change_status() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let svc = kit.service("Transcript", 5, 40).await;
        let id = kit.order(&student, &svc, 1).await;

        let err = kit
            .workflow
            .change_status(&student, id, OrderStatus::Ready, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
        let err = kit
            .workflow
            .cancel_order(&student, id, "changed my mind".into())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
    }

    #[tokio::test]
    async fn writes_outside_the_update_allowlist_are_rejected() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let staff = kit.admin().await;
        let svc = kit.service("Transcript", 5, 40).await;
        let id = kit.order(&student, &svc, 1).await;

        let patch = OrderPatch {
            comment: Some("staff note".into()),
            ..OrderPatch::default()
        };
        let err = kit
            .workflow
            .update_order(&staff, id, patch)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::FieldNotWritable(ref f) if f == "comment"));
    }

    #[tokio::test]
    async fn owner_deletes_unplaced_orders_only() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let other = kit.student("201501002").await;
        let staff = kit.admin().await;
        let svc = kit.service("Transcript", 5, 40).await;
        let doomed = kit.order(&student, &svc, 1).await;

        let err = kit.workflow.delete_order(&other, doomed).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
        let patch = OrderPatch {
            comment: Some("mine now".into()),
            ..OrderPatch::default()
        };
        let err = kit
            .workflow
            .update_order(&other, doomed, patch)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));

        kit.workflow.delete_order(&student, doomed).await.unwrap();
        assert!(kit.stored_order(doomed).await.is_none());
        let cart_id = kit.user_cart(&student).await;
        assert!(kit.cart(cart_id).await.orders().is_empty());

        let kept = kit.order(&student, &svc, 1).await;
        kit.process(&student, &staff).await;
        let err = kit.workflow.delete_order(&student, kept).await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn placing_writes_the_ledger_and_mails_the_owner() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let svc = kit.service("Transcript", 5, 40).await;
        let id = kit.order(&student, &svc, 2).await;

        let placed = kit.workflow.place_cart(&student).await.unwrap();
        assert_eq!(placed["status"], "placed");
        assert_eq!(placed["ordersCost"], 80);

        let ledger = kit
            .workflow
            .persistence
            .placed_orders
            .find_by_id(&id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ledger.total_cost, 80);
        assert_eq!(
            kit.stored_order(id).await.unwrap().status(),
            OrderStatus::Placed
        );
        let cart_id = kit.user_cart(&student).await;
        assert_eq!(
            kit.subjects(),
            vec![format!("We received your cart {cart_id}")]
        );
    }

    #[tokio::test]
    async fn empty_cart_cannot_be_placed() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let err = kit.workflow.place_cart(&student).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn services_are_listed_by_visibility() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let invited = kit.student("201501002").await;
        let staff = kit.admin().await;
        kit.service("Transcript", 5, 40).await;
        let mut retired = kit.service("Migration certificate", 1, 100).await;
        retired.is_active = false;
        kit.workflow
            .persistence
            .services
            .save(retired, ExpectedVersion::Any)
            .await
            .unwrap();
        let mut special = kit.service("Degree re-issue", 1, 500).await;
        special.is_special_service = true;
        special.special_service_users = vec![invited.institute_id.clone()];
        kit.workflow
            .persistence
            .services
            .save(special, ExpectedVersion::Any)
            .await
            .unwrap();

        let names = |listed: serde_json::Value| -> Vec<String> {
            listed
                .as_array()
                .unwrap()
                .iter()
                .map(|s| s["name"].as_str().unwrap().to_string())
                .collect()
        };

        let for_student = kit.workflow.list_services(&student).await.unwrap();
        assert!(for_student[0].get("isActive").is_none());
        assert_eq!(names(for_student), vec!["Transcript"]);
        assert_eq!(
            names(kit.workflow.list_services(&invited).await.unwrap()),
            vec!["Degree re-issue", "Transcript"]
        );
        assert_eq!(
            names(kit.workflow.list_services(&staff).await.unwrap()),
            vec!["Migration certificate", "Transcript"]
        );
    }
}
