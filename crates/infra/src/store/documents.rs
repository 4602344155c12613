//! Collection bindings for the domain documents.

use campusdesk_core::{
    AggregateRoot, CartId, CollectorId, CourierId, Entity, NewsId, NotificationId, OrderId,
    ParameterId, ServiceId,
};
use campusdesk_orders::{
    Cart, Collector, Courier, News, Notification, Order, Parameter, PlacedCart, PlacedOrder,
    Service,
};

use super::Document;

impl Document for Order {
    type Key = OrderId;
    const COLLECTION: &'static str = "orders";

    fn key(&self) -> OrderId {
        *self.id()
    }

    fn revision(&self) -> u64 {
        self.version()
    }
}

impl Document for Cart {
    type Key = CartId;
    const COLLECTION: &'static str = "carts";

    fn key(&self) -> CartId {
        *self.id()
    }

    fn revision(&self) -> u64 {
        self.version()
    }
}

macro_rules! entity_document {
    ($t:ty, $key:ty, $collection:literal) => {
        impl Document for $t {
            type Key = $key;
            const COLLECTION: &'static str = $collection;

            fn key(&self) -> $key {
                *Entity::id(self)
            }
        }
    };
}

entity_document!(Service, ServiceId, "services");
entity_document!(Parameter, ParameterId, "parameters");
entity_document!(Notification, NotificationId, "notifications");
entity_document!(News, NewsId, "news");
entity_document!(PlacedOrder, OrderId, "placedOrders");
entity_document!(PlacedCart, CartId, "placedCarts");
entity_document!(Courier, CourierId, "couriers");
entity_document!(Collector, CollectorId, "collectors");
