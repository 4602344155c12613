//! Order and cart workflow (pure domain logic).
//!
//! Orders and carts are coupled status machines. Everything here is
//! deterministic: no IO, no HTTP, no storage. The infra crate loads
//! documents, runs commands through [`campusdesk_events::execute`] and turns
//! the resulting events into notifications and mail.

pub mod cart;
pub mod catalog;
pub mod handoff;
pub mod ledger;
pub mod news;
pub mod notification;
pub mod order;

pub use cart::{
    derived_status, AddOrderToCart, AdvanceCart, CancelCart, Cart, CartCommand, CartEvent,
    CartPatch, CartStatus, CartStatusChanged, CollectionCategory, PlaceCart, RecomputeCart,
    RemoveOrderFromCart, ReviseCart, ALL_ORDERS_CANCELLED,
};
pub use catalog::{
    CostError, InstitutionalProfile, Parameter, ParameterCatalog, Requester, Service,
    ServiceChanges, ANY_VALUE,
};
pub use handoff::{Collector, Courier, HandoffStatus};
pub use ledger::{PlacedCart, PlacedOrder};
pub use news::{sort_newest_first, News, NewsDraft};
pub use notification::{cart_status_notification, order_status_notification, Notification};
pub use order::{
    check_unit_cap, committed_units, AdvanceOrder, CancelOrder, ChangeOrderStatus, Order,
    OrderCommand, OrderDraft, OrderEvent, OrderPatch, OrderStatus, OrderStatusChanged,
    ReviseOrder, StatusStamp,
};
