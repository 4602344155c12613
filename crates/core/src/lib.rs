//! `campusdesk-core`: identifiers, errors and aggregate building blocks.
//!
//! Pure domain primitives; nothing here performs IO.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    CartId, CollectorId, CourierId, InstituteId, NewsId, NotificationId, OrderId, ParameterId,
    ServiceId,
};
