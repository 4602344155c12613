//! Domain events emitted by order and cart transitions.
//!
//! Events are the hand-off point between the pure state machines and the
//! post-commit side effects (notifications, mail).

pub mod event;
pub mod handler;

pub use event::Event;
pub use handler::execute;
