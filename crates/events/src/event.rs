use chrono::{DateTime, Utc};

use campusdesk_core::InstituteId;

/// A fact produced by an order or cart transition.
///
/// Events are immutable and carry the actor responsible for them, so every
/// `statusChangeTime` stamp and notification can name who (or `system`)
/// caused the change.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. "order.status_changed").
    fn event_type(&self) -> &'static str;

    /// When the transition happened.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Who performed it.
    fn actor(&self) -> &InstituteId;
}
