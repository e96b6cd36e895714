//! User notifications and the in-process event bus.
//!
//! Financial operations publish events only after their database transaction
//! commits. Delivery is best effort: a failed insert or a lagging subscriber is
//! logged and never turns a committed bet or payment into an error.

pub mod dispatcher;
pub mod models;

pub use dispatcher::{EVENT_BUFFER, NotificationDispatcher};
pub use models::{Event, Notification, NotificationKind};
