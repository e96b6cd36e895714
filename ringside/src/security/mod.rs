//! Login attempt throttling.
//!
//! Failed logins are counted per client IP in a sliding window: every failure
//! pushes the window's end forward, so a client that keeps guessing stays
//! blocked until it stops for a full window. A successful login clears the
//! counter, and a background sweep drops counters whose window has passed.
//!
//! Counters live behind the [`AttemptStore`] trait. [`InMemoryAttemptStore`]
//! keeps them in process memory, which limits the throttle to a single server
//! instance; a shared cache can implement the same trait.
//!
//! ## Example
//!
//! ```
//! use ringside::security::{LoginThrottle, ThrottleConfig};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let throttle = LoginThrottle::in_memory(ThrottleConfig::default());
//!
//! let status = throttle.record_failed_attempt("203.0.113.7").await;
//! assert_eq!(status.count, 1);
//! assert_eq!(status.remaining, 4);
//! assert!(throttle.check("203.0.113.7").await.is_ok());
//!
//! throttle.clear_failed_attempts("203.0.113.7").await;
//! # }
//! ```

pub mod errors;
pub mod store;
pub mod throttle;

pub use errors::{RateLimitError, ThrottleResult};
pub use store::{AttemptCounter, AttemptStore, InMemoryAttemptStore};
pub use throttle::{AttemptStatus, LoginThrottle, ThrottleConfig};
