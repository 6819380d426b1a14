//! Retry pacing.
//!
//! A [`BackoffStrategy`] schedules a single retry operation after a delay and
//! keeps at most one schedule outstanding. [`TimeoutBackoff`] implements the
//! scheduling half on top of tokio timers and defers the delay growth to a
//! [`DelayPolicy`]; [`LinearDelay`] grows the delay by a fixed step and gives
//! up once it reaches a ceiling.

mod error;
mod linear;
mod strategy;
mod timeout;

pub use error::BackoffError;
pub use linear::{LinearDelay, LinearTimeoutBackoff};
pub use strategy::{BackoffStrategy, BoxFuture, RetryOperation};
pub use timeout::{DelayPolicy, TimeoutBackoff};
