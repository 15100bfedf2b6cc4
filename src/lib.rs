//! Wolfelect - Consul-Backed Leader Election
//!
//! A lease-based leader elector: one process per named role wins a
//! session-bound Consul lock and runs the controlled unit of work; the
//! others stand by. Leadership is re-checked on a fixed polling interval
//! and the unit is started or stopped exactly when the verdict flips.
//!
//! # Architecture
//!
//! The elector creates a Consul session (with bounded, backed-off
//! retries), then on every tick renews it, checks the lock holder, and
//! acquires the lock when it is free. The resulting verdict drives the
//! controlled unit through the [`elector::ControlledUnit`] trait. When
//! Consul is unreachable the configured island-mode policy decides
//! whether to keep running uncoordinated or to stand down.
//!
//! # Features
//!
//! - Session lifecycle with bounded retry and exponential backoff
//! - Renew/check/acquire polling with an idempotent-acquire fast path
//! - Island-mode fallback policy for coordination-service outages
//! - Best-effort lock release and session destruction on shutdown
//! - Pluggable coordination client, controlled unit, and termination seam

pub mod config;
pub mod consul;
pub mod elector;
pub mod error;
pub mod poll;
pub mod retry;
pub mod session;

pub use config::ElectorConfig;
pub use elector::{ControlledUnit, Elector, ElectorState, TerminationHandler};
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::ElectorConfig;
    pub use crate::consul::{ConsulClient, CoordinationClient, Role, SessionId};
    pub use crate::elector::{ControlledUnit, Elector, ElectorState, TerminationHandler};
    pub use crate::error::{Error, Result};
    pub use crate::poll::Verdict;
    pub use crate::retry::RetryPolicy;
}
