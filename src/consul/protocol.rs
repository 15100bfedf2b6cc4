//! Consul Wire Types
//!
//! Request and response bodies for the session and KV endpoints, matching
//! the shapes a Consul-compatible backend expects.

use serde::{Deserialize, Serialize};

/// Consul enforces a minimum session TTL of 10 seconds
pub const MIN_TTL_SECS: u64 = 10;

/// Body of `PUT /v1/session/create`
#[derive(Debug, Clone, Serialize)]
pub struct SessionCreateRequest {
    #[serde(rename = "Name")]
    pub name: String,

    /// TTL with unit suffix, e.g. "60s"
    #[serde(rename = "TTL")]
    pub ttl: String,

    /// Lock delay with unit suffix, e.g. "0s"
    #[serde(rename = "LockDelay")]
    pub lock_delay: String,
}

impl SessionCreateRequest {
    /// Build a request, clamping the TTL to the service minimum and the
    /// lock delay to zero.
    pub fn new(name: &str, ttl_secs: u64, lock_delay_secs: u64) -> Self {
        Self {
            name: name.to_string(),
            ttl: format!("{}s", ttl_secs.max(MIN_TTL_SECS)),
            lock_delay: format!("{}s", lock_delay_secs),
        }
    }
}

/// Body of a successful `PUT /v1/session/create`
#[derive(Debug, Clone, Deserialize)]
pub struct SessionCreateResponse {
    #[serde(rename = "ID")]
    pub id: String,
}

/// One entry of a `GET /v1/kv/...` response; only the lock-holding session
/// is of interest here.
#[derive(Debug, Clone, Deserialize)]
pub struct KvPair {
    #[serde(rename = "Session")]
    pub session: Option<String>,
}

/// Extract the holder of the lock key from a KV read response.
///
/// Consul returns an array; an empty array, a missing `Session` field, or
/// a 404 upstream all mean the lock is currently unheld.
pub fn lock_holder(pairs: &[KvPair]) -> Option<&str> {
    pairs.first().and_then(|pair| pair.session.as_deref())
}
