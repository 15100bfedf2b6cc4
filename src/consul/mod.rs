//! Coordination-Service Client
//!
//! The elector talks to Consul through the [`CoordinationClient`] trait:
//! sessions (server-side leases) and a session-bound KV lock per role.
//! [`client::ConsulClient`] is the HTTP implementation; tests script the
//! trait directly.

pub mod client;
pub mod protocol;

use async_trait::async_trait;

use crate::error::Result;

pub use client::ConsulClient;

/// Opaque session token issued by the coordination service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named leadership role; one elector instance guards exactly one role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    service_name: String,
}

impl Role {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// KV path of the lock contested for this role
    pub fn lock_path(&self) -> String {
        format!("service/{}/leader", self.service_name)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.service_name)
    }
}

/// Operations the elector requires from the coordination service.
///
/// Every operation is fallible and must report failures as errors, never
/// panic past this boundary. Implementations are expected to bound each
/// call with a timeout.
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Create a session for `role` with the given TTL and lock delay
    async fn create_session(
        &self,
        role: &Role,
        ttl_secs: u64,
        lock_delay_secs: u64,
    ) -> Result<SessionId>;

    /// Renew a session; true iff the service reports it alive
    async fn renew_session(&self, session: &SessionId) -> Result<bool>;

    /// Read-only lookup of the session currently holding the role's lock
    async fn get_lock_holder(&self, role: &Role) -> Result<Option<SessionId>>;

    /// Acquire the role's lock; idempotent if already held by `session`
    async fn acquire_lock(&self, role: &Role, session: &SessionId) -> Result<bool>;

    /// Release the role's lock
    async fn release_lock(&self, role: &Role, session: &SessionId) -> Result<bool>;

    /// Destroy a session, invalidating any lock it holds
    async fn destroy_session(&self, session: &SessionId) -> Result<bool>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted in-memory client for state-machine and poller tests.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::error::Error;

    fn transport_failure() -> Error {
        Error::Protocol {
            status: 500,
            body: "scripted failure".to_string(),
        }
    }

    /// Scripted outcome of a fallible boolean call
    #[derive(Debug, Clone, Copy)]
    pub enum BoolScript {
        Ok(bool),
        Fail,
    }

    /// Scripted outcome of `get_lock_holder`
    #[derive(Debug, Clone)]
    pub enum HolderScript {
        Holder(String),
        NoHolder,
        Fail,
    }

    pub struct MockConsul {
        /// Session ids handed out by successive create calls; `None` scripts
        /// a failure for that attempt.
        pub sessions: Mutex<Vec<Option<String>>>,
        pub renew: Mutex<Vec<BoolScript>>,
        pub holder: Mutex<Vec<HolderScript>>,
        pub acquire: Mutex<Vec<BoolScript>>,
        pub release_result: BoolScript,
        pub destroy_result: BoolScript,

        pub create_calls: AtomicUsize,
        pub renew_calls: AtomicUsize,
        pub holder_calls: AtomicUsize,
        pub acquire_calls: AtomicUsize,
        pub release_calls: AtomicUsize,
        pub destroy_calls: AtomicUsize,
    }

    impl Default for MockConsul {
        fn default() -> Self {
            Self {
                sessions: Mutex::new(Vec::new()),
                renew: Mutex::new(Vec::new()),
                holder: Mutex::new(Vec::new()),
                acquire: Mutex::new(Vec::new()),
                release_result: BoolScript::Ok(true),
                destroy_result: BoolScript::Ok(true),
                create_calls: AtomicUsize::new(0),
                renew_calls: AtomicUsize::new(0),
                holder_calls: AtomicUsize::new(0),
                acquire_calls: AtomicUsize::new(0),
                release_calls: AtomicUsize::new(0),
                destroy_calls: AtomicUsize::new(0),
            }
        }
    }

    impl MockConsul {
        /// Client that hands out one session and then answers every renew,
        /// holder lookup, and acquire with the given script, repeating the
        /// last entry once the script runs out.
        pub fn with_session(id: &str) -> Self {
            let mock = Self::default();
            mock.sessions.lock().unwrap().push(Some(id.to_string()));
            mock
        }

        /// Client whose create calls always fail
        pub fn always_failing_create(tries: usize) -> Self {
            let mock = Self::default();
            mock.sessions.lock().unwrap().extend(vec![None; tries]);
            mock
        }

        fn next_bool(script: &Mutex<Vec<BoolScript>>, default: bool) -> Result<bool> {
            let mut script = script.lock().unwrap();
            let step = if script.len() > 1 {
                script.remove(0)
            } else {
                script.first().copied().unwrap_or(BoolScript::Ok(default))
            };
            match step {
                BoolScript::Ok(value) => Ok(value),
                BoolScript::Fail => Err(transport_failure()),
            }
        }
    }

    #[async_trait]
    impl CoordinationClient for MockConsul {
        async fn create_session(
            &self,
            _role: &Role,
            _ttl_secs: u64,
            _lock_delay_secs: u64,
        ) -> Result<SessionId> {
            let call = self.create_calls.fetch_add(1, Ordering::SeqCst);
            let sessions = self.sessions.lock().unwrap();
            match sessions.get(call) {
                Some(Some(id)) => Ok(SessionId(id.clone())),
                _ => Err(transport_failure()),
            }
        }

        async fn renew_session(&self, _session: &SessionId) -> Result<bool> {
            self.renew_calls.fetch_add(1, Ordering::SeqCst);
            Self::next_bool(&self.renew, true)
        }

        async fn get_lock_holder(&self, _role: &Role) -> Result<Option<SessionId>> {
            self.holder_calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.holder.lock().unwrap();
            let step = if script.len() > 1 {
                script.remove(0)
            } else {
                script.first().cloned().unwrap_or(HolderScript::NoHolder)
            };
            match step {
                HolderScript::Holder(id) => Ok(Some(SessionId(id))),
                HolderScript::NoHolder => Ok(None),
                HolderScript::Fail => Err(transport_failure()),
            }
        }

        async fn acquire_lock(&self, _role: &Role, _session: &SessionId) -> Result<bool> {
            self.acquire_calls.fetch_add(1, Ordering::SeqCst);
            Self::next_bool(&self.acquire, true)
        }

        async fn release_lock(&self, _role: &Role, _session: &SessionId) -> Result<bool> {
            self.release_calls.fetch_add(1, Ordering::SeqCst);
            match self.release_result {
                BoolScript::Ok(value) => Ok(value),
                BoolScript::Fail => Err(transport_failure()),
            }
        }

        async fn destroy_session(&self, _session: &SessionId) -> Result<bool> {
            self.destroy_calls.fetch_add(1, Ordering::SeqCst);
            match self.destroy_result {
                BoolScript::Ok(value) => Ok(value),
                BoolScript::Fail => Err(transport_failure()),
            }
        }
    }
}
