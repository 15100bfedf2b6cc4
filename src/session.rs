//! Session Lifecycle
//!
//! Owns the elector's Consul session: creation with bounded retry and
//! backoff, and best-effort teardown on shutdown. A session is created
//! once and reused across polls; a failed renew does not discard it,
//! since sessions are server-side TTL entities and renewal is simply
//! retried on the next tick.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::consul::{CoordinationClient, Role, SessionId};
use crate::retry::RetryPolicy;

/// Manages the single session backing one elector instance
pub struct SessionManager {
    client: Arc<dyn CoordinationClient>,
    role: Role,
    ttl_secs: u64,
    lock_delay_secs: u64,
    retry: RetryPolicy,
    current: Mutex<Option<SessionId>>,
}

impl SessionManager {
    pub fn new(
        client: Arc<dyn CoordinationClient>,
        role: Role,
        ttl_secs: u64,
        lock_delay_secs: u64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            role,
            ttl_secs,
            lock_delay_secs,
            retry,
            current: Mutex::new(None),
        }
    }

    /// The session id currently held, if any
    pub async fn current(&self) -> Option<SessionId> {
        self.current.lock().await.clone()
    }

    /// Return the held session id, creating a session if none is held.
    ///
    /// Attempts creation up to `max_tries` times with the policy's backoff
    /// between failures. Exhaustion is not an error here: the elector then
    /// runs in island mode, so this logs once at error level and returns
    /// `None`.
    pub async fn ensure(&self) -> Option<SessionId> {
        let mut current = self.current.lock().await;
        if let Some(id) = current.as_ref() {
            return Some(id.clone());
        }

        for attempt in 0..self.retry.max_tries {
            match self
                .client
                .create_session(&self.role, self.ttl_secs, self.lock_delay_secs)
                .await
            {
                Ok(id) => {
                    tracing::info!(role = %self.role, session = %id, "Consul session created");
                    *current = Some(id.clone());
                    return Some(id);
                }
                Err(e) => {
                    tracing::warn!(
                        role = %self.role,
                        "Failed to create session (try {}/{}): {}",
                        attempt + 1,
                        self.retry.max_tries,
                        e
                    );
                }
            }

            if attempt + 1 < self.retry.max_tries {
                tokio::time::sleep(self.retry.delay(attempt)).await;
            }
        }

        tracing::error!(
            role = %self.role,
            "Failed to obtain a session after {} tries, continuing as an island",
            self.retry.max_tries
        );
        None
    }

    /// Best-effort release of the lock and destruction of the session.
    ///
    /// All failures are logged and swallowed; teardown never blocks
    /// shutdown on an error. A second call is a no-op.
    pub async fn teardown(&self) {
        let session = self.current.lock().await.take();
        let Some(session) = session else {
            return;
        };

        tracing::info!(role = %self.role, session = %session, "Releasing Consul session");

        match self.client.release_lock(&self.role, &session).await {
            Ok(released) => tracing::debug!(session = %session, released, "Lock release result"),
            Err(e) => tracing::warn!(session = %session, "Failed to release lock: {}", e),
        }

        match self.client.destroy_session(&session).await {
            Ok(true) => tracing::debug!(session = %session, "Session destroyed"),
            Ok(false) => tracing::warn!(session = %session, "Consul refused to destroy session"),
            Err(e) => tracing::warn!(session = %session, "Failed to destroy session: {}", e),
        }
    }
}
