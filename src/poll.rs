//! Leadership Polling
//!
//! One polling tick: renew the session, check who holds the lock, acquire
//! it if nobody (or somebody else) does, and report a verdict. Failed
//! polls are never retried in a tight loop; the next scheduled tick polls
//! again.

use std::sync::Arc;

use crate::consul::{CoordinationClient, Role, SessionId};

/// Per-tick leadership determination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// This session holds the lock
    Leader,
    /// Another session holds the lock, or this session is not renewable
    NotLeader,
    /// The coordination service could not be consulted
    Unknown,
}

/// Runs one leadership check per tick against the coordination service
pub struct LeadershipPoller {
    client: Arc<dyn CoordinationClient>,
    role: Role,
}

impl LeadershipPoller {
    pub fn new(client: Arc<dyn CoordinationClient>, role: Role) -> Self {
        Self { client, role }
    }

    /// Determine leadership for this tick.
    ///
    /// Without a session (island mode) the verdict is always `Unknown`.
    /// With one:
    /// 1. Renew the session. A session that cannot be renewed cannot
    ///    legitimately hold the lock, so renewal failure short-circuits
    ///    to `NotLeader`.
    /// 2. Read the lock holder. Already holding it means `Leader` with no
    ///    write. A failed read falls through to the acquire, which is
    ///    idempotent and may still succeed.
    /// 3. Attempt acquisition; transport failure there is `Unknown`.
    pub async fn poll(&self, session: Option<&SessionId>) -> Verdict {
        let Some(session) = session else {
            return Verdict::Unknown;
        };

        match self.client.renew_session(session).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(role = %self.role, session = %session, "Session renewal refused");
                return Verdict::NotLeader;
            }
            Err(e) => {
                tracing::warn!(
                    role = %self.role,
                    session = %session,
                    "Failed to renew session: {}",
                    e
                );
                return Verdict::NotLeader;
            }
        }

        match self.client.get_lock_holder(&self.role).await {
            Ok(Some(holder)) if holder == *session => {
                tracing::debug!(role = %self.role, "Already the current leader");
                return Verdict::Leader;
            }
            Ok(holder) => {
                tracing::debug!(role = %self.role, ?holder, "Not the current leader");
            }
            Err(e) => {
                // The read failing does not mean the lock is lost; the
                // acquire below is idempotent and settles it.
                tracing::warn!(role = %self.role, "Failed to read lock holder: {}", e);
            }
        }

        match self.client.acquire_lock(&self.role, session).await {
            Ok(true) => Verdict::Leader,
            Ok(false) => Verdict::NotLeader,
            Err(e) => {
                tracing::warn!(
                    role = %self.role,
                    session = %session,
                    "Failed to acquire lock: {}",
                    e
                );
                Verdict::Unknown
            }
        }
    }
}
