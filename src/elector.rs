//! Leader Elector
//!
//! The state machine tying everything together: each tick turns a polling
//! verdict into a start/stop decision for the controlled unit, with an
//! explicit island-mode policy for when the coordination service cannot
//! be reached.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use async_trait::async_trait;

use crate::config::ElectorConfig;
use crate::consul::{ConsulClient, CoordinationClient, Role};
use crate::error::Result;
use crate::poll::{LeadershipPoller, Verdict};
use crate::retry::RetryPolicy;
use crate::session::SessionManager;

/// The unit of work whose running state follows leadership. Start, stop,
/// and the status read are expected to be idempotent from the elector's
/// point of view.
#[async_trait]
pub trait ControlledUnit: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn is_running(&self) -> bool;
}

/// Invoked exactly once when the elector cannot obtain a session at
/// startup and island mode is disallowed. This is the one process-fatal
/// escalation in the design; injected so tests can observe it.
#[async_trait]
pub trait TerminationHandler: Send + Sync {
    async fn terminate(&self);
}

/// Elector lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectorState {
    /// No session could be obtained; operating as an island
    NoSession,
    /// Session held, not the leader
    Follower,
    /// Session held, lock acquired
    Leader,
    /// Shut down; no further ticks are processed
    Stopped,
}

/// Lease-based leader elector for a single role.
///
/// Ticks are expected from a non-reentrant fixed-rate scheduler; the
/// internal mutex serializes a tick against a concurrent shutdown
/// notification, and overlapping ticks queue rather than interleave.
pub struct Elector {
    role: Role,
    allow_island_mode: bool,
    sessions: SessionManager,
    poller: LeadershipPoller,
    unit: Arc<dyn ControlledUnit>,
    state: Mutex<ElectorState>,
    poll_initial_delay: Duration,
    poll_interval: Duration,
}

impl Elector {
    /// Build an elector and obtain its initial session.
    ///
    /// Session creation runs here with the configured retry policy. If it
    /// exhausts its tries and island mode is disallowed, `termination` is
    /// invoked exactly once and the elector starts out `Stopped`.
    pub async fn new(
        config: &ElectorConfig,
        client: Arc<dyn CoordinationClient>,
        unit: Arc<dyn ControlledUnit>,
        termination: Arc<dyn TerminationHandler>,
    ) -> Result<Self> {
        config.validate()?;

        let role = Role::new(&config.session.service_name);
        let sessions = SessionManager::new(
            Arc::clone(&client),
            role.clone(),
            config.session.ttl_secs,
            config.session.lock_delay_secs,
            RetryPolicy::from(&config.retry),
        );
        let poller = LeadershipPoller::new(Arc::clone(&client), role.clone());

        let elector = Self {
            role,
            allow_island_mode: config.session.allow_island_mode,
            sessions,
            poller,
            unit,
            state: Mutex::new(ElectorState::NoSession),
            poll_initial_delay: config.poll_initial_delay(),
            poll_interval: config.poll_interval(),
        };

        let initial = elector.sessions.ensure().await;
        let mut state = elector.state.lock().await;
        match initial {
            Some(_) => *state = ElectorState::Follower,
            None if !elector.allow_island_mode => {
                tracing::error!(
                    role = %elector.role,
                    "No session obtainable and island mode is disallowed, terminating"
                );
                termination.terminate().await;
                *state = ElectorState::Stopped;
            }
            None => *state = ElectorState::NoSession,
        }
        drop(state);

        Ok(elector)
    }

    /// Build an elector with the HTTP Consul client from configuration
    pub async fn from_config(
        config: &ElectorConfig,
        unit: Arc<dyn ControlledUnit>,
        termination: Arc<dyn TerminationHandler>,
    ) -> Result<Self> {
        let client = Arc::new(ConsulClient::new(&config.consul)?);
        Self::new(config, client, unit, termination).await
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ElectorState {
        *self.state.lock().await
    }

    /// Whether the last tick concluded with leadership
    pub async fn is_leader(&self) -> bool {
        *self.state.lock().await == ElectorState::Leader
    }

    /// Run one polling tick: renew/check/acquire, then converge the
    /// controlled unit on the verdict. A no-op after shutdown.
    pub async fn tick(&self) {
        let mut state = self.state.lock().await;
        if *state == ElectorState::Stopped {
            return;
        }

        let session = self.sessions.ensure().await;
        let verdict = self.poller.poll(session.as_ref()).await;

        *state = match (&session, verdict) {
            (None, _) => ElectorState::NoSession,
            (Some(_), Verdict::Leader) => ElectorState::Leader,
            (Some(_), _) => ElectorState::Follower,
        };

        let desired = match verdict {
            Verdict::Leader => true,
            Verdict::NotLeader => false,
            Verdict::Unknown => self.allow_island_mode,
        };

        self.converge(desired).await;
    }

    /// Start or stop the controlled unit if its observed state disagrees
    /// with the desired one. Start/stop failures are logged and retried
    /// naturally on the next tick, not within this one.
    async fn converge(&self, desired: bool) {
        let running = self.unit.is_running().await;
        if desired == running {
            return;
        }

        if desired {
            tracing::info!(role = %self.role, "Assuming leadership, starting controlled unit");
            if let Err(e) = self.unit.start().await {
                tracing::error!(role = %self.role, "Failed to start controlled unit: {}", e);
            }
        } else {
            tracing::info!(role = %self.role, "Standing down, stopping controlled unit");
            if let Err(e) = self.unit.stop().await {
                tracing::error!(role = %self.role, "Failed to stop controlled unit: {}", e);
            }
        }
    }

    /// Host shutdown notification: release the lock and destroy the
    /// session best-effort, then stop processing ticks. Idempotent.
    pub async fn on_shutdown(&self) {
        let mut state = self.state.lock().await;
        if *state == ElectorState::Stopped {
            return;
        }

        self.sessions.teardown().await;
        *state = ElectorState::Stopped;
        tracing::info!(role = %self.role, "Elector stopped");
    }

    /// Poll on the configured fixed-rate schedule until shut down.
    ///
    /// Convenience loop for hosts without their own scheduler; ticks never
    /// overlap because each runs to completion before the next interval
    /// fires.
    pub async fn run(&self) {
        tokio::time::sleep(self.poll_initial_delay).await;
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            interval.tick().await;
            if self.state().await == ElectorState::Stopped {
                break;
            }
            self.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConsulConfig, PollConfig, RetryConfig, SessionConfig};
    use crate::consul::mock::{BoolScript, HolderScript, MockConsul};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct MockUnit {
        running: AtomicBool,
        start_calls: AtomicUsize,
        stop_calls: AtomicUsize,
    }

    impl MockUnit {
        fn stopped() -> Arc<Self> {
            Arc::new(Self {
                running: AtomicBool::new(false),
                start_calls: AtomicUsize::new(0),
                stop_calls: AtomicUsize::new(0),
            })
        }

        fn started() -> Arc<Self> {
            let unit = Self::stopped();
            unit.running.store(true, Ordering::SeqCst);
            unit
        }
    }

    #[async_trait]
    impl ControlledUnit for MockUnit {
        async fn start(&self) -> Result<()> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct MockTermination {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TerminationHandler for MockTermination {
        async fn terminate(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config(allow_island_mode: bool, max_tries: u32) -> ElectorConfig {
        ElectorConfig {
            consul: ConsulConfig {
                url: "http://127.0.0.1:8500".to_string(),
                username: None,
                password: None,
                request_timeout_secs: 1,
            },
            session: SessionConfig {
                service_name: "billing".to_string(),
                ttl_secs: 30,
                lock_delay_secs: 0,
                allow_island_mode,
            },
            retry: RetryConfig {
                max_tries,
                base_period_secs: 0.0,
                backoff_multiplier: 0.0,
            },
            poll: PollConfig::default(),
            logging: Default::default(),
        }
    }

    async fn elector(
        mock: Arc<MockConsul>,
        unit: Arc<MockUnit>,
        allow_island_mode: bool,
    ) -> (Elector, Arc<MockTermination>) {
        let termination = Arc::new(MockTermination::default());
        let elector = Elector::new(
            &config(allow_island_mode, 3),
            mock,
            unit,
            Arc::clone(&termination) as Arc<dyn TerminationHandler>,
        )
        .await
        .unwrap();
        (elector, termination)
    }

    #[tokio::test]
    async fn test_becoming_leader_starts_unit_once() {
        let mock = Arc::new(MockConsul::with_session("s-1"));
        mock.acquire.lock().unwrap().push(BoolScript::Ok(true));
        let unit = MockUnit::stopped();

        let (elector, _) = elector(mock, Arc::clone(&unit), true).await;
        elector.tick().await;

        assert_eq!(elector.state().await, ElectorState::Leader);
        assert_eq!(unit.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(unit.stop_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_staying_leader_is_a_noop() {
        let mock = Arc::new(MockConsul::with_session("s-1"));
        mock.holder
            .lock()
            .unwrap()
            .push(HolderScript::Holder("s-1".to_string()));
        let unit = MockUnit::started();

        let (elector, _) = elector(Arc::clone(&mock), Arc::clone(&unit), true).await;
        elector.tick().await;
        elector.tick().await;

        assert_eq!(unit.start_calls.load(Ordering::SeqCst), 0);
        assert_eq!(unit.stop_calls.load(Ordering::SeqCst), 0);
        // Holding the lock never issues a redundant acquire
        assert_eq!(mock.acquire_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_losing_leadership_stops_unit_once() {
        let mock = Arc::new(MockConsul::with_session("s-1"));
        mock.renew.lock().unwrap().push(BoolScript::Ok(false));
        let unit = MockUnit::started();

        let (elector, _) = elector(mock, Arc::clone(&unit), true).await;
        elector.tick().await;

        assert_eq!(elector.state().await, ElectorState::Follower);
        assert_eq!(unit.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(unit.start_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_leadership_flip_round_trip() {
        let mock = Arc::new(MockConsul::with_session("s-1"));
        {
            let mut acquire = mock.acquire.lock().unwrap();
            acquire.push(BoolScript::Ok(true));
            acquire.push(BoolScript::Ok(false));
            acquire.push(BoolScript::Ok(false));
        }
        let unit = MockUnit::stopped();

        let (elector, _) = elector(mock, Arc::clone(&unit), true).await;
        elector.tick().await;
        assert!(elector.is_leader().await);

        elector.tick().await;
        elector.tick().await;

        assert_eq!(unit.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(unit.stop_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_island_mode_acts_as_leader_when_allowed() {
        // Session creation exhausts all tries: verdict stays Unknown
        let mock = Arc::new(MockConsul::always_failing_create(20));
        let unit = MockUnit::stopped();

        let (elector, termination) = elector(Arc::clone(&mock), Arc::clone(&unit), true).await;
        assert_eq!(elector.state().await, ElectorState::NoSession);
        assert_eq!(mock.create_calls.load(Ordering::SeqCst), 3);

        elector.tick().await;

        assert_eq!(termination.calls.load(Ordering::SeqCst), 0);
        assert_eq!(unit.start_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_island_mode_disallowed_terminates_once() {
        let mock = Arc::new(MockConsul::always_failing_create(20));
        let unit = MockUnit::stopped();

        let (elector, termination) = elector(Arc::clone(&mock), Arc::clone(&unit), false).await;

        assert_eq!(termination.calls.load(Ordering::SeqCst), 1);
        assert_eq!(elector.state().await, ElectorState::Stopped);

        // No poll logic runs after the fatal startup path
        elector.tick().await;
        assert_eq!(mock.renew_calls.load(Ordering::SeqCst), 0);
        assert_eq!(unit.start_calls.load(Ordering::SeqCst), 0);
        assert!(!unit.running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unknown_verdict_stands_down_without_island_mode() {
        let mock = Arc::new(MockConsul::with_session("s-1"));
        mock.acquire.lock().unwrap().push(BoolScript::Fail);
        let unit = MockUnit::started();

        let (elector, _) = elector(mock, Arc::clone(&unit), false).await;
        elector.tick().await;

        assert_eq!(unit.stop_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_tears_down_even_when_never_leader() {
        let mock = Arc::new(MockConsul::with_session("s-1"));
        let unit = MockUnit::stopped();

        let (elector, _) = elector(Arc::clone(&mock), unit, true).await;
        elector.on_shutdown().await;
        elector.on_shutdown().await;

        assert_eq!(elector.state().await, ElectorState::Stopped);
        assert_eq!(mock.release_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mock.destroy_calls.load(Ordering::SeqCst), 1);

        // Ticks after shutdown touch neither Consul nor the unit
        elector.tick().await;
        assert_eq!(mock.renew_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_swallows_teardown_failures() {
        let mock = Arc::new(MockConsul {
            release_result: BoolScript::Fail,
            destroy_result: BoolScript::Fail,
            ..MockConsul::default()
        });
        mock.sessions.lock().unwrap().push(Some("s-1".to_string()));
        let unit = MockUnit::stopped();

        let (elector, _) = elector(Arc::clone(&mock), unit, true).await;
        elector.on_shutdown().await;

        assert_eq!(elector.state().await, ElectorState::Stopped);
        assert_eq!(mock.release_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mock.destroy_calls.load(Ordering::SeqCst), 1);
    }
}
