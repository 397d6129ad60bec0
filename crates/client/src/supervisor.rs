//! Supervised connection: periodic ping plus bounded reconnect.
//!
//! ```text
//! Disconnected --dial ok--> Connected --closed / N failed probes--> Reconnecting
//!      |                        ^                                      |
//!      +------dial failed-------|----------------------------------> Reconnecting
//!                               +------------- dial ok ----------------+
//! Reconnecting --attempts exhausted--> Failed (terminal)
//! ```

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use guildgate_rpc::{Method, PingMessage};

use crate::transport::{Transport, TransportError};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Reconnecting,
    /// Reconnect attempts exhausted. Terminal.
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        }
    }
}

impl core::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Pause between successful probes.
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    /// Consecutive failed probes before reconnecting.
    pub max_failed_probes: u32,
    pub max_reconnect_attempts: u32,
    /// Pause between reconnect attempts; the first attempt is immediate.
    pub reconnect_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(5),
            max_failed_probes: 5,
            max_reconnect_attempts: 5,
            reconnect_interval: Duration::from_secs(1),
        }
    }
}

impl SupervisorConfig {
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_max_failed_probes(mut self, max: u32) -> Self {
        self.max_failed_probes = max;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, max: u32) -> Self {
        self.max_reconnect_attempts = max;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }
}

/// Supervisor runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupervisorStats {
    pub probes_sent: u64,
    pub probes_failed: u64,
    pub dials: u64,
    pub dial_failures: u64,
    /// Reconnect cycles started, successful or not.
    pub reconnects: u64,
}

struct Shared<C> {
    state: watch::Sender<ConnectionState>,
    conn: RwLock<Option<Arc<C>>>,
    stats: Mutex<SupervisorStats>,
    shutdown: Notify,
}

impl<C> Shared<C> {
    fn new() -> Self {
        Self {
            state: watch::Sender::new(ConnectionState::Disconnected),
            conn: RwLock::new(None),
            stats: Mutex::new(SupervisorStats::default()),
            shutdown: Notify::new(),
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "connection state changed");
        }
    }

    fn connection(&self) -> Option<Arc<C>> {
        self.conn.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn store(&self, conn: C) {
        *self.conn.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(conn));
    }

    fn take(&self) -> Option<Arc<C>> {
        self.conn.write().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn record(&self, f: impl FnOnce(&mut SupervisorStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

/// Background task owning one connection made through `T`.
///
/// Application calls never wait on the supervisor: they read the current
/// connection from the [`SupervisorHandle`] and fail fast if there is none.
pub struct ConnectionSupervisor<T: Transport> {
    transport: Arc<T>,
    config: SupervisorConfig,
    shared: Arc<Shared<T::Conn>>,
}

impl<T: Transport> ConnectionSupervisor<T> {
    /// Start supervising on a new tokio task.
    pub fn spawn(transport: Arc<T>, config: SupervisorConfig) -> SupervisorHandle<T> {
        let shared = Arc::new(Shared::new());
        let supervisor = Self {
            transport,
            config,
            shared: shared.clone(),
        };
        let task = tokio::spawn(supervisor.start());

        SupervisorHandle {
            shared,
            task: Mutex::new(Some(task)),
        }
    }

    async fn start(self) {
        info!("connection supervisor started");

        tokio::select! {
            _ = self.shared.shutdown.notified() => {
                info!("connection supervisor received shutdown signal");
            }
            _ = self.run() => {}
        }

        if let Some(conn) = self.shared.take() {
            if let Err(e) = self.transport.close(&conn).await {
                warn!(error = %e, "closing connection on shutdown failed");
            }
        }
        if self.shared.state() != ConnectionState::Failed {
            self.shared.set_state(ConnectionState::Disconnected);
        }

        info!("connection supervisor stopped");
    }

    async fn run(&self) {
        if !self.dial().await {
            self.shared.set_state(ConnectionState::Reconnecting);
        }

        loop {
            match self.shared.state() {
                ConnectionState::Connected => {
                    self.probe_until_lost().await;
                    self.shared.set_state(ConnectionState::Reconnecting);
                }
                ConnectionState::Reconnecting => {
                    if !self.reconnect().await {
                        self.shared.set_state(ConnectionState::Failed);
                        error!(
                            attempts = self.config.max_reconnect_attempts,
                            "connection lost; reconnect attempts exhausted"
                        );
                        return;
                    }
                }
                ConnectionState::Disconnected | ConnectionState::Failed => return,
            }
        }
    }

    async fn dial(&self) -> bool {
        self.shared.record(|s| s.dials += 1);
        match self.transport.dial().await {
            Ok(conn) => {
                self.shared.store(conn);
                self.shared.set_state(ConnectionState::Connected);
                info!("connected");
                true
            }
            Err(e) => {
                self.shared.record(|s| s.dial_failures += 1);
                warn!(error = %e, "dial failed");
                false
            }
        }
    }

    /// Close whatever is live, then dial until success or the attempts run out.
    async fn reconnect(&self) -> bool {
        self.shared.record(|s| s.reconnects += 1);

        if let Some(conn) = self.shared.take() {
            if let Err(e) = self.transport.close(&conn).await {
                warn!(error = %e, "closing stale connection failed");
            }
        }

        for attempt in 1..=self.config.max_reconnect_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.reconnect_interval).await;
            }
            debug!(attempt, max = self.config.max_reconnect_attempts, "reconnecting");
            if self.dial().await {
                return true;
            }
        }
        false
    }

    /// Ping until the connection is deemed lost.
    async fn probe_until_lost(&self) {
        let mut failures = 0u32;
        let mut delay = Duration::ZERO;

        loop {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let Some(conn) = self.shared.connection() else {
                return;
            };
            let body = match serde_json::to_value(PingMessage::now()) {
                Ok(body) => body,
                Err(e) => {
                    error!(error = %e, "could not encode ping");
                    return;
                }
            };

            self.shared.record(|s| s.probes_sent += 1);
            let outcome = tokio::time::timeout(
                self.config.probe_timeout,
                self.transport.call(&conn, Method::Ping, body),
            )
            .await
            .unwrap_or(Err(TransportError::Timeout));

            match outcome {
                Ok(_) => {
                    if failures > 0 {
                        debug!(failures, "probe recovered");
                    }
                    failures = 0;
                    delay = self.config.probe_interval;
                }
                Err(TransportError::Closed(reason)) => {
                    self.shared.record(|s| s.probes_failed += 1);
                    warn!(%reason, "connection closed; reconnecting");
                    return;
                }
                Err(e) => {
                    self.shared.record(|s| s.probes_failed += 1);
                    failures += 1;
                    warn!(failures, max = self.config.max_failed_probes, error = %e, "probe failed");
                    if failures >= self.config.max_failed_probes {
                        warn!("too many failed probes; reconnecting");
                        return;
                    }
                    delay = Duration::ZERO;
                }
            }
        }
    }
}

/// Handle to a running supervisor. Dropping it stops the task.
pub struct SupervisorHandle<T: Transport> {
    shared: Arc<Shared<T::Conn>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> SupervisorHandle<T> {
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Resolve once the state equals `target`, or is `Failed`.
    ///
    /// Returns the state observed.
    pub async fn wait_for(&self, target: ConnectionState) -> ConnectionState {
        let mut rx = self.shared.state.subscribe();
        match rx
            .wait_for(|s| *s == target || *s == ConnectionState::Failed)
            .await
        {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }

    /// The live connection, if any.
    pub fn connection(&self) -> Option<Arc<T::Conn>> {
        self.shared.connection()
    }

    pub fn stats(&self) -> SupervisorStats {
        self.shared.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Stop the task and close the live connection.
    pub async fn shutdown(&self) {
        self.shared.shutdown.notify_one();
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "connection supervisor task ended abnormally");
            }
        }
    }
}

impl<T: Transport> Drop for SupervisorHandle<T> {
    fn drop(&mut self) {
        self.shared.shutdown.notify_one();
    }
}

impl<T: Transport> core::fmt::Debug for SupervisorHandle<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SupervisorHandle")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, Probe};
    use tokio::time::{Instant, sleep};

    fn spawn(transport: FakeTransport) -> (Arc<FakeTransport>, SupervisorHandle<FakeTransport>) {
        let transport = Arc::new(transport);
        let handle = ConnectionSupervisor::spawn(transport.clone(), SupervisorConfig::default());
        (transport, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_connection_is_pinged_every_interval() {
        let (transport, handle) = spawn(FakeTransport::new());

        assert_eq!(handle.wait_for(ConnectionState::Connected).await, ConnectionState::Connected);
        sleep(Duration::from_secs(12)).await;

        let stats = handle.stats();
        assert_eq!(stats.probes_sent, 3);
        assert_eq!(stats.probes_failed, 0);
        assert_eq!(transport.dials(), 1);
        assert_eq!(handle.connection().as_deref(), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn five_timeouts_trigger_reconnect() {
        let (transport, handle) = spawn(FakeTransport::new().with_probes(vec![Probe::Hang; 5]));
        handle.wait_for(ConnectionState::Connected).await;

        // Timeouts land at 5s, 10s, 15s, 20s and 25s.
        sleep(Duration::from_secs(24)).await;
        assert_eq!(handle.state(), ConnectionState::Connected);
        assert_eq!(handle.stats().probes_failed, 4);
        assert_eq!(transport.dials(), 1);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.state(), ConnectionState::Connected);
        assert_eq!(handle.stats().reconnects, 1);
        assert_eq!(transport.closes(), 1);
        assert_eq!(transport.dials(), 2);
        assert_eq!(handle.connection().as_deref(), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn successful_probe_resets_failure_count() {
        let mut script = vec![Probe::Hang; 4];
        script.push(Probe::Ok);
        script.extend(vec![Probe::Hang; 4]);
        let (transport, handle) = spawn(FakeTransport::new().with_probes(script));

        sleep(Duration::from_secs(60)).await;

        assert_eq!(handle.state(), ConnectionState::Connected);
        assert_eq!(handle.stats().probes_failed, 8);
        assert_eq!(handle.stats().reconnects, 0);
        assert_eq!(transport.dials(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn other_probe_errors_count_like_timeouts() {
        let (transport, handle) = spawn(FakeTransport::new().with_probes(vec![Probe::Fail; 5]));
        handle.wait_for(ConnectionState::Connected).await;
        sleep(Duration::from_millis(10)).await;

        assert_eq!(handle.stats().probes_failed, 5);
        assert_eq!(handle.stats().reconnects, 1);
        assert_eq!(transport.dials(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_connection_reconnects_immediately() {
        let started = Instant::now();
        let (transport, handle) = spawn(FakeTransport::new().with_probes([Probe::Closed]));
        handle.wait_for(ConnectionState::Connected).await;
        sleep(Duration::from_millis(10)).await;

        assert_eq!(transport.dials(), 2);
        assert_eq!(transport.closes(), 1);
        assert_eq!(handle.stats().reconnects, 1);
        assert_eq!(handle.state(), ConnectionState::Connected);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn dial_retries_are_spaced() {
        let started = Instant::now();
        let (transport, handle) = spawn(FakeTransport::new().with_dials([false, false, false]));

        assert_eq!(handle.wait_for(ConnectionState::Connected).await, ConnectionState::Connected);
        // Initial dial and the first reconnect attempt are immediate.
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert_eq!(transport.dials(), 4);
        assert_eq!(handle.stats().dial_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_reconnects_fail_for_good() {
        let started = Instant::now();
        let (transport, handle) = spawn(FakeTransport::new().with_dials(vec![false; 6]));

        assert_eq!(handle.wait_for(ConnectionState::Connected).await, ConnectionState::Failed);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
        assert_eq!(transport.dials(), 6);

        sleep(Duration::from_secs(120)).await;
        assert_eq!(handle.state(), ConnectionState::Failed);
        assert_eq!(transport.dials(), 6);
        assert!(handle.connection().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_connection() {
        let (transport, handle) = spawn(FakeTransport::new());
        handle.wait_for(ConnectionState::Connected).await;

        handle.shutdown().await;

        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert_eq!(transport.closes(), 1);
        assert!(handle.connection().is_none());

        sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.dials(), 1);
        assert!(handle.stats().probes_sent <= 1);
    }
}
