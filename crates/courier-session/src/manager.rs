// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime around the pure state machine.
//!
//! The [`ConnectionManager`] owns the single live session. Session callbacks
//! and timers are funnelled into one event channel drained by a background
//! task; public entry points apply their events directly. Either way every
//! transition runs under one lock, and the resulting effects (opening a
//! session, closing it, purging credentials, writing the snapshot) run after
//! the lock is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use courier_core::CourierError;
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::driver::{SessionDriver, SessionEvent, SessionHandle};
use crate::machine::{CloseReason, ConnectionState, Effect, Event, MachineConfig, Phase, transition};
use crate::pairing::render_qr;
use crate::snapshot::{SnapshotStore, StateSnapshot};

/// Manager settings.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub machine: MachineConfig,
    /// Age after which a persisted `Connecting` snapshot is discarded.
    pub stale_connecting: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            machine: MachineConfig::default(),
            stale_connecting: Duration::from_secs(120),
        }
    }
}

/// Point-in-time view of the connection, safe to hand to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing_expires_in_secs: Option<u64>,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub reconnect_pending: bool,
    /// The ceiling is reached; only a reset resumes connecting.
    pub frozen: bool,
    /// Durable credentials from an earlier pairing exist.
    pub session_exists: bool,
    pub has_client: bool,
}

struct ActiveSession {
    generation: u64,
    handle: Arc<dyn SessionHandle>,
}

struct Shared {
    state: ConnectionState,
    session: Option<ActiveSession>,
    pairing_timer: Option<AbortHandle>,
    reconnect_timer: Option<AbortHandle>,
    /// Bumped on every applied transition; orders snapshot writes.
    seq: u64,
}

/// Effects that must run outside the state lock.
#[derive(Default)]
struct Deferred {
    open: Option<u64>,
    teardown: Option<ActiveSession>,
    logout: bool,
    purge: bool,
    persist: Option<(u64, StateSnapshot)>,
}

struct Inner {
    config: ManagerConfig,
    driver: Arc<dyn SessionDriver>,
    store: Option<SnapshotStore>,
    shared: Mutex<Shared>,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: mpsc::UnboundedSender<Event>,
    persisted_seq: tokio::sync::Mutex<u64>,
}

/// Owner of the process-wide socket session.
///
/// Cloning is cheap; clones share the same session. Must be created inside a
/// Tokio runtime.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create the manager, restoring the attempt counter from `store` when a
    /// usable snapshot exists. The phase always starts `Disconnected`.
    pub fn new(
        driver: Arc<dyn SessionDriver>,
        config: ManagerConfig,
        store: Option<SnapshotStore>,
    ) -> Self {
        let attempts = store
            .as_ref()
            .map(|s| s.recover(config.stale_connecting))
            .unwrap_or(0)
            .min(config.machine.max_reconnect_attempts);
        let state = ConnectionState::new(attempts);

        let (state_tx, _) = watch::channel(state.clone());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            config,
            driver,
            store,
            shared: Mutex::new(Shared {
                state,
                session: None,
                pairing_timer: None,
                reconnect_timer: None,
                seq: 0,
            }),
            state_tx,
            events_tx,
            persisted_seq: tokio::sync::Mutex::new(0),
        });

        tokio::spawn(run_events(Arc::downgrade(&inner), events_rx));
        gauge!("courier_connection_phase").set(Phase::Disconnected.as_gauge());
        info!(reconnect_attempts = attempts, "connection manager started");

        Self { inner }
    }

    /// Start connecting if disconnected. A no-op while a connect is in
    /// flight or the session is up.
    pub async fn initialize(&self) -> Result<Phase, CourierError> {
        self.inner.apply(Event::Initialize).await?;
        Ok(self.phase())
    }

    /// [`initialize`](Self::initialize), then wait up to `wait` for a
    /// pairing code or an open session.
    pub async fn initialize_and_wait(&self, wait: Duration) -> Result<ConnectionStatus, CourierError> {
        self.initialize().await?;
        let mut rx = self.inner.state_tx.subscribe();
        let settled = tokio::time::timeout(
            wait,
            rx.wait_for(|s| matches!(s.phase, Phase::AwaitingPairing | Phase::Connected)),
        )
        .await;
        if settled.is_err() {
            debug!(wait_secs = wait.as_secs(), "no pairing code or session yet");
        }
        Ok(self.status())
    }

    /// Force-close any session, clear counters, delete credentials.
    /// Safe to call repeatedly.
    pub async fn reset(&self) -> Result<(), CourierError> {
        info!("connection reset requested");
        self.inner.apply(Event::Reset).await
    }

    pub fn phase(&self) -> Phase {
        self.inner.state_tx.borrow().phase
    }

    pub fn status(&self) -> ConnectionStatus {
        let now = Instant::now();
        let state = self.inner.state_tx.borrow().clone();
        let machine = &self.inner.config.machine;
        let live = state.live_pairing(now);
        ConnectionStatus {
            phase: state.phase,
            pairing_code: live.map(|p| p.code.clone()),
            pairing_expires_in_secs: live.map(|p| p.expires_at.saturating_duration_since(now).as_secs()),
            reconnect_attempts: state.reconnect_attempts,
            max_reconnect_attempts: machine.max_reconnect_attempts,
            reconnect_pending: state.reconnect_pending,
            frozen: state.is_frozen(machine),
            session_exists: self.inner.driver.has_credentials(),
            has_client: state.has_session,
        }
    }

    /// The pairing code, if one is live right now.
    pub fn pairing_code(&self) -> Result<String, CourierError> {
        let state = self.inner.state_tx.borrow();
        match &state.pairing {
            Some(p) if p.is_valid_at(Instant::now()) => Ok(p.code.clone()),
            Some(_) => Err(CourierError::PairingExpired),
            None => Err(CourierError::ConnectionNotReady(format!(
                "no pairing code while {}",
                state.phase
            ))),
        }
    }

    /// Observe every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// The live handle, only while `Connected`.
    pub fn connected_handle(&self) -> Option<Arc<dyn SessionHandle>> {
        let shared = self.inner.lock();
        if shared.state.phase != Phase::Connected {
            return None;
        }
        shared.session.as_ref().map(|s| Arc::clone(&s.handle))
    }

    /// Wait up to `wait` for the phase to reach `Connected`.
    pub async fn wait_until_connected(&self, wait: Duration) -> bool {
        let mut rx = self.inner.state_tx.subscribe();
        matches!(
            tokio::time::timeout(wait, rx.wait_for(|s| s.phase == Phase::Connected)).await,
            Ok(Ok(_))
        )
    }

    /// Handle for sending. When disconnected, starts one connect attempt;
    /// then waits up to `wait` before giving up with
    /// [`CourierError::ConnectionNotReady`].
    pub async fn ensure_connected(&self, wait: Duration) -> Result<Arc<dyn SessionHandle>, CourierError> {
        if let Some(handle) = self.connected_handle() {
            return Ok(handle);
        }

        if self.phase() == Phase::Disconnected {
            info!("send requested while disconnected, starting session");
            self.initialize().await?;
        }

        if self.wait_until_connected(wait).await {
            if let Some(handle) = self.connected_handle() {
                return Ok(handle);
            }
        }

        Err(CourierError::ConnectionNotReady(format!(
            "session is {} after waiting {}s",
            self.phase(),
            wait.as_secs()
        )))
    }

    pub fn has_credentials(&self) -> bool {
        self.inner.driver.has_credentials()
    }

    /// Close the live session without logging out and cancel timers. Used
    /// on process shutdown; credentials are kept.
    pub async fn shutdown(&self) {
        let session = {
            let mut shared = self.inner.lock();
            abort(&mut shared.pairing_timer);
            abort(&mut shared.reconnect_timer);
            shared.session.take()
        };
        if let Some(session) = session {
            if let Err(e) = session.handle.close().await {
                warn!(error = %e, "closing session on shutdown failed");
            }
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn apply(self: &Arc<Self>, event: Event) -> Result<(), CourierError> {
        let issued_code = match &event {
            Event::PairingIssued { code, .. } => Some(code.clone()),
            _ => None,
        };

        let (from, to, deferred) = {
            let mut shared = self.lock();
            let t = transition(&shared.state, &event, &self.config.machine)?;
            if t.is_ignored() {
                debug!(?event, phase = %shared.state.phase, "event ignored");
                return Ok(());
            }

            let from = shared.state.phase;
            shared.state = t.state;
            shared.seq += 1;

            let mut deferred = Deferred::default();
            for effect in t.effects {
                match effect {
                    Effect::OpenSession { generation } => deferred.open = Some(generation),
                    Effect::ArmPairingTimer {
                        generation,
                        serial,
                        ttl,
                    } => {
                        abort(&mut shared.pairing_timer);
                        shared.pairing_timer =
                            Some(self.schedule(ttl, Event::PairingExpired { generation, serial }));
                    }
                    Effect::CancelPairingTimer => abort(&mut shared.pairing_timer),
                    Effect::ScheduleReconnect { generation, delay } => {
                        abort(&mut shared.reconnect_timer);
                        shared.reconnect_timer = Some(self.schedule(delay, Event::Reopen { generation }));
                        counter!("courier_reconnects_total").increment(1);
                        info!(
                            attempt = shared.state.reconnect_attempts,
                            max = self.config.machine.max_reconnect_attempts,
                            delay_secs = delay.as_secs(),
                            "reconnect scheduled"
                        );
                    }
                    Effect::CancelReconnect => abort(&mut shared.reconnect_timer),
                    Effect::Teardown => {
                        if let Some(session) = shared.session.take() {
                            deferred.teardown = Some(session);
                        }
                    }
                    Effect::Logout => deferred.logout = true,
                    Effect::PurgeCredentials => deferred.purge = true,
                    Effect::Persist => {
                        deferred.persist =
                            Some((shared.seq, StateSnapshot::capture(&shared.state, Utc::now())));
                    }
                }
            }

            self.state_tx.send_replace(shared.state.clone());
            (from, shared.state.phase, deferred)
        };

        if from != to {
            gauge!("courier_connection_phase").set(to.as_gauge());
            info!(from = %from, to = %to, "connection phase changed");
        }
        if let Some(code) = issued_code {
            self.announce_pairing(&code);
        }
        if self.is_frozen() {
            warn!("reconnect attempts exhausted, reset the connection to resume");
        }

        self.run(deferred).await
    }

    async fn run(self: &Arc<Self>, deferred: Deferred) -> Result<(), CourierError> {
        if let Some(session) = deferred.teardown {
            if deferred.logout {
                if let Err(e) = session.handle.logout().await {
                    warn!(generation = session.generation, error = %e, "logout failed, closing anyway");
                }
            }
            if let Err(e) = session.handle.close().await {
                warn!(generation = session.generation, error = %e, "session teardown failed, treating as closed");
            }
        }

        let mut result = Ok(());
        if deferred.purge {
            match self.driver.purge_credentials().await {
                Ok(()) => info!("session credentials deleted"),
                Err(e) => {
                    warn!(error = %e, "failed to delete session credentials");
                    result = Err(e);
                }
            }
        }

        if let Some(generation) = deferred.open {
            tokio::spawn(Arc::clone(self).open_session(generation));
        }

        if let Some((seq, snapshot)) = deferred.persist {
            self.persist(seq, snapshot).await;
        }

        result
    }

    async fn open_session(self: Arc<Self>, generation: u64) {
        let (tx, rx) = mpsc::unbounded_channel();
        debug!(generation, "opening session");
        match self.driver.open(tx).await {
            Ok(handle) => {
                let handle: Arc<dyn SessionHandle> = Arc::from(handle);
                let accepted = {
                    let mut shared = self.lock();
                    let current = shared.state.generation == generation
                        && shared.state.has_session
                        && shared.session.is_none();
                    if current {
                        shared.session = Some(ActiveSession {
                            generation,
                            handle: Arc::clone(&handle),
                        });
                    }
                    current
                };
                if !accepted {
                    debug!(generation, "session opened after being superseded, closing");
                    if let Err(e) = handle.close().await {
                        debug!(generation, error = %e, "closing superseded session failed");
                    }
                    return;
                }
                tokio::spawn(forward(rx, generation, self.events_tx.clone()));
            }
            Err(e) => {
                warn!(generation, error = %e, "session open failed");
                let _ = self.events_tx.send(Event::Closed {
                    generation,
                    reason: CloseReason::Transient(e.to_string()),
                });
            }
        }
    }

    fn schedule(&self, delay: Duration, event: Event) -> AbortHandle {
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        })
        .abort_handle()
    }

    async fn persist(&self, seq: u64, snapshot: StateSnapshot) {
        let Some(store) = &self.store else {
            return;
        };
        let mut last = self.persisted_seq.lock().await;
        if seq <= *last {
            return;
        }
        if let Err(e) = store.save(&snapshot).await {
            warn!(path = %store.path().display(), error = %e, "failed to write connection snapshot");
        }
        *last = seq;
    }

    fn is_frozen(&self) -> bool {
        self.state_tx.borrow().is_frozen(&self.config.machine)
    }

    fn announce_pairing(&self, code: &str) {
        let ttl = self.config.machine.pairing_ttl.as_secs();
        match render_qr(code) {
            Ok(qr) => info!(expires_in_secs = ttl, "scan this pairing code to link the session\n{qr}"),
            Err(e) => info!(expires_in_secs = ttl, error = %e, "pairing code issued"),
        }
    }
}

fn abort(timer: &mut Option<AbortHandle>) {
    if let Some(handle) = timer.take() {
        handle.abort();
    }
}

/// Drain the shared event channel for as long as the manager is alive.
async fn run_events(inner: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<Event>) {
    while let Some(event) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if let Err(e) = inner.apply(event).await {
            warn!(error = %e, "connection event failed");
        }
    }
    debug!("connection event loop stopped");
}

/// Tag one session's notifications with its generation.
async fn forward(
    mut rx: mpsc::UnboundedReceiver<SessionEvent>,
    generation: u64,
    tx: mpsc::UnboundedSender<Event>,
) {
    while let Some(event) = rx.recv().await {
        let event = match event {
            SessionEvent::PairingCode(code) => Event::PairingIssued {
                generation,
                code,
                at: Instant::now(),
            },
            SessionEvent::Open => Event::Opened { generation },
            SessionEvent::Closed(reason) => Event::Closed { generation, reason },
        };
        if tx.send(event).is_err() {
            return;
        }
    }
    // The driver dropped its sender. Harmless if the session already closed.
    let _ = tx.send(Event::Closed {
        generation,
        reason: CloseReason::Transient("session event stream ended".into()),
    });
}
