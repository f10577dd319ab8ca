// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure connection state machine.
//!
//! [`transition`] maps a state and an event to the next state plus a list of
//! [`Effect`]s for the runtime to carry out. Nothing here touches the clock,
//! the network, or the filesystem.
//!
//! Every session opened by the machine gets a new `generation`. Events that
//! name an older generation come from a session that has since been replaced
//! or reset, and are ignored.

use std::time::Duration;

use courier_core::CourierError;
use serde::Serialize;
use strum::Display;
use tokio::time::Instant;

/// Lifecycle phase of the socket session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Disconnected,
    Connecting,
    AwaitingPairing,
    Connected,
}

impl Phase {
    /// Numeric encoding used by the phase gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            Phase::Disconnected => 0.0,
            Phase::Connecting => 1.0,
            Phase::AwaitingPairing => 2.0,
            Phase::Connected => 3.0,
        }
    }
}

/// Why a session closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The account logged this device out. Credentials are no longer valid.
    LoggedOut,
    /// The server gave up waiting for the pairing code to be scanned.
    PairingTimeout,
    /// Stream error, network drop, or a failed open.
    Transient(String),
}

/// A pairing code with its hard expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingCode {
    pub code: String,
    pub issued_at: Instant,
    pub expires_at: Instant,
    /// Distinguishes successive codes issued within one session.
    pub serial: u64,
}

impl PairingCode {
    /// A code is usable strictly before its expiry instant.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Timing and retry limits.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub pairing_ttl: Duration,
    pub pairing_retry_delay: Duration,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(3),
            pairing_ttl: Duration::from_secs(30),
            pairing_retry_delay: Duration::from_secs(2),
        }
    }
}

/// Complete connection state.
///
/// `pairing` is `Some` exactly when `phase` is [`Phase::AwaitingPairing`].
/// `has_session` is `true` whenever a session handle is live; it is also
/// `false` in `Connecting` between a pairing expiry and the scheduled reopen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    pub phase: Phase,
    pub pairing: Option<PairingCode>,
    pub reconnect_attempts: u32,
    pub has_session: bool,
    /// A reopen timer is armed for the current generation.
    pub reconnect_pending: bool,
    pub generation: u64,
    pairing_serial: u64,
}

impl ConnectionState {
    /// Fresh state, optionally restoring a persisted attempt counter.
    pub fn new(reconnect_attempts: u32) -> Self {
        Self {
            phase: Phase::Disconnected,
            pairing: None,
            reconnect_attempts,
            has_session: false,
            reconnect_pending: false,
            generation: 0,
            pairing_serial: 0,
        }
    }

    /// Frozen: the ceiling is reached and nothing is scheduled.
    pub fn is_frozen(&self, config: &MachineConfig) -> bool {
        self.phase == Phase::Disconnected
            && !self.reconnect_pending
            && self.reconnect_attempts >= config.max_reconnect_attempts
    }

    /// Pairing code still usable at `now`.
    pub fn live_pairing(&self, now: Instant) -> Option<&PairingCode> {
        self.pairing.as_ref().filter(|p| p.is_valid_at(now))
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Inputs to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Public request to connect. Subject to the reconnect ceiling.
    Initialize,
    /// A reopen scheduled by the machine itself has come due.
    Reopen { generation: u64 },
    /// The session produced a pairing code.
    PairingIssued {
        generation: u64,
        code: String,
        at: Instant,
    },
    /// The pairing timer armed for `serial` fired.
    PairingExpired { generation: u64, serial: u64 },
    /// The session authenticated and is ready to send.
    Opened { generation: u64 },
    /// The session closed or failed to open.
    Closed { generation: u64, reason: CloseReason },
    /// Operator reset: log out everywhere and forget credentials.
    Reset,
}

impl Event {
    fn generation(&self) -> Option<u64> {
        match self {
            Event::Initialize | Event::Reset => None,
            Event::Reopen { generation }
            | Event::PairingIssued { generation, .. }
            | Event::PairingExpired { generation, .. }
            | Event::Opened { generation }
            | Event::Closed { generation, .. } => Some(*generation),
        }
    }
}

/// Work the runtime performs after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a new session tagged with `generation`.
    OpenSession { generation: u64 },
    /// Fire [`Event::PairingExpired`] after `ttl`.
    ArmPairingTimer {
        generation: u64,
        serial: u64,
        ttl: Duration,
    },
    CancelPairingTimer,
    /// Fire [`Event::Reopen`] after `delay`.
    ScheduleReconnect { generation: u64, delay: Duration },
    CancelReconnect,
    /// Close and drop the live session handle, if any.
    Teardown,
    /// Log the live session out before teardown.
    Logout,
    /// Delete durable session credentials.
    PurgeCredentials,
    /// Write the state snapshot.
    Persist,
}

/// Result of applying an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: ConnectionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn ignored(state: &ConnectionState) -> Self {
        Self {
            state: state.clone(),
            effects: Vec::new(),
        }
    }

    /// Whether the event was a no-op.
    pub fn is_ignored(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Apply `event` to `state`.
///
/// Only [`Event::Initialize`] can fail, with
/// [`CourierError::MaxReconnectAttemptsReached`] once the ceiling is hit. On
/// that error the state is unchanged.
pub fn transition(
    state: &ConnectionState,
    event: &Event,
    config: &MachineConfig,
) -> Result<Transition, CourierError> {
    if let Some(generation) = event.generation() {
        if generation != state.generation {
            return Ok(Transition::ignored(state));
        }
    }

    let mut next = state.clone();
    let mut effects = Vec::new();

    match event {
        Event::Initialize => {
            if state.phase != Phase::Disconnected {
                return Ok(Transition::ignored(state));
            }
            if state.reconnect_attempts >= config.max_reconnect_attempts {
                return Err(CourierError::MaxReconnectAttemptsReached {
                    attempts: state.reconnect_attempts,
                    max: config.max_reconnect_attempts,
                });
            }
            open(&mut next, &mut effects);
            if state.reconnect_pending {
                effects.insert(0, Effect::CancelReconnect);
            }
        }

        Event::Reopen { .. } => {
            if !state.reconnect_pending || state.phase == Phase::Connected {
                return Ok(Transition::ignored(state));
            }
            open(&mut next, &mut effects);
        }

        Event::PairingIssued { code, at, .. } => {
            if !matches!(state.phase, Phase::Connecting | Phase::AwaitingPairing)
                || !state.has_session
            {
                return Ok(Transition::ignored(state));
            }
            next.pairing_serial += 1;
            next.phase = Phase::AwaitingPairing;
            next.pairing = Some(PairingCode {
                code: code.clone(),
                issued_at: *at,
                expires_at: *at + config.pairing_ttl,
                serial: next.pairing_serial,
            });
            effects.push(Effect::ArmPairingTimer {
                generation: state.generation,
                serial: next.pairing_serial,
                ttl: config.pairing_ttl,
            });
            effects.push(Effect::Persist);
        }

        Event::PairingExpired { serial, .. } => {
            let current = state.pairing.as_ref().map(|p| p.serial);
            if state.phase != Phase::AwaitingPairing || current != Some(*serial) {
                return Ok(Transition::ignored(state));
            }
            next.pairing = None;
            next.has_session = false;
            effects.push(Effect::Teardown);
            if state.reconnect_attempts < config.max_reconnect_attempts {
                next.reconnect_attempts += 1;
                next.phase = Phase::Connecting;
                next.reconnect_pending = true;
                effects.push(Effect::ScheduleReconnect {
                    generation: state.generation,
                    delay: config.pairing_retry_delay,
                });
            } else {
                next.phase = Phase::Disconnected;
            }
            effects.push(Effect::Persist);
        }

        Event::Opened { .. } => {
            if !matches!(state.phase, Phase::Connecting | Phase::AwaitingPairing)
                || !state.has_session
            {
                return Ok(Transition::ignored(state));
            }
            next.phase = Phase::Connected;
            next.pairing = None;
            next.reconnect_attempts = 0;
            effects.push(Effect::CancelPairingTimer);
            effects.push(Effect::Persist);
        }

        Event::Closed { reason, .. } => {
            if !state.has_session {
                return Ok(Transition::ignored(state));
            }
            next.phase = Phase::Disconnected;
            next.pairing = None;
            next.has_session = false;
            effects.push(Effect::CancelPairingTimer);
            effects.push(Effect::Teardown);

            match reason {
                CloseReason::LoggedOut => {
                    next.reconnect_attempts = 0;
                    effects.push(Effect::PurgeCredentials);
                }
                CloseReason::PairingTimeout => {
                    next.reconnect_attempts = 0;
                }
                CloseReason::Transient(_) => {
                    if state.reconnect_attempts < config.max_reconnect_attempts {
                        next.reconnect_attempts += 1;
                        next.reconnect_pending = true;
                        effects.push(Effect::ScheduleReconnect {
                            generation: state.generation,
                            delay: config.reconnect_delay,
                        });
                    }
                }
            }
            effects.push(Effect::Persist);
        }

        Event::Reset => {
            next = ConnectionState::new(0);
            // Outstanding timers and session events belong to older generations.
            next.generation = state.generation + 1;
            effects.extend([
                Effect::CancelPairingTimer,
                Effect::CancelReconnect,
                Effect::Logout,
                Effect::Teardown,
                Effect::PurgeCredentials,
                Effect::Persist,
            ]);
        }
    }

    Ok(Transition {
        state: next,
        effects,
    })
}

fn open(next: &mut ConnectionState, effects: &mut Vec<Effect>) {
    next.generation += 1;
    next.phase = Phase::Connecting;
    next.pairing = None;
    next.has_session = true;
    next.reconnect_pending = false;
    effects.push(Effect::OpenSession {
        generation: next.generation,
    });
    effects.push(Effect::Persist);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> MachineConfig {
        MachineConfig::default()
    }

    fn apply(state: &ConnectionState, event: Event) -> Transition {
        transition(state, &event, &cfg()).unwrap()
    }

    fn connecting() -> ConnectionState {
        apply(&ConnectionState::default(), Event::Initialize).state
    }

    #[test]
    fn initialize_opens_a_new_generation() {
        let t = apply(&ConnectionState::default(), Event::Initialize);
        assert_eq!(t.state.phase, Phase::Connecting);
        assert_eq!(t.state.generation, 1);
        assert!(t.state.has_session);
        assert_eq!(
            t.effects,
            vec![Effect::OpenSession { generation: 1 }, Effect::Persist]
        );
    }

    #[test]
    fn initialize_while_connecting_is_a_no_op() {
        let s = connecting();
        let t = apply(&s, Event::Initialize);
        assert!(t.is_ignored());
        assert_eq!(t.state, s);
    }

    #[test]
    fn pairing_code_is_issued_with_ttl() {
        let s = connecting();
        let now = Instant::now();
        let t = apply(
            &s,
            Event::PairingIssued {
                generation: 1,
                code: "2@abc".into(),
                at: now,
            },
        );
        assert_eq!(t.state.phase, Phase::AwaitingPairing);
        let pairing = t.state.pairing.as_ref().unwrap();
        assert_eq!(pairing.expires_at, now + Duration::from_secs(30));
        assert!(t.effects.contains(&Effect::ArmPairingTimer {
            generation: 1,
            serial: 1,
            ttl: Duration::from_secs(30),
        }));
        assert_eq!(
            t.state.live_pairing(now).map(|p| p.code.as_str()),
            Some("2@abc")
        );
        assert!(t.state.live_pairing(now + Duration::from_secs(30)).is_none());
    }

    #[test]
    fn pairing_expiry_tears_down_and_schedules_retry() {
        let s = connecting();
        let s = apply(
            &s,
            Event::PairingIssued {
                generation: 1,
                code: "c".into(),
                at: Instant::now(),
            },
        )
        .state;
        let t = apply(
            &s,
            Event::PairingExpired {
                generation: 1,
                serial: 1,
            },
        );
        assert_eq!(t.state.phase, Phase::Connecting);
        assert!(t.state.pairing.is_none());
        assert!(!t.state.has_session);
        assert_eq!(t.state.reconnect_attempts, 1);
        assert!(t.effects.contains(&Effect::Teardown));
        assert!(t.effects.contains(&Effect::ScheduleReconnect {
            generation: 1,
            delay: Duration::from_secs(2),
        }));

        let reopened = apply(&t.state, Event::Reopen { generation: 1 });
        assert_eq!(reopened.state.generation, 2);
        assert!(reopened.state.has_session);
    }

    #[test]
    fn superseded_pairing_timer_is_ignored() {
        let s = connecting();
        let at = Instant::now();
        let s = apply(
            &s,
            Event::PairingIssued {
                generation: 1,
                code: "first".into(),
                at,
            },
        )
        .state;
        let s = apply(
            &s,
            Event::PairingIssued {
                generation: 1,
                code: "second".into(),
                at,
            },
        )
        .state;
        let t = apply(
            &s,
            Event::PairingExpired {
                generation: 1,
                serial: 1,
            },
        );
        assert!(t.is_ignored());
        assert_eq!(t.state.pairing.as_ref().unwrap().code, "second");
    }

    #[test]
    fn opened_resets_attempts_and_cancels_pairing_timer() {
        let mut s = connecting();
        s.reconnect_attempts = 3;
        let t = apply(&s, Event::Opened { generation: 1 });
        assert_eq!(t.state.phase, Phase::Connected);
        assert_eq!(t.state.reconnect_attempts, 0);
        assert!(t.effects.contains(&Effect::CancelPairingTimer));
    }

    #[test]
    fn logged_out_does_not_reconnect() {
        let s = apply(&connecting(), Event::Opened { generation: 1 }).state;
        let t = apply(
            &s,
            Event::Closed {
                generation: 1,
                reason: CloseReason::LoggedOut,
            },
        );
        assert_eq!(t.state.phase, Phase::Disconnected);
        assert_eq!(t.state.reconnect_attempts, 0);
        assert!(!t.state.reconnect_pending);
        assert!(t.effects.contains(&Effect::PurgeCredentials));
        assert!(
            !t.effects
                .iter()
                .any(|e| matches!(e, Effect::ScheduleReconnect { .. }))
        );
    }

    #[test]
    fn pairing_timeout_close_idles() {
        let mut s = connecting();
        s.reconnect_attempts = 2;
        let t = apply(
            &s,
            Event::Closed {
                generation: 1,
                reason: CloseReason::PairingTimeout,
            },
        );
        assert_eq!(t.state.phase, Phase::Disconnected);
        assert_eq!(t.state.reconnect_attempts, 0);
        assert!(!t.state.reconnect_pending);
    }

    #[test]
    fn transient_close_schedules_delayed_reconnect() {
        let s = apply(&connecting(), Event::Opened { generation: 1 }).state;
        let t = apply(
            &s,
            Event::Closed {
                generation: 1,
                reason: CloseReason::Transient("stream errored".into()),
            },
        );
        assert_eq!(t.state.phase, Phase::Disconnected);
        assert_eq!(t.state.reconnect_attempts, 1);
        assert!(t.effects.contains(&Effect::ScheduleReconnect {
            generation: 1,
            delay: Duration::from_secs(3),
        }));
    }

    #[test]
    fn ceiling_freezes_the_machine() {
        let config = cfg();
        let mut s = ConnectionState::default();
        s = transition(&s, &Event::Initialize, &config).unwrap().state;

        for _ in 0..=config.max_reconnect_attempts {
            let generation = s.generation;
            s = transition(
                &s,
                &Event::Closed {
                    generation,
                    reason: CloseReason::Transient("boom".into()),
                },
                &config,
            )
            .unwrap()
            .state;
            if s.reconnect_pending {
                s = transition(&s, &Event::Reopen { generation }, &config)
                    .unwrap()
                    .state;
            }
        }

        assert!(s.is_frozen(&config));
        let before = s.clone();
        let err = transition(&s, &Event::Initialize, &config).unwrap_err();
        assert!(matches!(
            err,
            CourierError::MaxReconnectAttemptsReached { attempts: 5, max: 5 }
        ));
        assert_eq!(s, before);
    }

    #[test]
    fn events_from_old_generations_are_ignored() {
        let s = connecting();
        let s = apply(
            &s,
            Event::Closed {
                generation: 1,
                reason: CloseReason::Transient("x".into()),
            },
        )
        .state;
        let s = apply(&s, Event::Reopen { generation: 1 }).state;
        assert_eq!(s.generation, 2);

        let stale = apply(&s, Event::Opened { generation: 1 });
        assert!(stale.is_ignored());
        assert_eq!(stale.state.phase, Phase::Connecting);
    }

    #[test]
    fn reset_twice_is_clean_both_times() {
        let mut s = apply(&connecting(), Event::Opened { generation: 1 }).state;
        s.reconnect_attempts = 4;

        let first = apply(&s, Event::Reset);
        assert_eq!(first.state.phase, Phase::Disconnected);
        assert_eq!(first.state.reconnect_attempts, 0);
        assert!(first.effects.contains(&Effect::PurgeCredentials));

        let second = apply(&first.state, Event::Reset);
        assert_eq!(second.state.phase, Phase::Disconnected);
        assert_eq!(second.state.reconnect_attempts, 0);
        assert!(second.state.generation > first.state.generation);
    }

    #[test]
    fn reset_invalidates_scheduled_reopen() {
        let s = apply(
            &connecting(),
            Event::Closed {
                generation: 1,
                reason: CloseReason::Transient("x".into()),
            },
        )
        .state;
        assert!(s.reconnect_pending);
        let s = apply(&s, Event::Reset).state;
        assert!(apply(&s, Event::Reopen { generation: 1 }).is_ignored());
    }

    mod prop {
        use proptest::prelude::*;

        use super::super::*;

        #[derive(Debug, Clone)]
        enum Step {
            Initialize,
            Reopen(bool),
            Pairing(bool),
            Expire(bool, u64),
            Opened(bool),
            Closed(bool, u8),
            Reset,
        }

        fn step() -> impl Strategy<Value = Step> {
            prop_oneof![
                Just(Step::Initialize),
                any::<bool>().prop_map(Step::Reopen),
                any::<bool>().prop_map(Step::Pairing),
                (any::<bool>(), 0u64..4).prop_map(|(c, s)| Step::Expire(c, s)),
                any::<bool>().prop_map(Step::Opened),
                (any::<bool>(), 0u8..3).prop_map(|(c, r)| Step::Closed(c, r)),
                Just(Step::Reset),
            ]
        }

        fn event(state: &ConnectionState, step: &Step, at: Instant) -> Event {
            let generation = |current: bool| {
                if current {
                    state.generation
                } else {
                    state.generation.wrapping_sub(1)
                }
            };
            match step {
                Step::Initialize => Event::Initialize,
                Step::Reopen(c) => Event::Reopen {
                    generation: generation(*c),
                },
                Step::Pairing(c) => Event::PairingIssued {
                    generation: generation(*c),
                    code: "code".into(),
                    at,
                },
                Step::Expire(c, s) => Event::PairingExpired {
                    generation: generation(*c),
                    serial: state.pairing.as_ref().map_or(*s, |p| p.serial + s % 2),
                },
                Step::Opened(c) => Event::Opened {
                    generation: generation(*c),
                },
                Step::Closed(c, r) => Event::Closed {
                    generation: generation(*c),
                    reason: match r {
                        0 => CloseReason::LoggedOut,
                        1 => CloseReason::PairingTimeout,
                        _ => CloseReason::Transient("drop".into()),
                    },
                },
                Step::Reset => Event::Reset,
            }
        }

        proptest! {
            #[test]
            fn pairing_code_present_iff_awaiting_pairing(steps in prop::collection::vec(step(), 0..60)) {
                let config = MachineConfig::default();
                let at = Instant::now();
                let mut state = ConnectionState::default();
                for s in &steps {
                    let ev = event(&state, s, at);
                    let before = state.clone();
                    match transition(&state, &ev, &config) {
                        Ok(t) => state = t.state,
                        Err(_) => prop_assert_eq!(&state, &before),
                    }
                    prop_assert_eq!(
                        state.pairing.is_some(),
                        state.phase == Phase::AwaitingPairing
                    );
                    prop_assert!(state.reconnect_attempts <= config.max_reconnect_attempts);
                    if state.phase == Phase::Connected || state.phase == Phase::AwaitingPairing {
                        prop_assert!(state.has_session);
                    }
                    if state.phase == Phase::Disconnected {
                        prop_assert!(!state.has_session);
                    }
                }
            }

            #[test]
            fn initialize_at_ceiling_never_changes_phase(attempts in 5u32..10) {
                let config = MachineConfig::default();
                let state = ConnectionState::new(attempts);
                prop_assert!(transition(&state, &Event::Initialize, &config).is_err());
            }
        }
    }
}
