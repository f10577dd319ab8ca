// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable session driver for connection manager tests.
//!
//! Each call to `open()` consumes the next [`OpenScript`] (or the fallback
//! once the queue is empty) and emits the scripted lifecycle events. Sends,
//! logouts, closes and purges are captured for assertion.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use courier_core::{CourierError, MessageId};
use courier_session::{MediaPayload, SessionDriver, SessionEvent, SessionHandle};
use tokio::sync::mpsc;

/// What a session does right after it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenScript {
    /// Emit a pairing code and wait for it to be scanned (or expire).
    Pair(String),
    /// Authenticate immediately.
    Connect,
    /// Emit nothing; the session hangs in `Connecting`.
    Silent,
    /// `open()` itself fails.
    Fail(String),
}

/// A message captured by [`MockSessionDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    pub jid: String,
    pub body: String,
    pub media_filename: Option<String>,
    pub media_len: usize,
}

#[derive(Debug)]
struct DriverState {
    script: Mutex<VecDeque<OpenScript>>,
    fallback: Mutex<OpenScript>,
    current: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
    sent: Mutex<Vec<SentRecord>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    logouts: AtomicUsize,
    purges: AtomicUsize,
    credentials: AtomicBool,
    fail_sends: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// Scriptable [`SessionDriver`]. Clones share state.
#[derive(Debug, Clone)]
pub struct MockSessionDriver {
    state: Arc<DriverState>,
}

impl MockSessionDriver {
    /// Every open behaves like `fallback` unless a script is queued.
    pub fn new(fallback: OpenScript) -> Self {
        Self {
            state: Arc::new(DriverState {
                script: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(fallback),
                current: Mutex::new(None),
                sent: Mutex::new(Vec::new()),
                opens: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                logouts: AtomicUsize::new(0),
                purges: AtomicUsize::new(0),
                credentials: AtomicBool::new(false),
                fail_sends: AtomicBool::new(false),
            }),
        }
    }

    /// Sessions authenticate on open.
    pub fn connecting() -> Self {
        Self::new(OpenScript::Connect)
    }

    /// Sessions never progress past `Connecting`.
    pub fn silent() -> Self {
        Self::new(OpenScript::Silent)
    }

    /// Queue behaviors for the next opens, in order.
    pub fn push_script(&self, scripts: impl IntoIterator<Item = OpenScript>) {
        lock(&self.state.script).extend(scripts);
    }

    pub fn set_fallback(&self, script: OpenScript) {
        *lock(&self.state.fallback) = script;
    }

    /// Deliver an event on the most recently opened session.
    pub fn emit(&self, event: SessionEvent) -> bool {
        lock(&self.state.current)
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    pub fn set_credentials(&self, present: bool) {
        self.state.credentials.store(present, Ordering::SeqCst);
    }

    /// Make subsequent sends fail with a transport error.
    pub fn fail_sends(&self, fail: bool) {
        self.state.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn logout_count(&self) -> usize {
        self.state.logouts.load(Ordering::SeqCst)
    }

    pub fn purge_count(&self) -> usize {
        self.state.purges.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SentRecord> {
        lock(&self.state.sent).clone()
    }
}

#[async_trait]
impl SessionDriver for MockSessionDriver {
    async fn open(
        &self,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Box<dyn SessionHandle>, CourierError> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        let script = lock(&self.state.script)
            .pop_front()
            .unwrap_or_else(|| lock(&self.state.fallback).clone());

        match script {
            OpenScript::Fail(message) => {
                return Err(CourierError::transport("mock-session", message));
            }
            OpenScript::Pair(code) => {
                let _ = events.send(SessionEvent::PairingCode(code));
            }
            OpenScript::Connect => {
                self.state.credentials.store(true, Ordering::SeqCst);
                let _ = events.send(SessionEvent::Open);
            }
            OpenScript::Silent => {}
        }

        *lock(&self.state.current) = Some(events);
        Ok(Box::new(MockSessionHandle {
            state: Arc::clone(&self.state),
        }))
    }

    fn has_credentials(&self) -> bool {
        self.state.credentials.load(Ordering::SeqCst)
    }

    async fn purge_credentials(&self) -> Result<(), CourierError> {
        self.state.purges.fetch_add(1, Ordering::SeqCst);
        self.state.credentials.store(false, Ordering::SeqCst);
        Ok(())
    }
}

struct MockSessionHandle {
    state: Arc<DriverState>,
}

impl MockSessionHandle {
    fn record(&self, record: SentRecord) -> Result<MessageId, CourierError> {
        if self.state.fail_sends.load(Ordering::SeqCst) {
            return Err(CourierError::transport("mock-session", "send rejected"));
        }
        let mut sent = lock(&self.state.sent);
        sent.push(record);
        Ok(MessageId(format!("mock-msg-{}", sent.len())))
    }
}

#[async_trait]
impl SessionHandle for MockSessionHandle {
    async fn send_text(&self, jid: &str, body: &str) -> Result<MessageId, CourierError> {
        self.record(SentRecord {
            jid: jid.to_string(),
            body: body.to_string(),
            media_filename: None,
            media_len: 0,
        })
    }

    async fn send_media(
        &self,
        jid: &str,
        media: MediaPayload,
        caption: &str,
    ) -> Result<MessageId, CourierError> {
        self.record(SentRecord {
            jid: jid.to_string(),
            body: caption.to_string(),
            media_filename: Some(media.filename),
            media_len: media.bytes.len(),
        })
    }

    async fn logout(&self) -> Result<(), CourierError> {
        self.state.logouts.fetch_add(1, Ordering::SeqCst);
        self.state.credentials.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), CourierError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
