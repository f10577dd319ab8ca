// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.
//!
//! Provides mock collaborators and a test harness for fast, deterministic,
//! CI-runnable tests without a real messaging network.
//!
//! # Components
//!
//! - [`MockTransport`] - Transport that records messages and can be told to fail
//! - [`MockSessionDriver`] - Scriptable socket session for connection manager tests
//! - [`MockRenderer`] - Invoice renderer returning fixed bytes or failing
//! - [`TestHarness`] - Broker, gateway, and dispatcher wired to the mocks

pub mod harness;
pub mod mock_renderer;
pub mod mock_session;
pub mod mock_transport;

pub use harness::{ADMIN_PHONE, PUBLIC_BASE_URL, TestHarness, TestHarnessBuilder, sample_order};
pub use mock_renderer::MockRenderer;
pub use mock_session::{MockSessionDriver, OpenScript, SentRecord};
pub use mock_transport::MockTransport;
