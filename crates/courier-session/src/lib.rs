// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection manager for the persistent socket session.
//!
//! - [`machine`]: the pure transition function and its state.
//! - [`manager`]: timers, the event loop, and the public entry points.
//! - [`snapshot`]: the crash-recovery file.
//! - [`driver`] and [`bridge`]: the protocol client seam and its WebSocket
//!   implementation.

pub mod bridge;
pub mod driver;
pub mod machine;
pub mod manager;
pub mod pairing;
pub mod snapshot;

pub use bridge::{BridgeConfig, BridgeDriver};
pub use driver::{MediaPayload, SessionDriver, SessionEvent, SessionHandle};
pub use machine::{CloseReason, ConnectionState, MachineConfig, Phase};
pub use manager::{ConnectionManager, ConnectionStatus, ManagerConfig};
pub use pairing::render_qr;
pub use snapshot::{SnapshotStore, StateSnapshot};
