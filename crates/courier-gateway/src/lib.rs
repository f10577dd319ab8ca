// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider gateway for the Courier messaging gateway.
//!
//! [`ProviderGateway`] reads the configured provider on every call, invokes
//! the matching transport, and turns any failure into a compose link so the
//! caller always ends up with something deliverable.

pub mod gateway;
pub mod settings;

pub use gateway::ProviderGateway;
pub use settings::SharedSettings;
