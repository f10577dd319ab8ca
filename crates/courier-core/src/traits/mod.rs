// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Transports extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod renderer;
pub mod settings;
pub mod transport;

pub use adapter::PluginAdapter;
pub use renderer::InvoiceRenderer;
pub use settings::SettingsSource;
pub use transport::Transport;
