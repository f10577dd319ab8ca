// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport adapters for the Courier messaging gateway.
//!
//! Four interchangeable senders behind [`courier_core::Transport`]:
//! - [`CloudTransport`]: hosted cloud messaging REST API
//! - [`BrowserTransport`]: web client driven over WebDriver
//! - [`SocketTransport`]: the connection manager's live session
//! - [`ManualLinkTransport`]: pre-filled compose links, never fails

pub mod browser;
pub mod cloud;
pub mod fetch;
pub mod manual;
pub mod socket;

pub use browser::BrowserTransport;
pub use cloud::CloudTransport;
pub use fetch::MediaFetcher;
pub use manual::ManualLinkTransport;
pub use socket::SocketTransport;
