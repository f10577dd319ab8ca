// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification dispatcher for the Courier messaging gateway.
//!
//! Formats order alerts, status updates, and invoices, and delivers them
//! through the provider gateway.

pub mod dispatcher;
pub mod format;
pub mod renderer;

pub use dispatcher::{DispatcherConfig, InvoiceDispatchReport, NotificationDispatcher};
pub use renderer::HttpInvoiceRenderer;
