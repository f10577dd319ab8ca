// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier messaging gateway.
//!
//! This crate provides the error taxonomy, shared types, and adapter traits
//! used throughout the workspace. Every transport implements traits defined
//! here.

pub mod error;
pub mod order;
pub mod recipient;
pub mod settings;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use order::{CustomerInfo, LineItem, OrderNotificationPayload};
pub use recipient::Recipient;
pub use settings::MessagingSettings;
pub use types::{DeliveryResult, HealthStatus, MediaRef, MessageId, OutboundMessage, ProviderKind};

pub use traits::{InvoiceRenderer, PluginAdapter, SettingsSource, Transport};
