// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging settings supplied by the persistence/config collaborator.

use serde::{Deserialize, Serialize};

use crate::types::ProviderKind;

/// The runtime-adjustable knobs the gateway and dispatcher read on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingSettings {
    /// Transport tried first.
    pub provider: ProviderKind,
    /// Recipient for new-order alerts.
    pub admin_phone_number: Option<String>,
    /// Master switch for order notifications.
    pub enable_order_notifications: bool,
    /// Skip automated transports and always produce compose links.
    pub prefer_manual_link_only: bool,
    /// Country code applied to national-format numbers.
    pub default_country_code: String,
    /// Directory holding durable socket session material.
    pub session_path: String,
    /// Base URL under which hosted media is published.
    pub public_base_url: String,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Manual,
            admin_phone_number: None,
            enable_order_notifications: true,
            prefer_manual_link_only: false,
            default_country_code: "251".to_string(),
            session_path: "session".to_string(),
            public_base_url: "http://127.0.0.1:8088".to_string(),
        }
    }
}

impl MessagingSettings {
    /// Whether only compose links are produced, either by policy or by
    /// choosing the manual provider outright.
    pub fn is_manual_mode(&self) -> bool {
        self.prefer_manual_link_only || self.provider == ProviderKind::Manual
    }
}
