// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Settings collaborator trait.

use std::sync::Arc;

use crate::settings::MessagingSettings;

/// Source of the current messaging settings.
///
/// Read on every dispatch so that provider changes take effect without a
/// restart.
pub trait SettingsSource: Send + Sync {
    fn current(&self) -> Arc<MessagingSettings>;
}

impl SettingsSource for MessagingSettings {
    fn current(&self) -> Arc<MessagingSettings> {
        Arc::new(self.clone())
    }
}
