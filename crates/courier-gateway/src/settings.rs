// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime-swappable messaging settings.

use std::sync::Arc;

use arc_swap::ArcSwap;
use courier_core::{MessagingSettings, SettingsSource};
use tracing::info;

/// Messaging settings that can be replaced while the server runs.
///
/// Readers get a consistent snapshot per call; writers swap the whole value.
/// Clones share the same cell.
#[derive(Debug, Clone)]
pub struct SharedSettings {
    cell: Arc<ArcSwap<MessagingSettings>>,
}

impl SharedSettings {
    pub fn new(settings: MessagingSettings) -> Self {
        Self {
            cell: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    /// Replace the settings wholesale.
    pub fn store(&self, settings: MessagingSettings) {
        info!(
            provider = %settings.provider,
            manual_only = settings.prefer_manual_link_only,
            "messaging settings updated"
        );
        self.cell.store(Arc::new(settings));
    }

    /// Apply `f` to a copy of the current settings and store the result.
    pub fn update(&self, f: impl FnOnce(&mut MessagingSettings)) -> Arc<MessagingSettings> {
        let mut next = MessagingSettings::clone(&self.cell.load());
        f(&mut next);
        self.store(next);
        self.cell.load_full()
    }
}

impl SettingsSource for SharedSettings {
    fn current(&self) -> Arc<MessagingSettings> {
        self.cell.load_full()
    }
}

#[cfg(test)]
mod tests {
    use courier_core::ProviderKind;

    use super::*;

    #[test]
    fn update_is_visible_to_clones() {
        let settings = SharedSettings::new(MessagingSettings::default());
        let reader = settings.clone();
        assert_eq!(reader.current().provider, ProviderKind::Manual);

        let updated = settings.update(|s| s.provider = ProviderKind::Socket);
        assert_eq!(updated.provider, ProviderKind::Socket);
        assert_eq!(reader.current().provider, ProviderKind::Socket);
    }

    #[test]
    fn snapshots_are_stable_across_swaps() {
        let settings = SharedSettings::new(MessagingSettings::default());
        let before = settings.current();
        settings.store(MessagingSettings {
            provider: ProviderKind::Cloud,
            ..MessagingSettings::default()
        });
        assert_eq!(before.provider, ProviderKind::Manual);
        assert_eq!(settings.current().provider, ProviderKind::Cloud);
    }
}
