// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport adapter trait for message delivery mechanisms.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MessageId, OutboundMessage, ProviderKind};

/// A single delivery mechanism (cloud API, browser automation, socket session,
/// compose link).
///
/// Implementations report any failure as an error; deciding what to do about
/// it is the provider gateway's job.
#[async_trait]
pub trait Transport: PluginAdapter {
    /// Which provider this transport implements.
    fn kind(&self) -> ProviderKind;

    /// Delivers the message and returns the transport-assigned id.
    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, CourierError>;
}
