// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short-lived media store for the Courier messaging gateway.
//!
//! Rendered invoices and receipt images are parked here under an opaque id so
//! transports that only accept a link can fetch them over HTTP. Entries carry
//! an absolute expiry; expired entries are evicted lazily on lookup.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_core::CourierError;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

/// A stored attachment.
#[derive(Debug)]
pub struct MediaAsset {
    pub id: String,
    pub filename: String,
    pub content_type: &'static str,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    expires_at: Instant,
}

impl MediaAsset {
    /// Whether the asset is still readable at `now`.
    pub fn is_live_at(&self, now: Instant) -> bool {
        now <= self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct MediaBrokerConfig {
    /// Base URL under which `GET /media/{id}` is reachable.
    pub public_base_url: String,
    pub default_ttl: Duration,
    pub max_bytes: usize,
}

/// TTL-bound, process-local media store.
///
/// Cloning is cheap and clones share the same backing map.
#[derive(Debug, Clone)]
pub struct MediaBroker {
    assets: Arc<DashMap<String, Arc<MediaAsset>>>,
    config: Arc<MediaBrokerConfig>,
}

impl MediaBroker {
    pub fn new(config: MediaBrokerConfig) -> Self {
        Self {
            assets: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.config.default_ttl
    }

    /// Store `payload` and return its freshly generated id.
    pub fn put(
        &self,
        payload: Vec<u8>,
        filename: &str,
        ttl: Duration,
    ) -> Result<String, CourierError> {
        if payload.is_empty() {
            return Err(CourierError::InvalidInput("media payload is empty".into()));
        }
        if payload.len() > self.config.max_bytes {
            return Err(CourierError::InvalidInput(format!(
                "media payload is {} bytes, limit is {}",
                payload.len(),
                self.config.max_bytes
            )));
        }
        if ttl.is_zero() {
            return Err(CourierError::InvalidInput("media ttl must be positive".into()));
        }
        let expires_at = Instant::now().checked_add(ttl).ok_or_else(|| {
            CourierError::InvalidInput(format!("media ttl of {}s is out of range", ttl.as_secs()))
        })?;

        let id = uuid::Uuid::new_v4().simple().to_string();
        let filename = sanitize_filename(filename);
        let asset = MediaAsset {
            id: id.clone(),
            content_type: guess_content_type(&filename),
            filename,
            created_at: Utc::now(),
            expires_at,
            payload,
        };
        debug!(
            id = %id,
            filename = %asset.filename,
            bytes = asset.payload.len(),
            ttl_secs = ttl.as_secs_f64(),
            "media stored"
        );
        self.assets.insert(id.clone(), Arc::new(asset));
        Ok(id)
    }

    /// Fetch a live asset. Expired entries are evicted and reported missing.
    pub fn get(&self, id: &str) -> Result<Arc<MediaAsset>, CourierError> {
        let now = Instant::now();
        let asset = self
            .assets
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CourierError::MediaUnavailable { id: id.to_string() })?;

        if asset.is_live_at(now) {
            return Ok(asset);
        }

        self.assets
            .remove_if(id, |_, current| Arc::ptr_eq(current, &asset));
        debug!(id = %id, "media expired, evicted");
        Err(CourierError::MediaUnavailable { id: id.to_string() })
    }

    /// Public URL for an asset id. Does not check that the asset exists.
    pub fn resolve_url(&self, id: &str) -> String {
        format!(
            "{}/media/{id}",
            self.config.public_base_url.trim_end_matches('/')
        )
    }

    /// Extract the asset id from a URL produced by [`resolve_url`](Self::resolve_url).
    pub fn id_from_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        let base = self.config.public_base_url.trim_end_matches('/');
        url.strip_prefix(base)?
            .strip_prefix("/media/")
            .filter(|id| !id.is_empty() && !id.contains('/'))
    }

    /// Explicit eviction. Returns whether an entry was removed.
    pub fn remove(&self, id: &str) -> bool {
        self.assets.remove(id).is_some()
    }

    /// Entries currently held, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

fn sanitize_filename(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if name.is_empty() {
        "attachment.bin".to_string()
    } else {
        name.to_string()
    }
}

/// Content type from a filename extension.
pub fn guess_content_type(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain; charset=utf-8",
        "html" | "htm" => "text/html; charset=utf-8",
        "mp4" => "video/mp4",
        "ogg" | "opus" => "audio/ogg",
        _ => "application/octet-stream",
    }
}
