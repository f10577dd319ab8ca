// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolve a [`MediaRef`] into bytes.
//!
//! Hosted assets are read straight from the broker, including URLs that
//! point back at our own `/media/{id}` route. Anything else is downloaded or
//! read from disk.

use std::path::Path;
use std::time::Duration;

use courier_core::{CourierError, MediaRef};
use courier_media::{MediaBroker, guess_content_type};
use courier_session::MediaPayload;
use futures::StreamExt;
use tracing::debug;

/// Downloads and loads attachments for transports that need raw bytes.
#[derive(Debug, Clone)]
pub struct MediaFetcher {
    client: reqwest::Client,
    broker: MediaBroker,
    max_bytes: usize,
}

impl MediaFetcher {
    pub fn new(broker: MediaBroker, max_bytes: usize, timeout: Duration) -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CourierError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            broker,
            max_bytes,
        })
    }

    pub fn broker(&self) -> &MediaBroker {
        &self.broker
    }

    /// Load the attachment behind `media`. `transport` labels errors.
    pub async fn load(&self, transport: &str, media: &MediaRef) -> Result<MediaPayload, CourierError> {
        match media {
            MediaRef::Hosted(id) => self.from_broker(id),
            MediaRef::Url(url) => match self.broker.id_from_url(url) {
                Some(id) => self.from_broker(id),
                None => self.download(transport, url).await,
            },
            MediaRef::Path(path) => self.read_file(transport, path).await,
        }
    }

    fn from_broker(&self, id: &str) -> Result<MediaPayload, CourierError> {
        let asset = self.broker.get(id)?;
        debug!(id = %id, bytes = asset.payload.len(), "media loaded from broker");
        Ok(MediaPayload {
            bytes: asset.payload.clone(),
            filename: asset.filename.clone(),
            content_type: asset.content_type.to_string(),
        })
    }

    /// Fetch `url` over HTTP. Non-2xx responses and oversized bodies fail.
    pub async fn download(&self, transport: &str, url: &str) -> Result<MediaPayload, CourierError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CourierError::transport_with(transport, format!("media download failed: {e}"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CourierError::transport(
                transport,
                format!("media download returned {status}"),
            ));
        }

        let header_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        if let Some(len) = response
            .content_length()
            .filter(|&len| len > self.max_bytes as u64)
        {
            return Err(self.too_large(transport, len));
        }

        let mut bytes = Vec::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                CourierError::transport_with(transport, format!("media download failed: {e}"), e)
            })?;
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(transport, (bytes.len() + chunk.len()) as u64));
            }
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(CourierError::transport(transport, "media download was empty"));
        }

        let filename = filename_from_url(url);
        let content_type = header_type
            .filter(|t| !t.is_empty() && t != "application/octet-stream")
            .unwrap_or_else(|| guess_content_type(&filename).to_string());
        debug!(url = %url, bytes = bytes.len(), content_type = %content_type, "media downloaded");

        Ok(MediaPayload {
            bytes,
            filename,
            content_type,
        })
    }

    /// `seen` is the declared length, or the bytes read when the limit tripped.
    fn too_large(&self, transport: &str, seen: u64) -> CourierError {
        CourierError::transport(
            transport,
            format!("media is at least {seen} bytes, limit is {}", self.max_bytes),
        )
    }

    async fn read_file(&self, transport: &str, path: &Path) -> Result<MediaPayload, CourierError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            CourierError::transport_with(
                transport,
                format!("cannot read media file {}: {e}", path.display()),
                e,
            )
        })?;
        if bytes.len() > self.max_bytes {
            return Err(self.too_large(transport, bytes.len() as u64));
        }
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment.bin".to_string());
        Ok(MediaPayload {
            content_type: guess_content_type(&filename).to_string(),
            filename,
            bytes,
        })
    }
}

/// Last path segment of a URL, without query or fragment.
pub(crate) fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);
    match path.split_once('/') {
        Some((_, tail)) => tail
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or("attachment.bin")
            .to_string(),
        None => "attachment.bin".to_string(),
    }
}
