// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Browser-automation transport.
//!
//! Drives an already logged-in web client through a W3C WebDriver endpoint
//! (chromedriver, geckodriver, or a selenium grid). One browser session is
//! created lazily and reused; it is dropped after any failure so the next
//! send starts clean.
//!
//! Per message:
//! 1. navigate to `{web_client_url}/send?phone=<digits>&text=<encoded>`
//! 2. for media, hand a local file path to the attachment input
//! 3. wait for the send button and click it

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use courier_config::BrowserConfig;
use courier_core::{
    CourierError, HealthStatus, MediaRef, MessageId, OutboundMessage, PluginAdapter, ProviderKind,
    Transport,
};
use percent_encoding::utf8_percent_encode;
use serde_json::{Value, json};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::fetch::MediaFetcher;
use crate::manual::COMPONENT;

const NAME: &str = "browser";

/// Key under which WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// WebDriver-backed web client transport.
pub struct BrowserTransport {
    client: reqwest::Client,
    webdriver_url: String,
    config: BrowserConfig,
    fetcher: MediaFetcher,
    session: Mutex<Option<String>>,
    counter: AtomicU64,
}

/// A file the browser can read. Downloaded media lives in a temp file that is
/// deleted when this drops.
enum LocalFile {
    Existing(PathBuf),
    Temporary(NamedTempFile),
}

impl LocalFile {
    fn path(&self) -> &Path {
        match self {
            LocalFile::Existing(path) => path,
            LocalFile::Temporary(file) => file.path(),
        }
    }
}

impl BrowserTransport {
    pub fn new(config: &BrowserConfig, fetcher: MediaFetcher) -> Result<Self, CourierError> {
        let webdriver_url = config
            .webdriver_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| CourierError::Config("browser.webdriver_url is required".into()))?
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.ready_timeout_secs.max(1) + 10))
            .build()
            .map_err(|e| CourierError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            webdriver_url,
            config: config.clone(),
            fetcher,
            session: Mutex::new(None),
            counter: AtomicU64::new(0),
        })
    }

    /// Issue one WebDriver command and return its `value`.
    async fn command(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, CourierError> {
        let url = format!("{}{path}", self.webdriver_url);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| CourierError::transport_with(NAME, format!("webdriver request failed: {e}"), e))?;

        let status = response.status();
        let payload: Value = response.json().await.map_err(|e| {
            CourierError::transport_with(NAME, format!("webdriver response unreadable: {e}"), e)
        })?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);

        if !status.is_success() {
            let error = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
            let message = value.get("message").and_then(Value::as_str).unwrap_or_default();
            return Err(CourierError::transport(
                NAME,
                format!("webdriver {path} returned {status}: {error} {message}").trim_end().to_string(),
            ));
        }
        Ok(value)
    }

    async fn session_id(&self) -> Result<String, CourierError> {
        let mut session = self.session.lock().await;
        if let Some(id) = session.as_ref() {
            return Ok(id.clone());
        }
        let value = self
            .command(
                reqwest::Method::POST,
                "/session",
                Some(json!({ "capabilities": { "alwaysMatch": {} } })),
            )
            .await?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| CourierError::transport(NAME, "webdriver did not return a session id"))?
            .to_string();
        info!(session = %id, "browser session created");
        *session = Some(id.clone());
        Ok(id)
    }

    async fn discard_session(&self) {
        let Some(id) = self.session.lock().await.take() else {
            return;
        };
        if let Err(e) = self
            .command(reqwest::Method::DELETE, &format!("/session/{id}"), None)
            .await
        {
            debug!(error = %e, "browser session delete failed");
        }
    }

    /// Poll for `selector` until it appears or the ready timeout passes.
    async fn wait_for_element(&self, session: &str, selector: &str) -> Result<String, CourierError> {
        let deadline = Instant::now() + Duration::from_secs(self.config.ready_timeout_secs);
        let path = format!("/session/{session}/element");
        let query = json!({ "using": "css selector", "value": selector });

        loop {
            match self
                .command(reqwest::Method::POST, &path, Some(query.clone()))
                .await
            {
                Ok(value) => {
                    if let Some(id) = value.get(ELEMENT_KEY).and_then(Value::as_str) {
                        return Ok(id.to_string());
                    }
                }
                Err(e) => debug!(selector, error = %e, "element not ready"),
            }
            if Instant::now() >= deadline {
                return Err(CourierError::transport(
                    NAME,
                    format!("element `{selector}` did not appear within {}s", self.config.ready_timeout_secs),
                ));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Make the attachment readable by the browser.
    async fn local_file(&self, media: &MediaRef) -> Result<LocalFile, CourierError> {
        if let MediaRef::Path(path) = media {
            return Ok(LocalFile::Existing(path.clone()));
        }
        let payload = self.fetcher.load(NAME, media).await?;
        let suffix = payload
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{ext}"))
            .unwrap_or_default();
        let file = tempfile::Builder::new()
            .prefix("courier-media-")
            .suffix(&suffix)
            .tempfile()?;
        tokio::fs::write(file.path(), &payload.bytes).await?;
        Ok(LocalFile::Temporary(file))
    }

    async fn deliver(&self, session: &str, msg: &OutboundMessage) -> Result<(), CourierError> {
        let url = compose_url(&self.config.web_client_url, msg.recipient.digits(), &msg.body);
        self.command(
            reqwest::Method::POST,
            &format!("/session/{session}/url"),
            Some(json!({ "url": url })),
        )
        .await?;

        // Held until the click so the temp file outlives the upload.
        let _attachment = match &msg.media {
            Some(media) => {
                let file = self.local_file(media).await?;
                let input = self
                    .wait_for_element(session, &self.config.attach_input_selector)
                    .await?;
                self.command(
                    reqwest::Method::POST,
                    &format!("/session/{session}/element/{input}/value"),
                    Some(json!({ "text": file.path().to_string_lossy() })),
                )
                .await?;
                Some(file)
            }
            None => None,
        };

        let button = self
            .wait_for_element(session, &self.config.send_button_selector)
            .await?;
        self.command(
            reqwest::Method::POST,
            &format!("/session/{session}/element/{button}/click"),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }
}

/// Compose page URL with the body pre-filled.
fn compose_url(web_client_url: &str, digits: &str, body: &str) -> String {
    format!(
        "{}/send?phone={digits}&text={}",
        web_client_url.trim_end_matches('/'),
        utf8_percent_encode(body, COMPONENT)
    )
}

#[async_trait]
impl PluginAdapter for BrowserTransport {
    fn name(&self) -> &str {
        "browser-webdriver"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        match self.command(reqwest::Method::GET, "/status", None).await {
            Ok(value) if value.get("ready").and_then(Value::as_bool) == Some(false) => Ok(
                HealthStatus::Degraded("webdriver reports not ready".into()),
            ),
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        self.discard_session().await;
        Ok(())
    }
}

#[async_trait]
impl Transport for BrowserTransport {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Browser
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, CourierError> {
        let session = self.session_id().await?;
        if let Err(e) = self.deliver(&session, msg).await {
            warn!(error = %e, recipient = %msg.recipient.masked(), "browser send failed, dropping session");
            self.discard_session().await;
            return Err(e);
        }
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(MessageId(format!("browser-{session}-{n}")))
    }
}
