// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier messaging gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use courier_core::{MessagingSettings, ProviderKind};
use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub courier: CourierSection,

    /// Provider selection and notification policy.
    #[serde(default)]
    pub messaging: MessagingConfig,

    /// Socket session lifecycle settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Media broker settings.
    #[serde(default)]
    pub media: MediaConfig,

    /// Hosted cloud API settings.
    #[serde(default)]
    pub cloud: CloudConfig,

    /// Browser-automation settings.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// External invoice renderer.
    #[serde(default)]
    pub renderer: RendererConfig,

    /// HTTP API settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl CourierConfig {
    /// Build the runtime-adjustable messaging settings seeded from this config.
    pub fn messaging_settings(&self) -> MessagingSettings {
        MessagingSettings {
            provider: self.messaging.provider,
            admin_phone_number: self.messaging.admin_phone_number.clone(),
            enable_order_notifications: self.messaging.enable_order_notifications,
            prefer_manual_link_only: self.messaging.prefer_manual_link_only,
            default_country_code: self.messaging.default_country_code.clone(),
            session_path: self.session.session_path.clone(),
            public_base_url: self.media.public_base_url.clone(),
        }
    }
}

/// Process identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierSection {
    /// Instance name, reported by `/health`.
    #[serde(default = "default_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CourierSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_name() -> String {
    "courier".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Provider selection and notification policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessagingConfig {
    /// Transport tried first: `cloud`, `browser`, `socket` or `manual`.
    #[serde(default)]
    pub provider: ProviderKind,

    /// Recipient for new-order alerts.
    #[serde(default)]
    pub admin_phone_number: Option<String>,

    /// Master switch for order notifications.
    #[serde(default = "default_true")]
    pub enable_order_notifications: bool,

    /// Never attempt automated transports; always produce compose links.
    /// Set this on ephemeral hosts where sessions cannot be kept warm.
    #[serde(default)]
    pub prefer_manual_link_only: bool,

    /// Country code (digits only) applied to national-format numbers.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,

    /// Base URL for compose links.
    #[serde(default = "default_manual_link_base")]
    pub manual_link_base: String,

    /// Currency code printed next to amounts.
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            admin_phone_number: None,
            enable_order_notifications: true,
            prefer_manual_link_only: false,
            default_country_code: default_country_code(),
            manual_link_base: default_manual_link_base(),
            currency: default_currency(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_country_code() -> String {
    "251".to_string()
}

fn default_manual_link_base() -> String {
    "https://wa.me".to_string()
}

fn default_currency() -> String {
    "ETB".to_string()
}

/// Socket session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Directory holding durable session credentials.
    #[serde(default = "default_session_path")]
    pub session_path: String,

    /// JSON snapshot of the connection state, used for crash recovery.
    #[serde(default = "default_state_file")]
    pub state_file: String,

    /// WebSocket endpoint of the local protocol bridge.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Consecutive failed connect cycles before the manager freezes.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Delay before an automatic reconnect after a transient close.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Lifetime of an issued pairing code.
    #[serde(default = "default_pairing_ttl_secs")]
    pub pairing_ttl_secs: u64,

    /// Delay before re-initializing after a pairing code expires.
    #[serde(default = "default_pairing_retry_delay_secs")]
    pub pairing_retry_delay_secs: u64,

    /// Age after which a persisted `Connecting` snapshot is discarded.
    #[serde(default = "default_stale_connecting_secs")]
    pub stale_connecting_secs: u64,

    /// How long a socket send waits for an in-flight connect.
    #[serde(default = "default_send_wait_secs")]
    pub send_wait_secs: u64,

    /// How long `POST /v1/connection/initialize` waits for a pairing code.
    #[serde(default = "default_initialize_wait_secs")]
    pub initialize_wait_secs: u64,

    /// Open the session on startup when credentials already exist.
    #[serde(default)]
    pub auto_connect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_path: default_session_path(),
            state_file: default_state_file(),
            bridge_url: default_bridge_url(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            pairing_ttl_secs: default_pairing_ttl_secs(),
            pairing_retry_delay_secs: default_pairing_retry_delay_secs(),
            stale_connecting_secs: default_stale_connecting_secs(),
            send_wait_secs: default_send_wait_secs(),
            initialize_wait_secs: default_initialize_wait_secs(),
            auto_connect: false,
        }
    }
}

fn default_session_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("courier/session").display().to_string())
        .unwrap_or_else(|| "courier-session".to_string())
}

fn default_state_file() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("courier/connection-state.json").display().to_string())
        .unwrap_or_else(|| "connection-state.json".to_string())
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:3001/bridge".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_delay_secs() -> u64 {
    3
}

fn default_pairing_ttl_secs() -> u64 {
    30
}

fn default_pairing_retry_delay_secs() -> u64 {
    2
}

fn default_stale_connecting_secs() -> u64 {
    120
}

fn default_send_wait_secs() -> u64 {
    3
}

fn default_initialize_wait_secs() -> u64 {
    5
}

/// Media broker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediaConfig {
    /// Externally reachable base URL; hosted media resolves to `{base}/media/{id}`.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// TTL applied when an upload does not specify one.
    #[serde(default = "default_media_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Largest accepted payload.
    #[serde(default = "default_media_max_bytes")]
    pub max_bytes: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_public_base_url(),
            default_ttl_secs: default_media_ttl_secs(),
            max_bytes: default_media_max_bytes(),
        }
    }
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8088".to_string()
}

fn default_media_ttl_secs() -> u64 {
    600
}

fn default_media_max_bytes() -> usize {
    16 * 1024 * 1024
}

/// Hosted cloud messaging API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CloudConfig {
    /// API root, without trailing slash.
    #[serde(default = "default_cloud_api_base")]
    pub api_base: String,

    /// Bearer access token.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Sender phone number id.
    #[serde(default)]
    pub phone_number_id: Option<String>,

    /// Per-request timeout.
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_base: default_cloud_api_base(),
            access_token: None,
            phone_number_id: None,
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_cloud_api_base() -> String {
    "https://graph.facebook.com/v21.0".to_string()
}

fn default_http_timeout_secs() -> u64 {
    15
}

/// Browser-automation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BrowserConfig {
    /// WebDriver endpoint (chromedriver, geckodriver, selenium).
    #[serde(default)]
    pub webdriver_url: Option<String>,

    /// Web client root; compose pages are opened under it.
    #[serde(default = "default_web_client_url")]
    pub web_client_url: String,

    /// CSS selector of the send button.
    #[serde(default = "default_send_button_selector")]
    pub send_button_selector: String,

    /// CSS selector of the attachment file input.
    #[serde(default = "default_attach_input_selector")]
    pub attach_input_selector: String,

    /// How long to wait for the compose page to become ready.
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: None,
            web_client_url: default_web_client_url(),
            send_button_selector: default_send_button_selector(),
            attach_input_selector: default_attach_input_selector(),
            ready_timeout_secs: default_ready_timeout_secs(),
        }
    }
}

fn default_web_client_url() -> String {
    "https://web.whatsapp.com".to_string()
}

fn default_send_button_selector() -> String {
    "span[data-icon='send']".to_string()
}

fn default_attach_input_selector() -> String {
    "input[type='file']".to_string()
}

fn default_ready_timeout_secs() -> u64 {
    20
}

/// External invoice renderer configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RendererConfig {
    /// Endpoint receiving order JSON and returning image bytes.
    #[serde(default)]
    pub invoice_url: Option<String>,
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Token required on `/v1/*`. Those routes reject every request when unset.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Install the Prometheus recorder and expose `/metrics`.
    #[serde(default = "default_true")]
    pub prometheus: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            prometheus: true,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8088
}
