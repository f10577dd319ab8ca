// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks cross-field constraints serde cannot express, such as credentials
//! required by the selected provider and non-zero lifecycle timings.

use courier_core::{ProviderKind, Recipient};

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let messaging = &config.messaging;

    if messaging.default_country_code.is_empty()
        || !messaging
            .default_country_code
            .chars()
            .all(|c| c.is_ascii_digit())
    {
        errors.push(ConfigError::validation(format!(
            "messaging.default_country_code must be digits only, got `{}`",
            messaging.default_country_code
        )));
    }

    if let Some(admin) = &messaging.admin_phone_number {
        if let Err(e) = Recipient::parse(admin, &messaging.default_country_code) {
            errors.push(ConfigError::validation(format!(
                "messaging.admin_phone_number is not a usable phone number: {e}"
            )));
        }
    }

    if !is_http_url(&messaging.manual_link_base) {
        errors.push(ConfigError::validation(format!(
            "messaging.manual_link_base must be an http(s) URL, got `{}`",
            messaging.manual_link_base
        )));
    }

    match messaging.provider {
        ProviderKind::Cloud => {
            if is_blank(config.cloud.access_token.as_deref()) {
                errors.push(ConfigError::validation(
                    "cloud.access_token is required when messaging.provider = \"cloud\"",
                ));
            }
            if is_blank(config.cloud.phone_number_id.as_deref()) {
                errors.push(ConfigError::validation(
                    "cloud.phone_number_id is required when messaging.provider = \"cloud\"",
                ));
            }
        }
        ProviderKind::Browser => {
            if is_blank(config.browser.webdriver_url.as_deref()) {
                errors.push(ConfigError::validation(
                    "browser.webdriver_url is required when messaging.provider = \"browser\"",
                ));
            }
        }
        ProviderKind::Socket => {
            if config.session.bridge_url.trim().is_empty() {
                errors.push(ConfigError::validation(
                    "session.bridge_url is required when messaging.provider = \"socket\"",
                ));
            }
        }
        ProviderKind::Manual => {}
    }

    if config.session.session_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "session.session_path must not be empty",
        ));
    }
    if config.session.state_file.trim().is_empty() {
        errors.push(ConfigError::validation("session.state_file must not be empty"));
    }
    if config.session.max_reconnect_attempts == 0 {
        errors.push(ConfigError::validation(
            "session.max_reconnect_attempts must be at least 1",
        ));
    }
    for (key, value) in [
        ("session.pairing_ttl_secs", config.session.pairing_ttl_secs),
        ("session.stale_connecting_secs", config.session.stale_connecting_secs),
        ("media.default_ttl_secs", config.media.default_ttl_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!("{key} must be greater than 0")));
        }
    }

    if config.media.public_base_url.trim().is_empty() {
        errors.push(ConfigError::validation(
            "media.public_base_url must not be empty",
        ));
    } else if !is_http_url(&config.media.public_base_url) {
        errors.push(ConfigError::validation(format!(
            "media.public_base_url must be an http(s) URL, got `{}`",
            config.media.public_base_url
        )));
    }
    if config.media.max_bytes == 0 {
        errors.push(ConfigError::validation("media.max_bytes must be greater than 0"));
    }

    if let Some(url) = &config.renderer.invoice_url {
        if !is_http_url(url) {
            errors.push(ConfigError::validation(format!(
                "renderer.invoice_url must be an http(s) URL, got `{url}`"
            )));
        }
    }

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn cloud_provider_requires_credentials() {
        let mut config = CourierConfig::default();
        config.messaging.provider = ProviderKind::Cloud;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "cloud.access_token"));
        assert!(has_error(&errors, "cloud.phone_number_id"));
    }

    #[test]
    fn browser_provider_requires_webdriver() {
        let mut config = CourierConfig::default();
        config.messaging.provider = ProviderKind::Browser;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "browser.webdriver_url"));
    }

    #[test]
    fn zero_timings_are_rejected_together() {
        let mut config = CourierConfig::default();
        config.session.max_reconnect_attempts = 0;
        config.session.pairing_ttl_secs = 0;
        config.media.default_ttl_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn malformed_admin_phone_is_rejected() {
        let mut config = CourierConfig::default();
        config.messaging.admin_phone_number = Some("not a phone".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "admin_phone_number"));
    }

    #[test]
    fn empty_public_base_url_is_rejected() {
        let mut config = CourierConfig::default();
        config.media.public_base_url = "  ".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "media.public_base_url must not be empty"));
    }
}
