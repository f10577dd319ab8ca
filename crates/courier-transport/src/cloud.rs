// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hosted cloud messaging API transport.
//!
//! Posts to `{api_base}/{phone_number_id}/messages` with a bearer token.
//! Attachments are sent by link: hosted assets resolve to their public broker
//! URL, local files are parked in the broker first.

use std::time::Duration;

use async_trait::async_trait;
use courier_config::CloudConfig;
use courier_core::{
    CourierError, HealthStatus, MediaRef, MessageId, OutboundMessage, PluginAdapter, ProviderKind,
    Transport,
};
use courier_media::{MediaBroker, guess_content_type};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::fetch::filename_from_url;

const NAME: &str = "cloud";

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    code: Option<i64>,
}

/// Cloud messaging API client.
#[derive(Debug, Clone)]
pub struct CloudTransport {
    client: reqwest::Client,
    endpoint: String,
    broker: MediaBroker,
}

impl CloudTransport {
    /// Build from the `[cloud]` section. Fails without credentials.
    pub fn new(config: &CloudConfig, broker: MediaBroker) -> Result<Self, CourierError> {
        let token = config
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CourierError::Config("cloud.access_token is required".into()))?;
        let phone_number_id = config
            .phone_number_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CourierError::Config("cloud.phone_number_id is required".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                CourierError::Config(format!("invalid access token header value: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CourierError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: messages_endpoint(&config.api_base, phone_number_id),
            broker,
        })
    }

    /// Link and caption payload for an attachment.
    async fn media_body(
        &self,
        msg: &OutboundMessage,
        media: &MediaRef,
    ) -> Result<Value, CourierError> {
        let (link, filename) = match media {
            MediaRef::Hosted(id) => {
                let asset = self.broker.get(id)?;
                (self.broker.resolve_url(id), asset.filename.clone())
            }
            MediaRef::Url(url) => (url.clone(), filename_from_url(url)),
            MediaRef::Path(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    CourierError::transport_with(
                        NAME,
                        format!("cannot read media file {}: {e}", path.display()),
                        e,
                    )
                })?;
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let id = self.broker.put(bytes, &filename, self.broker.default_ttl())?;
                (self.broker.resolve_url(&id), filename)
            }
        };

        let recipient = msg.recipient.digits();
        let caption = msg.body.as_str();
        let body = if guess_content_type(&filename).starts_with("image/") {
            json!({
                "messaging_product": "whatsapp",
                "to": recipient,
                "type": "image",
                "image": { "link": link, "caption": caption },
            })
        } else {
            json!({
                "messaging_product": "whatsapp",
                "to": recipient,
                "type": "document",
                "document": { "link": link, "caption": caption, "filename": filename },
            })
        };
        Ok(body)
    }

    async fn request_body(&self, msg: &OutboundMessage) -> Result<Value, CourierError> {
        match &msg.media {
            Some(media) => self.media_body(msg, media).await,
            None => Ok(json!({
                "messaging_product": "whatsapp",
                "to": msg.recipient.digits(),
                "type": "text",
                "text": { "body": msg.body },
            })),
        }
    }
}

fn messages_endpoint(api_base: &str, phone_number_id: &str) -> String {
    format!("{}/{phone_number_id}/messages", api_base.trim_end_matches('/'))
}

#[async_trait]
impl PluginAdapter for CloudTransport {
    fn name(&self) -> &str {
        "cloud-api"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    /// Credentials are checked at construction; the API has no cheap probe.
    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for CloudTransport {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cloud
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, CourierError> {
        let body = self.request_body(msg).await?;
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| CourierError::transport_with(NAME, format!("HTTP request failed: {e}"), e))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        debug!(status = %status, recipient = %msg.recipient.masked(), "cloud API response received");

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(api) => match api.error.code {
                    Some(code) => format!("cloud API error {code}: {}", api.error.message),
                    None => format!("cloud API error: {}", api.error.message),
                },
                Err(_) => format!("cloud API returned {status}: {text}"),
            };
            warn!(status = %status, "cloud send rejected");
            return Err(CourierError::transport(NAME, message));
        }

        let parsed: SendResponse = serde_json::from_str(&text).map_err(|e| {
            CourierError::transport_with(NAME, format!("failed to parse API response: {e}"), e)
        })?;
        parsed
            .messages
            .into_iter()
            .next()
            .map(|m| MessageId(m.id))
            .ok_or_else(|| CourierError::transport(NAME, "cloud API response carried no message id"))
    }
}

#[cfg(test)]
mod tests {
    use courier_core::Recipient;
    use courier_media::MediaBrokerConfig;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn broker() -> MediaBroker {
        MediaBroker::new(MediaBrokerConfig {
            public_base_url: "https://shop.test".into(),
            default_ttl: Duration::from_secs(60),
            max_bytes: 1024,
        })
    }

    fn transport(api_base: &str) -> CloudTransport {
        let config = CloudConfig {
            api_base: api_base.to_string(),
            access_token: Some("token-123".into()),
            phone_number_id: Some("10987".into()),
            timeout_secs: 5,
        };
        CloudTransport::new(&config, broker()).unwrap()
    }

    fn message(media: Option<MediaRef>) -> OutboundMessage {
        let recipient = Recipient::parse("+251911234567", "251").unwrap();
        OutboundMessage::new(recipient, "New order", media).unwrap()
    }

    #[test]
    fn missing_credentials_is_config_error() {
        let config = CloudConfig {
            access_token: None,
            ..CloudConfig::default()
        };
        let err = CloudTransport::new(&config, broker()).unwrap_err();
        assert!(matches!(err, CourierError::Config(_)));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(
            messages_endpoint("https://graph.test/v21.0/", "42"),
            "https://graph.test/v21.0/42/messages"
        );
    }

    #[tokio::test]
    async fn text_message_is_posted_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/10987/messages"))
            .and(header("authorization", "Bearer token-123"))
            .and(body_partial_json(json!({
                "messaging_product": "whatsapp",
                "to": "251911234567",
                "type": "text",
                "text": { "body": "New order" }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.1" }] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let id = transport(&server.uri()).send(&message(None)).await.unwrap();
        assert_eq!(id.0, "wamid.1");
    }

    #[tokio::test]
    async fn hosted_image_is_sent_by_link() {
        let server = MockServer::start().await;
        let transport = transport(&server.uri());
        let id = transport
            .broker
            .put(vec![1, 2, 3], "invoice.png", Duration::from_secs(60))
            .unwrap();

        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "type": "image",
                "image": { "link": format!("https://shop.test/media/{id}"), "caption": "New order" }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.2" }] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sent = transport
            .send(&message(Some(MediaRef::Hosted(id))))
            .await
            .unwrap();
        assert_eq!(sent.0, "wamid.2");
    }

    #[tokio::test]
    async fn url_document_carries_filename() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "type": "document",
                "document": { "link": "https://cdn.test/menu.pdf", "filename": "menu.pdf" }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.3" }] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let msg = message(Some(MediaRef::Url("https://cdn.test/menu.pdf".into())));
        assert_eq!(transport(&server.uri()).send(&msg).await.unwrap().0, "wamid.3");
    }

    #[tokio::test]
    async fn local_file_is_hosted_then_linked() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("receipt.png");
        std::fs::write(&file, [0x89, b'P', b'N', b'G']).unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "type": "image" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.4" }] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport(&server.uri());
        let sent = transport
            .send(&message(Some(MediaRef::Path(file))))
            .await
            .unwrap();
        assert_eq!(sent.0, "wamid.4");
        assert_eq!(transport.broker.len(), 1);
    }

    #[tokio::test]
    async fn missing_local_file_is_transport_failure() {
        let dir = tempfile::tempdir().unwrap();
        let msg = message(Some(MediaRef::Path(dir.path().join("gone.png"))));
        let err = transport("http://127.0.0.1:9").send(&msg).await.unwrap_err();
        assert!(matches!(err, CourierError::Transport { .. }));
        assert!(err.to_string().contains("cannot read media file"), "got: {err}");
    }

    #[tokio::test]
    async fn api_error_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Invalid OAuth access token", "code": 190 }
            })))
            .mount(&server)
            .await;

        let err = transport(&server.uri()).send(&message(None)).await.unwrap_err();
        assert!(matches!(err, CourierError::Transport { .. }));
        assert!(err.to_string().contains("190"), "got: {err}");
    }

    #[tokio::test]
    async fn missing_message_id_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [] })))
            .mount(&server)
            .await;

        let err = transport(&server.uri()).send(&message(None)).await.unwrap_err();
        assert!(err.to_string().contains("no message id"));
    }

    #[tokio::test]
    async fn expired_hosted_media_fails_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = transport(&server.uri())
            .send(&message(Some(MediaRef::Hosted("nope".into()))))
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::MediaUnavailable { .. }));
    }
}
