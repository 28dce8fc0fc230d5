//! Messaging-source seam.
//!
//! The remote messaging API is an opaque collaborator; the scraper only
//! depends on the [`MessageSource`] trait. [`GatewaySource`] is the concrete
//! implementation speaking JSON over HTTP to a gateway service that fronts
//! the real Telegram client, mapping HTTP 429 to the rate-limit signal.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;

/// Media attached to a message, classified at the source. A message carries
/// at most one of these.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaRef {
    #[default]
    None,
    Photo {
        url: String,
    },
    Document {
        url: String,
        mime_type: String,
        #[serde(default)]
        ext: Option<String>,
    },
}

impl MediaRef {
    pub fn is_none(&self) -> bool {
        matches!(self, MediaRef::None)
    }
}

/// One message as returned by the source, oldest→newest.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceMessage {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub sender_id: Option<i64>,
    pub text: Option<String>,
    #[serde(default)]
    pub media: MediaRef,
}

/// Errors surfaced by a message source. `FloodWait` is the flow-control
/// signal: the caller must sleep for the carried duration and retry the
/// channel pass.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("rate limited, must wait {seconds}s")]
    FloodWait { seconds: u64 },

    #[error("channel error: {0}")]
    Channel(String),

    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Read access to a channel's message history and its media payloads.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetches `channel`'s history oldest→newest, strictly after `min_id`
    /// when given, additionally constrained to start at `offset_date`.
    async fn fetch_history(
        &self,
        channel: &str,
        min_id: Option<i64>,
        offset_date: Option<NaiveDate>,
    ) -> Result<Vec<SourceMessage>, SourceError>;

    /// Downloads the raw bytes of one media attachment.
    async fn fetch_media(&self, media: &MediaRef) -> Result<Vec<u8>, SourceError>;
}

/// HTTP client for the messaging gateway.
pub struct GatewaySource {
    client: reqwest::Client,
    base_url: String,
    api_id: Option<String>,
    api_hash: Option<String>,
    session: String,
}

impl GatewaySource {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.telegram_gateway_url.trim_end_matches('/').to_string(),
            api_id: config.telegram_api_id.clone(),
            api_hash: config.telegram_api_hash.clone(),
            session: config.telegram_session.clone(),
        }
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut req = req.header("x-session", &self.session);
        if let Some(id) = &self.api_id {
            req = req.header("x-api-id", id);
        }
        if let Some(hash) = &self.api_hash {
            req = req.header("x-api-hash", hash);
        }
        req
    }

    /// Maps a 429 response to `FloodWait`, honoring `Retry-After` when the
    /// gateway provides it.
    fn check_rate_limit(resp: &reqwest::Response) -> Option<SourceError> {
        if resp.status() != reqwest::StatusCode::TOO_MANY_REQUESTS {
            return None;
        }
        let seconds = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        Some(SourceError::FloodWait { seconds })
    }
}

#[async_trait]
impl MessageSource for GatewaySource {
    async fn fetch_history(
        &self,
        channel: &str,
        min_id: Option<i64>,
        offset_date: Option<NaiveDate>,
    ) -> Result<Vec<SourceMessage>, SourceError> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel);
        let mut req = self.authed(self.client.get(&url));
        if let Some(min_id) = min_id {
            req = req.query(&[("min_id", min_id.to_string())]);
        }
        if let Some(date) = offset_date {
            req = req.query(&[("offset_date", date.format("%Y-%m-%d").to_string())]);
        }

        let resp = req.send().await?;
        if let Some(err) = Self::check_rate_limit(&resp) {
            return Err(err);
        }
        if !resp.status().is_success() {
            return Err(SourceError::Channel(format!(
                "{} returned {}",
                url,
                resp.status()
            )));
        }

        let messages: Vec<SourceMessage> = resp.json().await?;
        Ok(messages)
    }

    async fn fetch_media(&self, media: &MediaRef) -> Result<Vec<u8>, SourceError> {
        let url = match media {
            MediaRef::None => {
                return Err(SourceError::Channel("message has no media".to_string()))
            }
            MediaRef::Photo { url } => url,
            MediaRef::Document { url, .. } => url,
        };

        let resp = self.authed(self.client.get(url)).send().await?;
        if let Some(err) = Self::check_rate_limit(&resp) {
            return Err(err);
        }
        if !resp.status().is_success() {
            return Err(SourceError::Channel(format!(
                "media fetch {} returned {}",
                url,
                resp.status()
            )));
        }

        Ok(resp.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_ref_deserializes_tagged_variants() {
        let photo: MediaRef =
            serde_json::from_str(r#"{"kind":"photo","url":"http://g/x.jpg"}"#).unwrap();
        assert!(matches!(photo, MediaRef::Photo { .. }));

        let doc: MediaRef = serde_json::from_str(
            r#"{"kind":"document","url":"http://g/y","mime_type":"video/mp4","ext":".mp4"}"#,
        )
        .unwrap();
        match doc {
            MediaRef::Document { mime_type, ext, .. } => {
                assert_eq!(mime_type, "video/mp4");
                assert_eq!(ext.as_deref(), Some(".mp4"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn flood_wait_error_carries_seconds() {
        let err = SourceError::FloodWait { seconds: 30 };
        assert_eq!(err.to_string(), "rate limited, must wait 30s");
    }
}
