//! Gmail REST client — message listing and full-message fetch.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::MailError;
use crate::mail::{MailSource, MessageContent, MessageRef, SearchPage};

/// Gmail client bound to one mailbox and one access token.
pub struct GmailClient {
    client: reqwest::Client,
    api_base: String,
    user_id: String,
    access_token: SecretString,
    body_charset: String,
}

impl GmailClient {
    pub fn new(
        api_base: impl Into<String>,
        user_id: impl Into<String>,
        access_token: SecretString,
        body_charset: impl Into<String>,
    ) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MailError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.into(),
            user_id: user_id.into(),
            access_token,
            body_charset: body_charset.into(),
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/users/{}/messages", self.api_base, self.user_id)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, MailError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(self.access_token.expose_secret())
            .query(params)
            .send()
            .await
            .map_err(|e| MailError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MailError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl MailSource for GmailClient {
    async fn list_page(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<SearchPage, MailError> {
        let mut params = vec![("q", query)];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let response: MessagesListResponse = self.get_json(&self.messages_url(), &params).await?;
        debug!(
            estimate = ?response.result_size_estimate,
            has_next = response.next_page_token.is_some(),
            "Gmail list response"
        );

        Ok(SearchPage {
            messages: response.messages.map(|list| {
                list.into_iter()
                    .map(|m| MessageRef {
                        id: m.id,
                        thread_id: m.thread_id,
                    })
                    .collect()
            }),
            next_page_token: response.next_page_token,
        })
    }

    async fn fetch(&self, id: &str) -> Result<MessageContent, MailError> {
        let url = format!("{}/{}", self.messages_url(), id);
        let message: GmailMessage = self.get_json(&url, &[("format", "full")]).await?;

        let Some(payload) = message.payload else {
            return Ok(MessageContent {
                id: message.id,
                body: String::new(),
                date: None,
            });
        };

        let date = header_value(&payload, "Date");
        let body = match plain_text_data(&payload) {
            Some(data) => {
                let bytes = decode_base64url(data)?;
                decode_charset(&self.body_charset, &bytes)
            }
            None => String::new(),
        };

        Ok(MessageContent {
            id: message.id,
            body,
            date,
        })
    }
}

// ── Payload helpers ─────────────────────────────────────────────────

/// Pick the encoded body: the first top-level `text/plain` part when the
/// payload is multipart, otherwise the payload's own body.
fn plain_text_data(payload: &MessagePart) -> Option<&str> {
    if let Some(parts) = &payload.parts {
        return parts
            .iter()
            .find(|p| p.mime_type.as_deref() == Some("text/plain"))
            .and_then(|p| p.body.as_ref())
            .and_then(|b| b.data.as_deref());
    }
    payload.body.as_ref().and_then(|b| b.data.as_deref())
}

fn header_value(payload: &MessagePart, name: &str) -> Option<String> {
    payload
        .headers
        .as_ref()?
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

/// Gmail emits URL-safe base64, sometimes padded.
fn decode_base64url(data: &str) -> Result<Vec<u8>, MailError> {
    URL_SAFE_NO_PAD
        .decode(data.trim().trim_end_matches('='))
        .map_err(|e| MailError::InvalidResponse(format!("body is not base64url: {e}")))
}

/// Decode bytes using a named charset. Undecodable bytes are dropped.
pub fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    let decoded = match charset.to_lowercase().as_str() {
        "utf-8" | "utf8" => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                encoding.decode(bytes).0.into_owned()
            } else {
                warn!(charset = charset, "Unknown charset, falling back to UTF-8 lossy");
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    };

    if decoded.contains(char::REPLACEMENT_CHARACTER) {
        debug!(charset = charset, "Dropped undecodable bytes in body");
        return decoded.replace(char::REPLACEMENT_CHARACTER, "");
    }
    decoded
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MessagesListResponse {
    messages: Option<Vec<MessageInfo>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
    #[serde(rename = "resultSizeEstimate")]
    result_size_estimate: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MessageInfo {
    id: String,
    #[serde(rename = "threadId")]
    thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GmailMessage {
    id: String,
    payload: Option<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct MessagePart {
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
    headers: Option<Vec<Header>>,
    body: Option<MessagePartBody>,
    parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct MessagePartBody {
    data: Option<String>,
}
