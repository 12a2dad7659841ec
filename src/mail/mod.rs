//! Mailbox access — the `MailSource` seam plus the Gmail implementation.

pub mod auth;
pub mod gmail;
pub mod search;

pub use auth::GmailAuth;
pub use gmail::GmailClient;
pub use search::{SearchWindow, build_query, search_all};

use async_trait::async_trait;

use crate::error::MailError;

/// Reference to one message, as returned by a listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub id: String,
    pub thread_id: Option<String>,
}

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: None,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// `None` when the provider omitted the list entirely.
    pub messages: Option<Vec<MessageRef>>,
    pub next_page_token: Option<String>,
}

/// Decoded content of a fetched message.
#[derive(Debug, Clone)]
pub struct MessageContent {
    pub id: String,
    /// Plain-text body, charset-converted. Empty when the message has none.
    pub body: String,
    /// Raw `Date` header value, if present.
    pub date: Option<String>,
}

/// Read-only mailbox operations the sync needs.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Fetch one page of message references matching `query`.
    async fn list_page(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<SearchPage, MailError>;

    /// Fetch and decode one message by id.
    async fn fetch(&self, id: &str) -> Result<MessageContent, MailError>;
}
