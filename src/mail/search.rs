//! Search query construction and pagination.

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use tracing::{debug, info};

use crate::config::MailFilter;
use crate::error::MailError;
use crate::mail::{MailSource, MessageRef};

/// Today's window in the target zone: local midnight up to `now`, as epoch
/// seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub after: i64,
    pub before: i64,
}

impl SearchWindow {
    pub fn today(now: DateTime<Utc>, offset: &FixedOffset) -> Self {
        let local = now.with_timezone(offset);
        let before = now.timestamp();
        let after = before - i64::from(local.num_seconds_from_midnight());
        Self { after, before }
    }
}

/// Build the provider query for one sender/subject pair inside `window`.
pub fn build_query(filter: &MailFilter, window: &SearchWindow) -> String {
    format!(
        "from:({}) subject:('{}') after:{} before:{}",
        filter.sender, filter.subject, window.after, window.before
    )
}

/// Collect every matching reference, following continuation tokens until the
/// provider stops returning them or a page comes back without messages.
pub async fn search_all(
    source: &dyn MailSource,
    query: &str,
) -> Result<Vec<MessageRef>, MailError> {
    info!(query = %query, "Searching mailbox");

    let mut all = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = source.list_page(query, page_token.as_deref()).await?;
        let Some(messages) = page.messages else {
            break;
        };
        debug!(count = messages.len(), "Fetched result page");
        all.extend(messages);

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(all)
}
