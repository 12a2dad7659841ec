//! One sync pass: search → fetch → extract → insert → tally.
//!
//! Everything is awaited in sequence. Only authentication failures abort a
//! run; every per-message failure is logged, counted, and skipped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::bootstrap::materialize_credentials;
use crate::config::{MailFilter, SyncConfig, TargetZone};
use crate::error::Result;
use crate::mail::{
    GmailAuth, GmailClient, MailSource, MessageRef, SearchWindow, build_query, search_all,
};
use crate::record::{TableRow, extract_record, format_sent_at};
use crate::table::{RecordStore, RestTableClient};

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// References returned by the search.
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// How a single message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageOutcome {
    Inserted,
    FetchFailed,
    NotExtractable,
    InsertFailed,
}

/// Runs the pipeline against a mail source and a record store.
pub struct SyncRunner {
    mail: Arc<dyn MailSource>,
    store: Arc<dyn RecordStore>,
    filter: MailFilter,
    zone: TargetZone,
}

impl SyncRunner {
    pub fn new(
        mail: Arc<dyn MailSource>,
        store: Arc<dyn RecordStore>,
        filter: MailFilter,
        zone: TargetZone,
    ) -> Self {
        Self {
            mail,
            store,
            filter,
            zone,
        }
    }

    /// Process today's matching messages, oldest first.
    pub async fn run(&self, now: DateTime<Utc>) -> SyncSummary {
        let window = SearchWindow::today(now, &self.zone.offset);
        let query = build_query(&self.filter, &window);

        let mut references = match search_all(self.mail.as_ref(), &query).await {
            Ok(refs) => refs,
            Err(e) => {
                error!(error = %e, "Mailbox search failed");
                Vec::new()
            }
        };

        if references.is_empty() {
            info!(zone = %self.zone.name, "No matching emails in today's window");
            return SyncSummary::default();
        }

        info!(count = references.len(), "Found matching emails");

        // The provider lists newest first.
        references.reverse();

        let mut summary = SyncSummary {
            processed: references.len(),
            ..SyncSummary::default()
        };

        for reference in &references {
            match self.process_one(reference).await {
                MessageOutcome::Inserted => summary.succeeded += 1,
                MessageOutcome::FetchFailed
                | MessageOutcome::NotExtractable
                | MessageOutcome::InsertFailed => summary.failed += 1,
            }
        }

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Sync complete"
        );

        summary
    }

    async fn process_one(&self, reference: &MessageRef) -> MessageOutcome {
        let message_id = reference.id.as_str();

        let content = match self.mail.fetch(message_id).await {
            Ok(content) => content,
            Err(e) => {
                error!(message_id = %message_id, error = %e, "Failed to fetch email");
                return MessageOutcome::FetchFailed;
            }
        };

        let Some(record) = extract_record(&content.body) else {
            warn!(message_id = %message_id, "Skipping email: required fields missing");
            return MessageOutcome::NotExtractable;
        };

        let sent_at = match content.date.as_deref() {
            Some(raw) => format_sent_at(raw, &self.zone.offset).unwrap_or_else(|e| {
                warn!(message_id = %message_id, date = %raw, error = %e, "Unparsable Date header");
                String::new()
            }),
            None => {
                warn!(message_id = %message_id, "Email has no Date header");
                String::new()
            }
        };

        let row = TableRow::new(message_id, record, sent_at);
        match self.store.insert(&row).await {
            Ok(()) => {
                info!(message_id = %message_id, "Inserted record");
                MessageOutcome::Inserted
            }
            Err(e) => {
                error!(message_id = %message_id, error = %e, "Failed to insert record");
                MessageOutcome::InsertFailed
            }
        }
    }
}

/// Full run with production clients: bootstrap credentials, authenticate
/// both sides, then sync.
pub async fn run_once(config: &SyncConfig) -> Result<SyncSummary> {
    let created = materialize_credentials(&config.gmail)?;
    if !created.is_empty() {
        info!(count = created.len(), "Bootstrapped credential files");
    }

    let now = Utc::now();

    let gmail_token = GmailAuth::new(&config.gmail)?.access_token(now).await?;
    let mail = GmailClient::new(
        config.gmail.api_base.clone(),
        config.gmail.user_id.clone(),
        gmail_token,
        config.filter.body_charset.clone(),
    )?;

    let store = RestTableClient::connect(&config.table).await?;

    let runner = SyncRunner::new(
        Arc::new(mail),
        Arc::new(store),
        config.filter.clone(),
        config.zone.clone(),
    );

    Ok(runner.run(now).await)
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::{AuthError, Error};

    fn config_for(server: &MockServer, dir: &std::path::Path) -> SyncConfig {
        let mut cfg = SyncConfig::from_lookup(|_| None).unwrap();
        cfg.gmail.api_base = format!("{}/gmail/v1", server.uri());
        cfg.gmail.credentials_file = dir.join("credentials.json");
        cfg.gmail.token_file = dir.join("token.json");
        cfg.gmail.token_json = Some(SecretString::from(r#"{"token":"stored"}"#));
        cfg.table.api_base = server.uri();
        cfg.table.client_id = Some("cid".into());
        cfg.table.client_secret = Some(SecretString::from("csecret"));
        cfg
    }

    // ── run_once ────────────────────────────────────────────────

    #[tokio::test]
    async fn rejected_table_token_aborts_before_search() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad client"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cfg = config_for(&server, dir.path());

        let result = run_once(&cfg).await;
        assert!(
            matches!(result, Err(Error::Auth(AuthError::Rejected { status: 401, .. }))),
            "unexpected result: {result:?}"
        );
        assert!(dir.path().join("token.json").exists());
    }

    #[tokio::test]
    async fn missing_mail_token_aborts_before_table_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_for(&server, dir.path());
        cfg.gmail.token_json = None;

        let result = run_once(&cfg).await;
        assert!(
            matches!(result, Err(Error::Auth(AuthError::MissingCredentials { .. }))),
            "unexpected result: {result:?}"
        );
    }
}
