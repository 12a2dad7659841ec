//! Remote table access — the `RecordStore` seam plus the REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::TableConfig;
use crate::error::{AuthError, TableError};
use crate::record::TableRow;

const PROVIDER: &str = "table";

/// Destination for extracted rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert one row. Anything but a confirmed creation is an error.
    async fn insert(&self, row: &TableRow) -> Result<(), TableError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// REST client for one table, holding a client-credentials bearer token.
pub struct RestTableClient {
    client: reqwest::Client,
    records_url: String,
    token: SecretString,
}

impl RestTableClient {
    /// Obtain a bearer token and bind the client to the configured table.
    pub async fn connect(config: &TableConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::TokenRequest {
                provider: PROVIDER.into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let token = request_token(&client, config).await?;
        Ok(Self::with_token(client, config, token))
    }

    fn with_token(client: reqwest::Client, config: &TableConfig, token: SecretString) -> Self {
        Self {
            client,
            records_url: format!(
                "{}/rest/v2/tables/{}/records",
                config.api_base, config.table_name
            ),
            token,
        }
    }
}

async fn request_token(
    client: &reqwest::Client,
    config: &TableConfig,
) -> Result<SecretString, AuthError> {
    let (Some(client_id), Some(client_secret)) = (&config.client_id, &config.client_secret) else {
        return Err(AuthError::MissingCredentials {
            provider: PROVIDER.into(),
            hint: "CASPIO_CLIENT_ID and CASPIO_CLIENT_SECRET must be set".into(),
        });
    };

    let response = client
        .post(format!("{}/oauth/token", config.api_base))
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.expose_secret()),
        ])
        .send()
        .await
        .map_err(|e| AuthError::TokenRequest {
            provider: PROVIDER.into(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(AuthError::Rejected {
            provider: PROVIDER.into(),
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        });
    }

    let parsed: TokenResponse = response.json().await.map_err(|e| AuthError::TokenRequest {
        provider: PROVIDER.into(),
        reason: format!("invalid token response: {e}"),
    })?;

    Ok(SecretString::from(parsed.access_token))
}

#[async_trait]
impl RecordStore for RestTableClient {
    async fn insert(&self, row: &TableRow) -> Result<(), TableError> {
        let response = self
            .client
            .post(&self.records_url)
            .bearer_auth(self.token.expose_secret())
            .json(row)
            .send()
            .await
            .map_err(|e| TableError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::CREATED {
            return Ok(());
        }

        Err(TableError::Rejected {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config_for(server: &MockServer) -> TableConfig {
        TableConfig {
            api_base: server.uri(),
            table_name: "Payments".into(),
            client_id: Some("cid".into()),
            client_secret: Some(SecretString::from("csecret")),
        }
    }

    fn row() -> TableRow {
        TableRow {
            message_id: "m1".into(),
            account_id: "AB".into(),
            bill_id: "C".into(),
            detail_link: "D".into(),
            sent_at: String::new(),
        }
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=cid"))
            .and(body_string_contains("client_secret=csecret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "bearer-1",
                "token_type": "bearer",
                "expires_in": 86399
            })))
            .mount(server)
            .await;
    }

    // ── connect ─────────────────────────────────────────────────

    #[tokio::test]
    async fn connect_requires_client_credentials() {
        let server = MockServer::start().await;
        let mut cfg = config_for(&server);
        cfg.client_secret = None;
        let err = RestTableClient::connect(&cfg).await.err().unwrap();
        assert!(matches!(err, AuthError::MissingCredentials { .. }));
    }

    #[tokio::test]
    async fn connect_surfaces_rejected_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad client"))
            .mount(&server)
            .await;

        let err = RestTableClient::connect(&config_for(&server)).await.err().unwrap();
        match err {
            AuthError::Rejected { status, body, .. } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad client");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    // ── insert ──────────────────────────────────────────────────

    #[tokio::test]
    async fn insert_created_is_success() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/rest/v2/tables/Payments/records"))
            .and(header("authorization", "Bearer bearer-1"))
            .and(body_json(json!({
                "IDSMS": "m1",
                "MaThanhToan": "AB",
                "IDthanhtoan": "C",
                "Linkcheck": "D",
                "ThoiGianThanhToan": ""
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestTableClient::connect(&config_for(&server)).await.unwrap();
        client.insert(&row()).await.unwrap();
    }

    #[tokio::test]
    async fn insert_other_success_status_is_failure() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/rest/v2/tables/Payments/records"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok?"))
            .mount(&server)
            .await;

        let client = RestTableClient::connect(&config_for(&server)).await.unwrap();
        let err = client.insert(&row()).await.unwrap_err();
        assert!(matches!(err, TableError::Rejected { status: 200, .. }));
    }

    #[tokio::test]
    async fn insert_rejection_carries_body() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/rest/v2/tables/Payments/records"))
            .respond_with(ResponseTemplate::new(400).set_body_string("IDSMS must be unique"))
            .mount(&server)
            .await;

        let client = RestTableClient::connect(&config_for(&server)).await.unwrap();
        match client.insert(&row()).await.unwrap_err() {
            TableError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "IDSMS must be unique");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn insert_network_error_is_failure() {
        let cfg = TableConfig {
            api_base: "http://127.0.0.1:1".into(),
            table_name: "Payments".into(),
            client_id: None,
            client_secret: None,
        };
        let client = RestTableClient::with_token(reqwest::Client::new(), &cfg, SecretString::from("t"));
        let err = client.insert(&row()).await.unwrap_err();
        assert!(matches!(err, TableError::Http(_)));
    }
}
