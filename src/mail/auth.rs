//! Gmail authorization from a stored authorized-user token.
//!
//! The token file is produced once by an interactive consent flow run
//! elsewhere. Here it is only loaded and, when the access token has expired,
//! refreshed with the `refresh_token` grant and written back.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::GmailConfig;
use crate::error::AuthError;

const PROVIDER: &str = "gmail";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Access tokens this close to expiry are refreshed up front.
const EXPIRY_SKEW_SECS: i64 = 60;

const REFRESH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Authorized-user token file (`token.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    /// Scopes, account, universe domain and whatever else the writer stored.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AuthorizedUser {
    /// A token with no recorded expiry is taken as valid.
    pub fn has_valid_token(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expiry) {
            (Some(token), Some(expiry)) if !token.is_empty() => {
                expiry - Duration::seconds(EXPIRY_SKEW_SECS) > now
            }
            (Some(token), None) => !token.is_empty(),
            _ => false,
        }
    }
}

/// OAuth client secret file (`credentials.json`), either app flavour.
#[derive(Debug, Deserialize)]
struct ClientSecrets {
    installed: Option<ClientSecretSection>,
    web: Option<ClientSecretSection>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretSection {
    client_id: String,
    client_secret: String,
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Loads and refreshes the Gmail access token.
pub struct GmailAuth {
    client: reqwest::Client,
    token_file: PathBuf,
    credentials_file: PathBuf,
}

impl GmailAuth {
    pub fn new(config: &GmailConfig) -> Result<Self, AuthError> {
        Self::with_timeout(config, REFRESH_TIMEOUT)
    }

    /// Like [`GmailAuth::new`] with a custom bound on the refresh request.
    pub fn with_timeout(
        config: &GmailConfig,
        timeout: std::time::Duration,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::TokenRequest {
                provider: PROVIDER.into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            token_file: config.token_file.clone(),
            credentials_file: config.credentials_file.clone(),
        })
    }

    /// Return a usable access token, refreshing it if needed.
    pub async fn access_token(&self, now: DateTime<Utc>) -> Result<SecretString, AuthError> {
        let mut user = self.load_token_file()?;

        if user.has_valid_token(now) {
            info!("Using stored Gmail access token");
            return Ok(SecretString::from(user.token.unwrap_or_default()));
        }

        let refresh_token = user.refresh_token.clone().ok_or_else(|| AuthError::MissingCredentials {
            provider: PROVIDER.into(),
            hint: format!(
                "{} has no refresh_token; re-run the consent flow locally",
                self.token_file.display()
            ),
        })?;

        let (client_id, client_secret, file_token_uri) = self.client_identity(&user)?;
        let token_uri = user
            .token_uri
            .clone()
            .or(file_token_uri)
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        info!("Refreshing expired Gmail access token");
        let refreshed = self
            .refresh(&token_uri, &client_id, &client_secret, &refresh_token)
            .await?;

        user.expiry = refreshed.expires_in.map(|secs| {
            // Out-of-range lifetimes are stored as already expired.
            Duration::try_seconds(secs)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
                .unwrap_or_else(|| {
                    warn!(expires_in = secs, "Ignoring out-of-range token lifetime");
                    now
                })
        });
        user.token = Some(refreshed.access_token.clone());

        if let Err(e) = write_token_file(&self.token_file, &user) {
            warn!(path = %self.token_file.display(), error = %e, "Failed to persist refreshed token");
        }

        Ok(SecretString::from(refreshed.access_token))
    }

    fn load_token_file(&self) -> Result<AuthorizedUser, AuthError> {
        let raw = std::fs::read_to_string(&self.token_file).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AuthError::MissingCredentials {
                    provider: PROVIDER.into(),
                    hint: format!(
                        "{} not found; set GMAIL_TOKEN_JSON or run the consent flow locally",
                        self.token_file.display()
                    ),
                }
            } else {
                AuthError::TokenFile {
                    path: self.token_file.display().to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        serde_json::from_str(&raw).map_err(|e| AuthError::TokenFile {
            path: self.token_file.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Client id/secret from the token file, else from the client secret file.
    fn client_identity(
        &self,
        user: &AuthorizedUser,
    ) -> Result<(String, String, Option<String>), AuthError> {
        if let (Some(id), Some(secret)) = (&user.client_id, &user.client_secret) {
            return Ok((id.clone(), secret.clone(), None));
        }

        let missing = || AuthError::MissingCredentials {
            provider: PROVIDER.into(),
            hint: format!(
                "no client_id/client_secret in {} or {}",
                self.token_file.display(),
                self.credentials_file.display()
            ),
        };

        let raw = std::fs::read_to_string(&self.credentials_file).map_err(|_| missing())?;
        let secrets: ClientSecrets = serde_json::from_str(&raw).map_err(|e| AuthError::TokenFile {
            path: self.credentials_file.display().to_string(),
            reason: e.to_string(),
        })?;
        let section = secrets.installed.or(secrets.web).ok_or_else(missing)?;
        Ok((section.client_id, section.client_secret, section.token_uri))
    }

    async fn refresh(
        &self,
        token_uri: &str,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<RefreshResponse, AuthError> {
        let response = self
            .client
            .post(token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
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

        response
            .json::<RefreshResponse>()
            .await
            .map_err(|e| AuthError::TokenRequest {
                provider: PROVIDER.into(),
                reason: format!("invalid token response: {e}"),
            })
    }
}

fn write_token_file(path: &Path, user: &AuthorizedUser) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(user).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}
