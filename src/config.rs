//! Configuration types.
//!
//! Everything the run needs is read once at startup into [`SyncConfig`] and
//! passed down explicitly; nothing below `main` touches the environment.

use std::path::PathBuf;

use chrono::FixedOffset;
use secrecy::SecretString;

use crate::error::ConfigError;

pub const DEFAULT_SENDER: &str = "smartpit@smartpit.nttcom.ne.jp";
pub const DEFAULT_SUBJECT: &str = "【Ｓｍａｒｔ　Ｐｉｔ】収納情報のお知らせ";
pub const DEFAULT_TZ_NAME: &str = "Asia/Ho_Chi_Minh";
pub const DEFAULT_TZ_OFFSET: &str = "+07:00";
pub const DEFAULT_BODY_CHARSET: &str = "iso-2022-jp";
pub const DEFAULT_TABLE_API_BASE: &str = "https://d2hbz700.caspio.com";
pub const DEFAULT_TABLE_NAME: &str = "SmartPitDaThanhToan";
pub const DEFAULT_GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Which notifications to pick up and how to read them.
#[derive(Debug, Clone)]
pub struct MailFilter {
    /// Exact sender address to search for.
    pub sender: String,
    /// Exact subject to search for.
    pub subject: String,
    /// Charset label of the text/plain part (encoding_rs label).
    pub body_charset: String,
}

/// Fixed target timezone used for the search window and row timestamps.
#[derive(Debug, Clone)]
pub struct TargetZone {
    /// IANA-style label, used only in log output.
    pub name: String,
    pub offset: FixedOffset,
}

impl TargetZone {
    pub fn new(name: impl Into<String>, offset: FixedOffset) -> Self {
        Self {
            name: name.into(),
            offset,
        }
    }
}

/// Gmail access settings.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub api_base: String,
    pub user_id: String,
    pub credentials_file: PathBuf,
    pub token_file: PathBuf,
    /// Raw `credentials.json` contents to materialize before auth.
    pub credentials_json: Option<SecretString>,
    /// Raw `token.json` contents to materialize before auth.
    pub token_json: Option<SecretString>,
}

/// Remote table access settings.
#[derive(Debug, Clone)]
pub struct TableConfig {
    pub api_base: String,
    pub table_name: String,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
}

/// Full configuration for one sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub filter: MailFilter,
    pub zone: TargetZone,
    pub gmail: GmailConfig,
    pub table: TableConfig,
    /// Directory for a daily-rolling log file, in addition to stderr.
    pub log_dir: Option<PathBuf>,
}

impl SyncConfig {
    /// Build config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let filter = MailFilter {
            sender: get_or("SYNC_SENDER", DEFAULT_SENDER),
            subject: get_or("SYNC_SUBJECT", DEFAULT_SUBJECT),
            body_charset: get_or("SYNC_BODY_CHARSET", DEFAULT_BODY_CHARSET),
        };

        let offset_raw = get_or("SYNC_TZ_OFFSET", DEFAULT_TZ_OFFSET);
        let offset = parse_offset(&offset_raw).ok_or_else(|| ConfigError::InvalidValue {
            key: "SYNC_TZ_OFFSET".into(),
            message: format!("expected +HH:MM or -HH:MM, got {offset_raw:?}"),
        })?;
        let zone = TargetZone::new(get_or("SYNC_TZ_NAME", DEFAULT_TZ_NAME), offset);

        let gmail = GmailConfig {
            api_base: normalize_base_url(
                "GMAIL_API_BASE",
                &get_or("GMAIL_API_BASE", DEFAULT_GMAIL_API_BASE),
            )?,
            user_id: get_or("GMAIL_USER_ID", "me"),
            credentials_file: PathBuf::from(get_or("GMAIL_CREDENTIALS_FILE", "credentials.json")),
            token_file: PathBuf::from(get_or("GMAIL_TOKEN_FILE", "token.json")),
            credentials_json: get("GMAIL_CREDENTIALS_JSON").map(SecretString::from),
            token_json: get("GMAIL_TOKEN_JSON").map(SecretString::from),
        };

        let table = TableConfig {
            api_base: normalize_base_url(
                "CASPIO_API_URL_BASE",
                &get_or("CASPIO_API_URL_BASE", DEFAULT_TABLE_API_BASE),
            )?,
            table_name: get_or("CASPIO_TABLE_NAME", DEFAULT_TABLE_NAME),
            client_id: get("CASPIO_CLIENT_ID"),
            client_secret: get("CASPIO_CLIENT_SECRET").map(SecretString::from),
        };

        Ok(Self {
            filter,
            zone,
            gmail,
            table,
            log_dir: get("SYNC_LOG_DIR").map(PathBuf::from),
        })
    }
}

/// Parse a `+HH:MM` / `-HH:MM` UTC offset.
pub fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn normalize_base_url(key: &str, raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected an http(s) URL, got {raw:?}"),
        });
    }
    Ok(trimmed.to_string())
}
