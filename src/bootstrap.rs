//! Materialize Gmail credential files from secrets passed via environment.
//!
//! CI runners get `credentials.json` / `token.json` as secret variables; the
//! auth layer reads files. Existing files always win: a token refreshed and
//! written back on a previous run must not be replaced by the stale secret.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::config::GmailConfig;

/// Write any configured credential blobs whose target file is missing.
/// Returns the paths that were created.
pub fn materialize_credentials(config: &GmailConfig) -> std::io::Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let pairs = [
        (&config.credentials_json, &config.credentials_file),
        (&config.token_json, &config.token_file),
    ];

    for (blob, path) in pairs {
        if let Some(blob) = blob
            && write_if_absent(path, blob)?
        {
            info!(path = %path.display(), "Created credential file from environment");
            written.push(path.clone());
        }
    }

    Ok(written)
}

fn write_if_absent(path: &Path, blob: &SecretString) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, blob.expose_secret())?;
    Ok(true)
}
