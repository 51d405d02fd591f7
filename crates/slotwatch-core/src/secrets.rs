//! Notification credentials, supplied out-of-band.
//!
//! Values come from environment variables first; anything missing is filled
//! from an optional TOML file. Secrets are never logged: `Debug` redacts them.

use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::error::{Result, SlotWatchError};

pub const ENV_SENDER_EMAIL: &str = "SLOTWATCH_SENDER_EMAIL";
pub const ENV_AUTH_CODE: &str = "SLOTWATCH_AUTH_CODE";
pub const ENV_RECIPIENT_EMAIL: &str = "SLOTWATCH_RECIPIENT_EMAIL";

/// Sender credential pair plus recipient address.
#[derive(Clone, PartialEq, Eq)]
pub struct Secrets {
    pub sender_email: String,
    pub auth_code: String,
    pub recipient_email: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("sender_email", &"<redacted>")
            .field("auth_code", &"<redacted>")
            .field("recipient_email", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct SecretsFile {
    sender_email: Option<String>,
    auth_code: Option<String>,
    recipient_email: Option<String>,
}

impl Secrets {
    /// Resolve secrets from the process environment and an optional file.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::resolve(|key| std::env::var(key).ok(), file)
    }

    /// Resolve secrets with a custom variable lookup.
    pub fn resolve<F>(lookup: F, file: Option<&Path>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_file = match file {
            Some(path) => read_secrets_file(path)?,
            None => SecretsFile::default(),
        };

        let pick = |key: &str, fallback: Option<String>| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .or(fallback.filter(|v| !v.trim().is_empty()))
                .ok_or_else(|| SlotWatchError::Secrets(format!("{key} is not set")))
        };

        Ok(Self {
            sender_email: pick(ENV_SENDER_EMAIL, from_file.sender_email)?,
            auth_code: pick(ENV_AUTH_CODE, from_file.auth_code)?,
            recipient_email: pick(ENV_RECIPIENT_EMAIL, from_file.recipient_email)?,
        })
    }
}

fn read_secrets_file(path: &Path) -> Result<SecretsFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SlotWatchError::Secrets(format!("Failed to read {}: {e}", path.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = std::fs::metadata(path)
            && meta.permissions().mode() & 0o077 != 0
        {
            tracing::warn!(
                "⚠️ Secrets file {} is readable by other users (chmod 600 recommended)",
                path.display()
            );
        }
    }

    toml::from_str(&content)
        .map_err(|e| SlotWatchError::Secrets(format!("Failed to parse {}: {e}", path.display())))
}
