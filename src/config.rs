use std::time::Duration;

use anyhow::{bail, Context, Result};
use unic_langid::LanguageIdentifier;

use crate::locale;

/// Which backing store the service runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Sqlite,
    Snapshot,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "snapshot" => Ok(Self::Snapshot),
            other => bail!(
                "unknown storage backend {:?}, expected memory, sqlite or snapshot",
                other
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub admin_api_key: Option<String>,

    // Locales
    pub default_locale: LanguageIdentifier,
    pub supported_locales: Vec<LanguageIdentifier>,

    // Storage
    pub storage_backend: StorageBackend,
    pub database_path: String,
    pub snapshot_url: Option<String>,

    // Sync
    pub sync_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            // Server
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),

            // Locales - bad tags abort startup rather than surfacing later
            default_locale: locale::parse(
                &std::env::var("DEFAULT_LOCALE").unwrap_or_else(|_| "en".to_string()),
            )
            .context("DEFAULT_LOCALE is not a valid locale tag")?,
            supported_locales: parse_supported(
                &std::env::var("SUPPORTED_LOCALES").unwrap_or_else(|_| "en".to_string()),
            )?,

            // Storage
            storage_backend: std::env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "memory".to_string())
                .parse()
                .context("STORAGE_BACKEND is invalid")?,
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/translations.db".to_string()),
            snapshot_url: std::env::var("SNAPSHOT_URL").ok(),

            // Sync
            sync_interval_secs: std::env::var("SYNC_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        };

        if config.storage_backend == StorageBackend::Snapshot && config.snapshot_url.is_none() {
            bail!("SNAPSHOT_URL not set (required for the snapshot backend)");
        }

        Ok(config)
    }

    /// Periodic refresh interval; `None` when disabled.
    pub fn sync_interval(&self) -> Option<Duration> {
        match self.sync_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn parse_supported(raw: &str) -> Result<Vec<LanguageIdentifier>> {
    let mut supported = Vec::new();
    for tag in raw.split(',') {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        let parsed = locale::parse(tag)
            .with_context(|| format!("SUPPORTED_LOCALES contains an invalid tag {:?}", tag))?;
        supported.push(parsed);
    }
    Ok(supported)
}
