//! Read-only store backed by a snapshot document fetched over HTTP.
//!
//! A sync pass calls `get_all` first, which fetches the document and
//! keeps it; the locale bookkeeping reads that same document, so one pass
//! sees one consistent snapshot and costs one request. Every mutation is
//! rejected: the serving side owns the data.

use std::sync::Mutex;

use async_trait::async_trait;
use unic_langid::LanguageIdentifier;

use crate::cache::Translation;
use crate::error::{Error, Result};
use crate::locale;

use super::{Snapshot, Storage};

pub struct SnapshotStore {
    url: String,
    client: reqwest::Client,
    cached: Mutex<Option<Snapshot>>,
}

impl SnapshotStore {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<Snapshot> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::SnapshotStatus(status));
        }
        let snapshot = response.json::<Snapshot>().await?;
        Ok(snapshot)
    }

    /// Serve the snapshot fetched by the last `get_all`, fetching fresh
    /// only when none has been kept yet.
    async fn cached_or_fetch(&self) -> Result<Snapshot> {
        let cached = self.cached.lock().unwrap().clone();
        if let Some(snapshot) = cached {
            return Ok(snapshot);
        }
        let snapshot = self.fetch().await?;
        *self.cached.lock().unwrap() = Some(snapshot.clone());
        Ok(snapshot)
    }
}

#[async_trait]
impl Storage for SnapshotStore {
    async fn get_all(&self) -> Result<Vec<Translation>> {
        let snapshot = self.fetch().await?;
        *self.cached.lock().unwrap() = Some(snapshot.clone());
        snapshot
            .translations
            .into_iter()
            .map(Translation::try_from)
            .collect()
    }

    async fn store(&self, _translation: &Translation) -> Result<()> {
        Err(Error::Unsupported("store"))
    }

    async fn delete(&self, _translation: &Translation) -> Result<()> {
        Err(Error::Unsupported("delete"))
    }

    async fn supported_locales(&self) -> Result<Vec<LanguageIdentifier>> {
        let snapshot = self.cached_or_fetch().await?;
        snapshot.supported.iter().map(|tag| locale::parse(tag)).collect()
    }

    async fn default_locale(&self) -> Result<LanguageIdentifier> {
        let snapshot = self.cached_or_fetch().await?;
        locale::parse(&snapshot.default)
    }

    async fn set_default_locale(&self, _locale: &LanguageIdentifier) -> Result<()> {
        Err(Error::Unsupported("set_default_locale"))
    }

    async fn add_supported_locale(&self, _locale: &LanguageIdentifier) -> Result<()> {
        Err(Error::Unsupported("add_supported_locale"))
    }

    async fn remove_supported_locale(&self, _locale: &LanguageIdentifier) -> Result<()> {
        Err(Error::Unsupported("remove_supported_locale"))
    }
}
