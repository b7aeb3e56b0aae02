//! Backing stores for translations and locale bookkeeping.
//!
//! The manager treats every store through the [`Storage`] capability and
//! never assumes where the data lives. Three implementations ship here:
//! process-local memory, SQLite on disk, and a read-only HTTP snapshot.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use unic_langid::LanguageIdentifier;

use crate::cache::Translation;
use crate::error::{Error, Result};
use crate::locale;

mod memory;
mod snapshot;
mod sqlite;

pub use memory::MemoryStore;
pub use snapshot::SnapshotStore;
pub use sqlite::SqliteStore;

/// Capability contract every backing store provides.
///
/// Mutations use upsert/idempotent semantics: `store` overwrites an
/// existing (locale, key) pair, `delete` of an absent pair succeeds.
/// Setting a default locale must also make it a member of the supported
/// set. Read-only stores reject every mutation with
/// [`Error::Unsupported`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Every translation the store knows about.
    async fn get_all(&self) -> Result<Vec<Translation>>;

    /// Insert or overwrite one translation.
    async fn store(&self, translation: &Translation) -> Result<()>;

    /// Remove one translation; absent pairs are a successful no-op.
    async fn delete(&self, translation: &Translation) -> Result<()>;

    /// The supported locales, in the order they were enabled.
    async fn supported_locales(&self) -> Result<Vec<LanguageIdentifier>>;

    /// The designated default, or the root locale when none is set.
    async fn default_locale(&self) -> Result<LanguageIdentifier>;

    async fn set_default_locale(&self, locale: &LanguageIdentifier) -> Result<()>;

    async fn add_supported_locale(&self, locale: &LanguageIdentifier) -> Result<()>;

    async fn remove_supported_locale(&self, locale: &LanguageIdentifier) -> Result<()>;
}

/// Wire form of one translation, as exchanged with snapshot servers and
/// the admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRecord {
    pub locale: String,
    pub key: String,
    pub value: String,
}

impl From<&Translation> for TranslationRecord {
    fn from(translation: &Translation) -> Self {
        Self {
            locale: locale::canonical(&translation.locale),
            key: translation.key.clone(),
            value: translation.value.clone(),
        }
    }
}

impl TryFrom<TranslationRecord> for Translation {
    type Error = Error;

    fn try_from(record: TranslationRecord) -> Result<Self> {
        let tag = locale::parse(&record.locale)?;
        Ok(Translation::new(tag, record.key, record.value))
    }
}

/// Full exported state of one store: locale bookkeeping plus every
/// translation. This is the document a [`SnapshotStore`] fetches and the
/// snapshot endpoint serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub default: String,
    pub supported: Vec<String>,
    pub translations: Vec<TranslationRecord>,
}
