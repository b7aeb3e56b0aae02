//! In-memory translation cache: locale -> key -> translation.
//!
//! The cache is a plain two-level index under one reader/writer lock and
//! does exact lookups only. Ancestor fallback is composed one layer up,
//! in [`crate::manager::TranslationManager`], so a cache hit never hides
//! which locale actually carried the value.

use std::collections::HashMap;
use std::sync::RwLock;

use unic_langid::LanguageIdentifier;

use crate::locale;

/// One resolved string for one (locale, key) pair.
///
/// Within a store the pair is unique; adding a duplicate pair overwrites
/// the previous value. An empty value is legal and distinct from absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub locale: LanguageIdentifier,
    pub key: String,
    pub value: String,
}

impl Translation {
    pub fn new(
        locale: LanguageIdentifier,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            locale,
            key: key.into(),
            value: value.into(),
        }
    }
}

type Index = HashMap<String, HashMap<String, Translation>>;

/// Concurrent translation cache keyed by canonical locale string, then key.
///
/// Reads share the lock, writes are exclusive. The structure sees one
/// write per mutation or resync and a read per lookup, so a single lock
/// over the whole index is enough; contrast with the per-shard locking
/// of [`crate::registry::RequestRegistry`], which is insert/remove heavy.
#[derive(Default)]
pub struct TranslationCache {
    index: RwLock<Index>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard every entry. Backing stores are not touched.
    pub fn clear(&self) {
        self.index.write().unwrap().clear();
    }

    /// Insert or overwrite the entry at (locale, key).
    pub fn add(&self, translation: Translation) {
        let mut index = self.index.write().unwrap();
        index
            .entry(locale::canonical(&translation.locale))
            .or_default()
            .insert(translation.key.clone(), translation);
    }

    /// Exact single-level lookup; no ancestor walk happens here.
    pub fn get(&self, locale: &LanguageIdentifier, key: &str) -> Option<Translation> {
        let index = self.index.read().unwrap();
        index
            .get(&locale::canonical(locale))
            .and_then(|by_key| by_key.get(key))
            .cloned()
    }

    /// Remove the entry at (locale, key). Removing an absent entry is a no-op.
    pub fn delete(&self, translation: &Translation) {
        let mut index = self.index.write().unwrap();
        if let Some(by_key) = index.get_mut(&locale::canonical(&translation.locale)) {
            by_key.remove(&translation.key);
        }
    }

    /// Total number of cached entries across all locales.
    pub fn len(&self) -> usize {
        self.index
            .read()
            .unwrap()
            .values()
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every cached entry, for snapshot export.
    pub fn entries(&self) -> Vec<Translation> {
        self.index
            .read()
            .unwrap()
            .values()
            .flat_map(|by_key| by_key.values().cloned())
            .collect()
    }

    /// Swap the whole index in one write-lock acquisition.
    ///
    /// Used by resync so readers either see the previous contents or the
    /// new contents, never a cleared-but-unfilled cache.
    pub(crate) fn replace(&self, entries: Vec<Translation>) {
        let mut fresh: Index = HashMap::new();
        for translation in entries {
            fresh
                .entry(locale::canonical(&translation.locale))
                .or_default()
                .insert(translation.key.clone(), translation);
        }
        *self.index.write().unwrap() = fresh;
    }
}
