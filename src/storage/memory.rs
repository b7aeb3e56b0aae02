//! Process-local store, used standalone in tests and as the default
//! backend when no persistence is configured.

use std::sync::RwLock;

use async_trait::async_trait;
use unic_langid::LanguageIdentifier;

use crate::cache::Translation;
use crate::error::Result;
use crate::locale;

use super::Storage;

struct Inner {
    translations: Vec<Translation>,
    supported: Vec<LanguageIdentifier>,
    default: LanguageIdentifier,
}

/// In-memory [`Storage`] backend. Insertion order of supported locales is
/// preserved, since negotiation ties break on it.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                translations: Vec::new(),
                supported: Vec::new(),
                default: LanguageIdentifier::default(),
            }),
        }
    }

    /// Build a store with locale bookkeeping already in place. The
    /// default is made a member of the supported set if it is missing.
    pub fn seeded(default: LanguageIdentifier, supported: Vec<LanguageIdentifier>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write().unwrap();
            inner.supported = supported;
            if !locale::contains(&inner.supported, &default) {
                inner.supported.push(default.clone());
            }
            inner.default = default;
        }
        store
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn same_pair(a: &Translation, b: &Translation) -> bool {
    locale::canonical(&a.locale) == locale::canonical(&b.locale) && a.key == b.key
}

#[async_trait]
impl Storage for MemoryStore {
    async fn get_all(&self) -> Result<Vec<Translation>> {
        Ok(self.inner.read().unwrap().translations.clone())
    }

    async fn store(&self, translation: &Translation) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        match inner.translations.iter_mut().find(|t| same_pair(t, translation)) {
            Some(existing) => existing.value = translation.value.clone(),
            None => inner.translations.push(translation.clone()),
        }
        Ok(())
    }

    async fn delete(&self, translation: &Translation) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.translations.retain(|t| !same_pair(t, translation));
        Ok(())
    }

    async fn supported_locales(&self) -> Result<Vec<LanguageIdentifier>> {
        Ok(self.inner.read().unwrap().supported.clone())
    }

    async fn default_locale(&self) -> Result<LanguageIdentifier> {
        Ok(self.inner.read().unwrap().default.clone())
    }

    async fn set_default_locale(&self, locale: &LanguageIdentifier) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if !locale::contains(&inner.supported, locale) {
            inner.supported.push(locale.clone());
        }
        inner.default = locale.clone();
        Ok(())
    }

    async fn add_supported_locale(&self, locale: &LanguageIdentifier) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if !locale::contains(&inner.supported, locale) {
            inner.supported.push(locale.clone());
        }
        Ok(())
    }

    async fn remove_supported_locale(&self, locale: &LanguageIdentifier) -> Result<()> {
        let wanted = locale::canonical(locale);
        let mut inner = self.inner.write().unwrap();
        inner.supported.retain(|member| locale::canonical(member) != wanted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(tag: &str) -> LanguageIdentifier {
        tag.parse().expect("valid locale tag")
    }

    // ==================== Translation Tests ====================

    #[tokio::test]
    async fn test_store_and_get_all() {
        let store = MemoryStore::new();

        store
            .store(&Translation::new(loc("en"), "greeting", "Hello"))
            .await
            .expect("store should succeed");
        store
            .store(&Translation::new(loc("es"), "greeting", "Hola"))
            .await
            .expect("store should succeed");

        let all = store.get_all().await.expect("get_all should succeed");
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_store_upserts_on_duplicate_pair() {
        let store = MemoryStore::new();

        store
            .store(&Translation::new(loc("en"), "greeting", "Hello"))
            .await
            .expect("store should succeed");
        store
            .store(&Translation::new(loc("en"), "greeting", "Hi"))
            .await
            .expect("store should succeed");

        let all = store.get_all().await.expect("get_all should succeed");
        assert_eq!(all.len(), 1, "duplicate pair must overwrite, not append");
        assert_eq!(all[0].value, "Hi");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        let translation = Translation::new(loc("en"), "greeting", "Hello");

        store.store(&translation).await.expect("store should succeed");
        store.delete(&translation).await.expect("first delete should succeed");
        store.delete(&translation).await.expect("second delete should succeed");

        let all = store.get_all().await.expect("get_all should succeed");
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_delete_matches_on_pair_not_value() {
        let store = MemoryStore::new();

        store
            .store(&Translation::new(loc("en"), "greeting", "Hello"))
            .await
            .expect("store should succeed");
        store
            .delete(&Translation::new(loc("en"), "greeting", "something else"))
            .await
            .expect("delete should succeed");

        let all = store.get_all().await.expect("get_all should succeed");
        assert!(all.is_empty(), "delete keys on (locale, key)");
    }

    // ==================== Locale Bookkeeping Tests ====================

    #[tokio::test]
    async fn test_set_default_adds_to_supported() {
        let store = MemoryStore::new();

        store
            .set_default_locale(&loc("en"))
            .await
            .expect("set_default_locale should succeed");

        assert_eq!(store.default_locale().await.expect("default"), loc("en"));
        let supported = store.supported_locales().await.expect("supported");
        assert_eq!(supported, vec![loc("en")]);
    }

    #[tokio::test]
    async fn test_supported_preserves_insertion_order() {
        let store = MemoryStore::new();

        store.add_supported_locale(&loc("es")).await.expect("add");
        store.add_supported_locale(&loc("en")).await.expect("add");
        store.add_supported_locale(&loc("en-GB")).await.expect("add");

        let supported = store.supported_locales().await.expect("supported");
        assert_eq!(supported, vec![loc("es"), loc("en"), loc("en-GB")]);
    }

    #[tokio::test]
    async fn test_add_supported_deduplicates_by_canonical_form() {
        let store = MemoryStore::new();

        store.add_supported_locale(&loc("en-GB")).await.expect("add");
        store.add_supported_locale(&loc("EN-gb")).await.expect("add");

        let supported = store.supported_locales().await.expect("supported");
        assert_eq!(supported.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_supported_locale() {
        let store = MemoryStore::seeded(loc("en"), vec![loc("en"), loc("es")]);

        store.remove_supported_locale(&loc("es")).await.expect("remove");

        let supported = store.supported_locales().await.expect("supported");
        assert_eq!(supported, vec![loc("en")]);
    }

    #[tokio::test]
    async fn test_unset_default_is_root() {
        let store = MemoryStore::new();

        let default = store.default_locale().await.expect("default");

        assert_eq!(default, LanguageIdentifier::default());
    }

    #[tokio::test]
    async fn test_seeded_includes_default_in_supported() {
        let store = MemoryStore::seeded(loc("en"), vec![loc("es")]);

        let supported = store.supported_locales().await.expect("supported");
        assert_eq!(supported, vec![loc("es"), loc("en")]);
        assert_eq!(store.default_locale().await.expect("default"), loc("en"));
    }
}
