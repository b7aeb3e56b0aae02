//! Prefix-scoped views over a [`TranslationManager`].
//!
//! Lookup keys are dotted paths ("dashboard.title"); a group fixes the
//! leading part so rendering code for one page or feature passes only the
//! leaf. Groups are plain handles: no state of their own, safe to clone
//! and keep anywhere.

use unic_langid::LanguageIdentifier;

use crate::cache::Translation;
use crate::error::Result;
use crate::manager::TranslationManager;

#[derive(Clone)]
pub struct TranslationGroup {
    manager: TranslationManager,
    prefix: String,
}

impl TranslationGroup {
    pub(crate) fn new(manager: TranslationManager, prefix: impl Into<String>) -> Self {
        Self {
            manager,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn qualify(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else if key.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}.{}", self.prefix, key)
        }
    }

    /// A child group one level deeper.
    pub fn group(&self, prefix: impl Into<String>) -> TranslationGroup {
        TranslationGroup::new(self.manager.clone(), self.qualify(&prefix.into()))
    }

    /// Ancestor-chain lookup under this group's prefix.
    pub fn get(&self, locale: &LanguageIdentifier, key: &str) -> Option<Translation> {
        self.manager.get(locale, &self.qualify(key))
    }

    /// The resolved text alone, empty when absent.
    pub fn translate(&self, locale: &LanguageIdentifier, key: &str) -> String {
        self.manager.translate(locale, &self.qualify(key))
    }

    /// A lookup function bound to one locale, for handing to templates and
    /// render helpers that expect plain `key -> text`.
    pub fn lookup(&self, locale: LanguageIdentifier) -> impl Fn(&str) -> String + '_ {
        move |key| self.translate(&locale, key)
    }

    /// Write-through add under this group's prefix.
    pub async fn add(
        &self,
        locale: LanguageIdentifier,
        key: &str,
        value: impl Into<String>,
    ) -> Result<()> {
        let translation = Translation::new(locale, self.qualify(key), value.into());
        self.manager.add(translation).await
    }

    /// Write-through delete under this group's prefix.
    pub async fn delete(&self, locale: LanguageIdentifier, key: &str) -> Result<()> {
        let translation = Translation::new(locale, self.qualify(key), String::new());
        self.manager.delete(&translation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, Storage};
    use std::sync::Arc;

    fn loc(tag: &str) -> LanguageIdentifier {
        tag.parse().expect("valid locale tag")
    }

    fn manager_with_memory() -> (TranslationManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::seeded(loc("en"), vec![loc("en"), loc("es")]));
        let manager = TranslationManager::new(vec![store.clone()]);
        (manager, store)
    }

    // ==================== Prefixing Tests ====================

    #[tokio::test]
    async fn test_group_qualifies_lookups() {
        let (manager, _store) = manager_with_memory();
        manager
            .add(Translation::new(loc("en"), "dashboard.title", "Dashboard"))
            .await
            .expect("add");

        let dashboard = manager.group("dashboard");

        assert_eq!(dashboard.translate(&loc("en"), "title"), "Dashboard");
        assert!(dashboard.get(&loc("en"), "missing").is_none());
    }

    #[tokio::test]
    async fn test_nested_groups_join_with_dots() {
        let (manager, _store) = manager_with_memory();
        manager
            .add(Translation::new(
                loc("en"),
                "dashboard.widgets.clock",
                "Clock",
            ))
            .await
            .expect("add");

        let widgets = manager.group("dashboard").group("widgets");

        assert_eq!(widgets.prefix(), "dashboard.widgets");
        assert_eq!(widgets.translate(&loc("en"), "clock"), "Clock");
    }

    #[tokio::test]
    async fn test_empty_prefix_is_passthrough() {
        let (manager, _store) = manager_with_memory();
        manager
            .add(Translation::new(loc("en"), "bare.key", "value"))
            .await
            .expect("add");

        let group = manager.group("");

        assert_eq!(group.translate(&loc("en"), "bare.key"), "value");
    }

    // ==================== Lookup Closure Tests ====================

    #[tokio::test]
    async fn test_lookup_closure_binds_the_locale() {
        let (manager, _store) = manager_with_memory();
        manager
            .add(Translation::new(loc("en"), "dashboard.title", "Dashboard"))
            .await
            .expect("add");
        manager
            .add(Translation::new(loc("es"), "dashboard.title", "Panel"))
            .await
            .expect("add");

        let dashboard = manager.group("dashboard");
        let english = dashboard.lookup(loc("en"));
        let spanish = dashboard.lookup(loc("es"));

        assert_eq!(english("title"), "Dashboard");
        assert_eq!(spanish("title"), "Panel");
        assert_eq!(english("missing"), "", "misses render as empty text");
    }

    #[tokio::test]
    async fn test_lookup_closure_walks_ancestors() {
        let (manager, _store) = manager_with_memory();
        manager
            .add(Translation::new(loc("en"), "dashboard.title", "Dashboard"))
            .await
            .expect("add");

        let dashboard = manager.group("dashboard");
        let t = dashboard.lookup(loc("en-US"));
        assert_eq!(t("title"), "Dashboard");
    }

    // ==================== Fallback Tests ====================

    #[tokio::test]
    async fn test_group_lookup_walks_ancestors() {
        let (manager, _store) = manager_with_memory();
        manager
            .add(Translation::new(loc("en"), "dashboard.title", "Dashboard"))
            .await
            .expect("add");

        let dashboard = manager.group("dashboard");

        assert_eq!(dashboard.translate(&loc("en-US"), "title"), "Dashboard");
    }

    // ==================== Write-Through Tests ====================

    #[tokio::test]
    async fn test_group_add_writes_qualified_key() {
        let (manager, store) = manager_with_memory();

        let dashboard = manager.group("dashboard");
        dashboard
            .add(loc("es"), "title", "Panel")
            .await
            .expect("add");

        let stored = store.get_all().await.expect("get_all");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].key, "dashboard.title");
        assert_eq!(stored[0].value, "Panel");
    }

    #[tokio::test]
    async fn test_group_delete_removes_qualified_key() {
        let (manager, store) = manager_with_memory();
        let dashboard = manager.group("dashboard");
        dashboard.add(loc("es"), "title", "Panel").await.expect("add");

        dashboard.delete(loc("es"), "title").await.expect("delete");

        assert!(store.get_all().await.expect("get_all").is_empty());
        assert!(dashboard.get(&loc("es"), "title").is_none());
    }
}
