//! Translation manager: the one component that composes the cache, the
//! backing stores and the locale bookkeeping.
//!
//! Lookup fallback lives here and only here; the cache itself is exact.
//! Mutations are write-through: every backing store must accept a change
//! before the cache sees it, so the cache never diverges from all stores
//! at once. `sync` rebuilds the cache from the stores wholesale and is
//! also what the optional periodic refresh task runs.
//!
//! One write lock serializes `sync` with every write-through mutation,
//! so a resync can never commit a snapshot older than a mutation it
//! overlapped with. Locale bookkeeping keeps its own async lock, held
//! across store I/O; the cache lock is never held while a store call is
//! in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use unic_langid::LanguageIdentifier;

use crate::cache::{Translation, TranslationCache};
use crate::error::{Error, Result};
use crate::group::TranslationGroup;
use crate::locale;
use crate::negotiate::{self, Negotiation};
use crate::storage::{Snapshot, Storage, TranslationRecord};

struct LocaleSettings {
    supported: Vec<LanguageIdentifier>,
    default: LanguageIdentifier,
}

struct RefreshTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Signal the task and wait for it to finish. An in-flight sync runs
    /// to completion, but no new one starts once this returns.
    async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.handle.await;
    }
}

struct ManagerInner {
    cache: TranslationCache,
    stores: Vec<Arc<dyn Storage>>,
    settings: RwLock<LocaleSettings>,
    /// Taken by every mutation and held across a whole `sync` pass.
    /// Lookups never touch it.
    write_lock: Mutex<()>,
    last_sync: std::sync::RwLock<Option<DateTime<Utc>>>,
    refresh: Mutex<Option<RefreshTask>>,
}

/// Cheaply cloneable handle; clones share one cache and one refresh task.
#[derive(Clone)]
pub struct TranslationManager {
    inner: Arc<ManagerInner>,
}

impl TranslationManager {
    /// Stores are consulted in the order given: write-through applies to
    /// them in order, and sync resolves bookkeeping conflicts in favor of
    /// earlier stores.
    pub fn new(stores: Vec<Arc<dyn Storage>>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                cache: TranslationCache::new(),
                stores,
                settings: RwLock::new(LocaleSettings {
                    supported: Vec::new(),
                    default: LanguageIdentifier::default(),
                }),
                write_lock: Mutex::new(()),
                last_sync: std::sync::RwLock::new(None),
                refresh: Mutex::new(None),
            }),
        }
    }

    // ==================== Lookup ====================

    /// Look up a key, walking the locale's ancestor chain on miss. The
    /// root locale is the last level tried; absent there means absent.
    pub fn get(&self, locale: &LanguageIdentifier, key: &str) -> Option<Translation> {
        let mut current = locale.clone();
        loop {
            if let Some(found) = self.inner.cache.get(&current, key) {
                return Some(found);
            }
            if locale::is_root(&current) {
                return None;
            }
            current = locale::parent(&current);
        }
    }

    /// String-keyed variant of [`get`](Self::get). An unparseable tag is an
    /// error, distinct from a parseable tag that simply has no translations.
    pub fn get_str(&self, tag: &str, key: &str) -> Result<Option<Translation>> {
        let locale = locale::parse(tag)?;
        Ok(self.get(&locale, key))
    }

    /// The resolved text alone, empty when absent. Render paths can splice
    /// this in without unwrapping.
    pub fn translate(&self, locale: &LanguageIdentifier, key: &str) -> String {
        self.get(locale, key)
            .map(|translation| translation.value)
            .unwrap_or_default()
    }

    /// A view of this manager with a fixed key prefix.
    pub fn group(&self, prefix: impl Into<String>) -> TranslationGroup {
        TranslationGroup::new(self.clone(), prefix)
    }

    // ==================== Write-Through Mutations ====================

    /// Add or overwrite a translation in every store, then in the cache.
    /// The first store error aborts: later stores and the cache are left
    /// untouched, and the error is returned as-is. Runs under the write
    /// lock, so it cannot interleave with a resync pass.
    pub async fn add(&self, translation: Translation) -> Result<()> {
        let _write = self.inner.write_lock.lock().await;
        for store in &self.inner.stores {
            store.store(&translation).await?;
        }
        self.inner.cache.add(translation);
        Ok(())
    }

    /// Remove a translation from every store, then from the cache. Same
    /// abort-on-first-error and locking contract as [`add`](Self::add).
    pub async fn delete(&self, translation: &Translation) -> Result<()> {
        let _write = self.inner.write_lock.lock().await;
        for store in &self.inner.stores {
            store.delete(translation).await?;
        }
        self.inner.cache.delete(translation);
        Ok(())
    }

    // ==================== Locale Bookkeeping ====================

    pub async fn supported_locales(&self) -> Vec<LanguageIdentifier> {
        self.inner.settings.read().await.supported.clone()
    }

    pub async fn default_locale(&self) -> LanguageIdentifier {
        self.inner.settings.read().await.default.clone()
    }

    /// Make `target` the default locale, adding it to the supported set
    /// if it is not already a member.
    pub async fn set_default_locale(&self, target: LanguageIdentifier) -> Result<()> {
        let _write = self.inner.write_lock.lock().await;
        let mut settings = self.inner.settings.write().await;
        for store in &self.inner.stores {
            store.set_default_locale(&target).await?;
        }
        if !locale::contains(&settings.supported, &target) {
            settings.supported.push(target.clone());
        }
        settings.default = target;
        Ok(())
    }

    pub async fn add_supported_locale(&self, target: LanguageIdentifier) -> Result<()> {
        let _write = self.inner.write_lock.lock().await;
        let mut settings = self.inner.settings.write().await;
        for store in &self.inner.stores {
            store.add_supported_locale(&target).await?;
        }
        if !locale::contains(&settings.supported, &target) {
            settings.supported.push(target);
        }
        Ok(())
    }

    /// Disable a locale for negotiation. The current default cannot be
    /// removed; change the default first.
    pub async fn remove_supported_locale(&self, target: &LanguageIdentifier) -> Result<()> {
        let _write = self.inner.write_lock.lock().await;
        let mut settings = self.inner.settings.write().await;
        let wanted = locale::canonical(target);
        if wanted == locale::canonical(&settings.default) {
            return Err(Error::DefaultLocaleInUse(wanted));
        }
        for store in &self.inner.stores {
            store.remove_supported_locale(target).await?;
        }
        settings.supported.retain(|member| locale::canonical(member) != wanted);
        Ok(())
    }

    // ==================== Negotiation ====================

    /// Negotiate against the current supported set and default.
    pub async fn negotiate(&self, token: &str, accept_language: &str) -> Negotiation {
        let preferences = locale::parse_accept_language(accept_language);
        let settings = self.inner.settings.read().await;
        negotiate::negotiate(token, &preferences, &settings.supported, &settings.default)
    }

    // ==================== Synchronization ====================

    /// Rebuild the cache and locale bookkeeping from the backing stores.
    ///
    /// The whole pass holds the write lock, so no write-through mutation
    /// can land between the store reads and the commit and then be wiped
    /// out by it. All store reads complete before anything is committed,
    /// so a failing store leaves the previous cache contents fully
    /// intact. Supported sets are unioned in store order; the first store
    /// reporting a concrete (non-root) default wins, and later
    /// disagreements are logged and ignored.
    pub async fn sync(&self) -> Result<()> {
        let _write = self.inner.write_lock.lock().await;
        let mut translations: Vec<Translation> = Vec::new();
        let mut supported: Vec<LanguageIdentifier> = Vec::new();
        let mut default: Option<LanguageIdentifier> = None;

        for (index, store) in self.inner.stores.iter().enumerate() {
            translations.extend(store.get_all().await?);

            for member in store.supported_locales().await? {
                if !locale::contains(&supported, &member) {
                    supported.push(member);
                }
            }

            let store_default = store.default_locale().await?;
            if locale::is_root(&store_default) {
                continue;
            }
            match &default {
                None => default = Some(store_default),
                Some(chosen) => {
                    if locale::canonical(chosen) != locale::canonical(&store_default) {
                        warn!(
                            "Store #{} reports default locale {} but {} was already chosen",
                            index, store_default, chosen
                        );
                    }
                }
            }
        }

        let default = default.unwrap_or_default();
        if !locale::is_root(&default) && !locale::contains(&supported, &default) {
            supported.push(default.clone());
        }

        let translation_count = translations.len();
        let supported_count = supported.len();

        {
            let mut settings = self.inner.settings.write().await;
            settings.supported = supported;
            settings.default = default;
        }
        self.inner.cache.replace(translations);
        *self.inner.last_sync.write().unwrap() = Some(Utc::now());

        info!(
            "Synced {} translations, {} supported locales",
            translation_count, supported_count
        );
        Ok(())
    }

    /// When the last successful [`sync`](Self::sync) finished.
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_sync.read().unwrap()
    }

    /// Replace the periodic refresh schedule. The previous task is fully
    /// stopped before any new one starts; `None` or a zero interval just
    /// stops. Safe to call at any time, including shutdown.
    pub async fn set_refresh_interval(&self, period: Option<Duration>) {
        let mut slot = self.inner.refresh.lock().await;
        if let Some(task) = slot.take() {
            task.stop().await;
        }

        let period = match period {
            Some(period) if !period.is_zero() => period,
            _ => return,
        };

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick fires immediately; skip it so the schedule
            // starts one full period from now
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        let inner = match weak.upgrade() {
                            Some(inner) => inner,
                            None => break,
                        };
                        let manager = TranslationManager { inner };
                        if let Err(e) = manager.sync().await {
                            warn!("Periodic translation sync failed: {}", e);
                        }
                    }
                }
            }
        });

        *slot = Some(RefreshTask {
            stop: stop_tx,
            handle,
        });
        info!("Periodic translation sync every {:?}", period);
    }

    // ==================== Introspection ====================

    /// Number of cached translations.
    pub fn translation_count(&self) -> usize {
        self.inner.cache.len()
    }

    pub fn store_count(&self) -> usize {
        self.inner.stores.len()
    }

    /// The manager's full current state in wire form, deterministically
    /// ordered so repeated exports of unchanged state are byte-identical.
    pub async fn export_snapshot(&self) -> Snapshot {
        let (default, supported) = {
            let settings = self.inner.settings.read().await;
            let supported: Vec<String> = settings.supported.iter().map(locale::canonical).collect();
            (locale::canonical(&settings.default), supported)
        };

        let mut records: Vec<TranslationRecord> = self
            .inner
            .cache
            .entries()
            .iter()
            .map(TranslationRecord::from)
            .collect();
        records.sort_by(|a, b| (&a.locale, &a.key).cmp(&(&b.locale, &b.key)));

        Snapshot {
            default,
            supported,
            translations: records,
        }
    }
}
