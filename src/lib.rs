//! Locale negotiation and translation serving for web services.
//!
//! The pieces fit together like this: a [`manager::TranslationManager`] owns a
//! concurrent translation cache and a list of pluggable storage backends
//! (in-memory, SQLite, or another instance's snapshot endpoint), keeps them in
//! sync, and answers lookups with ancestor fallback (`en-US` falls back to
//! `en`, then to the root locale). The [`web`] module wraps it in an axum
//! application whose middleware negotiates a locale for every request from the
//! URL and `Accept-Language`, redirecting to the canonical path when they
//! disagree. While a request is in flight its resolved locale lives in the
//! sharded [`registry::RequestRegistry`], so handlers can pick it up without
//! threading it through every call.

pub mod cache;
pub mod config;
pub mod error;
pub mod group;
pub mod locale;
pub mod manager;
pub mod negotiate;
pub mod registry;
pub mod security;
pub mod storage;
pub mod web;

pub use cache::{Translation, TranslationCache};
pub use error::{Error, Result};
pub use group::TranslationGroup;
pub use manager::TranslationManager;
pub use negotiate::{negotiate, Negotiation};
pub use registry::{RegistryGuard, RequestId, RequestRegistry};
