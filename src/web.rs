//! HTTP layer: locale negotiation middleware, localized demo pages, and the
//! admin/status API.
//!
//! Every path not claimed by a reserved route goes through [`negotiate_locale`],
//! which reads the first path segment and the `Accept-Language` header, asks the
//! manager for a resolution, and either answers a 302 to the canonical path or
//! strips the locale segment and forwards to the inner router. The resolved
//! locale travels through the request registry; handlers pick it up with the
//! [`RequestLocale`] extractor.

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::uri::PathAndQuery;
use axum::http::{header, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use unic_langid::LanguageIdentifier;

use crate::cache::Translation;
use crate::error::Error;
use crate::locale;
use crate::manager::TranslationManager;
use crate::negotiate::Negotiation;
use crate::registry::{RequestId, RequestRegistry};
use crate::security;
use crate::storage::{Snapshot, TranslationRecord};

/// Shared state handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub manager: TranslationManager,
    pub registry: Arc<RequestRegistry>,
    /// Admin API key; `None` disables the `/admin` routes outright.
    pub admin_api_key: Option<String>,
}

impl AppState {
    pub fn new(
        manager: TranslationManager,
        registry: Arc<RequestRegistry>,
        admin_api_key: Option<String>,
    ) -> Self {
        Self {
            manager,
            registry,
            admin_api_key,
        }
    }
}

/// Build the full application router.
///
/// Reserved routes (`/healthz`, `/status`, `/i18n/snapshot.json`, `/admin/*`)
/// are matched first and never see the locale middleware; everything else
/// falls through to the localized pages.
pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/translations",
            put(add_translation).delete(delete_translation),
        )
        .route("/locales", post(add_locale).delete(remove_locale))
        .route("/locales/default", put(set_default_locale))
        .route("/sync", post(trigger_sync))
        // Unknown admin paths stop here instead of falling through to
        // locale negotiation; the key gate wraps this too
        .fallback(admin_not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let pages = Router::new()
        .route("/", get(landing))
        .route("/dashboard", get(dashboard))
        .with_state(state.clone());

    let localized = Router::new()
        .fallback_service(pages)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            negotiate_locale,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .route("/i18n/snapshot.json", get(snapshot))
        .nest("/admin", admin)
        .fallback_service(localized)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ==================== Locale Middleware ====================

/// Negotiate the request locale and route or redirect accordingly.
///
/// On an exact match the locale segment is stripped from the URI, the locale
/// is parked in the registry for the lifetime of the request, and the inner
/// router runs. Otherwise the client is sent a 302 to the canonical path,
/// unless the canonical path is the one it already asked for.
async fn negotiate_locale(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let (token, rest) = split_first_segment(request.uri().path());
    let accept_language = request
        .headers()
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();

    let negotiation = state.manager.negotiate(token, &accept_language).await;

    if negotiation.needs_redirect() {
        let target = redirect_target(&negotiation, request.uri());
        // A self-redirect can only come out of a root-locale resolution on an
        // already-canonical path; serve it instead of looping.
        if target != path_with_query(request.uri()) {
            return redirect_found(&target);
        }
    }

    if negotiation.valid {
        match rewrite_uri(request.uri(), &rest) {
            Some(uri) => *request.uri_mut() = uri,
            None => return StatusCode::BAD_REQUEST.into_response(),
        }
    }

    let guard = state.registry.register(negotiation.locale);
    request.extensions_mut().insert(RequestIdent(guard.id()));
    let response = next.run(request).await;
    drop(guard);
    response
}

/// Split a request path into its first segment and the remainder.
///
/// `"/es/reports"` becomes `("es", "/reports")`; `"/"` becomes `("", "/")`.
fn split_first_segment(path: &str) -> (&str, String) {
    let trimmed = path.trim_start_matches('/');
    match trimmed.split_once('/') {
        Some((first, rest)) => (first, format!("/{}", rest)),
        None => (trimmed, "/".to_string()),
    }
}

/// The canonical path for a finished negotiation.
///
/// A valid token is replaced by the resolved locale's segment; an invalid one
/// was never a locale segment, so the whole path is kept under the new
/// prefix. A root resolution gets no segment at all. The query string rides
/// along untouched.
fn redirect_target(negotiation: &Negotiation, uri: &Uri) -> String {
    let (_, rest) = split_first_segment(uri.path());
    let remainder = if negotiation.valid {
        rest
    } else {
        uri.path().to_string()
    };

    let segment = locale::path_segment(&negotiation.locale);
    let mut target = if segment.is_empty() {
        remainder
    } else if remainder == "/" {
        format!("/{}", segment)
    } else {
        format!("/{}{}", segment, remainder)
    };
    if target.is_empty() {
        target.push('/');
    }
    if let Some(query) = uri.query() {
        target.push('?');
        target.push_str(query);
    }
    target
}

fn path_with_query(uri: &Uri) -> String {
    match uri.query() {
        Some(query) => format!("{}?{}", uri.path(), query),
        None => uri.path().to_string(),
    }
}

/// Swap the path of a URI, keeping the query string.
fn rewrite_uri(original: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match original.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let mut parts = original.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse::<PathAndQuery>().ok()?);
    Uri::from_parts(parts).ok()
}

/// Plain 302 with a `Location` header; `axum::response::Redirect` would send
/// a 307 here.
fn redirect_found(location: &str) -> Response {
    match Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location)
        .body(Body::empty())
    {
        Ok(response) => response,
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

// ==================== Request Locale Extractor ====================

/// Request id left on the request by the locale middleware.
#[derive(Debug, Clone, Copy)]
struct RequestIdent(RequestId);

/// The locale resolved for the current request.
///
/// The middleware keeps the association in the request registry and only the
/// request id travels on the request itself; this extractor joins the two
/// back together. A registry miss falls back to the root locale.
#[derive(Debug, Clone)]
pub struct RequestLocale(pub LanguageIdentifier);

#[async_trait]
impl FromRequestParts<AppState> for RequestLocale {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let locale = parts
            .extensions
            .get::<RequestIdent>()
            .and_then(|ident| state.registry.get(ident.0))
            .unwrap_or_default();
        Ok(RequestLocale(locale))
    }
}

// ==================== Localized Pages ====================

async fn landing(
    State(state): State<AppState>,
    RequestLocale(locale): RequestLocale,
) -> Json<serde_json::Value> {
    let greeting = state.manager.translate(&locale, "greeting");
    Json(json!({
        "locale": locale.to_string(),
        "greeting": greeting,
    }))
}

async fn dashboard(
    State(state): State<AppState>,
    RequestLocale(locale): RequestLocale,
) -> Json<serde_json::Value> {
    let strings = state.manager.group("dashboard");
    let t = strings.lookup(locale.clone());
    Json(json!({
        "locale": locale.to_string(),
        "title": t("title"),
        "caption": t("caption"),
    }))
}

// ==================== Health and Status ====================

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
    default_locale: String,
    supported_locales: Vec<String>,
    translations: usize,
    stores: usize,
    in_flight_requests: usize,
    last_sync: Option<DateTime<Utc>>,
}

async fn status(State(state): State<AppState>) -> Json<StatusBody> {
    let default = state.manager.default_locale().await;
    let supported = state
        .manager
        .supported_locales()
        .await
        .iter()
        .map(locale::canonical)
        .collect();
    Json(StatusBody {
        status: "ok",
        default_locale: locale::canonical(&default),
        supported_locales: supported,
        translations: state.manager.translation_count(),
        stores: state.manager.store_count(),
        in_flight_requests: state.registry.len(),
        last_sync: state.manager.last_sync(),
    })
}

/// Serve the manager's current view as a snapshot document. Another instance
/// can point its snapshot backend at this endpoint and chain off it.
async fn snapshot(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.manager.export_snapshot().await)
}

// ==================== Admin API ====================

/// Gate for the `/admin` routes.
///
/// Without a configured key the routes are indistinguishable from absent
/// ones; with one, the `x-api-key` header is compared in constant time.
async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.admin_api_key.as_deref() else {
        return ApiError::new(StatusCode::NOT_FOUND, "not found").into_response();
    };

    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if !security::constant_time_compare(provided, expected) {
        warn!("Rejected admin request with a missing or invalid API key");
        return ApiError::new(StatusCode::UNAUTHORIZED, "invalid API key").into_response();
    }

    next.run(request).await
}

/// Fallback for paths under `/admin` that match no route. Answers with the
/// same body an unconfigured admin surface uses.
async fn admin_not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "not found")
}

#[derive(Debug, Deserialize)]
struct LocaleBody {
    locale: String,
}

async fn add_translation(
    State(state): State<AppState>,
    Json(record): Json<TranslationRecord>,
) -> Result<StatusCode, ApiError> {
    let translation = Translation::try_from(record)?;
    info!(
        "Adding translation {} for locale {}",
        translation.key, translation.locale
    );
    state.manager.add(translation).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_translation(
    State(state): State<AppState>,
    Json(record): Json<TranslationRecord>,
) -> Result<StatusCode, ApiError> {
    let translation = Translation::try_from(record)?;
    info!(
        "Deleting translation {} for locale {}",
        translation.key, translation.locale
    );
    state.manager.delete(&translation).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_locale(
    State(state): State<AppState>,
    Json(body): Json<LocaleBody>,
) -> Result<StatusCode, ApiError> {
    let target = locale::parse(&body.locale)?;
    info!("Adding supported locale {}", target);
    state.manager.add_supported_locale(target).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_locale(
    State(state): State<AppState>,
    Json(body): Json<LocaleBody>,
) -> Result<StatusCode, ApiError> {
    let target = locale::parse(&body.locale)?;
    info!("Removing supported locale {}", target);
    state.manager.remove_supported_locale(&target).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_default_locale(
    State(state): State<AppState>,
    Json(body): Json<LocaleBody>,
) -> Result<StatusCode, ApiError> {
    let target = locale::parse(&body.locale)?;
    info!("Setting default locale to {}", target);
    state.manager.set_default_locale(target).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn trigger_sync(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    info!("Manual sync requested through the admin API");
    state.manager.sync().await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================== Error Mapping ====================

/// HTTP-facing error: a status code plus a JSON `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::InvalidLocale(_) | Error::Unsupported(_) | Error::DefaultLocaleInUse(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Http(_) | Error::SnapshotStatus(_) => StatusCode::BAD_GATEWAY,
            Error::Database(_) | Error::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn langid(tag: &str) -> LanguageIdentifier {
        tag.parse().expect("test locale should parse")
    }

    fn exact(tag: &str) -> Negotiation {
        Negotiation {
            locale: langid(tag),
            matched: true,
            valid: true,
            exact: true,
        }
    }

    fn fallback(tag: &str, valid: bool) -> Negotiation {
        Negotiation {
            locale: langid(tag),
            matched: true,
            valid,
            exact: false,
        }
    }

    // ==================== Path Splitting Tests ====================

    #[test]
    fn test_split_first_segment_examples() {
        assert_eq!(split_first_segment("/"), ("", "/".to_string()));
        assert_eq!(split_first_segment("/es"), ("es", "/".to_string()));
        assert_eq!(
            split_first_segment("/es/reports"),
            ("es", "/reports".to_string())
        );
        assert_eq!(
            split_first_segment("/es/reports/2024"),
            ("es", "/reports/2024".to_string())
        );
        assert_eq!(split_first_segment(""), ("", "/".to_string()));
    }

    // ==================== Redirect Target Tests ====================

    #[test]
    fn test_redirect_replaces_a_valid_locale_segment() {
        let uri: Uri = "/en-US/reports".parse().expect("uri");
        let target = redirect_target(&fallback("en", true), &uri);
        assert_eq!(target, "/en/reports");
    }

    #[test]
    fn test_redirect_keeps_the_whole_path_for_an_invalid_token() {
        let uri: Uri = "/dashboard".parse().expect("uri");
        let target = redirect_target(&fallback("es", false), &uri);
        assert_eq!(
            target, "/es/dashboard",
            "'dashboard' is not a locale segment and must not be consumed"
        );
    }

    #[test]
    fn test_redirect_preserves_the_query_string() {
        let uri: Uri = "/fr/reports?page=2&dense=1".parse().expect("uri");
        let target = redirect_target(&fallback("en", true), &uri);
        assert_eq!(target, "/en/reports?page=2&dense=1");
    }

    #[test]
    fn test_redirect_from_the_bare_root_path() {
        let uri: Uri = "/".parse().expect("uri");
        let target = redirect_target(&fallback("es", false), &uri);
        assert_eq!(target, "/es");
    }

    #[test]
    fn test_root_locale_resolution_drops_the_segment() {
        let uri: Uri = "/xx/reports".parse().expect("uri");
        let negotiation = Negotiation {
            locale: LanguageIdentifier::default(),
            matched: true,
            valid: true,
            exact: false,
        };
        assert_eq!(redirect_target(&negotiation, &uri), "/reports");
    }

    #[test]
    fn test_root_locale_resolution_can_be_a_self_redirect() {
        let uri: Uri = "/dashboard".parse().expect("uri");
        let negotiation = Negotiation {
            locale: LanguageIdentifier::default(),
            matched: true,
            valid: false,
            exact: false,
        };
        let target = redirect_target(&negotiation, &uri);
        assert_eq!(
            target,
            path_with_query(&uri),
            "the middleware must detect this case and serve instead of looping"
        );
    }

    // ==================== URI Rewrite Tests ====================

    #[test]
    fn test_rewrite_uri_swaps_the_path() {
        let original: Uri = "/es/reports".parse().expect("uri");
        let rewritten = rewrite_uri(&original, "/reports").expect("rewrite");
        assert_eq!(rewritten.path(), "/reports");
        assert_eq!(rewritten.query(), None);
    }

    #[test]
    fn test_rewrite_uri_keeps_the_query() {
        let original: Uri = "/es/reports?page=2".parse().expect("uri");
        let rewritten = rewrite_uri(&original, "/reports").expect("rewrite");
        assert_eq!(rewritten.path(), "/reports");
        assert_eq!(rewritten.query(), Some("page=2"));
    }

    // ==================== Redirect Response Tests ====================

    #[test]
    fn test_redirect_found_sets_status_and_location() {
        let response = redirect_found("/en/reports");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response
                .headers()
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok()),
            Some("/en/reports")
        );
    }

    // ==================== Extractor Tests ====================

    fn test_state() -> AppState {
        let manager = TranslationManager::new(vec![Arc::new(MemoryStore::new())]);
        AppState::new(manager, Arc::new(RequestRegistry::new()), None)
    }

    #[tokio::test]
    async fn test_request_locale_reads_through_the_registry() {
        let state = test_state();
        let guard = state.registry.register(langid("en-GB"));

        let (mut parts, _) = axum::http::Request::builder()
            .uri("/dashboard")
            .body(())
            .expect("request")
            .into_parts();
        parts.extensions.insert(RequestIdent(guard.id()));

        let RequestLocale(resolved) = RequestLocale::from_request_parts(&mut parts, &state)
            .await
            .expect("extractor is infallible");
        assert_eq!(resolved, langid("en-GB"));
    }

    #[tokio::test]
    async fn test_request_locale_falls_back_to_root_without_an_id() {
        let state = test_state();
        let (mut parts, _) = axum::http::Request::builder()
            .uri("/")
            .body(())
            .expect("request")
            .into_parts();

        let RequestLocale(resolved) = RequestLocale::from_request_parts(&mut parts, &state)
            .await
            .expect("extractor is infallible");
        assert_eq!(resolved, LanguageIdentifier::default());
    }

    #[tokio::test]
    async fn test_request_locale_falls_back_to_root_after_the_guard_drops() {
        let state = test_state();
        let guard = state.registry.register(langid("es"));
        let id = guard.id();
        drop(guard);

        let (mut parts, _) = axum::http::Request::builder()
            .uri("/")
            .body(())
            .expect("request")
            .into_parts();
        parts.extensions.insert(RequestIdent(id));

        let RequestLocale(resolved) = RequestLocale::from_request_parts(&mut parts, &state)
            .await
            .expect("extractor is infallible");
        assert_eq!(resolved, LanguageIdentifier::default());
    }

    // ==================== Error Mapping Tests ====================

    #[test]
    fn test_client_errors_map_to_bad_request() {
        let err = ApiError::from(Error::InvalidLocale("nope!".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = ApiError::from(Error::Unsupported("store"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = ApiError::from(Error::DefaultLocaleInUse("en".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upstream_errors_map_to_bad_gateway() {
        let err = ApiError::from(Error::SnapshotStatus(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_backend_errors_map_to_internal() {
        let err = ApiError::from(Error::Backend("store offline".to_string()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
