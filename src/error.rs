use axum::http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid locale tag: {0:?}")]
    InvalidLocale(String),

    #[error("{0} is not supported by this storage backend")]
    Unsupported(&'static str),

    #[error("locale {0:?} is the default locale and cannot be removed")]
    DefaultLocaleInUse(String),

    #[error("http transfer failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("snapshot endpoint returned {0}")]
    SnapshotStatus(StatusCode),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_locale_message_includes_token() {
        let err = Error::InvalidLocale("zz!".to_string());
        assert!(err.to_string().contains("zz!"));
    }

    #[test]
    fn test_unsupported_message_names_operation() {
        let err = Error::Unsupported("store");
        assert_eq!(
            err.to_string(),
            "store is not supported by this storage backend"
        );
    }

    #[test]
    fn test_snapshot_status_message() {
        let err = Error::SnapshotStatus(StatusCode::BAD_GATEWAY);
        assert!(err.to_string().contains("502"));
    }
}
