//! Custom error types for archivist

use crate::context::AssembledContext;
use crate::retrieve::RetrievedChunk;
use thiserror::Error;

/// Main error type for archivist operations
#[derive(Error, Debug)]
pub enum Error {
    /// Bad chunk size/overlap, bad `k`, bad config file values.
    /// Raised before any I/O.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Backing storage could not be reached. Retryable.
    #[error("Vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Answer synthesis failed: {}", .0.reason)]
    Synthesis(Box<SynthesisError>),

    #[error("Invalid embedding artifact: {0}")]
    InvalidArtifact(String),

    #[error("Crawl error: {0}")]
    Crawl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Not initialized: run 'archivist init' first")]
    NotInitialized,

    #[error("{0}")]
    Other(String),
}

/// A failed synthesis call, carrying everything retrieval already produced
/// so the caller can retry generation without re-querying the store.
#[derive(Debug, Clone)]
pub struct SynthesisError {
    pub reason: String,
    pub query: String,
    pub retrieved_chunks: Vec<RetrievedChunk>,
    pub context: AssembledContext,
}

impl Error {
    /// Whether the operation may succeed if attempted again unchanged
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::StoreUnavailable(_) => true,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::Synthesis(_) => true,
            _ => false,
        }
    }

    /// Build a synthesis failure that keeps the retrieved context
    pub fn synthesis(
        reason: impl Into<String>,
        query: &str,
        retrieved_chunks: Vec<RetrievedChunk>,
        context: AssembledContext,
    ) -> Self {
        Error::Synthesis(Box::new(SynthesisError {
            reason: reason.into(),
            query: query.to_string(),
            retrieved_chunks,
            context,
        }))
    }
}

/// Result type alias for archivist
pub type Result<T> = std::result::Result<T, Error>;

/// SQLITE_BUSY (5) or SQLITE_LOCKED (6), including their extended codes
fn is_busy_code(code: &str) -> bool {
    code.parse::<i32>().is_ok_and(|c| matches!(c & 0xff, 5 | 6))
}

/// Connection-level sqlx failures and lock contention mean the store cannot
/// be reached right now
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                Error::StoreUnavailable(err.to_string())
            }
            sqlx::Error::Database(ref db) if db.code().is_some_and(|c| is_busy_code(&c)) => {
                Error::StoreUnavailable(err.to_string())
            }
            other => Error::Database(other),
        }
    }
}

/// Convert qdrant errors. Every client failure is a transport failure from
/// the pipeline's point of view.
impl From<qdrant_client::QdrantError> for Error {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Error::StoreUnavailable(format!("qdrant: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_unavailable_is_retryable() {
        assert!(Error::StoreUnavailable("down".to_string()).is_retryable());
        assert!(!Error::InvalidConfig("k".to_string()).is_retryable());
        assert!(!Error::DimensionMismatch {
            expected: 3,
            actual: 2
        }
        .is_retryable());
    }

    #[test]
    fn test_sqlx_pool_errors_map_to_unavailable() {
        let err: Error = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, Error::StoreUnavailable(_)));

        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::Database(_)));
    }

    #[test]
    fn test_busy_codes() {
        assert!(is_busy_code("5"));
        assert!(is_busy_code("6"));
        // SQLITE_BUSY_SNAPSHOT, SQLITE_LOCKED_SHAREDCACHE
        assert!(is_busy_code("517"));
        assert!(is_busy_code("262"));
        assert!(!is_busy_code("19"));
        assert!(!is_busy_code("2067"));
        assert!(!is_busy_code("HY000"));
    }

    #[tokio::test]
    async fn test_sqlite_lock_contention_is_retryable() {
        use sqlx::sqlite::SqliteConnectOptions;
        use sqlx::ConnectOptions;
        use std::time::Duration;

        let tmp = tempfile::TempDir::new().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(tmp.path().join("locked.db"))
            .create_if_missing(true)
            .busy_timeout(Duration::ZERO);

        let mut holder = options.connect().await.unwrap();
        let mut writer = options.connect().await.unwrap();
        sqlx::query("BEGIN EXCLUSIVE").execute(&mut holder).await.unwrap();

        let err: Error = sqlx::query("CREATE TABLE t (x INTEGER)")
            .execute(&mut writer)
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::StoreUnavailable(_)), "{err:?}");
        assert!(err.is_retryable());

        sqlx::query("ROLLBACK").execute(&mut holder).await.unwrap();
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = Error::DimensionMismatch {
            expected: 384,
            actual: 768,
        };
        assert_eq!(
            err.to_string(),
            "Vector dimension mismatch: expected 384, got 768"
        );
    }
}
