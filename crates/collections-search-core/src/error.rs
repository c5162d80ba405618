//! Error taxonomy for the search aggregator.

use thiserror::Error;

use crate::search::SourceKind;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a single search request.
///
/// [`InvalidPaging`](SearchError::InvalidPaging) is a caller error. Every
/// other variant is an upstream failure of the content store and fails the
/// whole request; no partial results are produced.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid page number {0}: pages start at 1")]
    InvalidPaging(i64),

    #[error("{kind} full-text query failed")]
    Query {
        kind: SourceKind,
        #[source]
        source: BoxError,
    },

    #[error("failed to resolve relations for {kind} matches")]
    Resolve {
        kind: SourceKind,
        #[source]
        source: BoxError,
    },
}

impl SearchError {
    pub(crate) fn query(kind: SourceKind, err: anyhow::Error) -> Self {
        SearchError::Query {
            kind,
            source: err.into(),
        }
    }

    pub(crate) fn resolve(kind: SourceKind, err: anyhow::Error) -> Self {
        SearchError::Resolve {
            kind,
            source: err.into(),
        }
    }

    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::InvalidPaging(_) => "invalid_paging",
            SearchError::Query { .. } | SearchError::Resolve { .. } => {
                "search_results_fetch_failed"
            }
        }
    }

    /// True when the request itself was malformed (4xx), false for
    /// upstream failures (5xx).
    pub fn is_caller_error(&self) -> bool {
        matches!(self, SearchError::InvalidPaging(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(SearchError::InvalidPaging(0).code(), "invalid_paging");
        let err = SearchError::query(SourceKind::Tags, anyhow::anyhow!("index offline"));
        assert_eq!(err.code(), "search_results_fetch_failed");
        assert!(!err.is_caller_error());
        assert!(SearchError::InvalidPaging(-3).is_caller_error());
    }

    #[test]
    fn test_source_chain_is_preserved() {
        let err = SearchError::resolve(SourceKind::Comments, anyhow::anyhow!("db locked"));
        assert_eq!(
            err.to_string(),
            "failed to resolve relations for comments matches"
        );
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("db locked"));
    }
}
