//! Search client error types

/// Errors from the photo search endpoint
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// Transport failure (DNS, connect, TLS, body read)
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },

    /// Body was not the expected JSON
    #[error("malformed search response: {0}")]
    Parse(String),

    /// Endpoint answered with `stat: fail`
    #[error("search API error {code}: {message}")]
    Api { code: i64, message: String },

    /// No API key in config or environment
    #[error("no API key configured")]
    MissingApiKey,
}

impl SearchError {
    /// Create network error
    pub fn network(err: impl std::fmt::Display) -> Self {
        Self::Network(err.to_string())
    }

    /// Create parse error
    pub fn parse(err: impl std::fmt::Display) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_error_display() {
        let err = SearchError::Api {
            code: 100,
            message: "Invalid API Key".into(),
        };
        assert_eq!(err.to_string(), "search API error 100: Invalid API Key");
        assert_eq!(
            SearchError::Status { status: 503 }.to_string(),
            "unexpected HTTP status 503"
        );
    }
}
