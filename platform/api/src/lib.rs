use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions};
use thiserror::Error;

/// Shared result type for domain operations surfaced over GraphQL.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("login required")]
    Unauthenticated,
    #[error("insufficient permissions")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("status change rejected, board restored: {0}")]
    BoardRollback(String),
    #[error("upstream service failed: {0}")]
    Upstream(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::BoardRollback(_) => "BOARD_ROLLBACK",
            ApiError::Upstream(_) => "UPSTREAM",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }

    /// Convert into a GraphQL error carrying `extensions.code`.
    pub fn into_graphql(self) -> Error {
        if let ApiError::Internal(source) = &self {
            tracing::error!(error = %source, "internal error");
        }
        self.extend()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        let code = self.code();
        Error::new(self.to_string()).extend_with(|_err, e| e.set("code", code))
    }
}

/// Convert any error into a GraphQL error payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).into_graphql()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::Value;

    fn code_of(err: &Error) -> Option<Value> {
        err.extensions
            .as_ref()
            .and_then(|map| map.get("code"))
            .cloned()
    }

    #[test]
    fn internal_errors_are_masked() {
        let err = internal_error(anyhow::anyhow!("connection reset by peer"));
        assert_eq!(err.message, "internal server error");
        assert_eq!(code_of(&err), Some(Value::from("INTERNAL")));
    }

    #[test]
    fn rollback_keeps_cause_and_code() {
        let err = ApiError::BoardRollback("network down".into()).into_graphql();
        assert!(err.message.contains("network down"));
        assert_eq!(code_of(&err), Some(Value::from("BOARD_ROLLBACK")));
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = ApiError::NotFound("quote").into_graphql();
        assert_eq!(err.message, "quote not found");
        assert_eq!(code_of(&err), Some(Value::from("NOT_FOUND")));
    }
}
