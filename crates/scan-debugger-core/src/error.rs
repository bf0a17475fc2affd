//! Typed errors for ingestion and queries.
//!
//! Only archive-level failures abort a session, and those belong to the
//! caller that opens the archive. Everything here is recovered at the
//! smallest granularity: one entry, or one lookup.

use thiserror::Error;

/// Why a single archive entry could not become an [`ExchangeRecord`](crate::models::ExchangeRecord).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error(transparent)]
    UnknownMethod(#[from] crate::models::UnknownMethod),

    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("empty entry name")]
    EmptyId,

    #[error("unreadable entry: {0}")]
    Unreadable(String),
}

/// Lookup failures surfaced by the query facade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("exchange '{0}' not found")]
    NotFound(String),

    #[error("exchange '{0}' does not match the specified filters")]
    FilteredOut(String),
}
