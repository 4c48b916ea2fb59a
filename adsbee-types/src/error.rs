//! Error types for snapshot decoding.

use thiserror::Error;

/// A message that could not be decoded at all.
///
/// Field-level problems never produce this error; they are skipped and
/// reported through [`Snapshot::skipped_fields`](crate::Snapshot::skipped_fields).
#[derive(Debug, Error)]
pub enum ParseError {
    /// The payload is not syntactically valid JSON.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
