//! Error type for `senslab-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A stored document is not valid JSON.
  #[error("document {key} is corrupt: {source}")]
  Corrupt {
    key:    String,
    source: serde_json::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
