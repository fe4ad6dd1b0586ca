//! Error types for `senslab-core`.

use thiserror::Error;

use crate::sample::Method;

#[derive(Debug, Error)]
pub enum Error {
  #[error("session not found: {0}")]
  SessionNotFound(String),

  #[error("session code not found: {0:?}")]
  SessionCodeNotFound(String),

  #[error("sample not found: {0}")]
  SampleNotFound(String),

  #[error("response not found: {0}")]
  ResponseNotFound(String),

  #[error("invite token not found")]
  TokenNotFound,

  /// The token exists but was already redeemed or has expired.
  #[error("invite token is expired or already used")]
  TokenExpiredOrUsed,

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("session {0} is not open for responses")]
  SessionNotReady(String),

  #[error("sample uses method {found}, expected {expected}")]
  MethodMismatch { expected: Method, found: Method },

  #[error("a seat number is required for this session")]
  SeatRequired,

  #[error("no triplets generated for sample {0}")]
  TripletsNotGenerated(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("persistence gateway error: {0}")]
  Gateway(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Whether this error is a lookup miss of any kind.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::SessionNotFound(_)
        | Self::SessionCodeNotFound(_)
        | Self::SampleNotFound(_)
        | Self::ResponseNotFound(_)
        | Self::TokenNotFound
    )
  }

  pub(crate) fn invalid(msg: impl Into<String>) -> Self {
    Self::InvalidInput(msg.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
