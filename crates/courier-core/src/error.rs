//! Error types for `courier-core`.

use thiserror::Error;

use crate::parcel::ParcelStatus;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
  /// Bad credentials, an expired token, or a role that may not perform the
  /// requested action.
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("invalid transition from {from} to {to}")]
  InvalidTransition { from: String, to: ParcelStatus },

  #[error("not found: {0}")]
  NotFound(String),

  /// Network, decoding, or backend failure. Always safe to retry.
  #[error("server error: {0}")]
  Server(String),

  #[error("validation error: {0}")]
  Validation(String),
}

impl Error {
  /// The message a view shows inline for this error.
  ///
  /// Server failures collapse to a generic retry prompt; every other kind
  /// carries its own reason so the caller can decide whether to hide the
  /// action or offer a retry.
  pub fn user_message(&self) -> String {
    match self {
      Self::Unauthorized(m) | Self::NotFound(m) | Self::Validation(m) => {
        m.clone()
      }
      Self::InvalidTransition { from, to } => {
        format!("A parcel that is {from} cannot move to {to}.")
      }
      Self::Server(_) => "An error occurred. Please try again.".to_string(),
    }
  }

  pub fn is_retryable(&self) -> bool { matches!(self, Self::Server(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
