//! The persisted credential slot.
//!
//! One token and one plain identifier, scoped to the running session. Only
//! [`crate::session::SessionManager`] writes it.

use std::{
  fmt,
  sync::{Arc, Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};

/// An opaque bearer token issued by the backend at login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
  pub fn new(token: impl Into<String>) -> Self { Self(token.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Debug for Credential {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Credential(**redacted**)")
  }
}

/// What survives a reload: the token and the email it was issued to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
  pub token: Credential,
  pub email: String,
}

/// A single-slot credential store.
pub trait CredentialStore: Send + Sync {
  fn load(&self) -> Option<StoredCredential>;

  /// Overwrites whatever was stored.
  fn save(&self, credential: &StoredCredential);

  fn clear(&self);
}

/// Process-lifetime store. Clones share the same slot, so a second
/// [`crate::session::SessionManager`] built from a clone sees what the first
/// one saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
  slot: Arc<Mutex<Option<StoredCredential>>>,
}

impl MemoryCredentialStore {
  pub fn new() -> Self { Self::default() }

  /// A store pre-loaded with `credential`, e.g. a token handed over from the
  /// environment.
  pub fn with(credential: StoredCredential) -> Self {
    Self { slot: Arc::new(Mutex::new(Some(credential))) }
  }
}

impl CredentialStore for MemoryCredentialStore {
  fn load(&self) -> Option<StoredCredential> {
    self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  fn save(&self, credential: &StoredCredential) {
    *self.slot.lock().unwrap_or_else(PoisonError::into_inner) =
      Some(credential.clone());
  }

  fn clear(&self) {
    self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn debug_never_prints_the_token() {
    let c = Credential::new("s3cret-token");
    assert!(!format!("{c:?}").contains("s3cret"));
    assert_eq!(c.as_str(), "s3cret-token");
  }

  #[test]
  fn clones_share_one_slot() {
    let a = MemoryCredentialStore::new();
    let b = a.clone();
    a.save(&StoredCredential {
      token: Credential::new("t1"),
      email: "a@x.com".into(),
    });
    assert_eq!(b.load().unwrap().email, "a@x.com");

    b.clear();
    assert!(a.load().is_none());
    // Clearing an empty slot is fine.
    a.clear();
    assert!(a.load().is_none());
  }
}
