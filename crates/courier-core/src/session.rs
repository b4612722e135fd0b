//! The session manager: who the current caller is, and whether that is known
//! yet.
//!
//! A [`SessionManager`] is constructed once and shared (usually behind an
//! `Arc`) with everything that needs to know the caller. It is the only
//! writer of the credential store. Readers either take a snapshot with
//! [`SessionManager::state`] or follow changes through
//! [`SessionManager::subscribe`].
//!
//! ```text
//! Unknown ──restore──► Anonymous ◄──logout / failed verify── Authenticated
//!    └─────restore─────────────────────────────────────────────►   ▲
//!                      Anonymous ──────────login───────────────────┘
//! ```
//!
//! A login from `Authenticated` first drops to `Anonymous`, so one account's
//! identity is never visible while another's is being established.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};

use crate::{
  Error, Result,
  backend::AuthBackend,
  credential::{Credential, CredentialStore, StoredCredential},
  role::Role,
};

// ─── State ───────────────────────────────────────────────────────────────────

/// The authenticated user as returned by login or token verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub email: String,
  pub role:  Role,
  #[serde(default)]
  pub name:  String,
  #[serde(default)]
  pub image: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
}

/// A verified token together with the user it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub token: Credential,
  pub user:  User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
  /// Startup; [`SessionManager::restore_session`] has not finished.
  #[default]
  Unknown,
  Anonymous,
  Authenticated(Session),
}

impl SessionState {
  /// True until the startup check settles.
  pub fn is_loading(&self) -> bool { matches!(self, Self::Unknown) }

  pub fn session(&self) -> Option<&Session> {
    match self {
      Self::Authenticated(s) => Some(s),
      _ => None,
    }
  }

  pub fn user(&self) -> Option<&User> { self.session().map(|s| &s.user) }

  pub fn role(&self) -> Option<Role> { self.user().map(|u| u.role) }
}

/// How [`SessionManager::restore_session`] settled.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
  /// Nothing was stored; the caller is anonymous.
  NoCredential,
  Restored(User),
  /// The stored token failed verification and has been discarded.
  Rejected(Error),
  /// The session had already settled; nothing was done.
  AlreadySettled,
}

// ─── Manager ─────────────────────────────────────────────────────────────────

pub struct SessionManager<A, C> {
  auth:   A,
  store:  C,
  state:  watch::Sender<SessionState>,
  /// Serialises restore and login.
  writer: Mutex<()>,
  /// Bumped by every logout. A restore or login that started under an older
  /// epoch drops its result instead of applying it.
  epoch:  AtomicU64,
}

impl<A, C> SessionManager<A, C>
where
  A: AuthBackend,
  C: CredentialStore,
{
  pub fn new(auth: A, store: C) -> Self {
    Self {
      auth,
      store,
      state: watch::Sender::new(SessionState::Unknown),
      writer: Mutex::new(()),
      epoch: AtomicU64::new(0),
    }
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub fn state(&self) -> SessionState { self.state.borrow().clone() }

  /// A receiver that observes every state change from now on.
  pub fn subscribe(&self) -> watch::Receiver<SessionState> {
    self.state.subscribe()
  }

  pub fn is_loading(&self) -> bool { self.state.borrow().is_loading() }

  pub fn current_user(&self) -> Option<User> {
    self.state.borrow().user().cloned()
  }

  pub fn credential(&self) -> Option<Credential> {
    self.state.borrow().session().map(|s| s.token.clone())
  }

  pub fn role(&self) -> Option<Role> { self.state.borrow().role() }

  /// Wait for the startup check to finish and return the settled state.
  pub async fn wait_until_settled(&self) -> SessionState {
    let mut rx = self.state.subscribe();
    match rx.wait_for(|s| !s.is_loading()).await {
      Ok(state) => state.clone(),
      Err(_) => self.state(),
    }
  }

  /// The current session, if its role is one of `allowed`.
  pub fn require_role(&self, allowed: &[Role]) -> Result<Session> {
    let state = self.state.borrow();
    let session = state
      .session()
      .ok_or_else(|| Error::Unauthorized("Please log in first.".to_string()))?;
    if !allowed.contains(&session.user.role) {
      return Err(Error::Unauthorized(format!(
        "role {} may not perform this action",
        session.user.role
      )));
    }
    Ok(session.clone())
  }

  /// The current session, whatever its role.
  pub fn require_session(&self) -> Result<Session> {
    self
      .state
      .borrow()
      .session()
      .cloned()
      .ok_or_else(|| Error::Unauthorized("Please log in first.".to_string()))
  }

  // ── Transitions ───────────────────────────────────────────────────────────

  /// Settle the startup state from the stored credential.
  ///
  /// Only the first call does any work. A stored token that fails
  /// verification, for any reason, is cleared and the session becomes
  /// anonymous; the failure is returned as [`RestoreOutcome::Rejected`].
  pub async fn restore_session(&self) -> RestoreOutcome {
    let _guard = self.writer.lock().await;
    if !self.state.borrow().is_loading() {
      return RestoreOutcome::AlreadySettled;
    }
    let epoch = self.epoch.load(Ordering::SeqCst);

    let Some(stored) = self.store.load() else {
      tracing::debug!("no stored credential");
      self.publish(SessionState::Anonymous);
      return RestoreOutcome::NoCredential;
    };

    let verified = self.auth.verify(&stored.token).await;
    match verified {
      Ok(user) => {
        let next = SessionState::Authenticated(Session {
          token: stored.token,
          user:  user.clone(),
        });
        if !self.commit(epoch, |_| {}, next) {
          // Logged out while verifying; logout already settled the state.
          return RestoreOutcome::AlreadySettled;
        }
        tracing::info!(email = %user.email, role = %user.role, "session restored");
        RestoreOutcome::Restored(user)
      }
      Err(e) => {
        if !self.commit(epoch, |store| store.clear(), SessionState::Anonymous) {
          return RestoreOutcome::AlreadySettled;
        }
        tracing::warn!(email = %stored.email, error = %e, "stored credential rejected");
        RestoreOutcome::Rejected(e)
      }
    }
  }

  /// Sign in and return the backend's redirect path for the user's role.
  ///
  /// Any existing session is cleared before the backend is contacted. On
  /// failure the session stays anonymous.
  pub async fn login(&self, email: &str, password: &str) -> Result<String> {
    let _guard = self.writer.lock().await;
    self.clear();
    let epoch = self.epoch.load(Ordering::SeqCst);

    let email = email.trim();
    if email.is_empty() || password.is_empty() {
      return Err(Error::Validation(
        "Email and password are required.".to_string(),
      ));
    }

    let response = self.auth.login(email, password).await.map_err(|e| {
      tracing::info!(%email, error = %e, "login failed");
      match e {
        Error::Unauthorized(_) => {
          Error::Unauthorized("Invalid email or password".to_string())
        }
        Error::Server(m) => Error::Server(m),
        other => Error::Server(other.to_string()),
      }
    })?;

    let stored = StoredCredential {
      token: response.token.clone(),
      email: email.to_string(),
    };
    let email = response.user.email.clone();
    let role = response.user.role;
    let next = SessionState::Authenticated(Session {
      token: response.token,
      user:  response.user,
    });
    if !self.commit(epoch, |store| store.save(&stored), next) {
      return Err(Error::Unauthorized(
        "Signed out before login completed.".to_string(),
      ));
    }
    tracing::info!(%email, %role, "signed in");
    Ok(response.redirect_path)
  }

  /// Forget the session. Safe to call at any time, any number of times.
  ///
  /// The epoch bump and the store write happen under the state lock, so a
  /// restore or login finishing concurrently either lands before this call
  /// or is discarded.
  pub fn logout(&self) {
    self.state.send_if_modified(|current| {
      self.epoch.fetch_add(1, Ordering::SeqCst);
      self.store.clear();
      if current.session().is_some() {
        tracing::info!("signed out");
      }
      if *current == SessionState::Anonymous {
        return false;
      }
      *current = SessionState::Anonymous;
      true
    });
  }

  fn clear(&self) {
    self.store.clear();
    self.publish(SessionState::Anonymous);
  }

  fn publish(&self, next: SessionState) {
    self.state.send_if_modified(|current| {
      if *current == next {
        return false;
      }
      *current = next;
      true
    });
  }

  /// Persist and publish the result of a backend call that started under
  /// `epoch`. Returns false, leaving store and state alone, if a logout has
  /// happened since. Runs under the state lock that [`Self::logout`] takes.
  fn commit(
    &self,
    epoch: u64,
    persist: impl FnOnce(&C),
    next: SessionState,
  ) -> bool {
    let mut applied = false;
    self.state.send_if_modified(|current| {
      if self.epoch.load(Ordering::SeqCst) != epoch {
        return false;
      }
      persist(&self.store);
      applied = true;
      if *current == next {
        return false;
      }
      *current = next;
      true
    });
    applied
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn user(role: Role) -> User {
    User {
      email: "d@x.com".into(),
      role,
      name: "Driver".into(),
      image: None,
      phone: None,
    }
  }

  #[test]
  fn state_accessors() {
    assert!(SessionState::Unknown.is_loading());
    assert!(!SessionState::Anonymous.is_loading());
    assert!(SessionState::Anonymous.user().is_none());

    let s = SessionState::Authenticated(Session {
      token: Credential::new("t"),
      user:  user(Role::Driver),
    });
    assert_eq!(s.role(), Some(Role::Driver));
    assert_eq!(s.user().unwrap().email, "d@x.com");
  }

  #[test]
  fn user_ignores_unknown_profile_fields() {
    let u: User = serde_json::from_value(serde_json::json!({
      "email": "a@x.com",
      "role": "agent_admin",
      "name": "Agent",
      "gender": "F",
      "branch": "Nairobi"
    }))
    .unwrap();
    assert_eq!(u.role, Role::AgentAdmin);
    assert!(u.image.is_none());
  }
}
