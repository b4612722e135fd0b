//! Backend collaborator traits and their request/response types.
//!
//! Implemented by transports (e.g. `courier-client`). The session manager and
//! parcel workflow depend on these abstractions, not on any concrete backend.
//! Implementations map their failures onto the crate [`Error`](crate::Error)
//! taxonomy so callers handle every transport the same way.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  credential::Credential,
  parcel::{NewParcel, Parcel, ParcelStatus},
  session::User,
};

// ─── Auth ────────────────────────────────────────────────────────────────────

/// A successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
  pub token:         Credential,
  pub user:          User,
  /// Role-appropriate landing page chosen by the backend.
  #[serde(rename = "redirectPath")]
  pub redirect_path: String,
}

pub trait AuthBackend: Send + Sync {
  /// Exchange credentials for a token. Rejected credentials are
  /// [`Error::Unauthorized`](crate::Error::Unauthorized); anything else is
  /// [`Error::Server`](crate::Error::Server).
  fn login(
    &self,
    email: &str,
    password: &str,
  ) -> impl Future<Output = Result<LoginResponse>> + Send;

  /// Resolve a token to its user. An invalid or expired token is
  /// [`Error::Unauthorized`](crate::Error::Unauthorized).
  fn verify(
    &self,
    token: &Credential,
  ) -> impl Future<Output = Result<User>> + Send;
}

// ─── Parcels ─────────────────────────────────────────────────────────────────

/// Which parcels to list. Fields are alternatives, checked in the order
/// driver, customer, status; an empty filter lists everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParcelFilter {
  pub status:         Option<ParcelStatus>,
  /// Parcels assigned to the driver with this email.
  pub driver_email:   Option<String>,
  /// Orders placed by the customer with this email.
  pub customer_email: Option<String>,
}

impl ParcelFilter {
  pub fn with_status(status: ParcelStatus) -> Self {
    Self { status: Some(status), ..Self::default() }
  }
}

/// A driver available for assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
  pub id:      i64,
  pub name:    String,
  pub email:   String,
  #[serde(default)]
  pub phone:   Option<String>,
  #[serde(default)]
  pub vehicle: Option<String>,
}

/// Plain acknowledgement carrying a display message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
  #[serde(default)]
  pub message: String,
}

/// Result of a status update as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
  pub success:    bool,
  pub message:    Option<String>,
  /// Whether the recipient notification went out. Independent of `success`.
  pub email_sent: bool,
}

pub trait ParcelBackend: Send + Sync {
  fn list_parcels(
    &self,
    token: &Credential,
    filter: &ParcelFilter,
  ) -> impl Future<Output = Result<Vec<Parcel>>> + Send;

  /// Missing parcels are [`Error::NotFound`](crate::Error::NotFound).
  fn get_parcel(
    &self,
    token: &Credential,
    id: i64,
  ) -> impl Future<Output = Result<Parcel>> + Send;

  fn register_parcel(
    &self,
    token: &Credential,
    parcel: &NewParcel,
  ) -> impl Future<Output = Result<Parcel>> + Send;

  /// Link a driver to a parcel. Does not change the status by itself.
  fn assign_parcel(
    &self,
    token: &Credential,
    parcel_id: i64,
    driver_id: i64,
  ) -> impl Future<Output = Result<Ack>> + Send;

  fn update_parcel_status(
    &self,
    token: &Credential,
    parcel_id: i64,
    status: ParcelStatus,
  ) -> impl Future<Output = Result<StatusUpdate>> + Send;

  fn list_drivers(
    &self,
    token: &Credential,
  ) -> impl Future<Output = Result<Vec<Driver>>> + Send;

  /// Public lookup by the human-facing tracking number; needs no token. An
  /// unknown number is [`Error::NotFound`](crate::Error::NotFound).
  fn track_parcel(
    &self,
    parcel_number: &str,
  ) -> impl Future<Output = Result<Parcel>> + Send;

  /// Parcels registered on `date`.
  fn daily_parcels(
    &self,
    token: &Credential,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Parcel>>> + Send;
}
