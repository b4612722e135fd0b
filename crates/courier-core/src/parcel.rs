//! Parcel records, statuses, and the registration form.
//!
//! The backend is the system of record. A [`Parcel`] held by the client is a
//! possibly-stale copy owned by whichever view fetched it.

use std::{fmt, sync::LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

/// The pipeline stages a parcel moves through, in order.
///
/// The derived `Ord` follows declaration order, which is the pipeline order;
/// [`ParcelStatus::step_index`] exposes the same order as an integer.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  AsRefStr,
)]
pub enum ParcelStatus {
  Registered,
  Released,
  #[serde(rename = "In Transit")]
  #[strum(serialize = "In Transit")]
  InTransit,
  #[serde(rename = "Out for Delivery")]
  #[strum(serialize = "Out for Delivery")]
  OutForDelivery,
  Delivered,
}

impl ParcelStatus {
  /// Position in the pipeline, starting at 0 for `Registered`.
  pub fn step_index(self) -> usize { self as usize }

  pub fn is_terminal(self) -> bool { self == Self::Delivered }
}

/// A status as received from the backend.
///
/// Older rows may carry labels this client does not know; those are kept
/// verbatim rather than failing the whole response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Status {
  Known(ParcelStatus),
  Legacy(String),
}

impl Status {
  pub fn known(&self) -> Option<ParcelStatus> {
    match self {
      Self::Known(s) => Some(*s),
      Self::Legacy(_) => None,
    }
  }

  /// `None` for legacy labels.
  pub fn step_index(&self) -> Option<usize> {
    self.known().map(ParcelStatus::step_index)
  }
}

impl From<ParcelStatus> for Status {
  fn from(s: ParcelStatus) -> Self { Self::Known(s) }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Known(s) => s.fmt(f),
      Self::Legacy(label) => f.write_str(label),
    }
  }
}

// ─── Parcel ──────────────────────────────────────────────────────────────────

/// A parcel as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
  /// Server-assigned; never changes.
  pub id:                   i64,
  /// Human-facing number generated by the registering client.
  pub parcel_number:        String,
  pub sender_name:          String,
  pub sender_phone:         String,
  #[serde(default)]
  pub sender_email:         String,
  pub recipient_name:       String,
  pub recipient_phone:      String,
  pub pickup_location:      String,
  pub destination:          String,
  pub parcel_weight:        f64,
  pub category:             String,
  pub cost:                 f64,
  pub status:               Status,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
  /// Payment reference returned by the mobile-money checkout.
  #[serde(default)]
  pub mpesa_transaction_id: Option<String>,
  #[serde(default)]
  pub driver_id:            Option<i64>,
  #[serde(default)]
  pub vehicle:              Option<String>,
}

// ─── Registration ────────────────────────────────────────────────────────────

/// Delivery speed chosen at registration; decides the base fee.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
pub enum ServiceType {
  #[default]
  Standard,
  Express,
}

impl ServiceType {
  pub fn base_fee(self) -> f64 {
    match self {
      Self::Standard => 100.0,
      Self::Express => 200.0,
    }
  }
}

/// Charged on top of the base fee for every kilogram.
pub const COST_PER_KG: f64 = 300.0;

pub const DEFAULT_CATEGORY: &str = "Documents";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

/// Input to [`crate::backend::ParcelBackend::register_parcel`].
///
/// `id`, `status`, and timestamps are assigned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewParcel {
  pub parcel_number:        String,
  pub sender_name:          String,
  pub sender_phone:         String,
  pub sender_email:         String,
  pub recipient_name:       String,
  pub recipient_phone:      String,
  pub pickup_location:      String,
  pub destination:          String,
  pub parcel_weight:        f64,
  pub category:             String,
  pub service_type:         ServiceType,
  /// Filled in by [`NewParcel::priced`] before submission.
  pub cost:                 f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mpesa_transaction_id: Option<String>,
}

impl NewParcel {
  /// A blank form with a fresh parcel number and default category.
  pub fn blank(now: DateTime<Utc>) -> Self {
    Self {
      parcel_number:        parcel_number_at(now),
      sender_name:          String::new(),
      sender_phone:         String::new(),
      sender_email:         String::new(),
      recipient_name:       String::new(),
      recipient_phone:      String::new(),
      pickup_location:      String::new(),
      destination:          String::new(),
      parcel_weight:        0.0,
      category:             DEFAULT_CATEGORY.to_string(),
      service_type:         ServiceType::default(),
      cost:                 0.0,
      mpesa_transaction_id: None,
    }
  }

  /// Base fee for the service type plus [`COST_PER_KG`] per kilogram.
  pub fn quote(&self) -> f64 {
    self.service_type.base_fee() + self.parcel_weight * COST_PER_KG
  }

  /// Returns the form with `cost` set from [`NewParcel::quote`].
  pub fn priced(mut self) -> Self {
    self.cost = self.quote();
    self
  }

  /// Check the fields the backend would otherwise reject.
  pub fn validate(&self) -> Result<()> {
    let required = [
      ("sender name", &self.sender_name),
      ("recipient name", &self.recipient_name),
      ("pickup location", &self.pickup_location),
      ("destination", &self.destination),
      ("parcel number", &self.parcel_number),
    ];
    if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
      return Err(Error::Validation(format!("{field} is required.")));
    }

    if !is_phone_number(&self.sender_phone)
      || !is_phone_number(&self.recipient_phone)
    {
      return Err(Error::Validation(
        "Phone numbers must be 10 digits.".to_string(),
      ));
    }

    if !EMAIL_RE.is_match(&self.sender_email) {
      return Err(Error::Validation(
        "Please enter a valid email address.".to_string(),
      ));
    }

    if !self.parcel_weight.is_finite() || self.parcel_weight <= 0.0 {
      return Err(Error::Validation(
        "Please enter a valid parcel weight.".to_string(),
      ));
    }

    Ok(())
  }
}

/// `PARCEL-<unix millis>`.
pub fn parcel_number_at(now: DateTime<Utc>) -> String {
  format!("PARCEL-{}", now.timestamp_millis())
}

/// Exactly ten ASCII digits.
pub fn is_phone_number(s: &str) -> bool {
  s.len() == 10 && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use strum::IntoEnumIterator;

  use super::*;

  fn form() -> NewParcel {
    NewParcel {
      sender_name: "Wanjiru Kamau".into(),
      sender_phone: "0712345678".into(),
      sender_email: "wanjiru@example.com".into(),
      recipient_name: "Otieno Odhiambo".into(),
      recipient_phone: "0798765432".into(),
      pickup_location: "Nairobi CBD".into(),
      destination: "Kisumu".into(),
      parcel_weight: 2.0,
      ..NewParcel::blank(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap())
    }
  }

  #[test]
  fn status_labels_round_trip_through_serde() {
    for s in ParcelStatus::iter() {
      let json = serde_json::to_string(&s).unwrap();
      assert_eq!(json, format!("\"{s}\""));
      let back: Status = serde_json::from_str(&json).unwrap();
      assert_eq!(back, Status::Known(s));
    }
  }

  #[test]
  fn unknown_status_label_is_kept_as_legacy() {
    let s: Status = serde_json::from_str("\"Arrived\"").unwrap();
    assert_eq!(s, Status::Legacy("Arrived".into()));
    assert_eq!(s.step_index(), None);
    assert_eq!(s.to_string(), "Arrived");
  }

  #[test]
  fn parcel_number_uses_millis() {
    let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
    assert_eq!(parcel_number_at(now), "PARCEL-1700000000123");
  }

  #[test]
  fn express_quote_adds_weight_charge() {
    let mut p = form();
    p.service_type = ServiceType::Express;
    assert_eq!(p.quote(), 800.0);
    assert_eq!(p.priced().cost, 800.0);
  }

  #[test]
  fn valid_form_passes() {
    assert!(form().validate().is_ok());
  }

  #[test]
  fn nine_digit_phone_is_rejected() {
    let mut p = form();
    p.recipient_phone = "071234567".into();
    assert_eq!(
      p.validate(),
      Err(Error::Validation("Phone numbers must be 10 digits.".into()))
    );
  }

  #[test]
  fn malformed_email_is_rejected() {
    let mut p = form();
    p.sender_email = "wanjiru@example".into();
    assert!(matches!(p.validate(), Err(Error::Validation(_))));
  }

  #[test]
  fn non_positive_weight_is_rejected() {
    let mut p = form();
    p.parcel_weight = 0.0;
    assert!(matches!(p.validate(), Err(Error::Validation(_))));
    p.parcel_weight = f64::NAN;
    assert!(matches!(p.validate(), Err(Error::Validation(_))));
  }

  #[test]
  fn blank_destination_is_rejected() {
    let mut p = form();
    p.destination = "  ".into();
    assert_eq!(
      p.validate(),
      Err(Error::Validation("destination is required.".into()))
    );
  }

  #[test]
  fn registration_payload_is_camel_case() {
    let json = serde_json::to_value(form().priced()).unwrap();
    assert_eq!(json["senderPhone"], "0712345678");
    assert_eq!(json["parcelWeight"], 2.0);
    assert_eq!(json["serviceType"], "Standard");
    assert!(json.get("mpesaTransactionId").is_none());
  }

  #[test]
  fn parcel_deserializes_server_row() {
    let row = serde_json::json!({
      "id": 7,
      "parcel_number": "PARCEL-1",
      "sender_name": "A",
      "sender_phone": "0712345678",
      "recipient_name": "B",
      "recipient_phone": "0798765432",
      "pickup_location": "Nairobi",
      "destination": "Mombasa",
      "parcel_weight": 1.5,
      "category": "Documents",
      "cost": 550.0,
      "status": "Out for Delivery",
      "created_at": "2024-03-01T08:00:00Z",
      "updated_at": "2024-03-02T08:00:00Z"
    });
    let parcel: Parcel = serde_json::from_value(row).unwrap();
    assert_eq!(parcel.status, Status::Known(ParcelStatus::OutForDelivery));
    assert_eq!(parcel.sender_email, "");
    assert!(parcel.mpesa_transaction_id.is_none());
  }
}
