//! Caller roles.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// The role attached to an authenticated user. Decides which parcel
/// transitions the caller may perform.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
  /// System administrator.
  MainAdmin,
  /// Branch administrator: registers, assigns, and force-confirms parcels.
  AgentAdmin,
  Driver,
  /// End customer.
  User,
}

impl Role {
  pub fn is_admin(self) -> bool {
    matches!(self, Self::MainAdmin | Self::AgentAdmin)
  }
}
