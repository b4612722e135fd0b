//! Parcel status transitions and the roles allowed to perform them.
//!
//! Every view that mutates a parcel consults this table; none of them decide
//! eligibility on their own. A status only ever moves forward along the
//! [`ParcelStatus`] order.
//!
//! Results computed here are optimistic. The backend has the final word and
//! callers reconcile with the record it returns.

use chrono::{DateTime, Utc};
use strum::IntoEnumIterator;

use crate::{
  Error, Result,
  parcel::{Parcel, ParcelStatus, Status},
  role::Role,
};

// ─── Table ───────────────────────────────────────────────────────────────────

/// What caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
  Registration,
  /// Admin assigns a driver and moves the parcel straight to transit.
  Assignment,
  /// Driver accepts an assigned parcel.
  Release,
  StartDelivery,
  OutForDelivery,
  ConfirmDelivery,
  /// Admin override; valid from any earlier stage.
  ManualConfirm,
}

/// Where an edge may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
  /// Parcel creation.
  Nothing,
  Exactly(ParcelStatus),
  /// Any status strictly before the target.
  AnyEarlier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
  pub from:       Origin,
  pub to:         ParcelStatus,
  pub roles:      &'static [Role],
  pub trigger:    Trigger,
  /// Still accepted, but never offered by [`allowed_next_statuses`].
  pub deprecated: bool,
}

impl Edge {
  fn starts_at(&self, from: ParcelStatus) -> bool {
    match self.from {
      Origin::Nothing => false,
      Origin::Exactly(s) => s == from,
      Origin::AnyEarlier => from < self.to,
    }
  }

  pub fn allows(&self, role: Role) -> bool { self.roles.contains(&role) }
}

const fn edge(
  from: Origin,
  to: ParcelStatus,
  roles: &'static [Role],
  trigger: Trigger,
) -> Edge {
  Edge { from, to, roles, trigger, deprecated: false }
}

pub const TRANSITIONS: &[Edge] = &[
  edge(
    Origin::Nothing,
    ParcelStatus::Registered,
    &[Role::AgentAdmin, Role::User],
    Trigger::Registration,
  ),
  // Assignment used to jump straight to transit; the driver-release path
  // below replaced it.
  Edge {
    deprecated: true,
    ..edge(
      Origin::Exactly(ParcelStatus::Registered),
      ParcelStatus::InTransit,
      &[Role::AgentAdmin],
      Trigger::Assignment,
    )
  },
  edge(
    Origin::Exactly(ParcelStatus::Registered),
    ParcelStatus::Released,
    &[Role::Driver],
    Trigger::Release,
  ),
  edge(
    Origin::Exactly(ParcelStatus::Released),
    ParcelStatus::InTransit,
    &[Role::Driver],
    Trigger::StartDelivery,
  ),
  edge(
    Origin::Exactly(ParcelStatus::InTransit),
    ParcelStatus::OutForDelivery,
    &[Role::Driver],
    Trigger::OutForDelivery,
  ),
  edge(
    Origin::Exactly(ParcelStatus::InTransit),
    ParcelStatus::Delivered,
    &[Role::Driver],
    Trigger::ConfirmDelivery,
  ),
  edge(
    Origin::Exactly(ParcelStatus::OutForDelivery),
    ParcelStatus::Delivered,
    &[Role::Driver],
    Trigger::ConfirmDelivery,
  ),
  edge(
    Origin::AnyEarlier,
    ParcelStatus::Delivered,
    &[Role::AgentAdmin],
    Trigger::ManualConfirm,
  ),
];

fn edges_between(
  from: ParcelStatus,
  to: ParcelStatus,
) -> impl Iterator<Item = &'static Edge> {
  TRANSITIONS
    .iter()
    .filter(move |e| e.to == to && e.starts_at(from))
}

// ─── Checks ──────────────────────────────────────────────────────────────────

/// Validate `from → to` for `role` and return the edge that authorises it.
///
/// Ordering is checked before authorisation: a backward or self transition is
/// [`Error::InvalidTransition`] whoever asks. A forward pair that no edge
/// covers is also invalid. Only when an edge exists but excludes `role` is the
/// result [`Error::Unauthorized`].
pub fn check(
  role: Role,
  from: ParcelStatus,
  to: ParcelStatus,
) -> Result<&'static Edge> {
  let invalid = || Error::InvalidTransition { from: from.to_string(), to };

  if to <= from {
    return Err(invalid());
  }

  let mut candidates = edges_between(from, to).peekable();
  if candidates.peek().is_none() {
    return Err(invalid());
  }

  candidates.find(|e| e.allows(role)).ok_or_else(|| {
    Error::Unauthorized(format!(
      "role {role} may not move a parcel from {from} to {to}"
    ))
  })
}

/// Like [`check`] but for a status as received from the backend. Legacy labels
/// have no place in the order, so nothing may leave them.
pub fn check_status(
  role: Role,
  from: &Status,
  to: ParcelStatus,
) -> Result<&'static Edge> {
  match from {
    Status::Known(from) => check(role, *from, to),
    Status::Legacy(label) => Err(Error::InvalidTransition {
      from: label.clone(),
      to,
    }),
  }
}

pub fn can_transition(role: Role, from: ParcelStatus, to: ParcelStatus) -> bool {
  to > from && edges_between(from, to).any(|e| e.allows(role))
}

/// Whether `role` may create parcels.
pub fn can_register(role: Role) -> bool {
  TRANSITIONS
    .iter()
    .any(|e| e.from == Origin::Nothing && e.allows(role))
}

/// Apply `to` to a copy of `parcel`, stamping `updated_at` with the current
/// time. The input is left untouched.
pub fn transition(parcel: &Parcel, to: ParcelStatus, role: Role) -> Result<Parcel> {
  transition_at(parcel, to, role, Utc::now())
}

pub fn transition_at(
  parcel: &Parcel,
  to: ParcelStatus,
  role: Role,
  now: DateTime<Utc>,
) -> Result<Parcel> {
  let edge = check_status(role, &parcel.status, to)?;
  if edge.deprecated {
    tracing::warn!(
      %role, from = %parcel.status, %to, trigger = ?edge.trigger,
      "deprecated parcel transition"
    );
  }
  Ok(Parcel {
    status: Status::Known(to),
    updated_at: now,
    ..parcel.clone()
  })
}

// ─── Queries for views ───────────────────────────────────────────────────────

/// Statuses reachable from `current` by any role, ascending. Deprecated edges
/// are left out.
pub fn allowed_next_statuses(current: ParcelStatus) -> Vec<ParcelStatus> {
  next_statuses(current, |_| true)
}

pub fn allowed_next_statuses_for(
  role: Role,
  current: ParcelStatus,
) -> Vec<ParcelStatus> {
  next_statuses(current, |e| e.allows(role))
}

fn next_statuses(
  current: ParcelStatus,
  keep: impl Fn(&Edge) -> bool,
) -> Vec<ParcelStatus> {
  ParcelStatus::iter()
    .filter(|to| *to > current)
    .filter(|to| {
      edges_between(current, *to).any(|e| !e.deprecated && keep(e))
    })
    .collect()
}

/// Number of stages in the pipeline; the denominator for [`step_index`].
pub fn step_count() -> usize { ParcelStatus::iter().count() }

/// Progress-bar position of a status label, or `None` for labels outside the
/// pipeline.
pub fn step_index(label: &str) -> Option<usize> {
  label.parse::<ParcelStatus>().ok().map(ParcelStatus::step_index)
}
