//! Status counts for report screens.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use strum::IntoEnumIterator;

use crate::parcel::{Parcel, ParcelStatus, Status};

/// How many parcels sit at each pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSummary {
  /// Every known status is present, zero or not, in pipeline order.
  pub counts: BTreeMap<ParcelStatus, usize>,
  /// Rows whose status label is not part of the pipeline.
  pub legacy: usize,
}

impl StatusSummary {
  pub fn from_parcels(parcels: &[Parcel]) -> Self {
    let mut counts: BTreeMap<ParcelStatus, usize> =
      ParcelStatus::iter().map(|s| (s, 0)).collect();
    let mut legacy = 0;
    for p in parcels {
      match p.status {
        Status::Known(s) => *counts.entry(s).or_default() += 1,
        Status::Legacy(_) => legacy += 1,
      }
    }
    Self { counts, legacy }
  }

  pub fn total(&self) -> usize { self.counts.values().sum::<usize>() + self.legacy }

  /// Parcels not yet delivered.
  pub fn open(&self) -> usize {
    self
      .counts
      .iter()
      .filter(|(s, _)| !s.is_terminal())
      .map(|(_, n)| n)
      .sum()
  }
}

/// One day's registrations, as shown on the admin daily report.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyReport {
  pub date:    NaiveDate,
  pub summary: StatusSummary,
  pub parcels: Vec<Parcel>,
}

impl DailyReport {
  /// `parcels` are taken as the backend returned them for `date`; which day a
  /// row belongs to is the backend's call.
  pub fn new(date: NaiveDate, parcels: Vec<Parcel>) -> Self {
    let summary = StatusSummary::from_parcels(&parcels);
    Self { date, summary, parcels }
  }

  /// Parcels that reached `Delivered` among the day's registrations.
  pub fn delivered(&self) -> usize {
    self.summary.counts.get(&ParcelStatus::Delivered).copied().unwrap_or(0)
  }
}
