//! Parcel operations as views call them.
//!
//! [`ParcelWorkflow`] is the one place where a view's intent meets the
//! lifecycle rules and the backend. Every call reads the caller from the
//! session, applies the rules optimistically, sends the request, and then
//! reconciles with what the backend reports.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
  Error, Result,
  backend::{AuthBackend, Driver, ParcelBackend, ParcelFilter},
  credential::CredentialStore,
  lifecycle::{self, Trigger},
  parcel::{NewParcel, Parcel, ParcelStatus, Status},
  report::DailyReport,
  role::Role,
  session::{Session, SessionManager},
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// What assigning a driver does to the parcel's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentFlow {
  /// The parcel stays `Registered` until the driver releases it.
  #[default]
  ReleaseByDriver,
  /// Older flow: assignment moves the parcel straight to `In Transit`.
  /// Deprecated; kept for branches whose drivers never release parcels.
  DirectToTransit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct WorkflowConfig {
  #[serde(default)]
  pub assignment_flow: AssignmentFlow,
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// A status change the backend accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
  /// The server's record when `reconciled`, otherwise the optimistic copy.
  pub parcel:     Parcel,
  /// Whether the recipient was notified. A failed notification never fails
  /// the transition.
  pub notified:   bool,
  /// False when the follow-up fetch failed; re-fetch before trusting
  /// `parcel`.
  pub reconciled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentOutcome {
  pub message:    String,
  /// Present only when the assignment also moved the parcel.
  pub transition: Option<TransitionOutcome>,
}

// ─── Workflow ────────────────────────────────────────────────────────────────

pub struct ParcelWorkflow<A, C, P> {
  session: Arc<SessionManager<A, C>>,
  backend: P,
  config:  WorkflowConfig,
}

impl<A, C, P> ParcelWorkflow<A, C, P>
where
  A: AuthBackend,
  C: CredentialStore,
  P: ParcelBackend,
{
  pub fn new(
    session: Arc<SessionManager<A, C>>,
    backend: P,
    config: WorkflowConfig,
  ) -> Self {
    Self { session, backend, config }
  }

  pub fn session(&self) -> &SessionManager<A, C> { &self.session }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub async fn list(&self, filter: &ParcelFilter) -> Result<Vec<Parcel>> {
    let session = self.session.require_session()?;
    self.backend.list_parcels(&session.token, filter).await
  }

  /// The parcels that belong on the caller's own dashboard: a driver's
  /// assignments or a customer's orders. Admins see everything.
  pub async fn my_parcels(&self) -> Result<Vec<Parcel>> {
    let session = self.session.require_session()?;
    let email = session.user.email.clone();
    let filter = match session.user.role {
      Role::Driver => ParcelFilter {
        driver_email: Some(email),
        ..ParcelFilter::default()
      },
      Role::User => ParcelFilter {
        customer_email: Some(email),
        ..ParcelFilter::default()
      },
      Role::AgentAdmin | Role::MainAdmin => ParcelFilter::default(),
    };
    self.backend.list_parcels(&session.token, &filter).await
  }

  pub async fn get(&self, id: i64) -> Result<Parcel> {
    let session = self.session.require_session()?;
    self.backend.get_parcel(&session.token, id).await
  }

  pub async fn drivers(&self) -> Result<Vec<Driver>> {
    let session = self.session.require_role(&[Role::AgentAdmin, Role::MainAdmin])?;
    self.backend.list_drivers(&session.token).await
  }

  /// Public lookup by tracking number. Works without a session.
  pub async fn track(&self, parcel_number: &str) -> Result<Parcel> {
    let parcel_number = parcel_number.trim();
    if parcel_number.is_empty() {
      return Err(Error::Validation("Enter a tracking number.".to_string()));
    }
    self.backend.track_parcel(parcel_number).await
  }

  /// Parcels registered on `date`, with their counts per status.
  pub async fn daily_report(&self, date: NaiveDate) -> Result<DailyReport> {
    let session = self.session.require_role(&[Role::AgentAdmin, Role::MainAdmin])?;
    let parcels = self.backend.daily_parcels(&session.token, date).await?;
    Ok(DailyReport::new(date, parcels))
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// Validate, price, and submit a new parcel.
  pub async fn register(&self, parcel: NewParcel) -> Result<Parcel> {
    let session = self.session.require_session()?;
    if !lifecycle::can_register(session.user.role) {
      return Err(Error::Unauthorized(format!(
        "role {} may not register parcels",
        session.user.role
      )));
    }
    parcel.validate()?;
    let parcel = parcel.priced();

    let created = self.backend.register_parcel(&session.token, &parcel).await?;
    tracing::info!(
      id = created.id,
      parcel_number = %created.parcel_number,
      cost = created.cost,
      "parcel registered"
    );
    Ok(created)
  }

  /// Move `parcel` to `target` on behalf of the current caller.
  ///
  /// The assignment edge into `In Transit` is not reachable from here; it is
  /// taken only by [`Self::assign`] under [`AssignmentFlow::DirectToTransit`],
  /// where a driver is linked first.
  pub async fn advance(
    &self,
    parcel: &Parcel,
    target: ParcelStatus,
  ) -> Result<TransitionOutcome> {
    let session = self.session.require_session()?;
    let edge = lifecycle::check_status(session.user.role, &parcel.status, target)?;
    if edge.trigger == Trigger::Assignment {
      return Err(Error::InvalidTransition {
        from: parcel.status.to_string(),
        to:   target,
      });
    }
    self.apply(&session, parcel, target).await
  }

  async fn apply(
    &self,
    session: &Session,
    parcel: &Parcel,
    target: ParcelStatus,
  ) -> Result<TransitionOutcome> {
    let optimistic = lifecycle::transition(parcel, target, session.user.role)?;

    let update = self
      .backend
      .update_parcel_status(&session.token, parcel.id, target)
      .await?;
    if !update.success {
      return Err(Error::Server(
        update
          .message
          .unwrap_or_else(|| "Failed to update status".to_string()),
      ));
    }
    if !update.email_sent {
      tracing::warn!(id = parcel.id, status = %target, "recipient not notified");
    }

    let (parcel, reconciled) =
      match self.backend.get_parcel(&session.token, parcel.id).await {
        Ok(fresh) => {
          if fresh.status != Status::Known(target) {
            tracing::info!(
              id = fresh.id,
              expected = %target,
              actual = %fresh.status,
              "server status differs from optimistic update"
            );
          }
          (fresh, true)
        }
        Err(e) => {
          tracing::warn!(id = parcel.id, error = %e, "could not re-fetch parcel");
          (optimistic, false)
        }
      };

    tracing::info!(id = parcel.id, status = %target, "parcel status updated");
    Ok(TransitionOutcome { parcel, notified: update.email_sent, reconciled })
  }

  /// Admin override or driver confirmation, whichever the caller is allowed.
  pub async fn confirm_delivery(&self, parcel: &Parcel) -> Result<TransitionOutcome> {
    self.advance(parcel, ParcelStatus::Delivered).await
  }

  /// Link `driver_id` to a registered parcel.
  ///
  /// Under [`AssignmentFlow::DirectToTransit`] the parcel is then advanced to
  /// `In Transit`; if that step fails the error is returned even though the
  /// driver link was recorded.
  pub async fn assign(
    &self,
    parcel: &Parcel,
    driver_id: i64,
  ) -> Result<AssignmentOutcome> {
    let session = self.session.require_role(&[Role::AgentAdmin])?;
    if parcel.status != Status::Known(ParcelStatus::Registered) {
      return Err(Error::InvalidTransition {
        from: parcel.status.to_string(),
        to:   ParcelStatus::InTransit,
      });
    }

    let ack = self
      .backend
      .assign_parcel(&session.token, parcel.id, driver_id)
      .await?;
    tracing::info!(id = parcel.id, driver_id, "driver assigned");

    let transition = match self.config.assignment_flow {
      AssignmentFlow::ReleaseByDriver => None,
      AssignmentFlow::DirectToTransit => {
        Some(self.apply(&session, parcel, ParcelStatus::InTransit).await?)
      }
    };
    Ok(AssignmentOutcome { message: ack.message, transition })
  }
}
