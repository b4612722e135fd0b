//! One function per subcommand. Output goes to stdout; logs go to stderr.

use anyhow::{Context as _, bail};
use chrono::{NaiveDate, Utc};
use courier_core::{
  backend::ParcelFilter,
  lifecycle,
  parcel::{DEFAULT_CATEGORY, NewParcel, Parcel, ParcelStatus, Status},
  report::StatusSummary,
  session::{RestoreOutcome, SessionState},
  workflow::TransitionOutcome,
};
use strum::IntoEnumIterator;

use crate::{Command, RegisterArgs, Workflow};

pub async fn run(workflow: &Workflow, command: Command) -> anyhow::Result<()> {
  match &command {
    Command::Login { email, password } => return login(workflow, email, password).await,
    Command::Logout => {
      workflow.session().logout();
      println!("unset COURIER_TOKEN");
      return Ok(());
    }
    Command::Track { number } => return track(workflow, number).await,
    _ => {}
  }

  restore(workflow).await?;

  match command {
    Command::Login { .. } | Command::Logout | Command::Track { .. } => Ok(()),
    Command::Whoami => whoami(workflow),
    Command::Parcels { status, driver, customer, all } => {
      parcels(workflow, status, driver, customer, all).await
    }
    Command::Show { id } => show(workflow, id).await,
    Command::Drivers => drivers(workflow).await,
    Command::Register(args) => register(workflow, args).await,
    Command::Assign { parcel, driver } => assign(workflow, parcel, driver).await,
    Command::Advance { parcel, status } => advance(workflow, parcel, status).await,
    Command::Deliver { parcel } => {
      let parcel = workflow.get(parcel).await?;
      let outcome = workflow.confirm_delivery(&parcel).await?;
      print_outcome(&outcome);
      Ok(())
    }
    Command::Next { status } => next(workflow, status),
    Command::Summary { date: None } => summary(workflow).await,
    Command::Summary { date: Some(date) } => daily(workflow, date).await,
  }
}

/// Settle the session from `COURIER_TOKEN` before any command that needs it.
async fn restore(workflow: &Workflow) -> anyhow::Result<()> {
  match workflow.session().restore_session().await {
    RestoreOutcome::Restored(user) => {
      tracing::debug!(email = %user.email, "token accepted");
      Ok(())
    }
    RestoreOutcome::NoCredential => {
      bail!("not signed in; run `courier login` and export COURIER_TOKEN")
    }
    RestoreOutcome::Rejected(e) => {
      Err(e).context("COURIER_TOKEN was rejected; run `courier login` again")
    }
    RestoreOutcome::AlreadySettled => Ok(()),
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

async fn login(workflow: &Workflow, email: &str, password: &str) -> anyhow::Result<()> {
  let session = workflow.session();
  let redirect = session.login(email, password).await?;
  let Some(current) = session.state().session().cloned() else {
    bail!("signed out before login completed");
  };
  // A comment line keeps the output safe to `eval`.
  println!(
    "# signed in as {} ({}); home {redirect}",
    current.user.email, current.user.role
  );
  println!("export COURIER_TOKEN={}", current.token.as_str());
  Ok(())
}

fn whoami(workflow: &Workflow) -> anyhow::Result<()> {
  match workflow.session().state() {
    SessionState::Authenticated(s) => {
      let name = if s.user.name.is_empty() { "-" } else { s.user.name.as_str() };
      println!("{}  {}  {}", s.user.email, s.user.role, name);
    }
    SessionState::Anonymous | SessionState::Unknown => println!("not signed in"),
  }
  Ok(())
}

// ─── Parcels ─────────────────────────────────────────────────────────────────

async fn parcels(
  workflow: &Workflow,
  status: Option<ParcelStatus>,
  driver: Option<String>,
  customer: Option<String>,
  all: bool,
) -> anyhow::Result<()> {
  let mut rows = if all {
    workflow
      .list(&ParcelFilter { status, ..ParcelFilter::default() })
      .await?
  } else if driver.is_some() || customer.is_some() {
    let filter = ParcelFilter {
      status,
      driver_email: driver,
      customer_email: customer,
    };
    workflow.list(&filter).await?
  } else {
    workflow.my_parcels().await?
  };

  // The assignment and order endpoints ignore `status`.
  if let Some(status) = status {
    rows.retain(|p| p.status == Status::Known(status));
  }

  if rows.is_empty() {
    println!("no parcels");
  }
  for p in &rows {
    print_row(p);
  }
  Ok(())
}

async fn show(workflow: &Workflow, id: i64) -> anyhow::Result<()> {
  let p = workflow.get(id).await?;
  println!("{} (#{})", p.parcel_number, p.id);
  println!("  status       {}", p.status);
  if let Some(step) = p.status.step_index() {
    println!("  progress     {}/{}", step + 1, lifecycle::step_count());
  }
  println!("  sender       {} {} {}", p.sender_name, p.sender_phone, p.sender_email);
  println!("  recipient    {} {}", p.recipient_name, p.recipient_phone);
  println!("  route        {} to {}", p.pickup_location, p.destination);
  println!("  weight       {} kg ({})", p.parcel_weight, p.category);
  println!("  cost         {:.2}", p.cost);
  if let Some(driver) = p.driver_id {
    let vehicle = p.vehicle.as_deref().unwrap_or("-");
    println!("  driver       #{driver} {vehicle}");
  }
  if let Some(tx) = &p.mpesa_transaction_id {
    println!("  payment      {tx}");
  }
  println!("  registered   {}", p.created_at.format("%Y-%m-%d %H:%M"));
  println!("  updated      {}", p.updated_at.format("%Y-%m-%d %H:%M"));

  if let (Some(role), Some(current)) = (workflow.session().role(), p.status.known()) {
    let next = lifecycle::allowed_next_statuses_for(role, current);
    if !next.is_empty() {
      println!("  next         {}", join(&next));
    }
  }
  Ok(())
}

async fn track(workflow: &Workflow, number: &str) -> anyhow::Result<()> {
  let p = workflow.track(number).await?;
  println!("{}  {}", p.parcel_number, p.status);
  if let Some(step) = p.status.step_index() {
    let bar: Vec<String> = ParcelStatus::iter()
      .map(|s| {
        if s.step_index() <= step { format!("[{s}]") } else { s.to_string() }
      })
      .collect();
    println!("  {}/{}  {}", step + 1, lifecycle::step_count(), bar.join(" > "));
  }
  println!("  {} to {}", p.pickup_location, p.destination);
  println!("  updated {}", p.updated_at.format("%Y-%m-%d %H:%M"));
  Ok(())
}

async fn drivers(workflow: &Workflow) -> anyhow::Result<()> {
  for d in workflow.drivers().await? {
    println!(
      "{:>5}  {:<24}  {:<28}  {}",
      d.id,
      d.name,
      d.email,
      d.vehicle.as_deref().unwrap_or("-")
    );
  }
  Ok(())
}

async fn register(workflow: &Workflow, args: RegisterArgs) -> anyhow::Result<()> {
  let form = NewParcel {
    sender_name: args.sender_name,
    sender_phone: args.sender_phone,
    sender_email: args.sender_email,
    recipient_name: args.recipient_name,
    recipient_phone: args.recipient_phone,
    pickup_location: args.pickup,
    destination: args.destination,
    parcel_weight: args.weight,
    category: args
      .category
      .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
    service_type: args.service,
    mpesa_transaction_id: args.mpesa,
    ..NewParcel::blank(Utc::now())
  };

  if args.quote_only {
    form.validate()?;
    println!("{} {:.2}", form.service_type, form.quote());
    return Ok(());
  }

  let created = workflow.register(form).await?;
  println!(
    "registered {} (#{}) cost {:.2}",
    created.parcel_number, created.id, created.cost
  );
  Ok(())
}

async fn assign(workflow: &Workflow, parcel: i64, driver: i64) -> anyhow::Result<()> {
  let parcel = workflow.get(parcel).await?;
  let outcome = workflow.assign(&parcel, driver).await?;
  println!("{}", outcome.message);
  if let Some(t) = &outcome.transition {
    print_outcome(t);
  }
  Ok(())
}

async fn advance(
  workflow: &Workflow,
  parcel: i64,
  status: ParcelStatus,
) -> anyhow::Result<()> {
  let parcel = workflow.get(parcel).await?;
  let outcome = workflow.advance(&parcel, status).await?;
  print_outcome(&outcome);
  Ok(())
}

fn next(workflow: &Workflow, status: ParcelStatus) -> anyhow::Result<()> {
  let Some(role) = workflow.session().role() else {
    bail!("not signed in");
  };
  let next = lifecycle::allowed_next_statuses_for(role, status);
  if next.is_empty() {
    println!("none");
  } else {
    println!("{}", join(&next));
  }
  Ok(())
}

async fn summary(workflow: &Workflow) -> anyhow::Result<()> {
  let summary = StatusSummary::from_parcels(&workflow.my_parcels().await?);
  for (status, n) in &summary.counts {
    println!("{:<17} {n:>5}", status.to_string());
  }
  if summary.legacy > 0 {
    println!("{:<17} {:>5}", "(other)", summary.legacy);
  }
  println!("{:<17} {:>5}", "open", summary.open());
  println!("{:<17} {:>5}", "total", summary.total());
  Ok(())
}

async fn daily(workflow: &Workflow, date: NaiveDate) -> anyhow::Result<()> {
  let report = workflow.daily_report(date).await?;
  println!("{}", report.date);
  println!("{:<17} {:>5}", "registered", report.parcels.len());
  println!("{:<17} {:>5}", "delivered", report.delivered());
  println!("{:<17} {:>5}", "open", report.summary.open());
  for p in &report.parcels {
    print_row(p);
  }
  Ok(())
}

// ─── Output ──────────────────────────────────────────────────────────────────

fn print_row(p: &Parcel) {
  println!(
    "{:>5}  {:<20}  {:<17}  {:<20}  {:<20}  {}",
    p.id,
    p.parcel_number,
    p.status.to_string(),
    p.sender_name,
    p.recipient_name,
    p.destination
  );
}

fn print_outcome(outcome: &TransitionOutcome) {
  let p = &outcome.parcel;
  println!("{} (#{}) is now {}", p.parcel_number, p.id, p.status);
  if !outcome.notified {
    println!("  recipient was not notified");
  }
  if !outcome.reconciled {
    println!("  could not refresh from the server; run `courier show {}`", p.id);
  }
}

fn join(statuses: &[ParcelStatus]) -> String {
  statuses
    .iter()
    .map(ParcelStatus::to_string)
    .collect::<Vec<_>>()
    .join(", ")
}
