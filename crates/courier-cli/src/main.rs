//! `courier`: command-line console for the courier backend.
//!
//! # Usage
//!
//! ```sh
//! eval "$(courier login --email agent@example.com --password secret)"
//! courier parcels --status "In Transit"
//! courier advance 42 "Out for Delivery"
//! courier track PARCEL-1700000000000
//! ```
//!
//! The session token is handed back as an `export COURIER_TOKEN=…` line and
//! read from that variable on every later invocation.

mod commands;
mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use courier_client::HttpBackend;
use courier_core::{
  credential::{Credential, MemoryCredentialStore, StoredCredential},
  parcel::{ParcelStatus, ServiceType},
  session::SessionManager,
  workflow::ParcelWorkflow,
};
use settings::Settings;
use strum::IntoEnumIterator;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub type Workflow = ParcelWorkflow<HttpBackend, MemoryCredentialStore, HttpBackend>;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "courier", version, about = "Courier console")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "courier.toml")]
  config: PathBuf,

  /// Base URL of the courier API (default: http://localhost:3000).
  #[arg(long, global = true)]
  url: Option<String>,

  /// Session token from a previous `courier login`.
  #[arg(long, env = "COURIER_TOKEN", global = true, hide_env_values = true)]
  token: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Sign in and print the token as a shell `export` line.
  Login {
    #[arg(long)]
    email:    String,
    #[arg(long, env = "COURIER_PASSWORD", hide_env_values = true)]
    password: String,
  },
  /// Forget the current token.
  Logout,
  /// Show the signed-in user.
  Whoami,
  /// List parcels. Without filters, lists the caller's own parcels.
  Parcels {
    #[arg(long, value_parser = parse_status)]
    status:   Option<ParcelStatus>,
    /// Parcels assigned to this driver.
    #[arg(long, value_name = "EMAIL", conflicts_with = "customer")]
    driver:   Option<String>,
    /// Orders placed by this customer.
    #[arg(long, value_name = "EMAIL")]
    customer: Option<String>,
    /// Every parcel, regardless of role.
    #[arg(long, conflicts_with_all = ["driver", "customer"])]
    all:      bool,
  },
  /// Show one parcel and the statuses the caller may move it to.
  Show { id: i64 },
  /// List drivers available for assignment.
  Drivers,
  /// Register a new parcel.
  Register(RegisterArgs),
  /// Assign a driver to a registered parcel.
  Assign { parcel: i64, driver: i64 },
  /// Move a parcel to a later status.
  Advance {
    parcel: i64,
    #[arg(value_parser = parse_status)]
    status: ParcelStatus,
  },
  /// Confirm a parcel as delivered.
  Deliver { parcel: i64 },
  /// Statuses the caller may move a parcel at STATUS to.
  Next {
    #[arg(value_parser = parse_status)]
    status: ParcelStatus,
  },
  /// Status and progress of a parcel by its tracking number. Needs no token.
  Track { number: String },
  /// Parcel counts per status.
  Summary {
    /// Report on parcels registered that day (YYYY-MM-DD) instead.
    #[arg(long)]
    date: Option<NaiveDate>,
  },
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
  #[arg(long)]
  pub sender_name:     String,
  #[arg(long)]
  pub sender_phone:    String,
  #[arg(long)]
  pub sender_email:    String,
  #[arg(long)]
  pub recipient_name:  String,
  #[arg(long)]
  pub recipient_phone: String,
  #[arg(long)]
  pub pickup:          String,
  #[arg(long)]
  pub destination:     String,
  /// Weight in kilograms.
  #[arg(long)]
  pub weight:          f64,
  #[arg(long)]
  pub category:        Option<String>,
  #[arg(long, default_value_t = ServiceType::Standard)]
  pub service:         ServiceType,
  #[arg(long)]
  pub mpesa:           Option<String>,
  /// Print the price and exit without registering.
  #[arg(long)]
  pub quote_only:      bool,
}

/// Accepts the display label (`"In Transit"`) or a loose spelling of it
/// (`in-transit`, `IN_TRANSIT`).
fn parse_status(s: &str) -> Result<ParcelStatus, String> {
  if let Ok(status) = s.parse() {
    return Ok(status);
  }
  let wanted = normalize(s);
  ParcelStatus::iter()
    .find(|st| normalize(st.as_ref()) == wanted)
    .ok_or_else(|| {
      let known: Vec<_> = ParcelStatus::iter().map(|st| st.to_string()).collect();
      format!("unknown status {s:?}; expected one of: {}", known.join(", "))
    })
}

fn normalize(s: &str) -> String {
  s.chars()
    .filter(|c| !matches!(c, ' ' | '-' | '_'))
    .flat_map(char::to_lowercase)
    .collect()
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config, cli.url.clone())?;
  tracing::debug!(?settings, "configuration loaded");

  let backend =
    HttpBackend::new(settings.api()).context("failed to build HTTP client")?;

  // The token from the environment stands in for persisted storage.
  let store = match cli.token.as_deref().map(str::trim) {
    Some(token) if !token.is_empty() => MemoryCredentialStore::with(StoredCredential {
      token: Credential::new(token),
      email: String::new(),
    }),
    _ => MemoryCredentialStore::new(),
  };
  let session = Arc::new(SessionManager::new(backend.clone(), store));
  let workflow = ParcelWorkflow::new(session, backend, settings.workflow());

  commands::run(&workflow, cli.command).await
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory;

  use super::*;

  #[test]
  fn cli_definition_is_consistent() { Cli::command().debug_assert(); }

  #[test]
  fn status_parsing_is_lenient() {
    assert_eq!(parse_status("In Transit"), Ok(ParcelStatus::InTransit));
    assert_eq!(parse_status("in-transit"), Ok(ParcelStatus::InTransit));
    assert_eq!(parse_status("OUT_FOR_DELIVERY"), Ok(ParcelStatus::OutForDelivery));
    assert_eq!(parse_status("delivered"), Ok(ParcelStatus::Delivered));
    assert!(parse_status("Arrived").is_err());
  }

  #[test]
  fn advance_takes_parcel_and_status() {
    let cli =
      Cli::try_parse_from(["courier", "advance", "42", "Out for Delivery"]).unwrap();
    match cli.command {
      Command::Advance { parcel, status } => {
        assert_eq!(parcel, 42);
        assert_eq!(status, ParcelStatus::OutForDelivery);
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn summary_date_is_parsed() {
    let cli = Cli::try_parse_from(["courier", "summary", "--date", "2024-03-01"]).unwrap();
    match cli.command {
      Command::Summary { date } => assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 1)),
      other => panic!("unexpected {other:?}"),
    }
    assert!(Cli::try_parse_from(["courier", "summary", "--date", "yesterday"]).is_err());
  }

  #[test]
  fn driver_and_customer_filters_conflict() {
    let r = Cli::try_parse_from([
      "courier", "parcels", "--driver", "d@x.com", "--customer", "c@x.com",
    ]);
    assert!(r.is_err());
  }
}
