//! Layered configuration: `courier.toml`, then `COURIER_*` variables, then
//! command-line flags.

use std::{path::Path, time::Duration};

use anyhow::Context as _;
use courier_client::{ApiConfig, DEFAULT_BASE_URL};
use courier_core::workflow::{AssignmentFlow, WorkflowConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  #[serde(default = "default_base_url")]
  pub base_url:        String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs:    u64,
  #[serde(default)]
  pub assignment_flow: AssignmentFlow,
}

fn default_base_url() -> String { DEFAULT_BASE_URL.to_string() }

fn default_timeout_secs() -> u64 { 30 }

impl Settings {
  /// `url` comes from `--url` and wins over everything else.
  pub fn load(file: &Path, url: Option<String>) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(config::Environment::with_prefix("COURIER").try_parsing(true))
      .set_override_option("base_url", url)
      .context("applying --url")?
      .build()
      .with_context(|| format!("failed to read config file {}", file.display()))?;

    let settings: Self = settings
      .try_deserialize()
      .context("failed to deserialise settings")?;
    if settings.timeout_secs == 0 {
      anyhow::bail!("timeout_secs must be at least 1");
    }
    Ok(settings)
  }

  pub fn api(&self) -> ApiConfig {
    ApiConfig {
      base_url: self.base_url.clone(),
      timeout:  Duration::from_secs(self.timeout_secs),
    }
  }

  pub fn workflow(&self) -> WorkflowConfig {
    WorkflowConfig { assignment_flow: self.assignment_flow }
  }
}
