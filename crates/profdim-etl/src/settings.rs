//! Layered configuration: defaults, TOML file, `PROFDIM_*` environment, then
//! command-line flags.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use profdim_core::run::ModeSelection;
use serde::{Deserialize, Deserializer};

pub const DEFAULT_SOURCE: &str = "professionals_nested.json";
pub const DEFAULT_STORE_PATH: &str = "professionals_dimensional.db";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EtlSettings {
  /// The nested professionals document.
  pub source:     PathBuf,
  /// SQLite database holding the dimensional tables.
  pub store_path: PathBuf,
  #[serde(deserialize_with = "parse_mode")]
  pub mode:       ModeSelection,
}

/// Values given on the command line. `None` leaves the lower layers in place.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
  pub source:     Option<PathBuf>,
  pub store_path: Option<PathBuf>,
  pub mode:       Option<ModeSelection>,
}

impl EtlSettings {
  /// Resolve settings from `config_file` (optional) and the process
  /// environment, with `overrides` taking precedence.
  pub fn load(config_file: &Path, overrides: Overrides) -> Result<Self, ConfigError> {
    Self::from_sources(config_file, Environment::with_prefix("PROFDIM"), overrides)
  }

  fn from_sources(
    config_file: &Path,
    environment: Environment,
    overrides: Overrides,
  ) -> Result<Self, ConfigError> {
    let settings: Self = Config::builder()
      .set_default("source", DEFAULT_SOURCE)?
      .set_default("store_path", DEFAULT_STORE_PATH)?
      .set_default("mode", ModeSelection::Auto.to_string())?
      .add_source(File::from(config_file).required(false))
      .add_source(environment)
      .set_override_option("source", overrides.source.as_deref().map(path_value))?
      .set_override_option("store_path", overrides.store_path.as_deref().map(path_value))?
      .set_override_option("mode", overrides.mode.map(|m| m.to_string()))?
      .build()?
      .try_deserialize()?;

    Ok(Self {
      source: expand_tilde(&settings.source),
      store_path: expand_tilde(&settings.store_path),
      mode: settings.mode,
    })
  }
}

fn path_value(path: &Path) -> String { path.to_string_lossy().into_owned() }

fn parse_mode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ModeSelection, D::Error> {
  let raw = String::deserialize(deserializer)?;
  raw.parse().map_err(serde::de::Error::custom)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
