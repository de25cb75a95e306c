//! Store configuration.
//!
//! Loaded from an optional TOML file layered with `QUILL_*` environment
//! variables, e.g. `QUILL_PATH=/var/lib/quill.db`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// The path that selects an in-memory database.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// Database file, or `:memory:`.
  pub path:               PathBuf,
  /// Cap applied to timeline reads when the caller passes no limit.
  pub timeline_limit:     usize,
  /// Cap applied to search results when the query carries no limit.
  pub search_limit:       usize,
  /// Buffer size of the default channel broadcaster.
  pub broadcast_capacity: usize,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      path:               PathBuf::from(IN_MEMORY),
      timeline_limit:     500,
      search_limit:       100,
      broadcast_capacity: 256,
    }
  }
}

impl StoreConfig {
  /// Read `file` (if it exists) and then the environment.
  pub fn load(file: impl AsRef<Path>) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file.as_ref().to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("QUILL"))
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  /// Configuration for a database file at `path`, other settings defaulted.
  pub fn at(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into(), ..Self::default() }
  }

  pub fn is_in_memory(&self) -> bool { self.path.as_os_str() == IN_MEMORY }
}
