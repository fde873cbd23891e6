//! Declarative queue configuration.
//!
//! ```yaml
//! name: ingest
//! capacity: 128   # omit or set to null for an unbounded queue
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, QueueError};

/// Settings used by [`BoundedBlockingQueue::from_config`](crate::BoundedBlockingQueue::from_config).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
  /// Maximum number of resident items. `None` means unbounded.
  #[serde(default)]
  pub capacity: Option<usize>,
  /// Label attached to the queue's log events.
  #[serde(default)]
  pub name: Option<String>,
}

impl QueueConfig {
  /// A configuration for a queue holding at most `capacity` items.
  pub fn bounded(capacity: usize) -> Self {
    Self {
      capacity: Some(capacity),
      name: None,
    }
  }

  /// A configuration for an unbounded queue.
  pub fn unbounded() -> Self {
    Self::default()
  }

  /// Sets the label used in log events.
  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Parses and validates a YAML document.
  pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
    let config: QueueConfig = serde_yaml::from_str(text)?;
    config.validate()?;
    Ok(config)
  }

  /// Reads, parses and validates a YAML file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let text = fs::read_to_string(path)?;
    Self::from_yaml_str(&text)
  }

  /// Checks that the configuration describes a constructible queue.
  pub fn validate(&self) -> Result<(), QueueError> {
    match self.capacity {
      Some(0) => Err(QueueError::InvalidCapacity { capacity: 0 }),
      _ => Ok(()),
    }
  }

  /// The capacity to build with, `usize::MAX` standing in for unbounded.
  pub(crate) fn effective_capacity(&self) -> usize {
    self.capacity.unwrap_or(usize::MAX)
  }
}
