//! Rebuild tuning knobs, deserialised from the `[rebuild]` table of the
//! binary's configuration.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebuildConfig {
  /// Rows per bulk-insert statement.
  pub batch_size: usize,
  /// Length of the top-institutions list in the validation report.
  pub top_n:      usize,
}

impl Default for RebuildConfig {
  fn default() -> Self { Self { batch_size: 5000, top_n: 5 } }
}

impl RebuildConfig {
  pub fn validate(&self) -> Result<()> {
    if self.batch_size == 0 {
      return Err(Error::InvalidConfig("batch_size must be greater than zero".into()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_fill_missing_fields() {
    let cfg: RebuildConfig = serde_json::from_str(r#"{ "top_n": 10 }"#).unwrap();
    assert_eq!(cfg, RebuildConfig { batch_size: 5000, top_n: 10 });
    assert!(cfg.validate().is_ok());
  }

  #[test]
  fn zero_batch_size_is_rejected() {
    let cfg = RebuildConfig { batch_size: 0, ..Default::default() };
    assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
  }
}
