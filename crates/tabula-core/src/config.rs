//! Configuration for expression naming and display.
//!
//! Build a [`TabulaConfig`] from code or from environment variables, then install
//! it process-wide with [`set_config`].

use std::sync::{PoisonError, RwLock};

/// Environment variable for the prefix of generated data node names.
pub const ENV_NAME_PREFIX: &str = "TABULA_NAME_PREFIX";
/// Environment variable for the row limit of computed representations.
pub const ENV_DISPLAY_ROWS: &str = "TABULA_DISPLAY_ROWS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabulaConfig {
    /// Prefix for auto-generated names (`_0`, `_1`, ...).
    pub name_prefix: String,
    /// Maximum rows shown when an expression is rendered by evaluation.
    pub display_rows: usize,
}

impl Default for TabulaConfig {
    fn default() -> Self {
        TabulaConfig {
            name_prefix: "_".to_string(),
            display_rows: 10,
        }
    }
}

impl TabulaConfig {
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_display_rows(mut self, rows: usize) -> Self {
        self.display_rows = rows;
        self
    }

    /// Read `TABULA_NAME_PREFIX` and `TABULA_DISPLAY_ROWS`; unset or invalid values keep
    /// their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = TabulaConfig::default();
        if let Some(prefix) = lookup(ENV_NAME_PREFIX) {
            cfg.name_prefix = prefix;
        }
        if let Some(raw) = lookup(ENV_DISPLAY_ROWS) {
            match raw.trim().parse::<usize>() {
                Ok(n) => cfg.display_rows = n,
                Err(e) => tracing::warn!(
                    "ignoring {}={:?}: {}; using {}",
                    ENV_DISPLAY_ROWS,
                    raw,
                    e,
                    cfg.display_rows
                ),
            }
        }
        cfg
    }
}

static CONFIG: RwLock<Option<TabulaConfig>> = RwLock::new(None);

/// Install the process-wide configuration.
pub fn set_config(cfg: TabulaConfig) {
    *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = Some(cfg);
}

/// Current process-wide configuration (defaults if none was installed).
pub fn config() -> TabulaConfig {
    CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .unwrap_or_default()
}
