use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Page sizes, persistence cadence and storage location.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub initial_page_size: usize,
    pub page_size: usize,
    pub around_page_size: usize,
    pub persist_debounce: Duration,
    pub db_path: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            initial_page_size: 100,
            page_size: 50,
            around_page_size: 50,
            persist_debounce: Duration::from_millis(300),
            db_path: PathBuf::from("weave.db"),
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `WEAVE_*` variables, reading `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            initial_page_size: parse_var(&lookup, "WEAVE_INITIAL_PAGE_SIZE")
                .unwrap_or(defaults.initial_page_size),
            page_size: parse_var(&lookup, "WEAVE_PAGE_SIZE").unwrap_or(defaults.page_size),
            around_page_size: parse_var(&lookup, "WEAVE_AROUND_PAGE_SIZE")
                .unwrap_or(defaults.around_page_size),
            persist_debounce: parse_var(&lookup, "WEAVE_PERSIST_DEBOUNCE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.persist_debounce),
            db_path: lookup("WEAVE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid number", key, raw);
            None
        }
    }
}
