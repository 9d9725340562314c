use crate::error::{Error, Result};
use crate::excel::DEFAULT_SHEET_NAME;
use std::path::PathBuf;

pub const EXPORT_DIR_VAR: &str = "INVOICE_OCR_EXPORT_DIR";
pub const SHEET_NAME_VAR: &str = "INVOICE_OCR_SHEET_NAME";
pub const PARALLEL_VAR: &str = "INVOICE_OCR_PARALLEL";
pub const LOG_VAR: &str = "INVOICE_OCR_LOG";

const DEFAULT_LOG_FILTER: &str = "info";

/// Runtime settings, read from the environment (and a `.env` file if present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Where exports go when no explicit path is given. `None` = Downloads/Desktop.
    pub export_dir: Option<PathBuf>,
    pub sheet_name: String,
    /// Process batches on the rayon thread pool.
    pub parallel: bool,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            export_dir: None,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            parallel: false,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let parallel = match get(PARALLEL_VAR) {
            Some(v) => parse_bool(&v).ok_or_else(|| {
                Error::Config(format!("{} must be true or false, got '{}'", PARALLEL_VAR, v))
            })?,
            None => defaults.parallel,
        };

        Ok(Self {
            export_dir: get(EXPORT_DIR_VAR).map(PathBuf::from),
            sheet_name: get(SHEET_NAME_VAR).unwrap_or(defaults.sheet_name),
            parallel,
            log_filter: get(LOG_VAR).unwrap_or(defaults.log_filter),
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
