//! Configuration layers.
//!
//! Each source (built-in defaults, INI file, command line) produces a
//! `PartialConfig` in which every option is optional. Layers are stacked
//! with [`PartialConfig::or`]: a value set in the upper layer always wins.

use super::period::Period;
use chrono::NaiveDate;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_DATABASE: &str = "gnucash.gnucash";
pub const DEFAULT_CURRENCY: &str = "EUR";
pub const DEFAULT_OUTPUT_PATH: &str = "consolidated_prices.csv";

/// One layer of configuration. `None` means "not provided by this layer".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialConfig {
    pub silent: Option<bool>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub pwd: Option<String>,
    pub database: Option<String>,
    pub currency: Option<String>,
    pub to_mdb: Option<bool>,
    pub to_csv: Option<bool>,
    pub output_path: Option<PathBuf>,
    pub overwrite_csv: Option<bool>,
    pub period: Option<Period>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl PartialConfig {
    /// The built-in fallback layer.
    pub fn defaults() -> Self {
        Self {
            silent: Some(false),
            host: None,
            port: Some(DEFAULT_PORT),
            user: None,
            pwd: None,
            database: Some(DEFAULT_DATABASE.to_string()),
            currency: Some(DEFAULT_CURRENCY.to_string()),
            to_mdb: Some(false),
            to_csv: Some(false),
            output_path: Some(PathBuf::from(DEFAULT_OUTPUT_PATH)),
            overwrite_csv: Some(false),
            period: Some(Period::Auto),
            start: None,
            end: None,
        }
    }

    /// Stack `self` on top of `fallback`, field by field.
    pub fn or(self, fallback: PartialConfig) -> PartialConfig {
        PartialConfig {
            silent: self.silent.or(fallback.silent),
            host: self.host.or(fallback.host),
            port: self.port.or(fallback.port),
            user: self.user.or(fallback.user),
            pwd: self.pwd.or(fallback.pwd),
            database: self.database.or(fallback.database),
            currency: self.currency.or(fallback.currency),
            to_mdb: self.to_mdb.or(fallback.to_mdb),
            to_csv: self.to_csv.or(fallback.to_csv),
            output_path: self.output_path.or(fallback.output_path),
            overwrite_csv: self.overwrite_csv.or(fallback.overwrite_csv),
            period: self.period.or(fallback.period),
            start: self.start.or(fallback.start),
            end: self.end.or(fallback.end),
        }
    }
}
