//! Configuration: layers, resolution and the effective configuration.
//!
//! Resolution order for every option is command line, then config file,
//! then built-in default. The result is an immutable [`EffectiveConfig`]
//! that the rest of the run borrows.

pub mod ini;
pub mod layer;
pub mod period;
pub mod prompt;

pub use layer::PartialConfig;
pub use period::{DateRange, FetchWindow, Period, UnknownPeriod, WindowSpec};
pub use prompt::{NoPrompt, Prompter};

use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors. All of them abort the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing value for '{key}': {reason}")]
    MissingValue { key: &'static str, reason: String },

    #[error("invalid value '{value}' for '{key}' in {source_name}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        source_name: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Conflict(String),

    #[error("cannot read config file {}: {reason}", path.display())]
    ConfigFile { path: PathBuf, reason: String },

    #[error("prompt failed: {0}")]
    Prompt(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralConfig {
    /// Never interact with the user.
    pub silent: bool,
}

/// Where the GnuCash book lives and who opens it.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub port: u16,
    pub user: String,
    pub pwd: String,
    pub database: String,
}

impl ConnectionConfig {
    /// Human-readable target, used in prompts and logs. Never shows the password.
    pub fn describe(&self) -> String {
        match &self.host {
            Some(host) if self.user.is_empty() => {
                format!("{}:{}/{}", host, self.port, self.database)
            }
            Some(host) => format!("{}@{}:{}/{}", self.user, host, self.port, self.database),
            None => self.database.clone(),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("pwd", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookConfig {
    /// Book default currency, e.g. `EUR`.
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub to_mdb: bool,
    pub to_csv: bool,
    pub output_path: PathBuf,
    pub overwrite_csv: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub window: WindowSpec,
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub general: GeneralConfig,
    pub connection: ConnectionConfig,
    pub book: BookConfig,
    pub output: OutputConfig,
    pub provider: ProviderConfig,
}

/// Merges defaults, the config file layer and the command line layer.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    defaults: PartialConfig,
    file: PartialConfig,
    cli: PartialConfig,
    system_user: String,
}

impl ConfigResolver {
    pub fn new(cli: PartialConfig, file: PartialConfig) -> Self {
        Self {
            defaults: PartialConfig::defaults(),
            file,
            cli,
            system_user: system_username(),
        }
    }

    /// Override the fallback username (normally the current system user).
    pub fn with_system_user(mut self, user: impl Into<String>) -> Self {
        self.system_user = user.into();
        self
    }

    /// The three layers stacked, before validation and prompting.
    pub fn merged(&self) -> PartialConfig {
        self.cli
            .clone()
            .or(self.file.clone())
            .or(self.defaults.clone())
    }

    /// Build the effective configuration.
    ///
    /// In silent mode the prompter is never consulted: a missing username
    /// falls back to the system user and a missing password is an error.
    pub fn resolve(
        &self,
        prompter: &mut dyn Prompter,
        today: NaiveDate,
    ) -> Result<EffectiveConfig, ConfigError> {
        let merged = self.merged();
        let silent = merged.silent.unwrap_or(false);

        let window = resolve_window(&merged, today)?;

        let mut connection = ConnectionConfig {
            host: merged.host,
            port: merged.port.unwrap_or(layer::DEFAULT_PORT),
            user: String::new(),
            pwd: String::new(),
            database: merged
                .database
                .unwrap_or_else(|| layer::DEFAULT_DATABASE.to_string()),
        };

        let mut output = OutputConfig {
            to_mdb: merged.to_mdb.unwrap_or(false),
            to_csv: merged.to_csv.unwrap_or(false),
            output_path: merged
                .output_path
                .unwrap_or_else(|| PathBuf::from(layer::DEFAULT_OUTPUT_PATH)),
            overwrite_csv: merged.overwrite_csv.unwrap_or(false),
        };

        if !silent {
            output.to_mdb = prompter.confirm(
                &format!("Load prices to: {}?", connection.describe()),
                output.to_mdb,
            )?;
            output.to_csv = prompter.confirm(
                &format!("Save prices to: {}?", output.output_path.display()),
                output.to_csv,
            )?;
            if output.to_csv && output.output_path.exists() {
                output.overwrite_csv = prompter.confirm(
                    &format!(
                        "{} already exists. Do you want to overwrite?",
                        output.output_path.display()
                    ),
                    output.overwrite_csv,
                )?;
            }
        }

        connection.user = match merged.user {
            Some(user) => user,
            None if silent => self.system_user.clone(),
            None => prompter.input(
                &format!(
                    "Username for {} (Enter for {})",
                    connection.describe(),
                    self.system_user
                ),
                &self.system_user,
            )?,
        };

        connection.pwd = match merged.pwd {
            Some(pwd) => pwd,
            None if silent => {
                return Err(ConfigError::MissingValue {
                    key: "pwd",
                    reason: "silent mode requires a password in the config file or on the command line"
                        .into(),
                })
            }
            None => prompter.password("Password: ")?,
        };
        if connection.pwd.is_empty() {
            return Err(ConfigError::MissingValue {
                key: "pwd",
                reason: "password cannot be empty".into(),
            });
        }

        Ok(EffectiveConfig {
            general: GeneralConfig { silent },
            connection,
            book: BookConfig {
                currency: merged
                    .currency
                    .unwrap_or_else(|| layer::DEFAULT_CURRENCY.to_string())
                    .to_ascii_uppercase(),
            },
            output,
            provider: ProviderConfig { window },
        })
    }
}

fn resolve_window(merged: &PartialConfig, today: NaiveDate) -> Result<WindowSpec, ConfigError> {
    if let Some(start) = merged.start {
        let end = merged.end.unwrap_or(today);
        if start > end {
            return Err(ConfigError::Conflict(format!(
                "start date {start} is after end date {end}"
            )));
        }
        if merged.period.is_some_and(|p| p != Period::Auto) {
            tracing::warn!("both a period and a start date are set; using the start date");
        }
        return Ok(WindowSpec::Explicit {
            start,
            end: merged.end,
        });
    }

    match merged.period.unwrap_or(Period::Auto) {
        Period::Auto => Ok(WindowSpec::Auto { end: merged.end }),
        period => {
            if merged.end.is_some() {
                tracing::warn!(%period, "end date is ignored when a named period is used");
            }
            Ok(WindowSpec::Named(period))
        }
    }
}

/// Current login name, falling back to an empty string.
pub fn system_username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}
