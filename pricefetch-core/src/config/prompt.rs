//! Interactive prompting capability.
//!
//! Configuration resolution never reads the terminal directly; it asks a
//! `Prompter`. Automated callers pass [`NoPrompt`].

use super::ConfigError;

pub trait Prompter {
    /// Yes/no question. `default` is returned on an empty answer.
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool, ConfigError>;

    /// Free text question. `default` is returned on an empty answer.
    fn input(&mut self, question: &str, default: &str) -> Result<String, ConfigError>;

    /// Secret input. Must not return an empty string.
    fn password(&mut self, question: &str) -> Result<String, ConfigError>;
}

/// Non-interactive prompter: every question takes its default and
/// secrets are unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn confirm(&mut self, _question: &str, default: bool) -> Result<bool, ConfigError> {
        Ok(default)
    }

    fn input(&mut self, _question: &str, default: &str) -> Result<String, ConfigError> {
        Ok(default.to_string())
    }

    fn password(&mut self, _question: &str) -> Result<String, ConfigError> {
        Err(ConfigError::MissingValue {
            key: "pwd",
            reason: "no password provided and prompting is disabled".into(),
        })
    }
}
