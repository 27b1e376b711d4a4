//! Terminal prompts for interactive runs.

use pricefetch_core::config::{ConfigError, Prompter};
use std::io::{self, BufRead, Write};

/// Asks questions on `output` and reads answers line by line from `input`.
///
/// The password is read like any other line; the terminal echo is not
/// switched off.
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `question` and read one trimmed line. `None` at end of input.
    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "{question} ")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

fn parse_answer(answer: &str) -> Option<bool> {
    match answer.to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" => Some(true),
        "n" | "no" | "f" | "false" => Some(false),
        _ => None,
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool, ConfigError> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let Some(answer) = self.ask(&format!("{question} {hint}"))? else {
                return Ok(default);
            };
            if answer.is_empty() {
                return Ok(default);
            }
            match parse_answer(&answer) {
                Some(value) => return Ok(value),
                None => writeln!(self.output, "Please answer yes or no.")?,
            }
        }
    }

    fn input(&mut self, question: &str, default: &str) -> Result<String, ConfigError> {
        match self.ask(&format!("{question}:"))? {
            Some(answer) if !answer.is_empty() => Ok(answer),
            _ => Ok(default.to_string()),
        }
    }

    fn password(&mut self, question: &str) -> Result<String, ConfigError> {
        loop {
            match self.ask(question)? {
                Some(answer) if !answer.is_empty() => return Ok(answer),
                Some(_) => writeln!(self.output, "Password cannot be empty.")?,
                None => {
                    return Err(ConfigError::MissingValue {
                        key: "pwd",
                        reason: "input closed before a password was entered".into(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> TerminalPrompter<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalPrompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn transcript(p: &TerminalPrompter<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(p.output.clone()).unwrap()
    }

    #[test]
    fn confirm_accepts_common_answers() {
        let mut p = prompter("y\nNO\nTrue\nf\n");
        assert!(p.confirm("a?", false).unwrap());
        assert!(!p.confirm("b?", true).unwrap());
        assert!(p.confirm("c?", false).unwrap());
        assert!(!p.confirm("d?", true).unwrap());
    }

    #[test]
    fn confirm_repeats_until_understood() {
        let mut p = prompter("maybe\n\n");
        assert!(p.confirm("Save prices to: out.csv?", true).unwrap());
        let out = transcript(&p);
        assert_eq!(out.matches("Save prices to: out.csv? [Y/n]").count(), 2);
        assert!(out.contains("Please answer yes or no."));
    }

    #[test]
    fn empty_or_closed_input_takes_default() {
        let mut p = prompter("\n");
        assert_eq!(p.input("Username", "joost").unwrap(), "joost");
        assert_eq!(p.input("Username", "joost").unwrap(), "joost");
        assert!(!p.confirm("x?", false).unwrap());
    }

    #[test]
    fn password_must_not_be_empty() {
        let mut p = prompter("\n  \nhunter2\n");
        assert_eq!(p.password("Password:").unwrap(), "hunter2");
        assert_eq!(transcript(&p).matches("Password cannot be empty.").count(), 2);

        let mut closed = prompter("");
        assert!(matches!(
            closed.password("Password:"),
            Err(ConfigError::MissingValue { key: "pwd", .. })
        ));
    }
}
