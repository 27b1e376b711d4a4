//! Fetch periods and date windows.
//!
//! A run either asks the provider for a named period (`1mo`, `ytd`, ...),
//! for an explicit inclusive date range, or for the `auto` window that
//! starts the day after each commodity's last stored price.

use chrono::{Days, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// Period keyword accepted on the command line and in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Auto,
    Day1,
    Days5,
    Month1,
    Months3,
    Months6,
    Year1,
    Years2,
    Years5,
    Years10,
    Ytd,
    Max,
}

impl Period {
    pub const ALL: [Period; 12] = [
        Period::Auto,
        Period::Day1,
        Period::Days5,
        Period::Month1,
        Period::Months3,
        Period::Months6,
        Period::Year1,
        Period::Years2,
        Period::Years5,
        Period::Years10,
        Period::Ytd,
        Period::Max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Auto => "auto",
            Period::Day1 => "1d",
            Period::Days5 => "5d",
            Period::Month1 => "1mo",
            Period::Months3 => "3mo",
            Period::Months6 => "6mo",
            Period::Year1 => "1y",
            Period::Years2 => "2y",
            Period::Years5 => "5y",
            Period::Years10 => "10y",
            Period::Ytd => "ytd",
            Period::Max => "max",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the period keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPeriod(pub String);

impl fmt::Display for UnknownPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let valid: Vec<&str> = Period::ALL.iter().map(Period::as_str).collect();
        write!(f, "unknown period '{}' (valid: {})", self.0, valid.join(", "))
    }
}

impl std::error::Error for UnknownPeriod {}

impl FromStr for Period {
    type Err = UnknownPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Period::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| UnknownPeriod(s.to_string()))
    }
}

/// Inclusive date range. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when the range would be empty.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// How the fetch window is chosen, as resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSpec {
    /// Explicit `--start` (and optional `--end`, default today).
    Explicit { start: NaiveDate, end: Option<NaiveDate> },
    /// Day after the last stored price through `end` (default today).
    Auto { end: Option<NaiveDate> },
    /// A named provider period other than `auto`.
    Named(Period),
}

/// The concrete request handed to a price provider for one commodity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchWindow {
    Range(DateRange),
    Period(Period),
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchWindow::Range(range) => write!(f, "{range}"),
            FetchWindow::Period(period) => write!(f, "period {period}"),
        }
    }
}

impl WindowSpec {
    /// Resolve the window for a commodity whose newest stored price is on
    /// `last_price_date`. Returns `None` when there is nothing to fetch.
    ///
    /// End dates are clamped to `today`.
    pub fn resolve(&self, last_price_date: NaiveDate, today: NaiveDate) -> Option<FetchWindow> {
        match *self {
            WindowSpec::Explicit { start, end } => {
                let end = end.unwrap_or(today).min(today);
                DateRange::new(start, end).map(FetchWindow::Range)
            }
            WindowSpec::Auto { end } => {
                let start = last_price_date.checked_add_days(Days::new(1))?;
                let end = end.unwrap_or(today).min(today);
                DateRange::new(start, end).map(FetchWindow::Range)
            }
            WindowSpec::Named(period) => Some(FetchWindow::Period(period)),
        }
    }
}
