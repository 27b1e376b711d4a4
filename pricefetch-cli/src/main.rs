//! pricefetch CLI: load daily commodity prices into a GnuCash book and/or CSV.
//!
//! Options are layered: command line over `config.ini` over built-in
//! defaults. Unless `--silent` is set, the run asks for confirmation of the
//! outputs and for any missing credentials.
//!
//! Exit codes: 0 on success, 1 on configuration/connection/file errors,
//! 2 when prices for some commodity could not be stored.

mod prompt;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use pricefetch_core::config::{
    ini, ConfigResolver, EffectiveConfig, NoPrompt, PartialConfig, Period,
};
use pricefetch_core::data::YahooProvider;
use pricefetch_core::pipeline::{self, RunSummary, StdoutProgress};
use pricefetch_core::sink::CsvSink;
use pricefetch_core::store;
use prompt::TerminalPrompter;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "pricefetch",
    version,
    about = "Fetch daily commodity prices from Yahoo Finance into a GnuCash book and/or CSV"
)]
struct Cli {
    /// Never prompt; missing values fall back to config file and defaults.
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true,
          default_missing_value = "true", value_parser = parse_flag)]
    silent: Option<bool>,

    /// Configuration file. Defaults to ./config.ini when present.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// MariaDB host. When set, prices go to the server instead of a SQLite book.
    #[arg(long)]
    host: Option<String>,

    /// MariaDB port. Defaults to 3306.
    #[arg(long)]
    port: Option<u16>,

    /// GnuCash book: a SQLite file, or the database name on the server.
    /// Defaults to gnucash.gnucash.
    #[arg(short = 'd', long)]
    database: Option<String>,

    /// Database user. Defaults to the current system user.
    #[arg(short = 'u', long)]
    user: Option<String>,

    /// Database password.
    #[arg(long)]
    pwd: Option<String>,

    /// Book currency (ISO 4217). Defaults to EUR.
    #[arg(short = 'c', long)]
    currency: Option<String>,

    /// Load prices into the book.
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true,
          default_missing_value = "true", value_parser = parse_flag)]
    to_mdb: Option<bool>,

    /// Write prices to the CSV file.
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true,
          default_missing_value = "true", value_parser = parse_flag)]
    to_csv: Option<bool>,

    /// CSV output path. Defaults to consolidated_prices.csv.
    #[arg(short = 'o', long)]
    output_path: Option<PathBuf>,

    /// Replace an existing CSV file.
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true,
          default_missing_value = "true", value_parser = parse_flag)]
    overwrite_csv: Option<bool>,

    /// Period to fetch: auto|1d|5d|1mo|3mo|6mo|1y|2y|5y|10y|ytd|max.
    #[arg(short = 'p', long)]
    period: Option<Period>,

    /// First date to fetch (YYYY-MM-DD). Overrides the period.
    #[arg(short = 's', long, visible_alias = "start-date", value_parser = parse_cli_date)]
    start: Option<NaiveDate>,

    /// Last date to fetch (YYYY-MM-DD). Defaults to today.
    #[arg(short = 'e', long, visible_alias = "end-date", value_parser = parse_cli_date)]
    end: Option<NaiveDate>,
}

impl Cli {
    fn layer(&self) -> PartialConfig {
        PartialConfig {
            silent: self.silent,
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            pwd: self.pwd.clone(),
            database: self.database.clone(),
            currency: self.currency.as_deref().map(str::to_ascii_uppercase),
            to_mdb: self.to_mdb,
            to_csv: self.to_csv,
            output_path: self.output_path.clone(),
            overwrite_csv: self.overwrite_csv,
            period: self.period,
            start: self.start,
            end: self.end,
        }
    }
}

fn parse_flag(value: &str) -> Result<bool, String> {
    ini::parse_bool(value).ok_or_else(|| format!("expected true or false, got '{value}'"))
}

fn parse_cli_date(value: &str) -> Result<NaiveDate, String> {
    ini::parse_date(value).ok_or_else(|| format!("expected YYYY-MM-DD, got '{value}'"))
}

fn init_tracing() {
    let log_format = std::env::var("PRICEFETCH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let summary = run(&cli)?;
    if !summary.all_persisted() {
        for (symbol, reason) in &summary.failures {
            eprintln!("Error for {symbol}: {reason}");
        }
        std::process::exit(2);
    }

    Ok(())
}

fn load_config(cli: &Cli, today: NaiveDate) -> Result<EffectiveConfig> {
    let (path, explicit) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(ini::DEFAULT_CONFIG_PATH), false),
    };
    let file = ini::load_file(&path, explicit)?;

    let resolver = ConfigResolver::new(cli.layer(), file);
    let silent = resolver.merged().silent.unwrap_or(false);

    let config = if silent {
        resolver.resolve(&mut NoPrompt, today)?
    } else {
        let stdin = std::io::stdin();
        let mut prompter = TerminalPrompter::new(stdin.lock(), std::io::stdout());
        resolver.resolve(&mut prompter, today)?
    };
    Ok(config)
}

/// One full run. Book and CSV handles are closed before this returns.
fn run(cli: &Cli) -> Result<RunSummary> {
    let today = chrono::Local::now().date_naive();
    let config = load_config(cli, today)?;
    tracing::debug!(?config, "effective configuration");

    if !config.output.to_mdb && !config.output.to_csv {
        tracing::info!("neither --to-mdb nor --to-csv is enabled; prices are only displayed");
    }

    let mut store = store::open(&config.connection)?;
    tracing::info!(book = %config.connection.describe(), "opened book");

    let mut csv = if config.output.to_csv {
        Some(CsvSink::open(
            &config.output.output_path,
            config.output.overwrite_csv,
        )?)
    } else {
        None
    };

    let provider = YahooProvider::new().context("cannot set up the Yahoo Finance client")?;
    let summary = pipeline::run(
        &config,
        store.as_mut(),
        &provider,
        csv.as_mut(),
        &StdoutProgress,
        today,
    )?;

    if let Some(sink) = &csv {
        if sink.rows_written() > 0 {
            println!(
                "Wrote {} rows to {}",
                sink.rows_written(),
                sink.path().display()
            );
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pricefetch").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_arguments_is_an_empty_layer() {
        assert_eq!(parse(&[]).layer(), PartialConfig::default());
    }

    #[test]
    fn short_and_long_options_map_to_layer() {
        let cli = parse(&[
            "-d", "book.gnucash", "-u", "joost", "-c", "usd", "-o", "out.csv", "-p", "1mo",
            "--host", "db.local", "--port", "3307", "--pwd", "secret",
        ]);
        let layer = cli.layer();
        assert_eq!(layer.database.as_deref(), Some("book.gnucash"));
        assert_eq!(layer.user.as_deref(), Some("joost"));
        assert_eq!(layer.currency.as_deref(), Some("USD"));
        assert_eq!(layer.output_path, Some(PathBuf::from("out.csv")));
        assert_eq!(layer.period, Some(Period::Month1));
        assert_eq!(layer.host.as_deref(), Some("db.local"));
        assert_eq!(layer.port, Some(3307));
        assert_eq!(layer.pwd.as_deref(), Some("secret"));
    }

    #[test]
    fn bool_flags_take_optional_value() {
        let cli = parse(&["--to-csv", "--to-mdb=false", "--silent=yes"]);
        assert_eq!(cli.to_csv, Some(true));
        assert_eq!(cli.to_mdb, Some(false));
        assert_eq!(cli.silent, Some(true));
        assert_eq!(cli.overwrite_csv, None);
    }

    #[test]
    fn date_aliases_are_accepted() {
        let cli = parse(&["--start-date", "2024-01-02", "-e", "2024-01-05"]);
        assert_eq!(cli.start, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(cli.end, NaiveDate::from_ymd_opt(2024, 1, 5));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for args in [
            &["--period", "2w"][..],
            &["--start", "02-01-2024"][..],
            &["--to-csv=maybe"][..],
            &["--port", "70000"][..],
        ] {
            let argv = std::iter::once("pricefetch").chain(args.iter().copied());
            assert!(Cli::try_parse_from(argv).is_err(), "accepted {args:?}");
        }
    }
}
