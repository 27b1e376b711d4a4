//! Run orchestrator: commodities in, prices out, with progress reporting.

use crate::config::EffectiveConfig;
use crate::data::PriceProvider;
use crate::domain::{Commodity, PriceRow};
use crate::sink::CsvSink;
use crate::store::{PriceStore, StoreError};
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot list commodities: {0}")]
    ListCommodities(#[from] StoreError),
}

/// Callback for per-commodity progress.
pub trait PipelineProgress {
    /// Called before a commodity is processed.
    fn on_commodity(&self, commodity: &Commodity, index: usize, total: usize);

    /// Called when a commodity is skipped without fetching.
    fn on_skip(&self, commodity: &Commodity, reason: &str);

    /// Called with the rows built for a commodity.
    fn on_prices(&self, commodity: &Commodity, rows: &[PriceRow]);

    /// Called once the whole run is done.
    fn on_run_complete(&self, summary: &RunSummary);
}

const HEADERLINE_WIDTH: usize = 64;

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl PipelineProgress for StdoutProgress {
    fn on_commodity(&self, commodity: &Commodity, index: usize, total: usize) {
        println!("\n{}", "-".repeat(HEADERLINE_WIDTH));
        println!("[{}/{}] {}", index + 1, total, commodity.fullname);
        println!("{:<16} {}", "Mnemonic:", commodity.mnemonic);
        println!("{:<16} {}", "Namespace:", commodity.namespace);
        println!("{:<16} {}", "Last Price Date:", commodity.last_price_date);
    }

    fn on_skip(&self, _commodity: &Commodity, reason: &str) {
        println!("  SKIP: {reason}");
    }

    fn on_prices(&self, _commodity: &Commodity, rows: &[PriceRow]) {
        println!("\n{:<12} {:<8} {:>14}", "date", "currency", "close");
        for row in rows {
            println!("{:<12} {:<8} {:>14}", row.date, row.currency, row.price);
        }
    }

    fn on_run_complete(&self, summary: &RunSummary) {
        println!("\n{}", "=".repeat(HEADERLINE_WIDTH));
        println!(
            "Run complete: {}/{} commodities processed, {} up to date",
            summary.processed, summary.total, summary.up_to_date
        );
        println!(
            "Prices fetched: {}, written to csv: {}, inserted: {}, already present: {}",
            summary.rows_fetched, summary.csv_rows, summary.inserted, summary.duplicates
        );
        for (symbol, reason) in &summary.warnings {
            println!("  WARN: {symbol}: {reason}");
        }
        for (symbol, reason) in &summary.failures {
            println!("  FAIL: {symbol}: {reason}");
        }
    }
}

/// Outcome of a run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    /// Commodities for which a fetch was attempted.
    pub processed: usize,
    pub up_to_date: usize,
    pub rows_fetched: usize,
    pub csv_rows: usize,
    pub inserted: usize,
    /// Rows already present in the book.
    pub duplicates: usize,
    /// Non-fatal fetch problems, by provider symbol.
    pub warnings: Vec<(String, String)>,
    /// Commodities whose prices could not be persisted.
    pub failures: Vec<(String, String)>,
}

impl RunSummary {
    pub fn all_persisted(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fetch and persist prices for every commodity in the book.
///
/// Fetch problems are recorded as warnings and persist problems as
/// failures; neither stops the run. Only a failure to list commodities
/// is fatal.
pub fn run(
    config: &EffectiveConfig,
    store: &mut dyn PriceStore,
    provider: &dyn PriceProvider,
    mut csv: Option<&mut CsvSink>,
    progress: &dyn PipelineProgress,
    today: NaiveDate,
) -> Result<RunSummary, PipelineError> {
    let commodities = store.list_commodities()?;
    let book_currency = config.book.currency.as_str();
    let mut summary = RunSummary {
        total: commodities.len(),
        ..Default::default()
    };
    tracing::info!(
        commodities = summary.total,
        provider = provider.name(),
        "starting price run"
    );

    for (i, commodity) in commodities.iter().enumerate() {
        progress.on_commodity(commodity, i, summary.total);

        if commodity.mnemonic.eq_ignore_ascii_case(book_currency) {
            progress.on_skip(commodity, "book currency");
            continue;
        }

        let Some(window) = config
            .provider
            .window
            .resolve(commodity.last_price_date, today)
        else {
            tracing::debug!(mnemonic = %commodity.mnemonic, "already up to date");
            progress.on_skip(commodity, "already up to date");
            summary.up_to_date += 1;
            continue;
        };

        summary.processed += 1;
        let symbol = commodity.provider_symbol(book_currency);
        let points = match provider.fetch(&symbol, &window) {
            Ok(points) => points,
            Err(e) => {
                tracing::warn!(%symbol, %window, error = %e, "fetch failed");
                summary.warnings.push((symbol, e.to_string()));
                continue;
            }
        };

        let rows = PriceRow::from_points(commodity, book_currency, &points);
        if rows.is_empty() {
            tracing::warn!(%symbol, %window, "no prices returned");
            summary
                .warnings
                .push((symbol, format!("no prices for {window}")));
            continue;
        }
        summary.rows_fetched += rows.len();
        progress.on_prices(commodity, &rows);

        if let Err(reason) = persist(config, store, csv.as_deref_mut(), commodity, &rows, &mut summary) {
            tracing::error!(%symbol, error = %reason, "persisting prices failed");
            summary.failures.push((symbol, reason));
        }
    }

    progress.on_run_complete(&summary);
    Ok(summary)
}

fn persist(
    config: &EffectiveConfig,
    store: &mut dyn PriceStore,
    csv: Option<&mut CsvSink>,
    commodity: &Commodity,
    rows: &[PriceRow],
    summary: &mut RunSummary,
) -> Result<(), String> {
    if config.output.to_csv {
        if let Some(sink) = csv {
            let written = sink.write(rows).map_err(|e| e.to_string())?;
            tracing::debug!(mnemonic = %commodity.mnemonic, rows = written, path = %sink.path().display(), "wrote csv rows");
            summary.csv_rows += written;
        }
    }

    if config.output.to_mdb {
        let outcome = store
            .insert_prices(commodity, rows)
            .map_err(|e| e.to_string())?;
        tracing::info!(
            mnemonic = %commodity.mnemonic,
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            "loaded prices into book"
        );
        summary.inserted += outcome.inserted;
        summary.duplicates += outcome.skipped;
    }

    Ok(())
}
