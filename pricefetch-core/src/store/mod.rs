//! Commodity repository and price table access.
//!
//! Two backends share the GnuCash `commodities`/`prices` schema: a SQLite
//! book file and a MariaDB server. [`open`] picks one from the connection
//! settings.

pub mod mariadb;
pub mod sqlite;

pub use mariadb::MariaDbStore;
pub use sqlite::SqliteStore;

use crate::config::ConnectionConfig;
use crate::domain::{Commodity, PriceRow};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot connect to {target}: {reason}")]
    Connection { target: String, reason: String },

    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("server query failed: {0}")]
    Server(#[from] sqlx::Error),

    #[error("price row for {symbol} does not belong to commodity {guid}")]
    ForeignRow { symbol: String, guid: String },
}

/// Counts from one `insert_prices` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: usize,
    /// Rows whose (commodity, date) was already stored.
    pub skipped: usize,
}

/// The book: where commodities are listed and prices are written.
pub trait PriceStore {
    /// Commodities that have at least one stored price, ordered by mnemonic.
    fn list_commodities(&mut self) -> Result<Vec<Commodity>, StoreError>;

    /// Insert `rows` for `commodity` in one transaction, skipping dates that
    /// already have a price.
    fn insert_prices(
        &mut self,
        commodity: &Commodity,
        rows: &[PriceRow],
    ) -> Result<InsertOutcome, StoreError>;
}

/// Open the book described by `connection`: a MariaDB server when a host
/// is set, otherwise the SQLite file named by `database`.
pub fn open(connection: &ConnectionConfig) -> Result<Box<dyn PriceStore>, StoreError> {
    match connection.host {
        Some(_) => Ok(Box::new(MariaDbStore::open(connection)?)),
        None => Ok(Box::new(SqliteStore::open(connection)?)),
    }
}

pub(crate) const PRICE_SOURCE: &str = "user:price";
pub(crate) const PRICE_TYPE: &str = "last";

/// A (commodity, stored price) pair as read from the book. The date is
/// kept as text because books carry more than one layout.
pub(crate) struct PriceListing {
    pub guid: String,
    pub namespace: String,
    pub mnemonic: String,
    pub fullname: String,
    pub currency_guid: String,
    pub currency: String,
    pub date: String,
    pub value_denom: i64,
}

/// Reduce listings to one commodity each, carrying its newest price.
///
/// Rows with an unreadable date are logged and ignored.
pub(crate) fn latest_per_commodity(
    listings: impl IntoIterator<Item = PriceListing>,
) -> Vec<Commodity> {
    let mut latest: HashMap<String, Commodity> = HashMap::new();
    for listing in listings {
        let Some(date) = stored_date(&listing.date, &listing.mnemonic) else {
            continue;
        };
        if latest
            .get(&listing.guid)
            .is_some_and(|c| c.last_price_date >= date)
        {
            continue;
        }
        latest.insert(
            listing.guid.clone(),
            Commodity {
                guid: listing.guid,
                namespace: listing.namespace,
                mnemonic: listing.mnemonic,
                fullname: listing.fullname,
                currency_guid: listing.currency_guid,
                currency: listing.currency,
                last_price_date: date,
                value_denom: listing.value_denom.max(1),
            },
        );
    }

    let mut commodities: Vec<Commodity> = latest.into_values().collect();
    commodities.sort_by(|a, b| {
        a.mnemonic
            .cmp(&b.mnemonic)
            .then_with(|| a.namespace.cmp(&b.namespace))
    });
    commodities
}

/// Dates that already carry a price, from their stored text.
pub(crate) fn existing_dates(
    raw_dates: impl IntoIterator<Item = String>,
    mnemonic: &str,
) -> HashSet<NaiveDate> {
    raw_dates
        .into_iter()
        .filter_map(|raw| stored_date(&raw, mnemonic))
        .collect()
}

/// A price about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NewPrice {
    pub guid: String,
    pub date: String,
    pub value_num: i64,
}

/// Work out which rows to insert for `commodity`, given the dates already
/// stored. Returns the new prices and the number of skipped rows.
pub(crate) fn plan_insert(
    commodity: &Commodity,
    rows: &[PriceRow],
    mut seen: HashSet<NaiveDate>,
) -> Result<(Vec<NewPrice>, usize), StoreError> {
    if let Some(row) = rows.iter().find(|r| r.commodity_guid != commodity.guid) {
        return Err(StoreError::ForeignRow {
            symbol: row.symbol.clone(),
            guid: commodity.guid.clone(),
        });
    }

    let mut prices = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for row in rows {
        if !seen.insert(row.date) {
            skipped += 1;
            continue;
        }
        prices.push(NewPrice {
            guid: new_guid(),
            date: format_price_date(row.date),
            value_num: (row.price * commodity.value_denom as f64).round() as i64,
        });
    }
    Ok((prices, skipped))
}

fn new_guid() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// GnuCash's day-neutral time (10:59 UTC).
pub(crate) fn format_price_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d 10:59:00").to_string()
}

/// Accepts `YYYY-MM-DD HH:MM:SS`, the GnuCash 2.x `YYYYMMDDHHMMSS` layout
/// and a bare `YYYY-MM-DD`.
pub(crate) fn parse_price_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y%m%d%H%M%S"))
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

fn stored_date(raw: &str, mnemonic: &str) -> Option<NaiveDate> {
    let date = parse_price_date(raw);
    if date.is_none() {
        tracing::warn!(%mnemonic, date = %raw, "ignoring stored price with unreadable date");
    }
    date
}
