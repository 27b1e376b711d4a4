//! GnuCash book stored in SQLite.
//!
//! Only the `commodities` and `prices` tables are touched. Price dates are
//! stored as `YYYY-MM-DD HH:MM:SS` text; books written by GnuCash 2.x use
//! `YYYYMMDDHHMMSS`, which is accepted when reading.

use super::{
    existing_dates, latest_per_commodity, plan_insert, InsertOutcome, PriceListing, PriceStore,
    StoreError, PRICE_SOURCE, PRICE_TYPE,
};
use crate::config::ConnectionConfig;
use crate::domain::{Commodity, PriceRow};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OpenFlags};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// GnuCash tables this tool reads and writes.
pub const SCHEMA_SQL: &str = "
CREATE TABLE commodities (
    guid text(32) PRIMARY KEY NOT NULL,
    namespace text(2048) NOT NULL,
    mnemonic text(2048) NOT NULL,
    fullname text(2048),
    cusip text(2048),
    fraction integer NOT NULL,
    quote_flag integer NOT NULL,
    quote_source text(2048),
    quote_tz text(2048)
);
CREATE TABLE prices (
    guid text(32) PRIMARY KEY NOT NULL,
    commodity_guid text(32) NOT NULL,
    currency_guid text(32) NOT NULL,
    date text(19) NOT NULL,
    source text(2048),
    type text(2048),
    value_num bigint NOT NULL,
    value_denom bigint NOT NULL
);
";

const LIST_PRICES_SQL: &str = "
SELECT c.guid, c.namespace, c.mnemonic, COALESCE(c.fullname, ''),
       p.currency_guid, COALESCE(cur.mnemonic, ''), p.date, p.value_denom
FROM commodities c
JOIN prices p ON p.commodity_guid = c.guid
LEFT JOIN commodities cur ON cur.guid = p.currency_guid
WHERE c.namespace <> 'template'
";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open an existing book. Never creates a file.
    pub fn open(connection: &ConnectionConfig) -> Result<Self, StoreError> {
        let target = connection.describe();
        let path = Path::new(&connection.database);
        if !path.is_file() {
            return Err(StoreError::Connection {
                target,
                reason: "book file not found".into(),
            });
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::Connection {
            target: target.clone(),
            reason: e.to_string(),
        })?;

        Self::from_connection(conn).map_err(|e| StoreError::Connection {
            target,
            reason: e.to_string(),
        })
    }

    /// Wrap an already open connection, checking that it holds a book.
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.query_row("SELECT COUNT(*) FROM commodities", [], |r| r.get::<_, i64>(0))?;
        conn.query_row("SELECT COUNT(*) FROM prices", [], |r| r.get::<_, i64>(0))?;

        // GnuCash keeps a row in gnclock while the book is open in the app.
        let locked: i64 = conn
            .query_row("SELECT COUNT(*) FROM gnclock", [], |r| r.get(0))
            .unwrap_or(0);
        if locked > 0 {
            tracing::warn!("book appears to be open in GnuCash; new prices show up after reopening it");
        }

        Ok(Self { conn })
    }

    fn stored_dates(&self, commodity: &Commodity) -> Result<HashSet<NaiveDate>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT date FROM prices WHERE commodity_guid = ?1")?;
        let raw = stmt
            .query_map(params![commodity.guid], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(existing_dates(raw, &commodity.mnemonic))
    }
}

impl PriceStore for SqliteStore {
    fn list_commodities(&mut self) -> Result<Vec<Commodity>, StoreError> {
        let mut stmt = self.conn.prepare(LIST_PRICES_SQL)?;
        let listings = stmt
            .query_map([], |r| {
                Ok(PriceListing {
                    guid: r.get(0)?,
                    namespace: r.get(1)?,
                    mnemonic: r.get(2)?,
                    fullname: r.get(3)?,
                    currency_guid: r.get(4)?,
                    currency: r.get(5)?,
                    date: r.get(6)?,
                    value_denom: r.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let commodities = latest_per_commodity(listings);
        tracing::debug!(count = commodities.len(), "listed commodities");
        Ok(commodities)
    }

    fn insert_prices(
        &mut self,
        commodity: &Commodity,
        rows: &[PriceRow],
    ) -> Result<InsertOutcome, StoreError> {
        let seen = self.stored_dates(commodity)?;
        let (prices, skipped) = plan_insert(commodity, rows, seen)?;

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO prices
                    (guid, commodity_guid, currency_guid, date, source, type, value_num, value_denom)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for price in &prices {
                stmt.execute(params![
                    price.guid,
                    commodity.guid,
                    commodity.currency_guid,
                    price.date,
                    PRICE_SOURCE,
                    PRICE_TYPE,
                    price.value_num,
                    commodity.value_denom,
                ])?;
            }
        }
        tx.commit()?;

        Ok(InsertOutcome {
            inserted: prices.len(),
            skipped,
        })
    }
}
