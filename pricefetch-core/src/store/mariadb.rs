//! GnuCash book on a MariaDB/MySQL server.
//!
//! Same tables as the SQLite book. The server keeps `prices.date` as a
//! DATETIME, read back as text so both backends share the date handling.

use super::{
    existing_dates, latest_per_commodity, plan_insert, InsertOutcome, PriceListing, PriceStore,
    StoreError, PRICE_SOURCE, PRICE_TYPE,
};
use crate::config::ConnectionConfig;
use crate::domain::{Commodity, PriceRow};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;
use tokio::runtime::Runtime;

const LIST_PRICES_SQL: &str = "
SELECT c.guid, c.namespace, c.mnemonic, COALESCE(c.fullname, ''),
       p.currency_guid, COALESCE(cur.mnemonic, ''), CAST(p.date AS CHAR), p.value_denom
FROM commodities c
JOIN prices p ON p.commodity_guid = c.guid
LEFT JOIN commodities cur ON cur.guid = p.currency_guid
WHERE c.namespace <> 'template'
";

type ListingRow = (String, String, String, String, String, String, String, i64);

/// One connection, driven on a private single-threaded runtime so the
/// store keeps the same blocking interface as the SQLite book.
pub struct MariaDbStore {
    conn: MySqlConnection,
    runtime: Runtime,
}

impl MariaDbStore {
    pub fn open(connection: &ConnectionConfig) -> Result<Self, StoreError> {
        let target = connection.describe();
        let connect_error = |reason: String| StoreError::Connection {
            target: target.clone(),
            reason,
        };

        let host = connection
            .host
            .as_deref()
            .ok_or_else(|| connect_error("no server host configured".into()))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| connect_error(e.to_string()))?;

        let options = MySqlConnectOptions::new()
            .host(host)
            .port(connection.port)
            .username(&connection.user)
            .password(&connection.pwd)
            .database(&connection.database);

        let conn = runtime
            .block_on(MySqlConnection::connect_with(&options))
            .map_err(|e| connect_error(e.to_string()))?;
        tracing::debug!(%target, "connected to book server");

        Ok(Self { conn, runtime })
    }
}

impl PriceStore for MariaDbStore {
    fn list_commodities(&mut self) -> Result<Vec<Commodity>, StoreError> {
        let rows = self
            .runtime
            .block_on(sqlx::query_as::<_, ListingRow>(LIST_PRICES_SQL).fetch_all(&mut self.conn))?;

        let listings = rows.into_iter().map(
            |(guid, namespace, mnemonic, fullname, currency_guid, currency, date, value_denom)| {
                PriceListing {
                    guid,
                    namespace,
                    mnemonic,
                    fullname,
                    currency_guid,
                    currency,
                    date,
                    value_denom,
                }
            },
        );

        let commodities = latest_per_commodity(listings);
        tracing::debug!(count = commodities.len(), "listed commodities");
        Ok(commodities)
    }

    fn insert_prices(
        &mut self,
        commodity: &Commodity,
        rows: &[PriceRow],
    ) -> Result<InsertOutcome, StoreError> {
        let conn = &mut self.conn;
        self.runtime.block_on(async move {
            let raw: Vec<String> =
                sqlx::query_scalar("SELECT CAST(date AS CHAR) FROM prices WHERE commodity_guid = ?")
                    .bind(&commodity.guid)
                    .fetch_all(&mut *conn)
                    .await?;
            let seen = existing_dates(raw, &commodity.mnemonic);
            let (prices, skipped) = plan_insert(commodity, rows, seen)?;

            let mut tx = conn.begin().await?;
            for price in &prices {
                sqlx::query(
                    "INSERT INTO prices
                        (guid, commodity_guid, currency_guid, date, source, type, value_num, value_denom)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&price.guid)
                .bind(&commodity.guid)
                .bind(&commodity.currency_guid)
                .bind(&price.date)
                .bind(PRICE_SOURCE)
                .bind(PRICE_TYPE)
                .bind(price.value_num)
                .bind(commodity.value_denom)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;

            Ok::<_, StoreError>(InsertOutcome {
                inserted: prices.len(),
                skipped,
            })
        })
    }
}
