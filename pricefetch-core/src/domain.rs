//! Domain types: commodities from the book and the price rows built for them.

use chrono::NaiveDate;
use serde::Serialize;

/// GnuCash namespace for currencies.
pub const CURRENCY_NAMESPACE: &str = "CURRENCY";

/// A commodity tracked in the book, with its newest stored price.
#[derive(Debug, Clone, PartialEq)]
pub struct Commodity {
    pub guid: String,
    pub namespace: String,
    /// Ticker symbol, e.g. `VWRL.AS` or `USD`.
    pub mnemonic: String,
    pub fullname: String,
    /// Currency the commodity's prices are quoted in.
    pub currency_guid: String,
    pub currency: String,
    pub last_price_date: NaiveDate,
    /// Denominator used for `value_num / value_denom` in the prices table.
    pub value_denom: i64,
}

impl Commodity {
    pub fn is_currency(&self) -> bool {
        self.namespace.eq_ignore_ascii_case(CURRENCY_NAMESPACE)
    }

    /// Symbol to ask the provider for. Currencies are quoted as an FX pair
    /// against the book currency (`USDEUR=X`).
    pub fn provider_symbol(&self, book_currency: &str) -> String {
        if self.is_currency() {
            format!("{}{}=X", self.mnemonic, book_currency)
        } else {
            self.mnemonic.clone()
        }
    }

    /// Decimal places kept for this commodity's prices.
    pub fn price_decimals(&self) -> i32 {
        if self.is_currency() {
            5
        } else {
            2
        }
    }
}

/// One (date, close) observation from a provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// A price ready to be persisted. Serializes as `symbol,date,price,currency`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRow {
    pub symbol: String,
    #[serde(skip)]
    pub commodity_guid: String,
    pub date: NaiveDate,
    pub price: f64,
    pub currency: String,
}

impl PriceRow {
    /// Build rows for `commodity` from provider points, rounding prices and
    /// dropping non-finite closes. Rows come out ordered by date with one
    /// row per date.
    pub fn from_points(commodity: &Commodity, currency: &str, points: &[PricePoint]) -> Vec<PriceRow> {
        let decimals = commodity.price_decimals();
        let mut rows: Vec<PriceRow> = points
            .iter()
            .filter(|p| p.close.is_finite())
            .map(|p| PriceRow {
                symbol: commodity.mnemonic.clone(),
                commodity_guid: commodity.guid.clone(),
                date: p.date,
                price: round_to(p.close, decimals),
                currency: currency.to_string(),
            })
            .collect();
        rows.sort_by_key(|r| r.date);
        // Keep the last observation of a day.
        rows.reverse();
        rows.dedup_by_key(|r| r.date);
        rows.reverse();
        rows
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn commodity(namespace: &str, mnemonic: &str) -> Commodity {
        Commodity {
            guid: "c0ffee".into(),
            namespace: namespace.into(),
            mnemonic: mnemonic.into(),
            fullname: "Test".into(),
            currency_guid: "e0e0".into(),
            currency: "EUR".into(),
            last_price_date: d(2024, 1, 1),
            value_denom: 100,
        }
    }

    #[test]
    fn currency_symbol_is_fx_pair() {
        assert_eq!(commodity("CURRENCY", "USD").provider_symbol("EUR"), "USDEUR=X");
        assert_eq!(commodity("NASDAQ", "AAPL").provider_symbol("EUR"), "AAPL");
    }

    #[test]
    fn rows_are_rounded_per_namespace() {
        let points = [PricePoint {
            date: d(2024, 1, 2),
            close: 1.0987654,
        }];
        let fx = PriceRow::from_points(&commodity("CURRENCY", "USD"), "EUR", &points);
        assert_eq!(fx[0].price, 1.09877);
        let stock = PriceRow::from_points(&commodity("FUND", "VWRL"), "EUR", &points);
        assert_eq!(stock[0].price, 1.1);
        assert_eq!(stock[0].symbol, "VWRL");
        assert_eq!(stock[0].currency, "EUR");
    }

    #[test]
    fn rows_are_sorted_unique_and_finite() {
        let points = [
            PricePoint { date: d(2024, 1, 3), close: 11.0 },
            PricePoint { date: d(2024, 1, 2), close: f64::NAN },
            PricePoint { date: d(2024, 1, 2), close: 10.0 },
            PricePoint { date: d(2024, 1, 3), close: 12.0 },
        ];
        let rows = PriceRow::from_points(&commodity("FUND", "X"), "EUR", &points);
        let got: Vec<(NaiveDate, f64)> = rows.iter().map(|r| (r.date, r.price)).collect();
        assert_eq!(got, vec![(d(2024, 1, 2), 10.0), (d(2024, 1, 3), 12.0)]);
    }
}
