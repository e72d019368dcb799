use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 24h market statistics. Contract tickers omit the book-top fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub bid: Option<Decimal>,
    pub bid_volume: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub ask_volume: Option<Decimal>,
    pub open: Option<Decimal>,
    pub close: Option<Decimal>,
    pub last: Option<Decimal>,
    /// 24h change in percent, signed.
    pub percentage: Option<Decimal>,
    pub average: Option<Decimal>,
    pub base_volume: Option<Decimal>,
    pub quote_volume: Option<Decimal>,
}

impl Ticker {
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.ask? - self.bid?)
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        Some((self.ask? + self.bid?) / Decimal::from(2))
    }
}
