use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Candle steps supported by the kline endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFrame {
    M1,
    M3,
    M5,
    M15,
    M30,
    M45,
    H1,
    H2,
    H3,
    H4,
    D1,
    W1,
    Mo1,
}

impl TimeFrame {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::M1 => "1m",
            TimeFrame::M3 => "3m",
            TimeFrame::M5 => "5m",
            TimeFrame::M15 => "15m",
            TimeFrame::M30 => "30m",
            TimeFrame::M45 => "45m",
            TimeFrame::H1 => "1h",
            TimeFrame::H2 => "2h",
            TimeFrame::H3 => "3h",
            TimeFrame::H4 => "4h",
            TimeFrame::D1 => "1d",
            TimeFrame::W1 => "1w",
            TimeFrame::Mo1 => "1M",
        }
    }

    /// The `step` request parameter is the frame length in minutes.
    pub fn as_minutes(&self) -> u32 {
        match self {
            TimeFrame::M1 => 1,
            TimeFrame::M3 => 3,
            TimeFrame::M5 => 5,
            TimeFrame::M15 => 15,
            TimeFrame::M30 => 30,
            TimeFrame::M45 => 45,
            TimeFrame::H1 => 60,
            TimeFrame::H2 => 120,
            TimeFrame::H3 => 180,
            TimeFrame::H4 => 240,
            TimeFrame::D1 => 1440,
            TimeFrame::W1 => 10080,
            TimeFrame::Mo1 => 43200,
        }
    }

    pub fn as_seconds(&self) -> i64 {
        self.as_minutes() as i64 * 60
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub volume: Option<Decimal>,
}
