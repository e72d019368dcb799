use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketKind {
    Spot,
    Swap,
    Futures,
}

impl MarketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketKind::Spot => "spot",
            MarketKind::Swap => "swap",
            MarketKind::Futures => "futures",
        }
    }

    pub fn is_contract(&self) -> bool {
        matches!(self, MarketKind::Swap | MarketKind::Futures)
    }
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MinMax {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MarketPrecision {
    pub amount: Option<Decimal>,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketLimits {
    pub amount: MinMax,
    pub price: MinMax,
    pub cost: MinMax,
    pub leverage: MinMax,
}

/// A tradable instrument, normalized across spot pairs and contracts.
/// `id` is the exchange's own identifier ("BTC_USDT" for spot, "BTCUSDT"
/// for contracts); `symbol` is the unified form ("BTC/USDT", contracts
/// "BTC/USDT:USDT").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub numeric_id: Option<i64>,
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub settle: Option<String>,
    pub base_id: String,
    pub quote_id: String,
    pub settle_id: Option<String>,
    pub kind: MarketKind,
    pub active: bool,
    pub margin: bool,
    pub contract_size: Option<Decimal>,
    pub linear: Option<bool>,
    pub inverse: Option<bool>,
    pub expiry: Option<DateTime<Utc>>,
    pub precision: MarketPrecision,
    pub limits: MarketLimits,
}

impl Market {
    pub fn is_spot(&self) -> bool {
        self.kind == MarketKind::Spot
    }

    pub fn is_swap(&self) -> bool {
        self.kind == MarketKind::Swap
    }

    pub fn is_contract(&self) -> bool {
        self.kind.is_contract()
    }

    /// Exchange id for a unified spot symbol: "BTC/USDT" -> "BTC_USDT".
    pub fn id_from_symbol(symbol: &str) -> String {
        let bare = symbol.split(':').next().unwrap_or(symbol);
        bare.replace('/', "_")
    }

    /// Base and quote codes of a unified symbol, if it has both parts.
    pub fn split_symbol(symbol: &str) -> Option<(String, String)> {
        let bare = symbol.split(':').next().unwrap_or(symbol);
        let (base, quote) = bare.split_once('/')?;
        if base.is_empty() || quote.is_empty() {
            return None;
        }
        Some((base.to_string(), quote.to_string()))
    }
}

/// A currency listed on the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Currency {
    pub id: String,
    pub code: String,
    pub name: Option<String>,
    pub active: bool,
    pub deposit: bool,
    pub withdraw: bool,
}

/// Availability of one of the exchange's API service groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceAvailability {
    Ok,
    Maintenance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service_type: String,
    pub title: Option<String>,
    pub availability: ServiceAvailability,
    pub eta: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_symbol() {
        assert_eq!(Market::id_from_symbol("BTC/USDT"), "BTC_USDT");
        assert_eq!(Market::id_from_symbol("ETH/BTC"), "ETH_BTC");
        assert_eq!(Market::id_from_symbol("BTC/USDT:USDT"), "BTC_USDT");
    }

    #[test]
    fn test_split_symbol() {
        assert_eq!(
            Market::split_symbol("BTC/USDT"),
            Some(("BTC".to_string(), "USDT".to_string()))
        );
        assert_eq!(
            Market::split_symbol("BTC/USDT:USDT"),
            Some(("BTC".to_string(), "USDT".to_string()))
        );
        assert_eq!(Market::split_symbol("BTCUSDT"), None);
        assert_eq!(Market::split_symbol("/USDT"), None);
    }

    #[test]
    fn test_market_kind_flags() {
        assert!(!MarketKind::Spot.is_contract());
        assert!(MarketKind::Swap.is_contract());
        assert!(MarketKind::Futures.is_contract());
    }
}
