use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub amount: Decimal,
}

/// Aggregated order book snapshot. Bids descend, asks ascend, as delivered
/// by the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub symbol: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<BookLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<BookLevel> {
        self.asks.first().copied()
    }

    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        Some((self.best_ask()?.price + self.best_bid()?.price) / Decimal::from(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_top_of_book() {
        let book = OrderBook {
            symbol: "ETH/BTC".to_string(),
            timestamp: None,
            bids: vec![
                BookLevel {
                    price: dec!(0.034047),
                    amount: dec!(4.7091),
                },
                BookLevel {
                    price: dec!(0.034039),
                    amount: dec!(5.7439),
                },
            ],
            asks: vec![BookLevel {
                price: dec!(0.034174),
                amount: dec!(41.4365),
            }],
        };
        assert_eq!(book.best_bid().unwrap().price, dec!(0.034047));
        assert_eq!(book.spread(), Some(dec!(0.000127)));
        assert_eq!(book.mid_price(), Some(dec!(0.0341105)));
    }

    #[test]
    fn test_empty_book() {
        let book = OrderBook {
            symbol: "ETH/BTC".to_string(),
            timestamp: None,
            bids: vec![],
            asks: vec![],
        };
        assert!(book.best_bid().is_none());
        assert!(book.spread().is_none());
    }
}
