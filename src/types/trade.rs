use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OrderSide;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidityRole {
    Maker,
    Taker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeFee {
    pub cost: Decimal,
    pub currency: String,
}

/// A single execution, public or private. Public prints carry no id, order
/// id or fee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Option<String>,
    pub order_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub symbol: String,
    pub side: Option<OrderSide>,
    pub price: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub role: Option<LiquidityRole>,
    pub fee: Option<TradeFee>,
}

/// Maker/taker commission rates for a market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingFee {
    pub symbol: String,
    pub maker: Option<Decimal>,
    pub taker: Option<Decimal>,
}
