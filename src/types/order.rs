use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    GTC,
    IOC,
    FOK,
    /// Post-only.
    PO,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::GTC => "GTC",
            TimeInForce::IOC => "IOC",
            TimeInForce::FOK => "FOK",
            TimeInForce::PO => "PO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Failed,
    Open,
    PartiallyFilled,
    Filled,
    Canceling,
    Canceled,
}

impl OrderStatus {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OrderStatus::Open | OrderStatus::PartiallyFilled | OrderStatus::Canceling
        )
    }

    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatus::Failed | OrderStatus::Filled | OrderStatus::Canceled
        )
    }
}

/// A normalized order as reported by the exchange. Fields the exchange does
/// not echo for a given endpoint stay `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub created_at: Option<DateTime<Utc>>,
    pub side: Option<OrderSide>,
    pub order_type: Option<OrderType>,
    pub time_in_force: Option<TimeInForce>,
    pub post_only: bool,
    pub price: Option<Decimal>,
    pub average_price: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub filled: Option<Decimal>,
    pub notional: Option<Decimal>,
    pub filled_notional: Option<Decimal>,
    pub status: Option<OrderStatus>,
}

impl Order {
    pub fn remaining(&self) -> Option<Decimal> {
        Some(self.amount? - self.filled?)
    }
}

/// Parameters for placing an order. Market buys are priced in quote
/// currency: give either `notional` directly, or `price` so the cost can be
/// computed as `amount * price`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub amount: Option<Decimal>,
    pub price: Option<Decimal>,
    pub notional: Option<Decimal>,
    pub time_in_force: Option<TimeInForce>,
    pub post_only: bool,
    /// Route through the isolated-margin order endpoint.
    pub margin: bool,
}

impl OrderRequest {
    pub fn limit(symbol: impl Into<String>, side: OrderSide, amount: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            amount: Some(amount),
            price: Some(price),
            notional: None,
            time_in_force: Some(TimeInForce::GTC),
            post_only: false,
            margin: false,
        }
    }

    pub fn market_sell(symbol: impl Into<String>, amount: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side: OrderSide::Sell,
            order_type: OrderType::Market,
            amount: Some(amount),
            price: None,
            notional: None,
            time_in_force: None,
            post_only: false,
            margin: false,
        }
    }

    pub fn market_buy(symbol: impl Into<String>, notional: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            amount: None,
            price: None,
            notional: Some(notional),
            time_in_force: None,
            post_only: false,
            margin: false,
        }
    }

    pub fn post_only(mut self) -> Self {
        self.post_only = true;
        self
    }

    pub fn with_margin(mut self) -> Self {
        self.margin = true;
        self
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = Some(tif);
        self
    }
}

/// Statuses accepted by the order-history endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderQueryStatus {
    Open,
    Closed,
    Canceled,
}
