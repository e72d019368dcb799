pub mod bitmart;

pub use bitmart::BitmartClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::ExchangeError;
use crate::types::{
    Balance, Candle, Market, Order, OrderBook, OrderRequest, Ticker, TimeFrame, Trade, WalletKind,
};

/// The normalized surface shared across exchange adapters. Operations that
/// must tell spot and contract instruments apart take a [`Market`]; spot-only
/// operations take the unified symbol string.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Current exchange server time, epoch milliseconds.
    async fn fetch_server_time(&self) -> Result<i64, ExchangeError>;
    async fn fetch_markets(&self) -> Result<Vec<Market>, ExchangeError>;
    async fn fetch_ticker(&self, market: &Market) -> Result<Ticker, ExchangeError>;
    async fn fetch_order_book(
        &self,
        symbol: &str,
        limit: Option<u32>,
    ) -> Result<OrderBook, ExchangeError>;
    async fn fetch_trades(&self, symbol: &str) -> Result<Vec<Trade>, ExchangeError>;
    async fn fetch_candles(
        &self,
        market: &Market,
        timeframe: TimeFrame,
        since: Option<DateTime<Utc>>,
        limit: Option<u32>,
    ) -> Result<Vec<Candle>, ExchangeError>;
    async fn create_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError>;
    async fn cancel_order(&self, id: &str, symbol: &str) -> Result<(), ExchangeError>;
    async fn fetch_order(&self, id: &str, symbol: &str) -> Result<Order, ExchangeError>;
    async fn fetch_balance(
        &self,
        wallet: WalletKind,
    ) -> Result<HashMap<String, Balance>, ExchangeError>;
}
