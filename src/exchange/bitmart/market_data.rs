use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use super::{datetime_from_millis, datetime_from_secs, dec_opt, BitmartClient};
use crate::error::ExchangeError;
use crate::types::{
    BookLevel, Candle, Currency, Market, MarketKind, MarketLimits, MarketPrecision, MinMax,
    OrderBook, OrderSide, ServiceAvailability, ServiceStatus, Ticker, TimeFrame, Trade,
};

const MAX_CANDLES: i64 = 500;

impl BitmartClient {
    /// Current exchange server time, epoch milliseconds.
    pub async fn fetch_server_time(&self) -> Result<i64, ExchangeError> {
        let data: RawServerTime = self.get_public("system/time", &[]).await?;
        Ok(data.server_time)
    }

    /// Availability of the exchange API service groups ("spot", "contract").
    pub async fn fetch_service_status(&self) -> Result<Vec<ServiceStatus>, ExchangeError> {
        let data: RawServices = self.get_public("system/service", &[]).await?;
        Ok(data.service.into_iter().map(parse_service).collect())
    }

    /// All spot pairs from the symbols-details endpoint.
    pub async fn fetch_spot_markets(&self) -> Result<Vec<Market>, ExchangeError> {
        let data: RawSymbolList<RawSpotMarket> =
            self.get_public("spot/v1/symbols/details", &[]).await?;
        let mut markets = Vec::with_capacity(data.symbols.len());
        for raw in &data.symbols {
            match parse_spot_market(raw) {
                Some(market) => markets.push(market),
                None => warn!(symbol = %raw.symbol, "skipping malformed spot market"),
            }
        }
        Ok(markets)
    }

    /// All perpetual and delivery contracts.
    pub async fn fetch_contract_markets(&self) -> Result<Vec<Market>, ExchangeError> {
        let data: RawSymbolList<RawContractMarket> =
            self.get_public("contract/public/details", &[]).await?;
        let mut markets = Vec::with_capacity(data.symbols.len());
        for raw in &data.symbols {
            match parse_contract_market(raw) {
                Some(market) => markets.push(market),
                None => warn!(symbol = %raw.symbol, "skipping malformed contract market"),
            }
        }
        Ok(markets)
    }

    /// Spot and contract markets combined; two HTTP calls.
    pub async fn fetch_markets(&self) -> Result<Vec<Market>, ExchangeError> {
        let mut markets = self.fetch_spot_markets().await?;
        markets.extend(self.fetch_contract_markets().await?);
        Ok(markets)
    }

    pub async fn fetch_currencies(&self) -> Result<Vec<Currency>, ExchangeError> {
        let data: RawCurrencyList = self.get_public("spot/v1/currencies", &[]).await?;
        Ok(data
            .currencies
            .into_iter()
            .filter_map(|raw| parse_currency(&raw))
            .collect())
    }

    /// 24h ticker for one market, spot or swap.
    pub async fn fetch_ticker(&self, market: &Market) -> Result<Ticker, ExchangeError> {
        let tickers: RawTickerList = if market.is_contract() {
            self.get_public(
                "contract/v1/tickers",
                &[("contract_symbol", market.id.clone())],
            )
            .await?
        } else {
            self.get_public("spot/v1/ticker", &[("symbol", market.id.clone())])
                .await?
        };
        let raw = tickers
            .tickers
            .iter()
            .find(|t| t.market_id() == Some(market.id.as_str()))
            .ok_or_else(|| {
                ExchangeError::BadSymbol(format!("no ticker returned for {}", market.id))
            })?;
        Ok(parse_ticker(raw, market.symbol.clone()))
    }

    /// All tickers of one market family.
    pub async fn fetch_tickers(&self, kind: MarketKind) -> Result<Vec<Ticker>, ExchangeError> {
        let path = match kind {
            MarketKind::Spot => "spot/v2/ticker",
            MarketKind::Swap | MarketKind::Futures => "contract/v1/tickers",
        };
        let tickers: RawTickerList = self.get_public(path, &[]).await?;
        Ok(tickers
            .tickers
            .iter()
            .filter_map(|raw| {
                let symbol = raw.unified_symbol(kind)?;
                Some(parse_ticker(raw, symbol))
            })
            .collect())
    }

    /// Aggregated order book for a spot symbol. `limit` defaults to 50
    /// server-side, max 200.
    pub async fn fetch_order_book(
        &self,
        symbol: &str,
        limit: Option<u32>,
    ) -> Result<OrderBook, ExchangeError> {
        let market_id = require_spot_symbol(symbol, "fetch_order_book")?;
        let mut params = vec![("symbol", market_id)];
        if let Some(limit) = limit {
            params.push(("size", limit.to_string()));
        }
        let data: RawOrderBook = self.get_public("spot/v1/symbols/book", &params).await?;
        Ok(OrderBook {
            symbol: symbol.to_string(),
            timestamp: data.timestamp.and_then(datetime_from_millis),
            bids: data.buys.iter().filter_map(parse_book_level).collect(),
            asks: data.sells.iter().filter_map(parse_book_level).collect(),
        })
    }

    /// Most recent public trades for a spot symbol.
    pub async fn fetch_trades(&self, symbol: &str) -> Result<Vec<Trade>, ExchangeError> {
        let market_id = require_spot_symbol(symbol, "fetch_trades")?;
        let data: RawTradeList = self
            .get_public("spot/v1/symbols/trades", &[("symbol", market_id)])
            .await?;
        Ok(data
            .trades
            .iter()
            .map(|raw| parse_trade(raw, symbol))
            .collect())
    }

    /// Historical candles. At most 500 per request; the window is derived
    /// from `since`/`limit` the way the exchange expects.
    pub async fn fetch_candles(
        &self,
        market: &Market,
        timeframe: TimeFrame,
        since: Option<DateTime<Utc>>,
        limit: Option<u32>,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let limit = limit.map(i64::from).unwrap_or(MAX_CANDLES).min(MAX_CANDLES);
        let now = Utc::now().timestamp();
        let (start, end) = candle_window(
            now,
            timeframe.as_seconds(),
            since.map(|dt| dt.timestamp_millis()),
            limit,
        );
        let step = timeframe.as_minutes().to_string();

        if market.is_contract() {
            let params = [
                ("symbol", market.id.clone()),
                ("step", step),
                ("start_time", start.to_string()),
                ("end_time", end.to_string()),
            ];
            let data: Vec<RawCandle> = self.get_public("contract/public/kline", &params).await?;
            Ok(data.iter().map(parse_candle).collect())
        } else {
            let params = [
                ("symbol", market.id.clone()),
                ("step", step),
                ("from", start.to_string()),
                ("to", end.to_string()),
            ];
            let data: RawKlineList = self.get_public("spot/v1/symbols/kline", &params).await?;
            Ok(data.klines.iter().map(parse_candle).collect())
        }
    }
}

/// Validates that a unified symbol is usable on a spot-only endpoint and
/// returns the exchange id.
pub(crate) fn require_spot_symbol(
    symbol: &str,
    operation: &str,
) -> Result<String, ExchangeError> {
    if symbol.is_empty() {
        return Err(ExchangeError::ArgumentsRequired(format!(
            "{} requires a symbol",
            operation
        )));
    }
    if symbol.contains(':') {
        return Err(ExchangeError::NotSupported(format!(
            "{} only supports spot symbols, got {}",
            operation, symbol
        )));
    }
    Ok(Market::id_from_symbol(symbol))
}

/// The request window in epoch seconds. With no `since` the window ends
/// now and spans `limit` frames; with `since` it starts one second before
/// it and never extends past now.
pub(crate) fn candle_window(
    now_secs: i64,
    duration_secs: i64,
    since_millis: Option<i64>,
    limit: i64,
) -> (i64, i64) {
    match since_millis {
        None => (now_secs - limit * duration_secs, now_secs),
        Some(since) => {
            let start = since / 1000 - 1;
            let end = (start + limit * duration_secs).min(now_secs);
            (start, end)
        }
    }
}

fn parse_service(raw: RawService) -> ServiceStatus {
    let availability = if raw.status == Some(2) {
        ServiceAvailability::Ok
    } else {
        ServiceAvailability::Maintenance
    };
    let eta = match availability {
        ServiceAvailability::Ok => None,
        ServiceAvailability::Maintenance => raw.end_time.and_then(datetime_from_millis),
    };
    ServiceStatus {
        service_type: raw.service_type.unwrap_or_default(),
        title: raw.title,
        availability,
        eta,
    }
}

pub(crate) fn parse_spot_market(raw: &RawSpotMarket) -> Option<Market> {
    if raw.symbol.is_empty() || raw.base_currency.is_empty() || raw.quote_currency.is_empty() {
        return None;
    }
    let base = super::currency_code(&raw.base_currency);
    let quote = super::currency_code(&raw.quote_currency);
    let amount_min = dec_opt(raw.base_min_size.as_deref());
    let min_buy = dec_opt(raw.min_buy_amount.as_deref());
    let min_sell = dec_opt(raw.min_sell_amount.as_deref());
    let min_cost = match (min_buy, min_sell) {
        (Some(buy), Some(sell)) => Some(buy.max(sell)),
        (buy, sell) => buy.or(sell),
    };
    Some(Market {
        id: raw.symbol.clone(),
        numeric_id: raw.symbol_id,
        symbol: format!("{}/{}", base, quote),
        base,
        quote,
        settle: None,
        base_id: raw.base_currency.clone(),
        quote_id: raw.quote_currency.clone(),
        settle_id: None,
        kind: MarketKind::Spot,
        active: true,
        margin: false,
        contract_size: None,
        linear: None,
        inverse: None,
        expiry: None,
        precision: MarketPrecision {
            amount: amount_min,
            price: raw.price_max_precision.and_then(precision_from_digits),
        },
        limits: MarketLimits {
            amount: MinMax {
                min: amount_min,
                max: dec_opt(raw.base_max_size.as_deref()),
            },
            price: MinMax::default(),
            cost: MinMax {
                min: min_cost,
                max: None,
            },
            leverage: MinMax::default(),
        },
    })
}

pub(crate) fn parse_contract_market(raw: &RawContractMarket) -> Option<Market> {
    if raw.symbol.is_empty() || raw.base_currency.is_empty() || raw.quote_currency.is_empty() {
        return None;
    }
    let base = super::currency_code(&raw.base_currency);
    let quote = super::currency_code(&raw.quote_currency);
    // All listed contracts are linear and settle in USDT.
    let settle = "USDT".to_string();
    let is_futures = raw.product_type == Some(2);
    let kind = if is_futures {
        MarketKind::Futures
    } else {
        MarketKind::Swap
    };
    Some(Market {
        id: raw.symbol.clone(),
        numeric_id: None,
        symbol: format!("{}/{}:{}", base, quote, settle),
        base,
        quote,
        settle: Some(settle.clone()),
        base_id: raw.base_currency.clone(),
        quote_id: raw.quote_currency.clone(),
        settle_id: Some(settle),
        kind,
        active: true,
        margin: false,
        contract_size: dec_opt(raw.contract_size.as_deref()),
        linear: Some(true),
        inverse: Some(false),
        expiry: raw.expire_timestamp.and_then(datetime_from_secs),
        precision: MarketPrecision {
            amount: dec_opt(raw.vol_precision.as_deref()),
            price: dec_opt(raw.price_precision.as_deref()),
        },
        limits: MarketLimits {
            amount: MinMax {
                min: dec_opt(raw.min_volume.as_deref()),
                max: dec_opt(raw.max_volume.as_deref()),
            },
            price: MinMax::default(),
            cost: MinMax::default(),
            leverage: MinMax {
                min: dec_opt(raw.min_leverage.as_deref()),
                max: dec_opt(raw.max_leverage.as_deref()),
            },
        },
    })
}

/// Price precision arrives as a digit count; the tick is 10^-n.
fn precision_from_digits(digits: i64) -> Option<Decimal> {
    if (0..=28).contains(&digits) {
        Some(Decimal::new(1, digits as u32))
    } else {
        None
    }
}

fn parse_currency(raw: &RawCurrency) -> Option<Currency> {
    let id = raw.currency.clone().or_else(|| raw.id.clone())?;
    let deposit = raw.deposit_enabled.unwrap_or(false);
    let withdraw = raw.withdraw_enabled.unwrap_or(false);
    Some(Currency {
        code: super::currency_code(&id),
        id,
        name: raw.name.clone(),
        active: deposit && withdraw,
        deposit,
        withdraw,
    })
}

pub(crate) fn parse_ticker(raw: &RawTicker, symbol: String) -> Ticker {
    // The spot "fluctuation" field is a signed fraction; contract tickers
    // report the percentage directly.
    let percentage = dec_opt(raw.price_change_percent_24h.as_deref()).or_else(|| {
        dec_opt(raw.fluctuation.as_deref()).map(|fraction| fraction * Decimal::from(100))
    });
    let last = dec_opt(raw.close_24h.as_deref()).or_else(|| dec_opt(raw.last_price.as_deref()));
    Ticker {
        symbol,
        timestamp: raw
            .timestamp
            .and_then(datetime_from_millis)
            .unwrap_or_else(Utc::now),
        high: dec_opt(raw.high_24h.as_deref()).or_else(|| dec_opt(raw.high_price.as_deref())),
        low: dec_opt(raw.low_24h.as_deref()).or_else(|| dec_opt(raw.low_price.as_deref())),
        bid: dec_opt(raw.best_bid.as_deref()),
        bid_volume: dec_opt(raw.best_bid_size.as_deref()),
        ask: dec_opt(raw.best_ask.as_deref()),
        ask_volume: dec_opt(raw.best_ask_size.as_deref()),
        open: dec_opt(raw.open_24h.as_deref()),
        close: last,
        last,
        percentage,
        average: dec_opt(raw.avg_price.as_deref()).or_else(|| dec_opt(raw.index_price.as_deref())),
        base_volume: dec_opt(raw.base_volume_24h.as_deref()),
        quote_volume: dec_opt(raw.volume_24h.as_deref())
            .or_else(|| dec_opt(raw.quote_volume_24h.as_deref())),
    }
}

fn parse_book_level(raw: &RawBookEntry) -> Option<BookLevel> {
    Some(BookLevel {
        price: dec_opt(raw.price.as_deref())?,
        amount: dec_opt(raw.amount.as_deref())?,
    })
}

/// Normalizes both the public-print and the private-fill dialects.
pub(crate) fn parse_trade(raw: &RawTrade, symbol: &str) -> Trade {
    let side = match raw
        .trade_type
        .as_deref()
        .or(raw.side.as_deref())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("buy") => Some(OrderSide::Buy),
        Some("sell") => Some(OrderSide::Sell),
        _ => None,
    };
    let role = raw.exec_type.as_deref().map(|exec| {
        if exec == "M" {
            crate::types::LiquidityRole::Maker
        } else {
            crate::types::LiquidityRole::Taker
        }
    });
    let price = dec_opt(raw.price_avg.as_deref()).or_else(|| dec_opt(raw.price.as_deref()));
    let amount = dec_opt(raw.size.as_deref()).or_else(|| dec_opt(raw.count.as_deref()));
    let cost = dec_opt(raw.amount.as_deref()).or_else(|| dec_opt(raw.notional.as_deref()));
    let fee = dec_opt(raw.fees.as_deref()).map(|cost| {
        // Fee currency defaults by side when the exchange leaves it out.
        let currency = match raw.fee_coin_name.clone().filter(|c| !c.is_empty()) {
            Some(coin) => coin,
            None => {
                let (base, quote) = Market::split_symbol(symbol).unwrap_or_default();
                match side {
                    Some(OrderSide::Buy) => base,
                    _ => quote,
                }
            }
        };
        crate::types::TradeFee { cost, currency }
    });
    Trade {
        id: raw.detail_id.as_ref().and_then(super::json_string),
        order_id: raw.order_id.as_ref().and_then(super::json_string),
        timestamp: raw
            .order_time
            .as_ref()
            .or(raw.create_time.as_ref())
            .and_then(super::json_i64)
            .and_then(datetime_from_millis),
        symbol: symbol.to_string(),
        side,
        price,
        amount,
        cost,
        role,
        fee,
    }
}

pub(crate) fn parse_candle(raw: &RawCandle) -> Candle {
    Candle {
        timestamp: raw
            .timestamp
            .and_then(datetime_from_secs)
            .unwrap_or_else(Utc::now),
        open: dec_opt(raw.open.as_deref()).or_else(|| dec_opt(raw.open_price.as_deref())),
        high: dec_opt(raw.high.as_deref()).or_else(|| dec_opt(raw.high_price.as_deref())),
        low: dec_opt(raw.low.as_deref()).or_else(|| dec_opt(raw.low_price.as_deref())),
        close: dec_opt(raw.close.as_deref()).or_else(|| dec_opt(raw.close_price.as_deref())),
        volume: dec_opt(raw.volume.as_deref()),
    }
}

// API response types

#[derive(Debug, Deserialize)]
pub(crate) struct RawServerTime {
    pub server_time: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawServices {
    #[serde(default)]
    pub service: Vec<RawService>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawService {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSymbolList<T> {
    #[serde(default = "Vec::new")]
    pub symbols: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSpotMarket {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub symbol_id: Option<i64>,
    #[serde(default)]
    pub base_currency: String,
    #[serde(default)]
    pub quote_currency: String,
    #[serde(default)]
    pub base_min_size: Option<String>,
    #[serde(default)]
    pub base_max_size: Option<String>,
    #[serde(default)]
    pub price_max_precision: Option<i64>,
    #[serde(default)]
    pub min_buy_amount: Option<String>,
    #[serde(default)]
    pub min_sell_amount: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawContractMarket {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub product_type: Option<i64>,
    #[serde(default)]
    pub expire_timestamp: Option<i64>,
    #[serde(default)]
    pub base_currency: String,
    #[serde(default)]
    pub quote_currency: String,
    #[serde(default)]
    pub contract_size: Option<String>,
    #[serde(default)]
    pub min_leverage: Option<String>,
    #[serde(default)]
    pub max_leverage: Option<String>,
    #[serde(default)]
    pub price_precision: Option<String>,
    #[serde(default)]
    pub vol_precision: Option<String>,
    #[serde(default)]
    pub max_volume: Option<String>,
    #[serde(default)]
    pub min_volume: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCurrencyList {
    #[serde(default)]
    pub currencies: Vec<RawCurrency>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCurrency {
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub withdraw_enabled: Option<bool>,
    #[serde(default)]
    pub deposit_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTickerList {
    #[serde(default)]
    pub tickers: Vec<RawTicker>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawTicker {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub contract_symbol: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub last_price: Option<String>,
    #[serde(default)]
    pub close_24h: Option<String>,
    #[serde(default)]
    pub open_24h: Option<String>,
    #[serde(default)]
    pub high_24h: Option<String>,
    #[serde(default)]
    pub low_24h: Option<String>,
    #[serde(default)]
    pub high_price: Option<String>,
    #[serde(default)]
    pub low_price: Option<String>,
    #[serde(default)]
    pub best_ask: Option<String>,
    #[serde(default)]
    pub best_ask_size: Option<String>,
    #[serde(default)]
    pub best_bid: Option<String>,
    #[serde(default)]
    pub best_bid_size: Option<String>,
    #[serde(default)]
    pub fluctuation: Option<String>,
    #[serde(default)]
    pub price_change_percent_24h: Option<String>,
    #[serde(default)]
    pub base_volume_24h: Option<String>,
    #[serde(default)]
    pub quote_volume_24h: Option<String>,
    #[serde(default)]
    pub volume_24h: Option<String>,
    #[serde(default)]
    pub avg_price: Option<String>,
    #[serde(default)]
    pub index_price: Option<String>,
}

impl RawTicker {
    fn market_id(&self) -> Option<&str> {
        self.symbol
            .as_deref()
            .or(self.contract_symbol.as_deref())
    }

    fn unified_symbol(&self, kind: MarketKind) -> Option<String> {
        let id = self.market_id()?;
        match kind {
            MarketKind::Spot => Some(id.replace('_', "/")),
            // Contract ids carry no separator; keep them verbatim.
            MarketKind::Swap | MarketKind::Futures => Some(id.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawOrderBook {
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub buys: Vec<RawBookEntry>,
    #[serde(default)]
    pub sells: Vec<RawBookEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBookEntry {
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTradeList {
    #[serde(default)]
    pub trades: Vec<RawTrade>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawTrade {
    #[serde(default)]
    pub detail_id: Option<serde_json::Value>,
    #[serde(default)]
    pub order_id: Option<serde_json::Value>,
    #[serde(default)]
    pub order_time: Option<serde_json::Value>,
    #[serde(default)]
    pub create_time: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    pub trade_type: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub price_avg: Option<String>,
    #[serde(default)]
    pub count: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub notional: Option<String>,
    #[serde(default)]
    pub fees: Option<String>,
    #[serde(default)]
    pub fee_coin_name: Option<String>,
    #[serde(default)]
    pub exec_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawKlineList {
    #[serde(default)]
    pub klines: Vec<RawCandle>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCandle {
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub open: Option<String>,
    #[serde(default)]
    pub high: Option<String>,
    #[serde(default)]
    pub low: Option<String>,
    #[serde(default)]
    pub close: Option<String>,
    #[serde(default)]
    pub open_price: Option<String>,
    #[serde(default)]
    pub high_price: Option<String>,
    #[serde(default)]
    pub low_price: Option<String>,
    #[serde(default)]
    pub close_price: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
}
