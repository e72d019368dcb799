use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::market_data::{parse_trade, require_spot_symbol, RawTrade};
use super::{datetime_from_millis, dec_opt, json_string, BitmartClient};
use crate::error::ExchangeError;
use crate::types::{
    Market, MarketKind, Order, OrderQueryStatus, OrderRequest, OrderSide, OrderStatus, OrderType,
    TimeInForce, TradingFee, Trade,
};

impl BitmartClient {
    /// Places a spot or isolated-margin order.
    ///
    /// Market buys are priced in quote currency: the request must carry a
    /// `notional`, or a `price` so the cost can be computed from the amount.
    pub async fn create_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError> {
        let (path, body) = build_submit_order(request)?;
        let data: RawOrderId = self.post_private(path, &body).await?;
        let id = data
            .order_id
            .as_ref()
            .and_then(json_string)
            .ok_or_else(|| ExchangeError::Parse("order response carried no order_id".into()))?;
        info!(order_id = %id, symbol = %request.symbol, side = %request.side, "order placed");
        let time_in_force = if request.post_only {
            Some(TimeInForce::PO)
        } else {
            request.time_in_force
        };
        Ok(Order {
            id,
            symbol: request.symbol.clone(),
            created_at: None,
            side: Some(request.side),
            order_type: Some(request.order_type),
            time_in_force,
            post_only: request.post_only,
            price: request.price,
            average_price: None,
            amount: request.amount,
            filled: None,
            notional: request.notional,
            filled_notional: None,
            status: None,
        })
    }

    /// Cancels one open spot order.
    pub async fn cancel_order(&self, id: &str, symbol: &str) -> Result<(), ExchangeError> {
        if id.is_empty() {
            return Err(ExchangeError::ArgumentsRequired(
                "cancel_order requires an order id".into(),
            ));
        }
        let market_id = require_spot_symbol(symbol, "cancel_order")?;
        let body = CancelOrderBody {
            order_id: id.to_string(),
            symbol: market_id,
        };
        let data: Value = self.post_private("spot/v3/cancel_order", &body).await?;
        check_cancel_result(&data, id, symbol)?;
        info!(order_id = %id, symbol = %symbol, "order canceled");
        Ok(())
    }

    /// Cancels every open spot order, optionally scoped to a symbol and
    /// side.
    pub async fn cancel_all_orders(
        &self,
        symbol: Option<&str>,
        side: Option<OrderSide>,
    ) -> Result<(), ExchangeError> {
        let symbol = symbol
            .map(|s| require_spot_symbol(s, "cancel_all_orders"))
            .transpose()?;
        let body = CancelAllOrdersBody {
            symbol,
            side: side.map(|s| s.as_str().to_string()),
        };
        let _: Value = self.post_private("spot/v1/cancel_orders", &body).await?;
        info!("open orders canceled");
        Ok(())
    }

    pub async fn fetch_order(&self, id: &str, symbol: &str) -> Result<Order, ExchangeError> {
        if id.is_empty() {
            return Err(ExchangeError::ArgumentsRequired(
                "fetch_order requires an order id".into(),
            ));
        }
        let market_id = require_spot_symbol(symbol, "fetch_order")?;
        let params = [
            ("symbol", market_id),
            ("order_id", id.to_string()),
        ];
        let raw: RawOrder = self.get_private("spot/v2/order_detail", &params).await?;
        Ok(parse_order(&raw, MarketKind::Spot))
    }

    pub async fn fetch_orders_by_status(
        &self,
        status: OrderQueryStatus,
        symbol: &str,
    ) -> Result<Vec<Order>, ExchangeError> {
        let market_id = require_spot_symbol(symbol, "fetch_orders_by_status")?;
        let status_code = match status {
            OrderQueryStatus::Open => 9,
            OrderQueryStatus::Closed => 6,
            OrderQueryStatus::Canceled => 8,
        };
        let params = [
            ("symbol", market_id),
            ("offset", "1".to_string()),
            ("N", "100".to_string()),
            ("status", status_code.to_string()),
        ];
        let data: RawOrderList = self.get_private("spot/v3/orders", &params).await?;
        Ok(data
            .orders
            .iter()
            .map(|raw| parse_order(raw, MarketKind::Spot))
            .collect())
    }

    pub async fn fetch_open_orders(&self, symbol: &str) -> Result<Vec<Order>, ExchangeError> {
        self.fetch_orders_by_status(OrderQueryStatus::Open, symbol)
            .await
    }

    pub async fn fetch_closed_orders(&self, symbol: &str) -> Result<Vec<Order>, ExchangeError> {
        self.fetch_orders_by_status(OrderQueryStatus::Closed, symbol)
            .await
    }

    pub async fn fetch_canceled_orders(&self, symbol: &str) -> Result<Vec<Order>, ExchangeError> {
        self.fetch_orders_by_status(OrderQueryStatus::Canceled, symbol)
            .await
    }

    /// The account's own fills for a spot symbol, newest first.
    pub async fn fetch_my_trades(
        &self,
        symbol: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Trade>, ExchangeError> {
        let market_id = require_spot_symbol(symbol, "fetch_my_trades")?;
        let params = [
            ("symbol", market_id),
            ("N", limit.unwrap_or(200).to_string()),
        ];
        let data: RawMyTradeList = self.get_private("spot/v2/trades", &params).await?;
        Ok(data
            .trades
            .iter()
            .map(|raw| parse_trade(raw, symbol))
            .collect())
    }

    /// Fills belonging to a single order.
    pub async fn fetch_order_trades(
        &self,
        order_id: &str,
        symbol: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Trade>, ExchangeError> {
        if order_id.is_empty() {
            return Err(ExchangeError::ArgumentsRequired(
                "fetch_order_trades requires an order id".into(),
            ));
        }
        let market_id = require_spot_symbol(symbol, "fetch_order_trades")?;
        let params = [
            ("symbol", market_id),
            ("order_id", order_id.to_string()),
            ("N", limit.unwrap_or(200).to_string()),
        ];
        let data: RawMyTradeList = self.get_private("spot/v2/trades", &params).await?;
        Ok(data
            .trades
            .iter()
            .map(|raw| parse_trade(raw, symbol))
            .collect())
    }

    /// Maker/taker commission rates for one spot symbol.
    pub async fn fetch_trading_fee(&self, symbol: &str) -> Result<TradingFee, ExchangeError> {
        let market_id = require_spot_symbol(symbol, "fetch_trading_fee")?;
        let params = [("symbol", market_id)];
        let raw: RawTradingFee = self.get_private("spot/v1/trade_fee", &params).await?;
        Ok(TradingFee {
            symbol: symbol.to_string(),
            maker: dec_opt(raw.maker_fee_rate.as_deref()),
            taker: dec_opt(raw.taker_fee_rate.as_deref()),
        })
    }
}

/// Resolves the endpoint and request body for an order, validating the
/// argument combinations before any network traffic.
pub(crate) fn build_submit_order(
    request: &OrderRequest,
) -> Result<(&'static str, SubmitOrderBody), ExchangeError> {
    if request.symbol.is_empty() {
        return Err(ExchangeError::ArgumentsRequired(
            "create_order requires a symbol".into(),
        ));
    }
    if request.time_in_force == Some(TimeInForce::FOK) {
        return Err(ExchangeError::InvalidOrder(
            "only IOC and PO time-in-force values are accepted".into(),
        ));
    }
    let is_market = request.order_type == OrderType::Market;
    let ioc = request.time_in_force == Some(TimeInForce::IOC);
    if is_market && (request.post_only || ioc) {
        return Err(ExchangeError::InvalidOrder(
            "market orders cannot be post-only or IOC".into(),
        ));
    }

    let order_type = if request.post_only {
        "limit_maker"
    } else if ioc {
        "ioc"
    } else {
        request.order_type.as_str()
    };

    let mut body = SubmitOrderBody {
        symbol: Market::id_from_symbol(&request.symbol),
        side: request.side.as_str().to_string(),
        order_type: order_type.to_string(),
        size: None,
        price: None,
        notional: None,
    };

    if is_market {
        match request.side {
            OrderSide::Sell => {
                let amount = request.amount.ok_or_else(|| {
                    ExchangeError::ArgumentsRequired("market sell orders require an amount".into())
                })?;
                body.size = Some(amount.to_string());
            }
            OrderSide::Buy => {
                // Market buys spend quote currency; derive the cost from
                // price * amount when no notional was given.
                let notional = request.notional.or_else(|| {
                    Some(request.amount? * request.price?)
                });
                let notional = notional.ok_or_else(|| {
                    ExchangeError::InvalidOrder(
                        "market buy orders require a notional, or a price and amount to compute the total cost"
                            .into(),
                    )
                })?;
                body.notional = Some(notional.to_string());
            }
        }
    } else {
        let amount = request.amount.ok_or_else(|| {
            ExchangeError::ArgumentsRequired("limit orders require an amount".into())
        })?;
        let price = request.price.ok_or_else(|| {
            ExchangeError::ArgumentsRequired("limit orders require a price".into())
        })?;
        body.size = Some(amount.to_string());
        body.price = Some(price.to_string());
    }

    let path = if request.margin {
        "spot/v1/margin/submit_order"
    } else {
        "spot/v2/submit_order"
    };
    Ok((path, body))
}

/// The cancel endpoint answers in three shapes: a bare `true`, a
/// `{result}` flag, or a `{succeed: [ids]}` list.
fn check_cancel_result(data: &Value, id: &str, symbol: &str) -> Result<(), ExchangeError> {
    if data.as_bool() == Some(true) {
        return Ok(());
    }
    if let Some(succeeded) = data.get("succeed").and_then(Value::as_array) {
        if succeeded.first().and_then(json_string).is_some() {
            return Ok(());
        }
        return Err(ExchangeError::InvalidOrder(format!(
            "failed to cancel {} order id {}",
            symbol, id
        )));
    }
    if data.get("result").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }
    Err(ExchangeError::InvalidOrder(format!(
        "{} order id {} is already filled or canceled",
        symbol, id
    )))
}

pub(crate) fn parse_order(raw: &RawOrder, kind: MarketKind) -> Order {
    let id = raw
        .order_id
        .as_ref()
        .and_then(json_string)
        .unwrap_or_default();
    let symbol = raw
        .symbol
        .as_deref()
        .map(|id| id.replace('_', "/"))
        .unwrap_or_default();
    let side = match raw.side.as_deref() {
        Some("buy") => Some(OrderSide::Buy),
        Some("sell") => Some(OrderSide::Sell),
        _ => None,
    };
    // The exchange folds post-only and IOC into the type code.
    let (order_type, time_in_force, post_only) = match raw.order_type.as_deref() {
        Some("limit_maker") => (Some(OrderType::Limit), Some(TimeInForce::PO), true),
        Some("ioc") => (Some(OrderType::Limit), Some(TimeInForce::IOC), false),
        Some("limit") => (Some(OrderType::Limit), None, false),
        Some("market") => (Some(OrderType::Market), None, false),
        _ => (None, None, false),
    };
    let status = raw
        .status
        .as_ref()
        .and_then(json_string)
        .and_then(|code| order_status(kind, &code));
    Order {
        id,
        symbol,
        created_at: raw
            .create_time
            .as_ref()
            .and_then(super::json_i64)
            .and_then(datetime_from_millis),
        side,
        order_type,
        time_in_force,
        post_only,
        price: dec_opt(raw.price.as_deref()),
        average_price: dec_opt(raw.price_avg.as_deref()),
        amount: dec_opt(raw.size.as_deref()),
        filled: dec_opt(raw.filled_size.as_deref()),
        notional: dec_opt(raw.notional.as_deref()),
        filled_notional: dec_opt(raw.filled_notional.as_deref()),
        status,
    }
}

/// Numeric order statuses differ between the spot and contract APIs.
pub(crate) fn order_status(kind: MarketKind, code: &str) -> Option<OrderStatus> {
    match kind {
        MarketKind::Spot => match code {
            "1" | "3" => Some(OrderStatus::Failed),
            "2" | "4" => Some(OrderStatus::Open),
            "5" => Some(OrderStatus::PartiallyFilled),
            "6" => Some(OrderStatus::Filled),
            "7" => Some(OrderStatus::Canceling),
            "8" => Some(OrderStatus::Canceled),
            _ => None,
        },
        MarketKind::Swap | MarketKind::Futures => match code {
            "1" | "2" => Some(OrderStatus::Open),
            "4" => Some(OrderStatus::Filled),
            _ => None,
        },
    }
}

// API request/response types

#[derive(Debug, Serialize)]
pub(crate) struct SubmitOrderBody {
    pub symbol: String,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notional: Option<String>,
}

#[derive(Debug, Serialize)]
struct CancelOrderBody {
    order_id: String,
    symbol: String,
}

#[derive(Debug, Serialize)]
struct CancelAllOrdersBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    side: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOrderId {
    #[serde(default)]
    order_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawOrderList {
    #[serde(default)]
    pub orders: Vec<RawOrder>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawOrder {
    #[serde(default)]
    pub order_id: Option<Value>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub create_time: Option<Value>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default, rename = "type")]
    pub order_type: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub price_avg: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub notional: Option<String>,
    #[serde(default)]
    pub filled_notional: Option<String>,
    #[serde(default)]
    pub filled_size: Option<String>,
    #[serde(default)]
    pub status: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawMyTradeList {
    #[serde(default)]
    trades: Vec<RawTrade>,
}

#[derive(Debug, Deserialize)]
struct RawTradingFee {
    #[serde(default)]
    #[allow(dead_code)]
    symbol: Option<String>,
    #[serde(default)]
    taker_fee_rate: Option<String>,
    #[serde(default)]
    maker_fee_rate: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order_fixture(order_type: &str, status: &str) -> RawOrder {
        serde_json::from_str(&format!(
            r#"{{
                "order_id": 1736871726781,
                "symbol": "BTC_USDT",
                "create_time": 1591096004000,
                "side": "sell",
                "type": "{}",
                "price": "8800.00",
                "price_avg": "0.00",
                "size": "0.02000",
                "notional": "176.00000000",
                "filled_notional": "0.00000000",
                "filled_size": "0.00000",
                "status": "{}"
            }}"#,
            order_type, status
        ))
        .unwrap()
    }

    #[test]
    fn test_limit_maker_normalizes_to_post_only_limit() {
        let order = parse_order(&order_fixture("limit_maker", "4"), MarketKind::Spot);
        assert_eq!(order.order_type, Some(OrderType::Limit));
        assert!(order.post_only);
        assert_eq!(order.time_in_force, Some(TimeInForce::PO));
    }

    #[test]
    fn test_ioc_normalizes_to_limit_ioc() {
        let order = parse_order(&order_fixture("ioc", "4"), MarketKind::Spot);
        assert_eq!(order.order_type, Some(OrderType::Limit));
        assert!(!order.post_only);
        assert_eq!(order.time_in_force, Some(TimeInForce::IOC));
    }

    #[test]
    fn test_parse_order_fields() {
        let order = parse_order(&order_fixture("limit", "8"), MarketKind::Spot);
        assert_eq!(order.id, "1736871726781");
        assert_eq!(order.symbol, "BTC/USDT");
        assert_eq!(order.side, Some(OrderSide::Sell));
        assert_eq!(order.status, Some(OrderStatus::Canceled));
        assert_eq!(order.price, Some(dec!(8800.00)));
        assert_eq!(order.amount, Some(dec!(0.02)));
        assert_eq!(order.filled, Some(dec!(0)));
        assert_eq!(order.remaining(), Some(dec!(0.02)));
        assert!(order.created_at.is_some());
    }

    #[test]
    fn test_spot_status_table() {
        let spot = MarketKind::Spot;
        assert_eq!(order_status(spot, "1"), Some(OrderStatus::Failed));
        assert_eq!(order_status(spot, "2"), Some(OrderStatus::Open));
        assert_eq!(order_status(spot, "3"), Some(OrderStatus::Failed));
        assert_eq!(order_status(spot, "4"), Some(OrderStatus::Open));
        assert_eq!(order_status(spot, "5"), Some(OrderStatus::PartiallyFilled));
        assert_eq!(order_status(spot, "6"), Some(OrderStatus::Filled));
        assert_eq!(order_status(spot, "7"), Some(OrderStatus::Canceling));
        assert_eq!(order_status(spot, "8"), Some(OrderStatus::Canceled));
        assert_eq!(order_status(spot, "9"), None);
    }

    #[test]
    fn test_swap_status_table() {
        let swap = MarketKind::Swap;
        assert_eq!(order_status(swap, "1"), Some(OrderStatus::Open));
        assert_eq!(order_status(swap, "2"), Some(OrderStatus::Open));
        assert_eq!(order_status(swap, "4"), Some(OrderStatus::Filled));
        assert_eq!(order_status(swap, "8"), None);
    }

    #[test]
    fn test_submit_limit_order_body() {
        let request = OrderRequest::limit("BTC/USDT", OrderSide::Buy, dec!(0.25), dec!(8800));
        let (path, body) = build_submit_order(&request).unwrap();
        assert_eq!(path, "spot/v2/submit_order");
        assert_eq!(body.symbol, "BTC_USDT");
        assert_eq!(body.order_type, "limit");
        assert_eq!(body.size.as_deref(), Some("0.25"));
        assert_eq!(body.price.as_deref(), Some("8800"));
        assert!(body.notional.is_none());
    }

    #[test]
    fn test_post_only_maps_to_limit_maker() {
        let request =
            OrderRequest::limit("BTC/USDT", OrderSide::Buy, dec!(0.25), dec!(8800)).post_only();
        let (_, body) = build_submit_order(&request).unwrap();
        assert_eq!(body.order_type, "limit_maker");
    }

    #[test]
    fn test_ioc_maps_to_ioc_type() {
        let request = OrderRequest::limit("BTC/USDT", OrderSide::Buy, dec!(0.25), dec!(8800))
            .with_time_in_force(TimeInForce::IOC);
        let (_, body) = build_submit_order(&request).unwrap();
        assert_eq!(body.order_type, "ioc");
    }

    #[test]
    fn test_fok_is_rejected() {
        let request = OrderRequest::limit("BTC/USDT", OrderSide::Buy, dec!(0.25), dec!(8800))
            .with_time_in_force(TimeInForce::FOK);
        assert!(matches!(
            build_submit_order(&request),
            Err(ExchangeError::InvalidOrder(_))
        ));
    }

    #[test]
    fn test_market_buy_requires_cost() {
        let mut request = OrderRequest::market_buy("BTC/USDT", dec!(100));
        let (_, body) = build_submit_order(&request).unwrap();
        assert_eq!(body.notional.as_deref(), Some("100"));
        assert!(body.size.is_none());

        // price * amount works as a substitute for an explicit notional
        request.notional = None;
        request.amount = Some(dec!(0.01));
        request.price = Some(dec!(9000));
        let (_, body) = build_submit_order(&request).unwrap();
        assert_eq!(body.notional.as_deref(), Some("90.00"));

        request.price = None;
        assert!(matches!(
            build_submit_order(&request),
            Err(ExchangeError::InvalidOrder(_))
        ));
    }

    #[test]
    fn test_market_sell_sends_size() {
        let request = OrderRequest::market_sell("BTC/USDT", dec!(0.02));
        let (_, body) = build_submit_order(&request).unwrap();
        assert_eq!(body.size.as_deref(), Some("0.02"));
        assert!(body.notional.is_none());
    }

    #[test]
    fn test_margin_orders_use_margin_endpoint() {
        let request =
            OrderRequest::limit("BTC/USDT", OrderSide::Buy, dec!(0.25), dec!(8800)).with_margin();
        let (path, _) = build_submit_order(&request).unwrap();
        assert_eq!(path, "spot/v1/margin/submit_order");
    }

    #[test]
    fn test_submit_body_serialization_shape() {
        let request = OrderRequest::limit("BTC/USDT", OrderSide::Buy, dec!(0.25), dec!(8800.00));
        let (_, body) = build_submit_order(&request).unwrap();
        let encoded = serde_json::to_string(&body).unwrap();
        assert_eq!(
            encoded,
            r#"{"symbol":"BTC_USDT","side":"buy","type":"limit","size":"0.25","price":"8800.00"}"#
        );
    }

    #[test]
    fn test_cancel_result_shapes() {
        assert!(check_cancel_result(&serde_json::json!(true), "1", "BTC/USDT").is_ok());
        assert!(check_cancel_result(&serde_json::json!({"result": true}), "1", "BTC/USDT").is_ok());
        assert!(
            check_cancel_result(&serde_json::json!({"succeed": ["2707217580"]}), "1", "BTC/USDT")
                .is_ok()
        );
        assert!(
            check_cancel_result(&serde_json::json!({"result": false}), "1", "BTC/USDT").is_err()
        );
        assert!(check_cancel_result(&serde_json::json!({"succeed": []}), "1", "BTC/USDT").is_err());
    }

    #[test]
    fn test_order_without_status_when_kind_unknown() {
        let order = parse_order(&order_fixture("limit", "2"), MarketKind::Swap);
        // spot status codes do not apply to the contract table
        assert_eq!(order.status, Some(OrderStatus::Open));
        let order = parse_order(&order_fixture("limit", "6"), MarketKind::Swap);
        assert_eq!(order.status, None);
    }
}
