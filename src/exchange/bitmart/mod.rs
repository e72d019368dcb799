pub mod account;
pub mod margin;
pub mod market_data;
pub mod trading;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

use crate::config::ApiCredentials;
use crate::error::{translate_exchange_error, ExchangeError};
use crate::exchange::Exchange;
use crate::types::{
    Balance, Candle, Market, Order, OrderBook, OrderRequest, Ticker, TimeFrame, Trade, WalletKind,
};

const BITMART_API: &str = "https://api-cloud.bitmart.com";

type HmacSha256 = Hmac<Sha256>;

/// REST client for BitMart's spot, isolated-margin and contract API.
///
/// One instance wraps one `reqwest::Client` and an optional credential set;
/// public market-data endpoints work without credentials, private endpoints
/// fail with [`ExchangeError::MissingCredentials`] before any network call.
#[derive(Debug, Clone)]
pub struct BitmartClient {
    client: Client,
    base_url: String,
    credentials: Option<ApiCredentials>,
}

impl BitmartClient {
    pub fn new(credentials: ApiCredentials) -> Self {
        Self {
            client: Client::new(),
            base_url: BITMART_API.to_string(),
            credentials: Some(credentials),
        }
    }

    pub fn public_only() -> Self {
        Self {
            client: Client::new(),
            base_url: BITMART_API.to_string(),
            credentials: None,
        }
    }

    pub fn from_env() -> Result<Self, ExchangeError> {
        Ok(Self::new(ApiCredentials::from_env()?))
    }

    /// Overrides the REST host, e.g. `https://api-cloud.bitmart.info` for
    /// Hong Kong users.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn credentials(&self) -> Result<&ApiCredentials, ExchangeError> {
        self.credentials
            .as_ref()
            .ok_or(ExchangeError::MissingCredentials)
    }

    fn url_for(&self, path: &str, params: &[(&str, String)]) -> Result<Url, ExchangeError> {
        let endpoint = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let url = if params.is_empty() {
            Url::parse(&endpoint)
        } else {
            Url::parse_with_params(&endpoint, params)
        };
        url.map_err(|e| ExchangeError::Parse(format!("invalid url {}: {}", endpoint, e)))
    }

    pub(crate) async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let url = self.url_for(path, params)?;
        debug!(%url, "bitmart public GET");
        let response = self.client.get(url).send().await?;
        self.read_envelope(response).await
    }

    pub(crate) async fn get_private<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let credentials = self.credentials()?;
        let url = self.url_for(path, params)?;
        // For GET the url-encoded query string is the signed payload.
        let query = url.query().unwrap_or("").to_string();
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = sign_request(&timestamp, &credentials.uid, &query, &credentials.secret);
        debug!(%url, "bitmart private GET");
        let response = self
            .client
            .get(url)
            .header("X-BM-KEY", &credentials.api_key)
            .header("X-BM-TIMESTAMP", &timestamp)
            .header("X-BM-SIGN", &signature)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        self.read_envelope(response).await
    }

    pub(crate) async fn post_private<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ExchangeError> {
        let credentials = self.credentials()?;
        let url = self.url_for(path, &[])?;
        // The JSON-encoded body is signed verbatim and sent verbatim.
        let payload = serde_json::to_string(body)
            .map_err(|e| ExchangeError::Parse(format!("failed to encode request body: {}", e)))?;
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = sign_request(&timestamp, &credentials.uid, &payload, &credentials.secret);
        debug!(%url, "bitmart private POST");
        let response = self
            .client
            .post(url)
            .header("X-BM-KEY", &credentials.api_key)
            .header("X-BM-TIMESTAMP", &timestamp)
            .header("X-BM-SIGN", &signature)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;
        self.read_envelope(response).await
    }

    async fn read_envelope<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ExchangeError> {
        let status = response.status();
        let body = response.text().await?;
        parse_envelope(&body).map_err(|err| match err {
            // Non-JSON bodies on transport-level failures keep the status.
            ExchangeError::Parse(_) if !status.is_success() => {
                ExchangeError::Exchange(format!("HTTP {}: {}", status, body))
            }
            other => other,
        })
    }
}

/// `timestamp#uid#payload` signed with HMAC-SHA256, hex-encoded.
pub(crate) fn sign_request(timestamp: &str, uid: &str, payload: &str, secret: &str) -> String {
    let auth = format!("{}#{}#{}", timestamp, uid, payload);
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(auth.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    #[allow(dead_code)]
    trace: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

impl RawEnvelope {
    fn code_key(&self) -> Option<String> {
        self.code.as_ref().and_then(json_string)
    }

    /// An envelope is an error when the code differs from 1000 or the
    /// message differs from "ok" case-insensitively.
    fn is_error(&self) -> bool {
        let code_bad = matches!(self.code_key().as_deref(), Some(code) if code != "1000");
        let message_bad =
            matches!(self.message.as_deref(), Some(msg) if !msg.eq_ignore_ascii_case("ok"));
        code_bad || message_bad
    }
}

/// Unwraps the `{message, code, trace, data}` envelope every endpoint uses,
/// translating error responses through the code table.
pub(crate) fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<T, ExchangeError> {
    let envelope: RawEnvelope = serde_json::from_str(body)
        .map_err(|e| ExchangeError::Parse(format!("unexpected response body ({}): {}", e, body)))?;
    if envelope.is_error() {
        return Err(translate_exchange_error(
            envelope.code_key().as_deref(),
            envelope.message.as_deref().unwrap_or(""),
            body,
        ));
    }
    let data = envelope.data.unwrap_or(Value::Null);
    serde_json::from_value(data)
        .map_err(|e| ExchangeError::Parse(format!("unexpected data shape: {}", e)))
}

/// Lenient decimal extraction: empty and malformed strings become `None`,
/// matching how the exchange omits fields by sending "".
pub(crate) fn dec_opt(value: Option<&str>) -> Option<Decimal> {
    let s = value?.trim();
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s).ok()
}

/// String coercion for id-like fields the exchange sends as either JSON
/// numbers or strings. Empty strings count as absent.
pub(crate) fn json_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Unified currency code for an exchange currency id. A few listings reuse
/// tickers that collide with better-known assets and get renamed.
pub(crate) fn currency_code(id: &str) -> String {
    match id {
        "$GM" => "GOLDMINER".to_string(),
        "$HERO" => "Step Hero".to_string(),
        "$PAC" => "PAC".to_string(),
        "BP" => "BEYOND".to_string(),
        "GDT" => "Gorilla Diamond".to_string(),
        "GLD" => "Goldario".to_string(),
        "MVP" => "MVP Coin".to_string(),
        // collides with TrueFi
        "TRU" => "Truebit".to_string(),
        other => other.to_uppercase(),
    }
}

pub(crate) fn json_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub(crate) fn datetime_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    if millis == 0 {
        return None;
    }
    Utc.timestamp_millis_opt(millis).single()
}

pub(crate) fn datetime_from_secs(secs: i64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}

#[async_trait]
impl Exchange for BitmartClient {
    async fn fetch_server_time(&self) -> Result<i64, ExchangeError> {
        BitmartClient::fetch_server_time(self).await
    }

    async fn fetch_markets(&self) -> Result<Vec<Market>, ExchangeError> {
        BitmartClient::fetch_markets(self).await
    }

    async fn fetch_ticker(&self, market: &Market) -> Result<Ticker, ExchangeError> {
        BitmartClient::fetch_ticker(self, market).await
    }

    async fn fetch_order_book(
        &self,
        symbol: &str,
        limit: Option<u32>,
    ) -> Result<OrderBook, ExchangeError> {
        BitmartClient::fetch_order_book(self, symbol, limit).await
    }

    async fn fetch_trades(&self, symbol: &str) -> Result<Vec<Trade>, ExchangeError> {
        BitmartClient::fetch_trades(self, symbol).await
    }

    async fn fetch_candles(
        &self,
        market: &Market,
        timeframe: TimeFrame,
        since: Option<DateTime<Utc>>,
        limit: Option<u32>,
    ) -> Result<Vec<Candle>, ExchangeError> {
        BitmartClient::fetch_candles(self, market, timeframe, since, limit).await
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError> {
        BitmartClient::create_order(self, request).await
    }

    async fn cancel_order(&self, id: &str, symbol: &str) -> Result<(), ExchangeError> {
        BitmartClient::cancel_order(self, id, symbol).await
    }

    async fn fetch_order(&self, id: &str, symbol: &str) -> Result<Order, ExchangeError> {
        BitmartClient::fetch_order(self, id, symbol).await
    }

    async fn fetch_balance(
        &self,
        wallet: WalletKind,
    ) -> Result<HashMap<String, Balance>, ExchangeError> {
        BitmartClient::fetch_balance(self, wallet).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const UID: &str = "6168b6b6-b75f-4954-9f93-ad6f4c7bfeed";
    const SECRET: &str = "QTIzMTU2NDk4f5Onb8aMZt";

    #[test]
    fn test_signature_is_deterministic() {
        let query = "symbol=BTC_USDT&order_id=2147601241";
        let first = sign_request("1591096004000", UID, query, SECRET);
        let second = sign_request("1591096004000", UID, query, SECRET);
        assert_eq!(first, second);
        assert_eq!(
            first,
            "73d4e6c0988d00c6ce3cefd817ec883dbd368a467e82a6056a02b270f1ea5bfe"
        );
    }

    #[test]
    fn test_signature_over_json_body() {
        let body = r#"{"symbol":"BTC_USDT","side":"buy","type":"limit","size":"0.25","price":"8800.00"}"#;
        assert_eq!(
            sign_request("1591096004000", UID, body, SECRET),
            "64fbadc79557dda749d8f921ba01b422c5ffa03cee70e7ee5deb5970d73ed499"
        );
    }

    #[test]
    fn test_signature_changes_with_inputs() {
        let base = sign_request("1591096004000", UID, "a=1", SECRET);
        assert_ne!(base, sign_request("1591096004001", UID, "a=1", SECRET));
        assert_ne!(base, sign_request("1591096004000", "other", "a=1", SECRET));
        assert_ne!(base, sign_request("1591096004000", UID, "a=2", SECRET));
    }

    #[test]
    fn test_envelope_success() {
        #[derive(Deserialize)]
        struct ServerTime {
            server_time: i64,
        }

        let body = r#"{"message":"OK","code":1000,"trace":"c4e5e5b7","data":{"server_time":1599843709578}}"#;
        let data: ServerTime = parse_envelope(body).unwrap();
        assert_eq!(data.server_time, 1599843709578);
    }

    #[test]
    fn test_envelope_accepts_message_case_variants() {
        let body = r#"{"code":1000,"message":"Ok","data":[],"trace":"x"}"#;
        let data: Vec<Value> = parse_envelope(body).unwrap();
        assert!(data.is_empty());

        let body = r#"{"code":"1000","message":"OK","data":{},"trace":"x"}"#;
        let _: Value = parse_envelope(body).unwrap();
    }

    #[test]
    fn test_envelope_error_translates_code() {
        let body = r#"{"message":"Balance not enough","code":50020,"trace":"7c709d6a","data":{}}"#;
        let err = parse_envelope::<Value>(body).unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientFunds(_)));
    }

    #[test]
    fn test_envelope_error_on_non_ok_message() {
        // Contract endpoints have been seen carrying an error message with a
        // non-1000 code but also the reverse; message alone must trip it.
        let body = r#"{"message":"INVALID_PARAMETER","code":1000,"trace":"eb5ebb54","data":null}"#;
        let err = parse_envelope::<Value>(body).unwrap_err();
        assert!(matches!(err, ExchangeError::Exchange(_)));
    }

    #[test]
    fn test_envelope_unknown_code_keeps_raw_body() {
        let body = r#"{"message":"weird","code":42424,"trace":"t","data":{}}"#;
        match parse_envelope::<Value>(body).unwrap_err() {
            ExchangeError::Exchange(raw) => assert_eq!(raw, body),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_dec_opt() {
        assert_eq!(dec_opt(Some("4221.99")), Some(dec!(4221.99)));
        assert_eq!(
            dec_opt(Some("5.000000000000000000000000000000")),
            Some(dec!(5))
        );
        assert_eq!(dec_opt(Some("")), None);
        assert_eq!(dec_opt(Some("n/a")), None);
        assert_eq!(dec_opt(None), None);
    }

    #[test]
    fn test_json_coercions() {
        assert_eq!(
            json_string(&serde_json::json!(2147484350)),
            Some("2147484350".to_string())
        );
        assert_eq!(
            json_string(&serde_json::json!("1679952")),
            Some("1679952".to_string())
        );
        assert_eq!(json_string(&serde_json::json!("")), None);
        assert_eq!(json_i64(&serde_json::json!("1588867374000")), Some(1588867374000));
        assert_eq!(json_i64(&serde_json::json!(1588867374000i64)), Some(1588867374000));
    }

    #[test]
    fn test_currency_code_renames_collisions() {
        assert_eq!(currency_code("TRU"), "Truebit");
        assert_eq!(currency_code("GDT"), "Gorilla Diamond");
        assert_eq!(currency_code("$GM"), "GOLDMINER");
        assert_eq!(currency_code("BTC"), "BTC");
        assert_eq!(currency_code("usdt"), "USDT");
    }

    #[test]
    fn test_zero_timestamps_are_absent() {
        assert!(datetime_from_millis(0).is_none());
        assert!(datetime_from_secs(0).is_none());
        assert!(datetime_from_millis(1588867374000).is_some());
    }

    #[test]
    fn test_private_call_without_credentials_fails() {
        let client = BitmartClient::public_only();
        let result = tokio_test::block_on(
            client.get_private::<Value>("account/v1/wallet", &[]),
        );
        assert!(matches!(result, Err(ExchangeError::MissingCredentials)));
    }
}
