use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::market_data::require_spot_symbol;
use super::{datetime_from_millis, dec_opt, json_i64, json_string, BitmartClient};
use crate::error::ExchangeError;
use crate::types::{
    BorrowInterest, BorrowRate, MarginLoan, Market, Transfer, TransferAccount,
};

const HOUR_MS: i64 = 3_600_000;

impl BitmartClient {
    /// Borrows a currency into an isolated margin account.
    pub async fn borrow_margin(
        &self,
        symbol: &str,
        currency: &str,
        amount: Decimal,
    ) -> Result<MarginLoan, ExchangeError> {
        self.margin_loan_call("spot/v1/margin/isolated/borrow", symbol, currency, amount)
            .await
    }

    /// Repays borrowed margin and its accrued interest.
    pub async fn repay_margin(
        &self,
        symbol: &str,
        currency: &str,
        amount: Decimal,
    ) -> Result<MarginLoan, ExchangeError> {
        self.margin_loan_call("spot/v1/margin/isolated/repay", symbol, currency, amount)
            .await
    }

    async fn margin_loan_call(
        &self,
        path: &str,
        symbol: &str,
        currency: &str,
        amount: Decimal,
    ) -> Result<MarginLoan, ExchangeError> {
        let market_id = require_spot_symbol(symbol, "margin loans")?;
        if currency.is_empty() {
            return Err(ExchangeError::ArgumentsRequired(
                "margin loans require a currency".into(),
            ));
        }
        let body = MarginLoanBody {
            symbol: market_id,
            currency: currency.to_string(),
            amount: amount.to_string(),
        };
        let data: RawLoanId = self.post_private(path, &body).await?;
        let id = data
            .borrow_id
            .as_ref()
            .or(data.repay_id.as_ref())
            .and_then(json_string);
        info!(loan_id = ?id, symbol = %symbol, currency = %currency, "margin loan call accepted");
        Ok(MarginLoan {
            id,
            currency: currency.to_string(),
            symbol: symbol.to_string(),
            amount,
        })
    }

    /// The borrowing rate for one currency of an isolated margin pair.
    pub async fn fetch_borrow_rate(
        &self,
        symbol: &str,
        currency: &str,
    ) -> Result<BorrowRate, ExchangeError> {
        let market_id = require_spot_symbol(symbol, "fetch_borrow_rate")?;
        if currency.is_empty() {
            return Err(ExchangeError::ArgumentsRequired(
                "fetch_borrow_rate requires a currency".into(),
            ));
        }
        let params = [("symbol", market_id)];
        let data: RawMarginPairList = self
            .get_private("spot/v1/margin/isolated/pairs", &params)
            .await?;
        let pair = data.symbols.first().ok_or_else(|| {
            ExchangeError::BadSymbol(format!("no margin pair returned for {}", symbol))
        })?;
        [pair.base.as_ref(), pair.quote.as_ref()]
            .into_iter()
            .flatten()
            .find(|side| side.currency.as_deref() == Some(currency))
            .map(parse_borrow_rate)
            .ok_or_else(|| {
                ExchangeError::BadRequest(format!(
                    "{} is not a side of the {} margin pair",
                    currency, symbol
                ))
            })
    }

    /// Base-currency borrowing rates for every isolated margin pair.
    pub async fn fetch_borrow_rates(&self) -> Result<Vec<BorrowRate>, ExchangeError> {
        let data: RawMarginPairList = self
            .get_private("spot/v1/margin/isolated/pairs", &[])
            .await?;
        Ok(data
            .symbols
            .iter()
            .filter_map(|pair| pair.base.as_ref())
            .map(parse_borrow_rate)
            .collect())
    }

    /// Interest accrued on outstanding isolated-margin loans for a pair.
    pub async fn fetch_borrow_interest(
        &self,
        symbol: &str,
        since: Option<chrono::DateTime<chrono::Utc>>,
        limit: Option<u32>,
    ) -> Result<Vec<BorrowInterest>, ExchangeError> {
        let market_id = require_spot_symbol(symbol, "fetch_borrow_interest")?;
        let mut params = vec![("symbol", market_id)];
        if let Some(limit) = limit {
            params.push(("N", limit.to_string()));
        }
        if let Some(since) = since {
            params.push(("start_time", since.timestamp_millis().to_string()));
        }
        let data: RawBorrowRecordList = self
            .get_private("spot/v1/margin/isolated/borrow_record", &params)
            .await?;
        Ok(data
            .records
            .iter()
            .map(|raw| parse_borrow_interest(raw, symbol))
            .collect())
    }

    /// Moves funds between the spot wallet and an isolated margin account.
    /// One side of the transfer must be the spot wallet.
    pub async fn transfer(
        &self,
        currency: &str,
        amount: Decimal,
        from: TransferAccount,
        to: TransferAccount,
    ) -> Result<Transfer, ExchangeError> {
        if currency.is_empty() {
            return Err(ExchangeError::ArgumentsRequired(
                "transfer requires a currency".into(),
            ));
        }
        let (side, symbol) = resolve_transfer_side(&from, &to)?;
        let body = TransferBody {
            amount: amount.to_string(),
            currency: currency.to_string(),
            side,
            symbol: Market::id_from_symbol(&symbol),
        };
        let data: RawTransferId = self
            .post_private("spot/v1/margin/isolated/transfer", &body)
            .await?;
        let id = data.transfer_id.as_ref().and_then(json_string);
        info!(transfer_id = ?id, currency = %currency, %amount, "transfer accepted");
        Ok(Transfer {
            id,
            currency: currency.to_string(),
            amount,
            from_account: from,
            to_account: to,
        })
    }
}

/// Transfers are phrased relative to the margin account: "in" funds it from
/// spot, "out" drains it back.
pub(crate) fn resolve_transfer_side(
    from: &TransferAccount,
    to: &TransferAccount,
) -> Result<(&'static str, String), ExchangeError> {
    match (from, to) {
        (TransferAccount::Spot, TransferAccount::Isolated(symbol)) => {
            Ok(("in", symbol.clone()))
        }
        (TransferAccount::Isolated(symbol), TransferAccount::Spot) => {
            Ok(("out", symbol.clone()))
        }
        _ => Err(ExchangeError::ArgumentsRequired(
            "transfer requires exactly one side to be the spot wallet".into(),
        )),
    }
}

fn parse_borrow_rate(side: &RawBorrowSide) -> BorrowRate {
    BorrowRate {
        currency: side
            .currency
            .as_deref()
            .map(super::currency_code)
            .unwrap_or_default(),
        rate: dec_opt(side.hourly_interest.as_deref()),
        period: HOUR_MS,
        max_borrow_amount: dec_opt(side.max_borrow_amount.as_deref()),
        min_borrow_amount: dec_opt(side.min_borrow_amount.as_deref()),
        borrowable_amount: dec_opt(side.borrowable_amount.as_deref()),
    }
}

pub(crate) fn parse_borrow_interest(raw: &RawBorrowRecord, symbol: &str) -> BorrowInterest {
    BorrowInterest {
        symbol: symbol.to_string(),
        currency: raw.currency.clone().map(|id| super::currency_code(&id)),
        interest: dec_opt(raw.interest_amount.as_deref()),
        interest_rate: dec_opt(raw.hourly_interest.as_deref()),
        amount_borrowed: dec_opt(raw.borrow_amount.as_deref()),
        timestamp: raw
            .create_time
            .as_ref()
            .and_then(json_i64)
            .and_then(datetime_from_millis),
    }
}

// API request/response types

#[derive(Debug, Serialize)]
struct MarginLoanBody {
    symbol: String,
    currency: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct RawLoanId {
    #[serde(default)]
    borrow_id: Option<Value>,
    #[serde(default)]
    repay_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMarginPairList {
    #[serde(default)]
    pub symbols: Vec<RawMarginPair>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMarginPair {
    #[serde(default)]
    #[allow(dead_code)]
    pub symbol: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub max_leverage: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub symbol_enabled: Option<bool>,
    #[serde(default)]
    pub base: Option<RawBorrowSide>,
    #[serde(default)]
    pub quote: Option<RawBorrowSide>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBorrowSide {
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub daily_interest: Option<String>,
    #[serde(default)]
    pub hourly_interest: Option<String>,
    #[serde(default)]
    pub max_borrow_amount: Option<String>,
    #[serde(default)]
    pub min_borrow_amount: Option<String>,
    #[serde(default)]
    pub borrowable_amount: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBorrowRecordList {
    #[serde(default)]
    records: Vec<RawBorrowRecord>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawBorrowRecord {
    #[serde(default)]
    #[allow(dead_code)]
    pub borrow_id: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub borrow_amount: Option<String>,
    #[serde(default)]
    pub hourly_interest: Option<String>,
    #[serde(default)]
    pub interest_amount: Option<String>,
    #[serde(default)]
    pub create_time: Option<Value>,
}

#[derive(Debug, Serialize)]
struct TransferBody {
    amount: String,
    currency: String,
    side: &'static str,
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct RawTransferId {
    #[serde(default)]
    transfer_id: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn margin_pair() -> RawMarginPair {
        serde_json::from_str(
            r#"{
                "symbol": "BTC_USDT",
                "max_leverage": "5",
                "symbol_enabled": true,
                "base": {
                    "currency": "BTC",
                    "daily_interest": "0.00055000",
                    "hourly_interest": "0.00002291",
                    "max_borrow_amount": "2.00000000",
                    "min_borrow_amount": "0.00000001",
                    "borrowable_amount": "0.00670810"
                },
                "quote": {
                    "currency": "USDT",
                    "daily_interest": "0.00055000",
                    "hourly_interest": "0.00002291",
                    "max_borrow_amount": "50000.00000000",
                    "min_borrow_amount": "0.00000001",
                    "borrowable_amount": "135.12575038"
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_borrow_rate_sides() {
        let pair = margin_pair();
        let base = parse_borrow_rate(pair.base.as_ref().unwrap());
        assert_eq!(base.currency, "BTC");
        assert_eq!(base.rate, Some(dec!(0.00002291)));
        assert_eq!(base.period, 3_600_000);
        assert_eq!(base.max_borrow_amount, Some(dec!(2)));

        let quote = parse_borrow_rate(pair.quote.as_ref().unwrap());
        assert_eq!(quote.currency, "USDT");
        assert_eq!(quote.borrowable_amount, Some(dec!(135.12575038)));
    }

    #[test]
    fn test_parse_borrow_interest() {
        let raw: RawBorrowRecord = serde_json::from_str(
            r#"{
                "borrow_id": "1659045283903rNvJnuRTJNL5J53n",
                "symbol": "BTC_USDT",
                "currency": "USDT",
                "borrow_amount": "100.00000000",
                "daily_interest": "0.00055000",
                "hourly_interest": "0.00002291",
                "interest_amount": "0.00229166",
                "create_time": 1659045284000
            }"#,
        )
        .unwrap();
        let interest = parse_borrow_interest(&raw, "BTC/USDT");
        assert_eq!(interest.symbol, "BTC/USDT");
        assert_eq!(interest.currency.as_deref(), Some("USDT"));
        assert_eq!(interest.interest, Some(dec!(0.00229166)));
        assert_eq!(interest.interest_rate, Some(dec!(0.00002291)));
        assert_eq!(interest.amount_borrowed, Some(dec!(100)));
        assert!(interest.timestamp.is_some());
    }

    #[test]
    fn test_transfer_side_resolution() {
        let (side, symbol) = resolve_transfer_side(
            &TransferAccount::Spot,
            &TransferAccount::Isolated("BTC/USDT".to_string()),
        )
        .unwrap();
        assert_eq!(side, "in");
        assert_eq!(symbol, "BTC/USDT");

        let (side, symbol) = resolve_transfer_side(
            &TransferAccount::Isolated("ETH/USDT".to_string()),
            &TransferAccount::Spot,
        )
        .unwrap();
        assert_eq!(side, "out");
        assert_eq!(symbol, "ETH/USDT");

        assert!(matches!(
            resolve_transfer_side(&TransferAccount::Spot, &TransferAccount::Spot),
            Err(ExchangeError::ArgumentsRequired(_))
        ));
        assert!(matches!(
            resolve_transfer_side(
                &TransferAccount::Isolated("BTC/USDT".to_string()),
                &TransferAccount::Isolated("ETH/USDT".to_string())
            ),
            Err(ExchangeError::ArgumentsRequired(_))
        ));
    }

    #[test]
    fn test_loan_id_accepts_borrow_and_repay_shapes() {
        let borrow: RawLoanId =
            serde_json::from_str(r#"{"borrow_id": "629a7177a4ed4cf09869c6a4343b788c"}"#).unwrap();
        assert_eq!(
            borrow.borrow_id.as_ref().and_then(json_string).as_deref(),
            Some("629a7177a4ed4cf09869c6a4343b788c")
        );

        let repay: RawLoanId =
            serde_json::from_str(r#"{"repay_id": "2afcc16d99bd4707818c5a355dc89bed"}"#).unwrap();
        assert_eq!(
            repay.repay_id.as_ref().and_then(json_string).as_deref(),
            Some("2afcc16d99bd4707818c5a355dc89bed")
        );
    }
}
