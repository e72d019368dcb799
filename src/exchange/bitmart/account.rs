use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;

use super::{datetime_from_millis, dec_opt, json_i64, json_string, BitmartClient};
use crate::error::ExchangeError;
use crate::types::{
    Balance, DepositAddress, IsolatedMarginAccount, MarginBalance, Transaction, TransactionKind,
    TransactionStatus, WalletKind, WithdrawCharge, WithdrawRequest,
};

impl BitmartClient {
    /// Per-currency balances of one wallet. The spot, funding-account and
    /// contract wallets share one normalized shape.
    pub async fn fetch_balance(
        &self,
        wallet: WalletKind,
    ) -> Result<HashMap<String, Balance>, ExchangeError> {
        let entries = match wallet {
            WalletKind::Spot => {
                let data: RawWalletList = self.get_private("spot/v1/wallet", &[]).await?;
                data.wallet
            }
            WalletKind::Account => {
                let data: RawWalletList = self.get_private("account/v1/wallet", &[]).await?;
                data.wallet
            }
            WalletKind::Swap => {
                self.get_private("contract/private/assets-detail", &[])
                    .await?
            }
        };
        let mut balances = HashMap::new();
        for entry in &entries {
            if let Some((code, balance)) = parse_wallet_entry(entry) {
                balances.insert(code, balance);
            }
        }
        Ok(balances)
    }

    /// Isolated margin accounts, one per enabled trading pair.
    pub async fn fetch_isolated_margin_accounts(
        &self,
    ) -> Result<Vec<IsolatedMarginAccount>, ExchangeError> {
        let data: RawMarginAccountList = self
            .get_private("spot/v1/margin/isolated/account", &[])
            .await?;
        Ok(data
            .symbols
            .iter()
            .filter_map(parse_margin_account)
            .collect())
    }

    /// The deposit address for a currency. USDT defaults to ERC20; pass a
    /// network ("TRC20", or the "TRX"/"ETH" aliases) to select another.
    pub async fn fetch_deposit_address(
        &self,
        currency: &str,
        network: Option<&str>,
    ) -> Result<DepositAddress, ExchangeError> {
        if currency.is_empty() {
            return Err(ExchangeError::ArgumentsRequired(
                "fetch_deposit_address requires a currency".into(),
            ));
        }
        let params = [("currency", network_currency_id(currency, network))];
        let raw: RawDepositAddress = self
            .get_private("account/v1/deposit/address", &params)
            .await?;
        let address = raw.address.filter(|a| !a.is_empty()).ok_or_else(|| {
            ExchangeError::InvalidAddress(format!("no deposit address returned for {}", currency))
        })?;
        Ok(DepositAddress {
            currency: currency.to_string(),
            address,
            tag: raw.address_memo.filter(|memo| !memo.is_empty()),
            network: raw.chain.as_deref().and_then(network_from_chain),
        })
    }

    /// Applies for a withdrawal to an external address.
    pub async fn withdraw(&self, request: &WithdrawRequest) -> Result<Transaction, ExchangeError> {
        if request.address.is_empty() {
            return Err(ExchangeError::InvalidAddress(
                "withdraw requires a destination address".into(),
            ));
        }
        if request.currency.is_empty() {
            return Err(ExchangeError::ArgumentsRequired(
                "withdraw requires a currency".into(),
            ));
        }
        let body = WithdrawBody {
            currency: network_currency_id(&request.currency, request.network.as_deref()),
            amount: request.amount.to_string(),
            destination: "To Digital Address",
            address: request.address.clone(),
            address_memo: request.tag.clone(),
        };
        let data: RawWithdrawId = self.post_private("account/v1/withdraw/apply", &body).await?;
        let id = data.withdraw_id.as_ref().and_then(json_string);
        info!(withdraw_id = ?id, currency = %request.currency, "withdrawal applied");
        Ok(Transaction {
            id,
            kind: Some(TransactionKind::Withdrawal),
            currency: Some(request.currency.clone()),
            amount: Some(request.amount),
            fee: None,
            status: None,
            address: Some(request.address.clone()),
            tag: request.tag.clone(),
            txid: None,
            timestamp: None,
        })
    }

    /// Withdrawal constraints and flat fee for a currency.
    pub async fn fetch_withdraw_charge(
        &self,
        currency: &str,
    ) -> Result<WithdrawCharge, ExchangeError> {
        if currency.is_empty() {
            return Err(ExchangeError::ArgumentsRequired(
                "fetch_withdraw_charge requires a currency".into(),
            ));
        }
        let params = [("currency", currency.to_string())];
        let raw: RawWithdrawCharge = self
            .get_private("account/v1/withdraw/charge", &params)
            .await?;
        Ok(WithdrawCharge {
            min_withdraw: dec_opt(raw.min_withdraw.as_deref()),
            precision: raw
                .withdraw_precision
                .as_ref()
                .and_then(json_i64)
                .and_then(|p| u32::try_from(p).ok()),
            fee: dec_opt(raw.withdraw_fee.as_deref()),
        })
    }

    pub async fn fetch_deposits(
        &self,
        currency: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<Transaction>, ExchangeError> {
        self.fetch_transactions_by_type("deposit", currency, limit)
            .await
    }

    pub async fn fetch_withdrawals(
        &self,
        currency: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<Transaction>, ExchangeError> {
        self.fetch_transactions_by_type("withdraw", currency, limit)
            .await
    }

    /// One deposit or withdrawal record by its id.
    pub async fn fetch_transaction(&self, id: &str) -> Result<Transaction, ExchangeError> {
        if id.is_empty() {
            return Err(ExchangeError::ArgumentsRequired(
                "fetch_transaction requires an id".into(),
            ));
        }
        let params = [("id", id.to_string())];
        let data: RawRecordDetail = self
            .get_private("account/v1/deposit-withdraw/detail", &params)
            .await?;
        Ok(parse_transaction(&data.record))
    }

    async fn fetch_transactions_by_type(
        &self,
        operation_type: &str,
        currency: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<Transaction>, ExchangeError> {
        let mut params = vec![
            ("operation_type", operation_type.to_string()),
            ("offset", "1".to_string()),
            ("N", limit.unwrap_or(50).to_string()),
        ];
        if let Some(currency) = currency {
            params.push(("currency", network_currency_id(currency, None)));
        }
        let data: RawRecordList = self
            .get_private("account/v2/deposit-withdraw/history", &params)
            .await?;
        Ok(data.records.iter().map(parse_transaction).collect())
    }
}

/// USDT wallets are chain-qualified as `USDT-<NETWORK>`; the "TRX" and
/// "ETH" spellings alias their token standards. Other currencies pass
/// through untouched.
pub(crate) fn network_currency_id(currency: &str, network: Option<&str>) -> String {
    if currency != "USDT" {
        return currency.to_string();
    }
    let network = network.map(str::to_uppercase).unwrap_or_else(|| "ERC20".to_string());
    let network = match network.as_str() {
        "TRX" => "TRC20",
        "ETH" => "ERC20",
        other => other,
    };
    format!("{}-{}", currency, network)
}

/// The chain field reads like "USDT-TRC20"; the network is the part after
/// the dash.
pub(crate) fn network_from_chain(chain: &str) -> Option<String> {
    chain
        .split('-')
        .nth(1)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

pub(crate) fn parse_wallet_entry(raw: &RawWalletEntry) -> Option<(String, Balance)> {
    let currency_id = raw
        .coin_code
        .as_deref()
        .or(raw.id.as_deref())
        .or(raw.currency.as_deref())?;
    let free = dec_opt(raw.available.as_deref())
        .or_else(|| dec_opt(raw.available_balance.as_deref()))
        .unwrap_or(Decimal::ZERO);
    let used = dec_opt(raw.frozen.as_deref())
        .or_else(|| dec_opt(raw.frozen_balance.as_deref()))
        .unwrap_or(Decimal::ZERO);
    Some((super::currency_code(currency_id), Balance { free, used }))
}

fn parse_margin_account(raw: &RawMarginAccount) -> Option<IsolatedMarginAccount> {
    let symbol = raw.symbol.as_deref()?.replace('_', "/");
    Some(IsolatedMarginAccount {
        symbol,
        risk_rate: dec_opt(raw.risk_rate.as_deref()),
        risk_level: dec_opt(raw.risk_level.as_deref()),
        buy_enabled: raw.buy_enabled.unwrap_or(false),
        sell_enabled: raw.sell_enabled.unwrap_or(false),
        liquidate_price: dec_opt(raw.liquidate_price.as_deref()),
        liquidate_rate: dec_opt(raw.liquidate_rate.as_deref()),
        base: parse_margin_balance(raw.base.as_ref()?),
        quote: parse_margin_balance(raw.quote.as_ref()?),
    })
}

fn parse_margin_balance(raw: &RawMarginBalance) -> MarginBalance {
    MarginBalance {
        currency: raw.currency.clone().unwrap_or_default(),
        available: dec_opt(raw.available.as_deref()).unwrap_or(Decimal::ZERO),
        frozen: dec_opt(raw.frozen.as_deref()).unwrap_or(Decimal::ZERO),
        total: dec_opt(raw.total_asset.as_deref()).unwrap_or(Decimal::ZERO),
        borrowed: dec_opt(raw.borrow_unpaid.as_deref()).unwrap_or(Decimal::ZERO),
        interest_unpaid: dec_opt(raw.interest_unpaid.as_deref()).unwrap_or(Decimal::ZERO),
        borrow_enabled: raw.borrow_enabled.unwrap_or(false),
    }
}

/// A record is a withdrawal or a deposit depending on which id field is
/// non-empty.
pub(crate) fn parse_transaction(raw: &RawTransactionRecord) -> Transaction {
    let withdraw_id = raw.withdraw_id.as_deref().filter(|id| !id.is_empty());
    let deposit_id = raw.deposit_id.as_deref().filter(|id| !id.is_empty());
    let (id, kind) = if let Some(id) = withdraw_id {
        (Some(id.to_string()), Some(TransactionKind::Withdrawal))
    } else if let Some(id) = deposit_id {
        (Some(id.to_string()), Some(TransactionKind::Deposit))
    } else {
        (None, None)
    };
    let status = raw
        .status
        .as_ref()
        .and_then(json_string)
        .and_then(|code| parse_transaction_status(&code));
    Transaction {
        id,
        kind,
        currency: raw.currency.clone().map(|id| super::currency_code(&id)),
        amount: dec_opt(raw.arrival_amount.as_deref()),
        fee: dec_opt(raw.fee.as_deref()),
        status,
        address: raw.address.clone().filter(|a| !a.is_empty()),
        tag: raw.address_memo.clone().filter(|memo| !memo.is_empty()),
        txid: raw.tx_id.clone().filter(|tx| !tx.is_empty()),
        timestamp: raw
            .apply_time
            .as_ref()
            .and_then(json_i64)
            .and_then(datetime_from_millis),
    }
}

fn parse_transaction_status(code: &str) -> Option<TransactionStatus> {
    match code {
        "0" | "1" | "2" => Some(TransactionStatus::Pending),
        "3" => Some(TransactionStatus::Ok),
        "4" => Some(TransactionStatus::Canceled),
        "5" => Some(TransactionStatus::Failed),
        _ => None,
    }
}

// API request/response types

#[derive(Debug, Deserialize)]
pub(crate) struct RawWalletList {
    #[serde(default)]
    pub wallet: Vec<RawWalletEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawWalletEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub coin_code: Option<String>,
    #[serde(default)]
    pub available: Option<String>,
    #[serde(default)]
    pub available_balance: Option<String>,
    #[serde(default)]
    pub frozen: Option<String>,
    #[serde(default)]
    pub frozen_balance: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMarginAccountList {
    #[serde(default)]
    pub symbols: Vec<RawMarginAccount>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMarginAccount {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub risk_rate: Option<String>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub buy_enabled: Option<bool>,
    #[serde(default)]
    pub sell_enabled: Option<bool>,
    #[serde(default)]
    pub liquidate_price: Option<String>,
    #[serde(default)]
    pub liquidate_rate: Option<String>,
    #[serde(default)]
    pub base: Option<RawMarginBalance>,
    #[serde(default)]
    pub quote: Option<RawMarginBalance>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMarginBalance {
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub borrow_enabled: Option<bool>,
    #[serde(default)]
    pub available: Option<String>,
    #[serde(default)]
    pub frozen: Option<String>,
    #[serde(default)]
    pub total_asset: Option<String>,
    #[serde(default)]
    pub borrow_unpaid: Option<String>,
    #[serde(default)]
    pub interest_unpaid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDepositAddress {
    #[serde(default)]
    #[allow(dead_code)]
    currency: Option<String>,
    #[serde(default)]
    chain: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    address_memo: Option<String>,
}

#[derive(Debug, Serialize)]
struct WithdrawBody {
    currency: String,
    amount: String,
    destination: &'static str,
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    address_memo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawWithdrawId {
    #[serde(default)]
    withdraw_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawWithdrawCharge {
    #[serde(default)]
    min_withdraw: Option<String>,
    #[serde(default)]
    withdraw_precision: Option<Value>,
    #[serde(default)]
    withdraw_fee: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRecordList {
    #[serde(default)]
    records: Vec<RawTransactionRecord>,
}

#[derive(Debug, Deserialize)]
struct RawRecordDetail {
    record: RawTransactionRecord,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawTransactionRecord {
    #[serde(default)]
    pub withdraw_id: Option<String>,
    #[serde(default)]
    pub deposit_id: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub operation_type: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub apply_time: Option<Value>,
    #[serde(default)]
    pub arrival_amount: Option<String>,
    #[serde(default)]
    pub fee: Option<String>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub address_memo: Option<String>,
    #[serde(default)]
    pub tx_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_wallet_entry_dialects() {
        // spot wallet keys the currency as "id"
        let raw: RawWalletEntry = serde_json::from_str(
            r#"{"id":"BTC","name":"Bitcoin","available":"0.00000062","frozen":"0.00000000"}"#,
        )
        .unwrap();
        let (code, balance) = parse_wallet_entry(&raw).unwrap();
        assert_eq!(code, "BTC");
        assert_eq!(balance.free, dec!(0.00000062));
        assert_eq!(balance.used, dec!(0));

        // the funding account keys it as "currency"
        let raw: RawWalletEntry = serde_json::from_str(
            r#"{"currency":"ETH","name":"Ethereum","available":"0.00002277","frozen":"0.00000000"}"#,
        )
        .unwrap();
        let (code, _) = parse_wallet_entry(&raw).unwrap();
        assert_eq!(code, "ETH");

        // the contract wallet uses *_balance field names
        let raw: RawWalletEntry = serde_json::from_str(
            r#"{"currency":"USDT","available_balance":"10.5","frozen_balance":"2.5","unrealized":"0","equity":"13"}"#,
        )
        .unwrap();
        let (code, balance) = parse_wallet_entry(&raw).unwrap();
        assert_eq!(code, "USDT");
        assert_eq!(balance.free, dec!(10.5));
        assert_eq!(balance.used, dec!(2.5));
        assert_eq!(balance.total(), dec!(13));
    }

    #[test]
    fn test_parse_margin_account() {
        let raw: RawMarginAccount = serde_json::from_str(
            r#"{
                "symbol": "BTC_USDT",
                "risk_rate": "999.00",
                "risk_level": "1",
                "buy_enabled": false,
                "sell_enabled": false,
                "liquidate_price": null,
                "liquidate_rate": "1.15",
                "base": {
                    "currency": "BTC",
                    "borrow_enabled": true,
                    "borrowed": "0.00000000",
                    "available": "0.00000000",
                    "frozen": "0.00000000",
                    "net_asset": "0.00000000",
                    "net_assetBTC": "0.00000000",
                    "total_asset": "0.00000000",
                    "borrow_unpaid": "0.00000000",
                    "interest_unpaid": "0.00000000"
                },
                "quote": {
                    "currency": "USDT",
                    "borrow_enabled": true,
                    "borrowed": "0.00000000",
                    "available": "20.00000000",
                    "frozen": "0.00000000",
                    "net_asset": "20.00000000",
                    "net_assetBTC": "0.00118008",
                    "total_asset": "20.00000000",
                    "borrow_unpaid": "5.00000000",
                    "interest_unpaid": "0.00229166"
                }
            }"#,
        )
        .unwrap();
        let account = parse_margin_account(&raw).unwrap();
        assert_eq!(account.symbol, "BTC/USDT");
        assert_eq!(account.risk_rate, Some(dec!(999.00)));
        assert!(account.liquidate_price.is_none());
        assert_eq!(account.quote.available, dec!(20));
        assert_eq!(account.quote.debt(), dec!(5.00229166));
        assert!(account.base.borrow_enabled);
    }

    #[test]
    fn test_transaction_kind_from_withdraw_id() {
        let raw: RawTransactionRecord = serde_json::from_str(
            r#"{
                "withdraw_id": "1679952",
                "deposit_id": "",
                "operation_type": "withdraw",
                "currency": "BMX",
                "apply_time": 1588867374000,
                "arrival_amount": "59.000000000000",
                "fee": "1.000000000000",
                "status": 0,
                "address": "0xe57b69a8776b37860407965B73cdFFBDFe668Bb5",
                "address_memo": "",
                "tx_id": ""
            }"#,
        )
        .unwrap();
        let tx = parse_transaction(&raw);
        assert_eq!(tx.kind, Some(TransactionKind::Withdrawal));
        assert_eq!(tx.id.as_deref(), Some("1679952"));
        assert_eq!(tx.amount, Some(dec!(59)));
        assert_eq!(tx.fee, Some(dec!(1)));
        assert_eq!(tx.status, Some(TransactionStatus::Pending));
        assert!(tx.tag.is_none());
        assert!(tx.txid.is_none());
        assert!(tx.timestamp.is_some());
    }

    #[test]
    fn test_transaction_kind_from_deposit_id() {
        let raw: RawTransactionRecord = serde_json::from_str(
            r#"{
                "withdraw_id": "",
                "deposit_id": "1679952",
                "operation_type": "deposit",
                "currency": "BMX",
                "apply_time": 0,
                "arrival_amount": "59.000000000000",
                "fee": "1.000000000000",
                "status": 3,
                "address": "0xe57b69a8776b37860407965B73cdFFBDFe668Bb5",
                "address_memo": "",
                "tx_id": ""
            }"#,
        )
        .unwrap();
        let tx = parse_transaction(&raw);
        assert_eq!(tx.kind, Some(TransactionKind::Deposit));
        assert_eq!(tx.id.as_deref(), Some("1679952"));
        assert_eq!(tx.status, Some(TransactionStatus::Ok));
        // zero apply_time means the exchange did not report one
        assert!(tx.timestamp.is_none());
    }

    #[test]
    fn test_transaction_status_table() {
        assert_eq!(parse_transaction_status("0"), Some(TransactionStatus::Pending));
        assert_eq!(parse_transaction_status("1"), Some(TransactionStatus::Pending));
        assert_eq!(parse_transaction_status("2"), Some(TransactionStatus::Pending));
        assert_eq!(parse_transaction_status("3"), Some(TransactionStatus::Ok));
        assert_eq!(parse_transaction_status("4"), Some(TransactionStatus::Canceled));
        assert_eq!(parse_transaction_status("5"), Some(TransactionStatus::Failed));
        assert_eq!(parse_transaction_status("6"), None);
    }

    #[test]
    fn test_usdt_network_qualification() {
        assert_eq!(network_currency_id("USDT", None), "USDT-ERC20");
        assert_eq!(network_currency_id("USDT", Some("TRC20")), "USDT-TRC20");
        assert_eq!(network_currency_id("USDT", Some("trx")), "USDT-TRC20");
        assert_eq!(network_currency_id("USDT", Some("ETH")), "USDT-ERC20");
        assert_eq!(network_currency_id("BTC", Some("BTC")), "BTC");
        assert_eq!(network_currency_id("BMX", None), "BMX");
    }

    #[test]
    fn test_network_from_chain() {
        assert_eq!(network_from_chain("USDT-TRC20"), Some("TRC20".to_string()));
        assert_eq!(network_from_chain("BTC"), None);
    }

    #[test]
    fn test_withdraw_charge_parsing() {
        let raw: RawWithdrawCharge = serde_json::from_str(
            r#"{
                "today_available_withdraw_BTC": "100.0000",
                "min_withdraw": "0.005",
                "withdraw_precision": "8",
                "withdraw_fee": "0.000500000000000000000000000000"
            }"#,
        )
        .unwrap();
        assert_eq!(dec_opt(raw.min_withdraw.as_deref()), Some(dec!(0.005)));
        assert_eq!(raw.withdraw_precision.as_ref().and_then(json_i64), Some(8));
        assert_eq!(dec_opt(raw.withdraw_fee.as_deref()), Some(dec!(0.0005)));
    }
}
