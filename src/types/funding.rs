use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Ok,
    Canceled,
    Failed,
}

/// A deposit or withdrawal record. The exchange reports both through one
/// history endpoint; the kind is inferred from which id field is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Option<String>,
    pub kind: Option<TransactionKind>,
    pub currency: Option<String>,
    pub amount: Option<Decimal>,
    pub fee: Option<Decimal>,
    pub status: Option<TransactionStatus>,
    pub address: Option<String>,
    pub tag: Option<String>,
    pub txid: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositAddress {
    pub currency: String,
    pub address: String,
    pub tag: Option<String>,
    pub network: Option<String>,
}

/// Parameters for a withdrawal request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub currency: String,
    pub amount: Decimal,
    pub address: String,
    pub tag: Option<String>,
    pub network: Option<String>,
}

impl WithdrawRequest {
    pub fn new(currency: impl Into<String>, amount: Decimal, address: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            amount,
            address: address.into(),
            tag: None,
            network: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }
}

/// Withdrawal constraints and fee for a currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawCharge {
    pub min_withdraw: Option<Decimal>,
    pub precision: Option<u32>,
    pub fee: Option<Decimal>,
}

/// One end of an internal transfer: the spot wallet or an isolated margin
/// account identified by its unified symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferAccount {
    Spot,
    Isolated(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Option<String>,
    pub currency: String,
    pub amount: Decimal,
    pub from_account: TransferAccount,
    pub to_account: TransferAccount,
}
