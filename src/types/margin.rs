use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Receipt for an isolated-margin borrow or repayment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginLoan {
    pub id: Option<String>,
    pub currency: String,
    pub symbol: String,
    pub amount: Decimal,
}

/// Borrowing rate for one currency of an isolated margin pair. The
/// exchange quotes hourly interest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowRate {
    pub currency: String,
    pub rate: Option<Decimal>,
    /// Rate period in milliseconds (one hour).
    pub period: i64,
    pub max_borrow_amount: Option<Decimal>,
    pub min_borrow_amount: Option<Decimal>,
    pub borrowable_amount: Option<Decimal>,
}

/// Interest accrued on an outstanding isolated-margin loan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowInterest {
    pub symbol: String,
    pub currency: Option<String>,
    pub interest: Option<Decimal>,
    pub interest_rate: Option<Decimal>,
    pub amount_borrowed: Option<Decimal>,
    pub timestamp: Option<DateTime<Utc>>,
}
