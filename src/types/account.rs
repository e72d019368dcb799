use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which wallet a balance query targets. The isolated-margin wallet has a
/// per-symbol shape and its own call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletKind {
    Spot,
    Swap,
    /// The main (funding) account.
    Account,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Balance {
    pub free: Decimal,
    pub used: Decimal,
}

impl Balance {
    pub fn total(&self) -> Decimal {
        self.free + self.used
    }
}

/// One side (base or quote) of an isolated margin account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginBalance {
    pub currency: String,
    pub available: Decimal,
    pub frozen: Decimal,
    pub total: Decimal,
    pub borrowed: Decimal,
    pub interest_unpaid: Decimal,
    pub borrow_enabled: bool,
}

impl MarginBalance {
    /// Outstanding debt: principal plus accrued interest.
    pub fn debt(&self) -> Decimal {
        self.borrowed + self.interest_unpaid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolatedMarginAccount {
    pub symbol: String,
    pub risk_rate: Option<Decimal>,
    pub risk_level: Option<Decimal>,
    pub buy_enabled: bool,
    pub sell_enabled: bool,
    pub liquidate_price: Option<Decimal>,
    pub liquidate_rate: Option<Decimal>,
    pub base: MarginBalance,
    pub quote: MarginBalance,
}
