pub mod config;
pub mod error;
pub mod exchange;
pub mod types;

pub use config::ApiCredentials;
pub use error::ExchangeError;
pub use exchange::bitmart::BitmartClient;
pub use exchange::Exchange;
pub use types::*;
