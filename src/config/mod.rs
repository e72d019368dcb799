use std::env;

use crate::error::ExchangeError;

/// API credentials for private endpoints. BitMart signs requests with the
/// account secret and additionally requires the account memo ("uid").
#[derive(Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub secret: String,
    pub uid: String,
}

impl ApiCredentials {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
            uid: uid.into(),
        }
    }

    /// Loads credentials from `BITMART_API_KEY`, `BITMART_API_SECRET` and
    /// `BITMART_API_UID`, reading a `.env` file first if one exists.
    pub fn from_env() -> Result<Self, ExchangeError> {
        dotenvy::dotenv().ok();

        let api_key = env::var("BITMART_API_KEY").map_err(|_| ExchangeError::MissingCredentials)?;
        let secret = env::var("BITMART_API_SECRET").map_err(|_| ExchangeError::MissingCredentials)?;
        let uid = env::var("BITMART_API_UID").map_err(|_| ExchangeError::MissingCredentials)?;

        Ok(Self {
            api_key,
            secret,
            uid,
        })
    }
}

// Keep the secret out of debug output.
impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("secret", &"<redacted>")
            .field("uid", &self.uid)
            .finish()
    }
}
