use thiserror::Error;

/// Error taxonomy shared by the normalized exchange interface. Exchange
/// responses are translated into these categories via the static code table
/// below; anything unmapped surfaces as [`ExchangeError::Exchange`] carrying
/// the raw response body for diagnostics.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("account suspended: {0}")]
    AccountSuspended(String),
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("exchange not available: {0}")]
    ExchangeNotAvailable(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unknown or malformed symbol: {0}")]
    BadSymbol(String),
    #[error("invalid order: {0}")]
    InvalidOrder(String),
    #[error("order not found: {0}")]
    OrderNotFound(String),
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid nonce or timestamp: {0}")]
    InvalidNonce(String),
    #[error("missing argument: {0}")]
    ArgumentsRequired(String),
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("api credentials are not configured")]
    MissingCredentials,
    #[error("http transport error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Parse(String),
    #[error("exchange error: {0}")]
    Exchange(String),
}

/// Translates a BitMart error response into the taxonomy. The numeric code
/// is consulted first, then the message string against the same table; no
/// match falls back to the generic variant with the raw body.
pub(crate) fn translate_exchange_error(
    code: Option<&str>,
    message: &str,
    body: &str,
) -> ExchangeError {
    if let Some(code) = code {
        if let Some(err) = classify_error_key(code, body) {
            return err;
        }
    }
    if let Some(err) = classify_error_key(message, body) {
        return err;
    }
    ExchangeError::Exchange(body.to_string())
}

/// Exact-match lookup against BitMart's documented error codes.
pub(crate) fn classify_error_key(key: &str, body: &str) -> Option<ExchangeError> {
    let body = body.to_string();
    let err = match key {
        // general errors
        "30000" => ExchangeError::Exchange(body),
        "30001" | "30002" | "30004" | "30005" | "30006" | "30007" | "30008" | "30011"
        | "30012" => ExchangeError::Authentication(body),
        "30003" => ExchangeError::AccountSuspended(body),
        "30010" => ExchangeError::PermissionDenied(body),
        "30013" => ExchangeError::RateLimited(body),
        "30014" => ExchangeError::ExchangeNotAvailable(body),
        // funding account errors
        "60000" | "60001" | "60002" | "60030" | "60031" => ExchangeError::BadRequest(body),
        "60003" | "60004" | "60005" | "60006" | "60009" | "60010" | "60012" | "60050"
        | "60051" => ExchangeError::Exchange(body),
        "60007" | "60011" => ExchangeError::InvalidAddress(body),
        "60008" | "61001" => ExchangeError::InsufficientFunds(body),
        "60020" | "60021" | "60022" => ExchangeError::PermissionDenied(body),
        "61003" => ExchangeError::BadRequest(body),
        // spot errors
        "50000" | "50002" | "50003" | "50004" | "50014" | "50015" | "50016" | "50017"
        | "50018" | "50019" | "50021" | "57001" | "58001" => ExchangeError::BadRequest(body),
        "50001" | "50023" => ExchangeError::BadSymbol(body),
        "50005" | "50032" => ExchangeError::OrderNotFound(body),
        "50006" | "50007" | "50008" | "50009" | "50010" | "50011" | "50012" | "50013"
        | "50029" | "50030" | "50034" | "50035" | "51011" => ExchangeError::InvalidOrder(body),
        "50020" | "51004" => ExchangeError::InsufficientFunds(body),
        "50022" => ExchangeError::ExchangeNotAvailable(body),
        "53000" | "53001" => ExchangeError::AccountSuspended(body),
        "59001" | "59002" => ExchangeError::Exchange(body),
        // contract errors
        "40001" | "40002" | "40003" | "40004" | "40005" | "40012" | "40013" | "40019"
        | "40021" | "40022" | "40023" | "40024" | "40025" | "40026" => {
            ExchangeError::Exchange(body)
        }
        "40006" | "40028" | "53002" => ExchangeError::PermissionDenied(body),
        "40007" | "40009" | "40010" | "40011" => ExchangeError::BadRequest(body),
        "40008" => ExchangeError::InvalidNonce(body),
        "40014" | "40015" | "40034" => ExchangeError::BadSymbol(body),
        "40016" | "40017" | "40018" | "40020" | "40029" | "40030" | "40031" | "40032"
        | "40033" => ExchangeError::InvalidOrder(body),
        "40027" => ExchangeError::InsufficientFunds(body),
        _ => return None,
    };
    Some(err)
}
