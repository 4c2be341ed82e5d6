#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("format error: {reason}")]
    Format { reason: String },

    #[error("overflow error: {field} = {value} does not fit its encoding")]
    Overflow { field: &'static str, value: u128 },

    #[error("unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("market {market} is not on the authorized market list")]
    UnauthorizedMarket { market: String },

    #[error("market {market} is deprecated")]
    DeprecatedMarket { market: String },

    #[error("ledger source error: {reason}")]
    Source { reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn format(reason: impl Into<String>) -> Self {
        Self::Format {
            reason: reason.into(),
        }
    }
}
