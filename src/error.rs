use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The historical endpoint has no data for the requested day.
    #[error("Historical rates are not available for {day}")]
    RemoteUnavailable { day: NaiveDate },

    #[error("Exchange rate service error: {0}")]
    Remote(String),

    #[error("Currency \"{}\" has no exchange rate", .currencies.join("; "))]
    MissingRate { currencies: Vec<String> },

    #[error("No exchange rate resolved for {0}")]
    Lookup(String),

    #[error("Exchange rate for {0} is zero")]
    InvalidRate(String),

    #[error("Converting {amount} {currency} to USD overflows")]
    ConversionOverflow {
        currency: String,
        amount: rust_decimal::Decimal,
    },

    #[error("Rate store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Can't decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("UptimeRobot API error: {0}")]
    UptimeRobot(String),

    #[error("VirusTotal API error: {0}")]
    VirusTotal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Remote(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
