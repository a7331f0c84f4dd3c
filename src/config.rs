use std::env;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::open_exchange::OPEN_EXCHANGE_URL;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub app_id: String,
    pub open_exchange_url: String,
    pub required_currencies: Vec<String>,
    pub source_ip: Option<IpAddr>,
    pub http_timeout: Duration,
    pub lookback_days: u64,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a local `.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{key} is not set")))
        };

        let required_currencies = lookup("REQUIRED_CURRENCIES")
            .unwrap_or_else(|| "EUR,GBP,RUB".to_string())
            .split(',')
            .map(|code| code.trim().to_ascii_uppercase())
            .filter(|code| !code.is_empty())
            .collect();

        let source_ip = lookup("SOURCE_IP")
            .filter(|v| !v.trim().is_empty())
            .map(|v| parse("SOURCE_IP", &v))
            .transpose()?;

        let http_timeout = match lookup("HTTP_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse("HTTP_TIMEOUT_SECS", &v)?),
            None => Duration::from_secs(30),
        };

        let lookback_days = match lookup("LOOKBACK_DAYS") {
            Some(v) => parse("LOOKBACK_DAYS", &v)?,
            None => 6,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            app_id: required("OPEN_EXCHANGE_APP_ID")?,
            open_exchange_url: lookup("OPEN_EXCHANGE_URL")
                .unwrap_or_else(|| OPEN_EXCHANGE_URL.to_string()),
            required_currencies,
            source_ip,
            http_timeout,
            lookback_days,
        })
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key}={value}: {e}")))
}
