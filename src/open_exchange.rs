//! Client for the Open Exchange Rates API.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info};
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::exchange_rate::normalize_currency;
use crate::fetcher::{RateFetcher, ensure_covers};

pub const OPEN_EXCHANGE_URL: &str = "https://openexchangerates.org/api/";

const NOT_AVAILABLE: &str = "not_available";

/// Body of both `historical/{date}.json` and `latest.json`.
///
/// Failures come back as `{"error": true, "message": "...", "description": "..."}`.
#[derive(Debug, Deserialize, PartialEq)]
pub struct RatesResponse {
    #[serde(default)]
    pub error: bool,
    pub message: Option<String>,
    pub description: Option<String>,
    pub base: Option<String>,
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub rates: HashMap<String, Decimal>,
}

#[derive(Debug, Clone)]
pub struct OpenExchangeClient {
    client: Client,
    app_id: String,
    base_url: String,
}

impl OpenExchangeClient {
    pub fn new(client: Client, app_id: impl Into<String>) -> Self {
        Self {
            client,
            app_id: app_id.into(),
            base_url: OPEN_EXCHANGE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = format!("{}/", base_url.trim_end_matches('/'));
        self
    }

    fn historical_url(&self, day: NaiveDate) -> Result<Url> {
        self.url(&format!("historical/{}.json", day.format("%Y-%m-%d")))
    }

    fn latest_url(&self) -> Result<Url> {
        self.url("latest.json")
    }

    fn url(&self, path: &str) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}{}", self.base_url, path),
            &[("app_id", self.app_id.as_str())],
        )
        .map_err(|e| Error::Config(format!("Invalid rates url: {e}")))
    }

    async fn load_rates(&self, url: Url) -> Result<RatesResponse> {
        debug!("Requesting {}", url.path());
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        // Error payloads arrive with 4xx statuses, so the body is parsed first.
        match serde_json::from_str::<RatesResponse>(&text) {
            Ok(body) if body.error || status.is_success() => Ok(body),
            _ if !status.is_success() => {
                Err(Error::Remote(format!("Can't download rates: {}", status)))
            }
            Ok(body) => Ok(body),
            Err(e) => Err(e.into()),
        }
    }
}

fn into_rates(body: RatesResponse, needed: &BTreeSet<String>) -> Result<HashMap<String, Decimal>> {
    let rates: HashMap<String, Decimal> = body
        .rates
        .into_iter()
        .map(|(code, rate)| (normalize_currency(&code), rate))
        .collect();
    ensure_covers(&rates, needed)?;
    Ok(rates)
}

fn error_message(body: &RatesResponse) -> String {
    body.message
        .clone()
        .or_else(|| body.description.clone())
        .unwrap_or_else(|| "unknown error".to_string())
}

#[async_trait]
impl RateFetcher for OpenExchangeClient {
    async fn fetch_historical(
        &self,
        day: NaiveDate,
        needed: &BTreeSet<String>,
    ) -> Result<HashMap<String, Decimal>> {
        let body = self.load_rates(self.historical_url(day)?).await?;
        if body.error {
            return match body.message.as_deref() {
                Some(NOT_AVAILABLE) => Err(Error::RemoteUnavailable { day }),
                _ => Err(Error::Remote(error_message(&body))),
            };
        }

        info!("Fetched {} historical rates for {}", body.rates.len(), day);
        into_rates(body, needed)
    }

    async fn fetch_latest(&self, needed: &BTreeSet<String>) -> Result<HashMap<String, Decimal>> {
        let body = self.load_rates(self.latest_url()?).await?;
        if body.error {
            return Err(Error::Remote(error_message(&body)));
        }

        info!("Fetched {} latest rates", body.rates.len());
        into_rates(body, needed)
    }
}
