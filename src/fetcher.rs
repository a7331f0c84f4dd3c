//! Remote side of rate resolution.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// Source of USD-based exchange rates.
///
/// Both calls must return a mapping that covers every code in `needed`,
/// otherwise they fail with [`Error::MissingRate`].
#[async_trait]
pub trait RateFetcher: Send + Sync {
    /// Rates recorded for `day`. Fails with [`Error::RemoteUnavailable`] when
    /// the service has no data for that date.
    async fn fetch_historical(
        &self,
        day: NaiveDate,
        needed: &BTreeSet<String>,
    ) -> Result<HashMap<String, Decimal>>;

    /// Rates as of now.
    async fn fetch_latest(&self, needed: &BTreeSet<String>) -> Result<HashMap<String, Decimal>>;
}

/// Fails with [`Error::MissingRate`] unless `rates` has every code in `needed`.
pub fn ensure_covers(rates: &HashMap<String, Decimal>, needed: &BTreeSet<String>) -> Result<()> {
    let missing: Vec<String> = needed
        .iter()
        .filter(|code| !rates.contains_key(*code))
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingRate { currencies: missing })
    }
}
