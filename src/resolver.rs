//! Cache-or-fetch resolution of the rates a report needs for one day.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use log::{debug, warn};
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::exchange_rate::{ExchangeRate, normalize_currency};
use crate::fetcher::{RateFetcher, ensure_covers};
use crate::store::RateStore;

pub const USD: &str = "USD";

/// Rates of 1 USD in every required currency for a single day.
#[derive(Debug, Clone)]
pub struct RateResolver {
    day: NaiveDate,
    required: BTreeSet<String>,
    rates: HashMap<String, Decimal>,
}

impl RateResolver {
    /// Resolves `required` for `day` from `store`, fetching what is missing.
    ///
    /// Freshly fetched historical rates are written back to the store. When
    /// the service has no historical data for `day`, the latest rates fill
    /// the gap and are not stored, since they do not belong to that date.
    pub async fn resolve<S, F, I>(store: &S, fetcher: &F, day: NaiveDate, required: I) -> Result<Self>
    where
        S: RateStore + ?Sized,
        F: RateFetcher + ?Sized,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let required: BTreeSet<String> = required
            .into_iter()
            .map(|code| normalize_currency(code.as_ref()))
            .collect();

        let mut rates = store.find(day).await?;

        let undefined: BTreeSet<String> = required
            .iter()
            .filter(|code| !rates.contains_key(*code))
            .cloned()
            .collect();

        if undefined.is_empty() {
            debug!("All {} rates for {} found in store", required.len(), day);
            return Ok(Self { day, required, rates });
        }

        match fetcher.fetch_historical(day, &undefined).await {
            Ok(fetched) => {
                let records: Vec<ExchangeRate> = undefined
                    .iter()
                    .filter_map(|code| fetched.get(code).map(|rate| ExchangeRate::new(day, code, *rate)))
                    .collect();
                merge(&mut rates, fetched);
                // Nothing is stored for a day the service answered only in part.
                ensure_covers(&rates, &required)?;
                store.bulk_insert(&records).await?;
            }
            Err(Error::RemoteUnavailable { .. }) => {
                warn!("Historical rates for {} unavailable, using latest rates", day);
                let latest = fetcher.fetch_latest(&undefined).await?;
                merge(&mut rates, latest);
            }
            Err(e) => return Err(e),
        }

        ensure_covers(&rates, &required)?;

        Ok(Self { day, required, rates })
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }

    pub fn rates(&self) -> &HashMap<String, Decimal> {
        &self.rates
    }

    pub fn rate(&self, currency: &str) -> Option<Decimal> {
        self.rates.get(&normalize_currency(currency)).copied()
    }

    /// Converts a positive `amount` in `currency` to USD. Non-positive
    /// amounts and USD amounts are returned as they are.
    pub fn convert(&self, currency: &str, amount: Decimal) -> Result<Decimal> {
        let currency = normalize_currency(currency);
        if amount <= Decimal::ZERO || currency == USD {
            return Ok(amount);
        }

        let rate = self
            .rates
            .get(&currency)
            .ok_or_else(|| Error::Lookup(currency.clone()))?;

        if rate.is_zero() {
            return Err(Error::InvalidRate(currency));
        }

        amount
            .checked_div(*rate)
            .ok_or(Error::ConversionOverflow { currency, amount })
    }
}

/// Adds `fetched` rates without replacing values already known for the day.
fn merge(rates: &mut HashMap<String, Decimal>, fetched: HashMap<String, Decimal>) {
    for (code, rate) in fetched {
        rates.entry(code).or_insert(rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRateStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Historical {
        Rates(HashMap<String, Decimal>),
        // Reports success without checking what it returns.
        Partial(HashMap<String, Decimal>),
        NotAvailable,
        Fails(&'static str),
    }

    struct FakeFetcher {
        historical: Historical,
        latest: HashMap<String, Decimal>,
        historical_calls: AtomicUsize,
        latest_calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn new(historical: Historical, latest: &[(&str, Decimal)]) -> Self {
            Self {
                historical,
                latest: rates(latest),
                historical_calls: AtomicUsize::new(0),
                latest_calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> (usize, usize) {
            (
                self.historical_calls.load(Ordering::SeqCst),
                self.latest_calls.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait]
    impl RateFetcher for FakeFetcher {
        async fn fetch_historical(
            &self,
            day: NaiveDate,
            needed: &BTreeSet<String>,
        ) -> Result<HashMap<String, Decimal>> {
            self.historical_calls.fetch_add(1, Ordering::SeqCst);
            match &self.historical {
                Historical::Rates(rates) => {
                    ensure_covers(rates, needed)?;
                    Ok(rates.clone())
                }
                Historical::Partial(rates) => Ok(rates.clone()),
                Historical::NotAvailable => Err(Error::RemoteUnavailable { day }),
                Historical::Fails(msg) => Err(Error::Remote(msg.to_string())),
            }
        }

        async fn fetch_latest(&self, needed: &BTreeSet<String>) -> Result<HashMap<String, Decimal>> {
            self.latest_calls.fetch_add(1, Ordering::SeqCst);
            ensure_covers(&self.latest, needed)?;
            Ok(self.latest.clone())
        }
    }

    fn rates(pairs: &[(&str, Decimal)]) -> HashMap<String, Decimal> {
        pairs.iter().map(|(c, r)| (c.to_string(), *r)).collect()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()
    }

    async fn seeded_store(pairs: &[(&str, Decimal)]) -> MemoryRateStore {
        let store = MemoryRateStore::new();
        let records: Vec<ExchangeRate> = pairs
            .iter()
            .map(|(c, r)| ExchangeRate::new(day(), *c, *r))
            .collect();
        store.bulk_insert(&records).await.unwrap();
        store
    }

    fn resolver_with(pairs: &[(&str, Decimal)]) -> RateResolver {
        RateResolver {
            day: day(),
            required: pairs.iter().map(|(c, _)| c.to_string()).collect(),
            rates: rates(pairs),
        }
    }

    #[tokio::test]
    async fn test_store_hit_makes_no_network_calls() {
        let store = seeded_store(&[("EUR", dec!(0.92)), ("GBP", dec!(0.79)), ("JPY", dec!(150))]).await;
        let fetcher = FakeFetcher::new(Historical::Fails("must not be called"), &[]);

        let resolver = RateResolver::resolve(&store, &fetcher, day(), ["EUR", "GBP"])
            .await
            .unwrap();

        assert_eq!(fetcher.calls(), (0, 0));
        assert_eq!(resolver.rate("EUR"), Some(dec!(0.92)));
        assert_eq!(resolver.rate("JPY"), Some(dec!(150)));
    }

    #[tokio::test]
    async fn test_historical_rates_are_persisted() {
        let store = seeded_store(&[("EUR", dec!(0.92))]).await;
        let fetcher = FakeFetcher::new(
            Historical::Rates(rates(&[
                ("EUR", dec!(0.95)),
                ("GBP", dec!(0.79)),
                ("RUB", dec!(91.2)),
                ("JPY", dec!(150)),
            ])),
            &[],
        );

        let resolver = RateResolver::resolve(&store, &fetcher, day(), ["eur", "gbp", "rub"])
            .await
            .unwrap();

        assert_eq!(fetcher.calls(), (1, 0));
        // EUR came from the store, GBP and RUB were written.
        assert_eq!(store.len().await, 3);
        assert_eq!(resolver.rate("EUR"), Some(dec!(0.92)));
        assert_eq!(resolver.rate("RUB"), Some(dec!(91.2)));

        let stored = store.find(day()).await.unwrap();
        assert_eq!(stored["GBP"], dec!(0.79));
        assert!(!stored.contains_key("JPY"));
    }

    #[tokio::test]
    async fn test_empty_store_persists_every_undefined_currency() {
        let store = MemoryRateStore::new();
        let fetcher = FakeFetcher::new(
            Historical::Rates(rates(&[("EUR", dec!(0.9)), ("GBP", dec!(0.8))])),
            &[],
        );

        let resolver = RateResolver::resolve(&store, &fetcher, day(), ["EUR", "GBP"])
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(resolver.required().len(), 2);
    }

    #[tokio::test]
    async fn test_not_available_falls_back_to_latest_without_storing() {
        let store = MemoryRateStore::new();
        let fetcher = FakeFetcher::new(Historical::NotAvailable, &[("EUR", dec!(0.91)), ("GBP", dec!(0.78))]);

        let resolver = RateResolver::resolve(&store, &fetcher, day(), ["EUR", "GBP"])
            .await
            .unwrap();

        assert_eq!(fetcher.calls(), (1, 1));
        assert!(store.is_empty().await);
        assert_eq!(resolver.rate("GBP"), Some(dec!(0.78)));
    }

    #[tokio::test]
    async fn test_remote_error_is_terminal() {
        let store = MemoryRateStore::new();
        let fetcher = FakeFetcher::new(Historical::Fails("x"), &[("EUR", dec!(0.91))]);

        let err = RateResolver::resolve(&store, &fetcher, day(), ["EUR"])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Remote(ref msg) if msg == "x"));
        assert_eq!(fetcher.calls(), (1, 0));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_latest_missing_currency_fails() {
        let store = MemoryRateStore::new();
        let fetcher = FakeFetcher::new(Historical::NotAvailable, &[("EUR", dec!(0.91))]);

        let err = RateResolver::resolve(&store, &fetcher, day(), ["EUR", "XYZ"])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingRate { ref currencies } if currencies == &["XYZ"]));
    }

    #[tokio::test]
    async fn test_incomplete_historical_answer_fails_without_storing() {
        let store = MemoryRateStore::new();
        let fetcher = FakeFetcher::new(
            Historical::Partial(rates(&[("EUR", dec!(0.9)), ("JPY", dec!(150))])),
            &[("GBP", dec!(0.8))],
        );

        let err = RateResolver::resolve(&store, &fetcher, day(), ["EUR", "GBP"])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingRate { ref currencies } if currencies == &["GBP"]));
        assert_eq!(fetcher.calls(), (1, 0));
        assert!(store.is_empty().await);
    }

    #[test]
    fn test_convert_divides_by_rate() {
        let resolver = resolver_with(&[("EUR", dec!(0.9))]);

        let usd = resolver.convert("EUR", dec!(100)).unwrap();

        assert_eq!(usd.round_dp(2), dec!(111.11));
    }

    #[test]
    fn test_convert_usd_is_unchanged() {
        let resolver = resolver_with(&[]);

        assert_eq!(resolver.convert("USD", dec!(100)).unwrap(), dec!(100));
    }

    #[test]
    fn test_convert_non_positive_is_unchanged() {
        let resolver = resolver_with(&[("EUR", dec!(0.9))]);

        assert_eq!(resolver.convert("EUR", dec!(-5)).unwrap(), dec!(-5));
        assert_eq!(resolver.convert("XYZ", Decimal::ZERO).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_convert_unknown_currency() {
        let resolver = resolver_with(&[("EUR", dec!(0.9))]);

        let err = resolver.convert("XYZ", dec!(10)).unwrap_err();

        assert!(matches!(err, Error::Lookup(ref code) if code == "XYZ"));
    }

    #[test]
    fn test_convert_zero_rate() {
        let resolver = resolver_with(&[("EUR", Decimal::ZERO)]);

        assert!(matches!(
            resolver.convert("EUR", dec!(10)),
            Err(Error::InvalidRate(_))
        ));
    }

    #[test]
    fn test_convert_overflow() {
        let resolver = resolver_with(&[("EUR", dec!(0.5))]);

        let err = resolver.convert("EUR", Decimal::MAX).unwrap_err();

        assert!(matches!(err, Error::ConversionOverflow { ref currency, .. } if currency == "EUR"));
    }
}
