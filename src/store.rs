//! Persisted exchange rates keyed by (date, currency).

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use log::info;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::exchange_rate::ExchangeRate;

#[async_trait]
pub trait RateStore: Send + Sync {
    /// All rates stored for `day`, keyed by currency.
    async fn find(&self, day: NaiveDate) -> Result<HashMap<String, Decimal>>;

    /// Stores `rates`, skipping any (date, currency) already present.
    /// Returns the number of rows written.
    async fn bulk_insert(&self, rates: &[ExchangeRate]) -> Result<u64>;
}

/// Postgres-backed store over the `exchange_rates` table.
#[derive(Debug, Clone)]
pub struct PgRateStore {
    pool: PgPool,
}

impl PgRateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Migrations completed successfully");
        Ok(())
    }

    /// Every stored record for `day`, ordered by currency.
    pub async fn records(&self, day: NaiveDate) -> Result<Vec<ExchangeRate>> {
        let rows = sqlx::query_as::<_, ExchangeRate>(
            "SELECT id, rate_date, currency, rate FROM exchange_rates \
             WHERE rate_date = $1 ORDER BY currency",
        )
        .bind(day)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl RateStore for PgRateStore {
    async fn find(&self, day: NaiveDate) -> Result<HashMap<String, Decimal>> {
        let rows = self.records(day).await?;
        Ok(rows.into_iter().map(|r| (r.currency, r.rate)).collect())
    }

    async fn bulk_insert(&self, rates: &[ExchangeRate]) -> Result<u64> {
        if rates.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = rates.iter().map(|r| r.id).collect();
        let dates: Vec<NaiveDate> = rates.iter().map(|r| r.rate_date).collect();
        let currencies: Vec<String> = rates.iter().map(|r| r.currency.clone()).collect();
        let values: Vec<Decimal> = rates.iter().map(|r| r.rate).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO exchange_rates (id, rate_date, currency, rate)
            SELECT * FROM UNNEST($1::uuid[], $2::date[], $3::text[], $4::numeric[])
            ON CONFLICT (rate_date, currency) DO NOTHING
            "#,
        )
        .bind(&ids)
        .bind(&dates)
        .bind(&currencies)
        .bind(&values)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected();
        info!("Stored {} of {} exchange rates", inserted, rates.len());
        Ok(inserted)
    }
}

/// Store kept in process memory, with the same uniqueness rule as the table.
#[derive(Debug, Default)]
pub struct MemoryRateStore {
    rates: Mutex<BTreeMap<(NaiveDate, String), ExchangeRate>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rates.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rates.lock().await.is_empty()
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn find(&self, day: NaiveDate) -> Result<HashMap<String, Decimal>> {
        let rates = self.rates.lock().await;
        Ok(rates
            .values()
            .filter(|r| r.rate_date == day)
            .map(|r| (r.currency.clone(), r.rate))
            .collect())
    }

    async fn bulk_insert(&self, records: &[ExchangeRate]) -> Result<u64> {
        let mut rates = self.rates.lock().await;
        let mut inserted = 0;
        for record in records {
            let key = (record.rate_date, record.currency.clone());
            if !rates.contains_key(&key) {
                rates.insert(key, record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}
