use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Persisted rate of 1 USD in `currency` on `rate_date`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ExchangeRate {
    pub id: Uuid,
    pub rate_date: NaiveDate,
    pub currency: String,
    pub rate: Decimal,
}

impl ExchangeRate {
    pub fn new(rate_date: NaiveDate, currency: impl Into<String>, rate: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            rate_date,
            currency: normalize_currency(&currency.into()),
            rate,
        }
    }
}

pub fn normalize_currency(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
