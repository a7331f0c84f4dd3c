use anyhow::Result;
use chrono::{Days, NaiveDate, Utc};
use log::info;
use ratebook::{Config, OpenExchangeClient, PgRateStore, RateResolver, http};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = PgRateStore::new(pool);
    store.migrate().await?;

    let client = http::build_client(config.source_ip, config.http_timeout)?;
    let fetcher =
        OpenExchangeClient::new(client, &config.app_id).with_base_url(&config.open_exchange_url);

    let today = Utc::now().date_naive();
    let start_date = today
        .checked_sub_days(Days::new(config.lookback_days))
        .ok_or(anyhow::anyhow!("Can't get previous date for {}", today))?;

    iterate(&store, &fetcher, &config.required_currencies, start_date, today).await?;

    Ok(())
}

async fn iterate(
    store: &PgRateStore,
    fetcher: &OpenExchangeClient,
    required: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<()> {
    if start_date > end_date {
        return Err(anyhow::anyhow!("Start date must be before end date"));
    }

    let mut current_date = end_date;

    while current_date >= start_date {
        let resolver = RateResolver::resolve(store, fetcher, current_date, required).await?;
        for code in resolver.required() {
            if let Some(rate) = resolver.rate(code) {
                info!("{} {}: {}", current_date, code, rate);
            }
        }

        current_date = current_date
            .pred_opt()
            .ok_or(anyhow::anyhow!("Can't get pred date for {}", current_date))?;
    }

    Ok(())
}
