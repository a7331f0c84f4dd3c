//! Exchange rates cached in Postgres and fetched from Open Exchange Rates,
//! plus small clients for UptimeRobot and VirusTotal.

pub mod config;
pub mod error;
pub mod exchange_rate;
pub mod fetcher;
pub mod http;
pub mod open_exchange;
pub mod resolver;
pub mod store;
pub mod uptime_robot;
pub mod virus_total;

pub use config::Config;
pub use error::{Error, Result};
pub use exchange_rate::ExchangeRate;
pub use fetcher::RateFetcher;
pub use open_exchange::OpenExchangeClient;
pub use resolver::RateResolver;
pub use store::{MemoryRateStore, PgRateStore, RateStore};
pub use uptime_robot::{MonitorState, UptimeRobotClient};
pub use virus_total::VirusTotalClient;
