//! UptimeRobot monitor states.

use std::fmt;

use log::debug;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::{Error, Result};

pub const UPTIMEROBOT_API_URL: &str = "https://api.uptimerobot.com/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Paused,
    NotChecked,
    Up,
    SeemsDown,
    Down,
    Unknown,
}

impl MonitorState {
    pub fn from_code(code: &str) -> Self {
        match code {
            "0" => MonitorState::Paused,
            "1" => MonitorState::NotChecked,
            "2" => MonitorState::Up,
            "8" => MonitorState::SeemsDown,
            "9" => MonitorState::Down,
            _ => MonitorState::Unknown,
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MonitorState::Paused => "PAUSED",
            MonitorState::NotChecked => "NOT CHECK",
            MonitorState::Up => "UP",
            MonitorState::SeemsDown => "SEEMS DOWN",
            MonitorState::Down => "DOWN",
            MonitorState::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Deserialize)]
struct MonitorsResponse {
    stat: Option<String>,
    message: Option<String>,
    monitors: Option<Monitors>,
}

#[derive(Debug, Deserialize)]
struct Monitors {
    #[serde(default)]
    monitor: Vec<Monitor>,
}

#[derive(Debug, Deserialize)]
struct Monitor {
    #[serde(rename = "friendlyname")]
    friendly_name: String,
    status: String,
}

#[derive(Debug, Clone)]
pub struct UptimeRobotClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl UptimeRobotClient {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: UPTIMEROBOT_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = format!("{}/", base_url.trim_end_matches('/'));
        self
    }

    /// Friendly name and current state of every monitor on the account.
    pub async fn monitor_states(&self) -> Result<Vec<(String, MonitorState)>> {
        let url = Url::parse_with_params(
            &format!("{}getMonitors", self.base_url),
            &[
                ("apiKey", self.api_key.as_str()),
                ("noJsonCallback", "1"),
                ("format", "json"),
            ],
        )
        .map_err(|e| Error::Config(format!("Invalid UptimeRobot url: {e}")))?;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::UptimeRobot(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::UptimeRobot(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::UptimeRobot(format!(
                "Http Error {}. {}",
                status.as_u16(),
                text
            )));
        }

        let body: MonitorsResponse = serde_json::from_str(&text)?;
        if body.stat.as_deref() != Some("ok") {
            return Err(Error::UptimeRobot(
                body.message
                    .unwrap_or_else(|| "UptimerobotAPI unknown error".to_string()),
            ));
        }

        let monitors = body.monitors.map(|m| m.monitor).unwrap_or_default();
        debug!("UptimeRobot returned {} monitors", monitors.len());

        Ok(monitors
            .into_iter()
            .map(|m| (m.friendly_name, MonitorState::from_code(&m.status)))
            .collect())
    }
}
