//! VirusTotal URL reputation lookups.

use log::debug;
use reqwest::Client;
use serde_json::Value;

use crate::error::{Error, Result};

pub const VIRUSTOTAL_API_URL: &str = "https://www.virustotal.com/vtapi/v2/url/";

#[derive(Debug, Clone)]
pub struct VirusTotalClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl VirusTotalClient {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: VIRUSTOTAL_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = format!("{}/", base_url.trim_end_matches('/'));
        self
    }

    /// Submits `http://{domain}/` for scanning.
    pub async fn scan(&self, domain: &str) -> Result<Value> {
        self.request("scan", domain).await
    }

    /// Latest scan report for `http://{domain}/`.
    pub async fn report(&self, domain: &str) -> Result<Value> {
        self.request("report", domain).await
    }

    /// Posts `domain` to the `method` endpoint and returns the raw body.
    pub async fn request(&self, method: &str, domain: &str) -> Result<Value> {
        let resource = format!("http://{}/", domain);
        let form = [
            ("apikey", self.api_key.as_str()),
            ("resource", resource.as_str()),
            ("url", resource.as_str()),
        ];
        let url = format!("{}{}", self.base_url, method);
        debug!("VirusTotal {} for {}", method, domain);

        let resp = self
            .client
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::VirusTotal(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::VirusTotal(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::VirusTotal(format!(
                "{} Http Error {}. {}",
                domain,
                status.as_u16(),
                text
            )));
        }

        let body: Value = serde_json::from_str(&text)?;
        let response_code = body
            .get("response_code")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if response_code < 1 {
            let error = body
                .get("verbose_msg")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            return Err(Error::VirusTotal(format!("{} {}", domain, error)));
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_report() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/report")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("apikey".into(), "vt-key".into()),
                Matcher::UrlEncoded("resource".into(), "http://example.com/".into()),
                Matcher::UrlEncoded("url".into(), "http://example.com/".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"response_code": 1, "positives": 0, "total": 70}"#)
            .create_async()
            .await;

        let client = VirusTotalClient::new(Client::new(), "vt-key").with_base_url(server.url());
        let body = client.report("example.com").await.unwrap();

        mock.assert_async().await;
        assert_eq!(body["total"], 70);
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/report")
            .with_status(200)
            .with_body(r#"{"response_code": 0, "verbose_msg": "Resource does not exist in the dataset"}"#)
            .create_async()
            .await;

        let client = VirusTotalClient::new(Client::new(), "vt-key").with_base_url(server.url());
        let err = client.report("nowhere.test").await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "VirusTotal API error: nowhere.test Resource does not exist in the dataset"
        );
    }

    #[tokio::test]
    async fn test_http_error_mentions_domain() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/scan")
            .with_status(403)
            .with_body("Forbidden")
            .create_async()
            .await;

        let client = VirusTotalClient::new(Client::new(), "vt-key").with_base_url(server.url());
        let err = client.scan("example.com").await.unwrap_err();

        assert!(matches!(err, Error::VirusTotal(ref msg) if msg == "example.com Http Error 403. Forbidden"));
    }
}
