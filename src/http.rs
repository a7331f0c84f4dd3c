use std::net::IpAddr;
use std::time::Duration;

use log::debug;
use reqwest::Client;

use crate::error::Result;

/// Builds the client shared by every API wrapper.
///
/// With a `source_ip`, both plain and TLS connections are opened from that
/// local address, which lets hosts with several interfaces pick the one the
/// remote API has whitelisted.
pub fn build_client(source_ip: Option<IpAddr>, timeout: Duration) -> Result<Client> {
    if let Some(ip) = source_ip {
        debug!("Binding outgoing requests to {}", ip);
    }

    let client = Client::builder()
        .local_address(source_ip)
        .timeout(timeout)
        .build()?;

    Ok(client)
}
