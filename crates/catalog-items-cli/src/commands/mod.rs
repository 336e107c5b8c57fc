pub mod check;
pub mod clone;
pub mod delete;
pub mod upload;

use anyhow::{Context, Result};
use catalog_items_vapi::VapiClient;

use crate::config::Connection;

pub fn http_client(insecure: bool) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(insecure)
        .build()
        .context("failed to build HTTP client")
}

/// Log in and return a client holding the API session.
pub async fn connect(http: &reqwest::Client, conn: &Connection) -> Result<VapiClient> {
    VapiClient::login(http.clone(), &conn.server, &conn.username, &conn.password)
        .await
        .with_context(|| format!("failed to log in to {} as {}", conn.server, conn.username))
}
