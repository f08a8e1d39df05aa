//! HTTP client for the database bridge

use super::protocol::{parse_reply, BridgeAction, BridgeReply};
use super::DataStore;
use async_trait::async_trait;
use reqwest::Client;
use rtwiz_common::config::BridgeConfig;
use rtwiz_common::schema::JsonRow;
use rtwiz_common::{Error, Result};
use std::time::Instant;
use tracing::{debug, warn};

/// Bridge client over HTTP POST with URL-encoded forms
///
/// One instance is shared by all repositories; `reqwest::Client` pools
/// connections internally.
#[derive(Debug, Clone)]
pub struct HttpBridge {
    /// HTTP client for bridge requests
    http_client: Client,
    /// Bridge endpoint (the api.php script)
    url: String,
}

impl HttpBridge {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url: config.url.clone(),
        })
    }

    /// Send one action and classify the reply
    async fn request(&self, action: BridgeAction, sql: Option<&str>) -> Result<BridgeReply> {
        let mut form: Vec<(&str, &str)> = vec![("action", action.as_str())];
        if let Some(sql) = sql {
            form.push(("sql", sql));
        }

        let started = Instant::now();
        let response = self
            .http_client
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                warn!(action = %action, error = %e, "Bridge request failed");
                if e.is_timeout() {
                    Error::Connection(format!("bridge request timed out: {}", e))
                } else {
                    Error::Connection(format!("bridge unreachable: {}", e))
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Connection(format!("failed to read bridge reply: {}", e)))?;

        debug!(
            action = %action,
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Bridge request complete"
        );

        parse_reply(status, &body).map_err(|e| {
            warn!(action = %action, status, error = %e, "Bridge reported failure");
            e
        })
    }
}

#[async_trait]
impl DataStore for HttpBridge {
    async fn test(&self) -> Result<String> {
        let reply = self.request(BridgeAction::Test, None).await?;
        Ok(reply.message.unwrap_or_else(|| "Connection OK".to_string()))
    }

    async fn query(&self, sql: &str) -> Result<Vec<JsonRow>> {
        let reply = self.request(BridgeAction::Query, Some(sql)).await?;
        Ok(reply.data.unwrap_or_default())
    }

    async fn tables(&self) -> Result<Vec<String>> {
        let reply = self.request(BridgeAction::Tables, None).await?;
        reply.tables.ok_or_else(|| {
            Error::MalformedResponse("tables reply has no 'tables' list".to_string())
        })
    }
}
