//! Alerting on failed requests.
//!
//! Only the request dispatcher raises alerts, once per failed request. A sink
//! that cannot deliver logs the problem and gives up.

use crate::config::AlertConfig;
use crate::error::TableError;
use crate::models::MatchId;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, warn};

/// What the failing request was.
#[derive(Debug, Clone, Serialize)]
pub struct AlertContext {
    pub request: String,
    pub match_id: MatchId,
    pub params: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, error: &TableError, context: &AlertContext);
}

/// Writes alerts to the log at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn notify(&self, err: &TableError, context: &AlertContext) {
        error!(
            category = %err.category(),
            request = %context.request,
            match_id = %context.match_id,
            params = %serde_json::Value::Object(context.params.clone()),
            "ALERT: {}",
            err
        );
    }
}

#[derive(Debug, Serialize)]
struct AlertPayload<'a> {
    category: String,
    error: String,
    #[serde(flatten)]
    context: &'a AlertContext,
    timestamp: String,
}

/// Posts alerts as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookAlertSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookAlertSink {
    pub fn new(url: impl Into<String>) -> Result<Self, TableError> {
        let client = reqwest::Client::builder()
            .timeout(AlertConfig::WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| TableError::Config {
                message: format!("Failed to create alert client: {}", e),
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn notify(&self, err: &TableError, context: &AlertContext) {
        let payload = AlertPayload {
            category: err.category().to_string(),
            error: err.to_string(),
            context,
            timestamp: Utc::now().to_rfc3339(),
        };

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => warn!(
                "Alert webhook {} answered {} for match {}",
                self.url,
                response.status(),
                context.match_id
            ),
            Err(e) => warn!(
                "Alert webhook {} unreachable for match {}: {}",
                self.url, context.match_id, e
            ),
        }
    }
}
