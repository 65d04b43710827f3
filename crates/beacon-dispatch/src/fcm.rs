use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::{DispatchOutcome, MulticastSummary};

/// Client for the FCM legacy HTTP API. Every request carries the server key;
/// HTTP or provider errors surface as failed outcomes, never as panics.
pub struct FcmClient {
    http: reqwest::Client,
    api_url: String,
    server_key: String,
}

#[derive(Debug, Deserialize)]
struct FcmResponse {
    #[serde(default)]
    success: usize,
    #[serde(default)]
    failure: usize,
    #[serde(default)]
    results: Vec<FcmResult>,
}

#[derive(Debug, Deserialize)]
struct FcmResult {
    message_id: Option<String>,
    error: Option<String>,
}

impl FcmClient {
    pub fn new(api_url: String, server_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_url,
            server_key,
        }
    }

    pub async fn send_one(
        &self,
        device_token: &str,
        title: &str,
        body: &str,
        data: Option<serde_json::Value>,
    ) -> DispatchOutcome {
        let payload = json!({
            "to": device_token,
            "notification": { "title": title, "body": body },
            "data": data.unwrap_or_else(|| json!({})),
        });

        let response = match self.post(&payload).await {
            Ok(response) => response,
            Err(e) => return DispatchOutcome::err(e.to_string()),
        };

        match response.results.first() {
            Some(result) if result.error.is_none() => DispatchOutcome::ok(
                result
                    .message_id
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
            Some(result) => {
                DispatchOutcome::err(result.error.clone().unwrap_or_else(|| "unknown".to_string()))
            }
            None if response.failure == 0 => DispatchOutcome::ok("unknown".to_string()),
            None => DispatchOutcome::err("provider returned no result"),
        }
    }

    pub async fn send_many(
        &self,
        device_tokens: &[String],
        title: &str,
        body: &str,
        data: Option<serde_json::Value>,
    ) -> MulticastSummary {
        if device_tokens.is_empty() {
            return MulticastSummary::default();
        }

        let payload = json!({
            "registration_ids": device_tokens,
            "notification": { "title": title, "body": body },
            "data": data.unwrap_or_else(|| json!({})),
        });

        match self.post(&payload).await {
            Ok(response) => MulticastSummary {
                success_count: response.success,
                failure_count: response.failure,
            },
            Err(e) => {
                warn!("FCM multicast failed: {}", e);
                MulticastSummary {
                    success_count: 0,
                    failure_count: device_tokens.len(),
                }
            }
        }
    }

    async fn post(&self, payload: &serde_json::Value) -> anyhow::Result<FcmResponse> {
        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("key={}", self.server_key))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("FCM returned {}", status);
        }

        Ok(response.json::<FcmResponse>().await?)
    }
}
