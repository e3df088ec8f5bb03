use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::DeliveryError;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Outbound channel for the daily schedule post.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// POST `{ "content": ... }` to `url`. Any non-2xx status is an error.
    async fn post(&self, url: &str, content: &str) -> Result<(), DeliveryError>;

    /// Fire-and-forget fallback after a failed [`post`](Self::post).
    /// Returns whether the payload was handed off; the response is not
    /// inspected. Transports without a fallback return `false`.
    async fn beacon(&self, _url: &str, _content: &str) -> bool {
        false
    }
}

/// `reqwest`-backed webhook client (Discord-compatible payload).
pub struct HttpWebhook {
    client: reqwest::Client,
}

impl HttpWebhook {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhook {
    async fn post(&self, url: &str, content: &str) -> Result<(), DeliveryError> {
        debug!(chars = content.len(), "posting schedule webhook");

        let resp = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .json(&WebhookPayload { content })
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status, body = %body, "webhook rejected schedule post");
            return Err(DeliveryError::Status { status, body });
        }
        Ok(())
    }

    async fn beacon(&self, url: &str, content: &str) -> bool {
        match self
            .client
            .post(url)
            .header("content-type", "application/json")
            .json(&WebhookPayload { content })
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!("webhook beacon not sent: {e}");
                false
            }
        }
    }
}

/// Post `content`, falling back to a beacon when the post fails. The
/// original post error is returned if the beacon is not sent either.
pub async fn deliver(
    transport: &dyn WebhookTransport,
    url: &str,
    content: &str,
) -> Result<(), DeliveryError> {
    match transport.post(url, content).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!("webhook post failed, trying beacon: {e}");
            if transport.beacon(url, content).await {
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}
