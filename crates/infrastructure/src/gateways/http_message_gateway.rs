use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info};

use outreach_core::config::MessagingConfig;
use outreach_core::errors::{OutreachError, OutreachResult};
use outreach_core::traits::MessageGateway;

/// 异步消息渠道网关的HTTP实现
pub struct HttpMessageGateway {
    config: MessagingConfig,
    http_client: reqwest::Client,
}

impl HttpMessageGateway {
    pub fn new(config: MessagingConfig) -> OutreachResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| OutreachError::MessageGateway(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl MessageGateway for HttpMessageGateway {
    async fn send_text(&self, to: &str, body: &str) -> OutreachResult<()> {
        let url = format!("{}/v1/messages", self.config.base_url);
        let payload = json!({
            "to": to,
            "body": body,
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| OutreachError::MessageGateway(format!("消息发送失败: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!("消息被渠道拒绝: HTTP {} - {}", status, text);
            return Err(OutreachError::MessageGateway(format!(
                "HTTP {status} - {text}"
            )));
        }

        info!("异步消息已发送至 {}", to);
        Ok(())
    }
}
