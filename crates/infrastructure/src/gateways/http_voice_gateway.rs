use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use outreach_core::config::VoiceGatewayConfig;
use outreach_core::errors::{OutreachError, OutreachResult};
use outreach_core::traits::VoiceDispatchGateway;

/// 语音服务商的外呼应答
#[derive(Debug, Deserialize)]
struct DispatchResponse {
    call_id: String,
}

/// 语音外呼网关的HTTP实现
pub struct HttpVoiceGateway {
    config: VoiceGatewayConfig,
    http_client: reqwest::Client,
}

impl HttpVoiceGateway {
    pub fn new(config: VoiceGatewayConfig) -> OutreachResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| OutreachError::DispatchGateway(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl VoiceDispatchGateway for HttpVoiceGateway {
    async fn dispatch(
        &self,
        phone: &str,
        variables: &HashMap<String, String>,
    ) -> OutreachResult<String> {
        let url = format!("{}/v1/calls", self.config.base_url);
        let payload = json!({
            "agent_id": self.config.agent_id,
            "to": phone,
            "variables": variables,
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("X-Request-Id", uuid::Uuid::new_v4().to_string())
            .json(&payload)
            .send()
            .await
            .map_err(|e| OutreachError::DispatchGateway(format!("外呼请求失败: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("外呼被服务商拒绝: HTTP {} - {}", status, body);
            return Err(OutreachError::DispatchGateway(format!(
                "HTTP {status} - {body}"
            )));
        }

        let dispatch: DispatchResponse = response
            .json()
            .await
            .map_err(|e| OutreachError::DispatchGateway(format!("外呼应答解析失败: {e}")))?;

        info!("外呼已受理，呼叫句柄: {}", dispatch.call_id);
        Ok(dispatch.call_id)
    }
}
