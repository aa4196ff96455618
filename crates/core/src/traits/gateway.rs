use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::OutreachResult;

/// 语音外呼网关
///
/// 实际拨号由外部语音代理完成，核心只依赖它返回呼叫句柄或失败。
#[async_trait]
pub trait VoiceDispatchGateway: Send + Sync {
    /// 发起一次外呼，动态变量以扁平字符串键值对传递，成功返回呼叫句柄
    async fn dispatch(
        &self,
        phone: &str,
        variables: &HashMap<String, String>,
    ) -> OutreachResult<String>;
}

/// 异步消息渠道网关（语音尝试用尽后的兜底通道）
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> OutreachResult<()>;
}
