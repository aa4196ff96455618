use serde::{Deserialize, Serialize};

/// 呼叫生命周期 webhook 载荷
///
/// 上游语音服务发来的事件是松散的 JSON，在 API 边界规范化成这个
/// 窄结构，结局分类器只消费强类型的值。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallWebhookEvent {
    pub event: CallEventKind,
    pub call: CallEventBody,
}

/// 事件类型，未识别的类型进 Unknown，确认后忽略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEventKind {
    CallStarted,
    CallEnded,
    CallAnalyzed,
    #[serde(other)]
    Unknown,
}

/// 呼叫事件体，除句柄外所有字段都可缺省
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallEventBody {
    /// 外部呼叫句柄，与 CallAttempt.call_handle 关联
    pub id: String,
    #[serde(default)]
    pub disconnect_reason: Option<String>,
    #[serde(default)]
    pub call_status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub transcript_snippet: Option<String>,
    #[serde(default)]
    pub transcript: Option<serde_json::Value>,
    #[serde(default)]
    pub collected_vars: Option<serde_json::Value>,
}

impl CallEventBody {
    /// 所有文本字段拼成小写串，供关键词分类
    pub fn text_blob(&self) -> String {
        [
            self.disconnect_reason.as_deref(),
            self.call_status.as_deref(),
            self.summary.as_deref(),
            self.result.as_deref(),
            self.transcript_snippet.as_deref(),
        ]
        .iter()
        .flatten()
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
    }

    /// 原样保存到尝试记录的诊断文本
    pub fn raw_outcome_text(&self) -> Option<String> {
        let parts: Vec<&str> = [
            self.disconnect_reason.as_deref(),
            self.call_status.as_deref(),
            self.result.as_deref(),
            self.summary.as_deref(),
        ]
        .iter()
        .flatten()
        .copied()
        .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" | "))
        }
    }
}
