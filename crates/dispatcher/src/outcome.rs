//! 呼叫结局分类
//!
//! 纯函数：把一次呼叫结束事件的松散文本字段映射到规范结局。
//! 分类必须确定，历史事件可以随时用原始文本重算。

use outreach_core::models::CallEventBody;

/// 规范呼叫结局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// 没接通真人；voicemail 标记是否进了语音信箱
    NoHumanReached { voicemail: bool },
    /// 接通的不是目标本人
    IdentityMismatch,
    /// 其余情况一律视为完成了有效对话
    ResolvedOther,
}

/// 语音信箱/应答机的精确挂断码
const VOICEMAIL_DISCONNECT_CODES: &[&str] = &[
    "voicemail",
    "voicemail_reached",
    "answering_machine",
    "machine_detected",
];

/// 语音信箱文本关键词
const VOICEMAIL_KEYWORDS: &[&str] = &[
    "voicemail",
    "voice mail",
    "answering machine",
    "buzón de voz",
    "buzon de voz",
    "correo de voz",
    "contestadora",
];

/// 未接通关键词，覆盖英语与西语口语说法
const NO_HUMAN_KEYWORDS: &[&str] = &[
    "no answer",
    "no-answer",
    "didn't pick up",
    "did not pick up",
    "busy",
    "timeout",
    "timed out",
    "failed",
    "cancelled",
    "canceled",
    "declined",
    "unreachable",
    "no contestó",
    "no contesto",
    "no respondió",
    "no respondio",
    "ocupado",
    "no disponible",
    "fuera de servicio",
    "colgó antes",
    "colgo antes",
];

/// 身份不符关键词
const IDENTITY_KEYWORDS: &[&str] = &[
    "mismatch",
    "identity",
    "wrong person",
    "wrong number",
    "divergent",
    "not the person",
    "no es la persona",
    "persona equivocada",
    "número equivocado",
    "numero equivocado",
    "no es él",
    "no es ella",
];

/// 分类一次呼叫结束事件，按序匹配，先命中先生效
///
/// 事件完全没有可识别信号时归入 `ResolvedOther`：沉默或含混的
/// 事件不应该触发无止境的重试。
pub fn classify(event: &CallEventBody) -> CallOutcome {
    if let Some(reason) = &event.disconnect_reason {
        if VOICEMAIL_DISCONNECT_CODES.contains(&reason.to_lowercase().as_str()) {
            return CallOutcome::NoHumanReached { voicemail: true };
        }
    }

    let blob = event.text_blob();

    if contains_any(&blob, VOICEMAIL_KEYWORDS) {
        return CallOutcome::NoHumanReached { voicemail: true };
    }
    if contains_any(&blob, NO_HUMAN_KEYWORDS) {
        return CallOutcome::NoHumanReached { voicemail: false };
    }
    if contains_any(&blob, IDENTITY_KEYWORDS) {
        return CallOutcome::IdentityMismatch;
    }

    CallOutcome::ResolvedOther
}

fn contains_any(blob: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| blob.contains(kw))
}
