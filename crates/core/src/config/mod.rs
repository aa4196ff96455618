use std::path::Path;

use anyhow::Result;
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub sweep: SweepConfig,
    pub retry_policy: RetryPolicyConfig,
    pub voice_gateway: VoiceGatewayConfig,
    pub messaging: MessagingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub cors_enabled: bool,
    pub cors_origins: Vec<String>,
    /// webhook 签名共享密钥（HMAC-SHA256）
    pub webhook_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub enabled: bool,
    /// 重试扫描间隔（秒）
    pub retry_interval_seconds: u64,
    /// 异步渠道提示扫描间隔（秒）
    pub prompt_interval_seconds: u64,
    /// 单次扫描处理的线索上限
    pub batch_limit: i64,
}

/// 重试排程策略
///
/// 营业时段边界是策略配置而不是硬编码常量。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicyConfig {
    /// 营业开始整点（本地时间）
    pub open_hour: u32,
    /// 营业结束整点（本地时间，不含）
    pub close_hour: u32,
    /// 周六是否算营业日（周日始终不算）
    pub include_saturday: bool,
    /// 常规重试的候选时刻 = now + lookahead_hours
    pub lookahead_hours: i64,
    /// 语音信箱短回拨窗口下界（分钟）
    pub voicemail_min_minutes: i64,
    /// 语音信箱短回拨窗口上界（分钟）
    pub voicemail_max_minutes: i64,
    /// 候选时刻与已预约咨询的最小间隔（小时）
    pub appointment_buffer_hours: i64,
    /// 两次尝试的最小间隔（小时），防过期计时器重复拨打
    pub min_attempt_gap_hours: i64,
    /// 线索未声明时区时的缺省UTC偏移（分钟）
    pub default_utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceGatewayConfig {
    pub base_url: String,
    pub api_key: String,
    /// 外呼使用的语音代理ID
    pub agent_id: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    pub base_url: String,
    pub api_key: String,
    /// 渠道偏好询问话术，{name} 会被替换为线索姓名
    pub channel_prompt: String,
    pub timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://outreach.db".to_string(),
                max_connections: 10,
                min_connections: 1,
                connection_timeout_seconds: 30,
                idle_timeout_seconds: 600,
            },
            api: ApiConfig {
                enabled: true,
                bind_address: "0.0.0.0:8080".to_string(),
                cors_enabled: true,
                cors_origins: vec!["*".to_string()],
                webhook_secret: String::new(),
            },
            sweep: SweepConfig {
                enabled: true,
                retry_interval_seconds: 600,
                prompt_interval_seconds: 3600,
                batch_limit: 100,
            },
            retry_policy: RetryPolicyConfig::default(),
            voice_gateway: VoiceGatewayConfig {
                base_url: "http://localhost:9100".to_string(),
                api_key: String::new(),
                agent_id: "intake-agent".to_string(),
                timeout_seconds: 30,
            },
            messaging: MessagingConfig {
                base_url: "http://localhost:9200".to_string(),
                api_key: String::new(),
                channel_prompt: "Hola {name}, intentamos llamarte sin éxito. \
                                 ¿Prefieres que te llamemos de nuevo o seguimos por mensaje?"
                    .to_string(),
                timeout_seconds: 30,
            },
        }
    }
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            open_hour: 8,
            close_hour: 20,
            include_saturday: true,
            lookahead_hours: 2,
            voicemail_min_minutes: 15,
            voicemail_max_minutes: 25,
            appointment_buffer_hours: 2,
            min_attempt_gap_hours: 2,
            default_utc_offset_minutes: -300,
        }
    }
}

impl AppConfig {
    /// 加载配置：TOML 文件 + OUTREACH_ 前缀环境变量覆盖
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/outreach.toml",
                "outreach.toml",
                "/etc/outreach/config.toml",
            ];

            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        let defaults = AppConfig::default();
        let defaults_toml =
            toml::to_string(&defaults).map_err(|e| anyhow::anyhow!("序列化缺省配置失败: {e}"))?;

        let settings = ConfigBuilder::builder()
            .add_source(File::from_str(&defaults_toml, FileFormat::Toml))
            .add_source(builder.build()?)
            .add_source(Environment::with_prefix("OUTREACH").separator("__"))
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 基础校验：时段边界与窗口取值必须自洽
    pub fn validate(&self) -> Result<()> {
        let policy = &self.retry_policy;
        if policy.open_hour >= policy.close_hour || policy.close_hour > 24 {
            return Err(anyhow::anyhow!(
                "营业时段配置无效: {}-{}",
                policy.open_hour,
                policy.close_hour
            ));
        }
        if policy.voicemail_min_minutes >= policy.voicemail_max_minutes {
            return Err(anyhow::anyhow!(
                "语音信箱回拨窗口无效: {}-{}",
                policy.voicemail_min_minutes,
                policy.voicemail_max_minutes
            ));
        }
        if self.database.url.is_empty() {
            return Err(anyhow::anyhow!("数据库URL不能为空"));
        }
        Ok(())
    }
}
