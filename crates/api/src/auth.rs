use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// webhook 签名所在的请求头
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// webhook 验签错误
///
/// 具体原因只进日志，对外统一回泛化的401，不泄露是签名还是载荷的问题。
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("缺少签名头")]
    MissingSignature,

    #[error("签名格式无效")]
    MalformedSignature,

    #[error("签名校验失败")]
    InvalidSignature,

    #[error("未配置webhook密钥")]
    SecretNotConfigured,
}

/// webhook 共享密钥，对原始请求体做 HMAC-SHA256 验签
pub struct WebhookSecret {
    secret: Vec<u8>,
}

impl WebhookSecret {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    /// 验签：hex解码后常数时间比较
    pub fn verify(&self, signature: Option<&str>, body: &[u8]) -> Result<(), AuthError> {
        if self.secret.is_empty() {
            return Err(AuthError::SecretNotConfigured);
        }
        let signature = signature.ok_or(AuthError::MissingSignature)?;
        let provided =
            hex::decode(signature.trim()).map_err(|_| AuthError::MalformedSignature)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AuthError::SecretNotConfigured)?;
        mac.update(body);
        mac.verify_slice(&provided)
            .map_err(|_| AuthError::InvalidSignature)
    }

    /// 计算请求体的hex签名
    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC密钥长度不受限");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }
}
