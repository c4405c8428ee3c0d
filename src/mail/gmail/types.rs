/// Gmail 凭据数据结构
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 缓存的 OAuth2 凭据
///
/// Token 缓存文件中唯一的一条记录。要么完整存在，要么不存在。
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// 访问令牌
    pub access_token: String,

    /// 刷新令牌
    pub refresh_token: String,

    /// Access Token 过期时间（UTC）
    pub expiry: DateTime<Utc>,

    /// Token 类型（通常为 `Bearer`）
    pub token_type: String,
}

impl Credential {
    /// 创建新凭据，过期时间从当前时刻起算
    pub fn new(
        access_token: String,
        refresh_token: String,
        expires_in_seconds: i64,
        token_type: String,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expiry: expiry_after(expires_in_seconds),
            token_type,
        }
    }

    /// 所有字段是否都已填充
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty()
            && !self.refresh_token.is_empty()
            && !self.token_type.is_empty()
    }

    /// Access Token 是否将在指定分钟内过期
    pub fn is_token_expiring(&self, threshold_minutes: i64) -> bool {
        Utc::now() + chrono::Duration::minutes(threshold_minutes) >= self.expiry
    }

    /// 用刷新结果更新 Access Token
    ///
    /// Provider 未返回新的 Refresh Token 时保留旧值
    pub fn update_access_token(
        &mut self,
        access_token: String,
        expires_in_seconds: i64,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token;
        self.expiry = expiry_after(expires_in_seconds);
        if let Some(refresh_token) = refresh_token {
            self.refresh_token = refresh_token;
        }
    }
}

/// 从当前时刻起算的过期时间
///
/// 超出时间范围的有效期按已过期处理，下次使用前会刷新
fn expiry_after(seconds: i64) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::try_seconds(seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(now)
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &mask_secret(&self.access_token))
            .field("refresh_token", &mask_secret(&self.refresh_token))
            .field("expiry", &self.expiry)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// 日志脱敏：只保留首尾各 5 个字符
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }

    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 5..].iter().collect();
    format!("{}...{}", head, tail)
}
