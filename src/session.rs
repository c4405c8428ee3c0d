/// 进程级会话
///
/// 启动时构建一次，按引用传给授权、客户端工厂与发送逻辑
use crate::config::{Config, oauth_config::OAuthEndpoints, storage::TokenCache};
use crate::mail::gmail::oauth::HandshakeOptions;

pub struct Session {
    /// 用户配置（只读）
    pub config: Config,

    /// Provider 端点
    pub endpoints: OAuthEndpoints,

    /// Token 缓存
    pub cache: TokenCache,

    /// Gmail API 使用的 HTTP 客户端
    pub http: reqwest::Client,

    /// 授权握手参数（超时、浏览器）
    pub handshake: HandshakeOptions,
}

impl Session {
    pub fn new(
        config: Config,
        endpoints: OAuthEndpoints,
        cache: TokenCache,
        http: reqwest::Client,
    ) -> Self {
        Self {
            config,
            endpoints,
            cache,
            http,
            handshake: HandshakeOptions::default(),
        }
    }

    #[cfg(test)]
    pub fn with_handshake(mut self, handshake: HandshakeOptions) -> Self {
        self.handshake = handshake;
        self
    }
}
