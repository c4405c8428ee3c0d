/// OAuth2 端点配置
///
/// 默认指向 Google；测试时替换为本地 mock 服务器地址
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, RedirectUrl, TokenUrl, basic::BasicClient,
};

use crate::config::Config;
use crate::error::{AppError, Result};

/// Google 授权端点（浏览器访问）
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google Token 端点（授权码交换与刷新）
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Gmail 完整权限（发送邮件所需）
pub const GMAIL_SCOPE: &str = "https://mail.google.com/";

/// Gmail REST API 根地址
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com";

/// Provider 端点集合
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    /// 授权 URL
    pub auth_url: String,

    /// Token URL
    pub token_url: String,

    /// 请求的 API 权限范围
    pub scopes: Vec<String>,

    /// Gmail API 根地址
    pub api_base: String,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            scopes: vec![GMAIL_SCOPE.to_string()],
            api_base: GMAIL_API_BASE.to_string(),
        }
    }
}

impl OAuthEndpoints {
    /// 构建 OAuth2 客户端
    ///
    /// 客户端凭据放在请求体中发送（`client_id` / `client_secret` 表单字段）。
    /// `redirect_uri` 只有授权码流程需要，刷新 Token 时传 `None`。
    pub fn oauth_client(&self, config: &Config, redirect_uri: Option<&str>) -> Result<BasicClient> {
        let auth_url = AuthUrl::new(self.auth_url.clone())
            .map_err(|e| AppError::Config(format!("授权 URL 无效 {}: {}", self.auth_url, e)))?;
        let token_url = TokenUrl::new(self.token_url.clone())
            .map_err(|e| AppError::Config(format!("Token URL 无效 {}: {}", self.token_url, e)))?;

        let mut client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody);

        if let Some(uri) = redirect_uri {
            let redirect = RedirectUrl::new(uri.to_string())
                .map_err(|e| AppError::Config(format!("回调 URL 无效 {}: {}", uri, e)))?;
            client = client.set_redirect_uri(redirect);
        }

        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config {
            address: "a@example.com".to_string(),
            client_id: "id".to_string(),
            client_secret: "s".to_string(),
        }
    }

    #[test]
    fn test_default_endpoints() {
        let endpoints = OAuthEndpoints::default();
        assert_eq!(endpoints.token_url, GOOGLE_TOKEN_URL);
        assert_eq!(endpoints.scopes, vec![GMAIL_SCOPE.to_string()]);
        assert!(endpoints.api_base.starts_with("https://"));
    }

    #[test]
    fn test_invalid_token_url_is_config_error() {
        let endpoints = OAuthEndpoints {
            token_url: "not a url".to_string(),
            ..OAuthEndpoints::default()
        };
        let result = endpoints.oauth_client(&sample_config(), None);
        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("Token URL")));
    }

    #[test]
    fn test_client_with_redirect_uri() {
        let endpoints = OAuthEndpoints::default();
        let client = endpoints
            .oauth_client(&sample_config(), Some("http://127.0.0.1:51234"))
            .unwrap();
        let (url, _) = client
            .authorize_url(oauth2::CsrfToken::new_random)
            .url();
        let redirect = url
            .query_pairs()
            .find(|(k, _)| k == "redirect_uri")
            .map(|(_, v)| v.into_owned());
        assert_eq!(redirect.as_deref(), Some("http://127.0.0.1:51234"));
        assert!(url.as_str().starts_with(GOOGLE_AUTH_URL));
    }
}
