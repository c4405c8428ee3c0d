/// Token 自动刷新与带授权的 HTTP 客户端
use oauth2::{
    RefreshToken, RequestTokenError, TokenResponse,
    basic::{
        BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicTokenResponse,
        BasicTokenType,
    },
    reqwest::async_http_client,
};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;

use crate::config::storage::TokenCache;
use crate::error::{AppError, Result};
use crate::mail::gmail::oauth;
use crate::mail::gmail::types::{Credential, mask_secret};
use crate::session::Session;

/// Token 刷新阈值（提前多少分钟刷新）
const REFRESH_THRESHOLD_MINUTES: i64 = 5;

/// Provider 未返回 expires_in 时的默认有效期
const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(3600);

/// 可接受的最长有效期，超过时按默认值处理
const MAX_EXPIRES_IN: Duration = Duration::from_secs(366 * 24 * 3600);

/// Token 管理器
///
/// 负责在 Access Token 过期前刷新，并把刷新结果写回缓存
pub struct TokenManager {
    credential: Credential,
    client: BasicClient,
    cache: TokenCache,
}

impl TokenManager {
    pub fn new(credential: Credential, session: &Session) -> Result<Self> {
        let client = session.endpoints.oauth_client(&session.config, None)?;

        Ok(Self {
            credential,
            client,
            cache: session.cache.clone(),
        })
    }

    #[cfg(test)]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// 获取有效的 Access Token
    ///
    /// 如果 Token 即将过期（默认提前 5 分钟），则自动刷新
    pub async fn get_valid_token(&mut self) -> Result<String> {
        if self.credential.is_token_expiring(REFRESH_THRESHOLD_MINUTES) {
            tracing::info!(
                "Access Token 即将过期（{}），自动刷新",
                self.credential.expiry
            );
            self.refresh_access_token().await?;
        }

        Ok(self.credential.access_token.clone())
    }

    /// 强制刷新 Access Token
    ///
    /// 用于 API 返回 401 的情况
    pub async fn force_refresh(&mut self) -> Result<()> {
        self.refresh_access_token().await
    }

    /// 使用 Refresh Token 获取新的 Access Token 并写回缓存
    ///
    /// # Errors
    /// - `AuthExpired`：Refresh Token 已过期或被撤销
    /// - `AuthExchange`：其他 Token 端点错误
    /// - `Cache`：写回缓存失败
    async fn refresh_access_token(&mut self) -> Result<()> {
        tracing::debug!("开始刷新 Access Token");

        let refresh_token = RefreshToken::new(self.credential.refresh_token.clone());
        let response = self
            .client
            .exchange_refresh_token(&refresh_token)
            .request_async(async_http_client)
            .await
            .map_err(|e| match &e {
                RequestTokenError::ServerResponse(resp)
                    if matches!(
                        resp.error(),
                        BasicErrorResponseType::InvalidGrant
                            | BasicErrorResponseType::UnauthorizedClient
                    ) =>
                {
                    tracing::error!("❌ Token 刷新失败 [授权被拒绝/已过期]: {}", resp);
                    AppError::AuthExpired(resp.to_string())
                }
                _ => {
                    tracing::error!("❌ Token 刷新失败: {:?}", e);
                    AppError::AuthExchange(describe_token_error(&e))
                }
            })?;

        let access_token = response.access_token().secret().to_string();
        if access_token.is_empty() {
            return Err(AppError::AuthExchange(
                "刷新响应中 access_token 为空".to_string(),
            ));
        }

        self.credential.update_access_token(
            access_token,
            expires_in_seconds(&response),
            response.refresh_token().map(|t| t.secret().to_string()),
        );
        self.cache.store(&self.credential)?;

        tracing::info!(
            "✅ Access Token 刷新成功（新的过期时间: {}）",
            self.credential.expiry
        );
        tracing::debug!("新 Token: {}", mask_secret(&self.credential.access_token));

        Ok(())
    }
}

/// 带授权的 HTTP 客户端
///
/// 每个请求自动附加 `Authorization: Bearer <access_token>`
pub struct AuthorizedClient {
    http: reqwest::Client,
    tokens: TokenManager,
}

impl AuthorizedClient {
    /// 构建带授权的客户端
    ///
    /// 有可用的缓存凭据时直接使用，不发起任何授权请求；
    /// 否则先完成 OAuth2 授权握手。
    ///
    /// # Errors
    /// - 授权握手失败
    /// - `AuthExpired`：缓存的 Refresh Token 已失效
    pub async fn build(session: &Session) -> Result<Self> {
        let credential = match session.cache.load() {
            Some(credential) => {
                tracing::info!("✅ 使用缓存的凭据: {}", session.cache.path().display());
                credential
            }
            None => {
                tracing::info!("📭 没有可用的缓存凭据，需要授权");
                oauth::authorize(session).await?
            }
        };

        let mut tokens = TokenManager::new(credential, session)?;
        tokens.get_valid_token().await?;

        Ok(Self {
            http: session.http.clone(),
            tokens,
        })
    }

    #[cfg(test)]
    pub fn credential(&self) -> &Credential {
        self.tokens.credential()
    }

    /// 发送带授权的请求
    ///
    /// 收到 401 时强制刷新 Token 并重试一次
    pub async fn execute<F>(&mut self, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let token = self.tokens.get_valid_token().await?;
        let response = build(&self.http).bearer_auth(&token).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::warn!("⚠️ 请求返回 401，刷新 Access Token 后重试");
        self.tokens.force_refresh().await?;
        let token = self.tokens.get_valid_token().await?;

        Ok(build(&self.http).bearer_auth(&token).send().await?)
    }
}

/// 把授权码交换响应转换为凭据
///
/// 授权码交换必须返回 Refresh Token，否则下次运行无法刷新
pub(crate) fn credential_from_response(response: &BasicTokenResponse) -> Result<Credential> {
    let access_token = response.access_token().secret().to_string();
    if access_token.is_empty() {
        return Err(AppError::AuthExchange("响应中 access_token 为空".to_string()));
    }

    let refresh_token = response
        .refresh_token()
        .map(|token| token.secret().to_string())
        .ok_or_else(|| AppError::AuthExchange("未收到 refresh_token".to_string()))?;

    Ok(Credential::new(
        access_token,
        refresh_token,
        expires_in_seconds(response),
        token_type_name(response.token_type()),
    ))
}

/// 提取 Token 端点错误的可读描述
pub(crate) fn describe_token_error<RE>(err: &RequestTokenError<RE, BasicErrorResponse>) -> String
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(resp) => resp.to_string(),
        RequestTokenError::Request(e) => format!("请求失败: {}", e),
        RequestTokenError::Parse(e, _) => format!("响应解析失败: {}", e),
        RequestTokenError::Other(msg) => msg.clone(),
    }
}

fn expires_in_seconds(response: &BasicTokenResponse) -> i64 {
    let lifetime = match response.expires_in() {
        Some(lifetime) if lifetime <= MAX_EXPIRES_IN => lifetime,
        Some(lifetime) => {
            tracing::warn!(
                "⚠️ expires_in 超出范围（{} 秒），按 {} 秒处理",
                lifetime.as_secs(),
                DEFAULT_EXPIRES_IN.as_secs()
            );
            DEFAULT_EXPIRES_IN
        }
        None => DEFAULT_EXPIRES_IN,
    };

    i64::try_from(lifetime.as_secs()).unwrap_or(0)
}

fn token_type_name(token_type: &BasicTokenType) -> String {
    match token_type {
        BasicTokenType::Bearer => "Bearer".to_string(),
        BasicTokenType::Mac => "MAC".to_string(),
        BasicTokenType::Extension(name) => name.clone(),
    }
}
