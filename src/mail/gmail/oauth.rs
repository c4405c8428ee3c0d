/// Gmail OAuth2 授权码流程
///
/// 在 127.0.0.1 的临时端口上启动一次性回调服务器，校验 state，
/// 用授权码交换 Token 并写入 Token 缓存
use oauth2::{
    AuthorizationCode, CsrfToken, Scope, basic::BasicClient, reqwest::async_http_client,
};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tiny_http::{Header, Request, Response, Server, StatusCode};
use tokio::sync::oneshot;
use url::Url;

use crate::config::{Config, oauth_config::OAuthEndpoints, storage::TokenCache};
use crate::error::{AppError, Result};
use crate::mail::gmail::token;
use crate::mail::gmail::types::{Credential, mask_secret};
use crate::session::Session;
use crate::utils::browser::{BrowserLauncher, SystemBrowser};

/// OAuth2 回调超时时间（秒）
const CALLBACK_TIMEOUT_SECS: u64 = 300;

/// 回调服务器监听地址，端口由系统分配
const LOOPBACK_ADDR: &str = "127.0.0.1:0";

/// OAuth2 成功页面 HTML
const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>授权成功 - gmail2omnifocus</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Arial, sans-serif;
            text-align: center;
            margin-top: 15vh;
            color: #444;
        }
        h1 { color: #4caf50; }
    </style>
</head>
<body>
    <h1>✓ 授权成功</h1>
    <p>Gmail 账户已授权，可以关闭此页面并返回终端。</p>
</body>
</html>"#;

/// 授权握手状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    ServerListening,
    AwaitingCallback,
    CodeReceived,
    Exchanging,
    Complete,
    Aborted,
}

/// 授权握手参数
#[derive(Clone)]
pub struct HandshakeOptions {
    /// 等待浏览器回调的最长时间
    pub timeout: Duration,

    /// 打开授权页面的方式
    pub launcher: Arc<dyn BrowserLauncher>,
}

impl Default for HandshakeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(CALLBACK_TIMEOUT_SECS),
            launcher: Arc::new(SystemBrowser),
        }
    }
}

/// 执行完整的 Gmail OAuth2 授权
///
/// 1. 启动本地回调服务器
/// 2. 生成授权 URL（含随机 state）
/// 3. 打印 URL 并尝试打开浏览器
/// 4. 等待回调（带超时）
/// 5. 交换 Token
/// 6. 写入 Token 缓存
///
/// # Errors
/// - 无法启动本地服务器
/// - 用户拒绝授权或超时
/// - Token 交换失败（不重试）
/// - 写入缓存失败
pub async fn authorize(session: &Session) -> Result<Credential> {
    let mut pending = start(&session.config, &session.endpoints)?;
    pending.announce(session.handshake.launcher.as_ref());
    pending
        .complete(session.handshake.timeout, &session.cache)
        .await
}

/// 启动回调服务器并生成授权 URL
pub fn start(config: &Config, endpoints: &OAuthEndpoints) -> Result<PendingAuthorization> {
    tracing::info!("🔐 开始 Gmail OAuth2 授权流程");

    let csrf_state = CsrfToken::new_random();
    let (code_tx, code_rx) = oneshot::channel();
    let listener = CallbackListener::bind(csrf_state.secret().clone(), code_tx)?;

    let redirect_uri = format!("http://127.0.0.1:{}", listener.port);
    tracing::info!("✅ 本地回调服务器启动成功: {}", redirect_uri);

    let client = endpoints.oauth_client(config, Some(&redirect_uri))?;
    let (auth_url, _) = client
        .authorize_url(|| csrf_state)
        .add_scopes(endpoints.scopes.iter().map(|s| Scope::new(s.clone())))
        // 要求返回 Refresh Token
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .url();

    let mut pending = PendingAuthorization {
        state: HandshakeState::Idle,
        auth_url,
        redirect_uri,
        client,
        listener: Some(listener),
        code_rx,
    };
    pending.transition(HandshakeState::ServerListening);

    Ok(pending)
}

/// 已启动、等待用户完成授权的握手
pub struct PendingAuthorization {
    state: HandshakeState,
    auth_url: Url,
    redirect_uri: String,
    client: BasicClient,
    listener: Option<CallbackListener>,
    code_rx: oneshot::Receiver<String>,
}

impl PendingAuthorization {
    #[cfg(test)]
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// 用户需要访问的授权 URL
    #[cfg(test)]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// 回调地址（`http://127.0.0.1:<port>`）
    #[cfg(test)]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// 提示用户授权，并尝试打开浏览器
    pub fn announce(&mut self, launcher: &dyn BrowserLauncher) {
        eprintln!("请在浏览器中打开以下链接完成授权:\n{}", self.auth_url);
        launcher.open(&self.auth_url);

        self.transition(HandshakeState::AwaitingCallback);
        tracing::info!("⏳ 等待用户在浏览器中完成授权...");
        tracing::debug!("回调地址: {}", self.redirect_uri);
    }

    /// 等待回调、交换 Token 并写入缓存
    ///
    /// 回调服务器在交换前关闭；任何失败都不会写缓存
    pub async fn complete(mut self, timeout: Duration, cache: &TokenCache) -> Result<Credential> {
        match self.finish(timeout, cache).await {
            Ok(credential) => {
                self.transition(HandshakeState::Complete);
                tracing::info!("🎉 OAuth2 授权流程完成");
                Ok(credential)
            }
            Err(e) => {
                tracing::warn!("⚠️ 授权在 {:?} 阶段中止: {}", self.state, e);
                self.transition(HandshakeState::Aborted);
                Err(e)
            }
        }
    }

    async fn finish(&mut self, timeout: Duration, cache: &TokenCache) -> Result<Credential> {
        let code = self.receive_code(timeout).await?;
        self.transition(HandshakeState::CodeReceived);
        tracing::info!("✅ 收到授权回调");

        self.transition(HandshakeState::Exchanging);
        let credential = exchange_code(&self.client, code).await?;
        tracing::info!("✅ Token 交换成功（过期时间: {}）", credential.expiry);

        cache.store(&credential)?;
        tracing::info!("✅ 凭据已写入缓存: {}", cache.path().display());

        Ok(credential)
    }

    async fn receive_code(&mut self, timeout: Duration) -> Result<String> {
        let received = tokio::time::timeout(timeout, &mut self.code_rx).await;

        // 不论结果如何，先关闭回调服务器（join 工作线程，不占用异步执行器）
        if let Some(listener) = self.listener.take() {
            tokio::task::spawn_blocking(move || drop(listener))
                .await
                .map_err(|e| AppError::CallbackServer(format!("关闭回调服务器失败: {}", e)))?;
        }

        match received {
            Err(_) => Err(AppError::AuthTimeout(timeout.as_secs())),
            Ok(Err(_)) => Err(AppError::CallbackServer(
                "回调服务器意外退出".to_string(),
            )),
            Ok(Ok(code)) => Ok(code),
        }
    }

    fn transition(&mut self, next: HandshakeState) {
        tracing::debug!("握手状态: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// 交换授权码为 Token
async fn exchange_code(client: &BasicClient, code: String) -> Result<Credential> {
    tracing::debug!("开始交换 Token，code: {}", mask_secret(&code));

    let response = client
        .exchange_code(AuthorizationCode::new(code))
        .request_async(async_http_client)
        .await
        .map_err(|e| {
            tracing::error!("Token 交换详细错误: {:?}", e);
            AppError::AuthExchange(token::describe_token_error(&e))
        })?;

    token::credential_from_response(&response)
}

/// 本地回调服务器
///
/// 在独立线程中处理请求；drop 时解除阻塞并等待线程退出，监听端口随之释放
struct CallbackListener {
    server: Arc<Server>,
    worker: Option<JoinHandle<()>>,
    port: u16,
}

impl CallbackListener {
    fn bind(expected_state: String, code_tx: oneshot::Sender<String>) -> Result<Self> {
        let server = Server::http(LOOPBACK_ADDR)
            .map_err(|e| AppError::CallbackServer(format!("无法启动本地服务器: {}", e)))?;

        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| AppError::CallbackServer("无法获取监听端口".to_string()))?;

        let server = Arc::new(server);
        let worker_server = Arc::clone(&server);
        let worker = std::thread::Builder::new()
            .name("oauth-callback".to_string())
            .spawn(move || serve_callbacks(worker_server, expected_state, code_tx))
            .map_err(|e| AppError::CallbackServer(format!("无法启动回调线程: {}", e)))?;

        tracing::debug!("本地服务器监听: 127.0.0.1:{}", port);

        Ok(Self {
            server,
            worker: Some(worker),
            port,
        })
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("回调服务器线程 panic");
            }
        }
        tracing::debug!("本地回调服务器已关闭: 127.0.0.1:{}", self.port);
    }
}

/// 单个回调请求的处理结果
#[derive(Debug, PartialEq, Eq)]
enum CallbackOutcome {
    /// 浏览器的 favicon 探测
    Favicon,
    /// state 缺失或不匹配
    StateMismatch,
    /// 路径不对、缺少 code 或 Provider 返回 error
    Invalid(String),
    /// 收到授权码
    Code(String),
}

fn classify_callback(raw_url: &str, expected_state: &str) -> CallbackOutcome {
    let Ok(url) = Url::parse("http://127.0.0.1").and_then(|base| base.join(raw_url)) else {
        return CallbackOutcome::Invalid("无法解析请求 URL".to_string());
    };

    if url.path() == "/favicon.ico" {
        return CallbackOutcome::Favicon;
    }

    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };

    if param("state").as_deref() != Some(expected_state) {
        return CallbackOutcome::StateMismatch;
    }
    if url.path() != "/" {
        return CallbackOutcome::Invalid("未知路径".to_string());
    }

    match (param("code"), param("error")) {
        (Some(code), _) if !code.is_empty() => CallbackOutcome::Code(code),
        (_, Some(error)) => CallbackOutcome::Invalid(format!("Provider 返回错误 {}", error)),
        _ => CallbackOutcome::Invalid("回调缺少 code 参数".to_string()),
    }
}

/// 处理回调请求，直到收到授权码或被 unblock
fn serve_callbacks(
    server: Arc<Server>,
    expected_state: String,
    code_tx: oneshot::Sender<String>,
) {
    for request in server.incoming_requests() {
        let path = request.url().split('?').next().unwrap_or_default().to_string();
        tracing::debug!("收到请求: {} {}", request.method(), path);

        match classify_callback(request.url(), &expected_state) {
            CallbackOutcome::Favicon => respond_empty(request, 404),
            CallbackOutcome::StateMismatch => {
                tracing::warn!("⚠️ {}，已拒绝请求: {}", AppError::AuthStateMismatch, path);
                respond_empty(request, 500);
            }
            CallbackOutcome::Invalid(reason) => {
                tracing::warn!("⚠️ 无效回调（{}）: {}", reason, path);
                respond_empty(request, 500);
            }
            CallbackOutcome::Code(code) => {
                tracing::debug!("Code: {}", mask_secret(&code));
                respond_html(request, SUCCESS_HTML);
                // 等待方已超时返回时接收端已关闭，忽略发送失败
                let _ = code_tx.send(code);
                break;
            }
        }
    }

    tracing::debug!("回调服务器线程退出");
}

fn respond_empty(request: Request, status: u16) {
    if let Err(e) = request.respond(Response::empty(StatusCode(status))) {
        tracing::debug!("回复请求失败: {}", e);
    }
}

fn respond_html(request: Request, html: &str) {
    let mut response = Response::from_string(html);
    if let Ok(header) = Header::from_bytes(b"Content-Type", b"text/html; charset=utf-8") {
        response.add_header(header);
    }
    if let Err(e) = request.respond(response) {
        tracing::debug!("回复请求失败: {}", e);
    }
}
