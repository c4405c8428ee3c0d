/// 测试辅助：模拟用户浏览器与测试用 Session
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use url::Url;
use wiremock::MockServer;

use crate::config::{Config, oauth_config::OAuthEndpoints, storage::TokenCache};
use crate::mail::gmail::oauth::HandshakeOptions;
use crate::mail::gmail::types::Credential;
use crate::session::Session;
use crate::utils::browser::BrowserLauncher;

pub fn sample_config() -> Config {
    Config {
        address: "a@example.com".to_string(),
        client_id: "id".to_string(),
        client_secret: "s".to_string(),
    }
}

/// 不走系统代理，直连本地回调服务器与 mock 服务器
pub fn direct_http() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("构建测试 HTTP 客户端失败")
}

pub fn mock_endpoints(server: &MockServer) -> OAuthEndpoints {
    OAuthEndpoints {
        auth_url: format!("{}/auth", server.uri()),
        token_url: format!("{}/token", server.uri()),
        scopes: vec!["https://mail.google.com/".to_string()],
        api_base: server.uri(),
    }
}

pub fn test_session(
    server: &MockServer,
    dir: &TempDir,
    browser: Arc<dyn BrowserLauncher>,
) -> Session {
    Session::new(
        sample_config(),
        mock_endpoints(server),
        TokenCache::new(dir.path().join("cache.json")),
        direct_http(),
    )
    .with_handshake(HandshakeOptions {
        timeout: Duration::from_secs(10),
        launcher: browser,
    })
}

pub fn valid_credential(access: &str) -> Credential {
    Credential::new(
        access.to_string(),
        "cached-refresh".to_string(),
        3600,
        "Bearer".to_string(),
    )
}

pub fn token_json(access: &str, refresh: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": 3600,
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = serde_json::Value::String(refresh.to_string());
    }
    body
}

/// 模拟用户：记录打开的授权 URL，并带着 state 和授权码访问回调地址
pub struct CallbackBrowser {
    code: Option<String>,
    opened: Mutex<Vec<Url>>,
}

impl CallbackBrowser {
    /// 完成授权并回调指定授权码
    pub fn approving(code: &str) -> Arc<Self> {
        Arc::new(Self {
            code: Some(code.to_string()),
            opened: Mutex::new(Vec::new()),
        })
    }

    /// 只记录 URL，不发起回调
    pub fn idle() -> Arc<Self> {
        Arc::new(Self {
            code: None,
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn opened(&self) -> Vec<Url> {
        self.opened.lock().unwrap().clone()
    }
}

impl BrowserLauncher for CallbackBrowser {
    fn open(&self, url: &Url) {
        self.opened.lock().unwrap().push(url.clone());

        let Some(code) = self.code.clone() else {
            return;
        };

        let mut callback = Url::parse(&query_param(url, "redirect_uri").unwrap()).unwrap();
        callback
            .query_pairs_mut()
            .append_pair("state", &query_param(url, "state").unwrap())
            .append_pair("code", &code);

        tokio::spawn(async move {
            let _ = direct_http().get(callback).send().await;
        });
    }
}

pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
