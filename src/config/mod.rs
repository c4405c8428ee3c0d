/// 配置模块
///
/// 启动时加载一次、进程内只读的配置：收件地址与 OAuth2 客户端凭据
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

pub mod oauth_config;
pub mod storage;

/// 覆盖用户目录的环境变量（同时影响 config.json 与 cache.json 的位置）
const APP_DIR_ENV: &str = "GMAIL2OMNIFOCUS_DIR";

const CONFIG_FILE: &str = "config.json";
const CACHE_FILE: &str = "cache.json";

/// 用户配置
///
/// 文件格式：`{ "address": "...", "clientId": "...", "secret": "..." }`
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// 收件地址（OmniFocus Mail Drop 地址）
    pub address: String,

    /// Google OAuth2 客户端 ID
    #[serde(rename = "clientId")]
    pub client_id: String,

    /// Google OAuth2 客户端密钥
    #[serde(rename = "secret")]
    pub client_secret: String,
}

impl Config {
    /// 加载配置
    ///
    /// 优先级（从高到低）：
    /// 1. 环境变量：`GMAIL_CLIENT_ID` + `GMAIL_CLIENT_SECRET`（仅覆盖客户端凭据）
    /// 2. 配置文件：`~/.config/gmail2omnifocus/config.json`
    ///
    /// 收件地址只来自配置文件。
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        let config = Self::load_from(&path)?.with_env_overrides(
            std::env::var("GMAIL_CLIENT_ID").ok(),
            std::env::var("GMAIL_CLIENT_SECRET").ok(),
        );
        config.validate()?;

        tracing::info!("✅ 配置加载成功: {}", path.display());
        Ok(config)
    }

    /// 从指定文件读取配置（不做环境变量覆盖）
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("读取配置文件失败 {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            AppError::Config(format!("解析配置文件失败 {}: {}", path.display(), e))
        })
    }

    /// 用环境变量覆盖客户端凭据
    ///
    /// 两个值必须同时存在才生效，避免 ID 与密钥来自不同客户端
    pub fn with_env_overrides(
        mut self,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Self {
        if let (Some(client_id), Some(client_secret)) = (client_id, client_secret) {
            tracing::info!("使用环境变量中的 OAuth2 客户端凭据");
            self.client_id = client_id;
            self.client_secret = client_secret;
        }
        self
    }

    /// 校验必填字段
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(AppError::Config("clientId 不能为空".to_string()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(AppError::Config("secret 不能为空".to_string()));
        }

        let address = self.address.trim();
        if address.is_empty() {
            return Err(AppError::Config("address 不能为空".to_string()));
        }
        // 地址会原样写入 To: 头，不允许空白和控制字符
        if !address.contains('@')
            || address
                .chars()
                .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(AppError::Config(format!("address 格式无效: {:?}", address)));
        }

        Ok(())
    }
}

/// 获取用户目录
///
/// 返回：`$GMAIL2OMNIFOCUS_DIR` 或 `~/.config/gmail2omnifocus`
pub fn app_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(APP_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    let home =
        dirs::home_dir().ok_or_else(|| AppError::Config("无法获取用户主目录".to_string()))?;
    Ok(home.join(".config").join("gmail2omnifocus"))
}

/// 获取配置文件路径
pub fn config_path() -> Result<PathBuf> {
    Ok(app_dir()?.join(CONFIG_FILE))
}

/// 获取 Token 缓存文件路径
pub fn cache_path() -> Result<PathBuf> {
    Ok(app_dir()?.join(CACHE_FILE))
}
