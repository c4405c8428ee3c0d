/// Token 缓存文件存储模块
///
/// 负责将唯一一条 OAuth2 凭据持久化到 JSON 文件。
/// 假设同一时间只有一个进程实例在运行，不做并发写保护。
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::mail::gmail::types::Credential;

/// Token 缓存
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 缓存文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取缓存的凭据
    ///
    /// 文件不存在、无法读取、格式错误或记录不完整时都返回 `None`，
    /// 调用方据此重新授权，而不是终止进程。
    pub fn load(&self) -> Option<Credential> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Token 缓存文件不存在: {}", self.path.display());
                return None;
            }
            Err(e) => {
                tracing::warn!("⚠️ 读取 Token 缓存失败，视为未缓存: {}: {}", self.path.display(), e);
                return None;
            }
        };

        let credential: Credential = match serde_json::from_str(&content) {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!("⚠️ Token 缓存已损坏，视为未缓存: {}", e);
                return None;
            }
        };

        if !credential.is_complete() {
            tracing::warn!("⚠️ Token 缓存记录不完整，视为未缓存");
            return None;
        }

        tracing::debug!("成功加载缓存凭据（过期时间: {}）", credential.expiry);
        Some(credential)
    }

    /// 保存凭据，整体替换旧内容
    ///
    /// 先写入同目录下的临时文件再重命名，中断时旧记录保持完好
    pub fn store(&self, credential: &Credential) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        std::fs::create_dir_all(dir).map_err(|e| {
            AppError::Cache(format!("创建缓存目录失败 {}: {}", dir.display(), e))
        })?;

        let content = serde_json::to_string_pretty(credential)
            .map_err(|e| AppError::Cache(format!("序列化凭据失败: {}", e)))?;

        // NamedTempFile 在 Unix 上以 0600 权限创建
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| AppError::Cache(format!("创建临时文件失败: {}", e)))?;
        tmp.write_all(content.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| AppError::Cache(format!("写入临时文件失败: {}", e)))?;

        tmp.persist(&self.path).map_err(|e| {
            AppError::Cache(format!("替换缓存文件失败 {}: {}", self.path.display(), e.error))
        })?;

        tracing::debug!("凭据已保存到: {}", self.path.display());
        Ok(())
    }

    /// 删除缓存文件（不存在时视为成功）
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("已清除 Token 缓存: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Cache(format!(
                "删除缓存文件失败 {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}
