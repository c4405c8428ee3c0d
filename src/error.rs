/// 错误类型定义
///
/// 致命错误（配置、Token 交换、发送）一路冒泡到 `main`；
/// 缓存读取失败只当作缓存未命中，state 不匹配只拒绝当前回调请求。
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// 配置文件缺失或格式错误
    #[error("配置错误: {0}")]
    Config(String),

    /// Token 缓存写入失败（读取失败不会产生此错误）
    #[error("Token 缓存错误: {0}")]
    Cache(String),

    /// 回调请求的 state 与本次握手生成的不一致
    #[error("回调 state 不匹配（可能是伪造或过期的重定向）")]
    AuthStateMismatch,

    /// 在规定时间内未收到授权回调
    #[error("授权超时：{0} 秒内未收到回调")]
    AuthTimeout(u64),

    /// 本地回调服务器无法启动或意外退出
    #[error("本地回调服务器错误: {0}")]
    CallbackServer(String),

    /// 授权码交换 Token 失败
    #[error("Token 交换失败: {0}")]
    AuthExchange(String),

    /// Refresh Token 已过期或被撤销，需要重新授权
    #[error("授权已失效: {0}")]
    AuthExpired(String),

    /// 带授权的 HTTP 请求失败（网络层）
    #[error("HTTP 请求失败: {0}")]
    Http(String),

    /// Gmail 发送接口返回错误
    #[error("邮件发送失败: {0}")]
    Send(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http(error.to_string())
    }
}
