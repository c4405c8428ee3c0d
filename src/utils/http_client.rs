/// HTTP 客户端构建
///
/// 启动时构建一次，由 `Session` 持有并在 Gmail API 调用间复用连接池
use reqwest::Client;
use std::time::Duration;

/// 构建 Gmail API 使用的 HTTP 客户端
pub fn build_client() -> reqwest::Result<Client> {
    Client::builder()
        // 连接池配置
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(Duration::from_secs(90))
        // 超时配置
        .timeout(Duration::from_secs(30)) // 整体请求超时 30 秒
        .connect_timeout(Duration::from_secs(10)) // 连接建立超时 10 秒
        // 重定向配置
        .redirect(reqwest::redirect::Policy::limited(5))
        .user_agent(concat!("gmail2omnifocus/", env!("CARGO_PKG_VERSION")))
        .build()
}
