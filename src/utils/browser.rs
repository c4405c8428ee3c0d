/// 浏览器启动
///
/// 打开授权页面是尽力而为的操作：失败只记录 debug 日志，不影响授权握手
use url::Url;

/// 打开授权 URL 的方式
///
/// 默认实现调用系统浏览器；测试中替换为模拟用户操作的实现
pub trait BrowserLauncher: Send + Sync {
    /// 打开 URL，不得阻塞调用方
    fn open(&self, url: &Url);
}

/// 系统默认浏览器
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &Url) {
        let url = url.to_string();
        let spawned = std::thread::Builder::new()
            .name("open-browser".to_string())
            .spawn(move || {
                if let Err(e) = webbrowser::open(&url) {
                    tracing::debug!("无法打开浏览器（请手动复制 URL）: {}", e);
                }
            });

        if let Err(e) = spawned {
            tracing::debug!("无法启动浏览器线程: {}", e);
        }
    }
}
