use anyhow::{Context, Result};
use clap::Parser;

mod config;
mod error;
mod mail;
mod session;
mod task;
mod utils;

#[cfg(test)]
mod test_support;

use config::{Config, oauth_config::OAuthEndpoints, storage::TokenCache};
use session::Session;

/// 把一条任务作为邮件发送到 OmniFocus 收件地址
#[derive(Debug, Parser)]
#[command(name = "gmail2omnifocus", version, about)]
struct Cli {
    /// 任务内容（作为邮件主题）
    #[arg(value_parser = clap::builder::NonEmptyStringValueParser::new())]
    task: String,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logger() {
        eprintln!("初始化日志失败: {:#}", e);
    }

    if let Err(e) = run(cli) {
        tracing::error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // 1. 加载配置（缺失或格式错误直接退出）
    let config = Config::load()?;
    tracing::debug!("发送到 {}", config.address);

    // 2. Token 缓存与 HTTP 客户端
    let cache = TokenCache::new(config::cache_path()?);
    let http = utils::http_client::build_client().context("构建 HTTP 客户端失败")?;
    let session = Session::new(config, OAuthEndpoints::default(), cache, http);

    // 3. 创建 Tokio 运行时（授权回调与发送都是 async）
    let rt = tokio::runtime::Runtime::new().context("创建 Tokio 运行时失败")?;
    let id = rt.block_on(task::send_task(&session, &cli.task, ""))?;

    tracing::info!("✅ 任务已发送: {}", id);
    Ok(())
}

/// 初始化日志系统（输出到 stderr）
fn init_logger() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gmail2omnifocus=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_takes_one_task() {
        let cli = Cli::try_parse_from(["gmail2omnifocus", "buy milk"]).unwrap();
        assert_eq!(cli.task, "buy milk");
    }

    #[test]
    fn test_cli_rejects_missing_or_empty_task() {
        assert!(Cli::try_parse_from(["gmail2omnifocus"]).is_err());
        assert!(Cli::try_parse_from(["gmail2omnifocus", ""]).is_err());
        assert!(Cli::try_parse_from(["gmail2omnifocus", "a", "b"]).is_err());
    }
}
