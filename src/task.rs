/// 发送任务
///
/// 一次调用 = 一次（可能的）授权 + 一次发送，全部成功或整体失败
use crate::error::{AppError, Result};
use crate::mail::OutboundMessage;
use crate::mail::gmail::{AuthorizedClient, send_message};
use crate::session::Session;

/// 把任务作为邮件发送到配置的地址
///
/// 缓存的授权失效（`AuthExpired`）时清除缓存，重新授权后再试一次
///
/// # Returns
/// 返回 Gmail 邮件 ID
pub async fn send_task(session: &Session, subject: &str, body: &str) -> Result<String> {
    let message = OutboundMessage::new(&session.config.address, subject, body);

    match deliver(session, &message).await {
        Err(AppError::AuthExpired(reason)) => {
            tracing::warn!("⚠️ 缓存的授权已失效（{}），重新授权", reason);
            session.cache.clear()?;
            deliver(session, &message).await
        }
        other => other,
    }
}

async fn deliver(session: &Session, message: &OutboundMessage) -> Result<String> {
    let mut client = AuthorizedClient::build(session).await?;
    send_message(&mut client, &session.endpoints.api_base, message).await
}
