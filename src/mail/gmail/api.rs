/// Gmail API 调用模块
///
/// 通过 `users.messages.send` 发送邮件，失败时原样返回 Provider 的错误，不重试
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::mail::gmail::token::AuthorizedClient;
use crate::mail::message::OutboundMessage;

/// Gmail 发送响应
#[derive(Debug, Deserialize)]
struct SendResponse {
    /// 新邮件 ID
    id: String,

    #[serde(rename = "threadId", default)]
    thread_id: Option<String>,
}

/// 发送邮件
///
/// # Returns
/// 返回 Gmail 分配的邮件 ID
///
/// # Errors
/// - `Send`：网络错误、非 2xx 响应（携带状态码与响应体）或响应无法解析
/// - `AuthExpired`：401 后刷新 Token 失败
pub async fn send_message(
    client: &mut AuthorizedClient,
    api_base: &str,
    message: &OutboundMessage,
) -> Result<String> {
    let url = format!(
        "{}/gmail/v1/users/me/messages/send",
        api_base.trim_end_matches('/')
    );
    let payload = serde_json::json!({ "raw": message.to_raw() });

    tracing::debug!("发送邮件到 {}（主题 {} 字符）", message.to, message.subject.chars().count());

    let response = client
        .execute(|http| http.post(&url).json(&payload))
        .await
        .map_err(|e| match e {
            AppError::Http(msg) => AppError::Send(msg),
            other => other,
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(AppError::Send(format!("Gmail API 返回错误 {}: {}", status, error_text)));
    }

    let sent: SendResponse = response
        .json()
        .await
        .map_err(|e| AppError::Send(format!("解析发送响应失败: {}", e)))?;

    tracing::info!(
        "✅ 邮件已发送: id={} thread={}",
        sent.id,
        sent.thread_id.as_deref().unwrap_or("-")
    );

    Ok(sent.id)
}
