/// 邮件模块 - 邮件组装与 Gmail 发送
pub mod gmail;
pub mod message;

pub use message::OutboundMessage;
