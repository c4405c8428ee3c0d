/// Gmail 模块 - OAuth2 授权、Token 管理与 API 调用
pub mod api;
pub mod oauth;
pub mod token;
pub mod types;

// 重新导出常用类型和函数
pub use api::send_message;
pub use token::AuthorizedClient;
