// ==========================================
// 出货扫描会话引擎 - 承运商提交客户端
// ==========================================
// 职责: 访问令牌获取与缓存、发运数据提交、响应映射
// ==========================================

pub mod client;
pub mod error;
pub mod token;

pub use client::{
    create_http_client, interpret_response, CarrierConfirmation, CarrierGateway,
    HttpCarrierClient,
};
pub use error::{CarrierError, CarrierResult};
pub use token::{AccessToken, ClientCredentialsTokenSource, TokenCache, TokenSource};
