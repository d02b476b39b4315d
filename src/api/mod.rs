// ==========================================
// 出货扫描会话引擎 - API 层
// ==========================================
// 职责: 面向调用方的接口; 每次调用刷新配置快照, 错误转换为操作员提示
// ==========================================

pub mod dock_status_api;
pub mod error;
pub mod session_api;

// 重导出核心类型
pub use dock_status_api::{DockBoard, DockStatusApi};
pub use error::{ApiError, ApiResult};
pub use session_api::SessionApi;
