// ==========================================
// 出货扫描会话引擎 - 应用层
// ==========================================
// 职责: 组件装配
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
