// ==========================================
// 出货扫描会话引擎 - 核心库
// ==========================================
// 业务: 组托 / 装车 / 出货前核对 三类扫描会话, 承运商回传, 月台状态看板
// 技术栈: Rust + SQLite + reqwest
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 条码解码层 - 纯函数
pub mod barcode;

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 承运商接口
pub mod carrier;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组件装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

pub use barcode::{decode_kanban, decode_manifest, DecodeError, KanbanFields, ManifestFields, SkidId};

pub use domain::{
    DockStatus, ExceptionCode, ExceptionRecord, NewException, ScanInput, ScanRecord, ScanSession,
    SessionAnchor, SessionStatus, TrailerInfo, WorkflowKind,
};

pub use engine::{DockStatusProjector, EngineError, SessionOrchestrator};

pub use api::{ApiError, DockStatusApi, SessionApi};

pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "出货扫描会话引擎";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
