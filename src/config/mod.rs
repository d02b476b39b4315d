// ==========================================
// 出货扫描会话引擎 - 配置层
// ==========================================
// 职责: 配置快照（引擎/承运商）与 config_kv 加载
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod settings;

pub use config_manager::{config_keys, ConfigManager, ConfigResult, CLIENT_SECRET_ENV};
pub use settings::{CarrierSettings, DuplicateWindow, EngineSettings};
