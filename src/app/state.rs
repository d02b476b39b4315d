// ==========================================
// 出货扫描会话引擎 - 应用状态
// ==========================================
// 职责: 由数据库路径装配仓储、承运商客户端与 API 实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{DockStatusApi, SessionApi};
use crate::carrier::{CarrierGateway, HttpCarrierClient};
use crate::config::ConfigManager;
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::engine::{ExceptionLedger, SessionOrchestrator, SessionRepositories};
use crate::repository::{PlanReader, PlanRepository};

/// 应用状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 扫描会话API
    pub session_api: Arc<SessionApi>,

    /// 月台看板API
    pub dock_status_api: Arc<DockStatusApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 计划写入（上游导入/测试数据使用）
    pub plan_repo: Arc<PlanRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// 承运商配置完整时创建 HTTP 客户端, 否则装车/出货前会话无法完成。
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::build(db_path, None)
    }

    /// 指定承运商网关创建（替换 HTTP 客户端）
    pub fn with_gateway(db_path: String, gateway: Arc<dyn CarrierGateway>) -> Result<Self, String> {
        Self::build(db_path, Some(gateway))
    }

    fn build(db_path: String, gateway: Option<Arc<dyn CarrierGateway>>) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("无法初始化数据库结构: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // Repository层
        // ==========================================
        let plan_repo = Arc::new(PlanRepository::new(conn.clone()));
        let repos = SessionRepositories::from_connection(conn.clone());
        let exception_repo = repos.exception_repo.clone();

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 承运商客户端
        // ==========================================
        let carrier = match gateway {
            Some(g) => Some(g),
            None => {
                let settings = config_manager
                    .load_carrier_settings()
                    .map_err(|e| format!("无法读取承运商配置: {}", e))?;
                if settings.is_configured() {
                    let client = HttpCarrierClient::new(&settings)
                        .map_err(|e| format!("无法创建承运商客户端: {}", e))?;
                    Some(Arc::new(client) as Arc<dyn CarrierGateway>)
                } else {
                    tracing::warn!("承运商接口未配置, 装车/出货前会话将无法完成");
                    None
                }
            }
        };

        // ==========================================
        // Engine / API 层
        // ==========================================
        let plans: Arc<dyn PlanReader> = plan_repo.clone();
        let orchestrator = Arc::new(SessionOrchestrator::new(repos, plans.clone(), carrier));

        let session_api = Arc::new(SessionApi::new(orchestrator, config_manager.clone()));
        let dock_status_api = Arc::new(DockStatusApi::new(
            plans,
            ExceptionLedger::new(exception_repo),
            config_manager.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            session_api,
            dock_status_api,
            config_manager,
            plan_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先使用环境变量 DOCK_SCAN_DB_PATH, 否则放在用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("DOCK_SCAN_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./dock_scan.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("dock-scan");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("dock_scan.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }
}
