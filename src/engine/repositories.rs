// ==========================================
// 出货扫描会话引擎 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合会话编排器所需的 Repository
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::repository::{
    ExceptionRepository, OrderProgressRepository, ScanRepository, SessionRepository,
};

/// 会话引擎仓储集合
///
/// # 包含的仓储
/// - `session_repo`: 会话生命周期
/// - `scan_repo`: 扫描记录
/// - `exception_repo`: 异常台账
/// - `progress_repo`: 订单阶段完成时间
#[derive(Clone)]
pub struct SessionRepositories {
    pub session_repo: Arc<SessionRepository>,
    pub scan_repo: Arc<ScanRepository>,
    pub exception_repo: Arc<ExceptionRepository>,
    pub progress_repo: Arc<OrderProgressRepository>,
}

impl SessionRepositories {
    pub fn new(
        session_repo: Arc<SessionRepository>,
        scan_repo: Arc<ScanRepository>,
        exception_repo: Arc<ExceptionRepository>,
        progress_repo: Arc<OrderProgressRepository>,
    ) -> Self {
        Self {
            session_repo,
            scan_repo,
            exception_repo,
            progress_repo,
        }
    }

    /// 基于同一连接创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self::new(
            Arc::new(SessionRepository::new(conn.clone())),
            Arc::new(ScanRepository::new(conn.clone())),
            Arc::new(ExceptionRepository::new(conn.clone())),
            Arc::new(OrderProgressRepository::new(conn)),
        )
    }
}
