// ==========================================
// 出货扫描会话引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 计划数据只读访问 + 会话存储（会话/扫描/异常/阶段进度）
// 约束: 所有查询使用参数化
// ==========================================

pub mod error;
pub mod exception_repo;
pub mod order_progress_repo;
pub mod plan_repo;
pub mod scan_repo;
pub mod session_repo;

pub use error::{RepositoryError, RepositoryResult};
pub use exception_repo::ExceptionRepository;
pub use order_progress_repo::{OrderProgress, OrderProgressRepository};
pub use plan_repo::{PlanReader, PlanRepository};
pub use scan_repo::{ScanInsertOutcome, ScanRepository};
pub use session_repo::SessionRepository;
