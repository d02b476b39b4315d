// ==========================================
// 出货扫描会话引擎 - 引擎层
// ==========================================
// 职责: 扫描校验、异常台账、作业策略、承运商数据组装、月台状态投影
// 红线: Engine 不拼 SQL, 所有拒绝必须输出结构化原因
// ==========================================

pub mod dock_status;
pub mod error;
pub mod exception_ledger;
pub mod orchestrator;
pub mod payload;
pub mod repositories;
pub mod validator;
pub mod workflow;

pub use dock_status::{DockStatusProjector, DockStatusView};
pub use error::{EngineError, EngineResult};
pub use exception_ledger::ExceptionLedger;
pub use orchestrator::{
    CompletionReceipt, RestartSummary, ScanOutcome, SessionOrchestrator, SessionSnapshot,
    SessionStart,
};
pub use payload::PayloadAssembler;
pub use repositories::SessionRepositories;
pub use validator::{ScanIndex, ScanRejection, ScanValidator, ScanVerdict, ScannedOrderPlan};
pub use workflow::{policy_for, PlanSnapshot, WorkflowPolicy};
