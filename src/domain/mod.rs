// ==========================================
// 出货扫描会话引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、承运商报文
// 红线: 不含数据访问逻辑, 不含引擎逻辑
// ==========================================

pub mod carrier;
pub mod exception;
pub mod plan;
pub mod scan;
pub mod session;
pub mod types;

// 重导出核心类型
pub use carrier::{
    CarrierException, CarrierFieldError, CarrierOrder, CarrierResponse, CarrierShipment,
    CarrierSkid,
};
pub use exception::{ExceptionRecord, ExceptionScope, NewException};
pub use plan::{OrderSummary, PlannedItem, PlannedSkid, RouteKey, SkidPlanKey};
pub use scan::{ScanInput, ScanRecord, TargetProgress};
pub use session::{ScanSession, SessionAnchor, TrailerInfo};
pub use types::{DockStatus, ExceptionCode, SessionStatus, SkidSide, Stage, WorkflowKind};
