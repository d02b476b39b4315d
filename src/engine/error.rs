// ==========================================
// 出货扫描会话引擎 - 引擎层错误类型
// ==========================================
// 分类: 条码 / 校验 / 状态 / 承运商 / 存储
// 红线: 所有拒绝路径都带结构化原因, 不返回裸布尔
// ==========================================

use crate::barcode::DecodeError;
use crate::carrier::CarrierError;
use crate::domain::types::{SessionStatus, WorkflowKind};
use crate::engine::validator::ScanRejection;
use crate::repository::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 输入 =====
    #[error("条码解析失败: {0}")]
    Decode(#[from] DecodeError),

    #[error("扫描被拒绝 [{}]: {0}", .0.rule())]
    Rejected(ScanRejection),

    #[error("锚点与作业类型不一致: 期望 {expected}, 实际 {actual}")]
    AnchorKindMismatch {
        expected: WorkflowKind,
        actual: WorkflowKind,
    },

    #[error("锚点无计划数据: {0}")]
    AnchorNotPlanned(String),

    #[error("异常参数无效: {0}")]
    InvalidException(String),

    // ===== 会话状态 =====
    #[error("会话不存在: {0}")]
    SessionNotFound(String),

    #[error("会话非活动状态: session_id={session_id}, status={status}")]
    SessionNotActive {
        session_id: String,
        status: SessionStatus,
    },

    #[error("会话正在提交: {0}")]
    SubmissionInProgress(String),

    #[error("缺少车辆信息: {fields:?}")]
    MissingTrailerInfo { fields: Vec<&'static str> },

    #[error("会话未完成, 未扫描: {outstanding:?}")]
    IncompleteSession { outstanding: Vec<String> },

    // ===== 外部 =====
    #[error(transparent)]
    Carrier(#[from] CarrierError),

    /// 承运商已确认, 完成状态未能落库; 会话保持 ACTIVE 且保留提交标记, 再次完成时补记
    #[error("承运商已确认但完成状态未落库: session_id={session_id}, confirmation_number={confirmation_number}, {detail}")]
    ConfirmationNotRecorded {
        session_id: String,
        confirmation_number: String,
        detail: String,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    /// 状态类错误（会话不存在/非活动/提交中）
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            EngineError::SessionNotFound(_)
                | EngineError::SessionNotActive { .. }
                | EngineError::SubmissionInProgress(_)
        )
    }

    pub fn rejection(&self) -> Option<&ScanRejection> {
        match self {
            EngineError::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

impl From<ScanRejection> for EngineError {
    fn from(r: ScanRejection) -> Self {
        EngineError::Rejected(r)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
