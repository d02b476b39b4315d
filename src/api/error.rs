// ==========================================
// 出货扫描会话引擎 - API层错误类型
// ==========================================
// 职责: 将引擎/存储错误转换为面向操作员的错误
// 红线: 所有错误必须带显式原因; 承运商错误原样透出（含字段级错误）
// ==========================================

use crate::barcode::DecodeError;
use crate::carrier::CarrierError;
use crate::domain::types::{SessionStatus, WorkflowKind};
use crate::engine::{EngineError, ScanRejection};
use crate::i18n::{t, t_with_args};
use crate::repository::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入错误（不改变任何状态）
    // ==========================================
    #[error("条码解析失败: {0}")]
    InvalidBarcode(DecodeError),

    #[error("扫描被拒绝 [{}]: {0}", .0.rule())]
    ScanRejected(ScanRejection),

    #[error("锚点与作业类型不一致: 期望 {expected}, 实际 {actual}")]
    AnchorKindMismatch {
        expected: WorkflowKind,
        actual: WorkflowKind,
    },

    #[error("锚点无计划数据: {0}")]
    AnchorNotPlanned(String),

    #[error("异常参数无效: {0}")]
    InvalidException(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ==========================================
    // 会话状态错误
    // ==========================================
    #[error("会话不存在: {0}")]
    SessionNotFound(String),

    #[error("会话非活动状态: session_id={session_id}, status={status}")]
    SessionNotActive {
        session_id: String,
        status: SessionStatus,
    },

    #[error("会话正在提交: {0}")]
    SubmissionInProgress(String),

    #[error("缺少车辆信息: {0:?}")]
    MissingTrailerInfo(Vec<&'static str>),

    #[error("会话未完成: {0:?}")]
    IncompleteSession(Vec<String>),

    // ==========================================
    // 外部接口错误
    // ==========================================
    #[error(transparent)]
    Carrier(CarrierError),

    #[error("承运商已确认但完成状态未落库: session_id={session_id}, confirmation_number={confirmation_number}, {detail}")]
    ConfirmationNotRecorded {
        session_id: String,
        confirmation_number: String,
        detail: String,
    },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定错误代码（调用方按此分支处理）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidBarcode(_) => "INVALID_BARCODE",
            ApiError::ScanRejected(r) => r.rule(),
            ApiError::AnchorKindMismatch { .. } => "ANCHOR_KIND_MISMATCH",
            ApiError::AnchorNotPlanned(_) => "ANCHOR_NOT_PLANNED",
            ApiError::InvalidException(_) => "INVALID_EXCEPTION",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            ApiError::SessionNotActive { .. } => "SESSION_NOT_ACTIVE",
            ApiError::SubmissionInProgress(_) => "SUBMISSION_IN_PROGRESS",
            ApiError::MissingTrailerInfo(_) => "MISSING_TRAILER_INFO",
            ApiError::IncompleteSession(_) => "INCOMPLETE_SESSION",
            ApiError::Carrier(CarrierError::Timeout(_)) => "CARRIER_TIMEOUT",
            ApiError::Carrier(CarrierError::Rejected { .. }) => "CARRIER_REJECTED",
            ApiError::Carrier(_) => "CARRIER_ERROR",
            ApiError::ConfirmationNotRecorded { .. } => "CONFIRMATION_NOT_RECORDED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::DatabaseError(_)
            | ApiError::DatabaseConnectionError(_)
            | ApiError::DatabaseTransactionError(_) => "DATABASE_ERROR",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// 操作员可重试（会话仍为 ACTIVE）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Carrier(_) | ApiError::SubmissionInProgress(_)
        )
    }

    /// 本地化的操作员提示
    pub fn operator_message(&self) -> String {
        match self {
            ApiError::InvalidBarcode(e) => match e {
                DecodeError::Length { expected, actual } => t_with_args(
                    "decode.length",
                    &[
                        ("expected", &expected.to_string()),
                        ("actual", &actual.to_string()),
                    ],
                ),
                DecodeError::Charset => t("decode.charset"),
                DecodeError::Field { field, message } => {
                    t_with_args("decode.field", &[("field", field), ("message", message)])
                }
            },
            ApiError::ScanRejected(r) => rejection_message(r),
            ApiError::AnchorKindMismatch { expected, actual } => t_with_args(
                "session.anchor_kind_mismatch",
                &[("expected", expected.as_str()), ("actual", actual.as_str())],
            ),
            ApiError::AnchorNotPlanned(anchor) => {
                t_with_args("session.anchor_not_planned", &[("anchor", anchor)])
            }
            ApiError::InvalidException(detail) | ApiError::InvalidInput(detail) => {
                t_with_args("exception.invalid", &[("detail", detail)])
            }
            ApiError::SessionNotFound(id) => {
                t_with_args("session.not_found", &[("session_id", id)])
            }
            ApiError::SessionNotActive { status, .. } => {
                t_with_args("session.not_active", &[("status", status.as_str())])
            }
            ApiError::SubmissionInProgress(_) => t("session.submission_in_progress"),
            ApiError::MissingTrailerInfo(fields) => {
                t_with_args("session.missing_trailer_info", &[("fields", &fields.join(", "))])
            }
            ApiError::IncompleteSession(outstanding) => t_with_args(
                "session.incomplete",
                &[("outstanding", &outstanding.join(", "))],
            ),
            ApiError::Carrier(e) => carrier_message(e),
            ApiError::ConfirmationNotRecorded {
                confirmation_number,
                ..
            } => t_with_args(
                "carrier.confirmation_not_recorded",
                &[("confirmation_number", confirmation_number)],
            ),
            ApiError::NotFound(detail)
            | ApiError::DatabaseError(detail)
            | ApiError::DatabaseConnectionError(detail)
            | ApiError::DatabaseTransactionError(detail)
            | ApiError::BusinessRuleViolation(detail) => {
                t_with_args("storage.error", &[("detail", detail)])
            }
            ApiError::InternalError(detail) => {
                t_with_args("common.internal_error", &[("detail", detail)])
            }
            ApiError::Other(e) => t_with_args("common.internal_error", &[("detail", &e.to_string())]),
        }
    }
}

fn rejection_message(r: &ScanRejection) -> String {
    let key = format!("scan.{}", r.rule());
    match r {
        ScanRejection::WrongScanKind { workflow } => {
            t_with_args(&key, &[("workflow", workflow.as_str())])
        }
        ScanRejection::OrderMismatch { expected, actual }
        | ScanRejection::PalletizationMismatch { expected, actual }
        | ScanRejection::RouteMismatch { expected, actual } => {
            t_with_args(&key, &[("expected", expected), ("actual", actual)])
        }
        ScanRejection::UnplannedItem {
            part_number,
            kanban_number,
        } => t_with_args(
            &key,
            &[("part_number", part_number), ("kanban_number", kanban_number)],
        ),
        ScanRejection::DuplicateScan { target, box_number } => t_with_args(
            &key,
            &[("target", target), ("box_number", &box_number.to_string())],
        ),
        ScanRejection::BoxOutOfRange {
            box_number,
            total_boxes,
        } => t_with_args(
            &key,
            &[
                ("box_number", &box_number.to_string()),
                ("total_boxes", &total_boxes.to_string()),
            ],
        ),
        ScanRejection::SkidNotPlanned {
            order_number,
            skid_id,
        } => t_with_args(&key, &[("order_number", order_number), ("skid_id", skid_id)]),
        ScanRejection::OrderNotBuildComplete { order_number } => {
            t_with_args(&key, &[("order_number", order_number)])
        }
    }
}

fn carrier_message(e: &CarrierError) -> String {
    match e {
        CarrierError::Timeout(_) => t("carrier.timeout"),
        CarrierError::Transport(detail) => t_with_args("carrier.transport", &[("detail", detail)]),
        CarrierError::Http { status, .. } => {
            t_with_args("carrier.http", &[("status", &status.to_string())])
        }
        CarrierError::Rejected {
            message, errors, ..
        } => {
            // 字段级错误逐条附在提示后
            let mut text = message.clone().unwrap_or_default();
            for fe in errors {
                let line = match (&fe.field, &fe.message) {
                    (Some(f), Some(m)) => format!("{}: {}", f, m),
                    (None, Some(m)) => m.clone(),
                    (Some(f), None) => f.clone(),
                    (None, None) => continue,
                };
                if !text.is_empty() {
                    text.push_str("; ");
                }
                text.push_str(&line);
            }
            t_with_args("carrier.rejected", &[("message", &text)])
        }
        CarrierError::Token(detail) => t_with_args("carrier.token", &[("detail", detail)]),
        CarrierError::NotConfigured(_) => t("carrier.not_configured"),
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Decode(e) => ApiError::InvalidBarcode(e),
            EngineError::Rejected(r) => ApiError::ScanRejected(r),
            EngineError::AnchorKindMismatch { expected, actual } => {
                ApiError::AnchorKindMismatch { expected, actual }
            }
            EngineError::AnchorNotPlanned(anchor) => ApiError::AnchorNotPlanned(anchor),
            EngineError::InvalidException(msg) => ApiError::InvalidException(msg),
            EngineError::SessionNotFound(id) => ApiError::SessionNotFound(id),
            EngineError::SessionNotActive { session_id, status } => {
                ApiError::SessionNotActive { session_id, status }
            }
            EngineError::SubmissionInProgress(id) => ApiError::SubmissionInProgress(id),
            EngineError::MissingTrailerInfo { fields } => ApiError::MissingTrailerInfo(fields),
            EngineError::IncompleteSession { outstanding } => {
                ApiError::IncompleteSession(outstanding)
            }
            EngineError::Carrier(e) => ApiError::Carrier(e),
            EngineError::ConfirmationNotRecorded {
                session_id,
                confirmation_number,
                detail,
            } => ApiError::ConfirmationNotRecorded {
                session_id,
                confirmation_number,
                detail,
            },
            EngineError::Repository(e) => e.into(),
        }
    }
}

impl From<DecodeError> for ApiError {
    fn from(err: DecodeError) -> Self {
        ApiError::InvalidBarcode(err)
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::BusinessRuleViolation(format!("无效的状态转换: {} → {}", from, to))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
