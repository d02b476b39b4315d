// ==========================================
// 出货扫描会话引擎 - 领域类型定义
// ==========================================
// 序列化格式: 与数据库/承运商接口保持一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 作业类型 (Workflow Kind)
// ==========================================
// 三种作业共用一套会话状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowKind {
    Build,       // 组托
    Load,        // 装车
    PreShipment, // 出货前核对
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Build => "BUILD",
            WorkflowKind::Load => "LOAD",
            WorkflowKind::PreShipment => "PRE_SHIPMENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BUILD" => Some(WorkflowKind::Build),
            "LOAD" => Some(WorkflowKind::Load),
            "PRE_SHIPMENT" => Some(WorkflowKind::PreShipment),
            _ => None,
        }
    }

    /// 是否为托盘级扫描（装车 / 出货前核对）
    pub fn is_skid_level(&self) -> bool {
        !matches!(self, WorkflowKind::Build)
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 会话状态 (Session Status)
// ==========================================
// 状态机: ACTIVE → COMPLETED / CANCELLED; ACTIVE → ACTIVE (重新开始)
// 终态不接受任何变更
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Draft,
    Active,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Draft => "DRAFT",
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Cancelled => "CANCELLED",
        }
    }

    /// 从字符串解析状态（未知值按 DRAFT 处理, 不可变更）
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => SessionStatus::Active,
            "COMPLETED" => SessionStatus::Completed,
            "CANCELLED" => SessionStatus::Cancelled,
            _ => SessionStatus::Draft,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 托盘面 (Skid Side)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkidSide {
    A,
    B,
}

impl SkidSide {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A" => Some(SkidSide::A),
            "B" => Some(SkidSide::B),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SkidSide::A => "A",
            SkidSide::B => "B",
        }
    }
}

impl fmt::Display for SkidSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 异常代码 (Exception Code)
// ==========================================
// 封闭集合, 代码值与承运商接口逐字一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExceptionCode {
    #[serde(rename = "10")]
    RevisedQuantity,
    #[serde(rename = "11")]
    ModifiedQuantityPerBox,
    #[serde(rename = "12")]
    ShortShipment,
    #[serde(rename = "20")]
    NonStandardPackaging,
}

impl ExceptionCode {
    pub fn code(&self) -> &'static str {
        match self {
            ExceptionCode::RevisedQuantity => "10",
            ExceptionCode::ModifiedQuantityPerBox => "11",
            ExceptionCode::ShortShipment => "12",
            ExceptionCode::NonStandardPackaging => "20",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code.trim() {
            "10" => Some(ExceptionCode::RevisedQuantity),
            "11" => Some(ExceptionCode::ModifiedQuantityPerBox),
            "12" => Some(ExceptionCode::ShortShipment),
            "20" => Some(ExceptionCode::NonStandardPackaging),
            _ => None,
        }
    }

    /// 该代码对订单状态的覆盖（无覆盖返回 None）
    pub fn status_override(&self) -> Option<DockStatus> {
        match self {
            ExceptionCode::ShortShipment => Some(DockStatus::ShortShipped),
            ExceptionCode::RevisedQuantity | ExceptionCode::ModifiedQuantityPerBox => {
                Some(DockStatus::ProjectedShort)
            }
            ExceptionCode::NonStandardPackaging => None,
        }
    }

    /// 是否为数量类异常（允许未扫满即完成组托）
    pub fn is_quantity_exception(&self) -> bool {
        !matches!(self, ExceptionCode::NonStandardPackaging)
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ==========================================
// 月台状态 (Dock Status)
// ==========================================
// 顺序即严重度: 覆盖类状态 > 时间阈值类状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DockStatus {
    OnTime,
    Completed,
    Behind,
    Critical,
    ProjectedShort,
    ShortShipped,
}

impl DockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DockStatus::OnTime => "on-time",
            DockStatus::Completed => "completed",
            DockStatus::Behind => "behind",
            DockStatus::Critical => "critical",
            DockStatus::ProjectedShort => "projected-short",
            DockStatus::ShortShipped => "short-shipped",
        }
    }
}

impl fmt::Display for DockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 作业阶段 (Stage)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Build,
    Load,
}
