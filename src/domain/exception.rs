// ==========================================
// 出货扫描会话引擎 - 异常登记
// ==========================================
// 范围: 车辆级（仅会话） / 订单级 / 托盘级
// 说明: 同一订单可同时持有多个异常代码, 不去重
// ==========================================

use crate::domain::types::ExceptionCode;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 异常作用范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceptionScope {
    Trailer,
    Order,
    Skid,
}

/// 异常记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    pub exception_id: String,
    pub session_id: Option<String>,
    pub order_number: Option<String>,
    pub dock_code: Option<String>,
    pub code: ExceptionCode,
    /// 托盘号（如 001A）, 仅托盘级异常
    pub skid_id: Option<String>,
    pub comments: String,
    pub created_by: String,
    pub created_at: NaiveDateTime,
}

impl ExceptionRecord {
    pub fn scope(&self) -> ExceptionScope {
        match (&self.order_number, &self.skid_id) {
            (None, _) => ExceptionScope::Trailer,
            (Some(_), None) => ExceptionScope::Order,
            (Some(_), Some(_)) => ExceptionScope::Skid,
        }
    }

    /// 是否属于某订单（订单级或托盘级）
    pub fn belongs_to_order(&self, order_number: &str, dock_code: &str) -> bool {
        self.order_number.as_deref().map(str::trim) == Some(order_number.trim())
            && self
                .dock_code
                .as_deref()
                .map_or(true, |d| d.trim() == dock_code.trim())
    }
}

/// 新增异常请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewException {
    /// 调用方可指定 ID, 便于重试时保持幂等
    pub exception_id: Option<String>,
    pub session_id: Option<String>,
    pub order_number: Option<String>,
    pub dock_code: Option<String>,
    pub code: ExceptionCode,
    pub skid_id: Option<String>,
    pub comments: String,
    pub created_by: String,
}
