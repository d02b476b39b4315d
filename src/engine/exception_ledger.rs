// ==========================================
// 出货扫描会话引擎 - 异常台账
// ==========================================
// 职责: 异常追加/删除; 按订单/托盘查询; 状态覆盖判定
// 规则: 同一订单可同时有多条异常, 不去重
//       状态覆盖取最高严重度: 12 短装 > 10/11 数量变更 > 无
// ==========================================

use crate::barcode::SkidId;
use crate::config::settings::EngineSettings;
use crate::domain::exception::{ExceptionRecord, ExceptionScope, NewException};
use crate::domain::types::DockStatus;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::ExceptionRepository;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct ExceptionLedger {
    repo: Arc<ExceptionRepository>,
}

impl ExceptionLedger {
    pub fn new(repo: Arc<ExceptionRepository>) -> Self {
        Self { repo }
    }

    /// 校验并规范化新异常
    ///
    /// - 备注长度不超过 max_comment_length（按字符计）
    /// - 车辆级异常必须属于会话
    /// - 托盘级异常必须带订单号, 托盘号须为 3 位数字 + A/B
    pub fn prepare(
        new: NewException,
        settings: &EngineSettings,
        now: NaiveDateTime,
    ) -> EngineResult<ExceptionRecord> {
        let comments = new.comments.trim().to_string();
        if comments.chars().count() > settings.max_comment_length {
            return Err(EngineError::InvalidException(format!(
                "备注超过 {} 字符",
                settings.max_comment_length
            )));
        }
        if new.created_by.trim().is_empty() {
            return Err(EngineError::InvalidException("缺少创建人".to_string()));
        }

        let order_number = non_blank(new.order_number);
        let dock_code = non_blank(new.dock_code);
        let session_id = non_blank(new.session_id);
        let skid_id = match non_blank(new.skid_id) {
            Some(raw) => Some(
                SkidId::parse(&raw)
                    .map_err(|e| EngineError::InvalidException(e.to_string()))?
                    .code(),
            ),
            None => None,
        };

        if skid_id.is_some() && order_number.is_none() {
            return Err(EngineError::InvalidException(
                "托盘级异常必须指定订单".to_string(),
            ));
        }
        if order_number.is_none() && session_id.is_none() {
            return Err(EngineError::InvalidException(
                "车辆级异常必须属于会话".to_string(),
            ));
        }

        Ok(ExceptionRecord {
            exception_id: non_blank(new.exception_id).unwrap_or_else(|| Uuid::new_v4().to_string()),
            session_id,
            order_number,
            dock_code,
            code: new.code,
            skid_id,
            comments,
            created_by: new.created_by.trim().to_string(),
            created_at: now,
        })
    }

    /// 写入异常（幂等: 同 ID 已存在时返回已存储记录）
    ///
    /// # 返回
    /// - Ok(Some(record)): 写入或已存在
    /// - Ok(None): 所属会话已不可写
    pub fn append(&self, record: ExceptionRecord) -> EngineResult<Option<ExceptionRecord>> {
        if let Some(existing) = self.repo.find_by_id(&record.exception_id)? {
            debug!(exception_id = %existing.exception_id, "异常已存在, 幂等返回");
            return Ok(Some(existing));
        }

        match self.repo.insert(&record) {
            Ok(true) => {
                info!(
                    exception_id = %record.exception_id,
                    code = %record.code,
                    order_number = ?record.order_number,
                    skid_id = ?record.skid_id,
                    "异常已登记"
                );
                Ok(Some(record))
            }
            Ok(false) => Ok(None),
            Err(e) if e.is_unique_violation() => Ok(self.repo.find_by_id(&record.exception_id)?),
            Err(e) => Err(e.into()),
        }
    }

    pub fn find(&self, exception_id: &str) -> EngineResult<Option<ExceptionRecord>> {
        Ok(self.repo.find_by_id(exception_id)?)
    }

    /// 物理删除; 不存在返回 false
    pub fn remove(&self, exception_id: &str) -> EngineResult<bool> {
        let removed = self.repo.delete(exception_id)?;
        if removed {
            info!(exception_id, "异常已删除");
        }
        Ok(removed)
    }

    pub fn for_session(&self, session_id: &str) -> EngineResult<Vec<ExceptionRecord>> {
        Ok(self.repo.list_by_session(session_id)?)
    }

    /// 会话异常 + 相关订单上的全部异常（按 ID 去重）
    pub fn for_session_and_orders(
        &self,
        session_id: &str,
        orders: &[(String, String)],
    ) -> EngineResult<Vec<ExceptionRecord>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for record in self.repo.list_by_session(session_id)? {
            if seen.insert(record.exception_id.clone()) {
                out.push(record);
            }
        }
        for (order, dock) in orders {
            for record in self.for_order(order, dock)? {
                if seen.insert(record.exception_id.clone()) {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }

    /// 订单上的全部异常（订单级、托盘级及带订单号的会话异常）
    pub fn for_order(&self, order_number: &str, dock_code: &str) -> EngineResult<Vec<ExceptionRecord>> {
        Ok(self.repo.list_by_order(order_number, dock_code)?)
    }

    /// 全部订单级/托盘级异常（看板使用）
    pub fn order_scoped(&self) -> EngineResult<Vec<ExceptionRecord>> {
        Ok(self.repo.list_order_scoped()?)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ==========================================
// 纯查询
// ==========================================

/// 订单状态覆盖（最高严重度）
pub fn status_override<'a, I>(records: I) -> Option<DockStatus>
where
    I: IntoIterator<Item = &'a ExceptionRecord>,
{
    records
        .into_iter()
        .filter_map(|r| r.code.status_override())
        .max()
}

/// 订单上是否有数量类异常（10/11/12, 订单级或托盘级）
pub fn has_quantity_exception(records: &[ExceptionRecord], order_number: &str, dock_code: &str) -> bool {
    records
        .iter()
        .any(|r| r.belongs_to_order(order_number, dock_code) && r.code.is_quantity_exception())
}

/// 托盘是否被异常覆盖: 该托盘的托盘级异常, 或订单级数量异常
pub fn covers_skid(records: &[ExceptionRecord], order_number: &str, dock_code: &str, skid_code: &str) -> bool {
    records.iter().any(|r| {
        r.belongs_to_order(order_number, dock_code)
            && match r.scope() {
                ExceptionScope::Skid => r.skid_id.as_deref() == Some(skid_code),
                ExceptionScope::Order => r.code.is_quantity_exception(),
                ExceptionScope::Trailer => false,
            }
    })
}
