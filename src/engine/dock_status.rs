// ==========================================
// 出货扫描会话引擎 - 月台状态投影
// ==========================================
// 红线: 纯函数, 每次轮询重新计算, 不落库
// 顺序: 异常覆盖 → 两阶段均完成 → 按未完成阶段计算迟到分钟数
// 计划时间: 组托 = 提货时间 - build_lead; 装车 = 提货时间
// ==========================================

use crate::config::settings::EngineSettings;
use crate::domain::exception::ExceptionRecord;
use crate::domain::plan::OrderSummary;
use crate::domain::types::{DockStatus, Stage};
use crate::engine::exception_ledger::status_override;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 单个订单的月台状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockStatusView {
    pub order_number: String,
    pub dock_code: String,
    pub route: String,
    pub planned_pickup: NaiveDateTime,
    pub status: DockStatus,
    /// 未完成阶段（异常覆盖或已完成时为 None）
    pub outstanding_stage: Option<Stage>,
    /// 相对未完成阶段计划时间的迟到分钟数（向下取整, 负数为提前）
    pub minutes_late: Option<i64>,
}

pub struct DockStatusProjector<'a> {
    settings: &'a EngineSettings,
}

impl<'a> DockStatusProjector<'a> {
    pub fn new(settings: &'a EngineSettings) -> Self {
        Self { settings }
    }

    /// 计算单个订单状态
    ///
    /// # 参数
    /// - order: 订单（含阶段完成时间）
    /// - exceptions: 该订单的异常
    /// - now: 当前时间（与提货时间同一时区口径）
    pub fn project(
        &self,
        order: &OrderSummary,
        exceptions: &[&ExceptionRecord],
        now: NaiveDateTime,
    ) -> DockStatusView {
        let mut view = DockStatusView {
            order_number: order.order_number.clone(),
            dock_code: order.dock_code.clone(),
            route: order.route.clone(),
            planned_pickup: order.planned_pickup,
            status: DockStatus::OnTime,
            outstanding_stage: None,
            minutes_late: None,
        };

        if let Some(status) = status_override(exceptions.iter().copied()) {
            view.status = status;
            return view;
        }

        let stage = match (order.build_completed_at, order.load_completed_at) {
            (Some(_), Some(_)) => {
                view.status = DockStatus::Completed;
                return view;
            }
            (None, _) => Stage::Build,
            (Some(_), None) => Stage::Load,
        };

        let planned = match stage {
            Stage::Build => order.planned_pickup - self.settings.build_lead(),
            Stage::Load => order.planned_pickup,
        };
        let minutes_late = whole_minutes_late(planned, now);

        view.outstanding_stage = Some(stage);
        view.minutes_late = Some(minutes_late);
        view.status = self.classify(minutes_late);
        view
    }

    /// 按阈值分级
    pub fn classify(&self, minutes_late: i64) -> DockStatus {
        if minutes_late >= self.settings.critical_threshold_minutes {
            DockStatus::Critical
        } else if minutes_late >= self.settings.behind_threshold_minutes {
            DockStatus::Behind
        } else {
            DockStatus::OnTime
        }
    }
}

/// 向下取整的迟到分钟数
fn whole_minutes_late(planned: NaiveDateTime, now: NaiveDateTime) -> i64 {
    (now - planned).num_milliseconds().div_euclid(60_000)
}
