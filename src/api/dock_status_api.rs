// ==========================================
// 出货扫描会话引擎 - 月台状态看板 API
// ==========================================
// 职责: 对全部计划订单做状态投影（只读, 由外部轮询驱动）
// ==========================================

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::exception::ExceptionRecord;
use crate::engine::{DockStatusProjector, DockStatusView, ExceptionLedger};
use crate::repository::PlanReader;

/// 看板汇总
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockBoard {
    pub generated_at: NaiveDateTime,
    pub orders: Vec<DockStatusView>,
    /// 各状态订单数（键为状态标签）
    pub counts: BTreeMap<String, usize>,
}

pub struct DockStatusApi {
    plans: Arc<dyn PlanReader>,
    ledger: ExceptionLedger,
    config_manager: Arc<ConfigManager>,
}

impl DockStatusApi {
    pub fn new(
        plans: Arc<dyn PlanReader>,
        ledger: ExceptionLedger,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            plans,
            ledger,
            config_manager,
        }
    }

    /// 全部订单状态（按提货时间、订单号排序）
    pub fn board(&self, now: NaiveDateTime) -> ApiResult<DockBoard> {
        let settings = self
            .config_manager
            .load_engine_settings()
            .map_err(|e| ApiError::InternalError(format!("配置加载失败: {}", e)))?;
        let projector = DockStatusProjector::new(&settings);

        let orders = self.plans.list_orders()?;
        let exceptions = self.ledger.order_scoped()?;

        let views: Vec<DockStatusView> = orders
            .iter()
            .map(|order| {
                let related: Vec<&ExceptionRecord> = exceptions
                    .iter()
                    .filter(|e| e.belongs_to_order(&order.order_number, &order.dock_code))
                    .collect();
                projector.project(order, &related, now)
            })
            .collect();

        let mut counts = BTreeMap::new();
        for view in &views {
            *counts.entry(view.status.as_str().to_string()).or_insert(0) += 1;
        }
        debug!(orders = views.len(), "月台看板已计算");

        Ok(DockBoard {
            generated_at: now,
            orders: views,
            counts,
        })
    }

    /// 单个订单状态
    pub fn order_status(
        &self,
        order_number: &str,
        dock_code: &str,
        now: NaiveDateTime,
    ) -> ApiResult<DockStatusView> {
        let settings = self
            .config_manager
            .load_engine_settings()
            .map_err(|e| ApiError::InternalError(format!("配置加载失败: {}", e)))?;

        let order = self
            .plans
            .get_order(order_number, dock_code)?
            .ok_or_else(|| ApiError::NotFound(format!("订单 {}/{} 不存在", order_number, dock_code)))?;
        let exceptions = self.ledger.for_order(order_number, dock_code)?;
        let related: Vec<&ExceptionRecord> = exceptions.iter().collect();

        Ok(DockStatusProjector::new(&settings).project(&order, &related, now))
    }
}
