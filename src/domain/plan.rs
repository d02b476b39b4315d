// ==========================================
// 出货扫描会话引擎 - 计划数据（只读）
// ==========================================
// 来源: 上游订单导入流程
// 红线: 引擎只读, 从不修改计划数据
// ==========================================

use crate::barcode::SkidId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// PlannedItem - 计划零件（组托按箱扫描）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedItem {
    pub item_id: String,
    pub order_number: String,
    pub dock_code: String,
    pub part_number: String,
    pub kanban_number: String,
    pub quantity_per_box: u32,
    pub total_boxes: u32,
    pub palletization_code: String,
    pub manifest_number: String,
}

// ==========================================
// PlannedSkid - 计划托盘（装车按托扫描）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedSkid {
    pub planned_skid_id: String,
    pub order_number: String,
    pub dock_code: String,
    pub skid_id: SkidId,
    pub palletization_code: String,
    pub route: String,
    pub skid_cut: bool,
    pub manifest_number: String,
}

// ==========================================
// OrderSummary - 订单概要
// ==========================================
// 阶段完成时间来自引擎自有的 order_progress 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_number: String,
    pub dock_code: String,
    pub plant_code: String,
    pub supplier_code: String,
    pub route: String,
    pub planned_pickup: NaiveDateTime,
    pub build_completed_at: Option<NaiveDateTime>,
    pub load_completed_at: Option<NaiveDateTime>,
}

impl OrderSummary {
    pub fn is_build_complete(&self) -> bool {
        self.build_completed_at.is_some()
    }
}

/// 装车线路查询键（线路 + 供应商 + 取货时间）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub route: String,
    pub supplier_code: String,
    pub pickup: NaiveDateTime,
}

/// 计划托盘查询键
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkidPlanKey {
    Route(RouteKey),
    Order { order_number: String, dock_code: String },
}
