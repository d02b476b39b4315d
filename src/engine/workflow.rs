// ==========================================
// 出货扫描会话引擎 - 作业策略
// ==========================================
// 三种作业共用一套会话状态机, 差异收敛到策略对象:
// - 锚点含义与计划快照
// - 完成条件（未扫描目标与异常豁免）
// - 是否需要车辆信息 / 是否提交承运商 / 完成时记录的阶段
// ==========================================

use crate::domain::exception::ExceptionRecord;
use crate::domain::plan::{OrderSummary, PlannedItem, PlannedSkid, SkidPlanKey};
use crate::domain::scan::TargetProgress;
use crate::domain::session::SessionAnchor;
use crate::domain::types::{Stage, WorkflowKind};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::exception_ledger::{covers_skid, has_quantity_exception};
use crate::repository::PlanReader;
use std::collections::{BTreeMap, HashMap};

// ==========================================
// PlanSnapshot - 会话计划快照
// ==========================================
#[derive(Debug, Clone)]
pub enum PlanSnapshot {
    /// 组托: 单个订单的计划零件
    Items {
        order: OrderSummary,
        items: Vec<PlannedItem>,
    },
    /// 装车/出货前: 计划托盘及其订单
    Skids {
        orders: Vec<OrderSummary>,
        skids: Vec<PlannedSkid>,
    },
}

impl PlanSnapshot {
    /// 快照涉及的 (订单号, 月台) 列表
    pub fn order_keys(&self) -> Vec<(String, String)> {
        match self {
            PlanSnapshot::Items { order, .. } => {
                vec![(order.order_number.clone(), order.dock_code.clone())]
            }
            PlanSnapshot::Skids { orders, .. } => orders
                .iter()
                .map(|o| (o.order_number.clone(), o.dock_code.clone()))
                .collect(),
        }
    }

    pub fn orders(&self) -> Vec<&OrderSummary> {
        match self {
            PlanSnapshot::Items { order, .. } => vec![order],
            PlanSnapshot::Skids { orders, .. } => orders.iter().collect(),
        }
    }

    /// 各目标进度（计数 = 不同箱号数）
    pub fn progress(&self, counts: &HashMap<String, u32>) -> Vec<TargetProgress> {
        let scanned = |id: &str| counts.get(id).copied().unwrap_or(0);
        match self {
            PlanSnapshot::Items { items, .. } => items
                .iter()
                .map(|i| TargetProgress {
                    target_id: i.item_id.clone(),
                    order_number: i.order_number.clone(),
                    label: format!("{}/{}", i.part_number.trim(), i.kanban_number.trim()),
                    scanned_count: scanned(&i.item_id),
                    planned_count: i.total_boxes,
                })
                .collect(),
            PlanSnapshot::Skids { skids, .. } => skids
                .iter()
                .map(|s| TargetProgress {
                    target_id: s.planned_skid_id.clone(),
                    order_number: s.order_number.clone(),
                    label: format!("{} {}", s.order_number.trim(), s.skid_id.code()),
                    scanned_count: scanned(&s.planned_skid_id),
                    planned_count: 1,
                })
                .collect(),
        }
    }
}

// ==========================================
// WorkflowPolicy - 作业策略接口
// ==========================================
pub trait WorkflowPolicy: Send + Sync {
    fn kind(&self) -> WorkflowKind;

    /// 完成前是否必须录入车辆信息
    fn requires_trailer(&self) -> bool;

    /// 完成时是否提交承运商
    fn submits_to_carrier(&self) -> bool;

    /// 完成时记录的订单阶段
    fn completion_stage(&self) -> Stage;

    /// 读取锚点的计划快照; 锚点无计划时返回 AnchorNotPlanned
    fn load_plan(&self, anchor: &SessionAnchor, plans: &dyn PlanReader) -> EngineResult<PlanSnapshot>;

    /// 未完成目标（空 = 可完成）
    fn outstanding(
        &self,
        plan: &PlanSnapshot,
        progress: &[TargetProgress],
        exceptions: &[ExceptionRecord],
    ) -> Vec<String>;
}

pub fn policy_for(kind: WorkflowKind) -> &'static dyn WorkflowPolicy {
    match kind {
        WorkflowKind::Build => &BuildPolicy,
        WorkflowKind::Load => &LoadPolicy,
        WorkflowKind::PreShipment => &PreShipmentPolicy,
    }
}

// ==========================================
// BuildPolicy - 组托
// ==========================================
pub struct BuildPolicy;

impl WorkflowPolicy for BuildPolicy {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::Build
    }

    fn requires_trailer(&self) -> bool {
        false
    }

    fn submits_to_carrier(&self) -> bool {
        false
    }

    fn completion_stage(&self) -> Stage {
        Stage::Build
    }

    fn load_plan(&self, anchor: &SessionAnchor, plans: &dyn PlanReader) -> EngineResult<PlanSnapshot> {
        let SessionAnchor::Build {
            order_number,
            dock_code,
        } = anchor
        else {
            return Err(EngineError::AnchorKindMismatch {
                expected: WorkflowKind::Build,
                actual: anchor.kind(),
            });
        };

        let order = plans
            .get_order(order_number, dock_code)?
            .ok_or_else(|| EngineError::AnchorNotPlanned(anchor.key()))?;
        let items = plans.get_planned_items(order_number, dock_code)?;
        if items.is_empty() {
            return Err(EngineError::AnchorNotPlanned(anchor.key()));
        }
        Ok(PlanSnapshot::Items { order, items })
    }

    /// 全部零件箱数扫满; 订单有数量类异常时豁免
    fn outstanding(
        &self,
        plan: &PlanSnapshot,
        progress: &[TargetProgress],
        exceptions: &[ExceptionRecord],
    ) -> Vec<String> {
        if let PlanSnapshot::Items { order, .. } = plan {
            if has_quantity_exception(exceptions, &order.order_number, &order.dock_code) {
                return Vec::new();
            }
        }
        progress
            .iter()
            .filter(|p| !p.is_complete())
            .map(|p| format!("{} ({}/{})", p.label, p.scanned_count, p.planned_count))
            .collect()
    }
}

// ==========================================
// 托盘类作业共用逻辑
// ==========================================
fn skid_snapshot(
    anchor: &SessionAnchor,
    key: SkidPlanKey,
    plans: &dyn PlanReader,
) -> EngineResult<PlanSnapshot> {
    let skids = plans.get_planned_skids(&key)?;
    if skids.is_empty() {
        return Err(EngineError::AnchorNotPlanned(anchor.key()));
    }

    let mut orders: BTreeMap<(String, String), OrderSummary> = BTreeMap::new();
    for skid in &skids {
        let k = (skid.order_number.clone(), skid.dock_code.clone());
        if orders.contains_key(&k) {
            continue;
        }
        if let Some(order) = plans.get_order(&skid.order_number, &skid.dock_code)? {
            orders.insert(k, order);
        }
    }

    Ok(PlanSnapshot::Skids {
        orders: orders.into_values().collect(),
        skids,
    })
}

fn skid_outstanding(
    plan: &PlanSnapshot,
    progress: &[TargetProgress],
    exceptions: &[ExceptionRecord],
) -> Vec<String> {
    let PlanSnapshot::Skids { skids, .. } = plan else {
        return Vec::new();
    };
    let done: HashMap<&str, bool> = progress
        .iter()
        .map(|p| (p.target_id.as_str(), p.is_complete()))
        .collect();

    skids
        .iter()
        .filter(|s| !done.get(s.planned_skid_id.as_str()).copied().unwrap_or(false))
        .filter(|s| !covers_skid(exceptions, &s.order_number, &s.dock_code, &s.skid_id.code()))
        .map(|s| format!("{} {}", s.order_number.trim(), s.skid_id.code()))
        .collect()
}

// ==========================================
// LoadPolicy - 装车
// ==========================================
pub struct LoadPolicy;

impl WorkflowPolicy for LoadPolicy {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::Load
    }

    fn requires_trailer(&self) -> bool {
        true
    }

    fn submits_to_carrier(&self) -> bool {
        true
    }

    fn completion_stage(&self) -> Stage {
        Stage::Load
    }

    fn load_plan(&self, anchor: &SessionAnchor, plans: &dyn PlanReader) -> EngineResult<PlanSnapshot> {
        match (anchor, anchor.skid_plan_key()) {
            (SessionAnchor::Load { .. }, Some(key)) => skid_snapshot(anchor, key, plans),
            _ => Err(EngineError::AnchorKindMismatch {
                expected: WorkflowKind::Load,
                actual: anchor.kind(),
            }),
        }
    }

    fn outstanding(
        &self,
        plan: &PlanSnapshot,
        progress: &[TargetProgress],
        exceptions: &[ExceptionRecord],
    ) -> Vec<String> {
        skid_outstanding(plan, progress, exceptions)
    }
}

// ==========================================
// PreShipmentPolicy - 出货前核对
// ==========================================
pub struct PreShipmentPolicy;

impl WorkflowPolicy for PreShipmentPolicy {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::PreShipment
    }

    fn requires_trailer(&self) -> bool {
        true
    }

    fn submits_to_carrier(&self) -> bool {
        true
    }

    fn completion_stage(&self) -> Stage {
        Stage::Load
    }

    fn load_plan(&self, anchor: &SessionAnchor, plans: &dyn PlanReader) -> EngineResult<PlanSnapshot> {
        match (anchor, anchor.skid_plan_key()) {
            (SessionAnchor::PreShipment { .. }, Some(key)) => skid_snapshot(anchor, key, plans),
            _ => Err(EngineError::AnchorKindMismatch {
                expected: WorkflowKind::PreShipment,
                actual: anchor.kind(),
            }),
        }
    }

    fn outstanding(
        &self,
        plan: &PlanSnapshot,
        progress: &[TargetProgress],
        exceptions: &[ExceptionRecord],
    ) -> Vec<String> {
        skid_outstanding(plan, progress, exceptions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::SkidId;
    use crate::domain::types::{ExceptionCode, SkidSide};
    use chrono::{NaiveDate, Utc};

    fn order() -> OrderSummary {
        OrderSummary {
            order_number: "O1".to_string(),
            dock_code: "D1".to_string(),
            plant_code: "PLNT1".to_string(),
            supplier_code: "SUP01".to_string(),
            route: "RT1001".to_string(),
            planned_pickup: NaiveDate::from_ymd_opt(2026, 10, 16)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap(),
            build_completed_at: None,
            load_completed_at: None,
        }
    }

    fn item(id: &str, total: u32) -> PlannedItem {
        PlannedItem {
            item_id: id.to_string(),
            order_number: "O1".to_string(),
            dock_code: "D1".to_string(),
            part_number: format!("PART-{}", id),
            kanban_number: "K001".to_string(),
            quantity_per_box: 10,
            total_boxes: total,
            palletization_code: "P1".to_string(),
            manifest_number: "MAN00001".to_string(),
        }
    }

    fn skid(id: &str, number: u16) -> PlannedSkid {
        PlannedSkid {
            planned_skid_id: id.to_string(),
            order_number: "O1".to_string(),
            dock_code: "D1".to_string(),
            skid_id: SkidId {
                number,
                side: SkidSide::A,
            },
            palletization_code: "P1".to_string(),
            route: "RT1001".to_string(),
            skid_cut: false,
            manifest_number: "MAN00001".to_string(),
        }
    }

    fn exception(code: ExceptionCode, skid_id: Option<&str>) -> ExceptionRecord {
        ExceptionRecord {
            exception_id: "e1".to_string(),
            session_id: None,
            order_number: Some("O1".to_string()),
            dock_code: Some("D1".to_string()),
            code,
            skid_id: skid_id.map(str::to_string),
            comments: String::new(),
            created_by: "op".to_string(),
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_build_outstanding_and_quantity_waiver() {
        let plan = PlanSnapshot::Items {
            order: order(),
            items: vec![item("I1", 5), item("I2", 2)],
        };
        let counts = HashMap::from([("I1".to_string(), 5), ("I2".to_string(), 1)]);
        let progress = plan.progress(&counts);

        let outstanding = BuildPolicy.outstanding(&plan, &progress, &[]);
        assert_eq!(outstanding, vec!["PART-I2/K001 (1/2)".to_string()]);

        let waived = BuildPolicy.outstanding(
            &plan,
            &progress,
            &[exception(ExceptionCode::RevisedQuantity, None)],
        );
        assert!(waived.is_empty());

        let not_waived = BuildPolicy.outstanding(
            &plan,
            &progress,
            &[exception(ExceptionCode::NonStandardPackaging, None)],
        );
        assert_eq!(not_waived.len(), 1);
    }

    #[test]
    fn test_skid_outstanding_with_skid_exception() {
        let plan = PlanSnapshot::Skids {
            orders: vec![order()],
            skids: vec![skid("K1", 1), skid("K2", 2)],
        };
        let counts = HashMap::from([("K1".to_string(), 1)]);
        let progress = plan.progress(&counts);

        assert_eq!(
            LoadPolicy.outstanding(&plan, &progress, &[]),
            vec!["O1 002A".to_string()]
        );
        assert!(LoadPolicy
            .outstanding(&plan, &progress, &[exception(ExceptionCode::NonStandardPackaging, Some("002A"))])
            .is_empty());
    }

    #[test]
    fn test_policy_table() {
        assert!(!policy_for(WorkflowKind::Build).submits_to_carrier());
        assert!(policy_for(WorkflowKind::Load).requires_trailer());
        assert_eq!(policy_for(WorkflowKind::PreShipment).completion_stage(), Stage::Load);
        assert_eq!(policy_for(WorkflowKind::PreShipment).kind(), WorkflowKind::PreShipment);
    }
}
