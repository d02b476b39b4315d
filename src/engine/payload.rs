// ==========================================
// 出货扫描会话引擎 - 承运商提交数据组装
// ==========================================
// 结构: 车辆级 → 订单列表（按提货时间、订单号排序）→ 托盘列表 → 各级异常
// 规则: route 字段取线路去掉末两位, run 取末两位; dropHook 固定 false
// 托盘: 已扫描托盘 + 带托盘级异常的托盘
// ==========================================

use crate::domain::carrier::{
    split_route_run, CarrierException, CarrierOrder, CarrierShipment, CarrierSkid, DROP_HOOK,
    PICKUP_FORMAT,
};
use crate::domain::exception::{ExceptionRecord, ExceptionScope};
use crate::domain::scan::ScanRecord;
use crate::domain::session::{ScanSession, SessionAnchor, TrailerInfo};
use crate::engine::workflow::PlanSnapshot;
use std::collections::{BTreeMap, HashSet};

pub struct PayloadAssembler;

impl PayloadAssembler {
    /// 组装提交数据
    ///
    /// # 参数
    /// - session: 装车/出货前会话
    /// - trailer: 已校验的车辆信息
    /// - plan: 会话计划快照（托盘）
    /// - scans: 会话扫描记录
    /// - exceptions: 会话异常 + 相关订单异常
    pub fn assemble(
        session: &ScanSession,
        trailer: &TrailerInfo,
        plan: &PlanSnapshot,
        scans: &[ScanRecord],
        exceptions: &[ExceptionRecord],
    ) -> CarrierShipment {
        let (supplier, route_text) = match &session.anchor {
            SessionAnchor::Load {
                route,
                supplier_code,
                ..
            } => (supplier_code.trim().to_string(), route.trim().to_string()),
            _ => plan
                .orders()
                .first()
                .map(|o| (o.supplier_code.trim().to_string(), o.route.trim().to_string()))
                .unwrap_or_default(),
        };
        let (route, run) = split_route_run(&route_text);

        let trailer_exceptions = exceptions
            .iter()
            .filter(|e| e.scope() == ExceptionScope::Trailer)
            .filter(|e| e.session_id.as_deref() == Some(session.session_id.as_str()))
            .map(to_carrier_exception)
            .collect();

        let scanned: HashSet<&str> = scans.iter().map(|s| s.target_id.as_str()).collect();

        let mut orders: Vec<CarrierOrder> = Vec::new();
        if let PlanSnapshot::Skids {
            orders: planned_orders,
            skids,
        } = plan
        {
            let mut sorted: Vec<_> = planned_orders.iter().collect();
            sorted.sort_by(|a, b| {
                a.planned_pickup
                    .cmp(&b.planned_pickup)
                    .then_with(|| a.order_number.cmp(&b.order_number))
            });

            for order in sorted {
                let order_exceptions: Vec<&ExceptionRecord> = exceptions
                    .iter()
                    .filter(|e| e.belongs_to_order(&order.order_number, &order.dock_code))
                    .collect();

                let mut carrier_skids: BTreeMap<String, CarrierSkid> = BTreeMap::new();
                for skid in skids.iter().filter(|s| {
                    s.order_number.trim() == order.order_number.trim()
                        && s.dock_code.trim() == order.dock_code.trim()
                }) {
                    let code = skid.skid_id.code();
                    let skid_exceptions: Vec<CarrierException> = order_exceptions
                        .iter()
                        .filter(|e| e.scope() == ExceptionScope::Skid)
                        .filter(|e| e.skid_id.as_deref() == Some(code.as_str()))
                        .map(|e| to_carrier_exception(e))
                        .collect();

                    if !scanned.contains(skid.planned_skid_id.as_str()) && skid_exceptions.is_empty() {
                        continue;
                    }

                    carrier_skids.insert(
                        code.clone(),
                        CarrierSkid {
                            skid_id: code,
                            palletization: skid.palletization_code.trim().to_string(),
                            skid_cut: skid.skid_cut,
                            exceptions: skid_exceptions,
                        },
                    );
                }

                let order_level: Vec<CarrierException> = order_exceptions
                    .iter()
                    .filter(|e| e.scope() == ExceptionScope::Order)
                    .map(|e| to_carrier_exception(e))
                    .collect();

                if carrier_skids.is_empty() && order_level.is_empty() {
                    continue;
                }

                orders.push(CarrierOrder {
                    order: order.order_number.trim().to_string(),
                    supplier: order.supplier_code.trim().to_string(),
                    plant: order.plant_code.trim().to_string(),
                    dock: order.dock_code.trim().to_string(),
                    pick_up: order.planned_pickup.format(PICKUP_FORMAT).to_string(),
                    exceptions: order_level,
                    skids: carrier_skids.into_values().collect(),
                });
            }
        }

        CarrierShipment {
            supplier,
            route,
            run,
            trailer_number: trailer.trailer_number.trim().to_string(),
            drop_hook: DROP_HOOK,
            seal_number: trailer.seal_number.trim().to_string(),
            lp_code: trailer.lp_code.clone(),
            driver_team_first_name: trailer.driver_first_name.trim().to_string(),
            driver_team_last_name: trailer.driver_last_name.trim().to_string(),
            supplier_team_first_name: trailer.supplier_team_first_name.clone(),
            supplier_team_last_name: trailer.supplier_team_last_name.clone(),
            exceptions: trailer_exceptions,
            orders,
        }
    }
}

fn to_carrier_exception(e: &ExceptionRecord) -> CarrierException {
    CarrierException {
        exception_code: e.code.code().to_string(),
        comments: e.comments.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::SkidId;
    use crate::domain::plan::{OrderSummary, PlannedSkid};
    use crate::domain::types::{ExceptionCode, SessionStatus, SkidSide};
    use chrono::{NaiveDate, NaiveDateTime, Utc};

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(h, 30, 0)
            .unwrap()
    }

    fn order(number: &str, pickup_hour: u32) -> OrderSummary {
        OrderSummary {
            order_number: number.to_string(),
            dock_code: "D1".to_string(),
            plant_code: "PLNT1".to_string(),
            supplier_code: "SUP01".to_string(),
            route: "RT1001".to_string(),
            planned_pickup: at(pickup_hour),
            build_completed_at: Some(at(6)),
            load_completed_at: None,
        }
    }

    fn skid(id: &str, order: &str, number: u16) -> PlannedSkid {
        PlannedSkid {
            planned_skid_id: id.to_string(),
            order_number: order.to_string(),
            dock_code: "D1".to_string(),
            skid_id: SkidId {
                number,
                side: SkidSide::B,
            },
            palletization_code: "P1".to_string(),
            route: "RT1001".to_string(),
            skid_cut: number == 2,
            manifest_number: "MAN00001".to_string(),
        }
    }

    fn scan(target: &str, order: &str) -> ScanRecord {
        ScanRecord {
            scan_id: format!("scan-{}", target),
            session_id: "s1".to_string(),
            target_id: target.to_string(),
            box_key: 0,
            entry_seq: 0,
            order_number: order.to_string(),
            dock_code: "D1".to_string(),
            skid_number: 1,
            skid_side: SkidSide::B,
            box_number: None,
            palletization_code: "P1".to_string(),
            internal_kanban: None,
            scanned_at: at(9),
            operator_id: "op".to_string(),
        }
    }

    fn exception(order: Option<&str>, skid: Option<&str>, code: ExceptionCode) -> ExceptionRecord {
        ExceptionRecord {
            exception_id: format!("{:?}{:?}{}", order, skid, code),
            session_id: Some("s1".to_string()),
            order_number: order.map(str::to_string),
            dock_code: order.map(|_| "D1".to_string()),
            code,
            skid_id: skid.map(str::to_string),
            comments: "note".to_string(),
            created_by: "op".to_string(),
            created_at: Utc::now().naive_utc(),
        }
    }

    fn session() -> ScanSession {
        ScanSession {
            session_id: "s1".to_string(),
            workflow_kind: crate::domain::types::WorkflowKind::Load,
            anchor: SessionAnchor::Load {
                route: "RT1001".to_string(),
                supplier_code: "SUP01".to_string(),
                pickup: at(14),
            },
            status: SessionStatus::Active,
            operator_id: "op".to_string(),
            created_at: at(8),
            completed_at: None,
            confirmation_number: None,
            trailer: None,
            submitting_since: None,
        }
    }

    fn trailer() -> TrailerInfo {
        TrailerInfo {
            trailer_number: "TR-9".to_string(),
            seal_number: "SEAL-1".to_string(),
            lp_code: Some("LP1".to_string()),
            driver_first_name: "Ana".to_string(),
            driver_last_name: "Lee".to_string(),
            supplier_team_first_name: None,
            supplier_team_last_name: None,
        }
    }

    #[test]
    fn test_assemble_nested_payload() {
        let plan = PlanSnapshot::Skids {
            orders: vec![order("O2", 14), order("O1", 14), order("O3", 10)],
            skids: vec![skid("K1", "O1", 1), skid("K2", "O1", 2), skid("K3", "O2", 1), skid("K4", "O3", 1)],
        };
        let scans = vec![scan("K1", "O1"), scan("K3", "O2")];
        let exceptions = vec![
            exception(None, None, ExceptionCode::NonStandardPackaging),
            exception(Some("O1"), Some("002B"), ExceptionCode::ShortShipment),
            exception(Some("O2"), None, ExceptionCode::RevisedQuantity),
        ];

        let shipment = PayloadAssembler::assemble(&session(), &trailer(), &plan, &scans, &exceptions);

        assert_eq!(shipment.route, "RT10");
        assert_eq!(shipment.run, "01");
        assert!(!shipment.drop_hook);
        assert_eq!(shipment.exceptions.len(), 1);

        // O3 无扫描无异常被省略; 同一提货时间按订单号排序
        let order_numbers: Vec<_> = shipment.orders.iter().map(|o| o.order.as_str()).collect();
        assert_eq!(order_numbers, vec!["O1", "O2"]);

        let o1 = &shipment.orders[0];
        assert_eq!(o1.pick_up, "2026-10-16T14:30");
        assert_eq!(o1.skids.len(), 2);
        assert_eq!(o1.skids[1].skid_id, "002B");
        assert!(o1.skids[1].skid_cut);
        assert_eq!(o1.skids[1].exceptions[0].exception_code, "12");
        assert!(o1.exceptions.is_empty());

        let o2 = &shipment.orders[1];
        assert_eq!(o2.exceptions[0].exception_code, "10");
        assert_eq!(o2.skids.len(), 1);
    }

    #[test]
    fn test_wire_field_names() {
        let plan = PlanSnapshot::Skids {
            orders: vec![order("O1", 14)],
            skids: vec![skid("K1", "O1", 1)],
        };
        let shipment =
            PayloadAssembler::assemble(&session(), &trailer(), &plan, &[scan("K1", "O1")], &[]);
        let v = serde_json::to_value(&shipment).unwrap();
        assert_eq!(v["trailerNumber"], "TR-9");
        assert_eq!(v["dropHook"], false);
        assert_eq!(v["driverTeamFirstName"], "Ana");
        assert_eq!(v["orders"][0]["pickUp"], "2026-10-16T14:30");
        assert_eq!(v["orders"][0]["skids"][0]["skidId"], "001B");
    }
}
