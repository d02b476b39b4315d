// ==========================================
// 出货扫描会话引擎 - 扫描校验器
// ==========================================
// 职责: 判定一次扫描 接受 / 重入 / 拒绝
// 红线: 纯函数, 无 I/O; 拒绝必须指明失败的规则
// ==========================================
// 组托规则顺序: 订单 → 计划零件 → 托盘化代码 → 重复 → 箱号范围
// 托盘规则顺序: 计划托盘 → 订单(出货前) → 组托完成 → 线路(装车) → 托盘化代码 → 重复
// ==========================================

use crate::config::settings::EngineSettings;
use crate::domain::plan::{OrderSummary, PlannedItem, PlannedSkid};
use crate::domain::scan::{ScanInput, ScanRecord};
use crate::domain::session::SessionAnchor;
use crate::domain::types::WorkflowKind;
use chrono::{NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ==========================================
// ScanRejection - 拒绝原因
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanRejection {
    /// 扫描类型与会话作业不符（组托会话收到托盘扫描等）
    WrongScanKind { workflow: WorkflowKind },
    OrderMismatch { expected: String, actual: String },
    UnplannedItem { part_number: String, kanban_number: String },
    PalletizationMismatch { expected: String, actual: String },
    DuplicateScan { target: String, box_number: u32 },
    BoxOutOfRange { box_number: u32, total_boxes: u32 },
    SkidNotPlanned { order_number: String, skid_id: String },
    OrderNotBuildComplete { order_number: String },
    RouteMismatch { expected: String, actual: String },
}

impl ScanRejection {
    /// 规则代码（用于操作员提示与日志）
    pub fn rule(&self) -> &'static str {
        match self {
            ScanRejection::WrongScanKind { .. } => "WRONG_SCAN_KIND",
            ScanRejection::OrderMismatch { .. } => "ORDER_MISMATCH",
            ScanRejection::UnplannedItem { .. } => "UNPLANNED_ITEM",
            ScanRejection::PalletizationMismatch { .. } => "PALLETIZATION_MISMATCH",
            ScanRejection::DuplicateScan { .. } => "DUPLICATE_SCAN",
            ScanRejection::BoxOutOfRange { .. } => "BOX_OUT_OF_RANGE",
            ScanRejection::SkidNotPlanned { .. } => "SKID_NOT_PLANNED",
            ScanRejection::OrderNotBuildComplete { .. } => "ORDER_NOT_BUILD_COMPLETE",
            ScanRejection::RouteMismatch { .. } => "ROUTE_MISMATCH",
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, ScanRejection::DuplicateScan { .. })
    }
}

impl fmt::Display for ScanRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanRejection::WrongScanKind { workflow } => {
                write!(f, "扫描类型不适用于 {} 会话", workflow)
            }
            ScanRejection::OrderMismatch { expected, actual } => {
                write!(f, "订单不符: 期望 {}, 实际 {}", expected, actual)
            }
            ScanRejection::UnplannedItem {
                part_number,
                kanban_number,
            } => write!(f, "零件不在计划中: {} / {}", part_number, kanban_number),
            ScanRejection::PalletizationMismatch { expected, actual } => {
                write!(f, "托盘化代码不符: 期望 {}, 实际 {}", expected, actual)
            }
            ScanRejection::DuplicateScan { target, box_number } => {
                write!(f, "重复扫描: {} 箱 {}", target, box_number)
            }
            ScanRejection::BoxOutOfRange {
                box_number,
                total_boxes,
            } => write!(f, "箱号 {} 超出范围 1..={}", box_number, total_boxes),
            ScanRejection::SkidNotPlanned {
                order_number,
                skid_id,
            } => write!(f, "托盘不在计划中: {} {}", order_number, skid_id),
            ScanRejection::OrderNotBuildComplete { order_number } => {
                write!(f, "订单尚未完成组托: {}", order_number)
            }
            ScanRejection::RouteMismatch { expected, actual } => {
                write!(f, "线路不符: 期望 {}, 实际 {}", expected, actual)
            }
        }
    }
}

// ==========================================
// ScanIndex - 会话内已有扫描条目
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySummary {
    pub entries: u32,
    pub first_scanned_at: NaiveDateTime,
}

#[derive(Debug, Default, Clone)]
pub struct ScanIndex {
    entries: HashMap<(String, u32), EntrySummary>,
}

impl ScanIndex {
    pub fn from_records(records: &[ScanRecord]) -> Self {
        let mut entries: HashMap<(String, u32), EntrySummary> = HashMap::new();
        for r in records {
            entries
                .entry((r.target_id.clone(), r.box_key))
                .and_modify(|e| {
                    e.entries += 1;
                    if r.scanned_at < e.first_scanned_at {
                        e.first_scanned_at = r.scanned_at;
                    }
                })
                .or_insert(EntrySummary {
                    entries: 1,
                    first_scanned_at: r.scanned_at,
                });
        }
        Self { entries }
    }

    pub fn get(&self, target_id: &str, box_key: u32) -> Option<&EntrySummary> {
        self.entries.get(&(target_id.to_string(), box_key))
    }
}

// ==========================================
// 校验输入/输出
// ==========================================

/// 托盘扫描时, 条码所指订单的计划（由编排器按条码订单号查询）
#[derive(Debug, Clone, Default)]
pub struct ScannedOrderPlan {
    pub order: Option<OrderSummary>,
    pub skids: Vec<PlannedSkid>,
}

/// 校验通过的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanVerdict {
    pub target_id: String,
    pub label: String,
    pub order_number: String,
    pub dock_code: String,
    pub box_key: u32,
    /// 0 = 首次扫描; >0 = 窗口内重入
    pub entry_seq: u32,
}

impl ScanVerdict {
    pub fn is_reentry(&self) -> bool {
        self.entry_seq > 0
    }
}

// ==========================================
// ScanValidator
// ==========================================
pub struct ScanValidator<'a> {
    settings: &'a EngineSettings,
}

impl<'a> ScanValidator<'a> {
    pub fn new(settings: &'a EngineSettings) -> Self {
        Self { settings }
    }

    /// 组托扫描校验
    ///
    /// # 参数
    /// - anchor: 会话锚点（必须是 Build）
    /// - items: 会话订单的计划零件
    /// - input: 已解码的 清单+看板
    /// - index: 会话内已有条目
    /// - now: 扫描时间（重入窗口判定）
    pub fn validate_build(
        &self,
        anchor: &SessionAnchor,
        items: &[PlannedItem],
        input: &ScanInput,
        index: &ScanIndex,
        now: NaiveDateTime,
    ) -> Result<ScanVerdict, ScanRejection> {
        let (SessionAnchor::Build {
            order_number,
            dock_code,
        }, ScanInput::Build { manifest, kanban }) = (anchor, input)
        else {
            return Err(ScanRejection::WrongScanKind {
                workflow: anchor.kind(),
            });
        };
        let order_number = order_number.trim();
        let dock_code = dock_code.trim();

        // 1. 订单
        if manifest.order() != order_number || manifest.dock() != dock_code {
            return Err(ScanRejection::OrderMismatch {
                expected: format!("{}/{}", order_number, dock_code),
                actual: format!("{}/{}", manifest.order(), manifest.dock()),
            });
        }
        if kanban.order() != order_number {
            return Err(ScanRejection::OrderMismatch {
                expected: order_number.to_string(),
                actual: kanban.order().to_string(),
            });
        }

        // 2. 计划零件
        let item = items
            .iter()
            .find(|i| i.part_number.trim() == kanban.part() && i.kanban_number.trim() == kanban.kanban())
            .ok_or_else(|| ScanRejection::UnplannedItem {
                part_number: kanban.part().to_string(),
                kanban_number: kanban.kanban().to_string(),
            })?;

        // 3. 托盘化代码（看板与清单都须与计划一致）
        if self.settings.check_palletization {
            let expected = item.palletization_code.trim();
            for actual in [kanban.palletization(), manifest.palletization()] {
                if actual != expected {
                    return Err(ScanRejection::PalletizationMismatch {
                        expected: expected.to_string(),
                        actual: actual.to_string(),
                    });
                }
            }
        }

        // 4. 重复
        let box_number = kanban.box_number;
        let label = format!("{}/{}", item.part_number.trim(), item.kanban_number.trim());
        let entry_seq = self.entry_seq(index, &item.item_id, box_number, &label, now)?;

        // 5. 箱号范围
        if box_number == 0 || box_number > item.total_boxes {
            return Err(ScanRejection::BoxOutOfRange {
                box_number,
                total_boxes: item.total_boxes,
            });
        }

        Ok(ScanVerdict {
            target_id: item.item_id.clone(),
            label,
            order_number: order_number.to_string(),
            dock_code: dock_code.to_string(),
            box_key: box_number,
            entry_seq,
        })
    }

    /// 托盘扫描校验（装车 / 出货前核对）
    pub fn validate_skid(
        &self,
        anchor: &SessionAnchor,
        scanned: &ScannedOrderPlan,
        input: &ScanInput,
        index: &ScanIndex,
        now: NaiveDateTime,
    ) -> Result<ScanVerdict, ScanRejection> {
        let ScanInput::Skid { manifest } = input else {
            return Err(ScanRejection::WrongScanKind {
                workflow: anchor.kind(),
            });
        };
        if matches!(anchor, SessionAnchor::Build { .. }) {
            return Err(ScanRejection::WrongScanKind {
                workflow: anchor.kind(),
            });
        }

        // 1. 计划托盘
        let skid_code = manifest.skid_id.code();
        let skid = scanned
            .skids
            .iter()
            .find(|s| {
                s.order_number.trim() == manifest.order()
                    && s.dock_code.trim() == manifest.dock()
                    && s.skid_id == manifest.skid_id
            })
            .ok_or_else(|| ScanRejection::SkidNotPlanned {
                order_number: manifest.order().to_string(),
                skid_id: skid_code.clone(),
            })?;
        let order = scanned
            .order
            .as_ref()
            .ok_or_else(|| ScanRejection::SkidNotPlanned {
                order_number: manifest.order().to_string(),
                skid_id: skid_code.clone(),
            })?;

        // 2. 出货前核对: 订单须为会话订单
        if let SessionAnchor::PreShipment {
            order_number,
            dock_code,
            ..
        } = anchor
        {
            if order_number.trim() != manifest.order() || dock_code.trim() != manifest.dock() {
                return Err(ScanRejection::OrderMismatch {
                    expected: format!("{}/{}", order_number.trim(), dock_code.trim()),
                    actual: format!("{}/{}", manifest.order(), manifest.dock()),
                });
            }
        }

        // 3. 组托完成
        if !order.is_build_complete() {
            return Err(ScanRejection::OrderNotBuildComplete {
                order_number: order.order_number.clone(),
            });
        }

        // 4. 装车: 线路/供应商/提货时间须与锚点一致
        if let SessionAnchor::Load {
            route,
            supplier_code,
            pickup,
        } = anchor
        {
            let same = order.route.trim() == route.trim()
                && order.supplier_code.trim() == supplier_code.trim()
                && order.planned_pickup == *pickup;
            if !same {
                return Err(ScanRejection::RouteMismatch {
                    expected: format!("{} {} {}", route.trim(), supplier_code.trim(), pickup),
                    actual: format!(
                        "{} {} {}",
                        order.route.trim(),
                        order.supplier_code.trim(),
                        order.planned_pickup
                    ),
                });
            }
        }

        // 5. 托盘化代码
        if self.settings.check_palletization
            && manifest.palletization() != skid.palletization_code.trim()
        {
            return Err(ScanRejection::PalletizationMismatch {
                expected: skid.palletization_code.trim().to_string(),
                actual: manifest.palletization().to_string(),
            });
        }

        // 6. 重复
        let label = format!("{} {}", skid.order_number.trim(), skid_code);
        let entry_seq = self.entry_seq(index, &skid.planned_skid_id, 0, &label, now)?;

        Ok(ScanVerdict {
            target_id: skid.planned_skid_id.clone(),
            label,
            order_number: skid.order_number.trim().to_string(),
            dock_code: skid.dock_code.trim().to_string(),
            box_key: 0,
            entry_seq,
        })
    }

    /// 重复判定: 无条目 → 0; 窗口内 → 下一个 entry_seq; 否则拒绝
    fn entry_seq(
        &self,
        index: &ScanIndex,
        target_id: &str,
        box_key: u32,
        label: &str,
        now: NaiveDateTime,
    ) -> Result<u32, ScanRejection> {
        let Some(existing) = index.get(target_id, box_key) else {
            return Ok(0);
        };
        // 扫描时间按整秒落库, 比较前对齐精度
        let now = now.trunc_subsecs(0);
        match self.settings.duplicate_window.horizon() {
            Some(horizon) if now - existing.first_scanned_at <= horizon => Ok(existing.entries),
            _ => Err(ScanRejection::DuplicateScan {
                target: label.to_string(),
                box_number: box_key,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::{decode_kanban, decode_manifest, SkidId};
    use crate::config::settings::DuplicateWindow;
    use crate::domain::types::SkidSide;
    use chrono::{Duration, NaiveDate};

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn manifest_raw(order: &str, pallet: &str, skid: &str) -> String {
        format!(
            "{:<5}{:<5}{:<2}{:<12}{:<10}{:<2}{:<4}{:<4}",
            "PLNT1", "SUP01", "D1", order, "LOAD000001", pallet, "MR01", skid
        )
    }

    fn kanban_raw(order: &str, part: &str, kanban: &str, box_number: u32, pallet: &str) -> String {
        let mut raw = String::new();
        raw.push_str(&format!("{:<5}{:<1}{:<3}{:<5}{:<2}", "SUP01", "1", "SD1", "PLNT1", "D1"));
        raw.push_str(&format!("{:<12}{:<20}{:<4}", part, "BRACKET", kanban));
        raw.push_str(&format!("{:05}{:04}", 10, box_number));
        raw.push_str(&format!("{:<12}{:<8}{:<8}", order, "20261016", "RT1001"));
        raw.push_str(&format!("{:<8}{:<4}", "20261016", "1400"));
        raw.push_str(&format!("{:<10}{:<10}{:<2}", "LS01", "ST01", pallet));
        raw.push_str(&format!("{:<10}{:<8}{:<6}{:<10}", "", "MAN00001", "", "PKG"));
        raw.push_str(&format!("{:<8}{:<4}", "20261017", "0800"));
        format!("{:<200}", raw)
    }

    fn build_input(box_number: u32) -> ScanInput {
        ScanInput::Build {
            manifest: decode_manifest(&manifest_raw("ORD1", "P1", "001A")).unwrap(),
            kanban: decode_kanban(&kanban_raw("ORD1", "PART-1", "K001", box_number, "P1")).unwrap(),
        }
    }

    fn build_anchor() -> SessionAnchor {
        SessionAnchor::Build {
            order_number: "ORD1".to_string(),
            dock_code: "D1".to_string(),
        }
    }

    fn items() -> Vec<PlannedItem> {
        vec![PlannedItem {
            item_id: "I1".to_string(),
            order_number: "ORD1".to_string(),
            dock_code: "D1".to_string(),
            part_number: "PART-1".to_string(),
            kanban_number: "K001".to_string(),
            quantity_per_box: 10,
            total_boxes: 5,
            palletization_code: "P1".to_string(),
            manifest_number: "MAN00001".to_string(),
        }]
    }

    fn record(target: &str, box_key: u32, entry_seq: u32, at: NaiveDateTime) -> ScanRecord {
        ScanRecord {
            scan_id: format!("{}-{}-{}", target, box_key, entry_seq),
            session_id: "s1".to_string(),
            target_id: target.to_string(),
            box_key,
            entry_seq,
            order_number: "ORD1".to_string(),
            dock_code: "D1".to_string(),
            skid_number: 1,
            skid_side: SkidSide::A,
            box_number: Some(box_key),
            palletization_code: "P1".to_string(),
            internal_kanban: None,
            scanned_at: at,
            operator_id: "op".to_string(),
        }
    }

    #[test]
    fn test_build_accepts_planned_box() {
        let settings = EngineSettings::default();
        let v = ScanValidator::new(&settings)
            .validate_build(&build_anchor(), &items(), &build_input(3), &ScanIndex::default(), ts(8, 0, 0))
            .unwrap();
        assert_eq!(v.target_id, "I1");
        assert_eq!(v.box_key, 3);
        assert_eq!(v.entry_seq, 0);
    }

    #[test]
    fn test_build_rule_order() {
        let settings = EngineSettings::default();
        let validator = ScanValidator::new(&settings);
        let index = ScanIndex::default();

        // 订单不符优先于一切
        let wrong_order = ScanInput::Build {
            manifest: decode_manifest(&manifest_raw("ORD2", "ZZ", "001A")).unwrap(),
            kanban: decode_kanban(&kanban_raw("ORD2", "NOPE", "K999", 3, "ZZ")).unwrap(),
        };
        let err = validator
            .validate_build(&build_anchor(), &items(), &wrong_order, &index, ts(8, 0, 0))
            .unwrap_err();
        assert_eq!(err.rule(), "ORDER_MISMATCH");

        let unplanned = ScanInput::Build {
            manifest: decode_manifest(&manifest_raw("ORD1", "P1", "001A")).unwrap(),
            kanban: decode_kanban(&kanban_raw("ORD1", "NOPE", "K999", 3, "ZZ")).unwrap(),
        };
        let err = validator
            .validate_build(&build_anchor(), &items(), &unplanned, &index, ts(8, 0, 0))
            .unwrap_err();
        assert_eq!(err.rule(), "UNPLANNED_ITEM");

        let pallet = ScanInput::Build {
            manifest: decode_manifest(&manifest_raw("ORD1", "P1", "001A")).unwrap(),
            kanban: decode_kanban(&kanban_raw("ORD1", "PART-1", "K001", 3, "P2")).unwrap(),
        };
        let err = validator
            .validate_build(&build_anchor(), &items(), &pallet, &index, ts(8, 0, 0))
            .unwrap_err();
        assert_eq!(
            err,
            ScanRejection::PalletizationMismatch {
                expected: "P1".to_string(),
                actual: "P2".to_string()
            }
        );

        let err = validator
            .validate_build(&build_anchor(), &items(), &build_input(6), &index, ts(8, 0, 0))
            .unwrap_err();
        assert_eq!(err.rule(), "BOX_OUT_OF_RANGE");
    }

    #[test]
    fn test_palletization_check_can_be_disabled() {
        let settings = EngineSettings {
            check_palletization: false,
            ..Default::default()
        };
        let input = ScanInput::Build {
            manifest: decode_manifest(&manifest_raw("ORD1", "P9", "001A")).unwrap(),
            kanban: decode_kanban(&kanban_raw("ORD1", "PART-1", "K001", 2, "P9")).unwrap(),
        };
        assert!(ScanValidator::new(&settings)
            .validate_build(&build_anchor(), &items(), &input, &ScanIndex::default(), ts(8, 0, 0))
            .is_ok());
    }

    #[test]
    fn test_duplicate_disallowed() {
        let settings = EngineSettings::default();
        let index = ScanIndex::from_records(&[record("I1", 3, 0, ts(8, 0, 0))]);
        let err = ScanValidator::new(&settings)
            .validate_build(&build_anchor(), &items(), &build_input(3), &index, ts(8, 0, 5))
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_duplicate_window_allows_reentry_within_horizon() {
        let settings = EngineSettings {
            duplicate_window: DuplicateWindow::AllowWithin { seconds: 60 },
            ..Default::default()
        };
        let validator = ScanValidator::new(&settings);
        let index = ScanIndex::from_records(&[
            record("I1", 3, 0, ts(8, 0, 0)),
            record("I1", 3, 1, ts(8, 0, 20)),
        ]);

        let v = validator
            .validate_build(&build_anchor(), &items(), &build_input(3), &index, ts(8, 0, 59))
            .unwrap();
        assert_eq!(v.entry_seq, 2);
        assert!(v.is_reentry());

        let err = validator
            .validate_build(
                &build_anchor(),
                &items(),
                &build_input(3),
                &index,
                ts(8, 0, 0) + Duration::seconds(61),
            )
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_reentry_horizon_ignores_subsecond_part_of_now() {
        let settings = EngineSettings {
            duplicate_window: DuplicateWindow::AllowWithin { seconds: 30 },
            ..Default::default()
        };
        let validator = ScanValidator::new(&settings);
        let index = ScanIndex::from_records(&[record("I1", 3, 0, ts(8, 0, 0))]);

        // 第 30 秒内的任意时刻都在窗口内
        let v = validator
            .validate_build(
                &build_anchor(),
                &items(),
                &build_input(3),
                &index,
                ts(8, 0, 30) + Duration::milliseconds(900),
            )
            .unwrap();
        assert_eq!(v.entry_seq, 1);

        let err = validator
            .validate_build(&build_anchor(), &items(), &build_input(3), &index, ts(8, 0, 31))
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    fn load_anchor() -> SessionAnchor {
        SessionAnchor::Load {
            route: "RT1001".to_string(),
            supplier_code: "SUP01".to_string(),
            pickup: ts(14, 0, 0),
        }
    }

    fn scanned_plan(build_done: bool, route: &str) -> ScannedOrderPlan {
        ScannedOrderPlan {
            order: Some(OrderSummary {
                order_number: "ORD1".to_string(),
                dock_code: "D1".to_string(),
                plant_code: "PLNT1".to_string(),
                supplier_code: "SUP01".to_string(),
                route: route.to_string(),
                planned_pickup: ts(14, 0, 0),
                build_completed_at: build_done.then(|| ts(9, 0, 0)),
                load_completed_at: None,
            }),
            skids: vec![PlannedSkid {
                planned_skid_id: "K1".to_string(),
                order_number: "ORD1".to_string(),
                dock_code: "D1".to_string(),
                skid_id: SkidId {
                    number: 1,
                    side: SkidSide::A,
                },
                palletization_code: "P1".to_string(),
                route: route.to_string(),
                skid_cut: false,
                manifest_number: "MAN00001".to_string(),
            }],
        }
    }

    fn skid_input(skid: &str, pallet: &str) -> ScanInput {
        ScanInput::Skid {
            manifest: decode_manifest(&manifest_raw("ORD1", pallet, skid)).unwrap(),
        }
    }

    #[test]
    fn test_skid_rules() {
        let settings = EngineSettings::default();
        let validator = ScanValidator::new(&settings);
        let index = ScanIndex::default();
        let now = ts(10, 0, 0);

        let v = validator
            .validate_skid(&load_anchor(), &scanned_plan(true, "RT1001"), &skid_input("001A", "P1"), &index, now)
            .unwrap();
        assert_eq!(v.target_id, "K1");
        assert_eq!(v.label, "ORD1 001A");

        let err = validator
            .validate_skid(&load_anchor(), &scanned_plan(true, "RT1001"), &skid_input("002B", "P1"), &index, now)
            .unwrap_err();
        assert_eq!(err.rule(), "SKID_NOT_PLANNED");

        let err = validator
            .validate_skid(&load_anchor(), &scanned_plan(false, "RT1001"), &skid_input("001A", "P1"), &index, now)
            .unwrap_err();
        assert_eq!(err.rule(), "ORDER_NOT_BUILD_COMPLETE");

        let err = validator
            .validate_skid(&load_anchor(), &scanned_plan(true, "RT2002"), &skid_input("001A", "P1"), &index, now)
            .unwrap_err();
        assert_eq!(err.rule(), "ROUTE_MISMATCH");

        let err = validator
            .validate_skid(&load_anchor(), &scanned_plan(true, "RT1001"), &skid_input("001A", "P2"), &index, now)
            .unwrap_err();
        assert_eq!(err.rule(), "PALLETIZATION_MISMATCH");

        let index = ScanIndex::from_records(&[record("K1", 0, 0, ts(9, 30, 0))]);
        let err = validator
            .validate_skid(&load_anchor(), &scanned_plan(true, "RT1001"), &skid_input("001A", "P1"), &index, now)
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_pre_shipment_order_mismatch() {
        let settings = EngineSettings::default();
        let anchor = SessionAnchor::PreShipment {
            plant_code: "PLNT1".to_string(),
            dock_code: "D1".to_string(),
            order_number: "ORD9".to_string(),
        };
        let err = ScanValidator::new(&settings)
            .validate_skid(&anchor, &scanned_plan(true, "RT1001"), &skid_input("001A", "P1"), &ScanIndex::default(), ts(10, 0, 0))
            .unwrap_err();
        assert_eq!(err.rule(), "ORDER_MISMATCH");
    }

    #[test]
    fn test_wrong_scan_kind() {
        let settings = EngineSettings::default();
        let err = ScanValidator::new(&settings)
            .validate_build(&build_anchor(), &items(), &skid_input("001A", "P1"), &ScanIndex::default(), ts(8, 0, 0))
            .unwrap_err();
        assert_eq!(err.rule(), "WRONG_SCAN_KIND");
    }
}
