// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、计划数据播种、条码构造、脚本化承运商网关
// ==========================================

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use dock_scan::app::AppState;
use dock_scan::barcode::SkidId;
use dock_scan::carrier::{CarrierConfirmation, CarrierError, CarrierGateway, CarrierResult};
use dock_scan::db::{ensure_schema, open_sqlite_connection};
use dock_scan::domain::carrier::{CarrierFieldError, CarrierShipment};
use dock_scan::domain::plan::{OrderSummary, PlannedItem, PlannedSkid};
use dock_scan::domain::session::TrailerInfo;
use dock_scan::domain::types::{SkidSide, Stage};
use dock_scan::repository::{OrderProgressRepository, PlanRepository};
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

pub const PLANT: &str = "PLNT1";
pub const SUPPLIER: &str = "SUP01";
pub const DOCK: &str = "D1";
pub const ROUTE: &str = "RT1001";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径非 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 创建带脚本化承运商网关的应用状态
pub fn setup_state(gateway: Arc<MockCarrierGateway>) -> (NamedTempFile, String, AppState) {
    let (temp_file, db_path) = create_test_db().unwrap();
    let state = AppState::with_gateway(db_path.clone(), gateway).unwrap();
    (temp_file, db_path, state)
}

pub fn pickup() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 16)
        .unwrap()
        .and_hms_opt(14, 0, 0)
        .unwrap()
}

// ==========================================
// 计划数据播种
// ==========================================

pub fn order(order_number: &str) -> OrderSummary {
    OrderSummary {
        order_number: order_number.to_string(),
        dock_code: DOCK.to_string(),
        plant_code: PLANT.to_string(),
        supplier_code: SUPPLIER.to_string(),
        route: ROUTE.to_string(),
        planned_pickup: pickup(),
        build_completed_at: None,
        load_completed_at: None,
    }
}

/// 组托订单: 每个零件 (part, kanban, total_boxes)
pub fn seed_build_order(repo: &PlanRepository, order_number: &str, parts: &[(&str, &str, u32)]) {
    repo.upsert_order(&order(order_number)).unwrap();
    for (i, (part, kanban, total)) in parts.iter().enumerate() {
        repo.insert_item(&PlannedItem {
            item_id: format!("{}-I{}", order_number, i + 1),
            order_number: order_number.to_string(),
            dock_code: DOCK.to_string(),
            part_number: part.to_string(),
            kanban_number: kanban.to_string(),
            quantity_per_box: 10,
            total_boxes: *total,
            palletization_code: "P1".to_string(),
            manifest_number: "MAN00001".to_string(),
        })
        .unwrap();
    }
}

/// 装车订单: 计划托盘 001A..; build_done 为 true 时记录组托完成
pub fn seed_skid_order(
    db_path: &str,
    repo: &PlanRepository,
    order_number: &str,
    skid_count: u16,
    build_done: bool,
) {
    repo.upsert_order(&order(order_number)).unwrap();
    for n in 1..=skid_count {
        repo.insert_skid(&PlannedSkid {
            planned_skid_id: format!("{}-S{}", order_number, n),
            order_number: order_number.to_string(),
            dock_code: DOCK.to_string(),
            skid_id: SkidId {
                number: n,
                side: SkidSide::A,
            },
            palletization_code: "P1".to_string(),
            route: ROUTE.to_string(),
            skid_cut: false,
            manifest_number: "MAN00001".to_string(),
        })
        .unwrap();
    }
    if build_done {
        mark_build_complete(db_path, order_number);
    }
}

pub fn mark_build_complete(db_path: &str, order_number: &str) {
    let conn = Arc::new(Mutex::new(open_sqlite_connection(db_path).unwrap()));
    OrderProgressRepository::new(conn)
        .mark_stage_complete(order_number, DOCK, Stage::Build, pickup() - chrono::Duration::hours(3))
        .unwrap();
}

// ==========================================
// 条码构造
// ==========================================

pub fn manifest_raw(order_number: &str, skid: &str) -> String {
    format!(
        "{:<5}{:<5}{:<2}{:<12}{:<10}{:<2}{:<4}{:<4}",
        PLANT, SUPPLIER, DOCK, order_number, "LOAD000001", "P1", "MR01", skid
    )
}

pub fn kanban_raw(order_number: &str, part: &str, kanban: &str, box_number: u32) -> String {
    let mut raw = String::new();
    raw.push_str(&format!("{:<5}{:<1}{:<3}{:<5}{:<2}", SUPPLIER, "1", "SD1", PLANT, DOCK));
    raw.push_str(&format!("{:<12}{:<20}{:<4}", part, "BRACKET", kanban));
    raw.push_str(&format!("{:05}{:04}", 10, box_number));
    raw.push_str(&format!("{:<12}{:<8}{:<8}", order_number, "20261016", ROUTE));
    raw.push_str(&format!("{:<8}{:<4}", "20261016", "1400"));
    raw.push_str(&format!("{:<10}{:<10}{:<2}", "LS01", "ST01", "P1"));
    raw.push_str(&format!("{:<10}{:<8}{:<6}{:<10}", "", "MAN00001", "", "PKG"));
    raw.push_str(&format!("{:<8}{:<4}", "20261017", "0800"));
    format!("{:<200}", raw)
}

pub fn trailer() -> TrailerInfo {
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

// ==========================================
// 脚本化承运商网关
// ==========================================

#[derive(Debug, Clone)]
pub enum MockReply {
    Confirm(String),
    Timeout,
    Reject(Vec<CarrierFieldError>),
}

/// 按脚本依次返回; 脚本用尽后重复最后一项
pub struct MockCarrierGateway {
    script: Mutex<Vec<MockReply>>,
    calls: AtomicUsize,
    submitted: Mutex<Vec<CarrierShipment>>,
}

impl MockCarrierGateway {
    pub fn new(script: Vec<MockReply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        })
    }

    pub fn confirming(number: &str) -> Arc<Self> {
        Self::new(vec![MockReply::Confirm(number.to_string())])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<CarrierShipment> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl CarrierGateway for MockCarrierGateway {
    async fn submit(&self, shipment: &CarrierShipment) -> CarrierResult<CarrierConfirmation> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(shipment.clone());

        let reply = {
            let script = self.script.lock().unwrap();
            script
                .get(n)
                .or_else(|| script.last())
                .cloned()
                .unwrap_or(MockReply::Timeout)
        };

        match reply {
            MockReply::Confirm(number) => Ok(CarrierConfirmation {
                confirmation_number: number,
                status: Some("ACCEPTED".to_string()),
                message: None,
            }),
            MockReply::Timeout => Err(CarrierError::Timeout("operation timed out".to_string())),
            MockReply::Reject(errors) => Err(CarrierError::Rejected {
                http_status: 400,
                status: Some("REJECTED".to_string()),
                message: Some("Validation failed".to_string()),
                errors,
            }),
        }
    }
}
