// ==========================================
// 出货扫描会话引擎 - 计划数据仓储
// ==========================================
// 职责: 向引擎提供"应该扫到什么"（计划零件/托盘/订单）
// 红线: 引擎侧只读; 写入方法仅供上游导入流程使用
// ==========================================

use crate::barcode::SkidId;
use crate::db::{fmt_ts, parse_opt_ts, parse_ts};
use crate::domain::plan::{OrderSummary, PlannedItem, PlannedSkid, SkidPlanKey};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// PlanReader - 计划读取接口
// ==========================================
// 实现者: PlanRepository（SQLite）; 测试可替换为内存实现
pub trait PlanReader: Send + Sync {
    /// 订单下的计划零件
    fn get_planned_items(
        &self,
        order_number: &str,
        dock_code: &str,
    ) -> RepositoryResult<Vec<PlannedItem>>;

    /// 线路或订单下的计划托盘
    fn get_planned_skids(&self, key: &SkidPlanKey) -> RepositoryResult<Vec<PlannedSkid>>;

    /// 订单概要（含阶段完成时间）
    fn get_order(&self, order_number: &str, dock_code: &str)
        -> RepositoryResult<Option<OrderSummary>>;

    /// 全部订单（月台看板使用）
    fn list_orders(&self) -> RepositoryResult<Vec<OrderSummary>>;
}

// ==========================================
// PlanRepository - SQLite 实现
// ==========================================
pub struct PlanRepository {
    conn: Arc<Mutex<Connection>>,
}

const ORDER_COLUMNS: &str = r#"
    o.order_number, o.dock_code, o.plant_code, o.supplier_code, o.route, o.planned_pickup,
    p.build_completed_at, p.load_completed_at
"#;

const SKID_COLUMNS: &str = r#"
    s.planned_skid_id, s.order_number, s.dock_code, s.skid_id, s.palletization_code,
    o.route, s.skid_cut, s.manifest_number
"#;

impl PlanRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 上游导入写入口
    // ==========================================

    /// 写入/覆盖订单
    pub fn upsert_order(&self, order: &OrderSummary) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO plan_order (order_number, dock_code, plant_code, supplier_code, route, planned_pickup)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(order_number, dock_code) DO UPDATE SET
              plant_code = excluded.plant_code,
              supplier_code = excluded.supplier_code,
              route = excluded.route,
              planned_pickup = excluded.planned_pickup
            "#,
            params![
                order.order_number,
                order.dock_code,
                order.plant_code,
                order.supplier_code,
                order.route,
                fmt_ts(&order.planned_pickup),
            ],
        )?;
        Ok(())
    }

    /// 写入计划零件
    pub fn insert_item(&self, item: &PlannedItem) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO plan_item (
              item_id, order_number, dock_code, part_number, kanban_number,
              quantity_per_box, total_boxes, palletization_code, manifest_number
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                item.item_id,
                item.order_number,
                item.dock_code,
                item.part_number,
                item.kanban_number,
                item.quantity_per_box,
                item.total_boxes,
                item.palletization_code,
                item.manifest_number,
            ],
        )?;
        Ok(())
    }

    /// 写入计划托盘（route 取自订单, 不单独存储）
    pub fn insert_skid(&self, skid: &PlannedSkid) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO plan_skid (
              planned_skid_id, order_number, dock_code, skid_id,
              palletization_code, skid_cut, manifest_number
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                skid.planned_skid_id,
                skid.order_number,
                skid.dock_code,
                skid.skid_id.code(),
                skid.palletization_code,
                if skid.skid_cut { 1 } else { 0 },
                skid.manifest_number,
            ],
        )?;
        Ok(())
    }
}

impl PlanReader for PlanRepository {
    fn get_planned_items(
        &self,
        order_number: &str,
        dock_code: &str,
    ) -> RepositoryResult<Vec<PlannedItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT item_id, order_number, dock_code, part_number, kanban_number,
                   quantity_per_box, total_boxes, palletization_code, manifest_number
            FROM plan_item
            WHERE order_number = ?1 AND dock_code = ?2
            ORDER BY part_number, kanban_number
            "#,
        )?;

        let items = stmt
            .query_map(params![order_number.trim(), dock_code.trim()], map_item_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn get_planned_skids(&self, key: &SkidPlanKey) -> RepositoryResult<Vec<PlannedSkid>> {
        let conn = self.get_conn()?;

        let rows = match key {
            SkidPlanKey::Route(route_key) => {
                let sql = format!(
                    r#"
                    SELECT {SKID_COLUMNS}
                    FROM plan_skid s
                    JOIN plan_order o ON o.order_number = s.order_number AND o.dock_code = s.dock_code
                    WHERE o.route = ?1 AND o.supplier_code = ?2 AND o.planned_pickup = ?3
                    ORDER BY s.order_number, s.skid_id
                    "#
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(
                        params![
                            route_key.route.trim(),
                            route_key.supplier_code.trim(),
                            fmt_ts(&route_key.pickup),
                        ],
                        map_skid_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            SkidPlanKey::Order {
                order_number,
                dock_code,
            } => {
                let sql = format!(
                    r#"
                    SELECT {SKID_COLUMNS}
                    FROM plan_skid s
                    JOIN plan_order o ON o.order_number = s.order_number AND o.dock_code = s.dock_code
                    WHERE s.order_number = ?1 AND s.dock_code = ?2
                    ORDER BY s.skid_id
                    "#
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![order_number.trim(), dock_code.trim()], map_skid_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };

        Ok(rows)
    }

    fn get_order(
        &self,
        order_number: &str,
        dock_code: &str,
    ) -> RepositoryResult<Option<OrderSummary>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM plan_order o
            LEFT JOIN order_progress p ON p.order_number = o.order_number AND p.dock_code = o.dock_code
            WHERE o.order_number = ?1 AND o.dock_code = ?2
            "#
        );

        match conn.query_row(&sql, params![order_number.trim(), dock_code.trim()], map_order_row) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_orders(&self) -> RepositoryResult<Vec<OrderSummary>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM plan_order o
            LEFT JOIN order_progress p ON p.order_number = o.order_number AND p.dock_code = o.dock_code
            ORDER BY o.planned_pickup, o.order_number
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let orders = stmt
            .query_map([], map_order_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orders)
    }
}

fn map_item_row(row: &Row) -> rusqlite::Result<PlannedItem> {
    Ok(PlannedItem {
        item_id: row.get(0)?,
        order_number: row.get(1)?,
        dock_code: row.get(2)?,
        part_number: row.get(3)?,
        kanban_number: row.get(4)?,
        quantity_per_box: row.get(5)?,
        total_boxes: row.get(6)?,
        palletization_code: row.get(7)?,
        manifest_number: row.get(8)?,
    })
}

fn map_skid_row(row: &Row) -> rusqlite::Result<PlannedSkid> {
    let raw_skid: String = row.get(3)?;
    let skid_id = SkidId::parse(&raw_skid).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let skid_cut: i64 = row.get(6)?;

    Ok(PlannedSkid {
        planned_skid_id: row.get(0)?,
        order_number: row.get(1)?,
        dock_code: row.get(2)?,
        skid_id,
        palletization_code: row.get(4)?,
        route: row.get(5)?,
        skid_cut: skid_cut != 0,
        manifest_number: row.get(7)?,
    })
}

fn map_order_row(row: &Row) -> rusqlite::Result<OrderSummary> {
    let pickup: String = row.get(5)?;
    Ok(OrderSummary {
        order_number: row.get(0)?,
        dock_code: row.get(1)?,
        plant_code: row.get(2)?,
        supplier_code: row.get(3)?,
        route: row.get(4)?,
        planned_pickup: parse_ts(&pickup)?,
        build_completed_at: parse_opt_ts(row.get(6)?)?,
        load_completed_at: parse_opt_ts(row.get(7)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::plan::RouteKey;
    use crate::domain::types::SkidSide;
    use chrono::NaiveDate;

    fn setup() -> PlanRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        PlanRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn order(order_number: &str) -> OrderSummary {
        OrderSummary {
            order_number: order_number.to_string(),
            dock_code: "D1".to_string(),
            plant_code: "PLNT1".to_string(),
            supplier_code: "SUP01".to_string(),
            route: "RT1001".to_string(),
            planned_pickup: NaiveDate::from_ymd_opt(2026, 10, 16)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap(),
            build_completed_at: None,
            load_completed_at: None,
        }
    }

    #[test]
    fn test_order_and_items() {
        let repo = setup();
        repo.upsert_order(&order("O1")).unwrap();
        repo.insert_item(&PlannedItem {
            item_id: "I1".to_string(),
            order_number: "O1".to_string(),
            dock_code: "D1".to_string(),
            part_number: "PN-100".to_string(),
            kanban_number: "K001".to_string(),
            quantity_per_box: 24,
            total_boxes: 5,
            palletization_code: "P1".to_string(),
            manifest_number: "MF000001".to_string(),
        })
        .unwrap();

        let found = repo.get_order("O1", "D1").unwrap().unwrap();
        assert_eq!(found.route, "RT1001");
        assert!(!found.is_build_complete());
        assert!(repo.get_order("O1", "D9").unwrap().is_none());

        let items = repo.get_planned_items(" O1 ", "D1").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].total_boxes, 5);
    }

    #[test]
    fn test_skids_by_route_and_order() {
        let repo = setup();
        repo.upsert_order(&order("O1")).unwrap();
        repo.upsert_order(&order("O2")).unwrap();
        for (id, order_number, skid) in [("S1", "O1", "001A"), ("S2", "O2", "001B")] {
            repo.insert_skid(&PlannedSkid {
                planned_skid_id: id.to_string(),
                order_number: order_number.to_string(),
                dock_code: "D1".to_string(),
                skid_id: SkidId::parse(skid).unwrap(),
                palletization_code: "P1".to_string(),
                route: String::new(),
                skid_cut: false,
                manifest_number: "MF000001".to_string(),
            })
            .unwrap();
        }

        let o = order("O1");
        let by_route = repo
            .get_planned_skids(&SkidPlanKey::Route(RouteKey {
                route: o.route.clone(),
                supplier_code: o.supplier_code.clone(),
                pickup: o.planned_pickup,
            }))
            .unwrap();
        assert_eq!(by_route.len(), 2);
        assert_eq!(by_route[0].route, "RT1001");

        let by_order = repo
            .get_planned_skids(&SkidPlanKey::Order {
                order_number: "O2".to_string(),
                dock_code: "D1".to_string(),
            })
            .unwrap();
        assert_eq!(by_order.len(), 1);
        assert_eq!(by_order[0].skid_id.side, SkidSide::B);
    }
}
