// ==========================================
// 出货扫描会话引擎 - 订单阶段进度仓储
// ==========================================
// 说明: 计划表对引擎只读, 组托/装车完成时间单独记录在 order_progress
// 幂等: 已有完成时间不被覆盖（首次完成时间为准）
// ==========================================

use crate::db::{fmt_ts, parse_opt_ts};
use crate::domain::types::Stage;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 订单阶段完成时间
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderProgress {
    pub build_completed_at: Option<NaiveDateTime>,
    pub load_completed_at: Option<NaiveDateTime>,
}

pub struct OrderProgressRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderProgressRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 记录阶段完成时间
    pub fn mark_stage_complete(
        &self,
        order_number: &str,
        dock_code: &str,
        stage: Stage,
        at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        stamp_stage(&conn, order_number, dock_code, stage, at)?;
        Ok(())
    }

    pub fn find(&self, order_number: &str, dock_code: &str) -> RepositoryResult<Option<OrderProgress>> {
        let conn = self.get_conn()?;
        let row: Option<(Option<String>, Option<String>)> = conn
            .query_row(
                r#"
                SELECT build_completed_at, load_completed_at FROM order_progress
                WHERE order_number = ?1 AND dock_code = ?2
                "#,
                params![order_number.trim(), dock_code.trim()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((build, load)) => Ok(Some(OrderProgress {
                build_completed_at: parse_opt_ts(build)?,
                load_completed_at: parse_opt_ts(load)?,
            })),
            None => Ok(None),
        }
    }
}

/// 写入阶段完成时间（可在调用方事务内执行）
pub(crate) fn stamp_stage(
    conn: &Connection,
    order_number: &str,
    dock_code: &str,
    stage: Stage,
    at: NaiveDateTime,
) -> rusqlite::Result<usize> {
    let sql = match stage {
        Stage::Build => {
            r#"
            INSERT INTO order_progress (order_number, dock_code, build_completed_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(order_number, dock_code) DO UPDATE SET
              build_completed_at = COALESCE(order_progress.build_completed_at, excluded.build_completed_at)
            "#
        }
        Stage::Load => {
            r#"
            INSERT INTO order_progress (order_number, dock_code, load_completed_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(order_number, dock_code) DO UPDATE SET
              load_completed_at = COALESCE(order_progress.load_completed_at, excluded.load_completed_at)
            "#
        }
    };
    conn.execute(sql, params![order_number.trim(), dock_code.trim(), fmt_ts(&at)])
}
