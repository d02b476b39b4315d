// ==========================================
// 出货扫描会话引擎 - 异常仓储
// ==========================================
// 说明: 追加无条件（会话内异常要求会话 ACTIVE）; 删除为物理删除
// ==========================================

use crate::db::{fmt_ts, parse_ts};
use crate::domain::exception::ExceptionRecord;
use crate::domain::types::ExceptionCode;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const EXCEPTION_COLUMNS: &str = r#"
    exception_id, session_id, order_number, dock_code, code, skid_id,
    comments, created_by, created_at
"#;

pub struct ExceptionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ExceptionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入异常
    ///
    /// 会话内异常仅在会话 ACTIVE 时写入（条件插入）。
    ///
    /// # 返回
    /// - Ok(true): 已写入
    /// - Ok(false): 会话不可写
    /// - Err(UniqueConstraintViolation): exception_id 已存在
    pub fn insert(&self, record: &ExceptionRecord) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            INSERT INTO scan_exception (
              exception_id, session_id, order_number, dock_code, code, skid_id,
              comments, created_by, created_at
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9
            WHERE ?2 IS NULL OR EXISTS (
              SELECT 1 FROM scan_session
              WHERE session_id = ?2 AND status = 'ACTIVE' AND confirmation_number IS NULL
            )
            "#,
            params![
                record.exception_id,
                record.session_id,
                record.order_number,
                record.dock_code,
                record.code.code(),
                record.skid_id,
                record.comments,
                record.created_by,
                fmt_ts(&record.created_at),
            ],
        )?;
        Ok(affected == 1)
    }

    pub fn find_by_id(&self, exception_id: &str) -> RepositoryResult<Option<ExceptionRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {EXCEPTION_COLUMNS} FROM scan_exception WHERE exception_id = ?1");
        let row = conn
            .query_row(&sql, params![exception_id], map_exception_row)
            .optional()?;
        Ok(row)
    }

    /// 删除异常（不存在时返回 false）
    pub fn delete(&self, exception_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM scan_exception WHERE exception_id = ?1",
            params![exception_id],
        )?;
        Ok(affected == 1)
    }

    pub fn list_by_session(&self, session_id: &str) -> RepositoryResult<Vec<ExceptionRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {EXCEPTION_COLUMNS} FROM scan_exception WHERE session_id = ?1 ORDER BY created_at, exception_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![session_id], map_exception_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 订单上的全部异常（跨会话, 含无会话的订单级异常）
    pub fn list_by_order(
        &self,
        order_number: &str,
        dock_code: &str,
    ) -> RepositoryResult<Vec<ExceptionRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {EXCEPTION_COLUMNS} FROM scan_exception \
             WHERE order_number = ?1 AND (dock_code IS NULL OR dock_code = ?2) \
             ORDER BY created_at, exception_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![order_number.trim(), dock_code.trim()], map_exception_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 所有带订单号的异常（月台看板批量计算使用）
    pub fn list_order_scoped(&self) -> RepositoryResult<Vec<ExceptionRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {EXCEPTION_COLUMNS} FROM scan_exception WHERE order_number IS NOT NULL"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_exception_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn map_exception_row(row: &Row) -> rusqlite::Result<ExceptionRecord> {
    let code_raw: String = row.get(4)?;
    let code = ExceptionCode::parse(&code_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown exception code: {}", code_raw).into(),
        )
    })?;
    let created_at: String = row.get(8)?;

    Ok(ExceptionRecord {
        exception_id: row.get(0)?,
        session_id: row.get(1)?,
        order_number: row.get(2)?,
        dock_code: row.get(3)?,
        code,
        skid_id: row.get(5)?,
        comments: row.get(6)?,
        created_by: row.get(7)?,
        created_at: parse_ts(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn setup() -> ExceptionRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ExceptionRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn order_exception(id: &str, code: ExceptionCode) -> ExceptionRecord {
        ExceptionRecord {
            exception_id: id.to_string(),
            session_id: None,
            order_number: Some("O1".to_string()),
            dock_code: Some("D1".to_string()),
            code,
            skid_id: None,
            comments: "short 2 boxes".to_string(),
            created_by: "op1".to_string(),
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_multiple_codes_on_one_order() {
        let repo = setup();
        assert!(repo.insert(&order_exception("e1", ExceptionCode::RevisedQuantity)).unwrap());
        assert!(repo.insert(&order_exception("e2", ExceptionCode::ShortShipment)).unwrap());
        assert!(repo.insert(&order_exception("e3", ExceptionCode::ShortShipment)).unwrap());

        let list = repo.list_by_order("O1", "D1").unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(repo.list_order_scoped().unwrap().len(), 3);
    }

    #[test]
    fn test_duplicate_id_is_unique_violation() {
        let repo = setup();
        repo.insert(&order_exception("e1", ExceptionCode::RevisedQuantity)).unwrap();
        let err = repo
            .insert(&order_exception("e1", ExceptionCode::RevisedQuantity))
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_delete() {
        let repo = setup();
        repo.insert(&order_exception("e1", ExceptionCode::NonStandardPackaging)).unwrap();
        assert!(repo.delete("e1").unwrap());
        assert!(!repo.delete("e1").unwrap());
        assert!(repo.find_by_id("e1").unwrap().is_none());
    }

    #[test]
    fn test_session_exception_requires_active_session() {
        let repo = setup();
        let mut record = order_exception("e1", ExceptionCode::ShortShipment);
        record.session_id = Some("missing-session".to_string());
        assert!(!repo.insert(&record).unwrap());
    }
}
