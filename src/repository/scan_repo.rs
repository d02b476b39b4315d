// ==========================================
// 出货扫描会话引擎 - 扫描记录仓储
// ==========================================
// 并发: UNIQUE(session_id, target_id, box_key, entry_seq) 是同箱重复扫描的最终裁决;
//       插入语句同时要求会话 ACTIVE、未在提交且承运商未确认
// ==========================================

use crate::db::{fmt_ts, parse_ts};
use crate::domain::scan::ScanRecord;
use crate::domain::types::SkidSide;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 条件插入结果
#[derive(Debug, Clone, PartialEq)]
pub enum ScanInsertOutcome {
    Inserted,
    /// 同一 entry_seq 已被并发写入占用
    Conflict,
    /// 会话已非 ACTIVE 或正在提交
    SessionFrozen,
}

const SCAN_COLUMNS: &str = r#"
    scan_id, session_id, target_id, box_key, entry_seq, order_number, dock_code,
    skid_number, skid_side, box_number, palletization_code, internal_kanban,
    scanned_at, operator_id
"#;

pub struct ScanRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScanRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 条件插入扫描记录
    ///
    /// # 返回
    /// - Inserted: 写入成功
    /// - Conflict: 唯一键冲突（并发重复扫描）
    /// - SessionFrozen: 会话不可写
    pub fn insert_if_session_open(&self, scan: &ScanRecord) -> RepositoryResult<ScanInsertOutcome> {
        let conn = self.get_conn()?;
        let result = conn.execute(
            r#"
            INSERT INTO scan_record (
              scan_id, session_id, target_id, box_key, entry_seq, order_number, dock_code,
              skid_number, skid_side, box_number, palletization_code, internal_kanban,
              scanned_at, operator_id
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14
            WHERE EXISTS (
              SELECT 1 FROM scan_session
              WHERE session_id = ?2 AND status = 'ACTIVE'
                AND submitting_since IS NULL AND confirmation_number IS NULL
            )
            "#,
            params![
                scan.scan_id,
                scan.session_id,
                scan.target_id,
                scan.box_key,
                scan.entry_seq,
                scan.order_number,
                scan.dock_code,
                scan.skid_number,
                scan.skid_side.as_str(),
                scan.box_number,
                scan.palletization_code,
                scan.internal_kanban,
                fmt_ts(&scan.scanned_at),
                scan.operator_id,
            ],
        );

        match result {
            Ok(1) => Ok(ScanInsertOutcome::Inserted),
            Ok(_) => Ok(ScanInsertOutcome::SessionFrozen),
            Err(e) => match RepositoryError::from(e) {
                RepositoryError::UniqueConstraintViolation(_) => Ok(ScanInsertOutcome::Conflict),
                other => Err(other),
            },
        }
    }

    /// 会话内全部扫描记录（按时间顺序）
    pub fn list_by_session(&self, session_id: &str) -> RepositoryResult<Vec<ScanRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {SCAN_COLUMNS} FROM scan_record WHERE session_id = ?1 ORDER BY scanned_at, entry_seq"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![session_id], map_scan_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 各目标已扫描数（按不同箱号计, 重入不重复计数）
    pub fn scanned_counts(&self, session_id: &str) -> RepositoryResult<HashMap<String, u32>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT target_id, COUNT(DISTINCT box_key) FROM scan_record
            WHERE session_id = ?1
            GROUP BY target_id
            "#,
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (target, count) = row?;
            counts.insert(target, count);
        }
        Ok(counts)
    }
}

fn map_scan_row(row: &Row) -> rusqlite::Result<ScanRecord> {
    let side_raw: String = row.get(8)?;
    let skid_side = SkidSide::parse(&side_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            rusqlite::types::Type::Text,
            format!("unknown skid_side: {}", side_raw).into(),
        )
    })?;
    let scanned_at: String = row.get(12)?;

    Ok(ScanRecord {
        scan_id: row.get(0)?,
        session_id: row.get(1)?,
        target_id: row.get(2)?,
        box_key: row.get(3)?,
        entry_seq: row.get(4)?,
        order_number: row.get(5)?,
        dock_code: row.get(6)?,
        skid_number: row.get(7)?,
        skid_side,
        box_number: row.get(9)?,
        palletization_code: row.get(10)?,
        internal_kanban: row.get(11)?,
        scanned_at: parse_ts(&scanned_at)?,
        operator_id: row.get(13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::{ScanSession, SessionAnchor};
    use crate::domain::types::SessionStatus;
    use crate::repository::session_repo::SessionRepository;
    use chrono::Utc;

    fn setup() -> (SessionRepository, ScanRepository) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let sessions = SessionRepository::new(conn.clone());
        let anchor = SessionAnchor::Build {
            order_number: "O1".to_string(),
            dock_code: "D1".to_string(),
        };
        sessions
            .insert(&ScanSession {
                session_id: "s1".to_string(),
                workflow_kind: anchor.kind(),
                anchor,
                status: SessionStatus::Active,
                operator_id: "op1".to_string(),
                created_at: Utc::now().naive_utc(),
                completed_at: None,
                confirmation_number: None,
                trailer: None,
                submitting_since: None,
            })
            .unwrap();

        (sessions, ScanRepository::new(conn))
    }

    fn make_scan(scan_id: &str, box_number: u32, entry_seq: u32) -> ScanRecord {
        ScanRecord {
            scan_id: scan_id.to_string(),
            session_id: "s1".to_string(),
            target_id: "I1".to_string(),
            box_key: box_number,
            entry_seq,
            order_number: "O1".to_string(),
            dock_code: "D1".to_string(),
            skid_number: 1,
            skid_side: SkidSide::A,
            box_number: Some(box_number),
            palletization_code: "P1".to_string(),
            internal_kanban: None,
            scanned_at: Utc::now().naive_utc(),
            operator_id: "op1".to_string(),
        }
    }

    #[test]
    fn test_duplicate_entry_seq_conflicts() {
        let (_sessions, repo) = setup();
        assert_eq!(
            repo.insert_if_session_open(&make_scan("a", 1, 0)).unwrap(),
            ScanInsertOutcome::Inserted
        );
        assert_eq!(
            repo.insert_if_session_open(&make_scan("b", 1, 0)).unwrap(),
            ScanInsertOutcome::Conflict
        );
        assert_eq!(repo.list_by_session("s1").unwrap().len(), 1);
    }

    #[test]
    fn test_reentry_counts_once() {
        let (_sessions, repo) = setup();
        repo.insert_if_session_open(&make_scan("a", 1, 0)).unwrap();
        repo.insert_if_session_open(&make_scan("b", 1, 1)).unwrap();
        repo.insert_if_session_open(&make_scan("c", 2, 0)).unwrap();

        let counts = repo.scanned_counts("s1").unwrap();
        assert_eq!(counts.get("I1"), Some(&2));
        assert_eq!(repo.list_by_session("s1").unwrap().len(), 3);
    }

    #[test]
    fn test_frozen_session_rejects_insert() {
        let (sessions, repo) = setup();
        let now = Utc::now().naive_utc();
        assert!(sessions
            .claim_submission("s1", now, now - chrono::Duration::seconds(60))
            .unwrap());
        assert_eq!(
            repo.insert_if_session_open(&make_scan("a", 1, 0)).unwrap(),
            ScanInsertOutcome::SessionFrozen
        );
    }
}
