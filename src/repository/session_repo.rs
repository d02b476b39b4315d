// ==========================================
// 出货扫描会话引擎 - 会话仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 并发: "每锚点一个 ACTIVE 会话"由部分唯一索引保证,
//       冲突以 UniqueConstraintViolation 返回, 由编排器重新读取胜出者
// ==========================================

use crate::db::{fmt_ts, parse_opt_ts, parse_ts};
use crate::domain::session::{ScanSession, SessionAnchor, TrailerInfo};
use crate::domain::types::{SessionStatus, Stage, WorkflowKind};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::order_progress_repo::stamp_stage;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex};

const SESSION_COLUMNS: &str = r#"
    session_id, workflow_kind, anchor_json, status, operator_id,
    created_at, completed_at, confirmation_number, trailer_json, submitting_since
"#;

pub struct SessionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SessionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入新会话
    ///
    /// # 返回
    /// - Err(UniqueConstraintViolation): 该锚点已有 ACTIVE 会话
    pub fn insert(&self, session: &ScanSession) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let anchor_json = serde_json::to_string(&session.anchor)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;
        let trailer_json = session
            .trailer
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO scan_session (
              session_id, workflow_kind, anchor_key, anchor_json, status, operator_id,
              created_at, updated_at, completed_at, confirmation_number, trailer_json, submitting_since
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, ?9, ?10, NULL)
            "#,
            params![
                session.session_id,
                session.workflow_kind.as_str(),
                session.anchor_key(),
                anchor_json,
                session.status.as_str(),
                session.operator_id,
                fmt_ts(&session.created_at),
                session.completed_at.as_ref().map(fmt_ts),
                session.confirmation_number,
                trailer_json,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, session_id: &str) -> RepositoryResult<Option<ScanSession>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {SESSION_COLUMNS} FROM scan_session WHERE session_id = ?1");
        let row = conn
            .query_row(&sql, params![session_id], map_session_row)
            .optional()?;
        Ok(row)
    }

    /// 查询锚点的 ACTIVE 会话
    pub fn find_active(
        &self,
        anchor: &SessionAnchor,
        kind: WorkflowKind,
    ) -> RepositoryResult<Option<ScanSession>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM scan_session \
             WHERE anchor_key = ?1 AND workflow_kind = ?2 AND status = 'ACTIVE'"
        );
        let row = conn
            .query_row(&sql, params![anchor.key(), kind.as_str()], map_session_row)
            .optional()?;
        Ok(row)
    }

    /// 按状态列出会话（最新在前）
    pub fn list_by_status(&self, status: SessionStatus) -> RepositoryResult<Vec<ScanSession>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM scan_session WHERE status = ?1 ORDER BY created_at DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![status.as_str()], map_session_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 更新车辆信息（仅 ACTIVE 会话）
    ///
    /// # 返回
    /// - Ok(true): 已更新
    /// - Ok(false): 会话不存在或非 ACTIVE
    pub fn update_trailer(
        &self,
        session_id: &str,
        trailer: &TrailerInfo,
        now: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let trailer_json = serde_json::to_string(trailer)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;
        let affected = conn.execute(
            r#"
            UPDATE scan_session SET trailer_json = ?2, updated_at = ?3
            WHERE session_id = ?1 AND status = 'ACTIVE'
            "#,
            params![session_id, trailer_json, fmt_ts(&now)],
        )?;
        Ok(affected == 1)
    }

    /// 抢占提交权
    ///
    /// 仅当会话 ACTIVE 且无人提交（或上一次提交早于 stale_before, 视为已失效）时成功。
    pub fn claim_submission(
        &self,
        session_id: &str,
        now: NaiveDateTime,
        stale_before: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE scan_session SET submitting_since = ?2, updated_at = ?2
            WHERE session_id = ?1 AND status = 'ACTIVE'
              AND (submitting_since IS NULL OR submitting_since < ?3)
            "#,
            params![session_id, fmt_ts(&now), fmt_ts(&stale_before)],
        )?;
        Ok(affected == 1)
    }

    /// 释放提交权（提交失败后会话保持 ACTIVE 可重试）
    pub fn release_submission(&self, session_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE scan_session SET submitting_since = NULL WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }

    /// ACTIVE → COMPLETED
    ///
    /// 同一事务内写入状态、确认号、完成时间与各订单阶段完成时间;
    /// 任一步失败整体回滚, 会话保持 ACTIVE。
    ///
    /// # 返回
    /// - Ok(false): 会话已非 ACTIVE
    pub fn mark_completed(
        &self,
        session_id: &str,
        confirmation_number: Option<&str>,
        stage: Stage,
        orders: &[(String, String)],
        now: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;

        let affected = tx.execute(
            r#"
            UPDATE scan_session
            SET status = 'COMPLETED', completed_at = ?2, confirmation_number = ?3,
                submitting_since = NULL, updated_at = ?2
            WHERE session_id = ?1 AND status = 'ACTIVE'
            "#,
            params![session_id, fmt_ts(&now), confirmation_number],
        )?;
        if affected != 1 {
            return Ok(false);
        }

        for (order_number, dock_code) in orders {
            stamp_stage(&tx, order_number, dock_code, stage, now)?;
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(true)
    }

    /// 仅记录承运商确认号（完成落库失败后的补记, 会话仍为 ACTIVE, 提交标记保留）
    pub fn record_confirmation(
        &self,
        session_id: &str,
        confirmation_number: &str,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE scan_session SET confirmation_number = ?2
            WHERE session_id = ?1 AND status = 'ACTIVE'
            "#,
            params![session_id, confirmation_number],
        )?;
        Ok(affected == 1)
    }

    /// ACTIVE → CANCELLED, 同一事务内丢弃会话内异常
    ///
    /// # 返回
    /// - Ok(Some(exceptions_removed))
    /// - Ok(None): 会话非 ACTIVE、正在提交或承运商已确认
    pub fn mark_cancelled(
        &self,
        session_id: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<Option<usize>> {
        let conn = self.get_conn()?;
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;

        let affected = tx.execute(
            r#"
            UPDATE scan_session
            SET status = 'CANCELLED', submitting_since = NULL, updated_at = ?2
            WHERE session_id = ?1 AND status = 'ACTIVE'
              AND submitting_since IS NULL AND confirmation_number IS NULL
            "#,
            params![session_id, fmt_ts(&now)],
        )?;
        if affected != 1 {
            return Ok(None);
        }

        let exceptions = tx.execute(
            "DELETE FROM scan_exception WHERE session_id = ?1",
            params![session_id],
        )?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(Some(exceptions))
    }

    /// 重新开始: 同一事务内清空扫描记录、会话内异常与车辆信息, 会话 ID 不变
    ///
    /// # 返回
    /// - Ok(Some((scans_removed, exceptions_removed)))
    /// - Ok(None): 会话非 ACTIVE、正在提交或承运商已确认
    pub fn restart(
        &self,
        session_id: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<Option<(usize, usize)>> {
        let conn = self.get_conn()?;
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;

        let active: Option<i64> = tx
            .query_row(
                r#"
                SELECT 1 FROM scan_session
                WHERE session_id = ?1 AND status = 'ACTIVE'
                  AND submitting_since IS NULL AND confirmation_number IS NULL
                "#,
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        if active.is_none() {
            return Ok(None);
        }

        let scans = tx.execute(
            "DELETE FROM scan_record WHERE session_id = ?1",
            params![session_id],
        )?;
        let exceptions = tx.execute(
            "DELETE FROM scan_exception WHERE session_id = ?1",
            params![session_id],
        )?;
        tx.execute(
            "UPDATE scan_session SET trailer_json = NULL, updated_at = ?2 WHERE session_id = ?1",
            params![session_id, fmt_ts(&now)],
        )?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(Some((scans, exceptions)))
    }
}

fn map_session_row(row: &Row) -> rusqlite::Result<ScanSession> {
    let kind_raw: String = row.get(1)?;
    let workflow_kind = WorkflowKind::parse(&kind_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown workflow_kind: {}", kind_raw).into(),
        )
    })?;

    let anchor_json: String = row.get(2)?;
    let anchor: SessionAnchor = serde_json::from_str(&anchor_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let status: String = row.get(3)?;
    let created_at: String = row.get(5)?;

    let trailer_json: Option<String> = row.get(8)?;
    let trailer = trailer_json
        .as_deref()
        .map(serde_json::from_str::<TrailerInfo>)
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ScanSession {
        session_id: row.get(0)?,
        workflow_kind,
        anchor,
        status: SessionStatus::parse(&status),
        operator_id: row.get(4)?,
        created_at: parse_ts(&created_at)?,
        completed_at: parse_opt_ts(row.get(6)?)?,
        confirmation_number: row.get(7)?,
        trailer,
        submitting_since: parse_opt_ts(row.get(9)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn setup() -> SessionRepository {
        setup_shared().0
    }

    fn setup_shared() -> (SessionRepository, Arc<Mutex<Connection>>) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        (SessionRepository::new(conn.clone()), conn)
    }

    fn insert_exception(conn: &Arc<Mutex<Connection>>, exception_id: &str, session_id: Option<&str>) {
        conn.lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO scan_exception (
                  exception_id, session_id, order_number, dock_code, code, skid_id,
                  comments, created_by, created_at
                ) VALUES (?1, ?2, 'O1', 'D1', '12', NULL, '', 'op1', '2026-10-16 08:00:00')
                "#,
                params![exception_id, session_id],
            )
            .unwrap();
    }

    fn exception_count(conn: &Arc<Mutex<Connection>>) -> i64 {
        conn.lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM scan_exception", [], |row| row.get(0))
            .unwrap()
    }

    fn make_session(id: &str, order: &str) -> ScanSession {
        let anchor = SessionAnchor::Build {
            order_number: order.to_string(),
            dock_code: "D1".to_string(),
        };
        ScanSession {
            session_id: id.to_string(),
            workflow_kind: anchor.kind(),
            anchor,
            status: SessionStatus::Active,
            operator_id: "op1".to_string(),
            created_at: Utc::now().naive_utc(),
            completed_at: None,
            confirmation_number: None,
            trailer: None,
            submitting_since: None,
        }
    }

    #[test]
    fn test_insert_and_find_active() {
        let repo = setup();
        let s = make_session("s1", "O1");
        repo.insert(&s).unwrap();

        let found = repo.find_active(&s.anchor, WorkflowKind::Build).unwrap().unwrap();
        assert_eq!(found.session_id, "s1");
        assert_eq!(found.anchor, s.anchor);
        assert!(repo.find_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_second_active_session_violates_unique_index() {
        let repo = setup();
        repo.insert(&make_session("s1", "O1")).unwrap();
        let err = repo.insert(&make_session("s2", "O1")).unwrap_err();
        assert!(err.is_unique_violation());

        // 完成后允许同一锚点再开新会话
        assert!(repo
            .mark_completed("s1", None, Stage::Build, &[], Utc::now().naive_utc())
            .unwrap());
        repo.insert(&make_session("s3", "O1")).unwrap();
    }

    #[test]
    fn test_claim_submission_blocks_second_claim() {
        let repo = setup();
        repo.insert(&make_session("s1", "O1")).unwrap();
        let now = Utc::now().naive_utc();
        let stale = now - Duration::seconds(300);

        assert!(repo.claim_submission("s1", now, stale).unwrap());
        assert!(!repo.claim_submission("s1", now, stale).unwrap());
        // 超过失效时间后可被接管
        assert!(repo
            .claim_submission("s1", now + Duration::seconds(400), now + Duration::seconds(1))
            .unwrap());

        repo.release_submission("s1").unwrap();
        assert!(repo.claim_submission("s1", now, stale).unwrap());
    }

    #[test]
    fn test_terminal_session_rejects_updates() {
        let repo = setup();
        repo.insert(&make_session("s1", "O1")).unwrap();
        let now = Utc::now().naive_utc();
        assert_eq!(repo.mark_cancelled("s1", now).unwrap(), Some(0));

        assert!(!repo.update_trailer("s1", &TrailerInfo::default(), now).unwrap());
        assert!(!repo
            .mark_completed("s1", Some("C1"), Stage::Build, &[], now)
            .unwrap());
        assert!(repo.mark_cancelled("s1", now).unwrap().is_none());
        assert!(repo.restart("s1", now).unwrap().is_none());

        let s = repo.find_by_id("s1").unwrap().unwrap();
        assert_eq!(s.status, SessionStatus::Cancelled);
    }

    #[test]
    fn test_cancel_discards_session_exceptions_only() {
        let (repo, conn) = setup_shared();
        repo.insert(&make_session("s1", "O1")).unwrap();
        insert_exception(&conn, "EX-1", Some("s1"));
        insert_exception(&conn, "EX-2", Some("s1"));
        insert_exception(&conn, "EX-3", None);

        let now = Utc::now().naive_utc();
        assert_eq!(repo.mark_cancelled("s1", now).unwrap(), Some(2));
        // 订单级异常不属于会话
        assert_eq!(exception_count(&conn), 1);
    }

    #[test]
    fn test_cancel_refused_while_submitting_keeps_exceptions() {
        let (repo, conn) = setup_shared();
        repo.insert(&make_session("s1", "O1")).unwrap();
        insert_exception(&conn, "EX-1", Some("s1"));
        let now = Utc::now().naive_utc();
        assert!(repo.claim_submission("s1", now, now - Duration::seconds(300)).unwrap());

        assert!(repo.mark_cancelled("s1", now).unwrap().is_none());
        assert_eq!(exception_count(&conn), 1);
        assert_eq!(repo.find_by_id("s1").unwrap().unwrap().status, SessionStatus::Active);
    }

    #[test]
    fn test_completion_rolls_back_when_stamp_fails() {
        let (repo, conn) = setup_shared();
        repo.insert(&make_session("s1", "O1")).unwrap();
        let now = Utc::now().naive_utc();
        assert!(repo.claim_submission("s1", now, now - Duration::seconds(300)).unwrap());
        conn.lock().unwrap().execute("DROP TABLE order_progress", []).unwrap();

        let orders = vec![("O1".to_string(), "D1".to_string())];
        assert!(repo
            .mark_completed("s1", Some("C1"), Stage::Load, &orders, now)
            .is_err());

        let s = repo.find_by_id("s1").unwrap().unwrap();
        assert_eq!(s.status, SessionStatus::Active);
        assert!(s.confirmation_number.is_none());
        assert!(s.submitting_since.is_some());

        // 补记确认号后会话拒绝重新开始与取消
        assert!(repo.record_confirmation("s1", "C1").unwrap());
        repo.release_submission("s1").unwrap();
        assert!(repo.restart("s1", now).unwrap().is_none());
        assert!(repo.mark_cancelled("s1", now).unwrap().is_none());
        assert_eq!(
            repo.find_by_id("s1").unwrap().unwrap().confirmation_number.as_deref(),
            Some("C1")
        );
    }
}
