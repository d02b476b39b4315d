// ==========================================
// 出货扫描会话引擎 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 + busy_timeout）
// - 幂等建表, 记录 schema_version
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 数据库时间文本格式
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置, 多实例并发写入时由 SQLite 排队
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 时间 → 数据库文本
pub fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// 数据库文本 → 时间
pub fn parse_ts(raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 可空时间列解析
pub fn parse_opt_ts(raw: Option<String>) -> rusqlite::Result<Option<NaiveDateTime>> {
    raw.as_deref().map(parse_ts).transpose()
}

/// 幂等建表
///
/// 计划表（plan_*）由上游导入流程写入, 此处仅保证存在;
/// 会话相关表由引擎独占。
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
          version INTEGER PRIMARY KEY,
          applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
          scope_id TEXT NOT NULL,
          key TEXT NOT NULL,
          value TEXT NOT NULL,
          updated_at TEXT NOT NULL DEFAULT (datetime('now')),
          PRIMARY KEY (scope_id, key)
        );

        -- ===== 计划数据（上游写入, 引擎只读） =====
        CREATE TABLE IF NOT EXISTS plan_order (
          order_number TEXT NOT NULL,
          dock_code TEXT NOT NULL,
          plant_code TEXT NOT NULL,
          supplier_code TEXT NOT NULL,
          route TEXT NOT NULL,
          planned_pickup TEXT NOT NULL,
          PRIMARY KEY (order_number, dock_code)
        );
        CREATE INDEX IF NOT EXISTS idx_plan_order_route
          ON plan_order(route, supplier_code, planned_pickup);

        CREATE TABLE IF NOT EXISTS plan_item (
          item_id TEXT PRIMARY KEY,
          order_number TEXT NOT NULL,
          dock_code TEXT NOT NULL,
          part_number TEXT NOT NULL,
          kanban_number TEXT NOT NULL,
          quantity_per_box INTEGER NOT NULL,
          total_boxes INTEGER NOT NULL,
          palletization_code TEXT NOT NULL,
          manifest_number TEXT NOT NULL,
          FOREIGN KEY (order_number, dock_code) REFERENCES plan_order(order_number, dock_code)
        );
        CREATE INDEX IF NOT EXISTS idx_plan_item_order ON plan_item(order_number, dock_code);

        CREATE TABLE IF NOT EXISTS plan_skid (
          planned_skid_id TEXT PRIMARY KEY,
          order_number TEXT NOT NULL,
          dock_code TEXT NOT NULL,
          skid_id TEXT NOT NULL,
          palletization_code TEXT NOT NULL,
          skid_cut INTEGER NOT NULL DEFAULT 0,
          manifest_number TEXT NOT NULL,
          FOREIGN KEY (order_number, dock_code) REFERENCES plan_order(order_number, dock_code),
          UNIQUE (order_number, dock_code, skid_id)
        );

        -- ===== 会话数据（引擎独占） =====
        CREATE TABLE IF NOT EXISTS scan_session (
          session_id TEXT PRIMARY KEY,
          workflow_kind TEXT NOT NULL CHECK(workflow_kind IN ('BUILD', 'LOAD', 'PRE_SHIPMENT')),
          anchor_key TEXT NOT NULL,
          anchor_json TEXT NOT NULL,
          status TEXT NOT NULL CHECK(status IN ('DRAFT', 'ACTIVE', 'COMPLETED', 'CANCELLED')),
          operator_id TEXT NOT NULL,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          completed_at TEXT,
          confirmation_number TEXT,
          trailer_json TEXT,
          submitting_since TEXT
        );
        -- 同一锚点同一作业至多一个 ACTIVE 会话
        CREATE UNIQUE INDEX IF NOT EXISTS ux_scan_session_active
          ON scan_session(anchor_key, workflow_kind) WHERE status = 'ACTIVE';

        CREATE TABLE IF NOT EXISTS scan_record (
          scan_id TEXT PRIMARY KEY,
          session_id TEXT NOT NULL REFERENCES scan_session(session_id),
          target_id TEXT NOT NULL,
          box_key INTEGER NOT NULL,
          entry_seq INTEGER NOT NULL DEFAULT 0,
          order_number TEXT NOT NULL,
          dock_code TEXT NOT NULL,
          skid_number INTEGER NOT NULL,
          skid_side TEXT NOT NULL,
          box_number INTEGER,
          palletization_code TEXT NOT NULL,
          internal_kanban TEXT,
          scanned_at TEXT NOT NULL,
          operator_id TEXT NOT NULL,
          UNIQUE (session_id, target_id, box_key, entry_seq)
        );
        CREATE INDEX IF NOT EXISTS idx_scan_record_session ON scan_record(session_id);

        CREATE TABLE IF NOT EXISTS scan_exception (
          exception_id TEXT PRIMARY KEY,
          session_id TEXT REFERENCES scan_session(session_id),
          order_number TEXT,
          dock_code TEXT,
          code TEXT NOT NULL CHECK(code IN ('10', '11', '12', '20')),
          skid_id TEXT,
          comments TEXT NOT NULL DEFAULT '',
          created_by TEXT NOT NULL,
          created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_scan_exception_order ON scan_exception(order_number, dock_code);
        CREATE INDEX IF NOT EXISTS idx_scan_exception_session ON scan_exception(session_id);

        CREATE TABLE IF NOT EXISTS order_progress (
          order_number TEXT NOT NULL,
          dock_code TEXT NOT NULL,
          build_completed_at TEXT,
          load_completed_at TEXT,
          PRIMARY KEY (order_number, dock_code)
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
