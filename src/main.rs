// ==========================================
// 出货扫描会话引擎 - 命令行入口
// ==========================================
// 用途: 输出指定数据库的月台状态看板（JSON）
// 用法: dock-scan [db_path]
//       未指定路径时使用 DOCK_SCAN_DB_PATH 或用户数据目录
// ==========================================

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use dock_scan::app::{get_default_db_path, AppState};
use dock_scan::logging;

fn main() -> Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", dock_scan::APP_NAME, dock_scan::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;
    let board = state
        .dock_status_api
        .board(Local::now().naive_local())
        .map_err(|e| anyhow!(e.operator_message()))
        .context("计算月台看板失败")?;

    println!("{}", serde_json::to_string_pretty(&board)?);
    Ok(())
}
