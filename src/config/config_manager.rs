// ==========================================
// 出货扫描会话引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// 覆盖: DOCK_SCAN_CARRIER_CLIENT_SECRET 环境变量优先于库内密钥
// ==========================================

use crate::config::settings::{CarrierSettings, DuplicateWindow, EngineSettings};
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// 承运商密钥环境变量
pub const CLIENT_SECRET_ENV: &str = "DOCK_SCAN_CARRIER_CLIENT_SECRET";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    /// 解析数值配置, 格式错误时回退默认值并告警
    fn get_parsed_or<T: FromStr + Copy>(&self, key: &str, default: T) -> ConfigResult<T> {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    fn get_bool_or(&self, key: &str, default: bool) -> ConfigResult<bool> {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => {
                tracing::warn!(config_key = key, raw_value = %raw, "布尔配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 读取引擎配置快照
    pub fn load_engine_settings(&self) -> ConfigResult<EngineSettings> {
        let defaults = EngineSettings::default();

        let duplicate_window = match self.get_config_value(config_keys::DUPLICATE_WINDOW)? {
            Some(raw) => DuplicateWindow::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(
                    config_key = config_keys::DUPLICATE_WINDOW,
                    raw_value = %raw,
                    "重复扫描窗口配置格式错误，使用 DISALLOW"
                );
                DuplicateWindow::Disallow
            }),
            None => defaults.duplicate_window,
        };

        let settings = EngineSettings {
            duplicate_window,
            check_palletization: self
                .get_bool_or(config_keys::CHECK_PALLETIZATION, defaults.check_palletization)?,
            behind_threshold_minutes: self
                .get_parsed_or(config_keys::BEHIND_THRESHOLD_MINUTES, defaults.behind_threshold_minutes)?,
            critical_threshold_minutes: self.get_parsed_or(
                config_keys::CRITICAL_THRESHOLD_MINUTES,
                defaults.critical_threshold_minutes,
            )?,
            build_lead_minutes: self
                .get_parsed_or(config_keys::BUILD_LEAD_MINUTES, defaults.build_lead_minutes)?,
            max_comment_length: self
                .get_parsed_or(config_keys::MAX_COMMENT_LENGTH, defaults.max_comment_length)?,
            submission_stale_after_secs: self.get_parsed_or(
                config_keys::SUBMISSION_STALE_AFTER_SECS,
                defaults.submission_stale_after_secs,
            )?,
        };

        if settings.critical_threshold_minutes < settings.behind_threshold_minutes {
            tracing::warn!(
                behind = settings.behind_threshold_minutes,
                critical = settings.critical_threshold_minutes,
                "critical 阈值小于 behind 阈值"
            );
        }

        Ok(settings)
    }

    /// 读取承运商配置（环境变量中的密钥优先）
    pub fn load_carrier_settings(&self) -> ConfigResult<CarrierSettings> {
        let defaults = CarrierSettings::default();
        let text = |key: &str| -> ConfigResult<String> {
            Ok(self.get_config_value(key)?.unwrap_or_default().trim().to_string())
        };

        let client_secret = match std::env::var(CLIENT_SECRET_ENV) {
            Ok(v) if !v.trim().is_empty() => v,
            _ => text(config_keys::CARRIER_CLIENT_SECRET)?,
        };
        let scope = text(config_keys::CARRIER_SCOPE)?;

        Ok(CarrierSettings {
            token_url: text(config_keys::CARRIER_TOKEN_URL)?,
            submit_url: text(config_keys::CARRIER_SUBMIT_URL)?,
            client_id: text(config_keys::CARRIER_CLIENT_ID)?,
            client_secret,
            scope: if scope.is_empty() { None } else { Some(scope) },
            request_timeout_secs: self.get_parsed_or(
                config_keys::CARRIER_REQUEST_TIMEOUT_SECS,
                defaults.request_timeout_secs,
            )?,
            connect_timeout_secs: self.get_parsed_or(
                config_keys::CARRIER_CONNECT_TIMEOUT_SECS,
                defaults.connect_timeout_secs,
            )?,
            token_expiry_skew_secs: self.get_parsed_or(
                config_keys::CARRIER_TOKEN_EXPIRY_SKEW_SECS,
                defaults.token_expiry_skew_secs,
            )?,
        })
    }

    /// 获取所有配置的快照（JSON格式, 密钥脱敏）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            if key == config_keys::CARRIER_CLIENT_SECRET {
                config_map.insert(key, "***".to_string());
            } else {
                config_map.insert(key, value);
            }
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 扫描规则
    pub const DUPLICATE_WINDOW: &str = "scan.duplicate_window";
    pub const CHECK_PALLETIZATION: &str = "scan.check_palletization";
    pub const MAX_COMMENT_LENGTH: &str = "exception.max_comment_length";
    pub const SUBMISSION_STALE_AFTER_SECS: &str = "session.submission_stale_after_secs";

    // 月台看板
    pub const BEHIND_THRESHOLD_MINUTES: &str = "dock.behind_threshold_minutes";
    pub const CRITICAL_THRESHOLD_MINUTES: &str = "dock.critical_threshold_minutes";
    pub const BUILD_LEAD_MINUTES: &str = "dock.build_lead_minutes";

    // 承运商接口
    pub const CARRIER_TOKEN_URL: &str = "carrier.token_url";
    pub const CARRIER_SUBMIT_URL: &str = "carrier.submit_url";
    pub const CARRIER_CLIENT_ID: &str = "carrier.client_id";
    pub const CARRIER_CLIENT_SECRET: &str = "carrier.client_secret";
    pub const CARRIER_SCOPE: &str = "carrier.scope";
    pub const CARRIER_REQUEST_TIMEOUT_SECS: &str = "carrier.request_timeout_secs";
    pub const CARRIER_CONNECT_TIMEOUT_SECS: &str = "carrier.connect_timeout_secs";
    pub const CARRIER_TOKEN_EXPIRY_SKEW_SECS: &str = "carrier.token_expiry_skew_secs";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_empty() {
        let manager = setup();
        assert_eq!(manager.load_engine_settings().unwrap(), EngineSettings::default());
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let manager = setup();
        manager
            .set_global_config_value(config_keys::DUPLICATE_WINDOW, "ALLOW_WITHIN:30")
            .unwrap();
        manager
            .set_global_config_value(config_keys::BEHIND_THRESHOLD_MINUTES, "20")
            .unwrap();
        manager
            .set_global_config_value(config_keys::CRITICAL_THRESHOLD_MINUTES, "abc")
            .unwrap();
        manager
            .set_global_config_value(config_keys::CHECK_PALLETIZATION, "false")
            .unwrap();

        let settings = manager.load_engine_settings().unwrap();
        assert_eq!(settings.duplicate_window, DuplicateWindow::AllowWithin { seconds: 30 });
        assert_eq!(settings.behind_threshold_minutes, 20);
        assert_eq!(settings.critical_threshold_minutes, 30);
        assert!(!settings.check_palletization);
    }

    #[test]
    fn test_carrier_settings_and_masked_snapshot() {
        let manager = setup();
        manager
            .set_global_config_value(config_keys::CARRIER_TOKEN_URL, "https://auth.example/token")
            .unwrap();
        manager
            .set_global_config_value(config_keys::CARRIER_CLIENT_SECRET, "s3cret")
            .unwrap();

        let carrier = manager.load_carrier_settings().unwrap();
        assert_eq!(carrier.token_url, "https://auth.example/token");
        assert_eq!(carrier.scope, None);
        assert_eq!(carrier.request_timeout_secs, 30);

        let snapshot = manager.get_config_snapshot().unwrap();
        assert!(!snapshot.contains("s3cret"));
    }
}
