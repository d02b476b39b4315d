// ==========================================
// 出货扫描会话引擎 - 配置快照
// ==========================================
// 职责: 引擎与承运商客户端使用的不可变配置
// 说明: 由 API 层每次调用前读取一次, 作为参数传入引擎操作
// ==========================================

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 重复扫描窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DuplicateWindow {
    /// 同箱再次扫描一律视为重复
    Disallow,
    /// 首次扫描后 seconds 秒内允许重入（记录但不增加计数）
    AllowWithin { seconds: u32 },
}

impl DuplicateWindow {
    /// 解析配置文本: "DISALLOW" 或 "ALLOW_WITHIN:<seconds>"
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_uppercase();
        if raw == "DISALLOW" {
            return Some(DuplicateWindow::Disallow);
        }
        let seconds = raw.strip_prefix("ALLOW_WITHIN:")?.trim().parse::<u32>().ok()?;
        Some(DuplicateWindow::AllowWithin { seconds })
    }

    pub fn horizon(&self) -> Option<Duration> {
        match self {
            DuplicateWindow::Disallow => None,
            DuplicateWindow::AllowWithin { seconds } => Some(Duration::seconds(*seconds as i64)),
        }
    }
}

impl Default for DuplicateWindow {
    fn default() -> Self {
        DuplicateWindow::Disallow
    }
}

impl fmt::Display for DuplicateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateWindow::Disallow => f.write_str("DISALLOW"),
            DuplicateWindow::AllowWithin { seconds } => write!(f, "ALLOW_WITHIN:{}", seconds),
        }
    }
}

// ==========================================
// EngineSettings - 引擎配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub duplicate_window: DuplicateWindow,
    pub check_palletization: bool,
    pub behind_threshold_minutes: i64,
    pub critical_threshold_minutes: i64,
    /// 组托阶段计划时间 = 提货时间 - build_lead_minutes
    pub build_lead_minutes: i64,
    pub max_comment_length: usize,
    /// 提交占用超过该时长视为失效, 可被接管
    pub submission_stale_after_secs: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            duplicate_window: DuplicateWindow::Disallow,
            check_palletization: true,
            behind_threshold_minutes: 15,
            critical_threshold_minutes: 30,
            build_lead_minutes: 120,
            max_comment_length: 200,
            submission_stale_after_secs: 300,
        }
    }
}

impl EngineSettings {
    pub fn build_lead(&self) -> Duration {
        Duration::minutes(self.build_lead_minutes)
    }

    pub fn submission_stale_after(&self) -> Duration {
        Duration::seconds(self.submission_stale_after_secs)
    }
}

// ==========================================
// CarrierSettings - 承运商接口配置
// ==========================================
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierSettings {
    pub token_url: String,
    pub submit_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// 令牌提前失效的余量
    pub token_expiry_skew_secs: i64,
}

impl Default for CarrierSettings {
    fn default() -> Self {
        Self {
            token_url: String::new(),
            submit_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            scope: None,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            token_expiry_skew_secs: 60,
        }
    }
}

impl CarrierSettings {
    pub fn is_configured(&self) -> bool {
        !self.token_url.trim().is_empty()
            && !self.submit_url.trim().is_empty()
            && !self.client_id.trim().is_empty()
    }
}

// client_secret 不进入日志
impl fmt::Debug for CarrierSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CarrierSettings")
            .field("token_url", &self.token_url)
            .field("submit_url", &self.submit_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("scope", &self.scope)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("token_expiry_skew_secs", &self.token_expiry_skew_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_window_parse() {
        assert_eq!(DuplicateWindow::parse("disallow"), Some(DuplicateWindow::Disallow));
        assert_eq!(
            DuplicateWindow::parse("ALLOW_WITHIN:90"),
            Some(DuplicateWindow::AllowWithin { seconds: 90 })
        );
        assert_eq!(DuplicateWindow::parse("ALLOW_WITHIN:x"), None);
        assert_eq!(
            DuplicateWindow::AllowWithin { seconds: 5 }.to_string(),
            "ALLOW_WITHIN:5"
        );
    }

    #[test]
    fn test_defaults() {
        let s = EngineSettings::default();
        assert_eq!(s.behind_threshold_minutes, 15);
        assert_eq!(s.critical_threshold_minutes, 30);
        assert_eq!(s.build_lead(), Duration::hours(2));
    }

    #[test]
    fn test_secret_not_in_debug() {
        let s = CarrierSettings {
            client_secret: "top-secret".to_string(),
            ..Default::default()
        };
        assert!(!format!("{:?}", s).contains("top-secret"));
    }
}
