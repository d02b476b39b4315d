// ==========================================
// 出货扫描会话引擎 - 承运商接口错误
// ==========================================
// 说明: 任何承运商错误都不改变会话状态（会话保持 ACTIVE 可重试）
// ==========================================

use crate::domain::carrier::CarrierFieldError;
use thiserror::Error;

/// 错误响应体截断长度
pub const MAX_ERROR_BODY_LENGTH: usize = 200;

#[derive(Error, Debug, Clone)]
pub enum CarrierError {
    #[error("承运商接口超时: {0}")]
    Timeout(String),

    #[error("承运商接口网络错误: {0}")]
    Transport(String),

    #[error("承运商接口 HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("承运商拒绝提交 (HTTP {http_status}, status={status:?}): {message:?}")]
    Rejected {
        http_status: u16,
        status: Option<String>,
        message: Option<String>,
        errors: Vec<CarrierFieldError>,
    },

    #[error("承运商令牌获取失败: {0}")]
    Token(String),

    #[error("承运商接口未配置: {0}")]
    NotConfigured(String),
}

impl CarrierError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CarrierError::Timeout(_))
    }

    /// 字段级错误（仅 Rejected 携带）
    pub fn field_errors(&self) -> &[CarrierFieldError] {
        match self {
            CarrierError::Rejected { errors, .. } => errors,
            _ => &[],
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CarrierError::Timeout(err.to_string())
        } else {
            CarrierError::Transport(err.to_string())
        }
    }
}

/// 截断错误响应体, 避免日志被大段响应淹没
pub fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", head)
    } else {
        body.to_string()
    }
}

pub type CarrierResult<T> = Result<T, CarrierError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");
        let long = "x".repeat(500);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("... (truncated)"));
        assert_eq!(truncated.chars().filter(|c| *c == 'x').count(), MAX_ERROR_BODY_LENGTH);
    }
}
