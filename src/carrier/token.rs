// ==========================================
// 出货扫描会话引擎 - 承运商访问令牌
// ==========================================
// 获取: client_credentials 表单交换
// 缓存: 进程内共享, 到期前 skew 秒视为失效
// 并发: 刷新期间持有异步锁, 同一时刻只有一个请求访问令牌端点
// ==========================================

use crate::carrier::error::{truncate_body, CarrierError, CarrierResult};
use crate::config::settings::CarrierSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 令牌端点未返回 expires_in 时的默认有效期
const DEFAULT_TOKEN_TTL_SECS: u64 = 300;

/// 令牌端点返回的访问令牌
#[derive(Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"***")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// 令牌来源
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> CarrierResult<AccessToken>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

// ==========================================
// ClientCredentialsTokenSource - 表单交换实现
// ==========================================
pub struct ClientCredentialsTokenSource {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: Option<String>,
}

impl ClientCredentialsTokenSource {
    pub fn new(client: Client, settings: &CarrierSettings) -> Self {
        Self {
            client,
            token_url: settings.token_url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            scope: settings.scope.clone(),
        }
    }
}

#[async_trait]
impl TokenSource for ClientCredentialsTokenSource {
    async fn fetch(&self) -> CarrierResult<AccessToken> {
        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "client_credentials"),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ];
        if let Some(scope) = self.scope.as_deref() {
            params.push(("scope", scope));
        }

        debug!(token_url = %self.token_url, "请求承运商访问令牌");

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CarrierError::Timeout(format!("token endpoint: {}", e))
                } else {
                    CarrierError::Token(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "承运商令牌端点返回错误");
            return Err(CarrierError::Token(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate_body(&body)
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Token(format!("令牌响应解析失败: {}", e)))?;

        if token.access_token.trim().is_empty() {
            return Err(CarrierError::Token("令牌为空".to_string()));
        }

        Ok(AccessToken {
            value: token.access_token,
            expires_in: token.expires_in,
        })
    }
}

// ==========================================
// TokenCache - 单飞刷新缓存
// ==========================================
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    skew: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>, skew_secs: i64) -> Self {
        Self {
            source,
            skew: Duration::from_secs(skew_secs.max(0) as u64),
            cached: Mutex::new(None),
        }
    }

    /// 取有效令牌（过期则刷新）
    pub async fn get(&self) -> CarrierResult<String> {
        let mut guard = self.cached.lock().await;

        if let Some(cached) = guard.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.value.clone());
            }
        }

        let token = self.source.fetch().await?;
        let ttl = Duration::from_secs(token.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS));
        let refresh_at = Instant::now() + ttl.saturating_sub(self.skew);
        info!(ttl_secs = ttl.as_secs(), "承运商访问令牌已刷新");

        *guard = Some(CachedToken {
            value: token.value.clone(),
            refresh_at,
        });
        Ok(token.value)
    }

    /// 作废令牌（仅当缓存仍是该令牌时, 避免清掉已刷新的新令牌）
    pub async fn invalidate(&self, token: &str) {
        let mut guard = self.cached.lock().await;
        if guard.as_ref().map_or(false, |c| c.value == token) {
            debug!("承运商访问令牌已作废");
            *guard = None;
        }
    }
}
