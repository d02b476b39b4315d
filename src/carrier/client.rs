// ==========================================
// 出货扫描会话引擎 - 承运商提交客户端
// ==========================================
// 协议: Bearer 令牌 + JSON POST, 单次同步提交
// 红线: 客户端内部不重试（重复提交可能造成重复发运）
// 401: 作废缓存令牌, 下一次提交重新获取
// ==========================================

use crate::carrier::error::{truncate_body, CarrierError, CarrierResult};
use crate::carrier::token::{ClientCredentialsTokenSource, TokenCache, TokenSource};
use crate::config::settings::CarrierSettings;
use crate::domain::carrier::{CarrierResponse, CarrierShipment};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// 承运商确认
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierConfirmation {
    pub confirmation_number: String,
    pub status: Option<String>,
    pub message: Option<String>,
}

/// 承运商提交接口（引擎只依赖该接口; 测试使用脚本化实现）
#[async_trait]
pub trait CarrierGateway: Send + Sync {
    async fn submit(&self, shipment: &CarrierShipment) -> CarrierResult<CarrierConfirmation>;
}

/// 创建带超时的 HTTP 客户端
pub fn create_http_client(settings: &CarrierSettings) -> CarrierResult<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()
        .map_err(|e| CarrierError::Transport(format!("HTTP 客户端创建失败: {}", e)))
}

// ==========================================
// HttpCarrierClient
// ==========================================
pub struct HttpCarrierClient {
    http: Client,
    submit_url: String,
    tokens: TokenCache,
}

impl HttpCarrierClient {
    /// 按配置创建（client_credentials 令牌）
    pub fn new(settings: &CarrierSettings) -> CarrierResult<Self> {
        if !settings.is_configured() {
            return Err(CarrierError::NotConfigured(
                "token_url / submit_url / client_id".to_string(),
            ));
        }
        let http = create_http_client(settings)?;
        let source = Arc::new(ClientCredentialsTokenSource::new(http.clone(), settings));
        Ok(Self::with_token_source(http, settings, source))
    }

    /// 指定令牌来源创建
    pub fn with_token_source(
        http: Client,
        settings: &CarrierSettings,
        source: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            http,
            submit_url: settings.submit_url.clone(),
            tokens: TokenCache::new(source, settings.token_expiry_skew_secs),
        }
    }
}

#[async_trait]
impl CarrierGateway for HttpCarrierClient {
    #[instrument(skip_all, fields(supplier = %shipment.supplier, route = %shipment.route, orders = shipment.orders.len()))]
    async fn submit(&self, shipment: &CarrierShipment) -> CarrierResult<CarrierConfirmation> {
        let token = self.tokens.get().await?;

        let response = self
            .http
            .post(&self.submit_url)
            .bearer_auth(&token)
            .json(shipment)
            .send()
            .await
            .map_err(CarrierError::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("承运商返回 401, 作废缓存令牌");
            self.tokens.invalidate(&token).await;
        }

        let body = response.text().await.map_err(CarrierError::from_reqwest)?;
        let result = interpret_response(status.as_u16(), &body);

        match &result {
            Ok(c) => info!(confirmation = %c.confirmation_number, "承运商已确认"),
            Err(e) => warn!(http_status = status.as_u16(), error = %e, "承运商提交失败"),
        }
        result
    }
}

/// 解析提交响应
///
/// - 2xx + 确认号非空 + 无字段错误 → 确认
/// - 可解析且携带 status/message/errors → Rejected
/// - 其余 → Http（响应体截断）
pub fn interpret_response(http_status: u16, body: &str) -> CarrierResult<CarrierConfirmation> {
    let success = (200..300).contains(&http_status);
    let parsed: Option<CarrierResponse> = serde_json::from_str(body).ok();

    if let Some(resp) = parsed {
        if success {
            if let Some(number) = resp.confirmation() {
                return Ok(CarrierConfirmation {
                    confirmation_number: number.to_string(),
                    status: resp.status.clone(),
                    message: resp.message.clone(),
                });
            }
        }

        let informative =
            resp.status.is_some() || resp.message.is_some() || !resp.errors.is_empty();
        if success || informative {
            return Err(CarrierError::Rejected {
                http_status,
                status: resp.status,
                message: resp.message,
                errors: resp.errors,
            });
        }
    }

    Err(CarrierError::Http {
        status: http_status,
        body: truncate_body(body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_success() {
        let body = r#"{"confirmationNumber":"CN-001","status":"ACCEPTED","message":"ok","errors":[]}"#;
        let c = interpret_response(200, body).unwrap();
        assert_eq!(c.confirmation_number, "CN-001");
        assert_eq!(c.status.as_deref(), Some("ACCEPTED"));
    }

    #[test]
    fn test_interpret_field_errors() {
        let body = r#"{"status":"REJECTED","message":"invalid","errors":[{"field":"sealNumber","message":"required","keyObject":null}]}"#;
        let err = interpret_response(400, body).unwrap_err();
        assert_eq!(err.field_errors().len(), 1);
        assert!(matches!(err, CarrierError::Rejected { http_status: 400, .. }));
    }

    #[test]
    fn test_interpret_success_without_confirmation_is_rejected() {
        let body = r#"{"confirmationNumber":"  ","errors":[]}"#;
        let err = interpret_response(200, body).unwrap_err();
        assert!(matches!(err, CarrierError::Rejected { http_status: 200, .. }));
    }

    #[test]
    fn test_interpret_unparseable() {
        let err = interpret_response(502, "<html>Bad Gateway</html>").unwrap_err();
        match err {
            CarrierError::Http { status, body } => {
                assert_eq!(status, 502);
                assert!(body.contains("Bad Gateway"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_new_requires_configuration() {
        let err = HttpCarrierClient::new(&CarrierSettings::default())
            .err()
            .unwrap();
        assert!(matches!(err, CarrierError::NotConfigured(_)));
    }
}
