// ==========================================
// 出货扫描会话引擎 - 扫描会话 API
// ==========================================
// 职责: 接收手持终端原始条码, 解码后交给会话编排器
// 配置: 每次调用重新读取配置快照, 引擎内部不持有全局配置
// ==========================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, EngineSettings};
use crate::domain::exception::{ExceptionRecord, NewException};
use crate::domain::scan::ScanInput;
use crate::domain::session::{ScanSession, SessionAnchor, TrailerInfo};
use crate::domain::types::WorkflowKind;
use crate::barcode::decode_manifest;
use crate::engine::{
    CompletionReceipt, RestartSummary, ScanOutcome, SessionOrchestrator, SessionSnapshot,
    SessionStart,
};

pub struct SessionApi {
    orchestrator: Arc<SessionOrchestrator>,
    config_manager: Arc<ConfigManager>,
}

impl SessionApi {
    pub fn new(orchestrator: Arc<SessionOrchestrator>, config_manager: Arc<ConfigManager>) -> Self {
        Self {
            orchestrator,
            config_manager,
        }
    }

    /// 读取当前配置快照
    pub fn settings(&self) -> ApiResult<EngineSettings> {
        self.config_manager
            .load_engine_settings()
            .map_err(|e| ApiError::InternalError(format!("配置加载失败: {}", e)))
    }

    // ==========================================
    // 开始 / 恢复
    // ==========================================

    pub async fn start_or_resume(
        &self,
        kind: WorkflowKind,
        anchor: SessionAnchor,
        operator_id: &str,
    ) -> ApiResult<SessionStart> {
        Ok(self
            .orchestrator
            .start_or_resume(kind, anchor, operator_id)
            .await?)
    }

    /// 组托: 按订单 + 月台开始
    pub async fn start_build(
        &self,
        order_number: &str,
        dock_code: &str,
        operator_id: &str,
    ) -> ApiResult<SessionStart> {
        let anchor = SessionAnchor::Build {
            order_number: order_number.trim().to_string(),
            dock_code: dock_code.trim().to_string(),
        };
        self.start_or_resume(WorkflowKind::Build, anchor, operator_id)
            .await
    }

    /// 装车: 按线路 + 供应商 + 取货时间开始
    pub async fn start_load(
        &self,
        route: &str,
        supplier_code: &str,
        pickup: NaiveDateTime,
        operator_id: &str,
    ) -> ApiResult<SessionStart> {
        let anchor = SessionAnchor::Load {
            route: route.trim().to_string(),
            supplier_code: supplier_code.trim().to_string(),
            pickup,
        };
        self.start_or_resume(WorkflowKind::Load, anchor, operator_id)
            .await
    }

    /// 出货前核对: 以扫到的第一张 Manifest 派生锚点
    pub async fn start_pre_shipment(
        &self,
        manifest_raw: &str,
        operator_id: &str,
    ) -> ApiResult<SessionStart> {
        let manifest = decode_manifest(manifest_raw)?;
        let anchor = SessionAnchor::from_manifest(&manifest);
        self.start_or_resume(WorkflowKind::PreShipment, anchor, operator_id)
            .await
    }

    // ==========================================
    // 扫描
    // ==========================================

    /// 组托扫描（Manifest + Kanban）
    pub async fn scan_build(
        &self,
        session_id: &str,
        manifest_raw: &str,
        kanban_raw: &str,
        operator_id: &str,
    ) -> ApiResult<ScanOutcome> {
        let input = ScanInput::decode_build(manifest_raw, kanban_raw).map_err(|e| {
            info!(session_id, reason = e.reason(), field = ?e.field(), "条码解析失败");
            ApiError::from(e)
        })?;
        self.record_scan(session_id, input, operator_id).await
    }

    /// 托盘扫描（装车 / 出货前核对）
    pub async fn scan_skid(
        &self,
        session_id: &str,
        manifest_raw: &str,
        operator_id: &str,
    ) -> ApiResult<ScanOutcome> {
        let input = ScanInput::decode_skid(manifest_raw).map_err(|e| {
            info!(session_id, reason = e.reason(), field = ?e.field(), "条码解析失败");
            ApiError::from(e)
        })?;
        self.record_scan(session_id, input, operator_id).await
    }

    async fn record_scan(
        &self,
        session_id: &str,
        input: ScanInput,
        operator_id: &str,
    ) -> ApiResult<ScanOutcome> {
        let settings = self.settings()?;
        Ok(self
            .orchestrator
            .record_scan(session_id, input, operator_id, &settings)
            .await?)
    }

    // ==========================================
    // 异常 / 车辆信息
    // ==========================================

    pub async fn add_exception(&self, new: NewException) -> ApiResult<ExceptionRecord> {
        let settings = self.settings()?;
        Ok(self.orchestrator.add_exception(new, &settings).await?)
    }

    pub async fn remove_exception(&self, exception_id: &str) -> ApiResult<bool> {
        let settings = self.settings()?;
        Ok(self
            .orchestrator
            .remove_exception(exception_id, &settings)
            .await?)
    }

    pub async fn update_trailer_info(
        &self,
        session_id: &str,
        trailer: TrailerInfo,
    ) -> ApiResult<ScanSession> {
        let settings = self.settings()?;
        Ok(self
            .orchestrator
            .update_trailer_info(session_id, trailer, &settings)
            .await?)
    }

    // ==========================================
    // 生命周期
    // ==========================================

    pub async fn complete(&self, session_id: &str, operator_id: &str) -> ApiResult<CompletionReceipt> {
        let settings = self.settings()?;
        Ok(self
            .orchestrator
            .complete(session_id, operator_id, &settings)
            .await?)
    }

    pub async fn restart(&self, session_id: &str) -> ApiResult<RestartSummary> {
        let settings = self.settings()?;
        Ok(self.orchestrator.restart(session_id, &settings).await?)
    }

    pub async fn cancel(&self, session_id: &str, operator_id: &str) -> ApiResult<ScanSession> {
        let settings = self.settings()?;
        Ok(self
            .orchestrator
            .cancel(session_id, operator_id, &settings)
            .await?)
    }

    pub fn get_session(&self, session_id: &str) -> ApiResult<SessionSnapshot> {
        Ok(self.orchestrator.get_session(session_id)?)
    }

    pub fn list_active_sessions(&self) -> ApiResult<Vec<ScanSession>> {
        Ok(self.orchestrator.list_active_sessions()?)
    }
}
