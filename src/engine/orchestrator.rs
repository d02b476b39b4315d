// ==========================================
// 出货扫描会话引擎 - 会话编排器
// ==========================================
// 职责: 组合校验器/异常台账/承运商客户端, 对外提供会话操作
// 并发: 同锚点至多一个 ACTIVE 会话由存储唯一索引保证;
//       同一会话内扫描与完成通过进程内会话锁 + 存储提交标记串行化
// 红线: 承运商失败时会话保持 ACTIVE, 错误原样返回
// ==========================================

use crate::carrier::{CarrierError, CarrierGateway};
use crate::config::settings::EngineSettings;
use crate::domain::exception::{ExceptionRecord, NewException};
use crate::domain::plan::SkidPlanKey;
use crate::domain::scan::{ScanInput, ScanRecord, TargetProgress};
use crate::domain::session::{ScanSession, SessionAnchor, TrailerInfo};
use crate::domain::types::{SessionStatus, WorkflowKind};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::exception_ledger::ExceptionLedger;
use crate::engine::payload::PayloadAssembler;
use crate::engine::repositories::SessionRepositories;
use crate::engine::validator::{ScanIndex, ScanRejection, ScanValidator, ScannedOrderPlan};
use crate::engine::workflow::{policy_for, PlanSnapshot, WorkflowPolicy};
use crate::repository::{PlanReader, RepositoryError, ScanInsertOutcome};
use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 并发创建会话时重新读取的次数
const START_ATTEMPTS: usize = 3;

// ==========================================
// 操作结果
// ==========================================

/// 会话快照（会话 + 扫描 + 异常 + 各目标进度）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session: ScanSession,
    pub scans: Vec<ScanRecord>,
    pub exceptions: Vec<ExceptionRecord>,
    pub progress: Vec<TargetProgress>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub snapshot: SessionSnapshot,
    pub is_resumed: bool,
}

/// 扫描受理结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub record: ScanRecord,
    /// 被扫描目标的最新进度
    pub target: TargetProgress,
    pub targets_complete: usize,
    pub targets_total: usize,
}

impl ScanOutcome {
    pub fn is_reentry(&self) -> bool {
        self.record.is_reentry()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReceipt {
    pub session_id: String,
    pub confirmation_number: Option<String>,
    pub completed_at: NaiveDateTime,
    /// 已记录阶段完成的 (订单号, 月台)
    pub orders_stamped: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartSummary {
    pub scans_removed: usize,
    pub exceptions_removed: usize,
}

// ==========================================
// SessionOrchestrator
// ==========================================

pub struct SessionOrchestrator {
    repos: SessionRepositories,
    plans: Arc<dyn PlanReader>,
    carrier: Option<Arc<dyn CarrierGateway>>,
    ledger: ExceptionLedger,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionOrchestrator {
    /// 创建编排器
    ///
    /// # 参数
    /// - repos: 会话仓储集合
    /// - plans: 计划读取接口
    /// - carrier: 承运商网关（未配置时装车/出货前会话无法完成）
    pub fn new(
        repos: SessionRepositories,
        plans: Arc<dyn PlanReader>,
        carrier: Option<Arc<dyn CarrierGateway>>,
    ) -> Self {
        let ledger = ExceptionLedger::new(repos.exception_repo.clone());
        Self {
            repos,
            plans,
            carrier,
            ledger,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// 当前时间（整秒, 与落库精度一致）
    fn now() -> NaiveDateTime {
        Local::now().naive_local().trunc_subsecs(0)
    }

    /// 进程内会话锁（扫描与完成共用）
    fn session_lock(&self, session_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn forget_lock(&self, session_id: &str) {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.remove(session_id);
    }

    // ==========================================
    // 开始 / 恢复
    // ==========================================

    /// 开始或恢复会话
    ///
    /// 锚点已有 ACTIVE 会话时直接返回（is_resumed = true）;
    /// 并发创建时唯一索引冲突视为"会话已存在", 重新读取胜出者。
    #[instrument(skip(self, anchor), fields(anchor = %anchor.key()))]
    pub async fn start_or_resume(
        &self,
        kind: WorkflowKind,
        anchor: SessionAnchor,
        operator_id: &str,
    ) -> EngineResult<SessionStart> {
        if anchor.kind() != kind {
            return Err(EngineError::AnchorKindMismatch {
                expected: kind,
                actual: anchor.kind(),
            });
        }
        let policy = policy_for(kind);
        let plan = policy.load_plan(&anchor, self.plans.as_ref())?;

        for attempt in 0..START_ATTEMPTS {
            if let Some(existing) = self.repos.session_repo.find_active(&anchor, kind)? {
                info!(session_id = %existing.session_id, operator_id, "恢复已有会话");
                return Ok(SessionStart {
                    snapshot: self.build_snapshot(existing, &plan)?,
                    is_resumed: true,
                });
            }

            let session = ScanSession {
                session_id: Uuid::new_v4().to_string(),
                workflow_kind: kind,
                anchor: anchor.clone(),
                status: SessionStatus::Active,
                operator_id: operator_id.to_string(),
                created_at: Self::now(),
                completed_at: None,
                confirmation_number: None,
                trailer: None,
                submitting_since: None,
            };

            match self.repos.session_repo.insert(&session) {
                Ok(()) => {
                    info!(session_id = %session.session_id, operator_id, "新建会话");
                    return Ok(SessionStart {
                        snapshot: SessionSnapshot {
                            progress: plan.progress(&HashMap::new()),
                            session,
                            scans: Vec::new(),
                            exceptions: Vec::new(),
                        },
                        is_resumed: false,
                    });
                }
                Err(e) if e.is_unique_violation() => {
                    debug!(attempt, "并发创建冲突, 重新读取");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RepositoryError::UniqueConstraintViolation(format!(
            "无法获取锚点会话: {}",
            anchor.key()
        ))
        .into())
    }

    // ==========================================
    // 扫描
    // ==========================================

    /// 记录一次扫描
    ///
    /// 拒绝时不修改任何状态; 受理后返回目标的最新计数。
    #[instrument(skip(self, input, settings))]
    pub async fn record_scan(
        &self,
        session_id: &str,
        input: ScanInput,
        operator_id: &str,
        settings: &EngineSettings,
    ) -> EngineResult<ScanOutcome> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session = self.require_active(session_id, settings)?;
        let policy = policy_for(session.workflow_kind);
        let plan = policy.load_plan(&session.anchor, self.plans.as_ref())?;

        let existing = self.repos.scan_repo.list_by_session(session_id)?;
        let index = ScanIndex::from_records(&existing);
        let validator = ScanValidator::new(settings);
        let now = Self::now();

        let verdict = match &plan {
            PlanSnapshot::Items { items, .. } => {
                validator.validate_build(&session.anchor, items, &input, &index, now)
            }
            PlanSnapshot::Skids { .. } => {
                let scanned = self.scanned_order_plan(&input)?;
                validator.validate_skid(&session.anchor, &scanned, &input, &index, now)
            }
        };
        let verdict = match verdict {
            Ok(v) => v,
            Err(rejection) => {
                info!(rule = rejection.rule(), reason = %rejection, "扫描被拒绝");
                return Err(rejection.into());
            }
        };

        let manifest = input.manifest();
        let (box_number, internal_kanban, palletization) = match &input {
            ScanInput::Build { kanban, .. } => (
                Some(kanban.box_number),
                kanban.internal_kanban_value().map(str::to_string),
                kanban.palletization().to_string(),
            ),
            ScanInput::Skid { manifest } => (None, None, manifest.palletization().to_string()),
        };
        let record = ScanRecord {
            scan_id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            target_id: verdict.target_id.clone(),
            box_key: verdict.box_key,
            entry_seq: verdict.entry_seq,
            order_number: verdict.order_number.clone(),
            dock_code: verdict.dock_code.clone(),
            skid_number: manifest.skid_id.number,
            skid_side: manifest.skid_id.side,
            box_number,
            palletization_code: palletization,
            internal_kanban,
            scanned_at: now,
            operator_id: operator_id.to_string(),
        };

        match self.repos.scan_repo.insert_if_session_open(&record)? {
            ScanInsertOutcome::Inserted => {}
            ScanInsertOutcome::Conflict => {
                // 另一实例已写入同一箱
                let rejection = ScanRejection::DuplicateScan {
                    target: verdict.label,
                    box_number: verdict.box_key,
                };
                info!(rule = rejection.rule(), "并发重复扫描");
                return Err(rejection.into());
            }
            ScanInsertOutcome::SessionFrozen => return Err(self.state_error(session_id)?),
        }

        let counts = self.repos.scan_repo.scanned_counts(session_id)?;
        let progress = plan.progress(&counts);
        let targets_total = progress.len();
        let targets_complete = progress.iter().filter(|p| p.is_complete()).count();
        let target = progress
            .into_iter()
            .find(|p| p.target_id == record.target_id)
            .ok_or_else(|| {
                EngineError::from(RepositoryError::NotFound {
                    entity: "PlanTarget".to_string(),
                    id: record.target_id.clone(),
                })
            })?;

        info!(
            target = %target.label,
            box_key = record.box_key,
            entry_seq = record.entry_seq,
            scanned = target.scanned_count,
            planned = target.planned_count,
            "扫描已受理"
        );

        Ok(ScanOutcome {
            record,
            target,
            targets_complete,
            targets_total,
        })
    }

    /// 托盘扫描: 按条码上的订单读取计划（不限于会话快照, 以便识别线路不符）
    fn scanned_order_plan(&self, input: &ScanInput) -> EngineResult<ScannedOrderPlan> {
        let manifest = input.manifest();
        let order = self.plans.get_order(manifest.order(), manifest.dock())?;
        let skids = self.plans.get_planned_skids(&SkidPlanKey::Order {
            order_number: manifest.order().to_string(),
            dock_code: manifest.dock().to_string(),
        })?;
        Ok(ScannedOrderPlan { order, skids })
    }

    // ==========================================
    // 异常
    // ==========================================

    /// 登记异常（同 ID 重复登记返回已存储记录）
    #[instrument(skip(self, new, settings), fields(code = %new.code))]
    pub async fn add_exception(
        &self,
        new: NewException,
        settings: &EngineSettings,
    ) -> EngineResult<ExceptionRecord> {
        let record = ExceptionLedger::prepare(new, settings, Self::now())?;
        if let Some(session_id) = record.session_id.clone() {
            self.require_active(&session_id, settings)?;
            return match self.ledger.append(record)? {
                Some(stored) => Ok(stored),
                None => Err(self.state_error(&session_id)?),
            };
        }

        self.ledger.append(record)?.ok_or_else(|| {
            EngineError::InvalidException("异常未写入".to_string())
        })
    }

    /// 删除异常; 不存在返回 false
    #[instrument(skip(self, settings))]
    pub async fn remove_exception(
        &self,
        exception_id: &str,
        settings: &EngineSettings,
    ) -> EngineResult<bool> {
        let Some(existing) = self.ledger.find(exception_id)? else {
            return Ok(false);
        };
        if let Some(session_id) = &existing.session_id {
            self.require_active(session_id, settings)?;
        }
        self.ledger.remove(exception_id)
    }

    // ==========================================
    // 车辆信息
    // ==========================================

    #[instrument(skip(self, trailer, settings))]
    pub async fn update_trailer_info(
        &self,
        session_id: &str,
        trailer: TrailerInfo,
        settings: &EngineSettings,
    ) -> EngineResult<ScanSession> {
        self.require_active(session_id, settings)?;
        if !self
            .repos
            .session_repo
            .update_trailer(session_id, &trailer, Self::now())?
        {
            return Err(self.state_error(session_id)?);
        }
        info!(trailer_number = %trailer.trailer_number, "车辆信息已更新");
        self.load_session(session_id)
    }

    // ==========================================
    // 完成
    // ==========================================

    /// 完成会话
    ///
    /// 流程: 车辆信息 → 未完成目标 → 抢占提交权 → 承运商提交 → 落库
    /// 提交前任一步失败会话保持 ACTIVE 可重试。
    /// 承运商已确认但落库失败时保留确认号与提交标记, 再次调用只补记完成, 不重复提交。
    #[instrument(skip(self, settings))]
    pub async fn complete(
        &self,
        session_id: &str,
        operator_id: &str,
        settings: &EngineSettings,
    ) -> EngineResult<CompletionReceipt> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session = self.check_active(session_id, settings, true)?;
        let policy = policy_for(session.workflow_kind);
        let plan = policy.load_plan(&session.anchor, self.plans.as_ref())?;

        let (confirmation_number, orders) = match session.confirmation_number.clone() {
            Some(number) => {
                warn!(confirmation_number = %number, "承运商已确认, 补记完成状态");
                (Some(number), plan.order_keys())
            }
            None => self.claim_and_submit(&session, policy, &plan, settings).await?,
        };

        let completed_at = Self::now();
        let recorded = self.repos.session_repo.mark_completed(
            session_id,
            confirmation_number.as_deref(),
            policy.completion_stage(),
            &orders,
            completed_at,
        );
        match (recorded, &confirmation_number) {
            (Ok(true), _) => {}
            (Ok(false), _) => return Err(self.state_error(session_id)?),
            (Err(e), Some(number)) => {
                return Err(self.confirmation_not_recorded(session_id, number, e));
            }
            (Err(e), None) => {
                self.repos.session_repo.release_submission(session_id)?;
                return Err(e.into());
            }
        }
        self.forget_lock(session_id);

        info!(
            operator_id,
            confirmation_number = ?confirmation_number,
            orders = orders.len(),
            "会话已完成"
        );

        Ok(CompletionReceipt {
            session_id: session_id.to_string(),
            confirmation_number,
            completed_at,
            orders_stamped: orders,
        })
    }

    /// 校验可完成 → 抢占提交权 → 提交; 失败时释放提交权
    async fn claim_and_submit(
        &self,
        session: &ScanSession,
        policy: &dyn WorkflowPolicy,
        plan: &PlanSnapshot,
        settings: &EngineSettings,
    ) -> EngineResult<(Option<String>, Vec<(String, String)>)> {
        let session_id = session.session_id.as_str();
        let trailer = session.trailer.clone().unwrap_or_default();
        if policy.requires_trailer() {
            let missing = trailer.missing_fields();
            if !missing.is_empty() {
                return Err(EngineError::MissingTrailerInfo { fields: missing });
            }
        }

        let scans = self.repos.scan_repo.list_by_session(session_id)?;
        let counts = self.repos.scan_repo.scanned_counts(session_id)?;
        let progress = plan.progress(&counts);
        let exceptions = self
            .ledger
            .for_session_and_orders(session_id, &plan.order_keys())?;

        let outstanding = policy.outstanding(plan, &progress, &exceptions);
        if !outstanding.is_empty() {
            return Err(EngineError::IncompleteSession { outstanding });
        }

        let now = Self::now();
        let stale_before = now - settings.submission_stale_after();
        if !self
            .repos
            .session_repo
            .claim_submission(session_id, now, stale_before)?
        {
            return Err(self.state_error(session_id)?);
        }

        match self
            .submit(session, policy, &trailer, plan, &scans, &exceptions)
            .await
        {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!(error = %e, "提交失败, 会话保持活动状态");
                self.repos.session_repo.release_submission(session_id)?;
                Err(e)
            }
        }
    }

    /// 承运商已确认但落库失败: 记录确认号, 提交标记不释放
    fn confirmation_not_recorded(
        &self,
        session_id: &str,
        confirmation_number: &str,
        cause: RepositoryError,
    ) -> EngineError {
        error!(
            session_id,
            confirmation_number,
            error = %cause,
            "承运商已确认, 完成状态落库失败"
        );
        match self
            .repos
            .session_repo
            .record_confirmation(session_id, confirmation_number)
        {
            Ok(true) => {}
            Ok(false) => error!(session_id, confirmation_number, "会话已非活动, 确认号未补记"),
            Err(e) => error!(session_id, confirmation_number, error = %e, "确认号补记失败"),
        }
        EngineError::ConfirmationNotRecorded {
            session_id: session_id.to_string(),
            confirmation_number: confirmation_number.to_string(),
            detail: cause.to_string(),
        }
    }

    /// 提交承运商（组托不提交）, 返回确认号与需记录阶段完成的订单
    async fn submit(
        &self,
        session: &ScanSession,
        policy: &dyn WorkflowPolicy,
        trailer: &TrailerInfo,
        plan: &PlanSnapshot,
        scans: &[ScanRecord],
        exceptions: &[ExceptionRecord],
    ) -> EngineResult<(Option<String>, Vec<(String, String)>)> {
        if !policy.submits_to_carrier() {
            return Ok((None, plan.order_keys()));
        }

        let gateway = self.carrier.as_ref().ok_or_else(|| {
            CarrierError::NotConfigured("未配置承运商接口".to_string())
        })?;
        let shipment = PayloadAssembler::assemble(session, trailer, plan, scans, exceptions);
        let orders = shipment
            .orders
            .iter()
            .map(|o| (o.order.clone(), o.dock.clone()))
            .collect();

        debug!(orders = shipment.orders.len(), "提交承运商");
        let confirmation = gateway.submit(&shipment).await?;
        Ok((Some(confirmation.confirmation_number), orders))
    }

    // ==========================================
    // 重新开始 / 取消 / 查询
    // ==========================================

    /// 重新开始: 清空扫描、会话异常与车辆信息, 会话 ID 不变
    #[instrument(skip(self, settings))]
    pub async fn restart(
        &self,
        session_id: &str,
        settings: &EngineSettings,
    ) -> EngineResult<RestartSummary> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        self.require_active(session_id, settings)?;
        let Some((scans_removed, exceptions_removed)) =
            self.repos.session_repo.restart(session_id, Self::now())?
        else {
            return Err(self.state_error(session_id)?);
        };

        info!(scans_removed, exceptions_removed, "会话已重新开始");
        Ok(RestartSummary {
            scans_removed,
            exceptions_removed,
        })
    }

    #[instrument(skip(self, settings))]
    pub async fn cancel(
        &self,
        session_id: &str,
        operator_id: &str,
        settings: &EngineSettings,
    ) -> EngineResult<ScanSession> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        self.require_active(session_id, settings)?;
        let Some(exceptions_removed) = self
            .repos
            .session_repo
            .mark_cancelled(session_id, Self::now())?
        else {
            return Err(self.state_error(session_id)?);
        };
        self.forget_lock(session_id);

        info!(operator_id, exceptions_removed, "会话已取消");
        self.load_session(session_id)
    }

    pub fn get_session(&self, session_id: &str) -> EngineResult<SessionSnapshot> {
        let session = self.load_session(session_id)?;
        let plan = policy_for(session.workflow_kind).load_plan(&session.anchor, self.plans.as_ref())?;
        self.build_snapshot(session, &plan)
    }

    pub fn list_active_sessions(&self) -> EngineResult<Vec<ScanSession>> {
        Ok(self
            .repos
            .session_repo
            .list_by_status(SessionStatus::Active)?)
    }

    // ==========================================
    // 内部
    // ==========================================

    fn load_session(&self, session_id: &str) -> EngineResult<ScanSession> {
        self.repos
            .session_repo
            .find_by_id(session_id)?
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
    }

    fn build_snapshot(&self, session: ScanSession, plan: &PlanSnapshot) -> EngineResult<SessionSnapshot> {
        let scans = self.repos.scan_repo.list_by_session(&session.session_id)?;
        let counts = self.repos.scan_repo.scanned_counts(&session.session_id)?;
        let exceptions = self.ledger.for_session(&session.session_id)?;
        Ok(SessionSnapshot {
            progress: plan.progress(&counts),
            session,
            scans,
            exceptions,
        })
    }

    /// 读取 ACTIVE 会话; 提交标记过期时释放
    fn require_active(&self, session_id: &str, settings: &EngineSettings) -> EngineResult<ScanSession> {
        self.check_active(session_id, settings, false)
    }

    /// 承运商已确认的 ACTIVE 会话只允许补记完成（allow_confirmed）, 其余操作视为提交中
    fn check_active(
        &self,
        session_id: &str,
        settings: &EngineSettings,
        allow_confirmed: bool,
    ) -> EngineResult<ScanSession> {
        let mut session = self.load_session(session_id)?;
        if !session.is_active() {
            return Err(EngineError::SessionNotActive {
                session_id: session_id.to_string(),
                status: session.status,
            });
        }
        if session.confirmation_number.is_some() {
            return if allow_confirmed {
                Ok(session)
            } else {
                Err(EngineError::SubmissionInProgress(session_id.to_string()))
            };
        }
        if let Some(since) = session.submitting_since {
            if since >= Self::now() - settings.submission_stale_after() {
                return Err(EngineError::SubmissionInProgress(session_id.to_string()));
            }
            warn!(session_id, submitting_since = %since, "提交标记已过期, 释放");
            self.repos.session_repo.release_submission(session_id)?;
            session.submitting_since = None;
        }
        Ok(session)
    }

    /// 存储层守卫拒绝写入后, 重新读取会话给出具体状态错误
    fn state_error(&self, session_id: &str) -> EngineResult<EngineError> {
        let session = self.load_session(session_id)?;
        if !session.is_active() {
            return Ok(EngineError::SessionNotActive {
                session_id: session_id.to_string(),
                status: session.status,
            });
        }
        Ok(EngineError::SubmissionInProgress(session_id.to_string()))
    }
}
