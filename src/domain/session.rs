// ==========================================
// 出货扫描会话引擎 - 扫描会话实体
// ==========================================
// 不变量: 同一 (锚点, 作业类型) 至多一个 ACTIVE 会话
// ==========================================

use crate::barcode::ManifestFields;
use crate::domain::plan::{RouteKey, SkidPlanKey};
use crate::domain::types::{SessionStatus, WorkflowKind};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// SessionAnchor - 会话锚点
// ==========================================

/// 会话锚点（会话所绑定的业务键）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionAnchor {
    /// 组托: 订单 + 月台
    Build {
        order_number: String,
        dock_code: String,
    },
    /// 装车: 线路 + 供应商 + 取货时间
    Load {
        route: String,
        supplier_code: String,
        pickup: NaiveDateTime,
    },
    /// 出货前核对: 由 Manifest 派生
    PreShipment {
        plant_code: String,
        dock_code: String,
        order_number: String,
    },
}

impl SessionAnchor {
    /// 由出货前核对扫到的 Manifest 派生锚点
    pub fn from_manifest(manifest: &ManifestFields) -> Self {
        SessionAnchor::PreShipment {
            plant_code: manifest.plant().to_string(),
            dock_code: manifest.dock().to_string(),
            order_number: manifest.order().to_string(),
        }
    }

    pub fn kind(&self) -> WorkflowKind {
        match self {
            SessionAnchor::Build { .. } => WorkflowKind::Build,
            SessionAnchor::Load { .. } => WorkflowKind::Load,
            SessionAnchor::PreShipment { .. } => WorkflowKind::PreShipment,
        }
    }

    /// 规范化锚点键（唯一约束使用）
    pub fn key(&self) -> String {
        match self {
            SessionAnchor::Build {
                order_number,
                dock_code,
            } => format!("BUILD|{}|{}", order_number.trim(), dock_code.trim()),
            SessionAnchor::Load {
                route,
                supplier_code,
                pickup,
            } => format!(
                "LOAD|{}|{}|{}",
                route.trim(),
                supplier_code.trim(),
                pickup.format("%Y-%m-%dT%H:%M")
            ),
            SessionAnchor::PreShipment {
                plant_code,
                dock_code,
                order_number,
            } => format!(
                "PRE|{}|{}|{}",
                plant_code.trim(),
                dock_code.trim(),
                order_number.trim()
            ),
        }
    }

    /// 会话对应的计划托盘查询键（组托返回 None）
    pub fn skid_plan_key(&self) -> Option<SkidPlanKey> {
        match self {
            SessionAnchor::Build { .. } => None,
            SessionAnchor::Load {
                route,
                supplier_code,
                pickup,
            } => Some(SkidPlanKey::Route(RouteKey {
                route: route.clone(),
                supplier_code: supplier_code.clone(),
                pickup: *pickup,
            })),
            SessionAnchor::PreShipment {
                dock_code,
                order_number,
                ..
            } => Some(SkidPlanKey::Order {
                order_number: order_number.clone(),
                dock_code: dock_code.clone(),
            }),
        }
    }
}

// ==========================================
// TrailerInfo - 车辆/封条/司机信息
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailerInfo {
    pub trailer_number: String,
    pub seal_number: String,
    pub lp_code: Option<String>,
    pub driver_first_name: String,
    pub driver_last_name: String,
    pub supplier_team_first_name: Option<String>,
    pub supplier_team_last_name: Option<String>,
}

impl TrailerInfo {
    /// 必填项: 车号 / 封条号 / 司机姓名
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.trailer_number.trim().is_empty() {
            missing.push("trailerNumber");
        }
        if self.seal_number.trim().is_empty() {
            missing.push("sealNumber");
        }
        if self.driver_first_name.trim().is_empty() {
            missing.push("driverTeamFirstName");
        }
        if self.driver_last_name.trim().is_empty() {
            missing.push("driverTeamLastName");
        }
        missing
    }
}

// ==========================================
// ScanSession - 扫描会话
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSession {
    pub session_id: String,
    pub workflow_kind: WorkflowKind,
    pub anchor: SessionAnchor,
    pub status: SessionStatus,
    pub operator_id: String,
    pub created_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub confirmation_number: Option<String>,
    pub trailer: Option<TrailerInfo>,
    /// 正在向承运商提交的时间（提交期间冻结扫描）
    pub submitting_since: Option<NaiveDateTime>,
}

impl ScanSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn anchor_key(&self) -> String {
        self.anchor.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_anchor_keys() {
        let build = SessionAnchor::Build {
            order_number: " ORD1 ".to_string(),
            dock_code: "D1".to_string(),
        };
        assert_eq!(build.key(), "BUILD|ORD1|D1");
        assert_eq!(build.kind(), WorkflowKind::Build);
        assert!(build.skid_plan_key().is_none());

        let pickup = NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        let load = SessionAnchor::Load {
            route: "RT1001".to_string(),
            supplier_code: "SUP01".to_string(),
            pickup,
        };
        assert_eq!(load.key(), "LOAD|RT1001|SUP01|2026-10-16T14:30");
    }

    #[test]
    fn test_anchor_json_round_trip() {
        let anchor = SessionAnchor::PreShipment {
            plant_code: "PLNT1".to_string(),
            dock_code: "D1".to_string(),
            order_number: "ORD1".to_string(),
        };
        let json = serde_json::to_string(&anchor).unwrap();
        assert!(json.contains("PRE_SHIPMENT"));
        let back: SessionAnchor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, anchor);
    }

    #[test]
    fn test_trailer_missing_fields() {
        let info = TrailerInfo {
            trailer_number: "TR-9".to_string(),
            ..Default::default()
        };
        assert_eq!(
            info.missing_fields(),
            vec!["sealNumber", "driverTeamFirstName", "driverTeamLastName"]
        );
    }
}
