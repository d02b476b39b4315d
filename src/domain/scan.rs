// ==========================================
// 出货扫描会话引擎 - 扫描输入与扫描记录
// ==========================================
// 不变量: (会话, 计划目标, 箱号) 唯一;
//         仅当重复窗口允许时才会出现 entry_seq > 0 的重入记录
// ==========================================

use crate::barcode::{decode_kanban, decode_manifest, DecodeResult, KanbanFields, ManifestFields};
use crate::domain::types::SkidSide;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// ScanInput - 已解码的扫描输入
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScanInput {
    /// 组托: 当前托盘 Manifest + 一个箱子的 Kanban
    Build {
        manifest: ManifestFields,
        kanban: KanbanFields,
    },
    /// 装车 / 出货前核对: 托盘 Manifest
    Skid { manifest: ManifestFields },
}

impl ScanInput {
    /// 解码组托扫描（任一条码非法则整体拒绝）
    pub fn decode_build(manifest_raw: &str, kanban_raw: &str) -> DecodeResult<Self> {
        Ok(ScanInput::Build {
            manifest: decode_manifest(manifest_raw)?,
            kanban: decode_kanban(kanban_raw)?,
        })
    }

    /// 解码托盘级扫描
    pub fn decode_skid(manifest_raw: &str) -> DecodeResult<Self> {
        Ok(ScanInput::Skid {
            manifest: decode_manifest(manifest_raw)?,
        })
    }

    pub fn manifest(&self) -> &ManifestFields {
        match self {
            ScanInput::Build { manifest, .. } => manifest,
            ScanInput::Skid { manifest } => manifest,
        }
    }

    /// 唯一性键中的箱号部分（托盘级扫描恒为 0）
    pub fn box_key(&self) -> u32 {
        match self {
            ScanInput::Build { kanban, .. } => kanban.box_number,
            ScanInput::Skid { .. } => 0,
        }
    }
}

// ==========================================
// ScanRecord - 扫描记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub scan_id: String,
    pub session_id: String,
    /// 计划零件 item_id 或计划托盘 planned_skid_id
    pub target_id: String,
    pub box_key: u32,
    /// 0 = 首次扫描, >0 = 重复窗口内的重入
    pub entry_seq: u32,
    pub order_number: String,
    pub dock_code: String,
    pub skid_number: u16,
    pub skid_side: SkidSide,
    pub box_number: Option<u32>,
    pub palletization_code: String,
    pub internal_kanban: Option<String>,
    pub scanned_at: NaiveDateTime,
    pub operator_id: String,
}

impl ScanRecord {
    pub fn is_reentry(&self) -> bool {
        self.entry_seq > 0
    }

    pub fn skid_code(&self) -> String {
        format!("{:03}{}", self.skid_number, self.skid_side)
    }
}

// ==========================================
// TargetProgress - 单个计划目标的扫描进度
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetProgress {
    pub target_id: String,
    pub order_number: String,
    /// 零件号（组托）或托盘号（装车）
    pub label: String,
    pub scanned_count: u32,
    pub planned_count: u32,
}

impl TargetProgress {
    pub fn remaining(&self) -> u32 {
        self.planned_count.saturating_sub(self.scanned_count)
    }

    pub fn is_complete(&self) -> bool {
        self.scanned_count >= self.planned_count
    }
}
