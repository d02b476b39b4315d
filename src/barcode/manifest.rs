// ==========================================
// 出货扫描会话引擎 - 托盘清单条码 (Manifest) 解码
// ==========================================
// 格式: 44 位定长 ASCII, 偏移与打印机格式约定一致
// ==========================================
// | 字段              | 偏移 | 长度 |
// | plant_code        |  0   |  5   |
// | supplier_code     |  5   |  5   |
// | dock_code         | 10   |  2   |
// | order_number      | 12   | 12   |
// | load_id           | 24   | 10   |
// | palletization     | 34   |  2   |
// | mros_code         | 36   |  4   |
// | skid_id           | 40   |  4   |  (3 位数字 + A/B 面)
// ==========================================

use super::{check_frame, slice, DecodeError, DecodeResult, FieldSpec};
use crate::domain::types::SkidSide;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Manifest 条码固定长度
pub const MANIFEST_LENGTH: usize = 44;

const PLANT_CODE: FieldSpec = FieldSpec::new("plantCode", 0, 5);
const SUPPLIER_CODE: FieldSpec = FieldSpec::new("supplierCode", 5, 5);
const DOCK_CODE: FieldSpec = FieldSpec::new("dockCode", 10, 2);
const ORDER_NUMBER: FieldSpec = FieldSpec::new("orderNumber", 12, 12);
const LOAD_ID: FieldSpec = FieldSpec::new("loadId", 24, 10);
const PALLETIZATION_CODE: FieldSpec = FieldSpec::new("palletizationCode", 34, 2);
const MROS_CODE: FieldSpec = FieldSpec::new("mrosCode", 36, 4);
const SKID_ID: FieldSpec = FieldSpec::new("skidId", 40, 4);

// ==========================================
// SkidId - 托盘编号
// ==========================================

/// 托盘编号: 3 位数字 + 面 (A/B)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkidId {
    pub number: u16,
    pub side: SkidSide,
}

impl SkidId {
    /// 解析 4 位托盘编号（如 "001A"）
    pub fn parse(raw: &str) -> DecodeResult<Self> {
        let field_err = |message: String| DecodeError::Field {
            field: SKID_ID.name,
            message,
        };

        if raw.len() != SKID_ID.len || !raw.is_ascii() {
            return Err(field_err(format!("托盘编号必须为 4 位: '{}'", raw)));
        }

        let (digits, side) = raw.split_at(3);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(field_err(format!("托盘号非数字: '{}'", digits)));
        }
        let number = digits
            .parse::<u16>()
            .map_err(|e| field_err(e.to_string()))?;
        let side = SkidSide::parse(side)
            .ok_or_else(|| field_err(format!("托盘面必须为 A 或 B: '{}'", side)))?;

        Ok(Self { number, side })
    }

    /// 规范 4 位文本（001A）
    pub fn code(&self) -> String {
        format!("{:03}{}", self.number, self.side)
    }
}

impl fmt::Display for SkidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}{}", self.number, self.side)
    }
}

// ==========================================
// ManifestFields - 解码结果
// ==========================================

/// Manifest 解码结果
///
/// 字段按原文保存（保留填充空格）, `to_raw()` 可还原原始条码;
/// 查询时使用 trim 后的访问器。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFields {
    pub plant_code: String,
    pub supplier_code: String,
    pub dock_code: String,
    pub order_number: String,
    pub load_id: String,
    pub palletization_code: String,
    pub mros_code: String,
    pub skid_id: SkidId,
}

impl ManifestFields {
    pub fn order(&self) -> &str {
        self.order_number.trim()
    }

    pub fn dock(&self) -> &str {
        self.dock_code.trim()
    }

    pub fn plant(&self) -> &str {
        self.plant_code.trim()
    }

    pub fn supplier(&self) -> &str {
        self.supplier_code.trim()
    }

    pub fn palletization(&self) -> &str {
        self.palletization_code.trim()
    }

    /// 按固定偏移重新拼接为原始条码
    pub fn to_raw(&self) -> String {
        let mut raw = String::with_capacity(MANIFEST_LENGTH);
        raw.push_str(&self.plant_code);
        raw.push_str(&self.supplier_code);
        raw.push_str(&self.dock_code);
        raw.push_str(&self.order_number);
        raw.push_str(&self.load_id);
        raw.push_str(&self.palletization_code);
        raw.push_str(&self.mros_code);
        raw.push_str(&self.skid_id.code());
        raw
    }
}

/// 解码 44 位 Manifest 条码
///
/// # 返回
/// - Ok(ManifestFields): 全部字段
/// - Err(DecodeError::Length): 长度不是 44
/// - Err(DecodeError::Field{field: "skidId"}): 托盘号/面非法
pub fn decode_manifest(raw: &str) -> DecodeResult<ManifestFields> {
    check_frame(raw, MANIFEST_LENGTH)?;

    let skid_id = SkidId::parse(slice(raw, &SKID_ID))?;

    Ok(ManifestFields {
        plant_code: slice(raw, &PLANT_CODE).to_string(),
        supplier_code: slice(raw, &SUPPLIER_CODE).to_string(),
        dock_code: slice(raw, &DOCK_CODE).to_string(),
        order_number: slice(raw, &ORDER_NUMBER).to_string(),
        load_id: slice(raw, &LOAD_ID).to_string(),
        palletization_code: slice(raw, &PALLETIZATION_CODE).to_string(),
        mros_code: slice(raw, &MROS_CODE).to_string(),
        skid_id,
    })
}
