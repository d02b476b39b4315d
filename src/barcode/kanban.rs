// ==========================================
// 出货扫描会话引擎 - 看板条码 (Kanban) 解码
// ==========================================
// 格式: 200 位定长 ASCII, 24 个定位字段 + 保留尾段
// 约束: 与 Manifest 相同的"全量成功或整体拒绝"契约
// ==========================================

use super::{check_frame, parse_digits, slice, DecodeResult, FieldSpec};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Kanban 条码固定长度
pub const KANBAN_LENGTH: usize = 200;

const SUPPLIER_CODE: FieldSpec = FieldSpec::new("supplierCode", 0, 5);
const SUPPLIER_PLANT_CODE: FieldSpec = FieldSpec::new("supplierPlantCode", 5, 1);
const SUPPLIER_SHIPPING_DOCK: FieldSpec = FieldSpec::new("supplierShippingDock", 6, 3);
const PLANT_CODE: FieldSpec = FieldSpec::new("plantCode", 9, 5);
const RECEIVING_DOCK: FieldSpec = FieldSpec::new("receivingDock", 14, 2);
const PART_NUMBER: FieldSpec = FieldSpec::new("partNumber", 16, 12);
const PART_NAME: FieldSpec = FieldSpec::new("partName", 28, 20);
const KANBAN_NUMBER: FieldSpec = FieldSpec::new("kanbanNumber", 48, 4);
const QUANTITY_PER_CONTAINER: FieldSpec = FieldSpec::new("quantityPerContainer", 52, 5);
const BOX_NUMBER: FieldSpec = FieldSpec::new("boxNumber", 57, 4);
const ORDER_NUMBER: FieldSpec = FieldSpec::new("orderNumber", 61, 12);
const ORDER_DATE: FieldSpec = FieldSpec::new("orderDate", 73, 8);
const ROUTE: FieldSpec = FieldSpec::new("route", 81, 8);
const PICKUP_DATE: FieldSpec = FieldSpec::new("pickupDate", 89, 8);
const PICKUP_TIME: FieldSpec = FieldSpec::new("pickupTime", 97, 4);
const LINE_SIDE_ADDRESS: FieldSpec = FieldSpec::new("lineSideAddress", 101, 10);
const STORE_ADDRESS: FieldSpec = FieldSpec::new("storeAddress", 111, 10);
const PALLETIZATION_CODE: FieldSpec = FieldSpec::new("palletizationCode", 121, 2);
const INTERNAL_KANBAN: FieldSpec = FieldSpec::new("internalKanban", 123, 10);
const MANIFEST_NUMBER: FieldSpec = FieldSpec::new("manifestNumber", 133, 8);
const ECI_NUMBER: FieldSpec = FieldSpec::new("eciNumber", 141, 6);
const PACKAGING_CODE: FieldSpec = FieldSpec::new("packagingCode", 147, 10);
const DELIVERY_DATE: FieldSpec = FieldSpec::new("deliveryDate", 157, 8);
const DELIVERY_TIME: FieldSpec = FieldSpec::new("deliveryTime", 165, 4);
const RESERVED: FieldSpec = FieldSpec::new("reserved", 169, KANBAN_LENGTH - 169);

/// Kanban 解码结果
///
/// 文本字段原样保存; 数量与箱号为已校验的数字。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanbanFields {
    pub supplier_code: String,
    pub supplier_plant_code: String,
    pub supplier_shipping_dock: String,
    pub plant_code: String,
    pub receiving_dock: String,
    pub part_number: String,
    pub part_name: String,
    pub kanban_number: String,
    pub quantity_per_container: u32,
    pub box_number: u32,
    pub order_number: String,
    pub order_date: String,
    pub route: String,
    pub pickup_date: String,
    pub pickup_time: String,
    pub line_side_address: String,
    pub store_address: String,
    pub palletization_code: String,
    pub internal_kanban: String,
    pub manifest_number: String,
    pub eci_number: String,
    pub packaging_code: String,
    pub delivery_date: String,
    pub delivery_time: String,
    reserved: String,
}

impl KanbanFields {
    pub fn order(&self) -> &str {
        self.order_number.trim()
    }

    pub fn part(&self) -> &str {
        self.part_number.trim()
    }

    pub fn kanban(&self) -> &str {
        self.kanban_number.trim()
    }

    pub fn palletization(&self) -> &str {
        self.palletization_code.trim()
    }

    /// 内部看板号（空白视为无）
    pub fn internal_kanban_value(&self) -> Option<&str> {
        let v = self.internal_kanban.trim();
        (!v.is_empty()).then_some(v)
    }

    /// 取货时间（yyyyMMdd + HHmm）, 格式不合法时返回 None
    pub fn pickup_at(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(self.pickup_date.trim(), "%Y%m%d").ok()?;
        let time = NaiveTime::parse_from_str(self.pickup_time.trim(), "%H%M").ok()?;
        Some(date.and_time(time))
    }

    /// 按固定偏移还原原始条码
    pub fn to_raw(&self) -> String {
        let mut raw = String::with_capacity(KANBAN_LENGTH);
        raw.push_str(&self.supplier_code);
        raw.push_str(&self.supplier_plant_code);
        raw.push_str(&self.supplier_shipping_dock);
        raw.push_str(&self.plant_code);
        raw.push_str(&self.receiving_dock);
        raw.push_str(&self.part_number);
        raw.push_str(&self.part_name);
        raw.push_str(&self.kanban_number);
        raw.push_str(&format!("{:0>width$}", self.quantity_per_container, width = QUANTITY_PER_CONTAINER.len));
        raw.push_str(&format!("{:0>width$}", self.box_number, width = BOX_NUMBER.len));
        raw.push_str(&self.order_number);
        raw.push_str(&self.order_date);
        raw.push_str(&self.route);
        raw.push_str(&self.pickup_date);
        raw.push_str(&self.pickup_time);
        raw.push_str(&self.line_side_address);
        raw.push_str(&self.store_address);
        raw.push_str(&self.palletization_code);
        raw.push_str(&self.internal_kanban);
        raw.push_str(&self.manifest_number);
        raw.push_str(&self.eci_number);
        raw.push_str(&self.packaging_code);
        raw.push_str(&self.delivery_date);
        raw.push_str(&self.delivery_time);
        raw.push_str(&self.reserved);
        raw
    }
}

/// 解码 200 位 Kanban 条码
pub fn decode_kanban(raw: &str) -> DecodeResult<KanbanFields> {
    check_frame(raw, KANBAN_LENGTH)?;

    let text = |spec: &FieldSpec| slice(raw, spec).to_string();

    Ok(KanbanFields {
        supplier_code: text(&SUPPLIER_CODE),
        supplier_plant_code: text(&SUPPLIER_PLANT_CODE),
        supplier_shipping_dock: text(&SUPPLIER_SHIPPING_DOCK),
        plant_code: text(&PLANT_CODE),
        receiving_dock: text(&RECEIVING_DOCK),
        part_number: text(&PART_NUMBER),
        part_name: text(&PART_NAME),
        kanban_number: text(&KANBAN_NUMBER),
        quantity_per_container: parse_digits(raw, &QUANTITY_PER_CONTAINER)?,
        box_number: parse_digits(raw, &BOX_NUMBER)?,
        order_number: text(&ORDER_NUMBER),
        order_date: text(&ORDER_DATE),
        route: text(&ROUTE),
        pickup_date: text(&PICKUP_DATE),
        pickup_time: text(&PICKUP_TIME),
        line_side_address: text(&LINE_SIDE_ADDRESS),
        store_address: text(&STORE_ADDRESS),
        palletization_code: text(&PALLETIZATION_CODE),
        internal_kanban: text(&INTERNAL_KANBAN),
        manifest_number: text(&MANIFEST_NUMBER),
        eci_number: text(&ECI_NUMBER),
        packaging_code: text(&PACKAGING_CODE),
        delivery_date: text(&DELIVERY_DATE),
        delivery_time: text(&DELIVERY_TIME),
        reserved: text(&RESERVED),
    })
}
