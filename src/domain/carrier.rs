// ==========================================
// 出货扫描会话引擎 - 承运商接口报文
// ==========================================
// 字段名与承运商接口逐字一致（camelCase）
// 报文为临时对象, 不单独持久化
// ==========================================

use serde::{Deserialize, Serialize};

/// 业务常量: 不甩挂
pub const DROP_HOOK: bool = false;

/// 取货时间格式 yyyy-MM-ddTHH:mm
pub const PICKUP_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierException {
    pub exception_code: String,
    pub comments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierSkid {
    pub skid_id: String,
    pub palletization: String,
    pub skid_cut: bool,
    pub exceptions: Vec<CarrierException>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierOrder {
    pub order: String,
    pub supplier: String,
    pub plant: String,
    pub dock: String,
    pub pick_up: String,
    pub exceptions: Vec<CarrierException>,
    pub skids: Vec<CarrierSkid>,
}

/// 车辆级报文（提交主体）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierShipment {
    pub supplier: String,
    pub route: String,
    pub run: String,
    pub trailer_number: String,
    pub drop_hook: bool,
    pub seal_number: String,
    pub lp_code: Option<String>,
    pub driver_team_first_name: String,
    pub driver_team_last_name: String,
    pub supplier_team_first_name: Option<String>,
    pub supplier_team_last_name: Option<String>,
    pub exceptions: Vec<CarrierException>,
    pub orders: Vec<CarrierOrder>,
}

/// 承运商字段级错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierFieldError {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub key_object: Option<serde_json::Value>,
}

/// 承运商提交响应
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierResponse {
    #[serde(default)]
    pub confirmation_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<CarrierFieldError>,
}

impl CarrierResponse {
    /// 非空确认号且无字段错误才视为成功
    pub fn confirmation(&self) -> Option<&str> {
        if !self.errors.is_empty() {
            return None;
        }
        self.confirmation_number
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// 把线路字符串拆成 (route, run): 末两位为 run
pub fn split_route_run(route: &str) -> (String, String) {
    let route = route.trim();
    let chars: Vec<char> = route.chars().collect();
    if chars.len() <= 2 {
        return (String::new(), route.to_string());
    }
    let cut = chars.len() - 2;
    (
        chars[..cut].iter().collect(),
        chars[cut..].iter().collect(),
    )
}
