// ==========================================
// 出货扫描会话引擎 - 条码解码错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约束: 解码要么完整成功, 要么整体拒绝, 不做部分解析
// ==========================================

use thiserror::Error;

/// 条码解码错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// 长度不符（按字符计）
    #[error("条码长度错误: expected={expected}, actual={actual}")]
    Length { expected: usize, actual: usize },

    /// 含非 ASCII 字符, 固定偏移无法成立
    #[error("条码包含非 ASCII 字符")]
    Charset,

    /// 单字段语法错误
    #[error("条码字段错误 (field={field}): {message}")]
    Field { field: &'static str, message: String },
}

impl DecodeError {
    /// 拒绝原因代码（length / charset / field）
    pub fn reason(&self) -> &'static str {
        match self {
            DecodeError::Length { .. } => "length",
            DecodeError::Charset => "charset",
            DecodeError::Field { .. } => "field",
        }
    }

    /// 出错字段名（仅 Field 变体）
    pub fn field(&self) -> Option<&'static str> {
        match self {
            DecodeError::Field { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;
