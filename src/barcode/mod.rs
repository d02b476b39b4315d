// ==========================================
// 出货扫描会话引擎 - 条码解码层
// ==========================================
// 职责: 把手持终端扫到的定长字符串解析为结构化字段
// 红线: 纯函数, 无 I/O, 无副作用
// ==========================================

pub mod error;
pub mod kanban;
pub mod manifest;

pub use error::{DecodeError, DecodeResult};
pub use kanban::{decode_kanban, KanbanFields, KANBAN_LENGTH};
pub use manifest::{decode_manifest, ManifestFields, SkidId, MANIFEST_LENGTH};

/// 定长字段描述
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    pub len: usize,
}

impl FieldSpec {
    pub const fn new(name: &'static str, offset: usize, len: usize) -> Self {
        Self { name, offset, len }
    }

    pub const fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// 长度 + 字符集校验（按字符数比较长度, 再要求 ASCII）
pub(crate) fn check_frame(raw: &str, expected: usize) -> DecodeResult<()> {
    let actual = raw.chars().count();
    if actual != expected {
        return Err(DecodeError::Length { expected, actual });
    }
    if !raw.is_ascii() {
        return Err(DecodeError::Charset);
    }
    Ok(())
}

/// 取字段原文（调用前必须已通过 check_frame）
pub(crate) fn slice<'a>(raw: &'a str, spec: &FieldSpec) -> &'a str {
    &raw[spec.offset..spec.end()]
}

/// 数字字段: 允许左右空格填充, 其余必须全为数字
pub(crate) fn parse_digits(raw: &str, spec: &FieldSpec) -> DecodeResult<u32> {
    let value = slice(raw, spec).trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::Field {
            field: spec.name,
            message: format!("非数字: '{}'", value),
        });
    }
    value.parse::<u32>().map_err(|e| DecodeError::Field {
        field: spec.name,
        message: e.to_string(),
    })
}
