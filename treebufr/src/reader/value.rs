use crate::tree::{DescriptorNode, NodeKind};
use encoding_rs::WINDOWS_1252;

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum Value {
    Number(f64),
    /// Code or flag table entry.
    Code(u64),
    String(String),
    Missing,
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{}", v),
            Value::Code(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Missing => write!(f, "MISSING"),
        }
    }
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Code(v) => Some(*v as f64),
            Value::String(_) | Value::Missing => None,
        }
    }

    pub fn as_code(&self) -> Option<u64> {
        match self {
            Value::Code(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

/// Apply reference and scale: `(raw + reference) / 10^scale`.
pub fn scaled(raw: u64, reference: i64, scale: i32) -> f64 {
    let value = (raw as i128 + reference as i128) as f64;
    match scale {
        0 => value,
        s if s > 0 => value / 10f64.powi(s),
        s => value * 10f64.powi(-s),
    }
}

/// Value of a numeric or code-table leaf from its raw bits.
pub fn numeric_value(node: &DescriptorNode, raw: u64) -> Value {
    if node.bit_width == 0 || node.is_missing(raw) {
        return Value::Missing;
    }
    match node.kind {
        NodeKind::Enumerated => Value::Code(raw),
        _ => Value::Number(scaled(raw, node.reference, node.scale)),
    }
}

/// Decode a CCITT IA5 field. Text is taken as UTF-8, falling back to
/// Windows-1252; trailing blanks and NULs are dropped.
pub fn character_value(bytes: &[u8]) -> Value {
    if !bytes.is_empty() && bytes.iter().all(|b| *b == 0xFF) {
        return Value::Missing;
    }
    let end = bytes
        .iter()
        .rposition(|b| *b != b' ' && *b != 0)
        .map_or(0, |i| i + 1);
    let trimmed = &bytes[..end];
    let text = match std::str::from_utf8(trimmed) {
        Ok(s) => s.to_string(),
        Err(_) => WINDOWS_1252.decode(trimmed).0.into_owned(),
    };
    Value::String(text)
}
