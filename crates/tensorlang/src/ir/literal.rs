//! Spelling of literals and names in the printed module.

use super::types::ElementType;

/// Decimal form of a finite float that always carries a `.` in its mantissa.
///
/// Uses the shortest representation that reads back to the same `f64`.
pub(crate) fn format_float(value: f64) -> String {
    let text = format!("{value:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) if !mantissa.contains('.') => {
            format!("{mantissa}.0e{exponent}")
        }
        _ => text,
    }
}

/// Float literal for an attribute of type `ty`; NaN and infinities use the hex bit pattern.
pub(crate) fn format_float_attr(value: f64, ty: ElementType) -> String {
    if value.is_finite() {
        return format_float(value);
    }
    match ty {
        ElementType::F16 => format!("0x{:04X}", half::f16::from_f64(value).to_bits()),
        ElementType::F32 => format!("0x{:08X}", (value as f32).to_bits()),
        _ => format!("0x{:016X}", value.to_bits()),
    }
}

/// Double-quoted string literal.
///
/// Printable ASCII is kept as is apart from `"` and `\`; every other byte is written as `\XX`.
pub(crate) fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for byte in text.bytes() {
        match byte {
            b'"' => quoted.push_str("\\\""),
            b'\\' => quoted.push_str("\\\\"),
            b' '..=b'~' => quoted.push(char::from(byte)),
            _ => quoted.push_str(&format!("\\{byte:02X}")),
        }
    }
    quoted.push('"');
    quoted
}

/// Bare identifier when `name` is one, otherwise its quoted form.
pub(crate) fn identifier(name: &str) -> String {
    let mut chars = name.chars();
    let bare = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'));
    if bare {
        name.to_string()
    } else {
        quote(name)
    }
}
