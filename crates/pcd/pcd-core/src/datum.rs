//! Datum types, literal values, and the built-in datum validator.
//!
//! Platform descriptions write PCD values as text. [`DatumValue::parse`]
//! turns that text into an explicit tagged value, so downstream code never
//! has to re-derive "is this a wide string" from formatting conventions.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Datum type of a PCD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatumType {
    /// 8-bit unsigned.
    Uint8,
    /// 16-bit unsigned.
    Uint16,
    /// 32-bit unsigned.
    Uint32,
    /// 64-bit unsigned.
    Uint64,
    /// `BOOLEAN`.
    Boolean,
    /// `VOID*`: a string or byte buffer with a maximum size.
    Pointer,
    /// Not yet known.
    Unknown,
}

impl DatumType {
    /// Name as written in descriptions (`VOID*` for pointers).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uint8 => "UINT8",
            Self::Uint16 => "UINT16",
            Self::Uint32 => "UINT32",
            Self::Uint64 => "UINT64",
            Self::Boolean => "BOOLEAN",
            Self::Pointer => "VOID*",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// C type used in generated globals.
    pub fn c_type(self) -> &'static str {
        match self {
            Self::Uint8 | Self::Pointer => "UINT8",
            Self::Uint16 => "UINT16",
            Self::Uint32 => "UINT32",
            Self::Uint64 => "UINT64",
            Self::Boolean | Self::Unknown => "BOOLEAN",
        }
    }

    /// Suffix of the `LibPcdGet*` family and `_PCD_GET_MODE_*` macros.
    pub fn autogen_suffix(self) -> &'static str {
        match self {
            Self::Uint8 => "8",
            Self::Uint16 => "16",
            Self::Uint32 => "32",
            Self::Uint64 => "64",
            Self::Boolean => "Bool",
            Self::Pointer => "Ptr",
            Self::Unknown => "Unknown",
        }
    }

    /// Size in bytes for fixed-size types; `None` for pointers.
    pub fn fixed_size(self) -> Option<u32> {
        match self {
            Self::Uint8 | Self::Boolean => Some(1),
            Self::Uint16 => Some(2),
            Self::Uint32 => Some(4),
            Self::Uint64 => Some(8),
            Self::Pointer | Self::Unknown => None,
        }
    }

    fn max_value(self) -> Option<u64> {
        match self {
            Self::Uint8 => Some(u64::from(u8::MAX)),
            Self::Uint16 => Some(u64::from(u16::MAX)),
            Self::Uint32 => Some(u64::from(u32::MAX)),
            Self::Uint64 => Some(u64::MAX),
            _ => None,
        }
    }
}

impl fmt::Display for DatumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for DatumType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UINT8" => Ok(Self::Uint8),
            "UINT16" => Ok(Self::Uint16),
            "UINT32" => Ok(Self::Uint32),
            "UINT64" => Ok(Self::Uint64),
            "BOOLEAN" => Ok(Self::Boolean),
            "VOID*" | "VOID *" | "POINTER" => Ok(Self::Pointer),
            _ => Err(()),
        }
    }
}

/// A parsed PCD value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatumValue {
    /// Any of the `UINT*` types.
    Integer(u64),
    /// `BOOLEAN`.
    Boolean(bool),
    /// `L"..."`, stored without the prefix and quotes.
    UnicodeString(String),
    /// `"..."`, stored without the quotes.
    AsciiString(String),
    /// `{0x.., 0x..}`.
    ByteArray(Vec<u8>),
}

impl DatumValue {
    /// Parse `text` as a value of `datum_type`.
    pub fn parse(text: &str, datum_type: DatumType) -> Result<Self, String> {
        let text = text.trim();
        match datum_type {
            DatumType::Uint8 | DatumType::Uint16 | DatumType::Uint32 | DatumType::Uint64 => {
                let value = decode_number(text)
                    .ok_or_else(|| format!("value '{text}' is not a decimal or hex number"))?;
                let max = datum_type.max_value().unwrap_or(u64::MAX);
                if value > max {
                    return Err(format!(
                        "value '{text}' exceeds the {datum_type} maximum {max:#x}"
                    ));
                }
                Ok(Self::Integer(value))
            }
            DatumType::Boolean => match text.to_ascii_uppercase().as_str() {
                "TRUE" | "1" | "0X1" => Ok(Self::Boolean(true)),
                "FALSE" | "0" | "0X0" => Ok(Self::Boolean(false)),
                _ => Err(format!("value '{text}' is not TRUE or FALSE")),
            },
            DatumType::Pointer => parse_pointer(text),
            DatumType::Unknown => Err(format!("cannot validate '{text}' against an unknown datum type")),
        }
    }

    /// Size in bytes this value occupies in a buffer of `datum_type`.
    pub fn byte_size(&self, datum_type: DatumType) -> u32 {
        match self {
            Self::UnicodeString(s) => to_u32((s.encode_utf16().count() + 1) * 2),
            Self::AsciiString(s) => to_u32(s.len() + 1),
            Self::ByteArray(bytes) => to_u32(bytes.len()),
            Self::Integer(_) | Self::Boolean(_) => datum_type.fixed_size().unwrap_or(0),
        }
    }

    /// `true` for zero, FALSE, empty strings and all-zero byte arrays.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Integer(v) => *v == 0,
            Self::Boolean(b) => !b,
            Self::UnicodeString(s) | Self::AsciiString(s) => s.is_empty(),
            Self::ByteArray(bytes) => bytes.iter().all(|b| *b == 0),
        }
    }

    /// Render as a C expression or initializer.
    pub fn to_c_literal(&self, datum_type: DatumType) -> String {
        match self {
            Self::Integer(v) if datum_type == DatumType::Uint64 => format!("{v:#x}ULL"),
            Self::Integer(v) if datum_type == DatumType::Uint32 => format!("{v:#x}U"),
            Self::Integer(v) => format!("{v:#x}"),
            Self::Boolean(true) => "TRUE".into(),
            Self::Boolean(false) => "FALSE".into(),
            Self::UnicodeString(s) => format!("L\"{s}\""),
            Self::AsciiString(s) => format!("\"{s}\""),
            Self::ByteArray(bytes) => {
                let items: Vec<String> = bytes.iter().map(|b| format!("0x{b:02x}")).collect();
                format!("{{ {} }}", items.join(", "))
            }
        }
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn parse_pointer(text: &str) -> Result<DatumValue, String> {
    if let Some(inner) = text.strip_prefix("L\"").and_then(|s| s.strip_suffix('"')) {
        return Ok(DatumValue::UnicodeString(inner.to_string()));
    }
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return Ok(DatumValue::AsciiString(text[1..text.len() - 1].to_string()));
    }
    if let Some(inner) = text.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        let mut bytes = Vec::new();
        for item in inner.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let byte = decode_number(item)
                .filter(|v| *v <= u64::from(u8::MAX))
                .ok_or_else(|| format!("byte array element '{item}' is not a byte value"))?;
            bytes.push(u8::try_from(byte).unwrap_or_default());
        }
        return Ok(DatumValue::ByteArray(bytes));
    }
    Err(format!(
        "VOID* value '{text}' is neither a unicode string, an ASCII string nor a byte array"
    ))
}

/// Decode a decimal or `0x`-prefixed hex number.
///
/// Leading zeros are read as decimal; octal is not supported.
pub fn decode_number(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

/// Built-in datum validator.
///
/// Checks that `datum` parses as `datum_type` and, for `VOID*`, that
/// `max_size` is non-zero and large enough to hold the value.
pub fn verify_datum(
    cname: &str,
    module: &str,
    datum: &str,
    datum_type: DatumType,
    max_size: u32,
) -> Result<(), String> {
    let value = DatumValue::parse(datum, datum_type)?;

    if datum_type == DatumType::Pointer {
        if max_size == 0 {
            return Err(format!(
                "PCD {cname} in module {module} is VOID* but has no max datum size"
            ));
        }
        let size = value.byte_size(datum_type);
        if size > max_size {
            return Err(format!(
                "value {datum} of PCD {cname} in module {module} needs {size} bytes, \
                 more than the max datum size {max_size}"
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_number_hex_and_decimal() {
        assert_eq!(decode_number("0x10"), Some(16));
        assert_eq!(decode_number("0X1f"), Some(31));
        assert_eq!(decode_number("42"), Some(42));
        assert_eq!(decode_number("010"), Some(10));
        assert_eq!(decode_number("-1"), None);
        assert_eq!(decode_number(""), None);
        assert_eq!(decode_number("0xZZ"), None);
    }

    #[test]
    fn integer_ranges_enforced() {
        assert!(DatumValue::parse("0xFF", DatumType::Uint8).is_ok());
        assert!(DatumValue::parse("256", DatumType::Uint8).is_err());
        assert!(DatumValue::parse("0x10000", DatumType::Uint16).is_err());
        assert!(DatumValue::parse("0xFFFFFFFF", DatumType::Uint32).is_ok());
        assert!(DatumValue::parse("0x100000000", DatumType::Uint32).is_err());
        assert!(DatumValue::parse("0xFFFFFFFFFFFFFFFF", DatumType::Uint64).is_ok());
    }

    #[test]
    fn booleans() {
        assert_eq!(DatumValue::parse("true", DatumType::Boolean), Ok(DatumValue::Boolean(true)));
        assert_eq!(DatumValue::parse("FALSE", DatumType::Boolean), Ok(DatumValue::Boolean(false)));
        assert!(DatumValue::parse("yes", DatumType::Boolean).is_err());
    }

    #[test]
    fn pointer_forms_are_tagged() {
        assert_eq!(
            DatumValue::parse("L\"Setup\"", DatumType::Pointer),
            Ok(DatumValue::UnicodeString("Setup".into()))
        );
        assert_eq!(
            DatumValue::parse("\"abc\"", DatumType::Pointer),
            Ok(DatumValue::AsciiString("abc".into()))
        );
        assert_eq!(
            DatumValue::parse("{0x01, 0x2, 3}", DatumType::Pointer),
            Ok(DatumValue::ByteArray(vec![1, 2, 3]))
        );
        assert!(DatumValue::parse("{0x100}", DatumType::Pointer).is_err());
        assert!(DatumValue::parse("abc", DatumType::Pointer).is_err());
    }

    #[test]
    fn pointer_sizes() {
        let wide = DatumValue::UnicodeString("ab".into());
        assert_eq!(wide.byte_size(DatumType::Pointer), 6);
        let ascii = DatumValue::AsciiString("ab".into());
        assert_eq!(ascii.byte_size(DatumType::Pointer), 3);
        // U+1F600 is a surrogate pair in UTF-16.
        let astral = DatumValue::UnicodeString("\u{1F600}".into());
        assert_eq!(astral.byte_size(DatumType::Pointer), 6);
    }

    #[test]
    fn verify_pointer_requires_room() {
        assert!(verify_datum("PcdS", "M", "L\"ab\"", DatumType::Pointer, 6).is_ok());
        let err = verify_datum("PcdS", "M", "L\"ab\"", DatumType::Pointer, 4).unwrap_err();
        assert!(err.contains("PcdS") && err.contains("max datum size"), "unexpected: {err}");
        let err = verify_datum("PcdS", "M", "L\"\u{1F600}\"", DatumType::Pointer, 4).unwrap_err();
        assert!(err.contains("needs 6 bytes"), "unexpected: {err}");
        let err = verify_datum("PcdS", "M", "\"a\"", DatumType::Pointer, 0).unwrap_err();
        assert!(err.contains("no max datum size"), "unexpected: {err}");
    }

    #[test]
    fn zero_detection() {
        assert!(DatumValue::Integer(0).is_zero());
        assert!(!DatumValue::Integer(5).is_zero());
        assert!(DatumValue::Boolean(false).is_zero());
        assert!(DatumValue::ByteArray(vec![0, 0]).is_zero());
        assert!(!DatumValue::UnicodeString("x".into()).is_zero());
    }

    #[test]
    fn datum_type_names_round_trip() {
        for ty in [
            DatumType::Uint8,
            DatumType::Uint16,
            DatumType::Uint32,
            DatumType::Uint64,
            DatumType::Boolean,
            DatumType::Pointer,
        ] {
            assert_eq!(ty.as_str().parse::<DatumType>(), Ok(ty));
        }
        assert!("FLOAT".parse::<DatumType>().is_err());
    }
}
