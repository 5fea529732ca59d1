//! Per-SKU values of dynamic PCDs.

use std::fmt;

use serde::Serialize;

use crate::guid::EfiGuid;

/// One SKU's resolved value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkuValue {
    /// A literal default value.
    Default {
        /// Value text as declared.
        value: String,
    },
    /// An HII (NV variable) backed value.
    Hii {
        /// UCS-2 code units of the variable name, as `0xNNNN` fragments.
        variable_name: Vec<String>,
        /// Variable GUID, resolved through the package declarations.
        variable_guid: EfiGuid,
        /// Offset of the value inside the variable.
        variable_offset: u16,
        /// Value used when the variable does not exist.
        default_value: String,
    },
    /// A VPD (fixed-offset vendor data) value.
    Vpd {
        /// Offset in the VPD region.
        offset: u32,
    },
}

impl SkuValue {
    /// The literal default this value carries, if any.
    ///
    /// HII entries report their `HiiDefaultValue`; VPD entries have none.
    pub fn default_value(&self) -> Option<&str> {
        match self {
            Self::Default { value } => Some(value),
            Self::Hii { default_value, .. } => Some(default_value),
            Self::Vpd { .. } => None,
        }
    }
}

/// A SKU id paired with its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkuInstance {
    /// SKU id; 0 is the default SKU.
    pub id: u32,
    /// The value for this SKU.
    pub value: SkuValue,
}

impl SkuInstance {
    /// Create a SKU instance.
    pub fn new(id: u32, value: SkuValue) -> Self {
        Self { id, value }
    }

    /// Returns `true` for the default SKU.
    pub fn is_default_sku(&self) -> bool {
        self.id == 0
    }
}

impl fmt::Display for SkuInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            SkuValue::Default { value } => write!(f, "SKU {}: value {value}", self.id),
            SkuValue::Hii {
                variable_name,
                variable_guid,
                variable_offset,
                default_value,
            } => write!(
                f,
                "SKU {}: HII L\"{}\" {variable_guid} offset {variable_offset:#x} default {default_value}",
                self.id,
                decode_variable_name(variable_name)
            ),
            SkuValue::Vpd { offset } => write!(f, "SKU {}: VPD offset {offset:#x}", self.id),
        }
    }
}

/// Collect every `0xNNNN` fragment (exactly four hex digits) from an HII
/// variable name, in order.
pub fn scan_variable_name(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut fragments = Vec::new();
    let mut i = 0;
    while i + 6 <= bytes.len() {
        if bytes[i] == b'0'
            && bytes[i + 1] == b'x'
            && bytes[i + 2..i + 6].iter().all(u8::is_ascii_hexdigit)
        {
            fragments.push(text[i..i + 6].to_string());
            i += 6;
        } else {
            i += 1;
        }
    }
    fragments
}

/// Render `0xNNNN` fragments as text, stopping at a NUL code unit.
pub fn decode_variable_name(fragments: &[String]) -> String {
    let units: Vec<u16> = fragments
        .iter()
        .filter_map(|f| u16::from_str_radix(&f[2..], 16).ok())
        .take_while(|u| *u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}
