//! UEFI GUID type and translation from platform-description strings.
//!
//! Package and platform descriptions write GUIDs either in registry form
//! (`xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`) or as a C initializer
//! (`0xAAAAAAAA, 0xBBBB, 0xCCCC, {0xD0, ..., 0xD7}`). Both are accepted by
//! [`translate_schema_string_to_guid`].

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{PcdError, Result};

/// A UEFI Globally Unique Identifier (GUID).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EfiGuid {
    /// The first 32 bits of the GUID.
    pub data1: u32,
    /// The next 16 bits of the GUID.
    pub data2: u16,
    /// The next 16 bits of the GUID.
    pub data3: u16,
    /// The remaining 64 bits of the GUID.
    pub data4: [u8; 8],
}

impl EfiGuid {
    /// The all-zero GUID, used as the "null" token space.
    pub const NULL: Self = Self::new(0, 0, 0, [0; 8]);

    /// Creates a new GUID from its component parts.
    #[must_use]
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// Returns `true` for the all-zero GUID.
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// Canonical form with `-` replaced by `_`, as used in primary keys and
    /// C identifiers.
    pub fn to_key_string(&self) -> String {
        self.to_string().replace('-', "_")
    }
}

impl fmt::Debug for EfiGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EfiGuid({self})")
    }
}

impl fmt::Display for EfiGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}

impl Serialize for EfiGuid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for EfiGuid {
    type Err = PcdError;

    /// Parses the canonical registry form only.
    fn from_str(s: &str) -> Result<Self> {
        let malformed = |reason: &str| PcdError::MalformedGuid {
            text: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.trim().split('-').collect();
        if parts.len() != 5 {
            return Err(malformed("expected 5 '-' separated groups"));
        }
        let widths = [8, 4, 4, 4, 12];
        for (part, width) in parts.iter().zip(widths) {
            if part.len() != width || !part.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(malformed("group has the wrong length or a non-hex digit"));
            }
        }

        let data1 = u32::from_str_radix(parts[0], 16).map_err(|_| malformed("bad data1"))?;
        let data2 = u16::from_str_radix(parts[1], 16).map_err(|_| malformed("bad data2"))?;
        let data3 = u16::from_str_radix(parts[2], 16).map_err(|_| malformed("bad data3"))?;

        let tail = format!("{}{}", parts[3], parts[4]);
        let mut data4 = [0u8; 8];
        for (i, byte) in data4.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&tail[i * 2..i * 2 + 2], 16)
                .map_err(|_| malformed("bad data4"))?;
        }

        Ok(Self::new(data1, data2, data3, data4))
    }
}

/// Translate a GUID string from a platform or package description.
///
/// Accepts the canonical form, the literals `"0"` / `"0x0"` (the null
/// GUID), or an 11-field C initializer, optionally wrapped in braces.
pub fn translate_schema_string_to_guid(text: &str) -> Result<EfiGuid> {
    let trimmed = text.trim();

    if trimmed == "0" || trimmed.eq_ignore_ascii_case("0x0") {
        return Ok(EfiGuid::NULL);
    }

    if !trimmed.contains(',') && !trimmed.contains('{') {
        return trimmed.parse();
    }

    let flat: String = trimmed.chars().filter(|c| *c != '{' && *c != '}').collect();
    let fields: Vec<&str> = flat.split(',').map(str::trim).collect();
    if fields.len() != 11 {
        return Err(PcdError::MalformedGuid {
            text: text.to_string(),
            reason: format!("C initializer form needs 11 fields, found {}", fields.len()),
        });
    }

    // Strip "0x" and left-pad each field to its canonical width.
    let mut normalized = Vec::with_capacity(11);
    for (index, field) in fields.iter().enumerate() {
        let digits = field
            .strip_prefix("0x")
            .or_else(|| field.strip_prefix("0X"))
            .ok_or_else(|| PcdError::MalformedGuid {
                text: text.to_string(),
                reason: format!("field {} ('{field}') is not a hex literal", index + 1),
            })?;
        let width = match index {
            0 => 8,
            1 | 2 => 4,
            _ => 2,
        };
        if digits.is_empty() || digits.len() > width {
            return Err(PcdError::MalformedGuid {
                text: text.to_string(),
                reason: format!("field {} ('{field}') does not fit in {} hex digits", index + 1, width),
            });
        }
        normalized.push(format!("{digits:0>width$}"));
    }

    let canonical = format!(
        "{}-{}-{}-{}{}-{}",
        normalized[0],
        normalized[1],
        normalized[2],
        normalized[3],
        normalized[4],
        normalized[5..].concat()
    );
    canonical.parse().map_err(|_| PcdError::MalformedGuid {
        text: text.to_string(),
        reason: "reassembled GUID is not valid hex".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "01234567-89ab-cdef-0123-456789abcdef";

    #[test]
    fn canonical_parses_and_displays() {
        let guid: EfiGuid = CANONICAL.parse().unwrap();
        assert_eq!(guid.data1, 0x0123_4567);
        assert_eq!(guid.data2, 0x89ab);
        assert_eq!(guid.data3, 0xcdef);
        assert_eq!(guid.data4, [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);
        assert_eq!(guid.to_string(), CANONICAL);
    }

    #[test]
    fn translate_canonical_matches_manual_parse() {
        let manual: EfiGuid = CANONICAL.parse().unwrap();
        assert_eq!(translate_schema_string_to_guid(CANONICAL).unwrap(), manual);
        assert_eq!(
            translate_schema_string_to_guid("  01234567-89AB-CDEF-0123-456789ABCDEF ").unwrap(),
            manual
        );
    }

    #[test]
    fn translate_array_form_matches_canonical() {
        let array = "0x01234567, 0x89AB, 0xCDEF, {0x01,0x23,0x45,0x67,0x89,0xAB,0xCD,0xEF}";
        assert_eq!(
            translate_schema_string_to_guid(array).unwrap(),
            translate_schema_string_to_guid(CANONICAL).unwrap()
        );
    }

    #[test]
    fn translate_array_form_pads_short_bytes() {
        let array = "{0x8be4df61, 0x93ca, 0x11d2, {0xaa, 0xd, 0x0, 0xe0, 0x98, 0x3, 0x2b, 0x8c}}";
        let guid = translate_schema_string_to_guid(array).unwrap();
        assert_eq!(guid.to_string(), "8be4df61-93ca-11d2-aa0d-00e098032b8c");
    }

    #[test]
    fn translate_null_forms() {
        assert_eq!(translate_schema_string_to_guid("0").unwrap(), EfiGuid::NULL);
        assert_eq!(translate_schema_string_to_guid("0x0").unwrap(), EfiGuid::NULL);
        assert!(EfiGuid::NULL.is_null());
    }

    #[test]
    fn translate_wrong_field_count_fails() {
        let err = translate_schema_string_to_guid("0x01234567, 0x89AB, 0xCDEF, {0x01,0x23}")
            .unwrap_err();
        assert!(err.to_string().contains("11 fields"), "unexpected error: {err}");
    }

    #[test]
    fn canonical_with_bad_digit_fails() {
        assert!("0123456g-89ab-cdef-0123-456789abcdef".parse::<EfiGuid>().is_err());
        assert!("01234567-89ab-cdef-0123".parse::<EfiGuid>().is_err());
    }

    #[test]
    fn key_string_replaces_dashes() {
        let guid: EfiGuid = CANONICAL.parse().unwrap();
        assert_eq!(guid.to_key_string(), "01234567_89ab_cdef_0123_456789abcdef");
    }
}
