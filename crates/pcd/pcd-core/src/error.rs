//! Error types for platform PCD preprocessing.
//!
//! Every variant that concerns a single PCD carries the PCD's C name and the
//! module (or declaration block) that triggered it, since a platform usually
//! spans hundreds of PCDs across dozens of modules.

use std::fmt;

/// Which HII field of a SKU entry is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiiField {
    /// `VariableGuid`.
    VariableGuid,
    /// `VariableOffset`.
    VariableOffset,
    /// `HiiDefaultValue`.
    HiiDefaultValue,
}

impl HiiField {
    /// Field name as it appears in the platform description.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VariableGuid => "VariableGuid",
            Self::VariableOffset => "VariableOffset",
            Self::HiiDefaultValue => "HiiDefaultValue",
        }
    }
}

/// Errors that can occur while building the PCD memory database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PcdError {
    /// The platform description contains no module list at all.
    NoModules,
    /// A GUID string could not be translated.
    MalformedGuid { text: String, reason: String },
    /// A token-space C name is not declared by any package.
    TokenSpaceNotFound { cname: String, module: String, token_space: String },
    /// An HII variable GUID C name is not declared by any package.
    VariableGuidNotFound { cname: String, module: String, guid_cname: String },
    /// A DYNAMIC_EX PCD has no token space.
    MissingTokenSpace { cname: String, module: String },
    /// An item type string is not recognized.
    UnknownItemType { cname: String, module: String, text: String },
    /// A datum type string is not recognized.
    UnknownDatumType { cname: String, module: String, text: String },
    /// A numeric field could not be decoded.
    InvalidNumber { cname: String, module: String, field: &'static str, text: String },
    /// A FEATURE_FLAG PCD is declared with a non-BOOLEAN datum type.
    FeatureFlagNotBoolean { cname: String, module: String, datum_type: String },
    /// A non-dynamic PCD has no value.
    MissingValue { cname: String, module: String, item_type: String },
    /// A value failed datum validation.
    InvalidDatum { cname: String, module: String, message: String },
    /// Two modules disagree on the datum type.
    DatumTypeMismatch { cname: String, module: String, existing: String, found: String },
    /// Two modules disagree on the token number.
    TokenNumberMismatch { cname: String, module: String, existing: u32, found: u32 },
    /// Two modules disagree on the dynamic classification.
    DynamicMismatch { cname: String, module: String, existing_dynamic: bool },
    /// A module value disagrees with the SKU 0 default of a dynamic PCD.
    DefaultValueMismatch { cname: String, module: String, expected: String, found: String },
    /// A module max datum size disagrees with the dynamic declaration.
    MaxDatumSizeMismatch { cname: String, module: String, expected: u32, found: u32 },
    /// A dynamic PCD used by a module has no dynamic declaration.
    MissingDynamicDeclaration { cname: String, module: String },
    /// A dynamic declaration carries a non-dynamic item type.
    NotDynamicInDeclaration { cname: String, item_type: String },
    /// An HII SKU entry lacks one of its required fields.
    MissingHiiField { cname: String, module: String, sku_id: u32, field: HiiField },
    /// An HII variable offset does not fit in 16 bits.
    HiiOffsetOutOfRange { cname: String, module: String, offset: u64 },
    /// A SKU entry carries none of Value, VariableName and VpdOffset.
    EmptySkuValue { cname: String, module: String, sku_id: u32 },
    /// Two SKU entries share an id.
    DuplicateSkuId { cname: String, module: String, sku_id: u32 },
    /// A dynamic PCD has no SKU 0 entry.
    MissingDefaultSku { cname: String, module: String },
    /// The same module registered the same PCD twice.
    DuplicateUsage { cname: String, module: String, key: String },
    /// A DYNAMIC (not DYNAMIC_EX) declaration that no module references.
    UnreferencedDynamic { cname: String },
    /// Errors accumulated under the collecting policy.
    Multiple(Vec<PcdError>),
}

impl PcdError {
    /// Number of individual errors this value represents.
    pub fn count(&self) -> usize {
        match self {
            Self::Multiple(errors) => errors.iter().map(PcdError::count).sum(),
            _ => 1,
        }
    }
}

impl fmt::Display for PcdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoModules => write!(f, "no modules found in the platform description"),
            Self::MalformedGuid { text, reason } => {
                write!(f, "malformed GUID string '{text}': {reason}")
            }
            Self::TokenSpaceNotFound { cname, module, token_space } => write!(
                f,
                "PCD {cname} in module {module}: token space '{token_space}' is not declared by any package"
            ),
            Self::VariableGuidNotFound { cname, module, guid_cname } => write!(
                f,
                "PCD {cname} in module {module}: HII variable GUID '{guid_cname}' is not declared by any package"
            ),
            Self::MissingTokenSpace { cname, module } => write!(
                f,
                "PCD {cname} in module {module} is DYNAMIC_EX but declares no token space"
            ),
            Self::UnknownItemType { cname, module, text } => {
                write!(f, "PCD {cname} in module {module}: unknown item type '{text}'")
            }
            Self::UnknownDatumType { cname, module, text } => {
                write!(f, "PCD {cname} in module {module}: unknown datum type '{text}'")
            }
            Self::InvalidNumber { cname, module, field, text } => {
                write!(f, "PCD {cname} in module {module}: invalid {field} '{text}'")
            }
            Self::FeatureFlagNotBoolean { cname, module, datum_type } => write!(
                f,
                "PCD {cname} in module {module} is FEATURE_FLAG but its datum type is {datum_type}, not BOOLEAN"
            ),
            Self::MissingValue { cname, module, item_type } => write!(
                f,
                "PCD {cname} in module {module} is {item_type} but has no value"
            ),
            Self::InvalidDatum { cname, module, message } => {
                write!(f, "PCD {cname} in module {module}: {message}")
            }
            Self::DatumTypeMismatch { cname, module, existing, found } => write!(
                f,
                "PCD {cname} in module {module} has datum type {found}, but other modules declare {existing}"
            ),
            Self::TokenNumberMismatch { cname, module, existing, found } => write!(
                f,
                "PCD {cname} in module {module} has token number {found:#x}, but it was already assigned {existing:#x}"
            ),
            Self::DynamicMismatch { cname, module, existing_dynamic } => {
                let (was, now) = if *existing_dynamic {
                    ("dynamic", "non-dynamic")
                } else {
                    ("non-dynamic", "dynamic")
                };
                write!(
                    f,
                    "PCD {cname} is {now} in module {module}, but other modules use it as {was}"
                )
            }
            Self::DefaultValueMismatch { cname, module, expected, found } => write!(
                f,
                "PCD {cname} in module {module} has value {found}, but the SKU 0 default in the dynamic declaration is {expected}"
            ),
            Self::MaxDatumSizeMismatch { cname, module, expected, found } => write!(
                f,
                "PCD {cname} in module {module} has max datum size {found}, but the dynamic declaration gives {expected}"
            ),
            Self::MissingDynamicDeclaration { cname, module } => write!(
                f,
                "PCD {cname} is dynamic in module {module} but has no entry in the dynamic PCD build definitions"
            ),
            Self::NotDynamicInDeclaration { cname, item_type } => write!(
                f,
                "PCD {cname} is declared as {item_type} in the dynamic PCD build definitions"
            ),
            Self::MissingHiiField { cname, module, sku_id, field } => write!(
                f,
                "PCD {cname} in module {module}: SKU {sku_id} has a VariableName but no {}",
                field.as_str()
            ),
            Self::HiiOffsetOutOfRange { cname, module, offset } => write!(
                f,
                "PCD {cname} in module {module}: HII variable offset {offset:#x} exceeds 0xFFFF"
            ),
            Self::EmptySkuValue { cname, module, sku_id } => write!(
                f,
                "PCD {cname} in module {module}: SKU {sku_id} dynamic info must be one of DefaultGroup, HIIGroup or VpdGroup"
            ),
            Self::DuplicateSkuId { cname, module, sku_id } => write!(
                f,
                "PCD {cname} in module {module}: SKU {sku_id} is declared more than once"
            ),
            Self::MissingDefaultSku { cname, module } => write!(
                f,
                "PCD {cname} in module {module}: dynamic PCD has no SKU 0 entry"
            ),
            Self::DuplicateUsage { cname, module, key } => write!(
                f,
                "PCD {cname} for module {module} is already registered (usage key {key}); \
                 check the module's PCD build definitions for duplicates"
            ),
            Self::UnreferencedDynamic { cname } => write!(
                f,
                "PCD {cname} is DYNAMIC in the dynamic PCD build definitions but no module references it; \
                 only DYNAMIC_EX PCDs may be unreferenced"
            ),
            Self::Multiple(errors) => {
                writeln!(f, "{} error(s) found while preprocessing platform PCDs:", errors.len())?;
                for (index, err) in errors.iter().enumerate() {
                    writeln!(f, "  [{}] {err}", index + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for PcdError {}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PcdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_pcd_and_module() {
        let err = PcdError::DatumTypeMismatch {
            cname: "PcdX".into(),
            module: "ModuleB".into(),
            existing: "UINT32".into(),
            found: "UINT64".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("PcdX"), "unexpected message: {msg}");
        assert!(msg.contains("ModuleB"), "unexpected message: {msg}");
    }

    #[test]
    fn multiple_counts_and_numbers_entries() {
        let err = PcdError::Multiple(vec![
            PcdError::UnreferencedDynamic { cname: "PcdA".into() },
            PcdError::MissingDefaultSku { cname: "PcdB".into(), module: "M".into() },
        ]);
        assert_eq!(err.count(), 2);
        let msg = err.to_string();
        assert!(msg.starts_with("2 error(s)"), "unexpected message: {msg}");
        assert!(msg.contains("[1]") && msg.contains("[2]"));
    }
}
