//! The [`Token`] record: one PCD in the platform database.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::datum::{DatumType, DatumValue};
use crate::error::{PcdError, Result};
use crate::guid::EfiGuid;
use crate::sku::{SkuInstance, SkuValue};
use crate::usage::UsageInstance;

/// How a PCD is accessed by a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PcdType {
    /// Compile-time boolean switch.
    FeatureFlag,
    /// Constant baked into the module.
    FixedAtBuild,
    /// Global in the module image that tools may patch.
    PatchableInModule,
    /// Runtime value, looked up by local token number.
    Dynamic,
    /// Runtime value, looked up by token space GUID and token number.
    DynamicEx,
    /// Not yet known.
    Unknown,
}

impl PcdType {
    /// Name as written in descriptions.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FeatureFlag => "FEATURE_FLAG",
            Self::FixedAtBuild => "FIXED_AT_BUILD",
            Self::PatchableInModule => "PATCHABLE_IN_MODULE",
            Self::Dynamic => "DYNAMIC",
            Self::DynamicEx => "DYNAMIC_EX",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns `true` for `DYNAMIC` and `DYNAMIC_EX`.
    pub fn is_dynamic(self) -> bool {
        matches!(self, Self::Dynamic | Self::DynamicEx)
    }
}

impl fmt::Display for PcdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for PcdType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FEATURE_FLAG" => Ok(Self::FeatureFlag),
            "FIXED_AT_BUILD" => Ok(Self::FixedAtBuild),
            "PATCHABLE_IN_MODULE" => Ok(Self::PatchableInModule),
            "DYNAMIC" => Ok(Self::Dynamic),
            "DYNAMIC_EX" => Ok(Self::DynamicEx),
            _ => Err(()),
        }
    }
}

/// One PCD, shared by every module that references its primary key.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    /// Symbolic name.
    pub cname: String,
    /// Token space; [`EfiGuid::NULL`] when none was declared.
    pub token_space_guid: EfiGuid,
    /// Symbolic token-space name, if declared.
    pub token_space_cname: Option<String>,
    /// Platform-assigned token number.
    pub token_number: u32,
    /// Index in the PEI or DXE dynamic database, once assigned.
    pub local_token_number: Option<u32>,
    /// Type of the first declaration.
    pub pcd_type: PcdType,
    /// Datum type shared by every usage.
    pub datum_type: DatumType,
    /// Byte size, or maximum size for `VOID*`.
    pub datum_size: u32,
    /// Whether every usage treats this PCD as dynamic.
    pub is_dynamic_pcd: bool,
    /// Per-SKU values, in declaration order. Dynamic tokens only.
    pub sku_data: Vec<SkuInstance>,
    /// Every item type a module declared this PCD with.
    pub supported_pcd_types: Vec<PcdType>,
    /// Producing modules, in registration order.
    pub producers: Vec<UsageInstance>,
    /// Consuming modules, in registration order.
    pub consumers: Vec<UsageInstance>,
}

impl Token {
    /// Create a provisional token with no SKU data or usages.
    pub fn new(
        cname: impl Into<String>,
        token_space_guid: EfiGuid,
        pcd_type: PcdType,
        datum_type: DatumType,
        token_number: u32,
    ) -> Self {
        Self {
            cname: cname.into(),
            token_space_guid,
            token_space_cname: None,
            token_number,
            local_token_number: None,
            pcd_type,
            datum_type,
            datum_size: datum_type.fixed_size().unwrap_or(0),
            is_dynamic_pcd: pcd_type.is_dynamic(),
            sku_data: Vec::new(),
            supported_pcd_types: vec![pcd_type],
            producers: Vec::new(),
            consumers: Vec::new(),
        }
    }

    /// Primary key for a C name and token space.
    pub fn primary_key_string(cname: &str, token_space_guid: &EfiGuid) -> String {
        format!("{cname}_{}", token_space_guid.to_key_string())
    }

    /// This token's primary key.
    pub fn primary_key(&self) -> String {
        Self::primary_key_string(&self.cname, &self.token_space_guid)
    }

    /// Record an item type a module used; the set only grows.
    pub fn add_supported_pcd_type(&mut self, pcd_type: PcdType) {
        if !self.is_supported_pcd_type(pcd_type) {
            self.supported_pcd_types.push(pcd_type);
        }
    }

    /// Whether some module declared this PCD with `pcd_type`.
    pub fn is_supported_pcd_type(&self, pcd_type: PcdType) -> bool {
        self.supported_pcd_types.contains(&pcd_type)
    }

    /// Register a usage instance as producer or consumer.
    ///
    /// Fails if a usage with the same composite key already exists in
    /// either list.
    pub fn add_usage_instance(&mut self, usage: UsageInstance) -> Result<()> {
        let key = usage.primary_key();
        if self.usage_instance(&key).is_some() {
            return Err(PcdError::DuplicateUsage {
                cname: self.cname.clone(),
                module: usage.module_name.clone(),
                key,
            });
        }
        if usage.usage.is_producer() {
            self.producers.push(usage);
        } else {
            self.consumers.push(usage);
        }
        Ok(())
    }

    /// Look up a usage instance by its composite key.
    pub fn usage_instance(&self, key: &str) -> Option<&UsageInstance> {
        self.usage_instances().find(|u| u.primary_key() == key)
    }

    /// Producers followed by consumers.
    pub fn usage_instances(&self) -> impl Iterator<Item = &UsageInstance> {
        self.producers.iter().chain(self.consumers.iter())
    }

    /// The SKU 0 entry, if present.
    pub fn default_sku(&self) -> Option<&SkuInstance> {
        self.sku_data.iter().find(|sku| sku.is_default_sku())
    }

    /// The SKU 0 literal default (or HII default), if any.
    pub fn default_value_text(&self) -> Option<&str> {
        self.default_sku().and_then(|sku| sku.value.default_value())
    }

    /// More than one SKU is declared.
    pub fn is_sku_enable(&self) -> bool {
        self.sku_data.len() > 1
    }

    /// Any SKU is HII backed.
    pub fn is_hii_enable(&self) -> bool {
        self.sku_data
            .iter()
            .any(|sku| matches!(sku.value, SkuValue::Hii { .. }))
    }

    /// Any SKU is VPD backed.
    pub fn is_vpd_enable(&self) -> bool {
        self.sku_data
            .iter()
            .any(|sku| matches!(sku.value, SkuValue::Vpd { .. }))
    }

    /// Whether the default SKU needs an initialized slot in the dynamic
    /// database: HII and VPD always do, a literal only when non-zero.
    pub fn has_default_value(&self) -> bool {
        match self.default_sku().map(|sku| &sku.value) {
            Some(SkuValue::Hii { .. } | SkuValue::Vpd { .. }) => true,
            Some(SkuValue::Default { value }) => DatumValue::parse(value, self.datum_type)
                .map(|v| !v.is_zero())
                .unwrap_or(false),
            None => false,
        }
    }

    /// Whether the default SKU value is a wide string.
    pub fn is_unicode_string_type(&self) -> bool {
        self.datum_type == DatumType::Pointer
            && matches!(
                self.default_value_text()
                    .and_then(|v| DatumValue::parse(v, DatumType::Pointer).ok()),
                Some(DatumValue::UnicodeString(_))
            )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) token {:#x} {} {}",
            self.cname, self.token_space_guid, self.token_number, self.pcd_type, self.datum_type
        )
    }
}
