//! Input records and the data-source capability the preprocessor consumes.
//!
//! The records mirror the platform description's `<ModuleSA>` PCD build
//! definitions and `<DynamicPcdBuildDefinitions>`, already parsed. They
//! deserialize from the TOML platform description used by `pcdtool`, but any
//! type implementing [`PlatformPcdDataSource`] can feed the preprocessor.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use crate::datum::{self, DatumType};
use crate::error::{PcdError, Result};
use crate::guid::{EfiGuid, translate_schema_string_to_guid};
use crate::token::Token;
use crate::usage::{ModuleType, PcdUsage};

/// Module label used in errors raised while reading dynamic declarations.
pub const DYNAMIC_DECLARATIONS: &str = "<DynamicPcdBuildDefinitions>";

/// One PCD entry in a module's PCD build definition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PcdBuildDefinition {
    pub cname: String,
    /// Token-space GUID C name; absent means the null token space.
    #[serde(default)]
    pub token_space: Option<String>,
    pub item_type: String,
    pub datum_type: String,
    #[serde(deserialize_with = "number_text")]
    pub token: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub max_datum_size: u32,
    #[serde(default)]
    pub usage: PcdUsage,
    #[serde(default)]
    pub inherited: bool,
}

/// A module and the PCDs it declares.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModulePcdInfo {
    pub name: String,
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub package_guid: Option<String>,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub module_type: ModuleType,
    #[serde(default, rename = "pcd")]
    pub pcds: Vec<PcdBuildDefinition>,
}

/// One SKU entry of a dynamic PCD declaration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SkuInfo {
    #[serde(deserialize_with = "number_text")]
    pub id: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub variable_name: Option<String>,
    #[serde(default)]
    pub variable_guid: Option<String>,
    #[serde(default, deserialize_with = "optional_number_text")]
    pub variable_offset: Option<String>,
    #[serde(default)]
    pub hii_default_value: Option<String>,
    #[serde(default, deserialize_with = "optional_number_text")]
    pub vpd_offset: Option<String>,
}

/// A platform-level dynamic PCD declaration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DynamicPcdBuildData {
    pub cname: String,
    #[serde(default)]
    pub token_space: Option<String>,
    pub item_type: String,
    pub datum_type: String,
    #[serde(deserialize_with = "number_text")]
    pub token: String,
    #[serde(default)]
    pub max_datum_size: u32,
    #[serde(default, rename = "sku")]
    pub skus: Vec<SkuInfo>,
}

/// What the preprocessor needs from the platform build.
pub trait PlatformPcdDataSource {
    /// Per-module PCD declarations; `None` if the platform lists no modules.
    fn components(&self) -> Option<&[ModulePcdInfo]>;

    /// Resolve a token-space or variable GUID C name to its GUID string.
    fn guid_info_from_spd(&self, cname: &str) -> Option<String>;

    /// Every platform dynamic PCD declaration, in declaration order.
    fn all_dynamic_pcd_info(&self) -> &[DynamicPcdBuildData];

    /// Validate a value literal; `Err` carries the message.
    fn verify_datum(
        &self,
        cname: &str,
        module: &str,
        datum: &str,
        datum_type: DatumType,
        max_size: u32,
    ) -> std::result::Result<(), String> {
        datum::verify_datum(cname, module, datum, datum_type, max_size)
    }

    /// The dynamic declaration whose primary key matches `token`.
    fn dynamic_info(&self, token: &Token, module: &str) -> Result<Option<&DynamicPcdBuildData>> {
        for decl in self.all_dynamic_pcd_info() {
            if decl.cname != token.cname {
                continue;
            }
            let guid = resolve_token_space(self, &decl.cname, module, decl.token_space.as_deref())?;
            if guid == token.token_space_guid {
                return Ok(Some(decl));
            }
        }
        Ok(None)
    }
}

/// Resolve an optional token-space C name to a GUID.
///
/// No name (or an empty one) is the null token space.
pub fn resolve_token_space<S: PlatformPcdDataSource + ?Sized>(
    source: &S,
    cname: &str,
    module: &str,
    token_space: Option<&str>,
) -> Result<EfiGuid> {
    let Some(space) = token_space.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(EfiGuid::NULL);
    };
    let text = source
        .guid_info_from_spd(space)
        .ok_or_else(|| PcdError::TokenSpaceNotFound {
            cname: cname.to_string(),
            module: module.to_string(),
            token_space: space.to_string(),
        })?;
    translate_schema_string_to_guid(&text)
}

/// An already-parsed platform description.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlatformDescription {
    /// GUID C name → GUID string, as declared by the packages.
    #[serde(default)]
    pub guids: BTreeMap<String, String>,
    /// `None` when the description has no module list at all.
    #[serde(default, rename = "module")]
    pub modules: Option<Vec<ModulePcdInfo>>,
    #[serde(default, rename = "dynamic")]
    pub dynamic_pcds: Vec<DynamicPcdBuildData>,
}

impl PlatformPcdDataSource for PlatformDescription {
    fn components(&self) -> Option<&[ModulePcdInfo]> {
        self.modules.as_deref()
    }

    fn guid_info_from_spd(&self, cname: &str) -> Option<String> {
        self.guids.get(cname).cloned()
    }

    fn all_dynamic_pcd_info(&self) -> &[DynamicPcdBuildData] {
        &self.dynamic_pcds
    }
}

/// Accept either a TOML integer or a string for numeric fields, keeping the
/// text so decoding errors can quote it.
fn number_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(u64),
        Text(String),
    }

    Ok(match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => n.to_string(),
        NumberOrText::Text(s) => s,
    })
}

fn optional_number_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    number_text(deserializer).map(Some)
}
