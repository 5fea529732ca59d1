//! Platform PCD preprocessing.
//!
//! Walks every module's PCD build definitions, cross-checks modules that
//! share a PCD, resolves dynamic PCDs against the platform's dynamic
//! declarations (SKU data, HII and VPD storage), and finally adds DYNAMIC_EX
//! declarations that no module references. The result is a populated
//! [`MemoryDatabase`] with local token numbers assigned.

use std::collections::HashSet;
use std::collections::hash_map::Entry;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::database::MemoryDatabase;
use crate::datum::{DatumType, DatumValue, decode_number};
use crate::error::{HiiField, PcdError, Result};
use crate::guid::translate_schema_string_to_guid;
use crate::sku::{SkuInstance, SkuValue, scan_variable_name};
use crate::source::{
    DYNAMIC_DECLARATIONS, DynamicPcdBuildData, ModulePcdInfo, PcdBuildDefinition,
    PlatformPcdDataSource, resolve_token_space,
};
use crate::token::{PcdType, Token};
use crate::usage::{ModuleIdentity, UsageInstance};
use crate::verbose::Timer;
use crate::{dprintln, vprintln};

/// What to do when a PCD fails a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Stop at the first error.
    #[serde(alias = "abort")]
    AbortOnFirst,
    /// Skip the offending PCD, keep going, and report everything at the end.
    #[default]
    Collect,
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "abort" | "abort-on-first" => Ok(Self::AbortOnFirst),
            "collect" => Ok(Self::Collect),
            other => Err(format!(
                "unknown error policy '{other}' (expected 'abort' or 'collect')"
            )),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AbortOnFirst => "abort",
            Self::Collect => "collect",
        })
    }
}

/// Counts reported by a successful preprocessing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreprocessSummary {
    /// Modules in the platform description.
    pub modules: usize,
    /// Usage instances registered.
    pub usages: usize,
    /// Tokens in the database afterwards.
    pub tokens: usize,
    /// DYNAMIC_EX tokens added without any module reference.
    pub unreferenced_dynamic_ex: usize,
    /// Dynamic tokens placed in the PEI database.
    pub pei_tokens: usize,
    /// Dynamic tokens placed in the DXE database.
    pub dxe_tokens: usize,
}

/// Populate `db` from the platform's module and dynamic PCD information.
///
/// A missing module list is fatal under either policy. Under
/// [`ErrorPolicy::Collect`] every failing PCD is skipped and the errors are
/// returned together as [`PcdError::Multiple`]; the database then holds
/// whatever passed.
pub fn init_pcd_memory_db_with_platform_info<S: PlatformPcdDataSource + ?Sized>(
    db: &mut MemoryDatabase,
    source: &S,
    policy: ErrorPolicy,
) -> Result<PreprocessSummary> {
    let _t = Timer::start("pcd preprocessing");

    let modules = source.components().ok_or(PcdError::NoModules)?;
    dprintln!("Preprocessing PCDs of {} module(s)...", modules.len());

    let mut pass = Preprocessor {
        db,
        source,
        policy,
        errors: Vec::new(),
        referenced: HashSet::new(),
        summary: PreprocessSummary {
            modules: modules.len(),
            ..PreprocessSummary::default()
        },
    };

    for module in modules {
        pass.process_module(module)?;
    }
    pass.add_unreferenced_dynamic_ex()?;
    pass.finish()
}

struct Preprocessor<'a, S: ?Sized> {
    db: &'a mut MemoryDatabase,
    source: &'a S,
    policy: ErrorPolicy,
    errors: Vec<PcdError>,
    /// Primary keys named by any module, including ones whose PCD failed.
    referenced: HashSet<String>,
    summary: PreprocessSummary,
}

impl<S: PlatformPcdDataSource + ?Sized> Preprocessor<'_, S> {
    /// Apply the error policy to a failed check.
    fn record(&mut self, err: PcdError) -> Result<()> {
        match self.policy {
            ErrorPolicy::AbortOnFirst => Err(err),
            ErrorPolicy::Collect => {
                vprintln!("  error: {err}");
                self.errors.push(err);
                Ok(())
            }
        }
    }

    fn process_module(&mut self, module: &ModulePcdInfo) -> Result<()> {
        let identity = match module_identity(module) {
            Ok(identity) => identity,
            Err(err) => return self.record(err),
        };
        vprintln!(
            "  module {} ({}, {}): {} PCD(s)",
            identity.name,
            identity.module_type,
            identity.arch,
            module.pcds.len()
        );

        for def in &module.pcds {
            if let Err(err) = self.process_pcd(&identity, def) {
                self.record(err)?;
            }
        }
        Ok(())
    }

    fn process_pcd(&mut self, identity: &ModuleIdentity, def: &PcdBuildDefinition) -> Result<()> {
        let source = self.source;
        let cname = def.cname.as_str();
        let module = identity.name.as_str();

        let token_space_guid = resolve_token_space(source, cname, module, def.token_space.as_deref())?;
        let key = Token::primary_key_string(cname, &token_space_guid);
        self.referenced.insert(key.clone());
        let pcd_type = parse_item_type(cname, module, &def.item_type)?;
        let datum_type = parse_datum_type(cname, module, &def.datum_type)?;
        let token_number = decode_u32(cname, module, "token number", &def.token)?;
        let datum = def.value.as_deref().map(str::trim).filter(|v| !v.is_empty());

        if pcd_type == PcdType::DynamicEx && lacks_token_space(def.token_space.as_deref()) {
            return Err(PcdError::MissingTokenSpace {
                cname: cname.to_string(),
                module: module.to_string(),
            });
        }
        if pcd_type == PcdType::FeatureFlag && datum_type != DatumType::Boolean {
            return Err(PcdError::FeatureFlagNotBoolean {
                cname: cname.to_string(),
                module: module.to_string(),
                datum_type: datum_type.as_str().to_string(),
            });
        }
        if !pcd_type.is_dynamic() {
            let Some(value) = datum else {
                return Err(PcdError::MissingValue {
                    cname: cname.to_string(),
                    module: module.to_string(),
                    item_type: pcd_type.as_str().to_string(),
                });
            };
            let max_size = if def.max_datum_size > 0 {
                def.max_datum_size
            } else {
                datum_type.fixed_size().unwrap_or(0)
            };
            verify(source, cname, module, value, datum_type, max_size)?;
        }

        let token = match self.db.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let token = entry.into_mut();
                check_consistency(token, module, pcd_type, datum_type, token_number, datum, def.max_datum_size)?;
                if let (true, Some(value)) = (token.is_dynamic_pcd, datum) {
                    verify(source, cname, module, value, datum_type, token.datum_size)?;
                }
                if token.token_space_cname.is_none() {
                    token.token_space_cname.clone_from(&def.token_space);
                }
                token
            }
            Entry::Vacant(entry) => {
                let mut token = Token::new(cname, token_space_guid, pcd_type, datum_type, token_number);
                token.token_space_cname.clone_from(&def.token_space);
                if pcd_type.is_dynamic() {
                    let decl = source.dynamic_info(&token, module)?.ok_or_else(|| {
                        PcdError::MissingDynamicDeclaration {
                            cname: cname.to_string(),
                            module: module.to_string(),
                        }
                    })?;
                    apply_dynamic_declaration(source, &mut token, module, decl, datum, def.max_datum_size)?;
                } else if datum_type == DatumType::Pointer {
                    token.datum_size = def.max_datum_size;
                }
                vprintln!("    new token {key} ({pcd_type}, {datum_type})");
                entry.insert(token)
            }
        };

        token.add_supported_pcd_type(pcd_type);
        token.add_usage_instance(UsageInstance::new(
            key,
            identity.clone(),
            pcd_type,
            def.usage,
            datum.map(str::to_string),
            def.max_datum_size,
            def.inherited,
        ))?;
        self.summary.usages += 1;
        Ok(())
    }

    fn add_unreferenced_dynamic_ex(&mut self) -> Result<()> {
        let source = self.source;
        for decl in source.all_dynamic_pcd_info() {
            match self.add_unreferenced(decl) {
                Ok(true) => self.summary.unreferenced_dynamic_ex += 1,
                Ok(false) => {}
                Err(err) => self.record(err)?,
            }
        }
        Ok(())
    }

    /// Add one declaration no module referenced. Returns `false` if a
    /// module named the token, whether or not its PCD passed.
    fn add_unreferenced(&mut self, decl: &DynamicPcdBuildData) -> Result<bool> {
        let source = self.source;
        let module = DYNAMIC_DECLARATIONS;
        let cname = decl.cname.as_str();

        let guid = resolve_token_space(source, cname, module, decl.token_space.as_deref())?;
        let key = Token::primary_key_string(cname, &guid);
        if self.referenced.contains(&key) || self.db.is_token_in_database(&key) {
            return Ok(false);
        }

        match parse_item_type(cname, module, &decl.item_type)? {
            PcdType::DynamicEx => {}
            PcdType::Dynamic => {
                return Err(PcdError::UnreferencedDynamic {
                    cname: cname.to_string(),
                });
            }
            other => {
                return Err(PcdError::NotDynamicInDeclaration {
                    cname: cname.to_string(),
                    item_type: other.as_str().to_string(),
                });
            }
        }
        if lacks_token_space(decl.token_space.as_deref()) {
            return Err(PcdError::MissingTokenSpace {
                cname: cname.to_string(),
                module: module.to_string(),
            });
        }

        let datum_type = parse_datum_type(cname, module, &decl.datum_type)?;
        let token_number = decode_u32(cname, module, "token number", &decl.token)?;
        let mut token = Token::new(cname, guid, PcdType::DynamicEx, datum_type, token_number);
        token.token_space_cname.clone_from(&decl.token_space);
        apply_dynamic_declaration(source, &mut token, module, decl, None, 0)?;

        vprintln!("    unreferenced DYNAMIC_EX token {key}");
        self.db.add_token_to_database(key, token);
        Ok(true)
    }

    fn finish(self) -> Result<PreprocessSummary> {
        if !self.errors.is_empty() {
            return Err(PcdError::Multiple(self.errors));
        }

        let (pei_tokens, dxe_tokens) = self.db.assign_local_token_numbers();
        let summary = PreprocessSummary {
            tokens: self.db.len(),
            pei_tokens,
            dxe_tokens,
            ..self.summary
        };
        dprintln!(
            "PCD memory database: {} token(s), {} usage(s), {} PEI / {} DXE dynamic",
            summary.tokens,
            summary.usages,
            summary.pei_tokens,
            summary.dxe_tokens
        );
        Ok(summary)
    }
}

/// Cross-check a module's view of a PCD against the token already recorded.
fn check_consistency(
    token: &Token,
    module: &str,
    pcd_type: PcdType,
    datum_type: DatumType,
    token_number: u32,
    datum: Option<&str>,
    max_datum_size: u32,
) -> Result<()> {
    if token.datum_type != datum_type {
        return Err(PcdError::DatumTypeMismatch {
            cname: token.cname.clone(),
            module: module.to_string(),
            existing: token.datum_type.as_str().to_string(),
            found: datum_type.as_str().to_string(),
        });
    }
    if token.token_number != token_number {
        return Err(PcdError::TokenNumberMismatch {
            cname: token.cname.clone(),
            module: module.to_string(),
            existing: token.token_number,
            found: token_number,
        });
    }
    if token.is_dynamic_pcd != pcd_type.is_dynamic() {
        return Err(PcdError::DynamicMismatch {
            cname: token.cname.clone(),
            module: module.to_string(),
            existing_dynamic: token.is_dynamic_pcd,
        });
    }

    if token.is_dynamic_pcd {
        if let (Some(found), Some(expected)) = (datum, token.default_value_text()) {
            if !values_agree(expected, found, datum_type) {
                return Err(PcdError::DefaultValueMismatch {
                    cname: token.cname.clone(),
                    module: module.to_string(),
                    expected: expected.to_string(),
                    found: found.to_string(),
                });
            }
        }
        if max_datum_size != 0 && max_datum_size != token.datum_size {
            return Err(PcdError::MaxDatumSizeMismatch {
                cname: token.cname.clone(),
                module: module.to_string(),
                expected: token.datum_size,
                found: max_datum_size,
            });
        }
    }
    Ok(())
}

/// Fill a dynamic token's size and SKU data from its platform declaration.
///
/// `module_datum` and `module_max_size` are the referencing module's view;
/// both are absent for unreferenced declarations.
fn apply_dynamic_declaration<S: PlatformPcdDataSource + ?Sized>(
    source: &S,
    token: &mut Token,
    module: &str,
    decl: &DynamicPcdBuildData,
    module_datum: Option<&str>,
    module_max_size: u32,
) -> Result<()> {
    let cname = token.cname.clone();
    let datum_type = token.datum_type;

    let decl_type = parse_item_type(&cname, module, &decl.item_type)?;
    if !decl_type.is_dynamic() {
        return Err(PcdError::NotDynamicInDeclaration {
            cname,
            item_type: decl_type.as_str().to_string(),
        });
    }
    let decl_datum_type = parse_datum_type(&cname, module, &decl.datum_type)?;
    if decl_datum_type != datum_type {
        return Err(PcdError::DatumTypeMismatch {
            cname,
            module: module.to_string(),
            existing: decl_datum_type.as_str().to_string(),
            found: datum_type.as_str().to_string(),
        });
    }
    let decl_token = decode_u32(&cname, module, "token number", &decl.token)?;
    if decl_token != token.token_number {
        return Err(PcdError::TokenNumberMismatch {
            cname,
            module: module.to_string(),
            existing: decl_token,
            found: token.token_number,
        });
    }

    // The declaration's size is authoritative for dynamic PCDs.
    let size = if decl.max_datum_size > 0 {
        decl.max_datum_size
    } else {
        datum_type.fixed_size().unwrap_or(0)
    };
    if module_max_size != 0 && module_max_size != size {
        return Err(PcdError::MaxDatumSizeMismatch {
            cname,
            module: module.to_string(),
            expected: size,
            found: module_max_size,
        });
    }
    if let Some(value) = module_datum {
        verify(source, &cname, module, value, datum_type, size)?;
    }

    let mut skus: Vec<SkuInstance> = Vec::with_capacity(decl.skus.len());
    for info in &decl.skus {
        let id = decode_u32(&cname, module, "SKU id", &info.id)?;
        if skus.iter().any(|sku| sku.id == id) {
            return Err(PcdError::DuplicateSkuId {
                cname,
                module: module.to_string(),
                sku_id: id,
            });
        }

        let value = if let Some(value) = info.value.as_deref() {
            let value = value.trim();
            verify(source, &cname, module, value, datum_type, size)?;
            SkuValue::Default {
                value: value.to_string(),
            }
        } else if let Some(name) = info.variable_name.as_deref() {
            let missing = |field| PcdError::MissingHiiField {
                cname: cname.clone(),
                module: module.to_string(),
                sku_id: id,
                field,
            };
            let guid_cname = info
                .variable_guid
                .as_deref()
                .ok_or_else(|| missing(HiiField::VariableGuid))?;
            let offset_text = info
                .variable_offset
                .as_deref()
                .ok_or_else(|| missing(HiiField::VariableOffset))?;
            let default_value = info
                .hii_default_value
                .as_deref()
                .map(str::trim)
                .ok_or_else(|| missing(HiiField::HiiDefaultValue))?;

            let offset = decode_number(offset_text).ok_or_else(|| PcdError::InvalidNumber {
                cname: cname.clone(),
                module: module.to_string(),
                field: "variable offset",
                text: offset_text.to_string(),
            })?;
            let variable_offset = u16::try_from(offset).map_err(|_| PcdError::HiiOffsetOutOfRange {
                cname: cname.clone(),
                module: module.to_string(),
                offset,
            })?;
            let guid_text =
                source
                    .guid_info_from_spd(guid_cname)
                    .ok_or_else(|| PcdError::VariableGuidNotFound {
                        cname: cname.clone(),
                        module: module.to_string(),
                        guid_cname: guid_cname.to_string(),
                    })?;
            let variable_guid = translate_schema_string_to_guid(&guid_text)?;
            verify(source, &cname, module, default_value, datum_type, size)?;

            SkuValue::Hii {
                variable_name: scan_variable_name(name),
                variable_guid,
                variable_offset,
                default_value: default_value.to_string(),
            }
        } else if let Some(offset_text) = info.vpd_offset.as_deref() {
            SkuValue::Vpd {
                offset: decode_u32(&cname, module, "VPD offset", offset_text)?,
            }
        } else {
            return Err(PcdError::EmptySkuValue {
                cname,
                module: module.to_string(),
                sku_id: id,
            });
        };

        if let (0, Some(found), Some(expected)) = (id, module_datum, value.default_value()) {
            if !values_agree(expected, found, datum_type) {
                return Err(PcdError::DefaultValueMismatch {
                    cname,
                    module: module.to_string(),
                    expected: expected.to_string(),
                    found: found.to_string(),
                });
            }
        }
        skus.push(SkuInstance::new(id, value));
    }

    if !skus.iter().any(SkuInstance::is_default_sku) {
        return Err(PcdError::MissingDefaultSku {
            cname,
            module: module.to_string(),
        });
    }

    token.datum_size = size;
    token.sku_data = skus;
    vprintln!(
        "    {cname}: {} SKU(s), size {size}{}{}",
        token.sku_data.len(),
        if token.is_hii_enable() { ", HII" } else { "" },
        if token.is_vpd_enable() { ", VPD" } else { "" }
    );
    Ok(())
}

fn module_identity(module: &ModulePcdInfo) -> Result<ModuleIdentity> {
    let guid = |text: Option<&str>| {
        text.map(str::trim)
            .filter(|t| !t.is_empty())
            .map(translate_schema_string_to_guid)
            .transpose()
    };
    Ok(ModuleIdentity {
        name: module.name.clone(),
        guid: guid(module.guid.as_deref())?,
        package_name: module.package.clone(),
        package_guid: guid(module.package_guid.as_deref())?,
        arch: module.arch.clone(),
        version: module.version.clone(),
        module_type: module.module_type,
    })
}

fn verify<S: PlatformPcdDataSource + ?Sized>(
    source: &S,
    cname: &str,
    module: &str,
    datum: &str,
    datum_type: DatumType,
    max_size: u32,
) -> Result<()> {
    source
        .verify_datum(cname, module, datum, datum_type, max_size)
        .map_err(|message| PcdError::InvalidDatum {
            cname: cname.to_string(),
            module: module.to_string(),
            message,
        })
}

/// Two literals agree if they parse to the same value, or failing that,
/// match textually ignoring ASCII case.
fn values_agree(expected: &str, found: &str, datum_type: DatumType) -> bool {
    match (
        DatumValue::parse(expected, datum_type),
        DatumValue::parse(found, datum_type),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => expected.trim().eq_ignore_ascii_case(found.trim()),
    }
}

fn lacks_token_space(token_space: Option<&str>) -> bool {
    token_space.map(str::trim).is_none_or(str::is_empty)
}

fn parse_item_type(cname: &str, module: &str, text: &str) -> Result<PcdType> {
    text.trim()
        .parse()
        .map_err(|()| PcdError::UnknownItemType {
            cname: cname.to_string(),
            module: module.to_string(),
            text: text.to_string(),
        })
}

fn parse_datum_type(cname: &str, module: &str, text: &str) -> Result<DatumType> {
    text.trim()
        .parse()
        .map_err(|()| PcdError::UnknownDatumType {
            cname: cname.to_string(),
            module: module.to_string(),
            text: text.to_string(),
        })
}

fn decode_u32(cname: &str, module: &str, field: &'static str, text: &str) -> Result<u32> {
    decode_number(text)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| PcdError::InvalidNumber {
            cname: cname.to_string(),
            module: module.to_string(),
            field,
            text: text.to_string(),
        })
}
