//! Module bindings to PCDs and the autogen text they produce.
//!
//! A [`UsageInstance`] records that one module produces or consumes one
//! [`Token`]. It refers to its token by primary key; the token owns it.
//! [`UsageInstance::generate_autogen`] renders the `AutoGen.h` / `AutoGen.c`
//! fragments for the binding from the usage and its token.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::datum::{DatumType, DatumValue};
use crate::error::{PcdError, Result};
use crate::guid::EfiGuid;
use crate::token::{PcdType, Token};

/// Firmware module type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleType {
    #[default]
    Base,
    Sec,
    PeiCore,
    Peim,
    DxeCore,
    DxeDriver,
    DxeRuntimeDriver,
    DxeSalDriver,
    DxeSmmDriver,
    UefiDriver,
    UefiApplication,
    Tool,
    UserDefined,
}

impl ModuleType {
    /// Component type name as written in module descriptions.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "BASE",
            Self::Sec => "SEC",
            Self::PeiCore => "PEI_CORE",
            Self::Peim => "PEIM",
            Self::DxeCore => "DXE_CORE",
            Self::DxeDriver => "DXE_DRIVER",
            Self::DxeRuntimeDriver => "DXE_RUNTIME_DRIVER",
            Self::DxeSalDriver => "DXE_SAL_DRIVER",
            Self::DxeSmmDriver => "DXE_SMM_DRIVER",
            Self::UefiDriver => "UEFI_DRIVER",
            Self::UefiApplication => "UEFI_APPLICATION",
            Self::Tool => "TOOL",
            Self::UserDefined => "USER_DEFINED",
        }
    }

    /// Runs in the PEI phase.
    pub fn is_pei_phase(self) -> bool {
        matches!(self, Self::PeiCore | Self::Peim)
    }

    /// Runs in the DXE phase.
    pub fn is_dxe_phase(self) -> bool {
        matches!(
            self,
            Self::DxeCore
                | Self::DxeDriver
                | Self::DxeRuntimeDriver
                | Self::DxeSalDriver
                | Self::DxeSmmDriver
                | Self::UefiDriver
                | Self::UefiApplication
        )
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a module produces or consumes a PCD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PcdUsage {
    AlwaysProduced,
    SometimesProduced,
    #[default]
    AlwaysConsumed,
    SometimesConsumed,
}

impl PcdUsage {
    /// `ALWAYS_PRODUCED` or `SOMETIMES_PRODUCED`.
    pub fn is_producer(self) -> bool {
        matches!(self, Self::AlwaysProduced | Self::SometimesProduced)
    }
}

/// Identity of the module a usage belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleIdentity {
    pub name: String,
    pub guid: Option<EfiGuid>,
    pub package_name: String,
    pub package_guid: Option<EfiGuid>,
    pub arch: String,
    pub version: String,
    pub module_type: ModuleType,
}

impl ModuleIdentity {
    /// Composite key: module, package, arch and version.
    pub fn primary_key(&self) -> String {
        let guid = |g: &Option<EfiGuid>| g.map(|g| g.to_key_string()).unwrap_or_default();
        format!(
            "{}_{}_{}_{}_{}_{}",
            self.name,
            guid(&self.guid),
            self.package_name,
            guid(&self.package_guid),
            self.arch,
            self.version
        )
    }
}

/// Kind of build the autogen text is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutogenTarget {
    /// A module: values are known and globals are defined.
    Module,
    /// A library instance: only `extern` declarations and access macros.
    Library,
}

/// Generated `AutoGen.h` / `AutoGen.c` text for one binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutogenFragments {
    /// Header text.
    pub header: String,
    /// C source text.
    pub source: String,
}

/// One module's binding to one PCD.
#[derive(Debug, Clone, Serialize)]
pub struct UsageInstance {
    /// Primary key of the owning token.
    pub token_key: String,
    pub module_name: String,
    pub module: ModuleIdentity,
    /// Item type as declared by this module.
    pub module_pcd_type: PcdType,
    pub usage: PcdUsage,
    /// Value literal declared by this module, if any.
    pub datum: Option<String>,
    pub max_datum_size: u32,
    /// Pulled in from a library instance rather than declared by the module.
    pub inherited: bool,
}

impl UsageInstance {
    /// Create a usage instance for the token with primary key `token_key`.
    pub fn new(
        token_key: impl Into<String>,
        module: ModuleIdentity,
        module_pcd_type: PcdType,
        usage: PcdUsage,
        datum: Option<String>,
        max_datum_size: u32,
        inherited: bool,
    ) -> Self {
        Self {
            token_key: token_key.into(),
            module_name: module.name.clone(),
            module,
            module_pcd_type,
            usage,
            datum,
            max_datum_size,
            inherited,
        }
    }

    /// Composite key of the owning module.
    pub fn primary_key(&self) -> String {
        self.module.primary_key()
    }

    /// The module runs in the PEI phase.
    pub fn is_pei_phase_component(&self) -> bool {
        self.module.module_type.is_pei_phase()
    }

    /// Component type name of the owning module.
    pub fn component_type_name(&self) -> &'static str {
        self.module.module_type.as_str()
    }

    /// Render the autogen fragments for this binding.
    pub fn generate_autogen(&self, token: &Token, target: AutogenTarget) -> Result<AutogenFragments> {
        let cname = &token.cname;
        let token_number = match self.module_pcd_type {
            PcdType::Dynamic => token.local_token_number.unwrap_or(token.token_number),
            _ => token.token_number,
        };

        let mut out = AutogenFragments::default();
        out.header
            .push_str(&format!("#define _PCD_TOKEN_{cname}  {token_number:#x}U\n"));

        match self.module_pcd_type {
            PcdType::FeatureFlag | PcdType::FixedAtBuild => {
                self.emit_static(token, target, StaticKind::FixedAtBuild, &mut out)?;
            }
            PcdType::PatchableInModule => {
                self.emit_static(token, target, StaticKind::BinaryPatch, &mut out)?;
            }
            PcdType::Dynamic => emit_dynamic(token, None, &mut out),
            PcdType::DynamicEx => {
                let space = token.token_space_cname.as_deref().ok_or_else(|| {
                    PcdError::MissingTokenSpace {
                        cname: cname.clone(),
                        module: self.module_name.clone(),
                    }
                })?;
                out.header.push_str(&format!("extern EFI_GUID {space};\n"));
                emit_dynamic(token, Some(space), &mut out);
            }
            PcdType::Unknown => {
                return Err(PcdError::UnknownItemType {
                    cname: cname.clone(),
                    module: self.module_name.clone(),
                    text: PcdType::Unknown.as_str().into(),
                });
            }
        }

        Ok(out)
    }

    fn parsed_datum(&self, token: &Token) -> Result<DatumValue> {
        let text = self.datum.as_deref().ok_or_else(|| PcdError::MissingValue {
            cname: token.cname.clone(),
            module: self.module_name.clone(),
            item_type: self.module_pcd_type.as_str().into(),
        })?;
        DatumValue::parse(text, token.datum_type).map_err(|message| PcdError::InvalidDatum {
            cname: token.cname.clone(),
            module: self.module_name.clone(),
            message,
        })
    }

    fn emit_static(
        &self,
        token: &Token,
        target: AutogenTarget,
        kind: StaticKind,
        out: &mut AutogenFragments,
    ) -> Result<()> {
        let cname = &token.cname;
        let datum_type = token.datum_type;
        let suffix = datum_type.autogen_suffix();
        let global = format!("{}{cname}", kind.prefix());
        let qualifier = kind.qualifier();

        if datum_type == DatumType::Pointer {
            let size = if self.max_datum_size > 0 {
                self.max_datum_size
            } else {
                token.datum_size
            };
            let h = &mut out.header;
            match target {
                AutogenTarget::Library => {
                    h.push_str(&format!("extern {qualifier}UINT8 {global}[];\n"));
                }
                AutogenTarget::Module => {
                    let value = self.parsed_datum(token)?;
                    let bytes = pointer_bytes(&value, size).map_err(|message| PcdError::InvalidDatum {
                        cname: cname.clone(),
                        module: self.module_name.clone(),
                        message,
                    })?;
                    h.push_str(&format!("#define _PCD_VALUE_{cname}  (VOID *){global}\n"));
                    h.push_str(&format!("extern {qualifier}UINT8 {global}[{size}];\n"));
                    out.source.push_str(&format!(
                        "GLOBAL_REMOVE_IF_UNREFERENCED {qualifier}UINT8 {global}[{size}] = {};\n",
                        byte_initializer(&bytes)
                    ));
                }
            }
            h.push_str(&format!("#define _PCD_GET_MODE_{suffix}_{cname}  (VOID *){global}\n"));
            match kind {
                StaticKind::FixedAtBuild => {
                    h.push_str(&format!("#define _PCD_SIZE_{cname}  {size}\n"));
                }
                StaticKind::BinaryPatch => {
                    h.push_str(&format!("#define _PCD_PATCHABLE_{cname}_SIZE  {size}\n"));
                    h.push_str(&format!(
                        "#define _PCD_SET_MODE_{suffix}_{cname}(SizeOfBuffer, Buffer)  \
                         LibPatchPcdSetPtr ({global}, (UINTN)_PCD_PATCHABLE_{cname}_SIZE, (SizeOfBuffer), (Buffer))\n"
                    ));
                }
            }
            return Ok(());
        }

        let ctype = datum_type.c_type();
        match target {
            AutogenTarget::Library => {
                out.header.push_str(&format!("extern {qualifier}{ctype} {global};\n"));
            }
            AutogenTarget::Module => {
                let value = self.parsed_datum(token)?;
                out.header.push_str(&format!(
                    "#define _PCD_VALUE_{cname}  {}\n",
                    value.to_c_literal(datum_type)
                ));
                out.header.push_str(&format!("extern {qualifier}{ctype} {global};\n"));
                out.source.push_str(&format!(
                    "GLOBAL_REMOVE_IF_UNREFERENCED {qualifier}{ctype} {global} = _PCD_VALUE_{cname};\n"
                ));
            }
        }
        out.header
            .push_str(&format!("#define _PCD_GET_MODE_{suffix}_{cname}  {global}\n"));
        if kind == StaticKind::BinaryPatch {
            out.header.push_str(&format!(
                "#define _PCD_SET_MODE_{suffix}_{cname}(Value)  ({global} = (Value))\n"
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StaticKind {
    FixedAtBuild,
    BinaryPatch,
}

impl StaticKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::FixedAtBuild => "_gPcd_FixedAtBuild_",
            Self::BinaryPatch => "_gPcd_BinaryPatch_",
        }
    }

    fn qualifier(self) -> &'static str {
        match self {
            Self::FixedAtBuild => "const ",
            Self::BinaryPatch => "volatile ",
        }
    }
}

fn emit_dynamic(token: &Token, space: Option<&str>, out: &mut AutogenFragments) {
    let cname = &token.cname;
    let suffix = token.datum_type.autogen_suffix();
    let (ex, key) = match space {
        Some(space) => ("Ex", format!("&{space}, _PCD_TOKEN_{cname}")),
        None => ("", format!("_PCD_TOKEN_{cname}")),
    };

    out.header.push_str(&format!(
        "#define _PCD_GET_MODE_{suffix}_{cname}  LibPcdGet{ex}{suffix}({key})\n"
    ));
    if token.datum_type == DatumType::Pointer {
        out.header.push_str(&format!(
            "#define _PCD_SET_MODE_{suffix}_{cname}(SizeOfBuffer, Buffer)  \
             LibPcdSet{ex}{suffix}({key}, (SizeOfBuffer), (Buffer))\n"
        ));
    } else {
        out.header.push_str(&format!(
            "#define _PCD_SET_MODE_{suffix}_{cname}(Value)  LibPcdSet{ex}{suffix}({key}, (Value))\n"
        ));
    }
}

/// Lay a `VOID*` value out as the bytes of a `size`-byte buffer, zero-padded.
///
/// A value longer than the buffer is an error; truncating would drop the
/// string terminator.
fn pointer_bytes(value: &DatumValue, size: u32) -> std::result::Result<Vec<u8>, String> {
    let mut bytes = match value {
        DatumValue::UnicodeString(s) => {
            let mut b: Vec<u8> = s.encode_utf16().flat_map(u16::to_le_bytes).collect();
            b.extend_from_slice(&[0, 0]);
            b
        }
        DatumValue::AsciiString(s) => {
            let mut b = s.as_bytes().to_vec();
            b.push(0);
            b
        }
        DatumValue::ByteArray(b) => b.clone(),
        DatumValue::Integer(v) => v.to_le_bytes().to_vec(),
        DatumValue::Boolean(b) => vec![u8::from(*b)],
    };
    let size = size as usize;
    if bytes.len() > size {
        return Err(format!(
            "value needs {} byte(s) but the buffer holds only {size}",
            bytes.len()
        ));
    }
    bytes.resize(size, 0);
    Ok(bytes)
}

fn byte_initializer(bytes: &[u8]) -> String {
    let items: Vec<String> = bytes.iter().map(|b| format!("0x{b:02x}")).collect();
    format!("{{ {} }}", items.join(", "))
}
