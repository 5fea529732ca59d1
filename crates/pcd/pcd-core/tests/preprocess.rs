//! End-to-end preprocessing of a TOML platform description.
//!
//! Loads a small platform with static, dynamic, HII and DYNAMIC_EX PCDs,
//! builds the memory database, then exercises the queries a code generator
//! would run against it.

use pcd_core::{
    AutogenTarget, ErrorPolicy, MemoryDatabase, PcdError, PcdType, PlatformDescription, SkuValue,
    init_pcd_memory_db_with_platform_info,
};

const PLATFORM: &str = r#"
[guids]
gPlatformTokenSpaceGuid = "9a5163e7-5c29-453c-8000-000000000001"
gSetupVariableGuid = "{0xec87d643, 0xeba4, 0x4bb5, 0xa1, 0xe5, 0x3f, 0x3e, 0x36, 0xb2, 0x0d, 0xa9}"

[[module]]
name = "PlatformPei"
guid = "0x0"
package = "PlatformPkg"
arch = "IA32"
version = "1.0"
module-type = "PEIM"

[[module.pcd]]
cname = "PcdDebugEnable"
token-space = "gPlatformTokenSpaceGuid"
item-type = "FEATURE_FLAG"
datum-type = "BOOLEAN"
token = 1
value = "TRUE"

[[module.pcd]]
cname = "PcdBootTimeout"
token-space = "gPlatformTokenSpaceGuid"
item-type = "DYNAMIC"
datum-type = "UINT16"
token = 2
usage = "ALWAYS_PRODUCED"

[[module]]
name = "PlatformDxe"
package = "PlatformPkg"
arch = "X64"
version = "1.0"
module-type = "DXE_DRIVER"

[[module.pcd]]
cname = "PcdDebugEnable"
token-space = "gPlatformTokenSpaceGuid"
item-type = "FEATURE_FLAG"
datum-type = "BOOLEAN"
token = 1
value = "TRUE"

[[module.pcd]]
cname = "PcdBootTimeout"
token-space = "gPlatformTokenSpaceGuid"
item-type = "DYNAMIC"
datum-type = "UINT16"
token = 2
value = "5"

[[module.pcd]]
cname = "PcdFirmwareVendor"
token-space = "gPlatformTokenSpaceGuid"
item-type = "PATCHABLE_IN_MODULE"
datum-type = "VOID*"
token = 3
value = 'L"Acme"'
max-datum-size = 16

[[dynamic]]
cname = "PcdBootTimeout"
token-space = "gPlatformTokenSpaceGuid"
item-type = "DYNAMIC"
datum-type = "UINT16"
token = 2

[[dynamic.sku]]
id = 0
value = "0x5"

[[dynamic.sku]]
id = 1
variable-name = "{0x0054, 0x0069, 0x006d, 0x0065, 0x006f, 0x0075, 0x0074, 0x0000}"
variable-guid = "gSetupVariableGuid"
variable-offset = "0x4"
hii-default-value = "10"

[[dynamic]]
cname = "PcdPlatformBoardId"
token-space = "gPlatformTokenSpaceGuid"
item-type = "DYNAMIC_EX"
datum-type = "UINT32"
token = "0x100"

[[dynamic.sku]]
id = 0
vpd-offset = "0x20"
"#;

fn load() -> PlatformDescription {
    toml::from_str(PLATFORM).expect("fixture platform should parse")
}

fn preprocess(platform: &PlatformDescription) -> MemoryDatabase {
    let mut db = MemoryDatabase::new();
    init_pcd_memory_db_with_platform_info(&mut db, platform, ErrorPolicy::AbortOnFirst)
        .expect("fixture platform should preprocess cleanly");
    db
}

#[test]
fn builds_database_from_toml() {
    let db = preprocess(&load());
    assert_eq!(db.len(), 4);
    assert_eq!(db.dynamic_records().len(), 2);
    assert_eq!(db.dynamic_ex_tokens().len(), 1);

    let mut names = db.all_module_names();
    names.sort();
    assert_eq!(names, ["PlatformDxe", "PlatformPei"]);
}

#[test]
fn dynamic_sku_data_resolved() {
    let db = preprocess(&load());
    let token = db
        .record_array()
        .into_iter()
        .find(|t| t.cname == "PcdBootTimeout")
        .unwrap();

    assert!(token.is_sku_enable());
    assert!(token.is_hii_enable());
    assert_eq!(token.producers.len(), 1);
    assert_eq!(token.consumers.len(), 1);
    let SkuValue::Hii { variable_offset, default_value, .. } = &token.sku_data[1].value else {
        panic!("SKU 1 should be HII backed");
    };
    assert_eq!(*variable_offset, 4);
    assert_eq!(default_value, "10");
}

#[test]
fn pei_producer_puts_token_in_pei_database() {
    let db = preprocess(&load());
    let (pei, dxe) = db.two_phase_dynamic_record_array();
    let pei: Vec<&str> = pei.iter().map(|t| t.cname.as_str()).collect();
    let dxe: Vec<&str> = dxe.iter().map(|t| t.cname.as_str()).collect();
    assert_eq!(pei, ["PcdBootTimeout"]);
    assert_eq!(dxe, ["PcdPlatformBoardId"]);
}

#[test]
fn autogen_for_module_usages() {
    let db = preprocess(&load());
    let usages = db.usage_instances_by_module_name("platformdxe");
    assert_eq!(usages.len(), 3);

    let mut header = String::new();
    let mut source = String::new();
    for usage in &usages {
        let fragments = usage.generate_autogen(AutogenTarget::Module).unwrap();
        header.push_str(&fragments.header);
        source.push_str(&fragments.source);
    }

    assert!(header.contains("#define _PCD_VALUE_PcdDebugEnable  TRUE"), "header:\n{header}");
    assert!(header.contains("LibPcdGet16(_PCD_TOKEN_PcdBootTimeout)"), "header:\n{header}");
    assert!(header.contains("_PCD_PATCHABLE_PcdFirmwareVendor_SIZE  16"), "header:\n{header}");
    assert!(source.contains("_gPcd_BinaryPatch_PcdFirmwareVendor[16]"), "source:\n{source}");
}

#[test]
fn dump_lists_every_token() {
    let db = preprocess(&load());
    let mut out = Vec::new();
    db.dump_records(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("PCD memory database: 4 token(s)"));
    for cname in ["PcdDebugEnable", "PcdBootTimeout", "PcdFirmwareVendor", "PcdPlatformBoardId"] {
        assert!(text.contains(cname), "dump is missing {cname}:\n{text}");
    }
}

#[test]
fn collect_policy_reports_all_problems() {
    let mut platform = load();
    let modules = platform.modules.as_mut().unwrap();
    // Disagreeing dynamic default in one module, undeclared token space in another.
    modules[1].pcds[1].value = Some("6".into());
    modules[0].pcds[0].token_space = Some("gUnknownGuid".into());

    let mut db = MemoryDatabase::new();
    let err = init_pcd_memory_db_with_platform_info(&mut db, &platform, ErrorPolicy::Collect).unwrap_err();
    let PcdError::Multiple(errors) = &err else {
        panic!("expected a collected report, got {err}");
    };
    assert_eq!(errors.len(), 2, "report:\n{err}");
    let report = err.to_string();
    assert!(report.contains("gUnknownGuid"), "report:\n{report}");
    assert!(report.contains("PlatformDxe"), "report:\n{report}");
}

#[test]
fn static_tokens_keep_their_item_type() {
    let db = preprocess(&load());
    for token in db.record_array() {
        match token.cname.as_str() {
            "PcdDebugEnable" => assert_eq!(token.pcd_type, PcdType::FeatureFlag),
            "PcdFirmwareVendor" => {
                assert_eq!(token.pcd_type, PcdType::PatchableInModule);
                assert_eq!(token.datum_size, 16);
            }
            _ => assert!(token.is_dynamic_pcd),
        }
    }
}
