//! PCD memory database and platform PCD preprocessing.
//!
//! Platform Configuration Database (PCD) entries are the build-time and
//! run-time configuration knobs of a UEFI firmware platform. This crate
//! gathers every module's PCD declarations into one [`MemoryDatabase`],
//! validates that modules sharing a PCD agree on it, resolves dynamic PCDs
//! to their per-SKU values, and answers the queries code generators need
//! (per-module usages, the PEI/DXE split of dynamic PCDs, autogen text).
//!
//! ```ignore
//! let platform: PlatformDescription = toml::from_str(&text)?;
//! let mut db = MemoryDatabase::new();
//! init_pcd_memory_db_with_platform_info(&mut db, &platform, ErrorPolicy::Collect)?;
//! for usage in db.usage_instances_by_module_name("PlatformPei") {
//!     let fragments = usage.generate_autogen(AutogenTarget::Module)?;
//! }
//! ```

pub mod database;
pub mod datum;
pub mod error;
pub mod guid;
pub mod preprocess;
pub mod sku;
pub mod source;
pub mod token;
pub mod usage;
pub mod verbose;

pub use database::{MemoryDatabase, UsageRef};
pub use datum::{DatumType, DatumValue};
pub use error::{PcdError, Result};
pub use guid::{EfiGuid, translate_schema_string_to_guid};
pub use preprocess::{ErrorPolicy, PreprocessSummary, init_pcd_memory_db_with_platform_info};
pub use sku::{SkuInstance, SkuValue};
pub use source::{DynamicPcdBuildData, ModulePcdInfo, PcdBuildDefinition, PlatformDescription, PlatformPcdDataSource, SkuInfo};
pub use token::{PcdType, Token};
pub use usage::{AutogenFragments, AutogenTarget, ModuleIdentity, ModuleType, PcdUsage, UsageInstance};
