//! AutoGen.h / AutoGen.c PCD sections.
//!
//! Collects the fragments of every usage instance a module holds and wraps
//! them into the two files a module build includes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use pcd_core::{AutogenTarget, MemoryDatabase};

/// Generated PCD sections for one module.
#[derive(Debug)]
pub struct ModuleAutogen {
    /// Module name as declared by its first usage.
    pub module: String,
    /// Number of PCDs the module uses.
    pub pcd_count: usize,
    /// `AutoGen.h` contents.
    pub header: String,
    /// `AutoGen.c` contents.
    pub source: String,
}

/// Render the PCD sections for `module`.
pub fn render_module(db: &MemoryDatabase, module: &str, target: AutogenTarget) -> Result<ModuleAutogen> {
    let usages = db.usage_instances_by_module_name(module);
    ensure!(!usages.is_empty(), "module '{module}' produces or consumes no PCDs");

    let name = usages[0].usage.module_name.clone();
    let guard = format!("_AUTOGENH_PCD_{}_", c_identifier(&name).to_ascii_uppercase());

    let mut header = format!(
        "// PCD definitions for module {name}.\n\
         // Generated by pcdtool. Do not edit.\n\n\
         #ifndef {guard}\n#define {guard}\n\n"
    );
    let mut source = format!(
        "// PCD globals for module {name}.\n\
         // Generated by pcdtool. Do not edit.\n\n\
         #include \"AutoGen.h\"\n\n"
    );

    for usage in &usages {
        let fragments = usage
            .generate_autogen(target)
            .with_context(|| format!("generating autogen for {} in module {name}", usage.token.cname))?;
        header.push_str(&fragments.header);
        header.push('\n');
        source.push_str(&fragments.source);
    }
    header.push_str(&format!("#endif // {guard}\n"));

    Ok(ModuleAutogen {
        module: name,
        pcd_count: usages.len(),
        header,
        source,
    })
}

/// Write `AutoGen.h` and `AutoGen.c` under `out_dir/<module>/`.
///
/// Returns the module directory.
pub fn write_module(out_dir: &Path, generated: &ModuleAutogen) -> Result<PathBuf> {
    let dir = out_dir.join(&generated.module);
    std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let header = dir.join("AutoGen.h");
    std::fs::write(&header, &generated.header)
        .with_context(|| format!("Failed to write {}", header.display()))?;
    let source = dir.join("AutoGen.c");
    std::fs::write(&source, &generated.source)
        .with_context(|| format!("Failed to write {}", source.display()))?;
    Ok(dir)
}

fn c_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
