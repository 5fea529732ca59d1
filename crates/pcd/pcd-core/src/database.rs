//! The PCD memory database.
//!
//! One [`MemoryDatabase`] holds every [`Token`] of a platform build session,
//! keyed by primary key. It is constructed by the caller and handed to the
//! preprocessor by `&mut`, then to code generators by `&`.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::token::{PcdType, Token};
use crate::usage::{AutogenFragments, AutogenTarget, UsageInstance};
use crate::{vprintln, wprintln};

/// A usage instance together with the token it binds to.
#[derive(Debug, Clone, Copy)]
pub struct UsageRef<'a> {
    /// The bound token.
    pub token: &'a Token,
    /// The module's binding.
    pub usage: &'a UsageInstance,
}

impl UsageRef<'_> {
    /// Render the autogen fragments for this binding.
    pub fn generate_autogen(&self, target: AutogenTarget) -> Result<AutogenFragments> {
        self.usage.generate_autogen(self.token, target)
    }
}

/// In-memory table of PCD tokens for one build session.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tokens: HashMap<String, Token>,
}

impl MemoryDatabase {
    /// Create an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no token has been added.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Whether a token with `key` exists.
    pub fn is_token_in_database(&self, key: &str) -> bool {
        self.tokens.contains_key(key)
    }

    /// Insert or overwrite a token. Uniqueness is the caller's concern.
    pub fn add_token_to_database(&mut self, key: impl Into<String>, token: Token) {
        self.tokens.insert(key.into(), token);
    }

    /// Look up a token by primary key.
    pub fn token_by_key(&self, key: &str) -> Option<&Token> {
        self.tokens.get(key)
    }

    /// Entry for in-place lookup-or-insert while preprocessing.
    pub(crate) fn entry(&mut self, key: String) -> Entry<'_, String, Token> {
        self.tokens.entry(key)
    }

    /// All tokens, in unspecified order.
    pub fn record_array(&self) -> Vec<&Token> {
        self.tokens.values().collect()
    }

    /// All dynamic tokens, ordered by primary key.
    pub fn dynamic_records(&self) -> Vec<&Token> {
        let mut records: Vec<&Token> = self.tokens.values().filter(|t| t.is_dynamic_pcd).collect();
        records.sort_by_key(|t| t.primary_key());
        records
    }

    /// Dynamic-ex tokens, ordered by token space then token number.
    pub fn dynamic_ex_tokens(&self) -> Vec<&Token> {
        let mut records: Vec<&Token> = self
            .tokens
            .values()
            .filter(|t| t.pcd_type == PcdType::DynamicEx)
            .collect();
        records.sort_by_key(|t| (t.token_space_guid, t.token_number));
        records
    }

    /// Split dynamic tokens into PEI and DXE databases.
    ///
    /// A token belongs to PEI if any producer runs in PEI; otherwise if any
    /// consumer runs in PEI; otherwise to DXE. Each list is ordered by
    /// primary key.
    pub fn two_phase_dynamic_record_array(&self) -> (Vec<&Token>, Vec<&Token>) {
        let mut pei = Vec::new();
        let mut dxe = Vec::new();
        for token in self.dynamic_records() {
            if is_pei_token(token) {
                pei.push(token);
            } else {
                dxe.push(token);
            }
        }
        (pei, dxe)
    }

    /// Assign local token numbers: PEI tokens from 1 in primary-key order,
    /// DXE tokens continuing after the last PEI number.
    ///
    /// Returns the `(pei, dxe)` token counts.
    pub fn assign_local_token_numbers(&mut self) -> (usize, usize) {
        let (pei, dxe): (Vec<String>, Vec<String>) = {
            let (pei, dxe) = self.two_phase_dynamic_record_array();
            (
                pei.iter().map(|t| t.primary_key()).collect(),
                dxe.iter().map(|t| t.primary_key()).collect(),
            )
        };

        let mut next = 1u32;
        for key in pei.iter().chain(dxe.iter()) {
            if let Some(token) = self.tokens.get_mut(key) {
                token.local_token_number = Some(next);
                next += 1;
            }
        }
        vprintln!("  local token numbers: {} PEI, {} DXE", pei.len(), dxe.len());
        (pei.len(), dxe.len())
    }

    /// Every producer and consumer binding of the named module
    /// (case-insensitive).
    pub fn usage_instances_by_module_name(&self, module_name: &str) -> Vec<UsageRef<'_>> {
        let mut keys: Vec<&String> = self.tokens.keys().collect();
        keys.sort();

        let mut found = Vec::new();
        for key in keys {
            let token = &self.tokens[key];
            for usage in token.usage_instances() {
                if usage.module_name.eq_ignore_ascii_case(module_name) {
                    found.push(UsageRef { token, usage });
                }
            }
        }

        if found.is_empty() {
            vprintln!("  no PCD usage instances found for module {module_name}");
        }
        found
    }

    /// Every module name that produces or consumes a token, de-duplicated
    /// case-insensitively and sorted.
    pub fn all_module_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for token in self.tokens.values() {
            for usage in token.usage_instances() {
                if seen.insert(usage.module_name.to_ascii_lowercase()) {
                    names.push(usage.module_name.clone());
                }
            }
        }
        names.sort_by_key(|n| n.to_ascii_lowercase());
        names
    }

    /// Write the diagnostic dump to `path`.
    ///
    /// Failure to create or write the file is reported as a warning.
    pub fn dump_all_records(&self, path: &Path) {
        let result = File::create(path).and_then(|file| {
            let mut writer = BufWriter::new(file);
            self.dump_records(&mut writer)?;
            writer.flush()
        });
        match result {
            Ok(()) => vprintln!("  PCD database dump written to {}", path.display()),
            Err(e) => wprintln!("cannot write PCD database dump to {}: {e}", path.display()),
        }
    }

    /// Write the diagnostic dump to any writer, one block per token.
    pub fn dump_records(&self, w: &mut impl Write) -> io::Result<()> {
        let mut keys: Vec<&String> = self.tokens.keys().collect();
        keys.sort();

        writeln!(w, "PCD memory database: {} token(s)", keys.len())?;
        for (index, key) in keys.iter().enumerate() {
            let token = &self.tokens[*key];
            writeln!(w)?;
            writeln!(w, "[{index}] {}", token.cname)?;
            writeln!(w, "    Token space     : {}", token.token_space_guid)?;
            writeln!(w, "    Token number    : {:#x}", token.token_number)?;
            if let Some(local) = token.local_token_number {
                writeln!(w, "    Local token     : {local}")?;
            }
            writeln!(w, "    PCD type        : {}", token.pcd_type)?;
            let supported: Vec<&str> = token.supported_pcd_types.iter().map(|t| t.as_str()).collect();
            writeln!(w, "    Supported types : {}", supported.join(", "))?;
            writeln!(w, "    Datum type      : {} (size {})", token.datum_type, token.datum_size)?;
            for sku in &token.sku_data {
                writeln!(w, "    {sku}")?;
            }
            dump_usages(w, "Producers", &token.producers)?;
            dump_usages(w, "Consumers", &token.consumers)?;
        }
        Ok(())
    }
}

fn is_pei_token(token: &Token) -> bool {
    token.producers.iter().any(UsageInstance::is_pei_phase_component)
        || token.consumers.iter().any(UsageInstance::is_pei_phase_component)
}

fn dump_usages(w: &mut impl Write, label: &str, usages: &[UsageInstance]) -> io::Result<()> {
    if usages.is_empty() {
        return Ok(());
    }
    writeln!(w, "    {label}:")?;
    for usage in usages {
        writeln!(
            w,
            "        [{}] module {} ({}), package {}, {} {}{}",
            usage.component_type_name(),
            usage.module_name,
            usage.module.arch,
            usage.module.package_name,
            usage.module_pcd_type,
            usage.datum.as_deref().unwrap_or("-"),
            if usage.inherited { ", inherited" } else { "" }
        )?;
    }
    Ok(())
}
