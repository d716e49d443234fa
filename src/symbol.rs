//! Symbol resolution.
//!
//! Loads the symbol table and the file-backed section layout of a linked
//! object file. The file is mapped read-only only for as long as it takes to
//! copy out names, addresses and section offsets; the resulting
//! [`ObjectImage`] does not borrow the file.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use object::{Object, ObjectSection, ObjectSymbol, ObjectSymbolTable, SectionFlags};

use crate::error::StampError;
use crate::layout::{Section, SectionMap};

/// A named address from the object file's symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: u64,
}

impl Symbol {
    pub fn new(name: &str, address: u64) -> Self {
        Self {
            name: name.to_string(),
            address,
        }
    }
}

/// Symbols in table order. Lookup is by exact name, first match wins.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self { symbols }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn resolve(&self, name: &str) -> Result<u64, StampError> {
        self.symbols
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.address)
            .ok_or_else(|| StampError::SymbolNotFound {
                name: name.to_string(),
            })
    }
}

/// Symbol table and section layout of one object file.
#[derive(Debug, Clone, Default)]
pub struct ObjectImage {
    pub symbols: SymbolTable,
    pub sections: SectionMap,
}

impl ObjectImage {
    /// Maps `path` read-only and extracts its symbols and sections. The mapping
    /// is released before this returns.
    pub fn load(path: &Path) -> Result<Self, StampError> {
        let file = File::open(path).map_err(StampError::io(path))?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(StampError::io(path))?;
        Self::parse(path, &mmap)
    }

    pub fn parse(path: &Path, data: &[u8]) -> Result<Self, StampError> {
        let obj = object::File::parse(data).map_err(|source| StampError::ObjectParse {
            path: path.to_path_buf(),
            source,
        })?;

        let symbols = match obj.symbol_table() {
            Some(table) => collect_symbols(table.symbols()),
            None => {
                tracing::warn!("{} has no symbol table", path.display());
                Vec::new()
            }
        };

        let mut sections = Vec::new();
        for section in obj.sections() {
            if !is_allocated(section.flags()) {
                continue;
            }
            // Sections without file contents (.bss) cannot be patched.
            let Some((file_offset, _)) = section.file_range() else {
                continue;
            };
            let name = section.name().unwrap_or("?").to_string();
            tracing::debug!(
                "section {} at {:#010x}, file offset {:#x}, size {:#x}",
                name,
                section.address(),
                file_offset,
                section.size()
            );
            sections.push(Section {
                name,
                virtual_address: section.address(),
                file_offset,
                size: section.size(),
            });
        }

        tracing::debug!(
            "loaded {} symbols and {} sections from {}",
            symbols.len(),
            sections.len(),
            path.display()
        );
        Ok(Self {
            symbols: SymbolTable::new(symbols),
            sections: SectionMap::new(sections),
        })
    }

    pub fn resolve(&self, name: &str) -> Result<u64, StampError> {
        let address = self.symbols.resolve(name)?;
        tracing::debug!("{} = {:#010x}", name, address);
        Ok(address)
    }

    pub fn address_to_file_offset(&self, address: u64) -> Result<u64, StampError> {
        self.sections.file_offset(address)
    }
}

fn collect_symbols<'data, S>(iter: impl Iterator<Item = S>) -> Vec<Symbol>
where
    S: ObjectSymbol<'data>,
{
    let mut seen = HashSet::new();
    let mut symbols = Vec::new();
    for sym in iter {
        let Ok(name) = sym.name() else { continue };
        if name.is_empty() {
            continue;
        }
        if !seen.insert(name.to_string()) {
            tracing::warn!("duplicate symbol {}, the first definition is used", name);
        }
        symbols.push(Symbol::new(name, sym.address()));
    }
    symbols
}

fn is_allocated(flags: SectionFlags) -> bool {
    match flags {
        SectionFlags::Elf { sh_flags } => sh_flags & u64::from(object::elf::SHF_ALLOC) != 0,
        _ => true,
    }
}
