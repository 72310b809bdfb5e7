//! Static linking: gather symbols across objects, pull in every function
//! reachable from `start`, lay out `.text`/`.data`/`.bss`, patch
//! relocations, and hand the laid-out image to the ELF writer.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::elf::{
    self, Section, SectionSymbol, SymKind, SHF_ALLOC, SHF_EXECINSTR, SHF_WRITE, SHT_PROGBITS,
};
use crate::encoder::Relocation;
use crate::error::Error;
use crate::function::Function;
use crate::object::{OFile, Var};

/// Virtual address `.text` is loaded at; also the entry point.
pub const ENTRY_ADDR: u64 = 0x30000;

/// The linker's output: laid-out sections ready for ELF emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedImage {
    /// Entry point virtual address.
    pub entry: u64,
    /// Sections in load order.
    pub sections: Vec<Section>,
}

impl LinkedImage {
    /// Serialize into an ELF-64 executable.
    #[must_use]
    pub fn to_elf(&self) -> Vec<u8> {
        elf::write_elf(self.entry, &self.sections)
    }
}

/// Link objects into a laid-out image.
///
/// Functions are placed by breadth-first reachability from `start`; vars
/// and data are placed on first reference.  Unreferenced symbols do not
/// appear in the output.
///
/// # Errors
///
/// Duplicate packages or symbol names, a missing `start`, or a relocation
/// against an unknown symbol.
pub fn link(objects: &[OFile]) -> Result<LinkedImage, Error> {
    // Phase 1 — global symbol maps; duplicates are fatal.
    let mut packages: BTreeMap<&str, &OFile> = BTreeMap::new();
    let mut funcs: BTreeMap<&str, &Function> = BTreeMap::new();
    let mut vars: BTreeMap<&str, &Var> = BTreeMap::new();
    let mut data: BTreeMap<&str, &Var> = BTreeMap::new();
    for o in objects {
        if let Some(first) = packages.insert(&o.package, o) {
            return Err(Error::DuplicatePackage {
                package: o.package.clone(),
                first: first.filename.clone(),
                second: o.filename.clone(),
            });
        }
        for (name, f) in &o.functions {
            if funcs.insert(name, f).is_some() {
                return Err(Error::DuplicateName { name: name.clone() });
            }
        }
        for (name, v) in &o.vars {
            if vars.insert(name, v).is_some() {
                return Err(Error::DuplicateName { name: name.clone() });
            }
        }
        for (name, v) in &o.data {
            if data.insert(name, v).is_some() {
                return Err(Error::DuplicateName { name: name.clone() });
            }
        }
    }

    // Phase 2 — breadth-first reachability from `start`, concatenating
    // bodies and globalizing relocation offsets as we go.
    if !funcs.contains_key("start") {
        return Err(Error::UnresolvedSymbol {
            symbol: "start".into(),
        });
    }
    let mut worklist: VecDeque<String> = VecDeque::new();
    let mut queued: BTreeMap<String, ()> = BTreeMap::new();
    worklist.push_back("start".to_string());
    queued.insert("start".to_string(), ());

    let mut text = Vec::new();
    let mut data_bytes = Vec::new();
    let mut bss_bytes = Vec::new();
    let mut func_locs: BTreeMap<String, u32> = BTreeMap::new();
    let mut var_locs: BTreeMap<String, u32> = BTreeMap::new();
    let mut data_locs: BTreeMap<String, u32> = BTreeMap::new();
    let mut relocations: Vec<Relocation> = Vec::new();

    while let Some(current) = worklist.pop_front() {
        let f = funcs[current.as_str()];
        let foffset = text.len() as u32;
        func_locs.insert(current, foffset);
        for rel in &f.relocations {
            let symbol = rel.symbol.as_str();
            if funcs.contains_key(symbol) {
                if !queued.contains_key(symbol) {
                    queued.insert(symbol.to_string(), ());
                    worklist.push_back(symbol.to_string());
                }
            } else if let Some(v) = vars.get(symbol) {
                var_locs.entry(symbol.to_string()).or_insert_with(|| {
                    let loc = data_bytes.len() as u32;
                    data_bytes.extend_from_slice(&v.value);
                    loc
                });
            } else if let Some(v) = data.get(symbol) {
                data_locs.entry(symbol.to_string()).or_insert_with(|| {
                    let loc = bss_bytes.len() as u32;
                    bss_bytes.extend_from_slice(&v.value);
                    loc
                });
            } else {
                return Err(Error::UnresolvedSymbol {
                    symbol: symbol.into(),
                });
            }
            let mut global = rel.clone();
            global.offset += foffset;
            relocations.push(global);
        }
        text.extend_from_slice(&f.body);
    }

    // Phase 3 — layout: each section starts on the page after the last.
    let text_addr = ENTRY_ADDR;
    let data_addr = elf::page_after(text_addr + text.len() as u64);
    let bss_addr = elf::page_after(data_addr + data_bytes.len() as u64);

    // Phase 4 — apply relocations against text-base-relative values (the
    // patch math subtracts `offset + 4`, yielding end-of-field-relative
    // displacements).
    for rel in &relocations {
        let target_addr = if let Some(&loc) = func_locs.get(&rel.symbol) {
            text_addr + loc as u64
        } else if let Some(&loc) = var_locs.get(&rel.symbol) {
            data_addr + loc as u64
        } else {
            bss_addr + data_locs[&rel.symbol] as u64
        };
        rel.apply(&mut text, (target_addr - text_addr) as i32);
    }

    // Phase 5 — sections and their symbol tables.
    let mut text_syms = Vec::new();
    for (name, &loc) in &func_locs {
        let f = funcs[name.as_str()];
        text_syms.push(SectionSymbol {
            name: name.clone(),
            kind: SymKind::Func,
            addr: text_addr + loc as u64,
            size: f.body.len() as u64,
        });
        for s in &f.symbols {
            text_syms.push(SectionSymbol {
                name: s.name.clone(),
                kind: SymKind::Func,
                addr: text_addr + loc as u64 + s.offset as u64,
                size: 0,
            });
        }
    }

    let mut sections = Vec::new();
    sections.push(Section {
        name: ".text".into(),
        sh_type: SHT_PROGBITS,
        flags: SHF_ALLOC | SHF_EXECINSTR,
        addr: text_addr,
        data: text,
        loadable: true,
        symbols: text_syms,
    });
    if !data_bytes.is_empty() {
        let symbols = var_locs
            .iter()
            .map(|(name, &loc)| SectionSymbol {
                name: name.clone(),
                kind: SymKind::Object,
                addr: data_addr + loc as u64,
                size: vars[name.as_str()].value.len() as u64,
            })
            .collect();
        sections.push(Section {
            name: ".data".into(),
            sh_type: SHT_PROGBITS,
            flags: SHF_ALLOC | SHF_WRITE,
            addr: data_addr,
            data: data_bytes,
            loadable: true,
            symbols,
        });
    }
    if !bss_bytes.is_empty() {
        let symbols = data_locs
            .iter()
            .map(|(name, &loc)| SectionSymbol {
                name: name.clone(),
                kind: SymKind::Object,
                addr: bss_addr + loc as u64,
                size: data[name.as_str()].value.len() as u64,
            })
            .collect();
        sections.push(Section {
            name: ".bss".into(),
            sh_type: SHT_PROGBITS,
            flags: SHF_ALLOC,
            addr: bss_addr,
            data: bss_bytes,
            loadable: true,
            symbols,
        });
    }

    Ok(LinkedImage {
        entry: ENTRY_ADDR,
        sections,
    })
}

/// Link and serialize in one step.
///
/// # Errors
///
/// See [`link`].
pub fn link_executable(objects: &[OFile]) -> Result<Vec<u8>, Error> {
    Ok(link(objects)?.to_elf())
}
