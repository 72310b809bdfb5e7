//! ELF-64 executable emission for AMD64/System V.
//!
//! Produces a complete image in memory: ELF header, one `PT_LOAD` program
//! header per loadable section, section headers (null + user sections +
//! `.symtab`/`.strtab`/`.shstrtab`), and the section payloads at
//! page-aligned file offsets.
//!
//! Reference: <https://www.uclibc.org/docs/elf-64-gen.pdf>

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

// ─── Constants ──────────────────────────────────────────────────────────

/// ELF header size.
pub const EHDR_SIZE: u64 = 64;
/// Program header entry size.
pub const PHDR_SIZE: u64 = 56;
/// Section header entry size.
pub const SHDR_SIZE: u64 = 64;
/// Symbol table entry size.
pub const SYM_SIZE: u64 = 24;

/// Executable file type.
pub const ET_EXEC: u16 = 2;
/// AMD x86-64 machine.
pub const EM_AMD64: u16 = 0x3E;
/// Current ELF version.
pub const EV_CURRENT: u32 = 1;

/// Program-defined section contents.
pub const SHT_PROGBITS: u32 = 1;
/// Linker symbol table.
pub const SHT_SYMTAB: u32 = 2;
/// String table.
pub const SHT_STRTAB: u32 = 3;

/// Section holds writable data.
pub const SHF_WRITE: u64 = 0x1;
/// Section occupies memory in the process image.
pub const SHF_ALLOC: u64 = 0x2;
/// Section holds executable instructions.
pub const SHF_EXECINSTR: u64 = 0x4;

/// Data object symbol type.
pub const STT_OBJECT: u8 = 1;
/// Function symbol type.
pub const STT_FUNC: u8 = 2;

/// Loadable segment.
pub const PT_LOAD: u32 = 1;
/// Execute permission.
pub const PF_X: u32 = 0x1;
/// Write permission.
pub const PF_W: u32 = 0x2;
/// Read permission.
pub const PF_R: u32 = 0x4;

/// Round up past the next 4 KiB page boundary.
#[must_use]
pub fn page_after(x: u64) -> u64 {
    (x + 0x1000) & !0xFFF
}

// ─── Image model ────────────────────────────────────────────────────────

/// Symbol kind as it lands in `.symtab`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SymKind {
    /// `STT_FUNC`.
    Func,
    /// `STT_OBJECT`.
    Object,
}

/// A symbol exported by a section.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectionSymbol {
    /// Symbol name.
    pub name: String,
    /// Symbol kind.
    pub kind: SymKind,
    /// Final virtual address.
    pub addr: u64,
    /// Object/function size in bytes.
    pub size: u64,
}

/// A laid-out section of the linked image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section name (`.text`, `.data`, …).
    pub name: String,
    /// `SHT_*` type.
    pub sh_type: u32,
    /// `SHF_*` flags.
    pub flags: u64,
    /// Virtual load address.
    pub addr: u64,
    /// Section payload.
    pub data: Vec<u8>,
    /// Whether the section gets a `PT_LOAD` program header.
    pub loadable: bool,
    /// Symbols defined in this section.
    pub symbols: Vec<SectionSymbol>,
}

// ─── String table ───────────────────────────────────────────────────────

/// An ELF string table under construction: a leading NUL, then
/// NUL-terminated strings, deduplicated.
#[derive(Debug, Default)]
struct StrTab {
    offsets: BTreeMap<String, u32>,
    bytes: Vec<u8>,
}

impl StrTab {
    fn new() -> Self {
        Self {
            offsets: BTreeMap::new(),
            bytes: vec![0],
        }
    }

    /// Intern `s` and return its offset.
    fn off(&mut self, s: &str) -> u32 {
        if let Some(&o) = self.offsets.get(s) {
            return o;
        }
        let off = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        self.offsets.insert(s.into(), off);
        off
    }
}

// ─── Header records ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct Shdr {
    name: u32,
    sh_type: u32,
    flags: u64,
    addr: u64,
    offset: u64,
    size: u64,
    link: u32,
    info: u32,
    addralign: u64,
    entsize: u64,
}

impl Shdr {
    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.name.to_le_bytes());
        out.extend_from_slice(&self.sh_type.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.addr.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.link.to_le_bytes());
        out.extend_from_slice(&self.info.to_le_bytes());
        out.extend_from_slice(&self.addralign.to_le_bytes());
        out.extend_from_slice(&self.entsize.to_le_bytes());
    }
}

#[derive(Debug, Clone, Copy)]
struct Phdr {
    p_type: u32,
    flags: u32,
    offset: u64,
    vaddr: u64,
    paddr: u64,
    filesz: u64,
    memsz: u64,
    align: u64,
}

impl Phdr {
    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.p_type.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.vaddr.to_le_bytes());
        out.extend_from_slice(&self.paddr.to_le_bytes());
        out.extend_from_slice(&self.filesz.to_le_bytes());
        out.extend_from_slice(&self.memsz.to_le_bytes());
        out.extend_from_slice(&self.align.to_le_bytes());
    }
}

fn write_sym(out: &mut Vec<u8>, name: u32, info: u8, shndx: u16, value: u64, size: u64) {
    out.extend_from_slice(&name.to_le_bytes());
    out.push(info);
    out.push(0); // st_other
    out.extend_from_slice(&shndx.to_le_bytes());
    out.extend_from_slice(&value.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
}

/// Write payload at its recorded file offset, zero-padding the gap.
fn place(out: &mut Vec<u8>, data: &[u8], offset: u64) {
    let offset = offset as usize;
    if out.len() < offset {
        out.resize(offset, 0);
    }
    out.extend_from_slice(data);
}

// ─── Emission ───────────────────────────────────────────────────────────

/// Serialize the sections into a complete ELF-64 executable image.
#[must_use]
pub fn write_elf(entry: u64, sections: &[Section]) -> Vec<u8> {
    let nphdrs = sections.iter().filter(|s| s.loadable).count() as u64;
    // User sections plus null, .symtab, .strtab, .shstrtab.
    let shnum = sections.len() as u64 + 4;
    let shstrndx = sections.len() as u16 + 3;
    let e_phoff = EHDR_SIZE;
    let e_shoff = EHDR_SIZE + PHDR_SIZE * nphdrs;

    // First payload lands on the page after all headers.
    let mut data_off = page_after(EHDR_SIZE + PHDR_SIZE * nphdrs + SHDR_SIZE * shnum);

    let mut shst = StrTab::new();
    let mut st = StrTab::new();
    let mut shdrs: Vec<Shdr> = Vec::new();
    let mut phdrs: Vec<Phdr> = Vec::new();
    let mut symtab = Vec::new();
    write_sym(&mut symtab, 0, 0, 0, 0, 0); // required null entry
    let mut symcount: u32 = 1;

    for (secti, sect) in sections.iter().enumerate() {
        let mut shdr = Shdr {
            name: shst.off(&sect.name),
            sh_type: sect.sh_type,
            flags: sect.flags,
            addr: sect.addr,
            offset: data_off,
            size: sect.data.len() as u64,
            addralign: 0x8,
            ..Shdr::default()
        };
        if sect.loadable {
            let mut phdr = Phdr {
                p_type: PT_LOAD,
                flags: PF_R,
                align: 0x8,
                offset: data_off,
                vaddr: sect.addr,
                paddr: sect.addr,
                filesz: sect.data.len() as u64,
                memsz: sect.data.len() as u64,
            };
            if sect.flags & SHF_EXECINSTR != 0 {
                phdr.flags |= PF_X;
                phdr.align = 0x1000;
                shdr.addralign = 0x1000;
            } else if sect.flags & SHF_WRITE != 0 {
                phdr.flags |= PF_W;
            }
            phdrs.push(phdr);

            for sym in &sect.symbols {
                let info = match sym.kind {
                    SymKind::Func => STT_FUNC,
                    SymKind::Object => STT_OBJECT,
                };
                write_sym(
                    &mut symtab,
                    st.off(&sym.name),
                    info,
                    secti as u16 + 1,
                    sym.addr,
                    sym.size,
                );
                symcount += 1;
            }
        }
        data_off += page_after(sect.data.len() as u64);
        shdrs.push(shdr);
    }

    let sym_shdr = Shdr {
        name: shst.off(".symtab"),
        sh_type: SHT_SYMTAB,
        offset: data_off,
        size: symtab.len() as u64,
        link: shstrndx as u32 - 1, // the .strtab right before us
        info: symcount,
        addralign: 0x8,
        entsize: SYM_SIZE,
        ..Shdr::default()
    };
    data_off += page_after(symtab.len() as u64);
    let str_shdr = Shdr {
        name: shst.off(".strtab"),
        sh_type: SHT_STRTAB,
        offset: data_off,
        size: st.bytes.len() as u64,
        addralign: 0x1,
        ..Shdr::default()
    };
    data_off += page_after(st.bytes.len() as u64);
    let shstr_shdr = Shdr {
        name: shst.off(".shstrtab"),
        sh_type: SHT_STRTAB,
        offset: data_off,
        size: shst.bytes.len() as u64,
        addralign: 0x1,
        ..Shdr::default()
    };

    // ── Assemble the file ───────────────────────────────────────────────
    let mut out = Vec::new();

    // e_ident
    out.extend_from_slice(&[0x7F, b'E', b'L', b'F']);
    out.push(2); // 64-bit
    out.push(1); // little-endian
    out.push(1); // header version
    out.push(0); // System V ABI
    out.extend_from_slice(&[0u8; 8]);
    // Fixed fields
    out.extend_from_slice(&ET_EXEC.to_le_bytes());
    out.extend_from_slice(&EM_AMD64.to_le_bytes());
    out.extend_from_slice(&EV_CURRENT.to_le_bytes());
    out.extend_from_slice(&entry.to_le_bytes());
    out.extend_from_slice(&e_phoff.to_le_bytes());
    out.extend_from_slice(&e_shoff.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    out.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
    out.extend_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
    out.extend_from_slice(&(nphdrs as u16).to_le_bytes());
    out.extend_from_slice(&(SHDR_SIZE as u16).to_le_bytes());
    out.extend_from_slice(&(shnum as u16).to_le_bytes());
    out.extend_from_slice(&shstrndx.to_le_bytes());
    debug_assert_eq!(out.len() as u64, EHDR_SIZE);

    for phdr in &phdrs {
        phdr.write_to(&mut out);
    }
    Shdr::default().write_to(&mut out); // null section header
    for shdr in &shdrs {
        shdr.write_to(&mut out);
    }
    sym_shdr.write_to(&mut out);
    str_shdr.write_to(&mut out);
    shstr_shdr.write_to(&mut out);

    for (sect, shdr) in sections.iter().zip(&shdrs) {
        place(&mut out, &sect.data, shdr.offset);
    }
    place(&mut out, &symtab, sym_shdr.offset);
    place(&mut out, &st.bytes, str_shdr.offset);
    place(&mut out, &shst.bytes, shstr_shdr.offset);

    out
}
