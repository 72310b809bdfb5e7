//! Whole-pipeline link round-trip: assemble two packages, serialize them
//! as object files, link, and parse the resulting ELF back field by field.

use boasm::{FunctionBuilder, Isa, OFile, link_executable, ENTRY_ADDR};

// ─── A minimal ELF reader for assertions ────────────────────────────────

struct Elf<'a> {
    bytes: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Sym {
    name: String,
    info: u8,
    shndx: u16,
    value: u64,
    size: u64,
}

impl<'a> Elf<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        assert_eq!(&bytes[..4], b"\x7FELF", "bad magic");
        assert_eq!(bytes[4], 2, "not ELF64");
        assert_eq!(bytes[5], 1, "not little-endian");
        Self { bytes }
    }

    fn u16_at(&self, at: usize) -> u16 {
        u16::from_le_bytes(self.bytes[at..at + 2].try_into().unwrap())
    }

    fn u32_at(&self, at: usize) -> u32 {
        u32::from_le_bytes(self.bytes[at..at + 4].try_into().unwrap())
    }

    fn u64_at(&self, at: usize) -> u64 {
        u64::from_le_bytes(self.bytes[at..at + 8].try_into().unwrap())
    }

    fn entry(&self) -> u64 {
        self.u64_at(24)
    }

    fn phoff(&self) -> u64 {
        self.u64_at(32)
    }

    fn shoff(&self) -> u64 {
        self.u64_at(40)
    }

    fn phnum(&self) -> u16 {
        self.u16_at(56)
    }

    fn shnum(&self) -> u16 {
        self.u16_at(60)
    }

    /// (sh_type, sh_offset, sh_size, sh_link, sh_addr) of section `i`.
    fn shdr(&self, i: usize) -> (u32, u64, u64, u32, u64) {
        let at = self.shoff() as usize + i * 64;
        (
            self.u32_at(at + 4),
            self.u64_at(at + 24),
            self.u64_at(at + 32),
            self.u32_at(at + 40),
            self.u64_at(at + 16),
        )
    }

    /// (p_flags, p_offset, p_vaddr, p_filesz) of program header `i`.
    fn phdr(&self, i: usize) -> (u32, u64, u64, u64) {
        let at = self.phoff() as usize + i * 56;
        (
            self.u32_at(at + 4),
            self.u64_at(at + 8),
            self.u64_at(at + 16),
            self.u64_at(at + 32),
        )
    }

    fn cstr_at(&self, strtab_off: u64, name_off: u32) -> String {
        let start = strtab_off as usize + name_off as usize;
        let end = self.bytes[start..]
            .iter()
            .position(|&b| b == 0)
            .map(|p| start + p)
            .unwrap();
        String::from_utf8(self.bytes[start..end].to_vec()).unwrap()
    }

    fn symbols(&self) -> Vec<Sym> {
        let mut symtab = None;
        for i in 0..self.shnum() as usize {
            let (sh_type, off, size, link, _) = self.shdr(i);
            if sh_type == 2 {
                symtab = Some((off, size, link));
            }
        }
        let (off, size, link) = symtab.expect("no .symtab");
        let (_, str_off, _, _, _) = self.shdr(link as usize);
        let mut out = Vec::new();
        let count = (size / 24) as usize;
        for i in 0..count {
            let at = off as usize + i * 24;
            out.push(Sym {
                name: self.cstr_at(str_off, self.u32_at(at)),
                info: self.bytes[at + 4],
                shndx: self.u16_at(at + 6),
                value: self.u64_at(at + 8),
                size: self.u64_at(at + 16),
            });
        }
        out
    }
}

// ─── Scenario: two packages, start calls helper ─────────────────────────

fn build_objects() -> Vec<OFile> {
    let isa = Isa::load();

    let mut start = FunctionBuilder::new(&isa, "main.bas", 1, "start");
    start.jump("call", "helper").unwrap();
    start.instr("ret", &[]).unwrap();
    let mut main_pkg = OFile::new("main.bo", "main");
    main_pkg.add_function(start.finish().unwrap()).unwrap();

    let mut helper = FunctionBuilder::new(&isa, "lib.bas", 1, "helper");
    helper.instr("ret", &[]).unwrap();
    let mut lib_pkg = OFile::new("lib.bo", "lib");
    lib_pkg.add_function(helper.finish().unwrap()).unwrap();

    // Push both through the object-file wire format, as bld would.
    [main_pkg, lib_pkg]
        .into_iter()
        .map(|o| {
            let name = o.filename.clone();
            let mut back = OFile::from_bytes(&o.to_bytes()).unwrap();
            back.filename = name;
            back
        })
        .collect()
}

#[test]
fn linked_elf_shape() {
    let objects = build_objects();
    let elf_bytes = link_executable(&objects).unwrap();
    let elf = Elf::new(&elf_bytes);

    assert_eq!(elf.entry(), ENTRY_ADDR);
    assert_eq!(elf.phnum(), 1, "only .text is populated");
    assert_eq!(elf.shnum(), 5, "null + .text + .symtab + .strtab + .shstrtab");

    // .text loads at the entry address, readable and executable.
    let (p_flags, p_offset, p_vaddr, p_filesz) = elf.phdr(0);
    assert_eq!(p_vaddr, ENTRY_ADDR);
    assert_eq!(p_flags, 0x4 | 0x1); // PF_R | PF_X
    assert_eq!(p_filesz, 7); // call (5) + ret (1) + ret (1)
    assert_eq!(p_offset % 0x1000, 0);
}

#[test]
fn call_resolves_to_concatenated_offset() {
    let objects = build_objects();
    let elf_bytes = link_executable(&objects).unwrap();
    let elf = Elf::new(&elf_bytes);
    let (_, p_offset, _, p_filesz) = elf.phdr(0);
    let text = &elf_bytes[p_offset as usize..(p_offset + p_filesz) as usize];

    assert_eq!(text[0], 0xE8);
    // helper sits right after start (offset 6); displacement is relative
    // to the end of the call instruction.
    let disp = i32::from_le_bytes(text[1..5].try_into().unwrap());
    assert_eq!(disp, 6 - 1 - 4);
    assert_eq!(text[5], 0xC3);
    assert_eq!(text[6], 0xC3);
}

#[test]
fn symtab_carries_both_functions() {
    let objects = build_objects();
    let elf_bytes = link_executable(&objects).unwrap();
    let elf = Elf::new(&elf_bytes);
    let syms = elf.symbols();

    // Leading null entry is mandatory.
    assert_eq!(syms[0].name, "");
    assert_eq!(syms[0].value, 0);

    let start = syms.iter().find(|s| s.name == "start").unwrap();
    assert_eq!(start.info, 2, "STT_FUNC");
    assert_eq!(start.value, ENTRY_ADDR);
    assert_eq!(start.size, 6);
    assert_eq!(start.shndx, 1, "defined in .text");

    let helper = syms.iter().find(|s| s.name == "helper").unwrap();
    assert_eq!(helper.info, 2);
    assert_eq!(helper.value, ENTRY_ADDR + 6);
    assert_eq!(helper.size, 1);
}

#[test]
fn data_section_round_trips_through_link() {
    let isa = Isa::load();
    let mut start = FunctionBuilder::new(&isa, "main.bas", 1, "start");
    start
        .instr(
            "lea",
            &[
                boasm::Arg::Reg(boasm::Register::Rax),
                boasm::Arg::var("counter"),
            ],
        )
        .unwrap();
    start.instr("ret", &[]).unwrap();
    let mut pkg = OFile::new("main.bo", "main");
    pkg.add_function(start.finish().unwrap()).unwrap();
    pkg.add_var("counter", "u64", 7u64.to_le_bytes().to_vec())
        .unwrap();

    let elf_bytes = link_executable(&[pkg]).unwrap();
    let elf = Elf::new(&elf_bytes);
    assert_eq!(elf.phnum(), 2);

    // The .data segment is RW and page-aligned above .text.
    let (p_flags, p_offset, p_vaddr, p_filesz) = elf.phdr(1);
    assert_eq!(p_flags, 0x4 | 0x2); // PF_R | PF_W
    assert_eq!(p_vaddr % 0x1000, 0);
    assert!(p_vaddr > ENTRY_ADDR);
    assert_eq!(p_filesz, 8);
    let payload = &elf_bytes[p_offset as usize..p_offset as usize + 8];
    assert_eq!(payload, 7u64.to_le_bytes());

    // The counter symbol is an STT_OBJECT in section 2.
    let syms = elf.symbols();
    let counter = syms.iter().find(|s| s.name == "counter").unwrap();
    assert_eq!(counter.info, 1, "STT_OBJECT");
    assert_eq!(counter.value, p_vaddr);
    assert_eq!(counter.shndx, 2);

    // The RIP-relative displacement in the LEA reaches the var.
    let (_, text_off, _, _) = elf.phdr(0);
    let text = &elf_bytes[text_off as usize..];
    let disp = i32::from_le_bytes(text[3..7].try_into().unwrap());
    assert_eq!(disp as i64, (p_vaddr - ENTRY_ADDR) as i64 - 3 - 4);
}
