//! The `.bo` object file: a package's types, data, vars, and functions in a
//! self-describing little-endian stream.
//!
//! Layout: every size and count is a `u64`, strings are `(size, bytes)`,
//! and collections are `(count, element…)`.  Name-keyed collections are
//! written in sorted order, so serialization is deterministic and
//! `read(write(o)) == o` (the reader fills `filename` from the source path).

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::encoder::{RelocKind, Relocation};
use crate::error::Error;
use crate::function::{Function, Symbol};

/// Opaque type metadata carried through object files for front-ends; the
/// linker ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeDescr {
    /// Type name (unique within the package).
    pub name: String,
    /// Distinguishing properties (indirection level, constness, …).  Two
    /// descriptors are the same type only if these match.
    pub properties: Vec<String>,
    /// Free-form description bytes.
    pub description: Vec<u8>,
}

/// A named, initialized blob: immutable package data or a mutable var.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Var {
    /// Symbol name.
    pub name: String,
    /// Type name, matched against a [`TypeDescr`] by front-ends.
    pub vtype: String,
    /// Initializer bytes.
    pub value: Vec<u8>,
}

impl Var {
    /// Convenience constructor.
    #[must_use]
    pub fn new(name: &str, vtype: &str, value: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            vtype: vtype.into(),
            value,
        }
    }
}

/// One package's worth of compiled output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OFile {
    /// Path this object was read from or will be written to.  Not part of
    /// the serialized stream.
    pub filename: String,
    /// Package name; unique across all objects handed to the linker.
    pub package: String,
    /// Target executable format (`"elf64"`).
    pub target_format: String,
    /// Type descriptors by name.
    pub types: BTreeMap<String, TypeDescr>,
    /// Immutable data blobs by name.
    pub data: BTreeMap<String, Var>,
    /// Mutable vars by name.
    pub vars: BTreeMap<String, Var>,
    /// Functions by name.
    pub functions: BTreeMap<String, Function>,
}

impl OFile {
    /// An empty object for `package`, to be written to `filename`.
    #[must_use]
    pub fn new(filename: &str, package: &str) -> Self {
        Self {
            filename: filename.into(),
            package: package.into(),
            target_format: "elf64".into(),
            types: BTreeMap::new(),
            data: BTreeMap::new(),
            vars: BTreeMap::new(),
            functions: BTreeMap::new(),
        }
    }

    /// Declare a type descriptor.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateName`] if the type already exists.
    pub fn add_type(
        &mut self,
        name: &str,
        properties: Vec<String>,
        description: Vec<u8>,
    ) -> Result<(), Error> {
        if self.types.contains_key(name) {
            return Err(Error::DuplicateName { name: name.into() });
        }
        self.types.insert(
            name.into(),
            TypeDescr {
                name: name.into(),
                properties,
                description,
            },
        );
        Ok(())
    }

    fn check_symbol_free(&self, name: &str) -> Result<(), Error> {
        if self.vars.contains_key(name)
            || self.data.contains_key(name)
            || self.functions.contains_key(name)
        {
            return Err(Error::DuplicateName { name: name.into() });
        }
        Ok(())
    }

    /// Declare a mutable package-scope var.
    pub fn add_var(&mut self, name: &str, vtype: &str, value: Vec<u8>) -> Result<(), Error> {
        self.check_symbol_free(name)?;
        self.vars.insert(name.into(), Var::new(name, vtype, value));
        Ok(())
    }

    /// Declare an immutable package-scope data blob.
    pub fn add_data(&mut self, name: &str, vtype: &str, value: Vec<u8>) -> Result<(), Error> {
        self.check_symbol_free(name)?;
        self.data.insert(name.into(), Var::new(name, vtype, value));
        Ok(())
    }

    /// Add a finished function.
    pub fn add_function(&mut self, function: Function) -> Result<(), Error> {
        self.check_symbol_free(&function.name)?;
        self.functions.insert(function.name.clone(), function);
        Ok(())
    }

    /// Look up a var or data blob by name, vars first.
    #[must_use]
    pub fn var_for(&self, name: &str) -> Option<&Var> {
        self.vars.get(name).or_else(|| self.data.get(name))
    }

    // ── Serialization ───────────────────────────────────────────────────

    /// Serialize to the `.bo` stream.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_string(&mut out, &self.package);
        write_string(&mut out, &self.target_format);
        write_size(&mut out, self.types.len());
        for t in self.types.values() {
            write_type_descr(&mut out, t);
        }
        write_vars(&mut out, &self.data);
        write_vars(&mut out, &self.vars);
        write_size(&mut out, self.functions.len());
        for f in self.functions.values() {
            write_function(&mut out, f);
        }
        out
    }

    /// Deserialize from a `.bo` stream.  The caller owns setting
    /// [`filename`](Self::filename).
    ///
    /// # Errors
    ///
    /// [`Error::CorruptObject`] on truncated input, oversized size fields,
    /// or malformed records.
    pub fn from_bytes(bytes: &[u8]) -> Result<OFile, Error> {
        let mut r = Reader::new(bytes);
        let package = r.string()?;
        let target_format = r.string()?;
        let mut types = BTreeMap::new();
        for _ in 0..r.count()? {
            let t = read_type_descr(&mut r)?;
            types.insert(t.name.clone(), t);
        }
        let data = read_vars(&mut r)?;
        let vars = read_vars(&mut r)?;
        let mut functions = BTreeMap::new();
        for _ in 0..r.count()? {
            let f = read_function(&mut r)?;
            functions.insert(f.name.clone(), f);
        }
        if !r.at_end() {
            return Err(Error::CorruptObject {
                detail: "trailing bytes after last function".into(),
            });
        }
        Ok(OFile {
            filename: String::new(),
            package,
            target_format,
            types,
            data,
            vars,
            functions,
        })
    }
}

#[cfg(feature = "std")]
impl OFile {
    /// Read an object file from disk.
    ///
    /// # Errors
    ///
    /// I/O failures and corrupt streams.
    pub fn load(path: &str) -> Result<OFile, Error> {
        let bytes = std::fs::read(path)?;
        let mut o = OFile::from_bytes(&bytes)?;
        o.filename = path.into();
        Ok(o)
    }

    /// Write the object to its [`filename`](Self::filename).
    ///
    /// # Errors
    ///
    /// I/O failures.
    pub fn save(&self) -> Result<(), Error> {
        std::fs::write(&self.filename, self.to_bytes())?;
        Ok(())
    }
}

// ─── Stream primitives ──────────────────────────────────────────────────

fn write_size(out: &mut Vec<u8>, size: usize) {
    out.extend_from_slice(&(size as u64).to_le_bytes());
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    write_size(out, s.len());
    out.extend_from_slice(s.as_bytes());
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_size(out, bytes.len());
    out.extend_from_slice(bytes);
}

fn write_type_descr(out: &mut Vec<u8>, t: &TypeDescr) {
    write_string(out, &t.name);
    write_size(out, t.properties.len());
    for p in &t.properties {
        write_string(out, p);
    }
    write_bytes(out, &t.description);
}

fn write_var(out: &mut Vec<u8>, v: &Var) {
    write_string(out, &v.name);
    write_string(out, &v.vtype);
    write_bytes(out, &v.value);
}

fn write_vars(out: &mut Vec<u8>, vars: &BTreeMap<String, Var>) {
    write_size(out, vars.len());
    for v in vars.values() {
        write_var(out, v);
    }
}

fn write_symbol(out: &mut Vec<u8>, s: &Symbol) {
    write_string(out, &s.name);
    out.extend_from_slice(&s.offset.to_le_bytes());
}

fn write_relocation(out: &mut Vec<u8>, r: &Relocation) {
    out.extend_from_slice(&r.offset.to_le_bytes());
    out.extend_from_slice(&r.kind.wire().to_le_bytes());
    write_string(out, &r.symbol);
    out.extend_from_slice(&r.addend.to_le_bytes());
}

fn write_function(out: &mut Vec<u8>, f: &Function) {
    write_string(out, &f.name);
    write_string(out, &f.type_sig);
    write_string(out, &f.src_file);
    out.extend_from_slice(&f.src_line.to_le_bytes());
    write_size(out, f.args.len());
    for a in &f.args {
        write_var(out, a);
    }
    write_size(out, f.symbols.len());
    for s in &f.symbols {
        write_symbol(out, s);
    }
    write_size(out, f.relocations.len());
    for r in &f.relocations {
        write_relocation(out, r);
    }
    write_bytes(out, &f.body);
}

/// Bounds-checked little-endian reader over a `.bo` stream.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let end = self.pos.checked_add(n).ok_or_else(|| Error::CorruptObject {
            detail: "size overflow".into(),
        })?;
        if end > self.buf.len() {
            return Err(Error::CorruptObject {
                detail: "unexpected end of stream".into(),
            });
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("4 bytes")))
    }

    fn i32(&mut self) -> Result<i32, Error> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().expect("4 bytes")))
    }

    fn u64(&mut self) -> Result<u64, Error> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().expect("8 bytes")))
    }

    /// A size field that must fit the remaining stream.
    fn size(&mut self) -> Result<usize, Error> {
        let raw = self.u64()?;
        let remaining = (self.buf.len() - self.pos) as u64;
        if raw > remaining {
            return Err(Error::CorruptObject {
                detail: alloc::format!("size field {raw} exceeds remaining {remaining} bytes"),
            });
        }
        Ok(raw as usize)
    }

    /// An element count; every element takes at least one byte, so a count
    /// beyond the remaining stream is corrupt.
    fn count(&mut self) -> Result<u64, Error> {
        let raw = self.u64()?;
        if raw > (self.buf.len() - self.pos) as u64 {
            return Err(Error::CorruptObject {
                detail: alloc::format!("element count {raw} exceeds remaining stream"),
            });
        }
        Ok(raw)
    }

    fn bytes(&mut self) -> Result<Vec<u8>, Error> {
        let n = self.size()?;
        Ok(self.take(n)?.to_vec())
    }

    fn string(&mut self) -> Result<String, Error> {
        let raw = self.bytes()?;
        String::from_utf8(raw).map_err(|_| Error::CorruptObject {
            detail: "string is not valid UTF-8".into(),
        })
    }
}

fn read_type_descr(r: &mut Reader<'_>) -> Result<TypeDescr, Error> {
    let name = r.string()?;
    let mut properties = Vec::new();
    for _ in 0..r.count()? {
        properties.push(r.string()?);
    }
    let description = r.bytes()?;
    Ok(TypeDescr {
        name,
        properties,
        description,
    })
}

fn read_var(r: &mut Reader<'_>) -> Result<Var, Error> {
    let name = r.string()?;
    let vtype = r.string()?;
    let value = r.bytes()?;
    Ok(Var { name, vtype, value })
}

fn read_vars(r: &mut Reader<'_>) -> Result<BTreeMap<String, Var>, Error> {
    let mut out = BTreeMap::new();
    for _ in 0..r.count()? {
        let v = read_var(r)?;
        out.insert(v.name.clone(), v);
    }
    Ok(out)
}

fn read_symbol(r: &mut Reader<'_>) -> Result<Symbol, Error> {
    let name = r.string()?;
    let offset = r.u32()?;
    Ok(Symbol { name, offset })
}

fn read_relocation(r: &mut Reader<'_>) -> Result<Relocation, Error> {
    let offset = r.u32()?;
    let kind_raw = r.u32()?;
    let kind = RelocKind::from_wire(kind_raw).ok_or_else(|| Error::CorruptObject {
        detail: alloc::format!("unknown relocation kind {kind_raw}"),
    })?;
    let symbol = r.string()?;
    let addend = r.i32()?;
    Ok(Relocation {
        offset,
        kind,
        symbol,
        addend,
    })
}

fn read_function(r: &mut Reader<'_>) -> Result<Function, Error> {
    let name = r.string()?;
    let type_sig = r.string()?;
    let src_file = r.string()?;
    let src_line = r.u64()?;
    let mut args = Vec::new();
    for _ in 0..r.count()? {
        args.push(read_var(r)?);
    }
    let mut symbols = Vec::new();
    for _ in 0..r.count()? {
        symbols.push(read_symbol(r)?);
    }
    let mut relocations = Vec::new();
    for _ in 0..r.count()? {
        relocations.push(read_relocation(r)?);
    }
    let body = r.bytes()?;
    Ok(Function {
        name,
        type_sig,
        src_file,
        src_line,
        args,
        symbols,
        relocations,
        body,
    })
}
