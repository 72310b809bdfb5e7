//! Per-function allocation arena: named values with a stable frame slot and
//! an optional live register binding.
//!
//! The arena is pure bookkeeping — it decides *where* things live and in
//! what order registers should be victimized, while the
//! [`FunctionBuilder`](crate::FunctionBuilder) emits the actual spill and
//! reload instructions.  Register residency is tracked at 64-bit
//! granularity: at most one allocation per physical register container.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::encoder::Indirect;
use crate::error::Error;
use crate::reg::Register;

/// A MOV-able storage location for an allocation: its live register if it
/// has one, otherwise its base-pointer-relative frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loc {
    /// Live in this register.
    Reg(Register),
    /// In memory at `[rbp + offset]`.
    Mem(Indirect),
}

/// A named storable value owned by one function.
///
/// Every allocation reserves a frame slot at creation, so spilling never
/// needs a layout decision; the register binding comes and goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    name: String,
    size_bits: u32,
    /// Scalars up to 64 bits can live in a register; larger stack buffers
    /// are only ever addressed (LEA), never loaded.
    regable: bool,
    reg: Option<Register>,
    in_mem: bool,
    frame_off: i32,
}

impl Allocation {
    /// The allocation's name (unique within its function).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared size in bits.
    #[must_use]
    pub fn size_bits(&self) -> u32 {
        self.size_bits
    }

    /// Whether the value itself can live in a register.
    #[must_use]
    pub fn fits_in_register(&self) -> bool {
        self.regable
    }

    /// The register currently holding the value, if any.
    #[must_use]
    pub fn register(&self) -> Option<Register> {
        self.reg
    }

    /// Whether the frame slot currently holds the value.
    #[must_use]
    pub fn in_memory(&self) -> bool {
        self.in_mem
    }

    /// Signed offset of the frame slot from RBP (negative for locals,
    /// positive for stack-passed arguments).
    #[must_use]
    pub fn frame_offset(&self) -> i32 {
        self.frame_off
    }

    /// Width in bits the value occupies in a register: its own size for
    /// scalars, pointer width for stack buffers (their address is loaded).
    #[must_use]
    pub fn reg_size(&self) -> u16 {
        if self.regable {
            self.size_bits as u16
        } else {
            64
        }
    }

    /// The frame slot as a sized memory operand.
    #[must_use]
    pub fn slot(&self) -> Indirect {
        Indirect::sized(Register::Rbp, self.frame_off, self.reg_size())
    }
}

/// Map of named values to storage, with LRU victim selection and frame slot
/// reuse.
#[derive(Debug, Default)]
pub struct AllocArena {
    by_name: BTreeMap<String, Allocation>,
    /// Register residency, keyed by 64-bit container.
    by_reg: BTreeMap<Register, String>,
    /// Containers in least-recently-used order; most recent at the tail.
    lru: Vec<Register>,
    /// Bytes consumed below RBP so far.
    frame_cursor: i32,
    /// `(size, offset)` slots returned by forget, reused on exact size match.
    free_slots: Vec<(i32, i32)>,
}

impl AllocArena {
    /// An empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total frame bytes consumed — the value the epilogue patches into the
    /// prologue's `SUB RSP` site.
    #[must_use]
    pub fn frame_size(&self) -> i32 {
        self.frame_cursor
    }

    /// Reserve `size` bytes of frame space and return the RBP-relative
    /// offset.  Exact-size free slots are reused before the frame grows.
    fn space(&mut self, size: i32) -> i32 {
        if let Some(i) = self.free_slots.iter().position(|&(s, _)| s == size) {
            return self.free_slots.remove(i).1;
        }
        self.frame_cursor += size;
        -self.frame_cursor
    }

    fn return_space(&mut self, size: i32, offset: i32) {
        self.free_slots.push((size, offset));
    }

    fn check_fresh(&self, name: &str) -> Result<(), Error> {
        if self.by_name.contains_key(name) {
            return Err(Error::DuplicateName { name: name.into() });
        }
        Ok(())
    }

    /// Declare a new register-loadable local of `bits` size.  Locals start
    /// in memory conceptually; nothing is live until first use.
    pub fn new_local(&mut self, name: &str, bits: u32) -> Result<(), Error> {
        self.check_fresh(name)?;
        let frame_off = self.space(bits as i32 / 8);
        self.by_name.insert(
            name.into(),
            Allocation {
                name: name.into(),
                size_bits: bits,
                regable: true,
                reg: None,
                in_mem: false,
                frame_off,
            },
        );
        Ok(())
    }

    /// Declare a raw stack buffer of `size` bytes.  Buffers are addressed
    /// with LEA; they never live in a register themselves.
    pub fn alloc_bytes(&mut self, name: &str, size: u32) -> Result<(), Error> {
        self.check_fresh(name)?;
        let frame_off = self.space(size as i32);
        self.by_name.insert(
            name.into(),
            Allocation {
                name: name.into(),
                size_bits: size * 8,
                regable: false,
                reg: None,
                in_mem: false,
                frame_off,
            },
        );
        Ok(())
    }

    /// Bind `name` to an argument arriving in `reg`: live in the register
    /// immediately, with a frame slot reserved for later spills.
    pub fn bind_arg(&mut self, name: &str, reg: Register) -> Result<(), Error> {
        self.check_fresh(name)?;
        let bits = reg.size_bits() as u32;
        let frame_off = self.space(bits as i32 / 8);
        self.by_name.insert(
            name.into(),
            Allocation {
                name: name.into(),
                size_bits: bits,
                regable: true,
                reg: Some(reg),
                in_mem: false,
                frame_off,
            },
        );
        self.by_reg.insert(reg.full(), name.into());
        self.touch(reg.full());
        Ok(())
    }

    /// Bind `name` to the stack-passed argument at index `stacki` (0 is the
    /// first argument beyond the register six).  The offset skips the
    /// return address and the prologue's saved registers.
    pub fn stack_arg(
        &mut self,
        name: &str,
        stacki: u32,
        base_pointer_off: i32,
    ) -> Result<(), Error> {
        self.check_fresh(name)?;
        self.by_name.insert(
            name.into(),
            Allocation {
                name: name.into(),
                size_bits: 64,
                regable: true,
                reg: None,
                in_mem: true,
                frame_off: (stacki as i32 + 1) * 8 + base_pointer_off,
            },
        );
        Ok(())
    }

    /// Detach `name` and return its frame slot to the free list.  Yields the
    /// register it occupied, if any, so the caller can release the pool
    /// reservation.
    pub fn forget(&mut self, name: &str) -> Result<Option<Register>, Error> {
        let Some(alloc) = self.by_name.remove(name) else {
            return Err(Error::UnknownAllocation { name: name.into() });
        };
        if let Some(reg) = alloc.reg {
            self.by_reg.remove(&reg.full());
            self.remove_lru(reg.full());
        }
        self.return_space(alloc.size_bits as i32 / 8, alloc.frame_off);
        Ok(alloc.reg)
    }

    /// Look up an allocation by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Allocation> {
        self.by_name.get(name)
    }

    /// The allocation currently resident in the given 64-bit container.
    #[must_use]
    pub fn occupant(&self, full: Register) -> Option<&str> {
        self.by_reg.get(&full.full()).map(String::as_str)
    }

    /// A MOV-able location for `name`: its register when live (bumping the
    /// LRU), otherwise its frame slot (marking the slot as holding the
    /// value, since the caller may be about to store through it).
    pub fn location(&mut self, name: &str) -> Option<Loc> {
        if let Some(reg) = self.by_name.get(name)?.reg {
            self.touch(reg.full());
            return Some(Loc::Reg(reg));
        }
        let alloc = self.by_name.get_mut(name)?;
        alloc.in_mem = true;
        Some(Loc::Mem(alloc.slot()))
    }

    /// Record that `name` now lives in `reg`.
    pub fn note_loaded(&mut self, name: &str, reg: Register) {
        if let Some(alloc) = self.by_name.get_mut(name) {
            alloc.reg = Some(reg);
            self.by_reg.insert(reg.full(), name.into());
            self.touch(reg.full());
        }
    }

    /// Record that `name` left its register.  When `stored` the frame slot
    /// now holds the value.  Returns the vacated register.
    pub fn note_evicted(&mut self, name: &str, stored: bool) -> Option<Register> {
        let alloc = self.by_name.get_mut(name)?;
        let reg = alloc.reg.take()?;
        if stored {
            alloc.in_mem = true;
        }
        self.by_reg.remove(&reg.full());
        self.remove_lru(reg.full());
        Some(reg)
    }

    /// The least-recently-used register-resident container — the eviction
    /// victim.
    #[must_use]
    pub fn victim(&self) -> Option<Register> {
        self.lru.first().copied()
    }

    /// All register-resident containers, least recently used first.
    #[must_use]
    pub fn resident(&self) -> Vec<Register> {
        self.lru.clone()
    }

    /// Move `full` to the most-recently-used position.
    pub fn touch(&mut self, full: Register) {
        self.lru.retain(|&r| r != full);
        self.lru.push(full);
    }

    fn remove_lru(&mut self, full: Register) {
        self.lru.retain(|&r| r != full);
    }
}
