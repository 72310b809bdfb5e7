//! Per-function register pool with System V AMD64 ABI register classes.
//!
//! The pool tracks which physical registers are reserved and at what width.
//! 8-bit registers follow the brother rule: AL and AH can be reserved
//! independently inside RAX, but any 16/32/64-bit use of the A family blocks
//! both, and vice versa.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::reg::Register;
use crate::reg::Register::*;

/// Registers a caller must save before a `call` (the callee may clobber them).
pub const CALLER_SAVED: &[Register] = &[Rax, Rcx, Rdx, Rsi, Rdi, R8, R9, R10, R11];

/// Registers a callee must preserve.
pub const CALLEE_SAVED: &[Register] = &[Rbx, R12, R13, R14, R15, Rbp, Rsp];

/// Integer argument registers, in argument order.
pub const ARG_REGISTERS: &[Register] = &[Rdi, Rsi, Rdx, Rcx, R8, R9];

// Allocation preference orders.  Earlier registers are handed out sooner, so
// the argument registers (and RAX, which carries return values) come last —
// they are the most likely to be clobbered by calling-convention traffic.
// Low bytes across the four families before any high byte: splitting a
// container into brothers only starts once every family is occupied.
const ALLOC_ORDER_8: &[Register] = &[Bl, Cl, Dl, Al, Bh, Ch, Dh, Ah];
const ALLOC_ORDER_64: &[Register] = &[
    R10, R11, Rbx, R12, R13, R14, R15, Rbp, Rsp, R9, R8, Rcx, Rdx, Rsi, Rdi, Rax,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RegState {
    in_use: bool,
    held_bits: u16,
}

/// Tracks reservation state for the whole general-purpose register file.
///
/// State is kept for the eight 8-bit brother registers and the sixteen
/// 64-bit containers; 16- and 32-bit reservations are recorded on their
/// container with the held width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterPool {
    states: BTreeMap<Register, RegState>,
}

impl Default for RegisterPool {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterPool {
    /// A pool with every register free.
    #[must_use]
    pub fn new() -> Self {
        let mut states = BTreeMap::new();
        for r in [
            Al, Ah, Bl, Bh, Cl, Ch, Dl, Dh, Rax, Rbx, Rcx, Rdx, Rsp, Rbp, Rsi, Rdi, R8, R9, R10,
            R11, R12, R13, R14, R15,
        ] {
            states.insert(r, RegState::default());
        }
        Self { states }
    }

    fn state(&self, r: Register) -> RegState {
        self.states.get(&r).copied().unwrap_or_default()
    }

    fn state_mut(&mut self, r: Register) -> &mut RegState {
        self.states.entry(r).or_default()
    }

    /// Find a free 8-bit register whose container is either free or already
    /// split into 8-bit halves.
    fn unused8(&self) -> Option<Register> {
        ALLOC_ORDER_8.iter().copied().find(|&r| {
            let full = self.state(r.full());
            !self.state(r).in_use && (!full.in_use || full.held_bits == 8)
        })
    }

    /// Reserve a free register of at least notionally `bits` width and
    /// return it (the register returned is exactly `bits` wide).
    ///
    /// Registers obtained here must be [`release`](Self::release)d when no
    /// longer needed.
    pub fn get(&mut self, bits: u16) -> Option<Register> {
        if bits == 8 {
            let r = self.unused8()?;
            *self.state_mut(r) = RegState {
                in_use: true,
                held_bits: 8,
            };
            *self.state_mut(r.full()) = RegState {
                in_use: true,
                held_bits: 8,
            };
            return Some(r);
        }
        for &full in ALLOC_ORDER_64 {
            if !self.state(full).in_use {
                if let Some(partial) = full.partial(bits) {
                    *self.state_mut(full) = RegState {
                        in_use: true,
                        held_bits: bits,
                    };
                    return Some(partial);
                }
            }
        }
        None
    }

    /// Reserve a specific register.  Returns `false` if the register (or a
    /// conflicting alias) is already reserved.
    pub fn reserve(&mut self, r: Register) -> bool {
        if r.size_bits() == 8 {
            let full = self.state(r.full());
            if !self.state(r).in_use && (!full.in_use || full.held_bits == 8) {
                *self.state_mut(r) = RegState {
                    in_use: true,
                    held_bits: 8,
                };
                *self.state_mut(r.full()) = RegState {
                    in_use: true,
                    held_bits: 8,
                };
                return true;
            }
            false
        } else {
            if !self.state(r.full()).in_use {
                *self.state_mut(r.full()) = RegState {
                    in_use: true,
                    held_bits: r.size_bits(),
                };
                return true;
            }
            false
        }
    }

    /// Return a register to the pool.
    ///
    /// Releasing an 8-bit register frees the 64-bit container only once its
    /// brother is also free.
    pub fn release(&mut self, r: Register) {
        if r.size_bits() == 8 {
            *self.state_mut(r) = RegState::default();
            let brother_busy = r.brother8().is_some_and(|b| self.state(b).in_use);
            if !brother_busy {
                *self.state_mut(r.full()) = RegState::default();
            }
        } else {
            *self.state_mut(r.full()) = RegState::default();
        }
    }

    /// Whether `r` is blocked, counting aliases: if RAX is held, EAX, AX,
    /// AL, and AH all report in-use; if only AL is held, AH stays free but
    /// AX/EAX/RAX report in-use.
    #[must_use]
    pub fn in_use(&self, r: Register) -> bool {
        let full = self.state(r.full());
        if r.size_bits() == 8 {
            return self.state(r).in_use || (full.in_use && full.held_bits != 8);
        }
        full.in_use
    }

    /// The registers currently reserved inside `r`'s container — the live
    /// holders that block `r` from being reserved.
    #[must_use]
    pub fn conflicts(&self, r: Register) -> Vec<Register> {
        let full = self.state(r.full());
        if !full.in_use {
            return Vec::new();
        }
        if full.held_bits == 8 {
            let Some(subs) = r.sub_registers8() else {
                return Vec::new();
            };
            return subs
                .into_iter()
                .filter(|&s| self.state(s).in_use)
                .collect();
        }
        match r.full().partial(full.held_bits) {
            Some(holder) => {
                let mut v = Vec::with_capacity(1);
                v.push(holder);
                v
            }
            None => Vec::new(),
        }
    }
}
