use crate::asm::{Cell, Item, Label, Word};
use crate::vm::Mode;

/// Slot, relative to the current frame, that holds the active scope pointer.
pub const SCOPE_SLOT: i64 = -2;

/// An operand before lowering.
///
/// Builders are plain values: building the same `Arg` twice gives equal
/// trees, and nothing is emitted until [`Emitter::lower`](super::Emitter::lower).
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// A literal operand word.
    Const { mode: Mode, cell: Cell },
    /// `base + by`. `base` contributes its raw word and keeps its mode;
    /// `by` is read through its own mode.
    Offset { base: Box<Arg>, by: Box<Arg> },
    /// Load what a position operand points at, as an immediate.
    Deref(Box<Arg>),
    /// The same word read in another mode.
    Relabel { to: Mode, arg: Box<Arg> },
    /// Copy a relative slot into a cell and address through that cell.
    Spill(Box<Arg>),
    /// The storage cell of a variable, found from the scope pointer in `scope_slot`.
    Var { name: String, scope_slot: i64 },
}

impl Arg {
    pub fn ptr(word: impl Into<Word>) -> Arg {
        Arg::Const { mode: Mode::Position, cell: Cell::new(word) }
    }

    pub fn imm(word: impl Into<Word>) -> Arg {
        Arg::Const { mode: Mode::Immediate, cell: Cell::new(word) }
    }

    pub fn rel(offset: i64) -> Arg {
        Arg::Const { mode: Mode::Relative, cell: Cell::new(offset) }
    }

    /// A zero operand carrying `label`, so an earlier instruction can write it.
    pub fn patched(mode: Mode, label: Label) -> Arg {
        Arg::Const { mode, cell: Cell::labeled(0, label) }
    }

    pub fn var(name: &str) -> Arg {
        Arg::var_from(name, SCOPE_SLOT)
    }

    pub fn var_from(name: &str, scope_slot: i64) -> Arg {
        Arg::Var { name: name.to_string(), scope_slot }
    }

    pub fn offset(base: Arg, by: Arg) -> Arg {
        Arg::Offset { base: Box::new(base), by: Box::new(by) }
    }

    pub fn deref(self) -> Arg {
        Arg::Deref(Box::new(self))
    }

    pub fn to_pointer(self) -> Arg {
        Arg::Relabel { to: Mode::Position, arg: Box::new(self) }
    }

    pub fn to_immediate(self) -> Arg {
        Arg::Relabel { to: Mode::Immediate, arg: Box::new(self) }
    }

    pub fn spill(self) -> Arg {
        Arg::Spill(Box::new(self))
    }
}

/// A lowered operand: one instruction word plus the code that must run first.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub mode: Mode,
    pub cell: Cell,
    /// Known before the program runs; only constant operands fold.
    pub constant: bool,
    pub insert: Vec<Item>,
}

impl Operand {
    pub fn fixed(mode: Mode, cell: Cell) -> Self {
        Operand { mode, cell, constant: true, insert: Vec::new() }
    }
}
