use fastrand::Rng;

use crate::asm::{Cell, Item, Label, LabelArena, Word};
use crate::ast::Position;
use crate::layout::RECORD_HEADER;
use crate::scope::{Resolution, ScopeArena, ScopeId};
use crate::vm::{self, Mode, Opcode};

use super::arg::{Arg, Operand};
use super::CodegenError;

type Emitted = Result<Vec<Item>, CodegenError>;

// ---- Encoding choice ----

/// Chooses among equivalent encodings of `copy` and `jump`.
///
/// Deterministic selection always takes the first form, so the same program
/// always links to the same image.
#[derive(Debug, Clone)]
pub struct Selector {
    rng: Option<Rng>,
}

impl Selector {
    pub fn deterministic() -> Self {
        Selector { rng: None }
    }

    pub fn seeded(seed: u64) -> Self {
        Selector { rng: Some(Rng::with_seed(seed)) }
    }

    fn pick(&mut self, choices: usize) -> usize {
        match &mut self.rng {
            Some(rng) => rng.usize(..choices),
            None => 0,
        }
    }

    fn nonzero(&mut self) -> i64 {
        match &mut self.rng {
            Some(rng) => rng.i64(1..1000),
            None => 1,
        }
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::deterministic()
    }
}

// ---- Emitter ----

/// Where the code being emitted came from: the scope names resolve in, and
/// the source position reported if they don't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site {
    pub scope: ScopeId,
    pub pos: Position,
}

impl Site {
    pub fn new(scope: ScopeId, pos: Position) -> Self {
        Site { scope, pos }
    }
}

/// Lowers operands and builds instructions. Owns the label and scope arenas
/// for the duration of a compilation.
pub struct Emitter {
    pub labels: LabelArena,
    pub scopes: ScopeArena,
    selector: Selector,
    site: Site,
}

/// Operand inserts in order, then the instruction word, then the operand words.
fn format(opcode: Opcode, operands: Vec<Operand>) -> Vec<Item> {
    let modes: Vec<Mode> = operands.iter().map(|o| o.mode).collect();
    let mut items = Vec::new();
    let mut cells = Vec::with_capacity(operands.len());
    for operand in operands {
        items.extend(operand.insert);
        cells.push(Item::Cell(operand.cell));
    }
    items.push(Item::word(vm::encode(opcode, &modes)));
    items.extend(cells);
    items
}

impl Emitter {
    pub fn new(scopes: ScopeArena, selector: Selector) -> Self {
        Emitter {
            labels: LabelArena::new(),
            scopes,
            selector,
            site: Site::new(ScopeArena::GLOBALS, Position::NONE),
        }
    }

    pub fn fresh(&mut self, name: &str) -> Label {
        self.labels.fresh(name)
    }

    /// Run `f` with names resolving from `site`.
    pub fn within<T>(&mut self, site: Site, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.site, site);
        let out = f(self);
        self.site = saved;
        out
    }

    /// Turn an operand description into one operand word plus setup code.
    pub fn lower(&mut self, arg: &Arg) -> Result<Operand, CodegenError> {
        match arg {
            Arg::Const { mode, cell } => Ok(Operand::fixed(*mode, cell.clone())),

            Arg::Offset { base, by } => {
                let base = self.lower(base)?;
                let by = self.lower(by)?;
                if base.constant && by.constant && by.mode == Mode::Immediate {
                    if base.cell.is_labeled() || by.cell.is_labeled() {
                        return Err(CodegenError::LabeledFold);
                    }
                    let word = Word::sum(vec![base.cell.word, by.cell.word]);
                    return Ok(Operand::fixed(base.mode, Cell::new(word)));
                }
                let tag = self.fresh("offset");
                let mode = base.mode;
                let raw = Operand { mode: Mode::Immediate, ..base };
                let insert = format(
                    Opcode::Add,
                    vec![raw, by, Operand::fixed(Mode::Position, Cell::new(tag))],
                );
                Ok(Operand { mode, cell: Cell::labeled(0, tag), constant: false, insert })
            }

            Arg::Deref(inner) => {
                let inner = self.lower(inner)?;
                if inner.mode != Mode::Position {
                    return Err(CodegenError::NotAPointer { mode: inner.mode });
                }
                let tag = self.fresh("deref");
                let insert = self.copy_operands(inner, Operand::fixed(Mode::Position, Cell::new(tag)));
                Ok(Operand { mode: Mode::Immediate, cell: Cell::labeled(0, tag), constant: false, insert })
            }

            Arg::Relabel { to, arg } => {
                let operand = self.lower(arg)?;
                if operand.mode == *to {
                    return Err(CodegenError::ModeConversion { from: operand.mode, to: *to });
                }
                Ok(Operand { mode: *to, ..operand })
            }

            Arg::Spill(inner) => {
                let inner = self.lower(inner)?;
                if inner.mode != Mode::Relative {
                    return Err(CodegenError::NotRelative { mode: inner.mode });
                }
                let tag = self.fresh("spill");
                let insert = self.copy_operands(inner, Operand::fixed(Mode::Position, Cell::new(tag)));
                Ok(Operand { mode: Mode::Position, cell: Cell::labeled(0, tag), constant: false, insert })
            }

            Arg::Var { name, scope_slot } => self.lower_var(name, *scope_slot),
        }
    }

    fn lower_var(&mut self, name: &str, scope_slot: i64) -> Result<Operand, CodegenError> {
        let resolution = self.scopes.resolve(self.site.scope, name).ok_or_else(|| {
            CodegenError::Unresolved { name: name.to_string(), pos: self.site.pos }
        })?;
        match resolution {
            Resolution::Static { location, offset } => {
                let slot = Arg::offset(Arg::imm(location), Arg::imm(RECORD_HEADER + offset as i64));
                self.lower(&slot.to_pointer())
            }
            Resolution::Dynamic { levels_up, offset } => {
                // t: scope pointer, then each parent, then the slot address
                let t = self.fresh("var");
                let mut insert = self.copy(Arg::rel(scope_slot), Arg::ptr(t))?;
                for _ in 0..levels_up {
                    insert.extend(self.copy(Arg::ptr(t).deref().to_pointer(), Arg::ptr(t))?);
                }
                let slot = Arg::offset(Arg::imm(RECORD_HEADER + offset as i64), Arg::ptr(t));
                insert.extend(self.copy(slot, Arg::ptr(t))?);
                Ok(Operand { mode: Mode::Position, cell: Cell::labeled(0, t), constant: false, insert })
            }
        }
    }

    fn instruction(&mut self, opcode: Opcode, args: &[Arg]) -> Emitted {
        let operands = args.iter().map(|a| self.lower(a)).collect::<Result<Vec<_>, _>>()?;
        Ok(format(opcode, operands))
    }

    // ── Instructions ──

    pub fn add(&mut self, a: Arg, b: Arg, out: Arg) -> Emitted {
        self.instruction(Opcode::Add, &[a, b, out])
    }

    pub fn mult(&mut self, a: Arg, b: Arg, out: Arg) -> Emitted {
        self.instruction(Opcode::Multiply, &[a, b, out])
    }

    pub fn read(&mut self, out: Arg) -> Emitted {
        self.instruction(Opcode::Read, &[out])
    }

    pub fn write(&mut self, value: Arg) -> Emitted {
        self.instruction(Opcode::Write, &[value])
    }

    pub fn jump_if_true(&mut self, cond: Arg, to: Arg) -> Emitted {
        self.instruction(Opcode::JumpIfTrue, &[cond, to])
    }

    pub fn jump_if_false(&mut self, cond: Arg, to: Arg) -> Emitted {
        self.instruction(Opcode::JumpIfFalse, &[cond, to])
    }

    pub fn less_than(&mut self, a: Arg, b: Arg, out: Arg) -> Emitted {
        self.instruction(Opcode::LessThan, &[a, b, out])
    }

    pub fn equals(&mut self, a: Arg, b: Arg, out: Arg) -> Emitted {
        self.instruction(Opcode::Equals, &[a, b, out])
    }

    pub fn adjust_base(&mut self, by: Arg) -> Emitted {
        self.instruction(Opcode::AdjustBase, &[by])
    }

    pub fn halt(&self) -> Vec<Item> {
        vec![Item::word(Opcode::Halt.code())]
    }

    // ── Composites ──

    pub fn move_stack(&mut self, by: i64) -> Emitted {
        self.adjust_base(Arg::imm(by))
    }

    pub fn copy(&mut self, from: Arg, to: Arg) -> Emitted {
        let from = self.lower(&from)?;
        let to = self.lower(&to)?;
        Ok(self.copy_operands(from, to))
    }

    fn copy_operands(&mut self, from: Operand, to: Operand) -> Vec<Item> {
        let zero = Operand::fixed(Mode::Immediate, Cell::new(0));
        let one = Operand::fixed(Mode::Immediate, Cell::new(1));
        match self.selector.pick(4) {
            0 => format(Opcode::Add, vec![from, zero, to]),
            1 => format(Opcode::Add, vec![zero, from, to]),
            2 => format(Opcode::Multiply, vec![from, one, to]),
            _ => format(Opcode::Multiply, vec![one, from, to]),
        }
    }

    /// `out += amount`
    pub fn add_to(&mut self, amount: Arg, out: Arg) -> Emitted {
        match self.selector.pick(2) {
            0 => self.add(out.clone(), amount, out),
            _ => self.add(amount, out.clone(), out),
        }
    }

    pub fn jump(&mut self, to: Arg) -> Emitted {
        match self.selector.pick(3) {
            2 => self.jump_if_false(Arg::imm(0), to),
            _ => {
                let cond = self.selector.nonzero();
                self.jump_if_true(Arg::imm(cond), to)
            }
        }
    }

    /// Store `value` at the bump cursor and advance it by one.
    pub fn write_to_ram(&mut self, value: Arg) -> Emitted {
        let cursor = Arg::ptr(Label::RAM_POINTER).deref().to_pointer();
        let mut items = self.copy(value, cursor)?;
        items.extend(self.add_to(Arg::imm(1), Arg::ptr(Label::RAM_POINTER))?);
        Ok(items)
    }
}
