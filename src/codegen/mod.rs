//! AST to instruction stream.
//!
//! Frame convention: every expression leaves its value in relative slot 0
//! and finds the record of the scope it was parsed in at slot -2. It may
//! clobber slot 0 and anything above it.
//!
//! A call frame sits three words above its caller: slot 0 holds the callee's
//! new scope record and slot 1 the return address. The callee overwrites
//! slot 0 with its result before returning.

use num_bigint::BigInt;

use crate::asm::{assemble, AssembleError, Assembly, Item, Label, LabelArena};
use crate::ast::{referenced_names, Assignment, Expr, Position, Program, Spanned};
use crate::layout::{CLOSURE_CODE, CLOSURE_SCOPE, TUPLE_HEADER};
use crate::scope::ScopeArena;
use crate::vm::Mode;

pub mod arg;
pub mod builtins;
pub mod emit;

pub use arg::{Arg, Operand};
pub use emit::{Emitter, Selector, Site};

#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error("unresolved name '{name}' at {pos}")]
    Unresolved { name: String, pos: Position },
    #[error("operand is already {to:?}; cannot convert {from:?} to {to:?}")]
    ModeConversion { from: Mode, to: Mode },
    #[error("cannot dereference a {mode:?} operand")]
    NotAPointer { mode: Mode },
    #[error("only relative operands can be spilled, not {mode:?}")]
    NotRelative { mode: Mode },
    #[error("a labelled operand cannot be folded into a constant")]
    LabeledFold,
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Codegen(#[from] CodegenError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// `None` always picks the first encoding; `Some` varies them.
    pub seed: Option<u64>,
    /// First heap address.
    pub ram_begin: u64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions { seed: None, ram_begin: 1_000_000 }
    }
}

/// Code for one node: `immediate` runs in place, `hoisted` is placed once
/// after the static records.
#[derive(Debug, Default)]
pub struct Output {
    pub immediate: Vec<Item>,
    pub hoisted: Vec<Item>,
}

impl Output {
    fn code(immediate: Vec<Item>) -> Self {
        Output { immediate, hoisted: Vec::new() }
    }

    fn append(&mut self, other: Output) {
        self.immediate.extend(other.immediate);
        self.hoisted.extend(other.hoisted);
    }
}

/// A linked program and what is needed to inspect it.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub assembly: Assembly,
    pub labels: LabelArena,
    /// Built-ins included in the image, in catalog order.
    pub builtins: Vec<&'static str>,
    /// Global names in slot order.
    pub globals: Vec<String>,
}

impl Compiled {
    pub fn words(&self) -> &[BigInt] {
        &self.assembly.words
    }

    pub fn global_scope(&self) -> Option<usize> {
        self.assembly.address(Label::GLOBAL_SCOPE)
    }

    pub fn stack_begin(&self) -> Option<usize> {
        self.assembly.address(Label::STACK_BEGIN)
    }

    /// Address of the global record slot holding `name`.
    pub fn global_slot(&self, name: &str) -> Option<usize> {
        let index = self.globals.iter().position(|g| g == name)?;
        Some(self.global_scope()? + 1 + index)
    }

    /// Placed labels as `(address, name#id)`, for listings.
    pub fn symbols(&self) -> Vec<(usize, String)> {
        self.assembly
            .symbols()
            .into_iter()
            .map(|(label, addr)| (addr, self.labels.describe(label)))
            .collect()
    }
}

fn cells(items: &[Item]) -> usize {
    items.iter().filter(|i| matches!(i, Item::Cell(_))).count()
}

/// Generate, lay out and link a whole program.
///
/// Image layout: entry code, halt, the scope allocator, built-in bodies,
/// the built-in record, the global record, hoisted bodies, the heap cursor,
/// and finally the initial scope pointer the stack starts above.
pub fn compile(program: Program, options: &CompileOptions) -> Result<Compiled, CompileError> {
    let referenced = referenced_names(&program);
    let selected = builtins::select(&referenced);
    let Program { assignments, scopes } = program;

    let selector = match options.seed {
        Some(seed) => Selector::seeded(seed),
        None => Selector::deterministic(),
    };
    let mut e = Emitter::new(scopes, selector);
    let mut locations = Vec::with_capacity(selected.len());
    for b in &selected {
        e.scopes.bind(ScopeArena::BUILTINS, b.name);
        locations.push(e.fresh(b.name));
    }
    log::debug!(
        "builtins: {}",
        selected.iter().map(|b| b.name).collect::<Vec<_>>().join(" ")
    );

    let mut code = e.adjust_base(Arg::offset(Arg::imm(Label::STACK_BEGIN), Arg::imm(2)))?;
    let mut hoisted = Vec::new();
    for a in &assignments {
        let out = assignment(&mut e, a)?;
        code.extend(out.immediate);
        hoisted.extend(out.hoisted);
        let store = Site::new(ScopeArena::GLOBALS, a.pos);
        code.extend(e.within(store, |e| e.copy(Arg::rel(0), Arg::var(&a.node.name)))?);
    }
    code.extend(e.halt());
    code.extend(allocate_scope(&mut e)?);

    for (b, location) in selected.iter().zip(&locations) {
        let body = builtins::generate(&mut e, b, *location)?;
        log::debug!("builtin {} is {} words", b.name, cells(&body));
        code.extend(body);
    }

    let globals = e.scopes.names(ScopeArena::GLOBALS).to_vec();
    code.push(Item::labeled(0, Label::BUILTIN_SCOPE));
    code.extend(locations.iter().map(|l| Item::word(*l)));
    code.push(Item::labeled(Label::BUILTIN_SCOPE, Label::GLOBAL_SCOPE));
    code.extend(globals.iter().map(|_| Item::word(0)));
    code.extend(hoisted);
    code.push(Item::labeled(BigInt::from(options.ram_begin), Label::RAM_POINTER));
    code.push(Item::labeled(Label::GLOBAL_SCOPE, Label::STACK_BEGIN));

    let assembly = assemble(code, &e.labels)?;
    log::debug!("program is {} words, {} labels", assembly.len(), e.labels.len());
    Ok(Compiled {
        assembly,
        labels: e.labels,
        builtins: selected.iter().map(|b| b.name).collect(),
        globals,
    })
}

/// Shared routine: slot 0 = slot count, slot 1 = parent record, slot 2 =
/// continuation. Leaves the new record in slot 0.
fn allocate_scope(e: &mut Emitter) -> Result<Vec<Item>, CodegenError> {
    let mut items = vec![Item::Hanging(Label::ALLOCATE_SCOPE)];
    items.extend(e.copy(Arg::ptr(Label::RAM_POINTER), Arg::rel(3))?);
    items.extend(e.write_to_ram(Arg::rel(1))?);
    items.extend(e.add_to(Arg::rel(0), Arg::ptr(Label::RAM_POINTER))?);
    items.extend(e.copy(Arg::rel(3), Arg::rel(0))?);
    items.extend(e.jump(Arg::rel(2))?);
    Ok(items)
}

// ---- Statements ----

fn assignment(e: &mut Emitter, a: &Spanned<Assignment>) -> Result<Output, CodegenError> {
    let own = a.node.own_scope;
    let slots = a.node.wheres.len() as i64;
    let ready = e.fresh("scope_ready");
    e.within(Site::new(a.scope, a.pos), |e| {
        let mut code = e.copy(Arg::imm(slots), Arg::rel(0))?;
        code.extend(e.copy(Arg::rel(-2), Arg::rel(1))?);
        code.extend(e.copy(Arg::imm(ready), Arg::rel(2))?);
        code.extend(e.jump(Arg::imm(Label::ALLOCATE_SCOPE))?);
        code.push(Item::Hanging(ready));
        code.extend(e.move_stack(2)?);

        let mut out = Output::code(code);
        for w in &a.node.wheres {
            out.append(assignment(e, w)?);
            let store = Site::new(own, w.pos);
            let copy = e.within(store, |e| e.copy(Arg::rel(0), Arg::var(&w.node.name)))?;
            out.immediate.extend(copy);
        }
        out.append(expression(e, &a.node.value)?);
        out.immediate.extend(e.move_stack(-2)?);
        out.immediate.extend(e.copy(Arg::rel(2), Arg::rel(0))?);
        Ok(out)
    })
}

// ---- Expressions ----

fn expression(e: &mut Emitter, node: &Spanned<Expr>) -> Result<Output, CodegenError> {
    e.within(Site::new(node.scope, node.pos), |e| match &node.node {
        Expr::Number(n) => Ok(Output::code(e.copy(Arg::imm(n.clone()), Arg::rel(0))?)),
        Expr::Var(name) => Ok(Output::code(e.copy(Arg::var(name), Arg::rel(0))?)),
        Expr::Group(inner) => expression(e, inner),
        Expr::Tuple(items) => tuple(e, items),
        Expr::Call { function, argument } => call(e, function, argument),
        Expr::Function { body, .. } => function(e, body),
    })
}

fn tuple(e: &mut Emitter, items: &[Spanned<Expr>]) -> Result<Output, CodegenError> {
    let len = items.len() as i64;
    // slot -2: scope, slot -1: tuple address
    let mut out = Output::code(e.copy(Arg::rel(-2), Arg::rel(0))?);
    out.immediate.extend(e.move_stack(2)?);
    out.immediate.extend(e.copy(Arg::ptr(Label::RAM_POINTER), Arg::rel(-1))?);
    out.immediate.extend(e.write_to_ram(Arg::imm(len))?);
    if len > 0 {
        out.immediate.extend(e.add_to(Arg::imm(len), Arg::ptr(Label::RAM_POINTER))?);
    }
    for (i, item) in items.iter().enumerate() {
        out.append(expression(e, item)?);
        let cell = Arg::offset(Arg::rel(-1).spill(), Arg::imm(TUPLE_HEADER + i as i64));
        out.immediate.extend(e.copy(Arg::rel(0), cell)?);
    }
    out.immediate.extend(e.move_stack(-2)?);
    out.immediate.extend(e.copy(Arg::rel(1), Arg::rel(0))?);
    Ok(out)
}

fn call(
    e: &mut Emitter,
    function: &Spanned<Expr>,
    argument: &Spanned<Expr>,
) -> Result<Output, CodegenError> {
    let resume = e.fresh("resume");
    // slot -3: closure, slot -2: scope, slot -1: argument
    let mut out = Output::code(e.copy(Arg::rel(-2), Arg::rel(1))?);
    out.immediate.extend(e.move_stack(3)?);
    out.append(expression(e, function)?);
    out.immediate.extend(e.copy(Arg::rel(0), Arg::rel(-3))?);
    out.append(expression(e, argument)?);
    out.immediate.extend(e.copy(Arg::rel(0), Arg::rel(-1))?);

    // callee record: [captured scope, argument]
    out.immediate.extend(e.copy(Arg::ptr(Label::RAM_POINTER), Arg::rel(0))?);
    let captured = Arg::offset(Arg::imm(CLOSURE_SCOPE), Arg::rel(-3)).to_pointer();
    out.immediate.extend(e.write_to_ram(captured)?);
    out.immediate.extend(e.write_to_ram(Arg::rel(-1))?);

    out.immediate.extend(e.copy(Arg::imm(resume), Arg::rel(1))?);
    let code = Arg::offset(Arg::imm(CLOSURE_CODE), Arg::rel(-3)).to_pointer();
    out.immediate.extend(e.jump(code)?);
    out.immediate.push(Item::Hanging(resume));
    out.immediate.extend(e.move_stack(-3)?);
    out.immediate.extend(e.copy(Arg::rel(3), Arg::rel(0))?);
    Ok(out)
}

fn function(e: &mut Emitter, body: &Spanned<Expr>) -> Result<Output, CodegenError> {
    let def = e.fresh("function");
    let compiled = expression(e, body)?;

    let mut immediate = e.copy(Arg::ptr(Label::RAM_POINTER), Arg::rel(0))?;
    immediate.extend(e.write_to_ram(Arg::imm(def))?);
    immediate.extend(e.write_to_ram(Arg::rel(-2))?);

    let mut hoisted = vec![Item::Hanging(def)];
    hoisted.extend(e.move_stack(2)?);
    hoisted.extend(compiled.immediate);
    hoisted.extend(e.move_stack(-2)?);
    hoisted.extend(e.copy(Arg::rel(2), Arg::rel(0))?);
    hoisted.extend(e.jump(Arg::rel(1))?);
    hoisted.extend(compiled.hoisted);
    Ok(Output { immediate, hoisted })
}
