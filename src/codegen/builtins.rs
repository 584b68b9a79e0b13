//! The built-in catalog.
//!
//! Built-ins are curried closures over the built-in scope. Each level runs in
//! the callee frame without moving the stack: slot 0 holds its scope record,
//! slot 1 the return address, and slots 2 and up are scratch. The result goes
//! to slot 0.

use std::collections::BTreeSet;

use crate::asm::{Item, Label};
use crate::ast::Position;
use crate::scope::{ScopeArena, ScopeId};
use crate::vm::Mode;

use super::arg::Arg;
use super::emit::{Emitter, Site};
use super::CodegenError;

type Emitted = Result<Vec<Item>, CodegenError>;

pub enum Body {
    /// A single zero word; the value is its address.
    Unit,
    /// Generates the innermost level, with every parameter in scope.
    Code(fn(&mut Emitter) -> Emitted),
}

pub struct Builtin {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub requires: &'static [&'static str],
    pub body: Body,
}

const fn builtin(
    name: &'static str,
    params: &'static [&'static str],
    requires: &'static [&'static str],
    body: fn(&mut Emitter) -> Emitted,
) -> Builtin {
    Builtin { name, params, requires, body: Body::Code(body) }
}

pub static CATALOG: [Builtin; 18] = [
    Builtin { name: "_", params: &[], requires: &[], body: Body::Unit },
    builtin("print", &["x"], &["_"], print),
    builtin("succ", &["n"], &[], succ),
    builtin("add", &["a", "b"], &[], add),
    builtin("mult", &["a", "b"], &[], mult),
    builtin("true", &["first", "second"], &[], first),
    builtin("false", &["first", "second"], &[], second),
    builtin("do", &["x"], &[], sequence),
    builtin("eq", &["a", "b"], &["true", "false"], eq),
    builtin("neq", &["a", "b"], &["true", "false"], neq),
    builtin("lt", &["a", "b"], &["true", "false"], lt),
    builtin("sub", &["a", "b"], &[], sub),
    builtin("get", &["pos", "tup"], &[], get),
    builtin("fst", &["t"], &[], fst),
    builtin("snd", &["t"], &[], snd),
    builtin("mod", &["b", "a"], &[], modulo),
    builtin("div", &["b", "a"], &[], divide),
    builtin("input", &["x"], &[], input),
];

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    CATALOG.iter().find(|b| b.name == name)
}

/// Built-ins named in `referenced`, plus everything they need, in catalog order.
pub fn select(referenced: &BTreeSet<String>) -> Vec<&'static Builtin> {
    let mut wanted: BTreeSet<&str> = BTreeSet::new();
    let mut pending: Vec<&'static Builtin> =
        referenced.iter().filter_map(|name| lookup(name)).collect();
    while let Some(b) = pending.pop() {
        if !wanted.insert(b.name) {
            continue;
        }
        pending.extend(b.requires.iter().filter_map(|name| lookup(name)));
    }
    CATALOG.iter().filter(|b| wanted.contains(b.name)).collect()
}

/// Code and data for one built-in. `location` labels the value the built-in
/// scope slot points at.
pub fn generate(e: &mut Emitter, builtin: &Builtin, location: Label) -> Emitted {
    match builtin.body {
        Body::Unit => Ok(vec![Item::labeled(0, location)]),
        Body::Code(body) => {
            let entry = e.fresh(builtin.name);
            let mut items = vec![Item::labeled(entry, location), Item::word(Label::BUILTIN_SCOPE)];
            items.extend(level(e, builtin.params, ScopeArena::BUILTINS, entry, body)?);
            Ok(items)
        }
    }
}

fn level(
    e: &mut Emitter,
    params: &[&str],
    parent: ScopeId,
    def: Label,
    body: fn(&mut Emitter) -> Emitted,
) -> Emitted {
    let scope = e.scopes.child(parent);
    let mut items = vec![Item::Hanging(def)];
    let Some((param, rest)) = params.split_first() else {
        items.extend(e.within(Site::new(scope, Position::NONE), body)?);
        items.extend(e.jump(Arg::rel(1))?);
        return Ok(items);
    };
    e.scopes.bind(scope, param);
    if rest.is_empty() {
        items.extend(e.within(Site::new(scope, Position::NONE), body)?);
        items.extend(e.jump(Arg::rel(1))?);
        return Ok(items);
    }

    // return a closure over this level's record
    let inner = e.fresh(param);
    items.extend(e.copy(Arg::ptr(Label::RAM_POINTER), Arg::rel(2))?);
    items.extend(e.write_to_ram(Arg::imm(inner))?);
    items.extend(e.write_to_ram(Arg::rel(0))?);
    items.extend(e.copy(Arg::rel(2), Arg::rel(0))?);
    items.extend(e.jump(Arg::rel(1))?);
    items.extend(level(e, rest, scope, inner, body)?);
    Ok(items)
}

fn v(name: &str) -> Arg {
    Arg::var_from(name, 0)
}

fn print(e: &mut Emitter) -> Emitted {
    let mut items = e.write(v("x"))?;
    items.extend(e.copy(v("_"), Arg::rel(0))?);
    Ok(items)
}

fn input(e: &mut Emitter) -> Emitted {
    e.read(Arg::rel(0))
}

fn succ(e: &mut Emitter) -> Emitted {
    e.add(v("n"), Arg::imm(1), Arg::rel(0))
}

fn add(e: &mut Emitter) -> Emitted {
    e.add(v("a"), v("b"), Arg::rel(0))
}

fn mult(e: &mut Emitter) -> Emitted {
    e.mult(v("a"), v("b"), Arg::rel(0))
}

fn sub(e: &mut Emitter) -> Emitted {
    let mut items = e.mult(v("b"), Arg::imm(-1), Arg::rel(2))?;
    items.extend(e.add(v("a"), Arg::rel(2), Arg::rel(0))?);
    Ok(items)
}

fn first(e: &mut Emitter) -> Emitted {
    e.copy(v("first"), Arg::rel(0))
}

fn second(e: &mut Emitter) -> Emitted {
    e.copy(v("second"), Arg::rel(0))
}

fn sequence(e: &mut Emitter) -> Emitted {
    e.copy(v("do"), Arg::rel(0))
}

#[derive(Clone, Copy)]
enum Comparison {
    Eq,
    Neq,
    Lt,
}

fn compare(e: &mut Emitter, comparison: Comparison) -> Emitted {
    let flag = e.fresh("flag");
    let yes = e.fresh("yes");
    let done = e.fresh("done");
    let mut items = match comparison {
        Comparison::Lt => e.less_than(v("a"), v("b"), Arg::ptr(flag))?,
        Comparison::Eq | Comparison::Neq => e.equals(v("a"), v("b"), Arg::ptr(flag))?,
    };
    let cond = Arg::patched(Mode::Immediate, flag);
    items.extend(match comparison {
        Comparison::Neq => e.jump_if_false(cond, Arg::imm(yes))?,
        Comparison::Eq | Comparison::Lt => e.jump_if_true(cond, Arg::imm(yes))?,
    });
    items.extend(e.copy(v("false"), Arg::rel(0))?);
    items.extend(e.jump(Arg::imm(done))?);
    items.push(Item::Hanging(yes));
    items.extend(e.copy(v("true"), Arg::rel(0))?);
    items.push(Item::Hanging(done));
    Ok(items)
}

fn eq(e: &mut Emitter) -> Emitted {
    compare(e, Comparison::Eq)
}

fn neq(e: &mut Emitter) -> Emitted {
    compare(e, Comparison::Neq)
}

fn lt(e: &mut Emitter) -> Emitted {
    compare(e, Comparison::Lt)
}

/// Element `index` of the tuple `tuple` points at.
fn element(tuple: Arg, index: Arg) -> Arg {
    Arg::offset(tuple.deref(), index).to_pointer()
}

fn get(e: &mut Emitter) -> Emitted {
    let index = Arg::offset(Arg::imm(1), v("pos"));
    e.copy(element(v("tup"), index), Arg::rel(0))
}

fn fst(e: &mut Emitter) -> Emitted {
    e.copy(element(v("t"), Arg::imm(1)), Arg::rel(0))
}

fn snd(e: &mut Emitter) -> Emitted {
    e.copy(element(v("t"), Arg::imm(2)), Arg::rel(0))
}

/// `a / b` and `a % b` for `a >= 0`, `b > 0`.
///
/// Scratch: slot 2 remainder, slot 3 `-b`, slot 4 quotient, slot 5 `b`.
fn long_division(e: &mut Emitter, quotient: bool) -> Emitted {
    let head = e.fresh("div_loop");
    let exit = e.fresh("div_exit");
    let flag = e.fresh("flag");
    let mut items = e.copy(v("a"), Arg::rel(2))?;
    items.extend(e.mult(v("b"), Arg::imm(-1), Arg::rel(3))?);
    items.extend(e.copy(Arg::imm(0), Arg::rel(4))?);
    items.extend(e.copy(v("b"), Arg::rel(5))?);
    items.push(Item::Hanging(head));
    items.extend(e.less_than(Arg::rel(2), Arg::rel(5), Arg::ptr(flag))?);
    items.extend(e.jump_if_true(Arg::patched(Mode::Immediate, flag), Arg::imm(exit))?);
    items.extend(e.add(Arg::rel(2), Arg::rel(3), Arg::rel(2))?);
    items.extend(e.add_to(Arg::imm(1), Arg::rel(4))?);
    items.extend(e.jump(Arg::imm(head))?);
    items.push(Item::Hanging(exit));
    let result = if quotient { Arg::rel(4) } else { Arg::rel(2) };
    items.extend(e.copy(result, Arg::rel(0))?);
    Ok(items)
}

fn divide(e: &mut Emitter) -> Emitted {
    long_division(e, true)
}

fn modulo(e: &mut Emitter) -> Emitted {
    long_division(e, false)
}
