use std::collections::BTreeSet;
use std::fmt;

use num_bigint::BigInt;
use serde::Serialize;

use crate::scope::{ScopeArena, ScopeId};

pub mod source_map;
pub use source_map::SourceMap;

// ---- Positions ----

/// Where a token or node starts in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Position {
    /// 1-based.
    pub line: usize,
    /// 1-based.
    pub column: usize,
    /// Width of the leading whitespace of the line.
    pub indent: usize,
    /// First token on its line.
    pub line_start: bool,
}

impl Position {
    /// Position for generated code with no source.
    pub const NONE: Position = Position { line: 0, column: 0, indent: 0, line_start: true };
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A node with its source position and the scope it was parsed in.
/// Serializes as the inner node only.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub pos: Position,
    pub scope: ScopeId,
}

impl<T> Spanned<T> {
    pub fn new(node: T, pos: Position, scope: ScopeId) -> Self {
        Spanned { node, pos, scope }
    }
}

impl<T> std::ops::Deref for Spanned<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.node
    }
}

impl<T: Serialize> Serialize for Spanned<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.node.serialize(serializer)
    }
}

// ---- Core AST types ----

fn decimal<S: serde::Serializer>(n: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(n)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Number(#[serde(serialize_with = "decimal")] BigInt),
    Var(String),
    Tuple(Vec<Spanned<Expr>>),
    Call {
        function: Box<Spanned<Expr>>,
        argument: Box<Spanned<Expr>>,
    },
    /// `param => body`; `body.scope` binds `param`.
    Function {
        param: String,
        body: Box<Spanned<Expr>>,
    },
    /// `( value )` or `$ value`; never re-associated.
    Group(Box<Spanned<Expr>>),
}

/// `name = value where ...`
///
/// The `Spanned` wrapper carries the enclosing scope; `scope` here is the
/// assignment's own scope, which holds the `where` names and is where
/// `value` is evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub name: String,
    pub value: Spanned<Expr>,
    pub wheres: Vec<Spanned<Assignment>>,
    /// Scope of the `where` names; the record allocated when this runs.
    #[serde(skip)]
    pub own_scope: ScopeId,
}

#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub assignments: Vec<Spanned<Assignment>>,
    #[serde(skip)]
    pub scopes: ScopeArena,
}

// ---- Analysis ----

/// Every variable name referenced anywhere in the program.
pub fn referenced_names(program: &Program) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for assignment in &program.assignments {
        collect_assignment(assignment, &mut names);
    }
    names
}

fn collect_assignment(assignment: &Assignment, names: &mut BTreeSet<String>) {
    collect_expr(&assignment.value, names);
    for w in &assignment.wheres {
        collect_assignment(w, names);
    }
}

fn collect_expr(expr: &Expr, names: &mut BTreeSet<String>) {
    match expr {
        Expr::Number(_) => {}
        Expr::Var(name) => {
            names.insert(name.clone());
        }
        Expr::Tuple(items) => items.iter().for_each(|item| collect_expr(item, names)),
        Expr::Call { function, argument } => {
            collect_expr(function, names);
            collect_expr(argument, names);
        }
        Expr::Function { body, .. } => collect_expr(body, names),
        Expr::Group(inner) => collect_expr(inner, names),
    }
}

// ---- Printing ----

/// Fully parenthesised source form: application order is explicit.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Var(name) => f.write_str(name),
            Expr::Tuple(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item.node)?;
                }
                f.write_str("]")
            }
            Expr::Call { function, argument } => write!(f, "({} {})", function.node, argument.node),
            Expr::Function { param, body } => write!(f, "({param} => {})", body.node),
            Expr::Group(inner) => write!(f, "{}", inner.node),
        }
    }
}

impl Assignment {
    /// Source form with `where` clauses indented under their owner.
    pub fn pretty(&self, depth: usize) -> String {
        let pad = "  ".repeat(depth);
        let mut out = format!("{pad}{} = {}\n", self.name, self.value.node);
        if !self.wheres.is_empty() {
            out.push_str(&format!("{pad}  where\n"));
            for w in &self.wheres {
                out.push_str(&w.pretty(depth + 2));
            }
        }
        out
    }
}
