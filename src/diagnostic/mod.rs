pub mod ansi;
pub mod json;

use std::collections::HashSet;

use crate::ast::{Position, Program};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub pos: Position,
    /// Columns to underline; at least one caret is always drawn.
    pub width: usize,
    pub message: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<&'static str>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
            suggestion: None,
            source: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic { severity: Severity::Warning, ..Diagnostic::error(message) }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_label(mut self, pos: Position, width: usize, label: impl Into<String>) -> Self {
        self.labels.push(Label { pos, width, message: label.into(), is_primary: true });
        self
    }

    pub fn with_secondary_label(mut self, pos: Position, label: impl Into<String>) -> Self {
        self.labels.push(Label { pos, width: 1, message: label.into(), is_primary: false });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Top-level names assigned more than once; later assignments overwrite
/// the first one's slot.
pub fn duplicate_globals(program: &Program) -> Vec<Diagnostic> {
    let mut first: Vec<(&str, Position)> = Vec::new();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for a in &program.assignments {
        if seen.insert(a.node.name.as_str()) {
            first.push((a.node.name.as_str(), a.pos));
            continue;
        }
        let mut d = Diagnostic::warning(format!("'{}' is assigned more than once", a.node.name))
            .with_code("FNT-W001")
            .with_label(a.pos, a.node.name.len(), "reassigned here");
        if let Some((_, pos)) = first.iter().find(|(name, _)| *name == a.node.name) {
            d = d.with_secondary_label(*pos, format!("first assigned at {pos}"));
        }
        out.push(d);
    }
    out
}

// ---- From impls for the crate's error types ----

impl From<&crate::lexer::LexError> for Diagnostic {
    fn from(e: &crate::lexer::LexError) -> Self {
        let mut d = Diagnostic::error(format!("unexpected input '{}'", e.snippet))
            .with_code("FNT-L001")
            .with_label(e.position, e.snippet.chars().count(), "here");
        if !e.suggestion.is_empty() {
            d = d.with_suggestion(e.suggestion.clone());
        }
        d
    }
}

impl From<&crate::parser::ParseError> for Diagnostic {
    fn from(e: &crate::parser::ParseError) -> Self {
        Diagnostic::error(&e.message).with_code(e.code).with_label(e.position, 1, "here")
    }
}

impl From<&crate::codegen::CodegenError> for Diagnostic {
    fn from(e: &crate::codegen::CodegenError) -> Self {
        use crate::codegen::CodegenError;
        match e {
            CodegenError::Unresolved { name, pos } => {
                Diagnostic::error(format!("'{name}' is not defined"))
                    .with_code("FNT-C001")
                    .with_label(*pos, name.len(), "not found in any enclosing scope")
            }
            other => Diagnostic::error(other.to_string())
                .with_code("FNT-C002")
                .with_note("this is a compiler bug"),
        }
    }
}

impl From<&crate::asm::AssembleError> for Diagnostic {
    fn from(e: &crate::asm::AssembleError) -> Self {
        Diagnostic::error(e.to_string()).with_code("FNT-A001").with_note("this is a compiler bug")
    }
}

impl From<&crate::codegen::CompileError> for Diagnostic {
    fn from(e: &crate::codegen::CompileError) -> Self {
        match e {
            crate::codegen::CompileError::Codegen(e) => e.into(),
            crate::codegen::CompileError::Assemble(e) => e.into(),
        }
    }
}

impl From<&crate::vm::VmError> for Diagnostic {
    fn from(e: &crate::vm::VmError) -> Self {
        Diagnostic::error(e.to_string()).with_code("FNT-R001").with_note("the machine has halted")
    }
}

impl From<&crate::image::ImageError> for Diagnostic {
    fn from(e: &crate::image::ImageError) -> Self {
        Diagnostic::error(e.to_string()).with_code("FNT-I001")
    }
}

impl From<&crate::Error> for Diagnostic {
    fn from(e: &crate::Error) -> Self {
        match e {
            crate::Error::Lex(e) => e.into(),
            crate::Error::Parse(e) => e.into(),
            crate::Error::Compile(e) => e.into(),
            crate::Error::Vm(e) => e.into(),
            crate::Error::Image(e) => e.into(),
            crate::Error::Io(e) => Diagnostic::error(e.to_string()),
        }
    }
}
