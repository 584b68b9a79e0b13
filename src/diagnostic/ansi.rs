use crate::ast::SourceMap;
use super::{Diagnostic, Severity};

pub struct AnsiRenderer {
    pub use_color: bool,
}

impl AnsiRenderer {
    fn bold(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1m{s}\x1b[0m") } else { s.to_string() }
    }

    fn bold_red(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1;31m{s}\x1b[0m") } else { s.to_string() }
    }

    fn yellow(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1;33m{s}\x1b[0m") } else { s.to_string() }
    }

    fn cyan(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[36m{s}\x1b[0m") } else { s.to_string() }
    }

    fn dim(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[2m{s}\x1b[0m") } else { s.to_string() }
    }

    pub fn render(&self, d: &Diagnostic) -> String {
        let mut out = String::new();

        // "error[FNT-P001]: message"
        let mut severity_label = match d.severity {
            Severity::Error => "error".to_string(),
            Severity::Warning => "warning".to_string(),
        };
        if let Some(code) = d.code {
            severity_label.push_str(&format!("[{code}]"));
        }
        let severity_label = match d.severity {
            Severity::Error => self.bold_red(&severity_label),
            Severity::Warning => self.yellow(&severity_label),
        };
        out.push_str(&format!("{}: {}\n", severity_label, self.bold(&d.message)));

        let primary = d.labels.iter().find(|l| l.is_primary);
        if let Some(label) = primary {
            let (line, col) = (label.pos.line, label.pos.column);
            out.push_str(&format!("  {} {}:{}\n", self.cyan("-->"), line, col));

            if let Some(source) = &d.source {
                let map = SourceMap::new(source);
                let line_text = map.line_text(source, line);

                let gutter = line.to_string().len();
                let pipe = self.cyan("|");
                let pad = " ".repeat(gutter);

                out.push_str(&format!("{pad} {pipe}\n"));
                let line_num = self.cyan(&format!("{line:>gutter$}"));
                out.push_str(&format!("{line_num} {pipe} {line_text}\n"));

                let indent = " ".repeat(col.saturating_sub(1));
                let carets = self.bold_red(&"^".repeat(label.width.max(1)));
                if label.message.is_empty() {
                    out.push_str(&format!("{pad} {pipe} {indent}{carets}\n"));
                } else {
                    out.push_str(&format!(
                        "{pad} {pipe} {indent}{carets} {}\n",
                        self.bold_red(&label.message)
                    ));
                }
                out.push_str(&format!("{pad} {pipe}\n"));
            }
        }

        for label in d.labels.iter().filter(|l| !l.is_primary) {
            if !label.message.is_empty() {
                out.push_str(&format!("  {} {}\n", self.dim("="), label.message));
            }
        }

        for note in &d.notes {
            out.push_str(&format!("  {} note: {}\n", self.dim("="), note));
        }

        if let Some(suggestion) = &d.suggestion {
            out.push_str(&format!("  {} suggestion: {}\n", self.dim("="), suggestion));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Position;

    const SOURCE: &str = "main = print nope\nx = 1";

    fn at(line: usize, column: usize) -> Position {
        Position { line, column, indent: 0, line_start: false }
    }

    fn make_diag() -> Diagnostic {
        Diagnostic::error("'nope' is not defined")
            .with_code("FNT-C001")
            .with_label(at(1, 14), 4, "here")
            .with_source(SOURCE)
            .with_note("names resolve outwards")
            .with_suggestion("define nope first")
    }

    fn plain(d: &Diagnostic) -> String {
        AnsiRenderer { use_color: false }.render(d)
    }

    #[test]
    fn render_contains_code_and_message() {
        let out = plain(&make_diag());
        assert!(out.contains("error[FNT-C001]:"), "missing header in:\n{out}");
        assert!(out.contains("'nope' is not defined"), "missing message in:\n{out}");
    }

    #[test]
    fn render_contains_location_and_source_line() {
        let out = plain(&make_diag());
        assert!(out.contains("--> 1:14"), "missing location in:\n{out}");
        assert!(out.contains("main = print nope"), "missing source line in:\n{out}");
    }

    #[test]
    fn carets_sit_under_the_label() {
        let out = plain(&make_diag());
        let caret_line = out.lines().find(|l| l.contains('^')).unwrap();
        let offset = caret_line.find('^').unwrap();
        let source_line = out.lines().find(|l| l.contains("main = print")).unwrap();
        assert_eq!(&source_line[offset..offset + 4], "nope");
        assert!(caret_line.contains("^^^^ here"));
    }

    #[test]
    fn render_contains_note_and_suggestion() {
        let out = plain(&make_diag());
        assert!(out.contains("note: names resolve outwards"), "missing note in:\n{out}");
        assert!(out.contains("suggestion: define nope first"), "missing suggestion in:\n{out}");
    }

    #[test]
    fn render_without_source_keeps_location() {
        let d = Diagnostic::error("bad").with_label(at(2, 3), 1, "here");
        let out = plain(&d);
        assert!(out.contains("--> 2:3"));
        assert!(!out.contains('^'));
    }

    #[test]
    fn render_second_line() {
        let d = Diagnostic::error("bad").with_label(at(2, 5), 1, "").with_source(SOURCE);
        let out = plain(&d);
        assert!(out.contains("2 | x = 1"), "expected line 2 in:\n{out}");
    }

    #[test]
    fn warnings_are_labelled() {
        let out = plain(&Diagnostic::warning("careful"));
        assert!(out.starts_with("warning: careful"));
    }

    #[test]
    fn color_only_when_asked() {
        let d = make_diag();
        assert!(AnsiRenderer { use_color: true }.render(&d).contains("\x1b["));
        assert!(!plain(&d).contains("\x1b["));
    }
}
