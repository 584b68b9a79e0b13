use super::{Diagnostic, Severity};

pub fn render(d: &Diagnostic) -> String {
    let severity = match d.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };

    let labels: Vec<serde_json::Value> = d
        .labels
        .iter()
        .map(|l| {
            serde_json::json!({
                "line": l.pos.line,
                "col": l.pos.column,
                "width": l.width,
                "message": l.message,
                "primary": l.is_primary,
            })
        })
        .collect();

    let mut obj = serde_json::json!({
        "severity": severity,
        "message": d.message,
        "labels": labels,
        "notes": d.notes,
    });

    if let Some(code) = d.code {
        obj["code"] = serde_json::Value::String(code.to_string());
    }

    if let Some(s) = &d.suggestion {
        obj["suggestion"] = serde_json::Value::String(s.clone());
    }

    serde_json::to_string(&obj).unwrap_or_else(|_| {
        r#"{"severity":"error","message":"internal error serializing diagnostic"}"#.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Position;

    fn parse_json(s: &str) -> serde_json::Value {
        serde_json::from_str(s).expect("valid JSON")
    }

    fn at(line: usize, column: usize) -> Position {
        Position { line, column, indent: 0, line_start: false }
    }

    #[test]
    fn render_basic_error() {
        let v = parse_json(&render(&Diagnostic::error("no input available")));
        assert_eq!(v["severity"], "error");
        assert_eq!(v["message"], "no input available");
        assert!(v["labels"].as_array().unwrap().is_empty());
        assert!(v.get("code").is_none());
    }

    #[test]
    fn render_label_position() {
        let d = Diagnostic::error("bad").with_code("FNT-P003").with_label(at(4, 9), 2, "here");
        let v = parse_json(&render(&d));
        assert_eq!(v["code"], "FNT-P003");
        let label = &v["labels"][0];
        assert_eq!(label["line"], 4);
        assert_eq!(label["col"], 9);
        assert_eq!(label["width"], 2);
        assert_eq!(label["primary"], true);
    }

    #[test]
    fn render_notes_and_suggestion() {
        let d = Diagnostic::error("bad").with_note("first").with_note("second").with_suggestion("fix it");
        let v = parse_json(&render(&d));
        assert_eq!(v["notes"].as_array().unwrap().len(), 2);
        assert_eq!(v["suggestion"], "fix it");
    }

    #[test]
    fn render_warning_severity() {
        let d = Diagnostic::warning("reassigned").with_secondary_label(at(1, 1), "first");
        let v = parse_json(&render(&d));
        assert_eq!(v["severity"], "warning");
        assert_eq!(v["labels"][0]["primary"], false);
    }
}
