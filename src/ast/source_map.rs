use super::Position;

/// Maps byte offsets to positions, including the indentation of each line.
pub struct SourceMap {
    line_starts: Vec<usize>,
    indents: Vec<usize>,
}

impl SourceMap {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        let indents = line_starts
            .iter()
            .map(|&start| {
                source[start..]
                    .bytes()
                    .take_while(|b| *b == b' ' || *b == b'\t')
                    .count()
            })
            .collect();
        SourceMap { line_starts, indents }
    }

    /// Returns (line, col), both 1-based.
    pub fn lookup(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let col = offset.saturating_sub(self.line_starts[line]);
        (line + 1, col + 1)
    }

    /// Leading whitespace width of a 1-based line; 0 past the end.
    pub fn indent(&self, line: usize) -> usize {
        line.checked_sub(1)
            .and_then(|i| self.indents.get(i))
            .copied()
            .unwrap_or(0)
    }

    /// Position of a token starting at `offset`. `line_start` is left for
    /// the caller, which knows whether an earlier token shares the line.
    pub fn position(&self, offset: usize) -> Position {
        let (line, column) = self.lookup(offset);
        Position { line, column, indent: self.indent(line), line_start: false }
    }

    /// Returns the full text of the given 1-based line number.
    pub fn line_text<'a>(&self, source: &'a str, line: usize) -> &'a str {
        if line == 0 || line > self.line_starts.len() {
            return "";
        }
        let start = self.line_starts[line - 1];
        let end = self.line_starts.get(line).copied().unwrap_or(source.len());
        source[start..end].trim_end_matches('\n').trim_end_matches('\r')
    }
}
