//! Compile-time diagnostics.
//!
//! `GrammarFault` is what every pass above the runtime raises: the
//! tokenizer, the numeral decoder, the preprocessor, and the parser. The
//! message strings are part of the external surface — tests match them
//! verbatim — so constructors here are named after what they mean, not
//! reformatted at the call site.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct GrammarFault {
    pub message: String,
    pub filename: String,
    pub line: usize,
    pub column: usize,
    pub line_text: String,
}

impl GrammarFault {
    pub fn new(
        message: impl Into<String>,
        filename: impl Into<String>,
        line: usize,
        column: usize,
        line_text: impl Into<String>,
    ) -> Self {
        GrammarFault {
            message: message.into(),
            filename: filename.into(),
            line,
            column,
            line_text: line_text.into(),
        }
    }

    /// Rewrite the location to the outer file's position, keeping the
    /// message. Used when a fault surfaces from inside an imported module:
    /// the fault is reported at the importing `吾嘗觀` statement, not the
    /// imported file's own coordinates.
    pub fn at_outer_site(self, filename: &str, line: usize, column: usize, line_text: &str) -> Self {
        GrammarFault {
            message: self.message,
            filename: filename.to_string(),
            line,
            column,
            line_text: line_text.to_string(),
        }
    }
}

impl fmt::Display for GrammarFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:{}:{}: {}", self.filename, self.line, self.column, self.message)?;
        writeln!(f, "{}", self.line_text)?;
        write!(f, "{}^", " ".repeat(self.column.saturating_sub(1)))
    }
}

impl std::error::Error for GrammarFault {}

/// Maps a byte offset into a source buffer back to `(line, column, lineText)`,
/// 1-based, counting columns in characters (the source is Chinese text,
/// where byte offsets make for useless diagnostics).
pub struct SourceMap<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SourceMap<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (i, c) in text.char_indices() {
            if c == '\n' {
                line_starts.push(i + 1);
            }
        }
        SourceMap { text, line_starts }
    }

    pub fn locate(&self, byte_offset: usize) -> (usize, usize, &'a str) {
        let line_idx = match self.line_starts.binary_search(&byte_offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts[line_idx];
        let line_end = self
            .line_starts
            .get(line_idx + 1)
            .map(|&n| n.saturating_sub(1))
            .unwrap_or(self.text.len());
        let line_text = self.text[line_start..line_end.max(line_start)]
            .trim_end_matches('\r');
        let column = self.text[line_start..byte_offset.min(self.text.len())]
            .chars()
            .count()
            + 1;
        (line_idx + 1, column, line_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_second_line() {
        let src = "吾有一言。\n書之。";
        let map = SourceMap::new(src);
        let offset = src.find('書').unwrap();
        let (line, col, text) = map.locate(offset);
        assert_eq!(line, 2);
        assert_eq!(col, 1);
        assert_eq!(text, "書之。");
    }
}
