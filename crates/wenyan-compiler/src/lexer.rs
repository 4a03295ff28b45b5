//! Unicode tokenizer (§4.2).
//!
//! Operates on the `char` sequence (not bytes) so indices line up with
//! `error::SourceMap`'s column counting. At every position the first
//! matching rule wins: doubled/`『`-style string literal, single-`「`
//! identifier, longest-match keyword, numeral run, else raw `Data`.

use crate::error::GrammarFault;
use crate::numerals::{self, decode};
use crate::keywords;
use crate::token::{Span, Token, TokenKind};

const SKIPPABLE: &[char] = &['。', '、', ',', '，', ' ', '\t', '\n', '\r', '！', '？', '；', '：'];

pub struct Lexer<'a> {
    filename: String,
    chars: Vec<char>,
    byte_offsets: Vec<usize>,
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, filename: impl Into<String>) -> Self {
        let chars: Vec<char> = src.chars().collect();
        let mut byte_offsets = Vec::with_capacity(chars.len() + 1);
        let mut b = 0;
        for c in &chars {
            byte_offsets.push(b);
            b += c.len_utf8();
        }
        byte_offsets.push(b);
        Lexer { filename: filename.into(), chars, byte_offsets, src, pos: 0 }
    }

    fn byte_at(&self, char_idx: usize) -> usize {
        self.byte_offsets[char_idx.min(self.chars.len())]
    }

    fn fault(&self, message: &str, char_idx: usize) -> GrammarFault {
        let map = crate::error::SourceMap::new(self.src);
        let (line, col, text) = map.locate(self.byte_at(char_idx));
        GrammarFault::new(message.to_string(), self.filename.clone(), line, col, text)
    }

    fn remaining(&self) -> &[char] {
        &self.chars[self.pos..]
    }

    fn starts_with(&self, s: &str) -> bool {
        let n = s.chars().count();
        self.pos + n <= self.chars.len() && self.chars[self.pos..self.pos + n].iter().copied().eq(s.chars())
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, GrammarFault> {
        let mut tokens = Vec::new();
        let mut data_start: Option<usize> = None;
        let mut data_buf = String::new();

        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];

            if SKIPPABLE.contains(&c) {
                self.flush_data(&mut data_start, &mut data_buf, &mut tokens);
                self.pos += 1;
                continue;
            }

            if self.starts_with("「「") || c == '『' {
                self.flush_data(&mut data_start, &mut data_buf, &mut tokens);
                let start = self.pos;
                let content = self.read_string_literal()?;
                tokens.push(Token {
                    kind: TokenKind::StringLiteral(content),
                    span: self.char_span(start, self.pos),
                });
                continue;
            }

            if c == '「' {
                self.flush_data(&mut data_start, &mut data_buf, &mut tokens);
                let start = self.pos;
                let name = self.read_identifier()?;
                tokens.push(Token {
                    kind: TokenKind::Identifier(name),
                    span: self.char_span(start, self.pos),
                });
                continue;
            }

            if let Some((len, kw)) = keywords::longest_match(&self.remaining_str()) {
                self.flush_data(&mut data_start, &mut data_buf, &mut tokens);
                let start = self.pos;
                self.pos += len;
                tokens.push(Token { kind: TokenKind::Keyword(kw), span: self.char_span(start, self.pos) });
                continue;
            }

            if numerals::is_numeral_char(c) {
                self.flush_data(&mut data_start, &mut data_buf, &mut tokens);
                let start = self.pos;
                while self.pos < self.chars.len() && numerals::is_numeral_char(self.chars[self.pos]) {
                    self.pos += 1;
                }
                let run = &self.chars[start..self.pos];
                let (line, col, text) = {
                    let map = crate::error::SourceMap::new(self.src);
                    map.locate(self.byte_at(start))
                };
                let decoded = decode(run, &self.filename, (self.byte_at(start), self.byte_at(self.pos)), text, line, col)?;
                tokens.push(Token { kind: TokenKind::NumberLiteral(decoded), span: self.char_span(start, self.pos) });
                continue;
            }

            if data_start.is_none() {
                data_start = Some(self.pos);
            }
            data_buf.push(c);
            self.pos += 1;
        }

        self.flush_data(&mut data_start, &mut data_buf, &mut tokens);
        Ok(tokens)
    }

    fn remaining_str(&self) -> String {
        self.remaining().iter().collect()
    }

    fn char_span(&self, start: usize, end: usize) -> Span {
        self.byte_at(start)..self.byte_at(end)
    }

    fn flush_data(&self, data_start: &mut Option<usize>, buf: &mut String, tokens: &mut Vec<Token>) {
        if let Some(start) = data_start.take() {
            tokens.push(Token {
                kind: TokenKind::Data(std::mem::take(buf)),
                span: self.char_span(start, self.pos),
            });
        }
    }

    fn read_identifier(&mut self) -> Result<String, GrammarFault> {
        let start = self.pos;
        self.pos += 1; // consume 「
        let mut name = String::new();
        loop {
            if self.pos >= self.chars.len() {
                return Err(self.fault("名未尽", start));
            }
            if self.chars[self.pos] == '」' {
                self.pos += 1;
                return Ok(name);
            }
            name.push(self.chars[self.pos]);
            self.pos += 1;
        }
    }

    fn read_string_literal(&mut self) -> Result<String, GrammarFault> {
        let start = self.pos;
        let doubled_opener = self.starts_with("「「");
        self.pos += if doubled_opener { 2 } else { 1 };
        let mut depth = 1i32;
        let mut content = String::new();

        loop {
            if self.pos >= self.chars.len() {
                return Err(self.fault("言未尽", start));
            }
            if self.starts_with("「「") {
                depth += 1;
                content.push('「');
                content.push('「');
                self.pos += 2;
                continue;
            }
            if self.starts_with("」」") {
                depth -= 1;
                self.pos += 2;
                if depth == 0 {
                    break;
                }
                content.push('」');
                content.push('」');
                continue;
            }
            let c = self.chars[self.pos];
            if c == '『' {
                depth += 1;
                content.push(c);
                self.pos += 1;
                continue;
            }
            if c == '』' {
                depth -= 1;
                self.pos += 1;
                if depth == 0 {
                    break;
                }
                content.push(c);
                continue;
            }
            content.push(c);
            self.pos += 1;
        }

        // Compatibility quirk: a lone 」 directly after the outer closer of a
        // 「「…」」-opened literal extends the literal by one character.
        if doubled_opener && self.pos < self.chars.len() && self.chars[self.pos] == '」' {
            content.push('」');
            self.pos += 1;
        }

        Ok(escape_minimal(&content))
    }
}

fn escape_minimal(s: &str) -> String {
    s.replace('"', "\\\"").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Token> {
        Lexer::new(src, "t.wy").tokenize().unwrap()
    }

    #[test]
    fn skips_punctuation_between_keywords() {
        let t = toks("書之。");
        assert_eq!(t.len(), 1);
        assert!(matches!(t[0].kind, TokenKind::Keyword(crate::token::Kw::Print)));
    }

    #[test]
    fn reads_doubled_string_literal() {
        let t = toks("「「問天地好在。」」");
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].kind, TokenKind::StringLiteral("問天地好在。".to_string()));
    }

    #[test]
    fn trailing_extra_closer_is_absorbed_after_doubled_opener() {
        let t = toks("「「甲」」」");
        assert_eq!(t[0].kind, TokenKind::StringLiteral("甲」".to_string()));
    }

    #[test]
    fn reads_identifier() {
        let t = toks("「甲」");
        assert_eq!(t[0].kind, TokenKind::Identifier("甲".to_string()));
    }

    #[test]
    fn decodes_numeral_run() {
        let t = toks("一萬二千");
        assert_eq!(t[0].kind, TokenKind::NumberLiteral("12000".to_string()));
    }

    #[test]
    fn unterminated_identifier_faults() {
        let err = Lexer::new("「甲", "t.wy").tokenize().unwrap_err();
        assert_eq!(err.message, "名未尽");
    }

    #[test]
    fn unterminated_string_faults() {
        let err = Lexer::new("「「甲", "t.wy").tokenize().unwrap_err();
        assert_eq!(err.message, "言未尽");
    }
}
