//! Macro substitution and import module resolution (§4.3).
//!
//! Macro expansion runs once over the whole source buffer before the real
//! tokenize/parse pass, the way the reference implementation's macro step
//! precedes its own grammar. A macro's `pattern`/`replacement` text may
//! contain placeholders drawn from the 天干 alphabet (十干, 10 characters);
//! a placeholder in `pattern` becomes a non-greedy capture, and the same
//! letter in `replacement` is substituted by what that capture matched.
//!
//! Each macro definition is found via a full tokenization of the current
//! buffer (reusing `Lexer` rather than re-deriving its quoting rules here),
//! so that the region a substitution is allowed to touch never splits a
//! string literal or identifier in two.

use crate::error::GrammarFault;
use crate::lexer::Lexer;
use crate::token::{Kw, Token, TokenKind};
use std::ops::Range;
use std::path::{Path, PathBuf};

const PLACEHOLDER_ALPHABET: &[char] = &['甲', '乙', '丙', '丁', '戊', '己', '庚', '辛', '壬', '癸'];

#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    pub pattern: String,
    pub replacement: String,
}

enum Segment {
    Lit(Vec<char>),
    Placeholder(char),
}

fn compile_segments(s: &str) -> Vec<Segment> {
    let chars: Vec<char> = s.chars().collect();
    let mut segments = Vec::new();
    let mut lit = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '「' && i + 2 < chars.len() && chars[i + 2] == '」' && PLACEHOLDER_ALPHABET.contains(&chars[i + 1]) {
            if !lit.is_empty() {
                segments.push(Segment::Lit(std::mem::take(&mut lit)));
            }
            segments.push(Segment::Placeholder(chars[i + 1]));
            i += 3;
        } else {
            lit.push(chars[i]);
            i += 1;
        }
    }
    if !lit.is_empty() {
        segments.push(Segment::Lit(lit));
    }
    segments
}

/// Matches `segments` against `text` starting exactly at `pos`. Placeholder
/// captures are non-greedy: the shortest span that still lets the rest of
/// the pattern match.
fn match_at(text: &[char], pos: usize, segments: &[Segment], captures: &mut Vec<(char, String)>) -> Option<usize> {
    match segments.first() {
        None => Some(pos),
        Some(Segment::Lit(lit)) => {
            let end = pos + lit.len();
            if end <= text.len() && text[pos..end] == lit[..] {
                match_at(text, end, &segments[1..], captures)
            } else {
                None
            }
        }
        Some(Segment::Placeholder(name)) => {
            for len in 0..=(text.len() - pos) {
                let end = pos + len;
                let mut trial = captures.clone();
                trial.push((*name, text[pos..end].iter().collect()));
                if let Some(final_pos) = match_at(text, end, &segments[1..], &mut trial) {
                    *captures = trial;
                    return Some(final_pos);
                }
            }
            None
        }
    }
}

/// First position at or after `from` (in chars, skipping any position
/// inside `protected`) where `segments` matches.
fn find_match(
    text: &[char],
    segments: &[Segment],
    protected: &[Range<usize>],
    from: usize,
) -> Option<(usize, usize, Vec<(char, String)>)> {
    for pos in from..=text.len() {
        if protected.iter().any(|r| r.contains(&pos)) {
            continue;
        }
        let mut captures = Vec::new();
        if let Some(end) = match_at(text, pos, segments, &mut captures) {
            return Some((pos, end, captures));
        }
    }
    None
}

fn render_replacement(replacement: &str, captures: &[(char, String)]) -> String {
    let chars: Vec<char> = replacement.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '「' && i + 2 < chars.len() && chars[i + 2] == '」' && PLACEHOLDER_ALPHABET.contains(&chars[i + 1]) {
            let name = chars[i + 1];
            if let Some((_, captured)) = captures.iter().find(|(c, _)| *c == name) {
                out.push_str(captured);
            }
            i += 3;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Applies one macro's substitution repeatedly: find the next match outside
/// a protected span, replace it, then restart the search at the
/// replacement's start so chained replacements can re-match (§4.3).
fn apply_one(text: &str, def: &MacroDef, protected: &[Range<usize>]) -> String {
    let pattern = compile_segments(&def.pattern);
    let mut chars: Vec<char> = text.chars().collect();
    let mut search_from = 0;
    loop {
        match find_match(&chars, &pattern, protected, search_from) {
            None => break,
            Some((start, end, captures)) => {
                let replacement: Vec<char> = render_replacement(&def.replacement, &captures).chars().collect();
                let replacement_start = start;
                chars.splice(start..end, replacement.iter().copied());
                search_from = replacement_start;
            }
        }
    }
    chars.into_iter().collect()
}

/// Byte spans of `Identifier`/`StringLiteral` tokens, in char offsets —
/// substitution may never start or end inside one of these.
fn protected_char_spans(tokens: &[Token], src: &str) -> Vec<Range<usize>> {
    tokens
        .iter()
        .filter(|t| matches!(t.kind, TokenKind::StringLiteral(_) | TokenKind::Identifier(_)))
        .map(|t| {
            let start = src[..t.span.start.min(src.len())].chars().count();
            let end = src[..t.span.end.min(src.len())].chars().count();
            start..end
        })
        .collect()
}

/// Scans `tokens` for `或云 "pattern" 蓋謂 "replacement"` sequences, in
/// declaration order.
fn collect_macro_defs(tokens: &[Token]) -> Vec<MacroDef> {
    let mut defs = Vec::new();
    let mut i = 0;
    while i + 3 < tokens.len() {
        let is_def = matches!(&tokens[i].kind, TokenKind::Keyword(Kw::MacroDef));
        if is_def {
            if let (TokenKind::StringLiteral(pattern), TokenKind::Keyword(Kw::MacroReplace), TokenKind::StringLiteral(replacement)) =
                (&tokens[i + 1].kind, &tokens[i + 2].kind, &tokens[i + 3].kind)
            {
                defs.push(MacroDef { pattern: pattern.clone(), replacement: replacement.clone() });
                i += 4;
                continue;
            }
        }
        i += 1;
    }
    defs
}

/// Expands every macro definition found in `src`, in declaration order,
/// against the whole buffer (including text preceding the macro's own
/// definition — see `DESIGN.md` for why this implementation doesn't track
/// definition-site displacement across cascading earlier expansions).
/// Protected spans are recomputed by re-tokenizing the buffer before each
/// macro's pass, so earlier expansions can't corrupt a later string
/// literal's boundary accounting; a buffer that fails to re-tokenize mid-way
/// (a pathological macro body) is treated as having no protected spans for
/// that one pass rather than aborting compilation.
pub fn expand_macros(src: &str, filename: &str) -> Result<String, GrammarFault> {
    let initial_tokens = Lexer::new(src, filename).tokenize()?;
    let defs = collect_macro_defs(&initial_tokens);
    let mut text = src.to_string();
    for def in &defs {
        let protected = match Lexer::new(&text, filename).tokenize() {
            Ok(toks) => protected_char_spans(&toks, &text),
            Err(_) => Vec::new(),
        };
        text = apply_one(&text, def, &protected);
    }
    Ok(text)
}

/// §6 library search path, in order: the importing file's own directory,
/// the platform-native alternatives directory, the generic library
/// directory. The module `曆法` reverses the latter two so the shared
/// library copy wins over the platform-specific one.
pub fn resolve_module(module: &str, current_dir: &Path, lib_paths: &[PathBuf]) -> Option<PathBuf> {
    let candidate_name = format!("{module}.wy");

    let local = current_dir.join(&candidate_name);
    if local.is_file() {
        return Some(local);
    }

    let mut tail: Vec<&PathBuf> = lib_paths.iter().collect();
    if module == "曆法" {
        tail.reverse();
    }
    for dir in tail {
        let candidate = dir.join(&candidate_name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_macro_without_placeholders() {
        let src = "或云「「甲乙」」蓋謂「「丙丁」」。書之。";
        let out = expand_macros(src, "t.wy").unwrap();
        assert!(out.contains("丙丁"));
    }

    #[test]
    fn expands_macro_with_placeholder_capture() {
        let def = MacroDef { pattern: "甲乙「甲」丙丁".to_string(), replacement: "START「甲」END".to_string() };
        let protected = Vec::new();
        let out = apply_one("甲乙XYZ丙丁", &def, &protected);
        assert_eq!(out, "STARTXYZEND");
    }

    #[test]
    fn resolve_module_prefers_local_directory() {
        let dir = tempfile::tempdir().unwrap();
        let module_path = dir.path().join("母.wy");
        std::fs::write(&module_path, "").unwrap();
        let found = resolve_module("母", dir.path(), &[]);
        assert_eq!(found, Some(module_path));
    }

    #[test]
    fn resolve_module_reverses_search_order_for_li_fa() {
        let platform_dir = tempfile::tempdir().unwrap();
        let generic_dir = tempfile::tempdir().unwrap();
        let generic_module = generic_dir.path().join("曆法.wy");
        std::fs::write(&generic_module, "").unwrap();
        let lib_paths = vec![platform_dir.path().to_path_buf(), generic_dir.path().to_path_buf()];
        let found = resolve_module("曆法", platform_dir.path(), &lib_paths);
        assert_eq!(found, Some(generic_module));
    }
}
