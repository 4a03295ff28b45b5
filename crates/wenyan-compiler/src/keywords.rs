//! The closed keyword set and its longest-match lookup index (§4.2 rule 3,
//! §6 "Keyword set").
//!
//! Keywords are indexed by first character to a list sorted by descending
//! length, so the tokenizer always finds the longest keyword that is a
//! prefix of the remaining input before falling back to identifier/data
//! rules.

use crate::token::Kw;
use std::collections::HashMap;
use std::sync::OnceLock;

const KEYWORDS: &[(&str, Kw)] = &[
    ("吾有", Kw::ThereIs),
    ("今有", Kw::ThereIsNow),
    ("名之曰", Kw::NameIt),
    ("曰", Kw::Means),
    ("其", Kw::SelfKw),
    ("是矣", Kw::EndYiSentence),
    ("是也", Kw::EndYeSentence),
    ("加", Kw::Add),
    ("減", Kw::Sub),
    ("乘", Kw::Mul),
    ("除", Kw::Div),
    ("以施", Kw::PipeInvoke),
    ("以", Kw::With),
    ("夫", Kw::Push),
    ("書之", Kw::Print),
    ("爾汝忘之", Kw::Clear),
    ("昔之", Kw::Former),
    ("者", Kw::ThatWhich),
    ("今", Kw::Now),
    ("不復存矣", Kw::NoLongerExists),
    ("充", Kw::Append),
    ("銜", Kw::Concat),
    ("之長", Kw::LengthOf),
    ("乃造一物", Kw::NewObject),
    ("之值", Kw::ValueOf),
    ("若其然者", Kw::IfSelfTrue),
    ("若其不然者", Kw::IfSelfFalse),
    ("若非", Kw::Else),
    ("或若", Kw::ElseIf),
    ("若", Kw::If),
    ("云云", Kw::EndYunYun),
    ("是謂", Kw::EndShiWei),
    ("也", Kw::EndYe),
    ("恆為是", Kw::While),
    ("為是", Kw::For),
    ("遍", Kw::Times),
    ("中之", Kw::ForeachVar),
    ("凡", Kw::Foreach),
    ("乃止是遍", Kw::Continue),
    ("乃止", Kw::Break),
    ("乃得矣", Kw::ReturnPopStack),
    ("乃得", Kw::ReturnValue),
    ("乃歸空無", Kw::ReturnEmpty),
    ("欲行是術", Kw::ProcWillRun),
    ("必先得", Kw::ParamsRequire),
    ("其餘", Kw::RestMarker),
    ("乃行是術曰", Kw::ProcBodyOpenB),
    ("是術曰", Kw::ProcBodyOpenA),
    ("之術也", Kw::ProcDefClose),
    ("取", Kw::Take),
    ("姑妄行此", Kw::TryOpen),
    ("如事不諧", Kw::CatchIntro),
    ("不知何禍歟", Kw::CatchAll),
    ("之禍歟", Kw::CaseFaultEnd),
    ("豈", Kw::CaseFault),
    ("乃作罷", Kw::TryClose),
    ("嗚呼", Kw::Raise),
    ("之禍", Kw::RaiseFault),
    ("吾嘗觀", Kw::ImportKw),
    ("之書", Kw::ImportBook),
    ("方悟", Kw::Expose),
    ("之義", Kw::ExposeSuffix),
    ("或云", Kw::MacroDef),
    ("蓋謂", Kw::MacroReplace),
    ("蓋", Kw::Public),
    ("之", Kw::Of),
    ("數", Kw::TypeNumber),
    ("言", Kw::TypeString),
    ("爻", Kw::TypeBool),
    ("列", Kw::TypeList),
    ("物", Kw::TypeObject),
    ("術", Kw::TypeProc),
    ("元", Kw::TypeAny),
    ("不等於", Kw::Ne),
    ("不小於", Kw::Ge),
    ("不大於", Kw::Le),
    ("等於", Kw::Eq),
    ("小於", Kw::Lt),
    ("大於", Kw::Gt),
    ("且", Kw::And),
    ("或", Kw::Or),
    ("中有陽乎", Kw::ContainsTruthy),
    ("中無陰乎", Kw::ContainsFalsy),
    ("然", Kw::BoolTrue),
    ("不然", Kw::BoolFalse),
    ("非", Kw::NotKw),
    ("施", Kw::Invoke),
];

fn index() -> &'static HashMap<char, Vec<(&'static str, Kw)>> {
    static INDEX: OnceLock<HashMap<char, Vec<(&'static str, Kw)>>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut map: HashMap<char, Vec<(&'static str, Kw)>> = HashMap::new();
        for &(text, kw) in KEYWORDS {
            let first = text.chars().next().expect("keyword is non-empty");
            map.entry(first).or_default().push((text, kw));
        }
        for entries in map.values_mut() {
            entries.sort_by_key(|(text, _)| std::cmp::Reverse(text.chars().count()));
        }
        map
    })
}

/// Longest keyword that is a prefix of `remaining`, if any. Returns the
/// matched text's length in chars plus the keyword.
pub fn longest_match(remaining: &str) -> Option<(usize, Kw)> {
    let first = remaining.chars().next()?;
    let candidates = index().get(&first)?;
    for &(text, kw) in candidates {
        if remaining.starts_with(text) {
            return Some((text.chars().count(), kw));
        }
    }
    None
}

pub fn keyword_text(kw: Kw) -> &'static str {
    KEYWORDS
        .iter()
        .find(|&&(_, k)| k == kw)
        .map(|&(t, _)| t)
        .expect("every Kw variant has a surface form")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_match_prefers_longer_keyword() {
        assert_eq!(longest_match("乃得矣。"), Some((3, Kw::ReturnPopStack)));
        assert_eq!(longest_match("乃得「和」"), Some((2, Kw::ReturnValue)));
    }

    #[test]
    fn longest_match_handles_disjoint_overlap() {
        assert_eq!(longest_match("以施「加」"), Some((2, Kw::PipeInvoke)));
        assert_eq!(longest_match("以二"), Some((1, Kw::With)));
    }

    #[test]
    fn no_match_on_plain_text() {
        assert_eq!(longest_match("問天地"), None);
    }
}
