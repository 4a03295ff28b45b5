//! Classical numeral decoding (§4.1 of the component design).
//!
//! Decodes a maximal run of numeric characters into a canonical decimal
//! string. The integer part is never routed through floating point: large
//! magnitudes (anything built from the long-scale units up to `極`, 10^48)
//! are assembled by string concatenation and string addition, so `負一垓`
//! decodes to `-100000000000000000000` exactly rather than through an
//! `f64` that would round it.

use crate::error::GrammarFault;

const DIGIT_CHARS: &[(char, u8)] = &[
    ('零', 0), ('〇', 0), ('一', 1), ('二', 2), ('三', 3), ('四', 4),
    ('五', 5), ('六', 6), ('七', 7), ('八', 8), ('九', 9),
];

const SMALL_UNITS: &[(char, u32)] = &[('十', 10), ('百', 100), ('千', 1000)];

/// Long-scale large units: each is 10^4 times the previous.
const LARGE_UNITS: &[(char, u32)] = &[
    ('萬', 4), ('億', 8), ('兆', 12), ('京', 16), ('垓', 20), ('秭', 24),
    ('穰', 28), ('溝', 32), ('澗', 36), ('正', 40), ('載', 44), ('極', 48),
];

/// Decimal-unit (sub-unity) markers, positions 1..12 after the point.
const DECIMAL_UNITS: &[char] = &[
    '分', '釐', '毫', '絲', '忽', '微', '纖', '沙', '塵', '埃', '渺', '漠',
];

const FRACTION_SEP: char = '又';
const DECIMAL_POINT: char = '·';
const NEGATIVE: char = '負';

/// Every character decode() is prepared to see; the tokenizer uses this to
/// recognize a maximal numeral run.
pub fn is_numeral_char(c: char) -> bool {
    c == NEGATIVE
        || c == FRACTION_SEP
        || c == DECIMAL_POINT
        || DIGIT_CHARS.iter().any(|&(d, _)| d == c)
        || SMALL_UNITS.iter().any(|&(d, _)| d == c)
        || LARGE_UNITS.iter().any(|&(d, _)| d == c)
        || DECIMAL_UNITS.contains(&c)
}

fn digit_value(c: char) -> Option<u8> {
    DIGIT_CHARS.iter().find(|&&(d, _)| d == c).map(|&(_, v)| v)
}

fn small_unit_value(c: char) -> Option<u32> {
    SMALL_UNITS.iter().find(|&&(d, _)| d == c).map(|&(_, v)| v)
}

fn large_unit_power(c: char) -> Option<u32> {
    LARGE_UNITS.iter().find(|&&(d, _)| d == c).map(|&(_, p)| p)
}

/// Decode a maximal numeral run into a canonical decimal string (optional
/// leading `-`, at most one `.`). `span` is used only to build faults.
pub fn decode(chars: &[char], filename: &str, byte_span: (usize, usize), line_text: &str, line: usize, col: usize) -> Result<String, GrammarFault> {
    let fault = |msg: &str| GrammarFault::new(msg.to_string(), filename.to_string(), line, col, line_text.to_string());
    let _ = byte_span;

    if chars.is_empty() {
        return Err(fault("空數字"));
    }

    let mut negative = false;
    let mut rest = chars;
    if rest[0] == NEGATIVE {
        negative = true;
        rest = &rest[1..];
    }
    if rest.contains(&NEGATIVE) {
        return if rest.iter().filter(|&&c| c == NEGATIVE).count() > 1 {
            Err(fault("多重負號"))
        } else {
            Err(fault("負號位置錯誤"))
        };
    }
    if rest.is_empty() {
        return Err(fault("空數字"));
    }

    let has_point = rest.contains(&DECIMAL_POINT);
    let has_fraction_sep = rest.contains(&FRACTION_SEP);

    if has_point && has_fraction_sep {
        return Err(fault("混用小數點與又"));
    }

    let body = if has_point {
        decode_decimal_point_form(rest, &fault)?
    } else if has_fraction_sep {
        decode_fraction_sep_form(rest, &fault)?
    } else {
        decode_integer_placevalue(rest, &fault)?
    };

    Ok(if negative && body != "0" { format!("-{body}") } else { body })
}

fn decode_decimal_point_form(
    chars: &[char],
    fault: &dyn Fn(&str) -> GrammarFault,
) -> Result<String, GrammarFault> {
    let point_count = chars.iter().filter(|&&c| c == DECIMAL_POINT).count();
    if point_count > 1 {
        return Err(fault("多重小數點"));
    }
    let point_idx = chars.iter().position(|&c| c == DECIMAL_POINT).unwrap();
    if point_idx == 0 || point_idx == chars.len() - 1 {
        return Err(fault("小數點位置錯誤"));
    }
    let mut int_digits = String::new();
    let mut frac_digits = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if c == DECIMAL_POINT {
            continue;
        }
        let d = digit_value(c).ok_or_else(|| fault("非數值字符"))?;
        if i < point_idx {
            int_digits.push((b'0' + d) as char);
        } else {
            frac_digits.push((b'0' + d) as char);
        }
    }
    let int_digits = strip_leading_zeros(&int_digits);
    if frac_digits.is_empty() {
        Ok(int_digits)
    } else {
        Ok(format!("{int_digits}.{frac_digits}"))
    }
}

fn decode_fraction_sep_form(
    chars: &[char],
    fault: &dyn Fn(&str) -> GrammarFault,
) -> Result<String, GrammarFault> {
    let sep_count = chars.iter().filter(|&&c| c == FRACTION_SEP).count();
    if sep_count > 1 {
        return Err(fault("多重又"));
    }
    let idx = chars.iter().position(|&c| c == FRACTION_SEP).unwrap();
    let (left, right) = (&chars[..idx], &chars[idx + 1..]);
    if right.is_empty() {
        return Err(fault("又後為空"));
    }
    let int_part = decode_integer_placevalue(left, fault)?;
    let has_unit_marker = right.iter().any(|c| DECIMAL_UNITS.contains(c));
    if has_unit_marker {
        let frac = decode_fraction_by_unit(right, fault)?;
        Ok(if frac.is_empty() { int_part } else { format!("{int_part}.{frac}") })
    } else {
        let right_int = decode_integer_placevalue(right, fault)?;
        Ok(add_decimal(&int_part, &right_int))
    }
}

/// Digits attach to sequential decimal-unit positions (1..12); position may
/// only advance, never repeat or skip backwards.
fn decode_fraction_by_unit(
    chars: &[char],
    fault: &dyn Fn(&str) -> GrammarFault,
) -> Result<String, GrammarFault> {
    let mut slots: Vec<Option<u8>> = vec![None; DECIMAL_UNITS.len()];
    let mut pending_digit: Option<u8> = None;
    let mut last_pos: i32 = -1;

    for &c in chars {
        if let Some(d) = digit_value(c) {
            pending_digit = Some(d);
        } else if let Some(pos) = DECIMAL_UNITS.iter().position(|&u| u == c) {
            if (pos as i32) <= last_pos {
                return Err(fault("小數位錯序"));
            }
            slots[pos] = Some(pending_digit.take().unwrap_or(0));
            last_pos = pos as i32;
        } else {
            return Err(fault("非數值字符"));
        }
    }
    if last_pos as usize >= DECIMAL_UNITS.len() {
        return Err(fault("小數位過長"));
    }

    let last_filled = slots.iter().rposition(|s| s.is_some()).map(|p| p + 1).unwrap_or(0);
    let mut out = String::new();
    for slot in &slots[..last_filled] {
        out.push((b'0' + slot.unwrap_or(0)) as char);
    }
    Ok(out)
}

/// The classical place-value algorithm: `current_digit` feeds a small unit
/// into `section`; a large unit flushes `section * 10^power` into `total`.
fn decode_integer_placevalue(
    chars: &[char],
    fault: &dyn Fn(&str) -> GrammarFault,
) -> Result<String, GrammarFault> {
    let mut total = "0".to_string();
    let mut section: u64 = 0;
    let mut current_digit: Option<u64> = None;

    for &c in chars {
        if let Some(d) = digit_value(c) {
            current_digit = Some(d as u64);
        } else if let Some(mult) = small_unit_value(c) {
            let d = current_digit.take().unwrap_or(1);
            section += d * mult as u64;
        } else if let Some(power) = large_unit_power(c) {
            if let Some(d) = current_digit.take() {
                section += d;
            }
            let flushed = mul_by_pow10(&section.to_string(), power);
            total = add_decimal(&total, &flushed);
            section = 0;
        } else {
            return Err(fault("非數值字符"));
        }
    }
    if let Some(d) = current_digit.take() {
        section += d;
    }
    total = add_decimal(&total, &section.to_string());
    Ok(total)
}

fn strip_leading_zeros(s: &str) -> String {
    let trimmed = s.trim_start_matches('0');
    if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() }
}

/// Multiply a nonnegative decimal string by `10^power` via zero-padding —
/// valid because every large unit is itself a power of ten.
fn mul_by_pow10(s: &str, power: u32) -> String {
    if s == "0" {
        return "0".to_string();
    }
    let mut out = s.to_string();
    out.push_str(&"0".repeat(power as usize));
    out
}

/// Schoolbook addition on nonnegative decimal strings.
fn add_decimal(a: &str, b: &str) -> String {
    let a: Vec<u8> = a.bytes().rev().map(|c| c - b'0').collect();
    let b: Vec<u8> = b.bytes().rev().map(|c| c - b'0').collect();
    let mut result = Vec::with_capacity(a.len().max(b.len()) + 1);
    let mut carry = 0u8;
    for i in 0..a.len().max(b.len()) {
        let da = a.get(i).copied().unwrap_or(0);
        let db = b.get(i).copied().unwrap_or(0);
        let sum = da + db + carry;
        result.push(sum % 10);
        carry = sum / 10;
    }
    if carry > 0 {
        result.push(carry);
    }
    let s: String = result.iter().rev().map(|d| (b'0' + d) as char).collect();
    strip_leading_zeros(&s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_str(s: &str) -> Result<String, GrammarFault> {
        let chars: Vec<char> = s.chars().collect();
        decode(&chars, "t.wy", (0, 0), s, 1, 1)
    }

    #[test]
    fn zero_and_small_digits() {
        assert_eq!(decode_str("零").unwrap(), "0");
        assert_eq!(decode_str("一").unwrap(), "1");
        assert_eq!(decode_str("三").unwrap(), "3");
    }

    #[test]
    fn absent_digit_before_shi_defaults_to_one() {
        assert_eq!(decode_str("十").unwrap(), "10");
        assert_eq!(decode_str("十五").unwrap(), "15");
        assert_eq!(decode_str("九十九").unwrap(), "99");
    }

    #[test]
    fn large_unit_exact_integer() {
        assert_eq!(decode_str("一萬").unwrap(), "10000");
        assert_eq!(decode_str("負一垓").unwrap(), "-100000000000000000000");
    }

    #[test]
    fn mixed_sections_sum_correctly() {
        // 一萬二千三百四十五 = 12345
        assert_eq!(decode_str("一萬二千三百四十五").unwrap(), "12345");
    }

    #[test]
    fn decimal_point_form_concatenates_digits() {
        assert_eq!(decode_str("一二三·四五").unwrap(), "123.45");
    }

    #[test]
    fn double_negative_sign_is_an_error() {
        let err = decode_str("負負一").unwrap_err();
        assert_eq!(err.message, "多重負號");
    }

    #[test]
    fn mixing_point_and_fraction_sep_is_an_error() {
        let err = decode_str("一·二又三").unwrap_err();
        assert_eq!(err.message, "混用小數點與又");
    }
}
