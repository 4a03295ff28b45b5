//! `__format`/`__print`: stack-to-text conversion for `書之` (§4.6
//! "Printing").
//!
//! Two modes, switched by the process-wide `no_output_hanzi` flag carried
//! on `crate::interp::Interpreter`:
//!
//! - Default: each stack value in its natural format, space-joined.
//! - Compatibility (`--no-outputHanzi`): reproduces the reference CLI's
//!   list layout byte-for-byte, including the column-grouping algorithm
//!   this module's `layout_columns` implements.

use crate::value::Value;

pub fn display_scalar(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::Str(s) => s.to_string(),
        Value::List(l) => {
            let items: Vec<String> = l.borrow().iter().map(display_scalar).collect();
            format!("[ {} ]", items.join(", "))
        }
        Value::Dict(d) => {
            let items: Vec<String> = d
                .borrow()
                .iter()
                .map(|(k, v)| format!("{}: {}", k, display_scalar(v)))
                .collect();
            format!("{{ {} }}", items.join(", "))
        }
        Value::Proc(p) => format!("[Function: {}]", p.name()),
    }
}

/// Formats a double the way the reference JS implementation's `Number`
/// formatting does: integral values print without a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    }
    if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

const SCREEN_WIDTH: usize = 80;
const MAX_LIST_ITEMS: usize = 100;

/// Render the full line `書之` prints for the current stack (values already
/// popped out of the stack by the caller — this function only formats).
pub fn format_stack(values: &[Value], no_output_hanzi: bool) -> String {
    let rendered: Vec<String> = values
        .iter()
        .map(|v| render_value(v, no_output_hanzi, 0))
        .collect();
    rendered.join(" ")
}

fn render_value(v: &Value, compat: bool, indent: usize) -> String {
    match v {
        Value::List(l) if compat => render_list_compat(&l.borrow(), indent),
        _ => display_scalar(v),
    }
}

fn render_list_compat(items: &[Value], indent: usize) -> String {
    let truncated = items.len() > MAX_LIST_ITEMS;
    let shown = if truncated { &items[..MAX_LIST_ITEMS] } else { items };
    let rendered: Vec<String> = shown.iter().map(|v| display_scalar(v)).collect();
    let more = if truncated {
        Some(items.len() - MAX_LIST_ITEMS)
    } else {
        None
    };

    if rendered.is_empty() {
        return "[]".to_string();
    }

    // Column grouping is only attempted once there are enough items that a
    // grid actually saves vertical space (§4.6). `layout_columns` returns
    // `None` when grouping wouldn't reduce the row count below one item per
    // row, in which case the plain one-per-row rendering is used instead.
    let all_numeric = shown.iter().all(|v| matches!(v, Value::Number(_)));
    let rows: Vec<String> = if more.is_none() && rendered.len() > 6 {
        layout_columns(&rendered, indent, all_numeric).unwrap_or_else(|| rendered.clone())
    } else {
        rendered.clone()
    };

    // Grouping didn't happen (few items, or it wasn't worth it): fall back
    // to a single inline line if it fits.
    if more.is_none() && rows.len() == rendered.len() {
        let inline = format!("[ {} ]", rendered.join(", "));
        if indent + inline.len() <= SCREEN_WIDTH {
            return inline;
        }
    }

    let mut out = String::from("[\n");
    let last_row = rows.len().saturating_sub(1);
    for (i, row) in rows.iter().enumerate() {
        out.push_str("  ");
        out.push_str(row);
        // Every row but the very last line gets a trailing comma — including
        // the last real row when truncation adds a "... N more items" line
        // after it.
        if more.is_some() || i != last_row {
            out.push(',');
        }
        out.push('\n');
    }
    if let Some(n) = more {
        out.push_str(&format!("  ... {} more items\n", n));
    }
    out.push(']');
    out
}

/// The column-grouping layout from §4.6. Returns `None` when grouping
/// wouldn't actually reduce the row count below one item per row, so the
/// caller can fall back to its own ungrouped/inline rendering.
fn layout_columns(rendered: &[String], indent: usize, right_align: bool) -> Option<Vec<String>> {
    let lens: Vec<usize> = rendered.iter().map(|s| s.chars().count()).collect();
    let n = rendered.len();
    let max_len = *lens.iter().max().unwrap_or(&0);
    let col_width = max_len + 2;
    let total: usize = lens.iter().map(|l| l + 2).sum();

    let worth_grouping = col_width * 3 + indent < SCREEN_WIDTH
        && (total as f64 / col_width as f64 > 5.0 || max_len <= 6);
    if !worth_grouping {
        return None;
    }

    let bias = ((col_width as f64) - (total as f64) / (n as f64)).max(0.0).sqrt();
    let effective = (col_width as f64 - 3.0 - bias).max(1.0);
    let by_sqrt = ((2.5 * effective * n as f64).sqrt() / effective).round() as usize;
    let by_width = ((SCREEN_WIDTH - indent) as f64 / col_width as f64).floor() as usize;
    let cols = by_sqrt.min(by_width).min(12).min(15);

    if cols <= 1 {
        return None;
    }

    let mut col_widths = vec![0usize; cols];
    for (i, len) in lens.iter().enumerate() {
        let c = i % cols;
        if *len > col_widths[c] {
            col_widths[c] = *len;
        }
    }
    for w in &mut col_widths {
        *w += 2;
    }

    let mut rows = Vec::new();
    let mut i = 0;
    while i < n {
        let mut row = String::new();
        for c in 0..cols {
            if i + c >= n {
                break;
            }
            let idx = i + c;
            let item = &rendered[idx];
            let is_last_in_row = c == cols - 1 || idx + 1 >= n;
            let width = col_widths[c];
            // Every item reserves 2 chars of padding budget for a following
            // `", "`, even a row-ending one — its comma is instead supplied
            // by the row separator in `render_list_compat`.
            let pad = width.saturating_sub(item.chars().count() + 2);
            if right_align {
                row.push_str(&" ".repeat(pad));
                row.push_str(item);
            } else {
                row.push_str(item);
                row.push_str(&" ".repeat(pad));
            }
            if !is_last_in_row {
                row.push_str(", ");
            }
        }
        rows.push(row);
        i += cols;
    }
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_number_has_no_trailing_point() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(3.5), "3.5");
    }

    #[test]
    fn short_list_prints_inline() {
        let v = Value::list(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
        assert_eq!(format_stack(std::slice::from_ref(&v), true), "[ 1, 2, 3 ]");
    }

    #[test]
    fn long_numeric_list_groups_into_five_columns() {
        let nums = [12, 6, 3, 10, 5, 16, 8, 4, 2, 1, 1];
        let items: Vec<Value> = nums.iter().map(|n| Value::Number(*n as f64)).collect();
        let rendered: Vec<String> = items.iter().map(display_scalar).collect();
        let rows = layout_columns(&rendered, 0, true).expect("11 numeric items should group");
        assert_eq!(rows, vec!["12, 6, 3, 10, 5", "16, 8, 4,  2, 1", " 1"]);
    }

    #[test]
    fn eleven_item_numeric_list_prints_five_column_block() {
        let nums = [12, 6, 3, 10, 5, 16, 8, 4, 2, 1, 1];
        let v = Value::list(nums.iter().map(|n| Value::Number(*n as f64)).collect());
        let expected = "[\n  12, 6, 3, 10, 5,\n  16, 8, 4,  2, 1,\n   1\n]";
        assert_eq!(format_stack(std::slice::from_ref(&v), true), expected);
    }
}
