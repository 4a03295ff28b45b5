//! End-to-end scenarios: literal Wenyan source to literal stdout, the way
//! the reference corpus's example programs are checked.

use std::io::Cursor;
use wenyan_compiler::config::Config;
use wenyan_compiler::driver;

fn run_with(src: &str, config: &Config) -> String {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.wy");
    std::fs::write(&path, src).unwrap();

    let mut out = Cursor::new(Vec::new());
    driver::run_emit(&path, config, &mut out).expect("program should run without faulting");
    String::from_utf8(out.into_inner()).unwrap()
}

fn run(src: &str) -> String {
    run_with(src, &Config::new())
}

#[test]
fn prints_a_string_literal() {
    let src = "吾有一言。曰「「問天地好在。」」。書之。";
    assert_eq!(run(src), "問天地好在。\n");
}

#[test]
fn arithmetic_and_reassignment() {
    let src = "加一以二。名之曰「甲」。加「甲」以一。昔之「甲」者。今其是矣。夫「甲」。書之。";
    assert_eq!(run(src), "4\n");
}

#[test]
fn raise_and_catch_carries_the_fault_name() {
    let src = "姑妄行此。嗚呼。「「大禍」」之禍。如事不諧。豈「「大禍」」之禍歟。名之曰「禍」。夫「禍」之「「名」」。書之。乃作罷。";
    assert_eq!(run(src), "大禍\n");
}

#[test]
fn counted_loop_accumulates_three_times() {
    let src = "吾有一數。曰零。名之曰「和」。為是三遍。加「和」以一。昔之「和」者。今其是矣。云云。夫「和」。書之。";
    assert_eq!(run(src), "3\n");
}

#[test]
fn procedure_call_via_take_and_pipe() {
    let src = "今有一術。名之曰「加總」。欲行是術。必先得二數。曰「甲」。曰「乙」。乃行是術曰。加「甲」以「乙」。乃得矣。夫一。夫二。取二以施「加總」。書之。";
    assert_eq!(run(src), "3\n");
}

#[test]
fn variadic_procedure_takes_the_rest() {
    let src = "今有一術。名之曰「收尾」。欲行是術。必先得一數。曰「首」。其餘數。曰「餘」。乃行是術曰。乃得「餘」之長。夫一。夫二。夫三。取其餘以施「收尾」。書之。";
    assert_eq!(run(src), "2\n");
}

#[test]
fn list_prints_in_five_column_compat_layout() {
    let src = "吾有一列。名之曰「甲」。\
               充「甲」以十二。充「甲」以六。充「甲」以三。充「甲」以十。充「甲」以五。\
               充「甲」以十六。充「甲」以八。充「甲」以四。充「甲」以二。充「甲」以一。充「甲」以一。\
               夫「甲」。書之。";
    let printed = run_with(src, &Config::new().with_no_output_hanzi(true));
    assert_eq!(printed, "[\n  12, 6, 3, 10, 5,\n  16, 8, 4,  2, 1,\n   1\n]\n");
}
