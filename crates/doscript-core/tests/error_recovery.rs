//! Error propagation, `try`/`catch` matching and error reporting.

mod common;

use std::path::Path;

use common::{interpreter, run_source};
use doscript_core::engine::RunOptions;
use doscript_core::error::{ErrorKind, ScriptError};

#[test]
fn test_catch_network_does_not_catch_file_error() {
    let (mut interp, host) = interpreter(RunOptions::default());
    host.fail("delete", ScriptError::file("permission denied"));
    let err = interp
        .run_source(
            "try\ndelete \"x\"\ncatch NetworkError\nsay \"wrong\"\nend_try\nsay \"after\"\n",
            Path::new("t.do"),
        )
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::File);
    assert_eq!(err.message, "permission denied");
    assert_eq!(err.origin.unwrap().line, 2);
    assert!(host.said().is_empty());
}

#[test]
fn test_unmatched_error_reaches_outer_try() {
    let (mut interp, host) = interpreter(RunOptions::default());
    host.fail("download", ScriptError::network("connection refused"));
    interp
        .run_source(
            "try\n\
               try\ndownload \"http://x\" to \"y\"\ncatch FileError\nsay \"inner\"\nend_try\n\
             catch NetworkError\nsay \"outer\"\nend_try\n",
            Path::new("t.do"),
        )
        .unwrap();
    assert_eq!(host.said(), vec!["outer"]);
}

#[test]
fn test_first_matching_clause_wins() {
    let (mut interp, host) = interpreter(RunOptions::default());
    host.fail("run", ScriptError::process("exit status 2"));
    interp
        .run_source(
            "try\nrun \"false\"\ncatch ProcessError\nsay \"process\"\ncatch\nsay \"any\"\n\
             end_try\n",
            Path::new("t.do"),
        )
        .unwrap();
    assert_eq!(host.said(), vec!["process"]);
}

#[test]
fn test_bare_kind_names_are_accepted_in_catch() {
    let (result, host) = run_source("try\nsay 1 % 0\ncatch Data\nsay \"data\"\nend_try\n");
    result.unwrap();
    assert_eq!(host.said(), vec!["data"]);
}

#[test]
fn test_unknown_catch_kind_is_a_parse_error() {
    let (result, host) = run_source("say \"never\"\ntry\nsay 1\ncatch BogusError\nend_try\n");
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Generic);
    assert_eq!(err.origin.unwrap().line, 4);
    assert!(host.calls().is_empty());
}

#[test]
fn test_error_in_catch_body_propagates() {
    let (result, host) = run_source(
        "try\ntry\nsay 1 / 0\ncatch DataError\nsay undefined_name\nend_try\ncatch DataError\n\
         say \"rethrown\"\nend_try\n",
    );
    result.unwrap();
    assert_eq!(host.said(), vec!["rethrown"]);
}

#[test]
fn test_statements_after_failure_in_try_are_skipped() {
    let (result, host) = run_source(
        "try\nsay \"one\"\nsay 1 / 0\nsay \"two\"\ncatch\nsay \"caught\"\nend_try\n\
         say \"three\"\n",
    );
    result.unwrap();
    assert_eq!(host.said(), vec!["one", "caught", "three"]);
}

#[test]
fn test_break_inside_try_inside_loop_still_breaks() {
    let (result, host) = run_source(
        "repeat 3\ntry\nsay \"x\"\nbreak\ncatch\nsay \"no\"\nend_try\nend_repeat\n",
    );
    result.unwrap();
    assert_eq!(host.said(), vec!["x"]);
}

#[test]
fn test_return_passes_through_loops_and_try() {
    let (result, host) = run_source(
        "function first_even\nfor_each n in 1, 3, 4, 5\ntry\nif n % 2 == 0\nreturn n\nend_if\n\
         catch\nend_try\nend_for\nreturn -1\nend_function\nsay first_even()\n",
    );
    result.unwrap();
    assert_eq!(host.said(), vec!["4"]);
}

#[test]
fn test_error_in_function_reports_innermost_line() {
    let (result, _) = run_source(
        "function inner\nsay 10 / 0\nend_function\nfunction outer\ninner()\nend_function\n\
         outer()\n",
    );
    let err = result.unwrap_err();
    let origin = err.origin.clone().unwrap();
    assert_eq!(origin.line, 2);
    assert_eq!(origin.text, "say 10 / 0");
    assert_eq!(
        err.report(),
        "DoScript Error: Division by zero\n  --> test.do:2\n   | say 10 / 0"
    );
}

#[test]
fn test_mismatched_closer_names_both_lines() {
    let (result, _) = run_source("if true\nrepeat 2\nsay 1\nend_if\n");
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Generic);
    assert!(err.message.contains("line 4"));
    assert!(err.message.contains("line 2"));
}

#[test]
fn test_missing_closer_names_the_opener() {
    let (result, _) = run_source("say 1\nloop forever\nsay 2\n");
    let err = result.unwrap_err();
    assert!(err.message.contains("line 2"));
    assert!(err.message.contains("end_loop"));
    assert_eq!(err.origin.unwrap().line, 2);
}

#[test]
fn test_extra_closer_is_rejected() {
    let (result, _) = run_source("say 1\nend_for\n");
    let err = result.unwrap_err();
    assert!(err.message.contains("no matching opening block"));
}

#[test]
fn test_if_ends_with_outside_for_each_is_rejected_before_running() {
    let (result, host) = run_source("say \"never\"\nif_ends_with \".txt\"\nsay 1\nend_if\n");
    let err = result.unwrap_err();
    assert!(err.message.contains("for_each"));
    assert!(host.calls().is_empty());
}

#[test]
fn test_unterminated_string_reports_opening_line() {
    let (result, _) = run_source("say 1\nsay \"oops\n");
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Generic);
    assert!(err.message.contains("line 2"));
}

#[test]
fn test_builtin_arity_is_checked() {
    let (result, _) = run_source("say length(\"a\", \"b\")\n");
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Generic);
    assert!(err.message.contains("'length' expects"));
}
