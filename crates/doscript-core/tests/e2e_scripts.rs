//! End-to-end tests: source text in, host calls out.

mod common;

use common::run_source;
use doscript_core::engine::{Outcome, RunOptions};
use doscript_core::error::ErrorKind;
use doscript_core::host::CallForm;
use doscript_core::value::Value;

fn said(source: &str) -> Vec<String> {
    let (result, host) = run_source(source);
    result.unwrap();
    host.said()
}

#[test]
fn test_repeat_with_global_count_says_twice() {
    let (result, host) = run_source("global_variable = n\nn = 2\nrepeat n\nsay \"hi\"\nend_repeat");
    assert_eq!(result.unwrap(), Outcome::Completed);
    assert_eq!(host.said(), vec!["hi", "hi"]);
    assert!(host.calls().iter().all(|c| c.name == "say"));
}

#[test]
fn test_for_each_literal_list_binds_in_order() {
    assert_eq!(said("for_each f in \"a\", \"b\", \"c\"\nsay f\nend_for"), vec!["a", "b", "c"]);
}

#[test]
fn test_global_value_visible_to_later_statements() {
    let out = said("global_variable = x\nx = 5\nif x == 5\nsay x\nend_if\nsay x * 2");
    assert_eq!(out, vec!["5", "10"]);
}

#[test]
fn test_declared_but_unset_differs_from_undeclared() {
    let (result, _) = run_source("global_variable = x\nsay x");
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Data);
    assert!(err.message.contains("declared but has no value"));

    let (result, _) = run_source("say x");
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Data);
    assert!(err.message.contains("not declared"));
}

#[test]
fn test_undeclared_assignment_fails_without_mutation() {
    let (mut interp, _) = common::interpreter(RunOptions::default());
    let err = interp
        .run_source("z = 1", std::path::Path::new("t.do"))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Generic);
    assert!(!interp.scope().is_declared("z"));

    // The same inside a function: no local, no global.
    let (result, _) = run_source("function f\nq = 3\nend_function\nf()");
    assert_eq!(result.unwrap_err().kind, ErrorKind::Generic);
}

#[test]
fn test_single_quotes_interpolate_double_quotes_do_not() {
    let out = said("global_variable = x\nx = \"hello {world} #1\"\nsay '{x}'\nsay \"{x}\"");
    assert_eq!(out, vec!["hello {world} #1", "{x}"]);
}

#[test]
fn test_interpolation_escapes_braces() {
    let out = said("global_variable = n\nn = 3\nsay 'n=\\{n\\} is {n}'");
    assert_eq!(out, vec!["n={n} is 3"]);
}

#[test]
fn test_interpolating_undeclared_name_is_data_error() {
    let (result, _) = run_source("say 'hi {nobody}'");
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Data);
    assert!(err.message.contains("nobody"));
}

#[test]
fn test_comments_are_stripped_outside_quotes() {
    let out = said(
        "# heading\nsay \"a # not a comment\" # trailing\n// slashes\nsay 'b // kept' // gone",
    );
    assert_eq!(out, vec!["a # not a comment", "b // kept"]);
}

#[test]
fn test_repeat_zero_and_negative_do_nothing() {
    assert!(said("repeat 0\nsay 1\nend_repeat\nrepeat -1\nsay 2\nend_repeat").is_empty());
}

#[test]
fn test_break_stops_for_each_and_continue_skips_rest() {
    let out = said(
        "for_each f in \"a\", \"b\", \"c\", \"d\"\n\
         if f == \"b\"\ncontinue\nend_if\n\
         say f\n\
         if f == \"c\"\nbreak\nend_if\n\
         end_for\nsay \"done\"",
    );
    assert_eq!(out, vec!["a", "c", "done"]);
}

#[test]
fn test_function_frames_are_isolated() {
    let (result, host) = run_source(
        "function g\nsay y\nend_function\n\
         function f\nlocal_variable = y\ny = 1\ng()\nend_function\n\
         try\nf()\ncatch DataError\nsay \"isolated\"\nend_try",
    );
    result.unwrap();
    assert_eq!(host.said(), vec!["isolated"]);
}

#[test]
fn test_globals_and_parameters_reach_callees() {
    let out = said(
        "global_variable = y\ny = \"g\"\n\
         function g p\nsay y\nsay p\nend_function\n\
         function f\ng(\"param\")\nend_function\nf()",
    );
    assert_eq!(out, vec!["g", "param"]);
}

#[test]
fn test_local_shadows_global_inside_function_only() {
    let out = said(
        "global_variable = v\nv = \"outer\"\n\
         function f\nlocal_variable = v\nv = \"inner\"\nsay v\nend_function\n\
         f()\nsay v",
    );
    assert_eq!(out, vec!["inner", "outer"]);
}

#[test]
fn test_macro_writes_are_visible_to_caller() {
    let out = said(
        "global_variable = status\n\
         make a_command mark\nstatus = \"marked\"\nend_command\n\
         run \"mark\"\nsay status",
    );
    assert_eq!(out, vec!["marked"]);
}

#[test]
fn test_deprecated_macro_spelling_still_works() {
    let out =
        said("make a command hello\nsay \"hello\"\nend_command\nrun \"hello\"\nrun \"hello\"");
    assert_eq!(out, vec!["hello", "hello"]);
}

#[test]
fn test_run_of_unknown_name_goes_to_host() {
    let (result, host) = run_source(
        "global_variable = code\nrun \"make all\"\ncode = run \"make test\"\nsay code",
    );
    result.unwrap();
    let runs: Vec<_> = host.calls().into_iter().filter(|c| c.name == "run").collect();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].form, CallForm::Statement);
    assert_eq!(runs[1].form, CallForm::Captured);
    assert_eq!(runs[1].args, vec!["make test"]);
    assert_eq!(host.said(), vec!["0"]);
}

#[test]
fn test_capture_assigns_host_output() {
    let (mut interp, host) = common::interpreter(RunOptions::default());
    host.reply("capture", "v1.2.3");
    interp
        .run_source(
            "global_variable = v\nv = capture \"git describe\"\nsay 'version {v}'",
            std::path::Path::new("t.do"),
        )
        .unwrap();
    assert_eq!(host.said(), vec!["version v1.2.3"]);
}

#[test]
fn test_ask_declares_its_target() {
    let (mut interp, host) = common::interpreter(RunOptions::default());
    host.reply("ask", "Ada");
    interp
        .run_source("ask name \"Who are you?\"\nsay 'hello {name}'", std::path::Path::new("t.do"))
        .unwrap();
    assert_eq!(host.args_of("ask"), vec!["Who are you?"]);
    assert_eq!(host.said(), vec!["hello Ada"]);
}

#[test]
fn test_command_arguments_are_evaluated() {
    let (result, host) = run_source(
        "global_variable = dir\ndir = \"out\"\nmake folder dir\n\
         make file 'out/{dir}.txt' with \"data\"\ncopy \"a\" to \"b\"",
    );
    result.unwrap();
    let calls = host.calls();
    assert_eq!(calls[0].name, "make_folder");
    assert_eq!(calls[0].args, vec!["out"]);
    assert_eq!(calls[1].name, "make_file");
    assert_eq!(calls[1].args, vec!["out/out.txt", "data"]);
    assert_eq!(calls[2].name, "copy");
    assert_eq!(calls[2].args, vec!["a", "b"]);
}

#[test]
fn test_dry_run_flag_reaches_only_mutating_builtins() {
    let options = RunOptions {
        dry_run: true,
        ..RunOptions::default()
    };
    let (mut interp, host) = common::interpreter(options);
    interp
        .run_source(
            "say \"x\"\ndelete \"tmp\"\nrun \"ls\"\nping \"example.com\"",
            std::path::Path::new("t.do"),
        )
        .unwrap();
    let flags: Vec<(String, bool)> =
        host.calls().into_iter().map(|c| (c.name, c.dry_run)).collect();
    assert_eq!(
        flags,
        vec![
            ("say".to_string(), false),
            ("delete".to_string(), true),
            ("run".to_string(), true),
            ("ping".to_string(), false),
        ]
    );
}

#[test]
fn test_predicate_sugar_matches_explicit_call() {
    let out = said(
        "global_variable = f\nf = \"report.txt\"\n\
         if ends_with f \".txt\"\nsay \"sugar\"\nend_if\n\
         if endswith(f, \".txt\")\nsay \"call\"\nend_if\n\
         if starts_with f \"rep\"\nsay \"prefix\"\nend_if\n\
         if contains f \"port\"\nsay \"inside\"\nend_if",
    );
    assert_eq!(out, vec!["sugar", "call", "prefix", "inside"]);
}

#[test]
fn test_builtin_functions_compose() {
    let out = said(
        "global_variable = parts\n\
         parts = split(\"a,b,c\", \",\")\n\
         say length(parts)\n\
         say join(parts, \"-\")\n\
         say uppercase(substring(\"doscript\", 0, 2))\n\
         say int(\"41\") + 1\n\
         say str(1.5) + \"!\"\n\
         say replace(\"a.b.c\", \".\", \"/\")\n\
         say extension(\"archive.tar.gz\")",
    );
    assert_eq!(out, vec!["3", "a-b-c", "DO", "42", "1.5!", "a/b/c", ".gz"]);
}

#[test]
fn test_string_plus_number_is_data_error() {
    let (result, _) = run_source("say \"n=\" + 1");
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Data);
    assert!(err.message.contains("str()"));
}

#[test]
fn test_mismatched_comparison_is_data_error() {
    let (result, _) = run_source("if \"1\" == 1\nsay \"eq\"\nend_if");
    assert_eq!(result.unwrap_err().kind, ErrorKind::Data);
}

#[test]
fn test_exit_code_is_reported_and_stops_the_run() {
    let (result, host) = run_source("say \"before\"\nexit 3\nsay \"after\"");
    assert_eq!(result.unwrap(), Outcome::Exited(3));
    assert_eq!(host.said(), vec!["before"]);

    let (result, _) = run_source("exit");
    assert_eq!(result.unwrap(), Outcome::Exited(0));
}

#[test]
fn test_args_are_exposed_as_a_list() {
    let options = RunOptions {
        args: vec!["alpha".into(), "beta".into()],
        ..RunOptions::default()
    };
    let (mut interp, host) = common::interpreter(options);
    interp
        .run_source("for_each a in args\nsay a\nend_for", std::path::Path::new("t.do"))
        .unwrap();
    assert_eq!(host.said(), vec!["alpha", "beta"]);
    assert_eq!(
        interp.scope().global("args"),
        Some(&Value::List(vec![Value::from("alpha"), Value::from("beta")]))
    );
}

#[test]
fn test_independent_interpreters_do_not_share_state() {
    let (mut first, _) = common::interpreter(RunOptions::default());
    let (mut second, _) = common::interpreter(RunOptions::default());
    first
        .run_source(
            "global_variable = shared\nshared = 1\nfunction f\nend_function",
            std::path::Path::new("a.do"),
        )
        .unwrap();
    assert!(!second.scope().is_declared("shared"));
    assert!(!second.has_function("f"));
    let err = second.run_source("f()", std::path::Path::new("b.do")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Data);
}
