//! Integration tests for TIR (Test IR) parsing and printing.

use inputdep::core::IrAdaptor;
use inputdep::test_ir::{Operation, TestIR, TestIRAdaptor, ValueType};

/// Helper to check if output contains expected patterns
fn check_output_contains(output: &str, patterns: &[&str]) {
    for pattern in patterns {
        assert!(
            output.contains(pattern),
            "Output missing expected pattern: '{pattern}'\nFull output:\n{output}"
        );
    }
}

#[test]
fn test_add_tir() {
    let ir = TestIR::parse(
        r#"
func() {
entry:
  %a =
  %b =
  %c = add %a, %b
  terminate
}
"#,
    )
    .unwrap();
    let output = ir.print();

    check_output_contains(
        &output,
        &["Printing IR", "Function func", "Block entry", "Value a (any)", "Value c (add)", "Op a", "Op b", "Value (terminate)"],
    );

    assert_eq!(ir.functions.len(), 1);
    assert_eq!(ir.blocks.len(), 1);
    assert_eq!(ir.values.len(), 4);
}

#[test]
fn test_opaque_value_operands() {
    let ir = TestIR::parse(
        r#"
f(%p, %q) {
entry:
  %mix = %p, %q
  ret %mix
}
"#,
    )
    .unwrap();
    let mix = &ir.values[2];
    assert_eq!(mix.op, Operation::Any);
    assert_eq!(mix.op_count, 2);
}

#[test]
fn test_memory_and_calls() {
    let ir = TestIR::parse(
        r#"
@counter = global
read(%buf)!
main(%argc) {
entry:
  %slot = alloca 8, 8
  %r = call @read, %slot
  %c = load @counter
  %e = gep %slot, %c, %argc
  store %r, %e
  call @read, @counter
  ret
}
"#,
    )
    .unwrap();
    let adaptor = TestIRAdaptor::new(&ir);
    let main = adaptor.func("main").unwrap();
    let read = adaptor.func("read").unwrap();
    assert!(adaptor.func_is_declaration(read));
    assert!(adaptor.entry_block(read).is_none());

    let r = adaptor.inst(main, "r").unwrap();
    assert_eq!(adaptor.inst_callee(r), Some(read));
    let e = adaptor.inst(main, "e").unwrap();
    assert_eq!(adaptor.inst_operands(e).count(), 3);

    let globals: Vec<_> = adaptor.globals().collect();
    assert_eq!(globals, vec![adaptor.global("counter").unwrap()]);
    assert_eq!(ir.values[globals[0].0 as usize].value_type, ValueType::Global);
    check_output_contains(&ir.print(), &["Global counter", "Target read", "Op @counter"]);
}

#[test]
fn test_parse_failures() {
    let cases = [
        ("undefined value", "f() {\nentry:\n  ret %nope\n}\n"),
        ("undefined block", "f() {\nentry:\n  br ^nowhere\n}\n"),
        ("undefined global", "f() {\nentry:\n  %v = load @g\n  ret %v\n}\n"),
        ("undefined callee", "f() {\nentry:\n  call @g\n  ret\n}\n"),
        ("duplicate value", "f() {\nentry:\n  %a = const 1\n  %a = const 2\n  ret\n}\n"),
        ("store has no result", "f(%x) {\nentry:\n  %s = store %x, %x\n  ret\n}\n"),
        ("unknown operation", "f() {\nentry:\n  %a = frobnicate\n  ret\n}\n"),
    ];
    for (what, text) in cases {
        assert!(TestIR::parse(text).is_err(), "{} should not parse", what);
    }
}
