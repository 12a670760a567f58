//! Integration tests for the input-dependency analysis.
//!
//! Each test parses a small TIR program, runs the analysis through the
//! public API and inspects the facts by value name.

use inputdep::analysis::report::format_dep;
use inputdep::analysis::{
    AliasOracle, AnalysisContext, ConservativeAliasOracle, FunctionAnalysis, FunctionAnalysisResult,
    ModuleAnalysis, NonDeterministicBlocks,
};
use inputdep::core::{AliasError, AnalysisConfig, AnalysisError, InputScope};
use inputdep::test_ir::adaptor::ValueRef;
use inputdep::test_ir::{SyntacticAliasOracle, TestIR, TestIRAdaptor};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Analyse `func` of `text` and hand the result to `check`.
fn analyze<R>(
    text: &str,
    func: &str,
    config: &AnalysisConfig,
    check: impl for<'ir> FnOnce(&TestIRAdaptor<'ir>, &FunctionAnalysisResult<TestIRAdaptor<'ir>>) -> R,
) -> R {
    init_logging();
    let ir = TestIR::parse(text).unwrap();
    let adaptor = TestIRAdaptor::new(&ir);
    let oracle = SyntacticAliasOracle::new(adaptor);
    let f = adaptor.func(func).unwrap();
    let result = FunctionAnalysis::new(&adaptor, &oracle, config).run(f).unwrap();
    check(&adaptor, &result)
}

/// Formatted fact of the instruction defining `name`.
fn dep(adaptor: &TestIRAdaptor<'_>, result: &FunctionAnalysisResult<TestIRAdaptor<'_>>, name: &str) -> String {
    let inst = adaptor.inst(result.func(), name).unwrap();
    format_dep(adaptor, result.instruction_dep(inst).unwrap())
}

/// Formatted fact of the terminator of `block`.
fn term_dep(adaptor: &TestIRAdaptor<'_>, result: &FunctionAnalysisResult<TestIRAdaptor<'_>>, block: &str) -> String {
    let block = adaptor.block(result.func(), block).unwrap();
    let inst = adaptor.terminator(block).unwrap();
    format_dep(adaptor, result.instruction_dep(inst).unwrap())
}

fn block_names(adaptor: &TestIRAdaptor<'_>, blocks: &[inputdep::test_ir::adaptor::BlockRef]) -> Vec<String> {
    use inputdep::core::IrAdaptor;
    blocks.iter().map(|&b| adaptor.block_name(b).to_string()).collect()
}

const BRANCH: &str = r#"
main(%x, %y) {
entry:
  %one = const 1
  %a = add %x, %one
  %b = mul %one, %one
  %c = cmp %a, %b
  condbr %c, ^t, ^f
t:
  ret %a
f:
  ret %b
}
"#;

#[test]
fn test_single_block_dependencies() {
    analyze(BRANCH, "main", &AnalysisConfig::default(), |adaptor, result| {
        assert_eq!(dep(adaptor, result, "a"), "dependent [%x]");
        assert_eq!(dep(adaptor, result, "b"), "independent");
        assert_eq!(dep(adaptor, result, "c"), "dependent [%x]");
        assert_eq!(term_dep(adaptor, result, "entry"), "dependent [%x]");
        assert_eq!(term_dep(adaptor, result, "f"), "independent");
        assert_eq!(format_dep(adaptor, result.return_dep().unwrap()), "dependent [%x]");

        let c = adaptor.inst(result.func(), "c").unwrap();
        assert!(result.is_input_dependent(c));
        let b = adaptor.inst(result.func(), "b").unwrap();
        assert!(!result.is_input_dependent(b));
    });
}

#[test]
fn test_non_entry_function_is_independent() {
    let text = r#"
main() {
entry:
  ret
}
helper(%a) {
entry:
  %b = add %a, %a
  ret %b
}
"#;
    analyze(text, "helper", &AnalysisConfig::default(), |adaptor, result| {
        assert_eq!(dep(adaptor, result, "b"), "independent");
        assert!(result.dependent_instructions().is_empty());
    });

    let config = AnalysisConfig::default().with_scope(InputScope::AllArguments);
    analyze(text, "helper", &config, |adaptor, result| {
        assert_eq!(dep(adaptor, result, "b"), "dependent [%a]");
    });
}

#[test]
fn test_store_then_load() {
    let text = r#"
main(%x) {
entry:
  %s = alloca 8, 8
  %zero = const 0
  store %zero, %s
  %v0 = load %s
  store %x, %s
  %v1 = load %s
  ret %v0
}
"#;
    analyze(text, "main", &AnalysisConfig::default(), |adaptor, result| {
        assert_eq!(dep(adaptor, result, "v0"), "independent");
        assert_eq!(dep(adaptor, result, "v1"), "dependent [%x]");
        assert_eq!(format_dep(adaptor, result.return_dep().unwrap()), "independent");

        let entry = adaptor.block(result.func(), "entry").unwrap();
        let s = adaptor.value(result.func(), "s").unwrap();
        let slot = result.value_dep_at_exit(entry, s).unwrap();
        assert_eq!(format_dep(adaptor, slot), "dependent [%x]");
    });
}

#[test]
fn test_stored_input_survives_intervening_block() {
    let text = r#"
main(%x) {
entry:
  %s = alloca 8, 8
  store %x, %s
  br ^mid
mid:
  br ^tail
tail:
  %v = load %s
  ret %v
}
"#;
    analyze(text, "main", &AnalysisConfig::default(), |adaptor, result| {
        assert_eq!(dep(adaptor, result, "v"), "dependent [%x]");
        let mid = adaptor.block(result.func(), "mid").unwrap();
        let s = adaptor.value(result.func(), "s").unwrap();
        assert_eq!(format_dep(adaptor, result.value_dep_at_exit(mid, s).unwrap()), "dependent [%x]");
    });
}

#[test]
fn test_element_store_keeps_previous_content() {
    let text = r#"
main(%x) {
entry:
  %s = alloca 16, 8
  %seven = const 7
  store %x, %s
  %zero = const 0
  %e = gep %s, %zero
  store %seven, %e
  %v = load %s
  ret %v
}
"#;
    analyze(text, "main", &AnalysisConfig::default(), |adaptor, result| {
        // A store through an element address only adds to the slot state.
        assert_eq!(dep(adaptor, result, "v"), "dependent [%x]");
    });
}

const LOOP: &str = r#"
main(%n) {
entry:
  %s = alloca 8, 8
  %zero = const 0
  store %zero, %s
  br ^header
header:
  %i = phi [^entry, %zero], [^latch, %next]
  %v = load %s
  %c = cmp %i, %zero
  condbr %c, ^latch, ^exit
latch:
  store %n, %s
  %next = add %i, %n
  br ^header
exit:
  ret %v
}
"#;

#[test]
fn test_loop_back_edge_is_reflected() {
    analyze(LOOP, "main", &AnalysisConfig::default(), |adaptor, result| {
        // Only the back edge carries input into the header.
        assert_eq!(dep(adaptor, result, "i"), "dependent [%n]");
        assert_eq!(dep(adaptor, result, "v"), "dependent [%n]");
        assert_eq!(dep(adaptor, result, "c"), "dependent [%n]");
        assert_eq!(dep(adaptor, result, "next"), "dependent [%n]");
        assert_eq!(term_dep(adaptor, result, "header"), "dependent [%n]");
        assert_eq!(format_dep(adaptor, result.return_dep().unwrap()), "dependent [%n]");

        let nondet = NonDeterministicBlocks::analyze(adaptor, result);
        assert_eq!(block_names(adaptor, nondet.blocks()), vec!["header", "exit", "latch"]);
        let entry = adaptor.block(result.func(), "entry").unwrap();
        assert!(!nondet.is_non_deterministic(entry));
    });
}

#[test]
fn test_loop_without_input_stays_independent() {
    let text = r#"
main(%n) {
entry:
  %zero = const 0
  %one = const 1
  br ^header
header:
  %i = phi [^entry, %zero], [^header, %next]
  %next = add %i, %one
  %c = cmp %next, %one
  condbr %c, ^header, ^exit
exit:
  ret %i
}
"#;
    analyze(text, "main", &AnalysisConfig::default(), |adaptor, result| {
        assert_eq!(dep(adaptor, result, "i"), "independent");
        assert_eq!(dep(adaptor, result, "next"), "independent");
        assert!(result.dependent_instructions().is_empty());
        assert!(NonDeterministicBlocks::analyze(adaptor, result).is_empty());
    });
}

#[test]
fn test_merge_point_joins_all_predecessors() {
    let text = r#"
main(%x) {
entry:
  %s = alloca 8, 8
  %zero = const 0
  store %zero, %s
  %c = cmp %zero, %zero
  condbr %c, ^l, ^r
l:
  br ^join
r:
  store %x, %s
  br ^join
join:
  %v = load %s
  ret %v
}
"#;
    analyze(text, "main", &AnalysisConfig::default(), |adaptor, result| {
        // Branch not input dependent, but one path stores the input.
        assert_eq!(term_dep(adaptor, result, "entry"), "independent");
        assert_eq!(dep(adaptor, result, "v"), "dependent [%x]");
        assert!(NonDeterministicBlocks::analyze(adaptor, result).is_empty());
    });
}

#[test]
fn test_out_and_call_arguments() {
    let text = r#"
fill(%buf, %v) {
entry:
  store %v, %buf
  ret
}
main(%x) {
entry:
  %s = alloca 8, 8
  call @fill, %s, %x
  ret
}
"#;
    init_logging();
    let ir = TestIR::parse(text).unwrap();
    let adaptor = TestIRAdaptor::new(&ir);
    let oracle = SyntacticAliasOracle::new(adaptor);
    let main = adaptor.func("main").unwrap();
    let fill = adaptor.func("fill").unwrap();
    let buf = adaptor.value(fill, "buf").unwrap();

    let config = AnalysisConfig::default();
    let module = ModuleAnalysis::new(&adaptor, &oracle, &config).run().unwrap();
    assert!(module.is_complete());
    assert_eq!(module.rounds(), 1);

    let main_result = module.function(main).unwrap().as_ref().unwrap();
    assert_eq!(format_dep(&adaptor, main_result.call_arg_dep(fill, 0).unwrap()), "independent");
    assert_eq!(format_dep(&adaptor, main_result.call_arg_dep(fill, 1).unwrap()), "dependent [%x]");
    assert!(main_result.return_dep().is_none());

    // Without interprocedural inputs the callee writes an independent value.
    let fill_result = module.function(fill).unwrap().as_ref().unwrap();
    assert_eq!(format_dep(&adaptor, fill_result.out_arg_dep(buf).unwrap()), "independent");

    let config = AnalysisConfig::default().with_scope(InputScope::Interprocedural);
    let module = ModuleAnalysis::new(&adaptor, &oracle, &config).run().unwrap();
    assert_eq!(module.rounds(), 2);
    let fill_result = module.function(fill).unwrap().as_ref().unwrap();
    let v = adaptor.value(fill, "v").unwrap();
    assert!(fill_result.inputs().contains(&v));
    assert_eq!(format_dep(&adaptor, fill_result.out_arg_dep(buf).unwrap()), "dependent [%v]");
}

const READ: &str = r#"
read(%buf)!
main() {
entry:
  %s = alloca 8, 8
  %n = call @read, %s
  %v = load %s
  %c = cmp %v, %v
  condbr %c, ^a, ^b
a:
  ret
b:
  ret
}
"#;

#[test]
fn test_input_function_taints_buffer() {
    let config = AnalysisConfig::default().with_input_function("read");
    analyze(READ, "main", &config, |adaptor, result| {
        assert_eq!(dep(adaptor, result, "n"), "dependent [%n]");
        assert_eq!(dep(adaptor, result, "v"), "dependent [%n]");
        assert_eq!(term_dep(adaptor, result, "entry"), "dependent [%n]");
    });

    analyze(READ, "main", &AnalysisConfig::default(), |adaptor, result| {
        assert_eq!(dep(adaptor, result, "n"), "independent");
        assert_eq!(dep(adaptor, result, "v"), "independent");
        assert!(result.dependent_instructions().is_empty());
    });
}

#[test]
fn test_input_global() {
    let text = r#"
@env = global
main() {
entry:
  %v = load @env
  ret %v
}
"#;
    let config = AnalysisConfig::default().with_input_global("env");
    analyze(text, "main", &config, |adaptor, result| {
        assert_eq!(dep(adaptor, result, "v"), "dependent [@env]");
    });
    analyze(text, "main", &AnalysisConfig::default(), |adaptor, result| {
        assert_eq!(dep(adaptor, result, "v"), "independent");
    });
}

#[test]
fn test_load_through_parameter_depends_on_pointer() {
    let text = r#"
main(%p) {
entry:
  %v = load %p
  ret %v
}
"#;
    analyze(text, "main", &AnalysisConfig::default(), |adaptor, result| {
        assert_eq!(dep(adaptor, result, "v"), "dependent [%p]");
    });
}

#[test]
fn test_traversal_order_error() {
    init_logging();
    let text = r#"
main(%x) {
entry:
  condbr %x, ^a, ^b
a:
  %y = add %x, %x
  br ^b
b:
  %z = add %y, %x
  ret %z
}
"#;
    let ir = TestIR::parse(text).unwrap();
    let adaptor = TestIRAdaptor::new(&ir);
    let oracle = SyntacticAliasOracle::new(adaptor);
    let config = AnalysisConfig::default();
    let main = adaptor.func("main").unwrap();
    let err = FunctionAnalysis::new(&adaptor, &oracle, &config).run(main).err().unwrap();
    assert_eq!(err, AnalysisError::TraversalOrder { value: "%y".to_string(), block: "b".to_string() });
}

#[test]
fn test_declaration_has_no_entry() {
    init_logging();
    let ir = TestIR::parse("ext(%a)!\nmain() {\nentry:\n  ret\n}\n").unwrap();
    let adaptor = TestIRAdaptor::new(&ir);
    let oracle = SyntacticAliasOracle::new(adaptor);
    let config = AnalysisConfig::default();
    let ext = adaptor.func("ext").unwrap();
    let err = FunctionAnalysis::new(&adaptor, &oracle, &config).run(ext).err().unwrap();
    assert!(matches!(err, AnalysisError::MissingEntry { function } if function == "ext"));
}

struct BrokenOracle;

impl AliasOracle<ValueRef> for BrokenOracle {
    fn may_alias(&self, _a: ValueRef, _b: ValueRef) -> Result<bool, AliasError> {
        Err(AliasError::QueryFailed { reason: "no alias information".to_string() })
    }
}

#[test]
fn test_failed_alias_query_is_conservative() {
    init_logging();
    let text = r#"
g(%p, %q) {
entry:
  %r = add %q, %q
  ret %r
}
"#;
    let ir = TestIR::parse(text).unwrap();
    let adaptor = TestIRAdaptor::new(&ir);
    let config = AnalysisConfig::default();
    let g = adaptor.func("g").unwrap();
    let p = adaptor.value(g, "p").unwrap();
    let ctx = AnalysisContext::new(&adaptor, g).with_inputs([p]);
    let r = adaptor.inst(g, "r").unwrap();

    let precise = SyntacticAliasOracle::new(adaptor);
    let result = FunctionAnalysis::new(&adaptor, &precise, &config).run_in_context(&ctx).unwrap();
    assert_eq!(format_dep(&adaptor, result.instruction_dep(r).unwrap()), "independent");

    let result = FunctionAnalysis::new(&adaptor, &BrokenOracle, &config).run_in_context(&ctx).unwrap();
    assert_eq!(format_dep(&adaptor, result.instruction_dep(r).unwrap()), "dependent [%p]");

    let result = FunctionAnalysis::new(&adaptor, &ConservativeAliasOracle, &config)
        .run_in_context(&ctx)
        .unwrap();
    assert_eq!(format_dep(&adaptor, result.instruction_dep(r).unwrap()), "dependent [%p]");
}

#[test]
fn test_unreachable_block_has_no_facts() {
    let text = r#"
main(%x) {
entry:
  ret %x
dead:
  %y = add %x, %x
  ret %y
}
"#;
    analyze(text, "main", &AnalysisConfig::default(), |adaptor, result| {
        let y = adaptor.inst(result.func(), "y").unwrap();
        assert!(result.instruction_dep(y).is_none());
        assert!(!result.is_input_dependent(y));
        assert_eq!(result.order().len(), 1);
    });
}

#[test]
fn test_module_isolates_failures() {
    init_logging();
    let text = r#"
main(%x) {
entry:
  %y = add %x, %x
  ret %y
}
broken(%x) {
entry:
  condbr %x, ^a, ^b
a:
  %y = add %x, %x
  br ^b
b:
  %z = add %y, %x
  ret %z
}
"#;
    let ir = TestIR::parse(text).unwrap();
    let adaptor = TestIRAdaptor::new(&ir);
    let oracle = SyntacticAliasOracle::new(adaptor);
    let config = AnalysisConfig::default();
    let module = ModuleAnalysis::new(&adaptor, &oracle, &config).run().unwrap();

    assert!(!module.is_complete());
    let failed: Vec<_> = module.failures().map(|(f, _)| f).collect();
    assert_eq!(failed, vec![adaptor.func("broken").unwrap()]);
    let main = adaptor.func("main").unwrap();
    let main_result = module.function(main).unwrap().as_ref().unwrap();
    let y = adaptor.inst(main, "y").unwrap();
    assert!(main_result.is_input_dependent(y));
}

#[test]
fn test_parallel_matches_sequential() {
    init_logging();
    let text = r#"
read(%buf)!
main(%x) {
entry:
  %s = alloca 8, 8
  %r = call @read, %s
  %v = load %s
  %c = cmp %v, %x
  condbr %c, ^a, ^b
a:
  %t = call @work, %v
  ret %t
b:
  ret %x
}
work(%w) {
entry:
  %zero = const 0
  br ^loop
loop:
  %i = phi [^entry, %zero], [^loop, %n]
  %n = add %i, %w
  %d = cmp %n, %w
  condbr %d, ^loop, ^out
out:
  ret %n
}
"#;
    let ir = TestIR::parse(text).unwrap();
    let adaptor = TestIRAdaptor::new(&ir);
    let oracle = SyntacticAliasOracle::new(adaptor);
    let base = AnalysisConfig::default()
        .with_scope(InputScope::Interprocedural)
        .with_input_function("read");

    let parallel = ModuleAnalysis::new(&adaptor, &oracle, &base).run().unwrap();
    let sequential_config = base.clone().with_parallel(false);
    let sequential = ModuleAnalysis::new(&adaptor, &oracle, &sequential_config).run().unwrap();

    let facts = |module: &inputdep::analysis::ModuleAnalysisResult<TestIRAdaptor<'_>>| {
        module
            .results()
            .map(|(f, r)| {
                let deps: Vec<_> = r
                    .dependent_instructions()
                    .into_iter()
                    .map(|i| (i, format_dep(&adaptor, r.instruction_dep(i).unwrap())))
                    .collect();
                (f, deps)
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(facts(&parallel), facts(&sequential));
    assert_eq!(parallel.rounds(), sequential.rounds());

    let work = adaptor.func("work").unwrap();
    let work_result = parallel.function(work).unwrap().as_ref().unwrap();
    let n = adaptor.inst(work, "n").unwrap();
    assert_eq!(format_dep(&adaptor, work_result.instruction_dep(n).unwrap()), "dependent [%w]");
}

#[test]
fn test_fixpoint_limit() {
    init_logging();
    let config = AnalysisConfig { max_fixpoint_rounds: 0, ..AnalysisConfig::default() };
    let ir = TestIR::parse(LOOP).unwrap();
    let adaptor = TestIRAdaptor::new(&ir);
    let oracle = SyntacticAliasOracle::new(adaptor);
    let main = adaptor.func("main").unwrap();
    let err = FunctionAnalysis::new(&adaptor, &oracle, &config).run(main).err().unwrap();
    assert!(matches!(err, AnalysisError::FixpointDiverged { .. }));

    // The module driver rejects the configuration up front.
    assert!(ModuleAnalysis::new(&adaptor, &oracle, &config).run().is_err());
}

#[test]
fn test_unknown_entry_function_fails_module() {
    init_logging();
    let ir = TestIR::parse(BRANCH).unwrap();
    let adaptor = TestIRAdaptor::new(&ir);
    let oracle = SyntacticAliasOracle::new(adaptor);
    let config = AnalysisConfig::default().with_entry("nosuch");
    let err = ModuleAnalysis::new(&adaptor, &oracle, &config).run().err().unwrap();
    assert_eq!(err, AnalysisError::UnknownFunction { name: "nosuch".to_string() });
}
