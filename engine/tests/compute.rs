// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::BTreeMap;

use engine::{
    compose, operation, AbortHandle, ComputeError, ComputeExt, Dependency, EngineConfig,
    ExecutionError, Method, Operation, OperationBuilder, OperationError, Outcome, PlanExt, Value,
};

fn int(i: i64) -> Value {
    Value::Int(i)
}

fn as_int(v: &Value) -> i64 {
    match v {
        Value::Int(i) => *i,
        other => panic!("expected an int, got {other:?}"),
    }
}

#[test]
fn simple_chain_computes_requested_output() {
    let _logger = env_logger::try_init();
    let a_to_b: Operation = operation(
        "a_to_b",
        [Dependency::required("a")],
        [Dependency::required("b")],
        |args| Ok(Outcome::Single(int(as_int(&args.positional()[0]) + 1))),
    )
    .unwrap();
    let b_to_c: Operation = operation(
        "b_to_c",
        [Dependency::required("b")],
        [Dependency::required("c")],
        |args| Ok(Outcome::Single(int(as_int(&args.positional()[0]) * 2))),
    )
    .unwrap();
    let net = compose("chain", vec![a_to_b, b_to_c], true).unwrap();

    let mut inputs = BTreeMap::new();
    inputs.insert("a".to_string(), int(1));
    let solution = net
        .compute(inputs, Some(&["c"]), None, &EngineConfig::default())
        .unwrap();

    assert_eq!(solution.get("c"), Some(&int(4)));
}

#[test]
fn optional_need_falls_back_when_absent() {
    let _logger = env_logger::try_init();
    let myadd = operation(
        "myadd",
        [Dependency::required("a"), Dependency::optional("b", None)],
        [Dependency::required("sum")],
        |args| {
            let a = as_int(&args.positional()[0]);
            let b = args.keyword("b").map(as_int).unwrap_or(0);
            Ok(Outcome::Single(int(a + b)))
        },
    )
    .unwrap();
    let net = compose("addnet", vec![myadd], true).unwrap();

    let mut without_b = BTreeMap::new();
    without_b.insert("a".to_string(), int(5));
    let solution = net
        .compute(without_b, None, None, &EngineConfig::default())
        .unwrap();
    assert_eq!(solution.get("sum"), Some(&int(5)));
    assert_eq!(solution.get("a"), Some(&int(5)));

    let mut with_b = BTreeMap::new();
    with_b.insert("a".to_string(), int(5));
    with_b.insert("b".to_string(), int(4));
    let solution = net
        .compute(with_b, Some(&["sum"]), None, &EngineConfig::default())
        .unwrap();
    assert_eq!(solution.get("sum"), Some(&int(9)));
    assert!(solution.plan().needs().contains("b"));
}

#[test]
fn varargs_are_flattened_and_reject_non_iterables() {
    let _logger = env_logger::try_init();
    let enlist = operation(
        "enlist",
        [Dependency::required("a"), Dependency::varargs("b")],
        [Dependency::required("sum")],
        |args| Ok(Outcome::Single(Value::List(args.positional().to_vec()))),
    )
    .unwrap();
    let net = compose("enlistnet", vec![enlist], true).unwrap();

    let mut inputs = BTreeMap::new();
    inputs.insert("a".to_string(), int(5));
    inputs.insert("b".to_string(), Value::List(vec![int(2), int(20)]));
    let solution = net
        .compute(inputs, Some(&["sum"]), None, &EngineConfig::default())
        .unwrap();
    assert_eq!(solution.get("sum"), Some(&Value::List(vec![int(5), int(2), int(20)])));

    let mut bad_inputs = BTreeMap::new();
    bad_inputs.insert("a".to_string(), int(5));
    bad_inputs.insert("b".to_string(), Value::Text("mistake".to_string()));
    let err = net
        .compute(bad_inputs, Some(&["sum"]), None, &EngineConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ComputeError::Execute(ExecutionError::NotIterable(_))
    ));
}

#[test]
fn side_effect_need_gates_execution() {
    let _logger = env_logger::try_init();
    let agg = operation(
        "agg",
        [Dependency::required("df"), Dependency::sideffect("df.b")],
        [Dependency::sideffect("df.sum")],
        |_args| Ok(Outcome::NoResult),
    )
    .unwrap();
    let net = compose("sidefx", vec![agg], true).unwrap();

    let mut without_gate = BTreeMap::new();
    without_gate.insert("df".to_string(), int(1));
    let solution = net
        .compute(without_gate, None, None, &EngineConfig::default())
        .unwrap();
    assert!(!solution.executed().contains(&"agg".to_string()));
    assert!(solution.get("df.sum").is_none());

    let mut with_gate = BTreeMap::new();
    with_gate.insert("df".to_string(), int(1));
    with_gate.insert("df.b".to_string(), int(0));
    let solution = net
        .compute(with_gate, None, None, &EngineConfig::default())
        .unwrap();
    assert!(solution.executed().contains(&"agg".to_string()));
    assert!(solution.get("df.sum").is_some());
}

#[test]
fn reschedule_cancels_only_the_unproduced_branch() {
    let _logger = env_logger::try_init();
    let producer = OperationBuilder::new("producer", |_args| {
        let mut produced = BTreeMap::new();
        produced.insert("x".to_string(), int(1));
        Ok(Outcome::Mapping(produced))
    })
    .needs([Dependency::required("seed")])
    .provides([Dependency::required("x"), Dependency::required("y")])
    .reschedule(true)
    .build()
    .unwrap();
    let use_x = operation(
        "use_x",
        [Dependency::required("x")],
        [Dependency::required("x_used")],
        |args| Ok(Outcome::Single(args.positional()[0].clone())),
    )
    .unwrap();
    let use_y = operation(
        "use_y",
        [Dependency::required("y")],
        [Dependency::required("y_used")],
        |args| Ok(Outcome::Single(args.positional()[0].clone())),
    )
    .unwrap();
    let net = compose("reschednet", vec![producer, use_x, use_y], true).unwrap();

    let mut inputs = BTreeMap::new();
    inputs.insert("seed".to_string(), int(0));
    let solution = net
        .compute(inputs, None, None, &EngineConfig::default())
        .unwrap();

    assert!(solution.rescheduled().contains(&"producer".to_string()));
    assert_eq!(solution.get("x_used"), Some(&int(1)));
    assert!(solution.cancelled().contains(&"use_y".to_string()));
}

#[test]
fn endured_failure_does_not_block_independent_branch() {
    let _logger = env_logger::try_init();
    let failing = OperationBuilder::new("A", |_args| Err(OperationError::from("boom")))
        .needs([Dependency::required("seed")])
        .provides([Dependency::required("a_out")])
        .endured(true)
        .build()
        .unwrap();
    let independent = operation(
        "B",
        [Dependency::required("seed")],
        [Dependency::required("b_out")],
        |args| Ok(Outcome::Single(args.positional()[0].clone())),
    )
    .unwrap();
    let net = compose("endurenet", vec![failing, independent], true).unwrap();

    let mut inputs = BTreeMap::new();
    inputs.insert("seed".to_string(), int(7));
    let solution = net
        .compute(inputs, None, None, &EngineConfig::default())
        .unwrap();

    assert!(solution.failed().iter().any(|(name, _)| name.as_str() == "A"));
    assert_eq!(solution.get("b_out"), Some(&int(7)));
}

#[test]
fn mapped_need_is_passed_by_keyword_and_still_gates() {
    let _logger = env_logger::try_init();
    let rename = operation(
        "rename",
        [Dependency::mapped("raw_count", "count")],
        [Dependency::required("doubled")],
        |args| {
            let count = args.keyword("count").map(as_int).unwrap_or(0);
            Ok(Outcome::Single(int(count * 2)))
        },
    )
    .unwrap();
    let net = compose("mapnet", vec![rename], true).unwrap();

    let mut inputs = BTreeMap::new();
    inputs.insert("raw_count".to_string(), int(3));
    let solution = net
        .compute(inputs, Some(&["doubled"]), None, &EngineConfig::default())
        .unwrap();
    assert_eq!(solution.get("doubled"), Some(&int(6)));
}

#[test]
fn parallel_method_respects_configured_pool_size() {
    let _logger = env_logger::try_init();
    let a = operation(
        "a",
        [Dependency::required("x")],
        [Dependency::required("y")],
        |args| Ok(Outcome::Single(args.positional()[0].clone())),
    )
    .unwrap();
    let net = compose("parnet", vec![a], true).unwrap();

    let mut inputs = BTreeMap::new();
    inputs.insert("x".to_string(), int(1));
    let config = EngineConfig {
        default_method: Method::Parallel,
        pool_size: 4,
        annotate_errors: true,
    };
    let solution = net
        .compute(inputs, Some(&["y"]), None, &config)
        .unwrap();
    assert_eq!(solution.get("y"), Some(&int(1)));
}

#[test]
fn sideffected_need_gates_on_both_the_name_and_its_token() {
    let _logger = env_logger::try_init();
    let write = operation(
        "write",
        [Dependency::required("payload")],
        [Dependency::sideffected("path", ["path.flushed"])],
        |args| Ok(Outcome::Single(args.positional()[0].clone())),
    )
    .unwrap();
    let read_back = operation(
        "read_back",
        [
            Dependency::required("path"),
            Dependency::sideffect("path.flushed"),
        ],
        [Dependency::required("confirmed")],
        |args| Ok(Outcome::Single(args.positional()[0].clone())),
    )
    .unwrap();
    let net = compose("sideffected_net", vec![write, read_back], true).unwrap();

    let mut inputs = BTreeMap::new();
    inputs.insert("payload".to_string(), int(42));
    let solution = net
        .compute(inputs, Some(&["confirmed"]), None, &EngineConfig::default())
        .unwrap();
    assert_eq!(solution.get("confirmed"), Some(&int(42)));
    assert_eq!(solution.get("path"), Some(&int(42)));
}

#[test]
fn abort_before_dispatch_fails_the_run_sequentially() {
    let _logger = env_logger::try_init();
    let a = operation(
        "a",
        [Dependency::required("x")],
        [Dependency::required("y")],
        |args| Ok(Outcome::Single(args.positional()[0].clone())),
    )
    .unwrap();
    let net = compose("abortnet", vec![a], true).unwrap();
    let plan = net.compile(["x"], Some(&["y"]), None).unwrap();

    let mut inputs = BTreeMap::new();
    inputs.insert("x".to_string(), int(1));
    let abort = AbortHandle::new();
    abort.abort();
    let err = plan
        .execute_with_abort(inputs, &EngineConfig::default(), abort)
        .unwrap_err();
    assert!(matches!(err, ExecutionError::Aborted));
}

#[test]
fn abort_before_dispatch_fails_the_run_in_parallel() {
    let _logger = env_logger::try_init();
    let a = operation(
        "a",
        [Dependency::required("x")],
        [Dependency::required("y")],
        |args| Ok(Outcome::Single(args.positional()[0].clone())),
    )
    .unwrap();
    let net = compose("abortparnet", vec![a], true).unwrap();
    let plan = net.compile(["x"], Some(&["y"]), None).unwrap();

    let mut inputs = BTreeMap::new();
    inputs.insert("x".to_string(), int(1));
    let config = EngineConfig {
        default_method: Method::Parallel,
        pool_size: 2,
        annotate_errors: true,
    };
    let abort = AbortHandle::new();
    abort.abort();
    let err = plan.execute_with_abort(inputs, &config, abort).unwrap_err();
    assert!(matches!(err, ExecutionError::Aborted));
}
