// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The single-threaded executor: walks a plan's steps in order, dispatching operations inline and
//! applying eviction directives immediately after the step that triggers them.

use std::collections::BTreeMap;
use std::sync::Arc;

use fnv::FnvHashMap;
use rule_graph::{Operation, OperationError, Plan, Step, Value};

use crate::config::EngineConfig;
use crate::diagnostics::jetsam_for;
use crate::error::ExecutionError;
use crate::invoke;
use crate::solution::{AbortHandle, Solution};

pub fn execute(
    plan: Arc<Plan>,
    inputs: BTreeMap<String, Value>,
    config: &EngineConfig,
    abort: AbortHandle,
) -> Result<Solution, ExecutionError> {
    let mut values: FnvHashMap<String, Value> = inputs.into_iter().collect();
    let mut provenance: FnvHashMap<String, Vec<String>> = FnvHashMap::default();
    let mut executed = Vec::new();
    let mut rescheduled = Vec::new();
    let mut failed: Vec<(String, OperationError)> = Vec::new();
    let mut cancelled = Vec::new();

    let steps = plan.steps();
    for (idx, step) in steps.iter().enumerate() {
        let op = match step {
            Step::Evict(names) => {
                for name in names {
                    values.remove(name);
                }
                log::trace!("evicted {names:?}");
                continue;
            }
            Step::Run(op) => op,
        };

        if abort.is_aborted() {
            log::info!("execution aborted before dispatching `{}`", op.name());
            cancel_remaining(&steps[idx..], &mut cancelled);
            return Err(ExecutionError::Aborted);
        }

        if !is_ready(op, &values) {
            log::debug!("cancelling `{}`: unsatisfiable needs", op.name());
            cancelled.push(op.name().to_string());
            continue;
        }

        log::debug!("dispatching `{}`", op.name());
        let args = match invoke::gather_args(op, &values) {
            Ok(args) => args,
            Err(err) => {
                cancel_remaining(&steps[idx + 1..], &mut cancelled);
                return Err(err);
            }
        };

        match (op.func().as_ref())(&args) {
            Ok(outcome) => match invoke::resolve_outcome(op, outcome) {
                Ok((produced, partial)) => {
                    if partial {
                        log::warn!("`{}` rescheduled: partial provides", op.name());
                        rescheduled.push(op.name().to_string());
                    } else {
                        executed.push(op.name().to_string());
                    }
                    for (name, value) in produced {
                        provenance
                            .entry(name.clone())
                            .or_default()
                            .push(op.name().to_string());
                        values.entry(name).or_insert(value);
                    }
                }
                Err(err) => {
                    if op.endured() {
                        log::warn!("`{}` endured failure: {}", op.name(), err);
                        failed.push((op.name().to_string(), OperationError(err.to_string())));
                    } else {
                        cancel_remaining(&steps[idx + 1..], &mut cancelled);
                        return Err(attach_jetsam(err, op, &values, config));
                    }
                }
            },
            Err(op_err) => {
                if op.endured() {
                    log::warn!("`{}` endured failure: {}", op.name(), op_err);
                    failed.push((op.name().to_string(), op_err));
                } else {
                    cancel_remaining(&steps[idx + 1..], &mut cancelled);
                    return Err(ExecutionError::Failed {
                        operation: op.name().to_string(),
                        source: op_err,
                        jetsam: config.annotate_errors.then(|| jetsam_for(op, &values)),
                    });
                }
            }
        }
    }

    Ok(Solution::new(
        plan,
        values,
        provenance,
        executed,
        rescheduled,
        failed,
        cancelled,
        abort,
    ))
}

pub(crate) fn is_ready(op: &Operation, values: &FnvHashMap<String, Value>) -> bool {
    op.needs()
        .iter()
        .filter(|d| d.gates_satisfiability())
        .all(|d| d.gating_names().iter().all(|name| values.contains_key(*name)))
}

pub(crate) fn cancel_remaining(remaining: &[Step], cancelled: &mut Vec<String>) {
    for step in remaining {
        if let Step::Run(op) = step {
            cancelled.push(op.name().to_string());
        }
    }
}

fn attach_jetsam(
    err: ExecutionError,
    op: &Operation,
    values: &FnvHashMap<String, Value>,
    config: &EngineConfig,
) -> ExecutionError {
    if !config.annotate_errors {
        return err;
    }
    match err {
        ExecutionError::Incomplete { operation, .. } => ExecutionError::Incomplete {
            operation,
            jetsam: Some(jetsam_for(op, values)),
        },
        other => other,
    }
}
