// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The thread-pool executor: groups a plan's operations into dependency *waves* (every operation
//! whose needs are already satisfied once the previous wave has joined), dispatches a wave
//! concurrently on a bounded `rayon` pool, and only then applies the plan's eviction directives
//! that fall within the completed wave.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use fnv::FnvHashMap;
use rayon::prelude::*;
use rule_graph::{Operation, OperationError, Plan, Step, Value};

use crate::config::EngineConfig;
use crate::diagnostics::jetsam_for;
use crate::error::ExecutionError;
use crate::invoke;
use crate::sequential::is_ready;
use crate::solution::{AbortHandle, Solution};

enum Outcome {
    Ran {
        name: String,
        produced: BTreeMap<String, Value>,
        partial: bool,
    },
    Endured {
        name: String,
        message: String,
    },
    Fatal {
        name: String,
        error: ExecutionError,
    },
}

pub fn execute(
    plan: Arc<Plan>,
    inputs: BTreeMap<String, Value>,
    config: &EngineConfig,
    abort: AbortHandle,
) -> Result<Solution, ExecutionError> {
    let ops: Vec<&Arc<Operation>> = plan.operations().collect();
    let levels = compute_levels(&ops);
    let waves = group_into_waves(&levels);
    let evictions_by_wave = map_evictions(plan.steps(), &ops, &levels);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.pool_size.max(1))
        .build()
        .expect("failed to build thread pool");

    let mut values: FnvHashMap<String, Value> = inputs.into_iter().collect();
    let mut provenance: FnvHashMap<String, Vec<String>> = FnvHashMap::default();
    let mut executed = Vec::new();
    let mut rescheduled = Vec::new();
    let mut failed: Vec<(String, OperationError)> = Vec::new();
    let mut cancelled = Vec::new();

    for (wave_idx, wave) in waves.iter().enumerate() {
        if abort.is_aborted() {
            log::info!("execution aborted before dispatching wave {wave_idx}");
            for &op_idx in wave {
                cancelled.push(ops[op_idx].name().to_string());
            }
            for remaining_wave in &waves[wave_idx + 1..] {
                for &op_idx in remaining_wave {
                    cancelled.push(ops[op_idx].name().to_string());
                }
            }
            return Err(ExecutionError::Aborted);
        }

        let mut to_run = Vec::new();
        for &op_idx in wave {
            let op = ops[op_idx];
            if is_ready(op, &values) {
                to_run.push(op_idx);
            } else {
                log::debug!("cancelling `{}`: unsatisfiable needs", op.name());
                cancelled.push(op.name().to_string());
            }
        }

        log::debug!("dispatching wave {wave_idx} ({} operation(s))", to_run.len());
        let results: Vec<Outcome> = pool.install(|| {
            to_run
                .par_iter()
                .map(|&op_idx| dispatch(ops[op_idx], &values, config))
                .collect()
        });

        let mut fatal: Option<ExecutionError> = None;
        for result in results {
            match result {
                Outcome::Ran {
                    name,
                    produced,
                    partial,
                } => {
                    if partial {
                        log::warn!("`{name}` rescheduled: partial provides");
                        rescheduled.push(name.clone());
                    } else {
                        executed.push(name.clone());
                    }
                    for (data_name, value) in produced {
                        provenance.entry(data_name.clone()).or_default().push(name.clone());
                        values.entry(data_name).or_insert(value);
                    }
                }
                Outcome::Endured { name, message } => {
                    log::warn!("`{name}` endured failure: {message}");
                    failed.push((name, OperationError(message)));
                }
                Outcome::Fatal { name, error } => {
                    log::warn!("`{name}` failed fatally: {error}");
                    fatal.get_or_insert(error);
                }
            }
        }

        if let Some(names) = evictions_by_wave.get(&wave_idx) {
            for name in names {
                values.remove(name);
            }
            log::trace!("evicted {names:?} after wave {wave_idx}");
        }

        if let Some(error) = fatal {
            for remaining_wave in &waves[wave_idx + 1..] {
                for &op_idx in remaining_wave {
                    cancelled.push(ops[op_idx].name().to_string());
                }
            }
            return Err(error);
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

fn dispatch(op: &Arc<Operation>, values: &FnvHashMap<String, Value>, config: &EngineConfig) -> Outcome {
    let args = match invoke::gather_args(op, values) {
        Ok(args) => args,
        Err(err) => {
            return Outcome::Fatal {
                name: op.name().to_string(),
                error: err,
            }
        }
    };

    match (op.func().as_ref())(&args) {
        Ok(outcome) => match invoke::resolve_outcome(op, outcome) {
            Ok((produced, partial)) => Outcome::Ran {
                name: op.name().to_string(),
                produced,
                partial,
            },
            Err(err) if op.endured() => Outcome::Endured {
                name: op.name().to_string(),
                message: err.to_string(),
            },
            Err(err) => Outcome::Fatal {
                name: op.name().to_string(),
                error: attach_jetsam(err, op, values, config),
            },
        },
        Err(op_err) if op.endured() => Outcome::Endured {
            name: op.name().to_string(),
            message: op_err.to_string(),
        },
        Err(op_err) => Outcome::Fatal {
            name: op.name().to_string(),
            error: ExecutionError::Failed {
                operation: op.name().to_string(),
                source: op_err,
                jetsam: config.annotate_errors.then(|| jetsam_for(op, values)),
            },
        },
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

/// Assigns each operation a wave number: one more than the largest wave number among the
/// producers of its gating needs, or `0` if none of its gating needs are produced by another
/// operation in this plan (i.e. they come entirely from the inputs).
fn compute_levels(ops: &[&Arc<Operation>]) -> Vec<usize> {
    let mut provider_of: HashMap<&str, usize> = HashMap::new();
    for (idx, op) in ops.iter().enumerate() {
        for provide in op.provides() {
            for name in provide.provided_names() {
                provider_of.insert(name, idx);
            }
        }
    }

    let mut levels = vec![0usize; ops.len()];
    for (idx, op) in ops.iter().enumerate() {
        let mut level = 0usize;
        for need in op.needs().iter().filter(|d| d.gates_satisfiability()) {
            for name in need.gating_names() {
                if let Some(&producer) = provider_of.get(name) {
                    level = level.max(levels[producer] + 1);
                }
            }
        }
        levels[idx] = level;
    }
    levels
}

fn group_into_waves(levels: &[usize]) -> Vec<Vec<usize>> {
    let max_level = levels.iter().copied().max().unwrap_or(0);
    let mut waves = vec![Vec::new(); max_level + 1];
    for (idx, &level) in levels.iter().enumerate() {
        waves[level].push(idx);
    }
    waves
}

/// Walks the plan's linear steps, attributing each `Evict` directive to the wave of the most
/// recent `Run` step that preceded it.
fn map_evictions(
    steps: &[Step],
    ops: &[&Arc<Operation>],
    levels: &[usize],
) -> HashMap<usize, Vec<String>> {
    let index_of: HashMap<&str, usize> = ops
        .iter()
        .enumerate()
        .map(|(idx, op)| (op.name(), idx))
        .collect();

    let mut by_wave: HashMap<usize, Vec<String>> = HashMap::new();
    let mut current_wave = 0usize;
    for step in steps {
        match step {
            Step::Run(op) => {
                if let Some(&idx) = index_of.get(op.name()) {
                    current_wave = levels[idx];
                }
            }
            Step::Evict(names) => {
                by_wave.entry(current_wave).or_default().extend(names.iter().cloned());
            }
        }
    }
    by_wave
}
