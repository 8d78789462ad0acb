// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Compiles a network's operations, plus a concrete `(inputs, outputs, predicate)` triple, into a
//! pruned, topologically ordered [`Plan`]: forward reachability decides which operations *can*
//! run at all, backward reachability from the requested outputs decides which of those are
//! actually *needed*, and a stable topological sort fixes their order.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::CompileError;
use crate::operation::Operation;
use crate::plan::{Plan, Predicate, Step};

pub fn compile(
    operations: &[Arc<Operation>],
    inputs: &BTreeSet<String>,
    outputs: Option<&[String]>,
    predicate: Option<Predicate>,
) -> Result<Plan, CompileError> {
    let candidates: Vec<&Arc<Operation>> = operations
        .iter()
        .filter(|&op| predicate.map_or(true, |p| p(op)))
        .collect();

    if let Some(outputs) = outputs {
        let known: BTreeSet<&str> = operations
            .iter()
            .flat_map(|op| op.provides().iter().flat_map(|d| d.provided_names()))
            .collect();
        let unknown: Vec<String> = outputs
            .iter()
            .filter(|o| !known.contains(o.as_str()) && !inputs.contains(o.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(CompileError::UnknownOutputs(unknown));
        }
    }

    let (runnable, available) = forward_reachable(&candidates, inputs);

    if let Some(outputs) = outputs {
        let missing: Vec<String> = outputs
            .iter()
            .filter(|o| !available.contains(o.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(CompileError::ImpossibleOutputs(missing));
        }
    }

    let needed = backward_prune(&runnable, inputs, outputs)?;
    let ordered = stable_topological_order(&needed);

    let steps = if let Some(outputs) = outputs {
        schedule_with_evictions(&ordered, inputs, outputs)
    } else {
        ordered.iter().map(|op| Step::Run((*op).clone())).collect()
    };

    // Every need an operation in the plan might consume, whatever its modifier, as long as the
    // name is actually present among the given inputs: this covers optional and vararg-family
    // needs that *could* be read if present, not just the ones that gate scheduling.
    let plan_needs: BTreeSet<String> = ordered
        .iter()
        .flat_map(|op| op.needs().iter().flat_map(|d| d.gating_names()))
        .filter(|n| inputs.contains(*n))
        .map(str::to_string)
        .collect();

    let plan_provides: BTreeSet<String> = match outputs {
        Some(outs) => outs.iter().cloned().collect(),
        None => ordered
            .iter()
            .flat_map(|op| op.provides().iter().flat_map(|d| d.provided_names()))
            .map(str::to_string)
            .collect(),
    };

    Ok(Plan::new(plan_needs, plan_provides, steps))
}

/// Repeatedly admits operations whose gating needs are already available, growing the
/// `available` set with each admitted operation's provides, until a fixpoint. Returns the
/// operations admitted, in admission order, and the full set of names reachable from `inputs`.
fn forward_reachable<'a>(
    candidates: &[&'a Arc<Operation>],
    inputs: &BTreeSet<String>,
) -> (Vec<&'a Arc<Operation>>, BTreeSet<String>) {
    let mut available = inputs.clone();
    let mut runnable: Vec<&Arc<Operation>> = Vec::new();
    let mut remaining: Vec<&Arc<Operation>> = candidates.to_vec();

    loop {
        let mut admitted_this_round = false;
        remaining.retain(|&op| {
            let ready = op
                .needs()
                .iter()
                .filter(|d| d.gates_satisfiability())
                .all(|d| d.gating_names().iter().all(|name| available.contains(*name)));
            if ready {
                for provide in op.provides() {
                    for name in provide.provided_names() {
                        available.insert(name.to_string());
                    }
                }
                runnable.push(op);
                admitted_this_round = true;
                false
            } else {
                true
            }
        });
        if !admitted_this_round {
            break;
        }
    }

    (runnable, available)
}

/// Walks backward from the requested outputs (or, if `None`, from every provide of every
/// runnable operation) through producer edges, collecting the minimal set of operations whose
/// output is transitively required.
fn backward_prune<'a>(
    runnable: &[&'a Arc<Operation>],
    inputs: &BTreeSet<String>,
    outputs: Option<&[String]>,
) -> Result<Vec<&'a Arc<Operation>>, CompileError> {
    let mut provider_of: HashMap<&str, usize> = HashMap::new();
    for (idx, op) in runnable.iter().enumerate() {
        for provide in op.provides() {
            for name in provide.provided_names() {
                provider_of.insert(name, idx);
            }
        }
    }

    let targets: Vec<String> = match outputs {
        Some(outs) => outs.to_vec(),
        None => runnable
            .iter()
            .flat_map(|op| op.provides().iter().flat_map(|d| d.provided_names()))
            .map(str::to_string)
            .collect(),
    };

    let mut needed_idxs: BTreeSet<usize> = BTreeSet::new();
    let mut stack: Vec<String> = targets
        .into_iter()
        .filter(|t| !inputs.contains(t))
        .collect();

    while let Some(name) = stack.pop() {
        let Some(&idx) = provider_of.get(name.as_str()) else {
            if inputs.contains(&name) {
                continue;
            }
            return Err(CompileError::Unsolvable(vec![name], Vec::new()));
        };
        if needed_idxs.insert(idx) {
            let op = runnable[idx];
            for need in op.needs() {
                if need.gates_satisfiability() {
                    for name in need.gating_names() {
                        if !inputs.contains(name) {
                            stack.push(name.to_string());
                        }
                    }
                }
            }
        }
    }

    Ok(needed_idxs.into_iter().map(|idx| runnable[idx]).collect())
}

/// Kahn's algorithm over the needed operations' producer/consumer edges, breaking ties by
/// operation name so that plans compile deterministically regardless of input ordering.
fn stable_topological_order<'a>(needed: &[&'a Arc<Operation>]) -> Vec<&'a Arc<Operation>> {
    let mut provider_of: HashMap<&str, usize> = HashMap::new();
    for (idx, op) in needed.iter().enumerate() {
        for provide in op.provides() {
            for name in provide.provided_names() {
                provider_of.insert(name, idx);
            }
        }
    }

    let mut indegree: Vec<usize> = vec![0; needed.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); needed.len()];
    for (idx, op) in needed.iter().enumerate() {
        for need in op.needs() {
            for name in need.gating_names() {
                if let Some(&producer) = provider_of.get(name) {
                    if producer != idx && !dependents[producer].contains(&idx) {
                        dependents[producer].push(idx);
                        indegree[idx] += 1;
                    }
                }
            }
        }
    }

    let mut frontier: BTreeSet<(String, usize)> = (0..needed.len())
        .filter(|&i| indegree[i] == 0)
        .map(|i| (needed[i].name().to_string(), i))
        .collect();

    let mut order = Vec::with_capacity(needed.len());
    while let Some((_, idx)) = frontier.iter().next().cloned() {
        frontier.remove(&(needed[idx].name().to_string(), idx));
        order.push(needed[idx]);
        for &dependent in &dependents[idx] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                frontier.insert((needed[dependent].name().to_string(), dependent));
            }
        }
    }

    order
}

/// Inserts `Evict` steps as soon as a value (an input or an earlier provide) has no remaining
/// consumer and is not among the requested outputs. Tracks every such value as it becomes live,
/// not just the ones the current step happens to produce, so unused inputs are dropped too.
fn schedule_with_evictions(
    ordered: &[&Arc<Operation>],
    inputs: &BTreeSet<String>,
    outputs: &[String],
) -> Vec<Step> {
    let keep: BTreeSet<&str> = outputs.iter().map(String::as_str).collect();

    let mut last_use: HashMap<&str, usize> = HashMap::new();
    for (idx, op) in ordered.iter().enumerate() {
        for need in op.needs() {
            for name in need.gating_names() {
                last_use.insert(name, idx);
            }
        }
    }

    let mut live: BTreeSet<String> = inputs
        .iter()
        .filter(|name| !keep.contains(name.as_str()))
        .cloned()
        .collect();
    let mut steps = Vec::with_capacity(ordered.len());

    for (idx, op) in ordered.iter().enumerate() {
        steps.push(Step::Run((*op).clone()));

        for provide in op.provides() {
            for name in provide.provided_names() {
                if !keep.contains(name) {
                    live.insert(name.to_string());
                }
            }
        }

        let mut evictable: Vec<String> = live
            .iter()
            .filter(|name| last_use.get(name.as_str()).copied().map_or(true, |last| last <= idx))
            .cloned()
            .collect();
        evictable.sort();
        if !evictable.is_empty() {
            for name in &evictable {
                live.remove(name);
            }
            steps.push(Step::Evict(evictable));
        }
    }
    steps
}
