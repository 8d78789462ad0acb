// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The function invocation contract: turns an operation's declared `needs` plus the values
//! currently in a solution into the [`Args`] its function is called with, and turns the
//! function's [`Outcome`] back into the set of provides it actually produced.

use std::collections::BTreeMap;

use fnv::FnvHashMap;
use rule_graph::{Args, Dependency, DependencyKind, Operation, Outcome, Value};

use crate::error::ExecutionError;

/// Gathers the positional/keyword arguments for `op`, reading from `values`. Required and
/// `mapped` needs are assumed already present (the caller checks readiness beforehand); optional
/// and vararg-family needs are simply omitted when absent.
pub fn gather_args(
    op: &Operation,
    values: &FnvHashMap<String, Value>,
) -> Result<Args, ExecutionError> {
    let mut positional = Vec::new();

    for need in required_needs(op.needs()) {
        if let Some(v) = values.get(need.name()) {
            positional.push(v.clone());
        }
    }
    for need in op.needs().iter().filter(|d| d.kind() == &DependencyKind::Vararg) {
        if let Some(v) = values.get(need.name()) {
            positional.push(v.clone());
        }
    }
    for need in op
        .needs()
        .iter()
        .filter(|d| d.kind() == &DependencyKind::Varargs)
    {
        if let Some(v) = values.get(need.name()) {
            match v.iter_elements() {
                Some(items) => positional.extend(items.iter().cloned()),
                None => return Err(ExecutionError::NotIterable(need.name().to_string())),
            }
        }
    }

    let mut keyword = BTreeMap::new();
    for need in op.needs().iter().filter(|d| d.is_optional_like() || matches!(d.kind(), DependencyKind::Mapped { .. })) {
        if matches!(need.kind(), DependencyKind::Vararg | DependencyKind::Varargs) {
            continue;
        }
        if let Some(v) = values.get(need.name()) {
            if let Some(fn_arg) = need.fn_arg() {
                keyword.insert(fn_arg.to_string(), v.clone());
            }
        }
    }

    Ok(Args::new(positional, keyword))
}

fn required_needs(needs: &[Dependency]) -> impl Iterator<Item = &Dependency> {
    needs
        .iter()
        .filter(|d| matches!(d.kind(), DependencyKind::Required | DependencyKind::Mapped { .. }))
}

/// Maps an operation's [`Outcome`] onto its declared provides. Returns the produced name→value
/// pairs and whether the outcome was partial (fewer provides produced than declared, which is
/// only legal when `op.reschedule()` is set).
pub fn resolve_outcome(
    op: &Operation,
    outcome: Outcome,
) -> Result<(BTreeMap<String, Value>, bool), ExecutionError> {
    let declared: Vec<&Dependency> = op.provides().iter().filter(|d| !d.is_sideffect()).collect();
    let mut produced: BTreeMap<String, Value> = BTreeMap::new();

    let partial = match outcome {
        Outcome::NoResult => {
            if !declared.is_empty() && !op.reschedule() {
                return Err(incomplete(op));
            }
            !declared.is_empty()
        }
        Outcome::Single(value) => {
            if declared.len() != 1 {
                return Err(incomplete(op));
            }
            produced.insert(declared[0].name().to_string(), value);
            false
        }
        Outcome::Mapping(map) => {
            let declared_names: std::collections::BTreeSet<&str> =
                declared.iter().map(|d| d.name()).collect();
            for key in map.keys() {
                if !declared_names.contains(key.as_str()) {
                    return Err(incomplete(op));
                }
            }
            let missing = declared_names.len() > map.len();
            if missing && !op.reschedule() {
                return Err(incomplete(op));
            }
            produced = map;
            missing
        }
        Outcome::Sequence(values) => {
            if values.len() != declared.len() {
                return Err(incomplete(op));
            }
            for (dep, value) in declared.iter().zip(values) {
                produced.insert(dep.name().to_string(), value);
            }
            false
        }
    };

    for dep in op.provides() {
        for token in dep.sideffect_tokens() {
            produced.entry(token.to_string()).or_insert(Value::Null);
        }
    }

    Ok((produced, partial))
}

fn incomplete(op: &Operation) -> ExecutionError {
    ExecutionError::Incomplete {
        operation: op.name().to_string(),
        jetsam: None,
    }
}
