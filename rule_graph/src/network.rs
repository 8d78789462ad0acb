// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The bipartite DAG of data names and operations, assembled from a list of operations (and
//! nested sub-networks), verified acyclic, and cached per-compile-key into [`crate::plan::Plan`]s.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use fnv::FnvHashMap;
use parking_lot::Mutex;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::compiler;
use crate::error::{BuildError, CompileError};
use crate::operation::Operation;
use crate::plan::{Plan, Predicate};

/// One input to [`compose`]: either a bare operation, or a previously-built sub-network whose
/// operations are spliced into the new one.
pub enum NetworkPart {
    Op(Operation),
    Net(Network),
}

impl From<Operation> for NetworkPart {
    fn from(op: Operation) -> Self {
        NetworkPart::Op(op)
    }
}

impl From<Network> for NetworkPart {
    fn from(net: Network) -> Self {
        NetworkPart::Net(net)
    }
}

/// An immutable DAG of operations. Construction merges duplicate operation names (either
/// rejecting or collapsing them, depending on `merge`), verifies acyclicity, and computes the
/// network's own `needs`/`provides` closure.
pub struct Network {
    name: String,
    operations: Vec<Arc<Operation>>,
    needs: BTreeSet<String>,
    provides: BTreeSet<String>,
    plan_cache: Mutex<HashMap<PlanKey, Arc<Plan>>>,
}

#[derive(Clone, Eq, PartialEq, Hash)]
struct PlanKey {
    inputs: BTreeSet<String>,
    outputs: Option<Vec<String>>,
    predicate: Option<usize>,
}

impl Network {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operations(&self) -> &[Arc<Operation>] {
        &self.operations
    }

    pub fn needs(&self) -> &BTreeSet<String> {
        &self.needs
    }

    pub fn provides(&self) -> &BTreeSet<String> {
        &self.provides
    }

    /// Compiles this network into a pruned, topologically ordered [`Plan`] for the given inputs
    /// and (optionally) requested outputs and node predicate. Plans are memoized by
    /// `(inputs, outputs, predicate-identity)`.
    pub fn compile(
        &self,
        inputs: impl IntoIterator<Item = impl Into<String>>,
        outputs: Option<&[&str]>,
        predicate: Option<Predicate>,
    ) -> Result<Arc<Plan>, CompileError> {
        let inputs: BTreeSet<String> = inputs.into_iter().map(Into::into).collect();
        let outputs_owned = outputs.map(|o| o.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        let key = PlanKey {
            inputs: inputs.clone(),
            outputs: outputs_owned.clone(),
            predicate: predicate.map(|p| p as usize),
        };

        if let Some(cached) = self.plan_cache.lock().get(&key) {
            log::debug!("reusing cached plan for network `{}`", self.name);
            return Ok(cached.clone());
        }

        let plan = Arc::new(compiler::compile(
            &self.operations,
            &inputs,
            outputs_owned.as_deref(),
            predicate,
        )?);
        log::debug!(
            "compiled network `{}` into a plan of {} step(s)",
            self.name,
            plan.steps().len()
        );
        self.plan_cache.lock().insert(key, plan.clone());
        Ok(plan)
    }
}

/// Builds a [`Network`] out of operations and/or nested sub-networks, renaming or merging
/// duplicate operation names depending on `merge`.
pub fn compose(
    name: impl Into<String>,
    parts: impl IntoIterator<Item = impl Into<NetworkPart>>,
    merge: bool,
) -> Result<Network, BuildError> {
    let name = name.into();
    let mut by_name: indexmap::IndexMap<String, Arc<Operation>> = indexmap::IndexMap::new();

    for part in parts {
        match part.into() {
            NetworkPart::Op(op) => insert_operation(&mut by_name, Arc::new(op), merge, &name)?,
            NetworkPart::Net(sub) => {
                for op in sub.operations.iter() {
                    let renamed = if merge {
                        op.clone()
                    } else {
                        let mut parents = op.parents().to_vec();
                        parents.push(sub.name.clone());
                        Arc::new(op.withset(
                            Some(format!("{}.{}", sub.name, op.name())),
                            Some(parents),
                        ))
                    };
                    insert_operation(&mut by_name, renamed, merge, &name)?;
                }
            }
        }
    }

    if by_name.is_empty() {
        return Err(BuildError::EmptyNetwork(name));
    }

    let operations: Vec<Arc<Operation>> = by_name.into_values().collect();
    verify_unique_producers(&operations)?;
    verify_acyclic(&operations)?;

    let provides: BTreeSet<String> = operations
        .iter()
        .flat_map(|op| op.provides().iter().flat_map(|d| d.provided_names()))
        .map(str::to_string)
        .collect();
    let needs: BTreeSet<String> = operations
        .iter()
        .flat_map(|op| {
            op.needs()
                .iter()
                .filter(|d| d.gates_satisfiability())
                .flat_map(|d| d.gating_names())
        })
        .map(str::to_string)
        .filter(|n| !provides.contains(n))
        .collect();

    Ok(Network {
        name,
        operations,
        needs,
        provides,
        plan_cache: Mutex::new(HashMap::new()),
    })
}

fn insert_operation(
    by_name: &mut indexmap::IndexMap<String, Arc<Operation>>,
    op: Arc<Operation>,
    merge: bool,
    network_name: &str,
) -> Result<(), BuildError> {
    match by_name.get(op.name()) {
        None => {
            by_name.insert(op.name().to_string(), op);
            Ok(())
        }
        Some(existing) if merge => {
            if existing.is_structurally_compatible(&op) {
                by_name.insert(op.name().to_string(), op);
                Ok(())
            } else {
                Err(BuildError::IncompatibleMerge(op.name().to_string()))
            }
        }
        Some(_) => {
            let renamed = op.withset(
                Some(format!("{}.{}", network_name, op.name())),
                Some(vec![network_name.to_string()]),
            );
            by_name.insert(renamed.name().to_string(), Arc::new(renamed));
            Ok(())
        }
    }
}

/// Enforces that at most one operation declares a given provide name, so the parallel executor
/// never has two concurrent writers to arbitrate between.
fn verify_unique_producers(operations: &[Arc<Operation>]) -> Result<(), BuildError> {
    let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
    for op in operations {
        for provide in op.provides() {
            for name in provide.provided_names() {
                if !seen.insert(name) {
                    return Err(BuildError::DuplicateProducer(name.to_string()));
                }
            }
        }
    }
    Ok(())
}

fn verify_acyclic(operations: &[Arc<Operation>]) -> Result<(), BuildError> {
    let mut provider_of: FnvHashMap<&str, usize> = FnvHashMap::default();
    for (idx, op) in operations.iter().enumerate() {
        for provide in op.provides() {
            for name in provide.provided_names() {
                provider_of.insert(name, idx);
            }
        }
    }

    let mut graph = DiGraph::<(), ()>::new();
    let nodes: Vec<_> = operations.iter().map(|_| graph.add_node(())).collect();
    for (idx, op) in operations.iter().enumerate() {
        for need in op.needs() {
            for name in need.gating_names() {
                if let Some(&producer) = provider_of.get(name) {
                    graph.update_edge(nodes[producer], nodes[idx], ());
                }
            }
        }
    }

    if let Err(cycle) = toposort(&graph, None) {
        let op = &operations[cycle.node_id().index()];
        return Err(BuildError::Cycle(op.name().to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::Dependency;
    use crate::operation::OperationBuilder;
    use crate::value::Outcome;

    fn noop(name: &str, needs: Vec<Dependency>, provides: Vec<Dependency>) -> Operation {
        OperationBuilder::new(name, |_| Ok(Outcome::NoResult))
            .needs(needs)
            .provides(provides)
            .build()
            .unwrap()
    }

    #[test]
    fn detects_cycles() {
        let _logger = env_logger::try_init();
        let a = noop(
            "a",
            vec![Dependency::required("y")],
            vec![Dependency::required("x")],
        );
        let b = noop(
            "b",
            vec![Dependency::required("x")],
            vec![Dependency::required("y")],
        );
        let err = compose("cyclic", vec![a, b], true).unwrap_err();
        assert!(matches!(err, BuildError::Cycle(_)));
    }

    #[test]
    fn merge_true_deduplicates_compatible_operations() {
        let _logger = env_logger::try_init();
        let a1 = noop(
            "a",
            vec![Dependency::required("x")],
            vec![Dependency::required("y")],
        );
        let a2 = noop(
            "a",
            vec![Dependency::required("x")],
            vec![Dependency::required("y")],
        );
        let net = compose("net", vec![a1, a2], true).unwrap();
        assert_eq!(net.operations().len(), 1);
    }

    #[test]
    fn merge_true_rejects_incompatible_duplicates() {
        let _logger = env_logger::try_init();
        let a1 = noop(
            "a",
            vec![Dependency::required("x")],
            vec![Dependency::required("y")],
        );
        let a2 = noop(
            "a",
            vec![Dependency::required("z")],
            vec![Dependency::required("y")],
        );
        let err = compose("net", vec![a1, a2], true).unwrap_err();
        assert!(matches!(err, BuildError::IncompatibleMerge(_)));
    }

    #[test]
    fn merge_false_renames_duplicates() {
        let _logger = env_logger::try_init();
        let a1 = noop(
            "a",
            vec![Dependency::required("x")],
            vec![Dependency::required("y")],
        );
        let a2 = noop(
            "a",
            vec![Dependency::required("z")],
            vec![Dependency::required("w")],
        );
        let net = compose("net", vec![a1, a2], false).unwrap();
        assert_eq!(net.operations().len(), 2);
        assert!(net.operations().iter().any(|op| op.name() == "net.a"));
    }

    #[test]
    fn rejects_two_producers_of_the_same_name() {
        let _logger = env_logger::try_init();
        let a = noop(
            "a",
            vec![Dependency::required("x")],
            vec![Dependency::required("y")],
        );
        let b = noop(
            "b",
            vec![Dependency::required("x")],
            vec![Dependency::required("y")],
        );
        let err = compose("net", vec![a, b], false).unwrap_err();
        assert!(matches!(err, BuildError::DuplicateProducer(ref n) if n == "y"));
    }

    #[test]
    fn needs_excludes_internally_produced_names() {
        let _logger = env_logger::try_init();
        let a = noop(
            "a",
            vec![Dependency::required("x")],
            vec![Dependency::required("y")],
        );
        let b = noop(
            "b",
            vec![Dependency::required("y")],
            vec![Dependency::required("z")],
        );
        let net = compose("net", vec![a, b], true).unwrap();
        assert_eq!(net.needs().iter().map(String::as_str).collect::<Vec<_>>(), ["x"]);
        assert!(net.provides().contains("z"));
    }

    #[test]
    fn sideffected_token_counts_as_a_provided_name() {
        let _logger = env_logger::try_init();
        let a = noop(
            "a",
            vec![Dependency::required("x")],
            vec![Dependency::sideffected("y", ["y.token"])],
        );
        let net = compose("net", vec![a], true).unwrap();
        assert!(net.provides().contains("y"));
        assert!(net.provides().contains("y.token"));
    }

    #[test]
    fn two_operations_cannot_share_a_sideffect_token() {
        let _logger = env_logger::try_init();
        let a = noop(
            "a",
            vec![Dependency::required("x")],
            vec![Dependency::sideffected("y", ["shared.token"])],
        );
        let b = noop(
            "b",
            vec![Dependency::required("x")],
            vec![Dependency::sideffected("z", ["shared.token"])],
        );
        let err = compose("net", vec![a, b], false).unwrap_err();
        assert!(matches!(err, BuildError::DuplicateProducer(ref n) if n == "shared.token"));
    }
}
