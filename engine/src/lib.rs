// Licensed under the Apache License, Version 2.0 (see LICENSE).

#![deny(warnings)]
#![deny(
    clippy::all,
    clippy::default_trait_access,
    clippy::expl_impl_clone_on_copy,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::unseparated_literal_suffix,
    clippy::used_underscore_binding
)]
#![allow(clippy::match_ref_pats)]
#![allow(
    clippy::len_without_is_empty,
    clippy::redundant_field_names,
    clippy::too_many_arguments
)]
#![allow(clippy::new_without_default, clippy::new_ret_no_self)]

//! The public facade: ties [`rule_graph`]'s compiler to [`graph`]'s executor behind a single
//! `Network::compute` call, and re-exports everything a consumer needs so they never have to
//! depend on either crate directly.

use std::collections::BTreeMap;
use std::sync::Arc;

pub use graph::{AbortHandle, EngineConfig, ExecutionError, Method, PlanExt, Solution};
pub use rule_graph::{
    compose, operation, BuildError, CompileError, Dependency, DependencyKind, Jetsam, Network,
    NetworkPart, Operation, OperationBuilder, OperationError, OperationFn, OperationResult,
    Outcome, Plan, Predicate, Step, Value,
};

/// Errors from the combined compile-then-execute path: either phase may fail independently.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Execute(#[from] ExecutionError),
}

/// Adds `compute` (compile + execute in one call) to [`Network`], mirroring `Plan::execute`'s
/// placement as an extension trait rather than an inherent method.
pub trait ComputeExt {
    fn compute(
        &self,
        inputs: BTreeMap<String, Value>,
        outputs: Option<&[&str]>,
        predicate: Option<Predicate>,
        config: &EngineConfig,
    ) -> Result<Solution, ComputeError>;
}

impl ComputeExt for Network {
    fn compute(
        &self,
        inputs: BTreeMap<String, Value>,
        outputs: Option<&[&str]>,
        predicate: Option<Predicate>,
        config: &EngineConfig,
    ) -> Result<Solution, ComputeError> {
        let keys: Vec<String> = inputs.keys().cloned().collect();
        let plan: Arc<Plan> = self.compile(keys, outputs, predicate)?;
        log::info!(
            "computing network `{}`: {} step(s) to run",
            self.name(),
            plan.operations().count()
        );
        let solution = plan.execute(inputs, config)?;
        Ok(solution)
    }
}
