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

//! The runtime half of the engine: drives a [`rule_graph::Plan`] to a [`Solution`], sequentially
//! or across a bounded thread pool, honouring the invocation contract, endurance, rescheduling,
//! and cooperative cancellation that [`rule_graph`] itself is silent on.

mod config;
mod diagnostics;
mod error;
mod invoke;
mod parallel;
mod sequential;
mod solution;

use std::collections::BTreeMap;
use std::sync::Arc;

use rule_graph::{Plan, Value};

pub use crate::config::{EngineConfig, Method};
pub use crate::error::ExecutionError;
pub use crate::solution::{AbortHandle, Solution};

/// Extension trait adding the runtime `execute` entry point to [`rule_graph::Plan`], kept in this
/// crate (rather than as an inherent method) since `rule_graph` has no knowledge of executors.
pub trait PlanExt {
    fn execute(
        self: Arc<Self>,
        inputs: BTreeMap<String, Value>,
        config: &EngineConfig,
    ) -> Result<Solution, ExecutionError>;

    fn execute_with_abort(
        self: Arc<Self>,
        inputs: BTreeMap<String, Value>,
        config: &EngineConfig,
        abort: AbortHandle,
    ) -> Result<Solution, ExecutionError>;
}

impl PlanExt for Plan {
    fn execute(
        self: Arc<Self>,
        inputs: BTreeMap<String, Value>,
        config: &EngineConfig,
    ) -> Result<Solution, ExecutionError> {
        self.execute_with_abort(inputs, config, AbortHandle::new())
    }

    fn execute_with_abort(
        self: Arc<Self>,
        inputs: BTreeMap<String, Value>,
        config: &EngineConfig,
        abort: AbortHandle,
    ) -> Result<Solution, ExecutionError> {
        match config.default_method {
            Method::Sequential => sequential::execute(self, inputs, config, abort),
            Method::Parallel => parallel::execute(self, inputs, config, abort),
        }
    }
}
