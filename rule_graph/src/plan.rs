// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The compiled, pruned, and ordered execution plan that [`crate::compiler`] produces and the
//! `graph` crate's executors consume.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::operation::Operation;

/// A plain function pointer used to filter which operations a compiled plan may use. Restricted
/// to `fn` (rather than arbitrary closures) so that pointer-address equality can serve as the
/// predicate's identity for plan-cache keys.
pub type Predicate = fn(&Operation) -> bool;

/// One step of a compiled plan: either run an operation, or evict the named values from the
/// solution because no remaining step needs them.
#[derive(Clone, Debug)]
pub enum Step {
    Run(Arc<Operation>),
    Evict(Vec<String>),
}

/// A pruned, topologically ordered sequence of [`Step`]s, plus the subset of the network's
/// `needs`/`provides` that this particular plan actually consumes and produces.
#[derive(Clone, Debug)]
pub struct Plan {
    needs: BTreeSet<String>,
    provides: BTreeSet<String>,
    steps: Vec<Step>,
}

impl Plan {
    pub(crate) fn new(needs: BTreeSet<String>, provides: BTreeSet<String>, steps: Vec<Step>) -> Self {
        Plan {
            needs,
            provides,
            steps,
        }
    }

    pub fn needs(&self) -> &BTreeSet<String> {
        &self.needs
    }

    pub fn provides(&self) -> &BTreeSet<String> {
        &self.provides
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The operations this plan will run, in order, ignoring eviction steps.
    pub fn operations(&self) -> impl Iterator<Item = &Arc<Operation>> {
        self.steps.iter().filter_map(|step| match step {
            Step::Run(op) => Some(op),
            Step::Evict(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
