// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The layered `name → value` mapping an executor produces, plus the provenance log and
//! cooperative cancellation handle shared between a running execution and its caller.

use std::ops::Index;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fnv::FnvHashMap;
use rule_graph::{OperationError, Plan, Value};

/// A cooperative cancellation flag. Clones share the same underlying `bool`, so a handle
/// obtained before (or during) an execution can cancel it from another thread.
#[derive(Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        AbortHandle(Arc::new(AtomicBool::new(false)))
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The result of driving a [`Plan`] to completion: the surviving values, which operations ran,
/// which failed (endured) or were cancelled, and whether the run was aborted.
pub struct Solution {
    plan: Arc<Plan>,
    values: FnvHashMap<String, Value>,
    provenance: FnvHashMap<String, Vec<String>>,
    executed: Vec<String>,
    rescheduled: Vec<String>,
    failed: Vec<(String, OperationError)>,
    cancelled: Vec<String>,
    abort: AbortHandle,
}

impl Solution {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        plan: Arc<Plan>,
        values: FnvHashMap<String, Value>,
        provenance: FnvHashMap<String, Vec<String>>,
        executed: Vec<String>,
        rescheduled: Vec<String>,
        failed: Vec<(String, OperationError)>,
        cancelled: Vec<String>,
        abort: AbortHandle,
    ) -> Self {
        Solution {
            plan,
            values,
            provenance,
            executed,
            rescheduled,
            failed,
            cancelled,
            abort,
        }
    }

    pub fn plan(&self) -> &Arc<Plan> {
        &self.plan
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn rescheduled(&self) -> &[String] {
        &self.rescheduled
    }

    pub fn failed(&self) -> &[(String, OperationError)] {
        &self.failed
    }

    pub fn cancelled(&self) -> &[String] {
        &self.cancelled
    }

    pub fn aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    pub fn abort(&self) {
        self.abort.abort();
    }

    /// Names written by more than one operation, in case of diagnostic interest; under the
    /// single-producer-per-name invariant enforced at network construction, this is always empty,
    /// but an input can still be shadowed by a producer of the same name.
    pub fn overwrites(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.provenance
            .iter()
            .filter(|(_, writers)| writers.len() > 1)
            .map(|(name, writers)| (name.as_str(), writers.as_slice()))
    }
}

impl Index<&str> for Solution {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        self.get(name)
            .unwrap_or_else(|| panic!("no value for `{name}` in solution"))
    }
}
