// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Explicit, passed-through execution configuration: no ambient or thread-local toggles, just a
//! value threaded through `Plan::execute`/`Network::compute`.

/// Which executor drives a plan.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Sequential,
    Parallel,
}

/// Execution knobs for a single `compute`/`execute` call.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub default_method: Method,
    /// Worker count for [`Method::Parallel`]. Ignored by the sequential executor.
    pub pool_size: usize,
    /// Whether a [`rule_graph::Jetsam`] diagnostic is attached to propagated execution errors.
    pub annotate_errors: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_method: Method::Sequential,
            pool_size: rayon::current_num_threads(),
            annotate_errors: true,
        }
    }
}
