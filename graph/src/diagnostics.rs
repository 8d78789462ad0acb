// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Builds the [`Jetsam`] diagnostic payload attached to propagated errors when
//! `EngineConfig::annotate_errors` is set.

use fnv::FnvHashMap;
use rule_graph::{Jetsam, Operation, Value};

pub(crate) fn jetsam_for(op: &Operation, values: &FnvHashMap<String, Value>) -> Jetsam {
    Jetsam {
        operation: op.name().to_string(),
        needs: op.needs().iter().map(|d| d.name().to_string()).collect(),
        provides: op.provides().iter().map(|d| d.name().to_string()).collect(),
        known_solution_keys: values.keys().cloned().collect(),
    }
}
