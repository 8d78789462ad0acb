// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Construction- and compilation-time error taxonomy. Runtime/execution errors live in the
//! `graph` crate, which depends on these for the diagnostics it attaches to its own errors.

/// Errors raised while building an [`crate::operation::Operation`] or a
/// [`crate::network::Network`].
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
pub enum BuildError {
    #[error("operation name must not be empty")]
    EmptyName,

    #[error("operation `{0}` must declare at least one provide")]
    NoProvides(String),

    #[error("duplicate need `{0}` in operation `{1}`")]
    DuplicateNeed(String, String),

    #[error("duplicate provide `{0}` in operation `{1}`")]
    DuplicateProvide(String, String),

    #[error(
        "operation `{0}` is already registered with a different needs/provides signature; pass merge=false to rename instead"
    )]
    IncompatibleMerge(String),

    #[error("cycle detected in network: {0}")]
    Cycle(String),

    #[error("more than one operation provides `{0}`; each data name may have only one producer")]
    DuplicateProducer(String),

    #[error("network `{0}` must contain at least one operation")]
    EmptyNetwork(String),

    #[error("`{0}` appears in both needs and provides of operation `{1}`")]
    NeedProvideOverlap(String, String),
}

/// Errors raised while compiling a [`crate::network::Network`] into a
/// [`crate::plan::Plan`] for a specific `(inputs, outputs, predicate)` triple.
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
pub enum CompileError {
    #[error("requested outputs are not provided by any operation in the network: {0:?}")]
    UnknownOutputs(Vec<String>),

    #[error("requested outputs are not derivable from the given inputs: {0:?}")]
    ImpossibleOutputs(Vec<String>),

    #[error("no operations can be scheduled to satisfy outputs {0:?} from inputs {1:?}")]
    Unsolvable(Vec<String>, Vec<String>),
}

/// A diagnostic payload ("jetsam") attached to a propagated error: the operation that failed,
/// what it needed/provided, and the set of names known to the solution at the time of failure.
/// Populated only when `EngineConfig::annotate_errors` is set.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Jetsam {
    pub operation: String,
    pub needs: Vec<String>,
    pub provides: Vec<String>,
    pub known_solution_keys: Vec<String>,
}

impl std::fmt::Display for Jetsam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "operation `{}` (needs={:?}, provides={:?}); solution contained {:?}",
            self.operation, self.needs, self.provides, self.known_solution_keys
        )
    }
}
