// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Errors raised while invoking an operation's function or driving a plan to completion.

use rule_graph::{Jetsam, OperationError};

#[derive(Clone, Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("expected needs[varargs({0})] to be a non-str iterable")]
    NotIterable(String),

    #[error("operation `{operation}` did not produce all of its declared provides")]
    Incomplete {
        operation: String,
        jetsam: Option<Jetsam>,
    },

    #[error("operation `{operation}` failed: {source}")]
    Failed {
        operation: String,
        #[source]
        source: OperationError,
        jetsam: Option<Jetsam>,
    },

    #[error("execution aborted")]
    Aborted,
}
