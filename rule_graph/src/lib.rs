// Licensed under the Apache License, Version 2.0 (see LICENSE).

#![deny(warnings)]
// Enable all clippy lints except for many of the pedantic ones. It's a shame this needs to be
// copied and pasted across crates, but there doesn't appear to be a way to include inner
// attributes from a common source.
#![deny(
    clippy::all,
    clippy::default_trait_access,
    clippy::expl_impl_clone_on_copy,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::unseparated_literal_suffix,
    clippy::used_underscore_binding
)]
// It is often more clear to show that nothing is being moved.
#![allow(clippy::match_ref_pats)]
// Subjective style.
#![allow(
    clippy::len_without_is_empty,
    clippy::redundant_field_names,
    clippy::too_many_arguments
)]
// Default isn't as big a deal as people seem to think it is.
#![allow(clippy::new_without_default, clippy::new_ret_no_self)]

//! The static half of the engine: operation descriptors, the dependency modifiers that decorate
//! their `needs`/`provides`, the network they compose into, and the compiler that prunes a
//! network down to a concrete, ordered [`plan::Plan`] for one `(inputs, outputs, predicate)`
//! triple. Nothing in this crate executes anything; that's the `graph` crate's job.

mod compiler;
mod error;
mod modifiers;
mod network;
mod operation;
mod plan;
mod value;

pub use crate::error::{BuildError, CompileError, Jetsam};
pub use crate::modifiers::{Dependency, DependencyKind, IntoDependencyName};
pub use crate::network::{compose, Network, NetworkPart};
pub use crate::operation::{operation, Operation, OperationBuilder};
pub use crate::plan::{Plan, Predicate, Step};
pub use crate::value::{Args, OperationError, OperationFn, OperationResult, Outcome, Value};
