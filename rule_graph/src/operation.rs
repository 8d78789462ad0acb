// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The immutable operation descriptor: a name, its `needs`/`provides` dependency lists, the
//! underlying function, and the behavioural flags that the compiler and executor consult.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::BuildError;
use crate::modifiers::Dependency;
use crate::value::{OperationFn, Value};

/// A single, immutable operation: `(name, needs, provides, fn, endured, reschedule, node_props,
/// parents)`. Constructed once via [`OperationBuilder`] and never mutated afterwards; nesting and
/// merge-renaming produce new copies via [`Operation::withset`].
#[derive(Clone)]
pub struct Operation {
    name: String,
    needs: Vec<Dependency>,
    provides: Vec<Dependency>,
    func: Arc<OperationFn>,
    endured: bool,
    reschedule: bool,
    node_props: BTreeMap<String, Value>,
    parents: Vec<String>,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("needs", &self.needs)
            .field("provides", &self.provides)
            .field("endured", &self.endured)
            .field("reschedule", &self.reschedule)
            .field("parents", &self.parents)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.needs == other.needs && self.provides == other.provides
    }
}

impl Eq for Operation {}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Operation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn needs(&self) -> &[Dependency] {
        &self.needs
    }

    pub fn provides(&self) -> &[Dependency] {
        &self.provides
    }

    pub fn func(&self) -> &Arc<OperationFn> {
        &self.func
    }

    pub fn endured(&self) -> bool {
        self.endured
    }

    pub fn reschedule(&self) -> bool {
        self.reschedule
    }

    pub fn node_props(&self) -> &BTreeMap<String, Value> {
        &self.node_props
    }

    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// Whether this operation is structurally compatible with `other` for the purposes of
    /// `merge=true` deduplication: same name, and the same `needs`/`provides`.
    pub fn is_structurally_compatible(&self, other: &Operation) -> bool {
        self.name == other.name && self.needs == other.needs && self.provides == other.provides
    }

    /// Returns a shallow copy of this operation with selected fields replaced. Used by
    /// [`crate::network::Network`] when renaming operations nested under a parent prefix.
    pub fn withset(&self, name: Option<String>, parents: Option<Vec<String>>) -> Operation {
        let mut copy = self.clone();
        if let Some(name) = name {
            copy.name = name;
        }
        if let Some(parents) = parents {
            copy.parents = parents;
        }
        copy
    }
}

/// Builder for [`Operation`], validating the invariants from the operation descriptor's
/// constructor: non-empty name, no duplicate positions within `needs` or `provides`, and at least
/// one provide.
pub struct OperationBuilder {
    name: String,
    needs: Vec<Dependency>,
    provides: Vec<Dependency>,
    func: Arc<OperationFn>,
    endured: bool,
    reschedule: bool,
    node_props: BTreeMap<String, Value>,
}

impl OperationBuilder {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&crate::value::Args) -> crate::value::OperationResult + Send + Sync + 'static,
    ) -> Self {
        OperationBuilder {
            name: name.into(),
            needs: Vec::new(),
            provides: Vec::new(),
            func: Arc::new(func),
            endured: false,
            reschedule: false,
            node_props: BTreeMap::new(),
        }
    }

    pub fn needs(mut self, needs: impl IntoIterator<Item = Dependency>) -> Self {
        self.needs = needs.into_iter().collect();
        self
    }

    pub fn provides(mut self, provides: impl IntoIterator<Item = Dependency>) -> Self {
        self.provides = provides.into_iter().collect();
        self
    }

    pub fn endured(mut self, endured: bool) -> Self {
        self.endured = endured;
        self
    }

    pub fn reschedule(mut self, reschedule: bool) -> Self {
        self.reschedule = reschedule;
        self
    }

    pub fn node_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.node_props.insert(key.into(), value);
        self
    }

    pub fn build(self) -> Result<Operation, BuildError> {
        if self.name.trim().is_empty() {
            return Err(BuildError::EmptyName);
        }
        if self.provides.is_empty() {
            return Err(BuildError::NoProvides(self.name));
        }
        check_unique_positions(&self.name, "need", &self.needs)?;
        check_unique_positions(&self.name, "provide", &self.provides)?;
        check_no_overlap(&self.name, &self.needs, &self.provides)?;

        Ok(Operation {
            name: self.name,
            needs: self.needs,
            provides: self.provides,
            func: self.func,
            endured: self.endured,
            reschedule: self.reschedule,
            node_props: self.node_props,
            parents: Vec::new(),
        })
    }
}

fn check_no_overlap(op_name: &str, needs: &[Dependency], provides: &[Dependency]) -> Result<(), BuildError> {
    let need_names: std::collections::HashSet<&str> = needs.iter().map(Dependency::name).collect();
    for provide in provides {
        if need_names.contains(provide.name()) {
            return Err(BuildError::NeedProvideOverlap(
                provide.name().to_string(),
                op_name.to_string(),
            ));
        }
    }
    Ok(())
}

fn check_unique_positions(
    op_name: &str,
    kind: &'static str,
    deps: &[Dependency],
) -> Result<(), BuildError> {
    let mut seen = std::collections::HashSet::new();
    for dep in deps {
        if !seen.insert(dep.name().to_string()) {
            return if kind == "need" {
                Err(BuildError::DuplicateNeed(
                    dep.name().to_string(),
                    op_name.to_string(),
                ))
            } else {
                Err(BuildError::DuplicateProvide(
                    dep.name().to_string(),
                    op_name.to_string(),
                ))
            };
        }
    }
    Ok(())
}

/// Convenience constructor mirroring the public `operation(fn, name, needs, provides, ...)`
/// interface.
pub fn operation(
    name: impl Into<String>,
    needs: impl IntoIterator<Item = Dependency>,
    provides: impl IntoIterator<Item = Dependency>,
    func: impl Fn(&crate::value::Args) -> crate::value::OperationResult + Send + Sync + 'static,
) -> Result<Operation, BuildError> {
    OperationBuilder::new(name, func)
        .needs(needs)
        .provides(provides)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Outcome;

    #[test]
    fn rejects_empty_name() {
        let _logger = env_logger::try_init();
        let err = OperationBuilder::new("", |_| Ok(Outcome::NoResult))
            .provides([Dependency::required("x")])
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::EmptyName));
    }

    #[test]
    fn rejects_no_provides() {
        let _logger = env_logger::try_init();
        let err = OperationBuilder::new("op", |_| Ok(Outcome::NoResult))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::NoProvides(_)));
    }

    #[test]
    fn rejects_duplicate_needs() {
        let _logger = env_logger::try_init();
        let err = OperationBuilder::new("op", |_| Ok(Outcome::NoResult))
            .needs([Dependency::required("a"), Dependency::required("a")])
            .provides([Dependency::required("b")])
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateNeed(..)));
    }

    #[test]
    fn withset_renames_without_mutating_original() {
        let _logger = env_logger::try_init();
        let op = OperationBuilder::new("op", |_| Ok(Outcome::NoResult))
            .provides([Dependency::required("b")])
            .build()
            .unwrap();
        let renamed = op.withset(Some("sub.op".to_string()), Some(vec!["sub".to_string()]));
        assert_eq!(op.name(), "op");
        assert_eq!(renamed.name(), "sub.op");
        assert_eq!(renamed.parents(), ["sub"]);
    }

    #[test]
    fn rejects_a_name_declared_as_both_need_and_provide() {
        let _logger = env_logger::try_init();
        let err = OperationBuilder::new("op", |_| Ok(Outcome::NoResult))
            .needs([Dependency::required("x")])
            .provides([Dependency::required("x")])
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::NeedProvideOverlap(ref n, _) if n == "x"));
    }
}
