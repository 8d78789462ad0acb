// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Name decorators that tag a dependency name as optional, variadic, a side-effect, or
//! keyword-renamed. A modifier is metadata only: it is consulted by the compiler and the
//! executor, but never inspected by the operation's own function.

use std::fmt;

use smallvec::SmallVec;

/// The kind of modifier attached to a [`Dependency`]. Equality and hashing include the kind, so
/// `sideffect("x")` and the bare name `"x"` are distinct dependencies even though their text is
/// identical.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum DependencyKind {
    /// Must be present in the inputs, or produced upstream, before the operation can run.
    Required,
    /// Consumed only if present; passed by keyword using `fn_arg` (or the dependency's own name
    /// if `fn_arg` is `None`).
    Optional { fn_arg: Option<String> },
    /// Optional; when present, appended positionally to the function's variadic tail.
    Vararg,
    /// Optional; the value must be a non-string iterable whose elements are appended
    /// positionally.
    Varargs,
    /// A pseudo-name that participates in scheduling only: gates execution as a need, and is
    /// recorded with no value as a provide.
    Sideffect,
    /// Binds a real data name to one or more side-effect tokens that must also be
    /// produced/consumed alongside it.
    Sideffected { tokens: Vec<String> },
    /// A required need passed to the function by keyword as `fn_arg` rather than positionally.
    Mapped { fn_arg: String },
}

/// A dependency name plus its modifier. This is the unit that appears in an
/// [`crate::operation::Operation`]'s `needs` and `provides` lists.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Dependency {
    name: String,
    kind: DependencyKind,
}

/// Anything that can be turned into the textual name of a dependency. Re-applying a modifier
/// constructor to an already-tagged `Dependency` discards its previous tag and keeps only the
/// underlying text, which is what makes modifier construction idempotent under re-wrapping.
pub trait IntoDependencyName {
    fn into_dependency_name(self) -> String;
}

impl IntoDependencyName for &str {
    fn into_dependency_name(self) -> String {
        self.to_string()
    }
}

impl IntoDependencyName for String {
    fn into_dependency_name(self) -> String {
        self
    }
}

impl IntoDependencyName for Dependency {
    fn into_dependency_name(self) -> String {
        self.name
    }
}

impl IntoDependencyName for &Dependency {
    fn into_dependency_name(self) -> String {
        self.name.clone()
    }
}

impl Dependency {
    pub fn required(name: impl IntoDependencyName) -> Self {
        Dependency {
            name: name.into_dependency_name(),
            kind: DependencyKind::Required,
        }
    }

    pub fn optional(name: impl IntoDependencyName, fn_arg: Option<&str>) -> Self {
        Dependency {
            name: name.into_dependency_name(),
            kind: DependencyKind::Optional {
                fn_arg: fn_arg.map(str::to_string),
            },
        }
    }

    pub fn vararg(name: impl IntoDependencyName) -> Self {
        Dependency {
            name: name.into_dependency_name(),
            kind: DependencyKind::Vararg,
        }
    }

    pub fn varargs(name: impl IntoDependencyName) -> Self {
        Dependency {
            name: name.into_dependency_name(),
            kind: DependencyKind::Varargs,
        }
    }

    pub fn sideffect(token: impl IntoDependencyName) -> Self {
        Dependency {
            name: token.into_dependency_name(),
            kind: DependencyKind::Sideffect,
        }
    }

    pub fn sideffected<I, S>(real: impl IntoDependencyName, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Dependency {
            name: real.into_dependency_name(),
            kind: DependencyKind::Sideffected {
                tokens: tokens.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn mapped(name: impl IntoDependencyName, fn_arg: impl Into<String>) -> Self {
        Dependency {
            name: name.into_dependency_name(),
            kind: DependencyKind::Mapped {
                fn_arg: fn_arg.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &DependencyKind {
        &self.kind
    }

    /// The side-effect tokens a `provide`/`need` also drags along, if any: the token itself for
    /// `Sideffect`, or the bound tokens for `Sideffected`. Almost always zero or one token, hence
    /// the inline capacity.
    pub fn sideffect_tokens(&self) -> SmallVec<[&str; 1]> {
        match &self.kind {
            DependencyKind::Sideffect => smallvec::smallvec![self.name.as_str()],
            DependencyKind::Sideffected { tokens } => tokens.iter().map(String::as_str).collect(),
            _ => SmallVec::new(),
        }
    }

    /// Every name that must be present (as a key) for this dependency to count as satisfied: the
    /// dependency's own name, plus any side-effect tokens bound to it via `sideffected`. A bare
    /// `sideffect` dependency's own name already *is* its token, so it contributes nothing extra
    /// here.
    pub fn gating_names(&self) -> SmallVec<[&str; 1]> {
        let mut names: SmallVec<[&str; 1]> = smallvec::smallvec![self.name.as_str()];
        if let DependencyKind::Sideffected { tokens } = &self.kind {
            names.extend(tokens.iter().map(String::as_str));
        }
        names
    }

    /// Every name this dependency contributes when it appears among an operation's `provides`:
    /// its own name, plus its side-effect tokens (deduplicated against the name itself, which
    /// matters for bare `sideffect` provides).
    pub fn provided_names(&self) -> SmallVec<[&str; 1]> {
        let mut names: SmallVec<[&str; 1]> = smallvec::smallvec![self.name.as_str()];
        for token in self.sideffect_tokens() {
            if !names.contains(&token) {
                names.push(token);
            }
        }
        names
    }

    /// Whether this dependency must be present (as a key) before the operation can be considered
    /// satisfiable: `required`, `mapped`, and `sideffect`/`sideffected` needs gate; `optional`,
    /// `vararg`, and `varargs` never do.
    pub fn gates_satisfiability(&self) -> bool {
        matches!(
            self.kind,
            DependencyKind::Required
                | DependencyKind::Mapped { .. }
                | DependencyKind::Sideffect
                | DependencyKind::Sideffected { .. }
        )
    }

    /// Whether this is a *pure* side-effect dependency: a pseudo-name carrying no value of its
    /// own. `sideffected`'s real name is not pure; it carries a real value and only drags tokens
    /// along, so it is excluded here and handled via [`Dependency::sideffect_tokens`] instead.
    pub fn is_sideffect(&self) -> bool {
        matches!(self.kind, DependencyKind::Sideffect)
    }

    pub fn is_optional_like(&self) -> bool {
        matches!(
            self.kind,
            DependencyKind::Optional { .. } | DependencyKind::Vararg | DependencyKind::Varargs
        )
    }

    /// The keyword name a `required`/`optional`/`mapped` dependency is passed under, if it is
    /// passed by keyword at all (side-effects, varargs, and plain positional needs are not).
    pub fn fn_arg(&self) -> Option<&str> {
        match &self.kind {
            DependencyKind::Optional { fn_arg } => fn_arg.as_deref().or(Some(self.name.as_str())),
            DependencyKind::Mapped { fn_arg } => Some(fn_arg.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DependencyKind::Required => write!(f, "{}", self.name),
            DependencyKind::Optional { fn_arg } => {
                write!(f, "optional({}", self.name)?;
                if let Some(fn_arg) = fn_arg {
                    write!(f, ", fn_arg={fn_arg}")?;
                }
                write!(f, ")")
            }
            DependencyKind::Vararg => write!(f, "vararg({})", self.name),
            DependencyKind::Varargs => write!(f, "varargs({})", self.name),
            DependencyKind::Sideffect => write!(f, "sideffect({})", self.name),
            DependencyKind::Sideffected { tokens } => {
                write!(f, "sideffected({}, {})", self.name, tokens.join(", "))
            }
            DependencyKind::Mapped { fn_arg } => write!(f, "mapped({}, {})", self.name, fn_arg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sideffect_differs_from_bare_name() {
        let _logger = env_logger::try_init();
        let bare = Dependency::required("x");
        let effect = Dependency::sideffect("x");
        assert_ne!(bare, effect);
        assert_eq!(bare.name(), effect.name());
    }

    #[test]
    fn modifiers_are_idempotent_under_rewrap() {
        let _logger = env_logger::try_init();
        let once = Dependency::sideffect("x");
        let twice = Dependency::sideffect(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn optional_fn_arg_defaults_to_name() {
        let _logger = env_logger::try_init();
        let dep = Dependency::optional("b", None);
        assert_eq!(dep.fn_arg(), Some("b"));
        let renamed = Dependency::optional("b", Some("bee"));
        assert_eq!(renamed.fn_arg(), Some("bee"));
    }

    #[test]
    fn gating_rules_match_modifier_kinds() {
        let _logger = env_logger::try_init();
        assert!(Dependency::required("a").gates_satisfiability());
        assert!(Dependency::mapped("a", "arg").gates_satisfiability());
        assert!(Dependency::sideffect("a").gates_satisfiability());
        assert!(!Dependency::optional("a", None).gates_satisfiability());
        assert!(!Dependency::vararg("a").gates_satisfiability());
        assert!(!Dependency::varargs("a").gates_satisfiability());
    }

    #[test]
    fn sideffected_gates_on_name_and_tokens_but_is_not_a_pure_sideffect() {
        let _logger = env_logger::try_init();
        let dep = Dependency::sideffected("path", ["path.locked"]);
        assert!(!dep.is_sideffect());
        assert!(dep.gates_satisfiability());
        assert_eq!(dep.gating_names().as_slice(), ["path", "path.locked"]);
        assert_eq!(dep.provided_names().as_slice(), ["path", "path.locked"]);
        assert_eq!(dep.sideffect_tokens().as_slice(), ["path.locked"]);
    }

    #[test]
    fn bare_sideffect_provided_names_has_no_duplicate() {
        let _logger = env_logger::try_init();
        let dep = Dependency::sideffect("lock");
        assert!(dep.is_sideffect());
        assert_eq!(dep.provided_names().as_slice(), ["lock"]);
    }
}
