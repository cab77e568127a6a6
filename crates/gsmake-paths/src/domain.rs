use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use thiserror::Error;

/// The mandatory, always-participating domain.
pub const TASK_DOMAIN: &str = "task";

/// The default domain set used when a package declares none: `{task,
/// golang}`. Centralized here rather than duplicated at each call site.
pub const DEFAULT_DOMAINS: &[&str] = &["task", "golang"];

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain name cannot be empty")]
    Empty,
    #[error("domain name '{0}' cannot contain '|'")]
    ContainsPipe(String),
}

/// An opaque role tag (`task`, `runtimes`, `archtype`, a user-declared name,
/// ...). The loader and runner never special-case any value other than
/// [`TASK_DOMAIN`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Domain(String);

impl Domain {
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::Empty);
        }
        if name.contains('|') {
            return Err(DomainError::ContainsPipe(name));
        }
        Ok(Self(name))
    }

    pub fn task() -> Self {
        Self(TASK_DOMAIN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Domain {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A pipe-separated set of [`Domain`]s, e.g. `"task|golang"`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainSet(BTreeSet<Domain>);

impl DomainSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// The centralized default domain set, always including [`TASK_DOMAIN`].
    pub fn default_set() -> Self {
        Self::parse(&DEFAULT_DOMAINS.join("|")).expect("default domains are always valid")
    }

    /// Parses a pipe-separated domain list. An empty string yields the empty
    /// set (callers combine this with [`Self::with_task`] or
    /// [`Self::default_set`] as the context requires).
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        let mut set = BTreeSet::new();
        for part in text.split('|') {
            if part.is_empty() {
                continue;
            }
            set.insert(Domain::new(part)?);
        }
        Ok(Self(set))
    }

    /// Ensures `"task"` participates: every package always contributes to it.
    pub fn with_task(mut self) -> Self {
        self.0.insert(Domain::task());
        self
    }

    pub fn contains(&self, domain: &Domain) -> bool {
        self.0.contains(domain)
    }

    pub fn insert(&mut self, domain: Domain) -> bool {
        self.0.insert(domain)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Domain> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The intersection of two domain sets, used when propagating a parent's
    /// currently-propagating domain set onto an import's explicit or
    /// inherited domain set.
    pub fn intersection(&self, other: &DomainSet) -> DomainSet {
        DomainSet(self.0.intersection(&other.0).cloned().collect())
    }
}

impl Display for DomainSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(Domain::as_str)
            .collect::<Vec<_>>()
            .join("|");
        f.write_str(&joined)
    }
}

impl FromIterator<Domain> for DomainSet {
    fn from_iter<T: IntoIterator<Item = Domain>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_pipe_separated_domains() {
        let set = DomainSet::parse("task|golang").unwrap();
        assert!(set.contains(&Domain::task()));
        assert!(set.contains(&Domain::new("golang").unwrap()));
        assert_eq!(set.to_string(), "golang|task");
    }

    #[test]
    fn empty_string_is_empty_set() {
        let set = DomainSet::parse("").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn default_set_always_includes_task() {
        let set = DomainSet::default_set();
        assert!(set.contains(&Domain::task()));
        assert!(set.contains(&Domain::new("golang").unwrap()));
    }

    #[test]
    fn with_task_unions_in_task() {
        let set = DomainSet::parse("runtimes").unwrap().with_task();
        assert!(set.contains(&Domain::task()));
        assert!(set.contains(&Domain::new("runtimes").unwrap()));
    }

    #[test]
    fn rejects_pipe_in_single_domain() {
        assert!(Domain::new("a|b").is_err());
    }
}
