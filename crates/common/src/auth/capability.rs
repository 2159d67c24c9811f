use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A set of group names a caller holds or a route requires.
///
/// Tokens carry groups as a comma-joined string; the set is built once at
/// decode time and every policy check is a set intersection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<String>);

impl CapabilitySet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            names
                .into_iter()
                .map(Into::into)
                .filter(|n: &String| !n.is_empty())
                .collect(),
        )
    }

    /// Parse a comma-joined list, ignoring blanks and surrounding whitespace.
    pub fn parse(joined: &str) -> Self {
        Self::new(joined.split(',').map(str::trim))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn intersects(&self, other: &CapabilitySet) -> bool {
        self.0.iter().any(|n| other.0.contains(n))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn joined(&self) -> String {
        self.iter().collect::<Vec<_>>().join(",")
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ignores_blanks() {
        let set = CapabilitySet::parse("admin, user,,");
        assert!(set.contains("admin"));
        assert!(set.contains("user"));
        assert_eq!(set.iter().count(), 2);
    }

    #[test]
    fn test_no_substring_matching() {
        let caller = CapabilitySet::parse("administrators,user");
        let required = CapabilitySet::parse("admin");
        assert!(!caller.intersects(&required));
        assert!(CapabilitySet::parse("user,admin").intersects(&required));
    }
}
