//! Codes and code sets.

use std::collections::hash_set;
use std::collections::HashSet;
use std::fmt;

/// A single coded value: a code within a code system.
///
/// Equality and hashing are structural over both fields. An absent system is
/// carried as an empty string and is not normalized any further.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Code {
    /// Code system URI.
    pub system: String,
    /// Code within the system.
    pub code: String,
}

impl Code {
    /// Creates a code.
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
        }
    }

    /// Key used by membership filters and flat exports: `"<system>|<code>"`.
    pub fn membership_key(&self) -> String {
        let mut key = String::with_capacity(self.system.len() + self.code.len() + 1);
        key.push_str(&self.system);
        key.push('|');
        key.push_str(&self.code);
        key
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.system, self.code)
    }
}

/// An unordered collection of unique [`Code`] values.
///
/// Iteration order is unspecified. Use [`CodeSet::to_sorted_vec`] when a
/// stable order is needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CodeSet {
    codes: HashSet<Code>,
}

impl CodeSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty set with room for `capacity` codes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            codes: HashSet::with_capacity(capacity),
        }
    }

    /// Builds a set of codes that all share one system.
    pub fn from_codes<I, S>(system: &str, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        codes
            .into_iter()
            .map(|code| Code::new(system, code))
            .collect()
    }

    /// Adds a code. Returns `false` if it was already present.
    pub fn insert(&mut self, code: Code) -> bool {
        self.codes.insert(code)
    }

    /// Removes a code. Returns `true` if it was present.
    pub fn remove(&mut self, code: &Code) -> bool {
        self.codes.remove(code)
    }

    /// Checks membership of a code.
    pub fn contains(&self, code: &Code) -> bool {
        self.codes.contains(code)
    }

    /// Checks membership by system and code without allocating a [`Code`]
    /// for the caller.
    pub fn contains_code(&self, system: &str, code: &str) -> bool {
        self.codes.contains(&Code::new(system, code))
    }

    /// Number of codes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns true if the set has no codes.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Iterates over the codes in unspecified order.
    pub fn iter(&self) -> hash_set::Iter<'_, Code> {
        self.codes.iter()
    }

    /// Codes present in either set.
    pub fn union(&self, other: &Self) -> Self {
        let (large, small) = if self.len() >= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        let mut codes = large.codes.clone();
        codes.extend(small.codes.iter().cloned());
        Self { codes }
    }

    /// Codes present in both sets.
    pub fn intersection(&self, other: &Self) -> Self {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .codes
            .iter()
            .filter(|code| large.codes.contains(*code))
            .cloned()
            .collect()
    }

    /// Codes present in `self` but not in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        self.codes
            .iter()
            .filter(|code| !other.codes.contains(*code))
            .cloned()
            .collect()
    }

    /// In-place union, consuming `other`.
    pub fn merge(&mut self, other: Self) {
        if other.len() > self.len() {
            let mut other = other;
            std::mem::swap(self, &mut other);
            self.codes.extend(other.codes);
        } else {
            self.codes.extend(other.codes);
        }
    }

    /// In-place intersection.
    pub fn retain_in(&mut self, other: &Self) {
        self.codes.retain(|code| other.codes.contains(code));
    }

    /// In-place difference.
    pub fn subtract(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        self.codes.retain(|code| !other.codes.contains(code));
    }

    /// Distinct systems present in the set, sorted.
    pub fn systems(&self) -> Vec<&str> {
        let mut systems: Vec<&str> = self
            .codes
            .iter()
            .map(|c| c.system.as_str())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        systems.sort_unstable();
        systems
    }

    /// Converts the set to a Vec sorted by system, then code.
    pub fn to_sorted_vec(&self) -> Vec<Code> {
        let mut vec: Vec<Code> = self.codes.iter().cloned().collect();
        vec.sort_unstable();
        vec
    }
}

impl FromIterator<Code> for CodeSet {
    fn from_iter<I: IntoIterator<Item = Code>>(iter: I) -> Self {
        Self {
            codes: iter.into_iter().collect(),
        }
    }
}

impl Extend<Code> for CodeSet {
    fn extend<I: IntoIterator<Item = Code>>(&mut self, iter: I) {
        self.codes.extend(iter);
    }
}

impl IntoIterator for CodeSet {
    type Item = Code;
    type IntoIter = hash_set::IntoIter<Code>;

    fn into_iter(self) -> Self::IntoIter {
        self.codes.into_iter()
    }
}

impl<'a> IntoIterator for &'a CodeSet {
    type Item = &'a Code;
    type IntoIter = hash_set::Iter<'a, Code>;

    fn into_iter(self) -> Self::IntoIter {
        self.codes.iter()
    }
}
