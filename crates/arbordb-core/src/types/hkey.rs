//! Hierarchical keys.
//!
//! An [`HKey`] locates a row inside its group: one segment per table on the
//! path from the root, each carrying the table's ordinal and primary-key
//! values. Comparing hkeys gives document order, in which every subtree is
//! contiguous and follows its root row.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::{compare_value_slices, Value};

/// One `(table ordinal, key values)` step of an [`HKey`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HKeySegment {
    ordinal: u32,
    values: Vec<Value>,
}

impl HKeySegment {
    /// Creates a segment.
    #[must_use]
    pub fn new(ordinal: u32, values: Vec<Value>) -> Self {
        Self { ordinal, values }
    }

    /// Returns the table ordinal.
    #[must_use]
    pub const fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Returns the key values.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.ordinal.cmp(&other.ordinal).then_with(|| compare_value_slices(&self.values, &other.values))
    }
}

/// A hierarchical key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HKey {
    segments: Vec<HKeySegment>,
}

impl HKey {
    /// Creates an empty hkey.
    #[must_use]
    pub const fn empty() -> Self {
        Self { segments: Vec::new() }
    }

    /// Creates an hkey from segments.
    #[must_use]
    pub fn from_segments(segments: Vec<HKeySegment>) -> Self {
        Self { segments }
    }

    /// Creates a single-segment hkey for a root row.
    #[must_use]
    pub fn root(ordinal: u32, values: Vec<Value>) -> Self {
        Self { segments: vec![HKeySegment::new(ordinal, values)] }
    }

    /// Returns the segments.
    #[must_use]
    pub fn segments(&self) -> &[HKeySegment] {
        &self.segments
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if this hkey has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the ordinal of the last segment.
    #[must_use]
    pub fn last_ordinal(&self) -> Option<u32> {
        self.segments.last().map(HKeySegment::ordinal)
    }

    /// Returns a copy extended by one segment.
    #[must_use]
    pub fn extend(&self, ordinal: u32, values: Vec<Value>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(HKeySegment::new(ordinal, values));
        Self { segments }
    }

    /// Returns a copy extended by a segment holding a single null.
    ///
    /// The result sorts after this hkey and before every real row of
    /// table `ordinal` beneath it.
    #[must_use]
    pub fn extend_with_null(&self, ordinal: u32) -> Self {
        self.extend(ordinal, vec![Value::Null])
    }

    /// Returns the first `depth` segments, or `None` when this hkey is shorter.
    #[must_use]
    pub fn ancestor(&self, depth: usize) -> Option<Self> {
        (depth <= self.segments.len()).then(|| Self { segments: self.segments[..depth].to_vec() })
    }

    /// Returns true if `self` is a proper prefix of `other`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.segments.len() < other.segments.len() && self.is_prefix_of(other)
    }

    /// Returns true if `self` is a prefix of, or equal to, `other`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a.compare(b) == Ordering::Equal)
    }
}

impl PartialEq for HKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HKey {}

impl PartialOrd for HKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.segments.iter().zip(&other.segments) {
            let c = a.compare(b);
            if c != Ordering::Equal {
                return c;
            }
        }
        self.segments.len().cmp(&other.segments.len())
    }
}

impl fmt::Display for HKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "({}", segment.ordinal)?;
            for value in &segment.values {
                write!(f, ",{value}")?;
            }
            write!(f, ")")?;
        }
        write!(f, "}}")
    }
}
