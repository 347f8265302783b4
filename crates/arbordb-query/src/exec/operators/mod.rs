//! Concrete cursor implementations.
//!
//! # Operator Categories
//!
//! - **Leaf scans**: [`index_scan`], [`group_scan`], [`values`]
//! - **Hierarchy operators**: [`flatten`], [`ancestor_lookup`]
//! - **Merge operators**: [`intersect`]
//! - **Nested execution**: [`map_nested`]
//! - **Ordering operators**: [`sort`], [`sort_limited`], [`distinct`]
//!
//! Index scans are bounded by [`key_range`] ranges.

pub mod ancestor_lookup;
pub mod distinct;
pub mod flatten;
pub mod group_scan;
pub mod index_scan;
pub mod intersect;
pub mod key_range;
pub mod map_nested;
pub mod sort;
pub mod sort_limited;
pub mod values;

// Re-exports for convenience
pub use ancestor_lookup::{AncestorLookup, InputPreservation};
pub use distinct::DistinctPartial;
pub use flatten::{Flatten, FlattenOptions, JoinType};
pub use group_scan::GroupScan;
pub use index_scan::IndexScan;
pub use intersect::{IntersectOptions, IntersectOrdered, OutputSide, ScanMode};
pub use key_range::{BoundExpr, IndexBound, IndexKeyRange};
pub use map_nested::MapNestedLoops;
pub use sort::{SortGeneral, SortOption};
pub use sort_limited::SortInsertionLimited;
pub use values::ValuesScan;
