//! Property-based tests for value and hkey ordering.

#![allow(clippy::unwrap_used)]

use std::cmp::Ordering;

use proptest::prelude::*;

use super::{compare_values, HKey, HKeySegment, Value};

/// Strategy for generating key-like values, nulls included.
fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-50i64..50).prop_map(Value::Int),
        (-50.0f64..50.0).prop_map(Value::Float),
        "[a-c]{0,3}".prop_map(Value::String),
        prop::collection::vec(any::<u8>(), 0..3).prop_map(Value::Bytes),
    ]
}

/// Strategy for hkeys over a small ordinal space so prefixes collide often.
fn arb_hkey() -> impl Strategy<Value = HKey> {
    prop::collection::vec((1u32..4, prop::collection::vec(arb_value(), 1..2)), 0..4).prop_map(|segments| {
        HKey::from_segments(segments.into_iter().map(|(ordinal, values)| HKeySegment::new(ordinal, values)).collect())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn compare_values_is_antisymmetric(a in arb_value(), b in arb_value()) {
        prop_assert_eq!(compare_values(&a, &b), compare_values(&b, &a).reverse());
    }

    #[test]
    fn compare_values_is_transitive(a in arb_value(), b in arb_value(), c in arb_value()) {
        let mut sorted = [a, b, c];
        sorted.sort_by(compare_values);
        prop_assert_ne!(compare_values(&sorted[0], &sorted[2]), Ordering::Greater);
    }

    #[test]
    fn ancestors_sort_before_descendants(key in arb_hkey(), ordinal in 1u32..4, v in arb_value()) {
        let child = key.extend(ordinal, vec![v]);
        prop_assert!(key < child);
        prop_assert!(key.is_ancestor_of(&child));
    }

    #[test]
    fn subtrees_are_contiguous(a in arb_hkey(), b in arb_hkey(), c in arb_hkey()) {
        // If a is an ancestor of c and a <= b <= c, then b lies in a's subtree too.
        let mut keys = [a, b, c];
        keys.sort();
        if keys[0].is_ancestor_of(&keys[2]) {
            prop_assert!(keys[0].is_prefix_of(&keys[1]));
        }
    }

    #[test]
    fn null_extension_precedes_real_children(key in arb_hkey(), ordinal in 1u32..4, v in arb_value()) {
        prop_assume!(!v.is_null());
        let left_join = key.extend_with_null(ordinal);
        let child = key.extend(ordinal, vec![v]);
        prop_assert!(left_join < child);
    }
}
