//! Comparator builders for sorted projections.

use std::sync::Arc;

use crate::projection::CompareFn;

/// Orders payloads by a key extracted from each.
pub fn by_key<T, K, F>(key: F) -> CompareFn<T>
where
    T: 'static,
    K: Ord + 'static,
    F: Fn(&T) -> K + Send + Sync + 'static,
{
    Arc::new(move |a: &T, b: &T| key(a).cmp(&key(b)))
}

/// Inverts an existing comparator.
pub fn reversed<T: 'static>(compare: CompareFn<T>) -> CompareFn<T> {
    Arc::new(move |a: &T, b: &T| compare(a, b).reverse())
}

/// Orders payloads by their natural ordering.
pub fn natural<T: Ord + 'static>() -> CompareFn<T> {
    Arc::new(|a: &T, b: &T| a.cmp(b))
}
