//! Stock filter predicates.
//!
//! A region typically exposes two projections over the same source: every
//! registered item, and only the active ones.

use std::sync::Arc;

use crate::item::TaggedItem;
use crate::projection::FilterFn;

/// Accepts every item.
pub fn all<T: 'static>() -> FilterFn<T> {
    Arc::new(|_: &TaggedItem<T>| true)
}

/// Accepts items whose active flag is set.
pub fn active<T: 'static>() -> FilterFn<T> {
    Arc::new(|item: &TaggedItem<T>| item.is_active())
}

/// Accepts items carrying the given name.
pub fn named<T: 'static>(name: impl Into<String>) -> FilterFn<T> {
    let name = name.into();
    Arc::new(move |item: &TaggedItem<T>| item.has_name(&name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_filters() {
        let idle = TaggedItem::new(1).with_name("idle");
        let busy = TaggedItem::active(2);

        assert!(all()(&idle));
        assert!(!active()(&idle));
        assert!(active()(&busy));
        assert!(named("idle")(&idle));
        assert!(!named("idle")(&busy));
    }
}
