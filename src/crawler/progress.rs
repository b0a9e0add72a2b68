//! Progress observation hooks

use std::fmt;

/// Kind of entity that was just published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Brand,
    Product,
    Quantity,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Brand => "brand",
            EntityKind::Product => "product",
            EntityKind::Quantity => "quantity",
        };
        f.write_str(name)
    }
}

/// Observer called synchronously after each successful publish
///
/// Observers only watch; they cannot influence the crawl. Calls may come
/// from concurrent phases, so implementations must be thread-safe.
pub trait ProgressObserver: Send + Sync {
    fn on_published(&self, kind: EntityKind);
}

impl<F> ProgressObserver for F
where
    F: Fn(EntityKind) + Send + Sync,
{
    fn on_published(&self, kind: EntityKind) {
        self(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_closure_observer() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let observer: Box<dyn ProgressObserver> = Box::new(move |kind: EntityKind| {
            if kind == EntityKind::Product {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        observer.on_published(EntityKind::Product);
        observer.on_published(EntityKind::Brand);
        observer.on_published(EntityKind::Product);

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_entity_kind_display() {
        assert_eq!(EntityKind::Quantity.to_string(), "quantity");
    }
}
