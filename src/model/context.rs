//! Per-solution storage of search contexts.
//!
//! Every search component that needs per-thread state obtains a
//! [`ContextKey`] when it is constructed. The state itself lives inside
//! the [`Solution`](super::Solution) of each thread, in a slot addressed by
//! that key, so it is created lazily on first use and dropped together
//! with the solution.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_KEY: AtomicUsize = AtomicUsize::new(0);

/// Slot address of one search component's context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextKey(usize);

impl ContextKey {
    /// Allocates a fresh key.
    pub fn next() -> Self {
        ContextKey(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

/// Arena of type-erased contexts indexed by [`ContextKey`].
#[derive(Default)]
pub(crate) struct ContextStore {
    slots: Vec<Option<Box<dyn Any + Send>>>,
}

impl ContextStore {
    pub(crate) fn take<C: Any + Send>(&mut self, key: ContextKey) -> Option<Box<C>> {
        let slot = self.slots.get_mut(key.0)?.take()?;
        slot.downcast::<C>().ok()
    }

    pub(crate) fn put<C: Any + Send>(&mut self, key: ContextKey, context: Box<C>) {
        if self.slots.len() <= key.0 {
            self.slots.resize_with(key.0 + 1, || None);
        }
        self.slots[key.0] = Some(context);
    }

    pub(crate) fn get_mut<C: Any + Send>(&mut self, key: ContextKey) -> Option<&mut C> {
        self.slots
            .get_mut(key.0)?
            .as_mut()?
            .downcast_mut::<C>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_distinct() {
        assert_ne!(ContextKey::next(), ContextKey::next());
    }

    #[test]
    fn test_take_put_roundtrip() {
        let mut store = ContextStore::default();
        let key = ContextKey::next();
        assert!(store.take::<u32>(key).is_none());
        store.put(key, Box::new(5u32));
        *store.get_mut::<u32>(key).unwrap() += 1;
        assert_eq!(*store.take::<u32>(key).unwrap(), 6);
        assert!(store.get_mut::<u32>(key).is_none());
    }
}
