//! Shared de-duplication cache for generic instances

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::TypeId;

/// Maps `(origin, type arguments)` to an instance type.
///
/// Cloning a context shares the cache. Sharing is only meaningful between
/// checkers working on the same [`World`](crate::World). The cache is
/// best-effort: two checkers racing on the same key may both create an
/// instance, and the loser's instance stays valid but distinct.
#[derive(Debug, Clone, Default)]
pub struct Context {
    instances: Arc<Mutex<HashMap<(TypeId, Vec<TypeId>), TypeId>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, origin: TypeId, args: &[TypeId]) -> Option<TypeId> {
        let map = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(&(origin, args.to_vec())).copied()
    }

    /// Record `inst` unless an instance is already known; returns the
    /// instance to use.
    pub fn update(&self, origin: TypeId, args: &[TypeId], inst: TypeId) -> TypeId {
        let mut map = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        *map.entry((origin, args.to_vec())).or_insert(inst)
    }

    pub fn len(&self) -> usize {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_instance_wins() {
        let ctx = Context::new();
        let origin = TypeId(100);
        assert_eq!(ctx.update(origin, &[TypeId::INT], TypeId(101)), TypeId(101));
        assert_eq!(ctx.update(origin, &[TypeId::INT], TypeId(102)), TypeId(101));
        assert_eq!(ctx.lookup(origin, &[TypeId::INT]), Some(TypeId(101)));
        assert_eq!(ctx.lookup(origin, &[TypeId::STRING]), None);
    }

    #[test]
    fn test_clones_share_the_cache() {
        let ctx = Context::new();
        let shared = ctx.clone();
        shared.update(TypeId(100), &[], TypeId(101));
        assert_eq!(ctx.len(), 1);
    }
}
