//! Type keys for the heterogeneous session store

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Stable identifier of a Rust type (sized or trait object) used as a store key.
///
/// Equality and hashing only look at the `TypeId`; the name is kept for logs
/// and error messages.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: std::any::type_name::<T>() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named {}

    #[test]
    fn test_keys_distinguish_types() {
        assert_eq!(TypeKey::of::<String>(), TypeKey::of::<String>());
        assert_ne!(TypeKey::of::<String>(), TypeKey::of::<u32>());
        assert_ne!(TypeKey::of::<dyn Named>(), TypeKey::of::<String>());
        assert!(TypeKey::of::<dyn Named>().name().contains("Named"));
    }
}
