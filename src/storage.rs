//! Registry state
//!
//! Shared instances and bound definitions, both keyed by identifier and
//! backed by `DashMap` for concurrent access. A definition slot may hold a
//! cached failure so that probing an unknown identifier stays O(1).

use crate::definition::Definition;
use crate::error::DefinitionError;
use crate::value::Value;
use ahash::RandomState;
use dashmap::DashMap;
use std::collections::BTreeSet;

/// A bound definition or the failure recorded for it
pub(crate) type DefinitionSlot = Result<Definition, DefinitionError>;

pub(crate) struct RegistryStorage {
    /// Shared instances; a stored `Value::Null` is "bound to null", not absent
    entries: DashMap<String, Value, RandomState>,
    definitions: DashMap<String, DefinitionSlot, RandomState>,
}

impl RegistryStorage {
    /// Create empty storage.
    ///
    /// Uses 8 shards: registries are small and creation cost matters more
    /// than write contention.
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create with pre-allocated capacity, scaling the shard count with it
    pub fn with_capacity(capacity: usize) -> Self {
        let shard_amount = if capacity <= 16 {
            8
        } else if capacity <= 64 {
            16
        } else {
            32
        };
        Self {
            entries: DashMap::with_capacity_and_hasher_and_shard_amount(capacity, RandomState::new(), shard_amount),
            definitions: DashMap::with_capacity_and_hasher_and_shard_amount(
                capacity,
                RandomState::new(),
                shard_amount,
            ),
        }
    }

    // =========================================================================
    // Shared instances
    // =========================================================================

    #[inline]
    pub fn entry(&self, id: &str) -> Option<Value> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    #[inline]
    pub fn contains_entry(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    #[inline]
    pub fn insert_entry(&self, id: impl Into<String>, value: Value) {
        self.entries.insert(id.into(), value);
    }

    /// Store `value` unless an instance was shared concurrently; return the winner
    pub fn share(&self, id: &str, value: Value) -> Value {
        self.entries.entry(id.to_owned()).or_insert(value).value().clone()
    }

    #[inline]
    pub fn remove_entry(&self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    #[inline]
    pub fn clear_entries(&self) {
        self.entries.clear();
    }

    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    #[inline]
    pub fn definition(&self, id: &str) -> Option<DefinitionSlot> {
        self.definitions.get(id).map(|slot| slot.value().clone())
    }

    #[inline]
    pub fn insert_definition(&self, id: impl Into<String>, slot: DefinitionSlot) {
        self.definitions.insert(id.into(), slot);
    }

    /// Cache a derived slot unless one was bound concurrently; return the winner
    pub fn remember_definition(&self, id: &str, slot: DefinitionSlot) -> DefinitionSlot {
        self.definitions.entry(id.to_owned()).or_insert(slot).value().clone()
    }

    #[inline]
    pub fn remove_definition(&self, id: &str) -> bool {
        self.definitions.remove(id).is_some()
    }

    #[inline]
    pub fn clear_definitions(&self) {
        self.definitions.clear();
    }

    /// Number of successfully bound definitions
    pub fn definition_count(&self) -> usize {
        self.definitions.iter().filter(|slot| slot.value().is_ok()).count()
    }

    /// Identifiers with a shared instance or a usable definition, sorted
    pub fn identifiers(&self) -> Vec<String> {
        let mut identifiers: BTreeSet<String> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        identifiers.extend(
            self.definitions
                .iter()
                .filter(|slot| slot.value().is_ok())
                .map(|slot| slot.key().clone()),
        );
        identifiers.into_iter().collect()
    }
}

impl Default for RegistryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RegistryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryStorage")
            .field("entries", &self.entries.len())
            .field("definitions", &self.definitions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReflectionError;

    #[test]
    fn test_null_entry_is_present() {
        let storage = RegistryStorage::new();
        storage.insert_entry("nothing", Value::Null);

        assert!(storage.contains_entry("nothing"));
        assert!(storage.entry("nothing").unwrap().is_null());
        assert!(storage.entry("missing").is_none());
    }

    #[test]
    fn test_share_keeps_first() {
        let storage = RegistryStorage::new();
        let first = storage.share("id", Value::new(1u8));
        let second = storage.share("id", Value::new(2u8));

        assert!(Value::ptr_eq(&first, &second));
        assert_eq!(*second.downcast::<u8>().unwrap(), 1);
    }

    #[test]
    fn test_failed_definitions_are_not_identifiers() {
        let storage = RegistryStorage::with_capacity(100);
        storage.insert_entry("b", Value::Null);
        storage.insert_entry("a", Value::Null);
        let slot = storage.remember_definition("ghost", Err(ReflectionError::TypeNotFound("ghost".into()).into()));
        assert!(slot.is_err());

        assert_eq!(storage.identifiers(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(storage.definition_count(), 0);
        assert!(storage.definition("ghost").unwrap().is_err());

        assert!(storage.remove_entry("a"));
        assert!(!storage.remove_entry("a"));
        storage.clear_entries();
        assert_eq!(storage.entry_count(), 0);
    }
}
