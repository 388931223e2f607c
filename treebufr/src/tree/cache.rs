use super::DescriptorTree;
use crate::errors::Result;
use bufrtables::{FXY, LocalKey, TableKey, TableLookup};
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

/// A descriptor list together with the tables it was resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    pub descriptors: Vec<FXY>,
    pub tables: TableKey,
}

/// Shared cache of built trees. Trees are immutable once built and handed
/// out as `Arc`s, so concurrent decoders can share one cache.
#[derive(Debug, Default)]
pub struct TreeCache {
    trees: RwLock<FxHashMap<SchemaKey, Arc<DescriptorTree>>>,
}

impl TreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, descriptors: &[FXY], key: &TableKey) -> Option<Arc<DescriptorTree>> {
        let schema = SchemaKey {
            descriptors: descriptors.to_vec(),
            tables: *key,
        };
        self.trees
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&schema)
            .cloned()
    }

    pub fn get_or_build(
        &self,
        descriptors: &[FXY],
        tables: &dyn TableLookup,
        key: &TableKey,
    ) -> Result<Arc<DescriptorTree>> {
        if let Some(tree) = self.get(descriptors, key) {
            return Ok(tree);
        }

        let tree = Arc::new(DescriptorTree::build(descriptors, tables, key)?);
        let schema = SchemaKey {
            descriptors: descriptors.to_vec(),
            tables: *key,
        };
        let mut trees = self.trees.write().unwrap_or_else(|e| e.into_inner());
        Ok(trees.entry(schema).or_insert(tree).clone())
    }

    /// Drop every tree built under `local`, after its tables changed.
    pub fn invalidate(&self, local: &LocalKey) -> usize {
        let mut trees = self.trees.write().unwrap_or_else(|e| e.into_inner());
        let before = trees.len();
        trees.retain(|schema, _| schema.tables.local_key() != *local);
        before - trees.len()
    }

    pub fn len(&self) -> usize {
        self.trees.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::fixtures::{key, store};

    #[test]
    fn test_cache_returns_shared_tree() {
        let cache = TreeCache::new();
        let tables = store();
        let descriptors = [FXY::new(3, 1, 11)];
        let a = cache.get_or_build(&descriptors, &tables, &key()).unwrap();
        let b = cache.get_or_build(&descriptors, &tables, &key()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_by_local_key() {
        let cache = TreeCache::new();
        let tables = store();
        let other = TableKey {
            center: 7,
            ..key()
        };
        cache.get_or_build(&[FXY::new(0, 7, 4)], &tables, &key()).unwrap();
        cache.get_or_build(&[FXY::new(0, 7, 4)], &tables, &other).unwrap();

        assert_eq!(cache.invalidate(&key().local_key()), 1);
        assert!(cache.get(&[FXY::new(0, 7, 4)], &key()).is_none());
        assert!(cache.get(&[FXY::new(0, 7, 4)], &other).is_some());
    }
}
