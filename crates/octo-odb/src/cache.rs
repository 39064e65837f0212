use std::num::NonZeroUsize;

use lru::LruCache;
use octo_hash::ObjectId;
use octo_object::Object;

/// LRU cache of parsed objects, keyed by id.
pub(crate) struct ObjectCache {
    entries: LruCache<ObjectId, Object>,
}

impl ObjectCache {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub(crate) fn get(&mut self, oid: &ObjectId) -> Option<Object> {
        self.entries.get(oid).cloned()
    }

    pub(crate) fn insert(&mut self, oid: ObjectId, obj: Object) {
        self.entries.put(oid, obj);
    }

    pub(crate) fn contains(&self, oid: &ObjectId) -> bool {
        self.entries.contains(oid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octo_object::Blob;

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = ObjectCache::new(2);
        let ids: Vec<_> = (1..=3u8).map(|n| ObjectId::Sha1([n; 20])).collect();
        cache.insert(ids[0], Object::Blob(Blob::new(vec![1])));
        cache.insert(ids[1], Object::Blob(Blob::new(vec![2])));
        assert!(cache.get(&ids[0]).is_some());
        cache.insert(ids[2], Object::Blob(Blob::new(vec![3])));

        assert!(cache.contains(&ids[0]));
        assert!(!cache.contains(&ids[1]));
        assert!(cache.contains(&ids[2]));
    }
}
