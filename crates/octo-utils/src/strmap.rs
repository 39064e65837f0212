//! String-keyed maps with an explicit key-ownership policy.
//!
//! A [`StrMap`] either borrows the caller's keys for its own lifetime or
//! copies them on insert. [`StrIntMap`] adds counter semantics on top.

use std::borrow::Cow;
use std::collections::hash_map::{self, HashMap};

use bstr::{BStr, ByteSlice};

/// Whether inserted keys are copied into the map or borrowed from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyOwnership {
    #[default]
    Duplicate,
    Borrow,
}

/// Hash map from byte-string keys to `V`.
#[derive(Debug, Clone)]
pub struct StrMap<'a, V> {
    entries: HashMap<Cow<'a, BStr>, V>,
    ownership: KeyOwnership,
}

impl<'a, V> StrMap<'a, V> {
    pub fn new(ownership: KeyOwnership) -> Self {
        Self {
            entries: HashMap::new(),
            ownership,
        }
    }

    pub fn ownership(&self) -> KeyOwnership {
        self.ownership
    }

    /// Insert `value` under `key`, returning the previous value if any.
    pub fn put(&mut self, key: &'a [u8], value: V) -> Option<V> {
        let key = key.as_bstr();
        let key = match self.ownership {
            KeyOwnership::Borrow => Cow::Borrowed(key),
            KeyOwnership::Duplicate => Cow::Owned(key.to_owned()),
        };
        self.entries.insert(key, value)
    }

    /// Insert under a copy of `key`, whatever the map's policy.
    pub fn put_copy(&mut self, key: &[u8], value: V) -> Option<V> {
        self.entries.insert(Cow::Owned(key.as_bstr().to_owned()), value)
    }

    pub fn get(&self, key: &[u8]) -> Option<&V> {
        self.entries.get(key.as_bstr())
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        self.entries.get_mut(key.as_bstr())
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key.as_bstr())
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        self.entries.remove(key.as_bstr())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate entries in unspecified order.
    pub fn iter(&self) -> Iter<'_, 'a, V> {
        Iter {
            inner: self.entries.iter(),
        }
    }
}

impl<V> Default for StrMap<'_, V> {
    fn default() -> Self {
        Self::new(KeyOwnership::default())
    }
}

pub struct Iter<'m, 'a, V> {
    inner: hash_map::Iter<'m, Cow<'a, BStr>, V>,
}

impl<'m, V> Iterator for Iter<'m, '_, V> {
    type Item = (&'m BStr, &'m V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (&**k, v))
    }
}

/// String to integer map used for tallies.
#[derive(Debug, Clone, Default)]
pub struct StrIntMap<'a> {
    map: StrMap<'a, i64>,
    default_value: i64,
}

impl<'a> StrIntMap<'a> {
    pub fn new(ownership: KeyOwnership, default_value: i64) -> Self {
        Self {
            map: StrMap::new(ownership),
            default_value,
        }
    }

    /// Value stored under `key`, or the map's default.
    pub fn get(&self, key: &[u8]) -> i64 {
        self.map.get(key).copied().unwrap_or(self.default_value)
    }

    pub fn set(&mut self, key: &'a [u8], value: i64) {
        self.map.put(key, value);
    }

    /// Add `amount` to the value under `key`, starting from the default.
    pub fn incr(&mut self, key: &'a [u8], amount: i64) {
        if let Some(slot) = self.map.get_mut(key) {
            *slot += amount;
            return;
        }
        self.map.put(key, self.default_value + amount);
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.contains(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Sum of all stored values.
    pub fn total(&self) -> i64 {
        self.map.iter().map(|(_, v)| *v).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BStr, i64)> + '_ {
        self.map.iter().map(|(k, v)| (k, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borrowed_keys_point_into_caller_storage() {
        let paths = vec![b"a/b".to_vec(), b"c".to_vec()];
        let mut map = StrMap::new(KeyOwnership::Borrow);
        for (i, p) in paths.iter().enumerate() {
            map.put(p, i);
        }
        assert_eq!(map.get(b"a/b"), Some(&0));
        assert_eq!(map.get(b"c"), Some(&1));
        assert!(map.get(b"missing").is_none());
    }

    #[test]
    fn duplicated_keys_outlive_the_source() {
        let mut map = StrMap::new(KeyOwnership::Duplicate);
        {
            let key = String::from("temp");
            map.put_copy(key.as_bytes(), 7u8);
        }
        assert_eq!(map.get(b"temp"), Some(&7));
    }

    #[test]
    fn put_replaces_and_remove_returns_value() {
        let mut map = StrMap::default();
        assert_eq!(map.put(b"k", 1), None);
        assert_eq!(map.put(b"k", 2), Some(1));
        assert_eq!(map.len(), 1);
        assert_eq!(map.remove(b"k"), Some(2));
        assert!(map.is_empty());
    }

    #[test]
    fn counters_start_from_default() {
        let mut tally = StrIntMap::new(KeyOwnership::Borrow, 0);
        tally.incr(b"content", 1);
        tally.incr(b"content", 1);
        tally.incr(b"permission", 1);

        assert_eq!(tally.get(b"content"), 2);
        assert_eq!(tally.get(b"permission"), 1);
        assert_eq!(tally.get(b"overwrite"), 0);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn non_zero_default_applies_to_first_increment() {
        let mut map = StrIntMap::new(KeyOwnership::Duplicate, 10);
        map.incr(b"x", 5);
        map.set(b"y", -1);
        assert_eq!(map.get(b"x"), 15);
        assert_eq!(map.get(b"y"), -1);
        assert_eq!(map.get(b"z"), 10);
    }
}
