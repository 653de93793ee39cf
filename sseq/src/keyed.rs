use std::collections::HashMap;
use std::fmt;

/// Associative map keyed by a string derived from the item, not by identity.
///
/// The key function is fixed at construction so that a table rebuilt after a
/// document load resolves the same items as the one built live.
pub struct KeyedMap<T: ?Sized, V> {
    key_of: fn(&T) -> String,
    entries: HashMap<String, V>,
}

impl<T: ?Sized, V> KeyedMap<T, V> {
    pub fn new(key_of: fn(&T) -> String) -> Self {
        KeyedMap {
            key_of,
            entries: HashMap::new(),
        }
    }

    fn key(&self, item: &T) -> String {
        (self.key_of)(item)
    }
    pub fn insert(&mut self, item: &T, value: V) -> Option<V> {
        self.entries.insert(self.key(item), value)
    }
    pub fn get(&self, item: &T) -> Option<&V> {
        self.entries.get(&self.key(item))
    }
    pub fn remove(&mut self, item: &T) -> Option<V> {
        let k = self.key(item);
        self.entries.remove(&k)
    }
}

impl<T: ?Sized, V: fmt::Debug> fmt::Debug for KeyedMap<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}
