//! Bounded map with least-recently-used eviction
//!
//! Entries live in a slot map threaded into a doubly-linked recency list; a
//! hash index maps keys to slots, so lookups, touches, inserts and evictions
//! are O(1). An optional hook receives every evicted entry synchronously,
//! before the insert that caused the overflow completes.

use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;

use slotmap::{DefaultKey, SlotMap};

type EvictionHook<K, V> = Box<dyn FnMut(K, V) + Send>;

struct Node<K, V> {
    key: K,
    value: V,
    /// Neighbour towards the most recently used end
    prev: Option<DefaultKey>,
    /// Neighbour towards the least recently used end
    next: Option<DefaultKey>,
}

pub struct LruMap<K, V> {
    capacity: NonZeroUsize,
    index: HashMap<K, DefaultKey>,
    nodes: SlotMap<DefaultKey, Node<K, V>>,
    /// Most recently used
    head: Option<DefaultKey>,
    /// Least recently used
    tail: Option<DefaultKey>,
    on_evict: Option<EvictionHook<K, V>>,
}

impl<K: Eq + Hash + Clone, V> LruMap<K, V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            index: HashMap::with_capacity(capacity.get()),
            nodes: SlotMap::with_capacity(capacity.get()),
            head: None,
            tail: None,
            on_evict: None,
        }
    }

    /// Create a map whose capacity evictions are handed to `hook`
    pub fn with_eviction_hook<F>(capacity: NonZeroUsize, hook: F) -> Self
    where
        F: FnMut(K, V) + Send + 'static,
    {
        let mut map = Self::new(capacity);
        map.on_evict = Some(Box::new(hook));
        map
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Look up `key`, marking it most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let slot = *self.index.get(key)?;
        self.touch(slot);
        self.nodes.get(slot).map(|node| &node.value)
    }

    /// Look up `key` without changing recency
    pub fn peek(&self, key: &K) -> Option<&V> {
        let slot = self.index.get(key)?;
        self.nodes.get(*slot).map(|node| &node.value)
    }

    /// Insert or replace `key` as the most recently used entry.
    ///
    /// Replacing returns the previous value and never evicts. Inserting a new
    /// key into a full map first evicts the least recently used entry through
    /// the eviction hook.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&slot) = self.index.get(&key) {
            self.touch(slot);
            return self
                .nodes
                .get_mut(slot)
                .map(|node| std::mem::replace(&mut node.value, value));
        }

        if self.nodes.len() >= self.capacity.get() {
            self.evict_lru();
        }

        let slot = self.nodes.insert(Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        });
        self.index.insert(key, slot);
        self.attach_front(slot);
        None
    }

    /// Remove `key` without invoking the eviction hook
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.index.remove(key)?;
        self.detach(slot);
        self.nodes.remove(slot).map(|node| node.value)
    }

    /// Remove every entry, least recently used first, without invoking the hook
    pub fn drain(&mut self) -> Vec<(K, V)> {
        let mut entries = Vec::with_capacity(self.nodes.len());
        while let Some(slot) = self.tail {
            self.detach(slot);
            if let Some(node) = self.nodes.remove(slot) {
                self.index.remove(&node.key);
                entries.push((node.key, node.value));
            }
        }
        entries
    }

    /// Keys ordered from most to least recently used
    pub fn keys(&self) -> Vec<&K> {
        let mut keys = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            let Some(node) = self.nodes.get(slot) else {
                break;
            };
            keys.push(&node.key);
            cursor = node.next;
        }
        keys
    }

    fn evict_lru(&mut self) {
        let Some(slot) = self.tail else {
            return;
        };
        self.detach(slot);
        if let Some(node) = self.nodes.remove(slot) {
            self.index.remove(&node.key);
            if let Some(hook) = self.on_evict.as_mut() {
                hook(node.key, node.value);
            }
        }
    }

    fn touch(&mut self, slot: DefaultKey) {
        if self.head == Some(slot) {
            return;
        }
        self.detach(slot);
        self.attach_front(slot);
    }

    fn detach(&mut self, slot: DefaultKey) {
        let Some(node) = self.nodes.get_mut(slot) else {
            return;
        };
        let (prev, next) = (node.prev.take(), node.next.take());

        match prev {
            Some(p) => {
                if let Some(prev_node) = self.nodes.get_mut(p) {
                    prev_node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(next_node) = self.nodes.get_mut(n) {
                    next_node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn attach_front(&mut self, slot: DefaultKey) {
        let old_head = self.head;
        if let Some(node) = self.nodes.get_mut(slot) {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head
            && let Some(head_node) = self.nodes.get_mut(h)
        {
            head_node.prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let mut map = LruMap::new(capacity(3));
        map.insert("a", 1);
        map.insert("b", 2);
        assert_eq!(map.get(&"a"), Some(&1));
        assert_eq!(map.peek(&"b"), Some(&2));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&"z"), None);
    }

    #[test]
    fn test_recency_order() {
        let mut map = LruMap::new(capacity(3));
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("c", 3);
        assert_eq!(map.keys(), vec![&"c", &"b", &"a"]);

        map.get(&"a");
        assert_eq!(map.keys(), vec![&"a", &"c", &"b"]);

        map.peek(&"b");
        assert_eq!(map.keys(), vec![&"a", &"c", &"b"]);
    }

    #[test]
    fn test_overflow_evicts_least_recently_used_through_hook() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = evicted.clone();
        let mut map = LruMap::with_eviction_hook(capacity(2), move |k, v| {
            sink.lock().unwrap().push((k, v));
        });

        map.insert("a", 1);
        map.insert("b", 2);
        map.get(&"a");
        map.insert("c", 3);

        assert_eq!(*evicted.lock().unwrap(), vec![("b", 2)]);
        assert!(!map.contains_key(&"b"));
        assert_eq!(map.keys(), vec![&"c", &"a"]);
    }

    #[test]
    fn test_replace_does_not_evict() {
        let evictions = Arc::new(Mutex::new(0));
        let counter = evictions.clone();
        let mut map = LruMap::with_eviction_hook(capacity(1), move |_k, _v| {
            *counter.lock().unwrap() += 1;
        });

        map.insert("a", 1);
        assert_eq!(map.insert("a", 10), Some(1));
        assert_eq!(*evictions.lock().unwrap(), 0);
        assert_eq!(map.get(&"a"), Some(&10));
    }

    #[test]
    fn test_capacity_one_keeps_latest() {
        let mut map = LruMap::new(capacity(1));
        map.insert("a", 1);
        map.insert("b", 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map.keys(), vec![&"b"]);
    }

    #[test]
    fn test_remove_and_drain() {
        let mut map = LruMap::new(capacity(4));
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("c", 3);

        assert_eq!(map.remove(&"b"), Some(2));
        assert_eq!(map.keys(), vec![&"c", &"a"]);

        assert_eq!(map.drain(), vec![("a", 1), ("c", 3)]);
        assert!(map.is_empty());
        assert!(map.keys().is_empty());

        map.insert("d", 4);
        assert_eq!(map.keys(), vec![&"d"]);
    }
}
