use crate::raw::ll::{Lifecycle, Link, Node};
use crate::EntryOps;
use hashbrown::HashTable;

/// `KeyedIndex` maps keys to nodes.
///
/// Being in the index counts as one reference on the node: `insert` adds
/// it, `remove` drops it and hands the node back once nothing else holds it.
/// Evicted nodes stay in the table until then, but never compare equal to a
/// lookup key.
pub(crate) struct KeyedIndex<K, V> {
    table: HashTable<Link<K, V>>,
}

/// Equality used for every lookup, on the fast path too.
#[inline]
pub(crate) unsafe fn node_matches<K, O: EntryOps<K>>(
    ops: &O,
    node: Link<K, O::Value>,
    key: &K,
) -> bool {
    Node::state(node) != Lifecycle::Evicted && ops.key_equal(key, Node::key(node))
}

impl<K, V> KeyedIndex<K, V> {
    pub(crate) fn with_capacity(cap: usize) -> Self {
        Self {
            table: HashTable::with_capacity(cap),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.table.len()
    }

    pub(crate) fn find<O>(&self, ops: &O, hash: u64, key: &K) -> Option<Link<K, V>>
    where
        O: EntryOps<K, Value = V>,
    {
        self.table
            .find(hash, |&node| unsafe { node_matches(ops, node, key) })
            .copied()
    }

    /// Publishes `node` and takes the index reference on it.
    pub(crate) unsafe fn insert(&mut self, node: Link<K, V>) {
        Node::addref(node);
        self.table
            .insert_unique(Node::hash(node), node, |&n| Node::hash(n));
    }

    /// Unpublishes `node` and drops the index reference. Returns the key and
    /// payload when that was the last reference.
    pub(crate) unsafe fn remove(&mut self, node: Link<K, V>) -> Option<(K, Option<V>)> {
        match self.table.find_entry(Node::hash(node), |&n| n == node) {
            Ok(entry) => {
                entry.remove();
            }
            Err(_) => panic!("removing an entry that is not indexed"),
        }

        if Node::decref(node) {
            Some(Node::free(node))
        } else {
            None
        }
    }

    /// Empties the table without touching reference counts.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Link<K, V>> + '_ {
        self.table.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    struct Ident;

    impl EntryOps<u64> for Ident {
        type Value = u64;
        type Args = ();
        type Error = Infallible;

        fn key_hash(&self, key: &u64) -> u64 {
            // force every key into one bucket chain
            key % 2
        }

        fn key_equal(&self, key: &u64, cached: &u64) -> bool {
            key == cached
        }

        fn create(&self, key: &u64, _: ()) -> Result<u64, Infallible> {
            Ok(*key)
        }

        fn destroy(&self, _: &u64, _: u64) {}
    }

    fn publish(index: &mut KeyedIndex<u64, u64>, key: u64) -> Link<u64, u64> {
        let node = Node::placeholder(key, Ident.key_hash(&key));
        unsafe {
            index.insert(node);
            Node::fill(node, key * 100);
        }
        node
    }

    #[test]
    fn test_insert_takes_index_reference() {
        let mut index = KeyedIndex::with_capacity(4);
        let node = publish(&mut index, 3);
        assert_eq!(unsafe { Node::refs(node) }, 1);
        assert_eq!(index.find(&Ident, Ident.key_hash(&3), &3), Some(node));
        assert_eq!(index.find(&Ident, Ident.key_hash(&5), &5), None);

        let freed = unsafe { index.remove(node) };
        assert_eq!(freed, Some((3, Some(300))));
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_remove_keeps_held_node() {
        let mut index = KeyedIndex::with_capacity(4);
        let node = publish(&mut index, 8);
        unsafe {
            Node::addref(node);
            assert_eq!(index.remove(node), None);
            assert_eq!(Node::refs(node), 1);
            assert!(Node::decref(node));
            Node::free(node);
        }
    }

    #[test]
    fn test_evicted_never_matches() {
        let mut index = KeyedIndex::with_capacity(4);
        let old = publish(&mut index, 4);
        unsafe { Node::set_state(old, Lifecycle::Evicted) };
        assert_eq!(index.find(&Ident, Ident.key_hash(&4), &4), None);

        // a fresh entry for the same key coexists with the evicted one
        let new = publish(&mut index, 4);
        assert_eq!(index.len(), 2);
        assert_eq!(index.find(&Ident, Ident.key_hash(&4), &4), Some(new));

        unsafe {
            assert!(index.remove(old).is_some());
            assert_eq!(index.find(&Ident, Ident.key_hash(&4), &4), Some(new));
            assert!(index.remove(new).is_some());
        }
    }
}
