use crate::raw::index::KeyedIndex;
use crate::raw::ll::{Lifecycle, Link, Node, NodeList};
use crate::raw::probe::probe;
use crate::EntryOps;
use alloc::boxed::Box;
use alloc::vec::Vec;
use tracing::debug;

/// Upper bound on how many slots `RawCache::new` reserves up front.
const MAX_PRESIZE: usize = 1 << 16;

/// Payloads unlinked while the cache is borrowed, to be destroyed after.
pub(crate) type Doomed<K, V> = Vec<(K, V)>;

/// Outcome of `RawCache::lookup`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Lookup<K, V> {
    /// The entry was found and one reference was taken for the caller.
    Hit(Link<K, V>),
    /// A placeholder for the key is still being filled.
    Creating,
    Miss,
}

/// `RawCache` keeps the books of an object cache: the keyed index, the idle
/// list (most recently idled at the front), the busy list (most recently
/// touched at the front) and the capacity.
///
/// A node with exactly one reference (the index's) is idle, a node with two
/// or more is busy, and every indexed node is on exactly one of the lists.
/// Nothing in here calls user code except `EntryOps::key_hash`,
/// `EntryOps::key_equal` and `evict` predicates; payload destruction is left
/// to the caller through `Doomed`.
pub(crate) struct RawCache<K, V> {
    index: KeyedIndex<K, V>,
    idle: NodeList<K, V>,
    busy: NodeList<K, V>,
    cap: usize,
}

impl<K, V> RawCache<K, V> {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            index: KeyedIndex::with_capacity(cap.min(MAX_PRESIZE)),
            idle: NodeList::new(),
            busy: NodeList::new(),
            cap,
        }
    }

    #[inline]
    pub(crate) fn cap(&self) -> usize {
        self.cap
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        debug_assert_eq!(self.index.len(), self.idle.len() + self.busy.len());
        self.index.len()
    }

    #[inline]
    pub(crate) fn idle_len(&self) -> usize {
        self.idle.len()
    }

    #[inline]
    pub(crate) fn busy_len(&self) -> usize {
        self.busy.len()
    }

    /// Finds `key` and takes a reference on it.
    pub(crate) fn lookup<O>(&mut self, ops: &O, key: &K) -> Lookup<K, V>
    where
        O: EntryOps<K, Value = V>,
    {
        let node = match probe(ops, &self.busy, &self.idle, key) {
            Some(node) => node,
            None => match self.index.find(ops, ops.key_hash(key), key) {
                Some(node) => node,
                None => return Lookup::Miss,
            },
        };

        unsafe {
            if Node::state(node) == Lifecycle::Creating {
                return Lookup::Creating;
            }
            self.acquire(node);
        }
        Lookup::Hit(node)
    }

    /// Returns `true` if a live entry for `key` is cached. Touches nothing.
    pub(crate) fn contains<O>(&self, ops: &O, key: &K) -> bool
    where
        O: EntryOps<K, Value = V>,
    {
        match self.index.find(ops, ops.key_hash(key), key) {
            Some(node) => unsafe { Node::state(node) == Lifecycle::Live },
            None => false,
        }
    }

    unsafe fn acquire(&mut self, node: Link<K, V>) {
        let was_idle = Node::refs(node) == 1;
        Node::addref(node);
        if was_idle {
            self.idle.detach(node);
            self.busy.attach(node);
        } else {
            self.busy.move_to_front(node);
        }
    }

    /// Adds one more holder to an entry that is already held.
    pub(crate) unsafe fn retain(&mut self, node: Link<K, V>) {
        assert!(Node::refs(node) >= 2, "retaining an entry that is not held");
        Node::addref(node);
    }

    /// Publishes a `Creating` placeholder for `key`, held once by the caller.
    /// Capacity is not enforced until the placeholder is filled.
    pub(crate) fn reserve<O>(&mut self, ops: &O, key: K) -> Link<K, V>
    where
        O: EntryOps<K, Value = V>,
    {
        let hash = ops.key_hash(&key);
        let node = Node::placeholder(key, hash);
        unsafe {
            self.index.insert(node);
            Node::addref(node);
            self.busy.attach(node);
        }
        node
    }

    /// Turns a placeholder into a live entry. Idle entries pushed over
    /// capacity by it land in `doomed`.
    pub(crate) unsafe fn fill(&mut self, node: Link<K, V>, value: V, doomed: &mut Doomed<K, V>) {
        Node::fill(node, value);
        self.shrink(doomed);
    }

    /// Withdraws a placeholder that will never be filled.
    pub(crate) unsafe fn abandon(&mut self, node: Link<K, V>) -> K {
        assert_eq!(
            Node::state(node),
            Lifecycle::Creating,
            "abandoning a filled entry"
        );
        self.busy.detach(node);
        Node::decref(node);
        match self.index.remove(node) {
            Some((key, _)) => key,
            None => panic!("placeholder still referenced after abandon"),
        }
    }

    /// Drops one holder reference.
    ///
    /// On the last one the entry goes idle, or is unlinked into `doomed` if
    /// it was evicted meanwhile; either way the capacity is then enforced.
    pub(crate) unsafe fn release(&mut self, node: Link<K, V>, doomed: &mut Doomed<K, V>) {
        assert!(Node::refs(node) >= 2, "releasing an entry that is not held");
        Node::decref(node);
        if Node::refs(node) >= 2 {
            return;
        }

        self.busy.detach(node);
        match Node::state(node) {
            Lifecycle::Live => self.idle.attach(node),
            Lifecycle::Evicted => doomed.push(self.unlink(node)),
            Lifecycle::Creating => panic!("releasing an unfilled placeholder"),
        }
        self.shrink(doomed);
    }

    /// Flags a held entry for destruction on its last release.
    pub(crate) unsafe fn mark_evicted(&mut self, node: Link<K, V>) {
        assert!(Node::refs(node) >= 2, "evicting an entry that is not held");
        if Node::state(node) == Lifecycle::Live {
            Node::set_state(node, Lifecycle::Evicted);
        }
    }

    /// Forced eviction by predicate. Matching busy entries are flagged,
    /// matching idle entries are unlinked into `doomed` right away.
    /// Returns how many entries matched.
    pub(crate) fn evict<F>(&mut self, mut pred: F, doomed: &mut Doomed<K, V>) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut matched = 0;

        for node in self.busy.iter() {
            unsafe {
                if Node::state(node) != Lifecycle::Live {
                    continue;
                }
                if let Some(value) = Node::value(node) {
                    if pred(Node::key(node), value) {
                        Node::set_state(node, Lifecycle::Evicted);
                        matched += 1;
                    }
                }
            }
        }

        let mut cursor = self.idle.front();
        while let Some(node) = cursor {
            unsafe {
                cursor = NodeList::next_of(node);
                let hit = match Node::value(node) {
                    Some(value) => pred(Node::key(node), value),
                    None => false,
                };
                if hit {
                    self.idle.detach(node);
                    doomed.push(self.unlink(node));
                    matched += 1;
                }
            }
        }

        matched
    }

    /// Unlinks every idle entry into `doomed`.
    pub(crate) fn flush_idle(&mut self, doomed: &mut Doomed<K, V>) -> usize {
        let mut flushed = 0;
        while let Some(node) = self.idle.pop_back() {
            doomed.push(unsafe { self.unlink(node) });
            flushed += 1;
        }
        flushed
    }

    /// Evicts from the idle tail while over capacity.
    fn shrink(&mut self, doomed: &mut Doomed<K, V>) {
        if self.cap == 0 {
            return;
        }
        while self.len() > self.cap {
            match self.idle.pop_back() {
                Some(node) => doomed.push(unsafe { self.unlink(node) }),
                None => break,
            }
        }
    }

    /// Drops the index reference of a node already off both lists. It must
    /// be the last one.
    unsafe fn unlink(&mut self, node: Link<K, V>) -> (K, V) {
        match self.index.remove(node) {
            Some((key, Some(value))) => (key, value),
            Some((_, None)) => panic!("unlinked an entry without payload"),
            None => panic!("unlinked an entry that is still held"),
        }
    }
}

impl<K, V> Drop for RawCache<K, V> {
    fn drop(&mut self) {
        // Whatever is left belongs to handles that were leaked; their
        // payloads are dropped without going through `EntryOps::destroy`.
        let mut leaked = 0usize;
        for node in self.index.drain() {
            unsafe {
                drop(Box::from_raw(node.as_ptr()));
            }
            leaked += 1;
        }
        if leaked != 0 {
            debug!(leaked, "dropped cache entries without destroying them");
        }
    }
}
