use alloc::boxed::Box;
use core::fmt::{Debug, Formatter};
use core::marker::PhantomData;
use core::ptr::NonNull;

pub(crate) type Link<K, V> = NonNull<Node<K, V>>;

/// Where an entry is in its life. The payload never moves between states,
/// so shared borrows of it stay valid across a `Live -> Evicted` switch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    /// Published in the index, payload still being built.
    Creating,
    Live,
    /// Invisible to lookups, destroyed on the release that idles it.
    Evicted,
}

/// `Node` is one cache entry.
///
/// Every field that can change while a holder borrows the payload is
/// accessed through the raw pointer only, never through `&mut Node`.
pub(crate) struct Node<K, V> {
    key: K,
    hash: u64,
    refs: usize,
    state: Lifecycle,
    value: Option<V>,
    prev: Option<Link<K, V>>,
    next: Option<Link<K, V>>,
}

impl<K: Debug, V> Debug for Node<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("refs", &self.refs)
            .field("state", &self.state)
            .finish()
    }
}

impl<K, V> Node<K, V> {
    /// Allocates a placeholder with no references. The index reference is
    /// added by `KeyedIndex::insert`.
    pub(crate) fn placeholder(key: K, hash: u64) -> Link<K, V> {
        let node = Box::new(Node {
            key,
            hash,
            refs: 0,
            state: Lifecycle::Creating,
            value: None,
            prev: None,
            next: None,
        });
        NonNull::from(Box::leak(node))
    }

    /// Takes ownership back from a node whose last reference is gone.
    ///
    /// # Safety
    /// `node` came from `placeholder`, is linked nowhere and nothing borrows it.
    pub(crate) unsafe fn free(node: Link<K, V>) -> (K, Option<V>) {
        let node = Box::from_raw(node.as_ptr());
        debug_assert_eq!(node.refs, 0);
        (node.key, node.value)
    }

    #[inline]
    pub(crate) unsafe fn refs(node: Link<K, V>) -> usize {
        (*node.as_ptr()).refs
    }

    #[inline]
    pub(crate) unsafe fn addref(node: Link<K, V>) {
        (*node.as_ptr()).refs += 1;
    }

    /// Drops one reference, returns `true` once none are left.
    #[inline]
    pub(crate) unsafe fn decref(node: Link<K, V>) -> bool {
        let n = node.as_ptr();
        assert!((*n).refs > 0, "reference count underflow");
        (*n).refs -= 1;
        (*n).refs == 0
    }

    #[inline]
    pub(crate) unsafe fn hash(node: Link<K, V>) -> u64 {
        (*node.as_ptr()).hash
    }

    #[inline]
    pub(crate) unsafe fn state(node: Link<K, V>) -> Lifecycle {
        (*node.as_ptr()).state
    }

    #[inline]
    pub(crate) unsafe fn set_state(node: Link<K, V>, state: Lifecycle) {
        (*node.as_ptr()).state = state;
    }

    #[inline]
    pub(crate) unsafe fn key<'a>(node: Link<K, V>) -> &'a K {
        &(*node.as_ptr()).key
    }

    /// The payload of a live or evicted entry.
    #[inline]
    pub(crate) unsafe fn value<'a>(node: Link<K, V>) -> Option<&'a V> {
        (*node.as_ptr()).value.as_ref()
    }

    /// Stores the payload of a placeholder and makes it live.
    pub(crate) unsafe fn fill(node: Link<K, V>, value: V) {
        let n = node.as_ptr();
        assert_eq!((*n).state, Lifecycle::Creating, "entry already filled");
        (*n).value = Some(value);
        (*n).state = Lifecycle::Live;
    }
}

/// `NodeList` is an intrusive double direction linked list of nodes.
///
/// The front is the most recently touched node, the back the least.
pub(crate) struct NodeList<K, V> {
    head: Option<Link<K, V>>,
    tail: Option<Link<K, V>>,
    len: usize,
    marker: PhantomData<Box<Node<K, V>>>,
}

impl<K, V> Default for NodeList<K, V> {
    fn default() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            marker: PhantomData,
        }
    }
}

impl<K, V> NodeList<K, V> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn front(&self) -> Option<Link<K, V>> {
        self.head
    }

    #[cfg(test)]
    pub(crate) fn back(&self) -> Option<Link<K, V>> {
        self.tail
    }

    /// The node after `node`, walking front to back.
    #[inline]
    pub(crate) unsafe fn next_of(node: Link<K, V>) -> Option<Link<K, V>> {
        (*node.as_ptr()).next
    }

    /// `move_to_front` moves `ent` to the front of the list.
    /// `ent` must be an element of this list.
    pub(crate) unsafe fn move_to_front(&mut self, ent: Link<K, V>) {
        if self.head != Some(ent) {
            self.detach(ent);
            self.attach(ent);
        }
    }

    pub(crate) unsafe fn detach(&mut self, ent: Link<K, V>) {
        let n = ent.as_ptr();
        // Not creating new mutable (unique!) references overlapping the payload.
        match (*n).prev {
            Some(prev) => (*prev.as_ptr()).next = (*n).next,
            // this node is the head node
            None => self.head = (*n).next,
        };

        match (*n).next {
            Some(next) => (*next.as_ptr()).prev = (*n).prev,
            // this node is the tail node
            None => self.tail = (*n).prev,
        };
        (*n).prev = None;
        (*n).next = None;
        self.len -= 1;
    }

    // attach entry at the front
    pub(crate) unsafe fn attach(&mut self, ent: Link<K, V>) {
        let n = ent.as_ptr();
        (*n).next = self.head;
        (*n).prev = None;

        match self.head {
            None => self.tail = Some(ent),
            Some(head) => (*head.as_ptr()).prev = Some(ent),
        }

        self.head = Some(ent);
        self.len += 1;
    }

    /// Detaches and returns the back node.
    pub(crate) fn pop_back(&mut self) -> Option<Link<K, V>> {
        let tail = self.tail?;
        unsafe { self.detach(tail) };
        Some(tail)
    }

    /// Walks the list front to back.
    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            next: self.head,
            len: self.len,
            marker: PhantomData,
        }
    }
}

pub(crate) struct Iter<'a, K, V> {
    next: Option<Link<K, V>>,
    len: usize,
    marker: PhantomData<&'a Node<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = Link<K, V>;

    fn next(&mut self) -> Option<Link<K, V>> {
        let node = self.next?;
        self.next = unsafe { NodeList::next_of(node) };
        self.len -= 1;
        Some(node)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn keys(list: &NodeList<u32, ()>) -> Vec<u32> {
        list.iter().map(|n| unsafe { *Node::key(n) }).collect()
    }

    fn release_all(list: &mut NodeList<u32, ()>) {
        while let Some(n) = list.pop_back() {
            unsafe { Node::free(n) };
        }
    }

    #[test]
    fn test_attach_detach() {
        let mut list = NodeList::new();
        let a = Node::<u32, ()>::placeholder(1, 1);
        let b = Node::placeholder(2, 2);
        let c = Node::placeholder(3, 3);
        unsafe {
            list.attach(a);
            list.attach(b);
            list.attach(c);
        }
        assert_eq!(keys(&list), [3, 2, 1]);
        assert_eq!(list.front(), Some(c));
        assert_eq!(list.back(), Some(a));

        unsafe { list.detach(b) };
        assert_eq!(keys(&list), [3, 1]);
        assert_eq!(list.len(), 2);

        unsafe { list.move_to_front(a) };
        assert_eq!(keys(&list), [1, 3]);

        unsafe { Node::free(b) };
        release_all(&mut list);
        assert_eq!(list.len(), 0);
        assert!(list.front().is_none());
        assert!(list.back().is_none());
    }

    #[test]
    fn test_pop_back_is_lru_order() {
        let mut list = NodeList::new();
        for k in 0..4 {
            unsafe { list.attach(Node::<u32, ()>::placeholder(k, 0)) };
        }
        let first = list.pop_back().unwrap();
        assert_eq!(unsafe { *Node::key(first) }, 0);
        assert_eq!(keys(&list), [3, 2, 1]);
        unsafe { Node::free(first) };
        release_all(&mut list);
    }

    #[test]
    fn test_refcount_and_lifecycle() {
        let n = Node::<u32, &str>::placeholder(9, 0);
        unsafe {
            assert_eq!(Node::state(n), Lifecycle::Creating);
            assert!(Node::value(n).is_none());
            Node::addref(n);
            Node::addref(n);
            assert_eq!(Node::refs(n), 2);
            Node::fill(n, "payload");
            assert_eq!(Node::state(n), Lifecycle::Live);
            assert_eq!(Node::value(n), Some(&"payload"));
            assert!(!Node::decref(n));
            assert!(Node::decref(n));
            let (k, v) = Node::free(n);
            assert_eq!((k, v), (9, Some("payload")));
        }
    }
}
