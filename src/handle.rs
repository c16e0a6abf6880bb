use crate::cache::Shared;
use crate::ops::KeyDisplay;
use crate::raw::{Link, Node};
use crate::EntryOps;
use alloc::rc::Rc;
use core::fmt;
use core::ops::Deref;
use tracing::debug;

/// `Held` is a counted reference to a cached entry, returned by
/// [`ObjectCache::hold`].
///
/// Only the cache can make one. Cloning takes another reference on the same
/// entry; dropping gives one back. While any `Held` for an entry exists its
/// payload is never destroyed, even if the entry gets evicted.
///
/// [`ObjectCache::hold`]: struct.ObjectCache.html#method.hold
pub struct Held<K, O: EntryOps<K>> {
    pub(crate) shared: Rc<Shared<K, O>>,
    pub(crate) node: Link<K, O::Value>,
}

impl<K, O: EntryOps<K>> Held<K, O> {
    pub(crate) fn new(shared: Rc<Shared<K, O>>, node: Link<K, O::Value>) -> Self {
        Self { shared, node }
    }

    /// Returns the key of the entry.
    pub fn key(&self) -> &K {
        unsafe { Node::key(self.node) }
    }

    /// Returns `true` once the entry is flagged for destruction. New lookups
    /// no longer find it.
    pub fn is_evicted(&self) -> bool {
        unsafe { Node::state(self.node) == crate::raw::Lifecycle::Evicted }
    }

    /// Returns `true` if this is the only outstanding reference.
    pub fn is_last_user(&self) -> bool {
        // one reference belongs to the index
        unsafe { Node::refs(self.node) <= 2 }
    }

    /// Returns `true` if both handles refer to the same entry.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.node == other.node
    }
}

impl<K, O: EntryOps<K>> Deref for Held<K, O> {
    type Target = O::Value;

    fn deref(&self) -> &O::Value {
        match unsafe { Node::value(self.node) } {
            Some(value) => value,
            None => unreachable!("held entry without payload"),
        }
    }
}

impl<K, O: EntryOps<K>> Clone for Held<K, O> {
    fn clone(&self) -> Self {
        self.shared
            .with_raw(|raw, _| unsafe { raw.retain(self.node) });
        Self::new(self.shared.clone(), self.node)
    }
}

impl<K, O: EntryOps<K>> Drop for Held<K, O> {
    fn drop(&mut self) {
        let node = self.node;
        self.shared
            .with_raw(|raw, doomed| unsafe { raw.release(node, doomed) });
    }
}

impl<K: fmt::Debug, O: EntryOps<K>> fmt::Debug for Held<K, O>
where
    O::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Held")
            .field("key", self.key())
            .field("value", &**self)
            .field("evicted", &self.is_evicted())
            .finish()
    }
}

/// `Reservation` is a published placeholder for an entry whose payload the
/// caller builds itself, see [`ObjectCache::hold_or_reserve`].
///
/// Until it is fulfilled, holds on the same key fail with
/// [`HoldError::Creating`]. Dropping it unfulfilled withdraws the
/// placeholder.
///
/// [`ObjectCache::hold_or_reserve`]: struct.ObjectCache.html#method.hold_or_reserve
/// [`HoldError::Creating`]: enum.HoldError.html#variant.Creating
#[must_use = "an unfulfilled reservation is withdrawn when dropped"]
pub struct Reservation<K, O: EntryOps<K>> {
    shared: Rc<Shared<K, O>>,
    node: Option<Link<K, O::Value>>,
}

impl<K, O: EntryOps<K>> Reservation<K, O> {
    pub(crate) fn new(shared: Rc<Shared<K, O>>, node: Link<K, O::Value>) -> Self {
        Self {
            shared,
            node: Some(node),
        }
    }

    /// Returns the reserved key.
    pub fn key(&self) -> &K {
        match self.node {
            Some(node) => unsafe { Node::key(node) },
            None => unreachable!("reservation already consumed"),
        }
    }

    /// Installs the payload and turns the reservation into a [`Held`].
    ///
    /// [`Held`]: struct.Held.html
    pub fn fulfill(mut self, value: O::Value) -> Held<K, O> {
        let node = match self.node.take() {
            Some(node) => node,
            None => unreachable!("reservation already consumed"),
        };
        self.shared
            .with_raw(|raw, doomed| unsafe { raw.fill(node, value, doomed) });
        debug!(
            key = %KeyDisplay { ops: &self.shared.ops, key: unsafe { Node::key(node) } },
            "created cache entry"
        );
        Held::new(self.shared.clone(), node)
    }

    /// Withdraws the placeholder.
    pub fn abandon(self) {}
}

impl<K, O: EntryOps<K>> Drop for Reservation<K, O> {
    fn drop(&mut self) {
        if let Some(node) = self.node.take() {
            let key = self
                .shared
                .with_raw(|raw, _| unsafe { raw.abandon(node) });
            debug!(
                key = %KeyDisplay { ops: &self.shared.ops, key: &key },
                "withdrew cache placeholder"
            );
        }
    }
}

/// What [`ObjectCache::hold_or_reserve`] found.
///
/// [`ObjectCache::hold_or_reserve`]: struct.ObjectCache.html#method.hold_or_reserve
pub enum Claim<K, O: EntryOps<K>> {
    /// The entry was cached.
    Held(Held<K, O>),
    /// The entry was missing and is now reserved for the caller to build.
    Reserved(Reservation<K, O>),
}
