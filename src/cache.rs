use crate::handle::{Claim, Held, Reservation};
use crate::ops::KeyDisplay;
use crate::polyfill::panicking;
use crate::raw::{Doomed, Lookup, RawCache};
use crate::{CacheError, EntryOps, HoldError};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use tracing::{debug, trace};

/// State shared by a cache and every handle it gave out.
pub(crate) struct Shared<K, O: EntryOps<K>> {
    pub(crate) ops: O,
    raw: RefCell<RawCache<K, O::Value>>,
}

impl<K, O: EntryOps<K>> Shared<K, O> {
    /// Runs `f` on the books, then destroys whatever it unlinked once the
    /// borrow has ended, so `EntryOps::destroy` may use the cache again.
    pub(crate) fn with_raw<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut RawCache<K, O::Value>, &mut Doomed<K, O::Value>) -> R,
    {
        let mut doomed = Vec::new();
        let out = f(&mut self.raw.borrow_mut(), &mut doomed);
        for (key, value) in doomed {
            debug!(
                key = %KeyDisplay { ops: &self.ops, key: &key },
                "destroying cache entry"
            );
            self.ops.destroy(&key, value);
        }
        out
    }
}

/// `ObjectCacheBuilder` is used to help build an [`ObjectCache`].
///
/// # Example
///
/// ```
/// use objcache::{CacheError, FnOps, ObjectCache, ObjectCacheBuilder};
///
/// type Ops = FnOps<u64, u64, (), ()>;
///
/// let missing: Result<ObjectCache<u64, Ops>, CacheError> =
///     ObjectCacheBuilder::new(8).finalize();
/// assert_eq!(missing.err(), Some(CacheError::InvalidConfiguration("ops")));
///
/// let ops = Ops::builder()
///     .set_key_hash(|k| *k)
///     .set_key_equal(|a, b| a == b)
///     .set_create(|k, _| Ok(*k))
///     .set_destroy(|_, _| {})
///     .finalize()
///     .unwrap();
/// let cache: ObjectCache<u64, Ops> = ObjectCacheBuilder::default()
///     .set_capacity(8)
///     .set_ops(ops)
///     .finalize()
///     .unwrap();
/// assert_eq!(cache.capacity(), 8);
/// ```
///
/// [`ObjectCache`]: struct.ObjectCache.html
pub struct ObjectCacheBuilder<O> {
    cap: usize,
    ops: Option<O>,
}

impl<O> Default for ObjectCacheBuilder<O> {
    /// An unbounded cache without ops.
    fn default() -> Self {
        Self { cap: 0, ops: None }
    }
}

impl<O> ObjectCacheBuilder<O> {
    /// Returns a builder for a cache holding about `cap` entries, 0 for
    /// unbounded.
    pub fn new(cap: usize) -> Self {
        Self { cap, ops: None }
    }

    /// Set the capacity, 0 for unbounded.
    pub fn set_capacity(self, cap: usize) -> Self {
        ObjectCacheBuilder { cap, ..self }
    }

    /// Set the entry operations.
    pub fn set_ops(self, ops: O) -> Self {
        ObjectCacheBuilder {
            ops: Some(ops),
            ..self
        }
    }

    /// Finalize the builder and get an [`ObjectCache`].
    ///
    /// [`ObjectCache`]: struct.ObjectCache.html
    pub fn finalize<K: Clone>(self) -> Result<ObjectCache<K, O>, CacheError>
    where
        O: EntryOps<K>,
    {
        let ops = self.ops.ok_or(CacheError::InvalidConfiguration("ops"))?;
        Ok(ObjectCache::new(self.cap, ops))
    }
}

/// `ObjectCache` caches expensive-to-open objects by key and hands out
/// counted references to them.
///
/// Entries with at least one [`Held`] reference are busy and never evicted
/// for space. Entries nobody holds are idle and kept in least recently
/// released order; once the cache holds more than `capacity` entries, idle
/// ones are destroyed from the least recently released end. A `capacity`
/// of 0 keeps every idle entry.
///
/// The cache is single-threaded (`!Send`); give each worker its own.
/// `EntryOps::create` and `EntryOps::destroy` run with the cache unborrowed
/// and may use it, `key_hash`, `key_equal` and `evict` predicates must not.
///
/// # Example
///
/// ```
/// use objcache::{EntryOps, HoldError, ObjectCache};
///
/// struct Files;
///
/// impl EntryOps<u32> for Files {
///     type Value = Vec<u8>;
///     type Args = usize;
///     type Error = &'static str;
///
///     fn key_hash(&self, key: &u32) -> u64 { *key as u64 }
///     fn key_equal(&self, key: &u32, cached: &u32) -> bool { key == cached }
///     fn create(&self, _: &u32, len: usize) -> Result<Vec<u8>, &'static str> {
///         if len == 0 { Err("empty") } else { Ok(vec![0; len]) }
///     }
///     fn destroy(&self, _: &u32, _: Vec<u8>) {}
/// }
///
/// let cache = ObjectCache::new(2, Files);
///
/// assert_eq!(cache.lookup(&1).err(), Some(HoldError::NotFound));
/// assert_eq!(cache.hold(&1, Some(0)).err(), Some(HoldError::Alloc("empty")));
///
/// let a = cache.hold(&1, Some(4)).unwrap();
/// assert_eq!(a.len(), 4);
/// assert_eq!(cache.busy_count(), 1);
///
/// drop(a);
/// assert_eq!(cache.idle_count(), 1);
/// assert!(cache.lookup(&1).is_ok());
/// ```
///
/// [`Held`]: struct.Held.html
pub struct ObjectCache<K, O: EntryOps<K>> {
    shared: Rc<Shared<K, O>>,
}

impl<K: Clone, O: EntryOps<K>> ObjectCache<K, O> {
    /// Creates a cache keeping about `cap` entries, 0 for unbounded.
    pub fn new(cap: usize, ops: O) -> Self {
        Self {
            shared: Rc::new(Shared {
                ops,
                raw: RefCell::new(RawCache::new(cap)),
            }),
        }
    }

    /// Takes a reference on the entry for `key`.
    ///
    /// On a miss the entry is built with [`EntryOps::create`] if `args` is
    /// given, otherwise [`HoldError::NotFound`] is returned. While `create`
    /// runs, other holds on the same key fail with [`HoldError::Creating`].
    ///
    /// [`EntryOps::create`]: trait.EntryOps.html#tymethod.create
    /// [`HoldError::NotFound`]: enum.HoldError.html#variant.NotFound
    /// [`HoldError::Creating`]: enum.HoldError.html#variant.Creating
    pub fn hold(
        &self,
        key: &K,
        args: Option<O::Args>,
    ) -> Result<Held<K, O>, HoldError<O::Error>> {
        let reservation = match self.claim(key, args.is_some())? {
            Claim::Held(held) => return Ok(held),
            Claim::Reserved(reservation) => reservation,
        };

        let args = match args {
            Some(args) => args,
            None => unreachable!("reserved without create args"),
        };
        match self.shared.ops.create(key, args) {
            Ok(value) => Ok(reservation.fulfill(value)),
            Err(err) => {
                debug!(
                    key = %KeyDisplay { ops: &self.shared.ops, key },
                    "failed to create cache entry"
                );
                drop(reservation);
                Err(HoldError::Alloc(err))
            }
        }
    }

    /// Takes a reference on an existing entry, never creating one.
    #[inline]
    pub fn lookup(&self, key: &K) -> Result<Held<K, O>, HoldError<O::Error>> {
        self.hold(key, None)
    }

    /// Like [`hold`], but on a miss publishes a placeholder and lets the
    /// caller build the payload, e.g. across an `.await`, then
    /// [`Reservation::fulfill`] it.
    ///
    /// ```
    /// use objcache::{Claim, FnOps, HoldError, ObjectCache};
    ///
    /// let ops = FnOps::<u8, String, (), ()>::builder()
    ///     .set_key_hash(|k| *k as u64)
    ///     .set_key_equal(|a, b| a == b)
    ///     .set_create(|_, _| Err(()))
    ///     .set_destroy(|_, _| {})
    ///     .finalize()
    ///     .unwrap();
    /// let cache = ObjectCache::new(0, ops);
    ///
    /// let reservation = match cache.hold_or_reserve(&1).unwrap() {
    ///     Claim::Reserved(r) => r,
    ///     Claim::Held(_) => unreachable!(),
    /// };
    /// assert_eq!(cache.lookup(&1).err(), Some(HoldError::Creating));
    ///
    /// let held = reservation.fulfill("opened".to_string());
    /// assert_eq!(cache.lookup(&1).unwrap().as_str(), "opened");
    /// # drop(held);
    /// ```
    ///
    /// [`hold`]: struct.ObjectCache.html#method.hold
    /// [`Reservation::fulfill`]: struct.Reservation.html#method.fulfill
    pub fn hold_or_reserve(&self, key: &K) -> Result<Claim<K, O>, HoldError<O::Error>> {
        self.claim(key, true)
    }

    fn claim(&self, key: &K, create: bool) -> Result<Claim<K, O>, HoldError<O::Error>> {
        let ops = &self.shared.ops;
        match self.shared.with_raw(|raw, _| raw.lookup(ops, key)) {
            Lookup::Hit(node) => {
                trace!(key = %KeyDisplay { ops, key }, "cache hit");
                return Ok(Claim::Held(Held::new(self.shared.clone(), node)));
            }
            Lookup::Creating => {
                debug!(key = %KeyDisplay { ops, key }, "cache entry is being created");
                return Err(HoldError::Creating);
            }
            Lookup::Miss => {}
        }

        if !create {
            trace!(key = %KeyDisplay { ops, key }, "cache miss");
            return Err(HoldError::NotFound);
        }

        let node = self
            .shared
            .with_raw(|raw, _| raw.reserve(ops, key.clone()));
        Ok(Claim::Reserved(Reservation::new(self.shared.clone(), node)))
    }

    /// Gives a reference back. Same as dropping `held`, but checks that it
    /// came from this cache.
    ///
    /// # Panics
    /// If `held` belongs to another cache.
    pub fn release(&self, held: Held<K, O>) {
        assert!(
            Rc::ptr_eq(&self.shared, &held.shared),
            "releasing an entry into a foreign cache"
        );
        drop(held);
    }

    /// Flags one held entry for destruction on its last release. New holds
    /// on its key will build a fresh entry.
    ///
    /// # Panics
    /// If `held` belongs to another cache.
    pub fn mark_evicted(&self, held: &Held<K, O>) {
        assert!(
            Rc::ptr_eq(&self.shared, &held.shared),
            "evicting an entry of a foreign cache"
        );
        self.shared
            .with_raw(|raw, _| unsafe { raw.mark_evicted(held.node) });
        debug!(
            key = %KeyDisplay { ops: &self.shared.ops, key: held.key() },
            "marked cache entry evicted"
        );
    }

    /// Evicts every entry `pred` matches, e.g. everything of a closed
    /// container. Idle entries are destroyed now, busy ones on their last
    /// release. Returns how many entries matched.
    ///
    /// `pred` runs with the cache borrowed and must not use it.
    pub fn evict<F>(&self, pred: F) -> usize
    where
        F: FnMut(&K, &O::Value) -> bool,
    {
        let matched = self.shared.with_raw(|raw, doomed| raw.evict(pred, doomed));
        debug!(matched, "forced cache eviction");
        matched
    }

    /// Destroys every idle entry. Returns how many there were.
    pub fn flush_idle(&self) -> usize {
        self.shared.with_raw(|raw, doomed| raw.flush_idle(doomed))
    }

    /// Returns `true` if a live entry for `key` is cached, without touching
    /// its recency.
    pub fn contains(&self, key: &K) -> bool {
        self.shared.raw.borrow().contains(&self.shared.ops, key)
    }

    /// Returns the entry operations.
    pub fn ops(&self) -> &O {
        &self.shared.ops
    }
}

impl<K, O: EntryOps<K>> ObjectCache<K, O> {
    /// Returns the number of indexed entries, busy and idle.
    pub fn len(&self) -> usize {
        self.shared.raw.borrow().len()
    }

    /// Returns `true` if no entry is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of entries nobody holds.
    pub fn idle_count(&self) -> usize {
        self.shared.raw.borrow().idle_len()
    }

    /// Returns the number of entries with at least one holder.
    pub fn busy_count(&self) -> usize {
        self.shared.raw.borrow().busy_len()
    }

    /// Returns the configured capacity, 0 for unbounded.
    pub fn capacity(&self) -> usize {
        self.shared.raw.borrow().cap()
    }
}

impl<K, O: EntryOps<K>> Drop for ObjectCache<K, O> {
    /// Destroys every idle entry.
    ///
    /// # Panics
    /// If any entry is still held.
    fn drop(&mut self) {
        let busy = self.busy_count();
        if busy != 0 {
            if panicking() {
                return;
            }
            panic!("destroying an object cache with {} held entries", busy);
        }
        let flushed = self.shared.with_raw(|raw, doomed| raw.flush_idle(doomed));
        debug!(flushed, "destroyed object cache");
    }
}

impl<K, O: EntryOps<K>> fmt::Debug for ObjectCache<K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.shared.raw.borrow();
        f.debug_struct("ObjectCache")
            .field("capacity", &raw.cap())
            .field("idle", &raw.idle_len())
            .field("busy", &raw.busy_len())
            .finish()
    }
}
