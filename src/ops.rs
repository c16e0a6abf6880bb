//! The operations an [`ObjectCache`] needs from its user.
//!
//! [`ObjectCache`]: ../struct.ObjectCache.html
use crate::CacheError;
use alloc::boxed::Box;
use core::fmt;

/// `EntryOps` is the vtable of an [`ObjectCache`].
///
/// Keys are never assumed to be orderable or even `Hash + Eq`: the cache
/// hashes and compares them only through `key_hash` and `key_equal`, so the
/// two must agree (equal keys must hash equally).
///
/// # Example
///
/// ```
/// use objcache::{EntryOps, ObjectCache};
///
/// struct Handles;
///
/// impl EntryOps<u64> for Handles {
///     type Value = String;
///     type Args = ();
///     type Error = ();
///
///     fn key_hash(&self, key: &u64) -> u64 {
///         key.wrapping_mul(0x9e37_79b9_7f4a_7c15)
///     }
///
///     fn key_equal(&self, key: &u64, cached: &u64) -> bool {
///         key == cached
///     }
///
///     fn create(&self, key: &u64, _: ()) -> Result<String, ()> {
///         Ok(format!("object-{}", key))
///     }
///
///     fn destroy(&self, _: &u64, _: String) {}
/// }
///
/// let cache = ObjectCache::new(16, Handles);
/// let obj = cache.hold(&7, Some(())).unwrap();
/// assert_eq!(obj.as_str(), "object-7");
/// ```
///
/// [`ObjectCache`]: struct.ObjectCache.html
pub trait EntryOps<K> {
    /// The payload built on a miss and owned by the entry.
    type Value;
    /// Extra input handed to `create`, e.g. the parent container.
    type Args;
    /// Error of `create`, surfaced as [`HoldError::Alloc`].
    ///
    /// [`HoldError::Alloc`]: enum.HoldError.html#variant.Alloc
    type Error;

    /// Hashes a key.
    fn key_hash(&self, key: &K) -> u64;

    /// Compares a lookup key with the key of a cached entry.
    fn key_equal(&self, key: &K, cached: &K) -> bool;

    /// Builds the payload for `key`. May perform expensive I/O.
    fn create(&self, key: &K, args: Self::Args) -> Result<Self::Value, Self::Error>;

    /// Tears a payload down once its entry is gone. Must not fail.
    fn destroy(&self, key: &K, value: Self::Value);

    /// Renders a key for log output.
    fn describe(&self, _key: &K, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<key>")
    }
}

/// Displays a key through [`EntryOps::describe`].
pub(crate) struct KeyDisplay<'a, K, O> {
    pub(crate) ops: &'a O,
    pub(crate) key: &'a K,
}

impl<'a, K, O: EntryOps<K>> fmt::Display for KeyDisplay<'a, K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.ops.describe(self.key, f)
    }
}

type HashFn<K> = Box<dyn Fn(&K) -> u64>;
type EqualFn<K> = Box<dyn Fn(&K, &K) -> bool>;
type CreateFn<K, V, A, E> = Box<dyn Fn(&K, A) -> Result<V, E>>;
type DestroyFn<K, V> = Box<dyn Fn(&K, V)>;
type DescribeFn<K> = Box<dyn Fn(&K, &mut fmt::Formatter<'_>) -> fmt::Result>;

/// `FnOps` is an [`EntryOps`] assembled from closures, one per slot.
///
/// Build it with [`FnOps::builder`]; every slot except `describe` is
/// mandatory.
///
/// # Example
///
/// ```
/// use objcache::{CacheError, FnOps, ObjectCache};
///
/// let ops = FnOps::<u32, u32, (), ()>::builder()
///     .set_key_hash(|k| *k as u64)
///     .set_key_equal(|a, b| a == b)
///     .set_create(|k, _| Ok(*k * 10))
///     .set_destroy(|_, _| {})
///     .finalize()
///     .unwrap();
///
/// let cache = ObjectCache::new(4, ops);
/// assert_eq!(*cache.hold(&3, Some(())).unwrap(), 30);
///
/// let missing = FnOps::<u32, u32, (), ()>::builder()
///     .set_key_hash(|k| *k as u64)
///     .finalize();
/// assert_eq!(missing.err(), Some(CacheError::InvalidConfiguration("key_equal")));
/// ```
///
/// [`EntryOps`]: trait.EntryOps.html
/// [`FnOps::builder`]: struct.FnOps.html#method.builder
pub struct FnOps<K, V, A, E> {
    key_hash: HashFn<K>,
    key_equal: EqualFn<K>,
    create: CreateFn<K, V, A, E>,
    destroy: DestroyFn<K, V>,
    describe: Option<DescribeFn<K>>,
}

impl<K, V, A, E> FnOps<K, V, A, E> {
    /// Returns an empty [`FnOpsBuilder`].
    ///
    /// [`FnOpsBuilder`]: struct.FnOpsBuilder.html
    pub fn builder() -> FnOpsBuilder<K, V, A, E> {
        FnOpsBuilder::default()
    }
}

impl<K, V, A, E> EntryOps<K> for FnOps<K, V, A, E> {
    type Value = V;
    type Args = A;
    type Error = E;

    #[inline]
    fn key_hash(&self, key: &K) -> u64 {
        (self.key_hash)(key)
    }

    #[inline]
    fn key_equal(&self, key: &K, cached: &K) -> bool {
        (self.key_equal)(key, cached)
    }

    fn create(&self, key: &K, args: A) -> Result<V, E> {
        (self.create)(key, args)
    }

    fn destroy(&self, key: &K, value: V) {
        (self.destroy)(key, value)
    }

    fn describe(&self, key: &K, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.describe {
            Some(ref describe) => describe(key, f),
            None => f.write_str("<key>"),
        }
    }
}

/// `FnOpsBuilder` collects the closure slots of a [`FnOps`].
///
/// [`FnOps`]: struct.FnOps.html
pub struct FnOpsBuilder<K, V, A, E> {
    key_hash: Option<HashFn<K>>,
    key_equal: Option<EqualFn<K>>,
    create: Option<CreateFn<K, V, A, E>>,
    destroy: Option<DestroyFn<K, V>>,
    describe: Option<DescribeFn<K>>,
}

impl<K, V, A, E> Default for FnOpsBuilder<K, V, A, E> {
    fn default() -> Self {
        Self {
            key_hash: None,
            key_equal: None,
            create: None,
            destroy: None,
            describe: None,
        }
    }
}

impl<K, V, A, E> FnOpsBuilder<K, V, A, E> {
    /// Set the key hash function.
    pub fn set_key_hash(self, f: impl Fn(&K) -> u64 + 'static) -> Self {
        FnOpsBuilder {
            key_hash: Some(Box::new(f)),
            ..self
        }
    }

    /// Set the key equality function.
    pub fn set_key_equal(self, f: impl Fn(&K, &K) -> bool + 'static) -> Self {
        FnOpsBuilder {
            key_equal: Some(Box::new(f)),
            ..self
        }
    }

    /// Set the payload constructor.
    pub fn set_create(self, f: impl Fn(&K, A) -> Result<V, E> + 'static) -> Self {
        FnOpsBuilder {
            create: Some(Box::new(f)),
            ..self
        }
    }

    /// Set the payload destructor.
    pub fn set_destroy(self, f: impl Fn(&K, V) + 'static) -> Self {
        FnOpsBuilder {
            destroy: Some(Box::new(f)),
            ..self
        }
    }

    /// Set the optional key formatter used in log output.
    pub fn set_describe(
        self,
        f: impl Fn(&K, &mut fmt::Formatter<'_>) -> fmt::Result + 'static,
    ) -> Self {
        FnOpsBuilder {
            describe: Some(Box::new(f)),
            ..self
        }
    }

    /// Finalize the builder, failing on the first missing mandatory slot.
    pub fn finalize(self) -> Result<FnOps<K, V, A, E>, CacheError> {
        Ok(FnOps {
            key_hash: self
                .key_hash
                .ok_or(CacheError::InvalidConfiguration("key_hash"))?,
            key_equal: self
                .key_equal
                .ok_or(CacheError::InvalidConfiguration("key_equal"))?,
            create: self
                .create
                .ok_or(CacheError::InvalidConfiguration("create"))?,
            destroy: self
                .destroy
                .ok_or(CacheError::InvalidConfiguration("destroy"))?,
            describe: self.describe,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::{String, ToString};

    fn full() -> FnOpsBuilder<u64, String, u8, ()> {
        FnOps::builder()
            .set_key_hash(|k| *k)
            .set_key_equal(|a, b| a == b)
            .set_create(|k, tag| Ok(format!("{}:{}", k, tag)))
            .set_destroy(|_, _| {})
    }

    #[test]
    fn test_missing_slots() {
        let b = FnOps::<u64, String, u8, ()>::builder();
        assert_eq!(
            b.finalize().err(),
            Some(CacheError::InvalidConfiguration("key_hash"))
        );

        let b = FnOps::<u64, String, u8, ()>::builder()
            .set_key_hash(|k| *k)
            .set_key_equal(|a, b| a == b)
            .set_destroy(|_, _| {});
        assert_eq!(
            b.finalize().err(),
            Some(CacheError::InvalidConfiguration("create"))
        );

        let b = FnOps::<u64, String, u8, ()>::builder()
            .set_key_hash(|k| *k)
            .set_key_equal(|a, b| a == b)
            .set_create(|_, _| Err(()));
        assert_eq!(
            b.finalize().err(),
            Some(CacheError::InvalidConfiguration("destroy"))
        );
    }

    #[test]
    fn test_slots_are_called() {
        let ops = full().finalize().unwrap();
        assert_eq!(ops.key_hash(&42), 42);
        assert!(ops.key_equal(&1, &1));
        assert!(!ops.key_equal(&1, &2));
        assert_eq!(ops.create(&5, 9), Ok("5:9".to_string()));
    }

    #[test]
    fn test_describe_is_optional() {
        let ops = full().finalize().unwrap();
        let shown = format!("{}", KeyDisplay { ops: &ops, key: &3 });
        assert_eq!(shown, "<key>");

        let ops = full()
            .set_describe(|k, f| write!(f, "oid:{:#x}", k))
            .finalize()
            .unwrap();
        let shown = format!("{}", KeyDisplay { ops: &ops, key: &255 });
        assert_eq!(shown, "oid:0xff");
    }
}
