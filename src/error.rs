/// `CacheError` is returned when an [`ObjectCache`] cannot be built.
///
/// [`ObjectCache`]: struct.ObjectCache.html
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// A mandatory entry operation was not supplied. Carries the slot name.
    #[error("invalid cache configuration: missing `{0}` operation")]
    InvalidConfiguration(&'static str),
}

/// `HoldError` is the recoverable failure of [`ObjectCache::hold`].
///
/// `E` is the error type of the payload constructor, see [`EntryOps::create`].
///
/// [`ObjectCache::hold`]: struct.ObjectCache.html#method.hold
/// [`EntryOps::create`]: trait.EntryOps.html#tymethod.create
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HoldError<E> {
    /// No live entry for the key and creation was not requested.
    #[error("entry not found")]
    NotFound,
    /// Another caller is still constructing the payload for this key.
    #[error("entry is being created")]
    Creating,
    /// The payload constructor failed. Nothing was inserted.
    #[error("failed to create entry: {0}")]
    Alloc(E),
}

impl<E> HoldError<E> {
    /// Returns `true` for [`HoldError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, HoldError::NotFound)
    }

    /// Maps the constructor error, leaving the other variants untouched.
    pub fn map_alloc<F, T>(self, f: F) -> HoldError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            HoldError::NotFound => HoldError::NotFound,
            HoldError::Creating => HoldError::Creating,
            HoldError::Alloc(e) => HoldError::Alloc(f(e)),
        }
    }
}
