mod core;
mod index;
mod ll;
mod probe;

pub(crate) use self::core::{Doomed, Lookup, RawCache};
pub(crate) use self::ll::{Lifecycle, Link, Node};
