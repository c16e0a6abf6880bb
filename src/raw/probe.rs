use crate::raw::index::node_matches;
use crate::raw::ll::{Lifecycle, Link, Node, NodeList};
use crate::EntryOps;

/// Looks at the most recently touched busy entry and the most recently
/// idled entry, in that order, before paying for a hash and a bucket walk.
///
/// Uses the same equality as `KeyedIndex::find`, and only reports live
/// entries, so a hit here is always a hit there too.
#[inline]
pub(crate) fn probe<K, O: EntryOps<K>>(
    ops: &O,
    busy: &NodeList<K, O::Value>,
    idle: &NodeList<K, O::Value>,
    key: &K,
) -> Option<Link<K, O::Value>> {
    [busy.front(), idle.front()]
        .into_iter()
        .flatten()
        .find(|&node| unsafe {
            Node::state(node) == Lifecycle::Live && node_matches(ops, node, key)
        })
}
