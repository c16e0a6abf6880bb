use objcache::{EntryOps, HoldError, ObjectCache};
use std::cell::Cell;
use std::fmt;

/// Object id inside a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Oid {
    container: u32,
    object: u64,
}

/// An opened object, expensive to build.
#[derive(Debug)]
struct Handle {
    oid: Oid,
    size: u64,
}

#[derive(Default)]
struct Objects {
    opened: Cell<usize>,
    closed: Cell<usize>,
}

impl EntryOps<Oid> for Objects {
    type Value = Handle;
    /// Size of the object, as read from the parent container.
    type Args = u64;
    type Error = &'static str;

    fn key_hash(&self, key: &Oid) -> u64 {
        ((key.container as u64) << 48) ^ key.object
    }

    fn key_equal(&self, key: &Oid, cached: &Oid) -> bool {
        key == cached
    }

    fn create(&self, oid: &Oid, size: u64) -> Result<Handle, &'static str> {
        if size == 0 {
            return Err("object has no data");
        }
        self.opened.set(self.opened.get() + 1);
        Ok(Handle { oid: *oid, size })
    }

    fn destroy(&self, _: &Oid, _: Handle) {
        self.closed.set(self.closed.get() + 1);
    }

    fn describe(&self, key: &Oid, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", key.container, key.object)
    }
}

fn oid(container: u32, object: u64) -> Oid {
    Oid { container, object }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let cache = ObjectCache::new(2, Objects::default());

    // open two objects, then let them go idle
    let a = cache.hold(&oid(1, 1), Some(4096)).unwrap();
    let b = cache.hold(&oid(1, 2), Some(512)).unwrap();
    assert_eq!(a.size, 4096);
    drop(a);
    drop(b);
    assert_eq!(cache.idle_count(), 2);

    // a cached object is reused, no args needed
    let again = cache.lookup(&oid(1, 1)).unwrap();
    assert_eq!(again.oid, oid(1, 1));
    assert_eq!(cache.ops().opened.get(), 2);
    drop(again);

    // a third object pushes the least recently released one out
    let c = cache.hold(&oid(2, 1), Some(64)).unwrap();
    assert_eq!(cache.ops().closed.get(), 1);
    assert!(!cache.contains(&oid(1, 2)));

    // closing container 2 while object 2.1 is still open defers its close
    assert_eq!(cache.evict(|oid, _| oid.container == 2), 1);
    assert!(c.is_evicted());
    assert_eq!(cache.ops().closed.get(), 1);
    drop(c);
    assert_eq!(cache.ops().closed.get(), 2);

    assert_eq!(
        cache.hold(&oid(3, 1), Some(0)).err(),
        Some(HoldError::Alloc("object has no data"))
    );

    println!("{:?}", cache);
}
