use std::borrow::Borrow;
use std::collections::BTreeMap;

/// A cheap index for a vehicle, assigned in first-seen order within one ingestion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VehicleID(pub usize);

impl CheapID for VehicleID {
    fn new(x: usize) -> Self {
        Self(x)
    }
}

pub trait CheapID: Copy {
    fn new(x: usize) -> Self;
}

/// Maps original string IDs to dense cheap IDs, handed out in insertion order.
pub struct IDMapping<K: Ord, V> {
    orig_to_cheap: BTreeMap<K, V>,
    // We don't need to store the inverse. It's more convenient for each object to own that.
}

impl<K: Ord, V: CheapID> IDMapping<K, V> {
    pub fn new() -> Self {
        Self {
            orig_to_cheap: BTreeMap::new(),
        }
    }

    pub fn get<Q>(&self, orig: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.orig_to_cheap.get(orig).copied()
    }

    /// The caller must check `get` first; inserting an existing key reassigns it.
    pub fn insert_new(&mut self, orig: K) -> V {
        let cheap = V::new(self.orig_to_cheap.len());
        self.orig_to_cheap.insert(orig, cheap);
        cheap
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.orig_to_cheap.len()
    }
}

impl<K: Ord, V: CheapID> Default for IDMapping<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
