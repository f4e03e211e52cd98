use std::collections::BTreeMap;

use crate::entity::Id;
use crate::storage::Storage;

/// An ordered map keyed by entity id.
///
/// The right choice for components carried by few entities: footprint scales
/// with cardinality, and the ordered keys still allow driving a filtered
/// iteration, unlike [`Dense`](crate::storage::Dense).
pub struct Sparse<T> {
    entries: BTreeMap<Id, T>,
}

impl<T> Default for Sparse<T> {
    fn default() -> Self { Self { entries: BTreeMap::new() } }
}

impl<T> Sparse<T> {
    pub(crate) fn len(&self) -> usize { self.entries.len() }
}

impl<T: Default + Send + Sync + 'static> Storage for Sparse<T> {
    type Comp = T;

    const USES_CACHED_ITER: bool = false;
    const USABLE_AS_FILTER_HINT: bool = true;

    fn insert(&mut self, id: Id) -> &mut T {
        match self.entries.entry(id) {
            std::collections::btree_map::Entry::Vacant(entry) => entry.insert(T::default()),
            std::collections::btree_map::Entry::Occupied(_) => {
                panic!("id {id:?} already present in sparse storage")
            }
        }
    }

    fn remove(&mut self, id: Id) {
        let removed = self.entries.remove(&id);
        assert!(removed.is_some(), "id {id:?} absent from sparse storage");
    }

    fn get(&self, id: Id) -> Option<&T> { self.entries.get(&id) }

    fn get_mut(&mut self, id: Id) -> Option<&mut T> { self.entries.get_mut(&id) }

    fn ids(&self, out: &mut Vec<Id>) { out.extend(self.entries.keys().copied()); }
}
