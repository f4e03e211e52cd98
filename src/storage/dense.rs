use crate::config;
use crate::entity::Id;
use crate::storage::Storage;

/// One slot per possible entity, indexed directly by id.
///
/// Slots exist for the whole table regardless of presence; insert and remove
/// merely reset the slot to its default value. Cheapest lookup, largest
/// footprint; the right choice for components most entities carry.
pub struct Dense<T> {
    slots: Box<[T]>,
}

impl<T: Default> Default for Dense<T> {
    fn default() -> Self {
        Self { slots: (0..config::MAX_ENTITIES).map(|_| T::default()).collect() }
    }
}

impl<T: Default + Send + Sync + 'static> Storage for Dense<T> {
    type Comp = T;

    const USES_CACHED_ITER: bool = false;
    const USABLE_AS_FILTER_HINT: bool = false;

    fn insert(&mut self, id: Id) -> &mut T {
        let slot = &mut self.slots[id.index()];
        *slot = T::default();
        slot
    }

    fn remove(&mut self, id: Id) { self.slots[id.index()] = T::default(); }

    fn get(&self, id: Id) -> Option<&T> { self.slots.get(id.index()) }

    fn get_mut(&mut self, id: Id) -> Option<&mut T> { self.slots.get_mut(id.index()) }

    fn ids(&self, _out: &mut Vec<Id>) {
        // presence is not tracked here, so a dense container cannot drive iteration
    }
}
