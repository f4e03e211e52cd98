use crate::config;
use crate::entity::Id;
use crate::storage::{Cursor, Storage};

/// A vector of `(id, value)` pairs kept strictly ordered by id.
///
/// Compact and iterable in id order, which makes it both the cheapest driving
/// collection for filtered iteration and a [`Cursor`] beneficiary: lookups
/// issued in increasing id order resume from the previous hit.
///
/// `BINARY_HINT` selects the resume strategy: binary search from the cursor,
/// or a linear scan from it. The linear scan wins when the container is walked
/// almost densely (every few entries), the binary search when hits are far
/// apart.
pub struct Sorted<T, const BINARY_HINT: bool = true> {
    entries: Vec<(Id, T)>,
}

impl<T, const BINARY_HINT: bool> Default for Sorted<T, BINARY_HINT> {
    fn default() -> Self { Self { entries: Vec::with_capacity(config::MAX_ENTITIES / 8) } }
}

impl<T, const BINARY_HINT: bool> Sorted<T, BINARY_HINT> {
    fn position(&self, id: Id) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&id, |&(key, _)| key)
    }

    /// Resolves `id` to an entry index, advancing the cursor.
    fn hinted_index(&self, id: Id, cursor: &mut Cursor) -> Option<usize> {
        let start = cursor.pos.min(self.entries.len());
        if BINARY_HINT {
            match self.entries[start..].binary_search_by_key(&id, |&(key, _)| key) {
                Ok(offset) => {
                    let index = start + offset;
                    cursor.pos = index + 1;
                    Some(index)
                }
                Err(offset) => {
                    cursor.pos = start + offset;
                    None
                }
            }
        } else {
            for (index, &(key, _)) in self.entries.iter().enumerate().skip(start) {
                if key == id {
                    cursor.pos = index + 1;
                    return Some(index);
                }
                if key > id {
                    cursor.pos = index;
                    return None;
                }
            }
            None
        }
    }

    pub(crate) fn len(&self) -> usize { self.entries.len() }
}

impl<T, const BINARY_HINT: bool> Storage for Sorted<T, BINARY_HINT>
where
    T: Default + Send + Sync + 'static,
{
    type Comp = T;

    const USES_CACHED_ITER: bool = true;
    const USABLE_AS_FILTER_HINT: bool = true;

    fn insert(&mut self, id: Id) -> &mut T {
        match self.position(id) {
            Ok(_) => panic!("id {id:?} already present in sorted storage"),
            Err(pos) => {
                self.entries.insert(pos, (id, T::default()));
                &mut self.entries[pos].1
            }
        }
    }

    fn remove(&mut self, id: Id) {
        match self.position(id) {
            Ok(pos) => {
                self.entries.remove(pos);
            }
            Err(_) => panic!("id {id:?} absent from sorted storage"),
        }
    }

    fn get(&self, id: Id) -> Option<&T> {
        self.position(id).ok().map(|pos| &self.entries[pos].1)
    }

    fn get_mut(&mut self, id: Id) -> Option<&mut T> {
        self.position(id).ok().map(|pos| &mut self.entries[pos].1)
    }

    fn get_hinted(&self, id: Id, cursor: &mut Cursor) -> Option<&T> {
        self.hinted_index(id, cursor).map(|index| &self.entries[index].1)
    }

    fn get_hinted_mut(&mut self, id: Id, cursor: &mut Cursor) -> Option<&mut T> {
        self.hinted_index(id, cursor).map(|index| &mut self.entries[index].1)
    }

    fn ids(&self, out: &mut Vec<Id>) { out.extend(self.entries.iter().map(|&(key, _)| key)); }
}
