//! The fixed-capacity entity table.

use bitvec::array::BitArray;
use bitvec::BitArr;

use crate::comp::IdSet;
use crate::config;
use crate::entity::{Generation, Handle, Id};
use crate::error::Error;
use crate::tag::Tag;

type FreeBits = BitArr!(for config::MAX_ENTITIES, in u64);

/// Per-slot bookkeeping: which components are present, the entity's tag and
/// the slot's allocation generation (`None` until the first allocation).
pub(crate) struct Record {
    components: IdSet,
    tag:        Tag,
    generation: Option<Generation>,
}

impl Record {
    pub(crate) fn components(&self) -> &IdSet { &self.components }

    pub(crate) fn components_mut(&mut self) -> &mut IdSet { &mut self.components }

    pub(crate) fn tag(&self) -> Tag { self.tag }

    /// Whether this entity has at least the `filter` components and a matching tag.
    pub(crate) fn pass(&self, filter: &IdSet, tag: Tag) -> bool {
        self.tag.matches(tag) && filter.is_subset_of(&self.components)
    }
}

/// Fixed array of entity records with a free-slot bitset, a cached live count
/// and a cached maximum allocated index bounding table scans.
pub(crate) struct Table {
    records: Box<[Record]>,
    /// A raised bit means the slot is free.
    free:    FreeBits,
    count:   usize,
    /// Highest allocated index, `None` when the table is empty.
    max:     Option<u16>,
}

impl Default for Table {
    fn default() -> Self {
        let records = (0..config::MAX_ENTITIES)
            .map(|_| Record { components: IdSet::EMPTY, tag: Tag::NONE, generation: None })
            .collect();
        let mut free = BitArray::ZERO;
        free[..config::MAX_ENTITIES].fill(true);
        Self { records, free, count: 0, max: None }
    }
}

impl Table {
    /// Allocates the smallest free slot at or after `min_position` and bumps
    /// its generation before publishing the handle.
    pub(crate) fn add(&mut self, tag: Tag, min_position: u16) -> Result<Handle, Error> {
        let start = min_position as usize;
        if start >= config::MAX_ENTITIES {
            return Err(Error::EntityCapacity);
        }
        let index = match self.free[start..config::MAX_ENTITIES].first_one() {
            Some(offset) => start + offset,
            None => return Err(Error::EntityCapacity),
        };

        self.free.set(index, false);
        self.count += 1;
        self.max = Some(self.max.map_or(index as u16, |max| max.max(index as u16)));

        let record = &mut self.records[index];
        debug_assert!(record.components.is_empty(), "free slot still has components");
        record.tag = tag;
        let generation = Generation::bump(record.generation);
        record.generation = Some(generation);

        Ok(Handle::new(generation, Id::new(index as u16)))
    }

    /// Frees an allocated slot. The caller must have removed all components.
    pub(crate) fn remove_checked(&mut self, id: Id) {
        let index = id.index();
        assert!(self.is_allocated(id), "removing a free slot");

        self.count -= 1;
        if self.max == Some(id.raw()) {
            // a zero in the free set is an allocated slot
            self.max = self.free[..index].last_zero().map(|prev| prev as u16);
        }

        let record = &mut self.records[index];
        record.components = IdSet::EMPTY;
        record.tag = Tag::NONE;
        self.free.set(index, true);
    }

    pub(crate) fn is_allocated(&self, id: Id) -> bool {
        id.is_valid() && !*self.free.get(id.index()).expect("valid id in range")
    }

    pub(crate) fn get(&self, id: Id) -> Option<&Record> {
        self.is_allocated(id).then(|| &self.records[id.index()])
    }

    pub(crate) fn get_checked(&self, id: Id) -> &Record {
        self.get(id).expect("entity is not allocated")
    }

    pub(crate) fn record_mut(&mut self, id: Id) -> &mut Record {
        assert!(self.is_allocated(id), "entity is not allocated");
        &mut self.records[id.index()]
    }

    pub(crate) fn is_live(&self, handle: Handle) -> bool {
        self.get(handle.id())
            .map_or(false, |record| record.generation == Some(handle.generation()))
    }

    pub(crate) fn handle(&self, id: Id) -> Option<Handle> {
        let record = self.get(id)?;
        Some(Handle::new(record.generation.expect("allocated slot has a generation"), id))
    }

    pub(crate) fn count(&self) -> usize { self.count }

    /// Returns the first allocated id after `after` (from the start when
    /// `None`) that passes `filter` and `tag`, scanning up to and including the
    /// maximum allocated index.
    pub(crate) fn next_match(&self, after: Option<Id>, filter: &IdSet, tag: Tag) -> Option<Id> {
        let start = after.map_or(0, |id| id.index() + 1);
        let end = self.max? as usize;
        for index in start..=end {
            if !self.free[index] && self.records[index].pass(filter, tag) {
                return Some(Id::new(index as u16));
            }
        }
        None
    }
}
