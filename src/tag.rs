//! Coarse entity partitioning labels.
//!
//! A tag is a small integer label carried by every entity. Tags serve two
//! purposes: iteration can be restricted to one tag's population (walking the
//! per-tag id index instead of the whole table), and the scheduler treats
//! tasks whose tags do not [match](Tag::matches) as non-conflicting even when
//! their component accesses overlap, because they visit disjoint entities.

use crate::config;
use crate::entity::Id;

/// An entity partition label in `[0, MAX_TAGS)`, or [`Tag::NONE`].
///
/// `NONE` matches every tag; two concrete tags match only when equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(u8);

impl Default for Tag {
    fn default() -> Self { Self::NONE }
}

impl Tag {
    /// The wildcard tag: carried by untagged entities and matching every tag.
    pub const NONE: Self = Self(u8::MAX);

    /// Creates a concrete tag.
    ///
    /// # Panics
    /// Panics if `index >= MAX_TAGS`.
    pub fn new(index: u8) -> Self {
        assert!((index as usize) < config::MAX_TAGS, "tag index {index} out of range");
        Self(index)
    }

    /// Returns the tag index, or `None` for [`Tag::NONE`].
    pub fn index(self) -> Option<usize> { (self != Self::NONE).then_some(self.0 as usize) }

    /// Two tags match iff they are equal or at least one of them is `NONE`.
    pub fn matches(self, other: Self) -> bool {
        self == other || self == Self::NONE || other == Self::NONE
    }
}

/// Maps each concrete tag to the sorted list of entity ids currently carrying it.
///
/// Untagged entities (`Tag::NONE`) are not indexed; they are only reachable
/// through a full table scan.
#[derive(Default)]
pub(crate) struct TagIndex {
    per_tag: [Vec<Id>; config::MAX_TAGS],
}

impl TagIndex {
    pub(crate) fn insert(&mut self, tag: Tag, id: Id) {
        debug_assert!(id.is_valid());
        let Some(index) = tag.index() else { return };
        let list = &mut self.per_tag[index];
        if let Err(pos) = list.binary_search(&id) {
            list.insert(pos, id);
        }
    }

    pub(crate) fn remove(&mut self, tag: Tag, id: Id) {
        let Some(index) = tag.index() else { return };
        let list = &mut self.per_tag[index];
        if let Ok(pos) = list.binary_search(&id) {
            list.remove(pos);
        }
    }

    /// The sorted id list for a concrete tag.
    ///
    /// # Panics
    /// Panics if `tag` is `NONE`.
    pub(crate) fn ids(&self, tag: Tag) -> &[Id] {
        let index = tag.index().expect("cannot index the wildcard tag");
        &self.per_tag[index]
    }

    pub(crate) fn clear(&mut self) {
        for list in &mut self.per_tag {
            list.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Tag, TagIndex};
    use crate::entity::Id;

    #[test]
    fn matching() {
        let a = Tag::new(0);
        let b = Tag::new(1);
        assert!(a.matches(a));
        assert!(!a.matches(b));
        assert!(Tag::NONE.matches(a));
        assert!(a.matches(Tag::NONE));
        assert!(Tag::NONE.matches(Tag::NONE));
    }

    #[test]
    fn index_stays_sorted_and_deduplicated() {
        let tag = Tag::new(2);
        let mut index = TagIndex::default();
        for raw in [5_u16, 1, 3, 5, 2] {
            index.insert(tag, Id::new(raw));
        }
        let ids: Vec<u16> = index.ids(tag).iter().map(|id| id.raw()).collect();
        assert_eq!(ids, vec![1, 2, 3, 5]);

        index.remove(tag, Id::new(3));
        let ids: Vec<u16> = index.ids(tag).iter().map(|id| id.raw()).collect();
        assert_eq!(ids, vec![1, 2, 5]);
    }
}
