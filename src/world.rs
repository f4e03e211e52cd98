//! The manager: entity/component bookkeeping and blocking iteration.
//!
//! A [`World`] owns the entity table, the tag index and one storage container
//! per payload component type (generated by
//! [`components!`](crate::components)). Structural mutation (entity and
//! component add/remove) requires `&mut World`; iteration walks the table
//! through `&World` and reaches component payloads through the storage cells.
//!
//! The scheduler wraps the world in a phase lock: the write side is the
//! exclusive structural phase, the read side is the dispatch phase shared by
//! the main thread and the workers. Blocking calls on `&mut World` are
//! therefore statically known not to overlap any running task.

use crate::comp::{AnyComponent, Component, Empty, Filter, IdSet};
use crate::entity::table::Table;
use crate::entity::{Handle, Id};
use crate::error::Error;
use crate::storage::Cell;
use crate::system::{self, ArgList, EntityFn, Holder, OverlapSystem};
use crate::tag::{Tag, TagIndex};


/// A registry of component types declared by [`components!`](crate::components).
///
/// The implementing struct holds the storage containers themselves.
pub trait Registry: Default + Send + Sync + 'static {
    /// The number of declared component types.
    const COUNT: usize;

    /// Removes every payload in `present` for `id` from the storages.
    fn remove_all(&mut self, id: Id, present: &IdSet);
}

/// Typed lookup of one component's storage within a registry.
///
/// Implemented by [`components!`](crate::components) for every payload
/// component declared in the registry.
pub trait HasStorage<C: Component>: Registry {
    /// The storage cell for `C`.
    fn cell(&self) -> &Cell<C::Storage>;

    /// Exclusive access to the storage for `C`.
    fn storage_mut(&mut self) -> &mut C::Storage;
}

/// Entity/component storage with a blocking iteration API.
#[derive(Default)]
pub struct World<R: Registry> {
    entities: Table,
    tags:     TagIndex,
    storages: R,
}

impl<R: Registry> World<R> {
    /// Creates an empty world.
    pub fn new() -> Self { Self::default() }

    pub(crate) fn storages(&self) -> &R { &self.storages }

    /// The number of live entities.
    pub fn count(&self) -> usize { self.entities.count() }

    /// Whether `handle` refers to a live entity.
    pub fn is_valid(&self, handle: Handle) -> bool { self.entities.is_live(handle) }

    /// The current handle for an allocated slot, `None` if the slot is free.
    pub fn handle(&self, id: Id) -> Option<Handle> { self.entities.handle(id) }

    /// Whether the entity currently carries component `C`.
    pub fn has_component<C: AnyComponent<Registry = R>>(&self, id: Id) -> bool {
        self.entities.get(id).map_or(false, |record| record.components().test(C::INDEX))
    }

    /// Allocates the first free slot at or after `min_position`.
    pub fn add_entity(&mut self, tag: Tag, min_position: u16) -> Result<Handle, Error> {
        let handle = self.entities.add(tag, min_position)?;
        self.tags.insert(tag, handle.id());
        Ok(handle)
    }

    /// Removes an entity and all its components.
    ///
    /// Returns `false` when the handle is stale.
    pub fn remove_entity(&mut self, handle: Handle) -> bool {
        if !self.entities.is_live(handle) {
            return false;
        }
        let id = handle.id();
        let record = self.entities.record_mut(id);
        let tag = record.tag();
        let present = *record.components();
        *record.components_mut() = IdSet::EMPTY;

        self.tags.remove(tag, id);
        self.storages.remove_all(id, &present);
        self.entities.remove_checked(id);
        true
    }

    /// Removes every entity.
    pub fn clear(&mut self) {
        while let Some(id) = self.entities.next_match(None, &IdSet::EMPTY, Tag::NONE) {
            let handle = self.entities.handle(id).expect("matched slot is allocated");
            self.remove_entity(handle);
        }
        self.tags.clear();
    }

    /// Attaches a default-initialized component to an allocated entity.
    ///
    /// # Panics
    /// Panics if the entity is not allocated or already carries `C`.
    pub fn add_component<C>(&mut self, id: Id) -> &mut C
    where
        C: Component<Registry = R>,
        R: HasStorage<C>,
    {
        let record = self.entities.record_mut(id);
        assert!(!record.components().test(C::INDEX), "component already present on {id:?}");
        record.components_mut().insert(C::INDEX);
        crate::storage::Storage::insert(<R as HasStorage<C>>::storage_mut(&mut self.storages), id)
    }

    /// Attaches a payload-less component: only the presence bit is recorded.
    ///
    /// # Panics
    /// Panics if the entity is not allocated or already carries `C`.
    pub fn add_empty_component<C: Empty<Registry = R>>(&mut self, id: Id) {
        let record = self.entities.record_mut(id);
        assert!(!record.components().test(C::INDEX), "component already present on {id:?}");
        record.components_mut().insert(C::INDEX);
    }

    /// Detaches a component (payload or empty).
    ///
    /// # Panics
    /// Panics if the entity is not allocated or does not carry `C`.
    pub fn remove_component<C: AnyComponent<Registry = R>>(&mut self, id: Id) {
        let record = self.entities.record_mut(id);
        assert!(record.components().test(C::INDEX), "component absent on {id:?}");
        record.components_mut().remove(C::INDEX);
        C::remove(&mut self.storages, id);
    }

    /// Reads a component payload.
    ///
    /// Takes `&mut self` because a shared read could otherwise race a running
    /// task's write; systems read components through iteration arguments
    /// instead.
    pub fn get_component<C>(&mut self, id: Id) -> Option<&C>
    where
        C: Component<Registry = R>,
        R: HasStorage<C>,
    {
        if !self.has_component::<C>(id) {
            return None;
        }
        crate::storage::Storage::get(<R as HasStorage<C>>::storage_mut(&mut self.storages), id)
    }

    /// Mutable variant of [`get_component`](Self::get_component).
    pub fn get_component_mut<C>(&mut self, id: Id) -> Option<&mut C>
    where
        C: Component<Registry = R>,
        R: HasStorage<C>,
    {
        if !self.has_component::<C>(id) {
            return None;
        }
        crate::storage::Storage::get_mut(<R as HasStorage<C>>::storage_mut(&mut self.storages), id)
    }

    /// Invokes `func` for every entity matching the effective filter
    /// (`Fil` plus the function's mandatory arguments) and `tag`.
    ///
    /// Dispatch picks the cheapest driving collection: the tag index for a
    /// concrete tag, the first mandatory argument's storage when it can
    /// enumerate ids in order, and a full table scan otherwise.
    pub fn call_blocking<Fil, A, F>(&mut self, func: F, tag: Tag)
    where
        Fil: Filter,
        F: EntityFn<R, A>,
    {
        // exclusive world access proves no task is running concurrently
        unsafe { self.dispatch_blocking::<Fil, A, F>(func, tag) }
    }

    /// Runs a two-pass pairwise iteration; see
    /// [`OverlapSystem`](crate::system::OverlapSystem).
    pub fn call_overlap_blocking<S: OverlapSystem<R>>(&mut self, sys: &S, tag_a: Tag, tag_b: Tag) {
        unsafe { self.dispatch_overlap(sys, tag_a, tag_b) }
    }

    /// Filtered iteration shared by the blocking API and the task shims.
    ///
    /// # Safety
    /// The caller must guarantee that every access in `F::ACCESS` is free of
    /// conflicts for the duration of the call: either through exclusive world
    /// access, or because the scheduler admitted the enclosing task.
    pub(crate) unsafe fn dispatch_blocking<Fil, A, F>(&self, func: F, tag: Tag)
    where
        Fil: Filter,
        F: EntityFn<R, A>,
    {
        system::assert_disjoint(F::ACCESS);
        let mut filter = Fil::id_set();
        filter.union_with(&system::mandatory_set(F::ACCESS));
        let mut cursors = F::Cursors::default();

        if tag.index().is_some() {
            for &id in self.tags.ids(tag) {
                let record = self.entities.get_checked(id);
                if filter.is_subset_of(record.components()) {
                    unsafe { func.invoke(self, id, record.components(), &mut cursors) };
                }
            }
            return;
        }

        if let Some(ids) = unsafe { F::hint(self) } {
            for id in ids {
                let record = self.entities.get_checked(id);
                if record.pass(&filter, tag) {
                    unsafe { func.invoke(self, id, record.components(), &mut cursors) };
                }
            }
            return;
        }

        let mut previous = None;
        while let Some(id) = self.entities.next_match(previous, &filter, tag) {
            let record = self.entities.get_checked(id);
            unsafe { func.invoke(self, id, record.components(), &mut cursors) };
            previous = Some(id);
        }
    }

    /// Two-pass pairwise iteration shared by the blocking API and the task
    /// shims.
    ///
    /// # Safety
    /// Same contract as [`dispatch_blocking`](Self::dispatch_blocking), over
    /// the union of both passes' access lists.
    pub(crate) unsafe fn dispatch_overlap<S: OverlapSystem<R>>(
        &self,
        sys: &S,
        tag_a: Tag,
        tag_b: Tag,
    ) {
        system::assert_disjoint(<S::Args1 as ArgList<R>>::ACCESS);
        system::assert_disjoint(<S::Args2 as ArgList<R>>::ACCESS);
        let mut filter_a = S::FilterA::id_set();
        filter_a.union_with(&system::mandatory_set(<S::Args1 as ArgList<R>>::ACCESS));
        let mut filter_b = S::FilterB::id_set();
        filter_b.union_with(&system::mandatory_set(<S::Args2 as ArgList<R>>::ACCESS));

        let mut scratch = Vec::with_capacity(128);
        let mut cursors1 = <S::Args1 as ArgList<R>>::Cursors::default();

        if let Some(ids) = unsafe { S::Args1::hint(self) } {
            for id in ids {
                let record = self.entities.get_checked(id);
                if record.pass(&filter_a, tag_a) {
                    unsafe {
                        self.overlap_pairs(sys, id, &mut cursors1, &filter_b, tag_b, &mut scratch)
                    };
                }
            }
            return;
        }

        let mut previous = None;
        while let Some(id) = self.entities.next_match(previous, &filter_a, tag_a) {
            unsafe { self.overlap_pairs(sys, id, &mut cursors1, &filter_b, tag_b, &mut scratch) };
            previous = Some(id);
        }
    }

    /// Runs the first pass for `a` and the second pass for each candidate.
    ///
    /// # Safety
    /// See [`dispatch_overlap`](Self::dispatch_overlap).
    unsafe fn overlap_pairs<S: OverlapSystem<R>>(
        &self,
        sys: &S,
        a: Id,
        cursors1: &mut <S::Args1 as ArgList<R>>::Cursors,
        filter_b: &IdSet,
        tag_b: Tag,
        scratch: &mut Vec<Id>,
    ) {
        let present_a = self.entities.get_checked(a).components();
        let args = unsafe { S::Args1::fetch(self, a, present_a, cursors1) };
        let mut holder = sys.first_pass(a, args);

        let mut cursors2 = <S::Args2 as ArgList<R>>::Cursors::default();
        for b in holder.iter(scratch) {
            if b == a {
                // a self-pair would alias the holder's borrows
                continue;
            }
            let Some(record) = self.entities.get(b) else { continue };
            if record.pass(filter_b, tag_b) {
                let args = unsafe { S::Args2::fetch(self, b, record.components(), &mut cursors2) };
                sys.second_pass(&mut holder, b, args);
            }
        }
    }
}
