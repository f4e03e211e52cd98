//! Typed component access for per-entity system functions.
//!
//! A system is a plain `fn` taking an entity id followed by *decorated
//! component arguments*: `&C` and `&mut C` are mandatory accesses that add `C`
//! to the iteration filter; `Option<&C>` and `Option<&mut C>` are optional
//! accesses that resolve to `None` when the entity lacks the component and do
//! not constrain the filter. Both forms contribute to the scheduler's
//! read/mutate conflict sets.
//!
//! The traits here recover that information from the function's signature:
//! [`Access`] describes one argument, [`EntityFn`] is implemented for `fn`
//! pointers of every supported arity, and [`ArgList`] bundles an argument
//! tuple for the two passes of an [`OverlapSystem`].

use crate::comp::{AnyComponent, Component, Filter, IdSet};
use crate::entity::Id;
use crate::storage::{Cursor, Storage};
use crate::world::{HasStorage, Registry, World};

/// Access metadata of one decorated argument.
#[derive(Debug, Clone, Copy)]
pub struct ArgAccess {
    /// Component type index within the registry.
    pub comp:      usize,
    /// Whether the access is unique (`&mut` forms).
    pub mutable:   bool,
    /// Whether the access constrains the iteration filter (non-`Option` forms).
    pub mandatory: bool,
}

pub(crate) fn mandatory_set(access: &[ArgAccess]) -> IdSet {
    let mut set = IdSet::EMPTY;
    for arg in access {
        if arg.mandatory {
            set.insert(arg.comp);
        }
    }
    set
}

/// All shared accesses, optional ones included: the conflict-detection view.
pub(crate) fn read_only_set(access: &[ArgAccess]) -> IdSet {
    let mut set = IdSet::EMPTY;
    for arg in access {
        if !arg.mutable {
            set.insert(arg.comp);
        }
    }
    set
}

/// All unique accesses, optional ones included: the conflict-detection view.
pub(crate) fn mutable_set(access: &[ArgAccess]) -> IdSet {
    let mut set = IdSet::EMPTY;
    for arg in access {
        if arg.mutable {
            set.insert(arg.comp);
        }
    }
    set
}

/// Rejects argument lists that would alias a component within one call.
///
/// Requesting the same component mutably twice, or both mutably and shared,
/// would hand out overlapping references for the same entity. Two shared
/// requests are fine.
pub(crate) fn assert_disjoint(access: &[ArgAccess]) {
    let mut shared = IdSet::EMPTY;
    let mut unique = IdSet::EMPTY;
    for arg in access {
        if arg.mutable {
            assert!(
                !unique.test(arg.comp) && !shared.test(arg.comp),
                "component index {} is requested mutably and again in the same call",
                arg.comp,
            );
            unique.insert(arg.comp);
        } else {
            assert!(
                !unique.test(arg.comp),
                "component index {} is requested both mutably and shared in the same call",
                arg.comp,
            );
            shared.insert(arg.comp);
        }
    }
}

/// One decorated component argument.
///
/// Implemented for `&C`, `&mut C`, `Option<&C>` and `Option<&mut C>` where `C`
/// is a payload component of the registry.
pub trait Access<R: Registry> {
    /// The component type accessed.
    type Comp: AnyComponent;

    /// Whether this argument constrains the iteration filter.
    const MANDATORY: bool;

    /// Whether this argument takes unique access.
    const MUTABLE: bool;

    /// The per-argument lookup cursor.
    type Cursor: Default;

    /// The reference handed to the function at world lifetime `'w`.
    type Arg<'w>;

    /// Resolves the argument for one entity.
    ///
    /// # Safety
    /// The caller must be entitled to this access by conflict arbitration
    /// (the running task declared it, or the caller holds the world
    /// exclusively), and for mandatory arguments the entity must have passed
    /// the effective filter.
    unsafe fn fetch<'w>(
        world: &'w World<R>,
        id: Id,
        present: &IdSet,
        cursor: &mut Self::Cursor,
    ) -> Self::Arg<'w>;

    /// Snapshots the storage's id collection when it can drive iteration.
    ///
    /// # Safety
    /// Same arbitration contract as [`fetch`](Self::fetch).
    unsafe fn hint_ids(world: &World<R>) -> Option<Vec<Id>>;
}

impl<'s, R, C> Access<R> for &'s C
where
    R: Registry + HasStorage<C>,
    C: Component,
{
    type Comp = C;
    const MANDATORY: bool = true;
    const MUTABLE: bool = false;
    type Cursor = Cursor;
    type Arg<'w> = &'w C;

    unsafe fn fetch<'w>(
        world: &'w World<R>,
        id: Id,
        _present: &IdSet,
        cursor: &mut Cursor,
    ) -> &'w C {
        let storage = unsafe { &*<R as HasStorage<C>>::cell(world.storages()).as_ptr() };
        storage.get_hinted(id, cursor).expect("filter guarantees component presence")
    }

    unsafe fn hint_ids(world: &World<R>) -> Option<Vec<Id>> {
        hint_ids_of::<R, C>(world)
    }
}

impl<'s, R, C> Access<R> for &'s mut C
where
    R: Registry + HasStorage<C>,
    C: Component,
{
    type Comp = C;
    const MANDATORY: bool = true;
    const MUTABLE: bool = true;
    type Cursor = Cursor;
    type Arg<'w> = &'w mut C;

    unsafe fn fetch<'w>(
        world: &'w World<R>,
        id: Id,
        _present: &IdSet,
        cursor: &mut Cursor,
    ) -> &'w mut C {
        let storage = unsafe { &mut *<R as HasStorage<C>>::cell(world.storages()).as_ptr() };
        let comp = storage.get_hinted_mut(id, cursor).expect("filter guarantees component presence");
        // Detach from the transient storage borrow; arbitration plus the
        // distinct-id guarantee keep references to different entities disjoint.
        unsafe { &mut *(comp as *mut C) }
    }

    unsafe fn hint_ids(world: &World<R>) -> Option<Vec<Id>> {
        hint_ids_of::<R, C>(world)
    }
}

impl<'s, R, C> Access<R> for Option<&'s C>
where
    R: Registry + HasStorage<C>,
    C: Component,
{
    type Comp = C;
    const MANDATORY: bool = false;
    const MUTABLE: bool = false;
    type Cursor = Cursor;
    type Arg<'w> = Option<&'w C>;

    unsafe fn fetch<'w>(
        world: &'w World<R>,
        id: Id,
        present: &IdSet,
        cursor: &mut Cursor,
    ) -> Option<&'w C> {
        if !present.test(C::INDEX) {
            return None;
        }
        let storage = unsafe { &*<R as HasStorage<C>>::cell(world.storages()).as_ptr() };
        Some(storage.get_hinted(id, cursor).expect("entity bitset promises presence"))
    }

    unsafe fn hint_ids(_world: &World<R>) -> Option<Vec<Id>> { None }
}

impl<'s, R, C> Access<R> for Option<&'s mut C>
where
    R: Registry + HasStorage<C>,
    C: Component,
{
    type Comp = C;
    const MANDATORY: bool = false;
    const MUTABLE: bool = true;
    type Cursor = Cursor;
    type Arg<'w> = Option<&'w mut C>;

    unsafe fn fetch<'w>(
        world: &'w World<R>,
        id: Id,
        present: &IdSet,
        cursor: &mut Cursor,
    ) -> Option<&'w mut C> {
        if !present.test(C::INDEX) {
            return None;
        }
        let storage = unsafe { &mut *<R as HasStorage<C>>::cell(world.storages()).as_ptr() };
        let comp = storage.get_hinted_mut(id, cursor).expect("entity bitset promises presence");
        Some(unsafe { &mut *(comp as *mut C) })
    }

    unsafe fn hint_ids(_world: &World<R>) -> Option<Vec<Id>> { None }
}

/// Shared body of [`Access::hint_ids`] for mandatory accesses.
///
/// # Safety
/// Same arbitration contract as [`Access::fetch`].
unsafe fn hint_ids_of<R, C>(world: &World<R>) -> Option<Vec<Id>>
where
    R: Registry + HasStorage<C>,
    C: Component,
{
    if !<C::Storage as Storage>::USABLE_AS_FILTER_HINT {
        return None;
    }
    let storage = unsafe { &*<R as HasStorage<C>>::cell(world.storages()).as_ptr() };
    let mut ids = Vec::new();
    storage.ids(&mut ids);
    Some(ids)
}

/// A per-entity function: a `fn` pointer taking an [`Id`] followed by up to
/// six decorated component arguments.
///
/// The `Args` parameter names the decorated argument list and is inferred from
/// the function's signature.
pub trait EntityFn<R: Registry, Args>: Copy + Send + 'static {
    /// Access metadata per argument, in declaration order.
    const ACCESS: &'static [ArgAccess];

    /// One lookup cursor per argument.
    type Cursors: Default;

    /// Snapshots the driving id collection of the first mandatory argument,
    /// if its storage can enumerate ids in order.
    ///
    /// # Safety
    /// Same arbitration contract as [`Access::fetch`].
    unsafe fn hint(world: &World<R>) -> Option<Vec<Id>>;

    /// Invokes the function for one entity that passed the effective filter.
    ///
    /// # Safety
    /// Same arbitration contract as [`Access::fetch`].
    unsafe fn invoke(&self, world: &World<R>, id: Id, present: &IdSet, cursors: &mut Self::Cursors);
}

impl<R: Registry, F> EntityFn<R, ()> for F
where
    F: Fn(Id) + Copy + Send + 'static,
{
    const ACCESS: &'static [ArgAccess] = &[];
    type Cursors = ();

    unsafe fn hint(_world: &World<R>) -> Option<Vec<Id>> { None }

    unsafe fn invoke(
        &self,
        _world: &World<R>,
        id: Id,
        _present: &IdSet,
        _cursors: &mut Self::Cursors,
    ) {
        (self)(id)
    }
}

macro_rules! impl_entity_fn {
    ($(($A:ident, $cursor:ident)),+) => {
        impl<R: Registry, F $(, $A: Access<R>)+> EntityFn<R, ($($A,)+)> for F
        where
            F: Fn(Id $(, $A)+),
            F: for<'w> Fn(Id $(, <$A as Access<R>>::Arg<'w>)+),
            F: Copy + Send + 'static,
        {
            const ACCESS: &'static [ArgAccess] = &[
                $(ArgAccess {
                    comp:      <<$A as Access<R>>::Comp as AnyComponent>::INDEX,
                    mutable:   <$A as Access<R>>::MUTABLE,
                    mandatory: <$A as Access<R>>::MANDATORY,
                }),+
            ];
            type Cursors = ($(<$A as Access<R>>::Cursor,)+);

            unsafe fn hint(world: &World<R>) -> Option<Vec<Id>> {
                $(
                    if <$A as Access<R>>::MANDATORY {
                        return unsafe { <$A as Access<R>>::hint_ids(world) };
                    }
                )+
                None
            }

            unsafe fn invoke(
                &self,
                world: &World<R>,
                id: Id,
                present: &IdSet,
                cursors: &mut Self::Cursors,
            ) {
                let ($($cursor,)+) = cursors;
                (self)(id $(, unsafe { <$A as Access<R>>::fetch(world, id, present, $cursor) })+)
            }
        }
    };
}

impl_entity_fn!((A0, c0));
impl_entity_fn!((A0, c0), (A1, c1));
impl_entity_fn!((A0, c0), (A1, c1), (A2, c2));
impl_entity_fn!((A0, c0), (A1, c1), (A2, c2), (A3, c3));
impl_entity_fn!((A0, c0), (A1, c1), (A2, c2), (A3, c3), (A4, c4));
impl_entity_fn!((A0, c0), (A1, c1), (A2, c2), (A3, c3), (A4, c4), (A5, c5));

/// A tuple of decorated arguments, fetched together for one pass of an
/// [`OverlapSystem`].
///
/// Name accesses with `'static` references (`(&'static Pos, &'static mut Vel)`);
/// [`Item`](Self::Item) re-attaches the world lifetime.
pub trait ArgList<R: Registry> {
    /// Access metadata per element, in order.
    const ACCESS: &'static [ArgAccess];

    /// One lookup cursor per element.
    type Cursors: Default;

    /// The fetched tuple at world lifetime `'w`.
    type Item<'w>;

    /// See [`EntityFn::hint`].
    ///
    /// # Safety
    /// Same arbitration contract as [`Access::fetch`].
    unsafe fn hint(world: &World<R>) -> Option<Vec<Id>>;

    /// Fetches the tuple for one entity.
    ///
    /// # Safety
    /// Same arbitration contract as [`Access::fetch`].
    unsafe fn fetch<'w>(
        world: &'w World<R>,
        id: Id,
        present: &IdSet,
        cursors: &mut Self::Cursors,
    ) -> Self::Item<'w>;
}

impl<R: Registry> ArgList<R> for () {
    const ACCESS: &'static [ArgAccess] = &[];
    type Cursors = ();
    type Item<'w> = ();

    unsafe fn hint(_world: &World<R>) -> Option<Vec<Id>> { None }

    unsafe fn fetch<'w>(
        _world: &'w World<R>,
        _id: Id,
        _present: &IdSet,
        _cursors: &mut Self::Cursors,
    ) {
    }
}

macro_rules! impl_arg_list {
    ($(($A:ident, $cursor:ident)),+) => {
        impl<R: Registry $(, $A: Access<R>)+> ArgList<R> for ($($A,)+) {
            const ACCESS: &'static [ArgAccess] = &[
                $(ArgAccess {
                    comp:      <<$A as Access<R>>::Comp as AnyComponent>::INDEX,
                    mutable:   <$A as Access<R>>::MUTABLE,
                    mandatory: <$A as Access<R>>::MANDATORY,
                }),+
            ];
            type Cursors = ($(<$A as Access<R>>::Cursor,)+);
            type Item<'w> = ($(<$A as Access<R>>::Arg<'w>,)+);

            unsafe fn hint(world: &World<R>) -> Option<Vec<Id>> {
                $(
                    if <$A as Access<R>>::MANDATORY {
                        return unsafe { <$A as Access<R>>::hint_ids(world) };
                    }
                )+
                None
            }

            unsafe fn fetch<'w>(
                world: &'w World<R>,
                id: Id,
                present: &IdSet,
                cursors: &mut Self::Cursors,
            ) -> Self::Item<'w> {
                let ($($cursor,)+) = cursors;
                ($(unsafe { <$A as Access<R>>::fetch(world, id, present, $cursor) },)+)
            }
        }
    };
}

impl_arg_list!((A0, c0));
impl_arg_list!((A0, c0), (A1, c1));
impl_arg_list!((A0, c0), (A1, c1), (A2, c2));
impl_arg_list!((A0, c0), (A1, c1), (A2, c2), (A3, c3));
impl_arg_list!((A0, c0), (A1, c1), (A2, c2), (A3, c3), (A4, c4));
impl_arg_list!((A0, c0), (A1, c1), (A2, c2), (A3, c3), (A4, c4), (A5, c5));

/// The first-pass result of an overlap iteration: yields candidate partner
/// ids for the second pass.
///
/// The iterator is built eagerly into the reusable `scratch` buffer and
/// borrows only it, so the holder itself stays mutably accessible while the
/// candidates are walked.
pub trait Holder {
    /// The candidate iterator, borrowing the scratch buffer.
    type Iter<'t>: Iterator<Item = Id>;

    /// Produces the candidate ids, using `scratch` as backing storage.
    fn iter<'t>(&self, scratch: &'t mut Vec<Id>) -> Self::Iter<'t>;
}

/// A two-pass pairwise system.
///
/// For every entity A matching (`FilterA` ∪ mandatory `Args1`, `tag_a`),
/// [`first_pass`](Self::first_pass) produces a [`Holder`]; for every candidate
/// B it yields that matches (`FilterB` ∪ mandatory `Args2`, `tag_b`),
/// [`second_pass`](Self::second_pass) runs with mutable access to the holder.
/// Candidates equal to A are skipped: they would alias the holder's borrows.
///
/// The holder is the only party that knows how B-candidates are produced,
/// which keeps the iteration contract independent of any particular spatial
/// index.
pub trait OverlapSystem<R: Registry>: Send + 'static {
    /// Extra filter components for the first pass.
    type FilterA: Filter;
    /// Extra filter components for the second pass.
    type FilterB: Filter;
    /// Decorated arguments of the first pass.
    type Args1: ArgList<R>;
    /// Decorated arguments of the second pass.
    type Args2: ArgList<R>;
    /// The holder type, generic over the world borrow it may capture.
    type Holder<'w>: Holder;

    /// Runs once per matching entity A, returning the candidate source.
    fn first_pass<'w>(
        &self,
        id: Id,
        args: <Self::Args1 as ArgList<R>>::Item<'w>,
    ) -> Self::Holder<'w>;

    /// Runs once per matching (A, B) pair.
    fn second_pass<'w>(
        &self,
        holder: &mut Self::Holder<'w>,
        id: Id,
        args: <Self::Args2 as ArgList<R>>::Item<'w>,
    );
}
