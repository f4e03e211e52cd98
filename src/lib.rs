//! A fixed-capacity ECS runtime built around a conflict-arbitrated task
//! scheduler.
//!
//! # The model
//! Entities are slots in a fixed table, identified by a 16-bit [`Id`] and made
//! stale-proof by generational [`Handle`]s. Components are plain records
//! attached to entities; the full set of component types is declared once with
//! [`components!`], which assigns each type a dense index and a storage
//! strategy (dense array, sorted vector, or ordered map). Every entity also
//! carries a [`Tag`], a small label that partitions the population for coarse
//! dispatch.
//!
//! Systems are plain `fn`s over one entity: an [`Id`] followed by component
//! references. `&C`/`&mut C` arguments are mandatory and narrow the iteration
//! filter; `Option<&C>`/`Option<&mut C>` arguments resolve to `None` when the
//! component is absent. [`World::call_blocking`] applies such a function to
//! every matching entity, choosing the cheapest driving collection (tag index,
//! hintable storage, or table scan) and amortizing sorted-storage lookups with
//! cached cursors.
//!
//! # Why the scheduler is the point
//! [`Scheduler`] dispatches the same calls asynchronously onto a small pool of
//! worker threads. Each task declares its component access sets at enqueue
//! time; the dispatcher only starts a task when no running task conflicts with
//! it (mutable-mutable or mutable-shared overlap on a matching tag) and all of
//! its declared dependency nodes have completed. That arbitration is the
//! crate's entire data-race story: component storages carry no locks, and the
//! world-level phase lock only separates structural mutation (entity and
//! component add/remove, main thread only) from the dispatch phase.
//!
//! Pairwise work (collision tests and other spatial queries) uses two-pass
//! overlap tasks: a first pass per entity produces a
//! [`Holder`](system::Holder) that yields candidate partner ids, typically
//! from a [`SpatialGrid`](spatial::SpatialGrid), and a second pass runs per
//! surviving pair. Both passes have their own filter and tag, and both
//! participate in conflict detection.
//!
//! Frames are orchestrated by [`frame::MainLoop`]: enqueue tasks, cooperate
//! from the main thread, hand off to the render collaborator through two
//! [`Gate`]s, drain deferred [`event`]s, repeat.
//!
//! # What this crate is not
//! Capacities are compile-time constants ([`config`]); there is no dynamic
//! component registration, no persistence and no reference tracking beyond
//! generation checks. Tasks are not `async`: they are work items that run to
//! completion on OS threads.

#[doc(hidden)]
pub mod _reexports {
    pub use static_assertions;
}

pub mod comp;
pub mod config;
pub mod entity;
pub use entity::{Handle, Id};
mod error;
pub use error::Error;
pub mod event;
pub mod frame;
pub mod gate;
pub use gate::Gate;
mod macros;
pub mod scheduler;
pub use scheduler::{NodeId, NodeIdSet, Scheduler};
pub mod spatial;
pub mod storage;
pub mod system;
pub mod tag;
pub use tag::Tag;
pub mod world;
pub use world::World;

#[cfg(any(test, feature = "internal-bench"))]
pub mod test_util;
