//! The asynchronous task dispatcher.
//!
//! Tasks are filtered per-entity function invocations enqueued into a FIFO.
//! Worker threads (and, cooperatively, the main thread) claim tasks whose
//! declared component accesses conflict with no running task and whose
//! required completion nodes are all satisfied, then run them to completion.
//!
//! Two tasks conflict when their tags [match](Tag::matches) and one's mutable
//! set intersects the other's mutable or read-only set; tasks whose tags do
//! not match never conflict, because they visit disjoint entity populations.
//! Overlap tasks carry a second filter that participates in every pairing of
//! the check.
//!
//! This arbitration is the crate's data-race-freedom argument: component
//! storages have no locks of their own, and the world's phase lock only
//! separates structural mutation from dispatch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::{fmt, ops};

use bitvec::array::BitArray;
use bitvec::BitArr;
use parking_lot::{Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::comp::{Filter, IdSet};
use crate::config;
use crate::error::Error;
use crate::gate::Gate;
use crate::system::{self, ArgList, EntityFn, OverlapSystem};
use crate::tag::Tag;
use crate::world::{Registry, World};


/// A compact name for a task's completion milestone.
///
/// Later tasks declare dependencies by listing node ids in a [`NodeIdSet`];
/// a task is only claimable once every required node is in the completed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u16);

impl Default for NodeId {
    fn default() -> Self { Self::INVALID }
}

impl NodeId {
    /// A node id that no task may carry; enqueuing with it is rejected.
    pub const INVALID: Self = Self(u16::MAX);

    /// Creates a node id. Validity is checked at enqueue time.
    pub const fn new(index: u16) -> Self { Self(index) }

    /// Whether the id is within `[0, MAX_NODES)`.
    pub fn is_valid(self) -> bool { (self.0 as usize) < config::MAX_NODES }

    /// The raw index value.
    pub fn raw(self) -> u16 { self.0 }
}

type NodeBits = BitArr!(for config::MAX_NODES, in u64);

/// A fixed-width set of [`NodeId`]s.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeIdSet {
    bits: NodeBits,
}

impl NodeIdSet {
    /// The empty set.
    pub const EMPTY: Self = Self { bits: BitArray::ZERO };

    /// Adds a node to the set; invalid ids are ignored.
    pub fn insert(&mut self, node: NodeId) {
        if node.is_valid() {
            self.bits.set(node.0 as usize, true);
        }
    }

    /// Whether the node is in the set. Always false for invalid ids.
    pub fn test(&self, node: NodeId) -> bool {
        node.is_valid() && *self.bits.get(node.0 as usize).expect("valid id in range")
    }

    /// Whether every node of `self` is also in `other`.
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.bits
            .as_raw_slice()
            .iter()
            .zip(other.bits.as_raw_slice())
            .all(|(&sub, &sup)| sub & !sup == 0)
    }

    /// Removes every node from the set.
    pub fn clear(&mut self) { self.bits = BitArray::ZERO; }
}

impl From<NodeId> for NodeIdSet {
    fn from(node: NodeId) -> Self {
        let mut set = Self::EMPTY;
        set.insert(node);
        set
    }
}

impl FromIterator<NodeId> for NodeIdSet {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for node in iter {
            set.insert(node);
        }
        set
    }
}

impl fmt::Debug for NodeIdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.bits.iter_ones()).finish()
    }
}

/// The conflict-detection view of one iteration pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TaskFilter {
    pub(crate) read_only: IdSet,
    pub(crate) mutable:   IdSet,
    pub(crate) tag:       Tag,
}

impl TaskFilter {
    pub(crate) fn conflicts_with(&self, other: &Self) -> bool {
        self.tag.matches(other.tag)
            && (self.mutable.overlaps(&other.mutable)
                || self.mutable.overlaps(&other.read_only)
                || self.read_only.overlaps(&other.mutable))
    }
}

/// Both passes' filters of one task; simple tasks have no second pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TaskFilters {
    first:  TaskFilter,
    second: Option<TaskFilter>,
}

impl TaskFilters {
    fn conflicts_with(&self, other: &Self) -> bool {
        if self.first.conflicts_with(&other.first) {
            return true;
        }
        if let Some(second) = &other.second {
            if self.first.conflicts_with(second) {
                return true;
            }
        }
        if let Some(second) = &self.second {
            if second.conflicts_with(&other.first) {
                return true;
            }
            if let Some(other_second) = &other.second {
                if second.conflicts_with(other_second) {
                    return true;
                }
            }
        }
        false
    }
}

struct Task<R: Registry> {
    dispatch: Box<dyn FnOnce(&World<R>) + Send>,
    filters:  TaskFilters,
    required: NodeIdSet,
    node:     NodeId,
    notifier: Option<Arc<Gate>>,
}

/// A claimed task, detached from the queue while its filters sit in a slot.
struct Claimed<R: Registry> {
    dispatch: Box<dyn FnOnce(&World<R>) + Send>,
    node:     NodeId,
    notifier: Option<Arc<Gate>>,
}

#[derive(Clone, Copy)]
enum Slot {
    Worker(usize),
    Main,
}

/// Queue, running slots and completion set, all behind one mutex.
struct DispatchState<R: Registry> {
    pending:   VecDeque<Task<R>>,
    workers:   [Option<TaskFilters>; config::MAX_WORKERS],
    main:      Option<TaskFilters>,
    completed: NodeIdSet,
}

impl<R: Registry> Default for DispatchState<R> {
    fn default() -> Self {
        Self {
            pending:   VecDeque::new(),
            workers:   [None; config::MAX_WORKERS],
            main:      None,
            completed: NodeIdSet::EMPTY,
        }
    }
}

impl<R: Registry> DispatchState<R> {
    /// The dispatcher: the first pending task, in FIFO order, whose required
    /// nodes are all completed and which conflicts with no running task.
    fn find_task(&mut self) -> Option<Task<R>> {
        let position = self.pending.iter().position(|task| {
            task.required.is_subset_of(&self.completed) && !self.conflicts_with_running(task)
        })?;
        let task = self.pending.remove(position).expect("position from live iteration");
        debug_assert!(!self.completed.test(task.node), "node completed while still pending");
        Some(task)
    }

    fn conflicts_with_running(&self, task: &Task<R>) -> bool {
        self.workers
            .iter()
            .flatten()
            .chain(self.main.iter())
            .any(|running| task.filters.conflicts_with(running))
    }

    fn claim(&mut self, slot: Slot) -> Option<Claimed<R>> {
        let task = self.find_task()?;
        match slot {
            Slot::Worker(index) => self.workers[index] = Some(task.filters),
            Slot::Main => {
                debug_assert!(self.main.is_none(), "main thread already runs a task");
                self.main = Some(task.filters);
            }
        }
        Some(Claimed { dispatch: task.dispatch, node: task.node, notifier: task.notifier })
    }

    fn finish(&mut self, slot: Slot, node: NodeId) {
        self.completed.insert(node);
        match slot {
            Slot::Worker(index) => self.workers[index] = None,
            Slot::Main => self.main = None,
        }
    }
}

struct Shared<R: Registry> {
    world:          RwLock<World<R>>,
    state:          Mutex<DispatchState<R>>,
    work_available: Condvar,
    running:        AtomicBool,
}

fn worker_loop<R: Registry>(shared: &Shared<R>, index: usize) {
    let mut state = shared.state.lock();
    while shared.running.load(Ordering::SeqCst) {
        match state.claim(Slot::Worker(index)) {
            Some(Claimed { dispatch, node, notifier }) => {
                log::trace!("worker {index} claimed node {}", node.raw());
                MutexGuard::unlocked(&mut state, || {
                    let world = shared.world.read();
                    dispatch(&world);
                });
                state.finish(Slot::Worker(index), node);
                log::trace!("worker {index} completed node {}", node.raw());
                if let Some(gate) = notifier {
                    MutexGuard::unlocked(&mut state, move || gate.open());
                }
                // a completed node may have unblocked a dependent task
                shared.work_available.notify_all();
            }
            None => shared.work_available.wait(&mut state),
        }
    }
}

/// Exclusive access to the world for structural mutation.
pub type WorldMut<'s, R> = RwLockWriteGuard<'s, World<R>>;

/// The async manager: owns the world, the task queue and the worker pool.
pub struct Scheduler<R: Registry> {
    shared:  Arc<Shared<R>>,
    workers: Vec<JoinHandle<()>>,
}

impl<R: Registry> Default for Scheduler<R> {
    fn default() -> Self { Self::new(World::new()) }
}

impl<R: Registry> Scheduler<R> {
    /// Wraps a world for task dispatch. Workers are not started yet.
    pub fn new(world: World<R>) -> Self {
        Self {
            shared:  Arc::new(Shared {
                world:          RwLock::new(world),
                state:          Mutex::new(DispatchState::default()),
                work_available: Condvar::new(),
                running:        AtomicBool::new(false),
            }),
            workers: Vec::new(),
        }
    }

    /// Spawns the worker threads.
    ///
    /// # Panics
    /// Panics if the workers are already running.
    pub fn start_workers(&mut self) {
        assert!(self.workers.is_empty(), "workers already started");
        self.shared.running.store(true, Ordering::SeqCst);
        for index in 0..config::MAX_WORKERS {
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(format!("taskec worker #{index}"))
                .spawn(move || worker_loop(&shared, index))
                .expect("failed to spawn worker thread");
            self.workers.push(handle);
        }
    }

    /// Signals shutdown, discards still-pending tasks and joins the workers.
    ///
    /// # Panics
    /// Panics if the workers are not running.
    pub fn stop_workers(&mut self) {
        assert!(!self.workers.is_empty(), "workers not started");
        {
            let mut state = self.shared.state.lock();
            self.shared.running.store(false, Ordering::SeqCst);
            state.pending.clear();
        }
        self.shared.work_available.notify_all();
        for handle in self.workers.drain(..) {
            handle.join().expect("worker thread panicked");
        }
    }

    /// Exclusive (structural-phase) access to the world.
    ///
    /// Blocks until no dispatch-phase guard is live.
    pub fn world_mut(&self) -> WorldMut<'_, R> { self.shared.world.write() }

    /// Enters the dispatch phase: tasks may be enqueued and executed while the
    /// returned guard is live, and structural mutation is excluded.
    pub fn lock(&self) -> Frame<'_, R> {
        Frame { shared: &self.shared, world: self.shared.world.read() }
    }

    /// Whether any worker currently runs a task or tasks are still pending.
    pub fn any_worker_busy(&self) -> bool {
        let state = self.shared.state.lock();
        state.workers.iter().any(Option::is_some) || !state.pending.is_empty()
    }

    /// Clears the completion set; called once per frame after the queue drains.
    ///
    /// # Panics
    /// Panics if tasks are still pending.
    pub fn reset_completed_nodes(&self) {
        let mut state = self.shared.state.lock();
        assert!(state.pending.is_empty(), "resetting completion set with tasks still pending");
        state.completed.clear();
    }

    /// Stops the workers if needed and returns the world.
    pub fn into_world(mut self) -> World<R> {
        if !self.workers.is_empty() {
            self.stop_workers();
        }
        let shared = Arc::clone(&self.shared);
        drop(self);
        match Arc::try_unwrap(shared) {
            Ok(shared) => shared.world.into_inner(),
            Err(_) => panic!("stopped workers still reference the world"),
        }
    }
}

impl<R: Registry> Drop for Scheduler<R> {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop_workers();
        }
    }
}

/// The dispatch-phase guard returned by [`Scheduler::lock`].
///
/// Dereferences to the world for read-only queries; structural mutation is
/// excluded while any `Frame` is live.
pub struct Frame<'s, R: Registry> {
    shared: &'s Shared<R>,
    world:  RwLockReadGuard<'s, World<R>>,
}

impl<'s, R: Registry> ops::Deref for Frame<'s, R> {
    type Target = World<R>;

    fn deref(&self) -> &World<R> { &self.world }
}

impl<'s, R: Registry> Frame<'s, R> {
    /// Enqueues a per-entity task.
    ///
    /// `func` runs for every entity matching the effective filter (`Fil` plus
    /// mandatory arguments) and `tag`, once the task is claimed. The task
    /// becomes claimable when every node in `required` is completed and no
    /// conflicting task is running. `notifier` (if any) is opened after the
    /// task completes.
    pub fn call_async<Fil, A, F>(
        &self,
        func: F,
        tag: Tag,
        node: NodeId,
        required: NodeIdSet,
        notifier: Option<Arc<Gate>>,
    ) -> Result<(), Error>
    where
        Fil: Filter + 'static,
        A: 'static,
        F: EntityFn<R, A>,
    {
        if !node.is_valid() {
            return Err(Error::InvalidNode(node.raw()));
        }
        system::assert_disjoint(F::ACCESS);
        let filters = TaskFilters {
            first:  TaskFilter {
                read_only: system::read_only_set(F::ACCESS),
                mutable: system::mutable_set(F::ACCESS),
                tag,
            },
            second: None,
        };
        // Safety: the dispatcher only runs this shim while the task's declared
        // accesses are conflict-free among running tasks.
        let dispatch = Box::new(move |world: &World<R>| unsafe {
            world.dispatch_blocking::<Fil, A, F>(func, tag)
        });
        self.enqueue(Task { dispatch, filters, required, node, notifier })
    }

    /// Enqueues a two-pass pairwise task; see
    /// [`OverlapSystem`](crate::system::OverlapSystem).
    ///
    /// Both passes' access sets participate in conflict detection, each under
    /// its own tag.
    pub fn call_async_overlap<S: OverlapSystem<R>>(
        &self,
        sys: S,
        tag_a: Tag,
        tag_b: Tag,
        node: NodeId,
        required: NodeIdSet,
        notifier: Option<Arc<Gate>>,
    ) -> Result<(), Error> {
        if !node.is_valid() {
            return Err(Error::InvalidNode(node.raw()));
        }
        system::assert_disjoint(<S::Args1 as ArgList<R>>::ACCESS);
        system::assert_disjoint(<S::Args2 as ArgList<R>>::ACCESS);
        let filters = TaskFilters {
            first:  TaskFilter {
                read_only: system::read_only_set(<S::Args1 as ArgList<R>>::ACCESS),
                mutable: system::mutable_set(<S::Args1 as ArgList<R>>::ACCESS),
                tag: tag_a,
            },
            second: Some(TaskFilter {
                read_only: system::read_only_set(<S::Args2 as ArgList<R>>::ACCESS),
                mutable:   system::mutable_set(<S::Args2 as ArgList<R>>::ACCESS),
                tag:       tag_b,
            }),
        };
        // Safety: as in call_async, over the union of both passes.
        let dispatch = Box::new(move |world: &World<R>| unsafe {
            world.dispatch_overlap(&sys, tag_a, tag_b)
        });
        self.enqueue(Task { dispatch, filters, required, node, notifier })
    }

    fn enqueue(&self, task: Task<R>) -> Result<(), Error> {
        {
            let mut state = self.shared.state.lock();
            if state.pending.len() >= config::MAX_PENDING_TASKS {
                return Err(Error::TaskCapacity);
            }
            state.pending.push_back(task);
        }
        self.shared.work_available.notify_one();
        Ok(())
    }

    /// Claims and executes tasks on the calling thread, using the dedicated
    /// main-thread slot (visible to conflict detection like any worker).
    ///
    /// With `single_job` the loop stops after one task; otherwise it runs
    /// until nothing is claimable. Returns whether any task was executed.
    pub fn work_from_main_thread(&self, single_job: bool) -> bool {
        let mut executed = false;
        loop {
            let mut state = self.shared.state.lock();
            let Some(Claimed { dispatch, node, notifier }) = state.claim(Slot::Main) else {
                break;
            };
            log::trace!("main thread claimed node {}", node.raw());
            MutexGuard::unlocked(&mut state, || dispatch(&self.world));
            state.finish(Slot::Main, node);
            drop(state);
            log::trace!("main thread completed node {}", node.raw());
            if let Some(gate) = notifier {
                gate.open();
            }
            self.shared.work_available.notify_all();
            executed = true;
            if single_job {
                break;
            }
        }
        executed
    }
}
