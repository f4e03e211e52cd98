//! Compile-time capacity limits.
//!
//! Every limit here is baked into the data layout (bitset widths, table sizes),
//! so changing one requires recompiling the crate and everything using it.

/// Capacity of the entity table.
pub const MAX_ENTITIES: usize = 1024;

/// Width of [`comp::IdSet`](crate::comp::IdSet),
/// i.e. the number of component types a registry may declare.
pub const MAX_COMPONENT_TYPES: usize = 64;

/// Number of worker threads spawned by the scheduler.
/// The main thread is not counted; it cooperates through
/// [`work_from_main_thread`](crate::scheduler::Frame::work_from_main_thread).
pub const MAX_WORKERS: usize = 3;

/// Width of [`scheduler::NodeIdSet`](crate::scheduler::NodeIdSet).
pub const MAX_NODES: usize = 64;

/// Number of distinct tag values, not counting [`Tag::NONE`](crate::tag::Tag::NONE).
pub const MAX_TAGS: usize = 8;

/// Bound on the scheduler's pending-task FIFO.
pub const MAX_PENDING_TASKS: usize = 256;

/// Default bound of [`event::EventQueue`](crate::event::EventQueue).
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Edge length of one spatial grid cell in world units.
///
/// [`SpatialGrid::region`](crate::spatial::SpatialGrid::region) maps
/// world-space rectangles onto cells at this scale unless the caller
/// overrides it.
pub const CELL_PIXEL_SIZE: f32 = 32.0;
