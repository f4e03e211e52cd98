use thiserror::Error;

/// Recoverable failures surfaced to the caller.
///
/// Precondition violations (adding a component twice, removing an absent one,
/// dereferencing a stale handle) are programming errors and panic instead.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No free entity slot at or after the requested position.
    #[error("entity table is full at or after the requested position")]
    EntityCapacity,

    /// A spatial grid cell covered by the region is already full.
    #[error("spatial grid cell is full")]
    CellCapacity,

    /// The deferred event queue is at capacity.
    #[error("deferred event queue is full")]
    EventCapacity,

    /// The scheduler's pending-task FIFO is at capacity.
    #[error("pending task queue is full")]
    TaskCapacity,

    /// A task referenced an execution node outside `[0, MAX_NODES)`.
    #[error("execution node {0} is out of range")]
    InvalidNode(u16),
}
