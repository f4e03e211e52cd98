//! Deferred-effect queue.
//!
//! Structural mutation is forbidden while tasks run, so systems that want to
//! remove entities or otherwise reshape the world push an event instead; the
//! main loop drains the queue after releasing the dispatch phase. The queue is
//! a bounded MPMC channel: any number of tasks may push concurrently.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::config;
use crate::error::Error;
use crate::scheduler::Scheduler;
use crate::world::Registry;

/// A deferred effect executed on the main thread between frames.
pub trait Event<R: Registry>: Send + 'static {
    /// Applies the effect. Structural access goes through
    /// [`Scheduler::world_mut`].
    fn execute(self, ecs: &Scheduler<R>);
}

/// A bounded multi-producer multi-consumer store-and-forward queue.
///
/// Handles are cheap to clone and share across threads.
pub struct EventQueue<E> {
    sender:   Sender<E>,
    receiver: Receiver<E>,
}

// not derived: handles clone regardless of the event type
impl<E> Clone for EventQueue<E> {
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone(), receiver: self.receiver.clone() }
    }
}

impl<E: Send> Default for EventQueue<E> {
    fn default() -> Self { Self::with_capacity(config::EVENT_QUEUE_CAPACITY) }
}

impl<E: Send> EventQueue<E> {
    /// Creates a queue bounded to `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Enqueues an event without blocking.
    pub fn push(&self, event: E) -> Result<(), Error> {
        self.sender.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => Error::EventCapacity,
            TrySendError::Disconnected(_) => unreachable!("queue holds its own receiver"),
        })
    }

    /// Dequeues one event without blocking.
    pub fn try_pop(&self) -> Option<E> { self.receiver.try_recv().ok() }
}

impl<E> EventQueue<E> {
    /// Executes every queued event.
    pub fn drain<R: Registry>(&self, ecs: &Scheduler<R>)
    where
        E: Event<R>,
    {
        while let Ok(event) = self.receiver.try_recv() {
            event.execute(ecs);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::EventQueue;
    use crate::error::Error;

    #[test]
    fn bounded_push_pop() {
        let queue = EventQueue::with_capacity(2);
        queue.push(1_u32).unwrap();
        queue.push(2).unwrap();
        assert_eq!(queue.push(3), Err(Error::EventCapacity));

        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn concurrent_producers() {
        let queue = EventQueue::with_capacity(64);
        let handles: Vec<_> = (0..4_u32)
            .map(|producer| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..8 {
                        queue.push(producer * 8 + i).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut drained = Vec::new();
        while let Some(value) = queue.try_pop() {
            drained.push(value);
        }
        drained.sort_unstable();
        assert_eq!(drained, (0..32).collect::<Vec<_>>());
    }
}
