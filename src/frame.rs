//! Per-frame orchestration.
//!
//! [`MainLoop`] sequences one frame the way the dispatcher expects: poll the
//! host, enter the dispatch phase, enqueue the frame's tasks, cooperate from
//! the main thread, wait for the render handoff, drain until idle, reset the
//! completion set, leave the phase, then apply deferred events.
//!
//! The render collaborator runs on its own thread: it blocks on the
//! [`graphic_update`](MainLoop::graphic_update) gate (typically opened by a
//! graphics task's notifier), draws, and opens
//! [`render_sync`](MainLoop::render_sync) to let the frame finish.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::event::{Event, EventQueue};
use crate::gate::Gate;
use crate::scheduler::{Frame, Scheduler};
use crate::world::{Registry, World};

/// Owns the scheduler, the deferred-event queue and the render gates, and
/// runs the per-frame sequence.
pub struct MainLoop<R: Registry, E: Event<R>> {
    ecs:             Scheduler<R>,
    events:          EventQueue<E>,
    render_sync:     Arc<Gate>,
    graphic_update:  Arc<Gate>,
    close_requested: bool,
    frames:          u64,
    frame_time:      Duration,
}

impl<R: Registry, E: Event<R>> MainLoop<R, E> {
    /// Wraps a scheduler and an event queue. Workers are started here.
    pub fn new(mut ecs: Scheduler<R>, events: EventQueue<E>) -> Self {
        ecs.start_workers();
        Self {
            ecs,
            events,
            render_sync: Arc::new(Gate::new()),
            graphic_update: Arc::new(Gate::new()),
            close_requested: false,
            frames: 0,
            frame_time: Duration::ZERO,
        }
    }

    /// The wrapped scheduler.
    pub fn ecs(&self) -> &Scheduler<R> { &self.ecs }

    /// The deferred-event queue; clone handles into producers as needed.
    pub fn events(&self) -> &EventQueue<E> { &self.events }

    /// Opened by the render collaborator once it has drawn its frame.
    pub fn render_sync(&self) -> Arc<Gate> { Arc::clone(&self.render_sync) }

    /// Waited on by the render collaborator; pass as a task notifier.
    pub fn graphic_update(&self) -> Arc<Gate> { Arc::clone(&self.graphic_update) }

    /// Whether the host asked to close.
    pub fn close_requested(&self) -> bool { self.close_requested }

    /// Asks the loop to stop after the current frame.
    pub fn request_close(&mut self) { self.close_requested = true; }

    /// Frames completed so far.
    pub fn frames(&self) -> u64 { self.frames }

    /// Duration of the most recent frame.
    pub fn frame_time(&self) -> Duration { self.frame_time }

    /// Runs one frame.
    ///
    /// `poll` handles host events and returns whether close was requested;
    /// `enqueue` receives the dispatch-phase guard and enqueues the frame's
    /// tasks. A closed loop returns immediately.
    pub fn run_frame(
        &mut self,
        poll: impl FnOnce() -> bool,
        enqueue: impl FnOnce(&Frame<'_, R>) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let frame_start = Instant::now();

        if poll() {
            self.close_requested = true;
        }
        if self.close_requested {
            return Ok(());
        }

        {
            let frame = self.ecs.lock();
            enqueue(&frame)?;
            frame.work_from_main_thread(false);

            self.render_sync.wait_enter_close();

            while self.ecs.any_worker_busy() {
                thread::yield_now();
            }
            self.ecs.reset_completed_nodes();
        }

        self.events.drain(&self.ecs);

        self.frame_time = frame_start.elapsed();
        log::debug!(
            "frame {} time: {:7.3} ms",
            self.frames,
            self.frame_time.as_secs_f64() * 1000.0
        );
        self.frames += 1;
        Ok(())
    }

    /// Releases a render collaborator blocked on the graphic-update gate,
    /// stops the workers and returns the world.
    pub fn shutdown(self) -> World<R> {
        self.graphic_update.open();
        self.ecs.into_world()
    }
}

#[cfg(test)]
mod tests;
