use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::entity::{Handle, Id};
use crate::event::{Event, EventQueue};
use crate::frame::MainLoop;
use crate::scheduler::{NodeId, NodeIdSet, Scheduler};
use crate::tag::Tag;
use crate::test_util::{Dense0, Linear1, TestRegistry};
use crate::world::World;

/// Deferred removal, the way tasks are expected to reshape the world.
struct Despawn(Handle);

impl Event<TestRegistry> for Despawn {
    fn execute(self, ecs: &Scheduler<TestRegistry>) {
        let removed = ecs.world_mut().remove_entity(self.0);
        assert!(removed, "event carried a stale handle");
    }
}

fn integrate(_: Id, dense: &mut Dense0, linear: &Linear1) { dense.value += linear.value; }

fn publish(_: Id, dense: &Dense0, linear: Option<&Linear1>) {
    // the render snapshot task: read-only access
    assert!(linear.is_some());
    assert!(dense.value >= 0);
}

#[test]
fn frames_sequence_tasks_render_handoff_and_events() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut world = World::<TestRegistry>::new();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let handle = world.add_entity(Tag::NONE, 0).unwrap();
        let id = handle.id();
        world.add_component::<Dense0>(id).origin = id;
        world.add_component::<Linear1>(id).value = 1;
        handles.push(handle);
    }

    let mut main_loop = MainLoop::new(Scheduler::new(world), EventQueue::<Despawn>::default());

    let closing = Arc::new(AtomicBool::new(false));
    let render_thread = {
        let graphic_update = main_loop.graphic_update();
        let render_sync = main_loop.render_sync();
        let closing = Arc::clone(&closing);
        thread::spawn(move || {
            let mut drawn = 0_u32;
            loop {
                graphic_update.wait_enter_close();
                if closing.load(Ordering::SeqCst) {
                    break;
                }
                drawn += 1;
                render_sync.open();
            }
            drawn
        })
    };

    for frame_index in 0..3_u64 {
        let graphic_update = main_loop.graphic_update();
        let events = main_loop.events().clone();
        let despawn = (frame_index == 0).then(|| handles[3]);
        main_loop
            .run_frame(
                || false,
                |frame| {
                    frame.call_async::<(), _, _>(
                        integrate,
                        Tag::NONE,
                        NodeId::new(1),
                        NodeIdSet::EMPTY,
                        None,
                    )?;
                    // the render snapshot waits for the integration pass
                    frame.call_async::<(), _, _>(
                        publish,
                        Tag::NONE,
                        NodeId::new(2),
                        NodeIdSet::from(NodeId::new(1)),
                        Some(Arc::clone(&graphic_update)),
                    )?;
                    if let Some(handle) = despawn {
                        events.push(Despawn(handle)).unwrap();
                    }
                    Ok(())
                },
            )
            .unwrap();
        assert_eq!(main_loop.frames(), frame_index + 1);
    }

    // the despawn event was drained after the first frame
    assert_eq!(main_loop.ecs().world_mut().count(), 3);

    closing.store(true, Ordering::SeqCst);
    let mut world = main_loop.shutdown();
    assert_eq!(render_thread.join().expect("render thread panicked"), 3);

    // the surviving entities integrated one unit per frame
    for handle in &handles[..3] {
        let value = world.get_component::<Dense0>(handle.id()).expect("survivor").value;
        assert_eq!(value, 3);
    }
    assert_eq!(world.get_component::<Dense0>(handles[3].id()), None);
}

#[test]
fn close_request_skips_the_frame() {
    let mut main_loop =
        MainLoop::new(Scheduler::<TestRegistry>::default(), EventQueue::<Despawn>::default());

    main_loop
        .run_frame(|| true, |_| panic!("a closing frame must not enqueue"))
        .unwrap();
    assert!(main_loop.close_requested());
    assert_eq!(main_loop.frames(), 0);
    main_loop.shutdown();
}
