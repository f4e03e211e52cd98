use std::time::Duration;

use criterion::*;
use rand::Rng;
use taskec::test_util::{Dense0, Linear1, Sparse3, TestRegistry};
use taskec::{Id, Tag, World};

fn integrate(_: Id, dense: &mut Dense0, linear: &Linear1) { dense.value += linear.value; }

fn integrate_sorted_first(_: Id, linear: &Linear1, dense: &mut Dense0) {
    dense.value += linear.value;
}

fn rare_touch(_: Id, sparse: &mut Sparse3, dense: &Dense0) { sparse.value += dense.value; }

fn populated_world(entities: usize, sparse_every: usize) -> World<TestRegistry> {
    let mut world = World::new();
    let mut rng = rand::thread_rng();
    for index in 0..entities {
        let id = world.add_entity(Tag::NONE, 0).unwrap().id();
        world.add_component::<Dense0>(id).value = rng.gen_range(-100..=100);
        world.add_component::<Linear1>(id).value = rng.gen_range(-100..=100);
        if index % sparse_every == 0 {
            world.add_component::<Sparse3>(id).value = 1;
        }
    }
    world
}

fn blocking_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocking iteration (d += l)");
    group.measurement_time(Duration::from_secs(5));

    for entities in [256_usize, 1024] {
        group.throughput(Throughput::Elements(entities as u64));
        group.bench_with_input(
            BenchmarkId::new("table scan", format!("{entities} entities")),
            &entities,
            |b, &entities| {
                let mut world = populated_world(entities, 8);
                b.iter(|| world.call_blocking::<(), _, _>(integrate, Tag::NONE));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("sorted hint", format!("{entities} entities")),
            &entities,
            |b, &entities| {
                let mut world = populated_world(entities, 8);
                b.iter(|| world.call_blocking::<(), _, _>(integrate_sorted_first, Tag::NONE));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("sparse hint", format!("{entities} entities")),
            &entities,
            |b, &entities| {
                let mut world = populated_world(entities, 8);
                b.iter(|| world.call_blocking::<(), _, _>(rare_touch, Tag::NONE));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, blocking_iteration);
criterion_main!(benches);
