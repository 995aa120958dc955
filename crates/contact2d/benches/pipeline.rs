use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use contact2d::{CollisionConfig, CollisionSystem, PhysicsWorld, Vec2};

fn pile(count: usize) -> PhysicsWorld {
    let mut world = PhysicsWorld::default();
    world
        .add_static_rect(Vec2::new(0.0, -1.0), 200.0, 2.0, 0.0)
        .expect("floor");
    let per_row = 40;
    for i in 0..count {
        let x = (i % per_row) as f32 * 1.1 - 22.0;
        let y = (i / per_row) as f32 * 1.1 + 0.5;
        if i % 2 == 0 {
            world.add_circle(Vec2::new(x, y), Vec2::ZERO, 0.5).expect("circle");
        } else {
            world.add_rect(Vec2::new(x, y), 1.0, 1.0, 0.0, Vec2::ZERO).expect("rect");
        }
    }
    // Let the pile settle into resting contact.
    world.run(1.0 / 60.0, 30).expect("settle");
    world
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    for count in [100, 1_000] {
        let mut world = pile(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| black_box(world.step(1.0 / 60.0).expect("step")));
        });
    }
    group.finish();
}

fn bench_collision(c: &mut Criterion) {
    let world = pile(1_000);
    let bodies = world.bodies().clone();
    let mut collision = CollisionSystem::new(CollisionConfig::default());
    c.bench_function("collision_update_1000", |b| {
        b.iter(|| black_box(collision.update(&bodies)));
    });
}

criterion_group!(benches, bench_step, bench_collision);
criterion_main!(benches);
