use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use roguewave_core::config::EngineConfig;
use roguewave_core::prelude::*;
use roguewave_logic::geometry::BoundingBox;
use roguewave_logic::sight::TargetInfo;
use roguewave_logic::spatial::{BodyId, BoxWorld, SurfaceTag};
use std::time::Duration;

const FRAME: f32 = 1.0 / 30.0;

fn config() -> EngineConfig {
    EngineConfig {
        seed: Some(0xBEEF),
        level: LevelDefinition { generate_new_waves: false, ..LevelDefinition::default() },
        enemies: vec![
            EnemyProfile { name: "drone".into(), squad_role: SquadRole::Leader, ..EnemyProfile::default() },
            EnemyProfile { name: "mite".into(), ..EnemyProfile::default() },
        ],
        ..EngineConfig::default()
    }
}

/// A walled arena with a target standing in the middle.
fn arena(agents: usize) -> SimulationEngine<BoxWorld> {
    let mut world = BoxWorld::with_ground(0.0);
    for (i, center) in [(125.0, 250.0), (125.0, 0.0), (0.0, 125.0), (250.0, 125.0)]
        .into_iter()
        .enumerate()
    {
        let size = if center.0 == 125.0 { Vec3::new(250.0, 20.0, 1.0) } else { Vec3::new(1.0, 20.0, 250.0) };
        world.add_box(
            BodyId(10 + i as u64),
            BoundingBox::centered(Vec3::new(center.0, 10.0, center.1), size),
            1,
            SurfaceTag::Obstacle,
        );
    }
    let target = Vec3::new(125.0, 1.0, 125.0);
    world.add_box(BodyId(1), BoundingBox::centered(target + Vec3::UP, Vec3::new(1.0, 2.0, 1.0)), 1, SurfaceTag::Agent);

    let mut engine = SimulationEngine::new(config(), world);
    engine.set_target(Some(TargetInfo { position: target, body: BodyId(1) }));
    for i in 0..agents {
        let angle = i as f32 * 0.61;
        let radius = 20.0 + (i % 80) as f32;
        let position = Vec3::new(125.0 + angle.cos() * radius, 5.0, 125.0 + angle.sin() * radius);
        let prototype = if i % 5 == 0 { "drone" } else { "mite" };
        let _ = engine.place_enemy(prototype, position);
    }
    engine
}

fn bench_engine_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_update");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(5));

    for agents in [100_usize, 500, 1000] {
        group.bench_function(format!("agents{agents}_30_frames"), |b| {
            b.iter_batched(
                || arena(agents),
                |mut engine| {
                    for _ in 0..30 {
                        engine.update(FRAME);
                    }
                    engine
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_engine_update);
criterion_main!(benches);
