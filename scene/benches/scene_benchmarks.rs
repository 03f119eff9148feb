use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use glam::Vec3;
use serde_json::json;
use worlds_ecs::World;
use worlds_scene::components::{Child, Light, Name, Transform};
use worlds_scene::patch;
use worlds_scene::{BinaryFamily, ComponentRegistry, NoManagedComponents, SceneFormat, SceneSerializer};
use worlds_vfs::{AssetDb, Vfs};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// `count` lit entities, every other one parented to its predecessor.
fn build_world(registry: &ComponentRegistry, count: usize) -> World {
    let mut world = World::new();
    registry.register_storages(&mut world);
    let mut previous = None;
    for i in 0..count {
        let e = world.spawn();
        world.insert(e, Transform::from_xyz(i as f32, 0.0, 0.0)).unwrap();
        world.insert(e, Name::new(format!("entity {i}"))).unwrap();
        world
            .insert(
                e,
                Light {
                    color: Vec3::new(1.0, 0.5, 0.25),
                    ..Light::default()
                },
            )
            .unwrap();
        if let (Some(parent), true) = (previous, i % 2 == 1) {
            world
                .insert(
                    e,
                    Child {
                        parent,
                        offset: Transform::IDENTITY,
                    },
                )
                .unwrap();
        }
        previous = Some(e);
    }
    world
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

fn bench_save(c: &mut Criterion) {
    let registry = ComponentRegistry::with_builtin();
    let assets = AssetDb::new(Vfs::new());
    let world = build_world(&registry, 1_000);

    for (label, format) in [
        ("save_1k_json", SceneFormat::Json),
        ("save_1k_msgpack", SceneFormat::MessagePack),
        ("save_1k_binary", SceneFormat::Binary(BinaryFamily::Wscn)),
    ] {
        let mut serializer = SceneSerializer::new(&registry, &assets, &NoManagedComponents);
        c.bench_function(label, |b| {
            b.iter(|| black_box(serializer.save_scene(&world, format).unwrap()));
        });
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

fn bench_load(c: &mut Criterion) {
    let registry = ComponentRegistry::with_builtin();
    let assets = AssetDb::new(Vfs::new());
    let world = build_world(&registry, 1_000);

    for (label, format) in [
        ("load_1k_json", SceneFormat::Json),
        ("load_1k_msgpack", SceneFormat::MessagePack),
        ("load_1k_binary", SceneFormat::Binary(BinaryFamily::Wscn)),
    ] {
        let mut serializer = SceneSerializer::new(&registry, &assets, &NoManagedComponents);
        let bytes = serializer.save_scene(&world, format).unwrap();
        c.bench_function(label, |b| {
            b.iter_batched(
                World::new,
                |mut target| {
                    black_box(serializer.load_scene(&mut target, &bytes, false).unwrap());
                },
                BatchSize::SmallInput,
            );
        });
    }
}

// ---------------------------------------------------------------------------
// Prefab diffs
// ---------------------------------------------------------------------------

fn bench_diff_and_patch(c: &mut Criterion) {
    let base = json!({
        "Transform": {"position": [0.0, 1.0, 0.0], "rotation": [0.0, 0.0, 0.0, 1.0], "scale": [1.0, 1.0, 1.0]},
        "Light": {"type": 0, "color": [1.0, 1.0, 1.0], "spotCutoff": 0.78, "intensity": 1.0, "enabled": true},
        "Name": {"name": "lamp"},
        "WorldObject": {"mesh": "Meshes/lamp.mesh", "materials": ["a", "b", "c"], "texScaleOffset": [1.0, 1.0, 0.0, 0.0], "staticFlags": 0}
    });
    let mut target = base.clone();
    target["Light"]["color"][0] = json!(0.0);
    target["Light"]["intensity"] = json!(4.0);
    target["WorldObject"]["materials"] = json!(["a"]);

    c.bench_function("prefab_diff", |b| {
        b.iter(|| black_box(patch::diff(black_box(&base), black_box(&target))));
    });

    let diff = patch::diff(&base, &target);
    c.bench_function("prefab_patch", |b| {
        b.iter(|| black_box(patch::patched(black_box(&base), &diff).unwrap()));
    });
}

criterion_group!(benches, bench_save, bench_load, bench_diff_and_patch);
criterion_main!(benches);
