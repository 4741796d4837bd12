//! Headless collision sandbox
//!
//! Builds a small test scene, spawns the BVH build worker, and steps the
//! character controller through a scripted walk: fall onto the ground,
//! walk into a stack of crates, step onto the low one, jump onto the tall
//! one. State is logged along the way; run with RUST_LOG=info to watch.

use collision_engine::prelude::*;

const DT: f32 = 1.0 / 60.0;

fn main() {
    collision_engine::foundation::logging::init();

    let config = PhysicsConfig::load_or_default("walker.toml");

    let (build_tx, build_rx) = spawn_build_worker();
    let mut world = PhysicsWorld::new(build_tx, build_rx, Ground::new(config.ground_height));

    // Two crates ahead of the spawn point: a low step and a tall block
    // sharing one mesh key (and therefore one BVH).
    let crate_mesh = TriangleMesh::cuboid(Vec3::new(-0.5, 0.0, -0.5), Vec3::new(0.5, 1.0, 0.5));
    let low = world.register_object(
        MeshKey(1),
        Transform {
            position: Vec3::new(3.0, 0.0, 0.0),
            scale: 0.2,
            ..Transform::identity()
        },
        Some(crate_mesh),
        true,
    );
    let tall = world.register_object(
        MeshKey(1),
        Transform::from_position(Vec3::new(6.0, 0.0, 0.0)),
        None,
        true,
    );
    for result in [&low, &tall] {
        if let Err(e) = result {
            log::error!("failed to register scene: {e}");
            return;
        }
    }

    // Let the worker deliver the shared BVH before simulating.
    while world.is_pending(MeshKey(1)) {
        world.pump_builds();
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    log::info!("scene ready; crate mesh refcount = {}", world.refcount(MeshKey(1)));

    let mut player = PlayerPhysics::new(config.player.clone());
    let mut position = Vec3::new(0.0, 3.0, 0.0);

    for frame in 0..600 {
        world.pump_builds();

        // Scripted input: walk +x the whole time, jump once in front of
        // the tall crate.
        player.set_move_input(Vec3::new(1.0, 0.0, 0.0));
        if frame == 360 && player.grounded() {
            player.request_jump();
        }

        player.update(&mut world, DT, &mut position);

        if frame % 60 == 0 {
            log::info!(
                "t={:5.2}s pos=({:6.2}, {:5.2}, {:6.2}) vel.y={:6.2} grounded={} cam_off={:.3}",
                frame as f32 * DT,
                position.x,
                position.y,
                position.z,
                player.velocity().y,
                player.grounded(),
                player.camera_offset(),
            );
        }
    }

    // A picking ray from above, straight down at the low crate.
    let caster = Caster::new(std::f32::consts::FRAC_PI_3, 16.0 / 9.0);
    let camera = Transform::from_position_rotation(
        Vec3::new(3.0, 10.0, 0.0),
        Quat::from_axis_angle(&Vec3::x_axis(), -std::f32::consts::FRAC_PI_2),
    );
    let ray = caster.viewport_ray(&camera, 960.0, 540.0, 1920.0, 1080.0);
    match world.pick_ray(ray.origin, ray.direction) {
        Some(pick) => log::info!(
            "pick: object {:?} triangle {} at distance {:.2}",
            pick.object,
            pick.triangle,
            pick.distance
        ),
        None => log::info!("pick: nothing under the crosshair"),
    }

    log::info!(
        "done: final position ({:.2}, {:.2}, {:.2})",
        position.x,
        position.y,
        position.z
    );
}
