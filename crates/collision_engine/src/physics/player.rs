//! Character controller
//!
//! Per-frame velocity integration and collision response for a
//! capsule-like body approximated by three stacked spheres. Movement is
//! resolved by swept traces against the whole world; whatever overlap
//! survives is cleaned up by an iterative depenetration pass.

use crate::config::PlayerConfig;
use crate::foundation::math::Vec3;
use crate::geometry::Sphere;
use crate::physics::world::{PhysicsWorld, SphereTraceResult};

/// Displacements shorter than this are considered resolved
const MIN_MOVE: f32 = 1e-6;

/// Player movement state, persisted across the session
///
/// Construct once, feed inputs, call [`update`](Self::update) every
/// frame. Teleporting or respawning the character is the caller's
/// business: overwrite the position it owns and the controller adapts.
pub struct PlayerPhysics {
    config: PlayerConfig,
    velocity: Vec3,
    move_input: Vec3,
    jump_requested: bool,
    flying: bool,
    grounded: bool,
    ground_normal: Vec3,
    camera_offset: f32,
    contacts: [Vec<Vec3>; 3],
}

impl PlayerPhysics {
    /// Create a controller with the given tuning
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            velocity: Vec3::zeros(),
            move_input: Vec3::zeros(),
            jump_requested: false,
            flying: false,
            grounded: false,
            ground_normal: Vec3::y(),
            camera_offset: 0.0,
            contacts: [Vec::new(), Vec::new(), Vec::new()],
        }
    }

    /// Accumulate this frame's movement impulse
    ///
    /// Cleared automatically at the end of every update.
    pub fn set_move_input(&mut self, input: Vec3) {
        self.move_input = input;
    }

    /// Ask for a jump; honored at the next update if grounded
    pub fn request_jump(&mut self) {
        self.jump_requested = true;
    }

    /// Switch between the walking and flying velocity policies
    pub fn set_flying(&mut self, flying: bool) {
        self.flying = flying;
    }

    /// Whether flying mode is active
    pub fn flying(&self) -> bool {
        self.flying
    }

    /// Current velocity
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Whether the character stood on walkable ground last update
    pub fn grounded(&self) -> bool {
        self.grounded
    }

    /// Normal of the last walkable surface touched
    pub fn ground_normal(&self) -> Vec3 {
        self.ground_normal
    }

    /// Remaining step-up smoothing offset
    ///
    /// Subtract from the rendered camera height: the logical position
    /// snaps onto a ledge instantly while this decays to zero, so the
    /// view glides up instead of popping.
    pub fn camera_offset(&self) -> f32 {
        self.camera_offset
    }

    /// Advance the character by one frame, mutating `position` in place
    pub fn update(&mut self, world: &mut PhysicsWorld, dt: f32, position: &mut Vec3) {
        let dt = dt.min(self.config.max_dt);
        if dt <= 0.0 {
            self.move_input = Vec3::zeros();
            return;
        }

        if self.jump_requested {
            if self.grounded && !self.flying {
                self.velocity.y = self.config.jump_speed;
            }
            self.jump_requested = false;
        }

        if self.flying {
            self.fly_velocity(dt);
        } else {
            self.walk_velocity(dt);
        }

        self.resolve_displacement(world, dt, position);

        // The logical position snapped; the camera is still catching up.
        let decay = (self.config.camera_decay * dt).min(1.0);
        self.camera_offset -= self.camera_offset * decay;

        self.depenetrate(world, position);

        self.move_input = Vec3::zeros();
    }

    /// Critically damped spring toward the impulse-derived velocity
    fn fly_velocity(&mut self, dt: f32) {
        let wish = Vec3::new(self.move_input.x, 0.0, self.move_input.z);
        let desired = if wish.magnitude_squared() > MIN_MOVE * MIN_MOVE {
            wish.normalize() * wish.magnitude().min(1.0) * self.config.fly_speed
        } else {
            Vec3::zeros()
        };

        let blend = 1.0 - (-self.config.fly_damping * dt).exp();
        self.velocity += (desired - self.velocity) * blend;
    }

    /// Gravity plus grounded/airborne steering
    fn walk_velocity(&mut self, dt: f32) {
        self.velocity.y -= self.config.gravity * dt;

        let wish = Vec3::new(self.move_input.x, 0.0, self.move_input.z);
        if wish.magnitude_squared() < MIN_MOVE * MIN_MOVE {
            return;
        }
        let strength = wish.magnitude().min(1.0);
        let wish_dir = wish.normalize();

        if self.grounded {
            // Full control on the ground; steer along the surface so
            // slopes change speed instead of bouncing the body.
            let desired = project_on_plane(
                wish_dir * (strength * self.config.walk_speed),
                self.ground_normal,
            );
            self.velocity.x = desired.x;
            self.velocity.z = desired.z;
        } else {
            let accel = wish_dir * (strength * self.config.air_accel * dt);
            let mut horizontal =
                Vec3::new(self.velocity.x + accel.x, 0.0, self.velocity.z + accel.z);
            if horizontal.magnitude() > self.config.walk_speed {
                horizontal = horizontal.normalize() * self.config.walk_speed;
            }
            self.velocity.x = horizontal.x;
            self.velocity.z = horizontal.z;
        }
    }

    /// Sweep-advance-slide over up to `max_substeps` substeps
    fn resolve_displacement(&mut self, world: &mut PhysicsWorld, dt: f32, position: &mut Vec3) {
        let mut remaining = self.velocity * dt;
        self.grounded = false;

        for _ in 0..self.config.max_substeps {
            let length = remaining.magnitude();
            if length < MIN_MOVE {
                break;
            }

            let Some(hit) = self.nearest_body_hit(world, *position, remaining) else {
                *position += remaining;
                break;
            };

            let dir = remaining / length;
            let traveled = dir * hit.distance;
            *position += traveled;
            remaining -= traveled;

            // Sliding response: keep only the tangential part of both the
            // leftover displacement and the velocity.
            remaining -= hit.normal * remaining.dot(&hit.normal);
            self.velocity -= hit.normal * self.velocity.dot(&hit.normal);

            if hit.normal.y > self.config.ground_slope {
                self.grounded = true;
                self.ground_normal = hit.normal;
            }

            if !hit.face_hit {
                self.try_step_up(world, position, &hit);
            }
        }
    }

    /// Globally nearest contact across the three body spheres
    fn nearest_body_hit(
        &self,
        world: &mut PhysicsWorld,
        position: Vec3,
        translation: Vec3,
    ) -> Option<SphereTraceResult> {
        let mut best: Option<SphereTraceResult> = None;
        for height in self.config.sphere_heights {
            let sphere = Sphere::new(
                position + Vec3::new(0.0, height, 0.0),
                self.config.sphere_radius,
            );
            if let Some(hit) = world.trace_sphere(sphere, translation) {
                if best.map_or(true, |b| hit.distance < b.distance) {
                    best = Some(hit);
                }
            }
        }
        best
    }

    /// Snap onto a low ledge when an edge contact allows it
    ///
    /// Only non-face contacts qualify: a wall gives a face hit and must
    /// block, while the rim of a step clips the sphere on its edge.
    fn try_step_up(&mut self, world: &mut PhysicsWorld, position: &mut Vec3, hit: &SphereTraceResult) {
        let foot = position.y + self.config.sphere_heights[0] - self.config.sphere_radius;
        let rise = hit.point.y - foot;
        if rise <= self.config.step_up_min || rise >= self.config.step_up_max {
            return;
        }

        // The whole body must fit after the snap.
        let up = Vec3::new(0.0, rise, 0.0);
        for height in self.config.sphere_heights {
            let sphere = Sphere::new(
                *position + Vec3::new(0.0, height, 0.0),
                self.config.sphere_radius,
            );
            if world.trace_sphere(sphere, up).is_some() {
                return;
            }
        }

        position.y += rise;
        self.camera_offset += rise;
    }

    /// Iterative spring relaxation out of any residual overlap
    fn depenetrate(&mut self, world: &mut PhysicsWorld, position: &mut Vec3) {
        let stationary = self.move_input.x.abs() < MIN_MOVE && self.move_input.z.abs() < MIN_MOVE;
        let settled = self.grounded && stationary;
        let iterations = if settled { 1 } else { self.config.relax_iterations };

        let heights = self.config.sphere_heights;
        let radius = self.config.sphere_radius;
        let gather_radius = radius + self.config.contact_margin;

        for (i, height) in heights.iter().enumerate() {
            self.contacts[i].clear();
            world.gather_contacts(
                *position + Vec3::new(0.0, *height, 0.0),
                gather_radius,
                &mut self.contacts[i],
            );
        }

        for _ in 0..iterations {
            let mut correction = Vec3::zeros();
            let mut spheres_hit = 0u32;

            for (i, height) in heights.iter().enumerate() {
                let center = *position + Vec3::new(0.0, *height, 0.0);
                let mut push = Vec3::zeros();
                let mut penetrating = 0u32;

                for &point in &self.contacts[i] {
                    let away = center - point;
                    let dist = away.magnitude();
                    if dist >= radius {
                        continue;
                    }
                    penetrating += 1;
                    if dist > MIN_MOVE {
                        push += away * ((radius - dist) / dist);
                    } else {
                        // Center exactly on the surface point; push up.
                        push.y += radius;
                    }
                }

                if penetrating > 0 {
                    correction += push / penetrating as f32;
                    spheres_hit += 1;
                }
            }

            // The spheres share one body: average their pushes so a wall
            // touching all three does not triple the correction.
            if spheres_hit > 0 {
                correction /= spheres_hit as f32;
            }
            if settled {
                correction.y = 0.0;
            }
            if correction.magnitude() < self.config.relax_epsilon {
                break;
            }
            *position += correction;
        }
    }
}

/// Remove the component of `v` along `normal`
fn project_on_plane(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * v.dot(&normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::Bvh;
    use crate::foundation::math::Transform;
    use crate::geometry::TriangleMesh;
    use crate::physics::world::{BuildResult, MeshKey};
    use crate::physics::Ground;
    use crossbeam_channel::unbounded;

    const DT: f32 = 1.0 / 60.0;

    fn empty_world() -> PhysicsWorld {
        let (req_tx, _req_rx) = unbounded();
        let (_res_tx, res_rx) = unbounded();
        PhysicsWorld::new(req_tx, res_rx, Ground::new(0.0))
    }

    fn world_with_mesh(key: MeshKey, mesh: TriangleMesh, transform: Transform) -> PhysicsWorld {
        let (req_tx, req_rx) = unbounded();
        let (res_tx, res_rx) = unbounded();
        let mut world = PhysicsWorld::new(req_tx, res_rx, Ground::new(0.0));
        world
            .register_object(key, transform, Some(mesh), true)
            .unwrap();
        let request = req_rx.try_recv().unwrap();
        res_tx
            .send(BuildResult {
                key,
                bvh: Bvh::build(request.mesh),
            })
            .unwrap();
        world.pump_builds();
        world
    }

    #[test]
    fn test_falls_and_settles_on_ground() {
        let mut world = empty_world();
        let mut player = PlayerPhysics::new(PlayerConfig::default());
        let mut position = Vec3::new(0.0, 3.0, 0.0);

        for _ in 0..300 {
            player.update(&mut world, DT, &mut position);
        }

        assert!(player.grounded());
        // Feet rest on the plane: the lowest sphere bottom sits at y = 0.
        assert!(position.y.abs() < 1e-3);

        // Once settled there is no residual drift.
        let before = position.y;
        player.update(&mut world, DT, &mut position);
        assert!(player.velocity().y.abs() < 1e-3);
        assert!((position.y - before).abs() < 1e-3);
    }

    #[test]
    fn test_jump_only_when_grounded() {
        let mut world = empty_world();
        let mut player = PlayerPhysics::new(PlayerConfig::default());
        let mut position = Vec3::new(0.0, 5.0, 0.0);

        // Airborne jump request is swallowed.
        player.request_jump();
        player.update(&mut world, DT, &mut position);
        assert!(player.velocity().y < 0.0);

        // Land, then jump for real.
        for _ in 0..300 {
            player.update(&mut world, DT, &mut position);
        }
        assert!(player.grounded());

        player.request_jump();
        player.update(&mut world, DT, &mut position);
        assert!(player.velocity().y > 0.0);
        assert!(!player.grounded());
    }

    #[test]
    fn test_walks_toward_input() {
        let mut world = empty_world();
        let mut player = PlayerPhysics::new(PlayerConfig::default());
        let mut position = Vec3::new(0.0, 0.0, 0.0);

        // Settle first.
        for _ in 0..60 {
            player.update(&mut world, DT, &mut position);
        }

        for _ in 0..120 {
            player.set_move_input(Vec3::new(1.0, 0.0, 0.0));
            player.update(&mut world, DT, &mut position);
        }

        assert!(position.x > 5.0, "walked {} along +x", position.x);
        assert!(position.z.abs() < 1e-3);
        assert!(player.grounded());
    }

    #[test]
    fn test_wall_blocks_and_slides() {
        // A wall across +x at x = 1: walking diagonally into it keeps
        // the z component and gives up the x component.
        let wall = TriangleMesh::cuboid(Vec3::new(1.0, -1.0, -50.0), Vec3::new(2.0, 5.0, 50.0));
        let mut world = world_with_mesh(MeshKey(1), wall, Transform::identity());
        let mut player = PlayerPhysics::new(PlayerConfig::default());
        let mut position = Vec3::new(0.0, 0.0, 0.0);

        for _ in 0..60 {
            player.update(&mut world, DT, &mut position);
        }
        for _ in 0..240 {
            player.set_move_input(Vec3::new(1.0, 0.0, 1.0));
            player.update(&mut world, DT, &mut position);
        }

        assert!(
            position.x < 1.0 - 0.9 * player.config.sphere_radius,
            "wall failed to block at x = {}",
            position.x
        );
        assert!(position.z > 3.0, "slid only {} along the wall", position.z);
    }

    #[test]
    fn test_step_up_onto_low_ledge() {
        // A 0.18-high slab ahead: short enough to step onto.
        let slab = TriangleMesh::cuboid(Vec3::new(1.0, -1.0, -3.0), Vec3::new(6.0, 0.18, 3.0));
        let mut world = world_with_mesh(MeshKey(2), slab, Transform::identity());
        let mut config = PlayerConfig::default();
        config.walk_speed = 3.0;
        let mut player = PlayerPhysics::new(config);
        let mut position = Vec3::new(0.0, 0.0, 0.0);

        for _ in 0..60 {
            player.update(&mut world, DT, &mut position);
        }
        let mut max_offset = 0.0f32;
        for _ in 0..300 {
            player.set_move_input(Vec3::new(1.0, 0.0, 0.0));
            player.update(&mut world, DT, &mut position);
            max_offset = max_offset.max(player.camera_offset());
        }

        assert!(
            (position.y - 0.18).abs() < 0.02,
            "expected to stand on the slab, y = {}",
            position.y
        );
        assert!(position.x > 1.0, "never reached the slab, x = {}", position.x);
        // The snap was recorded for camera smoothing and has decayed.
        assert!(max_offset > 0.0);
        assert!(player.camera_offset() < 1e-3);
    }

    #[test]
    fn test_flying_ignores_gravity() {
        let mut world = empty_world();
        let mut player = PlayerPhysics::new(PlayerConfig::default());
        player.set_flying(true);
        let mut position = Vec3::new(0.0, 10.0, 0.0);

        for _ in 0..120 {
            player.update(&mut world, DT, &mut position);
        }
        assert!((position.y - 10.0).abs() < 1e-4);

        for _ in 0..120 {
            player.set_move_input(Vec3::new(0.0, 0.0, -1.0));
            player.update(&mut world, DT, &mut position);
        }
        assert!(position.z < -5.0);
        // Spring converges on the target speed without overshoot.
        assert!(player.velocity().magnitude() <= player.config.fly_speed + 1e-3);
    }

    #[test]
    fn test_depenetration_pushes_out_of_wall_overlap() {
        // A wall face at x = 0.3 overlaps the body spheres (radius 0.4)
        // by 0.1. Standing still on the ground, the relaxation pass must
        // push the character horizontally until the overlap is gone, and
        // never lift it (the settled constraint keeps corrections flat).
        let wall = TriangleMesh::cuboid(Vec3::new(0.3, -1.0, -50.0), Vec3::new(2.0, 5.0, 50.0));
        let mut world = world_with_mesh(MeshKey(4), wall, Transform::identity());
        let mut player = PlayerPhysics::new(PlayerConfig::default());
        let mut position = Vec3::new(0.0, 0.0, 0.0);

        for _ in 0..120 {
            player.update(&mut world, DT, &mut position);
        }

        assert!(
            position.x < -0.05,
            "never pushed away from the wall, x = {}",
            position.x
        );
        let clearance = 0.3 - position.x;
        assert!(
            clearance > player.config.sphere_radius - 1e-2,
            "still overlapping, clearance = {}",
            clearance
        );
        assert!(position.y.abs() < 1e-3, "settled correction must stay flat");
    }
}
