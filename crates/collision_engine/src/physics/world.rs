//! World-level collision orchestration
//!
//! Registry of collidable objects, shared refcounted BVHs keyed by mesh
//! identity, asynchronous build hand-off, and the ray/sphere queries that
//! fan out across every registered collider plus the ground.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use slotmap::{new_key_type, SlotMap};

use crate::bvh::Bvh;
use crate::foundation::math::{Transform, Vec3};
use crate::geometry::{Aabb, Ray, Sphere, TriangleMesh};
use crate::physics::Ground;

new_key_type! {
    /// Generational handle to a registered world object
    pub struct ObjectId;
}

/// Identity of a collision mesh, assigned by the asset pipeline
///
/// Two objects registered under the same key share one BVH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshKey(pub u64);

/// What a world-level trace ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    /// The camera-following ground plane
    Ground,
    /// A registered world object
    Object(ObjectId),
}

/// Result of a world-level swept-sphere trace
#[derive(Debug, Clone, Copy)]
pub struct SphereTraceResult {
    /// Contact point on the hit surface, world space
    pub point: Vec3,
    /// Contact normal, facing the sweep origin
    pub normal: Vec3,
    /// Travel distance at first contact
    pub distance: f32,
    /// True for a face contact, false for an edge or vertex contact
    pub face_hit: bool,
    /// Which collider produced the contact
    pub target: HitTarget,
}

/// Nearest object triangle found by a picking ray
#[derive(Debug, Clone, Copy)]
pub struct RayPick {
    /// The object that was hit
    pub object: ObjectId,
    /// Triangle id within the object's mesh
    pub triangle: u32,
    /// Hit distance along the ray, world units
    pub distance: f32,
}

/// Geometry submitted to the external build collaborator
#[derive(Debug)]
pub struct BuildRequest {
    /// Mesh identity the result will be filed under
    pub key: MeshKey,
    /// Geometry to index
    pub mesh: TriangleMesh,
}

/// A completed build coming back from the collaborator
#[derive(Debug)]
pub struct BuildResult {
    /// Mesh identity the build was requested under
    pub key: MeshKey,
    /// The finished hierarchy
    pub bvh: Bvh,
}

/// Errors from world registration
#[derive(thiserror::Error, Debug)]
pub enum WorldError {
    /// First registration of a mesh key must carry its geometry
    #[error("no geometry supplied for unseen mesh key {0:?}")]
    MissingGeometry(MeshKey),
}

/// A registered collidable object
#[derive(Debug)]
struct WorldObject {
    collidable: bool,
    transform: Transform,
    inv_transform: Transform,
    world_aabb: Option<Aabb>,
    mesh_key: MeshKey,
    bvh: Option<Arc<Bvh>>,
}

impl WorldObject {
    fn refresh_world_aabb(&mut self) {
        self.world_aabb = self
            .bvh
            .as_ref()
            .and_then(|bvh| bvh.root_bounds())
            .map(|aabb| aabb.transformed(&self.transform));
    }
}

/// One resident shared hierarchy
#[derive(Debug)]
struct SharedMesh {
    bvh: Arc<Bvh>,
    refcount: usize,
}

/// Registry of collidable objects and the queries that span them
///
/// Owns the key→BVH table, the pending-build waiter lists, and the ground
/// plane. All methods run on the physics thread; the only cross-thread
/// traffic is the build channel pair.
pub struct PhysicsWorld {
    objects: SlotMap<ObjectId, WorldObject>,
    shared: HashMap<MeshKey, SharedMesh>,
    pending: HashMap<MeshKey, Vec<ObjectId>>,
    build_tx: Sender<BuildRequest>,
    build_rx: Receiver<BuildResult>,
    ground: Ground,
}

/// Translations shorter than this cannot be normalized into a direction;
/// such traces report no hit.
const MIN_SWEEP: f32 = 1e-6;

impl PhysicsWorld {
    /// Create a world wired to an external build collaborator
    pub fn new(
        build_tx: Sender<BuildRequest>,
        build_rx: Receiver<BuildResult>,
        ground: Ground,
    ) -> Self {
        Self {
            objects: SlotMap::with_key(),
            shared: HashMap::new(),
            pending: HashMap::new(),
            build_tx,
            build_rx,
            ground,
        }
    }

    /// Register a collidable object under a mesh key
    ///
    /// If the key's BVH is resident the object attaches immediately; if a
    /// build is in flight the object joins its waiter list; otherwise
    /// `triangles` must carry the geometry and a build is dispatched.
    /// Either way no geometry is ever resubmitted for a known key.
    pub fn register_object(
        &mut self,
        key: MeshKey,
        transform: Transform,
        triangles: Option<TriangleMesh>,
        collidable: bool,
    ) -> Result<ObjectId, WorldError> {
        let mut object = WorldObject {
            collidable,
            transform,
            inv_transform: transform.inverse(),
            world_aabb: None,
            mesh_key: key,
            bvh: None,
        };

        if let Some(shared) = self.shared.get_mut(&key) {
            shared.refcount += 1;
            object.bvh = Some(shared.bvh.clone());
            object.refresh_world_aabb();
            return Ok(self.objects.insert(object));
        }

        if let Some(waiters) = self.pending.get_mut(&key) {
            let id = self.objects.insert(object);
            waiters.push(id);
            return Ok(id);
        }

        let mesh = triangles.ok_or(WorldError::MissingGeometry(key))?;
        let id = self.objects.insert(object);
        self.pending.insert(key, vec![id]);
        if self.build_tx.send(BuildRequest { key, mesh }).is_err() {
            // The collaborator is gone; the object simply never becomes
            // solid, which beats taking the session down.
            log::warn!("build channel closed; {:?} will stay non-collidable", key);
        }
        Ok(id)
    }

    /// Remove an object, releasing its share of the mesh
    ///
    /// The last object on a key evicts the shared BVH entirely; a later
    /// registration has to rebuild.
    pub fn remove_object(&mut self, id: ObjectId) {
        let Some(object) = self.objects.remove(id) else {
            return;
        };

        if object.bvh.is_some() {
            if let Some(shared) = self.shared.get_mut(&object.mesh_key) {
                shared.refcount -= 1;
                if shared.refcount == 0 {
                    self.shared.remove(&object.mesh_key);
                    log::debug!("evicted shared BVH for {:?}", object.mesh_key);
                }
            }
        } else if let Some(waiters) = self.pending.get_mut(&object.mesh_key) {
            waiters.retain(|&w| w != id);
        }
    }

    /// Drain completed builds and install them into surviving waiters
    ///
    /// A waiter that was removed or re-keyed since requesting is skipped
    /// silently; a completion nobody is waiting for anymore is dropped.
    /// Returns how many objects received a hierarchy.
    pub fn pump_builds(&mut self) -> usize {
        let mut installed_total = 0;

        while let Ok(done) = self.build_rx.try_recv() {
            let Some(waiters) = self.pending.remove(&done.key) else {
                log::debug!("dropping unrequested build for {:?}", done.key);
                continue;
            };

            let bvh = Arc::new(done.bvh);
            let mut installed = 0;
            for id in waiters {
                let Some(object) = self.objects.get_mut(id) else {
                    continue;
                };
                if object.mesh_key != done.key {
                    log::debug!("waiter re-keyed away from {:?}; skipping", done.key);
                    continue;
                }
                object.bvh = Some(bvh.clone());
                object.refresh_world_aabb();
                installed += 1;
            }

            if installed > 0 {
                self.shared.insert(
                    done.key,
                    SharedMesh {
                        bvh,
                        refcount: installed,
                    },
                );
            } else {
                log::debug!("discarding build for {:?}; no surviving waiters", done.key);
            }
            installed_total += installed;
        }

        installed_total
    }

    /// Move an object, refreshing its cached inverse and world bounds
    pub fn set_transform(&mut self, id: ObjectId, transform: Transform) {
        if let Some(object) = self.objects.get_mut(id) {
            object.transform = transform;
            object.inv_transform = transform.inverse();
            object.refresh_world_aabb();
        }
    }

    /// Toggle whether an object participates in queries
    pub fn set_collidable(&mut self, id: ObjectId, collidable: bool) {
        if let Some(object) = self.objects.get_mut(id) {
            object.collidable = collidable;
        }
    }

    /// Current transform of an object
    pub fn transform(&self, id: ObjectId) -> Option<Transform> {
        self.objects.get(id).map(|o| o.transform)
    }

    /// Whether a key has a resident shared BVH
    pub fn is_resident(&self, key: MeshKey) -> bool {
        self.shared.contains_key(&key)
    }

    /// Whether a key has a build in flight
    pub fn is_pending(&self, key: MeshKey) -> bool {
        self.pending.contains_key(&key)
    }

    /// How many objects currently share a key's BVH
    pub fn refcount(&self, key: MeshKey) -> usize {
        self.shared.get(&key).map_or(0, |s| s.refcount)
    }

    /// The ground plane
    pub fn ground(&self) -> &Ground {
        &self.ground
    }

    /// Nearest triangle of any collidable object along a ray
    pub fn pick_ray(&self, origin: Vec3, dir: Vec3) -> Option<RayPick> {
        if dir.magnitude_squared() < MIN_SWEEP * MIN_SWEEP {
            return None;
        }
        let ray = Ray::new(origin, dir);

        let mut best: Option<RayPick> = None;
        let mut best_dist = f32::INFINITY;
        for (id, object) in &self.objects {
            if !object.collidable {
                continue;
            }
            let Some(bvh) = object.bvh.as_ref() else {
                continue;
            };

            let local = ray.to_object_space(&object.inv_transform);
            if !bvh.ray_hits_root(&local) {
                continue;
            }
            if let Some(hit) = bvh.pick_ray(&local) {
                let distance = hit.distance * object.transform.scale;
                if distance < best_dist {
                    best_dist = distance;
                    best = Some(RayPick {
                        object: id,
                        triangle: hit.triangle,
                        distance,
                    });
                }
            }
        }
        best
    }

    /// Sweep a sphere along a translation against everything solid
    ///
    /// Returns the globally nearest contact among all collidable objects
    /// and the ground, or None — including when the translation is too
    /// short to define a direction.
    pub fn trace_sphere(
        &mut self,
        sphere: Sphere,
        translation: Vec3,
    ) -> Option<SphereTraceResult> {
        let length = translation.magnitude();
        if length < MIN_SWEEP {
            return None;
        }
        let dir = translation / length;
        let path = Aabb::from_sphere_sweep(sphere.center, sphere.center + translation, sphere.radius);

        let mut best: Option<SphereTraceResult> = None;
        let mut bound = length;

        for (id, object) in &self.objects {
            if !object.collidable {
                continue;
            }
            let (Some(bvh), Some(world_aabb)) = (object.bvh.as_ref(), object.world_aabb) else {
                continue;
            };
            if !world_aabb.intersects(&path) {
                continue;
            }

            let scale = object.transform.scale;
            let inv = &object.inv_transform;
            let local_hit = bvh.sweep_sphere(
                inv.apply_point(sphere.center),
                inv.apply_vector(dir),
                sphere.radius * inv.scale,
                bound * inv.scale,
            );
            if let Some(hit) = local_hit {
                let distance = hit.distance * scale;
                if distance < bound {
                    bound = distance;
                    best = Some(SphereTraceResult {
                        point: object.transform.apply_point(hit.point),
                        normal: object.transform.apply_vector(hit.normal),
                        distance,
                        face_hit: hit.face,
                        target: HitTarget::Object(id),
                    });
                }
            }
        }

        self.ground.recenter(sphere.center);
        if let Some(hit) = self
            .ground
            .sweep_sphere(sphere.center, dir, sphere.radius, bound)
        {
            if hit.distance < bound {
                best = Some(SphereTraceResult {
                    point: hit.point,
                    normal: hit.normal,
                    distance: hit.distance,
                    face_hit: hit.face,
                    target: HitTarget::Ground,
                });
            }
        }

        best
    }

    /// Append world-space contact points within `radius` of `center`
    /// across every collidable object and the ground
    pub fn gather_contacts(&mut self, center: Vec3, radius: f32, out: &mut Vec<Vec3>) {
        let query = Aabb::from_sphere(center, radius);

        for (_, object) in &self.objects {
            if !object.collidable {
                continue;
            }
            let (Some(bvh), Some(world_aabb)) = (object.bvh.as_ref(), object.world_aabb) else {
                continue;
            };
            if !world_aabb.intersects(&query) {
                continue;
            }

            let inv = &object.inv_transform;
            let start = out.len();
            bvh.gather_contacts(inv.apply_point(center), radius * inv.scale, out);
            for p in &mut out[start..] {
                *p = object.transform.apply_point(*p);
            }
        }

        self.ground.recenter(center);
        self.ground.gather_contacts(center, radius, out);
    }
}

/// Spawn the default build collaborator
///
/// A worker thread that services build requests with [`Bvh::build`] and
/// sends the finished hierarchies back. Returns the channel ends a
/// [`PhysicsWorld`] needs; the worker exits when the world is dropped.
pub fn spawn_build_worker() -> (Sender<BuildRequest>, Receiver<BuildResult>) {
    let (req_tx, req_rx) = unbounded::<BuildRequest>();
    let (res_tx, res_rx) = unbounded::<BuildResult>();

    std::thread::spawn(move || {
        for request in req_rx {
            let key = request.key;
            let bvh = Bvh::build(request.mesh);
            if res_tx.send(BuildResult { key, bvh }).is_err() {
                break;
            }
        }
    });

    (req_tx, res_rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// World with both channel ends held by the test so completions can
    /// be crafted by hand, out of order or stale.
    fn manual_world() -> (
        PhysicsWorld,
        Receiver<BuildRequest>,
        Sender<BuildResult>,
    ) {
        let (req_tx, req_rx) = unbounded();
        let (res_tx, res_rx) = unbounded();
        let world = PhysicsWorld::new(req_tx, res_rx, Ground::new(0.0));
        (world, req_rx, res_tx)
    }

    fn unit_cube() -> TriangleMesh {
        TriangleMesh::cuboid(Vec3::new(-0.5, -0.5, -0.5), Vec3::new(0.5, 0.5, 0.5))
    }

    #[test]
    fn test_one_build_request_for_two_registrations() {
        let (mut world, req_rx, res_tx) = manual_world();
        let key = MeshKey(7);

        let a = world
            .register_object(key, Transform::identity(), Some(unit_cube()), true)
            .unwrap();
        let b = world
            .register_object(
                key,
                Transform::from_position(Vec3::new(3.0, 0.0, 0.0)),
                None,
                true,
            )
            .unwrap();

        // Exactly one request went out.
        let request = req_rx.try_recv().expect("one build request expected");
        assert!(req_rx.try_recv().is_err());
        assert!(world.is_pending(key));

        res_tx
            .send(BuildResult {
                key,
                bvh: Bvh::build(request.mesh),
            })
            .unwrap();
        assert_eq!(world.pump_builds(), 2);

        assert!(world.is_resident(key));
        assert_eq!(world.refcount(key), 2);
        assert!(!world.is_pending(key));
        let _ = (a, b);
    }

    #[test]
    fn test_missing_geometry_is_an_error() {
        let (mut world, _req_rx, _res_tx) = manual_world();
        let result = world.register_object(MeshKey(1), Transform::identity(), None, true);
        assert!(matches!(result, Err(WorldError::MissingGeometry(_))));
    }

    #[test]
    fn test_stale_completion_skipped() {
        let (mut world, req_rx, res_tx) = manual_world();
        let key = MeshKey(9);

        let id = world
            .register_object(key, Transform::identity(), Some(unit_cube()), true)
            .unwrap();
        let request = req_rx.try_recv().unwrap();

        // Waiter dies before the build lands.
        world.remove_object(id);
        res_tx
            .send(BuildResult {
                key,
                bvh: Bvh::build(request.mesh),
            })
            .unwrap();

        assert_eq!(world.pump_builds(), 0);
        assert!(!world.is_resident(key));
    }

    #[test]
    fn test_refcount_eviction() {
        let (mut world, req_rx, res_tx) = manual_world();
        let key = MeshKey(3);

        let a = world
            .register_object(key, Transform::identity(), Some(unit_cube()), true)
            .unwrap();
        let request = req_rx.try_recv().unwrap();
        res_tx
            .send(BuildResult {
                key,
                bvh: Bvh::build(request.mesh),
            })
            .unwrap();
        world.pump_builds();

        // Late attach to the resident entry: no new request.
        let b = world
            .register_object(key, Transform::identity(), None, true)
            .unwrap();
        assert!(req_rx.try_recv().is_err());
        assert_eq!(world.refcount(key), 2);

        world.remove_object(a);
        assert_eq!(world.refcount(key), 1);
        world.remove_object(b);
        assert!(!world.is_resident(key));
    }

    #[test]
    fn test_zero_translation_is_no_hit() {
        let (mut world, _req_rx, _res_tx) = manual_world();
        let sphere = Sphere::new(Vec3::new(0.0, 0.4, 0.0), 0.4);
        assert!(world.trace_sphere(sphere, Vec3::zeros()).is_none());
    }

    #[test]
    fn test_trace_hits_nearest_of_object_and_ground() {
        let (mut world, req_rx, res_tx) = manual_world();
        let key = MeshKey(21);

        // A cube floating at y = 2, directly under the falling sphere.
        let id = world
            .register_object(
                key,
                Transform::from_position(Vec3::new(0.0, 2.0, 0.0)),
                Some(unit_cube()),
                true,
            )
            .unwrap();
        let request = req_rx.try_recv().unwrap();
        res_tx
            .send(BuildResult {
                key,
                bvh: Bvh::build(request.mesh),
            })
            .unwrap();
        world.pump_builds();

        let sphere = Sphere::new(Vec3::new(0.0, 6.0, 0.0), 0.5);
        let hit = world
            .trace_sphere(sphere, Vec3::new(0.0, -10.0, 0.0))
            .expect("something below should stop the sphere");

        // Cube top is at y = 2.5; the sphere surface reaches it after 3.
        assert!((hit.distance - 3.0).abs() < 1e-3);
        assert_eq!(hit.target, HitTarget::Object(id));

        // With the cube gone the ground catches the same sweep.
        world.remove_object(id);
        let hit = world
            .trace_sphere(sphere, Vec3::new(0.0, -10.0, 0.0))
            .expect("ground should catch the sphere");
        assert_eq!(hit.target, HitTarget::Ground);
        assert!((hit.distance - 5.5).abs() < 1e-3);
    }

    #[test]
    fn test_non_collidable_objects_are_ignored() {
        let (mut world, req_rx, res_tx) = manual_world();
        let key = MeshKey(5);

        let id = world
            .register_object(
                key,
                Transform::from_position(Vec3::new(0.0, 2.0, 0.0)),
                Some(unit_cube()),
                false,
            )
            .unwrap();
        let request = req_rx.try_recv().unwrap();
        res_tx
            .send(BuildResult {
                key,
                bvh: Bvh::build(request.mesh),
            })
            .unwrap();
        world.pump_builds();

        let sphere = Sphere::new(Vec3::new(0.0, 6.0, 0.0), 0.5);
        let hit = world.trace_sphere(sphere, Vec3::new(0.0, -10.0, 0.0)).unwrap();
        assert_eq!(hit.target, HitTarget::Ground);

        world.set_collidable(id, true);
        let hit = world.trace_sphere(sphere, Vec3::new(0.0, -10.0, 0.0)).unwrap();
        assert_eq!(hit.target, HitTarget::Object(id));
    }

    #[test]
    fn test_pick_ray_scaled_object() {
        let (mut world, req_rx, res_tx) = manual_world();
        let key = MeshKey(11);

        let transform = Transform {
            position: Vec3::new(0.0, 0.0, -10.0),
            scale: 2.0,
            ..Transform::identity()
        };
        let id = world
            .register_object(key, transform, Some(unit_cube()), true)
            .unwrap();
        let request = req_rx.try_recv().unwrap();
        res_tx
            .send(BuildResult {
                key,
                bvh: Bvh::build(request.mesh),
            })
            .unwrap();
        world.pump_builds();

        // Scaled cube spans z in [-11, -9]; the near face is 9 away.
        let pick = world
            .pick_ray(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0))
            .expect("ray should land on the cube");
        assert_eq!(pick.object, id);
        assert!((pick.distance - 9.0).abs() < 1e-3);
    }
}
