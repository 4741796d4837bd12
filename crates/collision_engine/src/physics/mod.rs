//! Physics orchestration
//!
//! The world-level registry and queries, the camera-following ground
//! plane, the character controller, and the picking-ray helper.

pub mod caster;
pub mod ground;
pub mod player;
pub mod world;

pub use caster::Caster;
pub use ground::Ground;
pub use player::PlayerPhysics;
pub use world::{
    spawn_build_worker, BuildRequest, BuildResult, HitTarget, MeshKey, ObjectId, PhysicsWorld,
    RayPick, SphereTraceResult, WorldError,
};
