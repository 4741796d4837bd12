//! # Collision Engine
//!
//! A real-time spatial collision engine: a bounding-volume hierarchy over
//! triangle meshes, plus a swept-sphere character controller built on it.
//!
//! ## Features
//!
//! - **Flat-arena BVH**: built once per mesh, shared by refcount, queried
//!   every frame without allocation
//! - **Swept-sphere traces**: exact narrow-phase contacts with face vs.
//!   edge discrimination
//! - **Character controller**: substepped slide resolution, step-up, and
//!   iterative depenetration for a three-sphere body
//! - **Asynchronous builds**: mesh indexing handed to a worker over
//!   channels, with race-safe completion handling
//!
//! Rendering, asset decoding, and networking live elsewhere: collaborators
//! hand this crate triangle geometry and consume its hit results.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use collision_engine::prelude::*;
//!
//! let (build_tx, build_rx) = spawn_build_worker();
//! let mut world = PhysicsWorld::new(build_tx, build_rx, Ground::new(0.0));
//!
//! let mesh = TriangleMesh::cuboid(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 2.0, 1.0));
//! world
//!     .register_object(MeshKey(1), Transform::identity(), Some(mesh), true)
//!     .expect("first registration carries geometry");
//!
//! let mut player = PlayerPhysics::new(PlayerConfig::default());
//! let mut position = Vec3::new(0.0, 5.0, 0.0);
//! loop {
//!     world.pump_builds();
//!     player.update(&mut world, 1.0 / 60.0, &mut position);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod bvh;
pub mod config;
pub mod foundation;
pub mod geometry;
pub mod physics;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        bvh::Bvh,
        config::{Config, PhysicsConfig, PlayerConfig},
        foundation::math::{Quat, Transform, Vec3},
        geometry::{Aabb, Ray, Sphere, TriangleMesh},
        physics::{
            spawn_build_worker, Caster, Ground, HitTarget, MeshKey, PhysicsWorld, PlayerPhysics,
        },
    };
}
