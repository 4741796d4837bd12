//! Geometric primitives and intersection tests
//!
//! Everything below the BVH: bounding boxes, rays, spheres, the indexed
//! triangle-mesh view, and the narrow-phase swept-sphere math.

mod aabb;
mod primitives;
mod sweep;
mod triangles;

pub use aabb::Aabb;
pub use primitives::{
    closest_point_on_triangle, ray_triangle, sweep_center_to_sphere, Ray, Sphere, GEOM_EPSILON,
};
pub use sweep::{sweep_sphere_triangle, SweptHit};
pub use triangles::{IndexBuffer, TriangleMesh};
