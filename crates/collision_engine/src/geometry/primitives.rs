//! Primitive shapes and intersection algorithms
//!
//! Rays, spheres, and the raw triangle tests the BVH leaves run. These are
//! free functions over bare vertices so leaf loops can test candidates
//! straight out of the mesh buffers without building shape values.

use crate::foundation::math::{Transform, Vec3};

/// Numerical tolerance shared by the intersection tests
pub const GEOM_EPSILON: f32 = 1e-6;

/// A ray for ray casting and picking
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray (should be normalized)
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Re-express this ray in an object's local space
    ///
    /// `inverse` is the object's cached world-to-object transform. The
    /// direction stays unit length (rotation only), so a local parameter
    /// `t` maps back to world distance as `t * scale`.
    pub fn to_object_space(&self, inverse: &Transform) -> Ray {
        Ray {
            origin: inverse.apply_point(self.origin),
            direction: inverse.apply_vector(self.direction),
        }
    }
}

/// A sphere positioned in some space
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    /// Center position
    pub center: Vec3,
    /// Radius
    pub radius: f32,
}

impl Sphere {
    /// Creates a new sphere with the given center and radius
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Möller-Trumbore ray-triangle intersection
///
/// Returns the hit distance along the ray, or None. Hits behind the
/// origin and grazing-parallel rays are rejected.
///
/// See: "Fast, Minimum Storage Ray/Triangle Intersection" by Möller & Trumbore
pub fn ray_triangle(origin: Vec3, dir: Vec3, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<f32> {
    let e0 = v1 - v0;
    let e1 = v2 - v0;

    let h = dir.cross(&e1);
    let a = e0.dot(&h);

    // Ray parallel to triangle?
    if a.abs() < GEOM_EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&e0);
    let v = f * dir.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * e1.dot(&q);
    if t > GEOM_EPSILON {
        Some(t)
    } else {
        None
    }
}

/// Closest point on a triangle to a point
///
/// Walks the Voronoi regions of the triangle: vertex, edge, then face.
pub fn closest_point_on_triangle(point: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = point - a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = point - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let cp = point - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

/// First contact of a moving point against a static sphere
///
/// Sweeps `origin` along unit `dir` and returns the distance at which it
/// first touches the sphere surface. Starting inside the sphere reports
/// distance 0; receding or missing sweeps report None.
pub fn sweep_center_to_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let disp = center - origin;
    if disp.magnitude_squared() < radius * radius {
        return Some(0.0);
    }

    let along = disp.dot(&dir);
    let lateral = disp - dir * along;
    let discriminant = radius * radius - lateral.magnitude_squared();
    if discriminant < 0.0 {
        return None;
    }

    let distance = along - discriminant.sqrt();
    if distance >= 0.0 {
        Some(distance)
    } else {
        None
    }
}
