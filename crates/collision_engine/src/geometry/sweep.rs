//! Swept-sphere versus triangle narrow phase
//!
//! The exact test run at BVH leaves during character movement: where does
//! a sphere travelling along a direction first touch a triangle, and was
//! that contact on the face or on an edge/vertex? The face/edge
//! distinction feeds the step-up logic in the player controller.

use crate::foundation::math::Vec3;
use crate::geometry::primitives::{closest_point_on_triangle, sweep_center_to_sphere, GEOM_EPSILON};

/// First contact of a swept sphere against one triangle
#[derive(Debug, Clone, Copy)]
pub struct SweptHit {
    /// Travel distance along the sweep direction at first contact
    pub distance: f32,
    /// Contact point on the triangle surface
    pub point: Vec3,
    /// Contact normal, facing the sweep origin
    pub normal: Vec3,
    /// True for a face contact, false for an edge or vertex contact
    pub face: bool,
}

/// Sweep a sphere of `radius` from `origin` along unit `dir` against one
/// triangle
///
/// `best` is the caller's current closest hit distance; contacts at or
/// beyond it are rejected early so later triangles benefit from earlier
/// finds. Degenerate (zero-area) triangles never hit.
pub fn sweep_sphere_triangle(
    origin: Vec3,
    dir: Vec3,
    radius: f32,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    best: f32,
) -> Option<SweptHit> {
    let e0 = v1 - v0;
    let e1 = v2 - v0;
    let raw_normal = e0.cross(&e1);
    let area2 = raw_normal.magnitude();
    if area2 < GEOM_EPSILON {
        return None;
    }
    let mut normal = raw_normal / area2;

    // Work with the plane oriented toward the sweep origin.
    let mut plane_dist = (origin - v0).dot(&normal);
    if plane_dist < 0.0 {
        normal = -normal;
        plane_dist = -plane_dist;
    }

    let approach_rate = -normal.dot(&dir);
    if approach_rate <= 0.0 {
        // Moving away from or parallel to the plane.
        return None;
    }

    let t_needed = (plane_dist - radius) / approach_rate;
    if t_needed >= best {
        return None;
    }

    // Where the sphere surface first touches the plane; if the sphere
    // already overlaps the plane, fall back to the closest point on the
    // plane to the origin.
    let plane_point = if t_needed <= 0.0 {
        origin - normal * plane_dist
    } else {
        origin + dir * t_needed - normal * radius
    };

    // Half-plane edge tests in the triangle's own winding.
    let inside = raw_normal.dot(&(v1 - v0).cross(&(plane_point - v0))) >= 0.0
        && raw_normal.dot(&(v2 - v1).cross(&(plane_point - v1))) >= 0.0
        && raw_normal.dot(&(v0 - v2).cross(&(plane_point - v2))) >= 0.0;

    if inside {
        return Some(SweptHit {
            distance: t_needed.max(0.0),
            point: plane_point,
            normal,
            face: true,
        });
    }

    // The plane touch point falls outside the triangle: the first contact,
    // if any, is against the nearest boundary edge or vertex. Clamp to the
    // boundary and sweep the center against a sphere sitting there.
    let boundary = closest_point_on_triangle(plane_point, v0, v1, v2);
    let distance = sweep_center_to_sphere(origin, dir, boundary, radius)?;
    if distance >= best {
        return None;
    }

    let center_at_impact = origin + dir * distance;
    let offset = center_at_impact - boundary;
    let length = offset.magnitude();
    let hit_normal = if length > GEOM_EPSILON {
        offset / length
    } else {
        normal
    };

    Some(SweptHit {
        distance,
        point: boundary,
        normal: hit_normal,
        face: false,
    })
}
