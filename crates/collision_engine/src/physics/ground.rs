//! Camera-following ground plane
//!
//! A single collision quad that slides along under whatever is being
//! traced, so a finite piece of geometry behaves as an infinite floor.

use crate::bvh::Bvh;
use crate::foundation::math::Vec3;
use crate::geometry::{SweptHit, TriangleMesh};

/// Half-extent of the quad; anything traced stays far from the rim
/// because the quad re-centers before every query.
const HALF_EXTENT: f32 = 256.0;

/// An infinite collision floor built from one quad
#[derive(Debug)]
pub struct Ground {
    bvh: Bvh,
    offset: Vec3,
}

impl Ground {
    /// Create a ground plane at the given world height
    pub fn new(height: f32) -> Self {
        let h = HALF_EXTENT;
        let vertices = vec![
            -h, 0.0, -h, //
            -h, 0.0, h, //
            h, 0.0, h, //
            h, 0.0, -h, //
        ];
        let indices = vec![0, 1, 2, 0, 2, 3];
        let mesh = TriangleMesh::new(vertices, indices, 3, 0);

        Self {
            bvh: Bvh::build(mesh),
            offset: Vec3::new(0.0, height, 0.0),
        }
    }

    /// World height of the plane
    pub fn height(&self) -> f32 {
        self.offset.y
    }

    /// Slide the quad horizontally under a point of interest
    pub fn recenter(&mut self, focus: Vec3) {
        self.offset.x = focus.x;
        self.offset.z = focus.z;
    }

    /// Swept-sphere trace against the plane, in world space
    pub fn sweep_sphere(
        &self,
        origin: Vec3,
        dir: Vec3,
        radius: f32,
        max_dist: f32,
    ) -> Option<SweptHit> {
        let local = self
            .bvh
            .sweep_sphere(origin - self.offset, dir, radius, max_dist)?;
        Some(SweptHit {
            point: local.point + self.offset,
            ..local
        })
    }

    /// Append world-space contact points on the plane within `radius` of
    /// `center` to `out`
    pub fn gather_contacts(&self, center: Vec3, radius: f32, out: &mut Vec<Vec3>) {
        let start = out.len();
        self.bvh
            .gather_contacts(center - self.offset, radius, out);
        for p in &mut out[start..] {
            *p += self.offset;
        }
    }
}
