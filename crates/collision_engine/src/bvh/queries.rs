//! BVH queries: ray picking, swept-sphere traces, contact gathering
//!
//! The per-frame queries avoid recursion and heap allocation: sweeps and
//! gathers walk the arena with an explicit fixed-capacity stack. All
//! queries run in the mesh's own space; callers transform in and out.

use crate::foundation::math::Vec3;
use crate::geometry::{
    closest_point_on_triangle, ray_triangle, sweep_sphere_triangle, Aabb, Ray, SweptHit,
};

use super::{Bvh, TriangleHit};

/// Traversal stack depth for per-frame queries
///
/// The mean split sheds at least one triangle per level, and in practice
/// stays near log2(n); a pathological mesh that would go deeper loses the
/// overflowing subtree with a warning rather than the frame.
const STACK_DEPTH: usize = 128;

impl Bvh {
    /// Cheap broad rejection: does a ray touch the root bounds at all?
    pub fn ray_hits_root(&self, ray: &Ray) -> bool {
        match self.aabbs.first() {
            Some(root) => root.intersect_ray(ray.origin, ray.direction).is_some(),
            None => false,
        }
    }

    /// Nearest triangle hit by a ray, for picking
    pub fn pick_ray(&self, ray: &Ray) -> Option<TriangleHit> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut pending: Vec<u32> = Vec::with_capacity(64);
        pending.push(0);
        let mut best: Option<TriangleHit> = None;
        let mut best_t = f32::INFINITY;

        while let Some(node) = pending.pop() {
            if self.aabbs[node as usize]
                .intersect_ray(ray.origin, ray.direction)
                .is_none()
            {
                continue;
            }

            let data = self.nodes[node as usize];
            if !data.is_leaf() {
                pending.push(data.offset);
                pending.push(data.offset + 1);
                continue;
            }

            for slot in data.offset..data.offset + data.count {
                let tri = self.tri_order[slot as usize];
                let (v0, v1, v2) = self.tri_corners(tri);
                if let Some(t) = ray_triangle(ray.origin, ray.direction, v0, v1, v2) {
                    if t < best_t {
                        best_t = t;
                        best = Some(TriangleHit {
                            node,
                            triangle: tri,
                            distance: t,
                        });
                    }
                }
            }
        }

        best
    }

    /// First contact of a sphere swept along `dir` for up to `max_dist`
    ///
    /// Every leaf overlapping the swept path is examined and the global
    /// minimum kept; the bound shrinks as hits are found, so later leaves
    /// reject candidates early. Contacts at or beyond `max_dist` are not
    /// hits.
    pub fn sweep_sphere(
        &self,
        origin: Vec3,
        dir: Vec3,
        radius: f32,
        max_dist: f32,
    ) -> Option<SweptHit> {
        if self.nodes.is_empty() {
            return None;
        }

        let path = Aabb::from_sphere_sweep(origin, origin + dir * max_dist, radius);
        if !self.aabbs[0].intersects(&path) {
            return None;
        }

        let mut stack = [0u32; STACK_DEPTH];
        let mut top = 0usize;
        let mut node = 0u32;
        let mut best: Option<SweptHit> = None;
        let mut bound = max_dist;

        loop {
            let data = self.nodes[node as usize];
            if data.is_leaf() {
                for slot in data.offset..data.offset + data.count {
                    let tri = self.tri_order[slot as usize];
                    let (v0, v1, v2) = self.tri_corners(tri);
                    if let Some(hit) = sweep_sphere_triangle(origin, dir, radius, v0, v1, v2, bound)
                    {
                        bound = hit.distance;
                        best = Some(hit);
                    }
                }
                if top == 0 {
                    break;
                }
                top -= 1;
                node = stack[top];
                continue;
            }

            let left = data.offset;
            let right = data.offset + 1;
            let hit_left = self.aabbs[left as usize].intersects(&path);
            let hit_right = self.aabbs[right as usize].intersects(&path);

            match (hit_left, hit_right) {
                (true, true) => {
                    if top < STACK_DEPTH {
                        stack[top] = right;
                        top += 1;
                    } else {
                        log::warn!("sweep traversal stack overflow; dropping a subtree");
                    }
                    node = left;
                }
                (true, false) => node = left,
                (false, true) => node = right,
                (false, false) => {
                    if top == 0 {
                        break;
                    }
                    top -= 1;
                    node = stack[top];
                }
            }
        }

        best
    }

    /// Append the closest point of every triangle within `radius` of
    /// `center` to `out`
    ///
    /// Feeds the depenetration solver; does not block movement.
    pub fn gather_contacts(&self, center: Vec3, radius: f32, out: &mut Vec<Vec3>) {
        if self.nodes.is_empty() {
            return;
        }

        let query = Aabb::from_sphere(center, radius);
        if !self.aabbs[0].intersects(&query) {
            return;
        }

        let radius_sq = radius * radius;
        let mut stack = [0u32; STACK_DEPTH];
        let mut top = 0usize;
        let mut node = 0u32;

        loop {
            let data = self.nodes[node as usize];
            if data.is_leaf() {
                for slot in data.offset..data.offset + data.count {
                    let tri = self.tri_order[slot as usize];
                    let (v0, v1, v2) = self.tri_corners(tri);
                    let closest = closest_point_on_triangle(center, v0, v1, v2);
                    if (closest - center).magnitude_squared() <= radius_sq {
                        out.push(closest);
                    }
                }
                if top == 0 {
                    break;
                }
                top -= 1;
                node = stack[top];
                continue;
            }

            let left = data.offset;
            let right = data.offset + 1;
            let hit_left = self.aabbs[left as usize].intersects(&query);
            let hit_right = self.aabbs[right as usize].intersects(&query);

            match (hit_left, hit_right) {
                (true, true) => {
                    if top < STACK_DEPTH {
                        stack[top] = right;
                        top += 1;
                    } else {
                        log::warn!("gather traversal stack overflow; dropping a subtree");
                    }
                    node = left;
                }
                (true, false) => node = left,
                (false, true) => node = right,
                (false, false) => {
                    if top == 0 {
                        break;
                    }
                    top -= 1;
                    node = stack[top];
                }
            }
        }
    }

    #[inline]
    fn tri_corners(&self, tri: u32) -> (Vec3, Vec3, Vec3) {
        let tri = tri as usize;
        (
            self.mesh.tri_vertex(tri, 0),
            self.mesh.tri_vertex(tri, 1),
            self.mesh.tri_vertex(tri, 2),
        )
    }
}
