//! Indexed triangle-mesh view
//!
//! An immutable view over a flat vertex buffer as handed over by the mesh
//! decoding pipeline: positions live at a fixed offset inside a strided
//! vertex layout, triangles are triples of indices. Malformed buffers are
//! truncated with a warning, never rejected — input meshes may come from
//! untrusted downloaded assets and a decoding defect must not take the
//! session down.

use crate::foundation::math::Vec3;
use crate::geometry::Aabb;

/// Triangle index storage at the narrowest width that fits the vertex count
#[derive(Debug, Clone)]
pub enum IndexBuffer {
    /// 16-bit indices, used whenever every vertex id fits
    U16(Vec<u16>),
    /// 32-bit indices for large meshes
    U32(Vec<u32>),
}

impl IndexBuffer {
    /// Number of stored indices
    pub fn len(&self) -> usize {
        match self {
            IndexBuffer::U16(v) => v.len(),
            IndexBuffer::U32(v) => v.len(),
        }
    }

    /// Whether the buffer holds no indices
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read one index as a usize
    #[inline]
    pub fn get(&self, i: usize) -> usize {
        match self {
            IndexBuffer::U16(v) => v[i] as usize,
            IndexBuffer::U32(v) => v[i] as usize,
        }
    }
}

/// Immutable indexed view over a strided vertex buffer
///
/// Construction never fails: index tails that do not form a whole
/// triangle and vertex tails that do not form a whole stride are dropped,
/// and triangles referencing out-of-range vertices are discarded.
#[derive(Debug, Clone)]
pub struct TriangleMesh {
    vertices: Vec<f32>,
    indices: IndexBuffer,
    stride: usize,
    position_offset: usize,
    tri_count: usize,
    vert_count: usize,
    centroids: Vec<Vec3>,
}

impl TriangleMesh {
    /// Create a mesh view over raw buffers
    ///
    /// `stride` is the number of floats per vertex and `position_offset`
    /// the float offset of the position inside each vertex.
    pub fn new(
        vertices: Vec<f32>,
        mut indices: Vec<u32>,
        stride: usize,
        position_offset: usize,
    ) -> Self {
        if stride < position_offset + 3 {
            log::warn!(
                "vertex stride {} cannot hold a position at offset {}; treating mesh as empty",
                stride,
                position_offset
            );
            return Self::empty(vertices, stride.max(3), position_offset);
        }

        if vertices.len() % stride != 0 {
            log::warn!(
                "vertex buffer length {} is not a multiple of stride {}; truncating",
                vertices.len(),
                stride
            );
        }
        let vert_count = vertices.len() / stride;

        if indices.len() % 3 != 0 {
            log::warn!(
                "index buffer length {} is not a multiple of 3; truncating",
                indices.len()
            );
            indices.truncate(indices.len() / 3 * 3);
        }

        // Drop triangles that point outside the vertex buffer rather than
        // letting a hostile mesh index out of bounds at query time.
        let whole = indices.len();
        let mut filtered = Vec::with_capacity(whole);
        for tri in indices.chunks_exact(3) {
            if tri.iter().all(|&i| (i as usize) < vert_count) {
                filtered.extend_from_slice(tri);
            }
        }
        if filtered.len() != whole {
            log::warn!(
                "dropped {} triangles with out-of-range vertex indices",
                (whole - filtered.len()) / 3
            );
        }

        let tri_count = filtered.len() / 3;
        let indices = if vert_count <= u16::MAX as usize + 1 {
            IndexBuffer::U16(filtered.iter().map(|&i| i as u16).collect())
        } else {
            IndexBuffer::U32(filtered)
        };

        Self {
            vertices,
            indices,
            stride,
            position_offset,
            tri_count,
            vert_count,
            centroids: Vec::new(),
        }
    }

    /// A position-only cuboid mesh (12 triangles), handy for tests and
    /// synthetic scenes
    pub fn cuboid(min: Vec3, max: Vec3) -> Self {
        let vertices = vec![
            min.x, min.y, min.z, // 0
            max.x, min.y, min.z, // 1
            max.x, max.y, min.z, // 2
            min.x, max.y, min.z, // 3
            min.x, min.y, max.z, // 4
            max.x, min.y, max.z, // 5
            max.x, max.y, max.z, // 6
            min.x, max.y, max.z, // 7
        ];
        let indices = vec![
            0, 2, 1, 0, 3, 2, // -z
            4, 5, 6, 4, 6, 7, // +z
            0, 1, 5, 0, 5, 4, // -y
            3, 6, 2, 3, 7, 6, // +y
            0, 4, 7, 0, 7, 3, // -x
            1, 2, 6, 1, 6, 5, // +x
        ];
        Self::new(vertices, indices, 3, 0)
    }

    fn empty(vertices: Vec<f32>, stride: usize, position_offset: usize) -> Self {
        Self {
            vertices,
            indices: IndexBuffer::U16(Vec::new()),
            stride,
            position_offset,
            tri_count: 0,
            vert_count: 0,
            centroids: Vec::new(),
        }
    }

    /// Number of whole triangles in the mesh
    pub fn tri_count(&self) -> usize {
        self.tri_count
    }

    /// Number of whole vertices in the mesh
    pub fn vert_count(&self) -> usize {
        self.vert_count
    }

    /// Position of one corner (0..3) of one triangle
    #[inline]
    pub fn tri_vertex(&self, tri: usize, corner: usize) -> Vec3 {
        let index = self.indices.get(tri * 3 + corner);
        let base = index * self.stride + self.position_offset;
        Vec3::new(
            self.vertices[base],
            self.vertices[base + 1],
            self.vertices[base + 2],
        )
    }

    /// Centroid of one triangle
    ///
    /// Reads the memoized table when [`build_centroids`](Self::build_centroids)
    /// has run, otherwise averages the corners directly.
    pub fn centroid(&self, tri: usize) -> Vec3 {
        if let Some(c) = self.centroids.get(tri) {
            return *c;
        }
        (self.tri_vertex(tri, 0) + self.tri_vertex(tri, 1) + self.tri_vertex(tri, 2)) / 3.0
    }

    /// Compute and memoize all triangle centroids
    ///
    /// No-op after the first call.
    pub fn build_centroids(&mut self) {
        if !self.centroids.is_empty() || self.tri_count == 0 {
            return;
        }
        self.centroids = (0..self.tri_count)
            .map(|tri| {
                (self.tri_vertex(tri, 0) + self.tri_vertex(tri, 1) + self.tri_vertex(tri, 2)) / 3.0
            })
            .collect();
    }

    /// Exact bounds of every vertex position in the buffer
    ///
    /// None for a mesh with no whole vertex.
    pub fn bounds(&self) -> Option<Aabb> {
        if self.vert_count == 0 {
            return None;
        }
        let read = |v: usize| {
            let base = v * self.stride + self.position_offset;
            Vec3::new(
                self.vertices[base],
                self.vertices[base + 1],
                self.vertices[base + 2],
            )
        };
        let mut aabb = Aabb::from_point(read(0));
        for v in 1..self.vert_count {
            aabb.expand_point(read(v));
        }
        Some(aabb)
    }
}
