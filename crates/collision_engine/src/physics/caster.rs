//! Viewport ray construction for picking and debug probes
//!
//! Turns a pixel on screen into a world-space ray through the camera.
//! Conventions match the renderer: right-handed, camera looking down -Z.

use crate::foundation::math::{Transform, Vec3};
use crate::geometry::Ray;

/// Builds picking rays from viewport coordinates
#[derive(Debug, Clone, Copy)]
pub struct Caster {
    /// Vertical field of view in radians
    fov_y: f32,
    /// Viewport width over height
    aspect: f32,
}

impl Caster {
    /// Create a caster for a perspective view
    pub fn new(fov_y: f32, aspect: f32) -> Self {
        Self { fov_y, aspect }
    }

    /// Update the aspect ratio after a viewport resize
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// World-space ray through a pixel
    ///
    /// `px`/`py` are window coordinates with the origin at the top left;
    /// `width`/`height` are the viewport dimensions in the same units.
    pub fn viewport_ray(
        &self,
        camera: &Transform,
        px: f32,
        py: f32,
        width: f32,
        height: f32,
    ) -> Ray {
        let ndc_x = 2.0 * px / width - 1.0;
        let ndc_y = 1.0 - 2.0 * py / height;

        let half_tan = (self.fov_y * 0.5).tan();
        let local = Vec3::new(ndc_x * half_tan * self.aspect, ndc_y * half_tan, -1.0);

        Ray::new(camera.position, camera.apply_vector(local))
    }
}
