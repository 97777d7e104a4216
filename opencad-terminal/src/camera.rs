/// Camera and projection utilities
use nalgebra::{Matrix4, Point3, Vector3};
use opencad_core::Aabb;

/// Terminal cells are roughly twice as tall as they are wide
const CELL_ASPECT: f32 = 0.5;

/// Perspective camera looking at the loaded model
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// A zero-sized terminal is treated as one cell so the aspect stays
    /// positive.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 5.0),
            target: Point3::new(0.0, 0.0, 0.0),
            up: Vector3::new(0.0, 1.0, 0.0),
            fov: std::f32::consts::PI / 4.0, // 45 degrees
            aspect: width.max(1) as f32 * CELL_ASPECT / height.max(1) as f32,
            near: 0.1,
            far: 100.0,
        }
    }

    /// Aim at the center of `bounds` from far enough back to see all of it,
    /// with headroom for exploded parts.
    pub fn frame(&mut self, bounds: &Aabb, headroom: f32) {
        let radius = (bounds.size().norm() / 2.0).max(1e-3) + headroom;
        let distance = radius / (self.fov / 2.0).sin();

        self.target = bounds.center();
        self.position = self.target + Vector3::new(0.0, 0.0, distance);
        self.near = (distance - radius).max(distance * 1e-3);
        self.far = distance + radius * 2.0;
    }

    /// Create the view matrix (camera transformation)
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    /// Create the projection matrix
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far)
    }

    /// Project a world-space point to screen space as `(x, y, depth)`
    pub fn project_to_screen(
        &self,
        point: &Point3<f32>,
        view_projection: &Matrix4<f32>,
        width: u32,
        height: u32,
    ) -> Option<(f32, f32, f32)> {
        let clip = view_projection * point.to_homogeneous();

        // Behind the camera or on the eye plane
        if clip.w < 1e-6 {
            return None;
        }

        let ndc = clip.xyz() / clip.w;
        if ndc.z < -1.0 || ndc.z > 1.0 {
            return None;
        }

        // Convert to screen space
        let screen_x = (ndc.x + 1.0) * 0.5 * width as f32;
        let screen_y = (1.0 - ndc.y) * 0.5 * height as f32;

        Some((screen_x, screen_y, ndc.z))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(800, 600)
    }
}
