/// Model rotation state and per-part model matrices
use nalgebra::{Matrix4, Point3, Vector3};

/// Rotation state around three axes (in radians)
#[derive(Debug, Clone, Copy, Default)]
pub struct RotationState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RotationState {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Rotate by delta amounts (in radians)
    pub fn rotate(&mut self, dx: f32, dy: f32, dz: f32) {
        self.x += dx;
        self.y += dy;
        self.z += dz;
    }

    /// Rotation matrix applying X, then Y, then Z
    pub fn matrix(&self) -> Matrix4<f32> {
        let rx = Matrix4::new_rotation(Vector3::new(self.x, 0.0, 0.0));
        let ry = Matrix4::new_rotation(Vector3::new(0.0, self.y, 0.0));
        let rz = Matrix4::new_rotation(Vector3::new(0.0, 0.0, self.z));
        rz * ry * rx
    }
}

/// Model matrix for one part: the part is first moved by its explode
/// translation, then the whole model spins around `pivot`.
pub fn part_matrix(
    rotation: &RotationState,
    pivot: &Point3<f32>,
    translation: &Vector3<f32>,
) -> Matrix4<f32> {
    Matrix4::new_translation(&pivot.coords)
        * rotation.matrix()
        * Matrix4::new_translation(&(translation - pivot.coords))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_state() {
        let mut state = RotationState::default();
        state.rotate(0.1, 0.2, 0.3);
        assert!((state.x - 0.1).abs() < 1e-6);
        assert!((state.y - 0.2).abs() < 1e-6);
        assert!((state.z - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_identity_rotation() {
        let matrix = RotationState::default().matrix();
        assert!((matrix - Matrix4::identity()).norm() < 1e-6);
    }

    #[test]
    fn test_pivot_is_fixed_point() {
        let pivot = Point3::new(3.0, -2.0, 1.0);
        let matrix = part_matrix(&RotationState::new(0.4, 1.1, -0.7), &pivot, &Vector3::zeros());
        let moved = matrix.transform_point(&pivot);
        assert!((moved - pivot).norm() < 1e-5);
    }

    #[test]
    fn test_translation_without_rotation() {
        let matrix = part_matrix(
            &RotationState::default(),
            &Point3::new(5.0, 5.0, 5.0),
            &Vector3::new(1.0, 0.0, 0.0),
        );
        let moved = matrix.transform_point(&Point3::origin());
        assert!((moved - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-6);
    }
}
