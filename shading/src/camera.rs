//! Camera matrices injected by [`ShaderCatalog::bind`](crate::ShaderCatalog::bind).
//!
//! When a camera is supplied at bind time, the catalog uploads a fixed set of
//! matrices under well-known uniform names. Names a program does not declare
//! are skipped.

use glam::{Mat3, Mat4};

/// Source of view and projection matrices.
pub trait Camera {
    /// World to view transform.
    fn view_matrix(&self) -> Mat4;

    /// View to clip transform.
    fn projection_matrix(&self) -> Mat4;
}

/// A camera with fixed matrices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticCamera {
    pub view: Mat4,
    pub projection: Mat4,
}

impl StaticCamera {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self { view, projection }
    }
}

impl Default for StaticCamera {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

impl Camera for StaticCamera {
    fn view_matrix(&self) -> Mat4 {
        self.view
    }

    fn projection_matrix(&self) -> Mat4 {
        self.projection
    }
}

/// Uniform names the camera matrices are uploaded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixUniformNames {
    pub model: String,
    pub normal_model: String,
    pub view: String,
    pub view_model: String,
    pub normal_view_model: String,
    pub projection: String,
    pub projection_view_model: String,
}

impl Default for MatrixUniformNames {
    fn default() -> Self {
        Self {
            model: "modelMatrix".to_string(),
            normal_model: "normalModelMatrix".to_string(),
            view: "viewMatrix".to_string(),
            view_model: "viewModelMatrix".to_string(),
            normal_view_model: "normalViewModelMatrix".to_string(),
            projection: "projectionMatrix".to_string(),
            projection_view_model: "projectionViewModelMatrix".to_string(),
        }
    }
}

/// Matrices derived from a camera and a model transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub model: Mat4,
    pub normal_model: Mat3,
    pub view: Mat4,
    pub view_model: Mat4,
    pub normal_view_model: Mat3,
    pub projection: Mat4,
    pub projection_view_model: Mat4,
}

impl CameraMatrices {
    pub fn new(camera: &dyn Camera, model: Mat4) -> Self {
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        let view_model = view * model;
        Self {
            model,
            normal_model: normal_matrix(&model),
            view,
            view_model,
            normal_view_model: normal_matrix(&view_model),
            projection,
            projection_view_model: projection * view_model,
        }
    }

    /// Pair each matrix with its uniform name, as raw column-major bytes.
    pub(crate) fn named<'a>(&self, names: &'a MatrixUniformNames) -> [(&'a str, Vec<u8>); 7] {
        let mat4 = |m: &Mat4| bytemuck::bytes_of(m).to_vec();
        let mat3 = |m: &Mat3| bytemuck::bytes_of(m).to_vec();
        [
            (names.model.as_str(), mat4(&self.model)),
            (names.normal_model.as_str(), mat3(&self.normal_model)),
            (names.view.as_str(), mat4(&self.view)),
            (names.view_model.as_str(), mat4(&self.view_model)),
            (names.normal_view_model.as_str(), mat3(&self.normal_view_model)),
            (names.projection.as_str(), mat4(&self.projection)),
            (
                names.projection_view_model.as_str(),
                mat4(&self.projection_view_model),
            ),
        ]
    }
}

/// Inverse transpose of the upper-left 3x3 block.
pub fn normal_matrix(matrix: &Mat4) -> Mat3 {
    Mat3::from_mat4(*matrix).inverse().transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_identity_camera() {
        let matrices = CameraMatrices::new(&StaticCamera::default(), Mat4::IDENTITY);
        assert_eq!(matrices.projection_view_model, Mat4::IDENTITY);
        assert_eq!(matrices.normal_model, Mat3::IDENTITY);
    }

    #[test]
    fn test_composition_order() {
        let camera = StaticCamera::new(
            Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)),
            Mat4::from_scale(Vec3::splat(2.0)),
        );
        let model = Mat4::from_translation(Vec3::X);
        let matrices = CameraMatrices::new(&camera, model);

        assert_eq!(matrices.view_model, camera.view * model);
        assert_eq!(
            matrices.projection_view_model,
            camera.projection * (camera.view * model)
        );
    }

    #[test]
    fn test_normal_matrix_ignores_translation() {
        let model = Mat4::from_translation(Vec3::new(3.0, 4.0, 5.0));
        assert_eq!(normal_matrix(&model), Mat3::IDENTITY);
    }

    #[test]
    fn test_normal_matrix_of_scale() {
        let model = Mat4::from_scale(Vec3::new(2.0, 4.0, 1.0));
        let normal = normal_matrix(&model);
        assert_eq!(normal.x_axis, Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(normal.y_axis, Vec3::new(0.0, 0.25, 0.0));
    }

    #[test]
    fn test_named_byte_sizes() {
        let names = MatrixUniformNames::default();
        let matrices = CameraMatrices::new(&StaticCamera::default(), Mat4::IDENTITY);
        for (name, bytes) in matrices.named(&names) {
            let expected = if name.starts_with("normal") { 36 } else { 64 };
            assert_eq!(bytes.len(), expected, "{name}");
        }
    }
}
