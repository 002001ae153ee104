//! # Scene Camera
//!
//! Perspective camera owned by each Scene. The orbit controls write its
//! position and field of view every frame; the renderer reads the matrices.
//!
//! ## Design Principles
//! - **Library-agnostic**: No GPU dependencies in camera math
//! - **On-demand matrices**: Nothing is cached, so the camera can be mutated freely
//! - **Right-handed Y-up**: Same conventions as the content coordinate space

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};

/// Perspective camera
///
/// # Coordinate System
/// Right-handed, Y-up, looking down -Z in view space.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,

    /// Point the camera is looking at in world space
    pub target: Vec3,

    /// Up vector for camera orientation (typically [0, 1, 0])
    pub up: Vec3,

    /// Vertical field of view in radians
    pub fov: f32,

    /// Aspect ratio (width / height)
    pub aspect: f32,

    /// Distance to near clipping plane
    pub near: f32,

    /// Distance to far clipping plane
    pub far: f32,
}

impl Camera {
    /// Create a new perspective camera with standard Y-up orientation
    ///
    /// # Arguments
    /// * `position` - Camera position in world space
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `aspect` - Aspect ratio (width / height) of the viewport
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    pub fn perspective(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::new(0.0, 1.0, 0.0),
            fov: utils::deg_to_rad(fov_degrees),
            aspect,
            near,
            far,
        }
    }

    /// Update camera position in world space
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// Update camera target (look-at point)
    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        log::trace!("Camera target updated to: {:?}", target);
    }

    /// Vertical field of view in degrees
    pub fn fov_degrees(&self) -> f32 {
        utils::rad_to_deg(self.fov)
    }

    /// Set the vertical field of view in degrees
    pub fn set_fov_degrees(&mut self, fov_degrees: f32) {
        self.fov = utils::deg_to_rad(fov_degrees);
    }

    /// Update camera aspect ratio for viewport changes
    ///
    /// Only logs when the difference is significant (> 0.01) to keep resize
    /// storms out of the log.
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if (self.aspect - aspect).abs() > 0.01 {
            log::debug!("Camera aspect ratio changed: {:.3} -> {:.3}", self.aspect, aspect);
        }
        self.aspect = aspect;
    }

    /// Fit the clipping planes around content of the given extent
    ///
    /// A zero far plane falls back to 2; the near plane never drops below
    /// 1/1000 of the far plane to preserve depth precision.
    pub fn update_near_far(&mut self, near: f32, far: f32) {
        self.far = if far == 0.0 { 2.0 } else { far };
        self.near = near.max(self.far / 1000.0);
    }

    /// View matrix (world to camera space)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.target, self.up)
    }

    /// Projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov, self.aspect, self.near, self.far)
    }

    /// Combined `projection × view` matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

impl Default for Camera {
    /// 45° camera one unit in front of the origin, looking at it
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 1.0),
            target: Vec3::zeros(),
            up: Vec3::new(0.0, 1.0, 0.0),
            fov: std::f32::consts::FRAC_PI_4,
            aspect: 1.0,
            near: 0.01,
            far: 100.0,
        }
    }
}
