//! Framing math
//!
//! Computes a bounding sphere and an ideal aspect ratio so content can be
//! framed tightly in a viewport of any aspect ratio without clipping at any
//! camera orbit.

use crate::assets::SceneGraphContent;
use crate::foundation::math::{utils, Aabb, Vec3};

/// Framing parameters of the displayed content
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    /// Content-space bounds
    pub bounding_box: Aabb,
    /// Orbit center (bounding box center)
    pub center: Vec3,
    /// Radius of the bounding sphere around `center`
    pub radius: f32,
    /// Widest aspect ratio at which the vertical field of view alone frames the content
    pub ideal_aspect: f32,
    /// Vertical field of view the content is framed for, in degrees
    pub framed_fov_deg: f32,
}

impl Framing {
    /// Framing of an empty Scene: a unit sphere at the origin
    pub fn empty(framed_fov_deg: f32) -> Self {
        Self {
            bounding_box: Aabb::empty(),
            center: Vec3::zeros(),
            radius: 1.0,
            ideal_aspect: 1.0,
            framed_fov_deg,
        }
    }

    /// Frame `content` for the given field of view
    pub fn compute(content: &SceneGraphContent, framed_fov_deg: f32) -> Self {
        let bounding_box = content.bounding_box();
        if bounding_box.is_empty() {
            return Self::empty(framed_fov_deg);
        }

        let center = bounding_box.center();
        let mut radius_squared: f32 = 0.0;
        content.for_each_vertex(|vertex| {
            radius_squared = radius_squared.max((vertex - center).norm_squared());
        });

        let mut framing = Self {
            bounding_box,
            center,
            radius: radius_squared.sqrt(),
            ideal_aspect: 1.0,
            framed_fov_deg,
        };
        if framing.radius <= 0.0 {
            return framing;
        }

        let ideal_distance = framing.ideal_camera_distance();
        let mut horizontal_tan_fov: f32 = 0.0;
        content.for_each_vertex(|vertex| {
            let offset = vertex - center;
            let radius_xz = (offset.x * offset.x + offset.z * offset.z).sqrt();
            let depth = ideal_distance - offset.y.abs();
            if depth > 0.0 {
                horizontal_tan_fov = horizontal_tan_fov.max(radius_xz / depth);
            }
        });
        framing.ideal_aspect = horizontal_tan_fov / framing.half_fov_tan();

        framing
    }

    /// Camera distance at which the bounding sphere exactly fills the framed fov
    pub fn ideal_camera_distance(&self) -> f32 {
        let half_fov = utils::deg_to_rad(self.framed_fov_deg / 2.0);
        self.radius / half_fov.sin()
    }

    /// Vertical field of view that keeps the content visible at `aspect`
    pub fn adjusted_fov(&self, fov_deg: f32, aspect: f32) -> f32 {
        let aspect = if aspect > 0.0 { aspect } else { 1.0 };
        let vertical =
            utils::deg_to_rad(fov_deg / 2.0).tan() * (self.ideal_aspect / aspect).max(1.0);
        utils::rad_to_deg(2.0 * vertical.atan())
    }

    /// Distance beyond which nothing of the content can be seen from the orbit
    pub fn far_radius(&self) -> f32 {
        self.ideal_camera_distance() + self.radius
    }

    fn half_fov_tan(&self) -> f32 {
        utils::deg_to_rad(self.framed_fov_deg / 2.0).tan()
    }
}
