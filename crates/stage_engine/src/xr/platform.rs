//! Platform seam for immersive AR
//!
//! Everything the session needs from the device: capability query, session
//! and reference space requests, hit testing, the AR frame callback and the
//! per-frame viewer pose. Requests are asynchronous and return `'static`
//! futures so the session can poll them across frames.

use super::ArError;
use crate::foundation::math::{Mat4, Vec3};
use futures::future::LocalBoxFuture;

/// Handle of a requested AR animation frame
pub type FrameHandle = u32;

/// Identifier of one touch or controller, stable for its lifetime
pub type InputSourceId = u32;

/// Input profile whose transient touches are hit tested during gestures
pub const TOUCHSCREEN_PROFILE: &str = "generic-touchscreen";

/// Coordinate system poses are reported in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSpaceKind {
    /// World-locked, origin near the device at session start
    Local,
    /// Locked to the viewer
    Viewer,
}

/// A reference space granted by the platform
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSpace {
    /// What the space is anchored to
    pub kind: ReferenceSpaceKind,
}

/// Hit-test ray relative to the viewer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitTestRay {
    /// Ray origin
    pub origin: Vec3,
    /// Unit direction
    pub direction: Vec3,
}

/// Something a session notifies between frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A touch went down
    SelectStart(InputSourceId),
    /// A touch was lifted
    SelectEnd(InputSourceId),
    /// The user tapped (primary action)
    Select,
    /// The session ended, for whatever reason
    End,
}

/// One rendered view of a frame (one eye, or the phone screen)
#[derive(Debug, Clone, PartialEq)]
pub struct XrView {
    /// Camera-to-world transform
    pub transform: Mat4,
    /// Projection matrix supplied by the platform
    pub projection: Mat4,
}

impl XrView {
    /// World-to-camera transform
    pub fn view_matrix(&self) -> Mat4 {
        self.transform.try_inverse().unwrap_or_else(Mat4::identity)
    }

    /// Projection times view
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }

    /// Camera position in world space
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.transform.m14, self.transform.m24, self.transform.m34)
    }

    /// Direction the camera looks along (its -Z axis) in world space
    pub fn forward(&self) -> Vec3 {
        -Vec3::new(self.transform.m13, self.transform.m23, self.transform.m33)
    }
}

/// Viewer pose of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerPose {
    /// Views to render, first one is the main viewpoint
    pub views: Vec<XrView>,
}

/// One real-world intersection
#[derive(Debug, Clone, PartialEq)]
pub struct HitTestResult {
    /// Pose of the hit; its Y axis is the surface normal
    pub pose: Mat4,
}

/// Hits of one active touch
#[derive(Debug, Clone, PartialEq)]
pub struct TransientHitResult {
    /// Touch the hits belong to
    pub input: InputSourceId,
    /// Touch position in normalized screen coordinates, each in [-1, 1]
    pub axes: [f32; 2],
    /// Hits along the touch ray, nearest first
    pub results: Vec<HitTestResult>,
}

/// Subscription to per-frame hit results
pub trait HitTestSource {
    /// Identifier used to query frame results
    fn id(&self) -> u64;

    /// Stop producing results
    fn cancel(&mut self);
}

/// Device entry point
pub trait XrPlatform {
    /// Whether immersive AR sessions can be requested
    fn supports_immersive_ar(&self) -> bool;

    /// Ask for an immersive AR session
    fn request_session(&self) -> LocalBoxFuture<'static, Result<Box<dyn XrSession>, ArError>>;
}

/// A running immersive session
pub trait XrSession {
    /// Ask for a reference space
    fn request_reference_space(
        &mut self,
        kind: ReferenceSpaceKind,
    ) -> LocalBoxFuture<'static, Result<ReferenceSpace, ArError>>;

    /// Subscribe to hits along `ray`
    fn request_hit_test_source(
        &mut self,
        ray: HitTestRay,
    ) -> LocalBoxFuture<'static, Result<Box<dyn HitTestSource>, ArError>>;

    /// Subscribe to hits along the rays of transient touches of `profile`
    fn request_transient_hit_test_source(
        &mut self,
        profile: &str,
    ) -> LocalBoxFuture<'static, Result<Box<dyn HitTestSource>, ArError>>;

    /// Schedule the next AR frame callback
    fn request_animation_frame(&mut self) -> FrameHandle;

    /// Unschedule a frame callback
    fn cancel_animation_frame(&mut self, handle: FrameHandle);

    /// Take notifications raised since the last call
    fn poll_events(&mut self) -> Vec<SessionEvent>;

    /// Ask the platform to end the session
    ///
    /// On success the platform later reports [`SessionEvent::End`].
    fn end(&mut self) -> Result<(), ArError>;
}

/// Per-frame data handed to the AR frame callback
pub trait XrFrame {
    /// Pose of the viewer, if tracking is available
    fn viewer_pose(&self, space: &ReferenceSpace) -> Option<ViewerPose>;

    /// Hits of `source` this frame, nearest first
    fn hit_test_results(&self, source: u64, space: &ReferenceSpace) -> Vec<HitTestResult>;

    /// Active touches of a transient source this frame, one entry per touch
    fn transient_hit_test_results(&self, source: u64, space: &ReferenceSpace) -> Vec<TransientHitResult>;
}
