//! Backend abstraction traits for the rendering system
//!
//! This module defines the trait a GPU context must implement so the
//! [`Renderer`](super::Renderer) can schedule Scenes without knowing which
//! platform API draws them.

use super::surface::OutputSurface;
use super::RenderError;
use crate::assets::SceneGraphContent;
use crate::foundation::math::Mat4;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Everything a context needs to draw one Scene
#[derive(Debug, Clone, Copy)]
pub struct FrameDescription<'a> {
    /// Drawing region at the top-left of the shared surface, in physical pixels
    pub viewport: (u32, u32),
    /// Camera view-projection
    pub view_projection: Mat4,
    /// Content placement (pivot or AR dolly)
    pub model: Mat4,
    /// Tone mapping exposure
    pub exposure: f32,
    /// Contact shadow strength
    pub shadow_intensity: f32,
    /// Posed content instance, if any
    pub content: Option<&'a SceneGraphContent>,
}

/// Shared GPU context
///
/// There is exactly one per [`Renderer`](super::Renderer); every Scene is
/// drawn through it in turn.
pub trait GpuContext {
    /// Short backend name for logging
    fn name(&self) -> &'static str;

    /// Size of the shared drawing surface in physical pixels
    fn size(&self) -> (u32, u32);

    /// Resize the shared drawing surface
    fn set_size(&mut self, width: u32, height: u32);

    /// Start or stop the platform frame callback
    fn set_animation_loop(&mut self, running: bool);

    /// Whether the platform frame callback is running
    fn is_animating(&self) -> bool;

    /// Draw one Scene into the top-left viewport of the shared surface
    ///
    /// Returns [`RenderError::DeviceLost`] once the context is gone.
    fn render(&mut self, frame: &FrameDescription<'_>) -> BackendResult<()>;

    /// Copy the most recent draw into a Scene's output surface
    fn copy_to(&self, target: &mut OutputSurface) -> BackendResult<()>;

    /// Whether the context is currently lost
    fn is_lost(&self) -> bool;

    /// Try to recreate a lost context; returns whether it is usable again
    fn try_restore(&mut self) -> bool;

    /// Downcast to concrete context type
    fn as_any(&self) -> &dyn std::any::Any;

    /// Mutable downcast to concrete context type
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
