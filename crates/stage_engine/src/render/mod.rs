//! # Rendering System
//!
//! One shared GPU context draws every registered Scene. Each frame the
//! [`Renderer`] walks its Scenes, draws the ones that need it into the
//! shared surface and copies each Scene's region into that Scene's own
//! [`OutputSurface`].
//!
//! ## Architecture
//!
//! ```text
//! Host frame callback
//!      ↓
//! Renderer (scheduling, surface growth, context loss)
//!      ↓
//! GpuContext (HeadlessContext, or a platform backend)
//!      ↓
//! OutputSurface per Scene
//! ```
//!
//! The renderer never shrinks the shared surface during a session: resizing a
//! drawing buffer is expensive, so it only grows to fit the largest Scene and
//! is reset to the largest current Scene size by `reset_surface_size`.

pub mod backend;
pub mod headless;
pub mod renderer;
pub mod surface;

pub use backend::{BackendResult, FrameDescription, GpuContext};
pub use headless::HeadlessContext;
pub use renderer::Renderer;
pub use surface::{OutputSurface, Rgba8};

use thiserror::Error;

/// The platform reported that the GPU context is gone
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("GPU context lost: {reason}")]
pub struct DeviceLostError {
    /// Platform-provided reason
    pub reason: String,
}

impl DeviceLostError {
    /// Create with a reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during rendering operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// The shared context was lost; rendering stops until it is restored
    #[error(transparent)]
    DeviceLost(#[from] DeviceLostError),

    /// No Scene is registered under the given id
    #[error("Unknown scene")]
    UnknownScene,

    /// A draw failed for a reason other than context loss
    #[error("Rendering failed: {0}")]
    RenderingFailed(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
