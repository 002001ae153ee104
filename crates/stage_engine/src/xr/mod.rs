//! # AR presentation
//!
//! Hands one Scene at a time to an immersive AR session:
//!
//! ```text
//! Inactive ──present──► Requesting ──session + space──► Presenting
//!    ▲                      │ failure / stop                 │ end notification,
//!    │                      ▼                                │ end() failure
//!    └───────────────── Inactive ◄──── Cleanup ◄─────────────┘
//! ```
//!
//! The platform is reached only through the traits in [`platform`]. While
//! presenting, the platform drives its own frame callback
//! ([`ArSession::on_frame`]); the renderer skips the presented Scene and
//! renders it once per AR view on the session's behalf.
//!
//! Content is placed automatically on the first usable screen-center hit.
//! After that, touches drive it: one finger on the content drags it across
//! the surface, one finger beside it twists it, and two fingers pinch-scale it.

pub mod placement;
pub mod platform;
pub mod session;

pub use placement::{hit_point, hit_test_ray, Gesture, Placement, ROTATION_RATE};
pub use platform::{
    FrameHandle, HitTestRay, HitTestResult, HitTestSource, InputSourceId, ReferenceSpace, ReferenceSpaceKind,
    SessionEvent, TransientHitResult, ViewerPose, XrFrame, XrPlatform, XrSession, XrView, TOUCHSCREEN_PROFILE,
};
pub use session::{ArPhase, ArSession, StopRequest};

use thiserror::Error;

/// Session status reported to the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArStatus {
    /// No session is running
    NotPresenting,
    /// The session runs and the first frame arrived
    SessionStarted,
    /// Content was placed on a surface
    ObjectPlaced,
    /// Activation failed; the normal view stays active
    Failed,
}

/// The platform cannot present immersive AR
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Immersive AR is not supported on this platform")]
pub struct UnsupportedCapabilityError;

/// Presentation was requested while a session is already underway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("An AR session is already {phase:?}")]
pub struct SessionBusyError {
    /// Phase the existing session is in
    pub phase: ArPhase,
}

/// AR session errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArError {
    /// See [`UnsupportedCapabilityError`]
    #[error(transparent)]
    UnsupportedCapability(#[from] UnsupportedCapabilityError),

    /// See [`SessionBusyError`]
    #[error(transparent)]
    SessionBusy(#[from] SessionBusyError),

    /// The Scene to present is not registered
    #[error("Scene is not registered with the renderer")]
    UnknownScene,

    /// The operation needs a presenting session
    #[error("No scene is being presented")]
    NotPresenting,

    /// A transition the state machine does not allow
    #[error("Invalid AR transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current phase
        from: ArPhase,
        /// Requested phase
        to: ArPhase,
    },

    /// The platform rejected a request
    #[error("AR platform error: {0}")]
    Platform(String),
}
