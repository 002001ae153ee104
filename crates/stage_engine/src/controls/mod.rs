//! Damped camera controls
//!
//! Raw input moves *goal* values; every frame the current values are
//! integrated toward their goals by independent critically damped springs.
//! The result is written into the Scene's camera as a spherical orbit around
//! the Scene target.

pub mod damper;
pub mod input;
pub mod smooth_controls;

pub use damper::{Damper, DECAY_MILLISECONDS, SETTLING_TIME};
pub use input::{InputEvent, KeyCode, Modifiers, PointerKind, WheelMode};
pub use smooth_controls::SmoothControls;

use serde::{Deserialize, Serialize};

/// What caused a camera change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChangeSource {
    /// Direct user input (drag, wheel, pinch, keys)
    UserInteraction,
    /// Programmatic change
    #[default]
    None,
    /// Synthetic input such as an interaction prompt or auto-rotate
    Automatic,
}

/// Emitted by [`SmoothControls::update`] when the camera moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Cause of the movement
    pub source: ChangeSource,
}

/// Which raw input the controls accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionPolicy {
    /// Input is always accepted
    #[default]
    AlwaysAllow,
    /// Input is accepted only while the element has focus
    AllowWhenFocused,
    /// Input is accepted only after the element was activated; activating
    /// again turns it off
    AllowToggle,
}
