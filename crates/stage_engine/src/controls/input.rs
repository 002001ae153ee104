//! Raw input events delivered by the host

use bitflags::bitflags;

bitflags! {
    /// Keyboard modifiers held during an event
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        /// Shift key
        const SHIFT = 1 << 0;
        /// Control key
        const CTRL = 1 << 1;
        /// Alt/Option key
        const ALT = 1 << 2;
        /// Meta/Command key
        const META = 1 << 3;
    }
}

/// Keys the controls respond to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Orbit up
    ArrowUp,
    /// Orbit down
    ArrowDown,
    /// Orbit left
    ArrowLeft,
    /// Orbit right
    ArrowRight,
    /// Zoom out
    PageUp,
    /// Zoom in
    PageDown,
    /// Any other key (ignored)
    Other,
}

/// Pointer device kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    /// Mouse
    Mouse,
    /// Touch contact
    Touch,
    /// Stylus
    Pen,
}

/// Unit of wheel deltas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WheelMode {
    /// Deltas are in pixels
    #[default]
    Pixel,
    /// Deltas are in lines
    Line,
}

/// A raw input event in element-local pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Pointer pressed
    PointerDown {
        /// Pointer identifier, stable for the duration of the press
        id: u32,
        /// Horizontal position
        x: f32,
        /// Vertical position
        y: f32,
        /// Device kind
        kind: PointerKind,
    },
    /// Pointer moved
    PointerMove {
        /// Pointer identifier
        id: u32,
        /// Horizontal position
        x: f32,
        /// Vertical position
        y: f32,
    },
    /// Pointer released or canceled
    PointerUp {
        /// Pointer identifier
        id: u32,
    },
    /// Wheel scrolled
    Wheel {
        /// Vertical scroll amount
        delta_y: f32,
        /// Unit of `delta_y`
        mode: WheelMode,
    },
    /// Key pressed
    KeyDown {
        /// Key
        key: KeyCode,
        /// Modifiers held
        modifiers: Modifiers,
    },
    /// The element gained or lost focus
    Focus(bool),
    /// The element was activated (click/tap outside a drag)
    Activate,
}

impl InputEvent {
    /// Whether the event moves the camera when accepted
    pub fn is_camera_input(&self) -> bool {
        !matches!(self, InputEvent::Focus(_) | InputEvent::Activate)
    }
}
