//! Notification plumbing between the engine and the surrounding UI layer
//!
//! Key principles:
//! - Typed event enums per producer (Scene, Renderer, AR session)
//! - Handler returns bool (true = consumed, stops forwarding)
//! - Events raised during a frame are queued and delivered by `dispatch`,
//!   so handlers never observe half-updated engine state

use crate::controls::ChangeSource;
use crate::assets::{AssetId, LoadError};
use crate::render::DeviceLostError;
use crate::xr::ArStatus;

/// Notifications produced by a single Scene
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// New content finished loading and is displayed
    ModelLoad {
        /// Identifier of the displayed content
        url: AssetId,
    },
    /// Loading failed; prior content (if any) stays displayed
    LoadError {
        /// Identifier that failed
        url: AssetId,
        /// Failure reason
        error: LoadError,
    },
    /// The camera moved
    Change {
        /// What caused the movement
        source: ChangeSource,
    },
    /// The poster overlay should be shown or hidden
    PosterVisibility {
        /// Whether the poster is visible
        visible: bool,
    },
}

/// Notifications produced by the renderer
#[derive(Debug, Clone, PartialEq)]
pub enum RendererEvent {
    /// The shared GPU context was lost
    ContextLost(DeviceLostError),
    /// The platform restored the GPU context; rendering resumed
    ContextRestored,
}

/// Notifications produced by the AR session
#[derive(Debug, Clone, PartialEq)]
pub enum ArEvent {
    /// Session status changed
    Status(ArStatus),
    /// Placed content moved to a new world position
    ModelMove,
    /// The session ended and the Scene was restored
    End,
}

/// Event handler trait
/// Returns true if event was consumed (stops forwarding)
/// Returns false to allow forwarding to other handlers
pub trait EventHandler<E> {
    /// Handle an event, return true if consumed
    fn on_event(&mut self, event: &E) -> bool;
}

impl<E, F> EventHandler<E> for F
where
    F: FnMut(&E) -> bool,
{
    fn on_event(&mut self, event: &E) -> bool {
        self(event)
    }
}

/// Queue of pending events with registered handlers
///
/// Producers `send` during the frame; the owner either `dispatch`es to
/// handlers or `drain`s the queue directly.
pub struct EventQueue<E> {
    pending: Vec<E>,
    handlers: Vec<Box<dyn EventHandler<E>>>,
}

impl<E> EventQueue<E> {
    /// Create a new empty queue
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Register a handler; handlers run in registration order
    pub fn register_handler(&mut self, handler: Box<dyn EventHandler<E>>) {
        self.handlers.push(handler);
    }

    /// Queue an event for delivery
    pub fn send(&mut self, event: E) {
        self.pending.push(event);
    }

    /// Number of undelivered events
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Peek at pending events without consuming them
    pub fn pending(&self) -> &[E] {
        &self.pending
    }

    /// Take all pending events without running handlers
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.pending)
    }

    /// Deliver all pending events to registered handlers
    ///
    /// Stops forwarding an event at the first handler that consumes it.
    pub fn dispatch(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for event in &pending {
            for handler in &mut self.handlers {
                if handler.on_event(event) {
                    break;
                }
            }
        }
    }

    /// Clear all queued events (useful for state transitions)
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: std::fmt::Debug> std::fmt::Debug for EventQueue<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.pending)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
