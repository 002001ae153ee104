//! Scene capabilities
//!
//! Optional behaviors composed onto a [`ModelScene`] by delegation. The Scene
//! owns a list of boxed capabilities and calls their hooks at fixed points:
//!
//! - `on_attach`: once, when added to the Scene
//! - `on_tick`: every frame, after controls and animation
//! - `on_resize`: when the Scene size changes
//! - `on_source_change`: when a load completes, fails or content is cleared
//!
//! Hooks receive the Scene mutably; the capability list itself is detached
//! for the duration of the call.

use super::ModelScene;
use crate::assets::AssetId;
use crate::config::SceneConfig;
use crate::events::SceneEvent;
use crate::foundation::time::Millis;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Outcome of a source change, as seen by capabilities
#[derive(Debug, Clone, PartialEq)]
pub enum SourceChange {
    /// New content is displayed
    Loaded(AssetId),
    /// Loading failed; prior content (if any) stays
    Failed(AssetId),
    /// The source was cleared
    Cleared,
}

/// A behavior attached to a Scene
pub trait Capability {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Called once when the capability is added
    fn on_attach(&mut self, _scene: &mut ModelScene) {}

    /// Called every frame
    fn on_tick(&mut self, _scene: &mut ModelScene, _time: Millis, _delta: Millis) {}

    /// Called when the Scene size changes
    fn on_resize(&mut self, _scene: &mut ModelScene, _width: u32, _height: u32) {}

    /// Called when a source change settles
    fn on_source_change(&mut self, _scene: &mut ModelScene, _change: &SourceChange) {}

    /// Downcast support for capability-specific APIs
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// When the poster covering an unloaded Scene is dismissed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevealPolicy {
    /// As soon as content has loaded
    #[default]
    Auto,
    /// After content has loaded and the user interacted or
    /// [`LoadingCapability::dismiss_poster`] was called
    Interaction,
}

/// Poster/reveal handling
#[derive(Debug, Clone)]
pub struct LoadingCapability {
    reveal: RevealPolicy,
    poster_visible: bool,
    loaded: bool,
    dismiss_requested: bool,
    seen_interactions: u64,
}

impl LoadingCapability {
    /// Create with the given reveal policy
    pub fn new(reveal: RevealPolicy) -> Self {
        Self {
            reveal,
            poster_visible: true,
            loaded: false,
            dismiss_requested: false,
            seen_interactions: 0,
        }
    }

    /// Whether the poster currently covers the Scene
    pub fn poster_visible(&self) -> bool {
        self.poster_visible
    }

    /// Reveal policy in effect
    pub fn reveal(&self) -> RevealPolicy {
        self.reveal
    }

    /// Ask for the poster to go away once content is loaded
    pub fn dismiss_poster(&mut self) {
        self.dismiss_requested = true;
    }

    fn set_poster_visible(&mut self, scene: &mut ModelScene, visible: bool) {
        if self.poster_visible != visible {
            self.poster_visible = visible;
            scene.events_mut().send(SceneEvent::PosterVisibility { visible });
            log::debug!("Poster {}", if visible { "shown" } else { "dismissed" });
        }
    }

    fn maybe_reveal(&mut self, scene: &mut ModelScene) {
        if !self.loaded || !self.poster_visible {
            return;
        }
        let reveal = match self.reveal {
            RevealPolicy::Auto => true,
            RevealPolicy::Interaction => self.dismiss_requested,
        };
        if reveal {
            self.set_poster_visible(scene, false);
        }
    }
}

impl Capability for LoadingCapability {
    fn name(&self) -> &'static str {
        "loading"
    }

    fn on_attach(&mut self, scene: &mut ModelScene) {
        self.seen_interactions = scene.interaction_count();
        self.loaded = scene.has_content();
        self.maybe_reveal(scene);
    }

    fn on_tick(&mut self, scene: &mut ModelScene, _time: Millis, _delta: Millis) {
        let interactions = scene.interaction_count();
        if interactions != self.seen_interactions {
            self.seen_interactions = interactions;
            self.dismiss_requested = true;
        }
        self.maybe_reveal(scene);
    }

    fn on_source_change(&mut self, scene: &mut ModelScene, change: &SourceChange) {
        match change {
            SourceChange::Loaded(_) => {
                self.loaded = true;
                self.maybe_reveal(scene);
            }
            SourceChange::Failed(_) => {}
            SourceChange::Cleared => {
                self.loaded = false;
                self.set_poster_visible(scene, true);
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Turntable auto-rotation
#[derive(Debug, Clone)]
pub struct StagingCapability {
    /// Whether the turntable turns at all
    pub auto_rotate: bool,
    /// Idle time after user interaction before turning resumes
    pub auto_rotate_delay_ms: Millis,
    /// Turntable speed in radians per second
    pub rotation_per_second: f32,
    idle_ms: Millis,
    seen_interactions: u64,
}

impl StagingCapability {
    /// Create from the Scene defaults
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            auto_rotate: config.auto_rotate,
            auto_rotate_delay_ms: config.auto_rotate_delay_ms,
            rotation_per_second: config.rotation_per_second,
            idle_ms: config.auto_rotate_delay_ms,
            seen_interactions: 0,
        }
    }

    /// Time since the last user interaction, capped once turning resumes
    pub fn idle_ms(&self) -> Millis {
        self.idle_ms
    }
}

impl Capability for StagingCapability {
    fn name(&self) -> &'static str {
        "staging"
    }

    fn on_attach(&mut self, scene: &mut ModelScene) {
        self.seen_interactions = scene.interaction_count();
    }

    fn on_tick(&mut self, scene: &mut ModelScene, _time: Millis, delta: Millis) {
        let interactions = scene.interaction_count();
        if interactions != self.seen_interactions {
            self.seen_interactions = interactions;
            self.idle_ms = 0.0;
            return;
        }
        self.idle_ms = (self.idle_ms + delta).min(self.auto_rotate_delay_ms);

        if !self.auto_rotate || !scene.has_content() || scene.is_presenting_ar() {
            return;
        }
        if self.idle_ms < self.auto_rotate_delay_ms || delta <= 0.0 {
            return;
        }

        let step = self.rotation_per_second * (delta / 1000.0) as f32;
        scene.set_yaw(scene.yaw() + step);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
