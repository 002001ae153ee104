//! # Renderer / Scheduler
//!
//! Owns the shared GPU context and every registered Scene, and runs the one
//! cooperative per-frame loop:
//!
//! 1. advance the frame clock
//! 2. try to restore a lost context
//! 3. grow the shared surface to the largest Scene
//! 4. tick every Scene, visible or not
//! 5. render each Scene that is visible, dirty, unpaused and not held by an
//!    AR session, then copy its region into the Scene's output surface
//!
//! A failure rendering one Scene is logged and never stops the loop.

use super::backend::GpuContext;
use super::{DeviceLostError, RenderError, RenderResult};
use crate::config::RendererConfig;
use crate::events::{EventQueue, RendererEvent};
use crate::foundation::collections::{HandleMap, SceneId};
use crate::foundation::math::Mat4;
use crate::foundation::time::{FrameClock, Millis};
use crate::scene::ModelScene;

/// Frame scheduler over one shared GPU context
pub struct Renderer {
    config: RendererConfig,
    context: Box<dyn GpuContext>,
    scenes: HandleMap<SceneId, ModelScene>,
    clock: FrameClock,
    surface_size: (u32, u32),
    presenting: Option<SceneId>,
    context_lost: bool,
    events: EventQueue<RendererEvent>,
}

impl Renderer {
    /// Create a scheduler drawing through `context`
    pub fn new(context: Box<dyn GpuContext>, config: &RendererConfig) -> Self {
        let surface_size = context.size();
        log::info!(
            "Renderer created on '{}' context ({}x{})",
            context.name(),
            surface_size.0,
            surface_size.1
        );
        Self {
            config: config.clone(),
            context,
            scenes: HandleMap::with_key(),
            clock: FrameClock::new(),
            surface_size,
            presenting: None,
            context_lost: false,
            events: EventQueue::new(),
        }
    }

    // ---- Scene set ----

    /// Add a Scene to the active set; starts the frame loop on the first one
    pub fn register_scene(&mut self, mut scene: ModelScene) -> SceneId {
        scene.set_pixel_ratio(self.config.pixel_ratio);
        scene.queue_render();
        let id = self.scenes.insert(scene);
        log::debug!("Registered scene {:?} ({} active)", id, self.scenes.len());

        self.grow_surface();
        if self.scenes.len() == 1 {
            log::debug!("Starting frame loop");
            self.context.set_animation_loop(true);
        }
        id
    }

    /// Remove a Scene; stops the frame loop when none are left
    pub fn unregister_scene(&mut self, id: SceneId) -> Option<ModelScene> {
        let scene = self.scenes.remove(id)?;
        if self.presenting == Some(id) {
            self.presenting = None;
        }
        log::debug!("Unregistered scene {:?} ({} active)", id, self.scenes.len());

        if self.scenes.is_empty() {
            log::debug!("Stopping frame loop");
            self.context.set_animation_loop(false);
            self.clock.reset();
        }
        Some(scene)
    }

    /// Registered Scene
    pub fn scene(&self, id: SceneId) -> Option<&ModelScene> {
        self.scenes.get(id)
    }

    /// Registered Scene, mutably
    pub fn scene_mut(&mut self, id: SceneId) -> Option<&mut ModelScene> {
        self.scenes.get_mut(id)
    }

    /// All registered Scenes
    pub fn scenes(&self) -> impl Iterator<Item = (SceneId, &ModelScene)> {
        self.scenes.iter()
    }

    /// All registered Scenes, mutably
    pub fn scenes_mut(&mut self) -> impl Iterator<Item = (SceneId, &mut ModelScene)> {
        self.scenes.iter_mut()
    }

    /// Number of registered Scenes
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// True when no Scene is registered
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Whether the shared frame loop is running
    pub fn is_running(&self) -> bool {
        self.context.is_animating()
    }

    /// Frames ticked so far
    pub fn frame_count(&self) -> u64 {
        self.clock.frame_count()
    }

    /// Mark every Scene for rendering
    pub fn mark_all_dirty(&mut self) {
        for (_, scene) in self.scenes.iter_mut() {
            scene.queue_render();
        }
    }

    // ---- Frame ----

    /// Run one frame at host timestamp `time`
    pub fn tick(&mut self, time: Millis) {
        let delta = self.clock.advance(time);

        if self.context_lost {
            self.try_restore();
        }
        self.grow_surface();

        for (_, scene) in self.scenes.iter_mut() {
            scene.tick(time, delta);
        }

        if self.context_lost {
            return;
        }

        let ready: Vec<SceneId> = self
            .scenes
            .iter()
            .filter(|(id, scene)| scene.should_render() && self.presenting != Some(*id))
            .map(|(id, _)| id)
            .collect();

        for id in ready {
            match self.render_scene(id) {
                Ok(()) => {}
                Err(RenderError::DeviceLost(error)) => {
                    self.on_context_lost(error);
                    break;
                }
                Err(error) => log::error!("Failed to render scene {:?}: {}", id, error),
            }
        }
    }

    fn render_scene(&mut self, id: SceneId) -> RenderResult<()> {
        let scene = self.scenes.get_mut(id).ok_or(RenderError::UnknownScene)?;
        self.context.render(&scene.frame_description())?;
        self.context.copy_to(scene.output_mut())?;
        scene.mark_rendered();
        log::trace!("Rendered scene {:?}", id);
        Ok(())
    }

    // ---- Shared surface ----

    /// Size of the shared drawing surface
    pub fn surface_size(&self) -> (u32, u32) {
        self.surface_size
    }

    /// Shrink the shared surface to the largest current Scene
    pub fn reset_surface_size(&mut self) {
        let size = self.largest_scene_size();
        if size != self.surface_size {
            log::debug!("Resetting shared surface to {}x{}", size.0, size.1);
            self.surface_size = size;
            self.context.set_size(size.0, size.1);
            self.mark_all_dirty();
        }
    }

    fn largest_scene_size(&self) -> (u32, u32) {
        self.scenes.values().fold((1, 1), |(width, height), scene| {
            let (scene_width, scene_height) = scene.physical_size();
            (width.max(scene_width), height.max(scene_height))
        })
    }

    fn grow_surface(&mut self) {
        let (width, height) = self.largest_scene_size();
        let grown = (width.max(self.surface_size.0), height.max(self.surface_size.1));
        if grown != self.surface_size {
            log::debug!(
                "Growing shared surface {}x{} -> {}x{}",
                self.surface_size.0,
                self.surface_size.1,
                grown.0,
                grown.1
            );
            self.surface_size = grown;
            self.context.set_size(grown.0, grown.1);
            self.mark_all_dirty();
        }
    }

    // ---- Context loss ----

    /// Whether the shared context is currently lost
    pub fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    fn on_context_lost(&mut self, error: DeviceLostError) {
        log::warn!("{}; rendering paused until restored", error);
        self.context_lost = true;
        self.events.send(RendererEvent::ContextLost(error));
    }

    fn try_restore(&mut self) {
        if self.context.try_restore() {
            log::info!("GPU context restored");
            self.context_lost = false;
            self.context.set_size(self.surface_size.0, self.surface_size.1);
            self.events.send(RendererEvent::ContextRestored);
            self.mark_all_dirty();
        }
    }

    /// Replace a context the platform could not restore
    pub fn reinitialize(&mut self, mut context: Box<dyn GpuContext>) {
        log::info!("Reinitializing renderer on '{}' context", context.name());
        context.set_size(self.surface_size.0, self.surface_size.1);
        context.set_animation_loop(!self.scenes.is_empty());
        self.context = context;
        self.context_lost = false;
        self.mark_all_dirty();
    }

    /// The shared context
    pub fn context(&self) -> &dyn GpuContext {
        self.context.as_ref()
    }

    /// The shared context, mutably
    pub fn context_mut(&mut self) -> &mut dyn GpuContext {
        self.context.as_mut()
    }

    // ---- AR delegation ----

    /// Scene currently held by an AR session
    pub fn presenting(&self) -> Option<SceneId> {
        self.presenting
    }

    /// Hand a Scene to (or take it back from) an AR session
    pub fn set_presenting(&mut self, id: Option<SceneId>) {
        if id != self.presenting {
            log::debug!("Presenting scene {:?} -> {:?}", self.presenting, id);
            if let Some(previous) = self.presenting.and_then(|previous| self.scenes.get_mut(previous)) {
                previous.queue_render();
            }
            self.presenting = id;
        }
    }

    /// Render a presented Scene into the AR framebuffer for one view
    pub fn render_xr_view(&mut self, id: SceneId, view_projection: Mat4) -> RenderResult<()> {
        if self.context_lost {
            return Err(DeviceLostError::new("context lost").into());
        }
        let scene = self.scenes.get(id).ok_or(RenderError::UnknownScene)?;
        let result = self.context.render(&scene.frame_description_with(view_projection));
        if let Err(RenderError::DeviceLost(error)) = &result {
            self.on_context_lost(error.clone());
        }
        result
    }

    // ---- Events ----

    /// Pending notifications
    pub fn events(&self) -> &EventQueue<RendererEvent> {
        &self.events
    }

    /// Pending notifications, mutably
    pub fn events_mut(&mut self) -> &mut EventQueue<RendererEvent> {
        &mut self.events
    }

    /// Take all pending notifications
    pub fn drain_events(&mut self) -> Vec<RendererEvent> {
        self.events.drain()
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("context", &self.context.name())
            .field("scenes", &self.scenes.len())
            .field("surface_size", &self.surface_size)
            .field("presenting", &self.presenting)
            .field("context_lost", &self.context_lost)
            .finish()
    }
}
