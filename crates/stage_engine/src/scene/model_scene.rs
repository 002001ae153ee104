//! The Scene: one logical render target
//!
//! A [`ModelScene`] owns everything needed to draw one model viewer: the
//! camera and its damped controls, the displayed content instance with its
//! framing, the content placement (pivot or AR dolly), the render flags and
//! the Scene's own output surface.
//!
//! ## Source changes
//!
//! ```text
//! set_source(url) ──► generation += 1, pending = cache.load(url)
//!                          │
//!   tick() polls pending ──┤ stale generation ─► ignored
//!                          ├ Ok  ─► install content, ModelLoad
//!                          └ Err ─► keep prior content, LoadError
//! ```
//!
//! Loads are polled cooperatively from [`ModelScene::tick`]; a source change
//! that supersedes a pending one drops the old future, so its completion can
//! never reach the Scene.

use super::animation::{AnimationPlayback, LoopMode};
use super::camera::Camera;
use super::capability::{Capability, SourceChange};
use super::framing::Framing;
use crate::assets::{AssetCache, AssetId, LoadError, RetainedContent, SceneGraphContent};
use crate::config::{ControlsConfig, SceneConfig};
use crate::controls::{ChangeEvent, InputEvent, SmoothControls};
use crate::controls::damper::Damper;
use crate::events::{EventQueue, SceneEvent};
use crate::foundation::math::{utils, Mat4, Mat4Ext, Spherical, Vec3};
use crate::foundation::time::Millis;
use crate::render::backend::FrameDescription;
use crate::render::surface::OutputSurface;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use std::fmt;

/// Polar angle of the initial camera orbit
const DEFAULT_PHI_DEG: f32 = 75.0;

/// Initial camera distance relative to the ideal framing distance
const DEFAULT_RADIUS_FACTOR: f32 = 1.05;

/// Where the content hangs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentAnchor {
    /// Under the Scene pivot, orbited by the camera
    #[default]
    Pivot,
    /// Under the AR dolly, placed in the real world
    Dolly,
}

/// Placement and render state saved before AR presentation
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSnapshot {
    /// Anchor before presenting
    pub anchor: ContentAnchor,
    /// Host visibility before presenting
    pub visible: bool,
    /// Content offset
    pub position: Vec3,
    /// Content yaw
    pub yaw: f32,
    /// Uniform content scale
    pub scale: f32,
    /// Target goal
    pub target: Vec3,
    /// Shadow intensity
    pub shadow_intensity: f32,
    /// Orbit goal
    pub orbit: Spherical,
    /// Field of view goal in degrees
    pub field_of_view: f32,
}

struct PendingSource {
    url: AssetId,
    generation: u64,
    load: LocalBoxFuture<'static, Result<RetainedContent, LoadError>>,
}

/// A logical render target
pub struct ModelScene {
    config: SceneConfig,
    base_controls: ControlsConfig,

    width: u32,
    height: u32,
    pixel_ratio: f32,
    camera: Camera,
    controls: SmoothControls,

    target: Vec3,
    goal_target: Vec3,
    target_dampers: [Damper; 3],

    anchor: ContentAnchor,
    position: Vec3,
    yaw: f32,
    scale: f32,

    content: Option<RetainedContent>,
    url: Option<AssetId>,
    framing: Framing,
    playback: AnimationPlayback,

    source_generation: u64,
    pending: Option<PendingSource>,

    visible: bool,
    dirty: bool,
    paused: bool,
    shadow_intensity: f32,
    exposure: f32,

    output: OutputSurface,
    events: EventQueue<SceneEvent>,
    capabilities: Vec<Box<dyn Capability>>,

    interaction_count: u64,
    render_count: u64,
}

impl ModelScene {
    /// Create a Scene with default configuration
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_config(width, height, &SceneConfig::default(), &ControlsConfig::default())
    }

    /// Create a Scene of the given logical size
    pub fn with_config(width: u32, height: u32, config: &SceneConfig, controls: &ControlsConfig) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let aspect = width as f32 / height as f32;

        let mut scene = Self {
            config: config.clone(),
            base_controls: controls.clone(),
            width,
            height,
            pixel_ratio: 1.0,
            camera: Camera::perspective(Vec3::new(0.0, 0.0, 1.0), config.framed_fov_deg, aspect, 0.01, 100.0),
            controls: SmoothControls::new(controls.clone()),
            target: Vec3::zeros(),
            goal_target: Vec3::zeros(),
            target_dampers: [Damper::default(), Damper::default(), Damper::default()],
            anchor: ContentAnchor::Pivot,
            position: Vec3::zeros(),
            yaw: 0.0,
            scale: 1.0,
            content: None,
            url: None,
            framing: Framing::empty(config.framed_fov_deg),
            playback: AnimationPlayback::default(),
            source_generation: 0,
            pending: None,
            visible: true,
            dirty: true,
            paused: false,
            shadow_intensity: config.shadow_intensity,
            exposure: config.exposure,
            output: OutputSurface::new(width, height),
            events: EventQueue::new(),
            capabilities: Vec::new(),
            interaction_count: 0,
            render_count: 0,
        };
        scene.controls.set_viewport_height(height as f32);
        scene.frame_content(true);
        scene
    }

    // ---- Size ----

    /// Logical size
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Size in physical pixels
    pub fn physical_size(&self) -> (u32, u32) {
        let scale = |value: u32| ((value as f32 * self.pixel_ratio).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }

    /// Width over height
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Device pixels per logical pixel
    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    /// Set the device pixel ratio; resizes the output surface
    pub fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
        if pixel_ratio > 0.0 && pixel_ratio != self.pixel_ratio {
            self.pixel_ratio = pixel_ratio;
            let (width, height) = self.physical_size();
            self.output.resize(width, height);
            self.dirty = true;
        }
    }

    /// Host resize signal
    pub fn set_size(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if (width, height) == (self.width, self.height) {
            return;
        }
        log::debug!("Scene resized to {}x{}", width, height);
        self.width = width;
        self.height = height;
        let (physical_width, physical_height) = self.physical_size();
        self.output.resize(physical_width, physical_height);
        self.camera.set_aspect_ratio(self.aspect());
        self.controls.set_viewport_height(height as f32);
        self.frame_content(false);
        self.dirty = true;

        self.with_capabilities(|capability, scene| capability.on_resize(scene, width, height));
    }

    // ---- Camera ----

    /// The camera, as last written by the controls
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Damped orbit controls
    pub fn controls(&self) -> &SmoothControls {
        &self.controls
    }

    /// Damped orbit controls, mutably
    ///
    /// Programmatic goal changes take effect on the next tick.
    pub fn controls_mut(&mut self) -> &mut SmoothControls {
        &mut self.controls
    }

    /// Forward raw user input to the controls
    ///
    /// Returns whether the input was accepted.
    pub fn handle_input(&mut self, event: &InputEvent) -> bool {
        let accepted = self.controls.handle_input(event);
        if accepted && event.is_camera_input() {
            self.interaction_count += 1;
        }
        accepted
    }

    /// Forward input synthesized on the user's behalf
    pub fn handle_synthetic_input(&mut self, event: &InputEvent) -> bool {
        self.controls.handle_synthetic_input(event)
    }

    /// Number of accepted user camera inputs so far
    pub fn interaction_count(&self) -> u64 {
        self.interaction_count
    }

    /// Point the camera orbits around, in content space
    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Target the Scene is damping toward
    pub fn goal_target(&self) -> Vec3 {
        self.goal_target
    }

    /// Move the orbit target; damped over the next ticks
    pub fn set_target(&mut self, target: Vec3) {
        if target != self.goal_target {
            self.goal_target = target;
            self.dirty = true;
        }
    }

    /// Snap the target onto its goal
    pub fn jump_to_target(&mut self) {
        if self.target != self.goal_target {
            self.target = self.goal_target;
            for damper in &mut self.target_dampers {
                damper.reset();
            }
            self.dirty = true;
        }
    }

    // ---- Placement ----

    /// Where the content hangs
    pub fn anchor(&self) -> ContentAnchor {
        self.anchor
    }

    /// Reparent the content
    pub fn set_anchor(&mut self, anchor: ContentAnchor) {
        if anchor != self.anchor {
            log::debug!("Content anchor {:?} -> {:?}", self.anchor, anchor);
            self.anchor = anchor;
            self.dirty = true;
        }
    }

    /// Whether an AR session currently holds the content
    pub fn is_presenting_ar(&self) -> bool {
        self.anchor == ContentAnchor::Dolly
    }

    /// Content offset
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Move the content
    pub fn set_position(&mut self, position: Vec3) {
        if position != self.position {
            self.position = position;
            self.dirty = true;
        }
    }

    /// Rotation of the content around +Y, in radians
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Rotate the content around +Y
    pub fn set_yaw(&mut self, yaw: f32) {
        if yaw != self.yaw && yaw.is_finite() {
            self.yaw = yaw;
            self.dirty = true;
        }
    }

    /// Uniform content scale
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Scale the content uniformly
    pub fn set_scale(&mut self, scale: f32) {
        if scale != self.scale && scale.is_finite() && scale > 0.0 {
            self.scale = scale;
            self.dirty = true;
        }
    }

    /// Content-to-world matrix
    ///
    /// The target sits at the placement origin, so the camera always orbits
    /// the world origin.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * Mat4::rotation_y(self.yaw)
            * Mat4::new_scaling(self.scale)
            * Mat4::new_translation(&-self.target)
    }

    // ---- Content ----

    /// Identifier of the displayed content
    pub fn url(&self) -> Option<&AssetId> {
        self.url.as_ref()
    }

    /// Identifier of a load still in flight
    pub fn pending_url(&self) -> Option<&AssetId> {
        self.pending.as_ref().map(|pending| &pending.url)
    }

    /// Whether content is displayed
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// The displayed content instance
    pub fn content(&self) -> Option<&SceneGraphContent> {
        self.content.as_deref()
    }

    /// The displayed content instance, mutably; marks the Scene dirty
    pub fn content_mut(&mut self) -> Option<&mut SceneGraphContent> {
        self.dirty = true;
        self.content.as_deref_mut()
    }

    /// Framing of the displayed content
    pub fn framing(&self) -> &Framing {
        &self.framing
    }

    /// Change the displayed source
    ///
    /// Setting the source that is already requested does nothing. `None`
    /// clears the content. A new source supersedes any load still in flight.
    pub fn set_source(&mut self, cache: &AssetCache, url: Option<AssetId>) {
        let requested = self.pending_url().or(self.url.as_ref());
        if url.as_ref() == requested {
            return;
        }

        self.source_generation += 1;
        if let Some(stale) = self.pending.take() {
            log::debug!("Load of {} superseded", stale.url);
        }

        match url {
            None => self.clear_content(),
            Some(url) if self.url.as_ref() == Some(&url) => {
                log::debug!("Source {} already displayed", url);
            }
            Some(url) => {
                log::info!("Loading {}", url);
                self.pending = Some(PendingSource {
                    load: cache.load(url.clone()),
                    url,
                    generation: self.source_generation,
                });
                self.poll_source();
            }
        }
    }

    /// Drive a pending load; returns whether it settled this call
    pub fn poll_source(&mut self) -> bool {
        let Some(mut pending) = self.pending.take() else {
            return false;
        };
        let Some(result) = (&mut pending.load).now_or_never() else {
            self.pending = Some(pending);
            return false;
        };
        if pending.generation != self.source_generation {
            log::debug!("Discarding stale load of {}", pending.url);
            return false;
        }

        match result {
            Ok(content) => self.install_content(pending.url, content),
            Err(error) => {
                log::warn!("Failed to load {}: {}", pending.url, error);
                self.events.send(SceneEvent::LoadError {
                    url: pending.url.clone(),
                    error,
                });
                let change = SourceChange::Failed(pending.url);
                self.with_capabilities(|capability, scene| capability.on_source_change(scene, &change));
            }
        }
        true
    }

    fn install_content(&mut self, url: AssetId, content: RetainedContent) {
        self.playback.stop();
        self.framing = Framing::compute(&content, self.config.framed_fov_deg);
        self.content = Some(content);
        self.url = Some(url.clone());

        self.goal_target = self.framing.center;
        self.jump_to_target();
        self.frame_content(true);
        self.dirty = true;

        log::info!(
            "Displaying {} (radius {:.3}, ideal aspect {:.3})",
            url,
            self.framing.radius,
            self.framing.ideal_aspect
        );
        self.events.send(SceneEvent::ModelLoad { url: url.clone() });
        let change = SourceChange::Loaded(url);
        self.with_capabilities(|capability, scene| capability.on_source_change(scene, &change));
    }

    fn clear_content(&mut self) {
        let had_content = self.content.take().is_some();
        self.url = None;
        self.playback.stop();
        self.framing = Framing::empty(self.config.framed_fov_deg);
        self.goal_target = Vec3::zeros();
        self.jump_to_target();
        self.frame_content(true);
        self.dirty = true;

        if had_content {
            log::info!("Content cleared");
        }
        self.with_capabilities(|capability, scene| {
            capability.on_source_change(scene, &SourceChange::Cleared)
        });
    }

    /// Derive the control bounds from the framing; `reset_orbit` also moves
    /// the camera to the default framed orbit
    fn frame_content(&mut self, reset_orbit: bool) {
        let ideal_distance = self.framing.ideal_camera_distance();
        let mut options = self.base_controls.clone();
        if !options.max_radius.is_finite() {
            options.max_radius = (2.0 * ideal_distance).max(options.min_radius);
        }
        options.max_fov = self.framing.adjusted_fov(self.base_controls.max_fov, self.aspect());
        self.controls.apply_options(options);

        if reset_orbit {
            self.controls.set_orbit(
                0.0,
                utils::deg_to_rad(DEFAULT_PHI_DEG),
                DEFAULT_RADIUS_FACTOR * ideal_distance,
            );
        }
        let fov = self.controls.options().max_fov;
        self.controls.set_field_of_view(fov);
        if reset_orbit {
            if let Some(change) = self.controls.jump_to_goal() {
                self.on_camera_change(change);
            }
            self.camera.update_near_far(0.0, 2.0 * self.framing.far_radius());
        }
    }

    // ---- Animation ----

    /// Animation playback state
    pub fn animation(&self) -> &AnimationPlayback {
        &self.playback
    }

    /// Animation playback state, mutably
    pub fn animation_mut(&mut self) -> &mut AnimationPlayback {
        &mut self.playback
    }

    /// Play a clip of the displayed content; returns false without content
    /// or animations
    pub fn play_animation(&mut self, name: Option<&str>, loop_mode: LoopMode) -> bool {
        match self.content.as_deref() {
            Some(content) => self.playback.play(content, name, loop_mode),
            None => false,
        }
    }

    // ---- Render state ----

    /// Host visibility
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Host visibility signal (is the Scene in the viewport)
    pub fn set_visible(&mut self, visible: bool) {
        if visible != self.visible {
            log::debug!("Scene visibility -> {}", visible);
            self.visible = visible;
            if visible {
                self.dirty = true;
            }
        }
    }

    /// Whether the Scene needs a new render
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Request a render on the next frame
    pub fn queue_render(&mut self) {
        self.dirty = true;
    }

    /// Whether rendering is suspended
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Suspend or resume rendering; ticking continues
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Whether the scheduler should render this Scene now
    pub fn should_render(&self) -> bool {
        self.visible && self.dirty && !self.paused
    }

    /// Record a completed render pass
    pub fn mark_rendered(&mut self) {
        self.dirty = false;
        self.render_count += 1;
    }

    /// Number of completed render passes
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    /// Contact shadow strength
    pub fn shadow_intensity(&self) -> f32 {
        self.shadow_intensity
    }

    /// Set contact shadow strength
    pub fn set_shadow_intensity(&mut self, intensity: f32) {
        let intensity = intensity.max(0.0);
        if intensity != self.shadow_intensity {
            self.shadow_intensity = intensity;
            self.dirty = true;
        }
    }

    /// Tone mapping exposure
    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    /// Set tone mapping exposure
    pub fn set_exposure(&mut self, exposure: f32) {
        let exposure = exposure.max(0.0);
        if exposure != self.exposure {
            self.exposure = exposure;
            self.dirty = true;
        }
    }

    /// The Scene's own pixels
    pub fn output(&self) -> &OutputSurface {
        &self.output
    }

    /// The Scene's own pixels, mutably
    pub fn output_mut(&mut self) -> &mut OutputSurface {
        &mut self.output
    }

    /// What the renderer draws for this Scene through its own camera
    pub fn frame_description(&self) -> FrameDescription<'_> {
        self.frame_description_with(self.camera.view_projection_matrix())
    }

    /// What the renderer draws for this Scene through a foreign view, e.g.
    /// one eye of an AR frame
    pub fn frame_description_with(&self, view_projection: Mat4) -> FrameDescription<'_> {
        FrameDescription {
            viewport: self.physical_size(),
            view_projection,
            model: self.model_matrix(),
            exposure: self.exposure,
            shadow_intensity: self.shadow_intensity,
            content: self.content.as_deref(),
        }
    }

    // ---- Events ----

    /// Pending notifications
    pub fn events(&self) -> &EventQueue<SceneEvent> {
        &self.events
    }

    /// Pending notifications, mutably
    pub fn events_mut(&mut self) -> &mut EventQueue<SceneEvent> {
        &mut self.events
    }

    /// Take all pending notifications
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        self.events.drain()
    }

    // ---- Capabilities ----

    /// Attach a capability and run its `on_attach` hook
    pub fn add_capability(&mut self, mut capability: Box<dyn Capability>) {
        log::debug!("Attaching capability '{}'", capability.name());
        capability.on_attach(self);
        self.capabilities.push(capability);
    }

    /// Find an attached capability by type
    pub fn capability<T: Capability + 'static>(&self) -> Option<&T> {
        self.capabilities
            .iter()
            .find_map(|capability| capability.as_any().downcast_ref::<T>())
    }

    /// Find an attached capability by type, mutably
    pub fn capability_mut<T: Capability + 'static>(&mut self) -> Option<&mut T> {
        self.capabilities
            .iter_mut()
            .find_map(|capability| capability.as_any_mut().downcast_mut::<T>())
    }

    /// Run `hook` on every capability with the Scene borrowed mutably
    fn with_capabilities(&mut self, mut hook: impl FnMut(&mut dyn Capability, &mut ModelScene)) {
        let mut capabilities = std::mem::take(&mut self.capabilities);
        for capability in capabilities.iter_mut() {
            hook(capability.as_mut(), self);
        }
        // Capabilities attached from inside a hook landed in the empty list
        capabilities.append(&mut self.capabilities);
        self.capabilities = capabilities;
    }

    // ---- Frame ----

    /// Advance the Scene by one frame
    ///
    /// Order: pending load, controls, target, animation, capabilities.
    pub fn tick(&mut self, time: Millis, delta: Millis) {
        self.poll_source();

        if let Some(change) = self.controls.update(time, delta) {
            self.on_camera_change(change);
        }

        self.update_target(delta);

        if self.playback.is_playing() {
            if let Some(content) = self.content.as_deref_mut() {
                if self.playback.update((delta / 1000.0) as f32, content) {
                    self.dirty = true;
                }
            }
        }

        self.with_capabilities(|capability, scene| capability.on_tick(scene, time, delta));
    }

    fn on_camera_change(&mut self, change: ChangeEvent) {
        self.controls.write_camera(&mut self.camera);
        self.events.send(SceneEvent::Change {
            source: change.source,
        });
        self.dirty = true;
    }

    fn update_target(&mut self, delta: Millis) {
        if self.target == self.goal_target {
            return;
        }
        let normalization = self.framing.radius / 10.0;
        for axis in 0..3 {
            self.target[axis] = self.target_dampers[axis].update(
                self.target[axis],
                self.goal_target[axis],
                delta,
                normalization,
            );
        }
        self.dirty = true;
    }

    // ---- AR hand-off ----

    /// Capture the state an AR session changes
    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            anchor: self.anchor,
            visible: self.visible,
            position: self.position,
            yaw: self.yaw,
            scale: self.scale,
            target: self.goal_target,
            shadow_intensity: self.shadow_intensity,
            orbit: self.controls.goal(),
            field_of_view: self.controls.goal_field_of_view(),
        }
    }

    /// Put back a snapshot taken by [`snapshot`](Self::snapshot)
    pub fn restore(&mut self, snapshot: &SceneSnapshot) {
        self.set_anchor(snapshot.anchor);
        self.set_visible(snapshot.visible);
        self.set_position(snapshot.position);
        self.set_yaw(snapshot.yaw);
        self.set_scale(snapshot.scale);
        self.set_shadow_intensity(snapshot.shadow_intensity);
        self.set_target(snapshot.target);
        self.jump_to_target();

        let orbit = snapshot.orbit;
        self.controls.set_orbit(orbit.theta, orbit.phi, orbit.radius);
        self.controls.set_field_of_view(snapshot.field_of_view);
        if let Some(change) = self.controls.jump_to_goal() {
            self.on_camera_change(change);
        }
        self.camera.set_aspect_ratio(self.aspect());
        self.dirty = true;
    }

    /// Tear the Scene down, keeping its cache entry alive until
    /// `now + grace_ms`
    pub fn teardown(mut self, now: Millis, grace_ms: Millis) {
        self.pending = None;
        if let Some(content) = self.content.take() {
            log::debug!("Releasing {} after {} ms", content.id(), grace_ms);
            content.release_deferred(now + grace_ms);
        }
    }
}

impl fmt::Debug for ModelScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelScene")
            .field("size", &(self.width, self.height))
            .field("url", &self.url)
            .field("pending", &self.pending_url())
            .field("anchor", &self.anchor)
            .field("visible", &self.visible)
            .field("dirty", &self.dirty)
            .field("paused", &self.paused)
            .field("capabilities", &self.capabilities.len())
            .finish()
    }
}
