//! Core engine implementation
//!
//! The engine is the single place the shared services are built: one asset
//! cache, one renderer owning the GPU context, and one AR session. Hosts
//! drive it with one [`Engine::frame`] call per display frame and, while AR
//! is presenting, one [`Engine::xr_frame`] call per platform frame.

use crate::assets::{AssetCache, AssetFetcher, AssetId};
use crate::config::{ConfigError, EngineConfig};
use crate::controls::InputEvent;
use crate::foundation::collections::SceneId;
use crate::foundation::time::Millis;
use crate::render::{GpuContext, RenderError, Renderer};
use crate::scene::{LoadingCapability, ModelScene, StagingCapability};
use crate::xr::{ArError, ArSession, StopRequest, XrFrame, XrPlatform};
use std::rc::Rc;
use thiserror::Error;

/// Main engine struct
///
/// Coordinates the cache, the renderer and the AR session.
pub struct Engine {
    config: EngineConfig,
    cache: AssetCache,
    renderer: Renderer,
    ar: ArSession,
    last_frame: Option<Millis>,
}

impl Engine {
    /// Create a new engine instance
    ///
    /// `xr` is `None` on hosts without an AR platform; AR activation then
    /// fails with an unsupported-capability error.
    pub fn new(
        config: EngineConfig,
        context: Box<dyn GpuContext>,
        fetcher: Rc<dyn AssetFetcher>,
        xr: Option<Rc<dyn XrPlatform>>,
    ) -> Result<Self, EngineError> {
        validate(&config)?;
        log::info!("Initializing engine with {} GPU context...", context.name());

        let cache = AssetCache::with_config(fetcher, &config.cache);
        let renderer = Renderer::new(context, &config.renderer);
        let ar = ArSession::new(xr, &config.xr);

        Ok(Self {
            config,
            cache,
            renderer,
            ar,
            last_frame: None,
        })
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- Scenes ----

    /// Create a Scene with the stock capabilities and register it
    pub fn create_scene(&mut self, width: u32, height: u32) -> SceneId {
        let mut scene = ModelScene::with_config(width, height, &self.config.scene, &self.config.controls);
        scene.add_capability(Box::new(LoadingCapability::new(self.config.scene.reveal)));
        scene.add_capability(Box::new(StagingCapability::new(&self.config.scene)));
        let id = self.renderer.register_scene(scene);
        log::info!("Created scene {:?} ({}x{})", id, width, height);
        id
    }

    /// Change what a Scene displays; `None` clears it
    pub fn set_source(&mut self, id: SceneId, url: Option<&str>) -> Result<(), EngineError> {
        let scene = self.renderer.scene_mut(id).ok_or(EngineError::UnknownScene)?;
        scene.set_source(&self.cache, url.map(AssetId::new));
        Ok(())
    }

    /// Forward raw input to a Scene's controls; returns whether it was used
    pub fn handle_input(&mut self, id: SceneId, event: &InputEvent) -> Result<bool, EngineError> {
        let scene = self.renderer.scene_mut(id).ok_or(EngineError::UnknownScene)?;
        Ok(scene.handle_input(event))
    }

    /// Tear a Scene down
    ///
    /// Its cache entry stays alive for the configured grace period so a
    /// Scene recreated with the same source finds it ready.
    pub fn remove_scene(&mut self, id: SceneId, time: Millis) -> Result<(), EngineError> {
        if self.ar.presented_scene() == Some(id) {
            // Cleanup tolerates the Scene being gone, so the next frame's
            // poll finishes the stop without anyone awaiting it.
            let mut stop = self.ar.stop_presenting(&mut self.renderer);
            log::debug!(
                "Stopping AR for removed scene {:?} (already stopped: {})",
                id,
                stop.is_resolved()
            );
        }
        let scene = self.renderer.unregister_scene(id).ok_or(EngineError::UnknownScene)?;
        scene.teardown(time, self.config.cache.release_grace_ms);
        log::info!("Removed scene {:?}", id);
        Ok(())
    }

    /// A registered Scene
    pub fn scene(&self, id: SceneId) -> Option<&ModelScene> {
        self.renderer.scene(id)
    }

    /// A registered Scene, mutably
    pub fn scene_mut(&mut self, id: SceneId) -> Option<&mut ModelScene> {
        self.renderer.scene_mut(id)
    }

    // ---- Frame loop ----

    /// Advance one display frame
    pub fn frame(&mut self, time: Millis) {
        self.last_frame = Some(time);
        self.renderer.tick(time);
        self.ar.poll(&mut self.renderer);
        let released = self.cache.process_deferred_releases(time);
        if released > 0 {
            log::trace!("Released {} deferred cache references", released);
        }
    }

    /// Timestamp of the last display frame
    pub fn last_frame(&self) -> Option<Millis> {
        self.last_frame
    }

    /// Platform AR frame callback
    pub fn xr_frame(&mut self, time: Millis, frame: &dyn XrFrame) {
        self.ar.on_frame(time, frame, &mut self.renderer);
    }

    // ---- AR ----

    /// Present a Scene in AR
    pub fn activate_ar(&mut self, id: SceneId) -> Result<(), EngineError> {
        self.ar.present(&mut self.renderer, id)?;
        Ok(())
    }

    /// Place AR content at the current hit
    pub fn place_ar(&mut self) -> Result<(), EngineError> {
        self.ar.place()?;
        Ok(())
    }

    /// End AR presentation
    pub fn stop_ar(&mut self) -> StopRequest {
        self.ar.stop_presenting(&mut self.renderer)
    }

    // ---- Services ----

    /// The asset cache
    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// The renderer
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// The renderer, mutably
    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// The AR session
    pub fn ar(&self) -> &ArSession {
        &self.ar
    }

    /// The AR session, mutably
    pub fn ar_mut(&mut self) -> &mut ArSession {
        &mut self.ar
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("renderer", &self.renderer)
            .field("ar", &self.ar)
            .field("cached_assets", &self.cache.len())
            .field("last_frame", &self.last_frame)
            .finish()
    }
}

fn validate(config: &EngineConfig) -> Result<(), EngineError> {
    let pixel_ratio = config.renderer.pixel_ratio;
    if !(pixel_ratio.is_finite() && pixel_ratio > 0.0) {
        return Err(EngineError::InvalidConfig(format!(
            "pixel_ratio must be positive, got {pixel_ratio}"
        )));
    }

    let controls = &config.controls;
    let bounds = [
        ("theta", controls.min_theta, controls.max_theta),
        ("phi", controls.min_phi, controls.max_phi),
        ("radius", controls.min_radius, controls.max_radius),
        ("fov", controls.min_fov, controls.max_fov),
    ];
    for (name, min, max) in bounds {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(EngineError::InvalidConfig(format!(
                "{name} bounds are inverted or NaN: [{min}, {max}]"
            )));
        }
    }
    Ok(())
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// The Scene id is not registered
    #[error("Unknown scene")]
    UnknownScene,

    /// Configuration values that cannot work
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// AR session error
    #[error(transparent)]
    Ar(#[from] ArError),

    /// Rendering error
    #[error(transparent)]
    Render(#[from] RenderError),
}
