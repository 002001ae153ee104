//! # Stage Engine
//!
//! Runtime engine beneath a real-time 3D model viewer.
//!
//! ## Features
//!
//! - **Asset Cache**: coalesced loads, threshold eviction, independent clones
//! - **Frame Scheduler**: many Scenes on one shared GPU context, dirty-only rendering
//! - **Damped Controls**: frame-rate independent orbit camera
//! - **AR Presentation**: hit-tested placement with guaranteed Scene restoration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stage_engine::prelude::*;
//! use std::rc::Rc;
//!
//! fn main() -> Result<(), EngineError> {
//!     let fetcher = Rc::new(MemoryFetcher::new());
//!     let context = Box::new(HeadlessContext::new(1, 1));
//!     let mut engine = Engine::new(EngineConfig::default(), context, fetcher, None)?;
//!
//!     let scene = engine.create_scene(640, 480);
//!     engine.set_source(scene, Some("astronaut.glb"))?;
//!     for frame in 0..60 {
//!         engine.frame(f64::from(frame) * 16.0);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod controls;
pub mod events;
pub mod foundation;
pub mod render;
pub mod scene;
pub mod xr;

mod engine;

pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::{AssetCache, AssetFetcher, AssetId, LoadError, MemoryFetcher, SceneGraphContent},
        config::{Config, EngineConfig},
        controls::{ChangeSource, InputEvent, SmoothControls},
        events::{ArEvent, RendererEvent, SceneEvent},
        foundation::{
            collections::SceneId,
            math::{Mat4, Spherical, Transform, Vec3},
            time::Millis,
        },
        render::{GpuContext, HeadlessContext, Renderer},
        scene::{ContentAnchor, ModelScene},
        xr::{ArPhase, ArSession, ArStatus, XrFrame, XrPlatform},
        Engine, EngineError,
    };
}

#[cfg(test)]
mod tests;
