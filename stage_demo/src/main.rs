//! Headless stage demo
//!
//! Drives the engine for a few seconds of simulated frames: two Scenes share
//! one procedurally generated box, a third shows a different one, the first
//! is dragged around and the last is torn down mid-run. Pass a `.toml` or
//! `.ron` engine config as the first argument to override the defaults.

use futures::future::{self, FutureExt, LocalBoxFuture};
use stage_engine::assets::{AssetFetcher, AssetId, Geometry, LoadError, Material, SceneGraphContent};
use stage_engine::config::{Config, ConfigError, EngineConfig};
use stage_engine::controls::{InputEvent, PointerKind};
use stage_engine::events::SceneEvent;
use stage_engine::foundation::logging;
use stage_engine::foundation::math::{Transform, Vec3, Vec4};
use stage_engine::render::{HeadlessContext, Rgba8};
use stage_engine::{Engine, EngineError};
use std::rc::Rc;
use thiserror::Error;

const FRAME_MS: f64 = 1000.0 / 60.0;
const FRAMES: u32 = 180;

#[derive(Debug, Error)]
enum DemoError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Builds boxes from identifiers like `box:2x1x1.glb`
struct ProceduralFetcher;

impl ProceduralFetcher {
    fn parse_size(id: &AssetId) -> Option<Vec3> {
        let dims = id.as_str().strip_prefix("box:")?.trim_end_matches(".glb");
        let mut extents = dims.split('x').map(str::parse::<f32>);
        let size = Vec3::new(
            extents.next()?.ok()?,
            extents.next()?.ok()?,
            extents.next()?.ok()?,
        );
        (extents.next().is_none() && size.iter().all(|extent| *extent > 0.0)).then_some(size)
    }

    fn build(id: &AssetId, size: Vec3) -> SceneGraphContent {
        let half = size * 0.5;
        let positions = [-1.0f32, 1.0]
            .iter()
            .flat_map(|&x| [-1.0f32, 1.0].map(move |y| (x, y)))
            .flat_map(|(x, y)| [-1.0f32, 1.0].map(move |z| Vec3::new(x * half.x, y * half.y, z * half.z)))
            .collect();
        let indices = vec![0, 1, 3, 0, 3, 2, 4, 6, 7, 4, 7, 5, 0, 4, 5, 0, 5, 1, 2, 3, 7, 2, 7, 6];

        let hue = (size.x / (size.x + size.y + size.z)).clamp(0.0, 1.0);
        let mut content = SceneGraphContent::new();
        let root = content.add_node(id.as_str(), Transform::identity(), None);
        let material = content
            .add_material(Material::new("box").with_base_color(Vec4::new(hue, 0.6, 1.0 - hue, 1.0)));
        let mesh = content.add_mesh(Rc::new(Geometry::new(positions, indices)), material);
        content.attach_mesh(root, mesh);
        content
    }
}

impl AssetFetcher for ProceduralFetcher {
    fn fetch(&self, id: &AssetId) -> LocalBoxFuture<'static, Result<SceneGraphContent, LoadError>> {
        let result = match Self::parse_size(id) {
            Some(size) => Ok(Self::build(id, size)),
            None => Err(LoadError::NotFound(id.clone())),
        };
        future::ready(result).boxed_local()
    }
}

fn load_config() -> Result<EngineConfig, DemoError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading engine config from {}", path);
            Ok(EngineConfig::load_from_file(&path)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn report_events(engine: &mut Engine, ids: &[stage_engine::foundation::collections::SceneId]) {
    for &id in ids {
        let Some(scene) = engine.scene_mut(id) else {
            continue;
        };
        for event in scene.drain_events() {
            match event {
                SceneEvent::ModelLoad { url } => log::info!("Scene {:?} loaded {}", id, url),
                SceneEvent::LoadError { url, error } => log::warn!("Scene {:?} failed {}: {}", id, url, error),
                SceneEvent::PosterVisibility { visible } => {
                    log::info!("Scene {:?} poster {}", id, if visible { "shown" } else { "hidden" })
                }
                SceneEvent::Change { source } => log::trace!("Scene {:?} camera moved ({:?})", id, source),
            }
        }
    }
    for event in engine.renderer_mut().drain_events() {
        log::warn!("Renderer: {:?}", event);
    }
}

fn run() -> Result<(), DemoError> {
    let config = load_config()?;
    logging::init_with_filter(&config.log_level);
    log::info!("Starting stage demo");

    let mut engine = Engine::new(
        config,
        Box::new(HeadlessContext::new(1, 1)),
        Rc::new(ProceduralFetcher),
        None,
    )?;

    let left = engine.create_scene(320, 240);
    let right = engine.create_scene(320, 240);
    let tall = engine.create_scene(200, 400);
    engine.set_source(left, Some("box:1x1x1.glb"))?;
    engine.set_source(right, Some("box:1x1x1.glb"))?;
    engine.set_source(tall, Some("box:1x3x1.glb"))?;
    let ids = [left, right, tall];

    if let Err(error) = engine.activate_ar(left) {
        log::info!("AR unavailable: {}", error);
    }

    engine.handle_input(
        left,
        &InputEvent::PointerDown {
            id: 1,
            x: 160.0,
            y: 120.0,
            kind: PointerKind::Mouse,
        },
    )?;

    for frame in 0..FRAMES {
        let time = f64::from(frame) * FRAME_MS;
        if frame < 30 {
            let x = 160.0 + frame as f32 * 4.0;
            engine.handle_input(left, &InputEvent::PointerMove { id: 1, x, y: 120.0 })?;
        } else if frame == 30 {
            engine.handle_input(left, &InputEvent::PointerUp { id: 1 })?;
        }
        if frame == 120 {
            engine.remove_scene(tall, time)?;
        }

        engine.frame(time);
        report_events(&mut engine, &ids);
    }

    for id in [left, right] {
        if let Some(scene) = engine.scene(id) {
            let covered = scene
                .output()
                .pixels()
                .iter()
                .filter(|pixel| **pixel != Rgba8::TRANSPARENT)
                .count();
            log::info!(
                "Scene {:?}: {} renders, {} lit pixels, orbit {:?}",
                id,
                scene.render_count(),
                covered,
                scene.controls().spherical()
            );
        }
    }
    log::info!(
        "Renderer ran {} frames; cache holds {} assets",
        engine.renderer().frame_count(),
        engine.cache().len()
    );
    Ok(())
}

fn main() {
    if let Err(error) = run() {
        log::error!("Demo failed: {}", error);
        eprintln!("stage_demo: {error}");
        std::process::exit(1);
    }
}
