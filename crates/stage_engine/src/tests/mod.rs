//! Cross-module tests driving the public engine surface

pub(crate) mod support;

use crate::assets::{AssetFetcher, LoadError};
use crate::config::EngineConfig;
use crate::controls::{ChangeSource, InputEvent, PointerKind};
use crate::events::{ArEvent, SceneEvent};
use crate::foundation::math::{Vec3, Vec4};
use crate::render::{HeadlessContext, Rgba8};
use crate::scene::{ContentAnchor, LoadingCapability};
use crate::xr::{ArPhase, ArStatus, SessionEvent, XrPlatform};
use crate::Engine;
use approx::assert_relative_eq;
use std::rc::Rc;
use support::{cube_content, ManualFetcher, MockFrame, MockXr};

fn engine_with(fetcher: &Rc<ManualFetcher>, xr: Option<&Rc<MockXr>>) -> Engine {
    let fetcher: Rc<dyn AssetFetcher> = fetcher.clone();
    let xr = xr.map(|platform| -> Rc<dyn XrPlatform> { platform.clone() });
    Engine::new(EngineConfig::default(), Box::new(HeadlessContext::new(1, 1)), fetcher, xr).unwrap()
}

#[test]
fn test_two_scenes_share_one_fetch() {
    let fetcher = ManualFetcher::new();
    let mut engine = engine_with(&fetcher, None);
    let first = engine.create_scene(32, 32);
    let second = engine.create_scene(32, 32);

    engine.set_source(first, Some("a.glb")).unwrap();
    engine.set_source(second, Some("a.glb")).unwrap();
    assert_eq!(fetcher.fetch_count(), 1);

    assert!(fetcher.resolve("a.glb", Ok(cube_content("a"))));
    engine.frame(0.0);

    for id in [first, second] {
        let scene = engine.scene_mut(id).unwrap();
        assert!(scene.has_content());
        assert!(scene
            .drain_events()
            .iter()
            .any(|event| matches!(event, SceneEvent::ModelLoad { url } if url.as_str() == "a.glb")));
    }
    assert_eq!(engine.cache().retainer_count(&"a.glb".into()), 2);

    // Clone edits never leak into the other Scene
    let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
    let material = engine
        .scene_mut(first)
        .and_then(|scene| scene.content_mut())
        .and_then(|content| content.material_mut(0))
        .unwrap();
    material.base_color = red;
    let other = engine.scene(second).unwrap().content().unwrap();
    assert_ne!(other.materials()[0].base_color, red);
}

#[test]
fn test_superseded_source_has_no_effect() {
    let fetcher = ManualFetcher::new();
    let mut engine = engine_with(&fetcher, None);
    let id = engine.create_scene(32, 32);

    engine.set_source(id, Some("a.glb")).unwrap();
    engine.set_source(id, Some("b.glb")).unwrap();
    assert!(fetcher.resolve("b.glb", Ok(cube_content("b"))));
    engine.frame(0.0);
    assert!(fetcher.resolve("a.glb", Ok(cube_content("a"))));
    engine.frame(16.0);

    let scene = engine.scene(id).unwrap();
    assert_eq!(scene.url().map(|url| url.as_str()), Some("b.glb"));
    assert!(scene.content().unwrap().find_node("b").is_some());
}

#[test]
fn test_failed_load_is_retried() {
    let fetcher = ManualFetcher::new();
    let mut engine = engine_with(&fetcher, None);
    let id = engine.create_scene(32, 32);

    engine.set_source(id, Some("a.glb")).unwrap();
    assert!(fetcher.resolve("a.glb", Err(LoadError::NotFound("a.glb".into()))));
    engine.frame(0.0);
    assert!(!engine.cache().contains(&"a.glb".into()));
    assert!(engine
        .scene_mut(id)
        .unwrap()
        .drain_events()
        .iter()
        .any(|event| matches!(event, SceneEvent::LoadError { .. })));

    engine.set_source(id, None).unwrap();
    engine.set_source(id, Some("a.glb")).unwrap();
    assert_eq!(fetcher.fetch_count(), 2);
}

#[test]
fn test_removed_scene_keeps_entry_for_grace_period() {
    let fetcher = ManualFetcher::new();
    let mut engine = engine_with(&fetcher, None);
    let grace = engine.config().cache.release_grace_ms;
    let id = engine.create_scene(32, 32);
    engine.set_source(id, Some("a.glb")).unwrap();
    assert!(fetcher.resolve("a.glb", Ok(cube_content("a"))));
    engine.frame(0.0);

    engine.remove_scene(id, 100.0).unwrap();
    engine.frame(100.0 + grace / 2.0);
    assert_eq!(engine.cache().pending_releases(), 1);

    let again = engine.create_scene(32, 32);
    engine.set_source(again, Some("a.glb")).unwrap();
    assert!(engine.scene(again).unwrap().has_content());
    assert_eq!(fetcher.fetch_count(), 1);

    engine.frame(100.0 + grace + 1.0);
    assert_eq!(engine.cache().pending_releases(), 0);
    assert_eq!(engine.cache().retainer_count(&"a.glb".into()), 1);
}

#[test]
fn test_loaded_scene_renders_and_reveals() {
    let fetcher = ManualFetcher::new();
    let mut engine = engine_with(&fetcher, None);
    let id = engine.create_scene(16, 16);
    engine.set_source(id, Some("a.glb")).unwrap();
    assert!(fetcher.resolve("a.glb", Ok(cube_content("a"))));

    engine.frame(0.0);
    engine.frame(16.0);
    let scene = engine.scene(id).unwrap();
    assert_eq!(scene.render_count(), 1);
    assert!(scene.output().pixels().iter().any(|pixel| *pixel != Rgba8::TRANSPARENT));
    assert!(!scene.capability::<LoadingCapability>().unwrap().poster_visible());
}

#[test]
fn test_drag_moves_camera_with_user_source() {
    let fetcher = ManualFetcher::new();
    let mut engine = engine_with(&fetcher, None);
    let id = engine.create_scene(100, 100);
    engine.frame(0.0);
    engine.scene_mut(id).unwrap().drain_events();

    let down = InputEvent::PointerDown {
        id: 1,
        kind: PointerKind::Mouse,
        x: 50.0,
        y: 50.0,
    };
    let moved = InputEvent::PointerMove { id: 1, x: 70.0, y: 50.0 };
    assert!(engine.handle_input(id, &down).unwrap());
    assert!(engine.handle_input(id, &moved).unwrap());
    engine.frame(16.0);

    let events = engine.scene_mut(id).unwrap().drain_events();
    assert!(events.contains(&SceneEvent::Change {
        source: ChangeSource::UserInteraction
    }));
}

#[test]
fn test_ar_round_trip_restores_scene() {
    let fetcher = ManualFetcher::new();
    let platform = MockXr::new(true);
    let mut engine = engine_with(&fetcher, Some(&platform));
    let id = engine.create_scene(64, 64);
    engine.set_source(id, Some("a.glb")).unwrap();
    assert!(fetcher.resolve("a.glb", Ok(cube_content("a"))));
    engine.frame(0.0);
    let before = engine.scene(id).unwrap().snapshot();

    engine.activate_ar(id).unwrap();
    assert_eq!(engine.ar().phase(), ArPhase::Presenting);
    let rendered = engine.scene(id).unwrap().render_count();
    engine.scene_mut(id).unwrap().queue_render();
    engine.frame(16.0);
    assert_eq!(engine.scene(id).unwrap().render_count(), rendered);

    let frame = MockFrame::looking_forward(Some(Vec3::new(0.5, 0.0, -1.5)));
    engine.xr_frame(16.0, &frame);
    platform.push_event(SessionEvent::Select);
    engine.xr_frame(32.0, &frame);
    for step in 0..200 {
        engine.xr_frame(48.0 + f64::from(step) * 16.0, &frame);
    }
    let placed = engine.scene(id).unwrap();
    assert_eq!(placed.anchor(), ContentAnchor::Dolly);
    assert_eq!(placed.position(), Vec3::new(0.5, 0.0, -1.5));

    let mut stop = engine.stop_ar();
    engine.frame(4000.0);
    assert!(stop.is_resolved());
    assert_eq!(engine.ar().phase(), ArPhase::Inactive);
    let after = engine.scene(id).unwrap().snapshot();
    assert_eq!(after.anchor, before.anchor);
    assert_eq!(after.position, before.position);
    assert_eq!(after.target, before.target);
    assert_eq!(after.orbit, before.orbit);
    assert_relative_eq!(after.yaw, before.yaw);
    assert_relative_eq!(after.scale, before.scale);
    assert_relative_eq!(after.shadow_intensity, before.shadow_intensity);
    assert_relative_eq!(after.field_of_view, before.field_of_view, max_relative = 1e-5);

    let events = engine.ar_mut().drain_events();
    assert_eq!(
        events,
        vec![
            ArEvent::Status(ArStatus::SessionStarted),
            ArEvent::Status(ArStatus::ObjectPlaced),
            ArEvent::Status(ArStatus::NotPresenting),
            ArEvent::End,
        ]
    );
}

#[test]
fn test_removing_presented_scene_ends_session() {
    let fetcher = ManualFetcher::new();
    let platform = MockXr::new(true);
    let mut engine = engine_with(&fetcher, Some(&platform));
    let id = engine.create_scene(64, 64);
    engine.activate_ar(id).unwrap();

    engine.remove_scene(id, 0.0).unwrap();
    engine.frame(16.0);
    assert_eq!(engine.ar().phase(), ArPhase::Inactive);
    assert_eq!(engine.ar().cleanup_count(), 1);
    assert_eq!(engine.renderer().presenting(), None);
}
