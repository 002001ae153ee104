//! Dolly placement
//!
//! Moves the presented content toward real-world hits. Until the first
//! placement the content floats at the ideal framing distance in front of
//! the camera; once placed it damps toward the dolly goal, slowly at first
//! (intro rate) and at full speed once it has landed.
//!
//! Placed content follows touch gestures, one at a time:
//! - one finger on the content's footprint drags it along the surface
//! - one finger beside it twists it (floor placement only)
//! - two fingers pinch-scale it, snapping back to 1 near the original size

use super::platform::{HitTestRay, InputSourceId, TransientHitResult, XrView};
use crate::config::XrConfig;
use crate::controls::Damper;
use crate::foundation::math::constants::PI;
use crate::foundation::math::{utils, Mat4, Vec3};
use crate::foundation::time::Millis;
use crate::scene::{ContentAnchor, ModelScene};

/// Minimum up-component of a hit normal for floor placement
const FLOOR_NORMAL_THRESHOLD: f32 = 0.75;

/// Radians of yaw per unit of horizontal touch travel
pub const ROTATION_RATE: f32 = 1.5;

/// Pinch ratios strictly between these snap back to scale 1
const SCALE_SNAP_HIGH: f32 = 1.2;
const SCALE_SNAP_LOW: f32 = 1.0 / SCALE_SNAP_HIGH;

/// Smallest margin around the footprint that still counts as touching the content
const MIN_TOUCH_MARGIN: f32 = 0.105;

/// Share of the footprint's smaller half-extent added as touch margin
const TOUCH_MARGIN_FACTOR: f32 = 0.2;

/// Touch gesture acting on placed content
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Gesture {
    /// No touch is moving the content
    #[default]
    Idle,
    /// One finger drags the content
    Translating {
        /// Dragging touch
        input: InputSourceId,
        /// Drag-plane point of the previous frame
        last_hit: Vec3,
    },
    /// One finger twists the content
    Rotating {
        /// Twisting touch
        input: InputSourceId,
        /// Horizontal screen position of the previous frame
        last_x: f32,
    },
    /// Two fingers scale the content
    Scaling {
        /// Finger separation per unit of scale when the pinch started
        last_scalar: f32,
    },
}

fn finger_separation(touches: &[TransientHitResult]) -> f32 {
    match touches {
        [first, second, ..] => {
            let dx = second.axes[0] - first.axes[0];
            let dy = second.axes[1] - first.axes[1];
            (dx * dx + dy * dy).sqrt()
        }
        _ => 0.0,
    }
}

fn snap_scale(scale: f32) -> f32 {
    if scale < SCALE_SNAP_HIGH && scale > SCALE_SNAP_LOW {
        1.0
    } else {
        scale
    }
}

/// Screen-center hit-test ray, tilted `hit_angle_deg` toward the floor
///
/// Wall placement casts straight ahead.
pub fn hit_test_ray(hit_angle_deg: f32, place_on_wall: bool) -> HitTestRay {
    let angle = if place_on_wall { 0.0 } else { utils::deg_to_rad(hit_angle_deg) };
    HitTestRay {
        origin: Vec3::zeros(),
        direction: Vec3::new(0.0, -angle.sin(), -angle.cos()),
    }
}

/// Position of a hit whose surface suits the placement mode
///
/// Floors need a normal pointing up; walls need one that does not.
pub fn hit_point(pose: &Mat4, place_on_wall: bool) -> Option<Vec3> {
    let normal_up = pose.m22;
    if (normal_up > FLOOR_NORMAL_THRESHOLD) != place_on_wall {
        Some(Vec3::new(pose.m14, pose.m24, pose.m34))
    } else {
        None
    }
}

/// Content yaw that faces out of a wall hit
fn wall_yaw(pose: &Mat4) -> f32 {
    pose.m12.atan2(pose.m32)
}

/// Dolly state of one AR presentation
#[derive(Debug, Clone)]
pub struct Placement {
    place_on_wall: bool,
    allow_scale: bool,
    shadow_intensity: f32,
    damper_rate: f64,

    initialized: bool,
    placed: bool,
    landed: bool,
    latest_hit: Option<(Vec3, Option<f32>)>,

    gesture: Gesture,
    floor_offset: f32,

    goal_position: Vec3,
    goal_yaw: f32,
    goal_scale: f32,
    position_dampers: [Damper; 3],
    yaw_damper: Damper,
    scale_damper: Damper,
}

impl Placement {
    /// Start a fresh placement
    pub fn new(config: &XrConfig) -> Self {
        Self {
            place_on_wall: config.place_on_wall,
            allow_scale: config.allow_scale,
            shadow_intensity: config.shadow_intensity,
            damper_rate: config.intro_damper_rate,
            initialized: false,
            placed: false,
            landed: false,
            latest_hit: None,
            gesture: Gesture::Idle,
            floor_offset: 0.0,
            goal_position: Vec3::zeros(),
            goal_yaw: 0.0,
            goal_scale: 1.0,
            position_dampers: [Damper::default(), Damper::default(), Damper::default()],
            yaw_damper: Damper::default(),
            scale_damper: Damper::default(),
        }
    }

    /// Whether the first view has been seen
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether the content hangs under the dolly
    pub fn is_placed(&self) -> bool {
        self.placed
    }

    /// Whether the content has settled onto its first surface
    pub fn has_landed(&self) -> bool {
        self.landed
    }

    /// Where the dolly is heading
    pub fn goal_position(&self) -> Vec3 {
        self.goal_position
    }

    /// Yaw the content is turning toward
    pub fn goal_yaw(&self) -> f32 {
        self.goal_yaw
    }

    /// Scale the content is growing or shrinking toward
    pub fn goal_scale(&self) -> f32 {
        self.goal_scale
    }

    /// Gesture in progress
    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    /// Most recent usable hit
    pub fn latest_hit(&self) -> Option<Vec3> {
        self.latest_hit.map(|(point, _)| point)
    }

    /// Turn the content toward the camera on the first view
    ///
    /// Returns true on the call that initialized.
    pub fn initialize(&mut self, scene: &mut ModelScene, view: &XrView) -> bool {
        if self.initialized {
            return false;
        }
        let forward = view.forward();
        let yaw = (-forward.x).atan2(-forward.z);
        scene.set_yaw(yaw);
        self.goal_yaw = yaw;
        self.initialized = true;
        true
    }

    /// Keep unplaced content centered in front of the camera
    pub fn follow_view(&self, scene: &mut ModelScene, view: &XrView) {
        if self.placed {
            return;
        }
        let distance = scene.framing().ideal_camera_distance();
        scene.set_position(view.position() + view.forward() * distance);
    }

    /// Remember this frame's nearest hit; returns whether it was usable
    pub fn record_hit(&mut self, pose: &Mat4) -> bool {
        match hit_point(pose, self.place_on_wall) {
            Some(point) => {
                let yaw = self.place_on_wall.then(|| wall_yaw(pose));
                self.latest_hit = Some((point, yaw));
                true
            }
            None => false,
        }
    }

    /// Send the dolly to the latest hit
    ///
    /// The first call reparents the content under the dolly and moves the
    /// Scene target to the content's floor (or back, on walls). Returns
    /// `Some(true)` for that first placement, `Some(false)` for a move, and
    /// `None` while no surface has been found.
    pub fn place(&mut self, scene: &mut ModelScene) -> Option<bool> {
        let (point, yaw) = self.latest_hit?;
        self.goal_position = point;
        if let Some(yaw) = yaw {
            self.goal_yaw = yaw;
        }

        if self.placed {
            return Some(false);
        }
        self.placed = true;
        scene.set_anchor(ContentAnchor::Dolly);

        let bounds = scene.framing().bounding_box;
        if !bounds.is_empty() {
            let target = scene.goal_target();
            let anchor_point = if self.place_on_wall {
                Vec3::new(target.x, target.y, bounds.min.z)
            } else {
                Vec3::new(target.x, bounds.min.y, target.z)
            };
            scene.set_target(anchor_point);
            scene.jump_to_target();
        }
        Some(true)
    }

    /// Start a gesture for a touch that just went down
    ///
    /// `touches` are this frame's active touches. Ignored until the content
    /// has been placed.
    pub fn begin_gesture(&mut self, scene: &ModelScene, input: InputSourceId, touches: &[TransientHitResult]) {
        if !self.placed {
            return;
        }
        match touches.len() {
            1 => {
                let Some(touch) = touches.iter().find(|touch| touch.input == input) else {
                    return;
                };
                if let Some(hit) = self.footprint_hit(scene, touch) {
                    self.gesture = Gesture::Translating { input, last_hit: hit };
                } else if !self.place_on_wall {
                    self.gesture = Gesture::Rotating {
                        input,
                        last_x: touch.axes[0],
                    };
                }
            }
            2 if self.allow_scale => self.start_scaling(scene, touches),
            _ => {}
        }
        log::trace!("AR gesture started: {:?}", self.gesture);
    }

    /// Apply this frame's touches to the running gesture
    ///
    /// `camera` is the viewer position; it lets a drag onto a lower surface
    /// keep the content at its current height until release. Returns whether
    /// a goal changed.
    pub fn process_gesture(&mut self, scene: &ModelScene, touches: &[TransientHitResult], camera: Vec3) -> bool {
        match self.gesture {
            Gesture::Idle => false,
            Gesture::Scaling { last_scalar } => {
                if touches.len() < 2 {
                    self.gesture = Gesture::Idle;
                    return false;
                }
                let scale = finger_separation(touches) / last_scalar;
                if !scale.is_finite() || scale <= 0.0 {
                    return false;
                }
                self.goal_scale = snap_scale(scale);
                true
            }
            _ if touches.len() == 2 && self.allow_scale => {
                self.start_scaling(scene, touches);
                false
            }
            Gesture::Rotating { input, last_x } => {
                let Some(touch) = touches.iter().find(|touch| touch.input == input) else {
                    return false;
                };
                let x = touch.axes[0];
                self.goal_yaw += (x - last_x) * ROTATION_RATE;
                self.gesture = Gesture::Rotating { input, last_x: x };
                true
            }
            Gesture::Translating { input, last_hit } => {
                let Some(result) = touches
                    .iter()
                    .find(|touch| touch.input == input)
                    .and_then(|touch| touch.results.first())
                else {
                    return false;
                };
                let Some(mut hit) = hit_point(&result.pose, self.place_on_wall) else {
                    return false;
                };
                if self.place_on_wall {
                    self.goal_yaw = wall_yaw(&result.pose);
                } else {
                    let offset = hit.y - last_hit.y;
                    if offset < 0.0 && camera.y > hit.y {
                        // Lower surface: drop on release, slide along the current plane until then
                        self.floor_offset = offset;
                        let alpha = -offset / (camera.y - hit.y);
                        hit = hit * (1.0 - alpha) + camera * alpha;
                    }
                }
                self.goal_position += hit - last_hit;
                self.gesture = Gesture::Translating { input, last_hit: hit };
                true
            }
        }
    }

    /// Finish the gesture when a touch lifts
    ///
    /// Content dragged over a lower surface falls onto it. Returns whether
    /// the gesture was a drag.
    pub fn end_gesture(&mut self) -> bool {
        let dragged = matches!(self.gesture, Gesture::Translating { .. });
        self.gesture = Gesture::Idle;
        self.goal_position.y += self.floor_offset;
        self.floor_offset = 0.0;
        dragged
    }

    fn start_scaling(&mut self, scene: &ModelScene, touches: &[TransientHitResult]) {
        let separation = finger_separation(touches);
        if separation > 0.0 {
            self.gesture = Gesture::Scaling {
                last_scalar: separation / scene.scale(),
            };
        }
    }

    /// World point of a touch that lands on the content's footprint
    fn footprint_hit(&self, scene: &ModelScene, touch: &TransientHitResult) -> Option<Vec3> {
        let pose = &touch.results.first()?.pose;
        let bounds = scene.framing().bounding_box;
        if bounds.is_empty() {
            return None;
        }
        let point = Vec3::new(pose.m14, pose.m24, pose.m34);
        let local = scene.model_matrix().try_inverse()?.transform_point(&point.into()).coords;

        let center = bounds.center();
        let half = bounds.size() * 0.5;
        let (a, b) = if self.place_on_wall { (0, 1) } else { (0, 2) };
        let margin = (half[a].min(half[b]) * TOUCH_MARGIN_FACTOR).max(MIN_TOUCH_MARGIN);
        let inside = (local[a] - center[a]).abs() <= half[a] + margin && (local[b] - center[b]).abs() <= half[b] + margin;
        inside.then_some(point)
    }

    /// Damp the content toward the dolly goal; returns whether it moved
    pub fn update(&mut self, scene: &mut ModelScene, delta: Millis) -> bool {
        let mut moved = false;

        if self.placed && (scene.position() != self.goal_position || scene.scale() != self.goal_scale) {
            let delta = delta * self.damper_rate;
            let normalization = scene.framing().ideal_camera_distance();
            let position = scene.position();
            let goal = self.goal_position;
            let [x, y, z] = &mut self.position_dampers;
            scene.set_position(Vec3::new(
                x.update(position.x, goal.x, delta, normalization),
                y.update(position.y, goal.y, delta, normalization),
                z.update(position.z, goal.z, delta, normalization),
            ));
            let scale = self.scale_damper.update(scene.scale(), self.goal_scale, delta, 1.0);
            scene.set_scale(scale);
            moved = true;
        }

        let translating = matches!(self.gesture, Gesture::Translating { .. });
        if self.placed && !self.landed && !translating && scene.position().y == self.goal_position.y {
            log::debug!("AR content landed");
            self.landed = true;
            self.damper_rate = 1.0;
            scene.set_shadow_intensity(self.shadow_intensity);
        }

        let yaw = self.yaw_damper.update(scene.yaw(), self.goal_yaw, delta, PI);
        scene.set_yaw(yaw);
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetCache, AssetId, MemoryFetcher};
    use crate::foundation::math::Mat4Ext;
    use crate::tests::support::cube_content;
    use crate::xr::HitTestResult;
    use approx::assert_relative_eq;
    use std::rc::Rc;

    fn camera() -> Vec3 {
        Vec3::new(0.0, 1.5, 0.0)
    }

    /// Unit cube placed and landed at (0, -1, -2)
    fn placed_cube(config: &XrConfig) -> (ModelScene, Placement, AssetCache) {
        let cache = AssetCache::new(Rc::new(MemoryFetcher::new().with_content("cube.glb", cube_content("cube"))));
        let mut scene = ModelScene::new(100, 100);
        scene.set_source(&cache, Some(AssetId::new("cube.glb")));
        assert!(scene.has_content());

        let mut placement = Placement::new(config);
        assert!(placement.record_hit(&Mat4::new_translation(&Vec3::new(0.0, -1.0, -2.0))));
        assert_eq!(placement.place(&mut scene), Some(true));
        placement.update(&mut scene, 1.0e6);
        assert!(placement.has_landed());
        (scene, placement, cache)
    }

    fn touch(input: InputSourceId, axes: [f32; 2], hit: Option<Vec3>) -> TransientHitResult {
        TransientHitResult {
            input,
            axes,
            results: hit
                .iter()
                .map(|point| HitTestResult {
                    pose: Mat4::new_translation(point),
                })
                .collect(),
        }
    }

    #[test]
    fn test_hit_ray_tilts_toward_floor() {
        let ray = hit_test_ray(20.0, false);
        assert_relative_eq!(ray.direction.norm(), 1.0, epsilon = 1e-6);
        assert!(ray.direction.y < 0.0 && ray.direction.z < 0.0);
        assert_relative_eq!(hit_test_ray(20.0, true).direction, Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_hit_point_checks_surface_normal() {
        let floor = Mat4::new_translation(&Vec3::new(1.0, 0.0, -2.0));
        assert_eq!(hit_point(&floor, false), Some(Vec3::new(1.0, 0.0, -2.0)));
        assert_eq!(hit_point(&floor, true), None);

        let wall = Mat4::new_translation(&Vec3::new(0.0, 1.0, -3.0))
            * Mat4::from_axis_angle(&Vec3::x_axis(), PI / 2.0);
        assert_eq!(hit_point(&wall, false), None);
        assert!(hit_point(&wall, true).is_some());
    }

    #[test]
    fn test_place_requires_hit_then_lands() {
        let mut scene = ModelScene::new(100, 100);
        let mut placement = Placement::new(&XrConfig::default());
        assert_eq!(placement.place(&mut scene), None);
        assert!(!scene.is_presenting_ar());

        assert!(placement.record_hit(&Mat4::new_translation(&Vec3::new(0.0, -1.0, -2.0))));
        assert_eq!(placement.place(&mut scene), Some(true));
        assert_eq!(scene.anchor(), ContentAnchor::Dolly);
        assert_eq!(placement.place(&mut scene), Some(false));

        placement.update(&mut scene, 16.0);
        assert!(!placement.has_landed());
        placement.update(&mut scene, 1.0e6);
        assert_eq!(scene.position(), Vec3::new(0.0, -1.0, -2.0));
        assert!(placement.has_landed());
        assert_relative_eq!(scene.shadow_intensity(), XrConfig::default().shadow_intensity);
    }

    #[test]
    fn test_initialize_faces_camera_once() {
        let mut scene = ModelScene::new(100, 100);
        let mut placement = Placement::new(&XrConfig::default());
        let view = XrView {
            transform: Mat4::rotation_y(PI / 2.0),
            projection: Mat4::identity(),
        };
        assert!(placement.initialize(&mut scene, &view));
        assert!(!placement.initialize(&mut scene, &view));
        // Camera looks along -X, so the content turns to face +X
        assert_relative_eq!(scene.yaw(), PI / 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_drag_on_content_moves_goal() {
        let (scene, mut placement, _cache) = placed_cube(&XrConfig::default());
        let start = [touch(1, [0.0, 0.0], Some(Vec3::new(0.2, -1.0, -2.0)))];
        placement.begin_gesture(&scene, 1, &start);
        assert!(matches!(placement.gesture(), Gesture::Translating { input: 1, .. }));

        let moved = [touch(1, [0.3, 0.0], Some(Vec3::new(1.2, -1.0, -2.5)))];
        assert!(placement.process_gesture(&scene, &moved, camera()));
        assert_relative_eq!(placement.goal_position(), Vec3::new(1.0, -1.0, -2.5), epsilon = 1e-5);

        assert!(placement.end_gesture());
        assert_eq!(placement.gesture(), Gesture::Idle);
        assert_relative_eq!(placement.goal_position().y, -1.0);
    }

    #[test]
    fn test_drag_over_lower_floor_drops_on_release() {
        let (scene, mut placement, _cache) = placed_cube(&XrConfig::default());
        placement.begin_gesture(&scene, 1, &[touch(1, [0.0, 0.0], Some(Vec3::new(0.2, -1.0, -2.0)))]);

        let lower = [touch(1, [0.0, -0.3], Some(Vec3::new(0.2, -1.5, -3.0)))];
        assert!(placement.process_gesture(&scene, &lower, camera()));
        // Held on the drag plane while the touch is down
        assert_relative_eq!(placement.goal_position().y, -1.0, epsilon = 1e-5);
        assert_relative_eq!(placement.goal_position().z, -2.5, epsilon = 1e-5);

        placement.end_gesture();
        assert_relative_eq!(placement.goal_position().y, -1.5, epsilon = 1e-5);
    }

    #[test]
    fn test_touch_beside_content_rotates() {
        let (scene, mut placement, _cache) = placed_cube(&XrConfig::default());
        let yaw = placement.goal_yaw();
        placement.begin_gesture(&scene, 4, &[touch(4, [0.1, 0.0], Some(Vec3::new(3.0, -1.0, -2.0)))]);
        assert!(matches!(placement.gesture(), Gesture::Rotating { input: 4, .. }));

        assert!(placement.process_gesture(&scene, &[touch(4, [0.5, 0.0], None)], camera()));
        assert_relative_eq!(placement.goal_yaw(), yaw + 0.4 * ROTATION_RATE, epsilon = 1e-5);
        assert!(!placement.end_gesture());
        assert_eq!(placement.goal_position(), Vec3::new(0.0, -1.0, -2.0));
    }

    #[test]
    fn test_pinch_scales_and_snaps_near_one() {
        let (mut scene, mut placement, _cache) = placed_cube(&XrConfig::default());
        let pinch = |spread: f32| [touch(1, [-spread, 0.0], None), touch(2, [spread, 0.0], None)];

        placement.begin_gesture(&scene, 2, &pinch(0.2));
        assert!(matches!(placement.gesture(), Gesture::Scaling { .. }));

        assert!(placement.process_gesture(&scene, &pinch(0.22), camera()));
        assert_eq!(placement.goal_scale(), 1.0);

        assert!(placement.process_gesture(&scene, &pinch(0.4), camera()));
        assert_relative_eq!(placement.goal_scale(), 2.0, epsilon = 1e-5);

        // Losing a finger ends the pinch but keeps the goal
        assert!(!placement.process_gesture(&scene, &pinch(0.4)[..1], camera()));
        assert_eq!(placement.gesture(), Gesture::Idle);

        placement.update(&mut scene, 16.0);
        assert!(scene.scale() > 1.0 && scene.scale() < 2.0);
        placement.update(&mut scene, 1.0e6);
        assert_relative_eq!(scene.scale(), placement.goal_scale());
    }

    #[test]
    fn test_second_finger_switches_drag_to_pinch() {
        let (scene, mut placement, _cache) = placed_cube(&XrConfig::default());
        placement.begin_gesture(&scene, 1, &[touch(1, [0.0, 0.0], Some(Vec3::new(0.0, -1.0, -2.0)))]);
        let both = [
            touch(1, [0.0, 0.0], Some(Vec3::new(0.0, -1.0, -2.0))),
            touch(2, [0.3, 0.0], None),
        ];
        assert!(!placement.process_gesture(&scene, &both, camera()));
        assert!(matches!(placement.gesture(), Gesture::Scaling { .. }));
    }

    #[test]
    fn test_gestures_need_placed_content_and_scale_permission() {
        let mut scene = ModelScene::new(100, 100);
        let mut placement = Placement::new(&XrConfig::default());
        placement.begin_gesture(&scene, 1, &[touch(1, [0.0, 0.0], Some(Vec3::zeros()))]);
        assert_eq!(placement.gesture(), Gesture::Idle);
        assert_eq!(placement.place(&mut scene), None);

        let fixed = XrConfig {
            allow_scale: false,
            ..XrConfig::default()
        };
        let (scene, mut placement, _cache) = placed_cube(&fixed);
        placement.begin_gesture(&scene, 1, &[touch(1, [-0.2, 0.0], None), touch(2, [0.2, 0.0], None)]);
        assert_eq!(placement.gesture(), Gesture::Idle);
        assert_eq!(placement.goal_scale(), 1.0);
    }
}
