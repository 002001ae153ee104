//! Orbit controls with damped goal tracking
//!
//! **State**: azimuth (theta), polar angle (phi), radius and field of view,
//! each as an independent (current, goal) pair with clamp bounds from
//! [`ControlsConfig`]. Field of view is damped in log space so zooming feels
//! uniform across the range.
//!
//! **Input mapping**:
//! - Drag: `2π · pixels / viewport height` radians of orbit
//! - Wheel: `delta_y · (18 for line mode) · 0.04 / 30` zoom
//! - Two-finger pinch: `0.04 · Δseparation · 50 / viewport height` zoom
//! - Arrow keys: π/8 of orbit, PageUp/PageDown: ±0.04 zoom
//!
//! Zoom moves radius and field of view together so both traverse their
//! allowed ranges in sync.

use super::damper::{Damper, SETTLING_TIME};
use super::input::{InputEvent, KeyCode, WheelMode};
use super::{ChangeEvent, ChangeSource, InteractionPolicy};
use crate::config::ControlsConfig;
use crate::foundation::math::constants::{HALF_PI, PI, TAU};
use crate::foundation::math::{utils, Spherical};
use crate::foundation::time::Millis;
use crate::scene::camera::Camera;

/// Orbit step of one arrow key press
pub const KEYBOARD_ORBIT_INCREMENT: f32 = PI / 8.0;

/// Zoom amount of one wheel notch / PageUp press
pub const ZOOM_SENSITIVITY: f32 = 0.04;

/// Closest the azimuth goal may get to half a turn ahead of the current value
const THETA_LEAD_LIMIT: f32 = PI - 0.001;

/// Line-mode wheel deltas are scaled to pixels by this factor
const WHEEL_LINE_HEIGHT: f32 = 18.0;

#[derive(Debug, Clone, Copy)]
struct TrackedPointer {
    id: u32,
    x: f32,
    y: f32,
}

/// Damped orbit camera controller for one Scene
#[derive(Debug, Clone)]
pub struct SmoothControls {
    options: ControlsConfig,

    spherical: Spherical,
    goal: Spherical,
    log_fov: f32,
    goal_log_fov: f32,

    theta_damper: Damper,
    phi_damper: Damper,
    radius_damper: Damper,
    fov_damper: Damper,

    change_source: ChangeSource,
    focused: bool,
    toggled_on: bool,

    pointers: Vec<TrackedPointer>,
    last_separation: f32,
    viewport_height: f32,
}

impl SmoothControls {
    /// Create controls at a neutral orbit, already settled
    pub fn new(options: ControlsConfig) -> Self {
        let initial_fov = options.max_fov.max(f32::MIN_POSITIVE);
        let mut controls = Self {
            theta_damper: Damper::new(options.decay_ms),
            phi_damper: Damper::new(options.decay_ms),
            radius_damper: Damper::new(options.decay_ms),
            fov_damper: Damper::new(options.decay_ms),
            options,
            spherical: Spherical::new(0.0, HALF_PI, 1.0),
            goal: Spherical::new(0.0, HALF_PI, 1.0),
            log_fov: initial_fov.ln(),
            goal_log_fov: initial_fov.ln(),
            change_source: ChangeSource::None,
            focused: false,
            toggled_on: false,
            pointers: Vec::new(),
            last_separation: 0.0,
            viewport_height: 1.0,
        };

        controls.set_orbit(0.0, HALF_PI, 1.0);
        controls.set_field_of_view(100.0);
        controls.jump_to_goal();
        controls
    }

    /// Currently configured options
    pub fn options(&self) -> &ControlsConfig {
        &self.options
    }

    /// Replace the options and re-clamp every goal to the new bounds
    pub fn apply_options(&mut self, options: ControlsConfig) {
        for damper in [
            &mut self.theta_damper,
            &mut self.phi_damper,
            &mut self.radius_damper,
            &mut self.fov_damper,
        ] {
            damper.set_decay_time(options.decay_ms);
        }
        self.options = options;

        let goal = self.goal;
        self.apply_orbit(goal.theta, goal.phi, goal.radius);
        self.set_field_of_view(self.goal_log_fov.exp());
        self.clamp_current();
    }

    /// Current orbit
    pub fn spherical(&self) -> Spherical {
        self.spherical
    }

    /// Orbit the controls are moving toward
    pub fn goal(&self) -> Spherical {
        self.goal
    }

    /// Current field of view in degrees
    pub fn field_of_view(&self) -> f32 {
        self.log_fov.exp()
    }

    /// Field of view goal in degrees
    pub fn goal_field_of_view(&self) -> f32 {
        self.goal_log_fov.exp()
    }

    /// Source attached to the next change event
    pub fn change_source(&self) -> ChangeSource {
        self.change_source
    }

    /// Override the source of the next change events
    pub fn set_change_source(&mut self, source: ChangeSource) {
        self.change_source = source;
    }

    /// Set the orbit goal programmatically
    ///
    /// Values are clamped to the configured bounds; non-finite results are
    /// ignored. Returns whether the goal changed.
    pub fn set_orbit(&mut self, theta: f32, phi: f32, radius: f32) -> bool {
        self.change_source = ChangeSource::None;
        self.apply_orbit(theta, phi, radius)
    }

    /// Set only the radius goal
    pub fn set_radius(&mut self, radius: f32) -> bool {
        let goal = self.goal;
        self.set_orbit(goal.theta, goal.phi, radius)
    }

    /// Set the field of view goal in degrees, clamped to the bounds
    pub fn set_field_of_view(&mut self, fov: f32) {
        if !fov.is_finite() || fov <= 0.0 {
            return;
        }
        let fov = utils::clamp(fov, self.options.min_fov, self.options.max_fov);
        self.goal_log_fov = fov.ln();
    }

    /// Change the damping decay time of all four values
    pub fn set_damper_decay_time(&mut self, decay_ms: Millis) {
        self.options.decay_ms = decay_ms;
        self.theta_damper.set_decay_time(decay_ms);
        self.phi_damper.set_decay_time(decay_ms);
        self.radius_damper.set_decay_time(decay_ms);
        self.fov_damper.set_decay_time(decay_ms);
    }

    /// Move the goal relative to its current value
    ///
    /// The azimuth goal never leads the current azimuth by half a turn or
    /// more, so interpolation keeps the direction of the delta. `delta_zoom`
    /// moves radius and field of view proportionally across their ranges.
    pub fn adjust_orbit(&mut self, delta_theta: f32, delta_phi: f32, delta_zoom: f32) -> bool {
        let Spherical { theta, phi, radius } = self.goal;
        let options = &self.options;

        let lead = self.spherical.theta - theta;
        let goal_theta = theta
            - utils::clamp(delta_theta, -THETA_LEAD_LIMIT - lead, THETA_LEAD_LIMIT - lead);
        let goal_phi = phi - delta_phi;

        let delta_ratio = if delta_zoom == 0.0 {
            0.0
        } else if delta_zoom > 0.0 {
            (options.max_radius - radius) / (options.max_fov.ln() - self.goal_log_fov)
        } else {
            (options.min_radius - radius) / (options.min_fov.ln() - self.goal_log_fov)
        };
        let radius_span = (options.max_radius - options.min_radius) * 2.0;
        let goal_radius = radius
            + delta_zoom * if delta_ratio.is_finite() { delta_ratio } else { radius_span };

        let changed = self.apply_orbit(goal_theta, goal_phi, goal_radius);
        if delta_zoom != 0.0 {
            let before = self.goal_log_fov;
            self.set_field_of_view((self.goal_log_fov + delta_zoom).exp());
            return changed || before != self.goal_log_fov;
        }
        changed
    }

    /// Snap every value onto its goal
    pub fn jump_to_goal(&mut self) -> Option<ChangeEvent> {
        self.change_source = ChangeSource::None;
        self.update(0.0, SETTLING_TIME)
    }

    /// True when every value sits on its goal
    pub fn is_stationary(&self) -> bool {
        self.spherical == self.goal && self.log_fov == self.goal_log_fov
    }

    /// Integrate current values toward their goals
    ///
    /// Returns a change event when the camera actually moved.
    pub fn update(&mut self, _time: Millis, delta: Millis) -> Option<ChangeEvent> {
        if self.is_stationary() {
            return None;
        }

        let before = (self.spherical, self.log_fov);

        let lead = self.spherical.theta - self.goal.theta;
        if lead.abs() > PI && self.theta_unbounded() {
            self.spherical.theta -= lead.signum() * TAU;
        }

        self.spherical.theta = self
            .theta_damper
            .update(self.spherical.theta, self.goal.theta, delta, PI);
        self.spherical.phi = self
            .phi_damper
            .update(self.spherical.phi, self.goal.phi, delta, self.options.max_phi);
        let radius_normalization = self.radius_normalization();
        self.spherical.radius = self.radius_damper.update(
            self.spherical.radius,
            self.goal.radius,
            delta,
            radius_normalization,
        );
        self.log_fov = self.fov_damper.update(self.log_fov, self.goal_log_fov, delta, 1.0);
        self.clamp_current();

        if (self.spherical, self.log_fov) == before {
            return None;
        }

        log::trace!(
            "Controls moved to theta={:.4} phi={:.4} radius={:.4} fov={:.2}",
            self.spherical.theta,
            self.spherical.phi,
            self.spherical.radius,
            self.field_of_view()
        );
        Some(ChangeEvent {
            source: self.change_source,
        })
    }

    /// Write the current orbit into `camera` around its target
    pub fn write_camera(&self, camera: &mut Camera) {
        camera.set_position(camera.target + self.spherical.to_offset());
        let fov = self.field_of_view();
        if camera.fov_degrees() != fov {
            camera.set_fov_degrees(fov);
        }
    }

    /// Height of the element in pixels, used to convert drags to angles
    pub fn set_viewport_height(&mut self, height: f32) {
        if height > 0.0 {
            self.viewport_height = height;
        }
    }

    /// Whether raw input is currently accepted
    pub fn can_interact(&self) -> bool {
        match self.options.interaction_policy {
            InteractionPolicy::AlwaysAllow => true,
            InteractionPolicy::AllowWhenFocused => self.focused,
            InteractionPolicy::AllowToggle => self.toggled_on,
        }
    }

    /// Flip the toggle gate; returns the new state
    pub fn toggle_interaction(&mut self) -> bool {
        self.toggled_on = !self.toggled_on;
        if !self.toggled_on {
            self.pointers.clear();
        }
        self.toggled_on
    }

    /// Record focus changes for the focus gate
    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
        if !focused {
            self.pointers.clear();
        }
    }

    /// Ignore wheel, pinch and zoom keys
    pub fn set_disable_zoom(&mut self, disable: bool) {
        self.options.disable_zoom = disable;
    }

    /// Handle raw user input
    ///
    /// Returns whether the event was accepted.
    pub fn handle_input(&mut self, event: &InputEvent) -> bool {
        self.process_input(event, ChangeSource::UserInteraction)
    }

    /// Handle input synthesized on the user's behalf, e.g. by an
    /// interaction prompt
    pub fn handle_synthetic_input(&mut self, event: &InputEvent) -> bool {
        self.process_input(event, ChangeSource::Automatic)
    }

    fn process_input(&mut self, event: &InputEvent, source: ChangeSource) -> bool {
        match *event {
            InputEvent::Focus(focused) => {
                self.set_focused(focused);
                return false;
            }
            InputEvent::Activate => {
                if self.options.interaction_policy == InteractionPolicy::AllowToggle {
                    let enabled = self.toggle_interaction();
                    log::debug!("Interaction toggled {}", if enabled { "on" } else { "off" });
                }
                return false;
            }
            _ => {}
        }

        if !self.can_interact() {
            return false;
        }

        match *event {
            InputEvent::PointerDown { id, x, y, .. } => {
                self.pointers.retain(|pointer| pointer.id != id);
                self.pointers.push(TrackedPointer { id, x, y });
                if self.pointers.len() >= 2 {
                    self.last_separation = self.pointer_separation();
                }
                true
            }
            InputEvent::PointerMove { id, x, y } => self.on_pointer_move(id, x, y, source),
            InputEvent::PointerUp { id } => {
                self.pointers.retain(|pointer| pointer.id != id);
                if self.pointers.len() >= 2 {
                    self.last_separation = self.pointer_separation();
                }
                true
            }
            InputEvent::Wheel { delta_y, mode } => {
                if self.options.disable_zoom {
                    return false;
                }
                let scale = match mode {
                    WheelMode::Line => WHEEL_LINE_HEIGHT,
                    WheelMode::Pixel => 1.0,
                };
                let delta_zoom = delta_y * scale * ZOOM_SENSITIVITY / 30.0;
                self.user_adjust_orbit(0.0, 0.0, delta_zoom, source);
                true
            }
            InputEvent::KeyDown { key, .. } => self.on_key(key, source),
            InputEvent::Focus(_) | InputEvent::Activate => false,
        }
    }

    fn on_pointer_move(&mut self, id: u32, x: f32, y: f32, source: ChangeSource) -> bool {
        let Some(index) = self.pointers.iter().position(|pointer| pointer.id == id) else {
            return false;
        };

        if self.pointers.len() >= 2 {
            self.pointers[index].x = x;
            self.pointers[index].y = y;
            let separation = self.pointer_separation();
            let delta_separation = self.last_separation - separation;
            self.last_separation = separation;
            if self.options.disable_zoom {
                return false;
            }
            let delta_zoom = ZOOM_SENSITIVITY * delta_separation * 50.0 / self.viewport_height;
            self.user_adjust_orbit(0.0, 0.0, delta_zoom, source);
            return true;
        }

        let pointer = self.pointers[index];
        let delta_theta = self.pixel_length_to_angle(x - pointer.x);
        let delta_phi = self.pixel_length_to_angle(y - pointer.y);
        self.pointers[index].x = x;
        self.pointers[index].y = y;
        self.user_adjust_orbit(delta_theta, delta_phi, 0.0, source);
        true
    }

    fn on_key(&mut self, key: KeyCode, source: ChangeSource) -> bool {
        let zoom_allowed = !self.options.disable_zoom;
        let (delta_theta, delta_phi, delta_zoom) = match key {
            KeyCode::PageUp if zoom_allowed => (0.0, 0.0, ZOOM_SENSITIVITY),
            KeyCode::PageDown if zoom_allowed => (0.0, 0.0, -ZOOM_SENSITIVITY),
            KeyCode::ArrowUp => (0.0, -KEYBOARD_ORBIT_INCREMENT, 0.0),
            KeyCode::ArrowDown => (0.0, KEYBOARD_ORBIT_INCREMENT, 0.0),
            KeyCode::ArrowLeft => (-KEYBOARD_ORBIT_INCREMENT, 0.0, 0.0),
            KeyCode::ArrowRight => (KEYBOARD_ORBIT_INCREMENT, 0.0, 0.0),
            _ => return false,
        };
        self.user_adjust_orbit(delta_theta, delta_phi, delta_zoom, source);
        true
    }

    fn user_adjust_orbit(&mut self, delta_theta: f32, delta_phi: f32, delta_zoom: f32, source: ChangeSource) {
        let orbit_scale = self.options.orbit_sensitivity * self.options.input_sensitivity;
        self.adjust_orbit(
            delta_theta * orbit_scale,
            delta_phi * orbit_scale,
            delta_zoom * self.options.input_sensitivity,
        );
        self.change_source = source;
    }

    fn apply_orbit(&mut self, theta: f32, phi: f32, radius: f32) -> bool {
        let options = &self.options;
        let next_theta = utils::clamp(theta, options.min_theta, options.max_theta);
        let next_phi = utils::clamp(phi, options.min_phi, options.max_phi);
        let next_radius = utils::clamp(radius, options.min_radius, options.max_radius);

        if !next_theta.is_finite() || !next_phi.is_finite() || !next_radius.is_finite() {
            return false;
        }

        if self.theta_unbounded() {
            self.spherical.theta = utils::wrap_angle(self.spherical.theta - next_theta) + next_theta;
        }

        let next = Spherical::new(next_theta, next_phi, next_radius);
        if next == self.goal {
            return false;
        }
        self.goal = next;
        true
    }

    /// Pull current values back into bounds; a NaN current value takes its goal
    fn clamp_current(&mut self) {
        let options = &self.options;
        let goal = self.goal;
        self.spherical.theta = clamp_or(self.spherical.theta, goal.theta, options.min_theta, options.max_theta);
        self.spherical.phi = clamp_or(self.spherical.phi, goal.phi, options.min_phi, options.max_phi);
        self.spherical.radius = clamp_or(self.spherical.radius, goal.radius, options.min_radius, options.max_radius);
        let min_log_fov = options.min_fov.max(f32::MIN_POSITIVE).ln();
        let max_log_fov = options.max_fov.max(f32::MIN_POSITIVE).ln();
        self.log_fov = clamp_or(self.log_fov, self.goal_log_fov, min_log_fov, max_log_fov);
    }

    fn theta_unbounded(&self) -> bool {
        !self.options.min_theta.is_finite() && !self.options.max_theta.is_finite()
    }

    fn radius_normalization(&self) -> f32 {
        let max_radius = self.options.max_radius;
        if max_radius.is_finite() && max_radius > 0.0 {
            max_radius
        } else {
            self.goal.radius.abs().max(self.spherical.radius.abs()).max(1.0)
        }
    }

    fn pixel_length_to_angle(&self, pixels: f32) -> f32 {
        TAU * pixels / self.viewport_height
    }

    fn pointer_separation(&self) -> f32 {
        match (self.pointers.first(), self.pointers.get(1)) {
            (Some(a), Some(b)) => ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt(),
            _ => 0.0,
        }
    }
}

fn clamp_or(value: f32, fallback: f32, min: f32, max: f32) -> f32 {
    let value = if value.is_nan() { fallback } else { value };
    let clamped = utils::clamp(value, min, max);
    if clamped.is_nan() {
        min.max(max.min(0.0))
    } else {
        clamped
    }
}

impl Default for SmoothControls {
    fn default() -> Self {
        Self::new(ControlsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::input::{Modifiers, PointerKind};
    use approx::assert_relative_eq;

    const FRAME_MS: Millis = 16.6;

    /// Run `frames` updates and return the last change event
    fn settle(controls: &mut SmoothControls, frames: usize) -> Option<ChangeEvent> {
        let mut last = None;
        for frame in 0..frames {
            if let Some(event) = controls.update(frame as Millis * FRAME_MS, FRAME_MS) {
                last = Some(event);
            }
        }
        last
    }

    fn key(key: KeyCode) -> InputEvent {
        InputEvent::KeyDown {
            key,
            modifiers: Modifiers::empty(),
        }
    }

    /// Press pointer `id` at (x, y)
    fn press(id: u32, x: f32, y: f32) -> InputEvent {
        InputEvent::PointerDown {
            id,
            x,
            y,
            kind: PointerKind::Touch,
        }
    }

    #[test]
    fn test_initial_state_is_settled_and_clamped() {
        let controls = SmoothControls::default();
        assert!(controls.is_stationary());
        assert_relative_eq!(controls.field_of_view(), 45.0, epsilon = 1e-4);
        assert_relative_eq!(controls.spherical().phi, PI / 2.0);
        assert_eq!(controls.spherical().radius, 1.0);
    }

    #[test]
    fn test_radius_settles_exactly_on_clamped_goal() {
        let options = ControlsConfig {
            max_radius: 20.0,
            ..Default::default()
        };
        let mut controls = SmoothControls::new(options);
        controls.set_orbit(0.0, PI / 2.0, 10.0);
        controls.jump_to_goal();

        controls.set_orbit(0.0, PI / 2.0, 50.0);
        assert_eq!(controls.goal().radius, 20.0);
        settle(&mut controls, 50);
        assert_eq!(controls.spherical().radius, 20.0);
        assert!(controls.is_stationary());
    }

    #[test]
    fn test_reversed_goal_is_not_overshot() {
        let options = ControlsConfig {
            max_radius: 20.0,
            ..Default::default()
        };
        let mut controls = SmoothControls::new(options);
        controls.set_orbit(0.0, PI / 2.0, 10.0);
        controls.jump_to_goal();

        controls.set_orbit(0.0, PI / 2.0, 20.0);
        settle(&mut controls, 5);
        let moving = controls.spherical().radius;
        assert!(moving > 11.0 && moving < 20.0, "radius = {}", moving);

        controls.set_orbit(0.0, PI / 2.0, 11.0);
        for frame in 0..120 {
            controls.update(frame as Millis * FRAME_MS, FRAME_MS);
            let radius = controls.spherical().radius;
            assert!(radius >= 11.0, "overshot to {} on frame {}", radius, frame);
        }
        assert_eq!(controls.spherical().radius, 11.0);
    }

    #[test]
    fn test_non_finite_delta_keeps_state_finite() {
        let options = ControlsConfig {
            max_radius: 20.0,
            ..Default::default()
        };
        let mut controls = SmoothControls::new(options);
        controls.set_orbit(0.4, 1.0, 5.0);
        controls.set_field_of_view(30.0);

        assert!(controls.update(0.0, Millis::INFINITY).is_some());
        assert_eq!(controls.spherical(), controls.goal());
        assert!(controls.is_stationary());

        controls.set_orbit(-0.4, 1.2, 8.0);
        controls.update(16.0, Millis::NAN);
        for frame in 0..10 {
            controls.update(frame as Millis * FRAME_MS, FRAME_MS);
            let current = controls.spherical();
            assert!(current.theta.is_finite() && current.phi.is_finite() && current.radius.is_finite());
            assert!(controls.field_of_view().is_finite());
        }
        assert_eq!(controls.spherical(), Spherical::new(-0.4, 1.2, 8.0));
    }

    #[test]
    fn test_nan_current_value_is_pulled_back_to_goal() {
        let mut controls = SmoothControls::default();
        controls.set_orbit(0.0, PI / 2.0, 1.0);
        controls.jump_to_goal();

        controls.spherical.radius = f32::NAN;
        controls.update(0.0, FRAME_MS);
        assert_eq!(controls.spherical().radius, controls.goal().radius);
        assert!(controls.is_stationary());
    }

    #[test]
    fn test_set_orbit_ignores_non_finite() {
        let mut controls = SmoothControls::default();
        assert!(!controls.set_orbit(f32::NAN, PI / 2.0, 1.0));
        assert!(!controls.set_orbit(0.0, PI / 2.0, f32::INFINITY));
        assert_eq!(controls.goal(), Spherical::new(0.0, PI / 2.0, 1.0));
    }

    #[test]
    fn test_programmatic_change_is_tagged_none() {
        let mut controls = SmoothControls::default();
        controls.set_orbit(0.5, PI / 2.0, 2.0);
        let event = controls.update(0.0, FRAME_MS).unwrap();
        assert_eq!(event.source, ChangeSource::None);
    }

    #[test]
    fn test_user_input_is_tagged_user_interaction() {
        let mut controls = SmoothControls::default();
        assert!(controls.handle_input(&key(KeyCode::ArrowLeft)));
        let event = controls.update(0.0, FRAME_MS).unwrap();
        assert_eq!(event.source, ChangeSource::UserInteraction);
        assert_relative_eq!(controls.goal().theta, KEYBOARD_ORBIT_INCREMENT);
    }

    #[test]
    fn test_synthetic_input_is_tagged_automatic() {
        let mut controls = SmoothControls::default();
        controls.set_viewport_height(100.0);
        controls.handle_synthetic_input(&press(1, 0.0, 0.0));
        controls.handle_synthetic_input(&InputEvent::PointerMove { id: 1, x: 10.0, y: 0.0 });
        let event = controls.update(0.0, FRAME_MS).unwrap();
        assert_eq!(event.source, ChangeSource::Automatic);
    }

    #[test]
    fn test_drag_converts_pixels_to_angle() {
        let mut controls = SmoothControls::default();
        controls.set_viewport_height(200.0);
        controls.handle_input(&press(1, 100.0, 100.0));
        controls.handle_input(&InputEvent::PointerMove { id: 1, x: 110.0, y: 100.0 });
        // Dragging right decreases the azimuth goal by 2π·10/200
        assert_relative_eq!(controls.goal().theta, -TAU * 10.0 / 200.0, epsilon = 1e-5);
    }

    #[test]
    fn test_wheel_zooms_radius_and_fov_together() {
        let options = ControlsConfig {
            max_radius: 10.0,
            min_radius: 1.0,
            ..Default::default()
        };
        let mut controls = SmoothControls::new(options);
        controls.set_orbit(0.0, PI / 2.0, 5.0);
        controls.set_field_of_view(30.0);
        controls.jump_to_goal();

        controls.handle_input(&InputEvent::Wheel {
            delta_y: 30.0,
            mode: WheelMode::Pixel,
        });
        assert!(controls.goal().radius > 5.0);
        assert!(controls.goal_field_of_view() > 30.0);
    }

    #[test]
    fn test_pinch_in_zooms_out() {
        let options = ControlsConfig {
            max_radius: 10.0,
            ..Default::default()
        };
        let mut controls = SmoothControls::new(options);
        controls.set_viewport_height(100.0);
        controls.set_orbit(0.0, PI / 2.0, 5.0);
        controls.jump_to_goal();

        controls.handle_input(&press(1, 0.0, 0.0));
        controls.handle_input(&press(2, 100.0, 0.0));
        controls.handle_input(&InputEvent::PointerMove { id: 2, x: 50.0, y: 0.0 });
        assert!(controls.goal().radius > 5.0);
    }

    #[test]
    fn test_disable_zoom_ignores_wheel() {
        let options = ControlsConfig {
            disable_zoom: true,
            ..Default::default()
        };
        let mut controls = SmoothControls::new(options);
        let wheel = InputEvent::Wheel {
            delta_y: 100.0,
            mode: WheelMode::Line,
        };
        assert!(!controls.handle_input(&wheel));
        assert!(!controls.handle_input(&key(KeyCode::PageUp)));
        assert!(controls.is_stationary());
    }

    #[test]
    fn test_focus_policy_gates_input() {
        let options = ControlsConfig {
            interaction_policy: InteractionPolicy::AllowWhenFocused,
            ..Default::default()
        };
        let mut controls = SmoothControls::new(options);
        assert!(!controls.handle_input(&key(KeyCode::ArrowRight)));
        assert!(controls.is_stationary());

        controls.handle_input(&InputEvent::Focus(true));
        assert!(controls.handle_input(&key(KeyCode::ArrowRight)));
    }

    #[test]
    fn test_toggle_policy_flips_on_activate() {
        let options = ControlsConfig {
            interaction_policy: InteractionPolicy::AllowToggle,
            ..Default::default()
        };
        let mut controls = SmoothControls::new(options);
        assert!(!controls.handle_input(&key(KeyCode::ArrowUp)));

        controls.handle_input(&InputEvent::Activate);
        assert!(controls.handle_input(&key(KeyCode::ArrowUp)));

        controls.handle_input(&InputEvent::Activate);
        assert!(!controls.handle_input(&key(KeyCode::ArrowUp)));
    }

    #[test]
    fn test_unbounded_theta_takes_shortest_path() {
        let mut controls = SmoothControls::default();
        controls.set_orbit(1.9 * PI, PI / 2.0, 1.0);
        controls.update(0.0, FRAME_MS);
        let theta = controls.spherical().theta;
        assert!(theta > 1.9 * PI && theta <= 2.0 * PI, "theta = {}", theta);
    }

    #[test]
    fn test_values_stay_within_bounds() {
        let options = ControlsConfig {
            min_theta: -1.0,
            max_theta: 1.0,
            max_radius: 8.0,
            min_radius: 2.0,
            ..Default::default()
        };
        let mut controls = SmoothControls::new(options.clone());
        controls.set_viewport_height(300.0);
        controls.handle_input(&press(1, 0.0, 0.0));

        for step in 0..200 {
            let offset = (step as f32 * 37.0) % 900.0 - 450.0;
            controls.handle_input(&InputEvent::PointerMove { id: 1, x: offset, y: -offset });
            controls.handle_input(&InputEvent::Wheel {
                delta_y: offset,
                mode: WheelMode::Pixel,
            });
            controls.update(step as Millis * FRAME_MS, FRAME_MS);

            let current = controls.spherical();
            assert!(current.theta >= options.min_theta && current.theta <= options.max_theta);
            assert!(current.phi >= options.min_phi && current.phi <= options.max_phi);
            assert!(current.radius >= options.min_radius && current.radius <= options.max_radius);
            assert!(controls.field_of_view() >= options.min_fov - 1e-3);
            assert!(controls.field_of_view() <= options.max_fov + 1e-3);
        }
    }

    #[test]
    fn test_apply_options_reclamps_goals() {
        let mut controls = SmoothControls::default();
        controls.set_orbit(0.0, PI / 2.0, 30.0);
        controls.jump_to_goal();

        controls.apply_options(ControlsConfig {
            max_radius: 10.0,
            ..Default::default()
        });
        assert_eq!(controls.goal().radius, 10.0);
        assert_eq!(controls.spherical().radius, 10.0);
    }

    #[test]
    fn test_write_camera_orbits_target() {
        let mut controls = SmoothControls::default();
        controls.set_orbit(0.0, PI / 2.0, 3.0);
        controls.jump_to_goal();

        let mut camera = Camera::default();
        camera.set_target(crate::foundation::math::Vec3::new(0.0, 1.0, 0.0));
        controls.write_camera(&mut camera);
        assert_relative_eq!(camera.position.z, 3.0, epsilon = 1e-5);
        assert_relative_eq!(camera.position.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(camera.fov_degrees(), 45.0, epsilon = 1e-3);
    }
}
