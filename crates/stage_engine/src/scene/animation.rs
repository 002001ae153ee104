//! Animation playback for a Scene's content instance

use crate::assets::{AnimationClip, SceneGraphContent};
use std::rc::Rc;

/// What happens when playback reaches the end of the clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Start over
    #[default]
    Repeat,
    /// Stop on the last frame
    Once,
}

/// Playback state of at most one clip
#[derive(Debug, Clone)]
pub struct AnimationPlayback {
    clip: Option<Rc<AnimationClip>>,
    time: f32,
    time_scale: f32,
    loop_mode: LoopMode,
    paused: bool,
}

impl Default for AnimationPlayback {
    fn default() -> Self {
        Self {
            clip: None,
            time: 0.0,
            time_scale: 1.0,
            loop_mode: LoopMode::Repeat,
            paused: false,
        }
    }
}

impl AnimationPlayback {
    /// Start playing a clip of `content`
    ///
    /// `name` selects a clip by name, or by index when it parses as one;
    /// otherwise the first clip plays. Returns false when the content has
    /// no animations.
    pub fn play(&mut self, content: &SceneGraphContent, name: Option<&str>, loop_mode: LoopMode) -> bool {
        let animations = content.animations();
        let by_name = name.and_then(|name| {
            content.animation(name).or_else(|| {
                name.parse::<usize>()
                    .ok()
                    .and_then(|index| animations.get(index))
            })
        });

        let Some(clip) = by_name.or_else(|| animations.first()) else {
            return false;
        };

        let restart = self
            .clip
            .as_ref()
            .map_or(true, |current| !Rc::ptr_eq(current, clip) || self.time >= current.duration);
        if restart {
            self.time = 0.0;
        }
        log::debug!("Playing animation '{}'", clip.name);
        self.clip = Some(Rc::clone(clip));
        self.loop_mode = loop_mode;
        self.paused = false;
        true
    }

    /// Stop and forget the current clip
    pub fn stop(&mut self) {
        self.clip = None;
        self.time = 0.0;
    }

    /// Freeze playback on the current frame
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume after [`pause`](Self::pause)
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Whether a clip is loaded and advancing
    pub fn is_playing(&self) -> bool {
        self.clip.is_some() && !self.paused
    }

    /// Whether a clip is loaded at all
    pub fn has_active_animation(&self) -> bool {
        self.clip.is_some()
    }

    /// Playback position in seconds
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Seek to `time` seconds; applied on the next update
    pub fn set_time(&mut self, time: f32) {
        self.time = time.max(0.0);
    }

    /// Length of the current clip in seconds
    pub fn duration(&self) -> f32 {
        self.clip.as_ref().map_or(0.0, |clip| clip.duration)
    }

    /// Playback speed multiplier
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Set the playback speed multiplier
    pub fn set_time_scale(&mut self, time_scale: f32) {
        self.time_scale = time_scale;
    }

    /// Advance by `step` seconds and pose `content`
    ///
    /// Returns whether the content was posed.
    pub fn update(&mut self, step: f32, content: &mut SceneGraphContent) -> bool {
        let Some(clip) = self.clip.clone() else {
            return false;
        };
        if !self.paused {
            self.time += step * self.time_scale;
            let duration = clip.duration;
            if self.time >= duration || self.time < 0.0 {
                self.time = match self.loop_mode {
                    LoopMode::Repeat if duration > 0.0 => self.time.rem_euclid(duration),
                    _ => self.time.clamp(0.0, duration),
                };
            }
        }
        clip.apply(content, self.time);
        true
    }
}
