//! Frame timing utilities
//!
//! All engine timestamps are host-supplied milliseconds (the value a
//! per-frame callback receives), so the clock never reads the system time
//! itself. That keeps scheduling deterministic under test.

/// Milliseconds timestamp supplied by the host frame callback
pub type Millis = f64;

/// Converts absolute frame timestamps into per-frame deltas
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_tick: Option<Millis>,
    frame_count: u64,
}

impl FrameClock {
    /// Create a clock that has not seen a frame yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock whose previous frame happened at `time`
    pub fn starting_at(time: Millis) -> Self {
        Self {
            last_tick: Some(time),
            frame_count: 0,
        }
    }

    /// Advance to `time` and return the elapsed milliseconds
    ///
    /// The first frame after creation (or after [`reset`](Self::reset))
    /// yields a zero delta.
    pub fn advance(&mut self, time: Millis) -> Millis {
        let delta = self.last_tick.map_or(0.0, |last| time - last);
        self.last_tick = Some(time);
        self.frame_count += 1;
        delta
    }

    /// Forget the previous frame
    pub fn reset(&mut self) {
        self.last_tick = None;
    }

    /// Timestamp of the previous frame, if any
    pub fn last_tick(&self) -> Option<Millis> {
        self.last_tick
    }

    /// Number of frames advanced so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}
