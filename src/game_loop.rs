//! Main loop driving rendering.

use crate::rendering::{FrameStatistics, Renderer};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    num::NonZeroU32,
    thread,
    time::{Duration, Instant},
};

/// A loop driving a [`Renderer`] at a frame rate that is optionally capped.
///
/// The time passed to the renderer, and thus the tick events of the scene,
/// does not follow the wall clock directly. It advances by the smoothed frame
/// duration after every frame, so that a single slow frame does not make
/// animations jump.
#[derive(Debug)]
pub struct GameLoop {
    config: GameLoopConfig,
    frame_durations: FrameDurationTracker,
    frame_time: Duration,
    previous_frame_end: Option<Instant>,
    n_frames: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameLoopConfig {
    pub max_fps: Option<NonZeroU32>,
}

/// Exponentially smoothed frame duration.
#[derive(Clone, Debug)]
pub(crate) struct FrameDurationTracker {
    smooth_frame_duration: Duration,
}

/// Weight of the newest frame duration in the smoothed duration.
const SMOOTHING_WEIGHT: f64 = 0.2;

/// Remaining waiting time below which the loop spins instead of sleeping.
const SPIN_THRESHOLD: Duration = Duration::from_millis(1);

impl GameLoop {
    pub fn new(config: GameLoopConfig) -> Self {
        Self {
            config,
            frame_durations: FrameDurationTracker::default(),
            frame_time: Duration::ZERO,
            previous_frame_end: None,
            n_frames: 0,
        }
    }

    /// Renders a frame at the current frame time, waits out the rest of the
    /// minimum frame duration and advances the frame time by the smoothed
    /// frame duration.
    ///
    /// # Errors
    /// Returns an error if rendering fails.
    pub fn perform_iteration(&mut self, renderer: &mut Renderer) -> Result<FrameStatistics> {
        let frame_start = self.previous_frame_end.unwrap_or_else(Instant::now);

        let statistics = renderer.render(self.frame_time)?;

        let frame_end = match self.config.min_frame_duration() {
            Some(min_frame_duration) => wait_until(frame_start + min_frame_duration),
            None => Instant::now(),
        };
        self.frame_durations
            .add_frame_duration(frame_end - frame_start);
        self.previous_frame_end = Some(frame_end);

        self.frame_time += self.frame_durations.smooth_frame_duration();
        self.n_frames += 1;

        log::trace!(
            "Frame {} took {:.1} ms, next frame at {:.3} s (~{} FPS)",
            self.n_frames,
            (frame_end - frame_start).as_secs_f64() * 1e3,
            self.frame_time.as_secs_f64(),
            self.smooth_fps()
        );

        Ok(statistics)
    }

    pub fn n_frames(&self) -> u64 {
        self.n_frames
    }

    /// Returns the time the next frame will be rendered at.
    pub fn frame_time(&self) -> Duration {
        self.frame_time
    }

    pub fn smooth_frame_duration(&self) -> Duration {
        self.frame_durations.smooth_frame_duration()
    }

    pub fn smooth_fps(&self) -> u32 {
        frame_duration_to_fps(self.smooth_frame_duration())
    }
}

impl GameLoopConfig {
    fn min_frame_duration(&self) -> Option<Duration> {
        self.max_fps.map(|fps| fps_to_frame_duration(fps.get()))
    }
}

impl FrameDurationTracker {
    pub(crate) fn new(initial_frame_duration: Duration) -> Self {
        Self {
            smooth_frame_duration: initial_frame_duration,
        }
    }

    pub(crate) fn smooth_frame_duration(&self) -> Duration {
        self.smooth_frame_duration
    }

    pub(crate) fn add_frame_duration(&mut self, frame_duration: Duration) {
        self.smooth_frame_duration = self.smooth_frame_duration.mul_f64(1.0 - SMOOTHING_WEIGHT)
            + frame_duration.mul_f64(SMOOTHING_WEIGHT);
    }
}

impl Default for FrameDurationTracker {
    fn default() -> Self {
        Self::new(fps_to_frame_duration(30))
    }
}

/// Sleeps until shortly before the deadline and spins for the rest.
///
/// # Returns
/// The time at which waiting ended.
fn wait_until(deadline: Instant) -> Instant {
    loop {
        let now = Instant::now();
        let remaining = deadline.saturating_duration_since(now);
        if remaining.is_zero() {
            return now;
        }
        if remaining > SPIN_THRESHOLD {
            thread::sleep(remaining - SPIN_THRESHOLD / 2);
        } else {
            std::hint::spin_loop();
        }
    }
}

pub(crate) fn frame_duration_to_fps(duration: Duration) -> u32 {
    if duration.is_zero() {
        return u32::MAX;
    }
    (1.0 / duration.as_secs_f64()).round() as u32
}

fn fps_to_frame_duration(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(fps))
}
