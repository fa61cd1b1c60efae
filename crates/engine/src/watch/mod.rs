//! Video watch tracking
//!
//! Computes a watched-percentage from validated playback samples and fires
//! completion exactly once per session. A sample only accumulates time when
//! the forward delta from the previous sample is plausible for real
//! playback; seeks, scrubs, and duplicate ticks re-baseline instead.

mod sampler;

pub use sampler::{spawn_watch_sampler, WatchCompleted, WatchHandle, WatchSamplerConfig};

/// Largest believable forward jump between two 1 Hz samples, in seconds.
/// Anything bigger is a seek and must not count as watched time.
pub const MAX_SAMPLE_DELTA_SECS: f64 = 3.0;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Not sampling (before start, or while the app is backgrounded)
    Idle,
    Sampling,
    /// Threshold crossed and reward fired; further samples are ignored
    Completed,
}

/// Per-video watch session state machine
#[derive(Debug, Clone)]
pub struct WatchSession {
    duration_secs: f64,
    /// Percentage of the duration required for completion
    target_percent: f64,
    state: WatchState,
    /// Reference position of the previous accepted or re-baselined sample
    last_position: f64,
    /// Validated watched seconds
    accumulated: f64,
}

/// What happened to one playback sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// Forward delta accepted into the watched total
    Accepted,
    /// Re-baselined (seek/scrub/duplicate) or session not sampling
    Ignored,
    /// This sample crossed the threshold; fired exactly once per session
    Completed,
}

impl WatchSession {
    pub fn new(duration_secs: f64, target_percent: f64) -> Self {
        Self {
            duration_secs,
            target_percent,
            state: WatchState::Idle,
            last_position: 0.0,
            accumulated: 0.0,
        }
    }

    /// Begin sampling from the current playback position
    pub fn start(&mut self, position: f64) {
        if self.state == WatchState::Idle {
            self.state = WatchState::Sampling;
            self.last_position = position;
        }
    }

    /// Stop sampling (app backgrounded); watched time is kept
    pub fn pause(&mut self) {
        if self.state == WatchState::Sampling {
            self.state = WatchState::Idle;
        }
    }

    /// Resume sampling, re-baselining so background time never accumulates
    pub fn resume(&mut self, position: f64) {
        if self.state == WatchState::Idle {
            self.state = WatchState::Sampling;
            self.last_position = position;
        }
    }

    /// Feed one playback position sample
    pub fn record_sample(&mut self, position: f64) -> SampleOutcome {
        if self.state != WatchState::Sampling {
            return SampleOutcome::Ignored;
        }

        let delta = position - self.last_position;
        if delta > 0.0 && delta < MAX_SAMPLE_DELTA_SECS {
            self.accumulated += delta;
            self.last_position = position;

            if self.watched_percent() >= self.target_percent {
                self.state = WatchState::Completed;
                return SampleOutcome::Completed;
            }
            return SampleOutcome::Accepted;
        }

        // Backward jump, duplicate tick, or implausible forward jump:
        // re-baseline without accumulating.
        self.last_position = position;
        SampleOutcome::Ignored
    }

    pub fn watched_percent(&self) -> f64 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        self.accumulated / self.duration_secs * 100.0
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == WatchState::Completed
    }
}
