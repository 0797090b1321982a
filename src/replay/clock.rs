use log::debug;

use crate::SlipstreamError;

pub const DEFAULT_SPEED: f64 = 1.;
pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 3.;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackStatus {
    Stopped,
    Playing,
}

/// Read-only view of the clock for the presentation layer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackState {
    /// Normalized position in `[0, 1]` along the master timeline
    pub progress: f64,
    pub status: PlaybackStatus,
    pub speed: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            progress: 0.,
            status: PlaybackStatus::Stopped,
            speed: DEFAULT_SPEED,
        }
    }
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    /// Whole percent complete, for the progress label
    pub fn percent(&self) -> u32 {
        (self.progress * 100.).round() as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockEvent {
    Advanced,
    /// Progress reached 1 and the clock stopped itself
    LapComplete,
}

/// Animation clock driving the normalized playback progress.
///
/// The host calls `tick_at` once per display refresh with a monotonic timestamp, or `advance`
/// with an explicit delta. All mutation goes through these methods and the user actions, which
/// run on the same thread between ticks.
#[derive(Clone, Debug)]
pub struct PlaybackClock {
    state: PlaybackState,
    master_duration_s: Option<f64>,
    last_tick_s: Option<f64>,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self {
            state: PlaybackState::default(),
            master_duration_s: None,
            last_tick_s: None,
        }
    }
}

impl PlaybackClock {
    pub fn new(master_duration_s: Option<f64>) -> Self {
        Self {
            master_duration_s: master_duration_s.filter(|d| *d > 0.),
            ..Default::default()
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn progress(&self) -> f64 {
        self.state.progress
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn master_duration_s(&self) -> Option<f64> {
        self.master_duration_s
    }

    /// Swaps the timeline being played and resets to the start. A `None` duration leaves
    /// the clock unable to play until drivers are selected again.
    pub fn set_master_duration(&mut self, master_duration_s: Option<f64>) {
        self.master_duration_s = master_duration_s.filter(|d| *d > 0.);
        self.state = PlaybackState {
            speed: self.state.speed,
            ..PlaybackState::default()
        };
        self.last_tick_s = None;
    }

    pub fn play(&mut self) -> Result<(), SlipstreamError> {
        if self.master_duration_s.is_none() {
            return Err(SlipstreamError::NoDriversSelected);
        }
        if self.is_playing() {
            return Ok(());
        }
        // replaying a finished lap starts over
        if self.state.progress >= 1. {
            self.state.progress = 0.;
        }
        self.state.status = PlaybackStatus::Playing;
        // the gap spent paused must never count as elapsed playback time
        self.last_tick_s = None;
        debug!("Playback started at {:.3}", self.state.progress);
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.is_playing() {
            self.state.status = PlaybackStatus::Stopped;
            self.last_tick_s = None;
            debug!("Playback paused at {:.3}", self.state.progress);
        }
    }

    pub fn toggle(&mut self) -> Result<(), SlipstreamError> {
        if self.is_playing() {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Jumps to `progress`, clamped into `[0, 1]`, without changing the play state
    pub fn seek(&mut self, progress: f64) {
        self.state.progress = if progress.is_nan() {
            0.
        } else {
            progress.clamp(0., 1.)
        };
    }

    /// Back to the start, stopped, at normal speed
    pub fn reset(&mut self) {
        self.state = PlaybackState::default();
        self.last_tick_s = None;
    }

    pub fn set_speed(&mut self, multiplier: f64) -> Result<(), SlipstreamError> {
        if !(multiplier.is_finite() && multiplier > 0.) {
            return Err(SlipstreamError::InvalidSpeed { multiplier });
        }
        self.state.speed = multiplier;
        Ok(())
    }

    /// Advances using the delta since the previous tick's `timestamp_s`.
    ///
    /// The first tick after `play` only records the timestamp. Returns `None` while stopped,
    /// which is the host's signal to stop scheduling ticks.
    pub fn tick_at(&mut self, timestamp_s: f64) -> Option<ClockEvent> {
        if !self.is_playing() {
            return None;
        }
        let delta_s = match self.last_tick_s.replace(timestamp_s) {
            Some(previous) => (timestamp_s - previous).max(0.),
            None => 0.,
        };
        self.advance(delta_s)
    }

    /// Advances by `delta_s` of wall-clock time scaled by the speed multiplier
    pub fn advance(&mut self, delta_s: f64) -> Option<ClockEvent> {
        if !self.is_playing() {
            return None;
        }
        let duration_s = self.master_duration_s?;

        let step = delta_s.max(0.) / duration_s * self.state.speed;
        self.state.progress = (self.state.progress + step).min(1.);
        if self.state.progress >= 1. {
            self.state.progress = 1.;
            self.state.status = PlaybackStatus::Stopped;
            self.last_tick_s = None;
            debug!("Playback reached the end of the lap");
            return Some(ClockEvent::LapComplete);
        }
        Some(ClockEvent::Advanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn playing_clock(duration_s: f64) -> PlaybackClock {
        let mut clock = PlaybackClock::new(Some(duration_s));
        clock.play().unwrap();
        clock
    }

    #[test]
    fn test_half_lap_after_half_duration() {
        let mut clock = playing_clock(60.);
        assert_eq!(clock.advance(30.), Some(ClockEvent::Advanced));
        approx::assert_relative_eq!(clock.progress(), 0.5);
        assert!(clock.is_playing());
    }

    #[test]
    fn test_stops_at_lap_end() {
        let mut clock = playing_clock(60.);
        assert_eq!(clock.advance(61.), Some(ClockEvent::LapComplete));
        assert_eq!(clock.progress(), 1.);
        assert_eq!(clock.state().status, PlaybackStatus::Stopped);
        assert_eq!(clock.advance(1.), None);
        assert_eq!(clock.tick_at(100.), None);
    }

    #[test]
    fn test_speed_multiplier() {
        let mut clock = playing_clock(60.);
        clock.set_speed(2.).unwrap();
        clock.advance(15.);
        approx::assert_relative_eq!(clock.progress(), 0.5);
    }

    #[test]
    fn test_invalid_speed_rejected() {
        let mut clock = PlaybackClock::new(Some(60.));
        assert!(matches!(
            clock.set_speed(0.),
            Err(SlipstreamError::InvalidSpeed { .. })
        ));
        assert!(clock.set_speed(-1.).is_err());
        assert!(clock.set_speed(f64::NAN).is_err());
        assert_eq!(clock.state().speed, DEFAULT_SPEED);
    }

    #[test]
    fn test_play_without_timeline_fails() {
        let mut clock = PlaybackClock::default();
        assert!(matches!(
            clock.play(),
            Err(SlipstreamError::NoDriversSelected)
        ));
        assert!(!clock.is_playing());
    }

    #[test]
    fn test_resume_discards_pause_gap() {
        let mut clock = playing_clock(60.);
        clock.tick_at(10.);
        clock.tick_at(16.);
        approx::assert_relative_eq!(clock.progress(), 0.1);

        clock.pause();
        assert_eq!(clock.tick_at(40.), None);
        clock.play().unwrap();
        // first tick after resuming only re-anchors the timestamp
        assert_eq!(clock.tick_at(1_000.), Some(ClockEvent::Advanced));
        approx::assert_relative_eq!(clock.progress(), 0.1);
        clock.tick_at(1_003.);
        approx::assert_relative_eq!(clock.progress(), 0.15);
    }

    #[test]
    fn test_seek_clamps_and_keeps_state() {
        let mut clock = playing_clock(60.);
        clock.seek(1.5);
        assert_eq!(clock.progress(), 1.);
        assert!(clock.is_playing());
        clock.seek(-0.2);
        assert_eq!(clock.progress(), 0.);
        clock.pause();
        clock.seek(0.4);
        assert_eq!(clock.progress(), 0.4);
        assert!(!clock.is_playing());
    }

    #[test]
    fn test_reset_and_timeline_change() {
        let mut clock = playing_clock(60.);
        clock.set_speed(2.5).unwrap();
        clock.advance(10.);
        clock.reset();
        assert_eq!(clock.progress(), 0.);
        assert!(!clock.is_playing());
        assert_eq!(clock.state().speed, DEFAULT_SPEED);

        // a timeline change restarts the lap but keeps the chosen speed
        clock.set_speed(2.5).unwrap();
        clock.play().unwrap();
        clock.advance(10.);
        clock.set_master_duration(None);
        assert_eq!(clock.progress(), 0.);
        assert!(!clock.is_playing());
        assert_eq!(clock.state().speed, 2.5);
        assert!(clock.play().is_err());
    }

    #[test]
    fn test_play_after_completion_restarts() {
        let mut clock = playing_clock(60.);
        clock.advance(60.);
        assert!(!clock.is_playing());
        clock.play().unwrap();
        assert_eq!(clock.progress(), 0.);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_progress_stays_in_range(
            duration in 30.0f64..150.0,
            speed in MIN_SPEED..=MAX_SPEED,
            deltas in prop::collection::vec(0.0f64..0.5, 1..400),
        ) {
            let mut clock = playing_clock(duration);
            clock.set_speed(speed).unwrap();
            let mut previous = clock.progress();
            for delta in deltas {
                clock.advance(delta);
                prop_assert!(clock.progress() >= previous);
                prop_assert!((0.0..=1.0).contains(&clock.progress()));
                previous = clock.progress();
            }
        }
    }
}
