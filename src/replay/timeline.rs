use crate::SlipstreamError;

use super::lap_analyzer::FastestLapWindow;

/// Slowest fastest-lap time among the compared drivers
pub fn compute_master_duration(fastest_laps: &[FastestLapWindow]) -> Result<f64, SlipstreamError> {
    fastest_laps
        .iter()
        .map(|window| window.lap_time_s)
        .reduce(f64::max)
        .ok_or(SlipstreamError::NoDriversSelected)
}

/// Shared playback timeline built from the selected drivers' fastest laps.
///
/// A normalized progress `p` in `[0, 1]` spans the slowest lap. Each driver moves through its own
/// series at its own lap pace, so it crosses the line when its real lap would have ended and then
/// stays on its last sample for the rest of the comparison.
#[derive(Clone, Debug, PartialEq)]
pub struct MasterTimeline {
    duration_s: f64,
}

impl MasterTimeline {
    pub fn new(fastest_laps: &[FastestLapWindow]) -> Result<Self, SlipstreamError> {
        Ok(Self {
            duration_s: compute_master_duration(fastest_laps)?,
        })
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    /// Seconds into the slowest lap
    pub fn master_elapsed(&self, progress: f64) -> f64 {
        progress.clamp(0., 1.) * self.duration_s
    }

    /// How far through its own lap a driver is, in `[0, 1]`
    pub fn driver_fraction(&self, lap_time_s: Option<f64>, progress: f64) -> f64 {
        let progress = progress.clamp(0., 1.);
        match lap_time_s {
            Some(lap_time_s) if lap_time_s > 0. => {
                (self.master_elapsed(progress) / lap_time_s).min(1.)
            }
            _ => progress,
        }
    }

    /// Time to feed the interpolator for a driver's series at the shared `progress`
    pub fn to_driver_local_elapsed(
        &self,
        lap_time_s: Option<f64>,
        series_max_elapsed: f64,
        progress: f64,
    ) -> f64 {
        self.driver_fraction(lap_time_s, progress) * series_max_elapsed
    }
}
