use crate::openf1::{CarSensors, LapRecord, Position};

use super::{
    interpolator::{DrsState, Series},
    lap_analyzer::{FastestLapWindow, find_fastest_lap},
    timeline::MasterTimeline,
};

/// Shown in place of any value that has no data behind it
pub const UNKNOWN: &str = "—";

/// Telemetry of one driver at the shared playback instant.
///
/// Every field is `None` when the data behind it is missing, which the panel shows as `UNKNOWN`.
/// A missing reading is never reported as zero.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelemetryReading {
    pub driver_number: u32,
    pub speed_kph: Option<f64>,
    pub gear: Option<u8>,
    pub rpm: Option<f64>,
    pub throttle_pct: Option<f64>,
    pub brake_pct: Option<f64>,
    pub drs: Option<DrsState>,
    /// Seconds into the driver's own lap
    pub elapsed_s: Option<f64>,
    pub position: Option<Position>,
    pub fastest_lap_s: Option<f64>,
}

fn label_or_unknown<T>(value: Option<T>, format: impl FnOnce(T) -> String) -> String {
    value.map_or_else(|| UNKNOWN.to_string(), format)
}

impl TelemetryReading {
    pub fn unavailable(driver_number: u32) -> Self {
        Self {
            driver_number,
            ..Default::default()
        }
    }

    /// True when no car sensor values could be resolved
    pub fn sensors_unavailable(&self) -> bool {
        self.speed_kph.is_none()
    }

    pub fn speed_label(&self) -> String {
        label_or_unknown(self.speed_kph, |v| format!("{:.0}", v))
    }

    pub fn gear_label(&self) -> String {
        label_or_unknown(self.gear, |gear| match gear {
            0 => "N".to_string(),
            gear => gear.to_string(),
        })
    }

    pub fn rpm_label(&self) -> String {
        label_or_unknown(self.rpm, |v| format!("{:.0}", v))
    }

    pub fn throttle_label(&self) -> String {
        label_or_unknown(self.throttle_pct, |v| format!("{:.0}%", v))
    }

    pub fn brake_label(&self) -> String {
        label_or_unknown(self.brake_pct, |v| format!("{:.0}%", v))
    }

    pub fn drs_label(&self) -> String {
        label_or_unknown(self.drs, |drs| drs.to_string())
    }

    pub fn elapsed_label(&self) -> String {
        label_or_unknown(self.elapsed_s, |v| format!("{:.3}", v))
    }

    pub fn position_label(&self) -> String {
        label_or_unknown(self.position, |p| format!("{:.0},{:.0}", p.x, p.y))
    }

    pub fn fastest_lap_label(&self) -> String {
        label_or_unknown(self.fastest_lap_s, format_lap_time)
    }
}

/// Formats a lap time in seconds as `m:ss.mmm`
pub fn format_lap_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0. {
        return UNKNOWN.to_string();
    }
    let total_ms = (seconds * 1000.).round() as u64;
    format!(
        "{}:{:02}.{:03}",
        total_ms / 60_000,
        (total_ms / 1000) % 60,
        total_ms % 1000
    )
}

/// Resolves one driver's reading at `progress` on the shared timeline.
///
/// The sensor and position series are mapped to local elapsed time independently since their
/// sample windows never end at exactly the same instant.
pub fn sample(
    driver_number: u32,
    fastest: Option<&FastestLapWindow>,
    timeline: Option<&MasterTimeline>,
    positions: Option<&Series<Position>>,
    sensors: Option<&Series<CarSensors>>,
    progress: f64,
) -> TelemetryReading {
    let lap_time_s = fastest.map(|f| f.lap_time_s);
    let local_elapsed = |series_max_elapsed: f64| match timeline {
        Some(timeline) => timeline.to_driver_local_elapsed(lap_time_s, series_max_elapsed, progress),
        None => progress.clamp(0., 1.) * series_max_elapsed,
    };

    let sensor_sample = sensors.and_then(|s| s.interpolate(local_elapsed(s.max_elapsed())));
    let position_sample = positions.and_then(|s| s.interpolate(local_elapsed(s.max_elapsed())));

    let car = sensor_sample.as_ref().map(|s| s.value);
    TelemetryReading {
        driver_number,
        speed_kph: car.map(|c| c.speed),
        gear: car.map(|c| c.gear),
        rpm: car.map(|c| c.rpm),
        throttle_pct: car.map(|c| c.throttle),
        brake_pct: car.map(|c| c.brake),
        drs: car.map(|c| DrsState::from_raw(c.drs)),
        elapsed_s: sensor_sample
            .as_ref()
            .map(|s| s.elapsed)
            .or(position_sample.as_ref().map(|s| s.elapsed)),
        position: position_sample.map(|s| s.value),
        fastest_lap_s: lap_time_s,
    }
}

/// Holders of the fastest lap, for the leaderboard badges
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FastestBadges {
    /// Fastest valid lap of the whole session field
    pub overall: Option<u32>,
    /// Fastest among the compared drivers only
    pub among_selected: Option<u32>,
}

impl FastestBadges {
    pub fn compute(field_laps: &[LapRecord], selected: &[FastestLapWindow]) -> Self {
        Self {
            overall: find_fastest_lap(field_laps).ok().map(|f| f.driver_number),
            among_selected: selected
                .iter()
                .min_by(|a, b| a.lap_time_s.total_cmp(&b.lap_time_s))
                .map(|f| f.driver_number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn origin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 20, 14, 0, 0).unwrap()
    }

    fn window(driver_number: u32, lap_time_s: f64) -> FastestLapWindow {
        FastestLapWindow {
            driver_number,
            lap_number: 10,
            lap_time_s,
            start: origin(),
            end: origin() + Duration::milliseconds((lap_time_s * 1000.) as i64),
        }
    }

    fn sensor_series() -> Series<CarSensors> {
        Series::from_samples(vec![
            (
                origin(),
                CarSensors {
                    speed: 280.,
                    gear: 7,
                    throttle: 100.,
                    brake: 0.,
                    drs: Some(12),
                    rpm: 11_500.,
                },
            ),
            (
                origin() + Duration::seconds(80),
                CarSensors {
                    speed: 120.,
                    gear: 3,
                    throttle: 0.,
                    brake: 100.,
                    drs: Some(8),
                    rpm: 9_000.,
                },
            ),
        ])
    }

    fn position_series() -> Series<Position> {
        Series::from_samples(vec![
            (origin(), Position { x: -100., y: 20., z: 0. }),
            (origin() + Duration::seconds(80), Position { x: 300., y: 420., z: 0. }),
        ])
    }

    #[test]
    fn test_format_lap_time() {
        assert_eq!(format_lap_time(81.204), "1:21.204");
        assert_eq!(format_lap_time(59.9996), "1:00.000");
        assert_eq!(format_lap_time(7.5), "0:07.500");
        assert_eq!(format_lap_time(f64::NAN), UNKNOWN);
    }

    #[test]
    fn test_sample_midway() {
        let fastest = window(1, 80.);
        let timeline = MasterTimeline::new(&[fastest.clone()]).unwrap();
        let sensors = sensor_series();
        let positions = position_series();

        let reading = sample(
            1,
            Some(&fastest),
            Some(&timeline),
            Some(&positions),
            Some(&sensors),
            0.5,
        );
        assert_eq!(reading.speed_kph, Some(200.));
        assert_eq!(reading.gear, Some(7));
        assert_eq!(reading.drs, Some(DrsState::On));
        assert_eq!(reading.elapsed_s, Some(40.));
        assert_eq!(reading.position, Some(Position { x: 100., y: 220., z: 0. }));
        assert_eq!(reading.position_label(), "100,220");
        assert_eq!(reading.fastest_lap_label(), "1:20.000");
    }

    #[test]
    fn test_missing_sensors_are_unknown_not_zero() {
        let fastest = window(1, 80.);
        let positions = position_series();
        let reading = sample(1, Some(&fastest), None, Some(&positions), None, 0.25);

        assert!(reading.sensors_unavailable());
        assert_eq!(reading.speed_label(), UNKNOWN);
        assert_eq!(reading.throttle_label(), UNKNOWN);
        assert_eq!(reading.drs_label(), UNKNOWN);
        // position still resolves from the location series
        assert!(reading.position.is_some());
        assert_eq!(reading.elapsed_s, Some(20.));
    }

    #[test]
    fn test_empty_sensor_series_is_unknown() {
        let empty = Series::default();
        let reading = sample(4, None, None, None, Some(&empty), 0.5);
        assert_eq!(reading, TelemetryReading::unavailable(4));
        assert_eq!(reading.gear_label(), UNKNOWN);
    }

    #[test]
    fn test_fastest_badges() {
        let lap = |driver_number: u32, duration: f64| LapRecord {
            session_key: 9158,
            driver_number,
            lap_number: 3,
            date_start: origin(),
            lap_duration: Some(duration),
            sector_durations: [None; 3],
            is_pit_out_lap: false,
        };
        let field = vec![lap(1, 77.2), lap(16, 77.0), lap(44, 77.5)];
        let selected = vec![window(1, 77.2), window(44, 77.5)];

        let badges = FastestBadges::compute(&field, &selected);
        assert_eq!(badges.overall, Some(16));
        assert_eq!(badges.among_selected, Some(1));
        assert_eq!(FastestBadges::compute(&[], &[]), FastestBadges::default());
    }
}
