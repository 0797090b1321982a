// Continuous estimates from sparse, irregularly sampled position and sensor series

use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};

use crate::openf1::{CarSensors, Position, PositionSample, SensorSample};

/// Raw DRS codes the provider reports while the flap is open
const DRS_OPEN_CODES: [u8; 3] = [10, 12, 14];

/// Linear blend between two readings; `t` is in `[0, 1]`
pub trait Interpolate: Clone {
    fn interpolate(&self, next: &Self, t: f64) -> Self;
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Categorical values come from one of the bracketing samples, the earlier one on ties
fn nearest<T: Copy>(a: T, b: T, t: f64) -> T {
    if t <= 0.5 { a } else { b }
}

impl Interpolate for Position {
    fn interpolate(&self, next: &Self, t: f64) -> Self {
        Position {
            x: lerp(self.x, next.x, t),
            y: lerp(self.y, next.y, t),
            z: lerp(self.z, next.z, t),
        }
    }
}

impl Interpolate for CarSensors {
    fn interpolate(&self, next: &Self, t: f64) -> Self {
        CarSensors {
            speed: lerp(self.speed, next.speed, t),
            gear: nearest(self.gear, next.gear, t),
            throttle: lerp(self.throttle, next.throttle, t),
            brake: lerp(self.brake, next.brake, t),
            drs: nearest(self.drs, next.drs, t),
            rpm: lerp(self.rpm, next.rpm, t),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrsState {
    On,
    Off,
}

impl DrsState {
    /// Fixed lookup of the provider's DRS encoding. Anything outside the open codes is Off.
    pub fn from_raw(raw: Option<u8>) -> Self {
        match raw {
            Some(code) if DRS_OPEN_CODES.contains(&code) => DrsState::On,
            _ => DrsState::Off,
        }
    }
}

impl Display for DrsState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrsState::On => write!(f, "ON"),
            DrsState::Off => write!(f, "OFF"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SamplePoint<T> {
    pub date: DateTime<Utc>,
    /// Seconds since the first sample of the series
    pub elapsed: f64,
    pub value: T,
}

/// Samples ordered by `elapsed`, ascending
#[derive(Clone, Debug, PartialEq)]
pub struct Series<T> {
    points: Vec<SamplePoint<T>>,
}

impl<T> Default for Series<T> {
    fn default() -> Self {
        Self { points: Vec::new() }
    }
}

impl<T: Interpolate> Series<T> {
    /// Sorts by timestamp and derives `elapsed` from the first sample
    pub fn from_samples(mut samples: Vec<(DateTime<Utc>, T)>) -> Self {
        samples.sort_by_key(|(date, _)| *date);
        let origin = samples.first().map(|(date, _)| *date);
        let points = samples
            .into_iter()
            .map(|(date, value)| SamplePoint {
                date,
                elapsed: origin.map_or(0., |origin| seconds_between(origin, date)),
                value,
            })
            .collect();
        Self { points }
    }

    /// Wraps already ordered points. Ordering is the caller's responsibility.
    pub fn from_points(points: Vec<SamplePoint<T>>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[SamplePoint<T>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Elapsed time of the last sample, 0 for an empty series
    pub fn max_elapsed(&self) -> f64 {
        self.points.last().map_or(0., |p| p.elapsed)
    }

    /// Samples up to and including `elapsed`
    pub fn up_to(&self, elapsed: f64) -> &[SamplePoint<T>] {
        let end = self.points.partition_point(|p| p.elapsed <= elapsed);
        &self.points[..end]
    }

    pub fn interpolate(&self, elapsed: f64) -> Option<SamplePoint<T>> {
        interpolate(&self.points, elapsed)
    }
}

fn seconds_between(origin: DateTime<Utc>, date: DateTime<Utc>) -> f64 {
    let span = date - origin;
    match span.num_microseconds() {
        Some(micros) => micros as f64 / 1e6,
        None => span.num_milliseconds() as f64 / 1e3,
    }
}

/// Value of `series` at `elapsed`.
///
/// Clamps to the first and last samples outside the series range and returns `None` for an
/// empty series. Querying exactly at a sample's elapsed time returns that sample unchanged.
pub fn interpolate<T: Interpolate>(
    series: &[SamplePoint<T>],
    elapsed: f64,
) -> Option<SamplePoint<T>> {
    let first = series.first()?;
    let last = series.last()?;
    if elapsed.is_nan() || elapsed <= first.elapsed {
        return Some(first.clone());
    }
    if elapsed >= last.elapsed {
        return Some(last.clone());
    }

    // first index strictly after `elapsed`, always in 1..len given the clamps above
    let upper = series.partition_point(|p| p.elapsed <= elapsed);
    let (a, b) = (&series[upper - 1], &series[upper]);
    let span = b.elapsed - a.elapsed;
    if a.elapsed == elapsed || span <= 0. {
        return Some(a.clone());
    }

    let t = (elapsed - a.elapsed) / span;
    let span_us = (b.date - a.date).num_microseconds().unwrap_or(0) as f64;
    let offset = Duration::microseconds((span_us * t).round() as i64);
    Some(SamplePoint {
        date: a.date + offset,
        elapsed,
        value: a.value.interpolate(&b.value, t),
    })
}

impl From<Vec<PositionSample>> for Series<Position> {
    fn from(samples: Vec<PositionSample>) -> Self {
        Series::from_samples(samples.into_iter().map(|s| (s.date, s.position)).collect())
    }
}

impl From<Vec<SensorSample>> for Series<CarSensors> {
    fn from(samples: Vec<SensorSample>) -> Self {
        Series::from_samples(samples.into_iter().map(|s| (s.date, s.sensors)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn origin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 9, 16, 13, 2, 1).unwrap()
    }

    fn sensors(speed: f64, gear: u8, drs: Option<u8>) -> CarSensors {
        CarSensors {
            speed,
            gear,
            throttle: 100.,
            brake: 0.,
            drs,
            rpm: 10_000.,
        }
    }

    fn sensor_series(points: &[(f64, CarSensors)]) -> Series<CarSensors> {
        Series::from_samples(
            points
                .iter()
                .map(|(secs, value)| {
                    (
                        origin() + Duration::microseconds((secs * 1e6) as i64),
                        *value,
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_empty_series_has_no_signal() {
        let series: Series<CarSensors> = Series::default();
        assert!(series.interpolate(3.).is_none());
        assert_eq!(series.max_elapsed(), 0.);
    }

    #[test]
    fn test_linear_speed() {
        let series = sensor_series(&[
            (0., sensors(100., 3, None)),
            (10., sensors(200., 4, None)),
        ]);
        let sample = series.interpolate(5.).unwrap();
        assert_eq!(sample.value.speed, 150.);
        assert_eq!(sample.elapsed, 5.);
        assert_eq!(sample.date, origin() + Duration::seconds(5));
    }

    #[test]
    fn test_gear_is_nearest_sample() {
        let series = sensor_series(&[
            (0., sensors(100., 3, Some(8))),
            (10., sensors(200., 4, Some(12))),
        ]);
        assert_eq!(series.interpolate(4.).unwrap().value.gear, 3);
        assert_eq!(series.interpolate(6.).unwrap().value.gear, 4);
        // equidistant prefers the earlier sample
        assert_eq!(series.interpolate(5.).unwrap().value.gear, 3);
        assert_eq!(series.interpolate(5.).unwrap().value.drs, Some(8));
        assert_eq!(series.interpolate(7.).unwrap().value.drs, Some(12));
    }

    #[test]
    fn test_clamps_to_ends() {
        let series = sensor_series(&[
            (0., sensors(100., 3, None)),
            (1., sensors(120., 3, None)),
            (2., sensors(140., 4, None)),
        ]);
        assert_eq!(series.interpolate(-1.).unwrap(), series.points()[0]);
        assert_eq!(series.interpolate(f64::NAN).unwrap(), series.points()[0]);
        assert_eq!(series.interpolate(99.).unwrap(), series.points()[2]);
    }

    #[test]
    fn test_from_samples_sorts_and_derives_elapsed() {
        let start = origin();
        let series: Series<Position> = Series::from_samples(vec![
            (start + Duration::milliseconds(500), Position { x: 2., y: 0., z: 0. }),
            (start, Position { x: 1., y: 0., z: 0. }),
            (start + Duration::milliseconds(1250), Position { x: 3., y: 0., z: 0. }),
        ]);
        let elapsed: Vec<f64> = series.points().iter().map(|p| p.elapsed).collect();
        assert_eq!(elapsed, vec![0., 0.5, 1.25]);
        assert_eq!(series.points()[0].value.x, 1.);
        assert_eq!(series.max_elapsed(), 1.25);
        assert_eq!(series.up_to(0.6).len(), 2);
        assert_eq!(series.up_to(-1.).len(), 0);
    }

    #[test]
    fn test_duplicate_timestamps_do_not_divide_by_zero() {
        let series = Series::from_points(vec![
            SamplePoint { date: origin(), elapsed: 0., value: Position::default() },
            SamplePoint { date: origin(), elapsed: 1., value: Position { x: 1., y: 1., z: 0. } },
            SamplePoint { date: origin(), elapsed: 1., value: Position { x: 5., y: 5., z: 0. } },
            SamplePoint { date: origin(), elapsed: 2., value: Position { x: 9., y: 9., z: 0. } },
        ]);
        let sample = series.interpolate(1.5).unwrap();
        assert!(sample.value.x.is_finite());
        assert_eq!(sample.value.x, 7.);
    }

    #[test]
    fn test_drs_classification() {
        for code in [10, 12, 14] {
            assert_eq!(DrsState::from_raw(Some(code)), DrsState::On);
        }
        for code in [0, 1, 7, 8, 13] {
            assert_eq!(DrsState::from_raw(Some(code)), DrsState::Off);
        }
        assert_eq!(DrsState::from_raw(None), DrsState::Off);
        assert_eq!(DrsState::On.to_string(), "ON");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_query_at_sample_returns_sample(
            steps in prop::collection::vec((1u32..2_000, -5_000.0f64..5_000.0, -5_000.0f64..5_000.0), 1..60),
        ) {
            let mut at_ms = 0i64;
            let samples = steps
                .iter()
                .map(|&(step_ms, x, y)| {
                    at_ms += step_ms as i64;
                    (origin() + Duration::milliseconds(at_ms), Position { x, y, z: 0. })
                })
                .collect();
            let series: Series<Position> = Series::from_samples(samples);

            for point in series.points() {
                prop_assert_eq!(series.interpolate(point.elapsed).unwrap(), point.clone());
            }
        }

        #[test]
        fn prop_interpolated_speed_within_bracket(
            a in 0.0f64..350.0,
            b in 0.0f64..350.0,
            query in 0.0f64..10.0,
        ) {
            let series = sensor_series(&[(0., sensors(a, 5, None)), (10., sensors(b, 6, None))]);
            let speed = series.interpolate(query).unwrap().value.speed;
            prop_assert!(speed >= a.min(b) - 1e-9 && speed <= a.max(b) + 1e-9);
        }
    }
}
