use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;

use crate::{SlipstreamError, openf1::LapRecord};

/// Time window of a driver's fastest valid lap
#[derive(Clone, Debug, PartialEq)]
pub struct FastestLapWindow {
    pub driver_number: u32,
    pub lap_number: u32,
    pub lap_time_s: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FastestLapWindow {
    /// Length of the time window in seconds
    pub fn window_s(&self) -> f64 {
        let span = self.end - self.start;
        match span.num_nanoseconds() {
            Some(nanos) => nanos as f64 / 1e9,
            None => span.num_milliseconds() as f64 / 1e3,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LapSummary {
    pub total_laps: usize,
    pub valid_lap_count: usize,
    pub fastest_lap_number: Option<u32>,
    /// Fastest lap time as "81.204s"
    pub fastest_lap_time: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SectorPerformance {
    pub best_sectors: [f64; 3],
    /// Sum of the best sectors
    pub theoretical_best_s: f64,
    pub actual_fastest_s: f64,
    /// Theoretical best minus actual fastest, never positive
    pub improvement_s: f64,
    pub fastest_lap_sectors: [f64; 3],
}

#[derive(Clone, Debug, PartialEq)]
pub struct LeaderboardEntry {
    pub driver_number: u32,
    pub lap_number: u32,
    pub lap_time_s: f64,
}

#[derive(Debug)]
pub struct LapComparison {
    pub by_driver: BTreeMap<u32, Result<FastestLapWindow, SlipstreamError>>,
    /// Drivers with a resolvable fastest lap, quickest first
    pub leaderboard: Vec<LeaderboardEntry>,
}

impl LapComparison {
    pub fn overall_fastest(&self) -> Option<&LeaderboardEntry> {
        self.leaderboard.first()
    }
}

fn valid_laps(laps: &[LapRecord]) -> impl Iterator<Item = (&LapRecord, f64)> {
    laps.iter()
        .filter(|lap| lap.is_valid())
        .filter_map(|lap| lap.lap_duration.map(|duration| (lap, duration)))
}

/// Minimum-duration valid lap, first occurrence winning ties
fn fastest_valid(laps: &[LapRecord]) -> Option<(&LapRecord, f64)> {
    valid_laps(laps).fold(None, |fastest, (lap, duration)| match fastest {
        Some((_, best)) if best <= duration => fastest,
        _ => Some((lap, duration)),
    })
}

pub fn find_fastest_lap(laps: &[LapRecord]) -> Result<FastestLapWindow, SlipstreamError> {
    if laps.is_empty() {
        return Err(SlipstreamError::EmptyLaps);
    }

    let (lap, lap_time_s) = fastest_valid(laps).ok_or(SlipstreamError::NoValidLaps {
        lap_count: laps.len(),
    })?;

    let end = lap.date_start + Duration::nanoseconds((lap_time_s * 1e9).round() as i64);
    Ok(FastestLapWindow {
        driver_number: lap.driver_number,
        lap_number: lap.lap_number,
        lap_time_s,
        start: lap.date_start,
        end,
    })
}

pub fn summarize(laps: &[LapRecord]) -> LapSummary {
    let fastest = fastest_valid(laps);
    LapSummary {
        total_laps: laps.len(),
        valid_lap_count: valid_laps(laps).count(),
        fastest_lap_number: fastest.map(|(lap, _)| lap.lap_number),
        fastest_lap_time: fastest.map(|(_, duration)| format!("{:.3}s", duration)),
    }
}

/// Best sectors and theoretical best lap across valid laps that have all three sector times
pub fn analyze_sector_performance(laps: &[LapRecord]) -> Option<SectorPerformance> {
    let complete = valid_laps(laps)
        .filter_map(|(lap, duration)| match lap.sector_durations {
            [Some(s1), Some(s2), Some(s3)] => Some(([s1, s2, s3], duration)),
            _ => None,
        })
        .collect_vec();

    let best_sector = |i: usize| {
        complete
            .iter()
            .map(|(sectors, _)| sectors[i])
            .fold(f64::INFINITY, f64::min)
    };
    let best_sectors = [best_sector(0), best_sector(1), best_sector(2)];

    let (fastest_lap_sectors, actual_fastest_s) = complete
        .iter()
        .fold(None, |fastest: Option<([f64; 3], f64)>, &(sectors, duration)| {
            match fastest {
                Some((_, best)) if best <= duration => fastest,
                _ => Some((sectors, duration)),
            }
        })?;

    let theoretical_best_s = best_sectors.iter().sum::<f64>();
    Some(SectorPerformance {
        best_sectors,
        theoretical_best_s,
        actual_fastest_s,
        improvement_s: theoretical_best_s - actual_fastest_s,
        fastest_lap_sectors,
    })
}

/// Resolves every driver's fastest lap and ranks the drivers that have one
pub fn compare_fastest_laps(per_driver: &BTreeMap<u32, Vec<LapRecord>>) -> LapComparison {
    let by_driver: BTreeMap<u32, Result<FastestLapWindow, SlipstreamError>> = per_driver
        .iter()
        .map(|(driver_number, laps)| (*driver_number, find_fastest_lap(laps)))
        .collect();

    let leaderboard = by_driver
        .iter()
        .filter_map(|(driver_number, result)| {
            result.as_ref().ok().map(|window| LeaderboardEntry {
                driver_number: *driver_number,
                lap_number: window.lap_number,
                lap_time_s: window.lap_time_s,
            })
        })
        .sorted_by(|a, b| a.lap_time_s.total_cmp(&b.lap_time_s))
        .collect_vec();

    LapComparison {
        by_driver,
        leaderboard,
    }
}

/// Groups a whole-field lap list by driver number
pub fn group_by_driver(laps: &[LapRecord]) -> BTreeMap<u32, Vec<LapRecord>> {
    let mut grouped: BTreeMap<u32, Vec<LapRecord>> = BTreeMap::new();
    for lap in laps {
        grouped.entry(lap.driver_number).or_default().push(lap.clone());
    }
    grouped
}
