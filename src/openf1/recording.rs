// Offline sessions: JSON-lines recordings of provider data and a `DataSource` that replays them

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use itertools::Itertools;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    SlipstreamError,
    replay::lap_analyzer::{compare_fastest_laps, group_by_driver},
};

use super::{DataSource, Driver, LapRecord, PositionSample, SensorSample, Session};

/// One line of a recording file
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Record {
    Session(Session),
    Driver(Driver),
    Lap(LapRecord),
    Position(PositionSample),
    Sensor(SensorSample),
}

/// `DataSource` serving a previously recorded set of sessions
#[derive(Clone, Debug, Default)]
pub struct RecordedSource {
    sessions: Vec<Session>,
    drivers: Vec<Driver>,
    laps: Vec<LapRecord>,
    positions: Vec<PositionSample>,
    sensors: Vec<SensorSample>,
}

impl RecordedSource {
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut source = Self::default();
        for record in records {
            match record {
                Record::Session(session) => source.sessions.push(session),
                Record::Driver(driver) => source.drivers.push(driver),
                Record::Lap(lap) => source.laps.push(lap),
                Record::Position(sample) => source.positions.push(sample),
                Record::Sensor(sample) => source.sensors.push(sample),
            }
        }
        source.laps.sort_by_key(|l| (l.driver_number, l.lap_number));
        source.positions.sort_by_key(|s| s.date);
        source.sensors.sort_by_key(|s| s.date);
        source
    }

    pub fn from_file(path: &Path) -> Result<Self, SlipstreamError> {
        let records = serde_jsonlines::json_lines(path)
            .map_err(|e| SlipstreamError::RecordingIO { source: e })?
            .collect::<Result<Vec<Record>, std::io::Error>>()
            .map_err(|e| {
                error!("Could not parse recording {}: {}", path.display(), e);
                SlipstreamError::InvalidRecordingFile {
                    path: path.display().to_string(),
                }
            })?;
        info!("Loaded {} records from {}", records.len(), path.display());
        Ok(Self::from_records(records))
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Every recorded session, regardless of year
    pub fn all_sessions(&self) -> &[Session] {
        &self.sessions
    }
}

fn in_window(date: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    start <= date && date <= end
}

#[async_trait]
impl DataSource for RecordedSource {
    async fn sessions(&self, year: i32) -> Result<Vec<Session>, SlipstreamError> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.year == year)
            .cloned()
            .collect())
    }

    async fn session(&self, session_key: u32) -> Result<Option<Session>, SlipstreamError> {
        Ok(self
            .sessions
            .iter()
            .find(|s| s.session_key == session_key)
            .cloned())
    }

    async fn drivers(&self, session_key: u32) -> Result<Vec<Driver>, SlipstreamError> {
        Ok(self
            .drivers
            .iter()
            .filter(|d| d.session_key == session_key)
            .cloned()
            .collect())
    }

    async fn laps(
        &self,
        session_key: u32,
        driver_number: Option<u32>,
    ) -> Result<Vec<LapRecord>, SlipstreamError> {
        Ok(self
            .laps
            .iter()
            .filter(|l| l.session_key == session_key)
            .filter(|l| driver_number.is_none_or(|n| l.driver_number == n))
            .cloned()
            .collect())
    }

    async fn positions(
        &self,
        session_key: u32,
        driver_number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PositionSample>, SlipstreamError> {
        Ok(self
            .positions
            .iter()
            .filter(|s| s.session_key == session_key && s.driver_number == driver_number)
            .filter(|s| in_window(s.date, start, end))
            .cloned()
            .collect())
    }

    async fn sensors(
        &self,
        session_key: u32,
        driver_number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SensorSample>, SlipstreamError> {
        Ok(self
            .sensors
            .iter()
            .filter(|s| s.session_key == session_key && s.driver_number == driver_number)
            .filter(|s| in_window(s.date, start, end))
            .cloned()
            .collect())
    }
}

pub fn write_recording(path: &Path, records: &[Record]) -> Result<(), SlipstreamError> {
    serde_jsonlines::write_json_lines(path, records)
        .map_err(|e| SlipstreamError::RecordingIO { source: e })?;
    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Fetches a completed session with every driver's fastest-lap samples.
///
/// Drivers whose samples can't be fetched are kept without them, matching what the dashboard
/// would show for the same session.
pub async fn record_session(
    source: &dyn DataSource,
    session_key: u32,
) -> Result<Vec<Record>, SlipstreamError> {
    let Some(session) = source.session(session_key).await? else {
        warn!("Session {} not found", session_key);
        return Ok(Vec::new());
    };
    let drivers = source.drivers(session_key).await?;
    let laps = source.laps(session_key, None).await?;

    let windows = compare_fastest_laps(&group_by_driver(&laps))
        .by_driver
        .into_values()
        .filter_map(Result::ok)
        .collect_vec();

    let samples = join_all(windows.iter().map(|window| async move {
        let positions = source
            .positions(session_key, window.driver_number, window.start, window.end)
            .await;
        let sensors = source
            .sensors(session_key, window.driver_number, window.start, window.end)
            .await;
        (window.driver_number, positions, sensors)
    }))
    .await;

    let mut records = vec![Record::Session(session)];
    records.extend(drivers.into_iter().map(Record::Driver));
    records.extend(laps.into_iter().map(Record::Lap));
    for (driver_number, positions, sensors) in samples {
        match positions {
            Ok(positions) => records.extend(positions.into_iter().map(Record::Position)),
            Err(e) => warn!("Skipping positions of driver {}: {}", driver_number, e),
        }
        match sensors {
            Ok(sensors) => records.extend(sensors.into_iter().map(Record::Sensor)),
            Err(e) => warn!("Skipping car data of driver {}: {}", driver_number, e),
        }
    }
    Ok(records)
}
