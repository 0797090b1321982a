// Raw OpenF1 JSON rows. Anything the provider may omit is optional here and validated on conversion.

use chrono::{DateTime, Datelike, Utc};
use log::debug;
use serde::Deserialize;

use super::{CarSensors, Driver, LapRecord, Position, PositionSample, SensorSample, Session};

#[derive(Deserialize, Debug)]
pub(crate) struct ApiSession {
    session_key: u32,
    session_name: Option<String>,
    session_type: Option<String>,
    date_start: Option<DateTime<Utc>>,
    date_end: Option<DateTime<Utc>>,
    location: Option<String>,
    country_name: Option<String>,
    circuit_short_name: Option<String>,
    year: Option<i32>,
}

impl ApiSession {
    fn into_session(self) -> Option<Session> {
        let date_start = self.date_start?;
        Some(Session {
            session_key: self.session_key,
            session_name: self.session_name.unwrap_or_else(|| "Session".to_string()),
            session_type: self.session_type.unwrap_or_default(),
            date_start,
            date_end: self.date_end.unwrap_or(date_start),
            location: self.location.unwrap_or_else(|| "Unknown".to_string()),
            country_name: self.country_name.unwrap_or_default(),
            circuit_short_name: self.circuit_short_name.unwrap_or_default(),
            year: self.year.unwrap_or_else(|| date_start.year()),
        })
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct ApiDriver {
    session_key: u32,
    driver_number: u32,
    full_name: Option<String>,
    broadcast_name: Option<String>,
    name_acronym: Option<String>,
    team_name: Option<String>,
    team_colour: Option<String>,
}

impl ApiDriver {
    fn into_driver(self) -> Option<Driver> {
        let full_name = self
            .full_name
            .or(self.broadcast_name)
            .unwrap_or_else(|| format!("Car {}", self.driver_number));
        Some(Driver {
            session_key: self.session_key,
            driver_number: self.driver_number,
            name_acronym: self
                .name_acronym
                .unwrap_or_else(|| self.driver_number.to_string()),
            full_name,
            team_name: self.team_name.unwrap_or_default(),
            team_colour: self.team_colour.filter(|c| !c.is_empty()),
        })
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct ApiLap {
    session_key: u32,
    driver_number: u32,
    lap_number: u32,
    date_start: Option<DateTime<Utc>>,
    lap_duration: Option<f64>,
    duration_sector_1: Option<f64>,
    duration_sector_2: Option<f64>,
    duration_sector_3: Option<f64>,
    is_pit_out_lap: Option<bool>,
}

impl ApiLap {
    fn into_lap(self) -> Option<LapRecord> {
        Some(LapRecord {
            session_key: self.session_key,
            driver_number: self.driver_number,
            lap_number: self.lap_number,
            date_start: self.date_start?,
            lap_duration: finite(self.lap_duration),
            sector_durations: [
                finite(self.duration_sector_1),
                finite(self.duration_sector_2),
                finite(self.duration_sector_3),
            ],
            is_pit_out_lap: self.is_pit_out_lap.unwrap_or(false),
        })
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct ApiLocation {
    session_key: u32,
    driver_number: u32,
    date: DateTime<Utc>,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
}

impl ApiLocation {
    fn into_sample(self) -> Option<PositionSample> {
        Some(PositionSample {
            session_key: self.session_key,
            driver_number: self.driver_number,
            date: self.date,
            position: Position {
                x: finite(self.x)?,
                y: finite(self.y)?,
                z: finite(self.z).unwrap_or(0.),
            },
        })
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct ApiCarData {
    session_key: u32,
    driver_number: u32,
    date: DateTime<Utc>,
    speed: Option<f64>,
    n_gear: Option<u8>,
    throttle: Option<f64>,
    brake: Option<f64>,
    drs: Option<u8>,
    rpm: Option<f64>,
}

impl ApiCarData {
    fn into_sample(self) -> Option<SensorSample> {
        Some(SensorSample {
            session_key: self.session_key,
            driver_number: self.driver_number,
            date: self.date,
            sensors: CarSensors {
                speed: finite(self.speed)?,
                gear: self.n_gear?,
                throttle: finite(self.throttle)?,
                brake: finite(self.brake)?,
                drs: self.drs,
                rpm: finite(self.rpm)?,
            },
        })
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Converts raw rows into domain records, dropping the ones that fail validation
pub(crate) fn validate_rows<A, T>(
    endpoint: &str,
    rows: Vec<A>,
    convert: impl Fn(A) -> Option<T>,
) -> (Vec<T>, usize) {
    let total = rows.len();
    let records: Vec<T> = rows.into_iter().filter_map(convert).collect();
    let dropped = total - records.len();
    if dropped > 0 {
        debug!(
            "{}: dropped {} of {} rows with missing or invalid fields",
            endpoint, dropped, total
        );
    }
    (records, dropped)
}

pub(crate) fn sessions(rows: Vec<ApiSession>) -> Vec<Session> {
    validate_rows("sessions", rows, ApiSession::into_session).0
}

pub(crate) fn drivers(rows: Vec<ApiDriver>) -> Vec<Driver> {
    validate_rows("drivers", rows, ApiDriver::into_driver).0
}

pub(crate) fn laps(rows: Vec<ApiLap>) -> Vec<LapRecord> {
    validate_rows("laps", rows, ApiLap::into_lap).0
}

pub(crate) fn positions(rows: Vec<ApiLocation>) -> Vec<PositionSample> {
    validate_rows("location", rows, ApiLocation::into_sample).0
}

pub(crate) fn sensors(rows: Vec<ApiCarData>) -> Vec<SensorSample> {
    validate_rows("car_data", rows, ApiCarData::into_sample).0
}
