// Domain records for the OpenF1 telemetry provider and the `DataSource` seam the dashboard fetches through

pub mod client;
pub mod recording;
pub(crate) mod wire;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SlipstreamError;

pub use client::OpenF1Client;
pub use recording::{Record, RecordedSource, record_session, write_recording};

/// Fallback team colours, picked by car number when the provider has none
const FALLBACK_TEAM_COLOURS: [[u8; 3]; 6] = [
    [0xED, 0x11, 0x31],
    [0xFF, 0x80, 0x00],
    [0x00, 0x5A, 0xFF],
    [0x2D, 0x82, 0x6D],
    [0xDC, 0x14, 0x3C],
    [0xF5, 0x80, 0x20],
];

/// A completed session (practice, qualifying, race...) from the provider catalog
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub session_key: u32,
    pub session_name: String,
    pub session_type: String,
    pub date_start: DateTime<Utc>,
    pub date_end: DateTime<Utc>,
    pub location: String,
    pub country_name: String,
    pub circuit_short_name: String,
    pub year: i32,
}

impl Session {
    /// Label used by the session selector, e.g. "Monza - Qualifying"
    pub fn label(&self) -> String {
        format!("{} - {}", self.location, self.session_name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Driver {
    pub session_key: u32,
    pub driver_number: u32,
    pub full_name: String,
    pub name_acronym: String,
    pub team_name: String,
    /// Six hex digits without the leading '#', as the provider sends it
    pub team_colour: Option<String>,
}

impl Driver {
    pub fn team_colour_rgb(&self) -> [u8; 3] {
        self.team_colour
            .as_deref()
            .and_then(parse_hex_colour)
            .unwrap_or(FALLBACK_TEAM_COLOURS[self.driver_number as usize % FALLBACK_TEAM_COLOURS.len()])
    }
}

fn parse_hex_colour(hex: &str) -> Option<[u8; 3]> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/// One lap of one driver
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LapRecord {
    pub session_key: u32,
    pub driver_number: u32,
    pub lap_number: u32,
    pub date_start: DateTime<Utc>,
    /// Lap time in seconds
    pub lap_duration: Option<f64>,
    pub sector_durations: [Option<f64>; 3],
    pub is_pit_out_lap: bool,
}

impl LapRecord {
    /// A lap counts for fastest lap purposes when it has a positive duration and is not a pit-out lap
    pub fn is_valid(&self) -> bool {
        !self.is_pit_out_lap
            && self
                .lap_duration
                .is_some_and(|duration| duration.is_finite() && duration > 0.)
    }
}

/// Track position in the provider's world coordinates
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Car sensor bundle
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CarSensors {
    /// km/h
    pub speed: f64,
    pub gear: u8,
    /// 0-100
    pub throttle: f64,
    /// 0-100
    pub brake: f64,
    /// Raw DRS code, see `DrsState::from_raw`
    pub drs: Option<u8>,
    pub rpm: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PositionSample {
    pub session_key: u32,
    pub driver_number: u32,
    pub date: DateTime<Utc>,
    pub position: Position,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SensorSample {
    pub session_key: u32,
    pub driver_number: u32,
    pub date: DateTime<Utc>,
    pub sensors: CarSensors,
}

/// Provider of completed-session data.
///
/// Implementations only fetch and validate. Every error is treated by the caller as
/// "series unavailable" for the driver it concerns.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn sessions(&self, year: i32) -> Result<Vec<Session>, SlipstreamError>;

    async fn session(&self, session_key: u32) -> Result<Option<Session>, SlipstreamError>;

    async fn drivers(&self, session_key: u32) -> Result<Vec<Driver>, SlipstreamError>;

    /// Laps of one driver, or of the whole field when `driver_number` is `None`
    async fn laps(
        &self,
        session_key: u32,
        driver_number: Option<u32>,
    ) -> Result<Vec<LapRecord>, SlipstreamError>;

    /// Location samples within the inclusive `[start, end]` window
    async fn positions(
        &self,
        session_key: u32,
        driver_number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PositionSample>, SlipstreamError>;

    /// Car sensor samples within the inclusive `[start, end]` window
    async fn sensors(
        &self,
        session_key: u32,
        driver_number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SensorSample>, SlipstreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lap(duration: Option<f64>, pit_out: bool) -> LapRecord {
        LapRecord {
            session_key: 1,
            driver_number: 1,
            lap_number: 1,
            date_start: Utc::now(),
            lap_duration: duration,
            sector_durations: [None; 3],
            is_pit_out_lap: pit_out,
        }
    }

    #[test]
    fn test_lap_validity() {
        assert!(lap(Some(90.5), false).is_valid());
        assert!(!lap(Some(90.5), true).is_valid());
        assert!(!lap(None, false).is_valid());
        assert!(!lap(Some(0.), false).is_valid());
        assert!(!lap(Some(-3.), false).is_valid());
        assert!(!lap(Some(f64::NAN), false).is_valid());
    }

    #[test]
    fn test_team_colour() {
        let mut driver = Driver {
            session_key: 1,
            driver_number: 1,
            full_name: "Max VERSTAPPEN".to_string(),
            name_acronym: "VER".to_string(),
            team_name: "Red Bull Racing".to_string(),
            team_colour: Some("3671C6".to_string()),
        };
        assert_eq!(driver.team_colour_rgb(), [0x36, 0x71, 0xC6]);

        driver.team_colour = Some("not a colour".to_string());
        assert_eq!(driver.team_colour_rgb(), FALLBACK_TEAM_COLOURS[1]);

        driver.team_colour = None;
        driver.driver_number = 6;
        assert_eq!(driver.team_colour_rgb(), FALLBACK_TEAM_COLOURS[0]);
    }
}
