use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;

use crate::SlipstreamError;

use super::{
    DataSource, Driver, LapRecord, PositionSample, SensorSample, Session,
    wire::{self, ApiCarData, ApiDriver, ApiLap, ApiLocation, ApiSession},
};

pub const DEFAULT_API_BASE_URL: &str = "https://api.openf1.org/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `DataSource` backed by the public OpenF1 REST API
pub struct OpenF1Client {
    http: reqwest::Client,
    base_url: String,
}

impl Default for OpenF1Client {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

impl OpenF1Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|e| {
                    warn!("Falling back to a client without request timeout: {}", e);
                    reqwest::Client::new()
                }),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &str,
    ) -> Result<Vec<T>, SlipstreamError> {
        // `date>=` style filters must reach the provider unencoded
        let url = format!("{}/{}?{}", self.base_url, endpoint, query);
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SlipstreamError::HttpRequest {
                endpoint: endpoint.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlipstreamError::HttpStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| SlipstreamError::ResponseDecode {
                endpoint: endpoint.to_string(),
                source: e,
            })
    }
}

fn window_query(
    session_key: u32,
    driver_number: u32,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> String {
    format!(
        "session_key={}&driver_number={}&date>={}&date<={}",
        session_key,
        driver_number,
        start.to_rfc3339_opts(SecondsFormat::Millis, true),
        end.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

#[async_trait]
impl DataSource for OpenF1Client {
    async fn sessions(&self, year: i32) -> Result<Vec<Session>, SlipstreamError> {
        let rows: Vec<ApiSession> = self.get("sessions", &format!("year={}", year)).await?;
        Ok(wire::sessions(rows))
    }

    async fn session(&self, session_key: u32) -> Result<Option<Session>, SlipstreamError> {
        let rows: Vec<ApiSession> = self
            .get("sessions", &format!("session_key={}", session_key))
            .await?;
        Ok(wire::sessions(rows).into_iter().next())
    }

    async fn drivers(&self, session_key: u32) -> Result<Vec<Driver>, SlipstreamError> {
        let rows: Vec<ApiDriver> = self
            .get("drivers", &format!("session_key={}", session_key))
            .await?;
        Ok(wire::drivers(rows))
    }

    async fn laps(
        &self,
        session_key: u32,
        driver_number: Option<u32>,
    ) -> Result<Vec<LapRecord>, SlipstreamError> {
        let query = match driver_number {
            Some(driver_number) => format!(
                "session_key={}&driver_number={}",
                session_key, driver_number
            ),
            None => format!("session_key={}", session_key),
        };
        let rows: Vec<ApiLap> = self.get("laps", &query).await?;
        Ok(wire::laps(rows))
    }

    async fn positions(
        &self,
        session_key: u32,
        driver_number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PositionSample>, SlipstreamError> {
        let rows: Vec<ApiLocation> = self
            .get(
                "location",
                &window_query(session_key, driver_number, start, end),
            )
            .await?;
        Ok(wire::positions(rows))
    }

    async fn sensors(
        &self,
        session_key: u32,
        driver_number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SensorSample>, SlipstreamError> {
        let rows: Vec<ApiCarData> = self
            .get(
                "car_data",
                &window_query(session_key, driver_number, start, end),
            )
            .await?;
        Ok(wire::sensors(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_query_format() {
        let start = Utc.with_ymd_and_hms(2023, 9, 16, 13, 2, 1).unwrap();
        let end = start + chrono::Duration::milliseconds(81_204);
        assert_eq!(
            window_query(9161, 1, start, end),
            "session_key=9161&driver_number=1&date>=2023-09-16T13:02:01.000Z&date<=2023-09-16T13:03:22.204Z"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = OpenF1Client::new("http://localhost:8080/v1/");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }
}
