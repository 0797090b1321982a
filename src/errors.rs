// Error types for slipstream

use snafu::Snafu;
use std::io;

#[derive(Debug, Snafu)]
pub enum SlipstreamError {
    // Lap analysis errors
    #[snafu(display("Cannot find the fastest lap of an empty lap set"))]
    EmptyLaps,
    #[snafu(display("No valid racing laps found in {lap_count} laps"))]
    NoValidLaps { lap_count: usize },

    // Playback misuse. These point at a bug in the orchestrating code, not at missing data
    #[snafu(display("Playback requires at least one driver with a resolvable fastest lap"))]
    NoDriversSelected,
    #[snafu(display("Playback speed must be strictly positive, got {multiplier}"))]
    InvalidSpeed { multiplier: f64 },

    // Data provider errors
    #[snafu(display("Request to {endpoint} failed"))]
    HttpRequest {
        endpoint: String,
        source: reqwest::Error,
    },
    #[snafu(display("Request to {endpoint} returned HTTP {status}"))]
    HttpStatus { endpoint: String, status: u16 },
    #[snafu(display("Could not decode response from {endpoint}"))]
    ResponseDecode {
        endpoint: String,
        source: reqwest::Error,
    },
    #[snafu(display("Could not start the async runtime for the data fetcher"))]
    FetcherRuntime { source: io::Error },
    #[snafu(display("Data fetcher thread is no longer running"))]
    FetcherStopped,

    // Recording errors
    #[snafu(display("Invalid recording file: {path}"))]
    InvalidRecordingFile { path: String },
    #[snafu(display("Error reading or writing recording file"))]
    RecordingIO { source: io::Error },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },

    // UI errors
    #[snafu(display("Could not start the dashboard window: {description}"))]
    WindowStartup { description: String },
}
