// Background data fetching. The UI sends requests and polls for outputs once per frame.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        mpsc::{self, Receiver, Sender},
    },
    thread,
};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use tokio::{
    sync::mpsc::{UnboundedSender, unbounded_channel},
    task::{self, LocalSet},
};

use crate::{
    SlipstreamError,
    openf1::{DataSource, Driver, LapRecord, Session},
    replay::{DriverReplay, interpolator::Series},
};

const DEFAULT_TRACE_CAPACITY: usize = 200;

#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
    Rows(usize),
    Failed(String),
}

/// One provider call, as recorded by a `TraceSink`
#[derive(Clone, Debug, PartialEq)]
pub struct FetchEvent {
    pub at: DateTime<Utc>,
    pub endpoint: &'static str,
    pub session_key: Option<u32>,
    pub driver_number: Option<u32>,
    pub outcome: FetchOutcome,
}

/// Receives a `FetchEvent` for every provider call the fetcher makes
pub trait TraceSink: Send + Sync {
    fn record(&self, event: FetchEvent);
}

/// Forwards fetch events to the log
#[derive(Default)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn record(&self, event: FetchEvent) {
        match &event.outcome {
            FetchOutcome::Rows(rows) => debug!(
                "{} (session {:?}, driver {:?}): {} rows",
                event.endpoint, event.session_key, event.driver_number, rows
            ),
            FetchOutcome::Failed(error) => warn!(
                "{} (session {:?}, driver {:?}) failed: {}",
                event.endpoint, event.session_key, event.driver_number, error
            ),
        }
    }
}

/// Keeps the most recent fetch events for the diagnostics window
pub struct MemoryTraceSink {
    capacity: usize,
    events: Mutex<VecDeque<FetchEvent>>,
}

impl Default for MemoryTraceSink {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TRACE_CAPACITY)
    }
}

impl MemoryTraceSink {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Oldest first
    pub fn events(&self) -> Vec<FetchEvent> {
        match self.events.lock() {
            Ok(events) => events.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn failures(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e.outcome, FetchOutcome::Failed(_)))
            .count()
    }
}

impl TraceSink for MemoryTraceSink {
    fn record(&self, event: FetchEvent) {
        LogTraceSink.record(event.clone());
        if let Ok(mut events) = self.events.lock() {
            if events.len() >= self.capacity {
                events.pop_front();
            }
            events.push_back(event);
        }
    }
}

fn traced<T>(
    trace: &dyn TraceSink,
    endpoint: &'static str,
    session_key: Option<u32>,
    driver_number: Option<u32>,
    result: Result<Vec<T>, SlipstreamError>,
) -> Option<Vec<T>> {
    let outcome = match &result {
        Ok(rows) => FetchOutcome::Rows(rows.len()),
        Err(e) => FetchOutcome::Failed(e.to_string()),
    };
    trace.record(FetchEvent {
        at: Utc::now(),
        endpoint,
        session_key,
        driver_number,
        outcome,
    });
    result.ok()
}

#[derive(Clone, Debug, PartialEq)]
pub enum FetchRequest {
    Sessions { year: i32 },
    /// Roster and whole-field laps of a session
    Session { generation: u64, session_key: u32 },
    Driver {
        generation: u64,
        session_key: u32,
        driver_number: u32,
    },
}

#[derive(Debug)]
pub enum FetchOutput {
    Sessions {
        year: i32,
        sessions: Result<Vec<Session>, SlipstreamError>,
    },
    Roster {
        generation: u64,
        drivers: Vec<Driver>,
    },
    FieldLaps {
        generation: u64,
        laps: Vec<LapRecord>,
    },
    Driver {
        generation: u64,
        replay: DriverReplay,
    },
}

/// Laps first, then the fastest lap's location and car data concurrently.
///
/// Never fails: anything that can't be fetched is left out of the replay.
pub async fn fetch_driver(
    source: &dyn DataSource,
    trace: &dyn TraceSink,
    session_key: u32,
    driver_number: u32,
) -> DriverReplay {
    let laps = traced(
        trace,
        "laps",
        Some(session_key),
        Some(driver_number),
        source.laps(session_key, Some(driver_number)).await,
    )
    .unwrap_or_default();

    let mut replay = DriverReplay::from_laps(driver_number, laps);
    let Some(window) = replay.fastest.clone() else {
        return replay;
    };

    let (positions, sensors) = futures::join!(
        source.positions(session_key, driver_number, window.start, window.end),
        source.sensors(session_key, driver_number, window.start, window.end),
    );
    replay.positions = traced(trace, "location", Some(session_key), Some(driver_number), positions)
        .filter(|rows| !rows.is_empty())
        .map(Series::from);
    replay.sensors = traced(trace, "car_data", Some(session_key), Some(driver_number), sensors)
        .filter(|rows| !rows.is_empty())
        .map(Series::from);
    replay
}

/// Fetches several drivers at once. One driver failing has no effect on the others.
pub async fn fetch_drivers(
    source: &dyn DataSource,
    trace: &dyn TraceSink,
    session_key: u32,
    driver_numbers: &[u32],
) -> Vec<DriverReplay> {
    join_all(
        driver_numbers
            .iter()
            .map(|n| fetch_driver(source, trace, session_key, *n)),
    )
    .await
}

async fn handle_request(
    source: &dyn DataSource,
    trace: &dyn TraceSink,
    request: FetchRequest,
    outputs: &Sender<FetchOutput>,
) {
    let sent = match request {
        FetchRequest::Sessions { year } => {
            let sessions = source.sessions(year).await;
            if let Err(e) = &sessions {
                warn!("Could not fetch sessions for {}: {}", year, e);
            }
            outputs.send(FetchOutput::Sessions { year, sessions })
        }
        FetchRequest::Session {
            generation,
            session_key,
        } => {
            let (drivers, laps) = futures::join!(
                source.drivers(session_key),
                source.laps(session_key, None)
            );
            let drivers = traced(trace, "drivers", Some(session_key), None, drivers);
            let laps = traced(trace, "laps", Some(session_key), None, laps);
            outputs
                .send(FetchOutput::Roster {
                    generation,
                    drivers: drivers.unwrap_or_default(),
                })
                .and_then(|_| {
                    outputs.send(FetchOutput::FieldLaps {
                        generation,
                        laps: laps.unwrap_or_default(),
                    })
                })
        }
        FetchRequest::Driver {
            generation,
            session_key,
            driver_number,
        } => {
            let replay = fetch_driver(source, trace, session_key, driver_number).await;
            outputs.send(FetchOutput::Driver { generation, replay })
        }
    };
    if sent.is_err() {
        debug!("Fetch output dropped, the receiver is gone");
    }
}

/// Handle to the fetch thread. Every request runs as its own task, so a slow provider call
/// never holds back requests sent after it.
pub struct Fetcher {
    requests: Option<UnboundedSender<FetchRequest>>,
    outputs: Receiver<FetchOutput>,
}

impl Fetcher {
    pub fn spawn(
        source: Arc<dyn DataSource>,
        trace: Arc<dyn TraceSink>,
    ) -> Result<Self, SlipstreamError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SlipstreamError::FetcherRuntime { source: e })?;
        let (request_tx, mut request_rx) = unbounded_channel::<FetchRequest>();
        let (output_tx, output_rx) = mpsc::channel::<FetchOutput>();

        thread::spawn(move || {
            info!("Data fetcher started");
            let tasks = LocalSet::new();
            runtime.block_on(tasks.run_until(async move {
                while let Some(request) = request_rx.recv().await {
                    debug!("Fetching {:?}", request);
                    let source = source.clone();
                    let trace = trace.clone();
                    let outputs = output_tx.clone();
                    task::spawn_local(async move {
                        handle_request(source.as_ref(), trace.as_ref(), request, &outputs).await;
                    });
                }
            }));
            // dropping the LocalSet cancels whatever is still in flight
            info!("Data fetcher stopped");
        });

        Ok(Self {
            requests: Some(request_tx),
            outputs: output_rx,
        })
    }

    pub fn request(&self, request: FetchRequest) -> Result<(), SlipstreamError> {
        self.requests
            .as_ref()
            .ok_or(SlipstreamError::FetcherStopped)?
            .send(request)
            .map_err(|_| SlipstreamError::FetcherStopped)
    }

    /// Outputs that arrived since the last call, without blocking
    pub fn poll(&self) -> Vec<FetchOutput> {
        self.outputs.try_iter().collect()
    }

    /// Blocks until the next output, for callers without a frame loop
    pub fn recv(&self) -> Result<FetchOutput, SlipstreamError> {
        self.outputs
            .recv()
            .map_err(|_| SlipstreamError::FetcherStopped)
    }
}

impl Drop for Fetcher {
    fn drop(&mut self) {
        // closing the request channel ends the thread's loop; in-flight calls are not awaited
        self.requests.take();
    }
}
