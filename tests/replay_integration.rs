// Integration tests for the replay pipeline against recorded session data
//
// This test suite validates the complete workflow:
// 1. Write a recording file and load it back as a data source
// 2. Fetch the selected drivers the way the dashboard's fetcher does
// 3. Feed the results into the replay state
// 4. Drive the shared clock and check positions and telemetry per driver

use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use slipstream::{
    fetcher::{FetchOutcome, MemoryTraceSink, fetch_drivers},
    openf1::{
        CarSensors, DataSource, Driver, LapRecord, Position, PositionSample, Record,
        RecordedSource, SensorSample, Session, record_session, write_recording,
    },
    replay::{
        ReplayState,
        clock::ClockEvent,
        telemetry_sampler::{UNKNOWN, format_lap_time},
    },
};
use tempfile::TempDir;

const SESSION_KEY: u32 = 9165;
const VERSTAPPEN: u32 = 1;
const LECLERC: u32 = 16;

fn lap_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 9, 2, 14, 30, 0).unwrap()
}

fn session() -> Session {
    Session {
        session_key: SESSION_KEY,
        session_name: "Qualifying".to_string(),
        session_type: "Qualifying".to_string(),
        date_start: lap_start() - Duration::minutes(30),
        date_end: lap_start() + Duration::minutes(30),
        location: "Monza".to_string(),
        country_name: "Italy".to_string(),
        circuit_short_name: "Monza".to_string(),
        year: 2023,
    }
}

fn driver(driver_number: u32, acronym: &str, colour: &str) -> Driver {
    Driver {
        session_key: SESSION_KEY,
        driver_number,
        full_name: format!("Driver {}", acronym),
        name_acronym: acronym.to_string(),
        team_name: "Team".to_string(),
        team_colour: Some(colour.to_string()),
    }
}

fn lap(driver_number: u32, lap_number: u32, offset_s: i64, duration: Option<f64>, pit_out: bool) -> LapRecord {
    LapRecord {
        session_key: SESSION_KEY,
        driver_number,
        lap_number,
        date_start: lap_start() + Duration::seconds(offset_s),
        lap_duration: duration,
        sector_durations: duration.map_or([None; 3], |d| [Some(d * 0.3), Some(d * 0.4), Some(d * 0.3)]),
        is_pit_out_lap: pit_out,
    }
}

/// One location sample per second across the lap, moving `speed` units per second along x
fn positions(driver_number: u32, lap_time_s: i64, speed: f64) -> Vec<Record> {
    (0..=lap_time_s)
        .map(|s| {
            Record::Position(PositionSample {
                session_key: SESSION_KEY,
                driver_number,
                date: lap_start() + Duration::seconds(s),
                position: Position {
                    x: s as f64 * speed,
                    y: 0.,
                    z: 0.,
                },
            })
        })
        .collect()
}

fn sensors(driver_number: u32, lap_time_s: i64) -> Vec<Record> {
    (0..=lap_time_s)
        .map(|s| {
            Record::Sensor(SensorSample {
                session_key: SESSION_KEY,
                driver_number,
                date: lap_start() + Duration::seconds(s),
                sensors: CarSensors {
                    speed: 200. + s as f64,
                    gear: 7,
                    throttle: 100.,
                    brake: 0.,
                    drs: Some(12),
                    rpm: 11000.,
                },
            })
        })
        .collect()
}

/// Verstappen with an 80 s fastest lap and full data; Leclerc with 85 s and no car data
fn recorded_session() -> Vec<Record> {
    let mut records = vec![
        Record::Session(session()),
        Record::Driver(driver(VERSTAPPEN, "VER", "3671C6")),
        Record::Driver(driver(LECLERC, "LEC", "E8002D")),
        Record::Lap(lap(VERSTAPPEN, 1, -200, None, true)),
        Record::Lap(lap(VERSTAPPEN, 2, -120, Some(82.5), false)),
        Record::Lap(lap(VERSTAPPEN, 3, 0, Some(80.), false)),
        Record::Lap(lap(LECLERC, 2, -90, Some(86.1), false)),
        Record::Lap(lap(LECLERC, 3, 0, Some(85.), false)),
    ];
    records.extend(positions(VERSTAPPEN, 80, 10.));
    records.extend(sensors(VERSTAPPEN, 80));
    records.extend(positions(LECLERC, 85, 20.));
    records
}

fn load_recording(dir: &TempDir) -> RecordedSource {
    let path = dir.path().join("monza.jsonl");
    write_recording(&path, &recorded_session()).expect("Failed to write recording");
    RecordedSource::from_file(&path).expect("Failed to load recording")
}

async fn loaded_state(source: &RecordedSource, trace: &MemoryTraceSink) -> ReplayState {
    let mut state = ReplayState::new();
    let generation = state.select_session(session());
    assert!(state.apply_roster(generation, source.drivers(SESSION_KEY).await.unwrap()));
    assert!(state.apply_field_laps(generation, source.laps(SESSION_KEY, None).await.unwrap()));

    let mut generations = Vec::new();
    for number in [VERSTAPPEN, LECLERC] {
        match state.toggle_driver(number) {
            slipstream::replay::SelectionChange::Added { generation, .. } => generations.push(generation),
            other => panic!("Expected driver {} to be added, got {:?}", number, other),
        }
    }

    let replays = fetch_drivers(source, trace, SESSION_KEY, &[VERSTAPPEN, LECLERC]).await;
    for (generation, replay) in generations.into_iter().zip(replays) {
        assert!(state.apply_driver_data(generation, replay));
    }
    state
}

#[tokio::test]
async fn test_two_driver_replay_from_recording() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let source = load_recording(&dir);
    let trace = MemoryTraceSink::default();
    let mut state = loaded_state(&source, &trace).await;

    let timeline = state.timeline().expect("Timeline should exist with two fastest laps");
    assert_relative_eq!(timeline.duration_s(), 85.);
    assert_eq!(state.focus(), Some(VERSTAPPEN));

    state.play().expect("Playback should start");
    assert_eq!(state.advance(40.), Some(ClockEvent::Advanced));

    // 40 s into the replay Verstappen is halfway round, Leclerc 40 of 85 s in
    let frame = state.frame();
    let ver = frame.drivers.iter().find(|d| d.driver_number == VERSTAPPEN).unwrap();
    let lec = frame.drivers.iter().find(|d| d.driver_number == LECLERC).unwrap();
    assert_relative_eq!(ver.position.unwrap().x, 400., epsilon = 1e-6);
    assert_relative_eq!(lec.position.unwrap().x, 800., epsilon = 1e-6);
    assert!(!ver.finished);
    assert!(!lec.finished);

    let telemetry = frame.telemetry.expect("Focus driver telemetry");
    assert_relative_eq!(telemetry.speed_kph.unwrap(), 240., epsilon = 1e-6);
    assert_eq!(telemetry.drs_label(), "ON");
    assert_eq!(telemetry.fastest_lap_label(), format_lap_time(80.));

    // Verstappen pins at the line while Leclerc keeps going
    assert_eq!(state.advance(42.), Some(ClockEvent::Advanced));
    let frame = state.frame();
    let ver = frame.drivers.iter().find(|d| d.driver_number == VERSTAPPEN).unwrap();
    assert!(ver.finished);
    assert_relative_eq!(ver.position.unwrap().x, 800., epsilon = 1e-6);
    assert_eq!(ver.trail.len(), 81);

    assert_eq!(state.advance(10.), Some(ClockEvent::LapComplete));
    assert!(!state.playback().is_playing());
    assert_relative_eq!(state.playback().progress, 1.);
}

#[tokio::test]
async fn test_missing_car_data_is_partial_state() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let source = load_recording(&dir);
    let trace = MemoryTraceSink::default();
    let mut state = loaded_state(&source, &trace).await;

    state.set_focus(LECLERC);
    state.seek(0.5);
    let reading = state.telemetry(LECLERC);
    assert!(reading.sensors_unavailable());
    assert_eq!(reading.speed_label(), UNKNOWN);
    assert_eq!(reading.gear_label(), UNKNOWN);
    assert!(reading.position.is_some());
    assert_eq!(reading.fastest_lap_s, Some(85.));

    // an empty series is recorded as zero rows, not as a failure
    assert_eq!(trace.failures(), 0);
    assert!(trace.events().iter().any(|e| e.endpoint == "car_data"
        && e.driver_number == Some(LECLERC)
        && e.outcome == FetchOutcome::Rows(0)));

    let badges = state.badges();
    assert_eq!(badges.overall, Some(VERSTAPPEN));
    assert_eq!(badges.among_selected, Some(VERSTAPPEN));
}

#[tokio::test]
async fn test_deselect_shrinks_timeline() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let source = load_recording(&dir);
    let trace = MemoryTraceSink::default();
    let mut state = loaded_state(&source, &trace).await;

    state.seek(0.6);
    state.toggle_driver(LECLERC);
    assert_relative_eq!(state.timeline().unwrap().duration_s(), 80.);
    assert_relative_eq!(state.playback().progress, 0.);
    assert_eq!(state.frame().drivers.len(), 1);
}

#[tokio::test]
async fn test_record_session_round_trip() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let source = load_recording(&dir);

    let records = record_session(&source, SESSION_KEY)
        .await
        .expect("Recording should succeed");
    let path = dir.path().join("rerecorded.jsonl");
    write_recording(&path, &records).expect("Failed to write recording");
    let rerecorded = RecordedSource::from_file(&path).expect("Failed to load recording");

    assert_eq!(rerecorded.all_sessions(), source.all_sessions());
    let window_start = lap_start();
    let window_end = lap_start() + Duration::seconds(80);
    let original = source
        .positions(SESSION_KEY, VERSTAPPEN, window_start, window_end)
        .await
        .unwrap();
    let copied = rerecorded
        .positions(SESSION_KEY, VERSTAPPEN, window_start, window_end)
        .await
        .unwrap();
    assert_eq!(original, copied);
    assert!(
        rerecorded
            .sensors(SESSION_KEY, LECLERC, window_start, window_end)
            .await
            .unwrap()
            .is_empty()
    );
}
