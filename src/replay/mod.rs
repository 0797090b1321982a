// Replay engine: the selection, the per-driver data it resolved to, and everything derived from them

pub mod camera;
pub mod clock;
pub mod interpolator;
pub mod lap_analyzer;
pub mod telemetry_sampler;
pub mod timeline;

use std::collections::BTreeMap;

use log::{debug, info};

use crate::{
    SlipstreamError,
    openf1::{CarSensors, Driver, LapRecord, Position, Session},
};

use self::{
    camera::{Bounds, CameraState},
    clock::{ClockEvent, PlaybackClock, PlaybackState},
    interpolator::{SamplePoint, Series},
    lap_analyzer::{FastestLapWindow, LapSummary, LeaderboardEntry, SectorPerformance},
    telemetry_sampler::{FastestBadges, TelemetryReading},
    timeline::MasterTimeline,
};

/// Everything fetched for one selected driver.
///
/// `None` series mean the fetch failed or returned nothing; the driver is then drawn and
/// sampled from whatever is left.
#[derive(Clone, Debug, PartialEq)]
pub struct DriverReplay {
    pub driver_number: u32,
    pub laps: Vec<LapRecord>,
    pub fastest: Option<FastestLapWindow>,
    pub positions: Option<Series<Position>>,
    pub sensors: Option<Series<CarSensors>>,
}

impl DriverReplay {
    /// Builds the replay from a lap list, resolving the fastest lap window
    pub fn from_laps(driver_number: u32, laps: Vec<LapRecord>) -> Self {
        let fastest = match lap_analyzer::find_fastest_lap(&laps) {
            Ok(fastest) => Some(fastest),
            Err(e) => {
                debug!("Driver {} has no fastest lap: {}", driver_number, e);
                None
            }
        };
        Self {
            driver_number,
            laps,
            fastest,
            positions: None,
            sensors: None,
        }
    }

    pub fn lap_time_s(&self) -> Option<f64> {
        self.fastest.as_ref().map(|f| f.lap_time_s)
    }

    fn non_empty_positions(&self) -> Option<&Series<Position>> {
        self.positions.as_ref().filter(|s| !s.is_empty())
    }
}

/// Outcome of toggling a driver in the selection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionChange {
    /// The driver joined the comparison; its data must be fetched under `generation`
    Added { driver_number: u32, generation: u64 },
    Removed { driver_number: u32 },
    /// No session is selected, so there is nothing to compare
    Ignored,
}

/// One driver on the track map at the current instant
#[derive(Clone, Debug)]
pub struct DriverFrame<'a> {
    pub driver_number: u32,
    pub position: Option<Position>,
    /// Position samples covered so far
    pub trail: &'a [SamplePoint<Position>],
    /// The driver's own lap has ended and the car waits at the line
    pub finished: bool,
}

/// Values derived for one rendered frame
#[derive(Clone, Debug)]
pub struct ReplayFrame<'a> {
    pub playback: PlaybackState,
    pub master_duration_s: Option<f64>,
    /// Full position series of the driver whose line is drawn as the track outline
    pub track: Option<&'a Series<Position>>,
    pub start_finish: Option<Position>,
    pub bounds: Option<Bounds>,
    pub drivers: Vec<DriverFrame<'a>>,
    pub telemetry: Option<TelemetryReading>,
}

/// Owned state of the dashboard's replay.
///
/// Selection changes hand out generations. Fetched data is only applied when it carries the
/// generation still current for its session or driver, so results that arrive after the user
/// moved on are dropped.
#[derive(Debug, Default)]
pub struct ReplayState {
    last_generation: u64,
    session: Option<Session>,
    session_generation: u64,
    roster: Vec<Driver>,
    field_laps: Vec<LapRecord>,
    field_leaderboard: Vec<LeaderboardEntry>,
    selected: Vec<u32>,
    driver_generations: BTreeMap<u32, u64>,
    focus: Option<u32>,
    replays: BTreeMap<u32, DriverReplay>,
    timeline: Option<MasterTimeline>,
    bounds: Option<Bounds>,
    clock: PlaybackClock,
    camera: CameraState,
}

impl ReplayState {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_generation(&mut self) -> u64 {
        self.last_generation += 1;
        self.last_generation
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_generation(&self) -> u64 {
        self.session_generation
    }

    pub fn roster(&self) -> &[Driver] {
        &self.roster
    }

    pub fn driver(&self, driver_number: u32) -> Option<&Driver> {
        self.roster.iter().find(|d| d.driver_number == driver_number)
    }

    /// Selected drivers in the order they were picked
    pub fn selected(&self) -> &[u32] {
        &self.selected
    }

    pub fn is_selected(&self, driver_number: u32) -> bool {
        self.selected.contains(&driver_number)
    }

    pub fn focus(&self) -> Option<u32> {
        self.focus
    }

    pub fn replay(&self, driver_number: u32) -> Option<&DriverReplay> {
        self.replays.get(&driver_number)
    }

    /// True while a selected driver's data has not arrived yet
    pub fn is_loading(&self) -> bool {
        self.selected.iter().any(|n| !self.replays.contains_key(n))
    }

    pub fn timeline(&self) -> Option<&MasterTimeline> {
        self.timeline.as_ref()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Starts a new analysis context for `session` and returns the generation its roster and
    /// field laps must be fetched under
    pub fn select_session(&mut self, session: Session) -> u64 {
        info!("Selected session {} ({})", session.session_key, session.label());
        self.clear_selection();
        self.session = Some(session);
        self.session_generation = self.next_generation();
        self.session_generation
    }

    /// Drops the session, the selection and all fetched data
    pub fn reset(&mut self) {
        self.clear_selection();
        self.session = None;
        self.session_generation = self.next_generation();
        self.camera.reset();
        self.clock.set_master_duration(None);
        self.clock.reset();
    }

    fn clear_selection(&mut self) {
        self.roster.clear();
        self.field_laps.clear();
        self.field_leaderboard.clear();
        self.selected.clear();
        self.driver_generations.clear();
        self.focus = None;
        self.replays.clear();
        self.rebuild();
    }

    pub fn apply_roster(&mut self, generation: u64, mut roster: Vec<Driver>) -> bool {
        if generation != self.session_generation {
            debug!("Discarding stale roster from generation {}", generation);
            return false;
        }
        roster.sort_by_key(|d| d.driver_number);
        self.roster = roster;
        true
    }

    /// Whole-field laps, used for the session-wide fastest lap and leaderboard
    pub fn apply_field_laps(&mut self, generation: u64, laps: Vec<LapRecord>) -> bool {
        if generation != self.session_generation {
            debug!("Discarding stale field laps from generation {}", generation);
            return false;
        }
        let comparison = lap_analyzer::compare_fastest_laps(&lap_analyzer::group_by_driver(&laps));
        self.field_leaderboard = comparison.leaderboard;
        self.field_laps = laps;
        true
    }

    pub fn toggle_driver(&mut self, driver_number: u32) -> SelectionChange {
        if self.session.is_none() {
            return SelectionChange::Ignored;
        }

        if self.is_selected(driver_number) {
            self.selected.retain(|n| *n != driver_number);
            self.driver_generations.remove(&driver_number);
            self.replays.remove(&driver_number);
            if self.focus == Some(driver_number) {
                self.focus = self.selected.first().copied();
            }
            self.rebuild();
            return SelectionChange::Removed { driver_number };
        }

        let generation = self.next_generation();
        self.selected.push(driver_number);
        self.driver_generations.insert(driver_number, generation);
        self.focus.get_or_insert(driver_number);
        self.rebuild();
        SelectionChange::Added {
            driver_number,
            generation,
        }
    }

    /// Only selected drivers can take focus
    pub fn set_focus(&mut self, driver_number: u32) {
        if self.is_selected(driver_number) {
            self.focus = Some(driver_number);
        }
    }

    /// Stores fetched driver data if it still belongs to the current selection
    pub fn apply_driver_data(&mut self, generation: u64, replay: DriverReplay) -> bool {
        let driver_number = replay.driver_number;
        if self.driver_generations.get(&driver_number) != Some(&generation) {
            debug!(
                "Discarding stale data for driver {} from generation {}",
                driver_number, generation
            );
            return false;
        }
        self.replays.insert(driver_number, replay);
        self.rebuild();
        true
    }

    fn selected_replays(&self) -> impl Iterator<Item = &DriverReplay> {
        self.selected.iter().filter_map(|n| self.replays.get(n))
    }

    /// Fastest lap windows of the compared drivers, in selection order
    pub fn selected_fastest_laps(&self) -> Vec<FastestLapWindow> {
        self.selected_replays()
            .filter_map(|r| r.fastest.clone())
            .collect()
    }

    /// Recomputes the timeline and bounds. The clock restarts when the master duration moves,
    /// since every driver's mapping onto the old timeline is stale.
    fn rebuild(&mut self) {
        let timeline = MasterTimeline::new(&self.selected_fastest_laps()).ok();
        let bounds = Bounds::from_positions(
            self.selected_replays()
                .filter_map(|r| r.positions.as_ref())
                .flat_map(|s| s.points().iter().map(|p| &p.value)),
        );

        let duration = timeline.as_ref().map(|t| t.duration_s());
        if duration != self.clock.master_duration_s() {
            debug!("Master duration changed to {:?}", duration);
            self.clock.set_master_duration(duration);
        }
        self.timeline = timeline;
        self.bounds = bounds;
    }

    pub fn playback(&self) -> PlaybackState {
        self.clock.state()
    }

    pub fn play(&mut self) -> Result<(), SlipstreamError> {
        self.clock.play()
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn toggle_playback(&mut self) -> Result<(), SlipstreamError> {
        self.clock.toggle()
    }

    pub fn seek(&mut self, progress: f64) {
        self.clock.seek(progress);
    }

    /// Rewinds playback and restores the default camera
    pub fn reset_playback(&mut self) {
        self.clock.reset();
        self.camera.reset();
    }

    pub fn set_speed(&mut self, multiplier: f64) -> Result<(), SlipstreamError> {
        self.clock.set_speed(multiplier)
    }

    pub fn tick_at(&mut self, timestamp_s: f64) -> Option<ClockEvent> {
        self.clock.tick_at(timestamp_s)
    }

    pub fn advance(&mut self, delta_s: f64) -> Option<ClockEvent> {
        self.clock.advance(delta_s)
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraState {
        &mut self.camera
    }

    pub fn badges(&self) -> FastestBadges {
        FastestBadges::compute(&self.field_laps, &self.selected_fastest_laps())
    }

    /// Session-wide fastest laps, quickest first
    pub fn field_leaderboard(&self) -> &[LeaderboardEntry] {
        &self.field_leaderboard
    }

    pub fn summary(&self, driver_number: u32) -> Option<LapSummary> {
        self.replays
            .get(&driver_number)
            .map(|r| lap_analyzer::summarize(&r.laps))
    }

    pub fn sector_performance(&self, driver_number: u32) -> Option<SectorPerformance> {
        self.replays
            .get(&driver_number)
            .and_then(|r| lap_analyzer::analyze_sector_performance(&r.laps))
    }

    /// Time to query `series` at for `replay` at the current progress
    fn local_elapsed(&self, replay: &DriverReplay, series_max_elapsed: f64) -> f64 {
        let progress = self.clock.progress();
        match &self.timeline {
            Some(timeline) => {
                timeline.to_driver_local_elapsed(replay.lap_time_s(), series_max_elapsed, progress)
            }
            None => progress * series_max_elapsed,
        }
    }

    pub fn telemetry(&self, driver_number: u32) -> TelemetryReading {
        match self.replays.get(&driver_number) {
            Some(replay) => telemetry_sampler::sample(
                driver_number,
                replay.fastest.as_ref(),
                self.timeline.as_ref(),
                replay.positions.as_ref(),
                replay.sensors.as_ref(),
                self.clock.progress(),
            ),
            None => TelemetryReading::unavailable(driver_number),
        }
    }

    pub fn frame(&self) -> ReplayFrame<'_> {
        let progress = self.clock.progress();
        let track = self.selected_replays().find_map(|r| r.non_empty_positions());

        let drivers = self
            .selected_replays()
            .map(|replay| {
                let (position, trail) = match replay.non_empty_positions() {
                    Some(series) => {
                        let local = self.local_elapsed(replay, series.max_elapsed());
                        (
                            series.interpolate(local).map(|s| s.value),
                            series.up_to(local),
                        )
                    }
                    None => (None, &[][..]),
                };
                let finished = self
                    .timeline
                    .as_ref()
                    .is_some_and(|t| t.driver_fraction(replay.lap_time_s(), progress) >= 1.);
                DriverFrame {
                    driver_number: replay.driver_number,
                    position,
                    trail,
                    finished,
                }
            })
            .collect();

        ReplayFrame {
            playback: self.clock.state(),
            master_duration_s: self.clock.master_duration_s(),
            track,
            start_finish: track.and_then(|t| t.points().first()).map(|p| p.value),
            bounds: self.bounds,
            drivers,
            telemetry: self.focus.map(|n| self.telemetry(n)),
        }
    }
}
