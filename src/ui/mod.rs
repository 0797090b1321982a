pub mod config;
mod controls;
mod telemetry_panel;
mod track_view;

use std::{path::PathBuf, sync::Arc, time::Duration};

use egui::{Color32, CornerRadius, Grid, RichText, Visuals, style::Widgets};
use log::{error, info, warn};

use crate::{
    fetcher::{FetchOutcome, FetchOutput, FetchRequest, Fetcher, MemoryTraceSink},
    openf1::{DataSource, RecordedSource, Session},
    replay::{ReplayState, SelectionChange, clock::ClockEvent},
};

use config::AppConfig;

pub(crate) const PALETTE_BLACK: Color32 = Color32::from_rgb(12, 12, 12);
pub(crate) const PALETTE_BROWN: Color32 = Color32::from_rgb(72, 30, 20);
pub(crate) const PALETTE_MAROON: Color32 = Color32::from_rgb(155, 57, 34);
pub(crate) const PALETTE_ORANGE: Color32 = Color32::from_rgb(242, 97, 63);
pub(crate) const PALETTE_TRACK: Color32 = Color32::from_rgb(58, 58, 62);
pub(crate) const PALETTE_MUTED: Color32 = Color32::from_rgb(150, 150, 150);

const DEFAULT_WINDOW_CORNER_RADIUS: u8 = 10;
const FETCH_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) fn driver_colour(rgb: [u8; 3]) -> Color32 {
    Color32::from_rgb(rgb[0], rgb[1], rgb[2])
}

/// Linear blend from `start` to `end`, `t` in `[0, 1]`
pub(crate) fn stroke_shade(start: Color32, end: Color32, t: f32) -> Color32 {
    let channel = |a: u8, b: u8| (a as f32 + t.clamp(0., 1.) * (b as f32 - a as f32)).round() as u8;
    Color32::from_rgb(
        channel(start.r(), end.r()),
        channel(start.g(), end.g()),
        channel(start.b(), end.b()),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SessionsStatus {
    Idle,
    Loading,
    Failed(String),
}

/// Desktop dashboard replaying the selected drivers' fastest laps
pub struct ReplayApp {
    fetcher: Fetcher,
    trace: Arc<MemoryTraceSink>,
    state: ReplayState,
    app_config: AppConfig,
    year: i32,
    sessions: Vec<Session>,
    sessions_status: SessionsStatus,
    selected_session_label: String,
    selected_session_key: Option<u32>,
    status_message: Option<String>,
    recording: Option<PathBuf>,
}

impl ReplayApp {
    pub fn new(
        fetcher: Fetcher,
        trace: Arc<MemoryTraceSink>,
        app_config: AppConfig,
        year: i32,
        cc: &eframe::CreationContext<'_>,
    ) -> Self {
        let default_visuals = Visuals {
            dark_mode: true,
            hyperlink_color: PALETTE_MAROON,
            faint_bg_color: PALETTE_BLACK,
            extreme_bg_color: PALETTE_BROWN,
            panel_fill: PALETTE_BLACK,
            selection: egui::style::Selection {
                bg_fill: PALETTE_MAROON,
                ..Default::default()
            },
            window_corner_radius: CornerRadius::same(DEFAULT_WINDOW_CORNER_RADIUS),
            button_frame: true,
            widgets: Widgets::dark(),
            striped: true,
            ..Default::default()
        };
        cc.egui_ctx.set_visuals(default_visuals);

        let mut state = ReplayState::new();
        if let Err(e) = state.set_speed(app_config.default_speed) {
            warn!("Ignoring configured playback speed: {}", e);
        }

        let mut app = Self {
            fetcher,
            trace,
            state,
            app_config,
            year,
            sessions: Vec::new(),
            sessions_status: SessionsStatus::Idle,
            selected_session_label: String::new(),
            selected_session_key: None,
            status_message: None,
            recording: None,
        };
        app.request_sessions();
        app
    }

    /// Dashboard over a loaded recording instead of the live provider
    pub fn with_recording(mut self, path: PathBuf, source: &RecordedSource) -> Self {
        if let Some(session) = source.all_sessions().first() {
            self.year = session.year;
            self.request_sessions();
        }
        self.recording = Some(path);
        self
    }

    fn send(&mut self, request: FetchRequest) {
        if let Err(e) = self.fetcher.request(request) {
            error!("Could not reach the data fetcher: {}", e);
            self.status_message = Some(e.to_string());
        }
    }

    fn request_sessions(&mut self) {
        self.sessions_status = SessionsStatus::Loading;
        self.send(FetchRequest::Sessions { year: self.year });
    }

    fn select_session(&mut self, session: Session) {
        let session_key = session.session_key;
        self.selected_session_key = Some(session_key);
        let generation = self.state.select_session(session);
        self.send(FetchRequest::Session {
            generation,
            session_key,
        });
    }

    fn toggle_driver(&mut self, driver_number: u32) {
        let Some(session_key) = self.state.session().map(|s| s.session_key) else {
            return;
        };
        if let SelectionChange::Added {
            driver_number,
            generation,
        } = self.state.toggle_driver(driver_number)
        {
            self.send(FetchRequest::Driver {
                generation,
                session_key,
                driver_number,
            });
        }
    }

    fn toggle_playback(&mut self) {
        if let Err(e) = self.state.toggle_playback() {
            self.status_message = Some(e.to_string());
        }
    }

    /// Swaps the provider for a recording picked from disk
    fn open_recording(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Recordings", &["jsonl"])
            .pick_file()
        else {
            return;
        };
        let source = match RecordedSource::from_file(&path) {
            Ok(source) => source,
            Err(e) => {
                self.status_message = Some(format!("Could not open {}: {}", path.display(), e));
                return;
            }
        };
        let year = source.all_sessions().first().map(|s| s.year);
        let source: Arc<dyn DataSource> = Arc::new(source);
        match Fetcher::spawn(source, self.trace.clone()) {
            Ok(fetcher) => {
                info!("Replaying recording {}", path.display());
                self.fetcher = fetcher;
                self.state.reset();
                self.sessions.clear();
                self.selected_session_label.clear();
                self.selected_session_key = None;
                self.year = year.unwrap_or(self.year);
                self.recording = Some(path);
                self.status_message = None;
                self.request_sessions();
            }
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    fn apply_fetch_outputs(&mut self) {
        for output in self.fetcher.poll() {
            match output {
                FetchOutput::Sessions { year, sessions } => {
                    if year != self.year {
                        continue;
                    }
                    match sessions {
                        Ok(mut sessions) => {
                            sessions.sort_by_key(|s| s.date_start);
                            self.sessions = sessions;
                            self.sessions_status = SessionsStatus::Idle;
                        }
                        Err(e) => self.sessions_status = SessionsStatus::Failed(e.to_string()),
                    }
                }
                FetchOutput::Roster {
                    generation,
                    drivers,
                } => {
                    self.state.apply_roster(generation, drivers);
                }
                FetchOutput::FieldLaps { generation, laps } => {
                    self.state.apply_field_laps(generation, laps);
                }
                FetchOutput::Driver { generation, replay } => {
                    self.state.apply_driver_data(generation, replay);
                }
            }
        }
    }

    fn show_diagnostics(&mut self, ctx: &egui::Context) {
        let mut open = self.app_config.show_diagnostics;
        egui::Window::new("Diagnostics")
            .open(&mut open)
            .default_width(420.)
            .show(ctx, |ui| {
                ui.label(format!(
                    "Session generation {}, {} drivers selected, {} failed requests",
                    self.state.session_generation(),
                    self.state.selected().len(),
                    self.trace.failures()
                ));
                if let Some(path) = &self.recording {
                    ui.label(format!("Recording: {}", path.display()));
                }
                ui.separator();
                egui::ScrollArea::vertical().max_height(300.).show(ui, |ui| {
                    Grid::new("fetch_events").striped(true).show(ui, |ui| {
                        for event in self.trace.events().iter().rev() {
                            ui.label(event.at.format("%H:%M:%S%.3f").to_string());
                            ui.label(event.endpoint);
                            ui.label(
                                event
                                    .driver_number
                                    .map_or_else(|| "field".to_string(), |n| n.to_string()),
                            );
                            match &event.outcome {
                                FetchOutcome::Rows(rows) => ui.label(format!("{} rows", rows)),
                                FetchOutcome::Failed(e) => {
                                    ui.label(RichText::new(e).color(Color32::RED))
                                }
                            };
                            ui.end_row();
                        }
                    });
                });
            });
        self.app_config.show_diagnostics = open;
    }
}

impl eframe::App for ReplayApp {
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.app_config.default_year = self.year;
        if let Err(e) = self.app_config.save() {
            error!("Error while saving config file: {}", e);
        }
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.apply_fetch_outputs();

        if ctx.input(|i| i.key_pressed(egui::Key::Space)) && !ctx.wants_keyboard_input() {
            self.toggle_playback();
        }
        if self.state.playback().is_playing() {
            let now = ctx.input(|i| i.time);
            if let Some(ClockEvent::LapComplete) = self.state.tick_at(now) {
                info!("Replay finished");
            }
        }
        if let Some(rect) = ctx.input(|i| i.viewport().outer_rect) {
            self.app_config.window_position = rect.min.into();
        }

        egui::TopBottomPanel::top("selectors").show(ctx, |ui| {
            self.show_session_selector(ui);
        });
        egui::SidePanel::left("drivers")
            .resizable(false)
            .default_width(190.)
            .show(ctx, |ui| {
                self.show_driver_selector(ui);
            });
        egui::SidePanel::right("telemetry")
            .default_width(300.)
            .show(ctx, |ui| {
                telemetry_panel::show_telemetry(ui, &self.state);
                ui.separator();
                telemetry_panel::show_leaderboard(ui, &self.state);
            });
        egui::TopBottomPanel::bottom("playback")
            .resizable(true)
            .default_height(200.)
            .show(ctx, |ui| {
                self.show_playback_controls(ui);
                ui.separator();
                telemetry_panel::show_speed_trace(ui, &self.state);
            });
        egui::CentralPanel::default().show(ctx, |ui| {
            track_view::show_track(ui, &mut self.state, self.app_config.zoom_step);
        });

        if self.app_config.show_diagnostics {
            self.show_diagnostics(ctx);
        }

        // the clock only advances while frames keep coming
        if self.state.playback().is_playing() {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(FETCH_POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stroke_shade() {
        assert_eq!(stroke_shade(Color32::BLACK, Color32::WHITE, 0.), Color32::BLACK);
        assert_eq!(stroke_shade(Color32::BLACK, Color32::WHITE, 1.), Color32::WHITE);
        assert_eq!(
            stroke_shade(Color32::BLACK, Color32::WHITE, 0.5),
            Color32::from_rgb(128, 128, 128)
        );
        assert_eq!(stroke_shade(Color32::BLACK, Color32::WHITE, 7.), Color32::WHITE);
    }
}
