use egui::{Color32, DragValue, Layout, RichText, Slider, Ui};
use egui_dropdown::DropDownBox;
use itertools::Itertools;

use crate::{
    openf1::Session,
    replay::{
        clock::{MAX_SPEED, MIN_SPEED},
        telemetry_sampler::format_lap_time,
    },
};

use super::{PALETTE_MUTED, PALETTE_ORANGE, ReplayApp, SessionsStatus, driver_colour};

const MIN_YEAR: i32 = 2023;

/// Selector label and key for every session. Labels shared by several sessions get the start
/// date, and the session key if that still collides.
pub(super) fn session_choices(sessions: &[Session]) -> Vec<(String, u32)> {
    let counts = sessions.iter().map(|s| s.label()).counts();
    let dated = sessions
        .iter()
        .map(|s| {
            let label = s.label();
            if counts.get(&label).copied().unwrap_or(0) > 1 {
                format!("{} ({})", label, s.date_start.format("%d %b"))
            } else {
                label
            }
        })
        .collect_vec();
    let dated_counts = dated.iter().counts();
    dated
        .iter()
        .zip(sessions)
        .map(|(label, s)| {
            if dated_counts.get(label).copied().unwrap_or(0) > 1 {
                (format!("{} #{}", label, s.session_key), s.session_key)
            } else {
                (label.clone(), s.session_key)
            }
        })
        .collect()
}

impl ReplayApp {
    pub(super) fn show_session_selector(&mut self, ui: &mut Ui) {
        ui.with_layout(Layout::left_to_right(egui::Align::Center), |ui| {
            ui.label(RichText::new("Season: ").color(Color32::WHITE));
            let previous_year = self.year;
            ui.add(DragValue::new(&mut self.year).range(MIN_YEAR..=2100));
            if previous_year != self.year {
                self.sessions.clear();
                self.selected_session_label.clear();
                self.selected_session_key = None;
                self.request_sessions();
            }

            ui.separator();
            ui.label(RichText::new("Session: ").color(Color32::WHITE));
            let choices = session_choices(&self.sessions);
            let previous_label = self.selected_session_label.clone();
            ui.add(
                DropDownBox::from_iter(
                    choices.iter().map(|(label, _)| label),
                    "session_dropbox",
                    &mut self.selected_session_label,
                    |ui, text| ui.selectable_label(false, text),
                )
                .filter_by_input(false),
            );
            let picked = choices
                .iter()
                .find(|(label, _)| *label == self.selected_session_label)
                .map(|(_, key)| *key);
            if previous_label != self.selected_session_label
                && picked.is_some()
                && picked != self.selected_session_key
                && let Some(session) = self
                    .sessions
                    .iter()
                    .find(|s| Some(s.session_key) == picked)
                    .cloned()
            {
                self.select_session(session);
            }

            match &self.sessions_status {
                SessionsStatus::Loading => {
                    ui.spinner();
                }
                SessionsStatus::Failed(e) => {
                    ui.label(RichText::new(e).color(Color32::RED));
                    if ui.button("Retry").clicked() {
                        self.request_sessions();
                    }
                }
                SessionsStatus::Idle => {
                    if self.sessions.is_empty() {
                        ui.label(RichText::new("No sessions found").color(PALETTE_MUTED));
                    }
                }
            }

            ui.with_layout(Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Diagnostics").clicked() {
                    self.app_config.show_diagnostics = !self.app_config.show_diagnostics;
                }
                if ui.button("Open recording…").clicked() {
                    self.open_recording();
                }
                if ui.button("Clear").clicked() {
                    self.state.reset();
                    self.selected_session_label.clear();
                    self.selected_session_key = None;
                }
                if let Some(message) = &self.status_message {
                    ui.label(RichText::new(message).color(PALETTE_ORANGE));
                }
            });
        });
    }

    pub(super) fn show_driver_selector(&mut self, ui: &mut Ui) {
        ui.heading("Drivers");
        if self.state.session().is_none() {
            ui.label(RichText::new("Pick a session first").color(PALETTE_MUTED));
            return;
        }
        if self.state.roster().is_empty() {
            ui.spinner();
            return;
        }

        let badges = self.state.badges();
        let mut toggled = None;
        let mut focused = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for driver in self.state.roster() {
                let number = driver.driver_number;
                let mut selected = self.state.is_selected(number);
                ui.horizontal(|ui| {
                    let (swatch, _) =
                        ui.allocate_exact_size(egui::Vec2::splat(10.), egui::Sense::hover());
                    ui.painter().circle_filled(
                        swatch.center(),
                        5.,
                        driver_colour(driver.team_colour_rgb()),
                    );
                    if ui
                        .checkbox(&mut selected, format!("{} {}", number, driver.name_acronym))
                        .on_hover_text(format!("{}, {}", driver.full_name, driver.team_name))
                        .changed()
                    {
                        toggled = Some(number);
                    }
                    if badges.overall == Some(number) {
                        ui.label(RichText::new("★").color(PALETTE_ORANGE))
                            .on_hover_text("Fastest lap of the session");
                    }
                    if self.state.is_selected(number)
                        && ui
                            .selectable_label(self.state.focus() == Some(number), "telemetry")
                            .clicked()
                    {
                        focused = Some(number);
                    }
                });
            }
        });

        if let Some(number) = toggled {
            self.toggle_driver(number);
        }
        if let Some(number) = focused {
            self.state.set_focus(number);
        }
    }

    pub(super) fn show_playback_controls(&mut self, ui: &mut Ui) {
        let playback = self.state.playback();
        let can_play = self.state.timeline().is_some();

        ui.horizontal(|ui| {
            let label = if playback.is_playing() { "⏸ Pause" } else { "▶ Play" };
            if ui.add_enabled(can_play, egui::Button::new(label)).clicked() {
                self.toggle_playback();
            }
            if ui.button("⏮ Reset").clicked() {
                self.state.reset_playback();
            }

            let mut progress = playback.progress;
            let scrubber = ui.add_enabled(
                can_play,
                Slider::new(&mut progress, 0.0..=1.0).show_value(false),
            );
            if scrubber.changed() {
                self.state.seek(progress);
            }
            ui.label(format!("{}%", playback.percent()));

            if let Some(timeline) = self.state.timeline() {
                ui.label(
                    RichText::new(format!(
                        "{} / {}",
                        format_lap_time(timeline.master_elapsed(playback.progress)),
                        format_lap_time(timeline.duration_s())
                    ))
                    .color(PALETTE_MUTED),
                );
            }

            ui.separator();
            let mut speed = playback.speed;
            if ui
                .add(
                    Slider::new(&mut speed, MIN_SPEED..=MAX_SPEED)
                        .text("speed")
                        .suffix("×")
                        .fixed_decimals(1),
                )
                .changed()
                && let Err(e) = self.state.set_speed(speed)
            {
                self.status_message = Some(e.to_string());
            }

            if self.state.is_loading() {
                ui.spinner();
                ui.label(RichText::new("Loading lap data").color(PALETTE_MUTED));
            }
        });
    }
}
