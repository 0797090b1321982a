use egui::{Color32, Grid, ProgressBar, RichText, Ui};
use egui_extras::{Column, TableBuilder};
use egui_plot::{Legend, Line, PlotPoints, VLine};
use itertools::Itertools;

use crate::replay::{
    ReplayState,
    interpolator::DrsState,
    telemetry_sampler::{UNKNOWN, format_lap_time},
};

use super::{PALETTE_MUTED, PALETTE_ORANGE, driver_colour, stroke_shade};

fn tile(ui: &mut Ui, name: &str, value: String, unit: &str) {
    ui.vertical(|ui| {
        ui.label(RichText::new(name).small().color(PALETTE_MUTED));
        ui.label(RichText::new(value).size(24.).strong().color(Color32::WHITE));
        ui.label(RichText::new(unit).small().color(PALETTE_MUTED));
    });
}

fn pedal_bar(ui: &mut Ui, name: &str, pct: Option<f64>, colour: Color32) {
    ui.label(RichText::new(name).small().color(PALETTE_MUTED));
    match pct {
        Some(pct) => {
            let fraction = (pct / 100.).clamp(0., 1.) as f32;
            ui.add(ProgressBar::new(fraction).fill(colour).desired_height(8.));
        }
        None => {
            ui.label(UNKNOWN);
        }
    }
}

pub(super) fn show_telemetry(ui: &mut Ui, state: &ReplayState) {
    ui.heading("Telemetry");
    let Some(focus) = state.focus() else {
        ui.label(RichText::new("Select a session and drivers to view telemetry").color(PALETTE_MUTED));
        return;
    };

    if let Some(driver) = state.driver(focus) {
        ui.horizontal(|ui| {
            let (swatch, _) = ui.allocate_exact_size(egui::Vec2::splat(14.), egui::Sense::hover());
            ui.painter()
                .circle_filled(swatch.center(), 7., driver_colour(driver.team_colour_rgb()));
            ui.vertical(|ui| {
                ui.label(
                    RichText::new(format!("{} • {}", driver.name_acronym, driver.full_name)).strong(),
                );
                ui.label(RichText::new(&driver.team_name).color(PALETTE_MUTED));
            });
        });
    }

    let reading = state.telemetry(focus);
    if reading.sensors_unavailable() {
        ui.label(RichText::new("No car data for this driver").color(PALETTE_ORANGE));
    }

    Grid::new("telemetry_tiles")
        .num_columns(2)
        .spacing([24., 8.])
        .show(ui, |ui| {
            tile(ui, "SPEED", reading.speed_label(), "km/h");
            tile(ui, "GEAR", reading.gear_label(), "");
            ui.end_row();
            tile(ui, "RPM", reading.rpm_label(), "engine");
            tile(ui, "ELAPSED", reading.elapsed_label(), "seconds");
            ui.end_row();
            tile(ui, "POSITION", reading.position_label(), "x,y");
            tile(ui, "LAP TIME", reading.fastest_lap_label(), "fastest");
            ui.end_row();
        });

    pedal_bar(ui, "THROTTLE", reading.throttle_pct, Color32::GREEN);
    let brake_colour = stroke_shade(
        PALETTE_ORANGE,
        Color32::RED,
        reading.brake_pct.map_or(0., |b| (b / 100.) as f32),
    );
    pedal_bar(ui, "BRAKE", reading.brake_pct, brake_colour);

    ui.horizontal(|ui| {
        ui.label(RichText::new("DRS").small().color(PALETTE_MUTED));
        let colour = match reading.drs {
            Some(DrsState::On) => Color32::GREEN,
            _ => Color32::WHITE,
        };
        ui.label(RichText::new(reading.drs_label()).size(20.).strong().color(colour));
    });

    if let Some(sectors) = state.sector_performance(focus) {
        ui.label(
            RichText::new(format!(
                "Best sectors {:.3} / {:.3} / {:.3}, theoretical {} ({:+.3}s)",
                sectors.best_sectors[0],
                sectors.best_sectors[1],
                sectors.best_sectors[2],
                format_lap_time(sectors.theoretical_best_s),
                sectors.improvement_s
            ))
            .small()
            .color(PALETTE_MUTED),
        );
    }
    if let Some(summary) = state.summary(focus) {
        ui.label(
            RichText::new(format!(
                "{} of {} laps valid, fastest lap {} ({})",
                summary.valid_lap_count,
                summary.total_laps,
                summary.fastest_lap_number.map_or(UNKNOWN.to_string(), |n| n.to_string()),
                summary.fastest_lap_time.as_deref().unwrap_or(UNKNOWN)
            ))
            .small()
            .color(PALETTE_MUTED),
        );
    }
}

/// Compared drivers ranked by fastest lap, with the session-wide and comparison badges
pub(super) fn show_leaderboard(ui: &mut Ui, state: &ReplayState) {
    ui.heading("Fastest laps");
    let badges = state.badges();
    let ranked = state
        .selected_fastest_laps()
        .into_iter()
        .sorted_by(|a, b| a.lap_time_s.total_cmp(&b.lap_time_s))
        .collect_vec();
    let Some(leader) = ranked.first().map(|w| w.lap_time_s) else {
        ui.label(RichText::new("No fastest laps resolved yet").color(PALETTE_MUTED));
        return;
    };

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto())
        .column(Column::auto())
        .column(Column::auto())
        .column(Column::auto())
        .column(Column::remainder())
        .header(18., |mut header| {
            for title in ["#", "Driver", "Time", "Gap", ""] {
                header.col(|ui| {
                    ui.label(RichText::new(title).small().color(PALETTE_MUTED));
                });
            }
        })
        .body(|mut body| {
            for (rank, window) in ranked.iter().enumerate() {
                let number = window.driver_number;
                body.row(20., |mut row| {
                    row.col(|ui| {
                        ui.label((rank + 1).to_string());
                    });
                    row.col(|ui| {
                        let name = state
                            .driver(number)
                            .map_or_else(|| number.to_string(), |d| d.name_acronym.clone());
                        let colour = state
                            .driver(number)
                            .map_or(Color32::WHITE, |d| driver_colour(d.team_colour_rgb()));
                        ui.label(RichText::new(name).color(colour).strong());
                    });
                    row.col(|ui| {
                        ui.label(format_lap_time(window.lap_time_s));
                    });
                    row.col(|ui| {
                        if rank > 0 {
                            ui.label(format!("+{:.3}", window.lap_time_s - leader));
                        }
                    });
                    row.col(|ui| {
                        if badges.overall == Some(number) {
                            ui.label(RichText::new("SESSION BEST").small().color(PALETTE_ORANGE));
                        } else if badges.among_selected == Some(number) {
                            ui.label(RichText::new("FASTEST").small().color(Color32::GREEN));
                        }
                    });
                });
            }
        });

    if let Some(best) = state.field_leaderboard().first() {
        let holder = state
            .driver(best.driver_number)
            .map_or_else(|| best.driver_number.to_string(), |d| d.name_acronym.clone());
        ui.label(
            RichText::new(format!(
                "Session best: {} {} (lap {})",
                holder,
                format_lap_time(best.lap_time_s),
                best.lap_number
            ))
            .small()
            .color(PALETTE_MUTED),
        );
    }
}

/// Speed against time into each driver's own lap, with a cursor at the current instant
pub(super) fn show_speed_trace(ui: &mut Ui, state: &ReplayState) {
    let Some(timeline) = state.timeline() else {
        return;
    };
    let now = timeline.master_elapsed(state.playback().progress);

    egui_plot::Plot::new("speed_trace")
        .legend(Legend::default())
        .allow_scroll(false)
        .include_y(0.)
        .include_x(0.)
        .include_x(timeline.duration_s())
        .y_axis_label("km/h")
        .show(ui, |plot_ui| {
            for number in state.selected() {
                let Some(replay) = state.replay(*number) else {
                    continue;
                };
                let (Some(sensors), Some(lap_time_s)) = (&replay.sensors, replay.lap_time_s())
                else {
                    continue;
                };
                let series_max = sensors.max_elapsed();
                if series_max <= 0. {
                    continue;
                }
                // stretch the sample window onto the real lap time so the cursor lines up
                let points = sensors
                    .points()
                    .iter()
                    .map(|p| [p.elapsed / series_max * lap_time_s, p.value.speed])
                    .collect::<Vec<[f64; 2]>>();
                let (name, colour) = state.driver(*number).map_or_else(
                    || (number.to_string(), Color32::LIGHT_GRAY),
                    |d| (d.name_acronym.clone(), driver_colour(d.team_colour_rgb())),
                );
                plot_ui.line(Line::new(name, PlotPoints::new(points)).color(colour));
            }
            plot_ui.vline(VLine::new("Now", now).color(Color32::WHITE));
        });
}
