use egui::{Align2, Color32, FontId, Pos2, Sense, Shape, Stroke, Ui, Vec2};

use crate::replay::{
    ReplayState,
    camera::{ViewTransform, VisualScale},
};

use super::{PALETTE_BLACK, PALETTE_MUTED, PALETTE_TRACK, driver_colour};

/// Paints the track map and applies wheel zoom, drag pan and double-click reset
pub(super) fn show_track(ui: &mut Ui, state: &mut ReplayState, zoom_step: f32) {
    let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());

    if response.double_clicked() {
        state.camera_mut().reset();
    } else if response.dragged() {
        state.camera_mut().pan_by(response.drag_delta());
    }
    if let Some(cursor) = response.hover_pos() {
        let scroll = ui.input(|i| i.raw_scroll_delta.y);
        if scroll != 0. {
            let factor = if scroll > 0. { zoom_step } else { 1. / zoom_step };
            state.camera_mut().zoom_at(cursor, rect.center(), factor);
        }
    }

    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 8., PALETTE_BLACK);

    let frame = state.frame();
    let Some(bounds) = frame.bounds else {
        let hint = if state.selected().is_empty() {
            "Select drivers to replay their fastest laps"
        } else {
            "No location data for the selected drivers"
        };
        painter.text(
            rect.center(),
            Align2::CENTER_CENTER,
            hint,
            FontId::proportional(16.),
            PALETTE_MUTED,
        );
        return;
    };

    let transform = ViewTransform::new(bounds, rect);
    let camera = *state.camera();
    let scale = VisualScale::for_zoom(camera.zoom);

    if let Some(track) = frame.track {
        let outline = track
            .points()
            .iter()
            .map(|p| transform.position_to_screen(&p.value, &camera))
            .collect::<Vec<Pos2>>();
        painter.add(Shape::line(
            outline.clone(),
            Stroke::new(scale.track_border_width, Color32::from_gray(90)),
        ));
        painter.add(Shape::line(
            outline,
            Stroke::new(scale.track_width, PALETTE_TRACK),
        ));
    }

    if let Some(start) = frame.start_finish {
        let at = transform.position_to_screen(&start, &camera);
        let half = Vec2::new(0., scale.track_width);
        painter.line_segment(
            [at - half, at + half],
            Stroke::new(scale.trail_width + 1., Color32::WHITE),
        );
    }

    for driver in &frame.drivers {
        let colour = state
            .driver(driver.driver_number)
            .map_or(Color32::LIGHT_GRAY, |d| driver_colour(d.team_colour_rgb()));

        let mut trail = driver
            .trail
            .iter()
            .map(|p| transform.position_to_screen(&p.value, &camera))
            .collect::<Vec<Pos2>>();
        let Some(position) = driver.position else {
            continue;
        };
        let marker = transform.position_to_screen(&position, &camera);
        trail.push(marker);
        if trail.len() > 1 {
            painter.add(Shape::line(trail, Stroke::new(scale.trail_width, colour)));
        }

        painter.circle_filled(marker, scale.marker_radius, colour);
        painter.circle_stroke(
            marker,
            scale.marker_radius,
            Stroke::new(if driver.finished { 3. } else { 1.5 }, Color32::WHITE),
        );
        let label = state
            .driver(driver.driver_number)
            .map_or_else(|| driver.driver_number.to_string(), |d| d.name_acronym.clone());
        painter.text(
            marker + Vec2::new(scale.marker_radius + 4., -scale.marker_radius),
            Align2::LEFT_BOTTOM,
            label,
            FontId::proportional(scale.label_size),
            Color32::WHITE,
        );
    }

    if !camera.is_identity() {
        painter.text(
            rect.right_bottom() - Vec2::new(8., 8.),
            Align2::RIGHT_BOTTOM,
            format!("{:.1}× (double-click to reset)", camera.zoom),
            FontId::proportional(11.),
            PALETTE_MUTED,
        );
    }
}
