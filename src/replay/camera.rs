// World to screen mapping for the track map, with a zoom/pan camera on top of a fit-to-view transform

use egui::{Pos2, Rect, Vec2};

use crate::openf1::Position;

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 8.;
/// Screen pixels kept clear around the fitted track
pub const VIEW_PADDING: f32 = 40.;

const VISUAL_SCALE_MIN: f32 = 0.75;
const VISUAL_SCALE_MAX: f32 = 2.;

const BASE_TRACK_WIDTH: f32 = 14.;
const BASE_TRACK_BORDER_WIDTH: f32 = 20.;
const BASE_TRAIL_WIDTH: f32 = 3.;
const BASE_MARKER_RADIUS: f32 = 8.;
const BASE_LABEL_SIZE: f32 = 12.;

/// Axis-aligned world rectangle enclosing every rendered sample
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    /// `None` when there are no finite points or they all coincide
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let bounds = points
            .into_iter()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .fold(None, |bounds: Option<Bounds>, (x, y)| {
                Some(match bounds {
                    None => Bounds {
                        min_x: x,
                        max_x: x,
                        min_y: y,
                        max_y: y,
                    },
                    Some(b) => Bounds {
                        min_x: b.min_x.min(x),
                        max_x: b.max_x.max(x),
                        min_y: b.min_y.min(y),
                        max_y: b.max_y.max(y),
                    },
                })
            })?;
        (bounds.width() > 0. || bounds.height() > 0.).then_some(bounds)
    }

    pub fn from_positions<'a>(positions: impl IntoIterator<Item = &'a Position>) -> Option<Self> {
        Self::from_points(positions.into_iter().map(|p| (p.x, p.y)))
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    pub zoom: f32,
    pub pan: Vec2,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            zoom: 1.,
            pan: Vec2::ZERO,
        }
    }
}

impl CameraState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Multiplies the zoom by `factor` keeping the world point under `cursor` where it is on screen
    pub fn zoom_at(&mut self, cursor: Pos2, view_center: Pos2, factor: f32) {
        if !(factor.is_finite() && factor > 0.) {
            return;
        }
        let new_zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        let ratio = new_zoom / self.zoom;
        let from_center = cursor - view_center;
        self.pan = from_center - (from_center - self.pan) * ratio;
        self.zoom = new_zoom;
    }
}

/// Stroke widths and sizes for the current zoom, bounded so extreme zooms stay legible
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualScale {
    pub track_width: f32,
    pub track_border_width: f32,
    pub trail_width: f32,
    pub marker_radius: f32,
    pub label_size: f32,
}

impl VisualScale {
    pub fn for_zoom(zoom: f32) -> Self {
        let factor = zoom.max(f32::EPSILON).sqrt().clamp(VISUAL_SCALE_MIN, VISUAL_SCALE_MAX);
        Self {
            track_width: BASE_TRACK_WIDTH * factor,
            track_border_width: BASE_TRACK_BORDER_WIDTH * factor,
            trail_width: BASE_TRAIL_WIDTH * factor,
            marker_radius: BASE_MARKER_RADIUS * factor,
            label_size: BASE_LABEL_SIZE * factor,
        }
    }
}

/// Uniform-scale fit of `bounds` into `viewport`, centred, with `VIEW_PADDING` around it
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    bounds: Bounds,
    viewport: Rect,
    scale: f64,
    offset: (f64, f64),
}

impl ViewTransform {
    pub fn new(bounds: Bounds, viewport: Rect) -> Self {
        let available_w = (viewport.width() - 2. * VIEW_PADDING).max(1.) as f64;
        let available_h = (viewport.height() - 2. * VIEW_PADDING).max(1.) as f64;
        let axis_scale = |available: f64, extent: f64| {
            if extent > 0. {
                available / extent
            } else {
                f64::INFINITY
            }
        };
        let scale = axis_scale(available_w, bounds.width()).min(axis_scale(available_h, bounds.height()));

        let offset = (
            viewport.min.x as f64
                + VIEW_PADDING as f64
                + (available_w - bounds.width() * scale) / 2.,
            viewport.min.y as f64
                + VIEW_PADDING as f64
                + (available_h - bounds.height() * scale) / 2.,
        );
        Self {
            bounds,
            viewport,
            scale,
            offset,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    /// Screen pixels per world unit before zoom
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn world_to_screen(&self, x: f64, y: f64, camera: &CameraState) -> Pos2 {
        let center = self.viewport.center();
        let fitted_x = self.offset.0 + (x - self.bounds.min_x) * self.scale;
        let fitted_y = self.offset.1 + (y - self.bounds.min_y) * self.scale;
        let zoom = camera.zoom as f64;
        Pos2::new(
            (center.x as f64 + (fitted_x - center.x as f64) * zoom + camera.pan.x as f64) as f32,
            (center.y as f64 + (fitted_y - center.y as f64) * zoom + camera.pan.y as f64) as f32,
        )
    }

    pub fn position_to_screen(&self, position: &Position, camera: &CameraState) -> Pos2 {
        self.world_to_screen(position.x, position.y, camera)
    }

    pub fn screen_to_world(&self, screen: Pos2, camera: &CameraState) -> (f64, f64) {
        let center = self.viewport.center();
        let zoom = camera.zoom as f64;
        let fitted_x = center.x as f64 + (screen.x as f64 - center.x as f64 - camera.pan.x as f64) / zoom;
        let fitted_y = center.y as f64 + (screen.y as f64 - center.y as f64 - camera.pan.y as f64) / zoom;
        (
            self.bounds.min_x + (fitted_x - self.offset.0) / self.scale,
            self.bounds.min_y + (fitted_y - self.offset.1) / self.scale,
        )
    }
}
