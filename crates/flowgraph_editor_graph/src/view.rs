// SPDX-License-Identifier: MIT OR Apache-2.0
//! View transform between grid space and canvas (world) space.
//!
//! `world = grid * zoom + pan`. World coordinates are pixels relative to the
//! canvas' top-left corner.

use crate::node::NodeId;
use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Round a zoom factor to two decimals
pub fn round_zoom(zoom: f32) -> f32 {
    (zoom * 100.0).round() / 100.0
}

/// Snap a grid position to the nearest multiple of `cell`
pub fn snap(position: [f32; 2], cell: f32) -> [f32; 2] {
    if cell <= 0.0 {
        return position;
    }
    [
        (position[0] / cell).round() * cell,
        (position[1] / cell).round() * cell,
    ]
}

/// Pan/zoom state of a canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    /// Zoom factor, clamped and rounded to two decimals
    zoom: f32,
    /// World-space offset of the grid origin
    pub pan: Vec2,
    /// Canvas size in world units
    pub viewport: Vec2,
    min_zoom: f32,
    max_zoom: f32,
}

impl ViewTransform {
    /// Create a transform with zoom 1 and the grid origin at the canvas origin
    pub fn new(min_zoom: f32, max_zoom: f32) -> Self {
        Self {
            zoom: 1.0_f32.clamp(min_zoom, max_zoom),
            pan: Vec2::ZERO,
            viewport: Vec2::new(1280.0, 720.0),
            min_zoom,
            max_zoom,
        }
    }

    /// Current zoom
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Zoom bounds
    pub fn zoom_range(&self) -> (f32, f32) {
        (self.min_zoom, self.max_zoom)
    }

    /// Visible canvas rect in world space
    pub fn viewport_rect(&self) -> Rect {
        Rect::from_min_size(Pos2::ZERO, self.viewport)
    }

    /// Convert grid position to world position
    pub fn grid_to_world(&self, grid: Pos2) -> Pos2 {
        Pos2::new(grid.x * self.zoom + self.pan.x, grid.y * self.zoom + self.pan.y)
    }

    /// Convert world position to grid position
    pub fn world_to_grid(&self, world: Pos2) -> Pos2 {
        Pos2::new(
            (world.x - self.pan.x) / self.zoom,
            (world.y - self.pan.y) / self.zoom,
        )
    }

    /// Convert a grid-space rect to world space
    pub fn grid_rect_to_world(&self, rect: Rect) -> Rect {
        Rect::from_min_max(self.grid_to_world(rect.min), self.grid_to_world(rect.max))
    }

    /// Convert a world-space delta to a grid-space delta
    pub fn world_delta_to_grid(&self, delta: Vec2) -> Vec2 {
        delta / self.zoom
    }

    /// Clamp and round a prospective zoom value
    pub fn clamp_zoom(&self, zoom: f32) -> f32 {
        round_zoom(zoom.clamp(self.min_zoom, self.max_zoom)).clamp(self.min_zoom, self.max_zoom)
    }

    /// Set zoom keeping the viewport center fixed
    pub fn set_zoom(&mut self, zoom: f32) {
        let center = self.viewport_rect().center();
        self.zoom_around(center, zoom);
    }

    /// Zoom by `steps` increments of `step`, keeping the grid point under
    /// `cursor` fixed on screen.
    pub fn zoom_at(&mut self, cursor: Pos2, steps: f32, step: f32) {
        let target = self.zoom + steps * step;
        self.zoom_around(cursor, target);
    }

    fn zoom_around(&mut self, anchor: Pos2, zoom: f32) {
        let new_zoom = self.clamp_zoom(zoom);
        if new_zoom == self.zoom {
            return;
        }
        let grid = self.world_to_grid(anchor);
        // The anchor's grid offset scaled by the zoom change
        self.pan -= grid.to_vec2() * (new_zoom - self.zoom);
        self.zoom = new_zoom;
    }

    /// Pan by a raw world-space delta
    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Center the view on a grid-space rect, zooming out if needed so it fits
    pub fn frame(&mut self, grid_rect: Rect, margin: f32) {
        if !grid_rect.is_finite() || grid_rect.width() <= 0.0 || grid_rect.height() <= 0.0 {
            return;
        }
        let available = (self.viewport - Vec2::splat(margin * 2.0)).max(Vec2::splat(1.0));
        let fit = (available.x / grid_rect.width()).min(available.y / grid_rect.height());
        self.zoom = self.clamp_zoom(fit.min(1.0));
        let center = grid_rect.center();
        self.pan = self.viewport_rect().center().to_vec2() - center.to_vec2() * self.zoom;
    }

    /// Capture the transform part of a [`ViewState`]
    pub fn capture(&self) -> (f32, [f32; 2]) {
        (self.zoom, [self.pan.x, self.pan.y])
    }

    /// Restore a captured zoom/pan verbatim (zoom still clamped to bounds)
    pub fn restore(&mut self, zoom: f32, pan: [f32; 2]) {
        self.zoom = self.clamp_zoom(zoom);
        self.pan = Vec2::new(pan[0], pan[1]);
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new(0.1, 4.0)
    }
}

/// Per-tab view state restored verbatim when returning to a tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// Zoom factor
    pub zoom: f32,
    /// Pan offset
    pub pan: [f32; 2],
    /// Selected nodes
    pub selection: Vec<NodeId>,
    /// Whether the graph itself was the selected object
    pub graph_selected: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: [0.0, 0.0],
            selection: Vec::new(),
            graph_selected: false,
        }
    }
}
