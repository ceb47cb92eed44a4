// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection routing.
//!
//! Picks the closest pair of anchors across the two sockets and derives
//! flow-chart style tangents for a cubic curve between them.

use egui::{Pos2, Rect, Vec2};

/// Segments used when sampling a route for hit testing
pub const HIT_TEST_SEGMENTS: usize = 24;

/// One end of a connection as seen by the router
#[derive(Debug, Clone, Copy)]
pub struct RouteEnd<'a> {
    /// Anchor positions of the socket, world space
    pub points: &'a [Pos2],
    /// Owning node rect, world space
    pub node_rect: Rect,
    /// Per-socket tangent modifier
    pub tangent_modifier: f32,
}

impl RouteEnd<'_> {
    fn center(&self) -> Option<Pos2> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self
            .points
            .iter()
            .fold(Vec2::ZERO, |acc, p| acc + p.to_vec2());
        Some((sum / self.points.len() as f32).to_pos2())
    }
}

/// Tangent sizing
#[derive(Debug, Clone, Copy)]
pub struct TangentParams {
    /// Fraction of the point distance used as tangent length
    pub factor: f32,
    /// Lower bound for the tangent length
    pub min_length: f32,
}

/// Routed curve between two anchors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Route {
    /// Start anchor (output side)
    pub from: Pos2,
    /// End anchor (input side)
    pub to: Pos2,
    /// Index of the chosen output anchor
    pub from_index: usize,
    /// Index of the chosen input anchor
    pub to_index: usize,
    /// Tangent leaving `from`
    pub from_tangent: Vec2,
    /// Tangent arriving at `to`, pointing away from `to`
    pub to_tangent: Vec2,
}

impl Route {
    /// Cubic bezier control points
    pub fn control_points(&self) -> [Pos2; 4] {
        [
            self.from,
            self.from + self.from_tangent,
            self.to + self.to_tangent,
            self.to,
        ]
    }

    /// Sample the curve
    pub fn sample(&self, segments: usize) -> Vec<Pos2> {
        let [p0, p1, p2, p3] = self.control_points();
        bezier_points(p0, p1, p2, p3, segments.max(1))
    }

    /// Distance from a point to the sampled curve
    pub fn distance_to(&self, point: Pos2) -> f32 {
        self.sample(HIT_TEST_SEGMENTS)
            .windows(2)
            .map(|w| distance_to_segment(point, w[0], w[1]))
            .fold(f32::INFINITY, f32::min)
    }

    /// Screen-space bounds of the control polygon
    pub fn bounds(&self) -> Rect {
        Rect::from_points(&self.control_points())
    }
}

/// Nearest pair of points by Euclidean distance, as `(from_index, to_index)`
pub fn nearest_pair(from: &[Pos2], to: &[Pos2]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize, f32)> = None;
    for (i, a) in from.iter().enumerate() {
        for (j, b) in to.iter().enumerate() {
            let d = a.distance_sq(*b);
            if best.map_or(true, |(_, _, bd)| d < bd) {
                best = Some((i, j, d));
            }
        }
    }
    best.map(|(i, j, _)| (i, j))
}

/// Route a connection from an output socket to an input socket
pub fn route(output: &RouteEnd<'_>, input: &RouteEnd<'_>, params: TangentParams) -> Option<Route> {
    let (from_index, to_index) = nearest_pair(output.points, input.points)?;
    let from = output.points[from_index];
    let to = input.points[to_index];
    let out_center = output.center()?;
    let in_center = input.center()?;

    let forward = out_center.x <= in_center.x;
    let mut out_dir = if forward { 1.0 } else { -1.0 };
    let mut in_dir = -out_dir;

    // With unequal widths a tangent can point back into its own node body
    if (output.node_rect.width() - input.node_rect.width()).abs() > f32::EPSILON {
        if out_dir * (from.x - output.node_rect.center().x) < 0.0 {
            out_dir = -out_dir;
        }
        if in_dir * (to.x - input.node_rect.center().x) < 0.0 {
            in_dir = -in_dir;
        }
    }

    let length = (from.distance(to) * params.factor).max(params.min_length);
    Some(Route {
        from,
        to,
        from_index,
        to_index,
        from_tangent: Vec2::new(out_dir * length * output.tangent_modifier, 0.0),
        to_tangent: Vec2::new(in_dir * length * input.tangent_modifier, 0.0),
    })
}

/// Provisional route from a socket anchor to the pointer while connecting
pub fn provisional(from: Pos2, from_is_output: bool, pointer: Pos2, params: TangentParams) -> Route {
    let length = (from.distance(pointer) * params.factor).max(params.min_length);
    let dir = if from_is_output { 1.0 } else { -1.0 };
    Route {
        from,
        to: pointer,
        from_index: 0,
        to_index: 0,
        from_tangent: Vec2::new(dir * length, 0.0),
        to_tangent: Vec2::new(-dir * length, 0.0),
    }
}

/// Generate points along a cubic bezier curve
pub fn bezier_points(p0: Pos2, p1: Pos2, p2: Pos2, p3: Pos2, segments: usize) -> Vec<Pos2> {
    let mut points = Vec::with_capacity(segments + 1);
    for i in 0..=segments {
        let t = i as f32 / segments as f32;
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        let x = mt3 * p0.x + 3.0 * mt2 * t * p1.x + 3.0 * mt * t2 * p2.x + t3 * p3.x;
        let y = mt3 * p0.y + 3.0 * mt2 * t * p1.y + 3.0 * mt * t2 * p2.y + t3 * p3.y;

        points.push(Pos2::new(x, y));
    }
    points
}

fn distance_to_segment(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}
