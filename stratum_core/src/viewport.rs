// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Camera state, projection, and the ordered viewport set.
//!
//! [`ViewportState`] is the read-only camera snapshot layers see during a
//! tick. [`project`] maps a lon/lat position to output pixels with the
//! standard Web Mercator mapping; [`unproject`] inverts it. Pitch is
//! carried for state identity but does not affect the 2-D projection.
//!
//! [`ViewportSet`] holds the active cameras in composition order: draw
//! order across viewports follows list order, and within a viewport the
//! layer list order. The picking pass walks the same two-level order so
//! pick results always agree with what is visually on top.

use alloc::vec::Vec;

use core::f64::consts::{E, FRAC_PI_4, PI};

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Point, Rect, Vec2};

/// Side length of the zoom-0 world tile in pixels.
pub const TILE_SIZE: f64 = 512.0;

/// Camera parameters for one viewport.
///
/// Owned by the orchestrator and shared read-only with all layers in a
/// frame. `PartialEq` comparison against the previous frame's state is how
/// viewport-driven redraws are detected.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportState {
    /// Output width in pixels.
    pub width: f64,
    /// Output height in pixels.
    pub height: f64,
    /// Camera center longitude in degrees.
    pub longitude: f64,
    /// Camera center latitude in degrees.
    pub latitude: f64,
    /// Zoom level (zoom 0 fits the world in one [`TILE_SIZE`] tile).
    pub zoom: f64,
    /// Map rotation in degrees, clockwise from north.
    pub bearing: f64,
    /// Camera tilt in degrees. Carried for identity only.
    pub pitch: f64,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            longitude: 0.0,
            latitude: 0.0,
            zoom: 0.0,
            bearing: 0.0,
            pitch: 0.0,
        }
    }
}

impl ViewportState {
    /// World-space scale in pixels at this zoom.
    #[must_use]
    pub fn scale(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.zoom)
    }
}

/// Maps a lon/lat degree position into world pixels at the given scale.
fn world(lonlat: Point, scale: f64) -> Point {
    let lat = lonlat.y.to_radians();
    let x = scale * (0.5 + lonlat.x / 360.0);
    let y = scale * (0.5 - (FRAC_PI_4 + lat / 2.0).tan().ln() / (2.0 * PI));
    Point::new(x, y)
}

/// Projects a lon/lat degree position to output pixels.
///
/// Pure function of its inputs; the origin is the top-left corner of the
/// viewport, y growing downward.
#[must_use]
pub fn project(lonlat: Point, state: &ViewportState) -> Point {
    let scale = state.scale();
    let center = world(Point::new(state.longitude, state.latitude), scale);
    let d = world(lonlat, scale) - center;

    let a = state.bearing.to_radians();
    let (sin, cos) = (a.sin(), a.cos());
    let rotated = Vec2::new(d.x * cos + d.y * sin, -d.x * sin + d.y * cos);

    Point::new(state.width / 2.0 + rotated.x, state.height / 2.0 + rotated.y)
}

/// Inverts [`project`]: output pixels back to lon/lat degrees.
#[must_use]
pub fn unproject(screen: Point, state: &ViewportState) -> Point {
    let scale = state.scale();
    let center = world(Point::new(state.longitude, state.latitude), scale);

    let rotated = Vec2::new(
        screen.x - state.width / 2.0,
        screen.y - state.height / 2.0,
    );
    let a = state.bearing.to_radians();
    let (sin, cos) = (a.sin(), a.cos());
    let d = Vec2::new(rotated.x * cos - rotated.y * sin, rotated.x * sin + rotated.y * cos);

    let x = center.x + d.x;
    let y = center.y + d.y;
    let lon = 360.0 * (x / scale - 0.5);
    let lat = (2.0 * ((0.5 - y / scale) * 2.0 * PI).exp().atan() - PI / 2.0).to_degrees();
    Point::new(lon, lat)
}

/// Identifies one viewport within a [`ViewportSet`].
///
/// The orchestrator assigns these; core code passes them through without
/// interpreting the value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ViewportId(pub u32);

impl core::fmt::Debug for ViewportId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ViewportId({})", self.0)
    }
}

/// One camera plus the output sub-rectangle it composites into.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    /// Stable identifier.
    pub id: ViewportId,
    /// Camera parameters.
    pub state: ViewportState,
    /// Output rectangle in canvas pixels.
    pub rect: Rect,
}

/// The ordered set of active viewports.
///
/// Composition order is list order: later viewports draw on top where
/// rectangles overlap.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewportSet {
    viewports: Vec<Viewport>,
}

impl ViewportSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set with one full-canvas viewport for `state`.
    #[must_use]
    pub fn single(state: ViewportState) -> Self {
        let rect = Rect::new(0.0, 0.0, state.width, state.height);
        Self {
            viewports: alloc::vec![Viewport {
                id: ViewportId(0),
                state,
                rect,
            }],
        }
    }

    /// Appends a viewport at the top of the composition order.
    pub fn push(&mut self, viewport: Viewport) {
        self.viewports.push(viewport);
    }

    /// The viewports in composition order.
    #[must_use]
    pub fn viewports(&self) -> &[Viewport] {
        &self.viewports
    }

    /// Returns `true` if no viewport is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.viewports.is_empty()
    }

    /// Canvas size covered by the set: the union of all viewport rects.
    #[must_use]
    pub fn canvas_size(&self) -> (f64, f64) {
        let mut w = 0.0f64;
        let mut h = 0.0f64;
        for vp in &self.viewports {
            w = w.max(vp.rect.x1);
            h = h.max(vp.rect.y1);
        }
        (w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ViewportState {
        ViewportState {
            width: 800.0,
            height: 600.0,
            longitude: -122.4,
            latitude: 37.8,
            zoom: 12.0,
            bearing: 0.0,
            pitch: 0.0,
        }
    }

    #[test]
    fn center_projects_to_viewport_center() {
        let s = state();
        let p = project(Point::new(s.longitude, s.latitude), &s);
        assert!((p.x - 400.0).abs() < 1e-9);
        assert!((p.y - 300.0).abs() < 1e-9);
    }

    #[test]
    fn project_unproject_round_trip() {
        let s = state();
        let original = Point::new(-122.39, 37.81);
        let back = unproject(project(original, &s), &s);
        assert!((back.x - original.x).abs() < 1e-9, "lon drifted: {back:?}");
        assert!((back.y - original.y).abs() < 1e-9, "lat drifted: {back:?}");
    }

    #[test]
    fn round_trip_with_bearing() {
        let mut s = state();
        s.bearing = 37.0;
        let original = Point::new(-122.41, 37.79);
        let back = unproject(project(original, &s), &s);
        assert!((back.x - original.x).abs() < 1e-9);
        assert!((back.y - original.y).abs() < 1e-9);
    }

    #[test]
    fn zooming_in_doubles_pixel_offsets() {
        let s = state();
        let mut zoomed = s;
        zoomed.zoom += 1.0;

        let p = Point::new(s.longitude + 0.01, s.latitude);
        let off_a = project(p, &s).x - s.width / 2.0;
        let off_b = project(p, &zoomed).x - s.width / 2.0;
        assert!((off_b / off_a - 2.0).abs() < 1e-9, "ratio: {}", off_b / off_a);
    }

    #[test]
    fn east_is_right_north_is_up() {
        let s = state();
        let east = project(Point::new(s.longitude + 0.01, s.latitude), &s);
        let north = project(Point::new(s.longitude, s.latitude + 0.01), &s);
        assert!(east.x > s.width / 2.0, "east of center projects right");
        assert!(north.y < s.height / 2.0, "north of center projects up");
    }

    #[test]
    fn canvas_size_is_union_of_rects() {
        let mut set = ViewportSet::new();
        set.push(Viewport {
            id: ViewportId(0),
            state: state(),
            rect: Rect::new(0.0, 0.0, 400.0, 600.0),
        });
        set.push(Viewport {
            id: ViewportId(1),
            state: state(),
            rect: Rect::new(400.0, 0.0, 800.0, 600.0),
        });
        assert_eq!(set.canvas_size(), (800.0, 600.0));
    }

    #[test]
    fn single_covers_the_full_canvas() {
        let set = ViewportSet::single(state());
        assert_eq!(set.viewports().len(), 1);
        assert_eq!(set.viewports()[0].rect, Rect::new(0.0, 0.0, 800.0, 600.0));
    }
}
