// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pick queries against the encoded-color off-screen pass.
//!
//! [`PickingManager`] owns the lazily allocated picking target. A query
//! re-renders the relevant layers with [`PassKind::Picking`], reads back
//! only the pixel window the query covers, and decodes each pixel through
//! the store's [`PickingTable`](stratum_core::picking::PickingTable).
//!
//! Two failure modes are deliberately distinct: a query that is *outside*
//! the canvas is an ordinary miss (`Ok(None)` / empty vec), while a query
//! that is *malformed* — an empty rectangle, an unknown layer id in the
//! filter — fails fast with [`PickError`] before any GPU work.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use thiserror::Error;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::Rect;

use stratum_core::backend::{
    PassKind, ProgramHandle, RenderBackend, RenderTarget, TargetHandle,
};
use stratum_core::descriptor::LayerKind;
use stratum_core::error::ResourceError;
use stratum_core::layer::{LayerId, LayerStore};
use stratum_core::picking::PickingColor;
use stratum_core::viewport::ViewportSet;

use crate::plan::RenderPlan;

/// A point pick: the nearest object within `radius` pixels of `(x, y)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointQuery {
    /// Query x in canvas pixels.
    pub x: f64,
    /// Query y in canvas pixels.
    pub y: f64,
    /// Search radius in pixels. Zero means the exact pixel.
    pub radius: f64,
    /// Restrict the query to these layer ids. Empty means all layers.
    pub layer_ids: Vec<String>,
}

/// A rectangle pick: every object visible inside `rect`.
#[derive(Clone, Debug, PartialEq)]
pub struct RectQuery {
    /// Query rectangle in canvas pixels.
    pub rect: Rect,
    /// Restrict the query to these layer ids. Empty means all layers.
    pub layer_ids: Vec<String>,
}

/// One resolved pick hit.
#[derive(Clone, Debug, PartialEq)]
pub struct PickInfo {
    /// Handle of the hit layer.
    pub layer: LayerId,
    /// Descriptor id of the hit layer.
    pub layer_id: String,
    /// Index of the hit object within the layer's records.
    pub object_index: u32,
    /// Canvas x of the hit pixel.
    pub x: f64,
    /// Canvas y of the hit pixel.
    pub y: f64,
}

/// A malformed pick query or a backend failure while servicing one.
#[derive(Debug, Error)]
pub enum PickError {
    /// The query rectangle has zero area.
    #[error("pick rectangle has zero area")]
    EmptyRect,
    /// The layer filter names an id with no live layer.
    #[error("unknown layer id `{0}` in pick filter")]
    UnknownLayer(String),
    /// The backend failed while rendering or reading back.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// A decoded candidate pixel, before tie-breaking.
struct Candidate {
    slot: u32,
    object_index: u32,
    x: f64,
    y: f64,
    dist_sq: f64,
}

/// Owns the picking target and services pick queries.
#[derive(Debug, Default)]
pub struct PickingManager {
    target: Option<TargetHandle>,
    size: (u32, u32),
}

impl PickingManager {
    /// Creates a manager with no target allocated yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases the picking target, if one was ever allocated.
    pub fn release(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(target) = self.target.take() {
            backend.release_target(target);
        }
        self.size = (0, 0);
    }

    /// Services a point query. Out-of-canvas queries are a miss, not an
    /// error.
    pub fn pick_point(
        &mut self,
        store: &LayerStore,
        viewports: &ViewportSet,
        programs: &BTreeMap<LayerKind, ProgramHandle>,
        query: &PointQuery,
        backend: &mut dyn RenderBackend,
    ) -> Result<Option<PickInfo>, PickError> {
        let filter = resolve_filter(store, &query.layer_ids)?;
        let Some((canvas_w, canvas_h)) = canvas_pixels(viewports) else {
            return Ok(None);
        };

        let radius = query.radius.max(0.0);
        let Some(window) = clamp_window(
            query.x - radius,
            query.y - radius,
            query.x + radius,
            query.y + radius,
            canvas_w,
            canvas_h,
        ) else {
            return Ok(None);
        };

        let target = self.render(
            store,
            viewports,
            programs,
            filter.as_ref(),
            (canvas_w, canvas_h),
            backend,
        )?;
        let (x0, y0, w, h) = window;
        let pixels = backend.read_pixels(target, x0, y0, w, h);

        let position = draw_positions(store);
        let mut best: Option<Candidate> = None;
        for candidate in decode_window(store, &pixels, x0, y0, w, h) {
            let dx = candidate.x - query.x;
            let dy = candidate.y - query.y;
            let candidate = Candidate {
                dist_sq: dx * dx + dy * dy,
                ..candidate
            };
            let wins = match &best {
                None => true,
                Some(best) => beats(&position, &candidate, best),
            };
            if wins {
                best = Some(candidate);
            }
        }

        Ok(best.map(|c| PickInfo {
            layer: store.handle(c.slot),
            layer_id: store.id_at(c.slot).to_string(),
            object_index: c.object_index,
            x: c.x,
            y: c.y,
        }))
    }

    /// Services a rectangle query, returning every distinct object with at
    /// least one visible pixel inside the rectangle.
    ///
    /// Results are ordered bottom-to-top by draw order, then by object
    /// index within a layer.
    pub fn pick_rect(
        &mut self,
        store: &LayerStore,
        viewports: &ViewportSet,
        programs: &BTreeMap<LayerKind, ProgramHandle>,
        query: &RectQuery,
        backend: &mut dyn RenderBackend,
    ) -> Result<Vec<PickInfo>, PickError> {
        if query.rect.width() <= 0.0 || query.rect.height() <= 0.0 {
            return Err(PickError::EmptyRect);
        }
        let filter = resolve_filter(store, &query.layer_ids)?;
        let Some((canvas_w, canvas_h)) = canvas_pixels(viewports) else {
            return Ok(Vec::new());
        };
        let Some(window) = clamp_window(
            query.rect.x0,
            query.rect.y0,
            query.rect.x1,
            query.rect.y1,
            canvas_w,
            canvas_h,
        ) else {
            return Ok(Vec::new());
        };

        let target = self.render(
            store,
            viewports,
            programs,
            filter.as_ref(),
            (canvas_w, canvas_h),
            backend,
        )?;
        let (x0, y0, w, h) = window;
        let pixels = backend.read_pixels(target, x0, y0, w, h);

        // First visible pixel of each distinct object, in scan order.
        let mut hits: BTreeMap<(u32, u32), (f64, f64)> = BTreeMap::new();
        for candidate in decode_window(store, &pixels, x0, y0, w, h) {
            hits.entry((candidate.slot, candidate.object_index))
                .or_insert((candidate.x, candidate.y));
        }

        let position = draw_positions(store);
        let mut ordered: Vec<((u32, u32), (f64, f64))> = hits.into_iter().collect();
        ordered.sort_by_key(|((slot, object), _)| {
            (position.get(slot).copied().unwrap_or(u32::MAX), *object)
        });

        Ok(ordered
            .into_iter()
            .map(|((slot, object_index), (x, y))| PickInfo {
                layer: store.handle(slot),
                layer_id: store.id_at(slot).to_string(),
                object_index,
                x,
                y,
            })
            .collect())
    }

    /// Renders the picking pass into the (re)sized target.
    fn render(
        &mut self,
        store: &LayerStore,
        viewports: &ViewportSet,
        programs: &BTreeMap<LayerKind, ProgramHandle>,
        filter: Option<&BTreeSet<u32>>,
        (canvas_w, canvas_h): (u32, u32),
        backend: &mut dyn RenderBackend,
    ) -> Result<TargetHandle, PickError> {
        let target = match self.target {
            Some(target) if self.size == (canvas_w, canvas_h) => target,
            Some(target) => {
                backend.resize_target(target, canvas_w, canvas_h)?;
                self.size = (canvas_w, canvas_h);
                target
            }
            None => {
                let target = backend.create_target(canvas_w, canvas_h)?;
                self.target = Some(target);
                self.size = (canvas_w, canvas_h);
                target
            }
        };

        backend.clear_target(target);
        let plan = RenderPlan::build(store, viewports, programs, PassKind::Picking, filter);
        plan.execute(store, RenderTarget::Offscreen(target), backend)?;
        Ok(target)
    }
}

/// Maps filter ids to slots, failing fast on an unknown id.
fn resolve_filter(store: &LayerStore, ids: &[String]) -> Result<Option<BTreeSet<u32>>, PickError> {
    if ids.is_empty() {
        return Ok(None);
    }
    let mut slots = BTreeSet::new();
    for id in ids {
        let Some(handle) = store.find(id) else {
            return Err(PickError::UnknownLayer(id.clone()));
        };
        slots.insert(handle.index());
    }
    Ok(Some(slots))
}

/// The canvas size in whole pixels, or `None` when nothing is on screen.
fn canvas_pixels(viewports: &ViewportSet) -> Option<(u32, u32)> {
    let (w, h) = viewports.canvas_size();
    if w < 1.0 || h < 1.0 {
        return None;
    }
    #[expect(clippy::cast_possible_truncation, reason = "canvas sizes fit u32")]
    let pixels = (w.ceil() as u32, h.ceil() as u32);
    Some(pixels)
}

/// Clamps a pixel window to the canvas; `None` when nothing remains.
fn clamp_window(
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    canvas_w: u32,
    canvas_h: u32,
) -> Option<(u32, u32, u32, u32)> {
    let x0 = x0.floor().max(0.0);
    let y0 = y0.floor().max(0.0);
    let x1 = x1.ceil().min(f64::from(canvas_w)).max(x0);
    let y1 = y1.ceil().min(f64::from(canvas_h)).max(y0);
    #[expect(clippy::cast_possible_truncation, reason = "clamped to canvas bounds")]
    let (x0, y0, x1, y1) = (x0 as u32, y0 as u32, x1 as u32, y1 as u32);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((x0, y0, x1 - x0, y1 - y0))
}

/// Decodes every hit pixel of a readback window.
fn decode_window<'a>(
    store: &'a LayerStore,
    pixels: &'a [u8],
    x0: u32,
    y0: u32,
    w: u32,
    h: u32,
) -> impl Iterator<Item = Candidate> + 'a {
    (0..h).flat_map(move |row| {
        (0..w).filter_map(move |col| {
            let at = ((row * w + col) * 4) as usize;
            let color = PickingColor([pixels[at], pixels[at + 1], pixels[at + 2]]);
            let value = color.decode()?;
            let (slot, object_index) = store.picking().resolve(value)?;
            Some(Candidate {
                slot,
                object_index,
                x: f64::from(x0 + col),
                y: f64::from(y0 + row),
                dist_sq: 0.0,
            })
        })
    })
}

/// Slot → position in draw order, for tie-breaking.
fn draw_positions(store: &LayerStore) -> BTreeMap<u32, u32> {
    store
        .draw_order()
        .iter()
        .enumerate()
        .map(|(position, &slot)| {
            #[expect(clippy::cast_possible_truncation, reason = "layer counts fit u32")]
            let position = position as u32;
            (slot, position)
        })
        .collect()
}

/// Point-query tie-break: nearest first, then topmost, then lowest index.
fn beats(position: &BTreeMap<u32, u32>, candidate: &Candidate, best: &Candidate) -> bool {
    if candidate.dist_sq != best.dist_sq {
        return candidate.dist_sq < best.dist_sq;
    }
    let candidate_pos = position.get(&candidate.slot).copied().unwrap_or(0);
    let best_pos = position.get(&best.slot).copied().unwrap_or(0);
    if candidate_pos != best_pos {
        return candidate_pos > best_pos;
    }
    candidate.object_index < best.object_index
}
