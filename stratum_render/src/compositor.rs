// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The orchestrator tying reconciliation, drawing, picking, and effects
//! together over one backend.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use core::fmt;
use core::mem;

use stratum_core::backend::{PassKind, ProgramHandle, RenderBackend, RenderTarget};
use stratum_core::descriptor::{DescriptorTree, LayerKind};
use stratum_core::error::ResourceError;
use stratum_core::layer::{LayerStore, UpdateSummary};
use stratum_core::trace::{
    DrawEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, PickEvent, ReconcileEvent, Tracer,
};
use stratum_core::viewport::ViewportSet;

use crate::effect::{Effect, EffectError, EffectManager};
use crate::picking::{PickError, PickInfo, PickingManager, PointQuery, RectQuery};
use crate::plan::RenderPlan;

/// What one [`Compositor::draw_layers`] call did.
#[derive(Debug, Default)]
pub struct DrawReport {
    /// Draw calls issued by the screen pass. Zero when no redraw was
    /// needed.
    pub items: usize,
    /// Failures of individual effects. The screen pass itself succeeded.
    pub effect_errors: Vec<EffectError>,
}

/// Owns the backend and the full engine state, and drives the
/// update → draw → pick cycle.
///
/// The screen pass is gated on an internal redraw flag: a
/// [`draw_layers`](Self::draw_layers) call when nothing changed issues no
/// draw calls at all. Reconciliation, viewport changes, and
/// [`request_redraw`](Self::request_redraw) set the flag; a completed
/// screen pass clears it. Pick queries render off-screen and never
/// touch the flag.
pub struct Compositor<B: RenderBackend> {
    backend: B,
    store: LayerStore,
    viewports: ViewportSet,
    effects: EffectManager,
    picking: PickingManager,
    programs: BTreeMap<LayerKind, ProgramHandle>,
    needs_redraw: bool,
    viewport_changed: bool,
    force_redraw: bool,
    frame_index: u64,
    finalized: bool,
}

impl<B: RenderBackend> fmt::Debug for Compositor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compositor")
            .field("layers", &self.store.layer_count())
            .field("frame_index", &self.frame_index)
            .field("needs_redraw", &self.needs_redraw)
            .field("finalized", &self.finalized)
            .finish_non_exhaustive()
    }
}

impl<B: RenderBackend> Compositor<B> {
    /// Creates a compositor with no layers and no viewports.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            store: LayerStore::new(),
            viewports: ViewportSet::new(),
            effects: EffectManager::new(),
            picking: PickingManager::new(),
            programs: BTreeMap::new(),
            needs_redraw: false,
            viewport_changed: false,
            force_redraw: false,
            frame_index: 0,
            finalized: false,
        }
    }

    /// Replaces the viewport set. An actual change forces a redraw on the
    /// next update cycle without any buffer work.
    pub fn set_viewports(&mut self, viewports: ViewportSet) {
        if viewports != self.viewports {
            self.viewport_changed = true;
            self.viewports = viewports;
        }
    }

    /// Runs one update cycle: reconciles `tree` against the stored layers
    /// and performs the minimal buffer work.
    ///
    /// # Panics
    ///
    /// Panics if the compositor was finalized.
    pub fn update_layers(
        &mut self,
        tree: DescriptorTree,
        tracer: &mut Tracer<'_>,
    ) -> UpdateSummary {
        assert!(!self.finalized, "compositor already finalized");
        self.frame_index += 1;
        tracer.phase_begin(&PhaseBeginEvent {
            frame_index: self.frame_index,
            phase: PhaseKind::Reconcile,
        });

        let viewport_changed = mem::take(&mut self.viewport_changed);
        let force_redraw = mem::take(&mut self.force_redraw);
        let summary =
            self.store
                .reconcile(tree, viewport_changed, force_redraw, &mut self.backend);
        self.needs_redraw |= summary.needs_redraw;

        tracer.reconcile(&ReconcileEvent {
            frame_index: self.frame_index,
            created: summary.created.len(),
            updated: summary.updated.len(),
            removed: summary.removed.len(),
            reallocated: summary.reallocated,
            repopulated: summary.repopulated,
            uploaded_bytes: summary.uploaded_bytes,
            errors: summary.errors.len(),
            needs_redraw: summary.needs_redraw,
        });
        tracer.phase_end(&PhaseEndEvent {
            frame_index: self.frame_index,
            phase: PhaseKind::Reconcile,
        });
        summary
    }

    /// Draws the screen pass and applies effects, if a redraw is pending.
    ///
    /// # Panics
    ///
    /// Panics if the compositor was finalized.
    pub fn draw_layers(&mut self, tracer: &mut Tracer<'_>) -> Result<DrawReport, ResourceError> {
        assert!(!self.finalized, "compositor already finalized");
        if !self.needs_redraw {
            return Ok(DrawReport::default());
        }
        self.ensure_programs()?;

        tracer.phase_begin(&PhaseBeginEvent {
            frame_index: self.frame_index,
            phase: PhaseKind::Draw,
        });
        let plan = RenderPlan::build(
            &self.store,
            &self.viewports,
            &self.programs,
            PassKind::Screen,
            None,
        );
        let items = plan.execute(&self.store, RenderTarget::Screen, &mut self.backend)?;
        tracer.draw(&DrawEvent {
            frame_index: self.frame_index,
            pass: PassKind::Screen,
            items,
        });
        tracer.phase_end(&PhaseEndEvent {
            frame_index: self.frame_index,
            phase: PhaseKind::Draw,
        });

        tracer.phase_begin(&PhaseBeginEvent {
            frame_index: self.frame_index,
            phase: PhaseKind::Effects,
        });
        let effect_errors =
            self.effects
                .apply_all(self.frame_index, &self.viewports, &plan, &mut self.backend);
        tracer.phase_end(&PhaseEndEvent {
            frame_index: self.frame_index,
            phase: PhaseKind::Effects,
        });

        self.needs_redraw = false;
        Ok(DrawReport {
            items,
            effect_errors,
        })
    }

    /// Picks the nearest object within the query radius.
    ///
    /// # Panics
    ///
    /// Panics if the compositor was finalized.
    pub fn pick_object(
        &mut self,
        query: &PointQuery,
        tracer: &mut Tracer<'_>,
    ) -> Result<Option<PickInfo>, PickError> {
        assert!(!self.finalized, "compositor already finalized");
        self.ensure_programs()?;
        tracer.phase_begin(&PhaseBeginEvent {
            frame_index: self.frame_index,
            phase: PhaseKind::Pick,
        });
        let hit = self.picking.pick_point(
            &self.store,
            &self.viewports,
            &self.programs,
            query,
            &mut self.backend,
        );
        tracer.pick(&PickEvent {
            frame_index: self.frame_index,
            x: query.x,
            y: query.y,
            hits: usize::from(matches!(hit, Ok(Some(_)))),
        });
        tracer.phase_end(&PhaseEndEvent {
            frame_index: self.frame_index,
            phase: PhaseKind::Pick,
        });
        hit
    }

    /// Picks every object visible inside the query rectangle.
    ///
    /// # Panics
    ///
    /// Panics if the compositor was finalized.
    pub fn pick_objects(
        &mut self,
        query: &RectQuery,
        tracer: &mut Tracer<'_>,
    ) -> Result<Vec<PickInfo>, PickError> {
        assert!(!self.finalized, "compositor already finalized");
        self.ensure_programs()?;
        tracer.phase_begin(&PhaseBeginEvent {
            frame_index: self.frame_index,
            phase: PhaseKind::Pick,
        });
        let hits = self.picking.pick_rect(
            &self.store,
            &self.viewports,
            &self.programs,
            query,
            &mut self.backend,
        );
        tracer.pick(&PickEvent {
            frame_index: self.frame_index,
            x: query.rect.x0,
            y: query.rect.y0,
            hits: hits.as_ref().map_or(0, Vec::len),
        });
        tracer.phase_end(&PhaseEndEvent {
            frame_index: self.frame_index,
            phase: PhaseKind::Pick,
        });
        hits
    }

    /// Registers a post-draw effect and requests a redraw.
    pub fn add_effect(&mut self, effect: Box<dyn Effect>) {
        self.effects.add(effect);
        self.needs_redraw = true;
    }

    /// Removes a post-draw effect by name. Returns whether it existed.
    pub fn remove_effect(&mut self, name: &str) -> bool {
        let removed = self.effects.remove(name);
        if removed {
            self.needs_redraw = true;
        }
        removed
    }

    /// Forces the next [`draw_layers`](Self::draw_layers) to draw even if
    /// nothing changed.
    pub fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }

    /// Forces the next update cycle to report a redraw.
    pub fn request_full_update(&mut self) {
        self.force_redraw = true;
    }

    /// Whether a redraw is pending.
    #[must_use]
    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    /// Monotonic update-cycle counter.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// The live layer store.
    #[must_use]
    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    /// The active viewports.
    #[must_use]
    pub fn viewports(&self) -> &ViewportSet {
        &self.viewports
    }

    /// The backend, for inspection.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, mutable.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Releases every GPU resource and retires the compositor.
    ///
    /// Idempotent. All operations other than `finalize` panic afterwards.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.store.finalize_all(&mut self.backend);
        self.picking.release(&mut self.backend);
        self.programs.clear();
        self.finalized = true;
    }

    /// Compiles the program for every live kind that lacks one.
    fn ensure_programs(&mut self) -> Result<(), ResourceError> {
        for &slot in self.store.draw_order() {
            let kind = self.store.kind_at(slot);
            if !self.programs.contains_key(&kind) {
                let program = self.backend.compile_program(kind.shader_source())?;
                self.programs.insert(kind, program);
            }
        }
        Ok(())
    }
}
