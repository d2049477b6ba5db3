// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render plan: the ordered draw commands for one pass.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use stratum_core::attribute::PICKING_ATTRIBUTE;
use stratum_core::backend::{
    BufferBinding, DrawCall, DrawUniforms, PassKind, ProgramHandle, RenderBackend, RenderTarget,
};
use stratum_core::descriptor::LayerKind;
use stratum_core::error::ResourceError;
use stratum_core::layer::{LayerId, LayerStore};
use stratum_core::viewport::{ViewportId, ViewportSet};

/// One instanced draw command in the plan.
///
/// Items are produced viewport-major: all layers of the first viewport,
/// then all layers of the second, and so on. Within a viewport, layer
/// order is draw order, so later items draw on top.
#[derive(Clone, Debug)]
pub struct RenderItem {
    /// Handle of the layer this item draws.
    pub layer: LayerId,
    /// Raw slot index for `*_at()` store access.
    pub slot: u32,
    /// Viewport this item composites into.
    pub viewport: ViewportId,
    /// Compiled program for the layer's kind.
    pub program: ProgramHandle,
    /// Number of instances.
    pub instance_count: u32,
    /// Uniform state captured at plan time.
    pub uniforms: DrawUniforms,
}

/// The ordered draw commands for one pass over all viewports.
#[derive(Clone, Debug, Default)]
pub struct RenderPlan {
    /// Which pass this plan draws.
    pub pass: PassKind,
    /// Draw commands in composition order.
    pub items: Vec<RenderItem>,
}

impl RenderPlan {
    /// Builds the plan for `pass` by walking viewports × layers.
    ///
    /// Skips layers that are invisible, uncommitted, blocked by a failed
    /// update, or have no instances. `filter`, when present, restricts the
    /// plan to the given slots (used by filtered pick queries).
    #[must_use]
    pub fn build(
        store: &LayerStore,
        viewports: &ViewportSet,
        programs: &BTreeMap<LayerKind, ProgramHandle>,
        pass: PassKind,
        filter: Option<&BTreeSet<u32>>,
    ) -> Self {
        let mut items = Vec::new();
        for viewport in viewports.viewports() {
            for &slot in store.draw_order() {
                if !store.drawable_at(slot) {
                    continue;
                }
                if let Some(filter) = filter
                    && !filter.contains(&slot)
                {
                    continue;
                }
                let Some(&program) = programs.get(&store.kind_at(slot)) else {
                    continue;
                };
                let props = store.props_at(slot);
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "instance counts fit the 24-bit picking space"
                )]
                let instance_count = store.attributes_at(slot).instance_count() as u32;
                items.push(RenderItem {
                    layer: store.handle(slot),
                    slot,
                    viewport: viewport.id,
                    program,
                    instance_count,
                    uniforms: DrawUniforms {
                        viewport: viewport.state,
                        viewport_rect: viewport.rect,
                        radius: props.radius,
                        line_width: props.line_width,
                        color: props.color,
                        opacity: props.opacity,
                        pass,
                    },
                });
            }
        }
        Self { pass, items }
    }

    /// Issues every item as a draw call against `target`.
    ///
    /// The screen pass binds all schema attributes and omits the picking
    /// color; the picking pass binds everything and the shader's pass
    /// uniform selects the encoded color path. Returns the number of draw
    /// calls issued.
    pub fn execute(
        &self,
        store: &LayerStore,
        target: RenderTarget,
        backend: &mut dyn RenderBackend,
    ) -> Result<usize, ResourceError> {
        for item in &self.items {
            let attributes = store.attributes_at(item.slot);
            let mut bindings = Vec::with_capacity(attributes.attributes().len());
            for attribute in attributes.attributes() {
                if self.pass == PassKind::Screen && attribute.desc().name == PICKING_ATTRIBUTE {
                    continue;
                }
                let Some(buffer) = attribute.buffer() else {
                    continue;
                };
                bindings.push(BufferBinding {
                    name: attribute.desc().name,
                    buffer,
                    size: attribute.desc().size,
                });
            }
            backend.draw(&DrawCall {
                program: item.program,
                buffers: &bindings,
                instance_count: item.instance_count,
                uniforms: &item.uniforms,
                target,
            })?;
        }
        Ok(self.items.len())
    }
}
