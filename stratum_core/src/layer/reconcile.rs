// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Descriptor reconciliation and change tracking.
//!
//! Reconciliation follows a diff-mark-drain pattern per update cycle:
//!
//! 1. **Flatten** the incoming [`DescriptorTree`] into an ordered list,
//!    keeping the first of any duplicated id and reporting the rest.
//! 2. **Finalize** layers whose id no longer appears: release buffers,
//!    free the picking range, recycle the slot.
//! 3. **Diff** each surviving descriptor against stored state and mark the
//!    matching dirty channels: props inequality → PROPS, revision change →
//!    DATA, count or kind change → COUNT (with a fresh picking range),
//!    picking-table compaction → PICKING on every live layer.
//! 4. **Drain** all channels and run
//!    [`AttributeStore::update`](crate::attribute::AttributeStore::update)
//!    for each affected layer in draw order. A failing layer is recorded
//!    in [`UpdateSummary::errors`] and blocked for this cycle; the others
//!    proceed.
//!
//! No channel is left marked when `reconcile` returns, so draw and pick
//! passes never observe a partially-updated layer.

use alloc::string::String;
use alloc::vec::Vec;

use alloc::collections::BTreeSet;

use crate::backend::RenderBackend;
use crate::descriptor::{Accessor, DescriptorTree};
use crate::dirty;
use crate::error::{ConfigurationError, LayerError};
use crate::picking::PickRange;

use super::id::LayerId;
use super::store::{LayerState, LayerStore};

/// The set of changes produced by a single [`LayerStore::reconcile`] call.
#[derive(Clone, Debug, Default)]
pub struct UpdateSummary {
    /// Handles of layers created this cycle.
    pub created: Vec<LayerId>,
    /// Handles of pre-existing layers that changed (props or buffers).
    pub updated: Vec<LayerId>,
    /// Descriptor ids of layers finalized this cycle.
    pub removed: Vec<String>,
    /// Attributes that reallocated their GPU buffer.
    pub reallocated: usize,
    /// Attributes that repopulated without reallocating.
    pub repopulated: usize,
    /// Total bytes uploaded.
    pub uploaded_bytes: usize,
    /// Whether anything visible changed and a redraw is required.
    pub needs_redraw: bool,
    /// Per-layer failures. A failing layer never aborts the others.
    pub errors: Vec<LayerError>,
}

impl UpdateSummary {
    /// Returns `true` if the cycle changed no layer at all.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.removed.is_empty()
            && self.errors.is_empty()
            && !self.needs_redraw
    }
}

fn same_accessor_versions(old: &[Accessor], new: &[Accessor]) -> bool {
    old.len() == new.len()
        && old
            .iter()
            .zip(new)
            .all(|(a, b)| a.attribute == b.attribute && a.version == b.version)
}

impl LayerStore {
    /// Reconciles a descriptor batch against the stored layers.
    ///
    /// Matching is by descriptor id: a known id updates its layer in
    /// place, an unknown id creates a layer, and a missing id finalizes
    /// its layer. Only layers whose fingerprints actually changed touch
    /// the backend; an identical batch is a no-op.
    ///
    /// `viewport_changed` and `force_redraw` feed straight into
    /// [`UpdateSummary::needs_redraw`] without causing buffer work.
    pub fn reconcile(
        &mut self,
        tree: DescriptorTree,
        viewport_changed: bool,
        force_redraw: bool,
        backend: &mut dyn RenderBackend,
    ) -> UpdateSummary {
        let mut summary = UpdateSummary {
            needs_redraw: viewport_changed || force_redraw,
            ..UpdateSummary::default()
        };

        // A failed update only blocks until the next cycle; stale-but-valid
        // buffers draw again afterwards. Unblocking is itself a visual
        // change: the layer was absent from the last frame. A layer whose
        // buffers never committed (a failed allocation) has nothing stale
        // to draw, so its update is queued again even if the incoming
        // descriptor is unchanged.
        let mut unblocked = false;
        for &idx in self.index.values() {
            if self.blocked[idx as usize] {
                self.blocked[idx as usize] = false;
                unblocked = true;
                if !self.attributes[idx as usize].ready() {
                    self.dirty.mark(idx, dirty::COUNT);
                }
            }
        }
        summary.needs_redraw |= unblocked;

        // Keep the first descriptor of a duplicated id, report the rest.
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut unique = Vec::new();
        for descriptor in tree.flatten() {
            if seen.contains(descriptor.id.as_str()) {
                summary.errors.push(LayerError::new(
                    descriptor.id.as_str(),
                    ConfigurationError::DuplicateId(descriptor.id.clone()),
                ));
            } else {
                seen.insert(descriptor.id.clone());
                unique.push(descriptor);
            }
        }

        // Finalize layers that disappeared from the batch.
        let stale: Vec<u32> = self
            .index
            .iter()
            .filter(|(id, _)| !seen.contains(id.as_str()))
            .map(|(_, &idx)| idx)
            .collect();
        for idx in stale {
            summary.removed.push(self.ids[idx as usize].clone());
            self.finalize_slot(idx, backend);
        }

        // Diff or create, in batch order. Batch order is draw order.
        let compactions_before = self.picking.compactions();
        let mut order = Vec::with_capacity(unique.len());
        for descriptor in unique {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "instance counts fit the 24-bit picking space"
            )]
            let count = descriptor.data.len as u32;

            if let Some(&idx) = self.index.get(&descriptor.id) {
                let i = idx as usize;
                let kind_changed = self.kinds[i] != descriptor.kind;
                let count_changed = kind_changed || self.data[i].len != descriptor.data.len;
                let data_changed = self.data[i].version != descriptor.data.version
                    || !same_accessor_versions(&self.accessors[i], &descriptor.accessors);
                let props_changed = self.props[i] != descriptor.props;

                if kind_changed {
                    // Schema swap: old buffers cannot be reused.
                    self.attributes[i].release(backend);
                    self.attributes[i] = crate::attribute::AttributeStore::for_kind(descriptor.kind);
                }
                self.kinds[i] = descriptor.kind;
                self.props[i] = descriptor.props;
                self.data[i] = descriptor.data;
                self.accessors[i] = descriptor.accessors;

                if count_changed {
                    self.picking.assign(idx, count);
                    self.dirty.mark(idx, dirty::COUNT);
                } else if data_changed {
                    self.dirty.mark(idx, dirty::DATA);
                }
                if props_changed {
                    self.dirty.mark(idx, dirty::PROPS);
                }
                order.push(idx);
            } else {
                let idx = self.create_slot(descriptor);
                self.picking.assign(idx, count);
                self.dirty.mark(idx, dirty::COUNT);
                summary.created.push(self.handle(idx));
                order.push(idx);
            }
        }

        // Compaction rebases every surviving range; the base is part of the
        // picking fingerprint, so unaffected layers skip for free.
        if self.picking.compactions() != compactions_before {
            let live: Vec<u32> = self.index.values().copied().collect();
            for idx in live {
                self.dirty.mark(idx, dirty::PICKING);
            }
        }

        if order != self.draw_order {
            summary.needs_redraw = true;
        }
        self.draw_order = order;

        // Drain every channel. PROPS needs no attribute work; the other
        // three all funnel into AttributeStore::update, whose fingerprints
        // decide the realloc/repopulate/skip split per attribute.
        let props_slots: Vec<u32> = self
            .dirty
            .drain(dirty::PROPS)
            .deterministic()
            .run()
            .collect();
        let count_slots: Vec<u32> = self
            .dirty
            .drain(dirty::COUNT)
            .deterministic()
            .run()
            .collect();
        let data_slots: Vec<u32> = self
            .dirty
            .drain(dirty::DATA)
            .deterministic()
            .run()
            .collect();
        let picking_slots: Vec<u32> = self
            .dirty
            .drain(dirty::PICKING)
            .deterministic()
            .run()
            .collect();

        let work: BTreeSet<u32> = count_slots
            .into_iter()
            .chain(data_slots)
            .chain(picking_slots)
            .collect();
        let mut touched: BTreeSet<u32> = props_slots.into_iter().collect();

        let pending: Vec<u32> = self
            .draw_order
            .iter()
            .copied()
            .filter(|idx| work.contains(idx))
            .collect();
        for idx in pending {
            let i = idx as usize;
            let range = self
                .picking
                .range(idx)
                .unwrap_or(PickRange { base: 0, count: 0 });
            let result = self.attributes[i].update(
                &self.ids[i],
                self.kinds[i],
                &self.data[i],
                &self.accessors[i],
                range,
                backend,
            );
            match result {
                Ok(update) => {
                    summary.reallocated += update.reallocated;
                    summary.repopulated += update.repopulated;
                    summary.uploaded_bytes += update.uploaded_bytes;
                    if update.did_work() {
                        touched.insert(idx);
                    }
                    if self.states[i] == LayerState::Uninitialized {
                        self.states[i] = LayerState::Active;
                    }
                }
                Err(err) => {
                    self.blocked[i] = true;
                    summary.errors.push(err);
                }
            }
        }

        for idx in touched {
            let handle = self.handle(idx);
            if !summary.created.contains(&handle) {
                summary.updated.push(handle);
            }
        }
        summary.needs_redraw = summary.needs_redraw
            || !summary.created.is_empty()
            || !summary.removed.is_empty()
            || !summary.updated.is_empty()
            || !summary.errors.is_empty();
        summary
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;
    use alloc::vec;

    use super::*;
    use crate::descriptor::{DataHandle, LayerDescriptor, LayerKind, LayerProps};
    use crate::error::{AccessorError, LayerErrorKind};
    use crate::testutil::CountingBackend;

    fn point(id: &str, count: usize, version: u64) -> LayerDescriptor {
        LayerDescriptor {
            id: id.to_string(),
            kind: LayerKind::Point,
            props: LayerProps::default(),
            data: DataHandle::new(count, version),
            accessors: vec![
                Accessor::new("position", 1, |i, out| {
                    out.copy_from_slice(&[i as f32, 0.0, 0.0]);
                    Ok(())
                }),
                Accessor::new("color", 1, |_, out| {
                    out.fill(1.0);
                    Ok(())
                }),
            ],
        }
    }

    fn line(id: &str, count: usize) -> LayerDescriptor {
        LayerDescriptor {
            id: id.to_string(),
            kind: LayerKind::Line,
            props: LayerProps::default(),
            data: DataHandle::new(count, 1),
            accessors: vec![
                Accessor::new("source_position", 1, |_, out| {
                    out.fill(0.0);
                    Ok(())
                }),
                Accessor::new("target_position", 1, |_, out| {
                    out.fill(1.0);
                    Ok(())
                }),
                Accessor::new("color", 1, |_, out| {
                    out.fill(1.0);
                    Ok(())
                }),
            ],
        }
    }

    #[test]
    fn identical_batches_are_a_noop() {
        let mut backend = CountingBackend::new();
        let mut store = LayerStore::new();
        let first = store.reconcile(point("a", 10, 1).into(), false, false, &mut backend);
        assert_eq!(first.created.len(), 1);
        assert!(first.needs_redraw);
        let traffic = (backend.allocations, backend.uploads);

        let second = store.reconcile(point("a", 10, 1).into(), false, false, &mut backend);
        assert!(second.is_noop(), "identical batch must be free");
        assert_eq!((backend.allocations, backend.uploads), traffic);
    }

    #[test]
    fn duplicate_ids_keep_the_first_and_report_the_rest() {
        let mut backend = CountingBackend::new();
        let mut store = LayerStore::new();
        let tree: DescriptorTree = [point("a", 10, 1).into(), point("a", 99, 1).into()]
            .into_iter()
            .collect();
        let summary = store.reconcile(tree, false, false, &mut backend);

        assert_eq!(store.layer_count(), 1);
        let idx = store.find("a").unwrap().index();
        assert_eq!(store.instance_count_at(idx), 10, "first occurrence wins");
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].is_configuration());
    }

    #[test]
    fn version_bump_repopulates_in_place() {
        let mut backend = CountingBackend::new();
        let mut store = LayerStore::new();
        store.reconcile(point("a", 10, 1).into(), false, false, &mut backend);
        let allocations = backend.allocations;

        let summary = store.reconcile(point("a", 10, 2).into(), false, false, &mut backend);
        assert_eq!(summary.reallocated, 0);
        assert_eq!(summary.repopulated, 2, "both accessor-fed attributes");
        assert_eq!(summary.updated.len(), 1);
        assert!(summary.needs_redraw);
        assert_eq!(backend.allocations, allocations, "no new buffers");
    }

    #[test]
    fn count_change_reallocates_and_moves_the_picking_range() {
        let mut backend = CountingBackend::new();
        let mut store = LayerStore::new();
        store.reconcile(point("a", 10, 1).into(), false, false, &mut backend);
        let idx = store.find("a").unwrap().index();
        let before = store.picking().range(idx).unwrap();

        let summary = store.reconcile(point("a", 25, 1).into(), false, false, &mut backend);
        assert_eq!(summary.reallocated, 3, "position, color, picking");
        let after = store.picking().range(idx).unwrap();
        assert_eq!(after.count, 25);
        assert_ne!(after.base, before.base, "reassignment moves the base");
    }

    #[test]
    fn props_change_redraws_without_buffer_traffic() {
        let mut backend = CountingBackend::new();
        let mut store = LayerStore::new();
        store.reconcile(point("a", 10, 1).into(), false, false, &mut backend);
        let traffic = (backend.allocations, backend.uploads);

        let mut restyled = point("a", 10, 1);
        restyled.props.radius = 4.0;
        let summary = store.reconcile(restyled.into(), false, false, &mut backend);
        assert!(summary.needs_redraw);
        assert_eq!(summary.updated.len(), 1);
        assert_eq!(summary.reallocated + summary.repopulated, 0);
        assert_eq!((backend.allocations, backend.uploads), traffic);
    }

    #[test]
    fn removal_releases_every_buffer() {
        let mut backend = CountingBackend::new();
        let mut store = LayerStore::new();
        store.reconcile(point("a", 10, 1).into(), false, false, &mut backend);
        let allocated = backend.allocations;

        let summary = store.reconcile(DescriptorTree::Empty, false, false, &mut backend);
        assert_eq!(summary.removed, ["a".to_string()]);
        assert!(summary.needs_redraw);
        assert_eq!(backend.buffer_releases, allocated);
        assert_eq!(store.layer_count(), 0);
    }

    #[test]
    fn kind_change_rebuilds_against_the_new_schema() {
        let mut backend = CountingBackend::new();
        let mut store = LayerStore::new();
        store.reconcile(point("a", 5, 1).into(), false, false, &mut backend);
        let point_buffers = backend.allocations;
        assert_eq!(point_buffers, 3);

        let summary = store.reconcile(line("a", 5).into(), false, false, &mut backend);
        // source_position, target_position, color, picking_color.
        assert_eq!(summary.reallocated, 4);
        let idx = store.find("a").unwrap().index();
        assert_eq!(store.kind_at(idx), LayerKind::Line);
        assert!(store.attributes_at(idx).get("source_position").is_some());
    }

    #[test]
    fn one_failing_layer_never_aborts_the_others() {
        let mut backend = CountingBackend::new();
        let mut store = LayerStore::new();
        let tree: DescriptorTree = [point("good", 4, 1).into(), point("bad", 4, 1).into()]
            .into_iter()
            .collect();
        store.reconcile(tree, false, false, &mut backend);

        let mut bad = point("bad", 4, 2);
        bad.accessors[0] = Accessor::new("position", 2, |i, _| {
            Err(AccessorError::Failed {
                attribute: "position",
                index: i,
            })
        });
        let tree: DescriptorTree = [point("good", 4, 2).into(), bad.into()]
            .into_iter()
            .collect();
        let summary = store.reconcile(tree, false, false, &mut backend);

        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].layer_id, "bad");
        assert!(matches!(
            summary.errors[0].kind,
            LayerErrorKind::Accessor(_)
        ));
        let good = store.find("good").unwrap().index();
        let bad = store.find("bad").unwrap().index();
        assert!(store.drawable_at(good), "healthy layer updated and draws");
        assert!(store.blocked_at(bad));
        assert!(!store.drawable_at(bad), "failed layer sits out this cycle");
    }

    #[test]
    fn blocked_layers_draw_stale_contents_next_cycle() {
        let mut backend = CountingBackend::new();
        let mut store = LayerStore::new();
        store.reconcile(point("a", 4, 1).into(), false, false, &mut backend);

        let failing = || {
            let mut d = point("a", 4, 2);
            d.accessors[0] = Accessor::new("position", 2, |i, _| {
                Err(AccessorError::Failed {
                    attribute: "position",
                    index: i,
                })
            });
            d
        };
        let summary = store.reconcile(failing().into(), false, false, &mut backend);
        assert_eq!(summary.errors.len(), 1);
        let idx = store.find("a").unwrap().index();
        assert!(!store.drawable_at(idx));

        // Same revisions again: nothing is dirty, the block clears, and the
        // layer draws its last committed buffers.
        let summary = store.reconcile(failing().into(), false, false, &mut backend);
        assert!(summary.errors.is_empty());
        assert!(store.drawable_at(idx), "stale-but-valid, never dropped");
        assert!(summary.needs_redraw, "the layer reappears on screen");
    }

    #[test]
    fn failed_allocation_retries_once_the_backend_recovers() {
        let mut backend = CountingBackend::new();
        let mut store = LayerStore::new();
        backend.fail_next_allocation = true;
        let tree: DescriptorTree = [point("oom", 4, 1).into(), point("ok", 4, 1).into()]
            .into_iter()
            .collect();
        let summary = store.reconcile(tree, false, false, &mut backend);

        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].layer_id, "oom");
        assert!(matches!(
            summary.errors[0].kind,
            LayerErrorKind::Resource(_)
        ));
        let oom = store.find("oom").unwrap().index();
        let ok = store.find("ok").unwrap().index();
        assert!(!store.drawable_at(oom), "no buffers ever committed");
        assert!(store.drawable_at(ok), "the other layer still updates");

        // The identical batch against a healthy backend: nothing in the
        // descriptor changed, but the uncommitted layer is retried anyway.
        let tree: DescriptorTree = [point("oom", 4, 1).into(), point("ok", 4, 1).into()]
            .into_iter()
            .collect();
        let summary = store.reconcile(tree, false, false, &mut backend);
        assert!(summary.errors.is_empty());
        assert_eq!(summary.updated, [store.handle(oom)]);
        assert!(store.drawable_at(oom), "buffers commit on the retry");
        assert!(summary.needs_redraw);
    }

    #[test]
    fn reordering_redraws_without_buffer_traffic() {
        let mut backend = CountingBackend::new();
        let mut store = LayerStore::new();
        let tree: DescriptorTree = [point("a", 2, 1).into(), point("b", 2, 1).into()]
            .into_iter()
            .collect();
        store.reconcile(tree, false, false, &mut backend);
        let a = store.find("a").unwrap().index();
        let b = store.find("b").unwrap().index();
        assert_eq!(store.draw_order(), [a, b]);
        let traffic = (backend.allocations, backend.uploads);

        let tree: DescriptorTree = [point("b", 2, 1).into(), point("a", 2, 1).into()]
            .into_iter()
            .collect();
        let summary = store.reconcile(tree, false, false, &mut backend);
        assert_eq!(store.draw_order(), [b, a]);
        assert!(summary.needs_redraw, "order is part of the visual state");
        assert_eq!((backend.allocations, backend.uploads), traffic);
    }

    #[test]
    fn viewport_change_alone_requests_a_redraw() {
        let mut backend = CountingBackend::new();
        let mut store = LayerStore::new();
        store.reconcile(point("a", 2, 1).into(), false, false, &mut backend);

        let summary = store.reconcile(point("a", 2, 1).into(), true, false, &mut backend);
        assert!(summary.needs_redraw);
        assert_eq!(summary.reallocated + summary.repopulated, 0);
    }

    #[test]
    fn zero_instance_layers_are_not_drawable() {
        let mut backend = CountingBackend::new();
        let mut store = LayerStore::new();
        store.reconcile(point("a", 0, 1).into(), false, false, &mut backend);
        let idx = store.find("a").unwrap().index();
        assert_eq!(store.state_at(idx), LayerState::Active);
        assert!(!store.drawable_at(idx), "nothing to draw, no buffers");
        assert_eq!(backend.allocations, 0);
    }
}
