// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays layer storage with allocation and lifecycle management.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use understory_dirty::{CycleHandling, DirtyTracker};

use crate::attribute::AttributeStore;
use crate::backend::RenderBackend;
use crate::descriptor::{Accessor, DataHandle, LayerDescriptor, LayerKind, LayerProps};
use crate::picking::PickingTable;

use super::id::LayerId;

/// Lifecycle state of one layer slot.
///
/// `Uninitialized` layers have a slot but no committed GPU buffers yet;
/// they are skipped by draw and pick passes. `Finalized` is terminal:
/// the slot is freed and a reappearing descriptor id allocates a fresh
/// layer with a new generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayerState {
    /// Created this cycle, attribute update not yet committed.
    #[default]
    Uninitialized,
    /// At least one successful attribute commit; drawable.
    Active,
    /// Removed. GPU resources released, slot freed for reuse.
    Finalized,
}

/// Struct-of-arrays storage for all layers.
///
/// Layers are addressed by [`LayerId`] handles. Internally, each layer
/// occupies a slot in parallel arrays. Finalized layers are recycled via a
/// free list, and generation counters prevent stale handle access.
///
/// Raw-slot `*_at()` accessors let render code index directly into the
/// arrays via [`draw_order`](Self::draw_order) without paying for
/// generation checks on every access.
#[derive(Debug)]
pub struct LayerStore {
    // -- Descriptor state (captured from the last update) --
    pub(crate) ids: Vec<String>,
    pub(crate) kinds: Vec<LayerKind>,
    pub(crate) props: Vec<LayerProps>,
    pub(crate) data: Vec<DataHandle>,
    pub(crate) accessors: Vec<Vec<Accessor>>,

    // -- GPU state --
    pub(crate) attributes: Vec<AttributeStore>,

    // -- Lifecycle --
    pub(crate) states: Vec<LayerState>,
    /// Set when the slot's last attribute update failed; cleared at the
    /// start of the next reconcile. Blocked layers are not drawn.
    pub(crate) blocked: Vec<bool>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,

    // -- Ordering and lookup --
    pub(crate) draw_order: Vec<u32>,
    pub(crate) index: BTreeMap<String, u32>,

    // -- Picking --
    pub(crate) picking: PickingTable,
}

impl Default for LayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStore {
    /// Creates an empty layer store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: Vec::new(),
            kinds: Vec::new(),
            props: Vec::new(),
            data: Vec::new(),
            accessors: Vec::new(),
            attributes: Vec::new(),
            states: Vec::new(),
            blocked: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            draw_order: Vec::new(),
            index: BTreeMap::new(),
            picking: PickingTable::new(),
        }
    }

    // -- Handles --

    /// Returns whether the given handle refers to a live layer.
    #[must_use]
    pub fn is_alive(&self, id: LayerId) -> bool {
        (id.idx < self.len)
            && self.generation[id.idx as usize] == id.generation
            && self.states[id.idx as usize] != LayerState::Finalized
    }

    /// The current handle for a slot.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds.
    #[must_use]
    pub fn handle(&self, idx: u32) -> LayerId {
        assert!(idx < self.len, "slot index out of bounds");
        LayerId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Looks up the live layer bound to a descriptor id.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<LayerId> {
        self.index.get(id).map(|&idx| self.handle(idx))
    }

    /// Number of live layers.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.index.len()
    }

    /// Live slots in draw order. Later entries draw on top.
    #[must_use]
    pub fn draw_order(&self) -> &[u32] {
        &self.draw_order
    }

    /// The picking range table shared by all layers.
    #[must_use]
    pub fn picking(&self) -> &PickingTable {
        &self.picking
    }

    fn validate(&self, id: LayerId) {
        assert!(self.is_alive(id), "stale layer handle: {id:?}");
    }

    // -- Raw-slot accessors --

    /// Descriptor id of the layer in `idx`.
    #[must_use]
    pub fn id_at(&self, idx: u32) -> &str {
        &self.ids[idx as usize]
    }

    /// Shape kind of the layer in `idx`.
    #[must_use]
    pub fn kind_at(&self, idx: u32) -> LayerKind {
        self.kinds[idx as usize]
    }

    /// Style props of the layer in `idx`.
    #[must_use]
    pub fn props_at(&self, idx: u32) -> &LayerProps {
        &self.props[idx as usize]
    }

    /// Attribute buffers of the layer in `idx`.
    #[must_use]
    pub fn attributes_at(&self, idx: u32) -> &AttributeStore {
        &self.attributes[idx as usize]
    }

    /// Lifecycle state of the layer in `idx`.
    #[must_use]
    pub fn state_at(&self, idx: u32) -> LayerState {
        self.states[idx as usize]
    }

    /// Whether the layer in `idx` failed its last attribute update.
    #[must_use]
    pub fn blocked_at(&self, idx: u32) -> bool {
        self.blocked[idx as usize]
    }

    /// Instance count bound to the layer in `idx`.
    #[must_use]
    pub fn instance_count_at(&self, idx: u32) -> usize {
        self.data[idx as usize].len
    }

    /// Whether the layer in `idx` should draw: visible, committed, and not
    /// blocked by a failed update.
    #[must_use]
    pub fn drawable_at(&self, idx: u32) -> bool {
        self.props[idx as usize].visible
            && self.states[idx as usize] == LayerState::Active
            && !self.blocked[idx as usize]
            && self.attributes[idx as usize].ready()
    }

    /// Style props of a layer by handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn props(&self, id: LayerId) -> &LayerProps {
        self.validate(id);
        &self.props[id.idx as usize]
    }

    // -- Allocation (crate-internal, driven by reconcile) --

    /// Claims a slot for a new layer and stores its descriptor state.
    ///
    /// The layer starts `Uninitialized`; it becomes `Active` on its first
    /// successful attribute commit.
    pub(crate) fn create_slot(&mut self, descriptor: LayerDescriptor) -> u32 {
        let LayerDescriptor {
            id,
            kind,
            props,
            data,
            accessors,
        } = descriptor;

        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot.
            let i = idx as usize;
            self.ids[i] = id.clone();
            self.kinds[i] = kind;
            self.props[i] = props;
            self.data[i] = data;
            self.accessors[i] = accessors;
            self.attributes[i] = AttributeStore::for_kind(kind);
            self.states[i] = LayerState::Uninitialized;
            self.blocked[i] = false;
            idx
        } else {
            // Allocate a new slot.
            let idx = self.len;
            self.len += 1;
            self.ids.push(id.clone());
            self.kinds.push(kind);
            self.props.push(props);
            self.data.push(data);
            self.accessors.push(accessors);
            self.attributes.push(AttributeStore::for_kind(kind));
            self.states.push(LayerState::Uninitialized);
            self.blocked.push(false);
            self.generation.push(0);
            idx
        };

        self.index.insert(id, idx);
        idx
    }

    /// Finalizes the layer in `idx`: releases GPU resources, frees the
    /// picking range, and recycles the slot.
    pub(crate) fn finalize_slot(&mut self, idx: u32, backend: &mut dyn RenderBackend) {
        let i = idx as usize;
        if self.states[i] == LayerState::Finalized {
            return;
        }

        self.attributes[i].release(backend);
        self.picking.release(idx);
        self.dirty.remove_key(idx);
        self.index.remove(&self.ids[i]);
        self.states[i] = LayerState::Finalized;

        // Bump generation so old handles immediately fail validation.
        self.generation[i] += 1;
        self.free_list.push(idx);
    }

    /// Finalizes every live layer and releases all GPU resources.
    ///
    /// Idempotent; a second call finds nothing to release.
    pub fn finalize_all(&mut self, backend: &mut dyn RenderBackend) {
        let live: Vec<u32> = self.index.values().copied().collect();
        for idx in live {
            self.finalize_slot(idx, backend);
        }
        self.draw_order.clear();
    }
}
