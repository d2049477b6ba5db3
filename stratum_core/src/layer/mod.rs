// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer storage and reconciliation.
//!
//! A *layer* is the long-lived, GPU-backed counterpart of one descriptor
//! id. Each layer has:
//!
//! - An identity ([`LayerId`]) — a generational handle that becomes stale
//!   when the layer is finalized, so a reappearing string id after a gap
//!   is a brand-new layer, never a resurrected one.
//! - **Descriptor state** captured from the last update: kind, props,
//!   data handle, accessors.
//! - **GPU state**: an [`AttributeStore`](crate::attribute::AttributeStore)
//!   of per-instance buffers and a stable picking range.
//! - A lifecycle state: `Uninitialized → Active → Finalized`, with no
//!   transition out of `Finalized`.
//!
//! Layers are stored in struct-of-arrays layout with index-based handles;
//! `draw_order` holds the slots in descriptor list order, which is draw
//! order (later entries draw on top).
//!
//! # Dirty tracking
//!
//! [`LayerStore::reconcile`] diffs incoming descriptors against stored
//! state and marks the channels in [`dirty`](crate::dirty): PROPS, DATA,
//! COUNT, and PICKING. All channels are drained before reconcile returns,
//! so no partially-updated layer is ever visible to a draw or pick pass.

mod id;
mod reconcile;
mod store;

pub use id::LayerId;
pub use reconcile::UpdateSummary;
pub use store::{LayerState, LayerStore};
