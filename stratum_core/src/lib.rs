// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types, layer reconciliation, and picking encoding for data-driven
//! GPU layers.
//!
//! `stratum_core` owns the live scene state of a layer-based renderer: the
//! ordered set of active layers, the per-layer attribute buffers, and the
//! machinery that maps incoming layer descriptors onto existing layers with
//! minimal GPU churn. It is `no_std` compatible (with `alloc`) and stores
//! layers in struct-of-arrays layout with generational index handles.
//!
//! # Architecture
//!
//! Each update cycle turns a batch of application-supplied descriptors into
//! incremental buffer work:
//!
//! ```text
//!   DescriptorTree ──► LayerStore::reconcile() ──► UpdateSummary
//!                           │
//!                           ├── AttributeStore::update() ──► RenderBackend
//!                           │     (fingerprint diff, populate, upload)
//!                           └── PickingTable (stable color ranges)
//! ```
//!
//! **[`descriptor`]** — Immutable layer descriptors: shape kind, style
//! props, data revision handles, and accessor functions that populate
//! attributes from application records.
//!
//! **[`layer`]** — Struct-of-arrays layer storage with generational handles
//! and the reconciliation algorithm that diffs descriptors against the
//! previous frame's layers.
//!
//! **[`attribute`]** — Per-layer attribute buffers with fingerprint-based
//! dirty checking: count changes reallocate, revision changes repopulate in
//! place, unchanged fingerprints do no work.
//!
//! **[`dirty`]** — Multi-channel dirty tracking via `understory_dirty`.
//! Reconciliation marks the PROPS, DATA, COUNT, and PICKING channels and
//! drains them deterministically before any draw.
//!
//! **[`picking`]** — Reversible 24-bit color encoding of object identity
//! and the stable per-layer range table used by the picking pass.
//!
//! **[`viewport`]** — Camera state, Web Mercator projection, and the
//! ordered viewport set that defines composition order.
//!
//! **[`backend`]** — The [`RenderBackend`](backend::RenderBackend) trait
//! consumed for buffer allocation, draw-call issuance, and pixel readback.
//!
//! **[`error`]** — The per-layer error taxonomy. Errors are collected per
//! update cycle; one failing layer never aborts the others.
//!
//! **[`trace`]** — [`TraceSink`](trace::TraceSink) trait and event types
//! for frame instrumentation, with zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one
//!   branch per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod attribute;
pub mod backend;
pub mod descriptor;
pub mod dirty;
pub mod error;
pub mod layer;
pub mod picking;
pub mod trace;
pub mod viewport;

#[cfg(test)]
mod testutil;
