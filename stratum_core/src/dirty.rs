// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! Stratum uses multi-channel dirty tracking (via [`understory_dirty`]) to
//! record what kind of work each layer needs before the next draw. The
//! layer list is flat, so every channel is local-only: marking a layer
//! never propagates to other layers, and there are no dependency edges.
//!
//! # Channel semantics
//!
//! - [`PROPS`] — a style prop changed (radius, color, opacity, ...). The
//!   layer's uniforms are refreshed and a redraw is required, but no
//!   attribute is touched.
//! - [`DATA`] — the data or an accessor revision changed without a count
//!   change. Affected attributes repopulate in place, without reallocation.
//! - [`COUNT`] — the instance count changed. Attribute buffers reallocate,
//!   repopulate fully, and the layer's picking range is reassigned.
//! - [`PICKING`] — the layer's picking base moved (reassignment or table
//!   compaction). Only the picking color attribute repopulates.
//!
//! # Consumption
//!
//! Callers never query dirty state directly. Each
//! [`LayerStore::reconcile`](crate::layer::LayerStore::reconcile) call
//! marks channels while diffing descriptors, then drains all of them and
//! runs [`AttributeStore::update`](crate::attribute::AttributeStore::update)
//! for every affected layer before returning.

use understory_dirty::Channel;

/// Style props changed — uniforms refresh and redraw, no attribute work.
pub const PROPS: Channel = Channel::new(0);

/// Data or accessor revision changed — repopulation without reallocation.
pub const DATA: Channel = Channel::new(1);

/// Instance count changed — reallocation, repopulation, picking reassign.
pub const COUNT: Channel = Channel::new(2);

/// Picking base moved — picking color attribute repopulation only.
pub const PICKING: Channel = Channel::new(3);
