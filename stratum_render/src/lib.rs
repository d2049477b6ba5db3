// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render-plan construction, picking queries, and compositing for stratum.
//!
//! This crate sits between [`stratum_core`]'s layer reconciliation and a
//! concrete [`RenderBackend`](stratum_core::backend::RenderBackend). It
//! defines:
//!
//! - [`RenderItem`] / [`RenderPlan`] — the ordered draw commands for one
//!   pass, built by walking viewports × layers in composition order
//! - [`Compositor`] — the orchestrator owning the backend, the layer
//!   store, the viewport set, and the redraw flag
//! - [`PickingManager`] — encoded-color off-screen picking with point and
//!   rectangle queries
//! - [`Effect`] / [`EffectManager`] — named post-draw passes applied after
//!   the screen pass

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

mod compositor;
mod effect;
mod picking;
mod plan;

pub use compositor::{Compositor, DrawReport};
pub use effect::{Effect, EffectError, EffectManager, PassContext};
pub use picking::{PickError, PickInfo, PickingManager, PointQuery, RectQuery};
pub use plan::{RenderItem, RenderPlan};

#[cfg(test)]
mod testutil;
