// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Named post-draw effects.
//!
//! Effects run after the screen pass in registration order. Each effect
//! sees the executed [`RenderPlan`] and the backend through a
//! [`PassContext`] and may issue additional draws or full-target
//! operations. Failures are isolated: a failing effect is reported and
//! skipped, and the remaining effects still run.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use core::fmt;

use thiserror::Error;

use stratum_core::backend::RenderBackend;
use stratum_core::error::ResourceError;
use stratum_core::viewport::ViewportSet;

use crate::plan::RenderPlan;

/// What an [`Effect`] sees when it runs.
pub struct PassContext<'a> {
    /// Monotonic cycle counter.
    pub frame_index: u64,
    /// The viewports that were composited.
    pub viewports: &'a ViewportSet,
    /// The screen-pass plan that was just executed.
    pub plan: &'a RenderPlan,
    /// The backend, for issuing further work.
    pub backend: &'a mut dyn RenderBackend,
}

impl fmt::Debug for PassContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassContext")
            .field("frame_index", &self.frame_index)
            .field("viewports", &self.viewports)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

/// A named post-draw pass.
pub trait Effect {
    /// Stable name used for registration and removal.
    fn name(&self) -> &str;

    /// Runs the effect after the screen pass.
    fn apply(&mut self, ctx: &mut PassContext<'_>) -> Result<(), ResourceError>;
}

/// A failure of one effect, carrying the effect's name.
#[derive(Debug, Error)]
#[error("effect `{name}`: {source}")]
pub struct EffectError {
    /// Name of the failing effect.
    pub name: String,
    /// The underlying backend failure.
    #[source]
    pub source: ResourceError,
}

/// Ordered registry of post-draw effects.
#[derive(Default)]
pub struct EffectManager {
    effects: Vec<Box<dyn Effect>>,
}

impl fmt::Debug for EffectManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectManager")
            .field("effects", &self.effects.len())
            .finish()
    }
}

impl EffectManager {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an effect at the end of the run order.
    ///
    /// An existing effect with the same name is replaced in place,
    /// keeping its position.
    pub fn add(&mut self, effect: Box<dyn Effect>) {
        if let Some(existing) = self
            .effects
            .iter_mut()
            .find(|e| e.name() == effect.name())
        {
            *existing = effect;
        } else {
            self.effects.push(effect);
        }
    }

    /// Removes the effect with the given name. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.effects.len();
        self.effects.retain(|e| e.name() != name);
        self.effects.len() != before
    }

    /// Number of registered effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Returns `true` if no effect is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Runs every effect in order, collecting failures.
    ///
    /// A failing effect never aborts the ones after it.
    pub fn apply_all(
        &mut self,
        frame_index: u64,
        viewports: &ViewportSet,
        plan: &RenderPlan,
        backend: &mut dyn RenderBackend,
    ) -> Vec<EffectError> {
        let mut errors = Vec::new();
        for effect in &mut self.effects {
            let mut ctx = PassContext {
                frame_index,
                viewports,
                plan,
                backend,
            };
            if let Err(source) = effect.apply(&mut ctx) {
                errors.push(EffectError {
                    name: effect.name().to_string(),
                    source,
                });
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StubBackend;

    struct Tinting {
        name: &'static str,
        applied: u64,
        fail: bool,
    }

    impl Effect for Tinting {
        fn name(&self) -> &str {
            self.name
        }

        fn apply(&mut self, _ctx: &mut PassContext<'_>) -> Result<(), ResourceError> {
            if self.fail {
                return Err(ResourceError::Rejected {
                    reason: "tint pass rejected",
                });
            }
            self.applied += 1;
            Ok(())
        }
    }

    fn tint(name: &'static str) -> Box<Tinting> {
        Box::new(Tinting {
            name,
            applied: 0,
            fail: false,
        })
    }

    #[test]
    fn add_replaces_by_name_in_place() {
        let mut manager = EffectManager::new();
        manager.add(tint("glow"));
        manager.add(tint("blur"));
        manager.add(tint("glow"));
        assert_eq!(manager.len(), 2, "same name replaces, not appends");
    }

    #[test]
    fn remove_by_name() {
        let mut manager = EffectManager::new();
        manager.add(tint("glow"));
        assert!(manager.remove("glow"));
        assert!(!manager.remove("glow"));
        assert!(manager.is_empty());
    }

    #[test]
    fn a_failing_effect_does_not_abort_the_rest() {
        let mut manager = EffectManager::new();
        manager.add(Box::new(Tinting {
            name: "broken",
            applied: 0,
            fail: true,
        }));
        manager.add(tint("glow"));

        let mut backend = StubBackend::new();
        let viewports = ViewportSet::new();
        let plan = RenderPlan::default();
        let errors = manager.apply_all(1, &viewports, &plan, &mut backend);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].name, "broken");

        // The second run proves "glow" kept running and keeps running.
        let errors = manager.apply_all(2, &viewports, &plan, &mut backend);
        assert_eq!(errors.len(), 1);
    }
}
