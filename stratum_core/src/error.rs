// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer error taxonomy.
//!
//! Failures are scoped to the offending layer and collected into the update
//! cycle's [`UpdateSummary`](crate::layer::UpdateSummary) rather than
//! aborting the cycle:
//!
//! - [`ConfigurationError`] — the descriptor itself is unusable (duplicate
//!   id, missing accessor). No GPU work is issued for that layer.
//! - [`AccessorError`] — an accessor function failed or produced a
//!   non-finite value for some record. The layer's attribute update is
//!   aborted for the frame and the previous buffer contents are retained
//!   (stale-but-valid rather than corrupt).
//! - [`ResourceError`] — the rendering backend refused an allocation or
//!   upload. Fatal for that layer's draw this frame only.
//!
//! Picking decode never errors: an unrecognized pixel value resolves to
//! "no object".

use alloc::string::String;

use thiserror::Error;

/// The descriptor list or a single descriptor is misconfigured.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Two descriptors in the same update cycle share an id. The first
    /// occurrence is retained; the duplicate is skipped.
    #[error("duplicate layer id `{0}`")]
    DuplicateId(String),
    /// The layer kind's schema declares an attribute no accessor provides.
    #[error("kind `{kind}` requires attribute `{attribute}` but no accessor provides it")]
    MissingAccessor {
        /// Name of the layer kind.
        kind: &'static str,
        /// Name of the schema attribute without an accessor.
        attribute: &'static str,
    },
}

/// An accessor function failed while populating an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum AccessorError {
    /// The accessor reported failure for the given record index.
    #[error("accessor for `{attribute}` failed at record {index}")]
    Failed {
        /// Attribute being populated.
        attribute: &'static str,
        /// Record index the accessor was invoked with.
        index: usize,
    },
    /// The accessor wrote a NaN or infinite component.
    #[error("accessor for `{attribute}` produced a non-finite value at record {index}")]
    NonFinite {
        /// Attribute being populated.
        attribute: &'static str,
        /// Record index the accessor was invoked with.
        index: usize,
    },
}

/// The rendering backend refused a resource request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The backend could not allocate the requested buffer.
    #[error("backend out of memory allocating {size_bytes} bytes")]
    OutOfMemory {
        /// Requested allocation size.
        size_bytes: usize,
    },
    /// The backend rejected the request for another reason.
    #[error("backend rejected the request: {reason}")]
    Rejected {
        /// Backend-supplied reason.
        reason: &'static str,
    },
    /// A handle referred to a resource the backend no longer owns.
    #[error("stale resource handle")]
    StaleHandle,
}

/// What went wrong for one layer.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LayerErrorKind {
    /// See [`ConfigurationError`].
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// See [`AccessorError`].
    #[error(transparent)]
    Accessor(#[from] AccessorError),
    /// See [`ResourceError`].
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// An error scoped to a single layer within an update cycle.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("layer `{layer_id}`: {kind}")]
pub struct LayerError {
    /// Id of the layer the error is scoped to.
    pub layer_id: String,
    /// The failure itself.
    pub kind: LayerErrorKind,
}

impl LayerError {
    /// Creates a layer-scoped error.
    #[must_use]
    pub fn new(layer_id: impl Into<String>, kind: impl Into<LayerErrorKind>) -> Self {
        Self {
            layer_id: layer_id.into(),
            kind: kind.into(),
        }
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind, LayerErrorKind::Configuration(_))
    }
}
