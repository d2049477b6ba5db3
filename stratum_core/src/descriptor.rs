// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Application-facing layer descriptors.
//!
//! A [`LayerDescriptor`] is the immutable, per-frame description of one
//! logical layer: a stable string id, a shape [`LayerKind`], style
//! [`LayerProps`], a [`DataHandle`] naming the record sequence, and the
//! [`Accessor`] functions that turn records into attribute values.
//!
//! Descriptors with the same `id` in consecutive frames are updates to the
//! same layer, not new layers; reconciliation
//! ([`LayerStore::reconcile`](crate::layer::LayerStore::reconcile)) diffs
//! them against the previous frame's state.
//!
//! # Change detection
//!
//! Rust values carry no stable reference identity to fingerprint, so
//! change detection uses explicit revision counters: [`DataHandle::version`]
//! and [`Accessor::version`] are bumped by the caller whenever the
//! underlying data or accessor logic changes. Equal versions mean "nothing
//! to do", which is what keeps unchanged frames free of buffer traffic.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use core::fmt;

use crate::error::AccessorError;

/// The closed set of shape kinds a layer can draw.
///
/// Kinds share one shallow interface — a schema of required attributes and
/// a fixed shader artifact — with no deeper hierarchy. Geometry-specific
/// triangulation happens in the shaders and is not modeled here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKind {
    /// Screen-facing circles at projected positions.
    Point,
    /// Straight segments between source and target positions.
    Line,
    /// Filled polygons anchored at per-instance positions.
    Polygon,
    /// Great-arc ribbons between source and target positions.
    Arc,
}

impl LayerKind {
    /// Short name for diagnostics and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::Polygon => "polygon",
            Self::Arc => "arc",
        }
    }

    /// The per-instance attributes this kind requires.
    ///
    /// The picking color attribute is implicit on every schema and is
    /// populated by the engine, not by an accessor.
    #[must_use]
    pub const fn schema(self) -> &'static [AttributeDesc] {
        const POINT: &[AttributeDesc] = &[
            AttributeDesc::new("position", 3, AttributeSemantic::Position),
            AttributeDesc::new("color", 4, AttributeSemantic::Color),
        ];
        const LINE: &[AttributeDesc] = &[
            AttributeDesc::new("source_position", 3, AttributeSemantic::Position),
            AttributeDesc::new("target_position", 3, AttributeSemantic::Position),
            AttributeDesc::new("color", 4, AttributeSemantic::Color),
        ];
        const POLYGON: &[AttributeDesc] = &[
            AttributeDesc::new("position", 3, AttributeSemantic::Position),
            AttributeDesc::new("color", 4, AttributeSemantic::Color),
        ];
        const ARC: &[AttributeDesc] = &[
            AttributeDesc::new("source_position", 3, AttributeSemantic::Position),
            AttributeDesc::new("target_position", 3, AttributeSemantic::Position),
            AttributeDesc::new("source_color", 4, AttributeSemantic::Color),
            AttributeDesc::new("target_color", 4, AttributeSemantic::Color),
            AttributeDesc::new("height", 1, AttributeSemantic::Scalar),
        ];
        match self {
            Self::Point => POINT,
            Self::Line => LINE,
            Self::Polygon => POLYGON,
            Self::Arc => ARC,
        }
    }

    /// The fixed shader artifact for this kind.
    #[must_use]
    pub const fn shader_source(self) -> &'static str {
        match self {
            Self::Point => shader::POINT,
            Self::Line => shader::LINE,
            Self::Polygon => shader::POLYGON,
            Self::Arc => shader::ARC,
        }
    }
}

/// Fixed per-kind shader sources.
///
/// Treated as opaque artifacts: the engine hands them to
/// [`RenderBackend::compile_program`](crate::backend::RenderBackend::compile_program)
/// once per kind and never inspects them.
mod shader {
    pub(super) const POINT: &str = include_str!("shaders/point.vert.glsl");
    pub(super) const LINE: &str = include_str!("shaders/line.vert.glsl");
    pub(super) const POLYGON: &str = include_str!("shaders/polygon.vert.glsl");
    pub(super) const ARC: &str = include_str!("shaders/arc.vert.glsl");
}

/// Broad meaning of an attribute, used by backends that need to know which
/// buffer holds projectable positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeSemantic {
    /// Lon/lat/z world position.
    Position,
    /// RGBA color.
    Color,
    /// Free scalar (widths, heights, ...).
    Scalar,
}

/// Declares one per-instance attribute of a schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AttributeDesc {
    /// Attribute name, unique within a schema.
    pub name: &'static str,
    /// Components per instance.
    pub size: u32,
    /// Broad meaning.
    pub semantic: AttributeSemantic,
}

impl AttributeDesc {
    /// Creates an attribute declaration.
    #[must_use]
    pub const fn new(name: &'static str, size: u32, semantic: AttributeSemantic) -> Self {
        Self {
            name,
            size,
            semantic,
        }
    }
}

/// The fill function of an [`Accessor`].
///
/// Invoked once per record with the record index and an output slice of
/// exactly [`AttributeDesc::size`] components.
pub type FillFn = Arc<dyn Fn(usize, &mut [f32]) -> Result<(), AccessorError>>;

/// Populates one named attribute from application records.
#[derive(Clone)]
pub struct Accessor {
    /// Schema attribute this accessor feeds.
    pub attribute: &'static str,
    /// Caller-bumped revision. Bump whenever the accessor's results would
    /// differ for the same record.
    pub version: u64,
    /// The fill function.
    pub fill: FillFn,
}

impl Accessor {
    /// Creates an accessor for `attribute` at revision `version`.
    #[must_use]
    pub fn new(
        attribute: &'static str,
        version: u64,
        fill: impl Fn(usize, &mut [f32]) -> Result<(), AccessorError> + 'static,
    ) -> Self {
        Self {
            attribute,
            version,
            fill: Arc::new(fill),
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("attribute", &self.attribute)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Names the record sequence a layer is bound to.
///
/// Records themselves are opaque to the engine — they are only ever read
/// through accessor closures. The handle carries what reconciliation
/// needs: the count and a revision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DataHandle {
    /// Number of records (= instance count).
    pub len: usize,
    /// Caller-bumped revision of the record contents.
    pub version: u64,
    /// Optional sub-range of records that changed at this revision, as
    /// `(start, end)` indices. When present and the count is unchanged,
    /// only this range repopulates and uploads.
    pub dirty_range: Option<(usize, usize)>,
}

impl DataHandle {
    /// A handle over `len` records at revision `version`.
    #[must_use]
    pub const fn new(len: usize, version: u64) -> Self {
        Self {
            len,
            version,
            dirty_range: None,
        }
    }
}

/// Style props of a layer.
///
/// Diffed by shallow equality against the previous frame; any difference
/// marks the layer's PROPS channel and forces a redraw without touching
/// attributes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerProps {
    /// Point radius in pixels.
    pub radius: f64,
    /// Line width in pixels.
    pub line_width: f64,
    /// Default color when no color attribute overrides it.
    pub color: [f32; 4],
    /// Layer opacity (0.0–1.0).
    pub opacity: f32,
    /// Hidden layers keep their buffers but draw nothing.
    pub visible: bool,
}

impl Default for LayerProps {
    fn default() -> Self {
        Self {
            radius: 1.0,
            line_width: 1.0,
            color: [0.0, 0.0, 0.0, 1.0],
            opacity: 1.0,
            visible: true,
        }
    }
}

/// The immutable, application-supplied description of one layer for one
/// update cycle.
#[derive(Clone, Debug)]
pub struct LayerDescriptor {
    /// Stable identifier, unique within a manager instance per frame.
    pub id: String,
    /// Shape kind. Changing the kind under an existing id is treated as a
    /// count change: buffers reallocate against the new schema.
    pub kind: LayerKind,
    /// Style props.
    pub props: LayerProps,
    /// The bound record sequence.
    pub data: DataHandle,
    /// Accessors feeding the kind's schema.
    pub accessors: Vec<Accessor>,
}

impl LayerDescriptor {
    /// Looks up the accessor feeding `attribute`, if any.
    #[must_use]
    pub fn accessor(&self, attribute: &str) -> Option<&Accessor> {
        self.accessors.iter().find(|a| a.attribute == attribute)
    }
}

/// A possibly nested, possibly sparse batch of descriptors.
///
/// Applications often build descriptor lists conditionally; empty entries
/// and nested groups are accepted and [`flatten`](Self::flatten)ed into a
/// single ordered sequence. List order is draw order: later entries draw
/// on top.
#[derive(Clone, Debug, Default)]
pub enum DescriptorTree {
    /// No layer. Dropped during flattening.
    #[default]
    Empty,
    /// One layer.
    Leaf(LayerDescriptor),
    /// An ordered group, flattened in place.
    Group(Vec<DescriptorTree>),
}

impl DescriptorTree {
    /// Flattens into an ordered descriptor sequence, dropping empties.
    #[must_use]
    pub fn flatten(self) -> Vec<LayerDescriptor> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(self, out: &mut Vec<LayerDescriptor>) {
        match self {
            Self::Empty => {}
            Self::Leaf(descriptor) => out.push(descriptor),
            Self::Group(children) => {
                for child in children {
                    child.flatten_into(out);
                }
            }
        }
    }
}

impl From<LayerDescriptor> for DescriptorTree {
    fn from(descriptor: LayerDescriptor) -> Self {
        Self::Leaf(descriptor)
    }
}

impl From<Option<LayerDescriptor>> for DescriptorTree {
    fn from(descriptor: Option<LayerDescriptor>) -> Self {
        descriptor.map_or(Self::Empty, Self::Leaf)
    }
}

impl FromIterator<DescriptorTree> for DescriptorTree {
    fn from_iter<I: IntoIterator<Item = DescriptorTree>>(iter: I) -> Self {
        Self::Group(iter.into_iter().collect())
    }
}
