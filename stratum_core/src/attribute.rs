// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer attribute buffers with fingerprint-based dirty checking.
//!
//! An [`AttributeStore`] owns one [`Attribute`] per schema entry of its
//! layer's kind, plus the implicit picking color attribute. Each update
//! compares a cheap [`Fingerprint`] — accessor revision, data revision,
//! instance count — against the one stored by the previous update:
//!
//! - count mismatch (or never allocated) → full reallocation and full
//!   repopulation;
//! - revision mismatch only → repopulation in place, no reallocation;
//! - equal → no work at all.
//!
//! Skipping the equal case is what keeps frames with thousands of
//! unchanged instances free of buffer traffic.
//!
//! Population is two-phase: every dirty attribute fills a scratch buffer
//! first, and GPU state is only touched once all of them succeeded. An
//! accessor failure therefore leaves the previous buffer contents intact —
//! stale-but-valid rather than corrupt.

use alloc::vec;
use alloc::vec::Vec;

use crate::backend::{BufferHandle, RenderBackend};
use crate::descriptor::{Accessor, AttributeDesc, AttributeSemantic, DataHandle, LayerKind};
use crate::error::{AccessorError, ConfigurationError, LayerError};
use crate::picking::PickRange;

/// Name of the implicit picking color attribute.
pub const PICKING_ATTRIBUTE: &str = "picking_color";

const PICKING_DESC: AttributeDesc =
    AttributeDesc::new(PICKING_ATTRIBUTE, 3, AttributeSemantic::Color);

/// The change-detection key of one attribute.
///
/// Two equal fingerprints mean the buffer contents would come out
/// identical, so the update is skipped entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Fingerprint {
    accessor_version: u64,
    data_version: u64,
    instance_count: usize,
}

/// One named per-instance buffer.
#[derive(Debug)]
pub struct Attribute {
    desc: AttributeDesc,
    values: Vec<f32>,
    buffer: Option<BufferHandle>,
    fingerprint: Option<Fingerprint>,
}

impl Attribute {
    fn new(desc: AttributeDesc) -> Self {
        Self {
            desc,
            values: Vec::new(),
            buffer: None,
            fingerprint: None,
        }
    }

    /// The attribute's declaration.
    #[must_use]
    pub fn desc(&self) -> AttributeDesc {
        self.desc
    }

    /// Current CPU-side values (`instance_count * size` entries).
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// The GPU buffer, if allocated.
    #[must_use]
    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer
    }
}

/// Work performed by one [`AttributeStore::update`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreUpdate {
    /// Attributes that reallocated their GPU buffer.
    pub reallocated: usize,
    /// Attributes that repopulated without reallocating.
    pub repopulated: usize,
    /// Total bytes uploaded.
    pub uploaded_bytes: usize,
}

impl StoreUpdate {
    /// Returns `true` if the update touched any buffer.
    #[must_use]
    pub fn did_work(&self) -> bool {
        self.reallocated != 0 || self.repopulated != 0
    }
}

/// A planned refill of one attribute, staged before any GPU mutation.
struct Staged {
    index: usize,
    scratch: Vec<f32>,
    fingerprint: Fingerprint,
    realloc: bool,
    /// Populated instance range; also the upload range.
    range: (usize, usize),
}

/// All attribute buffers of one layer.
#[derive(Debug)]
pub struct AttributeStore {
    attributes: Vec<Attribute>,
}

impl AttributeStore {
    /// Creates the store for a layer kind: its schema attributes plus the
    /// implicit picking color attribute.
    #[must_use]
    pub fn for_kind(kind: LayerKind) -> Self {
        let schema = kind.schema();
        let mut attributes = Vec::with_capacity(schema.len() + 1);
        for desc in schema {
            attributes.push(Attribute::new(*desc));
        }
        attributes.push(Attribute::new(PICKING_DESC));
        Self { attributes }
    }

    /// All attributes, schema order first, picking color last.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.desc.name == name)
    }

    /// Returns `true` once every attribute has a live GPU buffer.
    ///
    /// Zero-instance layers never allocate and report `false`; the plan
    /// builder skips them.
    #[must_use]
    pub fn ready(&self) -> bool {
        !self.attributes.is_empty() && self.attributes.iter().all(|a| a.buffer.is_some())
    }

    /// Brings every attribute up to date with the descriptor state.
    ///
    /// Only attributes whose fingerprint changed do any work; see the
    /// module docs for the realloc/repopulate/skip decision. On error the
    /// previous buffer contents of *all* attributes are retained.
    pub fn update(
        &mut self,
        layer_id: &str,
        kind: LayerKind,
        data: &DataHandle,
        accessors: &[Accessor],
        picking: PickRange,
        backend: &mut dyn RenderBackend,
    ) -> Result<StoreUpdate, LayerError> {
        let staged = self.stage(layer_id, kind, data, accessors, picking)?;
        self.commit(layer_id, staged, backend)
    }

    /// Phase one: populate scratch buffers for every dirty attribute.
    fn stage(
        &mut self,
        layer_id: &str,
        kind: LayerKind,
        data: &DataHandle,
        accessors: &[Accessor],
        picking: PickRange,
    ) -> Result<Vec<Staged>, LayerError> {
        let mut staged = Vec::new();
        for (index, attribute) in self.attributes.iter().enumerate() {
            let desc = attribute.desc;
            let is_picking = desc.name == PICKING_ATTRIBUTE;

            let (fingerprint, accessor) = if is_picking {
                // The base is the fingerprint: reassignment or compaction
                // repopulates automatically.
                let fp = Fingerprint {
                    accessor_version: u64::from(picking.base),
                    data_version: 0,
                    instance_count: data.len,
                };
                (fp, None)
            } else {
                let Some(accessor) = accessors.iter().find(|a| a.attribute == desc.name) else {
                    return Err(LayerError::new(
                        layer_id,
                        ConfigurationError::MissingAccessor {
                            kind: kind.name(),
                            attribute: desc.name,
                        },
                    ));
                };
                let fp = Fingerprint {
                    accessor_version: accessor.version,
                    data_version: data.version,
                    instance_count: data.len,
                };
                (fp, Some(accessor))
            };

            if attribute.fingerprint == Some(fingerprint) {
                continue;
            }

            let realloc = attribute.buffer.is_none()
                || attribute
                    .fingerprint
                    .is_none_or(|old| old.instance_count != data.len);

            let size = desc.size as usize;
            let range = if realloc || is_picking {
                (0, data.len)
            } else {
                match data.dirty_range {
                    Some((start, end)) => (start.min(data.len), end.min(data.len)),
                    None => (0, data.len),
                }
            };

            let mut scratch = if realloc {
                vec![0.0; data.len * size]
            } else {
                let mut v = attribute.values.clone();
                v.resize(data.len * size, 0.0);
                v
            };

            for i in range.0..range.1 {
                let chunk = &mut scratch[i * size..(i + 1) * size];
                if let Some(accessor) = accessor {
                    (accessor.fill)(i, chunk).map_err(|e| LayerError::new(layer_id, e))?;
                    if chunk.iter().any(|v| !v.is_finite()) {
                        return Err(LayerError::new(
                            layer_id,
                            AccessorError::NonFinite {
                                attribute: desc.name,
                                index: i,
                            },
                        ));
                    }
                } else {
                    #[expect(clippy::cast_possible_truncation, reason = "count fits u32")]
                    let color = picking.color(i as u32).as_f32();
                    chunk.copy_from_slice(&color);
                }
            }

            staged.push(Staged {
                index,
                scratch,
                fingerprint,
                realloc,
                range,
            });
        }
        Ok(staged)
    }

    /// Phase two: apply staged refills to GPU buffers and commit state.
    fn commit(
        &mut self,
        layer_id: &str,
        staged: Vec<Staged>,
        backend: &mut dyn RenderBackend,
    ) -> Result<StoreUpdate, LayerError> {
        let mut update = StoreUpdate::default();
        for op in staged {
            let attribute = &mut self.attributes[op.index];
            let size = attribute.desc.size as usize;
            let byte_len = op.scratch.len() * 4;

            if op.realloc {
                if let Some(old) = attribute.buffer.take() {
                    backend.release_buffer(old);
                }
                if byte_len > 0 {
                    let handle = backend
                        .allocate_buffer(byte_len)
                        .map_err(|e| LayerError::new(layer_id, e))?;
                    attribute.buffer = Some(handle);
                }
                update.reallocated += 1;
            } else {
                update.repopulated += 1;
            }

            if let Some(buffer) = attribute.buffer {
                let (start, end) = op.range;
                let bytes: &[u8] = bytemuck::cast_slice(&op.scratch[start * size..end * size]);
                if !bytes.is_empty() {
                    backend
                        .upload_buffer(buffer, bytes, start * size * 4)
                        .map_err(|e| LayerError::new(layer_id, e))?;
                    update.uploaded_bytes += bytes.len();
                }
            }

            attribute.values = op.scratch;
            attribute.fingerprint = Some(op.fingerprint);
        }
        Ok(update)
    }

    /// Releases every GPU buffer and forgets all fingerprints.
    ///
    /// Safe to call more than once; later calls find nothing to release.
    pub fn release(&mut self, backend: &mut dyn RenderBackend) {
        for attribute in &mut self.attributes {
            if let Some(buffer) = attribute.buffer.take() {
                backend.release_buffer(buffer);
            }
            attribute.fingerprint = None;
            attribute.values.clear();
        }
    }
}

impl AttributeStore {
    /// Instance count committed by the last successful update.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.attributes
            .first()
            .and_then(|a| a.fingerprint.map(|f| f.instance_count))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Accessor;
    use crate::testutil::CountingBackend;

    fn accessors(version: u64) -> Vec<Accessor> {
        vec![
            Accessor::new("position", version, |i, out| {
                out.copy_from_slice(&[i as f32, 0.0, 0.0]);
                Ok(())
            }),
            Accessor::new("color", version, |_, out| {
                out.copy_from_slice(&[1.0, 0.5, 0.25, 1.0]);
                Ok(())
            }),
        ]
    }

    fn range(count: u32) -> PickRange {
        PickRange { base: 0, count }
    }

    #[test]
    fn first_update_allocates_everything() {
        let mut backend = CountingBackend::new();
        let mut store = AttributeStore::for_kind(LayerKind::Point);
        let data = DataHandle::new(10, 1);
        let update = store
            .update("a", LayerKind::Point, &data, &accessors(1), range(10), &mut backend)
            .unwrap();

        // position + color + picking_color
        assert_eq!(update.reallocated, 3);
        assert_eq!(update.repopulated, 0);
        assert_eq!(backend.allocations, 3);
        assert!(store.ready());
        assert_eq!(store.instance_count(), 10);
    }

    #[test]
    fn unchanged_fingerprints_do_no_work() {
        let mut backend = CountingBackend::new();
        let mut store = AttributeStore::for_kind(LayerKind::Point);
        let data = DataHandle::new(10, 1);
        let acc = accessors(1);
        store
            .update("a", LayerKind::Point, &data, &acc, range(10), &mut backend)
            .unwrap();
        let before = (backend.allocations, backend.uploads);

        let update = store
            .update("a", LayerKind::Point, &data, &acc, range(10), &mut backend)
            .unwrap();
        assert!(!update.did_work(), "identical input must be free");
        assert_eq!((backend.allocations, backend.uploads), before);
    }

    #[test]
    fn version_bump_repopulates_without_realloc() {
        let mut backend = CountingBackend::new();
        let mut store = AttributeStore::for_kind(LayerKind::Point);
        store
            .update(
                "a",
                LayerKind::Point,
                &DataHandle::new(10, 1),
                &accessors(1),
                range(10),
                &mut backend,
            )
            .unwrap();
        let allocations = backend.allocations;

        let update = store
            .update(
                "a",
                LayerKind::Point,
                &DataHandle::new(10, 2),
                &accessors(1),
                range(10),
                &mut backend,
            )
            .unwrap();
        assert_eq!(update.reallocated, 0);
        assert_eq!(update.repopulated, 2, "both accessor-fed attributes");
        assert_eq!(backend.allocations, allocations, "no new buffers");
    }

    #[test]
    fn count_change_reallocates_to_the_new_size() {
        let mut backend = CountingBackend::new();
        let mut store = AttributeStore::for_kind(LayerKind::Point);
        store
            .update(
                "a",
                LayerKind::Point,
                &DataHandle::new(10, 1),
                &accessors(1),
                range(10),
                &mut backend,
            )
            .unwrap();

        let update = store
            .update(
                "a",
                LayerKind::Point,
                &DataHandle::new(25, 1),
                &accessors(1),
                range(25),
                &mut backend,
            )
            .unwrap();
        assert_eq!(update.reallocated, 3);
        let position = store.get("position").unwrap();
        assert_eq!(position.values().len(), 25 * 3);
        assert_eq!(
            backend.buffer_len(position.buffer().unwrap()),
            Some(25 * 3 * 4)
        );
    }

    #[test]
    fn dirty_range_uploads_only_the_range() {
        let mut backend = CountingBackend::new();
        let mut store = AttributeStore::for_kind(LayerKind::Point);
        store
            .update(
                "a",
                LayerKind::Point,
                &DataHandle::new(100, 1),
                &accessors(1),
                range(100),
                &mut backend,
            )
            .unwrap();
        let full_bytes = backend.upload_bytes;

        let mut data = DataHandle::new(100, 2);
        data.dirty_range = Some((10, 20));
        let update = store
            .update("a", LayerKind::Point, &data, &accessors(1), range(100), &mut backend)
            .unwrap();
        // 10 instances * (3 + 4) components * 4 bytes.
        assert_eq!(update.uploaded_bytes, 10 * 7 * 4);
        assert!(backend.upload_bytes < full_bytes + full_bytes);
    }

    #[test]
    fn missing_accessor_is_a_configuration_error() {
        let mut backend = CountingBackend::new();
        let mut store = AttributeStore::for_kind(LayerKind::Point);
        let only_position = vec![Accessor::new("position", 1, |_, out| {
            out.fill(0.0);
            Ok(())
        })];
        let err = store
            .update(
                "a",
                LayerKind::Point,
                &DataHandle::new(5, 1),
                &only_position,
                range(5),
                &mut backend,
            )
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(backend.allocations, 0, "no GPU work for a bad layer");
    }

    #[test]
    fn accessor_failure_retains_previous_contents() {
        let mut backend = CountingBackend::new();
        let mut store = AttributeStore::for_kind(LayerKind::Point);
        store
            .update(
                "a",
                LayerKind::Point,
                &DataHandle::new(4, 1),
                &accessors(1),
                range(4),
                &mut backend,
            )
            .unwrap();
        let before: Vec<f32> = store.get("position").unwrap().values().to_vec();

        let failing = vec![
            Accessor::new("position", 2, |i, out| {
                if i == 2 {
                    Err(AccessorError::Failed {
                        attribute: "position",
                        index: i,
                    })
                } else {
                    out.fill(1.0);
                    Ok(())
                }
            }),
            Accessor::new("color", 2, |_, out| {
                out.fill(1.0);
                Ok(())
            }),
        ];
        let err = store
            .update(
                "a",
                LayerKind::Point,
                &DataHandle::new(4, 2),
                &failing,
                range(4),
                &mut backend,
            )
            .unwrap_err();
        assert!(matches!(err.kind, crate::error::LayerErrorKind::Accessor(_)));
        assert_eq!(
            store.get("position").unwrap().values(),
            before.as_slice(),
            "stale-but-valid, never corrupt"
        );
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut backend = CountingBackend::new();
        let mut store = AttributeStore::for_kind(LayerKind::Point);
        let bad = vec![
            Accessor::new("position", 1, |_, out| {
                out.copy_from_slice(&[f32::NAN, 0.0, 0.0]);
                Ok(())
            }),
            Accessor::new("color", 1, |_, out| {
                out.fill(1.0);
                Ok(())
            }),
        ];
        let err = store
            .update(
                "a",
                LayerKind::Point,
                &DataHandle::new(1, 1),
                &bad,
                range(1),
                &mut backend,
            )
            .unwrap_err();
        assert_eq!(err.layer_id, "a");
        assert!(matches!(
            err.kind,
            crate::error::LayerErrorKind::Accessor(AccessorError::NonFinite { .. })
        ));
    }

    #[test]
    fn picking_base_change_repopulates_only_picking() {
        let mut backend = CountingBackend::new();
        let mut store = AttributeStore::for_kind(LayerKind::Point);
        let data = DataHandle::new(8, 1);
        let acc = accessors(1);
        store
            .update("a", LayerKind::Point, &data, &acc, range(8), &mut backend)
            .unwrap();

        let moved = PickRange { base: 100, count: 8 };
        let update = store
            .update("a", LayerKind::Point, &data, &acc, moved, &mut backend)
            .unwrap();
        assert_eq!(update.repopulated, 1, "picking color only");
        assert_eq!(update.reallocated, 0);

        let picking = store.get(PICKING_ATTRIBUTE).unwrap();
        let first = &picking.values()[0..3];
        #[expect(clippy::cast_possible_truncation, reason = "encoded channels are 0..=255")]
        let decoded = crate::picking::PickingColor([
            first[0] as u8,
            first[1] as u8,
            first[2] as u8,
        ])
        .decode();
        assert_eq!(decoded, Some(100));
    }

    #[test]
    fn release_is_idempotent() {
        let mut backend = CountingBackend::new();
        let mut store = AttributeStore::for_kind(LayerKind::Point);
        store
            .update(
                "a",
                LayerKind::Point,
                &DataHandle::new(3, 1),
                &accessors(1),
                range(3),
                &mut backend,
            )
            .unwrap();
        store.release(&mut backend);
        let releases = backend.buffer_releases;
        store.release(&mut backend);
        assert_eq!(backend.buffer_releases, releases, "second release is free");
        assert!(!store.ready());
    }
}
