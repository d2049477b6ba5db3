// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reversible color encoding of object identity.
//!
//! The picking pass draws every instance with a color that encodes *which*
//! object it is instead of how it looks. [`PickingColor`] packs a global
//! object value into 24 bits (one byte per channel, little-endian), with
//! the all-zero color reserved for "no object" — a cleared framebuffer
//! decodes to no hit everywhere.
//!
//! [`PickingTable`] assigns each layer a contiguous range of global values
//! so a decoded pixel resolves back to `(layer slot, object index)`.
//! Assignment is *stable*: a layer keeps its range across frames unless it
//! was just created or its instance count changed, so unchanged layers
//! never re-upload picking colors. Ranges come from a monotonically
//! increasing cursor; freed ranges are reclaimed only by a full compaction
//! when the 24-bit space would otherwise overflow.

use alloc::vec::Vec;

/// Exclusive upper bound of the 24-bit encoding space.
const SPACE: u32 = 0x00FF_FFFF;

/// A 3-component color encoding one object identity.
///
/// The encoding is injective over `0..=MAX_ENCODABLE`; decode exactly
/// inverts encode, and the zero color decodes to `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PickingColor(pub [u8; 3]);

impl PickingColor {
    /// Largest global value that can be encoded.
    pub const MAX_ENCODABLE: u32 = SPACE - 2;

    /// Encodes a global object value.
    ///
    /// # Panics
    ///
    /// Panics if `value` exceeds [`MAX_ENCODABLE`](Self::MAX_ENCODABLE).
    /// [`PickingTable`] compacts before handing out values near the bound,
    /// so reconciliation never trips this.
    #[must_use]
    pub fn encode(value: u32) -> Self {
        assert!(
            value <= Self::MAX_ENCODABLE,
            "picking value {value} exceeds the 24-bit encoding space"
        );
        let v = value + 1;
        #[expect(clippy::cast_possible_truncation, reason = "bytes are masked")]
        Self([v as u8, (v >> 8) as u8, (v >> 16) as u8])
    }

    /// Decodes back to the global object value, or `None` for the reserved
    /// zero color.
    #[must_use]
    pub fn decode(self) -> Option<u32> {
        let [r, g, b] = self.0;
        let v = u32::from(r) | (u32::from(g) << 8) | (u32::from(b) << 16);
        if v == 0 { None } else { Some(v - 1) }
    }

    /// The color components as `f32` attribute values (0–255 range).
    #[must_use]
    pub fn as_f32(self) -> [f32; 3] {
        let [r, g, b] = self.0;
        [f32::from(r), f32::from(g), f32::from(b)]
    }
}

/// A layer's contiguous slice of the global picking value space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PickRange {
    /// First global value assigned to the layer.
    pub base: u32,
    /// Number of instances covered.
    pub count: u32,
}

impl PickRange {
    /// Encodes the picking color for `object_index` within this range.
    #[must_use]
    pub fn color(self, object_index: u32) -> PickingColor {
        debug_assert!(
            object_index < self.count,
            "object index outside the assigned range"
        );
        PickingColor::encode(self.base + object_index)
    }
}

/// Stable assignment of picking value ranges to layer slots.
#[derive(Clone, Debug, Default)]
pub struct PickingTable {
    ranges: Vec<Option<PickRange>>,
    cursor: u32,
    compactions: u64,
}

impl PickingTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the range assigned to `slot`, if any.
    #[must_use]
    pub fn range(&self, slot: u32) -> Option<PickRange> {
        self.ranges.get(slot as usize).copied().flatten()
    }

    /// Number of compactions performed so far.
    ///
    /// A change between two reads means every live range may have been
    /// rebased, so picking color attributes must be revalidated.
    #[must_use]
    pub fn compactions(&self) -> u64 {
        self.compactions
    }

    /// Assigns a fresh range of `count` values to `slot`, replacing any
    /// previous assignment.
    ///
    /// Compacts the table first if the cursor would overflow the encoding
    /// space. Returns the new range (zero-count layers get an empty range).
    pub fn assign(&mut self, slot: u32, count: u32) -> PickRange {
        if slot as usize >= self.ranges.len() {
            self.ranges.resize(slot as usize + 1, None);
        }
        // Drop the old range before compaction so it is not preserved.
        self.ranges[slot as usize] = None;

        if self.cursor.saturating_add(count) > PickingColor::MAX_ENCODABLE {
            self.compact();
            assert!(
                self.cursor.saturating_add(count) <= PickingColor::MAX_ENCODABLE,
                "picking value space exhausted even after compaction"
            );
        }

        let range = PickRange {
            base: self.cursor,
            count,
        };
        self.cursor += count;
        self.ranges[slot as usize] = Some(range);
        range
    }

    /// Releases the range assigned to `slot`.
    ///
    /// The values are not reusable until the next compaction.
    pub fn release(&mut self, slot: u32) {
        if let Some(entry) = self.ranges.get_mut(slot as usize) {
            *entry = None;
        }
    }

    /// Resolves a decoded global value to `(slot, object index)`.
    ///
    /// Unrecognized values (stale ranges, garbage pixels) resolve to
    /// `None` — decode never errors.
    #[must_use]
    pub fn resolve(&self, value: u32) -> Option<(u32, u32)> {
        for (slot, range) in self.ranges.iter().enumerate() {
            if let Some(range) = range
                && value >= range.base
                && value < range.base + range.count
            {
                #[expect(clippy::cast_possible_truncation, reason = "slot count fits u32")]
                return Some((slot as u32, value - range.base));
            }
        }
        None
    }

    /// Rebases every live range sequentially from zero.
    ///
    /// Every surviving layer's base changes, so callers must repopulate
    /// their picking color attributes afterwards (the base is part of the
    /// attribute fingerprint, which makes this automatic).
    fn compact(&mut self) {
        let mut cursor = 0;
        for range in self.ranges.iter_mut().flatten() {
            range.base = cursor;
            cursor += range.count;
        }
        self.cursor = cursor;
        self.compactions += 1;
    }
}
