// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A recording [`RenderBackend`] for end-to-end tests.
//!
//! [`RecordingBackend`] counts every backend call, stores uploaded buffer
//! bytes, and — the part that makes picking testable without a GPU —
//! software-rasterizes picking-pass draws into its off-screen targets.
//! Each instance is projected through the draw call's viewport uniforms
//! and stamped as a filled square of its encoded picking color, so a
//! later [`read_pixels`](RenderBackend::read_pixels) sees exactly what a
//! GPU picking pass would have produced: later draws overwrite earlier
//! ones, which is what makes the topmost object win.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::Point;

use stratum_core::attribute::PICKING_ATTRIBUTE;
use stratum_core::backend::{
    BufferHandle, DrawCall, PassKind, ProgramHandle, RenderBackend, RenderTarget, TargetHandle,
};
use stratum_core::error::ResourceError;
use stratum_core::viewport::project;

/// One off-screen RGBA8 target.
#[derive(Debug)]
struct Target {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Target {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: alloc::vec![0; (width * height * 4) as usize],
        }
    }

    fn put(&mut self, x: i64, y: i64, rgba: [u8; 4]) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        #[expect(clippy::cast_possible_truncation, reason = "bounds checked above")]
        let at = ((y as u32 * self.width + x as u32) * 4) as usize;
        self.pixels[at..at + 4].copy_from_slice(&rgba);
    }
}

/// A call-counting backend with byte-accurate buffers and software
/// picking rasterization.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_handle: u64,
    buffers: BTreeMap<u64, Vec<u8>>,
    targets: BTreeMap<u64, Target>,
    /// Number of `compile_program` calls.
    pub compiles: usize,
    /// Number of `allocate_buffer` calls.
    pub allocations: usize,
    /// Number of `upload_buffer` calls.
    pub uploads: usize,
    /// Total bytes uploaded.
    pub upload_bytes: usize,
    /// Number of `release_buffer` calls that hit a live buffer.
    pub buffer_releases: usize,
    /// Number of `release_target` calls that hit a live target.
    pub target_releases: usize,
    /// Draw calls against the screen.
    pub screen_draws: usize,
    /// Draw calls against off-screen targets.
    pub offscreen_draws: usize,
    /// Number of `read_pixels` calls.
    pub readbacks: usize,
}

impl RecordingBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently live buffers.
    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Number of currently live off-screen targets.
    #[must_use]
    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    fn fresh(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn buffer_floats(&self, handle: BufferHandle) -> Result<Vec<f32>, ResourceError> {
        let Some(bytes) = self.buffers.get(&handle.0) else {
            return Err(ResourceError::StaleHandle);
        };
        // pod_collect_to_vec handles the alignment of the byte store.
        Ok(bytemuck::pod_collect_to_vec(bytes))
    }

    /// Projects each instance and stamps its encoded color, later draws
    /// overwriting earlier ones.
    fn rasterize_picking(
        &mut self,
        call: &DrawCall<'_>,
        target: TargetHandle,
    ) -> Result<(), ResourceError> {
        let position = call
            .buffers
            .iter()
            .find(|b| b.name == "position")
            .or_else(|| call.buffers.iter().find(|b| b.name == "source_position"));
        let picking = call.buffers.iter().find(|b| b.name == PICKING_ATTRIBUTE);
        let (Some(position), Some(picking)) = (position, picking) else {
            return Ok(());
        };

        let positions = self.buffer_floats(position.buffer)?;
        let colors = self.buffer_floats(picking.buffer)?;
        let Some(surface) = self.targets.get_mut(&target.0) else {
            return Err(ResourceError::StaleHandle);
        };

        let size = position.size as usize;
        #[expect(clippy::cast_possible_truncation, reason = "radii are small")]
        let radius = call.uniforms.radius.max(0.0).round() as i64;
        for i in 0..call.instance_count as usize {
            if (i + 1) * size > positions.len() || (i + 1) * 3 > colors.len() {
                break;
            }
            let lonlat = Point::new(
                f64::from(positions[i * size]),
                f64::from(positions[i * size + 1]),
            );
            let p = project(lonlat, &call.uniforms.viewport);
            #[expect(clippy::cast_possible_truncation, reason = "canvas coordinates")]
            let cx = (call.uniforms.viewport_rect.x0 + p.x).round() as i64;
            #[expect(clippy::cast_possible_truncation, reason = "canvas coordinates")]
            let cy = (call.uniforms.viewport_rect.y0 + p.y).round() as i64;

            #[expect(clippy::cast_possible_truncation, reason = "colors are 0-255")]
            let rgba = [
                colors[i * 3] as u8,
                colors[i * 3 + 1] as u8,
                colors[i * 3 + 2] as u8,
                255,
            ];
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    surface.put(cx + dx, cy + dy, rgba);
                }
            }
        }
        Ok(())
    }
}

impl RenderBackend for RecordingBackend {
    fn compile_program(&mut self, _source: &str) -> Result<ProgramHandle, ResourceError> {
        self.compiles += 1;
        Ok(ProgramHandle(self.fresh()))
    }

    fn allocate_buffer(&mut self, size_bytes: usize) -> Result<BufferHandle, ResourceError> {
        self.allocations += 1;
        let handle = self.fresh();
        self.buffers.insert(handle, alloc::vec![0; size_bytes]);
        Ok(BufferHandle(handle))
    }

    fn upload_buffer(
        &mut self,
        buffer: BufferHandle,
        data: &[u8],
        offset: usize,
    ) -> Result<(), ResourceError> {
        let Some(contents) = self.buffers.get_mut(&buffer.0) else {
            return Err(ResourceError::StaleHandle);
        };
        if offset + data.len() > contents.len() {
            return Err(ResourceError::Rejected {
                reason: "upload past the end of the buffer",
            });
        }
        contents[offset..offset + data.len()].copy_from_slice(data);
        self.uploads += 1;
        self.upload_bytes += data.len();
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer.0).is_some() {
            self.buffer_releases += 1;
        }
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetHandle, ResourceError> {
        let handle = self.fresh();
        self.targets.insert(handle, Target::new(width, height));
        Ok(TargetHandle(handle))
    }

    fn resize_target(
        &mut self,
        target: TargetHandle,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceError> {
        let Some(surface) = self.targets.get_mut(&target.0) else {
            return Err(ResourceError::StaleHandle);
        };
        *surface = Target::new(width, height);
        Ok(())
    }

    fn clear_target(&mut self, target: TargetHandle) {
        if let Some(surface) = self.targets.get_mut(&target.0) {
            surface.pixels.fill(0);
        }
    }

    fn release_target(&mut self, target: TargetHandle) {
        if self.targets.remove(&target.0).is_some() {
            self.target_releases += 1;
        }
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), ResourceError> {
        match call.target {
            RenderTarget::Screen => {
                self.screen_draws += 1;
                Ok(())
            }
            RenderTarget::Offscreen(target) => {
                self.offscreen_draws += 1;
                if call.uniforms.pass == PassKind::Picking {
                    self.rasterize_picking(call, target)?;
                }
                Ok(())
            }
        }
    }

    fn read_pixels(
        &mut self,
        target: TargetHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Vec<u8> {
        self.readbacks += 1;
        let mut out = alloc::vec![0; (width * height * 4) as usize];
        let Some(surface) = self.targets.get(&target.0) else {
            return out;
        };
        for row in 0..height {
            for col in 0..width {
                let (sx, sy) = (x + col, y + row);
                if sx >= surface.width || sy >= surface.height {
                    continue;
                }
                let src = ((sy * surface.width + sx) * 4) as usize;
                let dst = ((row * width + col) * 4) as usize;
                out[dst..dst + 4].copy_from_slice(&surface.pixels[src..src + 4]);
            }
        }
        out
    }
}
