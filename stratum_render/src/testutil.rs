// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-crate test double and fixtures for plan and compositor tests.
//!
//! `StubBackend` records draw traffic without rasterizing anything. The
//! full software-rasterizing backend used by end-to-end picking tests
//! lives in `stratum_harness`.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use stratum_core::backend::{
    BufferHandle, DrawCall, PassKind, ProgramHandle, RenderBackend, RenderTarget, TargetHandle,
};
use stratum_core::descriptor::{
    Accessor, DataHandle, LayerDescriptor, LayerKind, LayerProps,
};
use stratum_core::error::ResourceError;
use stratum_core::layer::LayerStore;

/// One recorded draw call.
#[derive(Clone, Debug)]
pub(crate) struct DrawRecord {
    pub(crate) target: RenderTarget,
    pub(crate) pass: PassKind,
    pub(crate) instance_count: u32,
    pub(crate) buffer_names: Vec<String>,
}

/// A draw-recording [`RenderBackend`] that never rasterizes.
#[derive(Debug, Default)]
pub(crate) struct StubBackend {
    next_handle: u64,
    live_buffers: usize,
    pub(crate) compiles: usize,
    pub(crate) allocations: usize,
    pub(crate) buffer_releases: usize,
    pub(crate) target_releases: usize,
    pub(crate) clears: usize,
    pub(crate) draws: Vec<DrawRecord>,
}

impl StubBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn draw_count(&self) -> usize {
        self.draws.len()
    }

    fn fresh(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl RenderBackend for StubBackend {
    fn compile_program(&mut self, _source: &str) -> Result<ProgramHandle, ResourceError> {
        self.compiles += 1;
        Ok(ProgramHandle(self.fresh()))
    }

    fn allocate_buffer(&mut self, _size_bytes: usize) -> Result<BufferHandle, ResourceError> {
        self.allocations += 1;
        self.live_buffers += 1;
        Ok(BufferHandle(self.fresh()))
    }

    fn upload_buffer(
        &mut self,
        _buffer: BufferHandle,
        _data: &[u8],
        _offset: usize,
    ) -> Result<(), ResourceError> {
        Ok(())
    }

    fn release_buffer(&mut self, _buffer: BufferHandle) {
        if self.live_buffers > 0 {
            self.live_buffers -= 1;
            self.buffer_releases += 1;
        }
    }

    fn create_target(&mut self, _width: u32, _height: u32) -> Result<TargetHandle, ResourceError> {
        Ok(TargetHandle(self.fresh()))
    }

    fn resize_target(
        &mut self,
        _target: TargetHandle,
        _width: u32,
        _height: u32,
    ) -> Result<(), ResourceError> {
        Ok(())
    }

    fn clear_target(&mut self, _target: TargetHandle) {
        self.clears += 1;
    }

    fn release_target(&mut self, _target: TargetHandle) {
        self.target_releases += 1;
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), ResourceError> {
        self.draws.push(DrawRecord {
            target: call.target,
            pass: call.uniforms.pass,
            instance_count: call.instance_count,
            buffer_names: call.buffers.iter().map(|b| b.name.to_string()).collect(),
        });
        Ok(())
    }

    fn read_pixels(
        &mut self,
        _target: TargetHandle,
        _x: u32,
        _y: u32,
        width: u32,
        height: u32,
    ) -> Vec<u8> {
        alloc::vec![0; (width * height * 4) as usize]
    }
}

/// A valid point layer descriptor with `count` instances.
pub(crate) fn point_layer(id: &str, count: usize) -> LayerDescriptor {
    LayerDescriptor {
        id: id.to_string(),
        kind: LayerKind::Point,
        props: LayerProps::default(),
        data: DataHandle::new(count, 1),
        accessors: alloc::vec![
            Accessor::new("position", 1, |i, out| {
                out.copy_from_slice(&[i as f32, 0.0, 0.0]);
                Ok(())
            }),
            Accessor::new("color", 1, |_, out| {
                out.fill(1.0);
                Ok(())
            }),
        ],
    }
}

/// Compiles a program for every live kind in the store.
pub(crate) fn programs_for(
    store: &LayerStore,
    backend: &mut dyn RenderBackend,
) -> BTreeMap<LayerKind, ProgramHandle> {
    let mut programs = BTreeMap::new();
    for &slot in store.draw_order() {
        let kind = store.kind_at(slot);
        if !programs.contains_key(&kind) {
            let program = backend
                .compile_program(kind.shader_source())
                .expect("stub compile never fails");
            programs.insert(kind, program);
        }
    }
    programs
}
