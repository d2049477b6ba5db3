// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-crate test double for the rendering backend.
//!
//! Counts every call and stores uploaded bytes so tests can assert on
//! exact allocation/upload traffic. The full software-rasterizing double
//! lives in `stratum_harness`; this one stays dependency-free for core
//! unit tests.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::backend::{BufferHandle, DrawCall, ProgramHandle, RenderBackend, TargetHandle};
use crate::error::ResourceError;

/// A call-counting [`RenderBackend`] with byte-accurate buffer storage.
#[derive(Debug, Default)]
pub(crate) struct CountingBackend {
    next_handle: u64,
    buffers: BTreeMap<u64, Vec<u8>>,
    /// Number of `allocate_buffer` calls.
    pub(crate) allocations: usize,
    /// Number of `upload_buffer` calls.
    pub(crate) uploads: usize,
    /// Total bytes uploaded.
    pub(crate) upload_bytes: usize,
    /// Number of `release_buffer` calls that hit a live buffer.
    pub(crate) buffer_releases: usize,
    /// Number of draw calls issued.
    pub(crate) draws: usize,
    /// When set, the next allocation fails with `OutOfMemory`.
    pub(crate) fail_next_allocation: bool,
}

impl CountingBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Byte length of a live buffer, if any.
    pub(crate) fn buffer_len(&self, handle: BufferHandle) -> Option<usize> {
        self.buffers.get(&handle.0).map(Vec::len)
    }

    fn fresh(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl RenderBackend for CountingBackend {
    fn compile_program(&mut self, _source: &str) -> Result<ProgramHandle, ResourceError> {
        Ok(ProgramHandle(self.fresh()))
    }

    fn allocate_buffer(&mut self, size_bytes: usize) -> Result<BufferHandle, ResourceError> {
        if self.fail_next_allocation {
            self.fail_next_allocation = false;
            return Err(ResourceError::OutOfMemory { size_bytes });
        }
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

    fn clear_target(&mut self, _target: TargetHandle) {}

    fn release_target(&mut self, _target: TargetHandle) {}

    fn draw(&mut self, _call: &DrawCall<'_>) -> Result<(), ResourceError> {
        self.draws += 1;
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
