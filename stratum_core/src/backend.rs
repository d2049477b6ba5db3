// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rendering backend contract.
//!
//! Stratum never talks to a GPU API directly. Everything a real backend
//! must provide is captured by the [`RenderBackend`] trait: program
//! compilation, buffer allocation and upload, draw-call issuance, and
//! pixel readback from off-screen targets. Core and render crates issue
//! calls against the trait; GPU-specific crates (and test doubles such as
//! the recording backend in `stratum_harness`) implement it.
//!
//! All resource mutation is serialized through `&mut self` — the engine is
//! single-threaded and frame-driven, and relies on that serialization
//! instead of introducing its own locking.
//!
//! Handles are opaque: backends assign them, core passes them through
//! without interpretation.

use alloc::vec::Vec;

use core::fmt;

use kurbo::Rect;

use crate::error::ResourceError;
use crate::viewport::ViewportState;

/// An opaque handle to a compiled shader program.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramHandle(pub u64);

impl fmt::Debug for ProgramHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgramHandle({})", self.0)
    }
}

/// An opaque handle to a GPU-resident vertex buffer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferHandle(pub u64);

impl fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferHandle({})", self.0)
    }
}

/// An opaque handle to an off-screen render target.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetHandle(pub u64);

impl fmt::Debug for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetHandle({})", self.0)
    }
}

/// Where a draw call lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// The visible canvas.
    Screen,
    /// An off-screen target (the picking framebuffer).
    Offscreen(TargetHandle),
}

/// Which rendering pass a draw call belongs to.
///
/// The picking pass binds the picking color attribute in place of the
/// visual color attribute; the traversal order is otherwise identical.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Normal visual draw.
    #[default]
    Screen,
    /// Encoded-color draw into the picking target.
    Picking,
}

/// One named per-instance buffer bound to a draw call.
#[derive(Clone, Copy, Debug)]
pub struct BufferBinding<'a> {
    /// Attribute name the shader binds this buffer under.
    pub name: &'a str,
    /// The GPU buffer.
    pub buffer: BufferHandle,
    /// Components per instance.
    pub size: u32,
}

/// Uniform state for one draw call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawUniforms {
    /// Camera for the viewport being drawn.
    pub viewport: ViewportState,
    /// Output sub-rectangle of the viewport in canvas pixels.
    pub viewport_rect: Rect,
    /// Point radius in pixels.
    pub radius: f64,
    /// Line width in pixels.
    pub line_width: f64,
    /// Default color when no color attribute overrides it.
    pub color: [f32; 4],
    /// Layer opacity (0.0–1.0).
    pub opacity: f32,
    /// Pass this draw belongs to.
    pub pass: PassKind,
}

/// One instanced draw.
#[derive(Debug)]
pub struct DrawCall<'a> {
    /// Compiled program for the layer's kind.
    pub program: ProgramHandle,
    /// Named per-instance buffers, in schema order.
    pub buffers: &'a [BufferBinding<'a>],
    /// Number of instances.
    pub instance_count: u32,
    /// Uniform state.
    pub uniforms: &'a DrawUniforms,
    /// Destination.
    pub target: RenderTarget,
}

/// The GPU abstraction consumed by the engine.
///
/// Implementations must treat each method as synchronous: when
/// [`read_pixels`](Self::read_pixels) returns, all previously issued draws
/// against that target are reflected in the result.
pub trait RenderBackend {
    /// Compiles a shader program from source.
    fn compile_program(&mut self, source: &str) -> Result<ProgramHandle, ResourceError>;

    /// Allocates a buffer of `size_bytes` bytes.
    fn allocate_buffer(&mut self, size_bytes: usize) -> Result<BufferHandle, ResourceError>;

    /// Uploads `data` into `buffer` starting at byte `offset`.
    fn upload_buffer(
        &mut self,
        buffer: BufferHandle,
        data: &[u8],
        offset: usize,
    ) -> Result<(), ResourceError>;

    /// Releases a buffer. Releasing an unknown handle is a no-op.
    fn release_buffer(&mut self, buffer: BufferHandle);

    /// Creates an off-screen RGBA8 target.
    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetHandle, ResourceError>;

    /// Resizes an off-screen target, discarding its contents.
    fn resize_target(
        &mut self,
        target: TargetHandle,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceError>;

    /// Clears an off-screen target to all-zero pixels.
    fn clear_target(&mut self, target: TargetHandle);

    /// Releases an off-screen target. Unknown handles are a no-op.
    fn release_target(&mut self, target: TargetHandle);

    /// Issues one instanced draw.
    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), ResourceError>;

    /// Reads back an RGBA8 pixel window from an off-screen target.
    ///
    /// The result is `width * height * 4` bytes in row-major order. Pixels
    /// outside the target are zero.
    fn read_pixels(
        &mut self,
        target: TargetHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Vec<u8>;
}
