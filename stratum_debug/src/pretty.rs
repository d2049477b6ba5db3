// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use stratum_core::backend::PassKind;
use stratum_core::trace::{
    DrawEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, PickEvent, ReconcileEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }
}

fn phase_name(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::Reconcile => "reconcile",
        PhaseKind::Draw => "draw",
        PhaseKind::Pick => "pick",
        PhaseKind::Effects => "effects",
    }
}

fn pass_name(pass: PassKind) -> &'static str {
    match pass {
        PassKind::Screen => "screen",
        PassKind::Picking => "picking",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] frame={} {}",
            e.frame_index,
            phase_name(e.phase),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {}",
            e.frame_index,
            phase_name(e.phase),
        );
    }

    fn on_reconcile(&mut self, e: &ReconcileEvent) {
        let redraw = if e.needs_redraw { "yes" } else { "no" };
        let _ = writeln!(
            self.writer,
            "[reconcile] frame={} created={} updated={} removed={} \
             realloc={} repop={} bytes={} errors={} redraw={redraw}",
            e.frame_index,
            e.created,
            e.updated,
            e.removed,
            e.reallocated,
            e.repopulated,
            e.uploaded_bytes,
            e.errors,
        );
    }

    fn on_draw(&mut self, e: &DrawEvent) {
        let _ = writeln!(
            self.writer,
            "[draw] frame={} pass={} items={}",
            e.frame_index,
            pass_name(e.pass),
            e.items,
        );
    }

    fn on_pick(&mut self, e: &PickEvent) {
        let _ = writeln!(
            self.writer,
            "[pick] frame={} at=({:.1}, {:.1}) hits={}",
            e.frame_index, e.x, e.y, e.hits,
        );
    }
}
