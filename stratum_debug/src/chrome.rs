// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Recorded events carry no host timestamps, so timestamps are synthesized:
/// each cycle occupies a 1 ms slot at `frame_index` milliseconds, and events
/// within a cycle are spaced 1 µs apart in recording order. Durations in the
/// resulting trace are therefore ordinal, not measured.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut sequence: BTreeMap<u64, u64> = BTreeMap::new();

    for recorded in decode(bytes) {
        let ts = synthetic_ts(&mut sequence, recorded.frame_index());
        match recorded {
            RecordedEvent::PhaseBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": format!("{:?}", e.phase),
                    "cat": "Cycle",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": format!("{:?}", e.phase),
                    "cat": "Cycle",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::Reconcile(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Reconcile",
                    "cat": "Update",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "created": e.created,
                        "updated": e.updated,
                        "removed": e.removed,
                        "reallocated": e.reallocated,
                        "repopulated": e.repopulated,
                        "uploaded_bytes": e.uploaded_bytes,
                        "errors": e.errors,
                        "needs_redraw": e.needs_redraw,
                    }
                }));
            }
            RecordedEvent::Draw(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Draw",
                    "cat": "Cycle",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "pass": format!("{:?}", e.pass),
                        "items": e.items,
                    }
                }));
            }
            RecordedEvent::Pick(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Pick",
                    "cat": "Pick",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "x": e.x,
                        "y": e.y,
                        "hits": e.hits,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn synthetic_ts(sequence: &mut BTreeMap<u64, u64>, frame_index: u64) -> u64 {
    let slot = sequence.entry(frame_index).or_insert(0);
    let ts = frame_index.saturating_mul(1000).saturating_add(*slot);
    *slot += 1;
    ts
}
