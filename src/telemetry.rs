// src/telemetry.rs
//
// JSONL training telemetry.
//
// One JSON object per line, each tagged with a `kind` field: run boundaries,
// round boundaries, per-step records, and update reports. The sink is
// optional; a disabled sink swallows every event. Write failures disable the
// sink rather than aborting training.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent::UpdateReport;
use crate::config::Config;
use crate::trainer::{RoundRecord, StepRecord};

/// A single telemetry line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryEvent {
    RunStart {
        config: Config,
        num_chapters: usize,
        vocab_size: usize,
        agent: String,
    },
    RoundStart {
        round: u32,
    },
    Step(StepRecord),
    Update {
        round: u32,
        global_step: u64,
        report: UpdateReport,
    },
    UpdateSkipped {
        round: u32,
        global_step: u64,
        available: usize,
        requested: usize,
    },
    RoundEnd(RoundRecord),
    RunEnd {
        total_steps: u64,
        total_updates: u64,
        final_summary_length: usize,
    },
}

/// Line-oriented telemetry sink.
pub struct TrainTelemetry {
    enabled: bool,
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
}

impl Default for TrainTelemetry {
    fn default() -> Self {
        Self::disabled()
    }
}

impl TrainTelemetry {
    /// A sink that drops everything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            path: None,
            writer: None,
        }
    }

    /// A sink appending to the given JSONL file.
    pub fn enable(path: &Path) -> Self {
        Self {
            enabled: true,
            path: Some(path.to_path_buf()),
            writer: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&mut self, event: &TelemetryEvent) {
        let Some(writer) = self.ensure_writer() else {
            return;
        };
        let line = match serde_json::to_string(event) {
            Ok(s) => s,
            Err(_) => return,
        };
        if writeln!(writer, "{line}").is_err() {
            self.enabled = false;
            self.writer = None;
        }
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    fn ensure_writer(&mut self) -> Option<&mut BufWriter<File>> {
        if !self.enabled {
            return None;
        }
        if self.writer.is_none() {
            let path = self.path.as_ref()?;
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    let _ = std::fs::create_dir_all(parent);
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()?;
            self.writer = Some(BufWriter::new(file));
        }
        self.writer.as_mut()
    }
}

impl Drop for TrainTelemetry {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_disabled_sink_is_inert() {
        let mut sink = TrainTelemetry::disabled();
        sink.record(&TelemetryEvent::RoundStart { round: 1 });
        sink.flush();
        assert!(!sink.is_enabled());
    }

    #[test]
    fn test_events_are_one_json_object_per_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        {
            let mut sink = TrainTelemetry::enable(&path);
            sink.record(&TelemetryEvent::RoundStart { round: 1 });
            sink.record(&TelemetryEvent::RunEnd {
                total_steps: 3,
                total_updates: 2,
                final_summary_length: 11,
            });
        }

        let body = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["kind"], "round_start");
        assert_eq!(first["round"], 1);

        let last: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(last["kind"], "run_end");
        assert_eq!(last["total_steps"], 3);
    }

    #[test]
    fn test_enable_appends_across_sinks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        {
            let mut sink = TrainTelemetry::enable(&path);
            sink.record(&TelemetryEvent::RoundStart { round: 1 });
        }
        {
            let mut sink = TrainTelemetry::enable(&path);
            sink.record(&TelemetryEvent::RoundStart { round: 2 });
        }
        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body.lines().count(), 2);
    }
}
