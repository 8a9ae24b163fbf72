// src/export.rs
//
// Append-only CSV exports for offline analysis.
//
// Two files per run: per-step metric rows and per-round aggregates. Headers
// are written once when the file is created. Fields are escaped by hand;
// free-text previews are sanitized before they reach a row.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::trainer::{RoundRecord, StepRecord};

/// Maximum preview length in characters.
pub const PREVIEW_LEN: usize = 80;

/// Flatten a summary into a short single-line preview.
pub fn preview(text: &str) -> String {
    let mut out = String::with_capacity(PREVIEW_LEN);
    for c in text.chars().take(PREVIEW_LEN) {
        if c.is_control() {
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

/// Quote a field when it contains a delimiter, quote, or newline.
fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

const STEP_HEADER: &str = "round,global_step,chapter_index,previous_summary_length,reward,\
summary_length,chapter_length,\
length_ratio,similarity,coverage_ratio,novelty_ratio,copy_ratio,garbled_ratio,\
unk_char_ratio,disallowed_char_ratio,control_char_ratio,\
word_noncompliance_ratio,garbled_penalty,word_penalty,buffer_len,summary_preview";

const ROUND_HEADER: &str = "round,steps,updates_attempted,updates_applied,updates_skipped,\
reward_total,reward_mean,reward_min,reward_max,policy_loss_mean,q1_loss_mean,q2_loss_mean,\
final_summary_length,final_summary_preview";

/// Per-step CSV writer.
pub struct StepCsvWriter {
    writer: BufWriter<File>,
}

impl StepCsvWriter {
    /// Create the file and write the header.
    pub fn create(path: &Path) -> Result<Self> {
        let mut writer = BufWriter::new(open_new(path)?);
        writeln!(writer, "{STEP_HEADER}")?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, r: &StepRecord) -> Result<()> {
        let m = &r.metrics;
        writeln!(
            self.writer,
            "{},{},{},{},{:.6},{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{},{}",
            r.round,
            r.global_step,
            r.chapter_index,
            r.previous_summary_length,
            r.reward,
            m.summary_length,
            m.chapter_length,
            m.length_ratio,
            m.similarity,
            m.coverage_ratio,
            m.novelty_ratio,
            m.copy_ratio,
            m.garbled_ratio,
            m.unk_char_ratio,
            m.disallowed_char_ratio,
            m.control_char_ratio,
            m.word_noncompliance_ratio,
            m.garbled_penalty,
            m.word_penalty,
            r.buffer_len,
            escape(&r.summary_preview),
        )?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Per-round CSV writer.
pub struct RoundCsvWriter {
    writer: BufWriter<File>,
}

impl RoundCsvWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let mut writer = BufWriter::new(open_new(path)?);
        writeln!(writer, "{ROUND_HEADER}")?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, r: &RoundRecord) -> Result<()> {
        writeln!(
            self.writer,
            "{},{},{},{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{},{}",
            r.round,
            r.steps,
            r.updates_attempted,
            r.updates_applied,
            r.updates_skipped,
            r.reward_total,
            r.reward_mean,
            r.reward_min,
            r.reward_max,
            r.policy_loss_mean,
            r.q1_loss_mean,
            r.q2_loss_mean,
            r.final_summary_length,
            escape(&r.final_summary_preview),
        )?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn open_new(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::SummaryMetrics;
    use tempfile::tempdir;

    fn metrics() -> SummaryMetrics {
        SummaryMetrics {
            summary_length: 5,
            chapter_length: 10,
            length_ratio: 0.5,
            similarity: 0.25,
            coverage_ratio: 0.75,
            novelty_ratio: 0.1,
            copy_ratio: 0.2,
            garbled_ratio: 0.0,
            unk_char_ratio: 0.0,
            disallowed_char_ratio: 0.0,
            control_char_ratio: 0.0,
            word_noncompliance_ratio: 0.0,
            garbled_penalty: 0.0,
            word_penalty: 0.0,
        }
    }

    #[test]
    fn test_preview_flattens_and_caps() {
        let long = format!("line1\nline2\t{}", "x".repeat(200));
        let p = preview(&long);
        assert!(p.chars().count() <= PREVIEW_LEN);
        assert!(!p.contains('\n'));
        assert!(!p.contains('\t'));
    }

    #[test]
    fn test_escape_quotes_commas() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_step_csv_has_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("steps.csv");
        let mut w = StepCsvWriter::create(&path).unwrap();
        let record = StepRecord {
            round: 1,
            global_step: 0,
            chapter_index: 0,
            previous_summary_length: 0,
            reward: 0.5,
            metrics: metrics(),
            summary_preview: "hello, world".to_string(),
            buffer_len: 1,
        };
        w.append(&record).unwrap();
        w.flush().unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], STEP_HEADER);
        assert!(lines[1].contains("\"hello, world\""));
        // Every row matches the header width.
        assert_eq!(lines[0].split(',').count(), 21);
    }

    #[test]
    fn test_round_csv_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rounds.csv");
        let mut w = RoundCsvWriter::create(&path).unwrap();
        let record = RoundRecord {
            round: 1,
            steps: 3,
            updates_attempted: 3,
            updates_applied: 2,
            updates_skipped: 1,
            reward_total: 1.2,
            reward_mean: 0.4,
            reward_min: 0.1,
            reward_max: 0.9,
            policy_loss_mean: -0.2,
            q1_loss_mean: 0.01,
            q2_loss_mean: 0.02,
            final_summary_length: 42,
            final_summary_preview: "final".to_string(),
        };
        w.append(&record).unwrap();
        w.flush().unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].split(',').count(), lines[1].split(',').count());
    }
}
