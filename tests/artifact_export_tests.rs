// tests/artifact_export_tests.rs
//
// Training artifacts on disk: step/round CSVs and the JSONL telemetry log.

use precis::agent::EchoAgent;
use precis::config::Config;
use precis::corpus::{split_chapters, CHAPTER_SEPARATOR};
use precis::env::ArticleEnv;
use precis::export::{RoundCsvWriter, StepCsvWriter};
use precis::quality::LexiconChecker;
use precis::telemetry::TrainTelemetry;
use precis::tokenizer::CharTokenizer;
use precis::trainer::Trainer;

use tempfile::tempdir;

fn article() -> String {
    format!(
        "the first chapter about ships{sep}the second chapter, about \"storms\"{sep}the third chapter about landfall",
        sep = CHAPTER_SEPARATOR
    )
}

fn run_into(dir: &std::path::Path) -> precis::trainer::TrainReport {
    let chapters = split_chapters(&article());
    let tokenizer = CharTokenizer::from_corpus(&chapters);
    let checker = LexiconChecker::from_corpus(&chapters);
    let config = Config {
        rounds: 2,
        replay_capacity: 16,
        batch_size: 2,
        ..Config::default()
    };
    let env = ArticleEnv::new(chapters, tokenizer, checker, &config).unwrap();

    let mut trainer = Trainer::new(env, EchoAgent::new(), config)
        .unwrap()
        .with_step_csv(StepCsvWriter::create(&dir.join("steps.csv")).unwrap())
        .with_round_csv(RoundCsvWriter::create(&dir.join("rounds.csv")).unwrap())
        .with_telemetry(TrainTelemetry::enable(&dir.join("train.jsonl")));
    trainer.run().unwrap()
}

#[test]
fn step_csv_has_one_row_per_step() {
    let dir = tempdir().unwrap();
    let report = run_into(dir.path());

    let body = std::fs::read_to_string(dir.path().join("steps.csv")).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len() as u64, report.total_steps + 1);

    let header_width = lines[0].split(',').count();
    assert!(lines[0].starts_with("round,global_step,chapter_index,previous_summary_length,reward"));
    // The quoted second chapter keeps its comma inside one field.
    for line in &lines[1..] {
        let mut fields = 0;
        let mut in_quotes = false;
        for c in line.chars() {
            match c {
                '"' => in_quotes = !in_quotes,
                ',' if !in_quotes => fields += 1,
                _ => {}
            }
        }
        assert_eq!(fields + 1, header_width, "bad row: {line}");
    }
}

#[test]
fn round_csv_matches_report() {
    let dir = tempdir().unwrap();
    let report = run_into(dir.path());

    let body = std::fs::read_to_string(dir.path().join("rounds.csv")).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), report.rounds.len() + 1);

    let first_row: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(first_row[0], "1");
    assert_eq!(first_row[1], report.rounds[0].steps.to_string());
}

#[test]
fn telemetry_log_is_valid_jsonl_with_run_boundaries() {
    let dir = tempdir().unwrap();
    let report = run_into(dir.path());

    let body = std::fs::read_to_string(dir.path().join("train.jsonl")).unwrap();
    let records: Vec<serde_json::Value> = body
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(records.first().unwrap()["kind"], "run_start");
    assert_eq!(records.last().unwrap()["kind"], "run_end");

    let steps = records.iter().filter(|r| r["kind"] == "step").count();
    assert_eq!(steps as u64, report.total_steps);

    let round_ends = records.iter().filter(|r| r["kind"] == "round_end").count();
    assert_eq!(round_ends, report.rounds.len());

    let updates = records
        .iter()
        .filter(|r| r["kind"] == "update" || r["kind"] == "update_skipped")
        .count() as u64;
    assert_eq!(
        updates,
        report.total_updates_applied + report.total_updates_skipped
    );

    // Step records carry the full metric block.
    let step = records.iter().find(|r| r["kind"] == "step").unwrap();
    assert!(step["metrics"]["similarity"].is_number());
    assert!(step["metrics"]["coverage_ratio"].is_number());
    assert!(step["reward"].is_number());
}
