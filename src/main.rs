// src/main.rs
//
// CLI entrypoint for the precis training harness.
//
// Loads an article, splits it into chapters, trains the selected agent for
// the requested number of rounds, then renders a distillation pass with the
// trained agent. Artifacts land in --out-dir: step/round CSVs, a JSONL
// telemetry log, and a run snapshot JSON.

use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use serde::Serialize;

use precis::agent::{Agent, BigramAgentConfig, BigramPolicyAgent, EchoAgent};
use precis::config::Config;
use precis::corpus::load_chapters;
use precis::env::ArticleEnv;
use precis::export::{RoundCsvWriter, StepCsvWriter};
use precis::quality::LexiconChecker;
use precis::telemetry::TrainTelemetry;
use precis::tokenizer::CharTokenizer;
use precis::trainer::{DistillReport, TrainReport, Trainer};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum AgentArg {
    Echo,
    Bigram,
}

#[derive(Debug, Parser)]
#[command(
    name = "precis",
    about = "Iterative summarization RL training harness",
    version
)]
struct Args {
    /// Article file to summarize (chapters split on the separator line).
    #[arg(long)]
    article: PathBuf,

    /// Agent to train.
    #[arg(long, value_enum, default_value_t = AgentArg::Bigram)]
    agent: AgentArg,

    /// Number of training rounds.
    #[arg(long, default_value_t = 10)]
    rounds: u32,

    /// Replay buffer capacity.
    #[arg(long, default_value_t = 256)]
    replay_capacity: usize,

    /// Update batch size.
    #[arg(long, default_value_t = 8)]
    batch_size: usize,

    /// Update attempts after each round (0 = one per collected step).
    #[arg(long, default_value_t = 0)]
    post_round_updates: u32,

    /// Use at most this many chapters.
    #[arg(long)]
    max_chapters: Option<usize>,

    /// Deterministic seed for replay sampling and agent RNG.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Output directory for CSVs, telemetry, and the snapshot.
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,

    /// Verbosity: -v, -vv
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn fnv1a64(s: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut h = FNV_OFFSET;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Everything a run leaves behind for later inspection.
#[derive(Debug, Serialize)]
struct RunSnapshot {
    config: Config,
    num_chapters: usize,
    vocab_size: usize,
    agent: precis::agent::AgentSnapshot,
    report: TrainReport,
    distillation: DistillReport,
}

fn run<A: Agent>(
    args: &Args,
    config: Config,
    chapters: Vec<String>,
    tokenizer: CharTokenizer,
    agent: A,
) -> anyhow::Result<()> {
    let num_chapters = chapters.len();
    let vocab_size = tokenizer.vocab_size();
    let checker = LexiconChecker::from_corpus(&chapters);
    let env = ArticleEnv::new(chapters, tokenizer, checker, &config)?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating output dir {}", args.out_dir.display()))?;
    let step_csv = StepCsvWriter::create(&args.out_dir.join("steps.csv"))?;
    let round_csv = RoundCsvWriter::create(&args.out_dir.join("rounds.csv"))?;
    let telemetry = TrainTelemetry::enable(&args.out_dir.join("train.jsonl"));

    let mut trainer = Trainer::new(env, agent, config.clone())?
        .with_step_csv(step_csv)
        .with_round_csv(round_csv)
        .with_telemetry(telemetry);
    trainer.set_verbosity(args.verbose);

    let report = trainer.run()?;

    if args.verbose > 0 {
        for r in &report.rounds {
            println!(
                "round {:>3} | steps={} reward_mean={:+.4} updates={}/{} skipped={}",
                r.round, r.steps, r.reward_mean, r.updates_applied, r.updates_attempted,
                r.updates_skipped
            );
        }
    }

    let distillation = trainer.distill()?;
    println!("--- distilled summary ---");
    for step in &distillation.steps {
        if args.verbose > 1 {
            println!(
                "[chapter {:>3}] reward={:+.4} len={}",
                step.chapter_index, step.reward, step.summary_length
            );
        }
    }
    println!("{}", distillation.final_summary);

    println!(
        "done | rounds={} steps={} updates={} skipped={} final_len={}",
        report.rounds.len(),
        report.total_steps,
        report.total_updates_applied,
        report.total_updates_skipped,
        distillation.final_summary.chars().count()
    );

    let snapshot = RunSnapshot {
        config,
        num_chapters,
        vocab_size,
        agent: trainer.agent().snapshot(),
        report,
        distillation,
    };
    let snapshot_path = args.out_dir.join("snapshot.json");
    let file = File::create(&snapshot_path)
        .with_context(|| format!("creating {}", snapshot_path.display()))?;
    serde_json::to_writer_pretty(file, &snapshot)?;

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config {
        rounds: args.rounds,
        replay_capacity: args.replay_capacity,
        batch_size: args.batch_size,
        post_round_updates: args.post_round_updates,
        max_chapters: args.max_chapters,
        seed: args.seed,
        ..Config::default()
    };
    config.validate()?;

    let chapters = load_chapters(&args.article)
        .with_context(|| format!("loading article {}", args.article.display()))?;
    let tokenizer = CharTokenizer::from_corpus(&chapters);

    let cfg_hash = fnv1a64(&format!("{config:?}"));
    println!(
        "precis | cfg={} | cfg_hash=0x{:016x} | agent={:?} | chapters={} | vocab={} | rounds={} | seed={}",
        config.version,
        cfg_hash,
        args.agent,
        chapters.len(),
        tokenizer.vocab_size(),
        args.rounds,
        args.seed
    );

    match args.agent {
        AgentArg::Echo => run(&args, config, chapters, tokenizer, EchoAgent::new()),
        AgentArg::Bigram => {
            let agent = BigramPolicyAgent::new(&tokenizer, BigramAgentConfig::default(), args.seed);
            run(&args, config, chapters, tokenizer, agent)
        }
    }
}
