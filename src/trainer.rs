// src/trainer.rs
//
// Round-based training scheduler.
//
// A round is one full episode over the article's chapters, collected into
// replay, followed by a burst of update attempts. Updates never interleave
// with collection; the phase machine enforces the split. An update attempt
// that finds too little replay data is skipped and counted, not fatal; any
// other failure aborts the run.

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::config::Config;
use crate::env::{ArticleEnv, Transition};
use crate::error::{PrecisError, Result};
use crate::export::{preview, RoundCsvWriter, StepCsvWriter};
use crate::quality::{SummaryMetrics, WordChecker};
use crate::replay::ReplayBuffer;
use crate::stats::OnlineStats;
use crate::telemetry::{TelemetryEvent, TrainTelemetry};

/// Scheduler phase. Collection and updating never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collecting,
    Updating,
}

/// Per-step export and telemetry record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub round: u32,
    pub global_step: u64,
    pub chapter_index: usize,
    pub previous_summary_length: usize,
    pub reward: f64,
    pub metrics: SummaryMetrics,
    pub summary_preview: String,
    pub buffer_len: usize,
}

/// Per-round aggregate record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub steps: u64,
    pub updates_attempted: u32,
    pub updates_applied: u32,
    pub updates_skipped: u32,
    pub reward_total: f64,
    pub reward_mean: f64,
    pub reward_min: f64,
    pub reward_max: f64,
    pub policy_loss_mean: f64,
    pub q1_loss_mean: f64,
    pub q2_loss_mean: f64,
    pub final_summary_length: usize,
    pub final_summary_preview: String,
}

/// Whole-run summary returned by [`Trainer::run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub rounds: Vec<RoundRecord>,
    pub total_steps: u64,
    pub total_updates_applied: u64,
    pub total_updates_skipped: u64,
    pub final_summary: String,
}

/// One chapter of a post-training distillation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistillStep {
    pub chapter_index: usize,
    pub reward: f64,
    pub summary_length: usize,
    pub summary: String,
}

/// Full-article walk with the trained agent, no learning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistillReport {
    pub steps: Vec<DistillStep>,
    pub final_summary: String,
}

/// Drives agent, environment, and replay through training rounds.
pub struct Trainer<A: Agent, W: WordChecker> {
    env: ArticleEnv<W>,
    agent: A,
    buffer: ReplayBuffer<Transition>,
    config: Config,
    telemetry: TrainTelemetry,
    step_csv: Option<StepCsvWriter>,
    round_csv: Option<RoundCsvWriter>,
    phase: Phase,
    verbosity: u8,
    global_step: u64,
    total_updates_applied: u64,
    total_updates_skipped: u64,
}

impl<A: Agent, W: WordChecker> Trainer<A, W> {
    pub fn new(env: ArticleEnv<W>, agent: A, config: Config) -> Result<Self> {
        config.validate()?;
        let buffer = ReplayBuffer::new(config.replay_capacity, config.seed)?;
        Ok(Self {
            env,
            agent,
            buffer,
            config,
            telemetry: TrainTelemetry::disabled(),
            step_csv: None,
            round_csv: None,
            phase: Phase::Collecting,
            verbosity: 0,
            global_step: 0,
            total_updates_applied: 0,
            total_updates_skipped: 0,
        })
    }

    pub fn with_telemetry(mut self, telemetry: TrainTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_step_csv(mut self, writer: StepCsvWriter) -> Self {
        self.step_csv = Some(writer);
        self
    }

    pub fn with_round_csv(mut self, writer: RoundCsvWriter) -> Self {
        self.round_csv = Some(writer);
        self
    }

    /// Console verbosity: 0 silent, 1 per-round, 2 per-step.
    pub fn set_verbosity(&mut self, verbosity: u8) {
        self.verbosity = verbosity;
    }

    /// Run the configured number of rounds.
    pub fn run(&mut self) -> Result<TrainReport> {
        self.telemetry.record(&TelemetryEvent::RunStart {
            config: self.config.clone(),
            num_chapters: self.env.num_chapters(),
            vocab_size: self.env.tokenizer().vocab_size(),
            agent: self.agent.version().to_string(),
        });

        let mut rounds = Vec::with_capacity(self.config.rounds as usize);
        let mut final_summary = String::new();

        for round in 1..=self.config.rounds {
            let record = self.run_round(round, &mut final_summary)?;
            if let Some(w) = self.round_csv.as_mut() {
                w.append(&record)?;
            }
            self.telemetry.record(&TelemetryEvent::RoundEnd(record.clone()));
            rounds.push(record);
        }

        if let Some(w) = self.step_csv.as_mut() {
            w.flush()?;
        }
        if let Some(w) = self.round_csv.as_mut() {
            w.flush()?;
        }
        self.telemetry.record(&TelemetryEvent::RunEnd {
            total_steps: self.global_step,
            total_updates: self.total_updates_applied,
            final_summary_length: final_summary.chars().count(),
        });
        self.telemetry.flush();

        Ok(TrainReport {
            rounds,
            total_steps: self.global_step,
            total_updates_applied: self.total_updates_applied,
            total_updates_skipped: self.total_updates_skipped,
            final_summary,
        })
    }

    fn run_round(&mut self, round: u32, final_summary: &mut String) -> Result<RoundRecord> {
        self.phase = Phase::Collecting;
        self.telemetry.record(&TelemetryEvent::RoundStart { round });

        let mut rewards = OnlineStats::new();
        let mut steps_this_round: u64 = 0;

        let mut observation = Some(self.env.reset());
        while let Some(obs) = observation {
            let action = self.agent.select_action(&obs);
            let result = self.env.step(&action)?;
            let transition = result.transition;
            observation = result.observation;

            rewards.add(transition.reward);
            steps_this_round += 1;

            let record = StepRecord {
                round,
                global_step: self.global_step,
                chapter_index: transition.step_index,
                previous_summary_length: transition.previous_summary.chars().count(),
                reward: transition.reward,
                metrics: transition.metrics,
                summary_preview: preview(&transition.action_summary),
                buffer_len: self.buffer.len() + 1,
            };
            self.buffer.push(transition);
            if let Some(w) = self.step_csv.as_mut() {
                w.append(&record)?;
            }
            if self.verbosity >= 2 {
                println!(
                    "[round {:>3} step {:>4}] chapter={} reward={:+.4} len={} \"{}\"",
                    round,
                    self.global_step,
                    record.chapter_index,
                    record.reward,
                    record.metrics.summary_length,
                    record.summary_preview
                );
            }
            self.telemetry.record(&TelemetryEvent::Step(record));
            self.global_step += 1;
        }
        final_summary.clear();
        final_summary.push_str(self.env.final_summary()?);

        // Update burst. Zero means one attempt per collected step.
        self.phase = Phase::Updating;
        let attempts = if self.config.post_round_updates == 0 {
            steps_this_round as u32
        } else {
            self.config.post_round_updates
        };

        let mut applied: u32 = 0;
        let mut skipped: u32 = 0;
        let mut policy_loss = OnlineStats::new();
        let mut q1_loss = OnlineStats::new();
        let mut q2_loss = OnlineStats::new();

        for _ in 0..attempts {
            match self.buffer.sample(self.config.batch_size) {
                Ok(batch) => {
                    let report = self.agent.update(&batch)?;
                    policy_loss.add(report.policy_loss);
                    q1_loss.add(report.q1_loss);
                    q2_loss.add(report.q2_loss);
                    applied += 1;
                    self.total_updates_applied += 1;
                    self.telemetry.record(&TelemetryEvent::Update {
                        round,
                        global_step: self.global_step,
                        report,
                    });
                }
                Err(PrecisError::InsufficientData {
                    available,
                    requested,
                }) => {
                    skipped += 1;
                    self.total_updates_skipped += 1;
                    self.telemetry.record(&TelemetryEvent::UpdateSkipped {
                        round,
                        global_step: self.global_step,
                        available,
                        requested,
                    });
                }
                Err(other) => return Err(other),
            }
        }

        Ok(RoundRecord {
            round,
            steps: steps_this_round,
            updates_attempted: attempts,
            updates_applied: applied,
            updates_skipped: skipped,
            reward_total: rewards.mean() * rewards.n() as f64,
            reward_mean: rewards.mean(),
            reward_min: rewards.min(),
            reward_max: rewards.max(),
            policy_loss_mean: policy_loss.mean(),
            q1_loss_mean: q1_loss.mean(),
            q2_loss_mean: q2_loss.mean(),
            final_summary_length: final_summary.chars().count(),
            final_summary_preview: preview(final_summary),
        })
    }

    /// Walk the article once with the trained agent, without learning.
    pub fn distill(&mut self) -> Result<DistillReport> {
        let mut steps = Vec::with_capacity(self.env.num_chapters());
        let mut observation = Some(self.env.reset());
        while let Some(obs) = observation {
            let action = self.agent.select_action(&obs);
            let result = self.env.step(&action)?;
            observation = result.observation;
            steps.push(DistillStep {
                chapter_index: result.transition.step_index,
                reward: result.transition.reward,
                summary_length: result.transition.action_summary.chars().count(),
                summary: result.transition.action_summary,
            });
        }
        Ok(DistillReport {
            final_summary: self.env.final_summary()?.to_string(),
            steps,
        })
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Current scheduler phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer(&self) -> &ReplayBuffer<Transition> {
        &self.buffer
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
