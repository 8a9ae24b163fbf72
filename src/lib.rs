//! Precis core library.
//!
//! An iterative-summarization training harness: an agent walks the chapters
//! of an article, proposing a replacement running summary at each step, and
//! learns from a scalar reward built out of independent quality metrics.
//! The binary (`src/main.rs`) is a thin CLI around these components.
//!
//! Components:
//!
//! - **Tokenizer** (`tokenizer`): frozen character vocabulary with reserved
//!   control ids; total encode/decode.
//! - **Quality** (`quality`): pure metrics engine scoring candidate
//!   summaries along length, similarity, coverage, novelty, garbling and
//!   vocabulary-compliance axes.
//! - **Environment** (`env`): gym-style episodic environment (reset, step)
//!   over a chapter sequence, with an explicit phase machine.
//! - **Replay** (`replay`): bounded ring buffer with seeded uniform
//!   sampling without replacement.
//! - **Agents** (`agent`): the acting/learning interface plus an echo
//!   baseline and a tabular bigram policy.
//! - **Trainer** (`trainer`): round-based scheduler with deferred
//!   post-round update bursts, CSV export and JSONL telemetry.

pub mod agent;
pub mod config;
pub mod corpus;
pub mod env;
pub mod error;
pub mod export;
pub mod quality;
pub mod replay;
pub mod stats;
pub mod telemetry;
pub mod tokenizer;
pub mod trainer;

// --- Re-exports for ergonomic external use ---------------------------------

pub use agent::{Agent, AgentSnapshot, BigramPolicyAgent, EchoAgent, UpdateReport};
pub use config::{Config, PenaltyConfig, RewardWeights};
pub use corpus::{load_chapters, split_chapters, CHAPTER_SEPARATOR};
pub use env::{ArticleEnv, EnvPhase, Observation, StepResult, Transition};
pub use error::{PrecisError, Result};
pub use quality::{analyze_summary, LexiconChecker, SummaryMetrics, WordChecker};
pub use replay::ReplayBuffer;
pub use telemetry::{TelemetryEvent, TrainTelemetry};
pub use tokenizer::CharTokenizer;
pub use trainer::{DistillReport, RoundRecord, StepRecord, TrainReport, Trainer};
