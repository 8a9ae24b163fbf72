// src/agent.rs
//
// Agent trait and built-in agents.
//
// Agents map observations to replacement summaries and learn from replayed
// transitions. The trainer treats them as opaque: it only sees the action
// text, the update report, and a serializable snapshot. Two implementations
// ship by default:
// - EchoAgent: emits the current chapter verbatim (non-learning baseline)
// - BigramPolicyAgent: tabular character-bigram policy with twin tabular
//   value heads, updated by a reward-weighted log-likelihood rule

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use serde::{Deserialize, Serialize};

use crate::env::{Observation, Transition};
use crate::error::Result;
use crate::stats::OnlineStats;
use crate::tokenizer::CharTokenizer;

pub const ECHO_AGENT_VERSION: &str = "echo-v1";
pub const BIGRAM_AGENT_VERSION: &str = "bigram-v1";

/// Losses and reward summary from one gradient-style update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpdateReport {
    pub policy_loss: f64,
    pub q1_loss: f64,
    pub q2_loss: f64,
    pub average_reward: f64,
    pub batch_size: usize,
}

/// Serializable description of an agent's learned state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent: String,
    pub training_steps: u64,
    pub parameter_count: usize,
}

/// An acting, learning summarizer.
///
/// select_action may be stochastic; given the same construction seed and the
/// same call sequence it must be reproducible. update consumes a replay batch
/// and reports its losses.
pub trait Agent {
    fn version(&self) -> &str;

    /// Propose a replacement summary for the observed (summary, chapter) pair.
    fn select_action(&mut self, obs: &Observation) -> String;

    /// Learn from a batch of replayed transitions.
    fn update(&mut self, batch: &[Transition]) -> Result<UpdateReport>;

    /// Completed update calls.
    fn training_steps(&self) -> u64;

    /// Number of learned parameters.
    fn parameter_count(&self) -> usize;

    fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            agent: self.version().to_string(),
            training_steps: self.training_steps(),
            parameter_count: self.parameter_count(),
        }
    }
}

/// Baseline agent that copies the chapter verbatim.
///
/// Useful as a reward ceiling probe: coverage and similarity saturate while
/// novelty stays at zero.
#[derive(Debug, Default)]
pub struct EchoAgent {
    training_steps: u64,
}

impl EchoAgent {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Agent for EchoAgent {
    fn version(&self) -> &str {
        ECHO_AGENT_VERSION
    }

    fn select_action(&mut self, obs: &Observation) -> String {
        obs.chapter.clone()
    }

    fn update(&mut self, batch: &[Transition]) -> Result<UpdateReport> {
        // Nothing to learn; report batch reward so logs stay comparable.
        let mut rewards = OnlineStats::new();
        for t in batch {
            rewards.add(t.reward);
        }
        self.training_steps += 1;
        Ok(UpdateReport {
            policy_loss: 0.0,
            q1_loss: 0.0,
            q2_loss: 0.0,
            average_reward: rewards.mean(),
            batch_size: batch.len(),
        })
    }

    fn training_steps(&self) -> u64 {
        self.training_steps
    }

    fn parameter_count(&self) -> usize {
        0
    }
}

/// Hyperparameters for the bigram policy agent.
#[derive(Debug, Clone, Copy)]
pub struct BigramAgentConfig {
    /// Step size for policy table updates.
    pub learning_rate: f64,
    /// Step size for the value heads.
    pub value_learning_rate: f64,
    /// Softmax temperature during sampling.
    pub temperature: f64,
    /// Hard cap on generated summary length, in characters.
    pub max_generation_len: usize,
}

impl Default for BigramAgentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            value_learning_rate: 0.1,
            temperature: 1.0,
            max_generation_len: 256,
        }
    }
}

/// Sentinel preceding the first generated character.
const START: char = '\u{0}';

/// Tabular character-bigram policy with twin value heads.
///
/// The policy is a logit table over (previous char, next char) pairs on the
/// frozen alphabet plus a stop symbol. Actions are sampled autoregressively
/// through a softmax; updates nudge the logits of the sampled bigrams by the
/// advantage against the value baseline. The two value heads are independent
/// per-step-index reward estimators; taking their min gives the baseline.
pub struct BigramPolicyAgent {
    alphabet: Vec<char>,
    logits: HashMap<(char, char), f64>,
    q1: HashMap<usize, f64>,
    q2: HashMap<usize, f64>,
    cfg: BigramAgentConfig,
    rng: ChaCha8Rng,
    training_steps: u64,
}

impl BigramPolicyAgent {
    /// Build from the frozen tokenizer alphabet.
    pub fn new(tokenizer: &CharTokenizer, cfg: BigramAgentConfig, seed: u64) -> Self {
        // Restrict the generation alphabet to printable text; control chars
        // in the corpus would only feed the garbled penalty.
        let alphabet: Vec<char> = tokenizer
            .alphabet()
            .iter()
            .copied()
            .filter(|c| !c.is_control() || *c == '\n')
            .collect();
        Self {
            alphabet,
            logits: HashMap::new(),
            q1: HashMap::new(),
            q2: HashMap::new(),
            cfg,
            rng: ChaCha8Rng::seed_from_u64(seed),
            training_steps: 0,
        }
    }

    fn logit(&self, prev: char, next: char) -> f64 {
        self.logits.get(&(prev, next)).copied().unwrap_or(0.0)
    }

    /// Sample the next character, or None for the stop decision.
    fn sample_next(&mut self, prev: char) -> Option<char> {
        let inv_t = 1.0 / self.cfg.temperature.max(1e-6);
        // Stop symbol shares the softmax with the alphabet.
        let stop_logit = self.logit(prev, START);
        let mut weights: Vec<f64> = Vec::with_capacity(self.alphabet.len() + 1);
        let mut max_logit = stop_logit;
        for &c in &self.alphabet {
            max_logit = max_logit.max(self.logit(prev, c));
        }
        for &c in &self.alphabet {
            weights.push(((self.logit(prev, c) - max_logit) * inv_t).exp());
        }
        weights.push(((stop_logit - max_logit) * inv_t).exp());

        let total: f64 = weights.iter().sum();
        let mut draw = self.rng.gen_range(0.0..total);
        for (i, &w) in weights.iter().enumerate() {
            draw -= w;
            if draw <= 0.0 {
                return self.alphabet.get(i).copied();
            }
        }
        None
    }

    fn baseline(&self, step_index: usize) -> f64 {
        let v1 = self.q1.get(&step_index).copied().unwrap_or(0.0);
        let v2 = self.q2.get(&step_index).copied().unwrap_or(0.0);
        v1.min(v2)
    }
}

impl Agent for BigramPolicyAgent {
    fn version(&self) -> &str {
        BIGRAM_AGENT_VERSION
    }

    fn select_action(&mut self, obs: &Observation) -> String {
        if self.alphabet.is_empty() {
            return String::new();
        }
        // Cap generation relative to the chapter so early training does not
        // drown the reward in length.
        let chapter_len = obs.chapter.chars().count();
        let cap = self.cfg.max_generation_len.min(chapter_len.max(16));

        let mut out = String::new();
        let mut prev = START;
        for _ in 0..cap {
            match self.sample_next(prev) {
                Some(c) => {
                    out.push(c);
                    prev = c;
                }
                None => break,
            }
        }
        out
    }

    fn update(&mut self, batch: &[Transition]) -> Result<UpdateReport> {
        let mut rewards = OnlineStats::new();
        let mut policy_loss = OnlineStats::new();
        let mut q1_loss = OnlineStats::new();
        let mut q2_loss = OnlineStats::new();

        for t in batch {
            rewards.add(t.reward);

            // Twin value heads regress toward the observed reward.
            let e1 = t.reward - self.q1.get(&t.step_index).copied().unwrap_or(0.0);
            let e2 = t.reward - self.q2.get(&t.step_index).copied().unwrap_or(0.0);
            *self.q1.entry(t.step_index).or_insert(0.0) += self.cfg.value_learning_rate * e1;
            *self.q2.entry(t.step_index).or_insert(0.0) += self.cfg.value_learning_rate * e2;
            q1_loss.add(e1 * e1);
            q2_loss.add(e2 * e2);

            // Reinforce the bigrams of the taken action by the advantage.
            let advantage = t.reward - self.baseline(t.step_index);
            policy_loss.add(-advantage);

            let mut prev = START;
            for c in t.action_summary.chars() {
                *self.logits.entry((prev, c)).or_insert(0.0) +=
                    self.cfg.learning_rate * advantage;
                prev = c;
            }
            // The stop decision that ended the action is part of it too.
            *self.logits.entry((prev, START)).or_insert(0.0) +=
                self.cfg.learning_rate * advantage;
        }

        self.training_steps += 1;
        Ok(UpdateReport {
            policy_loss: policy_loss.mean(),
            q1_loss: q1_loss.mean(),
            q2_loss: q2_loss.mean(),
            average_reward: rewards.mean(),
            batch_size: batch.len(),
        })
    }

    fn training_steps(&self) -> u64 {
        self.training_steps
    }

    fn parameter_count(&self) -> usize {
        self.logits.len() + self.q1.len() + self.q2.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::SummaryMetrics;

    fn obs(chapter: &str) -> Observation {
        let tokenizer = CharTokenizer::from_corpus(&[chapter]);
        Observation {
            previous_summary: String::new(),
            chapter: chapter.to_string(),
            chapter_index: 0,
            token_ids: tokenizer.encode_observation("", chapter),
        }
    }

    fn transition(step_index: usize, action: &str, reward: f64) -> Transition {
        let metrics = SummaryMetrics {
            summary_length: action.chars().count(),
            chapter_length: 10,
            length_ratio: 0.5,
            similarity: 0.5,
            coverage_ratio: 0.5,
            novelty_ratio: 0.1,
            copy_ratio: 0.2,
            garbled_ratio: 0.0,
            unk_char_ratio: 0.0,
            disallowed_char_ratio: 0.0,
            control_char_ratio: 0.0,
            word_noncompliance_ratio: 0.0,
            garbled_penalty: 0.0,
            word_penalty: 0.0,
        };
        Transition {
            step_index,
            previous_summary: String::new(),
            chapter: "chapter".to_string(),
            action_summary: action.to_string(),
            reward,
            metrics,
            done: false,
        }
    }

    #[test]
    fn test_echo_agent_copies_chapter() {
        let mut agent = EchoAgent::new();
        let o = obs("the chapter body");
        assert_eq!(agent.select_action(&o), "the chapter body");
        assert_eq!(agent.parameter_count(), 0);
    }

    #[test]
    fn test_echo_update_reports_batch_reward() {
        let mut agent = EchoAgent::new();
        let batch = vec![transition(0, "a", 1.0), transition(1, "b", 3.0)];
        let report = agent.update(&batch).unwrap();
        assert!((report.average_reward - 2.0).abs() < 1e-12);
        assert_eq!(report.batch_size, 2);
        assert_eq!(agent.training_steps(), 1);
    }

    #[test]
    fn test_bigram_agent_samples_within_alphabet() {
        let tokenizer = CharTokenizer::from_corpus(&["abc abc"]);
        let mut agent = BigramPolicyAgent::new(&tokenizer, BigramAgentConfig::default(), 9);
        let action = agent.select_action(&obs("abc abc"));
        for c in action.chars() {
            assert!(tokenizer.is_allowed_char(c), "sampled {c:?} outside alphabet");
        }
        assert!(action.chars().count() <= 256);
    }

    #[test]
    fn test_bigram_agent_is_deterministic_per_seed() {
        let tokenizer = CharTokenizer::from_corpus(&["some text corpus"]);
        let o = obs("some text corpus");
        let mut a = BigramPolicyAgent::new(&tokenizer, BigramAgentConfig::default(), 42);
        let mut b = BigramPolicyAgent::new(&tokenizer, BigramAgentConfig::default(), 42);
        assert_eq!(a.select_action(&o), b.select_action(&o));
        assert_eq!(a.select_action(&o), b.select_action(&o));
    }

    #[test]
    fn test_bigram_update_moves_value_heads_and_params() {
        let tokenizer = CharTokenizer::from_corpus(&["abcdef"]);
        let mut agent = BigramPolicyAgent::new(&tokenizer, BigramAgentConfig::default(), 1);
        assert_eq!(agent.parameter_count(), 0);

        let batch = vec![transition(0, "abc", 1.0), transition(1, "def", -0.5)];
        let report = agent.update(&batch).unwrap();
        assert_eq!(report.batch_size, 2);
        assert!(report.q1_loss > 0.0);
        assert!(report.q2_loss > 0.0);
        assert!(agent.parameter_count() > 0);
        assert_eq!(agent.training_steps(), 1);
    }

    #[test]
    fn test_positive_advantage_raises_action_likelihood() {
        let tokenizer = CharTokenizer::from_corpus(&["ab"]);
        let mut agent = BigramPolicyAgent::new(&tokenizer, BigramAgentConfig::default(), 1);
        let before = agent.logit('a', 'b');
        for _ in 0..5 {
            agent.update(&[transition(0, "ab", 1.0)]).unwrap();
        }
        assert!(agent.logit('a', 'b') > before);
    }

    #[test]
    fn test_snapshot_shape() {
        let agent = EchoAgent::new();
        let snap = agent.snapshot();
        assert_eq!(snap.agent, ECHO_AGENT_VERSION);
        assert_eq!(snap.training_steps, 0);
        assert_eq!(snap.parameter_count, 0);
    }
}
