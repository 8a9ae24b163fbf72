// src/quality.rs
//
// Quality metrics engine for candidate summaries.
//
// Pure, deterministic scoring of (candidate, chapter) pairs along independent
// axes: length, similarity, coverage, novelty, garbling and vocabulary
// compliance. The environment composes these into a scalar reward via the
// configured weights; every axis is also surfaced to callers so logs and CSV
// exports can report them independently.
//
// Cost is bounded: similarity and copy detection operate on length-capped
// views of the text, while the no-truncation contract on the running summary
// itself is upheld by the environment, not here.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::{PenaltyConfig, RewardWeights};
use crate::error::{PrecisError, Result};
use crate::tokenizer::{CharTokenizer, UNK};

/// Character cap for the bigram-similarity computation.
const SIMILARITY_CAP: usize = 4096;

/// Character cap per side for the longest-common-substring diagnostic.
const COPY_CAP: usize = 1024;

/// Control characters tolerated in well-formed summaries.
const CONTROL_WHITELIST: [char; 3] = ['\n', '\r', '\t'];

/// Word units shorter than this never count as salient vocabulary.
const MIN_SALIENT_LEN: usize = 2;

/// Stopword-equivalents excluded from the salient-coverage base.
const STOPWORDS: [&str; 24] = [
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "that", "the", "this", "to", "was", "were", "with", "which",
];

/// External word-validity collaborator.
///
/// The engine does not own a notion of spelling; callers supply one. The
/// default implementation validates against the corpus-derived lexicon.
pub trait WordChecker {
    fn is_valid_word(&self, word: &str) -> bool;
}

/// Word checker backed by the lexicon of the chapter corpus.
#[derive(Debug, Clone)]
pub struct LexiconChecker {
    words: HashSet<String>,
}

impl LexiconChecker {
    pub fn from_corpus<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut words = HashSet::new();
        for text in texts {
            for unit in word_units(text.as_ref()) {
                words.insert(unit);
            }
        }
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl WordChecker for LexiconChecker {
    fn is_valid_word(&self, word: &str) -> bool {
        self.words.contains(&word.to_lowercase())
    }
}

/// Full metrics record for one scored summary.
///
/// Every ratio is in [0,1]; both penalties are non-negative; all fields are
/// finite (enforced by [`SummaryMetrics::validate`]).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub summary_length: usize,
    pub chapter_length: usize,
    /// Candidate length over chapter length. Unclamped, diagnostic only.
    pub length_ratio: f64,
    /// Symmetric bigram-Dice similarity between candidate and chapter.
    pub similarity: f64,
    /// Fraction of the chapter's salient vocabulary present in the candidate.
    pub coverage_ratio: f64,
    /// Fraction of candidate word units absent verbatim from the chapter.
    pub novelty_ratio: f64,
    /// Longest verbatim block over candidate length (copy diagnostic).
    pub copy_ratio: f64,
    /// Fraction of candidate characters failing well-formedness checks.
    pub garbled_ratio: f64,
    /// Fraction of characters covered by literal UNK markers.
    pub unk_char_ratio: f64,
    /// Fraction of characters outside the tokenizer's frozen charset.
    pub disallowed_char_ratio: f64,
    /// Fraction of non-whitelisted control characters.
    pub control_char_ratio: f64,
    /// Fraction of word units rejected by the word checker.
    pub word_noncompliance_ratio: f64,
    /// Shaped penalty derived from garbled_ratio.
    pub garbled_penalty: f64,
    /// Shaped penalty derived from word_noncompliance_ratio.
    pub word_penalty: f64,
}

impl SummaryMetrics {
    /// Reject any non-finite field.
    ///
    /// A non-finite metric indicates a bug in this engine and must abort the
    /// run rather than silently poison training.
    pub fn validate(&self) -> Result<()> {
        let fields: [(&'static str, f64); 12] = [
            ("length_ratio", self.length_ratio),
            ("similarity", self.similarity),
            ("coverage_ratio", self.coverage_ratio),
            ("novelty_ratio", self.novelty_ratio),
            ("copy_ratio", self.copy_ratio),
            ("garbled_ratio", self.garbled_ratio),
            ("unk_char_ratio", self.unk_char_ratio),
            ("disallowed_char_ratio", self.disallowed_char_ratio),
            ("control_char_ratio", self.control_char_ratio),
            ("word_noncompliance_ratio", self.word_noncompliance_ratio),
            ("garbled_penalty", self.garbled_penalty),
            ("word_penalty", self.word_penalty),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(PrecisError::MalformedMetrics { field, value });
            }
        }
        Ok(())
    }

    /// Compose the scalar reward from the quality axes and penalties.
    pub fn reward(&self, weights: &RewardWeights) -> f64 {
        weights.similarity * self.similarity
            + weights.coverage * self.coverage_ratio
            + weights.novelty * self.novelty_ratio
            - self.garbled_penalty
            - self.word_penalty
    }
}

/// Score a candidate summary against its source chapter.
///
/// Deterministic and side-effect free: identical inputs always yield an
/// identical record. Never fails on arbitrary candidate text, including the
/// empty string.
pub fn analyze_summary(
    candidate: &str,
    chapter: &str,
    tokenizer: &CharTokenizer,
    word_checker: &dyn WordChecker,
    garbled_shaping: &PenaltyConfig,
    word_shaping: &PenaltyConfig,
) -> SummaryMetrics {
    let summary_length = candidate.chars().count();
    let chapter_length = chapter.chars().count();

    let length_ratio = if chapter_length > 0 {
        summary_length as f64 / chapter_length as f64
    } else {
        0.0
    };

    let similarity = bigram_similarity(candidate, chapter);
    let copy_ratio = copy_ratio(candidate, chapter);

    let candidate_units = word_units(candidate);
    let chapter_unit_set: HashSet<String> = word_units(chapter).into_iter().collect();

    let coverage_ratio = coverage(&chapter_unit_set, &candidate_units);
    let novelty_ratio = novelty(&chapter_unit_set, &candidate_units);

    let (garbled_ratio, unk_char_ratio, disallowed_char_ratio, control_char_ratio) =
        garbled_statistics(candidate, tokenizer);

    let word_noncompliance_ratio = if candidate_units.is_empty() {
        0.0
    } else {
        let rejected = candidate_units
            .iter()
            .filter(|w| !word_checker.is_valid_word(w))
            .count();
        rejected as f64 / candidate_units.len() as f64
    };

    SummaryMetrics {
        summary_length,
        chapter_length,
        length_ratio,
        similarity,
        coverage_ratio,
        novelty_ratio,
        copy_ratio,
        garbled_ratio,
        unk_char_ratio,
        disallowed_char_ratio,
        control_char_ratio,
        word_noncompliance_ratio,
        garbled_penalty: garbled_shaping.apply(garbled_ratio),
        word_penalty: word_shaping.apply(word_noncompliance_ratio),
    }
}

/// Characters from scripts written without word separators (CJK ideographs,
/// kana). Whole clauses would otherwise collapse into one unit.
fn is_unsegmented_script(c: char) -> bool {
    matches!(
        c as u32,
        0x3040..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF
    )
}

/// Lowercased word units of a text: alphanumeric runs, except that
/// unsegmented-script characters count as one unit each.
fn word_units(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if is_unsegmented_script(c) {
            if !current.is_empty() {
                units.push(std::mem::take(&mut current));
            }
            units.push(c.to_string());
        } else if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
        } else if !current.is_empty() {
            units.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        units.push(current);
    }
    units
}

/// Fraction of the chapter's salient units present in the candidate.
///
/// Salient = word units at least MIN_SALIENT_LEN long and not
/// stopword-equivalents. When the chapter has no salient units the base
/// falls back to all chapter units, so a verbatim echo still scores 1.0.
fn coverage(chapter_units: &HashSet<String>, candidate_units: &[String]) -> f64 {
    let salient: Vec<&String> = chapter_units
        .iter()
        .filter(|u| u.len() >= MIN_SALIENT_LEN && !STOPWORDS.contains(&u.as_str()))
        .collect();
    let base: Vec<&String> = if salient.is_empty() {
        chapter_units.iter().collect()
    } else {
        salient
    };
    if base.is_empty() {
        return 0.0;
    }
    let candidate_set: HashSet<&str> = candidate_units.iter().map(|s| s.as_str()).collect();
    let covered = base
        .iter()
        .filter(|u| candidate_set.contains(u.as_str()))
        .count();
    covered as f64 / base.len() as f64
}

/// Fraction of candidate units absent verbatim from the chapter.
///
/// Computed over candidate tokens; deliberately not the complement of
/// coverage, which is computed over chapter tokens.
fn novelty(chapter_units: &HashSet<String>, candidate_units: &[String]) -> f64 {
    if candidate_units.is_empty() {
        return 0.0;
    }
    let novel = candidate_units
        .iter()
        .filter(|u| !chapter_units.contains(*u))
        .count();
    novel as f64 / candidate_units.len() as f64
}

/// Truncate a string to at most `cap` characters (analysis view only).
fn capped(text: &str, cap: usize) -> &str {
    match text.char_indices().nth(cap) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Symmetric normalized similarity: Sørensen–Dice over character-bigram
/// multisets, computed on length-capped views.
///
/// Identical text scores 1.0; the score decreases monotonically as the
/// bigram profiles diverge; it is symmetric by construction.
fn bigram_similarity(a: &str, b: &str) -> f64 {
    let a = capped(a, SIMILARITY_CAP);
    let b = capped(b, SIMILARITY_CAP);
    if a == b {
        return 1.0;
    }

    let bigrams = |s: &str| -> HashMap<(char, char), usize> {
        let chars: Vec<char> = s.chars().collect();
        let mut counts = HashMap::new();
        for w in chars.windows(2) {
            *counts.entry((w[0], w[1])).or_insert(0) += 1;
        }
        counts
    };

    let ca = bigrams(a);
    let cb = bigrams(b);
    let total: usize = ca.values().sum::<usize>() + cb.values().sum::<usize>();
    if total == 0 {
        // Both too short for bigrams and not equal.
        return 0.0;
    }

    let overlap: usize = ca
        .iter()
        .map(|(bg, &n)| n.min(cb.get(bg).copied().unwrap_or(0)))
        .sum();

    2.0 * overlap as f64 / total as f64
}

/// Longest verbatim block shared with the chapter, over candidate length.
///
/// Classic longest-common-substring DP with a rolling row, on capped views.
fn copy_ratio(candidate: &str, chapter: &str) -> f64 {
    let cand: Vec<char> = capped(candidate, COPY_CAP).chars().collect();
    let chap: Vec<char> = capped(chapter, COPY_CAP).chars().collect();
    if cand.is_empty() || chap.is_empty() {
        return 0.0;
    }

    let mut longest = 0usize;
    let mut prev = vec![0usize; chap.len() + 1];
    for &cc in &cand {
        let mut row = vec![0usize; chap.len() + 1];
        for (j, &jc) in chap.iter().enumerate() {
            if cc == jc {
                row[j + 1] = prev[j] + 1;
                longest = longest.max(row[j + 1]);
            }
        }
        prev = row;
    }

    (longest as f64 / cand.len() as f64).min(1.0)
}

/// Ratios describing garbled content: (garbled, unk, disallowed, control).
fn garbled_statistics(candidate: &str, tokenizer: &CharTokenizer) -> (f64, f64, f64, f64) {
    let chars: Vec<char> = candidate.chars().collect();
    if chars.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }

    let total = chars.len();
    let mut invalid = vec![false; total];
    let mut disallowed = 0usize;
    let mut control = 0usize;

    for (idx, &c) in chars.iter().enumerate() {
        let is_control = c.is_control() && !CONTROL_WHITELIST.contains(&c);
        if !tokenizer.is_allowed_char(c) {
            disallowed += 1;
            invalid[idx] = true;
        }
        if is_control {
            control += 1;
            invalid[idx] = true;
        }
    }

    // Literal UNK marker spans count as garbled in full.
    let unk: Vec<char> = UNK.chars().collect();
    let mut unk_spans = 0usize;
    let mut i = 0usize;
    while i + unk.len() <= total {
        if chars[i..i + unk.len()] == unk[..] {
            unk_spans += 1;
            for flag in invalid.iter_mut().skip(i).take(unk.len()) {
                *flag = true;
            }
            i += unk.len();
        } else {
            i += 1;
        }
    }

    let garbled = invalid.iter().filter(|&&f| f).count();
    (
        garbled as f64 / total as f64,
        (unk_spans * unk.len()) as f64 / total as f64,
        disallowed as f64 / total as f64,
        control as f64 / total as f64,
    )
}
