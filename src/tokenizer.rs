// src/tokenizer.rs
//
// Character-level tokenizer shared by the environment, the quality metrics
// engine and the agent.
//
// The vocabulary is built once from the full chapter corpus and frozen for
// the rest of the run, so symbol ids stay stable across every episode and
// every replayed batch. Encoding is total: symbols outside the vocabulary
// map to the reserved UNK id, and decode never fails.

use std::collections::HashMap;

/// Reserved special tokens, in id order.
pub const PAD: &str = "<pad>";
pub const BOS: &str = "<bos>";
pub const EOS: &str = "<eos>";
pub const SEP: &str = "<sep>";
pub const UNK: &str = "<unk>";

const NUM_SPECIALS: usize = 5;

/// Frozen character vocabulary with reserved control ids.
#[derive(Debug, Clone)]
pub struct CharTokenizer {
    /// Regular characters in sorted order; id = index + NUM_SPECIALS.
    chars: Vec<char>,
    /// char -> id for regular characters.
    stoi: HashMap<char, usize>,
}

impl CharTokenizer {
    /// Build the vocabulary from the chapter corpus.
    pub fn from_corpus<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut charset: Vec<char> = texts
            .iter()
            .flat_map(|t| t.as_ref().chars())
            .collect::<std::collections::BTreeSet<char>>()
            .into_iter()
            .collect();
        charset.sort_unstable();

        let stoi = charset
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i + NUM_SPECIALS))
            .collect();

        Self {
            chars: charset,
            stoi,
        }
    }

    pub fn pad_id(&self) -> usize {
        0
    }

    pub fn bos_id(&self) -> usize {
        1
    }

    pub fn eos_id(&self) -> usize {
        2
    }

    pub fn sep_id(&self) -> usize {
        3
    }

    pub fn unk_id(&self) -> usize {
        4
    }

    /// Total vocabulary size including the reserved specials.
    pub fn vocab_size(&self) -> usize {
        NUM_SPECIALS + self.chars.len()
    }

    /// True if `c` belongs to the frozen character set.
    pub fn is_allowed_char(&self, c: char) -> bool {
        self.stoi.contains_key(&c)
    }

    /// The frozen regular characters in id order.
    pub fn alphabet(&self) -> &[char] {
        &self.chars
    }

    /// Encode raw text; unknown characters map to the UNK id.
    pub fn encode(&self, text: &str) -> Vec<usize> {
        text.chars()
            .map(|c| self.stoi.get(&c).copied().unwrap_or(self.unk_id()))
            .collect()
    }

    /// Encode an observation as BOS + previous summary + SEP + chapter + EOS.
    pub fn encode_observation(&self, previous_summary: &str, chapter: &str) -> Vec<usize> {
        let mut ids = Vec::with_capacity(previous_summary.len() + chapter.len() + 3);
        ids.push(self.bos_id());
        ids.extend(self.encode(previous_summary));
        ids.push(self.sep_id());
        ids.extend(self.encode(chapter));
        ids.push(self.eos_id());
        ids
    }

    /// Best-effort decode. Stops at EOS, skips BOS/PAD/SEP, renders unknown
    /// ids as the literal UNK marker so downstream garbling checks see them.
    pub fn decode(&self, ids: &[usize]) -> String {
        let mut out = String::with_capacity(ids.len());
        for &id in ids {
            if id == self.eos_id() {
                break;
            }
            if id == self.bos_id() || id == self.pad_id() || id == self.sep_id() {
                continue;
            }
            match self.chars.get(id.wrapping_sub(NUM_SPECIALS)) {
                Some(&c) => out.push(c),
                None => out.push_str(UNK),
            }
        }
        out
    }
}
