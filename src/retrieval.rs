//! Relevance scoring and bounded context assembly.
//!
//! The pipeline for one question:
//!
//! 1. Take the leading chunks as a baseline (tables of contents and
//!    overviews usually live there) up to `baseline_chars`.
//! 2. Without keywords, fill the rest of the budget with the chunks that
//!    follow the baseline.
//! 3. Otherwise expand keywords with synonyms and stem variants, score every
//!    chunk by occurrence count, rank by score then index, and add ranked
//!    chunks that still fit in `max_context_chars`.
//! 4. Join the chosen chunks in document order.
//!
//! Every step is pure and deterministic.

use std::collections::HashSet;

use serde::Serialize;

use crate::{
    chunking::Chunk,
    keywords::extract_keywords,
    stemming::stem_variants,
    synonyms::expand_with_synonyms,
};

/// Characters reserved for the leading chunks of the document.
pub const DEFAULT_BASELINE_CHARS: usize = 5_000;

/// Hard cap on the assembled context, in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 25_000;

/// Separator placed between chunks in the assembled context.
pub const CHUNK_SEPARATOR: &str = "\n\n";

const SEPARATOR_CHARS: usize = CHUNK_SEPARATOR.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalConfig {
    pub baseline_chars: usize,
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            baseline_chars: DEFAULT_BASELINE_CHARS,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

/// A chunk with its relevance score for one question.
#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: usize,
    pub index: usize,
}

/// The leading chunks that are always part of the context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    /// Indices `0..indices.len()` in document order.
    pub indices: Vec<usize>,
    /// Length of the baseline chunks joined with [`CHUNK_SEPARATOR`].
    pub chars: usize,
}

impl Baseline {
    pub fn contains(&self, index: usize) -> bool {
        index < self.indices.len()
    }
}

/// Everything computed while building the context for one question.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievedContext {
    /// Keywords extracted from the question.
    pub keywords: Vec<String>,
    /// Keywords plus synonym words, before stemming.
    pub expanded: Vec<String>,
    /// Indices of the baseline chunks.
    pub baseline: Vec<usize>,
    /// Indices added beyond the baseline, in the order they were chosen.
    pub selected: Vec<usize>,
    /// The assembled context.
    pub text: String,
}

impl RetrievedContext {
    /// Words contributed by synonym expansion.
    pub fn synonym_additions(&self) -> &[String] {
        let original: HashSet<&str> =
            self.keywords.iter().map(String::as_str).collect();
        let start = self
            .expanded
            .iter()
            .position(|w| !original.contains(w.as_str()))
            .unwrap_or(self.expanded.len());
        &self.expanded[start..]
    }

    /// All chunk indices in the context, in document order.
    pub fn indices(&self) -> Vec<usize> {
        let mut all: Vec<usize> = self
            .baseline
            .iter()
            .chain(self.selected.iter())
            .copied()
            .collect();
        all.sort_unstable();
        all
    }
}

/// Running length of a `CHUNK_SEPARATOR`-joined string under a cap.
#[derive(Debug, Clone, Copy)]
struct Budget {
    used: usize,
    parts: usize,
    limit: usize,
}

impl Budget {
    fn new(limit: usize) -> Self {
        Self {
            used: 0,
            parts: 0,
            limit,
        }
    }

    fn cost(&self, chars: usize) -> usize {
        if self.parts == 0 {
            chars
        } else {
            chars + SEPARATOR_CHARS
        }
    }

    fn fits(&self, chars: usize) -> bool {
        self.used + self.cost(chars) <= self.limit
    }

    fn take(&mut self, chars: usize) {
        self.used += self.cost(chars);
        self.parts += 1;
    }
}

/// Collect leading chunks until the next one would exceed `baseline_chars`.
pub fn collect_baseline(chunks: &[Chunk], baseline_chars: usize) -> Baseline {
    let mut budget = Budget::new(baseline_chars);
    let mut indices = Vec::new();

    for chunk in chunks {
        let chars = chunk.char_len();
        if !budget.fits(chars) {
            break;
        }
        budget.take(chars);
        indices.push(chunk.index);
    }

    Baseline {
        indices,
        chars: budget.used,
    }
}

/// Expand keywords with synonyms and flatten them into stem variants.
///
/// Variants are not deduplicated: a stem shared by two keywords counts
/// twice when scoring.
pub fn search_terms<S: AsRef<str>>(
    keywords: &[S],
) -> (Vec<String>, Vec<String>) {
    let expanded = expand_with_synonyms(keywords);
    let variants = expanded.iter().flat_map(|kw| stem_variants(kw)).collect();
    (expanded, variants)
}

/// Number of non-overlapping occurrences of every term in the lowercased text.
///
/// # Examples
///
/// ```
/// use docask::retrieval::score_text;
///
/// let terms = vec!["filtr".to_string(), "fil".to_string()];
/// assert_eq!(score_text("Filtr a filtry", &terms), 4);
/// ```
pub fn score_text(text: &str, terms: &[String]) -> usize {
    let lower = text.to_lowercase();
    terms
        .iter()
        .filter(|term| !term.is_empty())
        .map(|term| lower.matches(term.as_str()).count())
        .sum()
}

/// Score every chunk, keeping document order.
pub fn score_chunks<'a>(
    chunks: &'a [Chunk],
    terms: &[String],
) -> Vec<ScoredChunk<'a>> {
    chunks
        .iter()
        .map(|chunk| ScoredChunk {
            chunk,
            score: score_text(&chunk.text, terms),
            index: chunk.index,
        })
        .collect()
}

/// Sort by score descending, ties by document index ascending.
pub fn rank(scored: &mut [ScoredChunk<'_>]) {
    scored.sort_by(|a, b| b.score.cmp(&a.score).then(a.index.cmp(&b.index)));
}

/// Pick ranked chunks that add to the baseline without exceeding the budget.
///
/// Stops at the first zero score. Chunks that do not fit are skipped so a
/// smaller, lower-ranked chunk can still use the remaining space.
pub fn select_ranked(
    ranked: &[ScoredChunk<'_>],
    baseline: &Baseline,
    max_context_chars: usize,
) -> Vec<usize> {
    let mut budget = Budget {
        used: baseline.chars,
        parts: baseline.indices.len(),
        limit: max_context_chars,
    };
    let mut selected = Vec::new();

    for item in ranked {
        if item.score == 0 {
            break;
        }
        if baseline.contains(item.index) {
            continue;
        }
        let chars = item.chunk.char_len();
        if !budget.fits(chars) {
            continue;
        }
        budget.take(chars);
        selected.push(item.index);
    }

    selected
}

/// Join the given chunks in document order.
pub fn assemble(chunks: &[Chunk], indices: &[usize]) -> String {
    let mut ordered: Vec<usize> = indices.to_vec();
    ordered.sort_unstable();
    ordered.dedup();

    ordered
        .into_iter()
        .filter_map(|i| chunks.get(i))
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CHUNK_SEPARATOR)
}

/// Fill the budget with the chunks that directly follow the baseline.
fn fill_in_order(
    chunks: &[Chunk],
    baseline: &Baseline,
    max_context_chars: usize,
) -> Vec<usize> {
    let mut budget = Budget {
        used: baseline.chars,
        parts: baseline.indices.len(),
        limit: max_context_chars,
    };
    let mut selected = Vec::new();

    for chunk in &chunks[baseline.indices.len()..] {
        let chars = chunk.char_len();
        if !budget.fits(chars) {
            break;
        }
        budget.take(chars);
        selected.push(chunk.index);
    }

    selected
}

/// Build the context for `question` from the current document's chunks.
pub fn retrieve(
    chunks: &[Chunk],
    question: &str,
    config: &RetrievalConfig,
) -> RetrievedContext {
    let keywords = extract_keywords(question);
    if chunks.is_empty() {
        return RetrievedContext {
            keywords,
            ..Default::default()
        };
    }

    let baseline = collect_baseline(chunks, config.baseline_chars);

    let (expanded, selected) = if keywords.is_empty() {
        let selected =
            fill_in_order(chunks, &baseline, config.max_context_chars);
        (Vec::new(), selected)
    } else {
        let (expanded, terms) = search_terms(&keywords);
        let mut scored = score_chunks(chunks, &terms);
        rank(&mut scored);
        let selected =
            select_ranked(&scored, &baseline, config.max_context_chars);
        (expanded, selected)
    };

    let mut context = RetrievedContext {
        keywords,
        expanded,
        baseline: baseline.indices,
        selected,
        text: String::new(),
    };
    context.text = assemble(chunks, &context.indices());
    context
}

/// The assembled context string for `question`.
pub fn find_relevant_chunks(
    chunks: &[Chunk],
    question: &str,
    config: &RetrievalConfig,
) -> String {
    retrieve(chunks, question, config).text
}
