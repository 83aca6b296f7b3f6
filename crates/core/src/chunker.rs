//! Adaptive, strategy-driven text chunker.
//!
//! Splits one file's text into [`Chunk`]s under a strategy (`lines`, `tokens`,
//! `sliding-window`, `by-section`), then runs an adaptive pass that merges
//! undersized chunks and splits oversized ones against a configured envelope,
//! and finally clamps everything to a global token budget if one is set.
//! Output is fully finalized: sorted, `chunkIndex`/`totalChunks` assigned, and
//! stable ids computed — callers get back exactly what belongs in an index.

use crate::types::{chunk_id, Chunk, ChunkMetadata};
use crate::tokenizer::Tokenizer;
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkStrategy {
    Lines,
    Tokens,
    SlidingWindow,
    BySection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveEnvelope {
    pub min_tokens: Option<usize>,
    pub min_chars: Option<usize>,
    pub min_lines: Option<usize>,
    pub max_tokens: Option<usize>,
    pub max_chars: Option<usize>,
    pub max_lines: Option<usize>,
}

impl AdaptiveEnvelope {
    fn has_min(&self) -> bool {
        self.min_tokens.is_some() || self.min_chars.is_some() || self.min_lines.is_some()
    }

    fn has_max(&self) -> bool {
        self.max_tokens.is_some() || self.max_chars.is_some() || self.max_lines.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkOptions {
    pub strategy: ChunkStrategy,
    pub tokenizer_id: String,
    pub target_lines: usize,
    pub overlap_lines: usize,
    pub target_tokens: usize,
    pub overlap_tokens: usize,
    pub window_size_tokens: usize,
    pub step_tokens: usize,
    pub adaptive: Option<AdaptiveEnvelope>,
    pub context_budget_tokens: Option<usize>,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::Lines,
            tokenizer_id: "basic".to_string(),
            target_lines: 40,
            overlap_lines: 5,
            target_tokens: 256,
            overlap_tokens: 32,
            window_size_tokens: 256,
            step_tokens: 200,
            adaptive: None,
            context_budget_tokens: None,
        }
    }
}

impl ChunkOptions {
    /// When `contextBudgetTokens` is set, every target/max/window/step token
    /// field is clamped to it.
    fn normalized(&self) -> Self {
        let mut opts = self.clone();
        if let Some(budget) = opts.context_budget_tokens {
            opts.target_tokens = opts.target_tokens.min(budget);
            opts.window_size_tokens = opts.window_size_tokens.min(budget);
            opts.step_tokens = opts.step_tokens.min(budget).max(1);
            if let Some(adaptive) = &mut opts.adaptive {
                if let Some(max_tokens) = adaptive.max_tokens {
                    adaptive.max_tokens = Some(max_tokens.min(budget));
                }
            }
        }
        opts
    }
}

/// Merge/split overrides applied by a language-chunk-profile: fields left
/// `None` inherit the base profile's value, including its tokenizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageChunkProfile {
    pub strategy: Option<ChunkStrategy>,
    pub tokenizer_id: Option<String>,
    pub target_lines: Option<usize>,
    pub overlap_lines: Option<usize>,
    pub target_tokens: Option<usize>,
    pub overlap_tokens: Option<usize>,
    pub window_size_tokens: Option<usize>,
    pub step_tokens: Option<usize>,
    pub adaptive: Option<AdaptiveEnvelope>,
}

impl LanguageChunkProfile {
    /// Merges this override onto `base`. An explicit `tokenizer_id` replaces
    /// the base tokenizer outright; its absence inherits the base tokenizer.
    pub fn apply(&self, base: &ChunkOptions) -> ChunkOptions {
        ChunkOptions {
            strategy: self.strategy.unwrap_or(base.strategy),
            tokenizer_id: self.tokenizer_id.clone().unwrap_or_else(|| base.tokenizer_id.clone()),
            target_lines: self.target_lines.unwrap_or(base.target_lines),
            overlap_lines: self.overlap_lines.unwrap_or(base.overlap_lines),
            target_tokens: self.target_tokens.unwrap_or(base.target_tokens),
            overlap_tokens: self.overlap_tokens.unwrap_or(base.overlap_tokens),
            window_size_tokens: self.window_size_tokens.unwrap_or(base.window_size_tokens),
            step_tokens: self.step_tokens.unwrap_or(base.step_tokens),
            adaptive: self.adaptive.clone().or_else(|| base.adaptive.clone()),
            context_budget_tokens: base.context_budget_tokens,
        }
    }
}

pub struct ChunkInput<'a> {
    pub text: &'a str,
    pub path: &'a str,
    pub language: Option<&'a str>,
}

/// A chunk mid-pipeline: line range and text settled, but not yet numbered
/// or id'd (that happens once, at finalization, over the surviving set).
#[derive(Debug, Clone)]
struct RawChunk {
    start_line: usize,
    end_line: usize,
    text: String,
    section: Option<String>,
}

impl RawChunk {
    fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }
}

pub fn chunk(input: &ChunkInput, opts: &ChunkOptions, tokenizer: &dyn Tokenizer) -> Vec<Chunk> {
    if input.text.is_empty() {
        return Vec::new();
    }

    let opts = opts.normalized();
    let origin = strategy_label(opts.strategy);

    let mut raw = match opts.strategy {
        ChunkStrategy::Lines => chunk_by_lines(input.text, opts.target_lines, opts.overlap_lines),
        ChunkStrategy::Tokens => window_by_tokens(input.text, tokenizer, opts.target_tokens, token_step(opts.target_tokens, opts.overlap_tokens)),
        ChunkStrategy::SlidingWindow => {
            window_by_tokens(input.text, tokenizer, opts.window_size_tokens, opts.step_tokens.max(1))
        }
        ChunkStrategy::BySection => chunk_by_section(input.text, input.language),
    };

    if let Some(adaptive) = &opts.adaptive {
        if adaptive.has_min() {
            raw = merge_small_adjacent(raw, adaptive, tokenizer);
        }
        if adaptive.has_max() {
            raw = split_oversized(raw, adaptive, tokenizer);
        }
    }

    if let Some(budget) = opts.context_budget_tokens {
        let envelope = AdaptiveEnvelope { max_tokens: Some(budget), ..Default::default() };
        raw = split_oversized(raw, &envelope, tokenizer);
    }

    finalize(raw, input.path, &opts.tokenizer_id, &origin, tokenizer)
}

fn strategy_label(strategy: ChunkStrategy) -> String {
    match strategy {
        ChunkStrategy::Lines => "lines",
        ChunkStrategy::Tokens => "tokens",
        ChunkStrategy::SlidingWindow => "sliding-window",
        ChunkStrategy::BySection => "by-section",
    }
    .to_string()
}

fn token_step(target: usize, overlap: usize) -> usize {
    target.saturating_sub(overlap).max(1)
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn chunk_by_lines(text: &str, target_lines: usize, overlap_lines: usize) -> Vec<RawChunk> {
    let lines: Vec<&str> = text.split('\n').collect();
    let total = lines.len();
    let target = target_lines.max(1);
    let step = target.saturating_sub(overlap_lines).max(1);

    let mut out = Vec::new();
    let mut start = 0usize;
    while start < total {
        let end = (start + target).min(total);
        out.push(RawChunk {
            start_line: start + 1,
            end_line: end,
            text: lines[start..end].join("\n"),
            section: None,
        });
        if end >= total {
            break;
        }
        start += step;
    }
    out
}

fn line_at_byte(text: &str, byte_offset: usize) -> usize {
    text.as_bytes()[..byte_offset.min(text.len())].iter().filter(|&&b| b == b'\n').count() + 1
}

/// Windows over the tokenizer's token stream when it exposes byte offsets;
/// otherwise approximates a character window from the text's overall
/// tokens-per-character density.
fn window_by_tokens(text: &str, tokenizer: &dyn Tokenizer, window_tokens: usize, step_tokens: usize) -> Vec<RawChunk> {
    let encoded = tokenizer.encode(text);
    let window_tokens = window_tokens.max(1);
    let step_tokens = step_tokens.max(1);

    if let Some(offsets) = &encoded.offsets {
        if offsets.is_empty() {
            return Vec::new();
        }
        let n = offsets.len();
        let mut out = Vec::new();
        let mut start_tok = 0usize;
        loop {
            let end_tok = (start_tok + window_tokens).min(n);
            let byte_start = offsets[start_tok].start;
            let byte_end = offsets[end_tok - 1].end;
            out.push(RawChunk {
                start_line: line_at_byte(text, byte_start),
                end_line: line_at_byte(text, byte_end.saturating_sub(1).max(byte_start)),
                text: text[byte_start..byte_end].to_string(),
                section: None,
            });
            if end_tok >= n {
                break;
            }
            start_tok += step_tokens;
        }
        out
    } else {
        let total_tokens = encoded.count.max(1);
        let char_count = text.chars().count().max(1);
        let chars_per_token = char_count as f64 / total_tokens as f64;
        let char_window = ((window_tokens as f64) * chars_per_token).ceil() as usize;
        let char_step = ((step_tokens as f64) * chars_per_token).ceil().max(1.0) as usize;
        window_by_chars(text, char_window.max(1), char_step)
    }
}

fn window_by_chars(text: &str, window_chars: usize, step_chars: usize) -> Vec<RawChunk> {
    let char_indices: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total = char_indices.len();
    if total == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut start = 0usize;
    loop {
        let end_idx = (start + window_chars).min(total);
        let byte_start = char_indices[start];
        let byte_end = if end_idx < total { char_indices[end_idx] } else { text.len() };
        out.push(RawChunk {
            start_line: line_at_byte(text, byte_start),
            end_line: line_at_byte(text, byte_end.saturating_sub(1).max(byte_start)),
            text: text[byte_start..byte_end].to_string(),
            section: None,
        });
        if end_idx >= total {
            break;
        }
        start += step_chars;
    }
    out
}

fn section_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"^#{1,6}\s",
            r"^\s*#pragma\s+region",
            r"(?i)^\s*//\s*(region|MARK:)",
            r"^\s*(export\s+)?(async\s+)?(function|class|def|interface|trait|struct|enum)\s+\w+",
            r"^\s*export\s+(const|let|var)\s+\w+\s*=",
            r"^\s*(describe|it|test)\s*\(",
        ])
        .expect("section heuristic patterns compile")
    })
}

fn list_item_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"^\s*(?:[-*+]|\d+\.)\s+").expect("list pattern compiles"))
}

/// Splits whenever a line looks like a heading/declaration.
/// In markdown, list-item bullets also start a new section.
fn chunk_by_section(text: &str, language: Option<&str>) -> Vec<RawChunk> {
    let lines: Vec<&str> = text.split('\n').collect();
    let is_markdown = matches!(language, Some("markdown") | Some("md"));

    let mut out = Vec::new();
    let mut section_start = 0usize;
    let mut section_heading: Option<String> = None;

    for (idx, line) in lines.iter().enumerate() {
        let is_heading = section_patterns().is_match(line) || (is_markdown && list_item_pattern().is_match(line));
        if is_heading && idx > section_start {
            out.push(RawChunk {
                start_line: section_start + 1,
                end_line: idx,
                text: lines[section_start..idx].join("\n"),
                section: section_heading.take(),
            });
            section_start = idx;
        }
        if is_heading {
            section_heading = Some(line.trim().to_string());
        }
    }
    out.push(RawChunk {
        start_line: section_start + 1,
        end_line: lines.len(),
        text: lines[section_start..].join("\n"),
        section: section_heading,
    });
    out
}

// ---------------------------------------------------------------------------
// Adaptive pass
// ---------------------------------------------------------------------------

fn meets_min(raw: &RawChunk, envelope: &AdaptiveEnvelope, tokenizer: &dyn Tokenizer) -> bool {
    if let Some(min) = envelope.min_tokens {
        if tokenizer.count(&raw.text) < min {
            return false;
        }
    }
    if let Some(min) = envelope.min_chars {
        if raw.char_count() < min {
            return false;
        }
    }
    if let Some(min) = envelope.min_lines {
        if raw.line_count() < min {
            return false;
        }
    }
    true
}

fn exceeds_max(raw: &RawChunk, envelope: &AdaptiveEnvelope, tokenizer: &dyn Tokenizer) -> bool {
    if let Some(max) = envelope.max_tokens {
        if tokenizer.count(&raw.text) > max {
            return true;
        }
    }
    if let Some(max) = envelope.max_chars {
        if raw.char_count() > max {
            return true;
        }
    }
    if let Some(max) = envelope.max_lines {
        if raw.line_count() > max {
            return true;
        }
    }
    false
}

fn fold(buffer: &RawChunk, next: &RawChunk) -> RawChunk {
    RawChunk {
        start_line: buffer.start_line,
        end_line: next.end_line,
        text: format!("{}\n{}", buffer.text, next.text),
        section: buffer.section.clone().or_else(|| next.section.clone()),
    }
}

/// Buffers chunks, flushing only once the buffer meets every specified
/// minimum; otherwise the next chunk is folded in. The final buffer is
/// always flushed, even if it never meets the envelope.
fn merge_small_adjacent(raw: Vec<RawChunk>, envelope: &AdaptiveEnvelope, tokenizer: &dyn Tokenizer) -> Vec<RawChunk> {
    let mut out = Vec::new();
    let mut iter = raw.into_iter();
    let Some(mut buffer) = iter.next() else {
        return out;
    };

    for next in iter {
        if meets_min(&buffer, envelope, tokenizer) {
            out.push(buffer);
            buffer = next;
        } else {
            buffer = fold(&buffer, &next);
        }
    }
    out.push(buffer);
    out
}

/// Subdivides any chunk exceeding the envelope. When an average-tokens-per-line
/// derived line target usefully shrinks the chunk, splits by that target;
/// otherwise splits evenly into `ceil(tokens/maxTokens)` pieces by line count.
fn split_oversized(raw: Vec<RawChunk>, envelope: &AdaptiveEnvelope, tokenizer: &dyn Tokenizer) -> Vec<RawChunk> {
    let mut out = Vec::new();
    for r in raw {
        out.extend(split_one(r, envelope, tokenizer));
    }
    out
}

fn split_one(r: RawChunk, envelope: &AdaptiveEnvelope, tokenizer: &dyn Tokenizer) -> Vec<RawChunk> {
    if !exceeds_max(&r, envelope, tokenizer) {
        return vec![r];
    }
    let num_lines = r.line_count();
    if num_lines <= 1 {
        return vec![r];
    }

    let token_count = tokenizer.count(&r.text);
    if let Some(max_tokens) = envelope.max_tokens {
        let avg_tokens_per_line = token_count as f64 / num_lines as f64;
        if avg_tokens_per_line > 0.0 {
            let derived_line_target = (max_tokens as f64 / avg_tokens_per_line).floor() as usize;
            if derived_line_target >= 1 && derived_line_target < num_lines {
                return split_by_line_count(&r, derived_line_target, envelope, tokenizer);
            }
        }
    }

    let pieces = if let Some(max_tokens) = envelope.max_tokens {
        ((token_count as f64) / (max_tokens as f64)).ceil() as usize
    } else if let Some(max_lines) = envelope.max_lines {
        ((num_lines as f64) / (max_lines as f64)).ceil() as usize
    } else if let Some(max_chars) = envelope.max_chars {
        ((r.char_count() as f64) / (max_chars as f64)).ceil() as usize
    } else {
        1
    }
    .max(1)
    .min(num_lines);

    let lines_per_piece = ((num_lines as f64) / (pieces as f64)).ceil().max(1.0) as usize;
    split_by_line_count(&r, lines_per_piece, envelope, tokenizer)
}

fn split_by_line_count(r: &RawChunk, lines_per_piece: usize, envelope: &AdaptiveEnvelope, tokenizer: &dyn Tokenizer) -> Vec<RawChunk> {
    let lines: Vec<&str> = r.text.split('\n').collect();
    let lines_per_piece = lines_per_piece.max(1);
    let mut out = Vec::new();
    let mut start = 0usize;
    while start < lines.len() {
        let end = (start + lines_per_piece).min(lines.len());
        let piece = RawChunk {
            start_line: r.start_line + start,
            end_line: r.start_line + end - 1,
            text: lines[start..end].join("\n"),
            section: r.section.clone(),
        };
        // A piece may still exceed the envelope (e.g. one very long line); stop
        // recursing once a split stops making progress.
        if piece.line_count() < r.line_count() && exceeds_max(&piece, envelope, tokenizer) {
            out.extend(split_one(piece, envelope, tokenizer));
        } else {
            out.push(piece);
        }
        start = end;
    }
    out
}

// ---------------------------------------------------------------------------
// Finalization
// ---------------------------------------------------------------------------

fn finalize(raw: Vec<RawChunk>, path: &str, tokenizer_id: &str, origin: &str, tokenizer: &dyn Tokenizer) -> Vec<Chunk> {
    let mut sorted = raw;
    sorted.sort_by(|a, b| a.start_line.cmp(&b.start_line).then(tokenizer.count(&a.text).cmp(&tokenizer.count(&b.text))));

    let total = sorted.len();
    sorted
        .into_iter()
        .enumerate()
        .map(|(idx, r)| {
            let token_count = tokenizer.count(&r.text);
            let char_count = r.char_count();
            let id = chunk_id(path, r.start_line, r.end_line, &r.text, tokenizer_id);
            Chunk {
                id,
                text: r.text,
                metadata: ChunkMetadata {
                    origin: origin.to_string(),
                    path: path.to_string(),
                    start_line: r.start_line,
                    end_line: r.end_line,
                    token_count,
                    char_count,
                    chunk_index: idx,
                    total_chunks: total,
                    section: r.section,
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::BasicTokenizer;

    fn lines_text(n: usize) -> String {
        (1..=n).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn empty_file_produces_zero_chunks() {
        let tokenizer = BasicTokenizer;
        let input = ChunkInput { text: "", path: "empty.txt", language: None };
        let chunks = chunk(&input, &ChunkOptions::default(), &tokenizer);
        assert!(chunks.is_empty());
    }

    #[test]
    fn single_line_file_is_one_chunk() {
        let tokenizer = BasicTokenizer;
        let input = ChunkInput { text: "only line", path: "a.txt", language: None };
        let chunks = chunk(&input, &ChunkOptions::default(), &tokenizer);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.start_line, 1);
        assert_eq!(chunks[0].metadata.end_line, 1);
    }

    #[test]
    fn lines_strategy_produces_overlapping_windows() {
        let tokenizer = BasicTokenizer;
        let text = lines_text(10);
        let opts = ChunkOptions { strategy: ChunkStrategy::Lines, target_lines: 4, overlap_lines: 1, ..Default::default() };
        let input = ChunkInput { text: &text, path: "f.txt", language: None };
        let chunks = chunk(&input, &opts, &tokenizer);
        assert_eq!(chunks[0].metadata.start_line, 1);
        assert_eq!(chunks[0].metadata.end_line, 4);
        assert_eq!(chunks[1].metadata.start_line, 4);
    }

    #[test]
    fn adaptive_merge_enforces_min_lines() {
        let tokenizer = BasicTokenizer;
        let text = lines_text(20);
        let opts = ChunkOptions {
            strategy: ChunkStrategy::Lines,
            target_lines: 3,
            overlap_lines: 0,
            adaptive: Some(AdaptiveEnvelope { min_lines: Some(4), max_lines: Some(6), ..Default::default() }),
            ..Default::default()
        };
        let input = ChunkInput { text: &text, path: "f.txt", language: None };
        let chunks = chunk(&input, &opts, &tokenizer);
        assert_eq!(chunks[0].metadata.start_line, 1);
        for c in &chunks {
            let span = c.metadata.end_line - c.metadata.start_line + 1;
            assert!((4..=6).contains(&span), "span {span} out of envelope");
        }
    }

    #[test]
    fn by_section_splits_on_markdown_headings() {
        let tokenizer = BasicTokenizer;
        let text = "# Intro\nhello\n\n## Details\nmore text\nand more";
        let opts = ChunkOptions { strategy: ChunkStrategy::BySection, ..Default::default() };
        let input = ChunkInput { text, path: "doc.md", language: Some("markdown") };
        let chunks = chunk(&input, &opts, &tokenizer);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.section.as_deref(), Some("# Intro"));
        assert_eq!(chunks[1].metadata.section.as_deref(), Some("## Details"));
    }

    #[test]
    fn context_budget_clamps_oversized_chunks() {
        let tokenizer = BasicTokenizer;
        let text = lines_text(100);
        let opts = ChunkOptions { strategy: ChunkStrategy::Lines, target_lines: 100, overlap_lines: 0, context_budget_tokens: Some(10), ..Default::default() };
        let input = ChunkInput { text: &text, path: "f.txt", language: None };
        let chunks = chunk(&input, &opts, &tokenizer);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(tokenizer.count(&c.text) <= 10);
        }
    }

    #[test]
    fn chunk_ids_are_stable_across_reruns() {
        let tokenizer = BasicTokenizer;
        let text = lines_text(10);
        let input = ChunkInput { text: &text, path: "f.txt", language: None };
        let a = chunk(&input, &ChunkOptions::default(), &tokenizer);
        let b = chunk(&input, &ChunkOptions::default(), &tokenizer);
        let ids_a: Vec<_> = a.iter().map(|c| c.id.clone()).collect();
        let ids_b: Vec<_> = b.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn total_chunks_matches_surviving_count() {
        let tokenizer = BasicTokenizer;
        let text = lines_text(12);
        let opts = ChunkOptions { strategy: ChunkStrategy::Lines, target_lines: 4, overlap_lines: 0, ..Default::default() };
        let input = ChunkInput { text: &text, path: "f.txt", language: None };
        let chunks = chunk(&input, &opts, &tokenizer);
        let total = chunks.len();
        for (idx, c) in chunks.iter().enumerate() {
            assert_eq!(c.metadata.chunk_index, idx);
            assert_eq!(c.metadata.total_chunks, total);
        }
    }
}
