//! Splits raw document text into overlapping chunks with clause labels.
//!
//! Splitting is a generic recursive separator strategy (paragraph, line,
//! sentence, word, falling back to raw character splits), not clause-aware.
//! Clause labels are a best-effort scan of each chunk's leading text.

use std::collections::VecDeque;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Separators tried in order when splitting; the first one present wins.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// A bounded contiguous segment of a source document, tagged with provenance.
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    pub content: String,
    pub document_name: String,
    pub clause_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters of overlap carried between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Splits `text` into ordered chunks tagged with `document_name` and a
    /// clause label. A chunk opening with a numeric clause pattern such as
    /// "3.2.1 " keeps that literal as its label; otherwise it gets the
    /// synthetic label `Part_<n>` in sequence order.
    pub fn chunk(&self, text: &str, document_name: &str) -> Vec<DocumentChunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let pieces = split_recursive(text, &SEPARATORS, self.config.chunk_size);
        let merged = merge_pieces(&pieces, self.config.chunk_size, self.config.chunk_overlap);

        merged
            .into_iter()
            .enumerate()
            .map(|(i, content)| {
                let clause_number = clause_label(&content, i + 1);
                DocumentChunk {
                    content,
                    document_name: document_name.to_string(),
                    clause_number,
                }
            })
            .collect()
    }
}

fn clause_regex() -> &'static Regex {
    static CLAUSE_RE: OnceLock<Regex> = OnceLock::new();
    CLAUSE_RE.get_or_init(|| {
        Regex::new(r"^\s*(\d+(?:\.\d+)*)\s+").expect("clause pattern is a valid regex")
    })
}

fn clause_label(content: &str, index: usize) -> String {
    match clause_regex().captures(content) {
        Some(captures) => captures[1].to_string(),
        None => format!("Part_{}", index),
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Recursively splits `text` into pieces no longer than `chunk_size`
/// characters, preferring the earliest separator that occurs in the text and
/// falling back to raw character splits when none does. Separators stay
/// attached to the preceding piece, so concatenating the pieces reproduces
/// the input exactly.
fn split_recursive(text: &str, separators: &[&str], chunk_size: usize) -> Vec<String> {
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    let Some(sep_idx) = separators.iter().position(|sep| text.contains(sep)) else {
        return split_chars(text, chunk_size);
    };
    let sep = separators[sep_idx];

    let mut pieces = Vec::new();
    for piece in text.split_inclusive(sep) {
        if char_len(piece) <= chunk_size {
            pieces.push(piece.to_string());
        } else {
            pieces.extend(split_recursive(piece, &separators[sep_idx + 1..], chunk_size));
        }
    }
    pieces
}

fn split_chars(text: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Greedily merges consecutive pieces into chunks of at most `chunk_size`
/// characters. When a chunk closes, trailing pieces totalling at most
/// `overlap` characters are carried into the next chunk, so every chunk
/// starts on a separator boundary.
fn merge_pieces(pieces: &[String], chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<&String> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let piece_len = char_len(piece);

        if total + piece_len > chunk_size && !window.is_empty() {
            chunks.push(join_window(&window));

            while total > overlap || (total + piece_len > chunk_size && total > 0) {
                match window.pop_front() {
                    Some(front) => total -= char_len(front),
                    None => break,
                }
            }
        }

        window.push_back(piece);
        total += piece_len;
    }

    if !window.is_empty() {
        chunks.push(join_window(&window));
    }

    chunks
}

fn join_window(window: &VecDeque<&String>) -> String {
    window.iter().map(|piece| piece.as_str()).collect()
}
