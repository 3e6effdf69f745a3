//! Chunk lexer: splits a dictionary file into `[Tag]`-delimited sections.
//!
//! A chunk begins on a `[Tag]` line and ends on a blank line. Recognized
//! tags carry their `Key=Value` lines through for the parser to interpret;
//! any other bracketed tag is skipped silently until the next blank line.

/// The recognized section tags. `Unknown` sections are never materialized
/// here, see the lexer's skip behavior below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Dictionary,
    Level,
    IdItems,
    Record,
    Item,
    ValueSet,
    Relation,
}

impl ChunkKind {
    fn from_tag(tag: &str) -> Option<ChunkKind> {
        match tag {
            "Dictionary" => Some(ChunkKind::Dictionary),
            "Level" => Some(ChunkKind::Level),
            "IdItems" => Some(ChunkKind::IdItems),
            "Record" => Some(ChunkKind::Record),
            "Item" => Some(ChunkKind::Item),
            "ValueSet" => Some(ChunkKind::ValueSet),
            "Relation" => Some(ChunkKind::Relation),
            _ => None,
        }
    }
}

/// One recognized section: its tag and the `Key=Value` lines it accumulated
/// before its terminating blank line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub lines: Vec<(String, String)>,
}

/// Splits a full DCF text into its recognized chunks, dropping unrecognized
/// bracketed sections entirely.
pub fn lex_chunks(text: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current: Option<Chunk> = None;

    for raw in text.lines() {
        let line = raw.trim_end_matches('\r');

        if line.trim().is_empty() {
            if let Some(chunk) = current.take() {
                chunks.push(chunk);
            }
            continue;
        }

        if let Some(tag) = bracketed_tag(line) {
            if let Some(chunk) = current.take() {
                chunks.push(chunk);
            }
            current = ChunkKind::from_tag(tag).map(|kind| Chunk {
                kind,
                lines: Vec::new(),
            });
            continue;
        }

        if let Some(chunk) = current.as_mut() {
            if let Some((key, value)) = line.split_once('=') {
                chunk.lines.push((key.to_string(), value.to_string()));
            }
        }
    }

    if let Some(chunk) = current.take() {
        chunks.push(chunk);
    }

    chunks
}

fn bracketed_tag(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('[') && trimmed.ends_with(']') {
        Some(&trimmed[1..trimmed.len() - 1])
    } else {
        None
    }
}
