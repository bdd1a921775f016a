//! Build block extraction
//!
//! Scans a document once, left to right, pairing each
//! `<!-- build:TYPE [OUTPUT] -->` with the nearest following
//! `<!-- endbuild -->`. Anything that looks like a marker but cannot be
//! paired cleanly is a structural error: the rewriter slices the document
//! by these ranges, so a partial result is never returned.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::block::{Block, BlockOutput};
use crate::error::{Error, Result};

/// Output token that selects inline mode unless configured otherwise
pub const DEFAULT_INLINE_TOKEN: &str = "@inline";

static MARKER_CANDIDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<!--\s*(?:build:|endbuild\b)").expect("Invalid marker candidate pattern")
});

static START_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\A<!--\s*build:(\w+)(?:\s+(\S+))?\s*-->").expect("Invalid start marker pattern")
});

static END_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A<!--\s*endbuild\s*-->").expect("Invalid end marker pattern"));

const MARKER_SNIPPET_LEN: usize = 48;

/// Extract blocks using the default inline token
pub fn extract(document: &[u8]) -> Result<Vec<Block>> {
    Extractor::default().extract(document)
}

/// Block extractor
#[derive(Debug, Clone)]
pub struct Extractor {
    inline_token: String,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(DEFAULT_INLINE_TOKEN)
    }
}

struct OpenBlock {
    start: usize,
    content_start: usize,
    block_type: String,
    output: BlockOutput,
}

impl Extractor {
    /// Create an extractor that treats `inline_token` as the inline-mode output
    pub fn new(inline_token: impl Into<String>) -> Self {
        Self {
            inline_token: inline_token.into(),
        }
    }

    /// Extract all blocks in document order
    pub fn extract(&self, document: &[u8]) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        let mut open: Option<OpenBlock> = None;
        let mut cursor = 0;

        for candidate in MARKER_CANDIDATE.find_iter(document) {
            let offset = candidate.start();
            if offset < cursor {
                continue;
            }
            let rest = &document[offset..];

            if let Some(caps) = START_MARKER.captures(rest) {
                if let Some(outer) = &open {
                    return Err(Error::NestedBlock {
                        offset,
                        open: outer.start,
                    });
                }
                let marker_end = offset + caps.get(0).map_or(0, |m| m.end());
                let block_type = caps
                    .get(1)
                    .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
                    .unwrap_or_default();
                let token = caps
                    .get(2)
                    .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned());

                open = Some(OpenBlock {
                    start: offset,
                    content_start: marker_end,
                    block_type,
                    output: BlockOutput::from_token(token.as_deref(), &self.inline_token),
                });
                cursor = marker_end;
            } else if let Some(m) = END_MARKER.find(rest) {
                let Some(opened) = open.take() else {
                    return Err(Error::UnmatchedEnd { offset });
                };
                let marker_end = offset + m.end();
                let block = Block::new(
                    opened.block_type,
                    opened.start..marker_end,
                    opened.output,
                    &document[opened.content_start..offset],
                );
                tracing::debug!(
                    "Found {} block [{}:{}] (output: {:?})",
                    block.block_type,
                    block.range.start,
                    block.range.end,
                    block.output
                );
                blocks.push(block);
                cursor = marker_end;
            } else {
                let snippet = &rest[..rest.len().min(MARKER_SNIPPET_LEN)];
                return Err(Error::MalformedMarker {
                    offset,
                    marker: String::from_utf8_lossy(snippet).into_owned(),
                });
            }
        }

        if let Some(opened) = open {
            return Err(Error::UnterminatedBlock {
                offset: opened.start,
            });
        }

        Ok(blocks)
    }
}
