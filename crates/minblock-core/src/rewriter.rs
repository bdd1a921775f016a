//! Document rewriting
//!
//! Replays the blocks in document order: untouched spans are copied
//! verbatim, compiled blocks are replaced by their replacement markup, and
//! pending or failed blocks keep their original bytes.

use crate::block::{Block, BlockState};
use crate::error::{Error, Result};

/// Rewrite `document`, substituting every compiled block.
///
/// Blocks must be sorted by `range.start`, non-overlapping, and inside the
/// document, as the extractor produces them.
pub fn rewrite(document: &[u8], blocks: &[Block]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(document.len());
    let mut idx = 0;

    for block in blocks {
        let range = &block.range;
        if range.start < idx || range.end < range.start || range.end > document.len() {
            return Err(Error::InvalidRange {
                start: range.start,
                end: range.end,
                message: format!(
                    "must start at or after byte {} and end within {} bytes",
                    idx,
                    document.len()
                ),
            });
        }

        output.extend_from_slice(&document[idx..range.start]);
        match &block.state {
            BlockState::Compiled { replacement, .. } => {
                output.extend_from_slice(replacement.as_bytes());
            }
            BlockState::Pending | BlockState::Failed(_) => {
                output.extend_from_slice(&document[range.clone()]);
            }
        }
        idx = range.end;
    }

    output.extend_from_slice(&document[idx..]);
    Ok(output)
}
