/*!
 * Reassembly of translated chunks into a subtitle document.
 */

use log::debug;

use crate::errors::PipelineError;
use crate::subtitle_processor::{Block, SubtitleDocument};
use super::batch::ChunkOutcome;
use super::chunking::Chunk;

/// Put translated text back under the original index and timing of each block
///
/// Structural blocks come through verbatim. Translated text is split on line
/// breaks and emitted as however many lines it has; a block whose translation
/// is empty keeps its original lines. Sequence numbers are renumbered when the
/// document is serialized.
pub fn reassemble(
    original: &SubtitleDocument,
    chunks: &[Chunk],
    outcomes: &[ChunkOutcome],
) -> Result<SubtitleDocument, PipelineError> {
    if chunks.len() != outcomes.len() {
        return Err(PipelineError::Misaligned { expected: chunks.len(), actual: outcomes.len() });
    }

    let mut translated: Vec<Option<&str>> = vec![None; original.blocks.len()];

    for (chunk, outcome) in chunks.iter().zip(outcomes) {
        if chunk.chunk_id != outcome.chunk_id || chunk.source_block_refs.len() != outcome.segments.len() {
            return Err(PipelineError::Misaligned {
                expected: chunk.source_block_refs.len(),
                actual: outcome.segments.len(),
            });
        }

        for (&block_index, segment) in chunk.source_block_refs.iter().zip(&outcome.segments) {
            if let Some(slot) = translated.get_mut(block_index) {
                *slot = Some(segment.as_str());
            }
        }
    }

    let blocks: Vec<Block> = original
        .blocks
        .iter()
        .zip(translated)
        .map(|(block, text)| match text {
            Some(text) if !block.is_structural() => rebuild_block(block, text),
            _ => block.clone(),
        })
        .collect();

    debug!("Reassembled {} block(s) from {} chunk(s)", blocks.len(), chunks.len());
    Ok(SubtitleDocument::new(blocks))
}

fn rebuild_block(block: &Block, text: &str) -> Block {
    let lines: Vec<String> = text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if lines.is_empty() {
        return block.clone();
    }

    Block {
        sequence_index: block.sequence_index.clone(),
        time_range: block.time_range.clone(),
        text_lines: lines,
    }
}
