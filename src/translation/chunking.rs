/*!
 * Block-aware chunking.
 *
 * Groups the text of translatable blocks into size-bounded units for the
 * translation endpoint. A block is never split, and structural blocks never
 * enter a chunk.
 */

use log::debug;

use crate::subtitle_processor::SubtitleDocument;

/// Separator placed between block texts inside one chunk
pub const CHUNK_SEPARATOR: &str = "\n\n";

/// A batch of block text sent to the translator in one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk in the output order
    pub chunk_id: usize,

    /// Indices into `SubtitleDocument::blocks`, in document order
    pub source_block_refs: Vec<usize>,

    /// Block texts joined with `CHUNK_SEPARATOR`
    pub text: String,
}

impl Chunk {
    /// Number of characters in the chunk text
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the chunk carries more than one block
    pub fn is_multi_unit(&self) -> bool {
        self.source_block_refs.len() > 1
    }
}

/// Accumulates units until the size limit is reached
struct ChunkBuilder {
    refs: Vec<usize>,
    text: String,
    size: usize,
}

impl ChunkBuilder {
    fn new() -> Self {
        Self { refs: Vec::new(), text: String::new(), size: 0 }
    }

    fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Size of the chunk if `unit_size` were appended
    fn size_with(&self, unit_size: usize) -> usize {
        if self.is_empty() {
            unit_size
        } else {
            self.size + CHUNK_SEPARATOR.len() + unit_size
        }
    }

    fn push(&mut self, block_index: usize, unit: &str, unit_size: usize) {
        self.size = self.size_with(unit_size);
        if !self.is_empty() {
            self.text.push_str(CHUNK_SEPARATOR);
        }
        self.text.push_str(unit);
        self.refs.push(block_index);
    }

    fn finish(&mut self, chunks: &mut Vec<Chunk>) {
        if self.is_empty() {
            return;
        }
        chunks.push(Chunk {
            chunk_id: chunks.len(),
            source_block_refs: std::mem::take(&mut self.refs),
            text: std::mem::take(&mut self.text),
        });
        self.size = 0;
    }
}

/// Split a document into chunks of at most `max_chunk_chars` characters
///
/// A single block larger than the limit becomes its own chunk. Reaching the
/// limit exactly closes the chunk.
pub fn chunk_document(document: &SubtitleDocument, max_chunk_chars: usize) -> Vec<Chunk> {
    let limit = max_chunk_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = ChunkBuilder::new();

    for (block_index, block) in document.blocks.iter().enumerate() {
        if block.is_structural() {
            continue;
        }

        let unit = block.joined_text();
        let unit_size = unit.chars().count();

        if unit_size > limit {
            current.finish(&mut chunks);
            debug!("Block {} is oversized ({} chars), placing in its own chunk", block_index, unit_size);
            current.push(block_index, &unit, unit_size);
            current.finish(&mut chunks);
            continue;
        }

        if current.size_with(unit_size) > limit {
            current.finish(&mut chunks);
        }

        current.push(block_index, &unit, unit_size);

        if current.size >= limit {
            current.finish(&mut chunks);
        }
    }

    current.finish(&mut chunks);

    if log::max_level() >= log::LevelFilter::Debug {
        for chunk in &chunks {
            debug!("Chunk {}: {} block(s), {} chars", chunk.chunk_id, chunk.source_block_refs.len(), chunk.char_len());
        }
    }

    chunks
}
