/*!
 * Tests for chunking, segment splitting and reassembly
 */

use autotranslate::subtitle_processor::SubtitleDocument;
use autotranslate::translation::batch::{ChunkOutcome, ChunkStatus, split_translated_segments, split_units};
use autotranslate::translation::chunking::{CHUNK_SEPARATOR, chunk_document};
use autotranslate::translation::reassembly::reassemble;
use autotranslate::errors::PipelineError;

use crate::common::{SAMPLE_SRT, numbered_srt};

fn translated(chunk_id: usize, segments: &[&str]) -> ChunkOutcome {
    ChunkOutcome {
        chunk_id,
        segments: segments.iter().map(|s| s.to_string()).collect(),
        status: ChunkStatus::Translated { attempts: 1 },
    }
}

#[test]
fn test_chunk_document_withLargeLimit_shouldProduceOneChunk() {
    let doc = SubtitleDocument::parse(SAMPLE_SRT);
    let chunks = chunk_document(&doc, 1500);

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].source_block_refs, vec![0, 1, 2]);
    assert_eq!(split_units(&chunks[0]).len(), 3);
}

#[test]
fn test_chunk_document_withSmallLimit_shouldCoverBlocksInOrder() {
    let doc = SubtitleDocument::parse(&numbered_srt(40));
    let chunks = chunk_document(&doc, 50);

    assert!(chunks.len() > 1);
    let covered: Vec<usize> = chunks.iter().flat_map(|c| c.source_block_refs.iter().copied()).collect();
    assert_eq!(covered, (0..40).collect::<Vec<_>>());
    for chunk in &chunks {
        assert!(chunk.char_len() <= 50);
        assert_eq!(split_units(chunk).len(), chunk.source_block_refs.len());
    }
}

#[test]
fn test_split_translated_segments_withWhitespaceSeparators_shouldSplit() {
    let segments = split_translated_segments("Um\n \nDois\n\n\nTrês\n");
    assert_eq!(segments, vec!["Um", "Dois", "Três"]);
    assert_eq!(split_translated_segments(&["a", "b"].join(CHUNK_SEPARATOR)).len(), 2);
}

#[test]
fn test_reassemble_withTranslations_shouldKeepTimingAndIndices() {
    let doc = SubtitleDocument::parse(SAMPLE_SRT);
    let chunks = chunk_document(&doc, 1500);
    let outcomes = vec![translated(0, &["Isto é um teste.", "Contém várias\nentradas.", "Para testes."])];

    let result = reassemble(&doc, &chunks, &outcomes).unwrap();

    assert_eq!(result.len(), doc.len());
    for (original, rebuilt) in doc.blocks.iter().zip(&result.blocks) {
        assert_eq!(original.sequence_index, rebuilt.sequence_index);
        assert_eq!(original.time_range, rebuilt.time_range);
    }
    assert_eq!(result.blocks[1].text_lines, vec!["Contém várias", "entradas."]);
}

#[test]
fn test_reassemble_withMissingOutcome_shouldBeMisaligned() {
    let doc = SubtitleDocument::parse(&numbered_srt(6));
    let chunks = chunk_document(&doc, 30);
    assert!(chunks.len() > 1);

    let err = reassemble(&doc, &chunks, &[]).unwrap_err();
    assert!(matches!(err, PipelineError::Misaligned { .. }));
}
