/*!
 * Tests for subtitle parsing and rendering
 */

use autotranslate::subtitle_processor::{SubtitleDocument, is_webvtt, normalize_line_endings};

use crate::common::{SAMPLE_SRT, numbered_srt};

#[test]
fn test_parse_withSampleFile_shouldKeepEveryCue() {
    let doc = SubtitleDocument::parse(SAMPLE_SRT);

    assert_eq!(doc.len(), 3);
    assert_eq!(doc.blocks[1].text_lines, vec!["It contains multiple entries."]);
    assert_eq!(doc.blocks[2].time_range.as_deref(), Some("00:00:10,000 --> 00:00:14,000"));
}

#[test]
fn test_render_withParsedFile_shouldReproduceInput() {
    let raw = numbered_srt(25);
    assert_eq!(SubtitleDocument::parse(&raw).to_srt(), raw);
}

#[test]
fn test_parse_withExtraBlankLines_shouldNotCreateEmptyBlocks() {
    let raw = "\n\n1\n00:00:01,000 --> 00:00:02,000\nFirst\n\n\n\n2\n00:00:03,000 --> 00:00:04,000\nSecond\n\n\n";
    let doc = SubtitleDocument::parse(raw);

    assert_eq!(doc.len(), 2);
    assert_eq!(doc.blocks[1].text_lines, vec!["Second"]);
}

#[test]
fn test_parse_withMultilineCue_shouldKeepLineBreaks() {
    let raw = "1\n00:00:01,000 --> 00:00:02,000\n- Who's there?\n- Nobody.\n";
    let doc = SubtitleDocument::parse(raw);

    assert_eq!(doc.blocks[0].joined_text(), "- Who's there?\n- Nobody.");
    assert_eq!(doc.to_srt(), raw);
}

#[test]
fn test_parse_withoutIndices_shouldRenumberOnRender() {
    let raw = "00:00:01,000 --> 00:00:02,000\nA\n\n00:00:03,000 --> 00:00:04,000\nB\n";
    let doc = SubtitleDocument::parse(raw);

    assert_eq!(doc.len(), 2);
    assert_eq!(doc.blocks[0].sequence_index, None);
    assert_eq!(doc.to_srt(), "1\n00:00:01,000 --> 00:00:02,000\nA\n\n2\n00:00:03,000 --> 00:00:04,000\nB\n");
}

#[test]
fn test_helpers_shouldDetectFormatAndLineEndings() {
    assert!(is_webvtt("  WEBVTT\n\n00:01.000 --> 00:02.000\nHi"));
    assert!(!is_webvtt(SAMPLE_SRT));
    assert_eq!(normalize_line_endings("a\r\nb\rc"), "a\nb\nc");
}
