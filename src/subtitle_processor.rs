use std::fmt;
use regex::Regex;
use once_cell::sync::Lazy;
use log::{debug, warn};

// @module: Subtitle parsing and serialization

// @const: Token that marks a timing line
pub const TIME_RANGE_SEPARATOR: &str = "-->";

// @const: Blank-line separator between cues (tolerates whitespace-only lines)
static BLOCK_SEPARATOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\n(?:[ \t]*\n)+").unwrap()
});

// @const: WebVTT timestamp, hours optional
static VTT_TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:(\d{1,2}):)?(\d{2}):(\d{2})\.(\d{3})").unwrap()
});

/// One subtitle cue: optional index, optional timing line, and its text
///
/// `time_range` is kept verbatim; it is only ever detected, never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    /// Sequence number as it appeared in the source
    pub sequence_index: Option<String>,

    /// Timing line as it appeared in the source
    pub time_range: Option<String>,

    /// Dialogue lines
    pub text_lines: Vec<String>,
}

impl Block {
    /// Create a cue with a timing line and text
    pub fn new(sequence_index: Option<&str>, time_range: Option<&str>, text_lines: &[&str]) -> Self {
        Block {
            sequence_index: sequence_index.map(str::to_string),
            time_range: time_range.map(str::to_string),
            text_lines: text_lines.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// A block without text is kept only for document shape
    pub fn is_structural(&self) -> bool {
        self.text_lines.is_empty()
    }

    /// Text lines joined by line breaks, the unit handed to the chunker
    pub fn joined_text(&self) -> String {
        self.text_lines.join("\n")
    }
}

/// Ordered sequence of blocks
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubtitleDocument {
    /// Blocks in input order
    pub blocks: Vec<Block>,
}

impl SubtitleDocument {
    /// Create a document from blocks
    pub fn new(blocks: Vec<Block>) -> Self {
        SubtitleDocument { blocks }
    }

    /// Parse raw SRT or WebVTT text
    ///
    /// Never fails: input without any timed cue yields an empty document.
    pub fn parse(raw: &str) -> Self {
        let mut text = normalize_line_endings(raw);
        if let Some(stripped) = text.strip_prefix('\u{feff}') {
            text = stripped.to_string();
        }

        if is_webvtt(&text) {
            text = webvtt_to_srt_text(&text);
        }

        let trimmed = text.trim_matches(|c: char| c == '\n' || c == ' ' || c == '\t');
        if trimmed.is_empty() {
            debug!("Subtitle input is empty");
            return Self::default();
        }

        let blocks: Vec<Block> = BLOCK_SEPARATOR_REGEX
            .split(trimmed)
            .filter(|segment| !segment.trim().is_empty())
            .map(parse_segment)
            .collect();

        if !blocks.iter().any(|b| b.time_range.is_some()) {
            warn!("No timed cue found in {} segment(s), treating input as empty", blocks.len());
            return Self::default();
        }

        debug!("Parsed {} block(s), {} structural", blocks.len(),
               blocks.iter().filter(|b| b.is_structural()).count());

        SubtitleDocument { blocks }
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the document holds nothing to translate or emit
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Serialize to SRT, renumbering every indexed or timed block from 1
    pub fn to_srt(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SubtitleDocument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut next_index = 1usize;
        let mut first = true;

        for block in &self.blocks {
            if !first {
                writeln!(f)?;
            }
            first = false;

            // Source indices may repeat or skip, so they are never written back
            if block.time_range.is_some() || block.sequence_index.is_some() {
                writeln!(f, "{}", next_index)?;
                next_index += 1;
            }

            if let Some(range) = &block.time_range {
                writeln!(f, "{}", range)?;
            }

            for line in &block.text_lines {
                writeln!(f, "{}", line)?;
            }
        }

        Ok(())
    }
}

/// Collapse CRLF and lone CR into LF
pub fn normalize_line_endings(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

/// Whether the text starts with a WebVTT header token
pub fn is_webvtt(text: &str) -> bool {
    text.trim_start().starts_with("WEBVTT")
}

/// Drop the WebVTT header, NOTE/STYLE/REGION sections and cue identifiers,
/// and rewrite timing lines in SRT form
fn webvtt_to_srt_text(text: &str) -> String {
    let body = text.trim_start();
    let mut segments = BLOCK_SEPARATOR_REGEX.split(body);

    // The header segment may run straight into the first cue
    let header = segments.next().unwrap_or_default();
    let header_lines: Vec<&str> = header.lines().collect();
    let leading_cue = header_lines
        .iter()
        .position(|l| l.contains(TIME_RANGE_SEPARATOR))
        .map(|pos| header_lines[pos..].join("\n"));

    let mut converted = Vec::new();
    for segment in leading_cue.iter().map(String::as_str).chain(segments) {
        let first_line = segment.lines().next().unwrap_or("").trim();
        if first_line.starts_with("NOTE") || first_line == "STYLE" || first_line == "REGION" {
            continue;
        }

        let lines: Vec<&str> = segment.lines().collect();
        let timing_pos = lines.iter().position(|l| l.contains(TIME_RANGE_SEPARATOR));
        let mut out: Vec<String> = Vec::with_capacity(lines.len());

        for (i, line) in lines.iter().enumerate() {
            match timing_pos {
                // Cue identifier before the timing line; numeric ones survive as indices
                Some(pos) if i < pos => {
                    if line.trim().chars().all(|c| c.is_ascii_digit()) && !line.trim().is_empty() {
                        out.push(line.trim().to_string());
                    }
                },
                Some(pos) if i == pos => out.push(convert_vtt_timing_line(line)),
                _ => out.push(line.to_string()),
            }
        }

        converted.push(out.join("\n"));
    }

    converted.join("\n\n")
}

/// Rewrite `00:01.000 --> 00:02.500 align:start` as `00:00:01,000 --> 00:00:02,500`
fn convert_vtt_timing_line(line: &str) -> String {
    let stamps: Vec<String> = VTT_TIMESTAMP_REGEX
        .captures_iter(line)
        .take(2)
        .map(|caps| {
            let hours: u32 = caps.get(1).map_or(0, |m| m.as_str().parse().unwrap_or(0));
            format!("{:02}:{}:{},{}", hours, &caps[2], &caps[3], &caps[4])
        })
        .collect();

    if stamps.len() == 2 {
        format!("{} {} {}", stamps[0], TIME_RANGE_SEPARATOR, stamps[1])
    } else {
        line.trim().to_string()
    }
}

/// Split one blank-line delimited segment into index, timing and text
fn parse_segment(segment: &str) -> Block {
    let mut lines = segment.split('\n').peekable();
    let mut block = Block::default();

    if let Some(first) = lines.peek() {
        let candidate = first.trim();
        if !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_digit()) {
            block.sequence_index = Some(candidate.to_string());
            lines.next();
        }
    }

    if let Some(next) = lines.peek() {
        if next.contains(TIME_RANGE_SEPARATOR) {
            block.time_range = Some(next.trim().to_string());
            lines.next();
        }
    }

    block.text_lines = lines
        .map(|l| l.trim_end().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    block
}
