use std::fmt;
use regex::Regex;
use once_cell::sync::Lazy;
use log::{debug, warn};

use crate::errors::{SubtitleError, TranslationError};

// @module: Subtitle parsing and rendering

// @const: SRT timing line, tolerant of '.' separators, 1-3 digit millis and trailing position hints
static TIME_RANGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})")
        .expect("valid time range regex")
});

// @const: Block counter line
static INDEX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\d+\s*$").expect("valid index regex")
});

const BOM: char = '\u{feff}';

// @struct: Single subtitle block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleBlock {
    // @field: Counter line exactly as it appeared (empty when the source omitted it)
    pub sequence_label: String,

    // @field: Timing line exactly as it appeared
    pub time_range: String,

    // @field: Text, physical lines joined with '\n'
    pub text: String,
}

impl SubtitleBlock {
    /// Creates a new block
    pub fn new(sequence_label: impl Into<String>, time_range: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sequence_label: sequence_label.into(),
            time_range: time_range.into(),
            text: text.into(),
        }
    }

    /// Start and end of the block in milliseconds, if the timing line is well formed
    pub fn timing_ms(&self) -> Option<(u64, u64)> {
        let caps = TIME_RANGE_REGEX.captures(&self.time_range)?;
        Some((parse_timestamp_to_ms(&caps, 1), parse_timestamp_to_ms(&caps, 5)))
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }

    /// Build a timing line from a pair of millisecond offsets
    pub fn format_time_range(start_ms: u64, end_ms: u64) -> String {
        format!("{} --> {}", Self::format_timestamp(start_ms), Self::format_timestamp(end_ms))
    }

    fn write_body(&self, out: &mut String, newline: &str) {
        if !self.sequence_label.is_empty() {
            out.push_str(&self.sequence_label);
            out.push_str(newline);
        }
        out.push_str(&self.time_range);
        if !self.text.is_empty() {
            out.push_str(newline);
            if newline == "\n" {
                out.push_str(&self.text);
            } else {
                out.push_str(&self.text.replace('\n', newline));
            }
        }
    }
}

impl fmt::Display for SubtitleBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut body = String::new();
        self.write_body(&mut body, "\n");
        writeln!(f, "{}", body)
    }
}

/// A piece of the document: either a recognised block, or lines we could not
/// classify and keep verbatim so that rendering never loses content.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Block(SubtitleBlock),
    Raw(Vec<String>),
}

/// Ordered subtitle document.
///
/// Documents are never mutated after parsing; translation produces a new
/// document through [`SubtitleDocument::with_texts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleDocument {
    segments: Vec<Segment>,
    crlf: bool,
    bom: bool,
    trailing_newlines: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    ExpectIndex,
    ExpectTimeRange,
    ExpectText,
    // Inside a malformed run; everything up to the next blank line is kept verbatim
    Skipping,
}

impl SubtitleDocument {
    /// Build a document directly from blocks, using '\n' line endings and a
    /// single trailing newline.
    pub fn from_blocks(blocks: Vec<SubtitleBlock>) -> Self {
        Self {
            segments: blocks.into_iter().map(Segment::Block).collect(),
            crlf: false,
            bom: false,
            trailing_newlines: 1,
        }
    }

    /// Parse raw subtitle text.
    ///
    /// Parsing is tolerant: lines that fit neither the counter nor the timing
    /// shape are kept as raw segments and re-emitted by [`render`](Self::render).
    /// Only input without a single recognisable block is rejected.
    pub fn parse(raw: &str) -> Result<Self, SubtitleError> {
        let bom = raw.starts_with(BOM);
        let content = raw.strip_prefix(BOM).unwrap_or(raw);
        let crlf = content.contains("\r\n");

        let lines: Vec<&str> = content
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .collect();

        let last_content = lines.iter().rposition(|l| !l.trim().is_empty());
        let trailing_newlines = match last_content {
            Some(pos) => lines.len() - 1 - pos,
            None => 0,
        };
        let lines = match last_content {
            Some(pos) => &lines[..=pos],
            None => &lines[..0],
        };

        let mut segments = Vec::new();
        let mut state = ParseState::ExpectIndex;
        let mut label = String::new();
        let mut time_range = String::new();
        let mut text_lines: Vec<&str> = Vec::new();
        let mut raw_lines: Vec<String> = Vec::new();

        for (line_no, line) in lines.iter().enumerate() {
            let blank = line.trim().is_empty();

            match state {
                ParseState::ExpectIndex => {
                    if blank {
                        continue;
                    }
                    if INDEX_REGEX.is_match(line) {
                        label = line.to_string();
                        state = ParseState::ExpectTimeRange;
                    } else if TIME_RANGE_REGEX.is_match(line) {
                        // Counter omitted; keep the block and render it without one
                        label.clear();
                        time_range = line.to_string();
                        state = ParseState::ExpectText;
                    } else {
                        debug!("Unrecognised line {} kept verbatim: {}", line_no + 1, line);
                        raw_lines.push(line.to_string());
                        state = ParseState::Skipping;
                    }
                }
                ParseState::ExpectTimeRange => {
                    if blank {
                        segments.push(Segment::Raw(vec![std::mem::take(&mut label)]));
                        state = ParseState::ExpectIndex;
                    } else if TIME_RANGE_REGEX.is_match(line) {
                        time_range = line.to_string();
                        state = ParseState::ExpectText;
                    } else {
                        debug!("Missing timing at line {}, block kept verbatim", line_no + 1);
                        raw_lines.push(std::mem::take(&mut label));
                        raw_lines.push(line.to_string());
                        state = ParseState::Skipping;
                    }
                }
                ParseState::ExpectText => {
                    // A whitespace-only line is cue text unless a new block follows it
                    let ends_block = line.is_empty()
                        || (blank
                            && lines.get(line_no + 1).map_or(true, |next| {
                                next.trim().is_empty() || INDEX_REGEX.is_match(next) || TIME_RANGE_REGEX.is_match(next)
                            }));
                    if ends_block {
                        segments.push(Segment::Block(SubtitleBlock::new(
                            std::mem::take(&mut label),
                            std::mem::take(&mut time_range),
                            text_lines.join("\n"),
                        )));
                        text_lines.clear();
                        state = ParseState::ExpectIndex;
                    } else {
                        text_lines.push(line);
                    }
                }
                ParseState::Skipping => {
                    if blank {
                        segments.push(Segment::Raw(std::mem::take(&mut raw_lines)));
                        state = ParseState::ExpectIndex;
                    } else {
                        raw_lines.push(line.to_string());
                    }
                }
            }
        }

        match state {
            ParseState::ExpectIndex => {}
            ParseState::ExpectTimeRange => segments.push(Segment::Raw(vec![label])),
            ParseState::ExpectText => segments.push(Segment::Block(SubtitleBlock::new(
                label,
                time_range,
                text_lines.join("\n"),
            ))),
            ParseState::Skipping => segments.push(Segment::Raw(raw_lines)),
        }

        let document = Self {
            segments,
            crlf,
            bom,
            trailing_newlines,
        };

        if document.block_count() == 0 {
            warn!("No valid subtitle blocks found in content");
            return Err(SubtitleError::NoBlocks);
        }

        let raw_count = document.segments.len() - document.block_count();
        if raw_count > 0 {
            warn!("Kept {} unrecognised segment(s) verbatim", raw_count);
        }

        Ok(document)
    }

    /// Render the document back to text, one blank line between segments
    pub fn render(&self) -> String {
        let newline = if self.crlf { "\r\n" } else { "\n" };
        let mut out = String::new();

        if self.bom {
            out.push(BOM);
        }

        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push_str(newline);
                out.push_str(newline);
            }
            match segment {
                Segment::Block(block) => block.write_body(&mut out, newline),
                Segment::Raw(lines) => out.push_str(&lines.join(newline)),
            }
        }

        for _ in 0..self.trailing_newlines {
            out.push_str(newline);
        }

        out
    }

    /// Iterate over recognised blocks in document order
    pub fn blocks(&self) -> impl Iterator<Item = &SubtitleBlock> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Block(block) => Some(block),
            Segment::Raw(_) => None,
        })
    }

    /// Number of recognised blocks
    pub fn block_count(&self) -> usize {
        self.blocks().count()
    }

    /// Block texts in document order
    pub fn texts(&self) -> Vec<String> {
        self.blocks().map(|b| b.text.clone()).collect()
    }

    /// Produce a new document with every block's text replaced, in order.
    ///
    /// Counter and timing lines, raw segments and layout are copied unchanged.
    pub fn with_texts(&self, texts: Vec<String>) -> Result<Self, TranslationError> {
        let expected = self.block_count();
        if texts.len() != expected {
            return Err(TranslationError::CountMismatch {
                expected,
                actual: texts.len(),
            });
        }

        let mut texts = texts.into_iter();
        let segments = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Block(block) => {
                    let mut translated = block.clone();
                    if let Some(text) = texts.next() {
                        translated.text = normalize_text(&text);
                    }
                    Segment::Block(translated)
                }
                Segment::Raw(lines) => Segment::Raw(lines.clone()),
            })
            .collect();

        Ok(Self {
            segments,
            crlf: self.crlf,
            bom: self.bom,
            trailing_newlines: self.trailing_newlines,
        })
    }
}

/// Parse raw subtitle text into a document
pub fn parse(raw: &str) -> Result<SubtitleDocument, SubtitleError> {
    SubtitleDocument::parse(raw)
}

/// Render a document back to subtitle text
pub fn render(document: &SubtitleDocument) -> String {
    document.render()
}

// A translated text must not contain blank lines, or it would split its block in two
fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .split('\n')
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_timestamp_to_ms(caps: &regex::Captures, start_idx: usize) -> u64 {
    let field = |offset: usize| -> u64 {
        caps.get(start_idx + offset)
            .map_or(0, |m| m.as_str().parse().unwrap_or(0))
    };
    let millis_match = caps.get(start_idx + 3).map_or("0", |m| m.as_str());
    // "1,5" means 500ms, not 5ms
    let millis = field(3) * 10u64.pow(3u32.saturating_sub(millis_match.len() as u32));

    (field(0) * 3600 + field(1) * 60 + field(2)) * 1000 + millis
}

impl fmt::Display for SubtitleDocument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}
