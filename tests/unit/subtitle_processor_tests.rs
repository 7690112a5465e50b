/*!
 * Tests for SRT parsing and rendering
 */

use autosubs::subtitle_processor::{parse, render, SubtitleBlock, SubtitleDocument};
use autosubs::{SubtitleError, TranslationError};
use crate::common::SAMPLE_SRT;

#[test]
fn test_parse_withSampleFile_shouldKeepTimingAndText() {
    let doc = parse(SAMPLE_SRT).unwrap();
    let blocks: Vec<&SubtitleBlock> = doc.blocks().collect();

    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[1].sequence_label, "2");
    assert_eq!(blocks[1].timing_ms(), Some((5_000, 9_000)));
    assert_eq!(blocks[2].text, "For testing purposes.");
}

#[test]
fn test_parse_withEmptyInput_shouldFailWithNoBlocks() {
    assert_eq!(parse("").unwrap_err(), SubtitleError::NoBlocks);
    assert_eq!(parse("\n\n  \n").unwrap_err(), SubtitleError::NoBlocks);
    assert_eq!(parse("just some prose\nwithout timing").unwrap_err(), SubtitleError::NoBlocks);
}

#[test]
fn test_parse_withDotMillisAndShortFraction_shouldReadTiming() {
    let doc = parse("1\n00:00:01.5 --> 00:00:02.25\nShort\n").unwrap();
    let block = doc.blocks().next().unwrap();

    assert_eq!(block.timing_ms(), Some((1_500, 2_250)));
    // the original timing line is kept as written
    assert_eq!(render(&doc), "1\n00:00:01.5 --> 00:00:02.25\nShort\n");
}

#[test]
fn test_withTexts_shouldReplaceOnlyText() {
    let doc = parse(SAMPLE_SRT).unwrap();
    let translated = doc
        .with_texts(vec!["Un".to_string(), "Deux".to_string(), "Trois".to_string()])
        .unwrap();

    let original: Vec<_> = doc.blocks().map(|b| (&b.sequence_label, &b.time_range)).collect();
    let updated: Vec<_> = translated.blocks().map(|b| (&b.sequence_label, &b.time_range)).collect();
    assert_eq!(original, updated);
    assert_eq!(translated.texts(), vec!["Un", "Deux", "Trois"]);
}

#[test]
fn test_withTexts_withWrongCount_shouldReportMismatch() {
    let doc = parse(SAMPLE_SRT).unwrap();
    let err = doc.with_texts(vec!["only one".to_string()]).unwrap_err();

    assert_eq!(err, TranslationError::CountMismatch { expected: 3, actual: 1 });
}

#[test]
fn test_withTexts_withBlankLinesInTranslation_shouldNotSplitBlocks() {
    let doc = parse("1\n00:00:01,000 --> 00:00:02,000\nHello\n").unwrap();
    let translated = doc.with_texts(vec!["Bonjour\n\nà tous  ".to_string()]).unwrap();

    let reparsed = parse(&render(&translated)).unwrap();
    assert_eq!(reparsed.block_count(), 1);
    assert_eq!(reparsed.texts(), vec!["Bonjour\nà tous"]);
}

#[test]
fn test_fromBlocks_shouldRenderWithSingleTrailingNewline() {
    let doc = SubtitleDocument::from_blocks(vec![
        SubtitleBlock::new("1", SubtitleBlock::format_time_range(0, 1_000), "A"),
        SubtitleBlock::new("2", SubtitleBlock::format_time_range(61_001, 3_723_004), "B"),
    ]);

    assert_eq!(
        doc.render(),
        "1\n00:00:00,000 --> 00:00:01,000\nA\n\n2\n00:01:01,001 --> 01:02:03,004\nB\n"
    );
}
