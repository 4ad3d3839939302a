//! Subtitle data model and the SRT codec.
//!
//! Sequence numbers are never stored from input: a segment's index is its
//! position in the owning [`SubtitleDocument`] plus one, regenerated whenever
//! a document is built or encoded.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, SubweaveError};
use crate::paths::write_atomic;
use crate::timecode::{parse_timestamp, seconds_to_timestamp};

static TIME_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\S+)\s+-->\s+(\S+)\s*$").expect("time range pattern is valid")
});

/// ISO-639 language code. Compared case-sensitively, never normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    /// Codes end up in file names, so only ASCII letters, digits, `-` and `_` are accepted.
    pub fn new<S: Into<String>>(code: S) -> Result<Self> {
        let code = code.into();
        let valid = !code.is_empty()
            && code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SubweaveError::Config(format!("Invalid language code '{}'", code)));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LanguageCode {
    type Err = SubweaveError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = SubweaveError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<LanguageCode> for String {
    fn from(code: LanguageCode) -> Self {
        code.0
    }
}

impl AsRef<str> for LanguageCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One timed cue.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedSegment {
    index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl TimedSegment {
    /// Build a segment. Text lines are trimmed and blank lines dropped, since
    /// a blank line would terminate an SRT block.
    pub fn new<S: AsRef<str>>(start: f64, end: f64, text: S) -> Result<Self> {
        if !start.is_finite() || start < 0.0 {
            return Err(SubweaveError::InvalidTimecode(format!("segment start {}", start)));
        }
        if !end.is_finite() || end < start {
            return Err(SubweaveError::InvalidTimecode(format!(
                "segment end {} precedes start {}",
                end, start
            )));
        }
        Ok(Self {
            index: 0,
            start,
            end,
            text: normalize_text(text.as_ref()),
        })
    }

    /// 1-based sequence number within the owning document.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Ordered segments tagged with the language of their text.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleDocument {
    language: LanguageCode,
    segments: Vec<TimedSegment>,
}

impl SubtitleDocument {
    /// Segments must be ordered by non-decreasing start time.
    pub fn new(language: LanguageCode, mut segments: Vec<TimedSegment>) -> Result<Self> {
        for (position, pair) in segments.windows(2).enumerate() {
            if pair[1].start < pair[0].start {
                return Err(SubweaveError::MalformedSubtitle(format!(
                    "segment {} starts at {}s, before segment {} at {}s",
                    position + 2,
                    pair[1].start,
                    position + 1,
                    pair[0].start
                )));
            }
        }
        for (position, segment) in segments.iter_mut().enumerate() {
            segment.index = position + 1;
        }
        Ok(Self { language, segments })
    }

    pub fn from_srt(text: &str, language: LanguageCode) -> Result<Self> {
        Self::new(language, decode(text)?)
    }

    pub fn language(&self) -> &LanguageCode {
        &self.language
    }

    pub fn segments(&self) -> &[TimedSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn texts(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.text.clone()).collect()
    }

    /// New document in `language` carrying this document's timings with
    /// `texts` substituted position by position. `self` is left untouched.
    pub fn with_texts(&self, language: LanguageCode, texts: Vec<String>) -> Result<Self> {
        if texts.len() != self.segments.len() {
            return Err(SubweaveError::TranslationCountMismatch {
                expected: self.segments.len(),
                actual: texts.len(),
            });
        }
        let segments = self
            .segments
            .iter()
            .zip(texts)
            .map(|(original, text)| TimedSegment::new(original.start, original.end, text))
            .collect::<Result<Vec<_>>>()?;
        Self::new(language, segments)
    }

    pub fn to_srt(&self) -> Result<String> {
        encode(self)
    }

    /// Write the encoded document. Nothing is written unless encoding succeeds.
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_srt()?;
        write_atomic(path, content).await?;
        info!(
            "Wrote {} subtitle segments ({}) to {}",
            self.len(),
            self.language,
            path.display()
        );
        Ok(())
    }

    pub async fn load<P: AsRef<Path>>(path: P, language: LanguageCode) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let document = Self::from_srt(&content, language).map_err(|e| match e {
            SubweaveError::MalformedSubtitle(msg) => {
                SubweaveError::MalformedSubtitle(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        debug!("Loaded {} segments from {}", document.len(), path.display());
        Ok(document)
    }
}

/// Encode a document as SRT. Every block, including the last, ends with a blank line.
pub fn encode(document: &SubtitleDocument) -> Result<String> {
    let mut srt = String::new();
    for (position, segment) in document.segments.iter().enumerate() {
        srt.push_str(&format!(
            "{}\n{} --> {}\n",
            position + 1,
            seconds_to_timestamp(segment.start)?,
            seconds_to_timestamp(segment.end)?
        ));
        let text = segment.text.trim();
        if !text.is_empty() {
            srt.push_str(text);
            srt.push('\n');
        }
        srt.push('\n');
    }
    Ok(srt)
}

/// Decode SRT text into segments in block order. Input sequence numbers are ignored.
pub fn decode(text: &str) -> Result<Vec<TimedSegment>> {
    let text = text.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let mut segments = Vec::new();
    for (position, block) in blocks(&text).into_iter().enumerate() {
        segments.push(parse_block(&block, position + 1)?);
    }
    Ok(segments)
}

fn parse_block(lines: &[&str], ordinal: usize) -> Result<TimedSegment> {
    let range = lines.get(1).ok_or_else(|| {
        SubweaveError::MalformedSubtitle(format!("block {} has no timestamp line", ordinal))
    })?;
    let caps = TIME_RANGE.captures(range).ok_or_else(|| {
        SubweaveError::MalformedSubtitle(format!(
            "block {}: expected 'HH:MM:SS,mmm --> HH:MM:SS,mmm', found '{}'",
            ordinal, range
        ))
    })?;

    let malformed = |e: SubweaveError| SubweaveError::MalformedSubtitle(format!("block {}: {}", ordinal, e));
    let start = parse_timestamp(&caps[1]).map_err(malformed)?;
    let end = parse_timestamp(&caps[2]).map_err(malformed)?;

    TimedSegment::new(start, end, lines[2..].join("\n")).map_err(malformed)
}

/// Frame segment texts for a translation backend: numbered, blank-line
/// separated blocks with no timestamps. Texts never contain blank lines, so
/// the separator cannot occur inside a part.
pub fn frame_texts(texts: &[String]) -> String {
    let mut framed = String::new();
    for (position, text) in texts.iter().enumerate() {
        framed.push_str(&format!("{}\n", position + 1));
        let text = normalize_text(text);
        if !text.is_empty() {
            framed.push_str(&text);
            framed.push('\n');
        }
        framed.push('\n');
    }
    framed
}

/// Split a translated block produced from [`frame_texts`] back into parts.
/// The caller checks the part count.
pub fn unframe_texts(framed: &str) -> Vec<String> {
    let framed = framed.replace("\r\n", "\n");
    blocks(&framed)
        .into_iter()
        .map(|block| {
            let body = match block.first() {
                Some(first) if first.trim().parse::<usize>().is_ok() => &block[1..],
                _ => &block[..],
            };
            normalize_text(&body.join("\n"))
        })
        .collect()
}

fn blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn normalize_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lc(code: &str) -> LanguageCode {
        LanguageCode::new(code).unwrap()
    }

    fn hello_world() -> SubtitleDocument {
        SubtitleDocument::new(
            lc("en"),
            vec![
                TimedSegment::new(0.0, 1.5, "Hello").unwrap(),
                TimedSegment::new(1.5, 3.0, "World").unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn encodes_blocks_with_trailing_blank_line() {
        assert_eq!(
            encode(&hello_world()).unwrap(),
            "1\n00:00:00,000 --> 00:00:01,500\nHello\n\n2\n00:00:01,500 --> 00:00:03,000\nWorld\n\n"
        );
    }

    #[test]
    fn decode_renumbers_and_keeps_text() {
        let srt = "7\n00:00:00,000 --> 00:00:01,500\n  Hello \nthere\n\n\n42\n00:00:01,500 --> 00:00:03,000 \nWorld\n";
        let document = SubtitleDocument::from_srt(srt, lc("en")).unwrap();
        assert_eq!(document.len(), 2);
        assert_eq!(document.segments()[0].index(), 1);
        assert_eq!(document.segments()[0].text, "Hello\nthere");
        assert_eq!(document.segments()[1].index(), 2);
        assert_eq!(document.segments()[1].start, 1.5);
        assert_eq!(document.segments()[1].end, 3.0);
    }

    #[test]
    fn decode_handles_crlf_and_bom() {
        let srt = "\u{feff}1\r\n00:00:00,000 --> 00:00:01,000\r\nHi\r\n\r\n";
        let segments = decode(srt).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "Hi");
    }

    #[test]
    fn encode_decode_round_trip() {
        let document = SubtitleDocument::new(
            lc("ja"),
            vec![
                TimedSegment::new(0.25, 1.0, "こんにちは").unwrap(),
                TimedSegment::new(1.0, 1.0, "").unwrap(),
                TimedSegment::new(3725.042, 3730.5, "two\nlines").unwrap(),
            ],
        )
        .unwrap();
        let decoded = SubtitleDocument::from_srt(&encode(&document).unwrap(), lc("ja")).unwrap();
        assert_eq!(decoded, document);
    }

    #[test]
    fn missing_timestamp_line_is_malformed() {
        let err = decode("1\nHello\n\n").unwrap_err();
        assert!(matches!(err, SubweaveError::MalformedSubtitle(_)));

        let err = decode("1\n\n").unwrap_err();
        assert!(matches!(err, SubweaveError::MalformedSubtitle(_)));
    }

    #[test]
    fn unparseable_timestamp_is_malformed() {
        let err = decode("1\n00:00:00.000 --> 00:00:01,000\nHello\n").unwrap_err();
        assert!(matches!(err, SubweaveError::MalformedSubtitle(_)));

        let err = decode("1\n00:00:02,000 --> 00:00:01,000\nBackwards\n").unwrap_err();
        assert!(matches!(err, SubweaveError::MalformedSubtitle(_)));

        let err = decode("1\n99999999999999999:00:00,000 --> 99999999999999999:00:01,000\nForever\n").unwrap_err();
        assert!(matches!(err, SubweaveError::MalformedSubtitle(_)));
    }

    #[test]
    fn rejects_out_of_order_segments() {
        let err = SubtitleDocument::new(
            lc("en"),
            vec![
                TimedSegment::new(2.0, 3.0, "b").unwrap(),
                TimedSegment::new(1.0, 2.0, "a").unwrap(),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, SubweaveError::MalformedSubtitle(_)));
    }

    #[test]
    fn with_texts_keeps_timing_and_original() {
        let original = hello_world();
        let translated = original
            .with_texts(lc("fr"), vec!["Bonjour".into(), "Monde".into()])
            .unwrap();
        assert_eq!(translated.language(), &lc("fr"));
        assert_eq!(translated.texts(), vec!["Bonjour", "Monde"]);
        assert_eq!(translated.segments()[1].start, 1.5);
        assert_eq!(translated.segments()[1].end, 3.0);
        assert_eq!(original.texts(), vec!["Hello", "World"]);

        let err = original.with_texts(lc("fr"), vec!["Bonjour".into()]).unwrap_err();
        assert!(matches!(
            err,
            SubweaveError::TranslationCountMismatch { expected: 2, actual: 1 }
        ));
    }

    #[test]
    fn framing_round_trip() {
        let texts = vec!["Hello".to_string(), String::new(), "a\n\nb".to_string(), "42".to_string()];
        let framed = frame_texts(&texts);
        assert!(!framed.contains("-->"));
        assert_eq!(unframe_texts(&framed), vec!["Hello", "", "a\nb", "42"]);
    }

    #[test]
    fn language_code_rejects_path_characters() {
        assert!(LanguageCode::new("pt-BR").is_ok());
        assert!(LanguageCode::new("").is_err());
        assert!(LanguageCode::new("../en").is_err());
        assert_ne!(lc("EN"), lc("en"));
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.en-sub.srt");
        let document = hello_world();
        document.save(&path).await.unwrap();
        let loaded = SubtitleDocument::load(&path, lc("en")).await.unwrap();
        assert_eq!(loaded, document);
    }
}
