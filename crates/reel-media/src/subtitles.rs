//! SRT cue text reflow.
//!
//! Burned-in subtitles must fit the frame, so each cue's text is re-wrapped
//! to at most `MAX_LINES` lines of about `MAX_LINE_CHARS` characters. Word
//! order is preserved and no word is dropped or split.

use std::path::Path;

use tokio::fs;
use tracing::debug;

use crate::error::MediaResult;

/// Target maximum characters per subtitle line.
pub const MAX_LINE_CHARS: usize = 45;

/// Maximum lines per cue.
pub const MAX_LINES: usize = 2;

/// A parsed cue block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleCue {
    /// Cue index line, kept verbatim
    pub index: String,
    /// Timecode line (`00:00:01,000 --> 00:00:02,000`), kept verbatim
    pub timecode: String,
    /// Text lines
    pub lines: Vec<String>,
}

impl SubtitleCue {
    /// Cue with its text reflowed.
    pub fn reflowed(&self) -> Self {
        Self {
            index: self.index.clone(),
            timecode: self.timecode.clone(),
            lines: wrap_cue_text(&self.lines.join(" ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Cue(SubtitleCue),
    Other(Vec<String>),
}

/// Greedily wrap cue text, then fold to at most two lines.
///
/// When the greedy pass yields more than two lines, the list of lines is
/// split at `ceil(n / 2)` and each half is joined with spaces. Empty text
/// yields a single empty line.
pub fn wrap_cue_text(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if !current.is_empty() && current_len + 1 + word_len > MAX_LINE_CHARS {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }

    if lines.len() > MAX_LINES {
        let mid = lines.len().div_ceil(2);
        let second = lines.split_off(mid);
        lines = vec![lines.join(" "), second.join(" ")];
    }

    lines
}

fn parse_blocks(input: &str) -> Vec<Block> {
    let text = input.strip_prefix('\u{feff}').unwrap_or(input);

    let mut blocks = Vec::new();
    let mut current: Vec<String> = Vec::new();

    let mut flush = |current: &mut Vec<String>| {
        if current.is_empty() {
            return;
        }
        let lines = std::mem::take(current);
        if lines.len() >= 3 {
            blocks.push(Block::Cue(SubtitleCue {
                index: lines[0].clone(),
                timecode: lines[1].clone(),
                lines: lines[2..].to_vec(),
            }));
        } else {
            blocks.push(Block::Other(lines));
        }
    };

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            flush(&mut current);
        } else {
            current.push(line.to_string());
        }
    }
    flush(&mut current);

    blocks
}

/// Reflow every cue of an SRT document.
///
/// Blocks with fewer than three lines are passed through unchanged.
pub fn sanitize_srt(input: &str) -> String {
    let rendered: Vec<String> = parse_blocks(input)
        .into_iter()
        .map(|block| match block {
            Block::Cue(cue) => {
                let cue = cue.reflowed();
                let mut lines = vec![cue.index, cue.timecode];
                lines.extend(cue.lines);
                lines.join("\n")
            }
            Block::Other(lines) => lines.join("\n"),
        })
        .collect();

    let mut out = rendered.join("\n\n");
    out.push('\n');
    out
}

/// Parse the cue blocks of an SRT document (other blocks are skipped).
pub fn parse_cues(input: &str) -> Vec<SubtitleCue> {
    parse_blocks(input)
        .into_iter()
        .filter_map(|block| match block {
            Block::Cue(cue) => Some(cue),
            Block::Other(_) => None,
        })
        .collect()
}

/// Read `input`, reflow its cues and write the result to `output`.
///
/// Returns the number of cues written.
pub async fn sanitize_subtitle_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<usize> {
    let input = input.as_ref();
    let output = output.as_ref();

    let raw = fs::read(input).await?;
    let text = String::from_utf8_lossy(&raw);
    let sanitized = sanitize_srt(&text);
    let cues = parse_cues(&sanitized).len();

    fs::write(output, sanitized).await?;
    debug!(
        input = %input.display(),
        output = %output.display(),
        cues = cues,
        "Sanitized subtitle file"
    );
    Ok(cues)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_single_short_word() {
        assert_eq!(wrap_cue_text("abcdefghij"), vec!["abcdefghij"]);
    }

    #[test]
    fn test_empty_text_yields_one_empty_line() {
        assert_eq!(wrap_cue_text(""), vec![String::new()]);
        assert_eq!(wrap_cue_text("   \t "), vec![String::new()]);
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(wrap_cue_text("  hello    world  "), vec!["hello world"]);
    }

    #[test]
    fn test_two_line_wrap() {
        let text = "The quick brown fox jumps over the lazy dog while the sun sets slowly";
        let lines = wrap_cue_text(text);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].chars().count() <= MAX_LINE_CHARS);
        assert_eq!(words(&lines.join(" ")), words(text));
    }

    #[test]
    fn test_more_than_two_lines_split_at_midpoint() {
        // 5 greedy lines of exactly 45 chars each
        let line = "x".repeat(MAX_LINE_CHARS);
        let text = vec![line.clone(); 5].join(" ");
        let lines = wrap_cue_text(&text);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], vec![line.clone(); 3].join(" "));
        assert_eq!(lines[1], vec![line; 2].join(" "));
    }

    #[test]
    fn test_overlong_word_kept_whole() {
        let word = "y".repeat(60);
        assert_eq!(wrap_cue_text(&word), vec![word]);
    }

    #[test]
    fn test_words_preserved_in_order() {
        let samples = [
            "one",
            "a b c d e f g h i j k l m n o p q r s t u v w x y z",
            "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis nostrud exercitation ullamco laboris.",
            "ação coração não são palavras acentuadas que também contam como caracteres únicos",
        ];

        for sample in samples {
            let lines = wrap_cue_text(sample);
            assert!(lines.len() <= MAX_LINES, "too many lines for {sample:?}");
            assert_eq!(words(&lines.join(" ")), words(sample));
        }
    }

    #[test]
    fn test_sanitize_srt_document() {
        let input = "\u{feff}1\r\n00:00:00,000 --> 00:00:02,000\r\nHello there,\r\nthis line was split   by an author\r\n\r\n2\r\n00:00:02,000 --> 00:00:04,000\r\nShort\r\n\r\n\r\nstray\r\n";
        let output = sanitize_srt(input);

        assert_eq!(
            output,
            "1\n00:00:00,000 --> 00:00:02,000\nHello there, this line was split by an author\n\n2\n00:00:02,000 --> 00:00:04,000\nShort\n\nstray\n"
        );

        let cues = parse_cues(&output);
        assert_eq!(cues.len(), 2);
        assert!(cues.iter().all(|c| c.lines.len() <= MAX_LINES));
    }

    #[tokio::test]
    async fn test_sanitize_subtitle_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.srt");
        let output = dir.path().join("out.srt");
        let long = "palavra ".repeat(30);
        tokio::fs::write(&input, format!("1\n00:00:00,000 --> 00:00:03,000\n{}\n", long))
            .await
            .unwrap();

        let count = sanitize_subtitle_file(&input, &output).await.unwrap();
        assert_eq!(count, 1);

        let written = tokio::fs::read_to_string(&output).await.unwrap();
        let cue = &parse_cues(&written)[0];
        assert_eq!(cue.lines.len(), 2);
        assert_eq!(words(&cue.lines.join(" ")), words(&long));
    }
}
