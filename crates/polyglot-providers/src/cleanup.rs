//! Transcript cleanup — strips structural noise from model output.
//!
//! The transcription models sometimes emit timestamps, speaker labels, and
//! bracketed sound annotations despite prompt instructions to omit them. A
//! fixed, ordered sequence of removal rules scrubs these artifacts, followed
//! by whitespace collapsing.

use regex::Regex;

/// Compiled removal rules, applied in order.
pub struct TranscriptCleaner {
    rules: Vec<(Regex, &'static str)>,
    spaces: Regex,
    blank_lines: Regex,
}

impl Default for TranscriptCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptCleaner {
    pub fn new() -> Self {
        // Pattern order matters: timestamp forms go first, speaker labels and
        // ranges next, bracketed annotations last.
        let patterns: &[(&str, &str)] = &[
            // [00:01:23], [0:01], [00:01.500]
            (r"\[\d{1,2}:\d{2}(?::\d{2})?(?:[.,]\d{1,3})?\]", " "),
            // (0:01), (00:01:23)
            (r"\(\d{1,2}:\d{2}(?::\d{2})?(?:[.,]\d{1,3})?\)", " "),
            // bare timestamp opening a line: "00:01 Hello"
            (r"(?m)^\s*\d{1,2}:\d{2}(?::\d{2})?(?:[.,]\d{1,3})?\s+", ""),
            // millisecond-precision timestamps anywhere: 00:01:23.456
            (r"\d{1,2}:\d{2}:\d{2}[.,]\d{1,3}", " "),
            // speaker labels left behind once timestamps are gone
            (r"(?mi)^\s*speaker\s*\d+\s*[:\-]\s*", ""),
            // timestamp ranges: 00:01 - 00:05, [0:01-0:10]
            (
                r"\[?\d{1,2}:\d{2}(?::\d{2})?\s*-+\s*\d{1,2}:\d{2}(?::\d{2})?\]?",
                " ",
            ),
            // non-speech annotations
            (
                r"(?i)\[(?:music|applause|laughter|noise|silence|inaudible|crosstalk|background noise|sound)\]",
                " ",
            ),
            // any bracketed artifact trailing the transcript
            (r"\s*\[[^\[\]\n]*\]\s*\z", ""),
        ];

        TranscriptCleaner {
            rules: patterns
                .iter()
                .map(|(p, r)| (Regex::new(p).expect("cleanup pattern is valid"), *r))
                .collect(),
            spaces: Regex::new(r"[ \t]{2,}").expect("cleanup pattern is valid"),
            blank_lines: Regex::new(r"\n\s*\n(\s*\n)+").expect("cleanup pattern is valid"),
        }
    }

    /// Apply every rule in order, then collapse whitespace.
    pub fn clean(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (pattern, replacement) in &self.rules {
            out = pattern.replace_all(&out, *replacement).into_owned();
        }

        out = self.spaces.replace_all(&out, " ").into_owned();
        out = self.blank_lines.replace_all(&out, "\n\n").into_owned();

        out.lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

/// One-shot convenience over a freshly compiled cleaner.
pub fn clean_transcript(text: &str) -> String {
    TranscriptCleaner::new().clean(text)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracketed_timestamp_and_music_tag() {
        assert_eq!(
            clean_transcript("Hello [00:01:23] world [MUSIC]"),
            "Hello world"
        );
    }

    #[test]
    fn test_parenthesized_timestamp() {
        assert_eq!(clean_transcript("So (0:01) anyway"), "So anyway");
    }

    #[test]
    fn test_bare_leading_timestamp() {
        assert_eq!(clean_transcript("00:01 Hello there"), "Hello there");
    }

    #[test]
    fn test_millisecond_timestamp() {
        assert_eq!(
            clean_transcript("before 00:01:23.456 after"),
            "before after"
        );
    }

    #[test]
    fn test_speaker_label_with_timestamp() {
        assert_eq!(
            clean_transcript("Speaker 1 [00:12]: Good morning"),
            "Good morning"
        );
    }

    #[test]
    fn test_timestamp_range() {
        assert_eq!(
            clean_transcript("intro [0:01-0:10] then the rest"),
            "intro then the rest"
        );
    }

    #[test]
    fn test_non_speech_tokens() {
        assert_eq!(
            clean_transcript("Welcome [APPLAUSE] everyone [laughter]"),
            "Welcome everyone"
        );
    }

    #[test]
    fn test_trailing_bracketed_artifact() {
        assert_eq!(
            clean_transcript("That is all. [end of recording]"),
            "That is all."
        );
    }

    #[test]
    fn test_blank_line_collapse() {
        assert_eq!(
            clean_transcript("First line.\n\n\n\nSecond line."),
            "First line.\n\nSecond line."
        );
    }

    #[test]
    fn test_clean_text_is_untouched() {
        assert_eq!(
            clean_transcript("Plain text, no artifacts at all."),
            "Plain text, no artifacts at all."
        );
    }

    #[test]
    fn test_reusable_cleaner() {
        let cleaner = TranscriptCleaner::new();
        assert_eq!(cleaner.clean("a [0:01] b"), "a b");
        assert_eq!(cleaner.clean("c [MUSIC] d"), "c d");
    }
}
