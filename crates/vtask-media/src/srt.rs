//! SRT subtitle parsing and formatting.
//!
//! Parsing is lenient: whisper.cpp and LLM rewrites both produce SRT that
//! is not always byte-perfect (CRLF line endings, missing trailing blank
//! line, stray whitespace). Timings are kept as the raw `HH:MM:SS,mmm`
//! strings so a round trip never changes them.

use crate::error::{MediaError, MediaResult};

/// One subtitle cue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleCue {
    pub index: u32,
    /// Start time, `HH:MM:SS,mmm`
    pub start: String,
    /// End time, `HH:MM:SS,mmm`
    pub end: String,
    /// Cue text, possibly spanning several lines
    pub text: String,
}

impl SubtitleCue {
    /// Start time in milliseconds.
    pub fn start_ms(&self) -> MediaResult<u64> {
        parse_srt_time(&self.start)
    }

    /// End time in milliseconds.
    pub fn end_ms(&self) -> MediaResult<u64> {
        parse_srt_time(&self.end)
    }
}

/// Parse SRT text into cues.
///
/// Empty or whitespace-only input is an empty cue list. Any other input
/// without a single cue is rejected.
pub fn parse(text: &str) -> MediaResult<Vec<SubtitleCue>> {
    let normalized = text.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    if normalized.trim().is_empty() {
        return Ok(Vec::new());
    }
    let lines: Vec<&str> = normalized.lines().collect();

    let mut cues: Vec<SubtitleCue> = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim();

        let timing = if let Some(next) = lines.get(i + 1) {
            line.parse::<u32>().ok().and_then(|idx| parse_timing(next).map(|t| (idx, t)))
        } else {
            None
        };

        match timing {
            Some((index, (start, end))) => {
                cues.push(SubtitleCue {
                    index,
                    start,
                    end,
                    text: String::new(),
                });
                i += 2;
            }
            None => {
                if let Some(cue) = cues.last_mut() {
                    if !cue.text.is_empty() || !line.is_empty() {
                        cue.text.push_str(lines[i].trim_end());
                        cue.text.push('\n');
                    }
                }
                i += 1;
            }
        }
    }

    if cues.is_empty() {
        return Err(MediaError::invalid_subtitle("no SRT cues found"));
    }

    for cue in &mut cues {
        let trimmed = cue.text.trim_end().to_string();
        cue.text = trimmed;
    }

    Ok(cues)
}

/// Render cues back into SRT text.
pub fn format(cues: &[SubtitleCue]) -> String {
    let mut out = String::new();
    for cue in cues {
        out.push_str(&format!("{}\n{} --> {}\n{}\n\n", cue.index, cue.start, cue.end, cue.text));
    }
    out
}

fn parse_timing(line: &str) -> Option<(String, String)> {
    let (start, rest) = line.split_once("-->")?;
    let start = start.trim();
    // Anything after the end time (position hints) is ignored
    let end = rest.split_whitespace().next()?;
    if parse_srt_time(start).is_err() || parse_srt_time(end).is_err() {
        return None;
    }
    Some((start.to_string(), end.to_string()))
}

/// Parse `HH:MM:SS,mmm` (or `.mmm`) into milliseconds.
pub fn parse_srt_time(raw: &str) -> MediaResult<u64> {
    let invalid = || MediaError::InvalidTimestamp(raw.to_string());

    let (clock, millis) = raw
        .trim()
        .split_once([',', '.'])
        .ok_or_else(invalid)?;
    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }

    let hours: u64 = parts[0].parse().map_err(|_| invalid())?;
    let minutes: u64 = parts[1].parse().map_err(|_| invalid())?;
    let seconds: u64 = parts[2].parse().map_err(|_| invalid())?;
    let millis: u64 = millis.parse().map_err(|_| invalid())?;
    if minutes >= 60 || seconds >= 60 || millis >= 1000 {
        return Err(invalid());
    }

    Ok(((hours * 60 + minutes) * 60 + seconds) * 1000 + millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str = "1\n00:00:01,000 --> 00:00:02,500\nHello there\n\n2\n00:00:03,000 --> 00:00:04,000\nSecond line\nwraps here\n\n";

    #[test]
    fn parses_cues_with_multiline_text() {
        let cues = parse(SAMPLE).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Hello there");
        assert_eq!(cues[1].text, "Second line\nwraps here");
        assert_eq!(cues[0].start_ms().unwrap(), 1000);
        assert_eq!(cues[0].end_ms().unwrap(), 2500);
    }

    #[test]
    fn format_reproduces_input() {
        let cues = parse(SAMPLE).unwrap();
        assert_eq!(format(&cues), SAMPLE);
    }

    #[test]
    fn tolerates_crlf_and_missing_trailing_blank() {
        let text = "1\r\n00:00:00,000 --> 00:00:01,000\r\nHi\r\n\r\n2\r\n00:00:01,000 --> 00:00:02,000 X1:10\r\nBye";
        let cues = parse(text).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[1].end, "00:00:02,000");
        assert_eq!(cues[1].text, "Bye");
    }

    #[test]
    fn numeric_text_line_is_not_a_new_cue() {
        let text = "1\n00:00:00,000 --> 00:00:01,000\n42\n\n";
        let cues = parse(text).unwrap();
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "42");
    }

    #[test]
    fn rejects_text_without_cues() {
        assert!(parse("just some prose").is_err());
    }

    #[test]
    fn blank_input_is_an_empty_cue_list() {
        assert_eq!(parse("").unwrap(), Vec::new());
        assert_eq!(parse(" \r\n\n\t").unwrap(), Vec::new());
        assert_eq!(parse(&format(&[])).unwrap(), Vec::new());
    }

    #[test]
    fn parses_srt_times() {
        assert_eq!(parse_srt_time("01:02:03,004").unwrap(), 3_723_004);
        assert_eq!(parse_srt_time("00:00:01.500").unwrap(), 1500);
        assert!(parse_srt_time("00:61:00,000").is_err());
        assert!(parse_srt_time("garbage").is_err());
    }

    fn srt_time(ms: u64) -> String {
        format!(
            "{:02}:{:02}:{:02},{:03}",
            ms / 3_600_000,
            (ms / 60_000) % 60,
            (ms / 1000) % 60,
            ms % 1000
        )
    }

    fn arb_cues() -> impl Strategy<Value = Vec<SubtitleCue>> {
        let cue = (
            0u64..36_000_000,
            1u64..10_000,
            prop::collection::vec("[A-Za-z][A-Za-z ,.!?']{0,30}[A-Za-z.!?]", 1..4),
        );
        prop::collection::vec(cue, 0..12).prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (start, len, lines))| SubtitleCue {
                    index: i as u32 + 1,
                    start: srt_time(start),
                    end: srt_time(start + len),
                    text: lines.join("\n"),
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn parse_inverts_format(cues in arb_cues()) {
            prop_assert_eq!(parse(&format(&cues)).unwrap(), cues);
        }

        #[test]
        fn format_is_stable_after_one_round_trip(cues in arb_cues()) {
            let once = format(&cues);
            prop_assert_eq!(format(&parse(&once).unwrap()), once);
        }
    }
}
