//! Render SRT cues into a styled ASS script.
//!
//! The script uses a fixed 384x288 canvas; libass scales it to the actual
//! video, so percentages of the video height map directly onto `PlayResY`.

use vtask_models::{SubtitleOptions, SubtitleStyle};

use crate::error::MediaResult;
use crate::srt::SubtitleCue;

const PLAY_RES_X: u32 = 384;
const PLAY_RES_Y: u32 = 288;

/// Build a complete ASS script for `cues` styled by `options`.
pub fn render_ass(cues: &[SubtitleCue], options: &SubtitleOptions) -> MediaResult<String> {
    options.validate()?;

    let primary = options.subtitle_color.to_ass_colour()?;
    let font_size = ((PLAY_RES_Y as f64 * options.font_size_percentage / 100.0).round() as u32).max(1);
    let margin_v = (PLAY_RES_Y as f64 * options.margin_percentage / 100.0).round() as u32;

    let (border_style, outline_colour, back_colour, outline) = match options.subtitle_style {
        SubtitleStyle::Outline => (1, "&H00000000", "&H00000000", 2),
        SubtitleStyle::Boxed => (3, "&H80000000", "&H80000000", 4),
    };

    let mut script = format!(
        "[Script Info]\n\
         ScriptType: v4.00+\n\
         PlayResX: {PLAY_RES_X}\n\
         PlayResY: {PLAY_RES_Y}\n\
         WrapStyle: 0\n\
         ScaledBorderAndShadow: yes\n\
         \n\
         [V4+ Styles]\n\
         Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, \
         Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, \
         Alignment, MarginL, MarginR, MarginV, Encoding\n\
         Style: Default,Arial,{font_size},{primary},&H000000FF,{outline_colour},{back_colour},\
         0,0,0,0,100,100,0,0,{border_style},{outline},0,2,10,10,{margin_v},1\n\
         \n\
         [Events]\n\
         Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n"
    );

    for cue in cues {
        let start = ass_time(cue.start_ms()?);
        let end = ass_time(cue.end_ms()?);
        script.push_str(&format!(
            "Dialogue: 0,{start},{end},Default,,0,0,0,,{}\n",
            escape_text(&cue.text)
        ));
    }

    Ok(script)
}

/// `H:MM:SS.cc` (centiseconds).
fn ass_time(ms: u64) -> String {
    let centis = ms / 10;
    let h = centis / 360_000;
    let m = (centis / 6000) % 60;
    let s = (centis / 100) % 60;
    let cs = centis % 100;
    format!("{h}:{m:02}:{s:02}.{cs:02}")
}

/// Newlines become `\N`; braces would open override blocks.
fn escape_text(text: &str) -> String {
    text.lines()
        .map(|line| line.replace(['{', '}'], ""))
        .collect::<Vec<_>>()
        .join("\\N")
}
