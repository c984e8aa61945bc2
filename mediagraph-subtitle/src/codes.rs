//! Override-code mini-language
//!
//! Dialogue text embeds override blocks such as `{\b1\c&H0000FF&}` between
//! runs of literal text. [`split_override_codes`] walks a line and reports
//! every tag, text run and line break to an [`OverrideHandler`].
//! [`filter_override_codes`] does the same walk and also rebuilds the line,
//! keeping only the tags whose [`Components`] were requested.
//!
//! A `{` that is not followed by `\` is literal text. A block that is never
//! closed is logged and the rest of the line is treated as text.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use mediagraph_core::{MediaError, MediaResult};

bitflags! {
    /// Parts of a dialogue line selected for filtering
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Components: u32 {
        /// Literal text runs
        const TEXT = 1 << 0;
        /// `\fn`
        const FONT_NAME = 1 << 1;
        /// `\fs`
        const FONT_SIZE = 1 << 2;
        /// `\fscx`, `\fscy`
        const FONT_SCALE = 1 << 3;
        /// `\fsp`
        const FONT_SPACING = 1 << 4;
        /// `\fe`
        const FONT_CHARSET = 1 << 5;
        /// `\b`
        const FONT_BOLD = 1 << 6;
        /// `\i`
        const FONT_ITALIC = 1 << 7;
        /// `\u`
        const FONT_UNDERLINE = 1 << 8;
        /// `\s`
        const FONT_STRIKEOUT = 1 << 9;
        /// `\bord`
        const TEXT_BORDER = 1 << 10;
        /// `\shad`
        const TEXT_SHADOW = 1 << 11;
        /// `\fr`, `\frx`, `\fry`, `\frz`
        const TEXT_ROTATE = 1 << 12;
        /// `\blur`, `\be`
        const TEXT_BLUR = 1 << 13;
        /// `\q`
        const TEXT_WRAP = 1 << 14;
        /// `\a`, `\an`
        const TEXT_ALIGNMENT = 1 << 15;
        /// `\r`
        const CANCELLING = 1 << 16;
        /// `\move`
        const MOVE = 1 << 17;
        /// `\pos`
        const POS = 1 << 18;
        /// `\org`
        const ORIGIN = 1 << 19;
        /// `\p`
        const DRAW = 1 << 20;
        /// `\t`
        const ANIMATE = 1 << 21;
        /// `\fad`, `\fade`
        const FADE = 1 << 22;
        /// `\clip`
        const CLIP = 1 << 23;
        /// `\c`, `\1c` to `\4c`
        const COLOR = 1 << 24;
        /// `\alpha`, `\1a` to `\4a`
        const ALPHA = 1 << 25;
        /// Tags this parser does not recognise
        const UNKNOWN = 1 << 26;
        /// Every font related tag
        const FONT = Self::FONT_NAME.bits()
            | Self::FONT_SIZE.bits()
            | Self::FONT_SCALE.bits()
            | Self::FONT_SPACING.bits()
            | Self::FONT_CHARSET.bits()
            | Self::FONT_BOLD.bits()
            | Self::FONT_ITALIC.bits()
            | Self::FONT_UNDERLINE.bits()
            | Self::FONT_STRIKEOUT.bits();
    }
}

/// Fade effect arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fade {
    /// `\fad(in,out)` durations in milliseconds
    Simple {
        /// Fade-in duration
        fade_in: i32,
        /// Fade-out duration
        fade_out: i32,
    },
    /// `\fade(a1,a2,a3,t1,t2,t3,t4)`
    Complex {
        /// Alpha before, during and after the fade
        alpha: [i32; 3],
        /// Transition times in milliseconds
        times: [i32; 4],
    },
}

/// One parsed override tag
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideTag<'a> {
    /// `\b`, `\i`, `\u`, `\s`; `None` reverts to the style default
    Style {
        /// Style letter
        style: char,
        /// New state
        enabled: Option<bool>,
    },
    /// Colour override; `\c` is the same as `\1c`
    Color {
        /// Colour slot, 1 to 4
        index: u8,
        /// `0xBBGGRR`, `None` reverts to the style colour
        color: Option<u32>,
    },
    /// Alpha override; slot 0 is `\alpha` and applies to every slot
    Alpha {
        /// Alpha slot, 0 to 4
        index: u8,
        /// Alpha value, `None` reverts to the style value
        alpha: Option<u8>,
    },
    /// Font face
    FontName(Option<&'a str>),
    /// Font size
    FontSize(Option<u32>),
    /// Horizontal scale in percent
    ScaleX(Option<f32>),
    /// Vertical scale in percent
    ScaleY(Option<f32>),
    /// Letter spacing
    Spacing(Option<f32>),
    /// Font charset
    Charset(Option<u32>),
    /// Border width
    Border(Option<f32>),
    /// Shadow depth
    Shadow(Option<f32>),
    /// Rotation around `axis` (`z` when absent)
    Rotate {
        /// `x`, `y` or `z`
        axis: Option<char>,
        /// Angle in degrees
        angle: Option<f32>,
    },
    /// `\blur` gaussian blur strength
    Blur(Option<f32>),
    /// `\be` edge blur passes
    EdgeBlur(Option<u32>),
    /// Wrapping style
    WrapStyle(Option<u32>),
    /// Numpad alignment 1 to 9; legacy `\a` values are converted
    Alignment(Option<u8>),
    /// `\r`, reset to the named style (empty for the line style)
    Cancel(&'a str),
    /// `\move(x1,y1,x2,y2[,t1,t2])`
    Move {
        /// Start position
        from: (i32, i32),
        /// End position
        to: (i32, i32),
        /// Movement start and end times in milliseconds
        times: Option<(i32, i32)>,
    },
    /// `\pos(x,y)`
    Pos(i32, i32),
    /// `\org(x,y)`
    Origin(i32, i32),
    /// `\t([t1,t2,][accel,]modifiers)`
    Animate {
        /// Animation start in milliseconds
        t1: Option<i32>,
        /// Animation end in milliseconds
        t2: Option<i32>,
        /// Acceleration exponent
        accel: f32,
        /// Tags being animated
        modifiers: &'a str,
    },
    /// `\fad` or `\fade`
    Fade(Fade),
    /// Rectangular `\clip(x1,y1,x2,y2)`
    Clip([i32; 4]),
    /// `\p`; 0 leaves drawing mode
    Drawing(u32),
    /// Anything else, kept verbatim without the leading backslash
    Unknown(&'a str),
}

impl OverrideTag<'_> {
    /// Component this tag belongs to when filtering
    pub fn component(&self) -> Components {
        match self {
            OverrideTag::Style { style, .. } => match style {
                'b' => Components::FONT_BOLD,
                'i' => Components::FONT_ITALIC,
                'u' => Components::FONT_UNDERLINE,
                _ => Components::FONT_STRIKEOUT,
            },
            OverrideTag::Color { .. } => Components::COLOR,
            OverrideTag::Alpha { .. } => Components::ALPHA,
            OverrideTag::FontName(_) => Components::FONT_NAME,
            OverrideTag::FontSize(_) => Components::FONT_SIZE,
            OverrideTag::ScaleX(_) | OverrideTag::ScaleY(_) => Components::FONT_SCALE,
            OverrideTag::Spacing(_) => Components::FONT_SPACING,
            OverrideTag::Charset(_) => Components::FONT_CHARSET,
            OverrideTag::Border(_) => Components::TEXT_BORDER,
            OverrideTag::Shadow(_) => Components::TEXT_SHADOW,
            OverrideTag::Rotate { .. } => Components::TEXT_ROTATE,
            OverrideTag::Blur(_) | OverrideTag::EdgeBlur(_) => Components::TEXT_BLUR,
            OverrideTag::WrapStyle(_) => Components::TEXT_WRAP,
            OverrideTag::Alignment(_) => Components::TEXT_ALIGNMENT,
            OverrideTag::Cancel(_) => Components::CANCELLING,
            OverrideTag::Move { .. } => Components::MOVE,
            OverrideTag::Pos(..) => Components::POS,
            OverrideTag::Origin(..) => Components::ORIGIN,
            OverrideTag::Animate { .. } => Components::ANIMATE,
            OverrideTag::Fade(_) => Components::FADE,
            OverrideTag::Clip(_) => Components::CLIP,
            OverrideTag::Drawing(_) => Components::DRAW,
            OverrideTag::Unknown(_) => Components::UNKNOWN,
        }
    }
}

/// Receiver of override-code parse events
///
/// Every method has an empty default so implementations only override what
/// they render. `()` is a handler that ignores everything.
pub trait OverrideHandler {
    /// A run of literal text
    fn text(&mut self, text: &str) {
        let _ = text;
    }

    /// `\n` (soft) or `\N` (forced) line break
    fn new_line(&mut self, forced: bool) {
        let _ = forced;
    }

    /// Bold, italic, underline or strikeout toggle
    fn style(&mut self, style: char, enabled: Option<bool>) {
        let _ = (style, enabled);
    }

    /// Colour change in slot `index`
    fn color(&mut self, color: Option<u32>, index: u8) {
        let _ = (color, index);
    }

    /// Alpha change in slot `index`, 0 for all slots
    fn alpha(&mut self, alpha: Option<u8>, index: u8) {
        let _ = (alpha, index);
    }

    /// Font face change
    fn font_name(&mut self, name: Option<&str>) {
        let _ = name;
    }

    /// Font size change
    fn font_size(&mut self, size: Option<u32>) {
        let _ = size;
    }

    /// Alignment change, numpad layout
    fn alignment(&mut self, alignment: Option<u8>) {
        let _ = alignment;
    }

    /// Reset overrides to `style`, or to the line style when empty
    fn cancel_overrides(&mut self, style: &str) {
        let _ = style;
    }

    /// Positioning; `\pos` is reported as a move that starts and ends at
    /// the same point
    fn movement(&mut self, from: (i32, i32), to: (i32, i32), times: Option<(i32, i32)>) {
        let _ = (from, to, times);
    }

    /// Rotation origin
    fn origin(&mut self, x: i32, y: i32) {
        let _ = (x, y);
    }

    /// Animated transition of `modifiers`
    fn animate(&mut self, t1: Option<i32>, t2: Option<i32>, accel: f32, modifiers: &str) {
        let _ = (t1, t2, accel, modifiers);
    }

    /// Fade in or out
    fn fade(&mut self, fade: Fade) {
        let _ = fade;
    }

    /// Rectangular clip
    fn clip(&mut self, rect: [i32; 4]) {
        let _ = rect;
    }

    /// Drawing mode; 0 leaves it
    fn drawing_mode(&mut self, scale: u32) {
        let _ = scale;
    }

    /// The line is finished
    fn end(&mut self) {}
}

impl OverrideHandler for () {}

/// Walk `text`, reporting every event to `handler`
///
/// Unterminated blocks are logged and parsed as text.
pub fn split_override_codes<H: OverrideHandler + ?Sized>(handler: &mut H, text: &str) {
    walk(handler, text, None);
}

/// Like [`split_override_codes`] but fails on an unterminated block
///
/// Events up to the end of the line are still delivered.
pub fn try_split_override_codes<H: OverrideHandler + ?Sized>(
    handler: &mut H,
    text: &str,
) -> MediaResult<()> {
    let walked = walk(handler, text, None);
    if walked.unterminated {
        return Err(MediaError::CorruptInput {
            reason: "unterminated override block".to_string(),
        });
    }
    Ok(())
}

/// Walk `text` and rebuild it keeping only the `keep` components
///
/// Line breaks are always kept. Unknown tags are copied byte for byte when
/// [`Components::UNKNOWN`] is kept. Blocks left empty are removed.
pub fn filter_override_codes<H: OverrideHandler + ?Sized>(
    handler: &mut H,
    text: &str,
    keep: Components,
) -> String {
    walk(handler, text, Some(keep)).output.replace("{}", "")
}

/// Text and line breaks of a dialogue line without any override block
pub fn plain_text(text: &str) -> String {
    filter_override_codes(&mut (), text, Components::TEXT)
}

struct Walk {
    output: String,
    unterminated: bool,
}

fn walk<H: OverrideHandler + ?Sized>(handler: &mut H, text: &str, keep: Option<Components>) -> Walk {
    let keep_text = keep.map_or(false, |k| k.contains(Components::TEXT));
    let mut output = String::new();
    let mut unterminated = false;
    let mut run_start: Option<usize> = None;
    let mut pos = 0;

    let flush = |handler: &mut H, output: &mut String, start: Option<usize>, end: usize| {
        if let Some(start) = start {
            handler.text(&text[start..end]);
            if keep_text {
                output.push_str(&text[start..end]);
            }
        }
    };

    while pos < text.len() {
        let rest = &text[pos..];
        if rest.starts_with("\\n") || rest.starts_with("\\N") {
            flush(handler, &mut output, run_start.take(), pos);
            handler.new_line(rest.as_bytes()[1] == b'N');
            if keep.is_some() {
                output.push_str(&rest[..2]);
            }
            pos += 2;
            continue;
        }

        if rest.starts_with("{\\") && !unterminated {
            match rest.find('}') {
                Some(close) => {
                    flush(handler, &mut output, run_start.take(), pos);
                    if keep.is_some() {
                        output.push('{');
                    }
                    walk_block(handler, &rest[1..close], keep, &mut output);
                    if keep.is_some() {
                        output.push('}');
                    }
                    pos += close + 1;
                    continue;
                }
                None => {
                    tracing::warn!("unterminated override block at byte {}, parsing it as text", pos);
                    unterminated = true;
                }
            }
        }

        if run_start.is_none() {
            run_start = Some(pos);
        }
        pos += rest.chars().next().map_or(1, char::len_utf8);
    }

    flush(handler, &mut output, run_start.take(), text.len());
    handler.end();
    Walk {
        output,
        unterminated,
    }
}

fn walk_block<H: OverrideHandler + ?Sized>(
    handler: &mut H,
    body: &str,
    keep: Option<Components>,
    output: &mut String,
) {
    // body starts at the first backslash
    let mut pos = 0;
    while pos < body.len() {
        let start = pos + 1;
        let end = tag_end(body, start);
        let token = &body[start..end];
        let tag = parse_tag(token);
        if let Some(keep) = keep {
            if keep.contains(tag.component()) {
                output.push('\\');
                output.push_str(token);
            }
        }
        dispatch(handler, &tag);
        pos = end;
    }
}

/// Byte index of the backslash that starts the next tag
fn tag_end(body: &str, start: usize) -> usize {
    let tail = match body.get(start..) {
        Some(tail) => tail,
        None => return body.len(),
    };
    // `\t(...)` nests other tags inside its parentheses
    if tail.starts_with("t(") {
        let mut depth = 0usize;
        for (i, c) in tail.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                '\\' if depth == 0 => return start + i,
                _ => {}
            }
        }
        return body.len();
    }
    tail.find('\\').map_or(body.len(), |i| start + i)
}

fn dispatch<H: OverrideHandler + ?Sized>(handler: &mut H, tag: &OverrideTag<'_>) {
    match *tag {
        OverrideTag::Style { style, enabled } => handler.style(style, enabled),
        OverrideTag::Color { index, color } => handler.color(color, index),
        OverrideTag::Alpha { index, alpha } => handler.alpha(alpha, index),
        OverrideTag::FontName(name) => handler.font_name(name),
        OverrideTag::FontSize(size) => handler.font_size(size),
        OverrideTag::Alignment(alignment) => handler.alignment(alignment),
        OverrideTag::Cancel(style) => handler.cancel_overrides(style),
        OverrideTag::Move { from, to, times } => handler.movement(from, to, times),
        OverrideTag::Pos(x, y) => handler.movement((x, y), (x, y), None),
        OverrideTag::Origin(x, y) => handler.origin(x, y),
        OverrideTag::Animate {
            t1,
            t2,
            accel,
            modifiers,
        } => handler.animate(t1, t2, accel, modifiers),
        OverrideTag::Fade(fade) => handler.fade(fade),
        OverrideTag::Clip(rect) => handler.clip(rect),
        OverrideTag::Drawing(scale) => handler.drawing_mode(scale),
        _ => {}
    }
}

/// Parse one tag, given without its leading backslash
pub fn parse_tag(token: &str) -> OverrideTag<'_> {
    if let Some(tag) = parse_known_tag(token) {
        return tag;
    }
    OverrideTag::Unknown(token)
}

fn parse_known_tag(token: &str) -> Option<OverrideTag<'_>> {
    let mut chars = token.chars();
    let first = chars.next()?;

    if matches!(first, 'b' | 'i' | 's' | 'u') {
        let enabled = match chars.as_str() {
            "" => Some(None),
            "0" => Some(Some(false)),
            "1" => Some(Some(true)),
            _ => None,
        };
        if let Some(enabled) = enabled {
            return Some(OverrideTag::Style {
                style: first,
                enabled,
            });
        }
    }

    if let Some(color) = token.strip_prefix('c').and_then(hex_value) {
        return Some(OverrideTag::Color {
            index: 1,
            color: color.map(|c| c as u32),
        });
    }
    if let Some((index, rest)) = slot(token, 'c') {
        if let Some(color) = hex_value(rest) {
            return Some(OverrideTag::Color {
                index,
                color: color.map(|c| c as u32),
            });
        }
    }
    if let Some(alpha) = token.strip_prefix("alpha").and_then(hex_value) {
        return Some(OverrideTag::Alpha {
            index: 0,
            alpha: alpha.map(|a| a as u8),
        });
    }
    if let Some((index, rest)) = slot(token, 'a') {
        if let Some(alpha) = hex_value(rest) {
            return Some(OverrideTag::Alpha {
                index,
                alpha: alpha.map(|a| a as u8),
            });
        }
    }

    if let Some(name) = token.strip_prefix("fn") {
        return Some(OverrideTag::FontName((!name.is_empty()).then_some(name)));
    }
    if let Some(v) = token.strip_prefix("fscx").and_then(optional) {
        return Some(OverrideTag::ScaleX(v));
    }
    if let Some(v) = token.strip_prefix("fscy").and_then(optional) {
        return Some(OverrideTag::ScaleY(v));
    }
    if let Some(v) = token.strip_prefix("fsp").and_then(optional) {
        return Some(OverrideTag::Spacing(v));
    }
    if let Some(v) = token.strip_prefix("fs").and_then(optional) {
        return Some(OverrideTag::FontSize(v));
    }
    if let Some(v) = token.strip_prefix("fe").and_then(optional) {
        return Some(OverrideTag::Charset(v));
    }
    if let Some(v) = token.strip_prefix("bord").and_then(optional) {
        return Some(OverrideTag::Border(v));
    }
    if let Some(v) = token.strip_prefix("shad").and_then(optional) {
        return Some(OverrideTag::Shadow(v));
    }
    if let Some(rest) = token.strip_prefix("fr") {
        let (axis, rest) = match rest.chars().next() {
            Some(c @ ('x' | 'y' | 'z')) => (Some(c), &rest[1..]),
            _ => (None, rest),
        };
        if let Some(angle) = optional(rest) {
            return Some(OverrideTag::Rotate { axis, angle });
        }
    }
    if let Some(v) = token.strip_prefix("blur").and_then(optional) {
        return Some(OverrideTag::Blur(v));
    }
    if let Some(v) = token.strip_prefix("be").and_then(optional) {
        return Some(OverrideTag::EdgeBlur(v));
    }
    if let Some(v) = token.strip_prefix('q').and_then(optional) {
        return Some(OverrideTag::WrapStyle(v));
    }

    if let Some(rest) = token.strip_prefix("an") {
        if rest.len() <= 1 {
            if let Some(v) = optional::<u8>(rest) {
                return Some(OverrideTag::Alignment(v));
            }
        }
    }
    if let Some(rest) = token.strip_prefix('a') {
        if rest.len() <= 2 {
            if let Some(v) = optional::<u8>(rest) {
                return Some(OverrideTag::Alignment(v.map(legacy_alignment)));
            }
        }
    }

    if let Some(style) = token.strip_prefix('r') {
        return Some(OverrideTag::Cancel(style));
    }

    if let Some(args) = int_args(token, "move") {
        match args[..] {
            [x1, y1, x2, y2] => {
                return Some(OverrideTag::Move {
                    from: (x1, y1),
                    to: (x2, y2),
                    times: None,
                })
            }
            [x1, y1, x2, y2, t1, t2] => {
                return Some(OverrideTag::Move {
                    from: (x1, y1),
                    to: (x2, y2),
                    times: Some((t1, t2)),
                })
            }
            _ => {}
        }
    }
    if let Some([x, y]) = int_args(token, "pos").and_then(|a| <[i32; 2]>::try_from(a).ok()) {
        return Some(OverrideTag::Pos(x, y));
    }
    if let Some([x, y]) = int_args(token, "org").and_then(|a| <[i32; 2]>::try_from(a).ok()) {
        return Some(OverrideTag::Origin(x, y));
    }
    if let Some(inner) = token.strip_prefix("t(").and_then(|t| t.strip_suffix(')')) {
        return Some(parse_animate(inner));
    }
    if let Some([a1, a2, a3, t1, t2, t3, t4]) =
        int_args(token, "fade").and_then(|a| <[i32; 7]>::try_from(a).ok())
    {
        return Some(OverrideTag::Fade(Fade::Complex {
            alpha: [a1, a2, a3],
            times: [t1, t2, t3, t4],
        }));
    }
    if let Some([fade_in, fade_out]) =
        int_args(token, "fad").and_then(|a| <[i32; 2]>::try_from(a).ok())
    {
        return Some(OverrideTag::Fade(Fade::Simple { fade_in, fade_out }));
    }
    if let Some(rect) = int_args(token, "clip").and_then(|a| <[i32; 4]>::try_from(a).ok()) {
        return Some(OverrideTag::Clip(rect));
    }
    if let Some(scale) = token.strip_prefix('p').and_then(optional::<u32>) {
        return Some(OverrideTag::Drawing(scale.unwrap_or(0)));
    }
    None
}

/// `\a` values use the SSA layout: 1-3 bottom, +4 top, +8 middle
fn legacy_alignment(a: u8) -> u8 {
    let row = if a & 4 != 0 {
        6
    } else if a & 8 != 0 {
        3
    } else {
        0
    };
    (a & 3) + row
}

/// Split `1c...` style tokens into the slot number and the remainder
fn slot(token: &str, letter: char) -> Option<(u8, &str)> {
    let mut chars = token.chars();
    let index = chars.next()?.to_digit(10)?;
    if !(1..=4).contains(&index) || chars.next()? != letter {
        return None;
    }
    Some((index as u8, chars.as_str()))
}

/// `""` reverts, `&HBBGGRR&` sets; the closing `&` is optional
fn hex_value(rest: &str) -> Option<Option<u64>> {
    if rest.is_empty() {
        return Some(None);
    }
    let digits = rest.strip_prefix("&H")?;
    let digits = digits.strip_suffix('&').unwrap_or(digits);
    if digits.is_empty() || digits.len() > 8 {
        return None;
    }
    u64::from_str_radix(digits, 16).ok().map(Some)
}

/// `""` means no value; anything else must parse completely
fn optional<T: FromStr>(rest: &str) -> Option<Option<T>> {
    if rest.is_empty() {
        return Some(None);
    }
    rest.parse().ok().map(Some)
}

/// Integer arguments of `name(a,b,...)`; fractional coordinates are truncated
fn int_args(token: &str, name: &str) -> Option<Vec<i32>> {
    let inner = token
        .strip_prefix(name)?
        .strip_prefix('(')?
        .strip_suffix(')')?;
    inner
        .split(',')
        .map(|arg| arg.trim().parse::<f64>().ok().map(|v| v as i32))
        .collect()
}

fn parse_animate(inner: &str) -> OverrideTag<'_> {
    let mut args: Vec<f32> = Vec::new();
    let mut modifiers = inner;
    while args.len() < 3 {
        match modifiers.split_once(',') {
            Some((head, tail)) => match head.trim().parse::<f32>() {
                Ok(value) => {
                    args.push(value);
                    modifiers = tail;
                }
                Err(_) => break,
            },
            None => break,
        }
    }
    let (t1, t2, accel) = match args[..] {
        [accel] => (None, None, accel),
        [t1, t2] => (Some(t1 as i32), Some(t2 as i32), 1.0),
        [t1, t2, accel] => (Some(t1 as i32), Some(t2 as i32), accel),
        _ => (None, None, 1.0),
    };
    OverrideTag::Animate {
        t1,
        t2,
        accel,
        modifiers: modifiers.trim_start(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl OverrideHandler for Recorder {
        fn text(&mut self, text: &str) {
            self.events.push(format!("text:{}", text));
        }
        fn new_line(&mut self, forced: bool) {
            self.events.push(format!("newline:{}", forced));
        }
        fn style(&mut self, style: char, enabled: Option<bool>) {
            self.events.push(format!("style:{}:{:?}", style, enabled));
        }
        fn color(&mut self, color: Option<u32>, index: u8) {
            self.events.push(format!("color:{}:{:?}", index, color));
        }
        fn movement(&mut self, from: (i32, i32), to: (i32, i32), times: Option<(i32, i32)>) {
            self.events.push(format!("move:{:?}:{:?}:{:?}", from, to, times));
        }
        fn end(&mut self) {
            self.events.push("end".to_string());
        }
    }

    #[test]
    fn test_events_in_order() {
        let mut recorder = Recorder::default();
        split_override_codes(&mut recorder, "{\\b1}Hello{\\b0}\\Nworld");
        assert_eq!(
            recorder.events,
            vec![
                "style:b:Some(true)",
                "text:Hello",
                "style:b:Some(false)",
                "newline:true",
                "text:world",
                "end",
            ]
        );
    }

    #[test]
    fn test_literal_brace_is_text() {
        let mut recorder = Recorder::default();
        split_override_codes(&mut recorder, "a {note} b\\nc");
        assert_eq!(
            recorder.events,
            vec!["text:a {note} b", "newline:false", "text:c", "end"]
        );
    }

    #[test]
    fn test_pos_reported_as_move() {
        let mut recorder = Recorder::default();
        split_override_codes(&mut recorder, "{\\pos(10,20)\\c&HFF&}x");
        assert_eq!(
            recorder.events,
            vec![
                "move:(10, 20):(10, 20):None",
                "color:1:Some(255)",
                "text:x",
                "end",
            ]
        );
    }

    #[test]
    fn test_parse_colors_and_alpha() {
        assert_eq!(
            parse_tag("3c&H00FF00&"),
            OverrideTag::Color {
                index: 3,
                color: Some(0x00ff00)
            }
        );
        assert_eq!(parse_tag("c"), OverrideTag::Color { index: 1, color: None });
        assert_eq!(
            parse_tag("alpha&H80&"),
            OverrideTag::Alpha {
                index: 0,
                alpha: Some(0x80)
            }
        );
        assert_eq!(parse_tag("2a"), OverrideTag::Alpha { index: 2, alpha: None });
        assert_eq!(parse_tag("5c&HFF&"), OverrideTag::Unknown("5c&HFF&"));
    }

    #[test]
    fn test_parse_alignment() {
        assert_eq!(parse_tag("an8"), OverrideTag::Alignment(Some(8)));
        assert_eq!(parse_tag("a5"), OverrideTag::Alignment(Some(7)));
        assert_eq!(parse_tag("a10"), OverrideTag::Alignment(Some(5)));
        assert_eq!(parse_tag("a2"), OverrideTag::Alignment(Some(2)));
        assert_eq!(parse_tag("an"), OverrideTag::Alignment(None));
    }

    #[test]
    fn test_parse_font_tags() {
        assert_eq!(parse_tag("fnArial"), OverrideTag::FontName(Some("Arial")));
        assert_eq!(parse_tag("fn"), OverrideTag::FontName(None));
        assert_eq!(parse_tag("fs24"), OverrideTag::FontSize(Some(24)));
        assert_eq!(parse_tag("fscx150"), OverrideTag::ScaleX(Some(150.0)));
        assert_eq!(parse_tag("fsp2"), OverrideTag::Spacing(Some(2.0)));
        assert_eq!(parse_tag("bord3"), OverrideTag::Border(Some(3.0)));
        assert_eq!(
            parse_tag("frz-45"),
            OverrideTag::Rotate {
                axis: Some('z'),
                angle: Some(-45.0)
            }
        );
        assert_eq!(parse_tag("b700"), OverrideTag::Unknown("b700"));
    }

    #[test]
    fn test_parse_geometry() {
        assert_eq!(
            parse_tag("move(1,2,3,4,100,200)"),
            OverrideTag::Move {
                from: (1, 2),
                to: (3, 4),
                times: Some((100, 200))
            }
        );
        assert_eq!(parse_tag("org(5, 6)"), OverrideTag::Origin(5, 6));
        assert_eq!(parse_tag("clip(0,0,320,240)"), OverrideTag::Clip([0, 0, 320, 240]));
        assert_eq!(
            parse_tag("fad(200,300)"),
            OverrideTag::Fade(Fade::Simple {
                fade_in: 200,
                fade_out: 300
            })
        );
        assert_eq!(
            parse_tag("fade(255,0,255,0,100,900,1000)"),
            OverrideTag::Fade(Fade::Complex {
                alpha: [255, 0, 255],
                times: [0, 100, 900, 1000]
            })
        );
        assert_eq!(parse_tag("p1"), OverrideTag::Drawing(1));
        assert_eq!(parse_tag("p"), OverrideTag::Drawing(0));
    }

    #[test]
    fn test_parse_animate() {
        assert_eq!(
            parse_tag("t(0,500,\\fs40)"),
            OverrideTag::Animate {
                t1: Some(0),
                t2: Some(500),
                accel: 1.0,
                modifiers: "\\fs40"
            }
        );
        assert_eq!(
            parse_tag("t(\\frz90)"),
            OverrideTag::Animate {
                t1: None,
                t2: None,
                accel: 1.0,
                modifiers: "\\frz90"
            }
        );
        assert_eq!(
            parse_tag("t(0,100,2,\\clip(0,0,1,1))"),
            OverrideTag::Animate {
                t1: Some(0),
                t2: Some(100),
                accel: 2.0,
                modifiers: "\\clip(0,0,1,1)"
            }
        );
    }

    #[test]
    fn test_animate_keeps_nested_tags_together() {
        let kept = filter_override_codes(
            &mut (),
            "{\\t(0,500,\\fs40\\b1)\\i1}x",
            Components::ANIMATE | Components::TEXT,
        );
        assert_eq!(kept, "{\\t(0,500,\\fs40\\b1)}x");
    }

    #[test]
    fn test_filter_drops_empty_blocks() {
        let kept = filter_override_codes(
            &mut (),
            "{\\b1\\fs20}Hi{\\pos(10,20)} there",
            Components::TEXT | Components::FONT_BOLD,
        );
        assert_eq!(kept, "{\\b1}Hi there");
    }

    #[test]
    fn test_unknown_tags_preserved() {
        let text = "{\\k20\\b1}ka{\\kf35}ra";
        assert_eq!(
            filter_override_codes(&mut (), text, Components::TEXT | Components::UNKNOWN),
            "{\\k20}ka{\\kf35}ra"
        );
        assert_eq!(filter_override_codes(&mut (), text, Components::all()), text);
        assert_eq!(plain_text(text), "kara");
    }

    #[test]
    fn test_unterminated_block_is_text() {
        let mut recorder = Recorder::default();
        split_override_codes(&mut recorder, "ok{\\b1 broken");
        assert_eq!(recorder.events, vec!["text:ok{\\b1 broken", "end"]);

        let err = try_split_override_codes(&mut (), "{\\i1").unwrap_err();
        assert!(matches!(err, MediaError::CorruptInput { .. }));
        assert!(try_split_override_codes(&mut (), "{\\i1}fine").is_ok());
    }

    #[test]
    fn test_multibyte_text() {
        assert_eq!(plain_text("{\\i1}héllo\\Nwörld"), "héllo\\Nwörld");
    }
}
