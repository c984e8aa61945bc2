//! SSA/ASS section splitter
//!
//! Splits a script header into its `[Script Info]`, style and `[Events]`
//! sections. Style and dialogue lines are read in the field order given by
//! the section's `Format:` line, or in the default order when the line is
//! missing. Fields that fail to parse keep their default value.

use serde::{Deserialize, Serialize};

/// `[Script Info]` values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptInfo {
    /// `ScriptType`
    pub script_type: String,
    /// `Collisions`
    pub collisions: String,
    /// `PlayResX`
    pub play_res_x: i32,
    /// `PlayResY`
    pub play_res_y: i32,
    /// `Timer`
    pub timer: f32,
}

/// One `Style:` line
///
/// Colours are `0xAABBGGRR`. Alignment always uses the numpad layout, V4
/// values are converted while parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Style {
    pub name: String,
    pub font_name: String,
    pub font_size: i32,
    pub primary_color: u32,
    pub secondary_color: u32,
    pub outline_color: u32,
    pub back_color: u32,
    pub bold: i32,
    pub italic: i32,
    pub underline: i32,
    pub strikeout: i32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub spacing: f32,
    pub angle: f32,
    pub border_style: i32,
    pub outline: f32,
    pub shadow: f32,
    pub alignment: i32,
    pub margin_l: i32,
    pub margin_r: i32,
    pub margin_v: i32,
    pub alpha_level: i32,
    pub encoding: i32,
}

/// One `Dialogue:` line
///
/// `start` and `end` are in centiseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Dialog {
    pub readorder: i32,
    pub layer: i32,
    pub start: i32,
    pub end: i32,
    pub style: String,
    pub name: String,
    pub margin_l: i32,
    pub margin_r: i32,
    pub margin_v: i32,
    pub effect: String,
    pub text: String,
}

/// Everything read from a script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ass {
    /// Script header values
    pub script_info: ScriptInfo,
    /// Styles from `[V4+ Styles]` and `[V4 Styles]`, in file order
    pub styles: Vec<Style>,
    /// Dialogue lines in file order
    pub dialogs: Vec<Dialog>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    ScriptInfo,
    V4PlusStyles,
    V4Styles,
    Events,
}

impl Section {
    const ALL: [Section; 4] = [
        Section::ScriptInfo,
        Section::V4PlusStyles,
        Section::V4Styles,
        Section::Events,
    ];

    fn title(self) -> &'static str {
        match self {
            Section::ScriptInfo => "Script Info",
            Section::V4PlusStyles => "V4+ Styles",
            Section::V4Styles => "V4 Styles",
            Section::Events => "Events",
        }
    }

    /// Key of the record lines; `None` for key/value sections
    fn record_key(self) -> Option<&'static str> {
        match self {
            Section::ScriptInfo => None,
            Section::V4PlusStyles | Section::V4Styles => Some("Style"),
            Section::Events => Some("Dialogue"),
        }
    }

    fn fields(self) -> &'static [&'static str] {
        match self {
            Section::ScriptInfo => &["ScriptType", "Collisions", "PlayResX", "PlayResY", "Timer"],
            Section::V4PlusStyles => &[
                "Name",
                "Fontname",
                "Fontsize",
                "PrimaryColour",
                "SecondaryColour",
                "OutlineColour",
                "BackColour",
                "Bold",
                "Italic",
                "Underline",
                "StrikeOut",
                "ScaleX",
                "ScaleY",
                "Spacing",
                "Angle",
                "BorderStyle",
                "Outline",
                "Shadow",
                "Alignment",
                "MarginL",
                "MarginR",
                "MarginV",
                "Encoding",
            ],
            Section::V4Styles => &[
                "Name",
                "Fontname",
                "Fontsize",
                "PrimaryColour",
                "SecondaryColour",
                "TertiaryColour",
                "BackColour",
                "Bold",
                "Italic",
                "BorderStyle",
                "Outline",
                "Shadow",
                "Alignment",
                "MarginL",
                "MarginR",
                "MarginV",
                "AlphaLevel",
                "Encoding",
            ],
            Section::Events => &[
                "Layer", "Start", "End", "Style", "Name", "MarginL", "MarginR", "MarginV", "Effect",
                "Text",
            ],
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Field order of the Matroska dialogue payload
const MATROSKA_DIALOG_FIELDS: [&str; 9] = [
    "ReadOrder", "Layer", "Style", "Name", "MarginL", "MarginR", "MarginV", "Effect", "Text",
];

/// Section splitter over one script
#[derive(Debug, Clone, Default)]
pub struct AssSplit {
    ass: Ass,
    current: Option<Section>,
    field_order: [Option<Vec<Option<&'static str>>>; 4],
}

impl AssSplit {
    /// Split a complete script
    pub fn split(text: &str) -> Self {
        let mut split = Self::default();
        split.feed(text);
        split
    }

    /// Parse more lines, continuing in the section the last call ended in
    pub fn feed(&mut self, text: &str) {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            self.line(line);
        }
    }

    /// Parsed script
    pub fn ass(&self) -> &Ass {
        &self.ass
    }

    /// Consume the splitter, returning the parsed script
    pub fn into_ass(self) -> Ass {
        self.ass
    }

    /// Script header values
    pub fn script_info(&self) -> &ScriptInfo {
        &self.ass.script_info
    }

    /// Parsed styles
    pub fn styles(&self) -> &[Style] {
        &self.ass.styles
    }

    /// Parsed dialogue lines
    pub fn dialogs(&self) -> &[Dialog] {
        &self.ass.dialogs
    }

    /// Look up a style by name; an empty name means `Default`
    pub fn style(&self, name: &str) -> Option<&Style> {
        let name = if name.is_empty() { "Default" } else { name };
        self.ass.styles.iter().find(|s| s.name == name)
    }

    /// Parse a Matroska-style dialogue payload
    ///
    /// The payload is `ReadOrder,Layer,Style,Name,MarginL,MarginR,MarginV,Effect,Text`
    /// without timestamps; the text field keeps any commas it contains.
    pub fn split_dialog(line: &str) -> Dialog {
        let mut dialog = Dialog::default();
        let mut rest = line;
        for (i, field) in MATROSKA_DIALOG_FIELDS.iter().enumerate() {
            let last = i == MATROSKA_DIALOG_FIELDS.len() - 1;
            rest = rest.trim_start_matches(' ');
            let (value, tail) = if last {
                (rest, "")
            } else {
                rest.split_once(',').unwrap_or((rest, ""))
            };
            set_dialog_field(&mut dialog, field, value);
            rest = tail;
        }
        dialog
    }

    fn line(&mut self, line: &str) {
        if let Some(title) = section_header(line) {
            self.current = Section::ALL.iter().copied().find(|s| s.title() == title);
            if self.current.is_none() {
                tracing::debug!("skipping unknown section [{}]", title);
            }
            return;
        }
        let mut section = match self.current {
            Some(section) => section,
            None => return,
        };
        if line.starts_with(';') || line.starts_with("!:") {
            return;
        }
        let (key, value) = match line.split_once(':') {
            Some(pair) => pair,
            None => return,
        };

        // record lines may appear outside their own section
        if section.record_key() != Some(key) {
            if let Some(owner) = Section::ALL.iter().copied().find(|s| s.record_key() == Some(key)) {
                section = owner;
                self.current = Some(owner);
            }
        }

        match section.record_key() {
            Some(record_key) => {
                if key == "Format" && self.field_order[section.index()].is_none() {
                    self.field_order[section.index()] = Some(format_order(section, value));
                } else if key == record_key {
                    self.record(section, value);
                }
            }
            None => {
                if let Some(field) = section.fields().iter().find(|f| **f == key) {
                    let value = value.trim_start_matches(' ');
                    set_script_info_field(&mut self.ass.script_info, field, value);
                }
            }
        }
    }

    fn record(&mut self, section: Section, value: &str) {
        let order = self.field_order[section.index()]
            .get_or_insert_with(|| section.fields().iter().map(|f| Some(*f)).collect())
            .clone();

        let mut style = Style::default();
        let mut dialog = Dialog::default();
        let mut rest = value;
        for (i, field) in order.iter().enumerate() {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            let last = i == order.len() - 1;
            let (field_value, tail) = if last {
                (rest, "")
            } else {
                rest.split_once(',').unwrap_or((rest, ""))
            };
            if let Some(field) = field {
                match section {
                    Section::Events => set_dialog_field(&mut dialog, field, field_value),
                    Section::V4Styles => set_style_field(&mut style, field, field_value, true),
                    _ => set_style_field(&mut style, field, field_value, false),
                }
            }
            rest = tail;
        }

        match section {
            Section::Events => self.ass.dialogs.push(dialog),
            _ => self.ass.styles.push(style),
        }
    }
}

/// Title of a `[Section]` line
fn section_header(line: &str) -> Option<&str> {
    let inner = line.strip_prefix('[')?;
    let end = inner.find(']')?;
    let title = &inner[..end];
    let valid = !title.is_empty()
        && title.len() <= 15
        && title
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == ' ');
    valid.then_some(title)
}

fn format_order(section: Section, value: &str) -> Vec<Option<&'static str>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            let field = section.fields().iter().copied().find(|f| *f == name);
            if field.is_none() {
                tracing::debug!("ignoring unknown {} field '{}'", section.title(), name);
            }
            field
        })
        .collect()
}

fn set_script_info_field(info: &mut ScriptInfo, field: &str, value: &str) {
    match field {
        "ScriptType" => info.script_type = value.to_string(),
        "Collisions" => info.collisions = value.to_string(),
        "PlayResX" => set(&mut info.play_res_x, parse_int(value)),
        "PlayResY" => set(&mut info.play_res_y, parse_int(value)),
        "Timer" => set(&mut info.timer, parse_float(value)),
        _ => {}
    }
}

fn set_style_field(style: &mut Style, field: &str, value: &str, legacy: bool) {
    match field {
        "Name" => style.name = value.to_string(),
        "Fontname" => style.font_name = value.to_string(),
        "Fontsize" => set(&mut style.font_size, parse_int(value)),
        "PrimaryColour" => set(&mut style.primary_color, parse_color(value)),
        "SecondaryColour" => set(&mut style.secondary_color, parse_color(value)),
        "OutlineColour" | "TertiaryColour" => set(&mut style.outline_color, parse_color(value)),
        "BackColour" => set(&mut style.back_color, parse_color(value)),
        "Bold" => set(&mut style.bold, parse_int(value)),
        "Italic" => set(&mut style.italic, parse_int(value)),
        "Underline" => set(&mut style.underline, parse_int(value)),
        "StrikeOut" => set(&mut style.strikeout, parse_int(value)),
        "ScaleX" => set(&mut style.scale_x, parse_float(value)),
        "ScaleY" => set(&mut style.scale_y, parse_float(value)),
        "Spacing" => set(&mut style.spacing, parse_float(value)),
        "Angle" => set(&mut style.angle, parse_float(value)),
        "BorderStyle" => set(&mut style.border_style, parse_int(value)),
        "Outline" => set(&mut style.outline, parse_float(value)),
        "Shadow" => set(&mut style.shadow, parse_float(value)),
        "Alignment" if legacy => set(&mut style.alignment, parse_int(value).map(v4_alignment)),
        "Alignment" => set(&mut style.alignment, parse_int(value)),
        "MarginL" => set(&mut style.margin_l, parse_int(value)),
        "MarginR" => set(&mut style.margin_r, parse_int(value)),
        "MarginV" => set(&mut style.margin_v, parse_int(value)),
        "AlphaLevel" => set(&mut style.alpha_level, parse_int(value)),
        "Encoding" => set(&mut style.encoding, parse_int(value)),
        _ => {}
    }
}

fn set_dialog_field(dialog: &mut Dialog, field: &str, value: &str) {
    match field {
        "ReadOrder" => set(&mut dialog.readorder, parse_int(value)),
        "Layer" => set(&mut dialog.layer, parse_int(value)),
        "Start" => set(&mut dialog.start, parse_timestamp(value)),
        "End" => set(&mut dialog.end, parse_timestamp(value)),
        "Style" => dialog.style = value.to_string(),
        "Name" => dialog.name = value.to_string(),
        "MarginL" => set(&mut dialog.margin_l, parse_int(value)),
        "MarginR" => set(&mut dialog.margin_r, parse_int(value)),
        "MarginV" => set(&mut dialog.margin_v, parse_int(value)),
        "Effect" => dialog.effect = value.to_string(),
        "Text" => dialog.text = value.to_string(),
        _ => {}
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Length of the leading `[+-]digits` run
fn int_prefix(s: &str) -> usize {
    let bytes = s.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits = bytes[sign..].iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        0
    } else {
        sign + digits
    }
}

/// Leading integer, trailing garbage ignored
fn parse_int(value: &str) -> Option<i32> {
    let value = value.trim_start();
    value[..int_prefix(value)].parse().ok()
}

/// Leading decimal number, trailing garbage ignored
fn parse_float(value: &str) -> Option<f32> {
    let value = value.trim_start();
    let bytes = value.as_bytes();
    let digits_from = |start: usize| bytes[start..].iter().take_while(|b| b.is_ascii_digit()).count();

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = digits_from(end);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits_from(end + 1);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return None;
    }
    value[..end].parse().ok()
}

/// `&HAABBGGRR` with up to eight hex digits, or a decimal value
fn parse_color(value: &str) -> Option<u32> {
    let value = value.trim_start();
    if let Some(hex) = value.strip_prefix("&H") {
        let digits: String = hex.chars().take_while(char::is_ascii_hexdigit).take(8).collect();
        if let Ok(color) = u32::from_str_radix(&digits, 16) {
            return Some(color);
        }
    }
    parse_int(value).map(|v| v as u32)
}

/// `h:mm:ss.cc` in centiseconds
fn parse_timestamp(value: &str) -> Option<i32> {
    let value = value.trim();
    let (h, rest) = value.split_once(':')?;
    let (m, rest) = rest.split_once(':')?;
    let (s, cs) = rest.split_once('.')?;
    let cs = &cs[..int_prefix(cs).min(2)];
    let h: i32 = h.trim().parse().ok()?;
    let m: i32 = m.parse().ok()?;
    let s: i32 = s.parse().ok()?;
    let cs: i32 = cs.parse().ok()?;
    Some(360_000 * h + 6_000 * m + 100 * s + cs)
}

/// V4 alignment (1-3 bottom, +4 top, +8 middle) to numpad layout
fn v4_alignment(a: i32) -> i32 {
    a + ((a & 4) >> 1) - 5 * i32::from(a & 8 != 0)
}
