//! Media format identifiers
//!
//! Pixel, sample and subtitle formats, structured channel layouts and the
//! rational time base used to stamp frames and packets. Every format has a
//! stable short name (`yuv420p`, `fltp`, `stereo`) used for parsing, display
//! and serialization.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MediaError, MediaResult};

/// Kind of media carried by a frame, packet or link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Video frames
    Video,
    /// Audio samples
    Audio,
    /// Subtitle events
    Subtitle,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Video => write!(f, "video"),
            MediaType::Audio => write!(f, "audio"),
            MediaType::Subtitle => write!(f, "subtitle"),
        }
    }
}

// ============================================================================
// PIXEL FORMATS
// ============================================================================

/// Pixel format for video frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PixelFormat {
    /// Planar YUV 4:2:0
    Yuv420p,
    /// Planar YUV 4:2:2
    Yuv422p,
    /// Planar YUV 4:4:4
    Yuv444p,
    /// Planar YUV 4:2:0 with alpha plane
    Yuva420p,
    /// Semi-planar YUV 4:2:0
    Nv12,
    /// Packed RGB 8:8:8
    Rgb24,
    /// Packed BGR 8:8:8
    Bgr24,
    /// Packed RGBA 8:8:8:8
    Rgba,
    /// Packed BGRA 8:8:8:8
    Bgra,
    /// Packed ARGB 8:8:8:8
    Argb,
    /// 8-bit grayscale
    Gray8,
    /// 16-bit grayscale, little endian
    Gray16le,
    /// 8-bit grayscale with alpha
    Ya8,
}

/// Static properties of a pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormatDescriptor {
    /// Short name
    pub name: &'static str,
    /// Number of components, alpha included
    pub nb_components: u8,
    /// Number of planes
    pub planes: u8,
    /// Whether the format carries an alpha channel
    pub has_alpha: bool,
    /// Bytes per pixel of the first plane
    pub bytes_per_pixel: u8,
    /// log2 of chroma subsampling, horizontal and vertical
    pub chroma_shift: (u8, u8),
}

impl PixelFormat {
    /// Every supported pixel format, in declaration order
    pub const ALL: [PixelFormat; 13] = [
        PixelFormat::Yuv420p,
        PixelFormat::Yuv422p,
        PixelFormat::Yuv444p,
        PixelFormat::Yuva420p,
        PixelFormat::Nv12,
        PixelFormat::Rgb24,
        PixelFormat::Bgr24,
        PixelFormat::Rgba,
        PixelFormat::Bgra,
        PixelFormat::Argb,
        PixelFormat::Gray8,
        PixelFormat::Gray16le,
        PixelFormat::Ya8,
    ];

    /// Get the static descriptor for this format
    pub fn descriptor(&self) -> PixelFormatDescriptor {
        let d = |name, nb_components, planes, has_alpha, bytes_per_pixel, chroma_shift| {
            PixelFormatDescriptor {
                name,
                nb_components,
                planes,
                has_alpha,
                bytes_per_pixel,
                chroma_shift,
            }
        };
        match self {
            PixelFormat::Yuv420p => d("yuv420p", 3, 3, false, 1, (1, 1)),
            PixelFormat::Yuv422p => d("yuv422p", 3, 3, false, 1, (1, 0)),
            PixelFormat::Yuv444p => d("yuv444p", 3, 3, false, 1, (0, 0)),
            PixelFormat::Yuva420p => d("yuva420p", 4, 4, true, 1, (1, 1)),
            PixelFormat::Nv12 => d("nv12", 3, 2, false, 1, (1, 1)),
            PixelFormat::Rgb24 => d("rgb24", 3, 1, false, 3, (0, 0)),
            PixelFormat::Bgr24 => d("bgr24", 3, 1, false, 3, (0, 0)),
            PixelFormat::Rgba => d("rgba", 4, 1, true, 4, (0, 0)),
            PixelFormat::Bgra => d("bgra", 4, 1, true, 4, (0, 0)),
            PixelFormat::Argb => d("argb", 4, 1, true, 4, (0, 0)),
            PixelFormat::Gray8 => d("gray", 1, 1, false, 1, (0, 0)),
            PixelFormat::Gray16le => d("gray16le", 1, 1, false, 2, (0, 0)),
            PixelFormat::Ya8 => d("ya8", 2, 1, true, 2, (0, 0)),
        }
    }

    /// Short name of the format
    pub fn name(&self) -> &'static str {
        self.descriptor().name
    }

    /// Whether the format carries an alpha channel
    pub fn has_alpha(&self) -> bool {
        self.descriptor().has_alpha
    }

    /// Whether the format has more than one component
    pub fn is_multi_component(&self) -> bool {
        self.descriptor().nb_components > 1
    }

    /// Byte size of each plane for a `width` x `height` image
    pub fn plane_sizes(&self, width: u32, height: u32) -> Vec<usize> {
        let desc = self.descriptor();
        let (w, h) = (width as usize, height as usize);
        let (sx, sy) = (desc.chroma_shift.0 as u32, desc.chroma_shift.1 as u32);
        let cw = ((width + (1 << sx) - 1) >> sx) as usize;
        let ch = ((height + (1 << sy) - 1) >> sy) as usize;
        match self {
            PixelFormat::Nv12 => vec![w * h, cw * ch * 2],
            _ if desc.planes == 1 => vec![w * h * desc.bytes_per_pixel as usize],
            _ => (0..desc.planes)
                .map(|p| if p == 0 || p == 3 { w * h } else { cw * ch })
                .collect(),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = MediaError;

    fn from_str(s: &str) -> MediaResult<Self> {
        PixelFormat::ALL
            .iter()
            .copied()
            .find(|fmt| fmt.name() == s)
            .ok_or_else(|| MediaError::UnsupportedFormat {
                format: format!("pixel format '{}'", s),
            })
    }
}

impl From<PixelFormat> for String {
    fn from(fmt: PixelFormat) -> Self {
        fmt.name().to_string()
    }
}

impl TryFrom<String> for PixelFormat {
    type Error = MediaError;

    fn try_from(s: String) -> MediaResult<Self> {
        s.parse()
    }
}

// ============================================================================
// SAMPLE FORMATS
// ============================================================================

/// Sample format for audio data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SampleFormat {
    /// Unsigned 8-bit
    U8,
    /// Signed 16-bit, native endian
    S16,
    /// Signed 32-bit, native endian
    S32,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Unsigned 8-bit planar
    U8p,
    /// Signed 16-bit planar
    S16p,
    /// Signed 32-bit planar
    S32p,
    /// 32-bit float planar
    F32p,
    /// 64-bit float planar
    F64p,
}

impl SampleFormat {
    /// Every supported sample format, in declaration order
    pub const ALL: [SampleFormat; 10] = [
        SampleFormat::U8,
        SampleFormat::S16,
        SampleFormat::S32,
        SampleFormat::F32,
        SampleFormat::F64,
        SampleFormat::U8p,
        SampleFormat::S16p,
        SampleFormat::S32p,
        SampleFormat::F32p,
        SampleFormat::F64p,
    ];

    /// Get the number of bytes per sample
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::U8 | Self::U8p => 1,
            Self::S16 | Self::S16p => 2,
            Self::S32 | Self::S32p | Self::F32 | Self::F32p => 4,
            Self::F64 | Self::F64p => 8,
        }
    }

    /// Check if this is a planar format
    pub fn is_planar(&self) -> bool {
        matches!(
            self,
            Self::U8p | Self::S16p | Self::S32p | Self::F32p | Self::F64p
        )
    }

    /// Get the packed equivalent of this format
    pub fn to_packed(&self) -> Self {
        match self {
            Self::U8p => Self::U8,
            Self::S16p => Self::S16,
            Self::S32p => Self::S32,
            Self::F32p => Self::F32,
            Self::F64p => Self::F64,
            other => *other,
        }
    }

    /// Get the planar equivalent of this format
    pub fn to_planar(&self) -> Self {
        match self {
            Self::U8 => Self::U8p,
            Self::S16 => Self::S16p,
            Self::S32 => Self::S32p,
            Self::F32 => Self::F32p,
            Self::F64 => Self::F64p,
            other => *other,
        }
    }

    /// Byte value that encodes silence
    ///
    /// Unsigned 8-bit samples are centred on 0x80, every other format is
    /// silent at all-zero bytes.
    pub fn silence_byte(&self) -> u8 {
        match self {
            Self::U8 | Self::U8p => 0x80,
            _ => 0,
        }
    }

    /// Short name of the format
    pub fn name(&self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::S16 => "s16",
            Self::S32 => "s32",
            Self::F32 => "flt",
            Self::F64 => "dbl",
            Self::U8p => "u8p",
            Self::S16p => "s16p",
            Self::S32p => "s32p",
            Self::F32p => "fltp",
            Self::F64p => "dblp",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = MediaError;

    fn from_str(s: &str) -> MediaResult<Self> {
        SampleFormat::ALL
            .iter()
            .copied()
            .find(|fmt| fmt.name() == s)
            .ok_or_else(|| MediaError::UnsupportedFormat {
                format: format!("sample format '{}'", s),
            })
    }
}

impl From<SampleFormat> for String {
    fn from(fmt: SampleFormat) -> Self {
        fmt.name().to_string()
    }
}

impl TryFrom<String> for SampleFormat {
    type Error = MediaError;

    fn try_from(s: String) -> MediaResult<Self> {
        s.parse()
    }
}

/// Subtitle representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    /// Paletted bitmap rectangles
    Bitmap,
    /// Styled text events
    Ass,
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubtitleFormat::Bitmap => write!(f, "bitmap"),
            SubtitleFormat::Ass => write!(f, "ass"),
        }
    }
}

// ============================================================================
// CHANNEL LAYOUTS
// ============================================================================

bitflags! {
    /// Speaker positions making up a known channel layout
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Channels: u64 {
        /// Front left
        const FRONT_LEFT = 1 << 0;
        /// Front right
        const FRONT_RIGHT = 1 << 1;
        /// Front center
        const FRONT_CENTER = 1 << 2;
        /// Low frequency effects
        const LOW_FREQUENCY = 1 << 3;
        /// Back left
        const BACK_LEFT = 1 << 4;
        /// Back right
        const BACK_RIGHT = 1 << 5;
        /// Front left of center
        const FRONT_LEFT_OF_CENTER = 1 << 6;
        /// Front right of center
        const FRONT_RIGHT_OF_CENTER = 1 << 7;
        /// Back center
        const BACK_CENTER = 1 << 8;
        /// Side left
        const SIDE_LEFT = 1 << 9;
        /// Side right
        const SIDE_RIGHT = 1 << 10;
        /// Top center
        const TOP_CENTER = 1 << 11;
    }
}

const NAMED_LAYOUTS: &[(&str, u64)] = &[
    ("mono", 0x4),
    ("stereo", 0x3),
    ("2.1", 0xb),
    ("3.0", 0x7),
    ("3.0(back)", 0x103),
    ("4.0", 0x107),
    ("quad", 0x33),
    ("quad(side)", 0x603),
    ("3.1", 0xf),
    ("5.0", 0x37),
    ("5.0(side)", 0x607),
    ("4.1", 0x10f),
    ("5.1", 0x3f),
    ("5.1(side)", 0x60f),
    ("6.0", 0x137),
    ("6.1", 0x13f),
    ("7.0", 0x637),
    ("7.1", 0x63f),
    ("7.1(wide)", 0xff),
];

/// Audio channel layout
///
/// A layout is either *known*, listing the exact speaker positions, or
/// *unspecified*, carrying only a channel count. Two known layouts are equal
/// only if their masks match; an unspecified layout is compatible with any
/// known layout with the same number of channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ChannelLayout {
    /// Explicit speaker positions
    Known(Channels),
    /// Channel count only
    Unspecified(u32),
}

impl ChannelLayout {
    /// Mono layout
    pub const MONO: ChannelLayout = ChannelLayout::Known(Channels::FRONT_CENTER);
    /// Stereo layout
    pub const STEREO: ChannelLayout =
        ChannelLayout::Known(Channels::FRONT_LEFT.union(Channels::FRONT_RIGHT));
    /// 5.1 layout with back surrounds
    pub const SURROUND_5_1: ChannelLayout = ChannelLayout::Known(Channels::from_bits_retain(0x3f));

    /// Known layout from a raw speaker mask
    pub fn from_mask(mask: u64) -> Self {
        ChannelLayout::Known(Channels::from_bits_retain(mask))
    }

    /// Default layout for a channel count
    ///
    /// Returns the conventional known layout when one exists for the count,
    /// otherwise an unspecified layout.
    pub fn default_for_channels(channels: u32) -> Self {
        let mask = match channels {
            1 => 0x4,
            2 => 0x3,
            3 => 0x7,
            4 => 0x107,
            5 => 0x37,
            6 => 0x3f,
            7 => 0x13f,
            8 => 0x63f,
            n => return ChannelLayout::Unspecified(n),
        };
        ChannelLayout::from_mask(mask)
    }

    /// Number of channels
    pub fn channels(&self) -> u32 {
        match self {
            ChannelLayout::Known(mask) => mask.bits().count_ones(),
            ChannelLayout::Unspecified(n) => *n,
        }
    }

    /// Whether the layout lists speaker positions
    pub fn is_known(&self) -> bool {
        matches!(self, ChannelLayout::Known(_))
    }

    /// Raw speaker mask, zero for unspecified layouts
    pub fn mask(&self) -> u64 {
        match self {
            ChannelLayout::Known(mask) => mask.bits(),
            ChannelLayout::Unspecified(_) => 0,
        }
    }

    /// A layout is valid when it has at least one channel
    pub fn is_valid(&self) -> bool {
        self.channels() > 0
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelLayout::Known(mask) => {
                match NAMED_LAYOUTS.iter().find(|(_, m)| *m == mask.bits()) {
                    Some((name, _)) => f.write_str(name),
                    None => write!(f, "0x{:x}", mask.bits()),
                }
            }
            ChannelLayout::Unspecified(n) => write!(f, "{} channels", n),
        }
    }
}

impl FromStr for ChannelLayout {
    type Err = MediaError;

    /// Parse a layout name (`stereo`), a hex mask (`0x3`), or a bare channel
    /// count (`2c`, `2 channels`)
    fn from_str(s: &str) -> MediaResult<Self> {
        let s = s.trim();
        let invalid = || MediaError::invalid_argument(format!("invalid channel layout '{}'", s));

        if let Some((_, mask)) = NAMED_LAYOUTS.iter().find(|(name, _)| *name == s) {
            return Ok(ChannelLayout::from_mask(*mask));
        }
        if let Some(hex) = s.strip_prefix("0x") {
            let mask = u64::from_str_radix(hex, 16).map_err(|_| invalid())?;
            if mask == 0 {
                return Err(invalid());
            }
            return Ok(ChannelLayout::from_mask(mask));
        }
        let count = s
            .strip_suffix(" channels")
            .or_else(|| s.strip_suffix('c'))
            .ok_or_else(invalid)?;
        match count.parse::<u32>() {
            Ok(n) if n > 0 => Ok(ChannelLayout::Unspecified(n)),
            _ => Err(invalid()),
        }
    }
}

impl From<ChannelLayout> for String {
    fn from(layout: ChannelLayout) -> Self {
        layout.to_string()
    }
}

impl TryFrom<String> for ChannelLayout {
    type Error = MediaError;

    fn try_from(s: String) -> MediaResult<Self> {
        s.parse()
    }
}

// ============================================================================
// TIME BASE
// ============================================================================

/// Rational number, used as the time base of timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    /// Numerator
    pub num: i32,
    /// Denominator
    pub den: i32,
}

impl Rational {
    /// Create a new rational
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// A time base is usable when both terms are positive
    pub fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// Rescale `value` from time base `from` to time base `to`
    ///
    /// Rounds to the nearest integer, halfway cases away from zero.
    pub fn rescale(value: i64, from: Rational, to: Rational) -> i64 {
        let num = value as i128 * from.num as i128 * to.den as i128;
        let den = from.den as i128 * to.num as i128;
        if den == 0 {
            return 0;
        }
        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        let half = den / 2;
        let rounded = if num >= 0 {
            (num + half) / den
        } else {
            (num - half) / den
        };
        rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_names_round_trip() {
        for fmt in PixelFormat::ALL {
            assert_eq!(fmt.name().parse::<PixelFormat>().unwrap(), fmt);
        }
        assert!("yuv9000p".parse::<PixelFormat>().is_err());
    }

    #[test]
    fn test_pixel_format_descriptor_flags() {
        assert!(PixelFormat::Rgba.has_alpha());
        assert!(!PixelFormat::Gray8.has_alpha());
        assert!(!PixelFormat::Gray8.is_multi_component());
        assert!(PixelFormat::Yuv420p.is_multi_component());
        assert!(PixelFormat::Ya8.has_alpha());
    }

    #[test]
    fn test_plane_sizes() {
        assert_eq!(
            PixelFormat::Yuv420p.plane_sizes(4, 4),
            vec![16, 4, 4]
        );
        assert_eq!(PixelFormat::Rgba.plane_sizes(2, 2), vec![16]);
        assert_eq!(PixelFormat::Nv12.plane_sizes(4, 2), vec![8, 4]);
        assert_eq!(
            PixelFormat::Yuva420p.plane_sizes(2, 2),
            vec![4, 1, 1, 4]
        );
    }

    #[test]
    fn test_sample_format_silence() {
        assert_eq!(SampleFormat::U8.silence_byte(), 0x80);
        assert_eq!(SampleFormat::U8p.silence_byte(), 0x80);
        assert_eq!(SampleFormat::S16.silence_byte(), 0);
        assert_eq!(SampleFormat::F32p.silence_byte(), 0);
        assert_eq!("fltp".parse::<SampleFormat>().unwrap(), SampleFormat::F32p);
    }

    #[test]
    fn test_channel_layout_parsing() {
        assert_eq!("stereo".parse::<ChannelLayout>().unwrap(), ChannelLayout::STEREO);
        assert_eq!(
            "2c".parse::<ChannelLayout>().unwrap(),
            ChannelLayout::Unspecified(2)
        );
        assert_eq!(
            "6 channels".parse::<ChannelLayout>().unwrap(),
            ChannelLayout::Unspecified(6)
        );
        assert_eq!(
            "0x3f".parse::<ChannelLayout>().unwrap(),
            ChannelLayout::SURROUND_5_1
        );
        assert!("0c".parse::<ChannelLayout>().is_err());
        assert!("surround".parse::<ChannelLayout>().is_err());
    }

    #[test]
    fn test_channel_layout_display() {
        assert_eq!(ChannelLayout::STEREO.to_string(), "stereo");
        assert_eq!(ChannelLayout::SURROUND_5_1.to_string(), "5.1");
        assert_eq!(ChannelLayout::Unspecified(3).to_string(), "3 channels");
        assert_eq!(ChannelLayout::from_mask(0x800).to_string(), "0x800");
        assert_eq!(ChannelLayout::STEREO.channels(), 2);
        assert_eq!(ChannelLayout::default_for_channels(2), ChannelLayout::STEREO);
        assert_eq!(
            ChannelLayout::default_for_channels(12),
            ChannelLayout::Unspecified(12)
        );
    }

    #[test]
    fn test_rescale_rounds_to_nearest() {
        let samples = Rational::new(1, 48000);
        assert_eq!(Rational::rescale(1024, samples, Rational::new(1, 48000)), 1024);
        assert_eq!(Rational::rescale(1024, samples, Rational::new(1, 1000)), 21);
        assert_eq!(Rational::rescale(24, samples, Rational::new(1, 1000)), 1);
        assert_eq!(Rational::rescale(-24, samples, Rational::new(1, 1000)), -1);
        assert!(!Rational::new(0, 1).is_valid());
    }
}
