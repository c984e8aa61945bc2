//! Raw media frames
//!
//! A [`Frame`] is a tagged union of decoded audio samples and video
//! pictures. Frames handed to an encoder are owned by it until consumed;
//! nothing is shared, so the sample planes are plain vectors.

use crate::error::{MediaError, MediaResult};
use crate::format::{ChannelLayout, MediaType, PixelFormat, SampleFormat};

/// Decoded audio samples
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    /// Sample format
    pub format: SampleFormat,
    /// Channel layout
    pub layout: ChannelLayout,
    /// Sample rate in Hz
    pub sample_rate: u32,
    nb_samples: usize,
    planes: Vec<Vec<u8>>,
}

impl AudioData {
    /// Allocate `nb_samples` samples of silence
    pub fn silent(
        format: SampleFormat,
        layout: ChannelLayout,
        sample_rate: u32,
        nb_samples: usize,
    ) -> Self {
        let channels = layout.channels() as usize;
        let plane_count = if format.is_planar() { channels } else { 1 };
        let plane_len = Self::plane_len(format, channels, nb_samples);
        Self {
            format,
            layout,
            sample_rate,
            nb_samples,
            planes: vec![vec![format.silence_byte(); plane_len]; plane_count],
        }
    }

    /// Wrap existing sample planes
    ///
    /// Packed formats take a single plane with interleaved channels, planar
    /// formats take one plane per channel.
    pub fn from_planes(
        format: SampleFormat,
        layout: ChannelLayout,
        sample_rate: u32,
        nb_samples: usize,
        planes: Vec<Vec<u8>>,
    ) -> MediaResult<Self> {
        let channels = layout.channels() as usize;
        let expected_planes = if format.is_planar() { channels } else { 1 };
        if planes.len() != expected_planes {
            return Err(MediaError::invalid_argument(format!(
                "{} audio with {} channels needs {} planes, got {}",
                format,
                channels,
                expected_planes,
                planes.len()
            )));
        }
        let plane_len = Self::plane_len(format, channels, nb_samples);
        if let Some(plane) = planes.iter().find(|p| p.len() != plane_len) {
            return Err(MediaError::invalid_argument(format!(
                "audio plane holds {} bytes, expected {}",
                plane.len(),
                plane_len
            )));
        }
        Ok(Self {
            format,
            layout,
            sample_rate,
            nb_samples,
            planes,
        })
    }

    fn plane_len(format: SampleFormat, channels: usize, nb_samples: usize) -> usize {
        let per_sample = if format.is_planar() { 1 } else { channels };
        nb_samples * per_sample * format.bytes_per_sample()
    }

    /// Number of samples per channel
    pub fn nb_samples(&self) -> usize {
        self.nb_samples
    }

    /// Number of channels
    pub fn channels(&self) -> usize {
        self.layout.channels() as usize
    }

    /// Sample planes
    pub fn planes(&self) -> &[Vec<u8>] {
        &self.planes
    }

    /// Mutable sample planes
    ///
    /// Plane contents may change, their lengths stay fixed by the format.
    pub fn planes_mut(&mut self) -> impl Iterator<Item = &mut [u8]> + '_ {
        self.planes.iter_mut().map(Vec::as_mut_slice)
    }

    /// Bytes occupied by one sample in one plane
    fn stride(&self) -> usize {
        let per_sample = if self.format.is_planar() {
            1
        } else {
            self.channels()
        };
        per_sample * self.format.bytes_per_sample()
    }

    /// Copy `count` samples from `src` at `src_offset` into `self` at
    /// `dst_offset`
    pub fn copy_samples_from(
        &mut self,
        dst_offset: usize,
        src: &AudioData,
        src_offset: usize,
        count: usize,
    ) -> MediaResult<()> {
        if src.format != self.format || src.channels() != self.channels() {
            return Err(MediaError::invalid_argument(format!(
                "cannot copy {} {}ch samples into {} {}ch audio",
                src.format,
                src.channels(),
                self.format,
                self.channels()
            )));
        }
        if dst_offset + count > self.nb_samples || src_offset + count > src.nb_samples {
            return Err(MediaError::invalid_argument("sample range out of bounds"));
        }
        let stride = self.stride();
        for (dst, src) in self.planes.iter_mut().zip(&src.planes) {
            dst[dst_offset * stride..(dst_offset + count) * stride]
                .copy_from_slice(&src[src_offset * stride..(src_offset + count) * stride]);
        }
        Ok(())
    }

    /// Overwrite `count` samples starting at `offset` with silence
    pub fn set_silence(&mut self, offset: usize, count: usize) -> MediaResult<()> {
        if offset + count > self.nb_samples {
            return Err(MediaError::invalid_argument("sample range out of bounds"));
        }
        let stride = self.stride();
        let silence = self.format.silence_byte();
        for plane in &mut self.planes {
            plane[offset * stride..(offset + count) * stride].fill(silence);
        }
        Ok(())
    }
}

/// Decoded video picture
#[derive(Debug, Clone, PartialEq)]
pub struct VideoData {
    /// Pixel format
    pub format: PixelFormat,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    planes: Vec<Vec<u8>>,
}

impl VideoData {
    /// Allocate a zero-filled picture
    pub fn blank(format: PixelFormat, width: u32, height: u32) -> Self {
        let planes = format
            .plane_sizes(width, height)
            .into_iter()
            .map(|len| vec![0u8; len])
            .collect();
        Self {
            format,
            width,
            height,
            planes,
        }
    }

    /// Wrap existing planes, checking their sizes against the format
    pub fn from_planes(
        format: PixelFormat,
        width: u32,
        height: u32,
        planes: Vec<Vec<u8>>,
    ) -> MediaResult<Self> {
        let sizes = format.plane_sizes(width, height);
        let actual: Vec<usize> = planes.iter().map(Vec::len).collect();
        if sizes != actual {
            return Err(MediaError::invalid_argument(format!(
                "{} {}x{} expects planes of {:?} bytes, got {:?}",
                format, width, height, sizes, actual
            )));
        }
        Ok(Self {
            format,
            width,
            height,
            planes,
        })
    }

    /// Picture planes
    pub fn planes(&self) -> &[Vec<u8>] {
        &self.planes
    }

    /// Mutable picture planes
    pub fn planes_mut(&mut self) -> impl Iterator<Item = &mut [u8]> + '_ {
        self.planes.iter_mut().map(Vec::as_mut_slice)
    }

    /// Total byte size of all planes
    pub fn byte_size(&self) -> usize {
        self.planes.iter().map(Vec::len).sum()
    }
}

/// Payload of a frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameData {
    /// Audio samples
    Audio(AudioData),
    /// Video picture
    Video(VideoData),
}

/// A raw media frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Presentation timestamp in the encoder time base
    pub pts: Option<i64>,
    /// Frame payload
    pub data: FrameData,
}

impl Frame {
    /// Create an audio frame
    pub fn audio(data: AudioData) -> Self {
        Self {
            pts: None,
            data: FrameData::Audio(data),
        }
    }

    /// Create a video frame
    pub fn video(data: VideoData) -> Self {
        Self {
            pts: None,
            data: FrameData::Video(data),
        }
    }

    /// Set the presentation timestamp
    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = Some(pts);
        self
    }

    /// Media type of the frame
    pub fn media_type(&self) -> MediaType {
        match self.data {
            FrameData::Audio(_) => MediaType::Audio,
            FrameData::Video(_) => MediaType::Video,
        }
    }

    /// Audio payload, if this is an audio frame
    pub fn as_audio(&self) -> Option<&AudioData> {
        match &self.data {
            FrameData::Audio(audio) => Some(audio),
            FrameData::Video(_) => None,
        }
    }

    /// Video payload, if this is a video frame
    pub fn as_video(&self) -> Option<&VideoData> {
        match &self.data {
            FrameData::Video(video) => Some(video),
            FrameData::Audio(_) => None,
        }
    }

    /// Number of audio samples per channel, 0 for video
    pub fn nb_samples(&self) -> usize {
        self.as_audio().map(AudioData::nb_samples).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_audio_layout() {
        let packed = AudioData::silent(SampleFormat::S16, ChannelLayout::STEREO, 48000, 4);
        assert_eq!(packed.planes().len(), 1);
        assert_eq!(packed.planes()[0].len(), 16);

        let planar = AudioData::silent(SampleFormat::U8p, ChannelLayout::STEREO, 48000, 4);
        assert_eq!(planar.planes().len(), 2);
        assert!(planar.planes()[1].iter().all(|&b| b == 0x80));
    }

    #[test]
    fn test_from_planes_validates_sizes() {
        let result = AudioData::from_planes(
            SampleFormat::F32p,
            ChannelLayout::STEREO,
            48000,
            2,
            vec![vec![0; 8]],
        );
        assert!(result.is_err());

        let result = VideoData::from_planes(PixelFormat::Gray8, 2, 2, vec![vec![0; 3]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_copy_and_silence() {
        let src = AudioData::from_planes(
            SampleFormat::U8,
            ChannelLayout::MONO,
            8000,
            3,
            vec![vec![1, 2, 3]],
        )
        .unwrap();
        let mut dst = AudioData::silent(SampleFormat::U8, ChannelLayout::MONO, 8000, 5);
        dst.copy_samples_from(0, &src, 0, 3).unwrap();
        assert_eq!(dst.planes()[0], vec![1, 2, 3, 0x80, 0x80]);

        dst.set_silence(1, 1).unwrap();
        assert_eq!(dst.planes()[0], vec![1, 0x80, 3, 0x80, 0x80]);
        assert!(dst.set_silence(4, 2).is_err());
    }

    #[test]
    fn test_planes_mut_keeps_plane_sizes() {
        let mut src = AudioData::silent(SampleFormat::S16p, ChannelLayout::STEREO, 48000, 4);
        for (i, plane) in src.planes_mut().enumerate() {
            plane.fill(i as u8 + 1);
        }
        assert!(src.planes().iter().all(|p| p.len() == 8));

        let mut padded = AudioData::silent(SampleFormat::S16p, ChannelLayout::STEREO, 48000, 6);
        padded.copy_samples_from(0, &src, 0, 4).unwrap();
        assert_eq!(padded.planes()[1], vec![2, 2, 2, 2, 2, 2, 2, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn test_frame_accessors() {
        let frame = Frame::video(VideoData::blank(PixelFormat::Yuv420p, 4, 4)).with_pts(7);
        assert_eq!(frame.media_type(), MediaType::Video);
        assert_eq!(frame.pts, Some(7));
        assert_eq!(frame.nb_samples(), 0);
        assert_eq!(frame.as_video().unwrap().byte_size(), 24);
        assert!(frame.as_audio().is_none());
    }
}
