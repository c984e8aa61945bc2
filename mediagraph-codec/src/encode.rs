//! Encoder pump
//!
//! [`Encoder`] turns a codec implementation into a non-blocking
//! submit/pull session. At most one input frame and one output packet are
//! buffered at any time: [`Encoder::submit`] refuses a second frame with
//! [`MediaError::InputFull`] until [`Encoder::pull`] has made room, and
//! `pull` answers [`PullResult::Pending`] when the codec needs more input.
//!
//! Submitting `None` starts draining. Once the codec has nothing left the
//! session reports [`PullResult::EndOfStream`] on every further pull
//! without calling the codec again.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use mediagraph_core::{
    alloc_refcounted, AudioData, BufferAllocator, ChannelLayout, DefaultAllocator, Frame,
    FrameData, MediaError, MediaResult, MediaType, Packet, PacketFlags, PixelFormat, Rational,
    SampleFormat, ScratchBuffer, VideoData,
};

use crate::codecs::{
    Codec, CodecBackend, CodecCapabilities, CodecDescriptor, CodecProperties, FrameEncoder,
    ReceiveStatus,
};

/// Parameters of an encoding session
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Time base of packet timestamps
    pub time_base: Rational,
    /// Target bit rate in bits per second, 0 when unset
    pub bit_rate: i64,
    /// Pixel format (video)
    pub pixel_format: Option<PixelFormat>,
    /// Picture width (video)
    pub width: u32,
    /// Picture height (video)
    pub height: u32,
    /// Sample format (audio)
    pub sample_format: Option<SampleFormat>,
    /// Sample rate in Hz (audio)
    pub sample_rate: u32,
    /// Channel layout (audio)
    pub channel_layout: Option<ChannelLayout>,
    /// Samples per frame; fixed frame size codecs pick one when 0
    pub frame_size: usize,
    /// Packet buffer allocator, [`DefaultAllocator`] when unset
    pub allocator: Option<Arc<dyn BufferAllocator>>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            time_base: Rational::new(0, 1),
            bit_rate: 0,
            pixel_format: None,
            width: 0,
            height: 0,
            sample_format: None,
            sample_rate: 0,
            channel_layout: None,
            frame_size: 0,
            allocator: None,
        }
    }
}

impl EncoderConfig {
    /// Audio session with a `1/sample_rate` time base
    pub fn audio(format: SampleFormat, sample_rate: u32, layout: ChannelLayout) -> Self {
        Self {
            time_base: Rational::new(1, sample_rate.min(i32::MAX as u32) as i32),
            sample_format: Some(format),
            sample_rate,
            channel_layout: Some(layout),
            ..Self::default()
        }
    }

    /// Video session with a `1/25` time base
    pub fn video(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            time_base: Rational::new(1, 25),
            pixel_format: Some(format),
            width,
            height,
            ..Self::default()
        }
    }

    /// Set the time base
    pub fn time_base(mut self, time_base: Rational) -> Self {
        self.time_base = time_base;
        self
    }

    /// Set the bit rate
    pub fn bit_rate(mut self, bit_rate: i64) -> Self {
        self.bit_rate = bit_rate;
        self
    }

    /// Request a frame size
    pub fn frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size;
        self
    }

    /// Install a packet buffer allocator
    pub fn allocator(mut self, allocator: Arc<dyn BufferAllocator>) -> Self {
        self.allocator = Some(allocator);
        self
    }
}

/// Encoder-side state handed to codec callbacks
#[derive(Debug)]
pub struct EncodeContext {
    config: EncoderConfig,
    scratch: ScratchBuffer,
    allocator: Arc<dyn BufferAllocator>,
    frame: Option<Frame>,
    draining: bool,
    draining_done: bool,
    last_audio_frame: bool,
    frame_size: usize,
    pad_samples: usize,
}

impl EncodeContext {
    fn new(config: EncoderConfig) -> Self {
        let allocator = config
            .allocator
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultAllocator) as Arc<dyn BufferAllocator>);
        Self {
            frame_size: config.frame_size,
            config,
            scratch: ScratchBuffer::new(),
            allocator,
            frame: None,
            draining: false,
            draining_done: false,
            last_audio_frame: false,
            pad_samples: 0,
        }
    }

    /// Session parameters, as validated at open
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Samples per audio frame, 0 when frames may be any size
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Set the samples per audio frame
    pub fn set_frame_size(&mut self, frame_size: usize) {
        self.frame_size = frame_size;
    }

    /// Set the granularity the last frame is padded to
    ///
    /// Defaults to the frame size.
    pub fn set_pad_samples(&mut self, pad_samples: usize) {
        self.pad_samples = pad_samples;
    }

    /// Whether a null frame has been submitted
    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Take the buffered input frame, if any
    pub fn take_frame(&mut self) -> Option<Frame> {
        if self.draining {
            return None;
        }
        self.frame.take()
    }

    /// Back `packet` by the encoder's scratch buffer
    ///
    /// The payload is copied into a reference-counted buffer when the
    /// packet leaves the encoder.
    pub fn alloc_packet(&mut self, packet: &mut Packet, size: i64) -> MediaResult<&mut [u8]> {
        self.scratch.alloc_packet(packet, size)
    }

    /// Give `packet` a reference-counted buffer from the installed
    /// allocator
    pub fn get_encode_buffer<'a>(
        &self,
        packet: &'a mut Packet,
        size: i64,
    ) -> MediaResult<&'a mut [u8]> {
        alloc_refcounted(self.allocator.as_ref(), packet, size).map_err(|e| {
            tracing::error!("get_encode_buffer() failed: {}", e);
            e
        })
    }

    /// Copy a scratch-backed payload into a reference-counted buffer
    pub fn make_refcounted(&self, packet: &mut Packet) -> MediaResult<()> {
        self.scratch.make_refcounted(self.allocator.as_ref(), packet)
    }

    /// Scratch bytes written through [`EncodeContext::alloc_packet`]
    pub fn scratch_data<'a>(&'a self, packet: &'a Packet) -> &'a [u8] {
        self.scratch.packet_data(packet)
    }

    /// Allocate a frame matching the session parameters
    ///
    /// Audio frames hold `frame_size` samples of silence, video frames are
    /// zero-filled.
    pub fn alloc_frame(&self) -> MediaResult<Frame> {
        let config = &self.config;
        if let (Some(format), Some(layout)) = (config.sample_format, config.channel_layout) {
            return Ok(Frame::audio(AudioData::silent(
                format,
                layout,
                config.sample_rate,
                self.frame_size,
            )));
        }
        match config.pixel_format {
            Some(format) => Ok(Frame::video(VideoData::blank(
                format,
                config.width,
                config.height,
            ))),
            None => Err(MediaError::invalid_argument(
                "session has no frame parameters",
            )),
        }
    }
}

/// Outcome of [`Encoder::pull`]
#[derive(Debug)]
pub enum PullResult {
    /// An encoded packet
    Packet(Packet),
    /// No packet yet; submit more input
    Pending,
    /// The encoder is fully drained
    EndOfStream,
}

/// Observable state of an [`Encoder`]
///
/// Encoding itself is not a state: the codec only runs inside `submit` and
/// `pull`, which hold the encoder mutably, and each call leaves it in one of
/// the states below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderState {
    /// Nothing buffered
    Idle,
    /// An input frame waits for the codec
    FrameBuffered,
    /// An encoded packet waits to be pulled
    PacketReady,
    /// The last pull asked for more input
    NeedMoreInput,
    /// A null frame was submitted and output remains
    Draining,
    /// Fully drained; every pull reports end of stream
    DrainingDone,
}

/// An encoding session
#[derive(Debug)]
pub struct Encoder {
    descriptor: CodecDescriptor,
    backend: CodecBackend,
    ctx: EncodeContext,
    buffer_packet: Packet,
    intra_only_flag: PacketFlags,
    awaiting_input: bool,
    frame_number: u64,
}

impl Encoder {
    /// Open a session with a fresh instance of `codec`
    pub fn open(codec: &dyn Codec, config: EncoderConfig) -> MediaResult<Self> {
        Self::open_with(codec.descriptor().clone(), codec.instantiate(), config)
    }

    /// Open a session with an existing encoder instance
    pub fn open_with(
        descriptor: CodecDescriptor,
        mut backend: CodecBackend,
        mut config: EncoderConfig,
    ) -> MediaResult<Self> {
        preinit(&descriptor, &mut config)?;

        let mut ctx = EncodeContext::new(config);
        match &mut backend {
            CodecBackend::Push(codec) => codec.open(&mut ctx)?,
            CodecBackend::Pull(codec) => codec.open(&mut ctx)?,
        }
        if descriptor.has_fixed_frame_size() && ctx.frame_size == 0 {
            tracing::error!("frame_size not set by encoder '{}'", descriptor.name);
            return Err(MediaError::configuration(format!(
                "codec '{}' requires a fixed frame size but did not set one",
                descriptor.name
            )));
        }

        let intra_only_flag = if descriptor.properties.contains(CodecProperties::INTRA_ONLY) {
            PacketFlags::KEY
        } else {
            PacketFlags::empty()
        };
        tracing::info!(
            "opened {} encoder '{}' (time base {}, frame size {})",
            descriptor.media_type,
            descriptor.name,
            ctx.config.time_base,
            ctx.frame_size
        );

        Ok(Self {
            descriptor,
            backend,
            ctx,
            buffer_packet: Packet::new(),
            intra_only_flag,
            awaiting_input: false,
            frame_number: 0,
        })
    }

    /// Codec description
    pub fn descriptor(&self) -> &CodecDescriptor {
        &self.descriptor
    }

    /// Session parameters after validation
    pub fn config(&self) -> &EncoderConfig {
        &self.ctx.config
    }

    /// Samples per audio frame, 0 for variable frame sizes
    pub fn frame_size(&self) -> usize {
        self.ctx.frame_size
    }

    /// Number of successful submissions, null frame included
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Current state
    pub fn state(&self) -> EncoderState {
        if self.ctx.draining_done {
            EncoderState::DrainingDone
        } else if !self.buffer_packet.is_empty() {
            EncoderState::PacketReady
        } else if self.ctx.draining {
            EncoderState::Draining
        } else if self.ctx.frame.is_some() {
            EncoderState::FrameBuffered
        } else if self.awaiting_input {
            EncoderState::NeedMoreInput
        } else {
            EncoderState::Idle
        }
    }

    /// Allocate a frame matching the session parameters
    pub fn alloc_frame(&self) -> MediaResult<Frame> {
        self.ctx.alloc_frame()
    }

    /// Submit a frame, or `None` to start draining
    pub fn submit(&mut self, frame: Option<Frame>) -> MediaResult<()> {
        if self.ctx.draining {
            return Err(MediaError::AlreadyDraining);
        }
        if self.ctx.frame.is_some() {
            return Err(MediaError::InputFull);
        }

        match frame {
            None => {
                tracing::debug!("encoder '{}' draining", self.descriptor.name);
                self.ctx.draining = true;
            }
            Some(frame) => {
                let frame = self.prepare_frame(frame)?;
                self.ctx.frame = Some(frame);
            }
        }
        self.awaiting_input = false;

        if self.buffer_packet.is_empty() {
            let mut packet = std::mem::take(&mut self.buffer_packet);
            let result = self.receive_internal(&mut packet);
            self.buffer_packet = packet;
            // backpressure and end of stream surface on the next pull
            result?;
        }

        self.frame_number += 1;
        Ok(())
    }

    /// Pull the next encoded packet
    pub fn pull(&mut self) -> MediaResult<PullResult> {
        if !self.buffer_packet.is_empty() {
            return Ok(PullResult::Packet(std::mem::take(&mut self.buffer_packet)));
        }

        let mut packet = Packet::new();
        match self.receive_internal(&mut packet)? {
            ReceiveStatus::Packet => Ok(PullResult::Packet(packet)),
            ReceiveStatus::NeedMoreInput => {
                self.awaiting_input = true;
                Ok(PullResult::Pending)
            }
            ReceiveStatus::EndOfStream => Ok(PullResult::EndOfStream),
        }
    }

    fn prepare_frame(&mut self, frame: Frame) -> MediaResult<Frame> {
        if frame.media_type() != self.descriptor.media_type {
            return Err(MediaError::invalid_argument(format!(
                "{} frame submitted to {} encoder '{}'",
                frame.media_type(),
                self.descriptor.media_type,
                self.descriptor.name
            )));
        }
        if let Some(video) = frame.as_video() {
            let config = &self.ctx.config;
            if Some(video.format) != config.pixel_format
                || video.width != config.width
                || video.height != config.height
            {
                return Err(MediaError::invalid_argument(format!(
                    "{}x{} {} frame does not match the {}x{} session",
                    video.width, video.height, video.format, config.width, config.height
                )));
            }
        }
        if self.descriptor.has_fixed_frame_size() {
            return self.check_frame_size(frame);
        }
        Ok(frame)
    }

    fn check_frame_size(&mut self, frame: Frame) -> MediaResult<Frame> {
        let frame_size = self.ctx.frame_size;
        let nb_samples = frame.nb_samples();

        // an undersized frame must have been the last one
        if self.ctx.last_audio_frame {
            tracing::error!(
                "frame_size ({}) was not respected for a non-last frame",
                frame_size
            );
            return Err(MediaError::SizeViolation {
                reason: format!(
                    "frame_size ({}) was not respected for a non-last frame",
                    frame_size
                ),
            });
        }
        if nb_samples > frame_size {
            tracing::error!("nb_samples ({}) > frame_size ({})", nb_samples, frame_size);
            return Err(MediaError::SizeViolation {
                reason: format!("nb_samples ({}) > frame_size ({})", nb_samples, frame_size),
            });
        }
        if nb_samples < frame_size {
            self.ctx.last_audio_frame = true;
            if !self
                .descriptor
                .capabilities
                .contains(CodecCapabilities::SMALL_LAST_FRAME)
            {
                let pad = if self.ctx.pad_samples > 0 {
                    self.ctx.pad_samples
                } else {
                    frame_size
                };
                let out_samples = (nb_samples + pad - 1) / pad * pad;
                if out_samples != nb_samples {
                    return pad_last_frame(&frame, out_samples).map_err(|e| {
                        self.ctx.last_audio_frame = false;
                        e
                    });
                }
            }
        }
        Ok(frame)
    }

    fn receive_internal(&mut self, packet: &mut Packet) -> MediaResult<ReceiveStatus> {
        if self.ctx.draining_done {
            return Ok(ReceiveStatus::EndOfStream);
        }
        debug_assert!(packet.is_empty());

        let status = match &mut self.backend {
            CodecBackend::Pull(codec) => match codec.receive_packet(&mut self.ctx, packet) {
                Ok(ReceiveStatus::Packet) => {
                    // side-data only packets may carry no buffer at all
                    if packet.has_data() && !packet.is_refcounted() {
                        packet.reset();
                        return Err(MediaError::configuration(
                            "encoders must return ref-counted buffers",
                        ));
                    }
                    ReceiveStatus::Packet
                }
                Ok(other) => {
                    packet.reset();
                    other
                }
                Err(e) => {
                    packet.reset();
                    return Err(e);
                }
            },
            CodecBackend::Push(codec) => {
                encode_simple(codec.as_mut(), &mut self.ctx, &self.descriptor, packet)?
            }
        };

        match status {
            ReceiveStatus::Packet => packet.flags |= self.intra_only_flag,
            ReceiveStatus::EndOfStream => {
                tracing::debug!("encoder '{}' fully drained", self.descriptor.name);
                self.ctx.draining_done = true;
            }
            ReceiveStatus::NeedMoreInput => {}
        }
        Ok(status)
    }
}

/// Replace a short last frame by a copy padded with silence
fn pad_last_frame(src: &Frame, out_samples: usize) -> MediaResult<Frame> {
    let audio = match &src.data {
        FrameData::Audio(audio) => audio,
        FrameData::Video(_) => {
            return Err(MediaError::invalid_argument("only audio frames are padded"))
        }
    };
    let nb_samples = audio.nb_samples();
    let mut padded = AudioData::silent(audio.format, audio.layout, audio.sample_rate, out_samples);
    padded.copy_samples_from(0, audio, 0, nb_samples)?;
    padded.set_silence(nb_samples, out_samples - nb_samples)?;
    tracing::trace!("padded last frame from {} to {} samples", nb_samples, out_samples);
    Ok(Frame {
        pts: src.pts,
        data: FrameData::Audio(padded),
    })
}

/// Drive a push-style codec until it produces a packet or stalls
fn encode_simple(
    codec: &mut dyn FrameEncoder,
    ctx: &mut EncodeContext,
    descriptor: &CodecDescriptor,
    packet: &mut Packet,
) -> MediaResult<ReceiveStatus> {
    loop {
        let status = encode_simple_internal(codec, ctx, descriptor, packet)?;
        if status != ReceiveStatus::Packet {
            return Ok(status);
        }
        if !packet.is_empty() {
            return Ok(ReceiveStatus::Packet);
        }
    }
}

/// Run one encode callback
///
/// Returns [`ReceiveStatus::Packet`] whenever the callback ran, whether or
/// not it produced output.
fn encode_simple_internal(
    codec: &mut dyn FrameEncoder,
    ctx: &mut EncodeContext,
    descriptor: &CodecDescriptor,
    packet: &mut Packet,
) -> MediaResult<ReceiveStatus> {
    if ctx.draining_done {
        return Ok(ReceiveStatus::EndOfStream);
    }

    let frame = ctx.frame.take();
    let delay = descriptor.capabilities.contains(CodecCapabilities::DELAY);
    if frame.is_none() {
        if !ctx.draining {
            return Ok(ReceiveStatus::NeedMoreInput);
        }
        // flushing is signalled with a null frame
        if !delay {
            return Ok(ReceiveStatus::EndOfStream);
        }
    }

    let got_packet = match codec.encode(ctx, packet, frame.as_ref()) {
        Ok(got) => got,
        Err(e) => {
            packet.reset();
            return Err(e);
        }
    };

    if got_packet {
        if packet.has_data() {
            if let Err(e) = ctx.make_refcounted(packet) {
                packet.reset();
                return Err(e);
            }
        }

        // encoders with delay set their own timestamps
        if !delay {
            if let Some(frame) = &frame {
                if packet.pts.is_none() {
                    packet.pts = frame.pts;
                }
                if descriptor.media_type == MediaType::Audio && packet.duration == 0 {
                    packet.duration = Rational::rescale(
                        frame.nb_samples() as i64,
                        Rational::new(1, ctx.config.sample_rate.min(i32::MAX as u32) as i32),
                        ctx.config.time_base,
                    );
                }
            }
        }

        // without delay there can be no reordering
        if !(descriptor.properties.contains(CodecProperties::REORDER) && delay) {
            packet.dts = packet.pts;
        }
    } else {
        packet.reset();
    }

    if ctx.draining && !got_packet {
        ctx.draining_done = true;
    }
    Ok(ReceiveStatus::Packet)
}

/// Validate session parameters against the codec
fn preinit(descriptor: &CodecDescriptor, config: &mut EncoderConfig) -> MediaResult<()> {
    if !config.time_base.is_valid() {
        tracing::error!("The encoder timebase is not set");
        return Err(MediaError::invalid_argument(format!(
            "invalid encoder time base {}",
            config.time_base
        )));
    }

    match descriptor.media_type {
        MediaType::Video => preinit_video(descriptor, config)?,
        MediaType::Audio => preinit_audio(descriptor, config)?,
        MediaType::Subtitle => {
            return Err(MediaError::UnsupportedFormat {
                format: "subtitle encoding".to_string(),
            })
        }
    }

    if config.bit_rate > 0 && config.bit_rate < 1000 {
        tracing::warn!(
            "Bitrate {} is extremely low, maybe you mean {}k",
            config.bit_rate,
            config.bit_rate
        );
    }
    Ok(())
}

fn preinit_video(descriptor: &CodecDescriptor, config: &EncoderConfig) -> MediaResult<()> {
    let format = config
        .pixel_format
        .ok_or_else(|| MediaError::invalid_argument("pixel format not set"))?;
    if !descriptor.pixel_formats.is_empty() && !descriptor.pixel_formats.contains(&format) {
        tracing::error!("Specified pixel format {} is invalid or not supported", format);
        return Err(MediaError::invalid_argument(format!(
            "Specified pixel format {} is invalid or not supported",
            format
        )));
    }
    if config.width == 0 || config.height == 0 {
        tracing::error!("dimensions not set");
        return Err(MediaError::invalid_argument("dimensions not set"));
    }
    Ok(())
}

fn preinit_audio(descriptor: &CodecDescriptor, config: &mut EncoderConfig) -> MediaResult<()> {
    let requested = config
        .sample_format
        .ok_or_else(|| MediaError::invalid_argument("sample format not set"))?;
    let layout = config
        .channel_layout
        .ok_or_else(|| MediaError::invalid_argument("channel layout not set"))?;
    if !layout.is_valid() {
        return Err(MediaError::invalid_argument("channel layout has no channels"));
    }

    if !descriptor.sample_formats.is_empty() {
        // mono audio is the same in packed and planar form
        let chosen = descriptor.sample_formats.iter().copied().find(|&f| {
            f == requested || (layout.channels() == 1 && f.to_planar() == requested.to_planar())
        });
        match chosen {
            Some(format) => {
                if format != requested {
                    tracing::debug!("using {} for mono {} input", format, requested);
                }
                config.sample_format = Some(format);
            }
            None => {
                tracing::error!(
                    "Specified sample format {} is invalid or not supported",
                    requested
                );
                return Err(MediaError::invalid_argument(format!(
                    "Specified sample format {} is invalid or not supported",
                    requested
                )));
            }
        }
    }

    if config.sample_rate == 0
        || (!descriptor.sample_rates.is_empty()
            && !descriptor.sample_rates.contains(&config.sample_rate))
    {
        tracing::error!("Specified sample rate {} is not supported", config.sample_rate);
        return Err(MediaError::invalid_argument(format!(
            "Specified sample rate {} is not supported",
            config.sample_rate
        )));
    }

    if !descriptor.channel_layouts.is_empty() && !descriptor.channel_layouts.contains(&layout) {
        tracing::error!("Specified channel layout '{}' is not supported", layout);
        return Err(MediaError::invalid_argument(format!(
            "Specified channel layout '{}' is not supported",
            layout
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcm::PcmFramedCodec;

    fn s16_stereo(nb_samples: usize, pts: i64) -> Frame {
        Frame::audio(AudioData::silent(
            SampleFormat::S16,
            ChannelLayout::STEREO,
            48000,
            nb_samples,
        ))
        .with_pts(pts)
    }

    #[test]
    fn test_config_builders() {
        let config = EncoderConfig::audio(SampleFormat::F32, 44100, ChannelLayout::MONO)
            .bit_rate(128_000)
            .frame_size(960);
        assert_eq!(config.time_base, Rational::new(1, 44100));
        assert_eq!(config.bit_rate, 128_000);
        assert_eq!(config.frame_size, 960);
        assert!(config.allocator.is_none());

        let video = EncoderConfig::video(PixelFormat::Yuv420p, 640, 480);
        assert_eq!(video.time_base, Rational::new(1, 25));
        assert!(!EncoderConfig::default().time_base.is_valid());
    }

    #[test]
    fn test_pad_last_frame_keeps_samples() {
        let planes = vec![vec![1u8; 2 * 2 * 3]];
        let audio =
            AudioData::from_planes(SampleFormat::S16, ChannelLayout::STEREO, 48000, 3, planes)
                .unwrap();
        let frame = Frame::audio(audio).with_pts(7);

        let padded = pad_last_frame(&frame, 8).unwrap();
        assert_eq!(padded.pts, Some(7));
        assert_eq!(padded.nb_samples(), 8);
        let plane = &padded.as_audio().unwrap().planes()[0];
        assert!(plane[..12].iter().all(|&b| b == 1));
        assert!(plane[12..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_take_frame_respects_draining() {
        let mut ctx = EncodeContext::new(EncoderConfig::audio(
            SampleFormat::S16,
            48000,
            ChannelLayout::STEREO,
        ));
        ctx.frame = Some(s16_stereo(4, 0));
        assert!(ctx.take_frame().is_some());
        assert!(ctx.take_frame().is_none());

        ctx.frame = Some(s16_stereo(4, 0));
        ctx.draining = true;
        assert!(ctx.take_frame().is_none());
    }

    #[test]
    fn test_state_transitions() {
        let codec = PcmFramedCodec::new();
        let mut encoder = Encoder::open(
            &codec,
            EncoderConfig::audio(SampleFormat::S16, 48000, ChannelLayout::STEREO).frame_size(4),
        )
        .unwrap();
        assert_eq!(encoder.state(), EncoderState::Idle);

        encoder.submit(Some(s16_stereo(4, 0))).unwrap();
        assert_eq!(encoder.state(), EncoderState::PacketReady);

        encoder.submit(Some(s16_stereo(4, 4))).unwrap();
        assert_eq!(encoder.state(), EncoderState::PacketReady);

        assert!(matches!(encoder.pull().unwrap(), PullResult::Packet(_)));
        assert_eq!(encoder.state(), EncoderState::FrameBuffered);

        assert!(matches!(encoder.pull().unwrap(), PullResult::Packet(_)));
        assert!(matches!(encoder.pull().unwrap(), PullResult::Pending));
        assert_eq!(encoder.state(), EncoderState::NeedMoreInput);

        encoder.submit(None).unwrap();
        assert_eq!(encoder.state(), EncoderState::DrainingDone);
        assert_eq!(encoder.frame_number(), 3);
    }

    #[test]
    fn test_alloc_frame_matches_session() {
        let codec = PcmFramedCodec::new();
        let encoder = Encoder::open(
            &codec,
            EncoderConfig::audio(SampleFormat::F32p, 48000, ChannelLayout::STEREO),
        )
        .unwrap();
        let frame = encoder.alloc_frame().unwrap();
        let audio = frame.as_audio().unwrap();
        assert_eq!(audio.nb_samples(), encoder.frame_size());
        assert_eq!(audio.format, SampleFormat::F32p);
        assert_eq!(audio.planes().len(), 2);
    }
}
