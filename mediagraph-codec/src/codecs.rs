//! Codec interfaces and registry
//!
//! Encoders come in two flavours. A [`FrameEncoder`] is handed one frame
//! per call and reports whether it produced a packet; a [`PacketEncoder`]
//! is asked for packets and pulls frames from the [`EncodeContext`] itself.
//! The [`Encoder`](crate::Encoder) pump adapts both to the same
//! submit/pull interface.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use mediagraph_core::{
    ChannelLayout, Frame, MediaError, MediaResult, MediaType, Packet, PixelFormat, SampleFormat,
};

use crate::encode::{EncodeContext, Encoder, EncoderConfig};
use crate::pcm::{PcmCodec, PcmFramedCodec};
use crate::rawvideo::RawVideoCodec;

bitflags! {
    /// What an encoder implementation can do
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CodecCapabilities: u32 {
        /// The encoder buffers input and must be flushed with a null frame
        const DELAY = 1 << 0;
        /// The last frame may hold fewer than `frame_size` samples
        const SMALL_LAST_FRAME = 1 << 1;
        /// Frames may hold any number of samples
        const VARIABLE_FRAME_SIZE = 1 << 2;
    }
}

bitflags! {
    /// Properties of the bitstream a codec produces
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CodecProperties: u32 {
        /// Every packet is a keyframe
        const INTRA_ONLY = 1 << 0;
        /// Packets may be emitted out of presentation order
        const REORDER = 1 << 1;
    }
}

/// Static description of a codec
///
/// Empty format lists mean the codec accepts any value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecDescriptor {
    /// Codec name
    pub name: String,
    /// Media type the codec encodes
    pub media_type: MediaType,
    /// Implementation capabilities
    pub capabilities: CodecCapabilities,
    /// Bitstream properties
    pub properties: CodecProperties,
    /// Supported pixel formats
    pub pixel_formats: Vec<PixelFormat>,
    /// Supported sample formats
    pub sample_formats: Vec<SampleFormat>,
    /// Supported sample rates
    pub sample_rates: Vec<u32>,
    /// Supported channel layouts
    pub channel_layouts: Vec<ChannelLayout>,
}

impl CodecDescriptor {
    /// Create a descriptor with no capabilities and no format restrictions
    pub fn new(name: &str, media_type: MediaType) -> Self {
        Self {
            name: name.to_string(),
            media_type,
            capabilities: CodecCapabilities::empty(),
            properties: CodecProperties::empty(),
            pixel_formats: Vec::new(),
            sample_formats: Vec::new(),
            sample_rates: Vec::new(),
            channel_layouts: Vec::new(),
        }
    }

    /// Set capabilities
    pub fn capabilities(mut self, capabilities: CodecCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set bitstream properties
    pub fn properties(mut self, properties: CodecProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Restrict pixel formats
    pub fn pixel_formats(mut self, formats: Vec<PixelFormat>) -> Self {
        self.pixel_formats = formats;
        self
    }

    /// Restrict sample formats
    pub fn sample_formats(mut self, formats: Vec<SampleFormat>) -> Self {
        self.sample_formats = formats;
        self
    }

    /// Restrict sample rates
    pub fn sample_rates(mut self, rates: Vec<u32>) -> Self {
        self.sample_rates = rates;
        self
    }

    /// Restrict channel layouts
    pub fn channel_layouts(mut self, layouts: Vec<ChannelLayout>) -> Self {
        self.channel_layouts = layouts;
        self
    }

    /// Whether frames must hold exactly `frame_size` samples
    pub fn has_fixed_frame_size(&self) -> bool {
        self.media_type == MediaType::Audio
            && !self
                .capabilities
                .contains(CodecCapabilities::VARIABLE_FRAME_SIZE)
    }
}

/// Result of asking a [`PacketEncoder`] for output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveStatus {
    /// The packet was filled
    Packet,
    /// More input is needed before another packet can be produced
    NeedMoreInput,
    /// The encoder is fully drained
    EndOfStream,
}

/// Encoder that consumes one frame per call
pub trait FrameEncoder: Send + fmt::Debug {
    /// Prepare for encoding; may set the frame size on `ctx`
    fn open(&mut self, ctx: &mut EncodeContext) -> MediaResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Encode `frame`, or flush buffered input when `frame` is `None`
    ///
    /// Returns whether `packet` was filled.
    fn encode(
        &mut self,
        ctx: &mut EncodeContext,
        packet: &mut Packet,
        frame: Option<&Frame>,
    ) -> MediaResult<bool>;
}

/// Encoder that produces packets on request
///
/// Input frames are taken with [`EncodeContext::take_frame`]. The encoder
/// sets packet timestamps itself and must return reference-counted
/// payloads.
pub trait PacketEncoder: Send + fmt::Debug {
    /// Prepare for encoding; may set the frame size on `ctx`
    fn open(&mut self, ctx: &mut EncodeContext) -> MediaResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Try to produce the next packet
    fn receive_packet(
        &mut self,
        ctx: &mut EncodeContext,
        packet: &mut Packet,
    ) -> MediaResult<ReceiveStatus>;
}

/// An encoder instance of either flavour
#[derive(Debug)]
pub enum CodecBackend {
    /// One frame in, at most one packet out
    Push(Box<dyn FrameEncoder>),
    /// Packets requested, frames pulled
    Pull(Box<dyn PacketEncoder>),
}

/// A registered codec: a descriptor plus a way to create encoder instances
pub trait Codec: Send + Sync + fmt::Debug {
    /// Codec description
    fn descriptor(&self) -> &CodecDescriptor;

    /// Create a fresh encoder instance for one session
    fn instantiate(&self) -> CodecBackend;
}

/// Codec registry for managing available codecs
#[derive(Debug)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// Create an empty codec registry
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Create a registry holding the built-in codecs
    pub fn with_defaults() -> MediaResult<Self> {
        let mut registry = Self::new();

        // Register default audio codecs
        registry.register_codec(Arc::new(PcmCodec::new()))?;
        registry.register_codec(Arc::new(PcmFramedCodec::new()))?;

        // Register default video codecs
        registry.register_codec(Arc::new(RawVideoCodec::new()))?;

        Ok(registry)
    }

    /// Register a codec under its descriptor name
    pub fn register_codec(&mut self, codec: Arc<dyn Codec>) -> MediaResult<()> {
        let name = codec.descriptor().name.clone();
        if self.codecs.contains_key(&name) {
            return Err(MediaError::invalid_argument(format!(
                "codec '{}' is already registered",
                name
            )));
        }
        tracing::debug!("registered codec '{}'", name);
        self.codecs.insert(name, codec);
        Ok(())
    }

    /// Get a codec by name
    pub fn get_codec(&self, name: &str) -> Option<Arc<dyn Codec>> {
        self.codecs.get(name).cloned()
    }

    /// List available codecs, sorted by name
    pub fn list_codecs(&self) -> Vec<String> {
        let mut names: Vec<String> = self.codecs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Codecs encoding `media_type`
    pub fn codecs_for(&self, media_type: MediaType) -> Vec<Arc<dyn Codec>> {
        let mut codecs: Vec<Arc<dyn Codec>> = self
            .codecs
            .values()
            .filter(|c| c.descriptor().media_type == media_type)
            .cloned()
            .collect();
        codecs.sort_by(|a, b| a.descriptor().name.cmp(&b.descriptor().name));
        codecs
    }

    /// Open an encoder session for the codec called `name`
    pub fn open_encoder(&self, name: &str, config: EncoderConfig) -> MediaResult<Encoder> {
        let codec = self.get_codec(name).ok_or_else(|| MediaError::UnsupportedFormat {
            format: format!("codec '{}'", name),
        })?;
        Encoder::open(codec.as_ref(), config)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults().unwrap_or_else(|_| Self::new())
    }
}
