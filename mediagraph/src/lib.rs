//! # mediagraph
//!
//! Encoder sessions and filter graph format negotiation.
//!
//! ## Key Features
//!
//! - **One encoder pump**: push-style and pull-style encoders behind a
//!   non-blocking submit/pull interface with draining and last-frame padding
//! - **Format negotiation**: per-category candidate sets merged across links,
//!   conversion nodes inserted where the two ends disagree
//! - **SSA/ASS helpers**: section splitting and override-code parsing
//! - **Diagnostics**: logging setup, graph reports and encoder counters
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mediagraph::{AudioData, ChannelLayout, EncoderConfig, Frame, MediaGraph, SampleFormat};
//!
//! let media = MediaGraph::init()?;
//! let mut encoder = media.open_encoder(
//!     "pcm_framed",
//!     EncoderConfig::audio(SampleFormat::S16, 48000, ChannelLayout::STEREO),
//! )?;
//!
//! let frames = (0..5).map(|i| {
//!     Frame::audio(AudioData::silent(SampleFormat::S16, ChannelLayout::STEREO, 48000, 1024))
//!         .with_pts(i * 1024)
//! });
//! let packets = mediagraph::encode_all(&mut encoder, frames)?;
//! assert_eq!(packets.len(), 5);
//! # Ok::<(), anyhow::Error>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use mediagraph_core::{
    AudioData, ChannelLayout, ErrorCategory, Frame, FrameData, MediaError, MediaResult,
    MediaType, Packet, PacketFlags, PixelFormat, Rational, SampleFormat, SubtitleFormat,
    VideoData,
};

#[cfg(feature = "codec")]
pub use mediagraph_codec::{
    Codec, CodecDescriptor, CodecRegistry, Encoder, EncoderConfig, EncoderState, PullResult,
};

#[cfg(feature = "filter")]
pub use mediagraph_filter::{
    negotiate, Category, CategoryState, FilterGraph, LinkFormat, MediaCaps, NegotiationConfig,
    NodeCaps, NodeId, SinkOptions,
};

#[cfg(feature = "subtitle")]
pub use mediagraph_subtitle::{Ass, AssSplit, OverrideHandler};

#[cfg(feature = "diagnostics")]
pub use mediagraph_diagnostics::{EncoderProfiler, EncoderStats, GraphReport};

// Public API modules
pub mod config;
#[cfg(feature = "codec")]
pub mod pump;

// Re-export main API types
pub use config::GlobalConfig;
#[cfg(feature = "codec")]
pub use pump::encode_all;

/// Main entry point for mediagraph
#[derive(Debug)]
pub struct MediaGraph {
    config: GlobalConfig,
    #[cfg(feature = "codec")]
    codecs: CodecRegistry,
}

impl MediaGraph {
    /// Initialize with default settings
    pub fn init() -> MediaResult<Self> {
        Self::init_with(GlobalConfig::default())
    }

    /// Initialize with custom global configuration
    ///
    /// With `debug_logging` set, a global `tracing` subscriber is installed
    /// using `log_filter`.
    pub fn init_with(config: GlobalConfig) -> MediaResult<Self> {
        if config.debug_logging {
            #[cfg(feature = "diagnostics")]
            mediagraph_diagnostics::init_logging(&config.log_filter)?;
            #[cfg(not(feature = "diagnostics"))]
            tracing::warn!("debug logging requested without the diagnostics feature");
        }

        #[cfg(feature = "codec")]
        let codecs = CodecRegistry::with_defaults()?;

        tracing::debug!("mediagraph initialised");
        Ok(Self {
            config,
            #[cfg(feature = "codec")]
            codecs,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Registered codecs
    #[cfg(feature = "codec")]
    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Mutable access to the codec registry, to add codecs
    #[cfg(feature = "codec")]
    pub fn codecs_mut(&mut self) -> &mut CodecRegistry {
        &mut self.codecs
    }

    /// Open an encoder session for the codec called `name`
    #[cfg(feature = "codec")]
    pub fn open_encoder(&self, name: &str, config: EncoderConfig) -> MediaResult<Encoder> {
        self.codecs.open_encoder(name, config)
    }

    /// Negotiate formats on `graph` with the configured settings
    ///
    /// Returns the conversion nodes that were inserted.
    #[cfg(feature = "filter")]
    pub fn negotiate(&self, graph: &mut FilterGraph) -> MediaResult<Vec<NodeId>> {
        let inserted = negotiate(graph, &self.config.negotiation)?;
        #[cfg(feature = "diagnostics")]
        GraphReport::from_graph(graph).log();
        Ok(inserted)
    }

    /// Split an SSA/ASS script into its sections
    #[cfg(feature = "subtitle")]
    pub fn split_subtitles(&self, text: &str) -> Ass {
        AssSplit::split(text).into_ass()
    }
}
