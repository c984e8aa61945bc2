//! # mediagraph codec
//!
//! Encoder sessions for mediagraph. This crate adapts push-style
//! (frame in, packet out) and pull-style (receive packet) encoder
//! implementations to one non-blocking submit/pull pump, handles padding of
//! the last audio frame, draining, and the ownership of packet buffers.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod codecs;
pub mod encode;
pub mod pcm;
pub mod rawvideo;

// Re-export main types
pub use codecs::{
    Codec, CodecBackend, CodecCapabilities, CodecDescriptor, CodecProperties, CodecRegistry,
    FrameEncoder, PacketEncoder, ReceiveStatus,
};
pub use encode::{EncodeContext, Encoder, EncoderConfig, EncoderState, PullResult};
pub use pcm::{PcmCodec, PcmFramedCodec};
pub use rawvideo::RawVideoCodec;
