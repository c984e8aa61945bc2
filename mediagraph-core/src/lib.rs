//! # mediagraph core
//!
//! Shared building blocks for the mediagraph workspace: format identifiers,
//! raw frames, encoded packets with their reference-counted buffers, and the
//! common error type.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod format;
pub mod frame;
pub mod packet;

// Re-export main types
pub use error::{ErrorCategory, MediaError, MediaResult};
pub use format::{
    ChannelLayout, Channels, MediaType, PixelFormat, PixelFormatDescriptor, Rational,
    SampleFormat, SubtitleFormat,
};
pub use frame::{AudioData, Frame, FrameData, VideoData};
pub use packet::{
    alloc_refcounted, check_packet_size, BufferAllocator, DefaultAllocator, Packet, PacketFlags,
    ScratchBuffer, SideData, SideDataType, MAX_PACKET_SIZE, PADDING,
};
