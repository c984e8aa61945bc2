//! Raw video reference encoder
//!
//! Emits each picture's planes back to back. It is a pull-style encoder:
//! frames are taken from the context on demand and every packet is a
//! keyframe.

use mediagraph_core::{MediaError, MediaResult, MediaType, Packet, PixelFormat};

use crate::codecs::{
    Codec, CodecBackend, CodecDescriptor, CodecProperties, PacketEncoder, ReceiveStatus,
};
use crate::encode::EncodeContext;

/// Uncompressed video
#[derive(Debug, Clone)]
pub struct RawVideoCodec {
    descriptor: CodecDescriptor,
}

impl RawVideoCodec {
    /// Create the codec
    pub fn new() -> Self {
        Self {
            descriptor: CodecDescriptor::new("rawvideo", MediaType::Video)
                .properties(CodecProperties::INTRA_ONLY)
                .pixel_formats(PixelFormat::ALL.to_vec()),
        }
    }
}

impl Default for RawVideoCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for RawVideoCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.descriptor
    }

    fn instantiate(&self) -> CodecBackend {
        CodecBackend::Pull(Box::new(RawVideoEncoder))
    }
}

#[derive(Debug)]
struct RawVideoEncoder;

impl PacketEncoder for RawVideoEncoder {
    fn receive_packet(
        &mut self,
        ctx: &mut EncodeContext,
        packet: &mut Packet,
    ) -> MediaResult<ReceiveStatus> {
        let frame = match ctx.take_frame() {
            Some(frame) => frame,
            None if ctx.is_draining() => return Ok(ReceiveStatus::EndOfStream),
            None => return Ok(ReceiveStatus::NeedMoreInput),
        };
        let video = frame.as_video().ok_or_else(|| MediaError::EncoderFailed {
            codec: "rawvideo".to_string(),
            reason: "expected a video frame".to_string(),
        })?;

        let out = ctx.get_encode_buffer(packet, video.byte_size() as i64)?;
        let mut offset = 0;
        for plane in video.planes() {
            out[offset..offset + plane.len()].copy_from_slice(plane);
            offset += plane.len();
        }
        packet.pts = frame.pts;
        packet.dts = frame.pts;
        packet.duration = 1;
        Ok(ReceiveStatus::Packet)
    }
}
