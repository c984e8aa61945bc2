//! PCM reference encoders
//!
//! Both encoders emit the raw sample bytes of each frame, planes
//! concatenated in channel order. `pcm` accepts frames of any size and
//! writes straight into reference-counted buffers; `pcm_framed` works on
//! fixed-size frames and encodes into the scratch buffer, which exercises
//! last-frame padding and buffer promotion in the pump.

use mediagraph_core::{Frame, MediaError, MediaResult, MediaType, Packet, SampleFormat};

use crate::codecs::{
    Codec, CodecBackend, CodecCapabilities, CodecDescriptor, FrameEncoder,
};
use crate::encode::EncodeContext;

/// Frame size `pcm_framed` picks when the session does not request one
pub const DEFAULT_FRAME_SIZE: usize = 1024;

fn payload_size(frame: &Frame, codec: &str) -> MediaResult<usize> {
    let audio = frame.as_audio().ok_or_else(|| MediaError::EncoderFailed {
        codec: codec.to_string(),
        reason: "expected an audio frame".to_string(),
    })?;
    Ok(audio.planes().iter().map(Vec::len).sum())
}

fn write_planes(frame: &Frame, out: &mut [u8]) {
    let mut offset = 0;
    if let Some(audio) = frame.as_audio() {
        for plane in audio.planes() {
            out[offset..offset + plane.len()].copy_from_slice(plane);
            offset += plane.len();
        }
    }
}

/// Variable frame size PCM
#[derive(Debug, Clone)]
pub struct PcmCodec {
    descriptor: CodecDescriptor,
}

impl PcmCodec {
    /// Create the codec
    pub fn new() -> Self {
        Self {
            descriptor: CodecDescriptor::new("pcm", MediaType::Audio)
                .capabilities(CodecCapabilities::VARIABLE_FRAME_SIZE),
        }
    }
}

impl Default for PcmCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for PcmCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.descriptor
    }

    fn instantiate(&self) -> CodecBackend {
        CodecBackend::Push(Box::new(PcmEncoder))
    }
}

#[derive(Debug)]
struct PcmEncoder;

impl FrameEncoder for PcmEncoder {
    fn encode(
        &mut self,
        ctx: &mut EncodeContext,
        packet: &mut Packet,
        frame: Option<&Frame>,
    ) -> MediaResult<bool> {
        let frame = match frame {
            Some(frame) => frame,
            None => return Ok(false),
        };
        let size = payload_size(frame, "pcm")?;
        let out = ctx.get_encode_buffer(packet, size as i64)?;
        write_planes(frame, out);
        Ok(true)
    }
}

/// Fixed frame size PCM
#[derive(Debug, Clone)]
pub struct PcmFramedCodec {
    descriptor: CodecDescriptor,
}

impl PcmFramedCodec {
    /// Create the codec
    pub fn new() -> Self {
        Self {
            descriptor: CodecDescriptor::new("pcm_framed", MediaType::Audio).sample_formats(vec![
                SampleFormat::S16,
                SampleFormat::S16p,
                SampleFormat::F32,
                SampleFormat::F32p,
            ]),
        }
    }
}

impl Default for PcmFramedCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for PcmFramedCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.descriptor
    }

    fn instantiate(&self) -> CodecBackend {
        CodecBackend::Push(Box::new(PcmFramedEncoder))
    }
}

#[derive(Debug)]
struct PcmFramedEncoder;

impl FrameEncoder for PcmFramedEncoder {
    fn open(&mut self, ctx: &mut EncodeContext) -> MediaResult<()> {
        if ctx.frame_size() == 0 {
            ctx.set_frame_size(DEFAULT_FRAME_SIZE);
        }
        Ok(())
    }

    fn encode(
        &mut self,
        ctx: &mut EncodeContext,
        packet: &mut Packet,
        frame: Option<&Frame>,
    ) -> MediaResult<bool> {
        let frame = match frame {
            Some(frame) => frame,
            None => return Ok(false),
        };
        let size = payload_size(frame, "pcm_framed")?;
        let out = ctx.alloc_packet(packet, size as i64)?;
        write_planes(frame, out);
        Ok(true)
    }
}
