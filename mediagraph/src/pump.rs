//! Drive an encoder over a whole stream

use anyhow::{bail, Context, Result};
use mediagraph_codec::{Encoder, PullResult};
use mediagraph_core::{Frame, Packet};

/// Encode every frame of `frames`, drain the encoder and return all packets
///
/// Packets are collected after each submission, so the encoder never holds
/// more than one pending frame.
pub fn encode_all<I>(encoder: &mut Encoder, frames: I) -> Result<Vec<Packet>>
where
    I: IntoIterator<Item = Frame>,
{
    let codec = encoder.descriptor().name.clone();
    let mut packets = Vec::new();

    for (index, frame) in frames.into_iter().enumerate() {
        encoder
            .submit(Some(frame))
            .with_context(|| format!("{}: submitting frame {}", codec, index))?;
        let ended = collect_ready(encoder, &mut packets)
            .with_context(|| format!("{}: encoding frame {}", codec, index))?;
        if ended {
            bail!("{}: encoder ended before draining", codec);
        }
    }

    encoder
        .submit(None)
        .with_context(|| format!("{}: starting drain", codec))?;
    if !collect_ready(encoder, &mut packets).with_context(|| format!("{}: draining", codec))? {
        bail!("{}: encoder asked for input while draining", codec);
    }

    tracing::debug!("{}: {} packets", codec, packets.len());
    Ok(packets)
}

/// Pull until the encoder wants input; true once it reached end of stream
fn collect_ready(encoder: &mut Encoder, packets: &mut Vec<Packet>) -> Result<bool> {
    loop {
        match encoder.pull()? {
            PullResult::Packet(packet) => packets.push(packet),
            PullResult::Pending => return Ok(false),
            PullResult::EndOfStream => return Ok(true),
        }
    }
}
