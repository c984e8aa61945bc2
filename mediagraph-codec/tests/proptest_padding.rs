//! Property-based tests for last-frame padding.
//!
//! Uses proptest to check that a short last frame is padded to the next
//! multiple of the frame size with format-appropriate silence.

use mediagraph_codec::*;
use mediagraph_core::*;
use proptest::prelude::*;

fn sample_formats() -> impl Strategy<Value = SampleFormat> {
    prop_oneof![
        Just(SampleFormat::S16),
        Just(SampleFormat::S16p),
        Just(SampleFormat::F32),
        Just(SampleFormat::F32p),
    ]
}

// =============================================================================
// Padding Tests
// =============================================================================

proptest! {
    /// The packet for a short last frame holds the original samples
    /// followed by silence, up to the frame size.
    #[test]
    fn short_frame_padded_to_frame_size(
        frame_size in 16usize..=256,
        short in 1usize..=255,
        format in sample_formats(),
    ) {
        prop_assume!(short < frame_size);
        let config = EncoderConfig::audio(format, 48000, ChannelLayout::MONO).frame_size(frame_size);
        let mut encoder = Encoder::open(&PcmFramedCodec::new(), config).unwrap();

        let bps = format.bytes_per_sample();
        let planes = vec![vec![0xA5u8; short * bps]];
        let audio = AudioData::from_planes(format, ChannelLayout::MONO, 48000, short, planes).unwrap();
        encoder.submit(Some(Frame::audio(audio).with_pts(0))).unwrap();

        let packet = match encoder.pull().unwrap() {
            PullResult::Packet(packet) => packet,
            other => panic!("expected a packet, got {:?}", other),
        };
        prop_assert_eq!(packet.size(), frame_size * bps);
        prop_assert!(packet.data()[..short * bps].iter().all(|&b| b == 0xA5));
        prop_assert!(packet.data()[short * bps..].iter().all(|&b| b == format.silence_byte()));
        prop_assert_eq!(packet.duration, frame_size as i64);

        encoder.submit(None).unwrap();
        prop_assert!(matches!(encoder.pull().unwrap(), PullResult::EndOfStream));
    }

    /// Full frames come out unchanged, in order, with dts equal to pts.
    #[test]
    fn full_frames_keep_timestamps(count in 1usize..8, frame_size in 1usize..64) {
        let config = EncoderConfig::audio(SampleFormat::S16, 8000, ChannelLayout::MONO)
            .frame_size(frame_size);
        let mut encoder = Encoder::open(&PcmFramedCodec::new(), config).unwrap();

        for i in 0..count {
            let pts = (i * frame_size) as i64;
            let audio = AudioData::silent(SampleFormat::S16, ChannelLayout::MONO, 8000, frame_size);
            encoder.submit(Some(Frame::audio(audio).with_pts(pts))).unwrap();
            match encoder.pull().unwrap() {
                PullResult::Packet(packet) => {
                    prop_assert_eq!(packet.pts, Some(pts));
                    prop_assert_eq!(packet.dts, Some(pts));
                    prop_assert_eq!(packet.size(), frame_size * 2);
                }
                other => panic!("expected a packet, got {:?}", other),
            }
        }
    }
}
