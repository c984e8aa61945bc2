//! Encoder session profiling

use mediagraph_codec::{Encoder, PullResult};
use mediagraph_core::{Frame, MediaError, MediaResult, PacketFlags};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Counters collected over one encoder session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncoderStats {
    /// Frames accepted by `submit`
    pub frames_submitted: u64,
    /// Audio samples accepted by `submit`
    pub samples_submitted: u64,
    /// Submissions refused because the input slot was full
    pub input_full: u64,
    /// Packets produced
    pub packets: u64,
    /// Keyframe packets produced
    pub keyframes: u64,
    /// Payload bytes produced
    pub bytes: u64,
    /// Pulls that returned no packet
    pub pending_pulls: u64,
    /// Other errors from `submit` or `pull`
    pub errors: u64,
    /// Timestamp of the first packet
    pub first_pts: Option<i64>,
    /// Timestamp of the last packet
    pub last_pts: Option<i64>,
    /// Whether end of stream was reached
    pub end_of_stream: bool,
    /// Time spent inside `submit` and `pull`
    pub busy: Duration,
}

impl EncoderStats {
    /// Mean payload size, 0 without packets
    pub fn average_packet_size(&self) -> f64 {
        if self.packets == 0 {
            0.0
        } else {
            self.bytes as f64 / self.packets as f64
        }
    }
}

/// Records what flows through an [`Encoder`]
///
/// Use [`EncoderProfiler::submit`] and [`EncoderProfiler::pull`] in place
/// of the encoder's own methods.
#[derive(Debug)]
pub struct EncoderProfiler {
    name: String,
    stats: EncoderStats,
    started: Instant,
}

impl EncoderProfiler {
    /// Create a profiler for a session called `name`
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stats: EncoderStats::default(),
            started: Instant::now(),
        }
    }

    /// Submit through the profiler
    pub fn submit(&mut self, encoder: &mut Encoder, frame: Option<Frame>) -> MediaResult<()> {
        let samples = frame.as_ref().map_or(0, |f| f.nb_samples() as u64);
        let is_frame = frame.is_some();
        let start = Instant::now();
        let result = encoder.submit(frame);
        self.stats.busy += start.elapsed();

        match &result {
            Ok(()) if is_frame => {
                self.stats.frames_submitted += 1;
                self.stats.samples_submitted += samples;
            }
            Ok(()) => tracing::debug!("{}: draining", self.name),
            Err(MediaError::InputFull) => self.stats.input_full += 1,
            Err(e) => {
                self.stats.errors += 1;
                tracing::warn!("{}: submit failed: {}", self.name, e);
            }
        }
        result
    }

    /// Pull through the profiler
    pub fn pull(&mut self, encoder: &mut Encoder) -> MediaResult<PullResult> {
        let start = Instant::now();
        let result = encoder.pull();
        self.stats.busy += start.elapsed();

        match &result {
            Ok(PullResult::Packet(packet)) => {
                self.stats.packets += 1;
                self.stats.bytes += packet.size() as u64;
                if packet.flags.contains(PacketFlags::KEY) {
                    self.stats.keyframes += 1;
                }
                if let Some(pts) = packet.pts {
                    self.stats.first_pts.get_or_insert(pts);
                    self.stats.last_pts = Some(pts);
                }
            }
            Ok(PullResult::Pending) => self.stats.pending_pulls += 1,
            Ok(PullResult::EndOfStream) => {
                if !self.stats.end_of_stream {
                    tracing::debug!("{}: end of stream", self.name);
                }
                self.stats.end_of_stream = true;
            }
            Err(e) => {
                self.stats.errors += 1;
                tracing::warn!("{}: pull failed: {}", self.name, e);
            }
        }
        result
    }

    /// Counters so far
    pub fn stats(&self) -> &EncoderStats {
        &self.stats
    }

    /// Wall time since the profiler was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Log a summary and return the final counters
    pub fn finish(self) -> EncoderStats {
        tracing::info!(
            "{}: {} frames in, {} packets out ({} bytes, avg {:.1}), {} pending pulls, {} errors, busy {:?} of {:?}",
            self.name,
            self.stats.frames_submitted,
            self.stats.packets,
            self.stats.bytes,
            self.stats.average_packet_size(),
            self.stats.pending_pulls,
            self.stats.errors,
            self.stats.busy,
            self.started.elapsed()
        );
        self.stats
    }
}
