//! Sink declarations
//!
//! Sinks terminate a graph and are the usual place where an application
//! states which formats it wants to receive. [`SinkOptions`] is the
//! deserializable form of that statement.

use serde::{Deserialize, Serialize};

use mediagraph_core::{
    ChannelLayout, MediaError, MediaResult, MediaType, PixelFormat, SampleFormat, SubtitleFormat,
};

use crate::graph::{FilterGraph, FormatSpec, LayoutSpec, LinkFormat, MediaCaps, NodeCaps, NodeId};

/// Formats accepted by a sink
///
/// Empty lists accept anything. `channel_layouts` and `channel_counts` are
/// the legacy bitmask and count lists; they are imported once into
/// structured layouts and take precedence over `ch_layouts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkOptions {
    /// Accepted pixel formats
    pub pix_fmts: Vec<PixelFormat>,
    /// Accepted sample formats
    pub sample_fmts: Vec<SampleFormat>,
    /// Accepted sample rates
    pub sample_rates: Vec<u32>,
    /// Accepted channel layouts, `|` separated (`stereo|5.1|3c`)
    pub ch_layouts: Option<String>,
    /// Accept any channel count, including unknown layouts
    pub all_channel_counts: bool,
    /// Legacy channel layout bitmasks
    pub channel_layouts: Vec<u64>,
    /// Legacy channel counts
    pub channel_counts: Vec<u32>,
    /// Accepted subtitle formats
    pub subtitle_types: Vec<SubtitleFormat>,
}

fn spec_of<T: Clone>(items: &[T]) -> FormatSpec<T> {
    if items.is_empty() {
        FormatSpec::Any
    } else {
        FormatSpec::List(items.to_vec())
    }
}

/// Drop legacy masks whose channel count is also listed as a bare count
fn cleanup_redundant_layouts(masks: &[u64], counts: &[u32]) -> Vec<u64> {
    let listed: u64 = counts
        .iter()
        .filter(|&&c| c < 64)
        .fold(0, |acc, &c| acc | (1u64 << c));
    masks
        .iter()
        .copied()
        .filter(|&mask| {
            let n = mask.count_ones();
            let redundant = n < 64 && listed & (1u64 << n) != 0;
            if redundant {
                tracing::warn!(
                    "Removing channel layout 0x{:x}, redundant with {} channels",
                    mask,
                    n
                );
            }
            !redundant
        })
        .collect()
}

impl SinkOptions {
    /// Parse options from a JSON object
    pub fn from_json(json: &str) -> MediaResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| MediaError::invalid_argument(format!("invalid sink options: {}", e)))
    }

    /// Channel layout declaration implied by the layout options
    pub fn layout_spec(&self) -> MediaResult<LayoutSpec> {
        let any_option = !self.channel_layouts.is_empty()
            || !self.channel_counts.is_empty()
            || self.ch_layouts.is_some()
            || self.all_channel_counts;
        if !any_option {
            return Ok(LayoutSpec::AnyCount);
        }

        let mut layouts: Vec<ChannelLayout> =
            cleanup_redundant_layouts(&self.channel_layouts, &self.channel_counts)
                .into_iter()
                .map(ChannelLayout::from_mask)
                .collect();
        layouts.extend(
            self.channel_counts
                .iter()
                .map(|&c| ChannelLayout::Unspecified(c)),
        );

        if let Some(list) = &self.ch_layouts {
            if !layouts.is_empty() {
                tracing::warn!(
                    "Conflicting ch_layouts and list of channel_counts/channel_layouts. Ignoring the former"
                );
            } else {
                for name in list.split('|') {
                    let layout = name.parse::<ChannelLayout>().map_err(|_| {
                        MediaError::invalid_argument(format!(
                            "Error parsing channel layout: {}",
                            name
                        ))
                    })?;
                    layouts.push(layout);
                }
            }
        }

        if self.all_channel_counts {
            if !layouts.is_empty() {
                tracing::warn!("Conflicting all_channel_counts and list in options");
            } else {
                return Ok(LayoutSpec::AnyCount);
            }
        }
        Ok(LayoutSpec::List(layouts))
    }

    /// Caps of a sink receiving `media`
    pub fn to_caps(&self, media: MediaType) -> MediaResult<MediaCaps> {
        let mut caps = MediaCaps::any();
        match media {
            MediaType::Video => caps.pixel_formats = spec_of(&self.pix_fmts),
            MediaType::Audio => {
                caps.sample_formats = spec_of(&self.sample_fmts);
                caps.sample_rates = spec_of(&self.sample_rates);
                caps.channel_layouts = self.layout_spec()?;
            }
            MediaType::Subtitle => caps.subtitle_formats = spec_of(&self.subtitle_types),
        }
        Ok(caps)
    }
}

impl FilterGraph {
    /// Add a sink node with one input accepting `media` as described by
    /// `options`
    pub fn add_sink(
        &mut self,
        name: &str,
        media: MediaType,
        options: &SinkOptions,
    ) -> MediaResult<NodeId> {
        let kind = match media {
            MediaType::Video => "buffersink",
            MediaType::Audio => "abuffersink",
            MediaType::Subtitle => "sbuffersink",
        };
        let caps = options.to_caps(media)?;
        self.add_node(name, kind, NodeCaps::Common(caps), 1, 0)
    }

    /// Add a source node producing exactly `format` on one output
    pub fn add_source(&mut self, name: &str, format: LinkFormat) -> MediaResult<NodeId> {
        let (kind, caps) = match format {
            LinkFormat::Video { pixel_format } => {
                ("buffer", MediaCaps::any().pixel_formats(vec![pixel_format]))
            }
            LinkFormat::Audio {
                sample_format,
                sample_rate,
                channel_layout,
            } => (
                "abuffer",
                MediaCaps::any()
                    .sample_formats(vec![sample_format])
                    .sample_rates(vec![sample_rate])
                    .channel_layouts(LayoutSpec::List(vec![channel_layout])),
            ),
            LinkFormat::Subtitle { format } => {
                ("sbuffer", MediaCaps::any().subtitle_formats(vec![format]))
            }
        };
        self.add_node(name, kind, NodeCaps::Common(caps), 0, 1)
    }
}
