//! Filter graph topology
//!
//! A [`FilterGraph`] is a set of nodes joined by directed, typed links. Each
//! node declares the formats it accepts through [`NodeCaps`]; negotiation
//! (see [`crate::negotiate`]) turns those declarations into one concrete
//! [`LinkFormat`] per link.

use serde::{Deserialize, Serialize};
use std::fmt;

use mediagraph_core::{
    ChannelLayout, MediaError, MediaResult, MediaType, PixelFormat, SampleFormat, SubtitleFormat,
};

use crate::formats::{CandidateSet, FormatList, LayoutSet, SetArena, SetId};

/// Handle to a node of a [`FilterGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

/// Handle to a link of a [`FilterGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId(pub(crate) usize);

impl NodeId {
    /// Raw index
    pub fn index(&self) -> usize {
        self.0
    }
}

impl LinkId {
    /// Raw index
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Declared acceptable values of one format category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatSpec<T> {
    /// Anything the category allows
    Any,
    /// Exactly these values, in preference order
    List(Vec<T>),
}

impl<T> Default for FormatSpec<T> {
    fn default() -> Self {
        FormatSpec::Any
    }
}

/// Declared acceptable channel layouts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutSpec {
    /// Any known layout
    AnyLayout,
    /// Any known layout or bare channel count
    #[default]
    AnyCount,
    /// Exactly these layouts, in preference order
    List(Vec<ChannelLayout>),
}

/// Formats a node accepts on its links
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaCaps {
    /// Pixel formats, video links
    #[serde(default)]
    pub pixel_formats: FormatSpec<PixelFormat>,
    /// Sample formats, audio links
    #[serde(default)]
    pub sample_formats: FormatSpec<SampleFormat>,
    /// Sample rates in Hz, audio links
    #[serde(default)]
    pub sample_rates: FormatSpec<u32>,
    /// Channel layouts, audio links
    #[serde(default)]
    pub channel_layouts: LayoutSpec,
    /// Subtitle formats, subtitle links
    #[serde(default)]
    pub subtitle_formats: FormatSpec<SubtitleFormat>,
}

impl MediaCaps {
    /// Caps accepting anything
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict pixel formats
    pub fn pixel_formats(mut self, formats: Vec<PixelFormat>) -> Self {
        self.pixel_formats = FormatSpec::List(formats);
        self
    }

    /// Restrict sample formats
    pub fn sample_formats(mut self, formats: Vec<SampleFormat>) -> Self {
        self.sample_formats = FormatSpec::List(formats);
        self
    }

    /// Restrict sample rates
    pub fn sample_rates(mut self, rates: Vec<u32>) -> Self {
        self.sample_rates = FormatSpec::List(rates);
        self
    }

    /// Restrict channel layouts
    pub fn channel_layouts(mut self, layouts: LayoutSpec) -> Self {
        self.channel_layouts = layouts;
        self
    }

    /// Restrict subtitle formats
    pub fn subtitle_formats(mut self, formats: Vec<SubtitleFormat>) -> Self {
        self.subtitle_formats = FormatSpec::List(formats);
        self
    }
}

/// How a node's declared formats map onto its links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCaps {
    /// All links of the node share one candidate set per category, so they
    /// end up with the same format (pass-through filters)
    Common(MediaCaps),
    /// Every link gets its own candidate sets (converters)
    Independent(MediaCaps),
}

impl NodeCaps {
    /// The declared caps
    pub fn caps(&self) -> &MediaCaps {
        match self {
            NodeCaps::Common(caps) | NodeCaps::Independent(caps) => caps,
        }
    }
}

/// A processing node
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique instance name
    pub name: String,
    /// Filter kind, e.g. `buffersink`, `scale`
    pub kind: String,
    /// Declared formats
    pub caps: NodeCaps,
    pub(crate) inputs: Vec<Option<LinkId>>,
    pub(crate) outputs: Vec<Option<LinkId>>,
}

impl Node {
    /// Links feeding the node, by input pad
    pub fn inputs(&self) -> impl Iterator<Item = LinkId> + '_ {
        self.inputs.iter().flatten().copied()
    }

    /// Links leaving the node, by output pad
    pub fn outputs(&self) -> impl Iterator<Item = LinkId> + '_ {
        self.outputs.iter().flatten().copied()
    }
}

/// Format category negotiated on links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Pixel, sample or subtitle format, depending on the media type
    Format,
    /// Sample rate
    SampleRate,
    /// Channel layout
    ChannelLayout,
}

impl Category {
    /// Categories negotiated for a media type, in merge order
    pub fn for_media(media: MediaType) -> &'static [Category] {
        match media {
            MediaType::Video | MediaType::Subtitle => &[Category::Format],
            MediaType::Audio => &[
                Category::ChannelLayout,
                Category::SampleRate,
                Category::Format,
            ],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Format => write!(f, "format"),
            Category::SampleRate => write!(f, "sample rate"),
            Category::ChannelLayout => write!(f, "channel layout"),
        }
    }
}

/// Candidate set handles held by one side of a link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SlotSets {
    pub(crate) formats: Option<SetId>,
    pub(crate) sample_rates: Option<SetId>,
    pub(crate) channel_layouts: Option<SetId>,
}

impl SlotSets {
    pub(crate) fn get(&self, category: Category) -> Option<SetId> {
        match category {
            Category::Format => self.formats,
            Category::SampleRate => self.sample_rates,
            Category::ChannelLayout => self.channel_layouts,
        }
    }

    pub(crate) fn set(&mut self, category: Category, id: Option<SetId>) {
        match category {
            Category::Format => self.formats = id,
            Category::SampleRate => self.sample_rates = id,
            Category::ChannelLayout => self.channel_layouts = id,
        }
    }
}

/// Concrete format chosen for a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "media", rename_all = "lowercase")]
pub enum LinkFormat {
    /// Video link
    Video {
        /// Pixel format
        pixel_format: PixelFormat,
    },
    /// Audio link
    Audio {
        /// Sample format
        sample_format: SampleFormat,
        /// Sample rate in Hz
        sample_rate: u32,
        /// Channel layout
        channel_layout: ChannelLayout,
    },
    /// Subtitle link
    Subtitle {
        /// Subtitle format
        format: SubtitleFormat,
    },
}

/// Directed edge between two nodes
#[derive(Debug, Clone)]
pub struct Link {
    /// Upstream node
    pub src: NodeId,
    /// Output pad of the upstream node
    pub src_pad: usize,
    /// Downstream node
    pub dst: NodeId,
    /// Input pad of the downstream node
    pub dst_pad: usize,
    /// Media carried by the link
    pub media: MediaType,
    /// Sets declared by the upstream node
    pub(crate) src_sets: SlotSets,
    /// Sets declared by the downstream node
    pub(crate) dst_sets: SlotSets,
    pub(crate) format: Option<LinkFormat>,
}

impl Link {
    /// Negotiated format, once negotiation has finished
    pub fn format(&self) -> Option<&LinkFormat> {
        self.format.as_ref()
    }
}

/// Candidate set storage for every category
#[derive(Debug, Default)]
pub struct FormatArenas {
    /// Pixel format sets
    pub pixel: SetArena<FormatList<PixelFormat>>,
    /// Sample format sets
    pub sample: SetArena<FormatList<SampleFormat>>,
    /// Subtitle format sets
    pub subtitle: SetArena<FormatList<SubtitleFormat>>,
    /// Sample rate sets
    pub rates: SetArena<FormatList<u32>>,
    /// Channel layout sets
    pub layouts: SetArena<LayoutSet>,
}

/// Directed graph of filter nodes
#[derive(Debug, Default)]
pub struct FilterGraph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) links: Vec<Link>,
    pub(crate) arenas: FormatArenas,
    pub(crate) conversions: Vec<NodeId>,
}

impl FilterGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with `inputs` input pads and `outputs` output pads
    pub fn add_node(
        &mut self,
        name: &str,
        kind: &str,
        caps: NodeCaps,
        inputs: usize,
        outputs: usize,
    ) -> MediaResult<NodeId> {
        if self.nodes.iter().any(|n| n.name == name) {
            return Err(MediaError::invalid_argument(format!(
                "node name '{}' already used",
                name
            )));
        }
        self.nodes.push(Node {
            name: name.to_string(),
            kind: kind.to_string(),
            caps,
            inputs: vec![None; inputs],
            outputs: vec![None; outputs],
        });
        Ok(NodeId(self.nodes.len() - 1))
    }

    /// Connect output pad `src_pad` of `src` to input pad `dst_pad` of `dst`
    pub fn link(
        &mut self,
        src: NodeId,
        src_pad: usize,
        dst: NodeId,
        dst_pad: usize,
        media: MediaType,
    ) -> MediaResult<LinkId> {
        let free = |pads: Option<&Vec<Option<LinkId>>>, pad: usize| {
            matches!(pads.and_then(|p| p.get(pad)), Some(None))
        };
        if !free(self.nodes.get(src.0).map(|n| &n.outputs), src_pad) {
            return Err(MediaError::invalid_argument(format!(
                "output pad {} of node {} is missing or already linked",
                src_pad, src.0
            )));
        }
        if !free(self.nodes.get(dst.0).map(|n| &n.inputs), dst_pad) {
            return Err(MediaError::invalid_argument(format!(
                "input pad {} of node {} is missing or already linked",
                dst_pad, dst.0
            )));
        }
        let id = LinkId(self.links.len());
        self.links.push(Link {
            src,
            src_pad,
            dst,
            dst_pad,
            media,
            src_sets: SlotSets::default(),
            dst_sets: SlotSets::default(),
            format: None,
        });
        self.nodes[src.0].outputs[src_pad] = Some(id);
        self.nodes[dst.0].inputs[dst_pad] = Some(id);
        Ok(id)
    }

    /// Look up a node
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Find a node by name
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name).map(NodeId)
    }

    /// Look up a link
    pub fn link_info(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0)
    }

    /// All nodes, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// All links, in insertion order
    pub fn links(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.links.iter().enumerate().map(|(i, l)| (LinkId(i), l))
    }

    /// Conversion nodes inserted by negotiation
    pub fn conversions(&self) -> &[NodeId] {
        &self.conversions
    }

    /// Candidate set storage
    pub fn arenas(&self) -> &FormatArenas {
        &self.arenas
    }

    /// Negotiated format of the first input of a sink node
    pub fn sink_format(&self, sink: NodeId) -> Option<&LinkFormat> {
        let link = self.node(sink)?.inputs().next()?;
        self.link_info(link)?.format()
    }

    /// `source -> sink` description of a link, used in error messages
    pub fn describe_link(&self, id: LinkId) -> String {
        match self.links.get(id.0) {
            Some(link) => format!(
                "{}:{} -> {}:{}",
                self.nodes[link.src.0].name,
                link.src_pad,
                self.nodes[link.dst.0].name,
                link.dst_pad
            ),
            None => format!("link {}", id.0),
        }
    }

    /// Current candidate entries of one side of a link, for reports
    pub fn describe_candidates(
        &self,
        id: LinkId,
        category: Category,
        upstream: bool,
    ) -> Option<Vec<String>> {
        let link = self.links.get(id.0)?;
        let sets = if upstream {
            &link.src_sets
        } else {
            &link.dst_sets
        };
        let set = sets.get(category)?;
        let arenas = &self.arenas;
        match (category, link.media) {
            (Category::Format, MediaType::Video) => arenas.pixel.get(set).map(CandidateSet::describe),
            (Category::Format, MediaType::Audio) => arenas.sample.get(set).map(CandidateSet::describe),
            (Category::Format, MediaType::Subtitle) => {
                arenas.subtitle.get(set).map(CandidateSet::describe)
            }
            (Category::SampleRate, _) => arenas.rates.get(set).map(CandidateSet::describe),
            (Category::ChannelLayout, _) => arenas.layouts.get(set).map(CandidateSet::describe),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_checks_pads() {
        let mut graph = FilterGraph::new();
        let src = graph
            .add_node("in", "buffer", NodeCaps::Common(MediaCaps::any()), 0, 1)
            .unwrap();
        let dst = graph
            .add_node("out", "buffersink", NodeCaps::Common(MediaCaps::any()), 1, 0)
            .unwrap();

        assert!(graph.link(src, 1, dst, 0, MediaType::Video).is_err());
        let link = graph.link(src, 0, dst, 0, MediaType::Video).unwrap();
        assert!(graph.link(src, 0, dst, 0, MediaType::Video).is_err());

        assert_eq!(graph.describe_link(link), "in:0 -> out:0");
        assert_eq!(graph.node(src).unwrap().outputs().next(), Some(link));
        assert_eq!(graph.node_by_name("out"), Some(dst));
    }

    #[test]
    fn test_duplicate_node_names_rejected() {
        let mut graph = FilterGraph::new();
        graph
            .add_node("a", "null", NodeCaps::Common(MediaCaps::any()), 1, 1)
            .unwrap();
        assert!(graph
            .add_node("a", "null", NodeCaps::Common(MediaCaps::any()), 1, 1)
            .is_err());
    }

    #[test]
    fn test_categories_per_media() {
        assert_eq!(Category::for_media(MediaType::Video), &[Category::Format]);
        assert_eq!(Category::for_media(MediaType::Audio).len(), 3);
    }

    #[test]
    fn test_caps_deserialize() {
        let caps: MediaCaps = serde_json::from_str(
            r#"{"pixel_formats": {"list": ["yuv420p", "rgba"]}, "channel_layouts": "any_layout"}"#,
        )
        .unwrap();
        assert_eq!(
            caps.pixel_formats,
            FormatSpec::List(vec![PixelFormat::Yuv420p, PixelFormat::Rgba])
        );
        assert_eq!(caps.channel_layouts, LayoutSpec::AnyLayout);
        assert_eq!(caps.sample_rates, FormatSpec::Any);
    }
}
