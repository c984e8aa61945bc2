//! Format negotiation
//!
//! Negotiation runs in four passes:
//!
//! 1. [`query_formats`] gives every link side the candidate sets declared by
//!    the node on that side.
//! 2. [`merge_links`] walks the links in order and merges the two sides of
//!    each category. When any category of a link cannot be merged, a
//!    conversion node is spliced into the link and the two halves are merged
//!    against its unconstrained sets instead. Links appended by a conversion
//!    are visited by the same walk.
//! 3. [`reduce_formats`] narrows the sets leaving a node to the value its
//!    inputs already settled on, when the node accepts that value. A
//!    converter feeding an unconstrained sink thus keeps the sample rate and
//!    channel layout of its input.
//! 4. [`fixate_links`] collapses every merged set to its first entry and
//!    records the resulting [`LinkFormat`] on the link.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use mediagraph_core::{MediaError, MediaResult, MediaType};

use crate::formats::{CandidateSet, FormatList, FormatValue, LayoutSet, MergeOutcome, SetArena, SetId};
use crate::graph::{
    Category, FilterGraph, FormatArenas, FormatSpec, LayoutSpec, Link, LinkFormat, LinkId,
    MediaCaps, NodeCaps, NodeId, SlotSets,
};

/// Negotiation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Upper bound on conversion nodes inserted in one negotiation
    pub max_conversions: usize,
    /// Filter kind inserted to convert video links
    pub video_converter: String,
    /// Filter kind inserted to convert audio links
    pub audio_converter: String,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_conversions: 64,
            video_converter: "scale".to_string(),
            audio_converter: "aresample".to_string(),
        }
    }
}

/// Negotiation progress of one category on one link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryState {
    /// Neither side constrains the category
    Unconstrained,
    /// This many values are acceptable to both sides
    Candidates(usize),
    /// Exactly one value is left
    Resolved,
    /// The sides have nothing acceptable in common
    Conflict,
}

macro_rules! with_arena {
    ($arenas:expr, $media:expr, $category:expr, $arena:ident => $body:expr) => {
        match ($category, $media) {
            (Category::Format, MediaType::Video) => {
                let $arena = &mut $arenas.pixel;
                $body
            }
            (Category::Format, MediaType::Audio) => {
                let $arena = &mut $arenas.sample;
                $body
            }
            (Category::Format, MediaType::Subtitle) => {
                let $arena = &mut $arenas.subtitle;
                $body
            }
            (Category::SampleRate, _) => {
                let $arena = &mut $arenas.rates;
                $body
            }
            (Category::ChannelLayout, _) => {
                let $arena = &mut $arenas.layouts;
                $body
            }
        }
    };
}

/// Run all negotiation passes
///
/// Returns the conversion nodes that had to be inserted.
pub fn negotiate(graph: &mut FilterGraph, config: &NegotiationConfig) -> MediaResult<Vec<NodeId>> {
    if graph.links.iter().any(|l| l.format.is_some()) {
        return Err(MediaError::invalid_argument("graph is already negotiated"));
    }
    let before = graph.conversions.len();
    query_formats(graph)?;
    merge_links(graph, config)?;
    reduce_formats(graph)?;
    fixate_links(graph)?;
    let inserted = graph.conversions[before..].to_vec();
    tracing::info!(
        "negotiated {} links, {} conversions inserted",
        graph.links.len(),
        inserted.len()
    );
    Ok(inserted)
}

// ============================================================================
// QUERY
// ============================================================================

fn list_from_spec<T: FormatValue>(spec: &FormatSpec<T>) -> FormatList<T> {
    match spec {
        FormatSpec::Any => FormatList::any(),
        FormatSpec::List(items) => FormatList::new(items.clone()),
    }
}

fn insert_validated<S: CandidateSet>(arena: &mut SetArena<S>, set: S) -> MediaResult<SetId> {
    set.validate()?;
    Ok(arena.insert(set))
}

fn create_set(
    arenas: &mut FormatArenas,
    caps: &MediaCaps,
    media: MediaType,
    category: Category,
) -> MediaResult<SetId> {
    match (category, media) {
        (Category::Format, MediaType::Video) => {
            insert_validated(&mut arenas.pixel, list_from_spec(&caps.pixel_formats))
        }
        (Category::Format, MediaType::Audio) => {
            insert_validated(&mut arenas.sample, list_from_spec(&caps.sample_formats))
        }
        (Category::Format, MediaType::Subtitle) => {
            insert_validated(&mut arenas.subtitle, list_from_spec(&caps.subtitle_formats))
        }
        (Category::SampleRate, _) => {
            insert_validated(&mut arenas.rates, list_from_spec(&caps.sample_rates))
        }
        (Category::ChannelLayout, _) => {
            let set = match &caps.channel_layouts {
                LayoutSpec::AnyLayout => LayoutSet::any_layout(),
                LayoutSpec::AnyCount => LayoutSet::any_count(),
                LayoutSpec::List(layouts) => LayoutSet::new(layouts.clone()),
            };
            insert_validated(&mut arenas.layouts, set)
        }
    }
}

fn slot_mut(link: &mut Link, upstream: bool) -> &mut SlotSets {
    if upstream {
        &mut link.src_sets
    } else {
        &mut link.dst_sets
    }
}

/// Attach the sets declared by every node to its link sides
pub fn query_formats(graph: &mut FilterGraph) -> MediaResult<()> {
    for node_index in 0..graph.nodes.len() {
        let node = &graph.nodes[node_index];
        let caps = node.caps.clone();
        let name = node.name.clone();
        // the node is upstream of its output links, downstream of its inputs
        let attached: Vec<(LinkId, bool)> = node
            .outputs()
            .map(|l| (l, true))
            .chain(node.inputs().map(|l| (l, false)))
            .collect();

        let mut common: HashMap<(MediaType, Category), SetId> = HashMap::new();
        for (link_id, upstream) in attached {
            let media = graph.links[link_id.0].media;
            for &category in Category::for_media(media) {
                let id = match (&caps, common.get(&(media, category))) {
                    (NodeCaps::Common(_), Some(id)) => *id,
                    (NodeCaps::Common(declared), None) => {
                        let id = create_set(&mut graph.arenas, declared, media, category)
                            .map_err(|e| declaration_error(&name, e))?;
                        common.insert((media, category), id);
                        id
                    }
                    (NodeCaps::Independent(declared), _) => {
                        create_set(&mut graph.arenas, declared, media, category)
                            .map_err(|e| declaration_error(&name, e))?
                    }
                };
                with_arena!(graph.arenas, media, category, arena => arena.acquire(id))?;
                let slot = slot_mut(&mut graph.links[link_id.0], upstream);
                if let Some(old) = slot.get(category) {
                    with_arena!(graph.arenas, media, category, arena => arena.release(old))?;
                }
                slot.set(category, Some(id));
            }
        }
        tracing::debug!("queried formats of node '{}'", name);
    }
    Ok(())
}

fn declaration_error(node: &str, err: MediaError) -> MediaError {
    MediaError::invalid_argument(format!("node '{}': {}", node, reason_of(err)))
}

fn reason_of(err: MediaError) -> String {
    match err {
        MediaError::InvalidArgument { reason } => reason,
        other => other.to_string(),
    }
}

// ============================================================================
// MERGE
// ============================================================================

fn sides(graph: &FilterGraph, link: LinkId, category: Category) -> MediaResult<(SetId, SetId)> {
    let l = &graph.links[link.0];
    match (l.src_sets.get(category), l.dst_sets.get(category)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(MediaError::GraphBuild {
            link: graph.describe_link(link),
            reason: format!("no {} declared", category),
        }),
    }
}

/// Merge both sides of every link, inserting conversions where needed
pub fn merge_links(graph: &mut FilterGraph, config: &NegotiationConfig) -> MediaResult<()> {
    let mut index = 0;
    while index < graph.links.len() {
        let link = LinkId(index);
        let media = graph.links[index].media;
        let categories = Category::for_media(media);

        let mut conflict = None;
        for &category in categories {
            let (a, b) = sides(graph, link, category)?;
            let mergeable = with_arena!(graph.arenas, media, category, arena => arena.can_merge(a, b));
            if !mergeable {
                conflict = Some(category);
                break;
            }
        }
        if let Some(category) = conflict {
            insert_conversion(graph, link, category, config)?;
        }

        for &category in categories {
            let (a, b) = sides(graph, link, category)?;
            let outcome = with_arena!(graph.arenas, media, category, arena => arena.merge(a, b))?;
            if outcome == MergeOutcome::Incompatible {
                return Err(MediaError::GraphBuild {
                    link: graph.describe_link(link),
                    reason: format!("impossible to convert between the {}s of both ends", category),
                });
            }
        }
        index += 1;
    }
    Ok(())
}

/// Splice a conversion node into `link`
///
/// The link keeps its upstream end and now feeds the converter; a new link
/// carries the converter output to the old downstream end, taking over that
/// end's candidate sets. The converter sides start unconstrained.
fn insert_conversion(
    graph: &mut FilterGraph,
    link: LinkId,
    category: Category,
    config: &NegotiationConfig,
) -> MediaResult<NodeId> {
    let media = graph.links[link.0].media;
    let kind = match media {
        MediaType::Video => config.video_converter.clone(),
        MediaType::Audio => config.audio_converter.clone(),
        MediaType::Subtitle => {
            return Err(MediaError::GraphBuild {
                link: graph.describe_link(link),
                reason: format!("no conversion available for subtitle {}", category),
            })
        }
    };
    if graph.conversions.len() >= config.max_conversions {
        return Err(MediaError::ResourceExhausted {
            resource: format!("conversion nodes (limit {})", config.max_conversions),
        });
    }

    let name = format!("auto_{}_{}", kind, graph.conversions.len());
    tracing::info!(
        "inserting '{}' on {} to resolve a {} mismatch",
        name,
        graph.describe_link(link),
        category
    );
    let converter = graph.add_node(&name, &kind, NodeCaps::Independent(MediaCaps::any()), 1, 1)?;

    let old = graph.links[link.0].clone();
    let tail = LinkId(graph.links.len());
    graph.links.push(Link {
        src: converter,
        src_pad: 0,
        dst: old.dst,
        dst_pad: old.dst_pad,
        media,
        src_sets: SlotSets::default(),
        dst_sets: old.dst_sets,
        format: None,
    });
    graph.nodes[old.dst.0].inputs[old.dst_pad] = Some(tail);
    graph.nodes[converter.0].outputs[0] = Some(tail);

    let head = &mut graph.links[link.0];
    head.dst = converter;
    head.dst_pad = 0;
    head.dst_sets = SlotSets::default();
    graph.nodes[converter.0].inputs[0] = Some(link);

    let any = MediaCaps::any();
    for &category in Category::for_media(media) {
        for (side, upstream) in [(link, false), (tail, true)] {
            let id = create_set(&mut graph.arenas, &any, media, category)?;
            with_arena!(graph.arenas, media, category, arena => arena.acquire(id))?;
            slot_mut(&mut graph.links[side.0], upstream).set(category, Some(id));
        }
    }
    graph.conversions.push(converter);
    Ok(converter)
}

// ============================================================================
// REDUCE
// ============================================================================

/// Narrow output sets to the single values settled on the node inputs
///
/// Repeats until nothing changes; a set only ever shrinks to one entry, so
/// this terminates.
pub fn reduce_formats(graph: &mut FilterGraph) -> MediaResult<()> {
    loop {
        let mut changed = false;
        for index in 0..graph.links.len() {
            changed |= reduce_link(graph, LinkId(index))?;
        }
        if !changed {
            return Ok(());
        }
    }
}

fn reduce_link(graph: &mut FilterGraph, link: LinkId) -> MediaResult<bool> {
    let media = graph.links[link.0].media;
    let src = graph.links[link.0].src;
    let inputs: Vec<LinkId> = graph.nodes[src.0]
        .inputs()
        .filter(|l| graph.links[l.0].media == media)
        .collect();

    let mut changed = false;
    for &category in Category::for_media(media) {
        let (out, _) = sides(graph, link, category)?;
        for &input in &inputs {
            let (settled, _) = sides(graph, input, category)?;
            changed |= with_arena!(graph.arenas, media, category, arena => arena.reduce(out, settled))?;
        }
    }
    Ok(changed)
}

// ============================================================================
// FIXATE
// ============================================================================

/// Collapse every link's merged sets and record the chosen formats
///
/// Links are visited in order. Before a link is fixated its sets are
/// reduced against the already fixated inputs of its upstream node.
pub fn fixate_links(graph: &mut FilterGraph) -> MediaResult<()> {
    for index in 0..graph.links.len() {
        let link = LinkId(index);
        let media = graph.links[index].media;
        reduce_link(graph, link)?;
        let mut chosen: HashMap<Category, SetId> = HashMap::new();
        for &category in Category::for_media(media) {
            let (a, b) = sides(graph, link, category)?;
            let same = with_arena!(graph.arenas, media, category, arena => arena.resolve(a) == arena.resolve(b));
            if !same {
                return Err(MediaError::GraphBuild {
                    link: graph.describe_link(link),
                    reason: format!("{} was never merged", category),
                });
            }
            with_arena!(graph.arenas, media, category, arena => arena.fixate(a)).map_err(|e| {
                MediaError::GraphBuild {
                    link: graph.describe_link(link),
                    reason: reason_of(e),
                }
            })?;
            chosen.insert(category, a);
        }

        let format = read_format(&graph.arenas, media, &chosen).ok_or_else(|| {
            MediaError::GraphBuild {
                link: graph.describe_link(link),
                reason: "negotiated set is empty".to_string(),
            }
        })?;
        tracing::debug!("{} negotiated to {:?}", graph.describe_link(link), format);
        graph.links[index].format = Some(format);
    }
    Ok(())
}

fn read_format(
    arenas: &FormatArenas,
    media: MediaType,
    chosen: &HashMap<Category, SetId>,
) -> Option<LinkFormat> {
    let format = *chosen.get(&Category::Format)?;
    match media {
        MediaType::Video => Some(LinkFormat::Video {
            pixel_format: arenas.pixel.get(format)?.first()?,
        }),
        MediaType::Subtitle => Some(LinkFormat::Subtitle {
            format: arenas.subtitle.get(format)?.first()?,
        }),
        MediaType::Audio => Some(LinkFormat::Audio {
            sample_format: arenas.sample.get(format)?.first()?,
            sample_rate: arenas
                .rates
                .get(*chosen.get(&Category::SampleRate)?)?
                .first()?,
            channel_layout: arenas
                .layouts
                .get(*chosen.get(&Category::ChannelLayout)?)?
                .first()?,
        }),
    }
}

// ============================================================================
// STATE
// ============================================================================

fn state_of<S: CandidateSet>(arena: &SetArena<S>, a: SetId, b: SetId) -> CategoryState {
    let (a, b) = (arena.resolve(a), arena.resolve(b));
    let joined = if a == b {
        arena.get(a).cloned()
    } else {
        match (arena.get(a), arena.get(b)) {
            (Some(sa), Some(sb)) => S::intersect(sa, sb),
            _ => None,
        }
    };
    match joined {
        None => CategoryState::Conflict,
        Some(set) if set.is_wildcard() && set.is_empty() => CategoryState::Unconstrained,
        Some(set) if set.len() == 1 => CategoryState::Resolved,
        Some(set) => CategoryState::Candidates(set.len()),
    }
}

/// Negotiation state of one category of a link
///
/// `None` until [`query_formats`] has run or when the category does not
/// apply to the link's media type.
pub fn category_state(graph: &FilterGraph, link: LinkId, category: Category) -> Option<CategoryState> {
    let l = graph.links.get(link.0)?;
    if !Category::for_media(l.media).contains(&category) {
        return None;
    }
    let (a, b) = (l.src_sets.get(category)?, l.dst_sets.get(category)?);
    let arenas = &graph.arenas;
    Some(match (category, l.media) {
        (Category::Format, MediaType::Video) => state_of(&arenas.pixel, a, b),
        (Category::Format, MediaType::Audio) => state_of(&arenas.sample, a, b),
        (Category::Format, MediaType::Subtitle) => state_of(&arenas.subtitle, a, b),
        (Category::SampleRate, _) => state_of(&arenas.rates, a, b),
        (Category::ChannelLayout, _) => state_of(&arenas.layouts, a, b),
    })
}
