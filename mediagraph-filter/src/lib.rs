//! # mediagraph filter
//!
//! Filter graph topology and format negotiation. Nodes declare the formats
//! they accept, links carry candidate sets for each format category, and
//! negotiation merges them until every link has one concrete format,
//! splicing in conversion nodes where the two ends have nothing in common.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod formats;
pub mod graph;
pub mod negotiate;
pub mod sink;

// Re-export main types
pub use formats::{
    CandidateSet, FormatList, FormatValue, LayoutSet, MergeOutcome, SetArena, SetId,
};
pub use graph::{
    Category, FilterGraph, FormatArenas, FormatSpec, LayoutSpec, Link, LinkFormat, LinkId,
    MediaCaps, Node, NodeCaps, NodeId,
};
pub use negotiate::{
    category_state, fixate_links, merge_links, negotiate, query_formats, reduce_formats,
    CategoryState, NegotiationConfig,
};
pub use sink::SinkOptions;
