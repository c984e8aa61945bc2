//! Filter graph negotiation reports

use mediagraph_core::{MediaError, MediaResult, MediaType};
use mediagraph_filter::{category_state, Category, CategoryState, FilterGraph, LinkFormat};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Node summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReport {
    /// Instance name
    pub name: String,
    /// Filter kind
    pub kind: String,
    /// Number of connected inputs
    pub inputs: usize,
    /// Number of connected outputs
    pub outputs: usize,
    /// Whether negotiation inserted this node
    pub inserted: bool,
}

/// Negotiation state of one category on one link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryReport {
    /// Category
    pub category: Category,
    /// Current state, `None` before formats were queried
    pub state: Option<CategoryState>,
    /// Candidates offered by the upstream side
    pub upstream: Vec<String>,
    /// Candidates accepted by the downstream side
    pub downstream: Vec<String>,
}

/// Link summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReport {
    /// `source:pad -> sink:pad`
    pub description: String,
    /// Media carried
    pub media: MediaType,
    /// Per-category state, in merge order
    pub categories: Vec<CategoryReport>,
    /// Negotiated format, once negotiation finished
    pub format: Option<LinkFormat>,
}

impl LinkReport {
    /// Whether any category has no common value
    pub fn has_conflict(&self) -> bool {
        self.categories
            .iter()
            .any(|c| c.state == Some(CategoryState::Conflict))
    }
}

/// Snapshot of a filter graph and its negotiation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphReport {
    /// Every node, in insertion order
    pub nodes: Vec<NodeReport>,
    /// Every link, in insertion order
    pub links: Vec<LinkReport>,
    /// Names of the inserted conversion nodes
    pub conversions: Vec<String>,
}

impl GraphReport {
    /// Build a report from the current state of `graph`
    pub fn from_graph(graph: &FilterGraph) -> Self {
        let inserted: Vec<String> = graph
            .conversions()
            .iter()
            .filter_map(|id| graph.node(*id))
            .map(|n| n.name.clone())
            .collect();

        let nodes = graph
            .nodes()
            .map(|(_, node)| NodeReport {
                name: node.name.clone(),
                kind: node.kind.clone(),
                inputs: node.inputs().count(),
                outputs: node.outputs().count(),
                inserted: inserted.contains(&node.name),
            })
            .collect();

        let links = graph
            .links()
            .map(|(id, link)| LinkReport {
                description: graph.describe_link(id),
                media: link.media,
                categories: Category::for_media(link.media)
                    .iter()
                    .map(|&category| CategoryReport {
                        category,
                        state: category_state(graph, id, category),
                        upstream: graph
                            .describe_candidates(id, category, true)
                            .unwrap_or_default(),
                        downstream: graph
                            .describe_candidates(id, category, false)
                            .unwrap_or_default(),
                    })
                    .collect(),
                format: link.format().copied(),
            })
            .collect();

        Self {
            nodes,
            links,
            conversions: inserted,
        }
    }

    /// Links that have not been given a format
    pub fn unresolved_links(&self) -> impl Iterator<Item = &LinkReport> {
        self.links.iter().filter(|l| l.format.is_none())
    }

    /// Links with at least one conflicting category
    pub fn conflicts(&self) -> impl Iterator<Item = &LinkReport> {
        self.links.iter().filter(|l| l.has_conflict())
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> MediaResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MediaError::configuration(format!(
            "failed to serialize graph report: {}",
            e
        )))
    }

    /// Emit the report through `tracing`
    pub fn log(&self) {
        tracing::info!(
            "graph: {} nodes, {} links, {} conversions",
            self.nodes.len(),
            self.links.len(),
            self.conversions.len()
        );
        for link in &self.links {
            tracing::debug!("{}", LinkLine(link));
        }
    }
}

struct LinkLine<'a>(&'a LinkReport);

impl fmt::Display for LinkLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let link = self.0;
        write!(f, "{} [{}]", link.description, link.media)?;
        match &link.format {
            Some(LinkFormat::Video { pixel_format }) => write!(f, " {}", pixel_format),
            Some(LinkFormat::Audio {
                sample_format,
                sample_rate,
                channel_layout,
            }) => write!(f, " {} {}Hz {}", sample_format, sample_rate, channel_layout),
            Some(LinkFormat::Subtitle { format }) => write!(f, " {}", format),
            None => {
                for c in &link.categories {
                    match c.state {
                        Some(CategoryState::Candidates(n)) => write!(f, " {}:{}", c.category, n)?,
                        Some(state) => write!(f, " {}:{:?}", c.category, state)?,
                        None => write!(f, " {}:unqueried", c.category)?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for GraphReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            let marker = if node.inserted { " (auto)" } else { "" };
            writeln!(f, "node {} ({}){}", node.name, node.kind, marker)?;
        }
        for link in &self.links {
            writeln!(f, "link {}", LinkLine(link))?;
        }
        Ok(())
    }
}
