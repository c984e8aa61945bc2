//! Integration tests for format negotiation
//!
//! Graphs are built through the public API the way an application would:
//! sources with a fixed format, optional processing nodes, and sinks
//! declared through `SinkOptions`.

use mediagraph_core::*;
use mediagraph_filter::*;

fn audio_source(graph: &mut FilterGraph, name: &str, fmt: SampleFormat, rate: u32, layout: ChannelLayout) -> NodeId {
    graph
        .add_source(
            name,
            LinkFormat::Audio {
                sample_format: fmt,
                sample_rate: rate,
                channel_layout: layout,
            },
        )
        .unwrap()
}

fn video_chain(src: MediaCaps, sink: MediaCaps) -> (FilterGraph, NodeId, LinkId) {
    let mut graph = FilterGraph::new();
    let a = graph
        .add_node("decoder", "buffer", NodeCaps::Common(src), 0, 1)
        .unwrap();
    let b = graph
        .add_node("out", "buffersink", NodeCaps::Common(sink), 1, 0)
        .unwrap();
    let link = graph.link(a, 0, b, 0, MediaType::Video).unwrap();
    (graph, b, link)
}

// ============================================================================
// DIRECT NEGOTIATION
// ============================================================================

#[test]
fn test_common_subset_keeps_upstream_order() {
    let (mut graph, sink, link) = video_chain(
        MediaCaps::any().pixel_formats(vec![
            PixelFormat::Yuv420p,
            PixelFormat::Nv12,
            PixelFormat::Rgb24,
        ]),
        MediaCaps::any().pixel_formats(vec![
            PixelFormat::Nv12,
            PixelFormat::Rgb24,
            PixelFormat::Bgr24,
        ]),
    );

    query_formats(&mut graph).unwrap();
    assert_eq!(
        category_state(&graph, link, Category::Format),
        Some(CategoryState::Candidates(2))
    );

    let config = NegotiationConfig::default();
    merge_links(&mut graph, &config).unwrap();
    assert_eq!(
        graph.describe_candidates(link, Category::Format, true),
        Some(vec!["nv12".to_string(), "rgb24".to_string()])
    );
    // both sides share the merged set
    assert_eq!(
        graph.describe_candidates(link, Category::Format, false),
        graph.describe_candidates(link, Category::Format, true)
    );

    fixate_links(&mut graph).unwrap();
    assert!(graph.conversions().is_empty());
    assert_eq!(
        graph.sink_format(sink),
        Some(&LinkFormat::Video {
            pixel_format: PixelFormat::Nv12
        })
    );
}

#[test]
fn test_sample_format_intersection() {
    let mut graph = FilterGraph::new();
    let src = graph
        .add_node(
            "decoder",
            "abuffer",
            NodeCaps::Common(
                MediaCaps::any()
                    .sample_formats(vec![SampleFormat::S16, SampleFormat::S32, SampleFormat::F32])
                    .sample_rates(vec![48000])
                    .channel_layouts(LayoutSpec::List(vec![ChannelLayout::STEREO])),
            ),
            0,
            1,
        )
        .unwrap();
    let options = SinkOptions {
        sample_fmts: vec![SampleFormat::S32, SampleFormat::F32, SampleFormat::F64],
        ..SinkOptions::default()
    };
    let sink = graph.add_sink("out", MediaType::Audio, &options).unwrap();
    graph.link(src, 0, sink, 0, MediaType::Audio).unwrap();

    let inserted = negotiate(&mut graph, &NegotiationConfig::default()).unwrap();
    assert!(inserted.is_empty());
    assert_eq!(
        graph.sink_format(sink),
        Some(&LinkFormat::Audio {
            sample_format: SampleFormat::S32,
            sample_rate: 48000,
            channel_layout: ChannelLayout::STEREO,
        })
    );
}

#[test]
fn test_known_layout_matches_channel_count() {
    let mut graph = FilterGraph::new();
    let src = audio_source(&mut graph, "in", SampleFormat::F32, 44100, ChannelLayout::STEREO);
    let options = SinkOptions {
        channel_counts: vec![2],
        ..SinkOptions::default()
    };
    let sink = graph.add_sink("out", MediaType::Audio, &options).unwrap();
    let link = graph.link(src, 0, sink, 0, MediaType::Audio).unwrap();

    query_formats(&mut graph).unwrap();
    assert_eq!(
        category_state(&graph, link, Category::ChannelLayout),
        Some(CategoryState::Resolved)
    );

    merge_links(&mut graph, &NegotiationConfig::default()).unwrap();
    fixate_links(&mut graph).unwrap();
    assert!(graph.conversions().is_empty());
    match graph.sink_format(sink) {
        Some(LinkFormat::Audio { channel_layout, .. }) => {
            assert_eq!(*channel_layout, ChannelLayout::STEREO);
            assert_eq!(channel_layout.to_string(), "stereo");
        }
        other => panic!("unexpected format {:?}", other),
    }
}

#[test]
fn test_common_caps_shared_between_pads() {
    // A mixer with common caps: both inputs must end up in the same format
    let mut graph = FilterGraph::new();
    let a = audio_source(&mut graph, "a", SampleFormat::S16, 48000, ChannelLayout::STEREO);
    let b = audio_source(&mut graph, "b", SampleFormat::F32, 48000, ChannelLayout::STEREO);
    let mix = graph
        .add_node(
            "mix",
            "amix",
            NodeCaps::Common(
                MediaCaps::any().sample_formats(vec![SampleFormat::F32, SampleFormat::S16]),
            ),
            2,
            1,
        )
        .unwrap();
    let sink = graph
        .add_sink("out", MediaType::Audio, &SinkOptions::default())
        .unwrap();
    graph.link(a, 0, mix, 0, MediaType::Audio).unwrap();
    graph.link(b, 0, mix, 1, MediaType::Audio).unwrap();
    graph.link(mix, 0, sink, 0, MediaType::Audio).unwrap();

    let inserted = negotiate(&mut graph, &NegotiationConfig::default()).unwrap();
    // the first input narrows the shared set to s16, so the second needs a converter
    assert_eq!(inserted.len(), 1);
    let converter = graph.node(inserted[0]).unwrap();
    assert_eq!(converter.kind, "aresample");

    let formats: Vec<SampleFormat> = graph
        .links()
        .filter_map(|(_, l)| match l.format() {
            Some(LinkFormat::Audio { sample_format, .. }) => Some(*sample_format),
            _ => None,
        })
        .collect();
    assert_eq!(formats.len(), graph.links().count());

    let mix_id = graph.node_by_name("mix").unwrap();
    let mix_node = graph.node(mix_id).unwrap();
    for input in mix_node.inputs() {
        assert_eq!(
            graph.link_info(input).unwrap().format(),
            Some(&LinkFormat::Audio {
                sample_format: SampleFormat::S16,
                sample_rate: 48000,
                channel_layout: ChannelLayout::STEREO,
            })
        );
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

#[test]
fn test_disjoint_pixel_formats_insert_scaler() {
    let (mut graph, sink, link) = video_chain(
        MediaCaps::any().pixel_formats(vec![PixelFormat::Rgb24]),
        MediaCaps::any().pixel_formats(vec![PixelFormat::Gray8]),
    );

    let inserted = negotiate(&mut graph, &NegotiationConfig::default()).unwrap();
    assert_eq!(inserted.len(), 1);
    let converter = graph.node(inserted[0]).unwrap();
    assert_eq!(converter.kind, "scale");
    assert_eq!(converter.name, "auto_scale_0");

    // the original link now feeds the converter
    let head = graph.link_info(link).unwrap();
    assert_eq!(head.dst, inserted[0]);
    assert_eq!(
        head.format(),
        Some(&LinkFormat::Video {
            pixel_format: PixelFormat::Rgb24
        })
    );
    assert_eq!(
        graph.sink_format(sink),
        Some(&LinkFormat::Video {
            pixel_format: PixelFormat::Gray8
        })
    );
    assert_eq!(graph.links().count(), 2);
}

#[test]
fn test_alpha_and_chroma_fidelity_forces_conversion() {
    // gray8 is common, but rgba and yuv420p would both keep chroma
    let (mut graph, sink, link) = video_chain(
        MediaCaps::any().pixel_formats(vec![PixelFormat::Rgba, PixelFormat::Gray8]),
        MediaCaps::any().pixel_formats(vec![PixelFormat::Yuv420p, PixelFormat::Gray8]),
    );

    query_formats(&mut graph).unwrap();
    assert_eq!(
        category_state(&graph, link, Category::Format),
        Some(CategoryState::Conflict)
    );

    merge_links(&mut graph, &NegotiationConfig::default()).unwrap();
    fixate_links(&mut graph).unwrap();
    assert_eq!(graph.conversions().len(), 1);
    assert_eq!(
        graph.link_info(link).unwrap().format(),
        Some(&LinkFormat::Video {
            pixel_format: PixelFormat::Rgba
        })
    );
    assert_eq!(
        graph.sink_format(sink),
        Some(&LinkFormat::Video {
            pixel_format: PixelFormat::Yuv420p
        })
    );
}

#[test]
fn test_sample_rate_mismatch_inserts_resampler() {
    let mut graph = FilterGraph::new();
    let src = audio_source(&mut graph, "in", SampleFormat::S16, 44100, ChannelLayout::STEREO);
    let options = SinkOptions {
        sample_fmts: vec![SampleFormat::F32],
        sample_rates: vec![48000],
        ch_layouts: Some("stereo".to_string()),
        ..SinkOptions::default()
    };
    let sink = graph.add_sink("out", MediaType::Audio, &options).unwrap();
    let link = graph.link(src, 0, sink, 0, MediaType::Audio).unwrap();

    let config = NegotiationConfig {
        audio_converter: "aconvert".to_string(),
        ..NegotiationConfig::default()
    };
    let inserted = negotiate(&mut graph, &config).unwrap();
    assert_eq!(inserted.len(), 1);
    assert_eq!(graph.node(inserted[0]).unwrap().name, "auto_aconvert_0");

    assert_eq!(
        graph.link_info(link).unwrap().format(),
        Some(&LinkFormat::Audio {
            sample_format: SampleFormat::S16,
            sample_rate: 44100,
            channel_layout: ChannelLayout::STEREO,
        })
    );
    assert_eq!(
        graph.sink_format(sink),
        Some(&LinkFormat::Audio {
            sample_format: SampleFormat::F32,
            sample_rate: 48000,
            channel_layout: ChannelLayout::STEREO,
        })
    );
}

#[test]
fn test_converter_keeps_rate_and_layout_for_open_sink() {
    let mut graph = FilterGraph::new();
    let src = audio_source(&mut graph, "in", SampleFormat::S16, 44100, ChannelLayout::STEREO);
    let options = SinkOptions {
        sample_fmts: vec![SampleFormat::F32],
        ..SinkOptions::default()
    };
    let sink = graph.add_sink("out", MediaType::Audio, &options).unwrap();
    graph.link(src, 0, sink, 0, MediaType::Audio).unwrap();

    let inserted = negotiate(&mut graph, &NegotiationConfig::default()).unwrap();
    assert_eq!(inserted.len(), 1);
    assert_eq!(
        graph.sink_format(sink),
        Some(&LinkFormat::Audio {
            sample_format: SampleFormat::F32,
            sample_rate: 44100,
            channel_layout: ChannelLayout::STEREO,
        })
    );
}

#[test]
fn test_converter_picks_source_rate_from_sink_list() {
    // only the layout is open, the sink rate list holds the source rate second
    let mut graph = FilterGraph::new();
    let src = audio_source(&mut graph, "in", SampleFormat::S16, 44100, ChannelLayout::MONO);
    let options = SinkOptions {
        sample_fmts: vec![SampleFormat::F32],
        sample_rates: vec![48000, 44100],
        ..SinkOptions::default()
    };
    let sink = graph.add_sink("out", MediaType::Audio, &options).unwrap();
    graph.link(src, 0, sink, 0, MediaType::Audio).unwrap();

    negotiate(&mut graph, &NegotiationConfig::default()).unwrap();
    assert_eq!(
        graph.sink_format(sink),
        Some(&LinkFormat::Audio {
            sample_format: SampleFormat::F32,
            sample_rate: 44100,
            channel_layout: ChannelLayout::MONO,
        })
    );
}

#[test]
fn test_subtitle_mismatch_is_fatal() {
    let mut graph = FilterGraph::new();
    let src = graph
        .add_source(
            "subs",
            LinkFormat::Subtitle {
                format: SubtitleFormat::Bitmap,
            },
        )
        .unwrap();
    let options = SinkOptions {
        subtitle_types: vec![SubtitleFormat::Ass],
        ..SinkOptions::default()
    };
    let sink = graph.add_sink("out", MediaType::Subtitle, &options).unwrap();
    graph.link(src, 0, sink, 0, MediaType::Subtitle).unwrap();

    let err = negotiate(&mut graph, &NegotiationConfig::default()).unwrap_err();
    assert_eq!(
        err,
        MediaError::GraphBuild {
            link: "subs:0 -> out:0".to_string(),
            reason: "no conversion available for subtitle format".to_string(),
        }
    );
    assert_eq!(err.category(), ErrorCategory::Negotiation);
}

#[test]
fn test_chain_of_mismatches() {
    // rgb24 -> [gray8 only] -> [yuv420p only]
    let mut graph = FilterGraph::new();
    let src = graph
        .add_source(
            "in",
            LinkFormat::Video {
                pixel_format: PixelFormat::Rgb24,
            },
        )
        .unwrap();
    let edge = graph
        .add_node(
            "edge",
            "edgedetect",
            NodeCaps::Common(MediaCaps::any().pixel_formats(vec![PixelFormat::Gray8])),
            1,
            1,
        )
        .unwrap();
    let options = SinkOptions {
        pix_fmts: vec![PixelFormat::Yuv420p],
        ..SinkOptions::default()
    };
    let sink = graph.add_sink("out", MediaType::Video, &options).unwrap();
    graph.link(src, 0, edge, 0, MediaType::Video).unwrap();
    graph.link(edge, 0, sink, 0, MediaType::Video).unwrap();

    let inserted = negotiate(&mut graph, &NegotiationConfig::default()).unwrap();
    assert_eq!(inserted.len(), 2);
    let names: Vec<&str> = inserted
        .iter()
        .map(|id| graph.node(*id).unwrap().name.as_str())
        .collect();
    assert_eq!(names, vec!["auto_scale_0", "auto_scale_1"]);
    assert_eq!(graph.links().count(), 4);
    assert!(graph.links().all(|(_, l)| l.format().is_some()));
    assert_eq!(
        graph.sink_format(sink),
        Some(&LinkFormat::Video {
            pixel_format: PixelFormat::Yuv420p
        })
    );
}

// ============================================================================
// DECLARATION ERRORS
// ============================================================================

#[test]
fn test_redundant_sink_layouts_rejected() {
    let mut graph = FilterGraph::new();
    let src = audio_source(&mut graph, "in", SampleFormat::S16, 8000, ChannelLayout::MONO);
    let options = SinkOptions {
        ch_layouts: Some("stereo|2c".to_string()),
        ..SinkOptions::default()
    };
    let sink = graph.add_sink("out", MediaType::Audio, &options).unwrap();
    graph.link(src, 0, sink, 0, MediaType::Audio).unwrap();

    let err = negotiate(&mut graph, &NegotiationConfig::default()).unwrap_err();
    assert_eq!(
        err,
        MediaError::InvalidArgument {
            reason: "node 'out': Duplicated or redundant channel layout".to_string()
        }
    );
}

#[test]
fn test_unlinked_pads_are_reported() {
    let mut graph = FilterGraph::new();
    let src = graph
        .add_source(
            "in",
            LinkFormat::Video {
                pixel_format: PixelFormat::Nv12,
            },
        )
        .unwrap();
    let sink = graph
        .add_sink("out", MediaType::Video, &SinkOptions::default())
        .unwrap();
    graph.link(src, 0, sink, 0, MediaType::Video).unwrap();

    assert!(graph.link(src, 0, sink, 0, MediaType::Video).is_err());
    assert!(graph.link(src, 1, sink, 0, MediaType::Video).is_err());
    assert!(graph
        .add_sink("out", MediaType::Video, &SinkOptions::default())
        .is_err());
}
