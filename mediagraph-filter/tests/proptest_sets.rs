//! Property-based tests for candidate set algebra.
//!
//! Uses proptest to check that intersections only keep acceptable entries
//! and that merging through the arena is deterministic.

use mediagraph_core::{ChannelLayout, PixelFormat, SampleFormat};
use mediagraph_filter::*;
use proptest::prelude::*;

fn sample_formats() -> impl Strategy<Value = Vec<SampleFormat>> {
    proptest::sample::subsequence(SampleFormat::ALL.to_vec(), 1..=SampleFormat::ALL.len())
        .prop_shuffle()
}

fn pixel_formats() -> impl Strategy<Value = Vec<PixelFormat>> {
    proptest::sample::subsequence(PixelFormat::ALL.to_vec(), 1..=PixelFormat::ALL.len())
        .prop_shuffle()
}

fn layouts() -> impl Strategy<Value = Vec<ChannelLayout>> {
    let pool = vec![
        ChannelLayout::MONO,
        ChannelLayout::STEREO,
        ChannelLayout::SURROUND_5_1,
        ChannelLayout::Unspecified(1),
        ChannelLayout::Unspecified(2),
        ChannelLayout::Unspecified(3),
        ChannelLayout::Unspecified(6),
    ];
    proptest::sample::subsequence(pool, 1..=4).prop_shuffle()
}

fn compatible(a: &ChannelLayout, b: &ChannelLayout) -> bool {
    a == b || ((a.is_known() || b.is_known()) && a.channels() == b.channels())
}

// =============================================================================
// Format List Tests
// =============================================================================

proptest! {
    /// Intersection keeps exactly the entries present on both sides, in the
    /// order of the first operand.
    #[test]
    fn sample_format_intersection_is_exact(a in sample_formats(), b in sample_formats()) {
        let expected: Vec<SampleFormat> =
            a.iter().copied().filter(|f| b.contains(f)).collect();
        let merged = FormatList::intersect(&FormatList::new(a), &FormatList::new(b));

        match merged {
            Some(list) => prop_assert_eq!(list.items(), expected.as_slice()),
            None => prop_assert!(expected.is_empty()),
        }
    }

    /// Membership of an intersection does not depend on operand order.
    #[test]
    fn pixel_format_intersection_is_symmetric(a in pixel_formats(), b in pixel_formats()) {
        let ab = FormatList::intersect(&FormatList::new(a.clone()), &FormatList::new(b.clone()));
        let ba = FormatList::intersect(&FormatList::new(b), &FormatList::new(a));

        prop_assert_eq!(ab.is_some(), ba.is_some());
        if let (Some(ab), Some(ba)) = (ab, ba) {
            let mut left = ab.items().to_vec();
            let mut right = ba.items().to_vec();
            left.sort_by_key(|f| f.name());
            right.sort_by_key(|f| f.name());
            prop_assert_eq!(left, right);
        }
    }

    /// Merging the same pair twice yields the same set and reference count.
    #[test]
    fn arena_merge_is_deterministic(a in pixel_formats(), b in pixel_formats()) {
        let run = |a: Vec<PixelFormat>, b: Vec<PixelFormat>| {
            let mut arena = SetArena::new();
            let ia = arena.insert(FormatList::new(a));
            let ib = arena.insert(FormatList::new(b));
            arena.acquire(ia).unwrap();
            arena.acquire(ib).unwrap();
            arena.acquire(ib).unwrap();
            match arena.merge(ia, ib).unwrap() {
                MergeOutcome::Merged(id) => {
                    assert_eq!(arena.resolve(ia), id);
                    assert_eq!(arena.resolve(ib), id);
                    Some((arena.get(id).unwrap().items().to_vec(), arena.refs(id)))
                }
                MergeOutcome::Incompatible => {
                    assert_eq!(arena.refs(ia), 1);
                    assert_eq!(arena.refs(ib), 2);
                    None
                }
            }
        };

        let first = run(a.clone(), b.clone());
        let second = run(a, b);
        prop_assert_eq!(&first, &second);
        if let Some((_, refs)) = first {
            prop_assert_eq!(refs, 3);
        }
    }
}

// =============================================================================
// Channel Layout Tests
// =============================================================================

proptest! {
    /// Every layout kept by an intersection is acceptable to both sides.
    #[test]
    fn layout_intersection_entries_are_compatible(a in layouts(), b in layouts()) {
        let (sa, sb) = (LayoutSet::new(a.clone()), LayoutSet::new(b.clone()));
        if let Some(merged) = LayoutSet::intersect(&sa, &sb) {
            prop_assert!(!merged.layouts().is_empty());
            for layout in merged.layouts() {
                prop_assert!(a.iter().any(|l| compatible(l, layout)));
                prop_assert!(b.iter().any(|l| compatible(l, layout)));
            }
        }
    }

    /// Intersecting with a wildcard that accepts counts leaves the other
    /// side unchanged.
    #[test]
    fn any_count_is_neutral(a in layouts()) {
        let set = LayoutSet::new(a);
        let merged = LayoutSet::intersect(&LayoutSet::any_count(), &set);
        prop_assert_eq!(merged, Some(set));
    }
}
