//! Candidate format sets and their merge algebra
//!
//! During negotiation every link holds, for each format category, a handle
//! to a candidate set. Sets live in a [`SetArena`]; several link slots may
//! reference the same set and the arena counts those references. Merging two
//! sets produces a new set holding their intersection, after which every
//! handle to either operand resolves to the merged set and the operands are
//! freed. A failed merge leaves both operands untouched.

use std::fmt;

use mediagraph_core::{ChannelLayout, MediaError, MediaResult, PixelFormat, SampleFormat, SubtitleFormat};

/// Result of merging two candidate sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The sets were merged; both handles now resolve to this set
    Merged(SetId),
    /// The sets have nothing acceptable in common
    Incompatible,
}

/// Behaviour shared by every kind of candidate set
pub trait CandidateSet: Clone + fmt::Debug {
    /// Category name used in diagnostics, e.g. `"sample rate"`
    const CATEGORY: &'static str;

    /// Intersect two sets, `None` when they are incompatible
    ///
    /// `a` is the upstream operand; its order wins where order matters.
    fn intersect(a: &Self, b: &Self) -> Option<Self>;

    /// Whether two sets could be merged, without merging them
    fn can_merge(a: &Self, b: &Self) -> bool {
        Self::intersect(a, b).is_some()
    }

    /// Whether the set places no constraint on its category
    fn is_wildcard(&self) -> bool;

    /// Number of explicit entries
    fn len(&self) -> usize;

    /// Whether the set has no explicit entries
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collapse the set to its first entry
    fn fixate(&mut self) -> MediaResult<()>;

    /// Narrow the set to the single entry of `chosen` when this set still
    /// has a choice to make and accepts that entry
    ///
    /// Returns whether the set changed.
    fn reduce_to(&mut self, chosen: &Self) -> bool;

    /// Reject malformed declarations (empty lists, duplicates)
    fn validate(&self) -> MediaResult<()>;

    /// Human-readable entries, for reports
    fn describe(&self) -> Vec<String>;
}

// ============================================================================
// PLAIN FORMAT LISTS
// ============================================================================

/// A value that can appear in a [`FormatList`]
pub trait FormatValue: Copy + Eq + fmt::Debug + fmt::Display {
    /// Category name used in diagnostics
    const NAME: &'static str;

    /// Whether an empty list means "anything is acceptable"
    const EMPTY_IS_ANY: bool = false;

    /// The list used when a node accepts any value of this category
    fn all() -> Vec<Self>;

    /// Whether intersecting `a` with `b` would throw away information both
    /// sides could carry
    fn loses_fidelity(_a: &[Self], _b: &[Self]) -> bool {
        false
    }
}

impl FormatValue for PixelFormat {
    const NAME: &'static str = "pixel format";

    fn all() -> Vec<Self> {
        PixelFormat::ALL.to_vec()
    }

    /// Alpha (resp. chroma) is lost when both lists contain formats with it
    /// but the formats they have in common do not
    fn loses_fidelity(a: &[Self], b: &[Self]) -> bool {
        let (mut alpha1, mut alpha2) = (false, false);
        let (mut chroma1, mut chroma2) = (false, false);
        for fa in a {
            for fb in b {
                alpha2 |= fa.has_alpha() && fb.has_alpha();
                chroma2 |= fa.is_multi_component() && fb.is_multi_component();
                if fa == fb {
                    alpha1 |= fa.has_alpha();
                    chroma1 |= fa.is_multi_component();
                }
            }
        }
        alpha2 > alpha1 || chroma2 > chroma1
    }
}

impl FormatValue for SampleFormat {
    const NAME: &'static str = "sample format";

    fn all() -> Vec<Self> {
        SampleFormat::ALL.to_vec()
    }
}

impl FormatValue for SubtitleFormat {
    const NAME: &'static str = "subtitle format";

    fn all() -> Vec<Self> {
        vec![SubtitleFormat::Bitmap, SubtitleFormat::Ass]
    }
}

/// Sample rates in Hz
impl FormatValue for u32 {
    const NAME: &'static str = "sample rate";
    const EMPTY_IS_ANY: bool = true;

    fn all() -> Vec<Self> {
        Vec::new()
    }
}

/// Ordered, duplicate-free list of acceptable values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatList<T> {
    items: Vec<T>,
}

impl<T: FormatValue> FormatList<T> {
    /// List holding exactly `items`
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    /// List accepting any value of the category
    pub fn any() -> Self {
        Self { items: T::all() }
    }

    /// Entries in preference order
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Whether `value` is acceptable
    pub fn contains(&self, value: &T) -> bool {
        (T::EMPTY_IS_ANY && self.items.is_empty()) || self.items.contains(value)
    }

    /// First entry, the one fixation picks
    pub fn first(&self) -> Option<T> {
        self.items.first().copied()
    }
}

impl<T: FormatValue> CandidateSet for FormatList<T> {
    const CATEGORY: &'static str = T::NAME;

    fn intersect(a: &Self, b: &Self) -> Option<Self> {
        if T::EMPTY_IS_ANY && (a.items.is_empty() || b.items.is_empty()) {
            let other = if a.items.is_empty() { b } else { a };
            return Some(other.clone());
        }
        if T::loses_fidelity(&a.items, &b.items) {
            return None;
        }
        let items: Vec<T> = a
            .items
            .iter()
            .copied()
            .filter(|fa| b.items.contains(fa))
            .collect();
        if items.is_empty() {
            None
        } else {
            Some(Self { items })
        }
    }

    fn is_wildcard(&self) -> bool {
        T::EMPTY_IS_ANY && self.items.is_empty()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn fixate(&mut self) -> MediaResult<()> {
        match self.items.first() {
            Some(first) => {
                let first = *first;
                self.items.clear();
                self.items.push(first);
                Ok(())
            }
            None => Err(MediaError::invalid_argument(format!(
                "cannot select {}",
                T::NAME
            ))),
        }
    }

    fn reduce_to(&mut self, chosen: &Self) -> bool {
        match chosen.items.as_slice() {
            [value] if self.items.len() != 1 && self.contains(value) => {
                self.items = vec![*value];
                true
            }
            _ => false,
        }
    }

    fn validate(&self) -> MediaResult<()> {
        if self.items.is_empty() {
            if T::EMPTY_IS_ANY {
                return Ok(());
            }
            return Err(MediaError::invalid_argument(format!("Empty {} list", T::NAME)));
        }
        for (i, fa) in self.items.iter().enumerate() {
            if self.items[i + 1..].contains(fa) {
                return Err(MediaError::invalid_argument(format!("Duplicated {}", T::NAME)));
            }
        }
        Ok(())
    }

    fn describe(&self) -> Vec<String> {
        if self.is_wildcard() {
            return vec!["any".to_string()];
        }
        self.items.iter().map(ToString::to_string).collect()
    }
}

// ============================================================================
// CHANNEL LAYOUTS
// ============================================================================

/// Candidate channel layouts
///
/// `all_layouts` accepts any known layout, `all_counts` additionally accepts
/// bare channel counts. Explicit entries may mix known layouts and generic
/// channel counts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayoutSet {
    layouts: Vec<ChannelLayout>,
    all_layouts: bool,
    all_counts: bool,
}

fn layouts_compatible(a: &ChannelLayout, b: &ChannelLayout) -> bool {
    a == b
        || (a.is_known() && !b.is_known() && a.channels() == b.channels())
        || (b.is_known() && !a.is_known() && a.channels() == b.channels())
}

impl LayoutSet {
    /// Set holding exactly `layouts`
    pub fn new(layouts: Vec<ChannelLayout>) -> Self {
        Self {
            layouts,
            all_layouts: false,
            all_counts: false,
        }
    }

    /// Set holding `layouts` minus generic entries made redundant by a
    /// known layout with the same channel count, and minus duplicates
    pub fn pruned(layouts: Vec<ChannelLayout>) -> Self {
        let mut kept: Vec<ChannelLayout> = Vec::with_capacity(layouts.len());
        for layout in layouts {
            if kept.contains(&layout) {
                continue;
            }
            if !layout.is_known()
                && kept
                    .iter()
                    .any(|k| k.is_known() && k.channels() == layout.channels())
            {
                continue;
            }
            if layout.is_known() {
                kept.retain(|k| k.is_known() || k.channels() != layout.channels());
            }
            kept.push(layout);
        }
        Self::new(kept)
    }

    /// Any known layout
    pub fn any_layout() -> Self {
        Self {
            layouts: Vec::new(),
            all_layouts: true,
            all_counts: false,
        }
    }

    /// Any known layout or bare channel count
    pub fn any_count() -> Self {
        Self {
            layouts: Vec::new(),
            all_layouts: true,
            all_counts: true,
        }
    }

    /// Explicit entries in preference order
    pub fn layouts(&self) -> &[ChannelLayout] {
        &self.layouts
    }

    /// Whether any known layout is accepted
    pub fn all_layouts(&self) -> bool {
        self.all_layouts
    }

    /// Whether bare channel counts are accepted
    pub fn all_counts(&self) -> bool {
        self.all_counts
    }

    /// First explicit entry, the one fixation picks
    pub fn first(&self) -> Option<ChannelLayout> {
        self.layouts.first().copied()
    }

    fn generality(&self) -> u8 {
        self.all_layouts as u8 + self.all_counts as u8
    }
}

impl CandidateSet for LayoutSet {
    const CATEGORY: &'static str = "channel layout";

    fn intersect(a: &Self, b: &Self) -> Option<Self> {
        // Put the more generic set in `a`
        let (a, b) = if a.generality() < b.generality() {
            (b, a)
        } else {
            (a, b)
        };
        let (a_all, b_all) = (a.generality(), b.generality());

        if a_all > 0 {
            let mut merged = b.clone();
            if a_all == 1 && b_all == 0 {
                merged.layouts.retain(ChannelLayout::is_known);
                if merged.layouts.is_empty() {
                    return None;
                }
            }
            return Some(merged);
        }

        let mut a_used = vec![false; a.layouts.len()];
        let mut b_used = vec![false; b.layouts.len()];
        let mut out = Vec::with_capacity(a.layouts.len() + b.layouts.len());

        // known with known
        for (i, la) in a.layouts.iter().enumerate() {
            if !la.is_known() {
                continue;
            }
            if let Some(j) = (0..b.layouts.len()).find(|&j| !b_used[j] && b.layouts[j] == *la) {
                out.push(*la);
                a_used[i] = true;
                b_used[j] = true;
            }
        }

        // known of one side with generic of the other, a's known first
        for (known, known_used, generic) in [
            (&a.layouts, &a_used, &b.layouts),
            (&b.layouts, &b_used, &a.layouts),
        ] {
            for (i, lk) in known.iter().enumerate() {
                if known_used[i] || !lk.is_known() {
                    continue;
                }
                let count = ChannelLayout::Unspecified(lk.channels());
                for lg in generic.iter() {
                    if *lg == count {
                        out.push(*lk);
                    }
                }
            }
        }

        // generic with generic
        for la in a.layouts.iter().filter(|l| !l.is_known()) {
            for lb in b.layouts.iter() {
                if lb == la {
                    out.push(*la);
                }
            }
        }

        if out.is_empty() {
            None
        } else {
            Some(Self::new(out))
        }
    }

    fn is_wildcard(&self) -> bool {
        self.all_layouts
    }

    fn len(&self) -> usize {
        self.layouts.len()
    }

    fn fixate(&mut self) -> MediaResult<()> {
        match self.layouts.first() {
            Some(first) => {
                *self = Self::new(vec![*first]);
                Ok(())
            }
            None => Err(MediaError::invalid_argument("cannot select channel layout")),
        }
    }

    fn reduce_to(&mut self, chosen: &Self) -> bool {
        let layout = match (chosen.generality(), chosen.layouts.as_slice()) {
            (0, [layout]) => *layout,
            _ => return false,
        };
        if self.generality() == 0 && self.layouts.len() == 1 {
            return false;
        }
        let accepted = self.all_counts
            || (self.all_layouts && layout.is_known())
            || self.layouts.contains(&layout);
        if accepted {
            *self = Self::new(vec![layout]);
        }
        accepted
    }

    fn validate(&self) -> MediaResult<()> {
        if self.all_layouts < self.all_counts {
            return Err(MediaError::invalid_argument("Inconsistent generic list"));
        }
        if !self.all_layouts && self.layouts.is_empty() {
            return Err(MediaError::invalid_argument("Empty channel layout list"));
        }
        for (i, la) in self.layouts.iter().enumerate() {
            if self.layouts[i + 1..]
                .iter()
                .any(|lb| layouts_compatible(la, lb))
            {
                return Err(MediaError::invalid_argument(
                    "Duplicated or redundant channel layout",
                ));
            }
        }
        Ok(())
    }

    fn describe(&self) -> Vec<String> {
        let mut out: Vec<String> = self.layouts.iter().map(ToString::to_string).collect();
        if self.all_counts {
            out.push("any count".to_string());
        } else if self.all_layouts {
            out.push("any layout".to_string());
        }
        out
    }
}

// ============================================================================
// ARENA
// ============================================================================

/// Handle to a set stored in a [`SetArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetId(usize);

impl SetId {
    /// Raw index, stable for the lifetime of the arena
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
enum Slot<S> {
    Live { set: S, refs: usize },
    Redirect(SetId),
    Free,
}

/// Storage for candidate sets of one category
///
/// Handles never dangle: a merged-away set leaves a redirect behind, so old
/// handles keep resolving to the set that replaced it.
#[derive(Debug)]
pub struct SetArena<S> {
    slots: Vec<Slot<S>>,
}

impl<S> Default for SetArena<S> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<S: CandidateSet> SetArena<S> {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a set with no references yet
    pub fn insert(&mut self, set: S) -> SetId {
        self.slots.push(Slot::Live { set, refs: 0 });
        SetId(self.slots.len() - 1)
    }

    /// Follow redirects to the live set a handle refers to
    pub fn resolve(&self, mut id: SetId) -> SetId {
        while let Some(Slot::Redirect(next)) = self.slots.get(id.0) {
            id = *next;
        }
        id
    }

    /// The set a handle refers to
    pub fn get(&self, id: SetId) -> Option<&S> {
        match self.slots.get(self.resolve(id).0) {
            Some(Slot::Live { set, .. }) => Some(set),
            _ => None,
        }
    }

    fn get_mut(&mut self, id: SetId) -> Option<&mut S> {
        let id = self.resolve(id);
        match self.slots.get_mut(id.0) {
            Some(Slot::Live { set, .. }) => Some(set),
            _ => None,
        }
    }

    /// Number of link slots referencing the set
    pub fn refs(&self, id: SetId) -> usize {
        match self.slots.get(self.resolve(id).0) {
            Some(Slot::Live { refs, .. }) => *refs,
            _ => 0,
        }
    }

    /// Number of live sets
    pub fn live(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Live { .. }))
            .count()
    }

    /// Record one more link slot referencing the set
    pub fn acquire(&mut self, id: SetId) -> MediaResult<()> {
        let id = self.resolve(id);
        match self.slots.get_mut(id.0) {
            Some(Slot::Live { refs, .. }) => {
                *refs += 1;
                Ok(())
            }
            _ => Err(dead_set(id)),
        }
    }

    /// Drop one reference, freeing the set when none remain
    pub fn release(&mut self, id: SetId) -> MediaResult<()> {
        let id = self.resolve(id);
        match self.slots.get_mut(id.0) {
            Some(Slot::Live { refs, .. }) if *refs > 0 => {
                *refs -= 1;
                if *refs == 0 {
                    self.slots[id.0] = Slot::Free;
                }
                Ok(())
            }
            _ => Err(dead_set(id)),
        }
    }

    /// Check whether two sets could be merged without changing them
    pub fn can_merge(&self, a: SetId, b: SetId) -> bool {
        let (a, b) = (self.resolve(a), self.resolve(b));
        if a == b {
            return true;
        }
        match (self.get(a), self.get(b)) {
            (Some(sa), Some(sb)) => S::can_merge(sa, sb),
            _ => false,
        }
    }

    /// Merge two referenced sets
    ///
    /// On success the merged set carries the references of both operands
    /// and both operands are freed. On [`MergeOutcome::Incompatible`]
    /// nothing changes.
    pub fn merge(&mut self, a: SetId, b: SetId) -> MediaResult<MergeOutcome> {
        let (a, b) = (self.resolve(a), self.resolve(b));
        if a == b {
            return Ok(MergeOutcome::Merged(a));
        }
        let (sa, refs_a) = self.live_operand(a)?;
        let (sb, refs_b) = self.live_operand(b)?;
        let merged = match S::intersect(sa, sb) {
            Some(merged) => merged,
            None => return Ok(MergeOutcome::Incompatible),
        };
        tracing::trace!(
            "merged {} sets {:?} and {:?} into {:?}",
            S::CATEGORY,
            sa.describe(),
            sb.describe(),
            merged.describe()
        );
        self.slots.push(Slot::Live {
            set: merged,
            refs: refs_a + refs_b,
        });
        let id = SetId(self.slots.len() - 1);
        self.slots[a.0] = Slot::Redirect(id);
        self.slots[b.0] = Slot::Redirect(id);
        Ok(MergeOutcome::Merged(id))
    }

    /// Collapse the set behind `id` to its first entry
    pub fn fixate(&mut self, id: SetId) -> MediaResult<()> {
        match self.get_mut(id) {
            Some(set) => set.fixate(),
            None => Err(dead_set(id)),
        }
    }

    /// Narrow the set behind `id` to the single entry of the set behind
    /// `chosen`, see [`CandidateSet::reduce_to`]
    pub fn reduce(&mut self, id: SetId, chosen: SetId) -> MediaResult<bool> {
        let (id, chosen) = (self.resolve(id), self.resolve(chosen));
        if id == chosen {
            return Ok(false);
        }
        let chosen_set = self.get(chosen).cloned().ok_or_else(|| dead_set(chosen))?;
        let set = self.get_mut(id).ok_or_else(|| dead_set(id))?;
        let before = set.describe();
        let changed = set.reduce_to(&chosen_set);
        if changed {
            tracing::trace!(
                "reduced {} set {:?} to {:?}",
                S::CATEGORY,
                before,
                set.describe()
            );
        }
        Ok(changed)
    }

    fn live_operand(&self, id: SetId) -> MediaResult<(&S, usize)> {
        match self.slots.get(id.0) {
            Some(Slot::Live { set, refs }) if *refs > 0 => Ok((set, *refs)),
            _ => Err(dead_set(id)),
        }
    }
}

fn dead_set(id: SetId) -> MediaError {
    MediaError::invalid_argument(format!("format set {} is not referenced", id.0))
}
