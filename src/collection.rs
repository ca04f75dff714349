use std::collections::HashSet;
use std::fmt::{self, Debug};

use indexmap::IndexMap;
use rand::Rng;

use crate::error::{AccessError, CollectionError};
use crate::hash::Hash32;
use crate::status::{self, RenderKind, StatusOpts};
use crate::structure::{Handle, Key, Node};

/// Backing shape of the top-level slots.
#[derive(Debug, Clone)]
pub(crate) enum Slots {
    Seq(Vec<Node>),
    Map(IndexMap<String, Node>),
}

impl Slots {
    pub(crate) fn view(&self) -> SlotsView<'_> {
        match self {
            Slots::Seq(nodes) => SlotsView::Seq(nodes),
            Slots::Map(nodes) => SlotsView::Map(nodes),
        }
    }
}

/// Borrowed view over a sequence or mapping of slots, iterated uniformly as
/// `(Key, &Node)` pairs regardless of the backing shape.
#[derive(Clone, Copy)]
pub(crate) enum SlotsView<'a> {
    Seq(&'a [Node]),
    Map(&'a IndexMap<String, Node>),
}

impl<'a> SlotsView<'a> {
    pub(crate) fn len(&self) -> usize {
        match self {
            SlotsView::Seq(nodes) => nodes.len(),
            SlotsView::Map(nodes) => nodes.len(),
        }
    }

    pub(crate) fn iter(&self) -> SlotIter<'a> {
        match self {
            SlotsView::Seq(nodes) => SlotIter::Seq(nodes.iter().enumerate()),
            SlotsView::Map(nodes) => SlotIter::Map(nodes.iter()),
        }
    }
}

pub(crate) enum SlotIter<'a> {
    Seq(std::iter::Enumerate<std::slice::Iter<'a, Node>>),
    Map(indexmap::map::Iter<'a, String, Node>),
}

impl<'a> Iterator for SlotIter<'a> {
    type Item = (Key, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            SlotIter::Seq(iter) => iter.next().map(|(i, node)| (Key::Index(i), node)),
            SlotIter::Map(iter) => iter
                .next()
                .map(|(name, node)| (Key::Name(name.clone()), node)),
        }
    }
}

/// Composite over storage handles answering "do these outputs exist" under
/// a configurable threshold.
///
/// The wrapped structure is fixed at construction: nested raw sequences and
/// mappings are flattened eagerly into per-slot leaf lists, while nested
/// collections stay terminal and are checked as single units under their
/// own thresholds. A slot counts as complete only when every one of its
/// leaves exists; a slot with no leaves is trivially complete. Queries run
/// fresh probes on every call, nothing is cached.
#[derive(Clone)]
pub struct TargetCollection {
    slots: Slots,
    flat: Vec<(Key, Vec<Handle>)>,
    threshold: f64,
    optional: bool,
}

impl TargetCollection {
    /// Wrap a sequence or mapping of targets, requiring every slot to be
    /// complete.
    pub fn new(structure: impl Into<Node>) -> Result<Self, CollectionError> {
        Self::with_threshold(structure, 1.0)
    }

    /// Wrap a sequence or mapping of targets. `threshold` is the fraction
    /// (up to 1.0) or the absolute number (above 1.0) of slots that have to
    /// be complete for [`exists`](Self::exists) to report true.
    pub fn with_threshold(
        structure: impl Into<Node>,
        threshold: f64,
    ) -> Result<Self, CollectionError> {
        let slots = match structure.into() {
            Node::Seq(nodes) => Slots::Seq(nodes),
            Node::Map(nodes) => Slots::Map(nodes),
            Node::Handle(_) => return Err(CollectionError::InvalidStructure),
        };

        let mut flat = Vec::with_capacity(slots.view().len());
        for (key, node) in slots.view().iter() {
            flat.push((key, node.flatten()?));
        }

        tracing::debug!(
            "wrapped {} slots holding {} flat targets",
            flat.len(),
            flat.iter().map(|(_, leaves)| leaves.len()).sum::<usize>(),
        );

        Ok(Self {
            slots,
            flat,
            threshold,
            optional: false,
        })
    }

    /// Mark the collection as optional, which softens status coloring.
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Number of top-level slots.
    pub fn len(&self) -> usize {
        self.flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Ordered slot identifiers: positions for sequences, insertion-ordered
    /// names for mappings.
    pub fn keys(&self) -> Vec<Key> {
        self.flat.iter().map(|(key, _)| key.clone()).collect()
    }

    /// Raw slot value, exactly as wrapped at construction.
    pub fn get(&self, key: impl Into<Key>) -> Result<&Node, AccessError> {
        match (&self.slots, key.into()) {
            (Slots::Seq(nodes), Key::Index(index)) => {
                let len = nodes.len();
                nodes.get(index).ok_or(AccessError::OutOfRange { index, len })
            }
            (Slots::Map(nodes), Key::Name(name)) => nodes
                .get(&name)
                .ok_or_else(|| AccessError::MissingKey(name)),
            (Slots::Seq(_), Key::Name(name)) => Err(AccessError::KeyOnSequence(name)),
            (Slots::Map(_), Key::Index(index)) => Err(AccessError::IndexOnMapping(index)),
        }
    }

    /// Uniformly random raw slot value, or `None` when the collection is
    /// empty. Meant for spot checks, not for existence queries.
    pub fn random_target(&self) -> Option<&Node> {
        if self.is_empty() {
            return None;
        }

        let index = rand::rng().random_range(0..self.len());
        match &self.slots {
            Slots::Seq(nodes) => nodes.get(index),
            Slots::Map(nodes) => nodes.get_index(index).map(|(_, node)| node),
        }
    }

    /// Absolute slot count the configured threshold translates to: negative
    /// values clamp to zero, fractions scale by the slot count, anything
    /// above 1.0 clamps into `0..=len`.
    pub fn abs_threshold(&self) -> f64 {
        if self.threshold < 0.0 {
            0.0
        } else if self.threshold <= 1.0 {
            self.len() as f64 * self.threshold
        } else {
            (self.len() as f64).min(self.threshold.max(0.0))
        }
    }

    /// Threshold existence with early stopping in both directions: true as
    /// soon as enough slots are complete, false as soon as the remaining
    /// slots cannot reach the threshold anymore.
    pub fn exists(&self) -> anyhow::Result<bool> {
        scan_exists(&self.flat, self.abs_threshold(), slot_complete)
    }

    /// Exact full scan, no early stopping. Returns how many slots are
    /// existing (`existing` true) or missing (`existing` false), along with
    /// their keys in [`keys`](Self::keys) order.
    pub fn count(&self, existing: bool) -> anyhow::Result<(usize, Vec<Key>)> {
        let found = scan_count(&self.flat, slot_complete)?;
        Ok(partition(existing, found, self.keys()))
    }

    /// Lazy pass over slots whose every leaf exists, yielding per-slot leaf
    /// lists. Probes run as the iterator advances and probe errors surface
    /// as `Err` items.
    pub fn iter_existing(&self) -> impl Iterator<Item = anyhow::Result<&[Handle]>> {
        self.flat
            .iter()
            .filter_map(|(_, leaves)| match slot_complete(leaves) {
                Ok(true) => Some(Ok(leaves.as_slice())),
                Ok(false) => None,
                Err(err) => Some(Err(err)),
            })
    }

    /// Lazy pass over slots with at least one missing leaf.
    pub fn iter_missing(&self) -> impl Iterator<Item = anyhow::Result<&[Handle]>> {
        self.flat
            .iter()
            .filter_map(|(_, leaves)| match slot_complete(leaves) {
                Ok(true) => None,
                Ok(false) => Some(Ok(leaves.as_slice())),
                Err(err) => Some(Err(err)),
            })
    }

    /// Stable digest of the leaf composition: the collection kind plus
    /// every leaf hash in flat order. Independent of threshold and of how
    /// leaves were grouped into slots.
    pub fn hash(&self) -> Hash32 {
        self.hash_tagged("TargetCollection")
    }

    pub(crate) fn hash_tagged(&self, tag: &str) -> Hash32 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(tag.as_bytes());
        for handle in self.leaves() {
            hasher.update(handle.hash().as_bytes());
        }
        hasher.finalize().into()
    }

    /// Remove every leaf in flat order. With `silent` set, per-leaf
    /// failures are logged and swallowed; otherwise the first failure
    /// propagates and later leaves stay untouched.
    pub fn remove(&self, silent: bool) -> anyhow::Result<()> {
        for handle in self.leaves() {
            match handle.remove(silent) {
                Ok(()) => {}
                Err(err) if silent => {
                    tracing::debug!(
                        "ignoring removal failure for {}: {err}",
                        handle.short_repr(false),
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    /// Multi-line status report. The first line carries the existence
    /// qualifier and slot counts; a positive depth adds one line per slot,
    /// recursing into nested structures.
    pub fn status_text(&self, opts: &StatusOpts) -> anyhow::Result<String> {
        let (count, existing_keys) = self.count(true)?;
        status::render(
            &status::StatusSource {
                kind: RenderKind::Collection,
                slots: self.slots.view(),
                count,
                existing_keys,
                all_keys: self.keys(),
                abs_threshold: self.abs_threshold(),
                optional: self.optional,
            },
            opts,
        )
    }

    /// One-line representation with slot count and threshold.
    pub fn short_repr(&self, color: bool) -> String {
        status::short_repr("TargetCollection", &self.repr_pairs(), self.optional, color)
    }

    pub(crate) fn repr_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("len".to_string(), self.len().to_string()),
            ("threshold".to_string(), self.threshold.to_string()),
        ]
    }

    /// Every leaf in slot order, then intra-slot order.
    pub(crate) fn leaves(&self) -> impl Iterator<Item = &Handle> {
        self.flat.iter().flat_map(|(_, leaves)| leaves.iter())
    }

    pub(crate) fn flat_rows(&self) -> &[(Key, Vec<Handle>)] {
        &self.flat
    }

    pub(crate) fn slots_view(&self) -> SlotsView<'_> {
        self.slots.view()
    }
}

impl Debug for TargetCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_repr(false))
    }
}

/// True when every leaf of a slot exists; an empty leaf list is trivially
/// complete. Short-circuits on the first missing leaf.
pub(crate) fn slot_complete(leaves: &[Handle]) -> anyhow::Result<bool> {
    for handle in leaves {
        if !handle.exists()? {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Early-stopping threshold scan shared by both collection kinds. The
/// `complete` callback decides slot completeness, so sibling collections
/// can substitute basename membership for direct probes.
pub(crate) fn scan_exists<F>(
    rows: &[(Key, Vec<Handle>)],
    threshold: f64,
    mut complete: F,
) -> anyhow::Result<bool>
where
    F: FnMut(&[Handle]) -> anyhow::Result<bool>,
{
    if threshold <= 0.0 {
        return Ok(true);
    }

    let len = rows.len();
    let mut n = 0;
    for (i, (_, leaves)) in rows.iter().enumerate() {
        if complete(leaves)? {
            n += 1;
            if n as f64 >= threshold {
                return Ok(true);
            }
        }

        // the remaining slots cannot reach the threshold anymore
        if ((n + len - i - 1) as f64) < threshold {
            return Ok(false);
        }
    }

    Ok(false)
}

/// Full scan counting complete slots and collecting their keys.
pub(crate) fn scan_count<F>(
    rows: &[(Key, Vec<Handle>)],
    mut complete: F,
) -> anyhow::Result<(usize, Vec<Key>)>
where
    F: FnMut(&[Handle]) -> anyhow::Result<bool>,
{
    let mut n = 0;
    let mut existing = Vec::new();
    for (key, leaves) in rows {
        if complete(leaves)? {
            n += 1;
            existing.push(key.clone());
        }
    }

    Ok((n, existing))
}

/// Orient a counting result: as-is for existing slots, complemented against
/// the full key list (preserving its order) for missing ones.
pub(crate) fn partition(
    existing: bool,
    found: (usize, Vec<Key>),
    all_keys: Vec<Key>,
) -> (usize, Vec<Key>) {
    if existing {
        return found;
    }

    let (n, existing_keys) = found;
    let len = all_keys.len();
    let hits: HashSet<&Key> = existing_keys.iter().collect();
    let missing = all_keys
        .into_iter()
        .filter(|key| !hits.contains(key))
        .collect();
    (len - n, missing)
}
