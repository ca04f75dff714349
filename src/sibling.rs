use std::collections::HashSet;
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::collection::{TargetCollection, partition, scan_count, scan_exists};
use crate::error::{AccessError, CollectionError};
use crate::hash::Hash32;
use crate::status::{self, RenderKind, StatusOpts};
use crate::structure::{Handle, Key, Node};
use crate::target::TargetDir;

/// Target collection whose filesystem-backed leaves all live in one shared
/// parent directory.
///
/// Existence and counting queries list the directory once and test basename
/// membership in memory instead of probing every leaf, turning N probes
/// into a single listing. The directory handle is derived from the first
/// leaf and trusted for all others; colocation is the caller's promise, not
/// something that gets verified.
#[derive(Clone)]
pub struct SiblingFileCollection {
    base: TargetCollection,
    dir: Arc<dyn TargetDir>,
}

impl SiblingFileCollection {
    /// Wrap a sequence or mapping of colocated file targets, requiring
    /// every slot to be complete.
    pub fn new(structure: impl Into<Node>) -> Result<Self, CollectionError> {
        Self::with_threshold(structure, 1.0)
    }

    /// Wrap a sequence or mapping of colocated file targets under the given
    /// threshold. Every flattened leaf must be a file target or another
    /// sibling collection, and at least one leaf is required to derive the
    /// shared directory from.
    pub fn with_threshold(
        structure: impl Into<Node>,
        threshold: f64,
    ) -> Result<Self, CollectionError> {
        let base = TargetCollection::with_threshold(structure, threshold)?;

        let mut dir: Option<Arc<dyn TargetDir>> = None;
        for handle in base.leaves() {
            match handle {
                Handle::File(target) => {
                    if dir.is_none() {
                        dir = Some(target.parent());
                    }
                }
                Handle::Sibling(collection) => {
                    if dir.is_none() {
                        dir = Some(Arc::clone(collection.dir()));
                    }
                }
                Handle::Plain(_) | Handle::Nested(_) => {
                    return Err(CollectionError::ForeignHandle(handle.short_repr(false)));
                }
            }
        }

        let dir = dir.ok_or(CollectionError::EmptySibling)?;
        Ok(Self { base, dir })
    }

    /// Mark the collection as optional, which softens status coloring.
    pub fn optional(mut self, optional: bool) -> Self {
        self.base = self.base.optional(optional);
        self
    }

    /// Shared parent directory handle, trusted rather than verified.
    pub fn dir(&self) -> &Arc<dyn TargetDir> {
        &self.dir
    }

    /// Number of top-level slots.
    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    pub fn threshold(&self) -> f64 {
        self.base.threshold()
    }

    pub fn abs_threshold(&self) -> f64 {
        self.base.abs_threshold()
    }

    pub fn is_optional(&self) -> bool {
        self.base.is_optional()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.base.keys()
    }

    pub fn get(&self, key: impl Into<Key>) -> Result<&Node, AccessError> {
        self.base.get(key)
    }

    pub fn random_target(&self) -> Option<&Node> {
        self.base.random_target()
    }

    /// Threshold existence through at most one directory listing: a zero
    /// threshold is trivially satisfied, a missing directory means nothing
    /// in it exists, and otherwise slots are checked against the listed
    /// basenames with the usual early stopping.
    pub fn exists(&self) -> anyhow::Result<bool> {
        self.exists_impl(None)
    }

    /// Same as [`exists`](Self::exists), reusing a listing the caller
    /// already holds for the shared directory. The receiver still checks
    /// that its own directory exists before trusting the basenames.
    pub fn exists_within(&self, basenames: &HashSet<String>) -> anyhow::Result<bool> {
        self.exists_impl(Some(basenames))
    }

    fn exists_impl(&self, basenames: Option<&HashSet<String>>) -> anyhow::Result<bool> {
        let threshold = self.abs_threshold();
        if threshold <= 0.0 {
            return Ok(true);
        }

        if !self.dir.exists()? {
            return Ok(false);
        }

        let fresh;
        let basenames = match basenames {
            Some(listed) => listed,
            None => {
                fresh = self.list_basenames()?;
                &fresh
            }
        };

        scan_exists(self.base.flat_rows(), threshold, |leaves| {
            slot_complete_within(leaves, basenames)
        })
    }

    /// Exact counts through at most one directory listing. When the shared
    /// directory is missing, every slot counts as missing without listing
    /// anything.
    pub fn count(&self, existing: bool) -> anyhow::Result<(usize, Vec<Key>)> {
        self.count_impl(existing, None)
    }

    /// Same as [`count`](Self::count), reusing a listing the caller
    /// already holds for the shared directory.
    pub fn count_within(
        &self,
        existing: bool,
        basenames: &HashSet<String>,
    ) -> anyhow::Result<(usize, Vec<Key>)> {
        self.count_impl(existing, Some(basenames))
    }

    fn count_impl(
        &self,
        existing: bool,
        basenames: Option<&HashSet<String>>,
    ) -> anyhow::Result<(usize, Vec<Key>)> {
        if !self.dir.exists()? {
            return Ok(if existing {
                (0, Vec::new())
            } else {
                (self.len(), self.keys())
            });
        }

        let fresh;
        let basenames = match basenames {
            Some(listed) => listed,
            None => {
                fresh = self.list_basenames()?;
                &fresh
            }
        };

        let found = scan_count(self.base.flat_rows(), |leaves| {
            slot_complete_within(leaves, basenames)
        })?;
        Ok(partition(existing, found, self.keys()))
    }

    /// Lazy pass over complete slots. This probes leaves directly; the
    /// batched listing only serves [`exists`](Self::exists) and
    /// [`count`](Self::count).
    pub fn iter_existing(&self) -> impl Iterator<Item = anyhow::Result<&[Handle]>> {
        self.base.iter_existing()
    }

    /// Lazy pass over incomplete slots, probing leaves directly.
    pub fn iter_missing(&self) -> impl Iterator<Item = anyhow::Result<&[Handle]>> {
        self.base.iter_missing()
    }

    /// Stable digest of the leaf composition. Differs from an equally
    /// composed plain collection by the sibling type tag.
    pub fn hash(&self) -> Hash32 {
        self.base.hash_tagged("SiblingFileCollection")
    }

    /// Remove every leaf in flat order; see [`TargetCollection::remove`].
    pub fn remove(&self, silent: bool) -> anyhow::Result<()> {
        self.base.remove(silent)
    }

    /// Multi-line status report; counts go through the batched listing.
    pub fn status_text(&self, opts: &StatusOpts) -> anyhow::Result<String> {
        let (count, existing_keys) = self.count(true)?;
        status::render(
            &status::StatusSource {
                kind: RenderKind::Sibling,
                slots: self.base.slots_view(),
                count,
                existing_keys,
                all_keys: self.keys(),
                abs_threshold: self.abs_threshold(),
                optional: self.is_optional(),
            },
            opts,
        )
    }

    /// One-line representation with slot count, threshold and directory.
    pub fn short_repr(&self, color: bool) -> String {
        status::short_repr(
            "SiblingFileCollection",
            &self.repr_pairs(),
            self.is_optional(),
            color,
        )
    }

    fn repr_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = self.base.repr_pairs();
        pairs.push(("dir".to_string(), self.dir.path().to_string()));
        pairs
    }

    fn list_basenames(&self) -> anyhow::Result<HashSet<String>> {
        let entries = self.dir.list_entries()?;
        tracing::trace!("listed {} entries in {}", entries.len(), self.dir.path());
        Ok(entries.into_iter().collect())
    }
}

impl Debug for SiblingFileCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_repr(false))
    }
}

/// Slot completeness by basename membership: file leaves check the listing,
/// nested sibling collections delegate with the same listing while still
/// checking their own directory first.
pub(crate) fn slot_complete_within(
    leaves: &[Handle],
    basenames: &HashSet<String>,
) -> anyhow::Result<bool> {
    for handle in leaves {
        match handle {
            Handle::File(target) => {
                if !basenames.contains(&target.basename()) {
                    return Ok(false);
                }
            }
            Handle::Sibling(collection) => {
                if !collection.exists_within(basenames)? {
                    return Ok(false);
                }
            }
            Handle::Plain(_) | Handle::Nested(_) => {
                unreachable!("sibling collections only hold file targets and sibling collections")
            }
        }
    }

    Ok(true)
}
