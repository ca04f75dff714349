use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::collection::TargetCollection;
use crate::error::CollectionError;
use crate::hash::Hash32;
use crate::sibling::SiblingFileCollection;
use crate::status::StatusOpts;
use crate::target::{FileTarget, Target};

/// Nesting bound for flatten; wrapped structures are shallow in practice.
pub(crate) const MAX_NESTING: usize = 64;

/// Identifier of a top-level slot: a position for sequences, a name for
/// mappings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(usize),
    Name(String),
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{index}"),
            Key::Name(name) => write!(f, "{name}"),
        }
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

/// One terminal element of a flattened slot.
///
/// Everything a collection can hold boils down to one of these four shapes,
/// and every scan matches them exhaustively.
#[derive(Clone)]
pub enum Handle {
    /// Plain storage handle, probed one by one.
    Plain(Arc<dyn Target>),
    /// Filesystem-backed handle, eligible for basename membership tests.
    File(Arc<dyn FileTarget>),
    /// Nested collection, checked as a single unit under its own threshold.
    Nested(Arc<TargetCollection>),
    /// Nested sibling collection, able to reuse a shared directory listing.
    Sibling(Arc<SiblingFileCollection>),
}

impl Handle {
    pub fn plain(target: impl Target + 'static) -> Self {
        Handle::Plain(Arc::new(target))
    }

    pub fn file(target: impl FileTarget + 'static) -> Self {
        Handle::File(Arc::new(target))
    }

    pub fn exists(&self) -> anyhow::Result<bool> {
        match self {
            Handle::Plain(target) => target.exists(),
            Handle::File(target) => target.exists(),
            Handle::Nested(collection) => collection.exists(),
            Handle::Sibling(collection) => collection.exists(),
        }
    }

    pub fn remove(&self, silent: bool) -> anyhow::Result<()> {
        match self {
            Handle::Plain(target) => target.remove(silent),
            Handle::File(target) => target.remove(silent),
            Handle::Nested(collection) => collection.remove(silent),
            Handle::Sibling(collection) => collection.remove(silent),
        }
    }

    pub fn hash(&self) -> Hash32 {
        match self {
            Handle::Plain(target) => target.hash(),
            Handle::File(target) => target.hash(),
            Handle::Nested(collection) => collection.hash(),
            Handle::Sibling(collection) => collection.hash(),
        }
    }

    /// Single-line existence status of this handle.
    pub fn status_text(&self, color: bool) -> anyhow::Result<String> {
        match self {
            Handle::Plain(target) => target.status_text(color),
            Handle::File(target) => target.status_text(color),
            Handle::Nested(collection) => collection.status_text(&StatusOpts::line(color)),
            Handle::Sibling(collection) => collection.status_text(&StatusOpts::line(color)),
        }
    }

    pub fn short_repr(&self, color: bool) -> String {
        match self {
            Handle::Plain(target) => target.short_repr(color),
            Handle::File(target) => target.short_repr(color),
            Handle::Nested(collection) => collection.short_repr(color),
            Handle::Sibling(collection) => collection.short_repr(color),
        }
    }
}

impl Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_repr(false))
    }
}

/// Structure accepted by collection constructors: a tagged tree of terminal
/// handles, sequences and mappings.
///
/// Construction flattens nested sequences and mappings away; nested
/// collections stay terminal and keep their own thresholds.
#[derive(Clone)]
pub enum Node {
    Handle(Handle),
    Seq(Vec<Node>),
    Map(IndexMap<String, Node>),
}

impl Node {
    /// Wrap a plain storage handle.
    pub fn leaf(target: impl Target + 'static) -> Self {
        Node::Handle(Handle::plain(target))
    }

    /// Wrap a filesystem-backed handle.
    pub fn file(target: impl FileTarget + 'static) -> Self {
        Node::Handle(Handle::file(target))
    }

    /// Collect nodes into an ordered sequence.
    pub fn seq(nodes: impl IntoIterator<Item = Node>) -> Self {
        Node::Seq(nodes.into_iter().collect())
    }

    /// Collect keyed nodes into an insertion-ordered mapping.
    pub fn map<K>(entries: impl IntoIterator<Item = (K, Node)>) -> Self
    where
        K: Into<String>,
    {
        Node::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Recursively unfold nested sequences and mappings into the ordered
    /// list of terminal handles. Nested collections are not unfolded; order
    /// and duplicates are preserved.
    pub fn flatten(&self) -> Result<Vec<Handle>, CollectionError> {
        let mut leaves = Vec::new();
        flatten_into(self, 0, &mut leaves)?;
        Ok(leaves)
    }
}

fn flatten_into(node: &Node, depth: usize, out: &mut Vec<Handle>) -> Result<(), CollectionError> {
    if depth >= MAX_NESTING {
        return Err(CollectionError::NestingTooDeep(MAX_NESTING));
    }

    match node {
        Node::Handle(handle) => out.push(handle.clone()),
        Node::Seq(nodes) => {
            for node in nodes {
                flatten_into(node, depth + 1, out)?;
            }
        }
        Node::Map(nodes) => {
            for node in nodes.values() {
                flatten_into(node, depth + 1, out)?;
            }
        }
    }

    Ok(())
}

impl Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Handle(handle) => Debug::fmt(handle, f),
            Node::Seq(nodes) => f.debug_list().entries(nodes).finish(),
            Node::Map(nodes) => f.debug_map().entries(nodes).finish(),
        }
    }
}

impl From<Handle> for Node {
    fn from(handle: Handle) -> Self {
        Node::Handle(handle)
    }
}

impl From<Arc<dyn Target>> for Node {
    fn from(target: Arc<dyn Target>) -> Self {
        Node::Handle(Handle::Plain(target))
    }
}

impl From<Arc<dyn FileTarget>> for Node {
    fn from(target: Arc<dyn FileTarget>) -> Self {
        Node::Handle(Handle::File(target))
    }
}

impl From<TargetCollection> for Node {
    fn from(collection: TargetCollection) -> Self {
        Node::Handle(Handle::Nested(Arc::new(collection)))
    }
}

impl From<SiblingFileCollection> for Node {
    fn from(collection: SiblingFileCollection) -> Self {
        Node::Handle(Handle::Sibling(Arc::new(collection)))
    }
}

impl From<Vec<Node>> for Node {
    fn from(nodes: Vec<Node>) -> Self {
        Node::Seq(nodes)
    }
}

impl From<IndexMap<String, Node>> for Node {
    fn from(nodes: IndexMap<String, Node>) -> Self {
        Node::Map(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake(&'static str);

    impl Target for Fake {
        fn kind(&self) -> &'static str {
            "Fake"
        }

        fn exists(&self) -> anyhow::Result<bool> {
            Ok(true)
        }

        fn remove(&self, _silent: bool) -> anyhow::Result<()> {
            Ok(())
        }

        fn hash(&self) -> Hash32 {
            Hash32::hash(self.0)
        }
    }

    fn make_leaf(name: &'static str) -> Node {
        Node::leaf(Fake(name))
    }

    #[test]
    fn test_flatten_unfolds_nesting_in_order() {
        let node = Node::seq([
            make_leaf("a"),
            Node::seq([make_leaf("b"), Node::map([("k", make_leaf("c"))])]),
        ]);

        let leaves = node.flatten().unwrap();
        let hashes: Vec<_> = leaves.iter().map(Handle::hash).collect();

        assert_eq!(
            hashes,
            vec![Hash32::hash("a"), Hash32::hash("b"), Hash32::hash("c")],
        );
    }

    #[test]
    fn test_flatten_keeps_duplicates() {
        let target: Arc<dyn Target> = Arc::new(Fake("dup"));
        let node = Node::seq([Node::from(target.clone()), Node::from(target)]);

        assert_eq!(node.flatten().unwrap().len(), 2);
    }

    #[test]
    fn test_flatten_is_idempotent_on_flat_input() {
        let node = Node::seq([make_leaf("a"), make_leaf("b")]);

        let once = node.flatten().unwrap();
        let again = Node::seq(once.iter().cloned().map(Node::from))
            .flatten()
            .unwrap();

        assert_eq!(once.len(), again.len());
        for (a, b) in once.iter().zip(&again) {
            assert_eq!(a.hash(), b.hash());
        }
    }

    #[test]
    fn test_flatten_keeps_collections_terminal() {
        let inner = TargetCollection::new(vec![make_leaf("inner")]).unwrap();
        let node = Node::seq([make_leaf("a"), Node::from(inner)]);

        let leaves = node.flatten().unwrap();
        assert_eq!(leaves.len(), 2);
        assert!(matches!(leaves[1], Handle::Nested(_)));
    }

    #[test]
    fn test_flatten_guards_against_runaway_nesting() {
        let mut node = make_leaf("deep");
        for _ in 0..MAX_NESTING + 1 {
            node = Node::seq([node]);
        }

        assert!(matches!(
            node.flatten(),
            Err(CollectionError::NestingTooDeep(_)),
        ));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(Key::from(3).to_string(), "3");
        assert_eq!(Key::from("b").to_string(), "b");
    }
}
