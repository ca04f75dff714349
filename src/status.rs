use std::collections::HashSet;
use std::sync::Arc;

use console::Style;

use crate::collection::{self, SlotsView};
use crate::sibling;
use crate::structure::{Handle, Key, Node};
use crate::target::TargetDir;

/// Options for status reports.
#[derive(Debug, Clone, Copy)]
pub struct StatusOpts {
    /// How many nesting levels to descend; 0 renders the summary line only.
    pub max_depth: usize,
    /// List the keys of missing slots on the summary line.
    pub show_missing: bool,
    /// Emit ANSI colors.
    pub color: bool,
}

impl Default for StatusOpts {
    fn default() -> Self {
        Self {
            max_depth: 0,
            show_missing: false,
            color: true,
        }
    }
}

impl StatusOpts {
    /// Summary line only.
    pub(crate) fn line(color: bool) -> Self {
        Self {
            max_depth: 0,
            show_missing: false,
            color,
        }
    }

    /// Options for rendering one level deeper; nested lines never list
    /// missing keys.
    fn descend(&self) -> Self {
        Self {
            max_depth: self.max_depth - 1,
            show_missing: false,
            ..*self
        }
    }
}

fn paint(text: &str, style: Style, color: bool) -> String {
    if color {
        style.force_styling(true).apply_to(text).to_string()
    } else {
        text.to_string()
    }
}

/// The "existent"/"absent" qualifier; absent optionals render grey instead
/// of red.
pub(crate) fn status_label(exists: bool, optional: bool, color: bool) -> String {
    if exists {
        paint("existent", Style::new().green().bold(), color)
    } else if optional {
        paint("absent", Style::new().black().bright().bold(), color)
    } else {
        paint("absent", Style::new().red().bold(), color)
    }
}

/// The `Kind(key=value, ..., optional)` one-liner shared by handles and
/// collections.
pub(crate) fn short_repr(
    kind: &str,
    pairs: &[(String, String)],
    optional: bool,
    color: bool,
) -> String {
    let mut parts: Vec<String> = pairs
        .iter()
        .map(|(key, value)| {
            format!("{}={}", paint(key, Style::new().blue().bold(), color), value)
        })
        .collect();

    if optional {
        parts.push(paint("optional", Style::new().magenta(), color));
    }

    format!(
        "{}({})",
        paint(kind, Style::new().cyan(), color),
        parts.join(", "),
    )
}

/// Which collection kind drives the counting when raw substructures get
/// rendered on their own.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RenderKind {
    Collection,
    Sibling,
}

/// Everything the renderer needs from a collection, decoupled from the
/// concrete type so views over raw substructures reuse the same path.
pub(crate) struct StatusSource<'a> {
    pub kind: RenderKind,
    pub slots: SlotsView<'a>,
    pub count: usize,
    pub existing_keys: Vec<Key>,
    pub all_keys: Vec<Key>,
    pub abs_threshold: f64,
    pub optional: bool,
}

/// Shared status renderer. The summary line compares the precomputed count
/// against the absolute threshold; continuation lines indent nested reports
/// by two spaces under wrapped collections and by three under raw
/// substructures.
pub(crate) fn render(src: &StatusSource<'_>, opts: &StatusOpts) -> anyhow::Result<String> {
    let len = src.slots.len();
    let exists = src.count as f64 >= src.abs_threshold;

    let mut text = status_label(exists, src.optional, opts.color);
    text.push_str(&format!(" ({}/{})", src.count, len));

    if opts.show_missing && src.count != len {
        let hits: HashSet<&Key> = src.existing_keys.iter().collect();
        let missing: Vec<String> = src
            .all_keys
            .iter()
            .filter(|key| !hits.contains(key))
            .map(Key::to_string)
            .collect();
        text.push_str(&format!(", missing: {}", missing.join(",")));
    }

    if opts.max_depth > 0 {
        for (key, node) in src.slots.iter() {
            text.push_str(&format!("\n{key}: "));

            match node {
                Node::Handle(Handle::Nested(collection)) => {
                    let sub = collection.status_text(&opts.descend())?;
                    text.push_str(&indent(&sub, "  "));
                }
                Node::Handle(Handle::Sibling(collection)) => {
                    let sub = collection.status_text(&opts.descend())?;
                    text.push_str(&indent(&sub, "  "));
                }
                Node::Handle(handle) => {
                    text.push_str(&format!(
                        "{} ({})",
                        handle.status_text(opts.color)?,
                        handle.short_repr(opts.color),
                    ));
                }
                Node::Seq(nodes) => {
                    let sub = render_adhoc(src.kind, SlotsView::Seq(nodes), &opts.descend())?;
                    text.push_str(&indent(&sub, "   "));
                }
                Node::Map(nodes) => {
                    let sub = render_adhoc(src.kind, SlotsView::Map(nodes), &opts.descend())?;
                    text.push_str(&indent(&sub, "   "));
                }
            }
        }
    }

    Ok(text)
}

/// Continuation lines of a nested report pick up the given indent.
fn indent(text: &str, pad: &str) -> String {
    text.split('\n').collect::<Vec<_>>().join(&format!("\n{pad}"))
}

/// Render a raw nested structure as a collection of the given kind with the
/// default threshold, without building one.
fn render_adhoc(
    kind: RenderKind,
    slots: SlotsView<'_>,
    opts: &StatusOpts,
) -> anyhow::Result<String> {
    let mut rows = Vec::with_capacity(slots.len());
    for (key, node) in slots.iter() {
        rows.push((key, node.flatten()?));
    }

    let (count, existing_keys) = match kind {
        RenderKind::Collection => collection::scan_count(&rows, collection::slot_complete)?,
        RenderKind::Sibling => sibling_adhoc_count(&rows)?,
    };

    let all_keys: Vec<Key> = rows.iter().map(|(key, _)| key.clone()).collect();

    render(
        &StatusSource {
            kind,
            slots,
            count,
            existing_keys,
            all_keys,
            // default threshold: every slot has to be complete
            abs_threshold: rows.len() as f64,
            optional: false,
        },
        opts,
    )
}

/// Counting for a raw sibling substructure: derive the directory from the
/// first leaf, then list it once. A substructure without any leaves is
/// trivially complete and never touches storage.
fn sibling_adhoc_count(rows: &[(Key, Vec<Handle>)]) -> anyhow::Result<(usize, Vec<Key>)> {
    let first = rows.iter().flat_map(|(_, leaves)| leaves.iter()).next();
    let dir: Arc<dyn TargetDir> = match first {
        Some(Handle::File(target)) => target.parent(),
        Some(Handle::Sibling(collection)) => Arc::clone(collection.dir()),
        Some(_) => {
            unreachable!("sibling collections only hold file targets and sibling collections")
        }
        None => {
            let keys = rows.iter().map(|(key, _)| key.clone()).collect();
            return Ok((rows.len(), keys));
        }
    };

    if !dir.exists()? {
        return Ok((0, Vec::new()));
    }

    let basenames: HashSet<String> = dir.list_entries()?.into_iter().collect();
    collection::scan_count(rows, |leaves| {
        sibling::slot_complete_within(leaves, &basenames)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::TargetCollection;
    use crate::hash::Hash32;
    use crate::target::Target;

    struct Fake {
        name: &'static str,
        exists: bool,
    }

    impl Fake {
        fn node(name: &'static str, exists: bool) -> Node {
            Node::leaf(Fake { name, exists })
        }
    }

    impl Target for Fake {
        fn kind(&self) -> &'static str {
            "Fake"
        }

        fn exists(&self) -> anyhow::Result<bool> {
            Ok(self.exists)
        }

        fn remove(&self, _silent: bool) -> anyhow::Result<()> {
            Ok(())
        }

        fn hash(&self) -> Hash32 {
            Hash32::hash(self.name)
        }

        fn repr_pairs(&self) -> Vec<(String, String)> {
            vec![("name".to_string(), self.name.to_string())]
        }
    }

    fn plain(opts: StatusOpts) -> StatusOpts {
        StatusOpts { color: false, ..opts }
    }

    #[test]
    fn test_summary_line_with_missing_keys() {
        let collection = TargetCollection::new(Node::map([
            ("a", Fake::node("a", true)),
            ("b", Fake::node("b", false)),
            ("c", Fake::node("c", true)),
        ]))
        .unwrap();

        let opts = plain(StatusOpts {
            show_missing: true,
            ..StatusOpts::default()
        });
        assert_eq!(collection.status_text(&opts).unwrap(), "absent (2/3), missing: b");

        let bare = plain(StatusOpts::default());
        assert_eq!(collection.status_text(&bare).unwrap(), "absent (2/3)");
    }

    #[test]
    fn test_empty_collection_is_vacuously_existent() {
        let collection = TargetCollection::new(Vec::new()).unwrap();

        let opts = plain(StatusOpts {
            max_depth: 1,
            show_missing: true,
            ..StatusOpts::default()
        });
        assert_eq!(collection.status_text(&opts).unwrap(), "existent (0/0)");
    }

    #[test]
    fn test_missing_keys_omitted_when_everything_exists() {
        let collection = TargetCollection::new(Node::map([("a", Fake::node("a", true))])).unwrap();

        let opts = plain(StatusOpts {
            show_missing: true,
            ..StatusOpts::default()
        });
        assert_eq!(collection.status_text(&opts).unwrap(), "existent (1/1)");
    }

    #[test]
    fn test_renders_leaf_lines() {
        let collection = TargetCollection::new(Node::seq([
            Fake::node("a", true),
            Fake::node("b", false),
        ]))
        .unwrap();

        let opts = plain(StatusOpts {
            max_depth: 1,
            ..StatusOpts::default()
        });
        assert_eq!(
            collection.status_text(&opts).unwrap(),
            "absent (1/2)\n0: existent (Fake(name=a))\n1: absent (Fake(name=b))",
        );
    }

    #[test]
    fn test_nested_collection_indents_two_spaces() {
        let inner = TargetCollection::new(vec![Fake::node("a", true)]).unwrap();
        let outer = TargetCollection::new(vec![Node::from(inner)]).unwrap();

        let opts = plain(StatusOpts {
            max_depth: 2,
            ..StatusOpts::default()
        });
        assert_eq!(
            outer.status_text(&opts).unwrap(),
            "existent (1/1)\n0: existent (1/1)\n  0: existent (Fake(name=a))",
        );
    }

    #[test]
    fn test_nested_lines_omit_missing_keys() {
        let inner = TargetCollection::new(Node::map([
            ("a", Fake::node("a", true)),
            ("b", Fake::node("b", false)),
        ]))
        .unwrap();
        let outer = TargetCollection::new(Node::map([("inner", Node::from(inner))])).unwrap();

        let opts = plain(StatusOpts {
            max_depth: 1,
            show_missing: true,
            ..StatusOpts::default()
        });
        assert_eq!(
            outer.status_text(&opts).unwrap(),
            "absent (0/1), missing: inner\ninner: absent (1/2)",
        );
    }

    #[test]
    fn test_raw_substructure_indents_three_spaces() {
        let outer = TargetCollection::new(vec![Node::seq([Fake::node("a", true)])]).unwrap();

        let opts = plain(StatusOpts {
            max_depth: 2,
            ..StatusOpts::default()
        });
        assert_eq!(
            outer.status_text(&opts).unwrap(),
            "existent (1/1)\n0: existent (1/1)\n   0: existent (Fake(name=a))",
        );
    }

    #[test]
    fn test_depth_is_cut_off() {
        let inner = TargetCollection::new(vec![Fake::node("a", true)]).unwrap();
        let outer = TargetCollection::new(vec![Node::from(inner)]).unwrap();

        let opts = plain(StatusOpts {
            max_depth: 1,
            ..StatusOpts::default()
        });
        assert_eq!(
            outer.status_text(&opts).unwrap(),
            "existent (1/1)\n0: existent (1/1)",
        );
    }

    #[test]
    fn test_status_label_colors() {
        assert_eq!(status_label(true, false, false), "existent");
        assert_eq!(status_label(false, false, false), "absent");

        let colored = status_label(true, false, true);
        assert!(colored.starts_with('\u{1b}'));
        assert!(colored.contains("existent"));

        // absent optionals get their own, softer color
        let optional = status_label(false, true, true);
        let required = status_label(false, false, true);
        assert_ne!(optional, required);
    }

    #[test]
    fn test_short_repr_formatting() {
        assert_eq!(
            short_repr(
                "TargetCollection",
                &[("len".to_string(), "2".to_string())],
                false,
                false,
            ),
            "TargetCollection(len=2)",
        );
        assert_eq!(short_repr("Fake", &[], true, false), "Fake(optional)");
    }
}
