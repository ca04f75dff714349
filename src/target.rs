use std::sync::Arc;

use camino::Utf8Path;

use crate::hash::Hash32;
use crate::status;

/// A storage handle owned by the caller.
///
/// Implementations report whether their backing resource exists, remove it,
/// and expose a stable identity digest. Fallible operations return
/// [`anyhow::Result`] so implementations can surface whatever error type
/// their storage layer produces.
pub trait Target: Send + Sync {
    /// Short type name shown in reprs.
    fn kind(&self) -> &'static str;

    /// Probe the backing resource.
    fn exists(&self) -> anyhow::Result<bool>;

    /// Delete the backing resource. With `silent` set, an already absent
    /// resource is not an error.
    fn remove(&self, silent: bool) -> anyhow::Result<()>;

    /// Stable identity digest, independent of whether the resource
    /// currently exists.
    fn hash(&self) -> Hash32;

    /// Optional targets soften status coloring and are flagged in reprs.
    fn is_optional(&self) -> bool {
        false
    }

    /// Key-value pairs shown in [`short_repr`](Self::short_repr).
    fn repr_pairs(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// One-word existence qualifier, colorized when `color` is set.
    fn status_text(&self, color: bool) -> anyhow::Result<String> {
        let exists = self.exists()?;
        Ok(status::status_label(exists, self.is_optional(), color))
    }

    /// One-line representation like `LocalFileTarget(path=out/a.json)`.
    fn short_repr(&self, color: bool) -> String {
        status::short_repr(self.kind(), &self.repr_pairs(), self.is_optional(), color)
    }
}

/// A filesystem-backed storage handle living in some parent directory.
///
/// The extra accessors let sibling collections replace per-target probes
/// with basename lookups in one shared directory listing.
pub trait FileTarget: Target {
    /// Handle of the directory containing this target.
    fn parent(&self) -> Arc<dyn TargetDir>;

    /// Final path component, matched against directory listings.
    fn basename(&self) -> String;
}

/// Directory view used by sibling collections for batched listings.
pub trait TargetDir: Send + Sync {
    fn path(&self) -> &Utf8Path;

    fn exists(&self) -> anyhow::Result<bool>;

    /// Names of all entries directly inside the directory.
    fn list_entries(&self) -> anyhow::Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        exists: bool,
        optional: bool,
    }

    impl Target for Probe {
        fn kind(&self) -> &'static str {
            "Probe"
        }

        fn exists(&self) -> anyhow::Result<bool> {
            Ok(self.exists)
        }

        fn remove(&self, _silent: bool) -> anyhow::Result<()> {
            Ok(())
        }

        fn hash(&self) -> Hash32 {
            Hash32::hash("probe")
        }

        fn is_optional(&self) -> bool {
            self.optional
        }

        fn repr_pairs(&self) -> Vec<(String, String)> {
            vec![("path".to_string(), "out/a.json".to_string())]
        }
    }

    #[test]
    fn test_default_status_text() {
        let present = Probe { exists: true, optional: false };
        assert_eq!(present.status_text(false).unwrap(), "existent");

        let missing = Probe { exists: false, optional: false };
        assert_eq!(missing.status_text(false).unwrap(), "absent");
    }

    #[test]
    fn test_default_short_repr() {
        let plain = Probe { exists: true, optional: false };
        assert_eq!(plain.short_repr(false), "Probe(path=out/a.json)");

        let optional = Probe { exists: true, optional: true };
        assert_eq!(optional.short_repr(false), "Probe(path=out/a.json, optional)");
    }
}
