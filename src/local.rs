use std::fs;
use std::io::ErrorKind;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use crate::hash::Hash32;
use crate::target::{FileTarget, Target, TargetDir};

/// File on the local filesystem, identified by a UTF-8 path.
///
/// Existence is a metadata probe and removal unlinks the file. The identity
/// digest is derived from the path, so it stays stable across the file
/// appearing and disappearing.
#[derive(Debug, Clone)]
pub struct LocalFileTarget {
    path: Utf8PathBuf,
    optional: bool,
}

impl LocalFileTarget {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            optional: false,
        }
    }

    /// Mark the target as optional, which softens status coloring.
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Target for LocalFileTarget {
    fn kind(&self) -> &'static str {
        "LocalFileTarget"
    }

    fn exists(&self) -> anyhow::Result<bool> {
        Ok(self.path.as_std_path().try_exists()?)
    }

    fn remove(&self, silent: bool) -> anyhow::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if silent && err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn hash(&self) -> Hash32 {
        Hash32::hash(format!("{}:{}", self.kind(), self.path))
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    fn repr_pairs(&self) -> Vec<(String, String)> {
        vec![("path".to_string(), self.path.to_string())]
    }
}

impl FileTarget for LocalFileTarget {
    fn parent(&self) -> Arc<dyn TargetDir> {
        let parent = self.path.parent().unwrap_or(Utf8Path::new(""));
        Arc::new(LocalDirTarget::new(parent))
    }

    fn basename(&self) -> String {
        self.path.file_name().unwrap_or_default().to_string()
    }
}

/// Directory on the local filesystem, listable for sibling collections.
#[derive(Debug, Clone)]
pub struct LocalDirTarget {
    path: Utf8PathBuf,
}

impl LocalDirTarget {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TargetDir for LocalDirTarget {
    fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn exists(&self) -> anyhow::Result<bool> {
        Ok(self.path.is_dir())
    }

    fn list_entries(&self) -> anyhow::Result<Vec<String>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            entries.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(entries)
    }
}
