//! Build artifacts and their materialization.
//!
//! - [`ArtifactSet`] - ordered mapping from packaged name to source path
//! - [`archive`] - tar archives (gzip or zstd compressed)
//! - [`copy`] - staging artifacts into a directory tree

pub mod archive;
pub mod copy;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::error::{BuildError, Result};

pub use archive::{compress_artifacts, ArchiveFormat};
pub use copy::copy_artifacts;

/// File name suffix of flashbundle manifests written by the toolchain.
pub const FLASHBUNDLE_MANIFEST_SUFFIX: &str = ".flashbundle.txt";

/// Mapping from target-relative name to the path the builder wrote.
///
/// Keys are unique. Iteration follows insertion order so that packaging is
/// reproducible. Re-inserting an existing key replaces its source path but
/// keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSet {
    entries: Vec<(String, PathBuf)>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an artifact, returning the previous source path for `name`.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        source: impl Into<PathBuf>,
    ) -> Option<PathBuf> {
        let name = name.into();
        let source = source.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, source)),
            None => {
                self.entries.push((name, source));
                None
            }
        }
    }

    /// Merge `other` on top of this set. Entries of `other` win on collision.
    pub fn update(&mut self, other: ArtifactSet) {
        for (name, source) in other.entries {
            self.insert(name, source);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, source)| source.as_path())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(name, source)| (name.as_str(), source.as_path()))
    }

    /// Read a flashbundle manifest produced by the toolchain.
    ///
    /// Every non-empty line names a file inside `base_dir`; the line itself
    /// becomes the packaged name.
    pub fn from_flashbundle_manifest(manifest: &Path, base_dir: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(manifest).map_err(|e| BuildError::artifact(manifest, e))?;

        let mut set = ArtifactSet::new();
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            set.insert(line, base_dir.join(line));
        }
        Ok(set)
    }
}

impl<N: Into<String>, S: Into<PathBuf>> FromIterator<(N, S)> for ArtifactSet {
    fn from_iter<I: IntoIterator<Item = (N, S)>>(iter: I) -> Self {
        let mut set = ArtifactSet::new();
        for (name, source) in iter {
            set.insert(name, source);
        }
        set
    }
}

impl<N: Into<String>, S: Into<PathBuf>> Extend<(N, S)> for ArtifactSet {
    fn extend<I: IntoIterator<Item = (N, S)>>(&mut self, iter: I) {
        for (name, source) in iter {
            self.insert(name, source);
        }
    }
}

impl Serialize for ArtifactSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl IntoIterator for ArtifactSet {
    type Item = (String, PathBuf);
    type IntoIter = std::vec::IntoIter<(String, PathBuf)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
