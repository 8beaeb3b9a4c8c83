//! Tar archives of build artifacts.
//!
//! Archives are gzip compressed unless the target name asks for zstd
//! (`.tar.zst` / `.tzst`). Entries appear in [`ArtifactSet`] order and are
//! named by the set's target names, not by their on-disk location.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::Builder as TarBuilder;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::ArtifactSet;
use crate::error::{BuildError, Result};

/// Compression level used for zstd archives.
const ZSTD_LEVEL: i32 = 3;

/// Compression wrapped around the tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarZst,
}

impl ArchiveFormat {
    /// Pick the format from the archive file name. Defaults to gzip.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
            ArchiveFormat::TarZst
        } else {
            ArchiveFormat::TarGz
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::TarZst => "tar.zst",
        }
    }
}

/// Write every artifact into a compressed tar archive at `target_file`.
///
/// Any missing or unreadable source aborts the whole archive. The partially
/// written file is left behind.
pub fn compress_artifacts(artifacts: &ArtifactSet, target_file: &Path) -> Result<()> {
    let out = File::create(target_file).map_err(|source| BuildError::Archive {
        path: target_file.to_path_buf(),
        source,
    })?;

    match ArchiveFormat::from_path(target_file) {
        ArchiveFormat::TarGz => {
            let mut builder = TarBuilder::new(GzEncoder::new(out, Compression::default()));
            append_artifacts(&mut builder, artifacts, target_file)?;
            builder.into_inner()?.finish()?;
        }
        ArchiveFormat::TarZst => {
            let mut builder = TarBuilder::new(zstd::stream::Encoder::new(out, ZSTD_LEVEL)?);
            append_artifacts(&mut builder, artifacts, target_file)?;
            builder.into_inner()?.finish()?;
        }
    }

    Ok(())
}

fn append_artifacts<W: Write>(
    builder: &mut TarBuilder<W>,
    artifacts: &ArtifactSet,
    target_file: &Path,
) -> Result<()> {
    for (target_name, source) in artifacts.iter() {
        info!(
            "Adding {} into {}/{}",
            source.display(),
            target_file.display(),
            target_name
        );

        let md = fs::metadata(source).map_err(|e| BuildError::artifact(source, e))?;
        if md.is_dir() {
            append_tree(builder, target_name, source)?;
        } else {
            builder
                .append_path_with_name(source, target_name)
                .map_err(|e| BuildError::artifact(source, e))?;
        }
    }

    Ok(())
}

/// Add a directory artifact recursively, in sorted order.
fn append_tree<W: Write>(
    builder: &mut TarBuilder<W>,
    target_name: &str,
    src_dir: &Path,
) -> Result<()> {
    for entry in WalkDir::new(src_dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| BuildError::artifact(src_dir, e.into()))?;
        let rel = entry.path().strip_prefix(src_dir).unwrap_or(entry.path());
        let name = Path::new(target_name).join(rel);

        debug!("  {} -> {}", entry.path().display(), name.display());
        if entry.file_type().is_dir() {
            builder
                .append_dir(&name, entry.path())
                .map_err(|e| BuildError::artifact(entry.path(), e))?;
        } else {
            builder
                .append_path_with_name(entry.path(), &name)
                .map_err(|e| BuildError::artifact(entry.path(), e))?;
        }
    }

    Ok(())
}
