//! Staging artifacts into a directory.

use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use tracing::{debug, info};

use super::ArtifactSet;
use crate::error::{BuildError, Result};

/// Copy every artifact to `target_dir/<target name>`.
///
/// Missing parent directories are created first. File contents are copied
/// and the source permission bits are applied to the destination. The first
/// failing pair aborts the call; files already copied stay in place.
///
/// # Example
///
/// ```rust,ignore
/// use fw_builder::artifacts::{copy_artifacts, ArtifactSet};
/// use std::path::Path;
///
/// let artifacts: ArtifactSet = [("chip-tool", "/build/out/chip-tool")].into_iter().collect();
/// copy_artifacts(&artifacts, Path::new("/dest"))?;
/// ```
pub fn copy_artifacts(artifacts: &ArtifactSet, target_dir: &Path) -> Result<()> {
    for (target_name, source) in artifacts.iter() {
        let target_full_name = target_dir.join(target_name);

        info!("Copying {} into {}", source.display(), target_name);

        if let Some(parent) = target_full_name.parent() {
            if !parent.exists() {
                debug!("Creating subdirectory {} first", parent.display());
                fs::create_dir_all(parent).map_err(|e| BuildError::artifact(parent, e))?;
            }
        }

        copy_file_with_mode(source, &target_full_name)?;
    }

    Ok(())
}

/// Copy content, then the permission bits.
fn copy_file_with_mode(source: &Path, dest: &Path) -> Result<()> {
    let md = fs::metadata(source).map_err(|e| BuildError::artifact(source, e))?;
    if md.is_dir() {
        return Err(BuildError::artifact(
            source,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "directory artifacts cannot be copied as files",
            ),
        ));
    }

    // fs::copy truncates dest before reading source.
    if let Ok(dest_md) = fs::metadata(dest) {
        if dest_md.dev() == md.dev() && dest_md.ino() == md.ino() {
            return Err(BuildError::artifact(
                source,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} and {} are the same file", source.display(), dest.display()),
                ),
            ));
        }
    }

    fs::copy(source, dest).map_err(|e| BuildError::artifact(source, e))?;
    fs::set_permissions(dest, md.permissions()).map_err(|e| BuildError::artifact(dest, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn mode(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o7777
    }

    #[test]
    fn test_copy_preserves_content_and_mode() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join("build/out");
        fs::create_dir_all(&build).unwrap();
        fs::write(build.join("chip-tool"), b"binary").unwrap();
        fs::write(build.join("chip-tool.map"), b"symbols").unwrap();
        fs::set_permissions(build.join("chip-tool"), fs::Permissions::from_mode(0o755)).unwrap();
        fs::set_permissions(
            build.join("chip-tool.map"),
            fs::Permissions::from_mode(0o640),
        )
        .unwrap();

        let artifacts: ArtifactSet = [
            ("chip-tool", build.join("chip-tool")),
            ("chip-tool.map", build.join("chip-tool.map")),
        ]
        .into_iter()
        .collect();

        let dest = temp.path().join("dest");
        copy_artifacts(&artifacts, &dest).unwrap();

        assert_eq!(fs::read(dest.join("chip-tool")).unwrap(), b"binary");
        assert_eq!(fs::read(dest.join("chip-tool.map")).unwrap(), b"symbols");
        assert_eq!(mode(&dest.join("chip-tool")), 0o755);
        assert_eq!(mode(&dest.join("chip-tool.map")), 0o640);
    }

    #[test]
    fn test_copy_creates_nested_directories() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("app.hex"), b"hex").unwrap();

        let artifacts: ArtifactSet = [("flashbundle/images/app.hex", temp.path().join("app.hex"))]
            .into_iter()
            .collect();

        let dest = temp.path().join("dest");
        copy_artifacts(&artifacts, &dest).unwrap();
        // Directory already present on the second pass.
        copy_artifacts(&artifacts, &dest).unwrap();

        assert_eq!(fs::read(dest.join("flashbundle/images/app.hex")).unwrap(), b"hex");
    }

    #[test]
    fn test_copy_updates_mode_of_existing_destination() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("tool");
        fs::write(&src, b"new").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o700)).unwrap();

        let dest = temp.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("tool"), b"old").unwrap();
        fs::set_permissions(dest.join("tool"), fs::Permissions::from_mode(0o644)).unwrap();

        let artifacts: ArtifactSet = [("tool", src)].into_iter().collect();
        copy_artifacts(&artifacts, &dest).unwrap();

        assert_eq!(fs::read(dest.join("tool")).unwrap(), b"new");
        assert_eq!(mode(&dest.join("tool")), 0o700);
    }

    #[test]
    fn test_missing_source_stops_copy() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("first"), b"1").unwrap();

        let artifacts: ArtifactSet = [
            ("first", temp.path().join("first")),
            ("second", temp.path().join("missing")),
            ("third", temp.path().join("first")),
        ]
        .into_iter()
        .collect();

        let dest = temp.path().join("dest");
        let err = copy_artifacts(&artifacts, &dest).unwrap_err();

        assert!(matches!(err, BuildError::ArtifactMissing { .. }));
        assert!(dest.join("first").exists());
        assert!(!dest.join("third").exists());
    }

    #[test]
    fn test_copy_onto_itself_is_rejected() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out/linux-x64-chip-tool");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("app.bin"), b"firmware image").unwrap();

        let artifacts: ArtifactSet = [("app.bin", out.join("app.bin"))].into_iter().collect();
        let err = copy_artifacts(&artifacts, &out).unwrap_err();

        assert!(matches!(err, BuildError::Artifact { .. }));
        assert_eq!(fs::read(out.join("app.bin")).unwrap(), b"firmware image");
    }
}
