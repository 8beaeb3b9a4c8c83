//! End-to-end lifecycle runs with real processes and real files.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use flate2::read::GzDecoder;
use fw_builder::builder::scripted::ScriptedBuilder;
use fw_builder::config::ProjectConfig;
use fw_builder::{BuildError, BuildJob, BuildState, BuildTarget, BuilderConfig, ShellRunner};
use tempfile::TempDir;

fn words(ws: &[&str]) -> Vec<String> {
    ws.iter().map(|w| w.to_string()).collect()
}

/// A toolchain that writes `app.bin` (0755), `app.map` and, for the
/// flashbundle, `bundle/flash.sh`.
fn shell_toolchain() -> ScriptedBuilder {
    ScriptedBuilder {
        generate: Some(words(&["mkdir", "-p", "{output_dir}"])),
        build: Some(words(&[
            "sh",
            "-c",
            "printf 'elf {app}' > {output_dir}/app.bin && chmod 755 {output_dir}/app.bin \
             && printf 'symbols' > {output_dir}/app.map",
        ])),
        outputs: Some(words(&["app.bin", "app.map"])),
        flashbundle_command: Some(words(&[
            "sh",
            "-c",
            "mkdir -p {output_dir}/bundle && printf '#!/bin/sh' > {output_dir}/bundle/flash.sh",
        ])),
        flashbundle_files: words(&["bundle/flash.sh"]),
    }
}

fn archive_entries(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut archive = tar::Archive::new(GzDecoder::new(File::open(path).unwrap()));
    let mut entries = BTreeMap::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let name = entry.path().unwrap().to_string_lossy().into_owned();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        entries.insert(name, data);
    }
    entries
}

#[test]
fn build_copy_and_compress() {
    let temp = TempDir::new().unwrap();
    let runner = ShellRunner::new();
    let ctx = BuilderConfig::new(temp.path())
        .unwrap()
        .with_output_prefix(temp.path().join("out"))
        .identify(&BuildTarget::new("linux", "x64", "chip-tool"), &runner);

    let mut job = BuildJob::new(shell_toolchain(), ctx);
    job.preflight().unwrap();
    job.generate().unwrap();
    job.build().unwrap();
    assert_eq!(job.state(), BuildState::Built);
    assert!(job.output_dir().ends_with("out/linux-x64-chip-tool"));

    let dest = temp.path().join("dest");
    job.copy_artifacts(&dest).unwrap();
    assert_eq!(fs::read(dest.join("app.bin")).unwrap(), b"elf chip-tool");
    assert_eq!(fs::read(dest.join("app.map")).unwrap(), b"symbols");
    let mode = fs::metadata(dest.join("app.bin")).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o755);
    assert!(!dest.join("bundle").exists());

    let archive = temp.path().join("linux-x64-chip-tool.tar.gz");
    job.compress_artifacts(&archive).unwrap();
    let entries = archive_entries(&archive);
    assert_eq!(entries.keys().collect::<Vec<_>>(), ["app.bin", "app.map"]);
    assert_eq!(entries["app.bin"], b"elf chip-tool");
}

#[test]
fn flashbundle_files_join_outputs() {
    let temp = TempDir::new().unwrap();
    let runner = ShellRunner::new();
    let ctx = BuilderConfig::new(temp.path())
        .unwrap()
        .with_output_prefix(temp.path().join("out"))
        .enable_flashbundle(true)
        .identify(&BuildTarget::new("efr32", "brd4161a", "lock").with_rpcs(true), &runner);

    let mut job = BuildJob::new(shell_toolchain(), ctx);
    job.generate().unwrap();
    job.build().unwrap();
    assert_eq!(job.state(), BuildState::FlashbundleReady);
    assert!(job.output_dir().ends_with("efr32-brd4161a-lock-rpc"));

    let outputs = job.outputs().unwrap();
    assert_eq!(
        outputs.names().collect::<Vec<_>>(),
        ["app.bin", "app.map", "bundle/flash.sh"]
    );

    let dest = temp.path().join("dest");
    job.copy_artifacts(&dest).unwrap();
    assert_eq!(fs::read(dest.join("app.bin")).unwrap(), b"elf lock");
    assert_eq!(fs::read(dest.join("bundle/flash.sh")).unwrap(), b"#!/bin/sh");
}

#[test]
fn failing_toolchain_stops_the_lifecycle() {
    let temp = TempDir::new().unwrap();
    let runner = ShellRunner::new();
    let ctx = BuilderConfig::new(temp.path())
        .unwrap()
        .with_output_prefix(temp.path().join("out"))
        .identify(&BuildTarget::new("linux", "x64", "broken"), &runner);

    let toolchain = ScriptedBuilder {
        generate: Some(words(&["sh", "-c", "exit 2"])),
        build: Some(words(&["true"])),
        outputs: Some(words(&["never"])),
        ..Default::default()
    };
    let mut job = BuildJob::new(toolchain, ctx);

    match job.generate().unwrap_err() {
        BuildError::Execution { title, reason, .. } => {
            assert_eq!(title, "Generating linux-x64-broken");
            assert_eq!(reason, "exit code 2");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(job.build(), Err(BuildError::State { .. })));
    assert!(matches!(job.outputs(), Err(BuildError::State { .. })));
}

#[test]
fn missing_artifact_fails_packaging() {
    let temp = TempDir::new().unwrap();
    let runner = ShellRunner::new();
    let ctx = BuilderConfig::new(temp.path())
        .unwrap()
        .with_output_prefix(temp.path().join("out"))
        .identify(&BuildTarget::new("linux", "x64", "partial"), &runner);

    let toolchain = ScriptedBuilder {
        generate: Some(words(&["mkdir", "-p", "{output_dir}"])),
        build: Some(words(&["touch", "{output_dir}/present"])),
        outputs: Some(words(&["present", "absent"])),
        ..Default::default()
    };
    let mut job = BuildJob::new(toolchain, ctx);
    job.generate().unwrap();
    job.build().unwrap();

    let err = job.compress_artifacts(&temp.path().join("a.tar.gz")).unwrap_err();
    assert!(matches!(err, BuildError::ArtifactMissing { .. }));

    let err = job.copy_artifacts(&temp.path().join("dest")).unwrap_err();
    assert!(matches!(err, BuildError::ArtifactMissing { .. }));
    assert!(temp.path().join("dest/present").exists());
}

#[test]
fn config_driven_build() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("fw-build.toml");
    fs::write(
        &config_path,
        r#"
output_prefix = "out"

[[target]]
platform = "host"
board = "native"
app = "hello"
kind = "script"
generate = ["mkdir", "-p", "{output_dir}"]
build = ["sh", "-c", "printf hi > {output_dir}/hello"]
outputs = ["hello"]
"#,
    )
    .unwrap();

    let project = ProjectConfig::load(&config_path).unwrap();
    let target = project.find("host-native-hello").unwrap();
    let runner = ShellRunner::new();
    let ctx = target
        .builder_config(&project.output_prefix)
        .unwrap()
        .identify(&target.target, &runner);

    let mut job = BuildJob::new(target.builder(), ctx);
    job.generate().unwrap();
    job.build().unwrap();

    assert_eq!(job.output_dir(), temp.path().join("out/host-native-hello"));
    let outputs = job.outputs().unwrap();
    assert_eq!(fs::read(outputs.get("hello").unwrap()).unwrap(), b"hi");
}
