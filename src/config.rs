//! Project configuration (`fw-build.toml`).
//!
//! ```toml
//! output_prefix = "out"
//!
//! [[target]]
//! platform = "linux"
//! board = "x64"
//! app = "chip-tool"
//! kind = "gn"
//! root = "examples/chip-tool"
//! gn_args = ["chip_mdns=\"platform\""]
//! outputs = ["chip-tool", "chip-tool.map"]
//! ```
//!
//! Relative paths are resolved against the directory holding the config
//! file; a target's `root` is resolved against the project root.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::builder::gn::GnBuilder;
use crate::builder::make::MakeBuilder;
use crate::builder::scripted::ScriptedBuilder;
use crate::builder::{Builder, BuilderConfig, DEFAULT_OUTPUT_PREFIX};
use crate::target::BuildTarget;

/// Default config file name looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "fw-build.toml";

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub output_prefix: PathBuf,
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub target: BuildTarget,
    pub root: PathBuf,
    pub flashbundle: bool,
    pub toolchain: Toolchain,
}

/// Which driver builds a target, with its settings.
#[derive(Debug, Clone)]
pub enum Toolchain {
    Gn(GnBuilder),
    Make(MakeBuilder),
    Script(ScriptedBuilder),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectToml {
    root: Option<String>,
    output_prefix: Option<String>,
    #[serde(default, rename = "target")]
    targets: Vec<TargetToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TargetToml {
    platform: String,
    board: String,
    app: String,
    kind: String,
    root: Option<String>,
    rpc: Option<bool>,
    flashbundle: Option<bool>,
    outputs: Option<Vec<String>>,
    // gn
    gn_args: Option<Vec<String>>,
    env: Option<BTreeMap<String, String>>,
    flashbundle_manifest: Option<bool>,
    // make
    make_args: Option<Vec<String>>,
    // script
    generate: Option<Vec<String>>,
    build: Option<Vec<String>>,
    flashbundle_command: Option<Vec<String>>,
    flashbundle_files: Option<Vec<String>>,
}

impl ProjectConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        Self::parse(&content, config_dir(path))
            .with_context(|| format!("invalid config '{}'", path.display()))
    }

    /// Parse config text; relative paths resolve against `base_dir`.
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self> {
        let base_dir = if base_dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            base_dir
        };
        let parsed: ProjectToml = toml::from_str(content).context("parsing TOML")?;

        let root = parsed
            .root
            .as_deref()
            .map(|r| resolve_path(base_dir, r))
            .unwrap_or_else(|| base_dir.to_path_buf());
        let output_prefix = resolve_path(
            base_dir,
            parsed.output_prefix.as_deref().unwrap_or(DEFAULT_OUTPUT_PREFIX),
        );

        let mut seen = BTreeSet::new();
        let mut targets = Vec::with_capacity(parsed.targets.len());
        for raw in parsed.targets {
            let target = parse_target(&root, raw)?;
            let identifier = target.target.identifier();
            if !seen.insert(identifier.clone()) {
                bail!("duplicate target '{}'", identifier);
            }
            targets.push(target);
        }

        Ok(Self {
            root,
            output_prefix,
            targets,
        })
    }

    pub fn find(&self, identifier: &str) -> Option<&TargetConfig> {
        self.targets
            .iter()
            .find(|t| t.target.identifier() == identifier)
    }

    /// Targets matching `identifiers`, or all of them when none are given.
    pub fn select(&self, identifiers: &[String]) -> Result<Vec<&TargetConfig>> {
        if identifiers.is_empty() {
            return Ok(self.targets.iter().collect());
        }
        identifiers
            .iter()
            .map(|id| {
                self.find(id).ok_or_else(|| {
                    anyhow::anyhow!(
                        "unknown target '{}' (known: {})",
                        id,
                        self.targets
                            .iter()
                            .map(|t| t.target.identifier())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                })
            })
            .collect()
    }
}

impl TargetConfig {
    /// Builder settings for this target, before identification.
    pub fn builder_config(&self, output_prefix: &Path) -> crate::Result<BuilderConfig> {
        Ok(BuilderConfig::new(&self.root)?
            .with_output_prefix(output_prefix)
            .enable_flashbundle(self.flashbundle))
    }

    /// The configured toolchain driver.
    pub fn builder(&self) -> Box<dyn Builder> {
        match &self.toolchain {
            Toolchain::Gn(b) => Box::new(b.clone()),
            Toolchain::Make(b) => Box::new(b.clone()),
            Toolchain::Script(b) => Box::new(b.clone()),
        }
    }
}

fn parse_target(project_root: &Path, raw: TargetToml) -> Result<TargetConfig> {
    for (field, value) in [
        ("platform", &raw.platform),
        ("board", &raw.board),
        ("app", &raw.app),
    ] {
        if value.trim().is_empty() {
            bail!("target {} must not be empty", field);
        }
    }

    let target = BuildTarget::new(raw.platform.trim(), raw.board.trim(), raw.app.trim())
        .with_rpcs(raw.rpc.unwrap_or(false));
    let id = target.identifier();

    if let Some(outputs) = &raw.outputs {
        for name in outputs {
            check_relative(name, &format!("{id}: outputs"))?;
        }
    }
    if let Some(files) = &raw.flashbundle_files {
        for name in files {
            check_relative(name, &format!("{id}: flashbundle_files"))?;
        }
    }

    let kind = raw.kind.trim().to_ascii_lowercase();
    let allowed: &[&str] = match kind.as_str() {
        "gn" => &["gn_args", "env", "flashbundle_manifest"],
        "make" => &["make_args"],
        "script" => &["generate", "build", "flashbundle_command", "flashbundle_files"],
        other => bail!(
            "{}: unsupported kind '{}' (expected 'gn', 'make' or 'script')",
            id,
            other
        ),
    };
    let present = [
        ("gn_args", raw.gn_args.is_some()),
        ("env", raw.env.is_some()),
        ("flashbundle_manifest", raw.flashbundle_manifest.is_some()),
        ("make_args", raw.make_args.is_some()),
        ("generate", raw.generate.is_some()),
        ("build", raw.build.is_some()),
        ("flashbundle_command", raw.flashbundle_command.is_some()),
        ("flashbundle_files", raw.flashbundle_files.is_some()),
    ];
    for (field, is_set) in present {
        if is_set && !allowed.contains(&field) {
            bail!("{}: '{}' is not valid for kind '{}'", id, field, kind);
        }
    }

    let toolchain = match kind.as_str() {
        "gn" => Toolchain::Gn(
            GnBuilder::new()
                .with_args(raw.gn_args.unwrap_or_default())
                .with_env(raw.env.unwrap_or_default())
                .with_outputs(raw.outputs.unwrap_or_default())
                .with_flashbundle_manifest(raw.flashbundle_manifest.unwrap_or(false)),
        ),
        "make" => Toolchain::Make(
            MakeBuilder::new()
                .with_args(raw.make_args.unwrap_or_default())
                .with_outputs(raw.outputs.unwrap_or_default()),
        ),
        _ => Toolchain::Script(ScriptedBuilder {
            generate: raw.generate,
            build: raw.build,
            outputs: raw.outputs,
            flashbundle_command: raw.flashbundle_command,
            flashbundle_files: raw.flashbundle_files.unwrap_or_default(),
        }),
    };

    Ok(TargetConfig {
        target,
        root: raw
            .root
            .map(|r| resolve_path(project_root, &r))
            .unwrap_or_else(|| project_root.to_path_buf()),
        flashbundle: raw.flashbundle.unwrap_or(false),
        toolchain,
    })
}

fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

/// Directory a config file's relative paths resolve against.
fn config_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn check_relative(raw: &str, field: &str) -> Result<()> {
    let candidate = Path::new(raw);
    if raw.is_empty() || candidate.is_absolute() {
        bail!("{field} must be a non-empty relative path, got '{}'", raw);
    }
    for component in candidate.components() {
        if matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        ) {
            bail!("{field} contains invalid traversal/root component in '{}'", raw);
        }
    }
    Ok(())
}
