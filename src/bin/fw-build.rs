use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fw_builder::artifacts::ArchiveFormat;
use fw_builder::config::{ProjectConfig, TargetConfig, DEFAULT_CONFIG_FILE};
use fw_builder::{BuildJob, Builder, PrintOnlyRunner, Runner, ShellRunner};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// fw-build - drive firmware toolchains through one build lifecycle
#[derive(Parser)]
#[command(name = "fw-build")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Project configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured target identifiers
    List,

    /// Generate and build targets (all when none are named)
    Build {
        /// Target identifiers, e.g. linux-x64-chip-tool
        targets: Vec<String>,

        /// Print the commands instead of running them
        #[arg(long)]
        dry_run: bool,

        /// Copy outputs into this directory
        #[arg(long, value_name = "DIR")]
        copy_to: Option<PathBuf>,

        /// Write outputs into a .tar.gz / .tar.zst archive (a directory of
        /// `<identifier>.<format>` archives when several targets are built)
        #[arg(long, value_name = "PATH")]
        archive: Option<PathBuf>,

        /// Archive format for per-target archives under `--archive PATH`
        #[arg(long, value_enum, default_value_t = Format::Gz)]
        format: Format,

        /// Do not check for required host tools first
        #[arg(long)]
        skip_preflight: bool,
    },

    /// Print a built target's outputs as JSON
    Outputs {
        /// Target identifier
        target: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Gz,
    Zst,
}

impl From<Format> for ArchiveFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Gz => ArchiveFormat::TarGz,
            Format::Zst => ArchiveFormat::TarZst,
        }
    }
}

struct BuildOptions {
    dry_run: bool,
    copy_to: Option<PathBuf>,
    archive: Option<PathBuf>,
    format: ArchiveFormat,
    skip_preflight: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .without_time()
        .init();

    let project = ProjectConfig::load(&cli.config)?;

    match cli.command {
        Commands::List => {
            for target in &project.targets {
                println!("{}", target.target.identifier());
            }
            Ok(())
        }
        Commands::Build {
            targets,
            dry_run,
            copy_to,
            archive,
            format,
            skip_preflight,
        } => {
            let opts = BuildOptions {
                dry_run,
                copy_to,
                archive,
                format: format.into(),
                skip_preflight,
            };
            cmd_build(&project, &targets, &opts)
        }
        Commands::Outputs { target } => cmd_outputs(&project, &target),
    }
}

fn cmd_build(project: &ProjectConfig, identifiers: &[String], opts: &BuildOptions) -> Result<()> {
    let selected = project.select(identifiers)?;
    let several = selected.len() > 1;

    let shell = ShellRunner::new();
    let printer = PrintOnlyRunner::new(io::stdout());
    let runner: &dyn Runner = if opts.dry_run { &printer } else { &shell };

    for target in selected {
        build_one(project, target, runner, opts, several)
            .with_context(|| format!("building '{}'", target.target.identifier()))?;
    }
    Ok(())
}

fn build_one(
    project: &ProjectConfig,
    target: &TargetConfig,
    runner: &dyn Runner,
    opts: &BuildOptions,
    several: bool,
) -> Result<()> {
    let ctx = target
        .builder_config(&project.output_prefix)?
        .identify(&target.target, runner);
    let mut job = BuildJob::new(target.builder(), ctx);

    if !opts.skip_preflight && !opts.dry_run {
        job.preflight()?;
    }

    job.generate()?;
    job.build()?;

    if opts.dry_run {
        return Ok(());
    }

    let identifier = job.identifier().to_string();

    if let Some(dir) = &opts.copy_to {
        let dest = if several { dir.join(&identifier) } else { dir.clone() };
        info!("Copying {} artifacts to {}", identifier, dest.display());
        job.copy_artifacts(&dest)?;
    }

    if let Some(archive) = &opts.archive {
        let file = archive_path(archive, &identifier, several, opts.format);
        ensure_parent(&file)?;
        info!("Compressing {} artifacts into {}", identifier, file.display());
        job.compress_artifacts(&file)?;
    }

    Ok(())
}

/// Outputs are read from the toolchain's results; run this after a build.
fn cmd_outputs(project: &ProjectConfig, identifier: &str) -> Result<()> {
    let target = project
        .select(&[identifier.to_string()])?
        .into_iter()
        .next()
        .context("no target selected")?;

    let runner = ShellRunner::new();
    let ctx = target
        .builder_config(&project.output_prefix)?
        .identify(&target.target, &runner);
    let builder = target.builder();

    let mut outputs = builder.build_outputs(&ctx)?;
    if ctx.flashbundle_enabled() {
        outputs.update(builder.flashbundle(&ctx)?);
    }

    println!("{}", serde_json::to_string_pretty(&outputs)?);
    Ok(())
}

/// With several targets `archive` is a directory of per-target archives.
fn archive_path(archive: &Path, identifier: &str, several: bool, format: ArchiveFormat) -> PathBuf {
    if several {
        archive.join(format!("{}.{}", identifier, format.extension()))
    } else {
        archive.to_path_buf()
    }
}

fn ensure_parent(file: &Path) -> Result<()> {
    if let Some(parent) = file.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory '{}'", parent.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_path_per_target_uses_format() {
        let dir = Path::new("dist");
        assert_eq!(
            archive_path(dir, "linux-x64-chip-tool", true, Format::Zst.into()),
            Path::new("dist/linux-x64-chip-tool.tar.zst")
        );
        assert_eq!(
            archive_path(dir, "linux-x64-chip-tool", true, Format::Gz.into()),
            Path::new("dist/linux-x64-chip-tool.tar.gz")
        );
        let single = Path::new("chip-tool.tar.zst");
        assert_eq!(archive_path(single, "x", false, Format::Gz.into()), single);
    }

    #[test]
    fn test_per_target_archive_suffix_selects_encoder() {
        let file = archive_path(Path::new("dist"), "esp32-devkitc-lock", true, Format::Zst.into());
        assert_eq!(ArchiveFormat::from_path(&file), ArchiveFormat::TarZst);
    }
}
