//! Builder lifecycle: generate, build, flashbundle, outputs.
//!
//! A concrete toolchain driver implements [`Builder`]. It only has to know how
//! to configure the toolchain, run it, and where the results land. Ordering,
//! the flashbundle gate and artifact packaging live in [`BuildJob`], which
//! wraps any builder.
//!
//! Construction is two-phase:
//!
//! ```text
//! BuilderConfig (root, output prefix, flashbundle flag)
//!     │  identify(target, runner)
//!     ▼
//! BuildContext (+ identifier, output_dir, runner)
//!     │  BuildJob::new(builder, context)
//!     ▼
//! Identified ─generate─▶ Generated ─build─▶ Built ─(flashbundle on)─▶ FlashbundleReady
//! ```
//!
//! A step that fails leaves the state where it was, so a later step that
//! depends on it is rejected with [`BuildError::State`].
//!
//! # Example
//!
//! ```rust,ignore
//! use fw_builder::builder::{BuildJob, BuilderConfig};
//! use fw_builder::builder::gn::GnBuilder;
//! use fw_builder::runner::ShellRunner;
//! use fw_builder::BuildTarget;
//!
//! let runner = ShellRunner::new();
//! let target = BuildTarget::new("linux", "x64", "chip-tool");
//! let context = BuilderConfig::new("examples/chip-tool")?.identify(&target, &runner);
//! let mut job = BuildJob::new(GnBuilder::new().with_outputs(["chip-tool"]), context);
//! job.generate()?;
//! job.build()?;
//! job.copy_artifacts(Path::new("/tmp/artifacts"))?;
//! ```

pub mod gn;
pub mod make;
pub mod scripted;

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::artifacts::{self, ArtifactSet};
use crate::error::{BuildError, Result};
use crate::preflight;
use crate::runner::Runner;
use crate::target::BuildTarget;

/// Default directory under which per-identifier output directories live.
pub const DEFAULT_OUTPUT_PREFIX: &str = "out";

/// Toolchain-specific steps of a build.
///
/// `generate`, `build_step` and `build_outputs` are required. The
/// flashbundle hooks default to doing nothing, which is correct for
/// platforms whose build outputs can be flashed or run directly.
///
/// These methods carry no ordering checks of their own. Call them through
/// [`BuildJob`] unless the caller tracks ordering itself.
pub trait Builder {
    /// Short name of the toolchain driver, for logs and errors.
    fn kind(&self) -> &str;

    /// Generate build files (ninja files, makefiles).
    fn generate(&self, ctx: &BuildContext<'_>) -> Result<()>;

    /// Run the actual build.
    fn build_step(&self, ctx: &BuildContext<'_>) -> Result<()>;

    /// Primary build products. Only meaningful after a successful build;
    /// may read toolchain manifests.
    fn build_outputs(&self, ctx: &BuildContext<'_>) -> Result<ArtifactSet>;

    /// Post-build step producing auxiliary flashing files.
    fn generate_flashbundle(&self, _ctx: &BuildContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Files making up the flashbundle. Only meaningful after
    /// [`Builder::generate_flashbundle`] succeeded.
    fn flashbundle(&self, _ctx: &BuildContext<'_>) -> Result<ArtifactSet> {
        Ok(ArtifactSet::new())
    }

    /// Host tools that must be on PATH for this builder to work.
    fn required_tools(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<B: Builder + ?Sized> Builder for Box<B> {
    fn kind(&self) -> &str {
        (**self).kind()
    }

    fn generate(&self, ctx: &BuildContext<'_>) -> Result<()> {
        (**self).generate(ctx)
    }

    fn build_step(&self, ctx: &BuildContext<'_>) -> Result<()> {
        (**self).build_step(ctx)
    }

    fn build_outputs(&self, ctx: &BuildContext<'_>) -> Result<ArtifactSet> {
        (**self).build_outputs(ctx)
    }

    fn generate_flashbundle(&self, ctx: &BuildContext<'_>) -> Result<()> {
        (**self).generate_flashbundle(ctx)
    }

    fn flashbundle(&self, ctx: &BuildContext<'_>) -> Result<ArtifactSet> {
        (**self).flashbundle(ctx)
    }

    fn required_tools(&self) -> Vec<String> {
        (**self).required_tools()
    }
}

/// Settings assembled before the build target is known.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    root: PathBuf,
    output_prefix: PathBuf,
    flashbundle: bool,
}

impl BuilderConfig {
    /// Start a configuration for the source tree at `root`.
    ///
    /// Relative roots are resolved against the current directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            root: std::path::absolute(root.as_ref())?,
            output_prefix: PathBuf::from(DEFAULT_OUTPUT_PREFIX),
            flashbundle: false,
        })
    }

    pub fn with_output_prefix(mut self, output_prefix: impl Into<PathBuf>) -> Self {
        self.output_prefix = output_prefix.into();
        self
    }

    pub fn enable_flashbundle(mut self, enabled: bool) -> Self {
        self.flashbundle = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn output_prefix(&self) -> &Path {
        &self.output_prefix
    }

    /// Fix the build target, producing a context with identifier and output
    /// directory set.
    pub fn identify<'r>(self, target: &BuildTarget, runner: &'r dyn Runner) -> BuildContext<'r> {
        let identifier = target.identifier();
        let output_dir = self.output_prefix.join(&identifier);
        BuildContext {
            root: self.root,
            output_prefix: self.output_prefix,
            flashbundle: self.flashbundle,
            target: target.clone(),
            identifier,
            output_dir,
            runner,
        }
    }
}

/// Everything a builder needs to know about the build it is running.
pub struct BuildContext<'r> {
    root: PathBuf,
    output_prefix: PathBuf,
    flashbundle: bool,
    target: BuildTarget,
    identifier: String,
    output_dir: PathBuf,
    runner: &'r dyn Runner,
}

impl<'r> BuildContext<'r> {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn output_prefix(&self) -> &Path {
        &self.output_prefix
    }

    pub fn target(&self) -> &BuildTarget {
        &self.target
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// `output_prefix/identifier`.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn flashbundle_enabled(&self) -> bool {
        self.flashbundle
    }

    /// Recompute identifier and output directory together.
    pub fn set_identifier(&mut self, platform: &str, board: &str, app: &str, enable_rpcs: bool) {
        self.target = BuildTarget::new(platform, board, app).with_rpcs(enable_rpcs);
        self.identifier = self.target.identifier();
        self.output_dir = self.output_prefix.join(&self.identifier);
    }

    /// Run a toolchain command through the shared runner.
    pub fn execute(&self, cmd: &[String], cwd: Option<&Path>, title: Option<&str>) -> Result<()> {
        debug!(identifier = %self.identifier, "execute: {}", cmd.join(" "));
        self.runner.run(cmd, cwd, title)
    }
}

impl fmt::Debug for BuildContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("root", &self.root)
            .field("output_prefix", &self.output_prefix)
            .field("flashbundle", &self.flashbundle)
            .field("identifier", &self.identifier)
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}

/// Progress of a [`BuildJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildState {
    Identified,
    Generated,
    Built,
    FlashbundleReady,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildState::Identified => write!(f, "identified"),
            BuildState::Generated => write!(f, "generated"),
            BuildState::Built => write!(f, "built"),
            BuildState::FlashbundleReady => write!(f, "flashbundle-ready"),
        }
    }
}

/// A builder bound to one build target, driven through the lifecycle.
pub struct BuildJob<'r, B: Builder> {
    builder: B,
    ctx: BuildContext<'r>,
    state: BuildState,
}

impl<'r, B: Builder> BuildJob<'r, B> {
    pub fn new(builder: B, ctx: BuildContext<'r>) -> Self {
        Self {
            builder,
            ctx,
            state: BuildState::Identified,
        }
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    pub fn context(&self) -> &BuildContext<'r> {
        &self.ctx
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn identifier(&self) -> &str {
        self.ctx.identifier()
    }

    pub fn output_dir(&self) -> &Path {
        self.ctx.output_dir()
    }

    /// Re-target the job. Anything generated before pointed at the old
    /// output directory, so the job starts over from `Identified`.
    pub fn set_identifier(&mut self, platform: &str, board: &str, app: &str, enable_rpcs: bool) {
        self.ctx.set_identifier(platform, board, app, enable_rpcs);
        self.state = BuildState::Identified;
    }

    /// Toggle the flashbundle step. Only allowed before the build ran.
    pub fn enable_flashbundle(&mut self, enabled: bool) -> Result<()> {
        self.require("change flashbundle", &[BuildState::Identified, BuildState::Generated])?;
        self.ctx.flashbundle = enabled;
        Ok(())
    }

    /// Check that the builder's host tools are installed.
    pub fn preflight(&self) -> Result<()> {
        let tools = self.builder.required_tools();
        preflight::check_required_tools(&tools)
    }

    pub fn generate(&mut self) -> Result<()> {
        self.require("generate", &[BuildState::Identified])?;
        info!("Generating {} ({})", self.ctx.identifier, self.builder.kind());
        self.builder.generate(&self.ctx)?;
        self.state = BuildState::Generated;
        Ok(())
    }

    /// Build, then generate the flashbundle if it is enabled.
    pub fn build(&mut self) -> Result<()> {
        self.require("build", &[BuildState::Generated])?;
        info!("Building {}", self.ctx.identifier);
        self.builder.build_step(&self.ctx)?;
        self.state = BuildState::Built;

        if self.ctx.flashbundle {
            info!("Generating flashbundle for {}", self.ctx.identifier);
            self.builder.generate_flashbundle(&self.ctx)?;
            self.state = BuildState::FlashbundleReady;
        }
        Ok(())
    }

    pub fn build_outputs(&self) -> Result<ArtifactSet> {
        self.require_finished("collect build outputs")?;
        self.builder.build_outputs(&self.ctx)
    }

    pub fn flashbundle(&self) -> Result<ArtifactSet> {
        self.require("collect flashbundle", &[BuildState::FlashbundleReady])?;
        self.builder.flashbundle(&self.ctx)
    }

    /// Build outputs, with flashbundle files layered on top when enabled.
    /// A flashbundle entry replaces a build output of the same name.
    pub fn outputs(&self) -> Result<ArtifactSet> {
        self.require_finished("collect outputs")?;
        let mut artifacts = self.builder.build_outputs(&self.ctx)?;
        if self.ctx.flashbundle {
            artifacts.update(self.builder.flashbundle(&self.ctx)?);
        }
        Ok(artifacts)
    }

    /// Write all outputs into a compressed tar archive.
    pub fn compress_artifacts(&self, target_file: &Path) -> Result<()> {
        let outputs = self.outputs()?;
        artifacts::compress_artifacts(&outputs, target_file)
    }

    /// Copy all outputs into `target_dir`, preserving permission bits.
    pub fn copy_artifacts(&self, target_dir: &Path) -> Result<()> {
        let outputs = self.outputs()?;
        artifacts::copy_artifacts(&outputs, target_dir)
    }

    fn require(&self, operation: &'static str, allowed: &[BuildState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(BuildError::State {
                operation,
                state: self.state,
            })
        }
    }

    /// The build (and the flashbundle step, when enabled) has succeeded.
    fn require_finished(&self, operation: &'static str) -> Result<()> {
        if self.ctx.flashbundle {
            self.require(operation, &[BuildState::FlashbundleReady])
        } else {
            self.require(operation, &[BuildState::Built, BuildState::FlashbundleReady])
        }
    }
}
