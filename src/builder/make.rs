//! Make-based SDK builds.
//!
//! Some vendor SDKs ship only a makefile. There is no separate configure
//! step: `make -j` runs in the source root and is told where to put its
//! output through `OUTPUT_DIR`.

use super::{BuildContext, Builder};
use crate::artifacts::ArtifactSet;
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct MakeBuilder {
    args: Vec<String>,
    outputs: Vec<String>,
}

impl MakeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extra arguments appended after `make -j`.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Output files, relative to the output directory.
    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs.extend(outputs.into_iter().map(Into::into));
        self
    }
}

impl Builder for MakeBuilder {
    fn kind(&self) -> &str {
        "make"
    }

    fn generate(&self, _ctx: &BuildContext<'_>) -> Result<()> {
        Ok(())
    }

    fn build_step(&self, ctx: &BuildContext<'_>) -> Result<()> {
        let output_dir = std::path::absolute(ctx.output_dir())?;

        let mut cmd = vec!["make".to_string(), "-j".to_string()];
        cmd.extend(self.args.iter().cloned());
        cmd.push(format!("OUTPUT_DIR={}", output_dir.display()));

        let title = format!("Building {}", ctx.identifier());
        ctx.execute(&cmd, Some(ctx.root()), Some(&title))
    }

    fn build_outputs(&self, ctx: &BuildContext<'_>) -> Result<ArtifactSet> {
        Ok(self
            .outputs
            .iter()
            .map(|name| (name.clone(), ctx.output_dir().join(name)))
            .collect())
    }

    fn required_tools(&self) -> Vec<String> {
        vec!["make".to_string()]
    }
}
