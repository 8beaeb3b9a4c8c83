//! GN + ninja toolchain driver.

use std::collections::BTreeMap;

use tracing::debug;

use super::{BuildContext, Builder};
use crate::artifacts::{ArtifactSet, FLASHBUNDLE_MANIFEST_SUFFIX};
use crate::error::Result;
use crate::runner::shell_join;

/// Generates ninja files with `gn gen` and builds them with `ninja`.
#[derive(Debug, Clone, Default)]
pub struct GnBuilder {
    args: Vec<String>,
    env: BTreeMap<String, String>,
    outputs: Vec<String>,
    flashbundle_manifest: bool,
}

impl GnBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extra `--args` passed to `gn gen`.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Environment variables set for `gn gen`.
    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(env.into_iter().map(|(k, v)| (k.into(), v.into())));
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

    /// Build the `<app>.flashbundle` ninja target and read its manifest.
    pub fn with_flashbundle_manifest(mut self, enabled: bool) -> Self {
        self.flashbundle_manifest = enabled;
        self
    }

    fn gen_command(&self, ctx: &BuildContext<'_>) -> Vec<String> {
        let mut cmd: Vec<String> = vec![
            "gn".into(),
            "gen".into(),
            "--check".into(),
            "--fail-on-unused-args".into(),
            format!("--root={}", ctx.root().display()),
        ];

        if !self.args.is_empty() {
            cmd.push(format!("--args={}", self.args.join(" ")));
        }

        cmd.push(ctx.output_dir().display().to_string());

        if self.env.is_empty() {
            return cmd;
        }

        // bash -c "\nKEY=\"VALUE\" \\\n gn gen ..."
        let mut script_parts: Vec<String> = self
            .env
            .iter()
            .map(|(key, value)| format!("{}=\"{}\" \\\n", key, value))
            .collect();
        script_parts.push(shell_join(cmd.as_slice()));

        vec![
            "bash".into(),
            "-c".into(),
            format!("\n{}", script_parts.join(" ")),
        ]
    }

    fn manifest_name(ctx: &BuildContext<'_>) -> String {
        format!("{}{}", ctx.target().app, FLASHBUNDLE_MANIFEST_SUFFIX)
    }
}

impl Builder for GnBuilder {
    fn kind(&self) -> &str {
        "gn"
    }

    fn generate(&self, ctx: &BuildContext<'_>) -> Result<()> {
        if ctx.output_dir().exists() {
            debug!(
                "{} already exists, skipping gn gen",
                ctx.output_dir().display()
            );
            return Ok(());
        }

        let title = format!("Generating {}", ctx.identifier());
        ctx.execute(&self.gen_command(ctx), None, Some(&title))
    }

    fn build_step(&self, ctx: &BuildContext<'_>) -> Result<()> {
        let cmd = vec![
            "ninja".to_string(),
            "-C".to_string(),
            ctx.output_dir().display().to_string(),
        ];
        let title = format!("Building {}", ctx.identifier());
        ctx.execute(&cmd, None, Some(&title))
    }

    fn build_outputs(&self, ctx: &BuildContext<'_>) -> Result<ArtifactSet> {
        Ok(self
            .outputs
            .iter()
            .map(|name| (name.clone(), ctx.output_dir().join(name)))
            .collect())
    }

    fn generate_flashbundle(&self, ctx: &BuildContext<'_>) -> Result<()> {
        if !self.flashbundle_manifest {
            return Ok(());
        }
        let cmd = vec![
            "ninja".to_string(),
            "-C".to_string(),
            ctx.output_dir().display().to_string(),
            format!("{}.flashbundle", ctx.target().app),
        ];
        let title = format!("Generating flashbundle {}", ctx.identifier());
        ctx.execute(&cmd, None, Some(&title))
    }

    fn flashbundle(&self, ctx: &BuildContext<'_>) -> Result<ArtifactSet> {
        if !self.flashbundle_manifest {
            return Ok(ArtifactSet::new());
        }
        let manifest = ctx.output_dir().join(Self::manifest_name(ctx));
        ArtifactSet::from_flashbundle_manifest(&manifest, ctx.output_dir())
    }

    fn required_tools(&self) -> Vec<String> {
        let mut tools = vec!["gn".to_string(), "ninja".to_string()];
        if !self.env.is_empty() {
            tools.push("bash".to_string());
        }
        tools
    }
}
