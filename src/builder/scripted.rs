//! Builders described entirely by data.
//!
//! Most per-platform builders differ only in which commands they run and
//! which files they produce. A [`ScriptedBuilder`] holds exactly that. Steps
//! that are left out fail with [`BuildError::Unimplemented`] when called,
//! except the flashbundle hooks, which are optional.
//!
//! Arguments may reference the build through placeholders:
//!
//! | Placeholder      | Value                          |
//! |------------------|--------------------------------|
//! | `{root}`         | source root                    |
//! | `{output_dir}`   | `output_prefix/identifier`     |
//! | `{identifier}`   | e.g. `linux-x64-chip-tool`     |
//! | `{platform}`, `{board}`, `{app}` | target components |

use super::{BuildContext, Builder};
use crate::artifacts::ArtifactSet;
use crate::error::{BuildError, Result};

#[derive(Debug, Clone, Default)]
pub struct ScriptedBuilder {
    pub generate: Option<Vec<String>>,
    pub build: Option<Vec<String>>,
    pub outputs: Option<Vec<String>>,
    pub flashbundle_command: Option<Vec<String>>,
    pub flashbundle_files: Vec<String>,
}

impl ScriptedBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn unimplemented(ctx: &BuildContext<'_>, operation: &'static str) -> BuildError {
        BuildError::Unimplemented {
            builder: ctx.identifier().to_string(),
            operation,
        }
    }

    fn run_step(ctx: &BuildContext<'_>, cmd: &[String], title: String) -> Result<()> {
        let cmd: Vec<String> = cmd.iter().map(|arg| expand(arg, ctx)).collect();
        ctx.execute(&cmd, Some(ctx.root()), Some(&title))
    }
}

fn expand(arg: &str, ctx: &BuildContext<'_>) -> String {
    let target = ctx.target();
    arg.replace("{root}", &ctx.root().display().to_string())
        .replace("{output_dir}", &ctx.output_dir().display().to_string())
        .replace("{identifier}", ctx.identifier())
        .replace("{platform}", &target.platform)
        .replace("{board}", &target.board)
        .replace("{app}", &target.app)
}

/// Map each (expanded) name to the same path under the output directory.
fn in_output_dir(ctx: &BuildContext<'_>, names: &[String]) -> ArtifactSet {
    names
        .iter()
        .map(|name| {
            let name = expand(name, ctx);
            let source = ctx.output_dir().join(&name);
            (name, source)
        })
        .collect()
}

impl Builder for ScriptedBuilder {
    fn kind(&self) -> &str {
        "script"
    }

    fn generate(&self, ctx: &BuildContext<'_>) -> Result<()> {
        let cmd = self
            .generate
            .as_deref()
            .ok_or_else(|| Self::unimplemented(ctx, "generate"))?;
        Self::run_step(ctx, cmd, format!("Generating {}", ctx.identifier()))
    }

    fn build_step(&self, ctx: &BuildContext<'_>) -> Result<()> {
        let cmd = self
            .build
            .as_deref()
            .ok_or_else(|| Self::unimplemented(ctx, "build"))?;
        Self::run_step(ctx, cmd, format!("Building {}", ctx.identifier()))
    }

    fn build_outputs(&self, ctx: &BuildContext<'_>) -> Result<ArtifactSet> {
        let outputs = self
            .outputs
            .as_deref()
            .ok_or_else(|| Self::unimplemented(ctx, "build_outputs"))?;
        Ok(in_output_dir(ctx, outputs))
    }

    fn generate_flashbundle(&self, ctx: &BuildContext<'_>) -> Result<()> {
        match self.flashbundle_command.as_deref() {
            Some(cmd) => {
                let title = format!("Generating flashbundle {}", ctx.identifier());
                Self::run_step(ctx, cmd, title)
            }
            None => Ok(()),
        }
    }

    fn flashbundle(&self, ctx: &BuildContext<'_>) -> Result<ArtifactSet> {
        Ok(in_output_dir(ctx, &self.flashbundle_files))
    }

    fn required_tools(&self) -> Vec<String> {
        [&self.generate, &self.build, &self.flashbundle_command]
            .into_iter()
            .flatten()
            .filter_map(|cmd| cmd.first().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildJob, BuilderConfig};
    use crate::runner::PrintOnlyRunner;
    use crate::target::BuildTarget;

    fn words(ws: &[&str]) -> Vec<String> {
        ws.iter().map(|w| w.to_string()).collect()
    }

    fn esp32() -> BuildTarget {
        BuildTarget::new("esp32", "devkitc", "all-clusters")
    }

    #[test]
    fn test_placeholders_expand() {
        let runner = PrintOnlyRunner::new(Vec::new());
        {
            let ctx = BuilderConfig::new("/chip/esp32")
                .unwrap()
                .enable_flashbundle(true)
                .identify(&esp32(), &runner);
            let builder = ScriptedBuilder {
                generate: Some(words(&["idf.py", "-B", "{output_dir}", "reconfigure"])),
                build: Some(words(&["idf.py", "-B", "{output_dir}", "build"])),
                outputs: Some(words(&["chip-{app}.elf"])),
                flashbundle_command: Some(words(&["./bundle.sh", "{identifier}"])),
                flashbundle_files: words(&["flash_args"]),
            };

            let mut job = BuildJob::new(builder, ctx);
            job.generate().unwrap();
            job.build().unwrap();

            let outputs = job.outputs().unwrap();
            assert_eq!(
                outputs.names().collect::<Vec<_>>(),
                ["chip-all-clusters.elf", "flash_args"]
            );
        }

        let script = String::from_utf8(runner.into_inner()).unwrap();
        assert!(script.contains(
            "cd /chip/esp32 && idf.py -B out/esp32-devkitc-all-clusters reconfigure\n"
        ));
        assert!(
            script.contains("cd /chip/esp32 && idf.py -B out/esp32-devkitc-all-clusters build\n")
        );
        assert!(script.contains("cd /chip/esp32 && ./bundle.sh esp32-devkitc-all-clusters\n"));
    }

    #[test]
    fn test_missing_required_steps_are_unimplemented() {
        let runner = PrintOnlyRunner::new(Vec::new());
        let ctx = BuilderConfig::new("/src").unwrap().identify(&esp32(), &runner);
        let builder = ScriptedBuilder::new();

        for (result, expected) in [
            (builder.generate(&ctx), "generate"),
            (builder.build_step(&ctx), "build"),
            (builder.build_outputs(&ctx).map(|_| ()), "build_outputs"),
        ] {
            match result {
                Err(BuildError::Unimplemented { builder, operation }) => {
                    assert_eq!(builder, "esp32-devkitc-all-clusters");
                    assert_eq!(operation, expected);
                }
                other => panic!("expected Unimplemented, got {:?}", other),
            }
        }

        assert!(builder.generate_flashbundle(&ctx).is_ok());
        assert!(builder.flashbundle(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_required_tools_are_step_programs() {
        let builder = ScriptedBuilder {
            generate: Some(words(&["cmake", "-S", "."])),
            build: Some(words(&["ninja"])),
            ..Default::default()
        };
        assert_eq!(builder.required_tools(), ["cmake", "ninja"]);
    }
}
