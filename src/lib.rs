//! Uniform build lifecycle over per-platform firmware toolchains.
//!
//! Every platform/board/application combination has its own toolchain, but
//! an orchestrator wants to drive all of them the same way: generate build
//! files, build, optionally produce a flashbundle, then collect and package
//! the outputs. This crate provides that lifecycle:
//!
//! - **Builders** - [`Builder`] trait for toolchain drivers (GN, make, scripted)
//! - **Lifecycle** - [`BuildJob`] enforcing generate → build → outputs ordering
//! - **Artifacts** - [`ArtifactSet`], tar archives and directory staging
//! - **Runners** - [`Runner`] trait through which every command is executed
//! - **Preflight checks** - Host tool validation before builds
//!
//! # Architecture
//!
//! ```text
//! fw-build (CLI)
//!     │
//!     ├── config: fw-build.toml → targets + toolchain settings
//!     │
//!     ▼
//! BuilderConfig ──identify──▶ BuildContext ──▶ BuildJob<B: Builder>
//!                                 │                 │
//!                                 ▼                 ├── generate / build
//!                              Runner               └── outputs → archive / copy
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use fw_builder::{BuildJob, BuildTarget, BuilderConfig};
//! use fw_builder::builder::make::MakeBuilder;
//! use fw_builder::runner::ShellRunner;
//!
//! let runner = ShellRunner::new();
//! let ctx = BuilderConfig::new("third_party/qpg_sdk")?
//!     .identify(&BuildTarget::new("qpg", "qpg6100", "lock"), &runner);
//! let mut job = BuildJob::new(MakeBuilder::new().with_outputs(["lock.hex"]), ctx);
//! job.generate()?;
//! job.build()?;
//! job.compress_artifacts(Path::new("qpg-qpg6100-lock.tar.gz"))?;
//! ```

pub mod artifacts;
pub mod builder;
pub mod config;
pub mod error;
pub mod preflight;
pub mod runner;
pub mod target;

pub use artifacts::ArtifactSet;
pub use builder::{BuildContext, BuildJob, BuildState, Builder, BuilderConfig};
pub use error::{BuildError, Result};
pub use runner::{PrintOnlyRunner, Runner, ShellRunner};
pub use target::BuildTarget;
