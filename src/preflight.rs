//! Preflight checks for build validation.
//!
//! Validates that the host has the toolchain programs a builder needs
//! before any step runs, instead of failing halfway through a build.
//!
//! # Example
//!
//! ```rust
//! use fw_builder::preflight::{command_exists, check_required_tools};
//!
//! if !command_exists("ninja") {
//!     println!("ninja not installed");
//! }
//!
//! if let Err(e) = check_required_tools(&["gn", "ninja"]) {
//!     eprintln!("{}", e);
//! }
//! ```

use tracing::debug;

use crate::error::{BuildError, Result};

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Check that every tool is available, reporting all missing ones at once.
pub fn check_required_tools<S: AsRef<str>>(tools: &[S]) -> Result<()> {
    let missing: Vec<&str> = tools
        .iter()
        .map(AsRef::as_ref)
        .filter(|tool| {
            let found = command_exists(tool);
            debug!(tool = %tool, found, "preflight");
            !found
        })
        .collect();

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|t| format!("  {}", t))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(BuildError::MissingTools(msg));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_exists() {
        // 'sh' should exist on any Unix system
        assert!(command_exists("sh"));
        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }

    #[test]
    fn test_check_required_tools_success() {
        assert!(check_required_tools(&["sh", "ls"]).is_ok());
        assert!(check_required_tools::<&str>(&[]).is_ok());
    }

    #[test]
    fn test_check_required_tools_lists_every_missing_tool() {
        let err = check_required_tools(&[
            "sh",
            "nonexistent_command_xyz",
            "another_missing_tool_abc",
        ])
        .unwrap_err();
        match err {
            BuildError::MissingTools(msg) => {
                assert_eq!(msg, "  nonexistent_command_xyz\n  another_missing_tool_abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
