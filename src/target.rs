//! Build target naming.
//!
//! One build configuration is the combination of a platform, a board, an
//! application and whether RPC support is compiled in. Its identifier is
//! used both for display and as the leaf directory under the output prefix:
//!
//! ```text
//! linux-x64-chip-tool        (rpc disabled)
//! esp32-m5stack-all-clusters-rpc
//! ```

use std::fmt;

/// Separator joining the identifier components.
pub const IDENTIFIER_SEPARATOR: &str = "-";

/// Suffix appended to identifiers of RPC-enabled builds.
pub const RPC_SUFFIX: &str = "-rpc";

/// A (platform, board, app, rpc) build combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildTarget {
    pub platform: String,
    pub board: String,
    pub app: String,
    pub enable_rpcs: bool,
}

impl BuildTarget {
    pub fn new(
        platform: impl Into<String>,
        board: impl Into<String>,
        app: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            board: board.into(),
            app: app.into(),
            enable_rpcs: false,
        }
    }

    /// Builder-style toggle for RPC support.
    pub fn with_rpcs(mut self, enable_rpcs: bool) -> Self {
        self.enable_rpcs = enable_rpcs;
        self
    }

    /// Canonical identifier: `platform-board-app`, plus `-rpc` when enabled.
    pub fn identifier(&self) -> String {
        let mut identifier = [
            self.platform.as_str(),
            self.board.as_str(),
            self.app.as_str(),
        ]
        .join(IDENTIFIER_SEPARATOR);
        if self.enable_rpcs {
            identifier.push_str(RPC_SUFFIX);
        }
        identifier
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_joins_components() {
        let target = BuildTarget::new("linux", "x64", "chip-tool");
        assert_eq!(target.identifier(), "linux-x64-chip-tool");
    }

    #[test]
    fn test_rpc_identifier_appends_suffix() {
        let plain = BuildTarget::new("efr32", "brd4161a", "lock");
        let rpc = plain.clone().with_rpcs(true);
        assert_eq!(rpc.identifier(), format!("{}-rpc", plain.identifier()));
    }

    #[test]
    fn test_display_matches_identifier() {
        let target = BuildTarget::new("qpg", "qpg6100", "lock").with_rpcs(true);
        assert_eq!(target.to_string(), "qpg-qpg6100-lock-rpc");
    }
}
