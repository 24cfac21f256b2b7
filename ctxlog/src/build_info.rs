use shadow_rs::shadow;

shadow!(build);

/// JSON field name of the source revision the binary was built from.
pub const GIT_REVISION_KEY: &str = "git_revision";
/// JSON field name of the compiler version the binary was built with.
pub const RUSTC_VERSION_KEY: &str = "rustc_version";

/// Build metadata attached to every record written to the log file.
///
/// Values are captured at compile time. Builds outside of a git checkout carry an empty
/// revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub git_revision: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    /// Returns the metadata of the running binary.
    pub fn current() -> Self {
        Self {
            git_revision: build::COMMIT_HASH,
            rustc_version: build::RUST_VERSION,
        }
    }

    /// Static `(key, value)` pairs written with each file record.
    pub fn fields(&self) -> [(&'static str, &'static str); 2] {
        [
            (GIT_REVISION_KEY, self.git_revision),
            (RUSTC_VERSION_KEY, self.rustc_version),
        ]
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::current()
    }
}
