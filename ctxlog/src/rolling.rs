//! Size based rolling file sink on top of `flexi_logger`'s [`FileLogWriter`].
//!
//! For a configured path `dir/app.log` the active file is `dir/app_rCURRENT.log`. Rolled
//! files are named `dir/app_r<timestamp>.log`, gzip compressed to `.log.gz` when
//! compression is enabled.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ctxlog_config::RotationConfig;
use flexi_logger::writers::{ArcFileLogWriter, FileLogWriter, FileLogWriterHandle};
use flexi_logger::{Cleanup, Criterion, FileSpec, FlexiLoggerError, Naming, WriteMode};

/// Suffix used when the configured path has no extension.
const DEFAULT_SUFFIX: &str = "log";

/// A log file that rolls over by size.
///
/// Each record is written with a single call, so records from concurrent threads never
/// interleave. The file and its directory are created when the sink is opened.
pub struct RollingFile {
    writer: ArcFileLogWriter,
    directory: PathBuf,
    // Dropping the handle shuts the writer down.
    _handle: FileLogWriterHandle,
}

impl RollingFile {
    pub fn open(path: &Path, policy: &RotationConfig) -> Result<Self, FlexiLoggerError> {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let basename = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_SUFFIX.to_string());

        let file_spec = FileSpec::default()
            .directory(&directory)
            .basename(basename)
            .suffix(suffix)
            .suppress_timestamp();

        let (writer, handle) = FileLogWriter::builder(file_spec)
            .append()
            .write_mode(WriteMode::Direct)
            .rotate(
                Criterion::Size(policy.max_size_bytes),
                Naming::Timestamps,
                cleanup(policy),
            )
            // Rolled files are in place as soon as the rotating write returns.
            .cleanup_in_background_thread(false)
            .try_build_with_handle()?;

        Ok(Self {
            writer,
            directory,
            _handle: handle,
        })
    }

    /// Directory holding the active and the rolled files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Appends one record, rolling the active file first once it is past the threshold.
    pub fn write_record(&self, buf: &[u8]) -> io::Result<()> {
        self.writer.clone().write_all(buf)
    }

    pub fn flush(&self) -> io::Result<()> {
        self.writer.clone().flush()
    }
}

/// Maps the retention policy onto `flexi_logger`. Zero retains every rolled file.
fn cleanup(policy: &RotationConfig) -> Cleanup {
    match (policy.max_backups, policy.compress) {
        (0, _) => Cleanup::Never,
        (max_backups, true) => Cleanup::KeepCompressedFiles(max_backups),
        (max_backups, false) => Cleanup::KeepLogFiles(max_backups),
    }
}
