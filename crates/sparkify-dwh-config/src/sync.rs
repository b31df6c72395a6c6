//! Write-back of resolved provider outputs into the config file.
//!
//! The file is read in full, the `ARN` and `HOST` entries are rewritten, and
//! the result replaces the existing file through a temp file in the same directory
//! followed by a rename. Every other line is left byte-for-byte intact.

use crate::sources::read_document;
use crate::{ConfigError, Result, ARN_KEY, HOST_KEY};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Number of lines rewritten per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub arn_lines: usize,
    pub host_lines: usize,
}

pub(crate) fn write_back(path: &Path, arn: &str, endpoint: &str) -> Result<SyncSummary> {
    let mut doc = read_document(path)?;

    let summary = SyncSummary {
        arn_lines: doc.set_all(ARN_KEY, arn),
        host_lines: doc.set_all(HOST_KEY, endpoint),
    };

    if summary.arn_lines == 0 {
        warn!("No {} entry in {}; role ARN not persisted", ARN_KEY, path.display());
    }
    if summary.host_lines == 0 {
        warn!("No {} entry in {}; endpoint not persisted", HOST_KEY, path.display());
    }

    replace_file(path, doc.to_string().as_bytes())?;
    debug!(?summary, "Config written back to {}", path.display());

    Ok(summary)
}

fn replace_file(path: &Path, content: &[u8]) -> Result<()> {
    let write_err = |source: std::io::Error| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // Temp files are created 0600; keep the mode the config file already had
    let permissions = std::fs::metadata(path).map_err(write_err)?.permissions();

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(content).map_err(write_err)?;
    tmp.as_file()
        .set_permissions(permissions)
        .map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
