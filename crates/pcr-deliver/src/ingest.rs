use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{errors::IngestError, format::ResultLine};

/// Collects result lines that other processes dropped into a spool directory.
///
/// Only files whose name starts with a 10-digit epoch are read; each one is
/// deleted once read, whatever happened to its lines.
#[derive(Debug, Clone)]
pub struct ExternalIngestor {
    dir: PathBuf,
    max_line_size: usize,
}

impl ExternalIngestor {
    pub fn new(dir: impl Into<PathBuf>, max_line_size: usize) -> Self {
        Self {
            dir: dir.into(),
            max_line_size,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read and remove every matching file. A missing directory yields nothing.
    pub async fn ingest(&self) -> Result<Vec<ResultLine>, IngestError> {
        let mut files = match self.matching_files().await {
            Ok(files) => files,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(target: "pcr.deliver.ingest", dir = %self.dir.display(), "result dir missing");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(IngestError::ReadDir {
                    path: self.dir.clone(),
                    source,
                });
            }
        };
        files.sort();

        let mut lines = Vec::new();
        for path in files {
            match tokio::fs::read(&path).await {
                Ok(raw) => {
                    let before = lines.len();
                    self.accept(&path, &String::from_utf8_lossy(&raw), &mut lines);
                    debug!(
                        target: "pcr.deliver.ingest",
                        file = %path.display(),
                        accepted = lines.len() - before,
                        "ingested"
                    );
                }
                Err(e) => {
                    warn!(target: "pcr.deliver.ingest", file = %path.display(), error = %e, "failed to read result file");
                }
            }
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(target: "pcr.deliver.ingest", file = %path.display(), error = %e, "failed to delete result file");
            }
        }
        Ok(lines)
    }

    fn accept(&self, path: &Path, content: &str, out: &mut Vec<ResultLine>) {
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            // same bound as our own lines: newline included, `max_line_size` itself fits
            if line.len() + 1 > self.max_line_size {
                warn!(
                    target: "pcr.deliver.ingest",
                    file = %path.display(),
                    len = line.len() + 1,
                    max_line_size = self.max_line_size,
                    "external result line too long, dropped"
                );
                continue;
            }
            out.push(ResultLine::from_raw(line));
        }
    }

    async fn matching_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if has_epoch_prefix(&name.to_string_lossy()) && entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        Ok(files)
    }
}

fn has_epoch_prefix(name: &str) -> bool {
    name.len() >= 10 && name.as_bytes()[..10].iter().all(u8::is_ascii_digit)
}
