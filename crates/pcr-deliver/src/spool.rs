use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
};

use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Split},
};
use tracing::{debug, info, warn};

use crate::{
    errors::SpoolError,
    format::ResultLine,
    poster::{DeliveryOutcome, Poster, encode},
};

/// File holding result lines the collector has not acknowledged yet.
///
/// Lines leave the file only after a successful post. The file is rewritten
/// as a whole (temp sibling + rename) or removed, never edited in place.
#[derive(Debug, Clone)]
pub struct FailureSpool {
    path: PathBuf,
}

impl FailureSpool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-post the spooled lines chunk by chunk while reading the file.
    ///
    /// On the first failure the rest of the file is read into the outcome's
    /// `unposted` lines. The file itself is left untouched; call [`store`](Self::store)
    /// with whatever must remain.
    ///
    /// Lines are split on raw bytes; invalid UTF-8 is replaced, not fatal, so a
    /// damaged line can never stop the replay after earlier chunks went out.
    pub async fn replay(&self, poster: &Poster) -> Result<DeliveryOutcome, SpoolError> {
        let file = match fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(DeliveryOutcome::Delivered),
            Err(e) => return Err(self.read_err(e)),
        };
        let mut reader = BufReader::new(file).split(b'\n');
        let mut chunk = Vec::with_capacity(poster.lines_per_post());
        let mut replayed = 0usize;

        loop {
            let next = reader
                .next_segment()
                .await
                .map_err(|e| self.read_err(e))?
                .map(decode);
            let done = next.is_none();
            if let Some(line) = next.filter(|l| !l.is_empty()) {
                chunk.push(ResultLine::from_raw(line));
            }

            if chunk.len() >= poster.lines_per_post() || (done && !chunk.is_empty()) {
                let sent = chunk.len();
                match poster.deliver(std::mem::take(&mut chunk)).await {
                    DeliveryOutcome::Delivered => replayed += sent,
                    DeliveryOutcome::Failed { mut unposted } => {
                        self.read_rest(&mut reader, &mut unposted).await?;
                        info!(target: "pcr.deliver.spool", replayed, carried = unposted.len(), "spool replay failed");
                        return Ok(DeliveryOutcome::Failed { unposted });
                    }
                    DeliveryOutcome::TooBig { mut unposted } => {
                        self.read_rest(&mut reader, &mut unposted).await?;
                        info!(target: "pcr.deliver.spool", replayed, carried = unposted.len(), "spool replay stopped");
                        return Ok(DeliveryOutcome::TooBig { unposted });
                    }
                }
            }
            if done {
                break;
            }
        }

        if replayed > 0 {
            info!(target: "pcr.deliver.spool", replayed, "spool replayed");
        }
        Ok(DeliveryOutcome::Delivered)
    }

    /// Replace the spool with `lines`, or remove it when there are none.
    pub async fn store(&self, lines: &[ResultLine]) -> Result<(), SpoolError> {
        if lines.is_empty() {
            return match fs::remove_file(&self.path).await {
                Ok(()) => {
                    debug!(target: "pcr.deliver.spool", path = %self.path.display(), "spool removed");
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(self.write_err(e)),
            };
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, encode(lines))
            .await
            .map_err(|e| self.write_err(e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.write_err(e))?;
        info!(target: "pcr.deliver.spool", path = %self.path.display(), lines = lines.len(), "results spooled");
        Ok(())
    }

    /// Append `lines` to whatever the spool holds now.
    pub async fn append(&self, lines: &[ResultLine]) -> Result<(), SpoolError> {
        if lines.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.write_err(e))?;
        file.write_all(encode(lines).as_bytes())
            .await
            .map_err(|e| self.write_err(e))?;
        file.flush().await.map_err(|e| self.write_err(e))?;
        info!(target: "pcr.deliver.spool", path = %self.path.display(), lines = lines.len(), "results appended to spool");
        Ok(())
    }

    /// Lines currently spooled, in file order.
    pub async fn load(&self) -> Result<Vec<ResultLine>, SpoolError> {
        match fs::read(&self.path).await {
            Ok(raw) => Ok(String::from_utf8_lossy(&raw)
                .lines()
                .filter(|l| !l.is_empty())
                .map(ResultLine::from_raw)
                .collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.read_err(e)),
        }
    }

    async fn read_rest(
        &self,
        reader: &mut Split<BufReader<fs::File>>,
        out: &mut Vec<ResultLine>,
    ) -> Result<(), SpoolError> {
        while let Some(raw) = reader.next_segment().await.map_err(|e| self.read_err(e))? {
            let line = decode(raw);
            if !line.is_empty() {
                out.push(ResultLine::from_raw(line));
            }
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("spool"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn read_err(&self, source: io::Error) -> SpoolError {
        SpoolError::Read {
            path: self.path.clone(),
            source,
        }
    }

    fn write_err(&self, source: io::Error) -> SpoolError {
        SpoolError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

/// One spooled line without its terminator.
fn decode(raw: Vec<u8>) -> String {
    let mut line = String::from_utf8(raw).unwrap_or_else(|e| {
        warn!(target: "pcr.deliver.spool", "spooled line is not valid utf-8, replaced");
        String::from_utf8_lossy(e.as_bytes()).into_owned()
    });
    if line.ends_with('\r') {
        line.pop();
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::DeliveryError, transport::Transport};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Accepting {
        posts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for Accepting {
        async fn post(&self, input: &str) -> Result<(), DeliveryError> {
            self.posts.lock().unwrap().push(input.to_string());
            Ok(())
        }
    }

    fn lines(xs: &[&str]) -> Vec<ResultLine> {
        xs.iter().map(|x| ResultLine::from_raw(*x)).collect()
    }

    #[tokio::test]
    async fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let spool = FailureSpool::new(dir.path().join("results.spool"));

        spool.store(&lines(&["[1] a", "[2] b"])).await.unwrap();
        assert_eq!(spool.load().await.unwrap(), lines(&["[1] a", "[2] b"]));
        assert!(!dir.path().join("results.spool.tmp").exists());

        spool.store(&[]).await.unwrap();
        assert!(!spool.path().exists());
        spool.store(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn append_keeps_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let spool = FailureSpool::new(dir.path().join("results.spool"));

        spool.append(&lines(&["[1] a"])).await.unwrap();
        spool.append(&lines(&["[2] b"])).await.unwrap();
        assert_eq!(spool.load().await.unwrap(), lines(&["[1] a", "[2] b"]));
    }

    #[tokio::test]
    async fn load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let spool = FailureSpool::new(dir.path().join("none"));
        assert!(spool.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replay_survives_invalid_utf8_mid_file() {
        let dir = tempfile::tempdir().unwrap();
        let spool = FailureSpool::new(dir.path().join("results.spool"));
        std::fs::write(spool.path(), b"[1] a\n[2] b\r\n[3] \xff\xfe\n").unwrap();

        let collector = Arc::new(Accepting::default());
        let poster = Poster::new(collector.clone(), 2, 8192);

        let outcome = spool.replay(&poster).await.unwrap();
        assert!(outcome.is_delivered());
        assert_eq!(
            *collector.posts.lock().unwrap(),
            vec![
                "[1] a\n[2] b\n".to_string(),
                "[3] \u{FFFD}\u{FFFD}\n".to_string()
            ]
        );

        // nothing left to keep: the next replay posts nothing again
        spool.store(&outcome.into_unposted()).await.unwrap();
        assert!(!spool.path().exists());
        spool.replay(&poster).await.unwrap();
        assert_eq!(collector.posts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn load_replaces_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let spool = FailureSpool::new(dir.path().join("results.spool"));
        std::fs::write(spool.path(), b"[1] a\n[2] \xff\n").unwrap();

        assert_eq!(
            spool.load().await.unwrap(),
            lines(&["[1] a", "[2] \u{FFFD}"])
        );
    }
}
