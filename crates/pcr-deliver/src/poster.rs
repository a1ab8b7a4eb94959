use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::{format::ResultLine, transport::Transport};

/// How a delivery attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Every line was acknowledged by the collector.
    Delivered,
    /// A post failed; `unposted` is the failed chunk and everything after it, in order.
    Failed { unposted: Vec<ResultLine> },
    /// A chunk exceeded the byte limit and was not sent. Lines that can never
    /// fit are dropped; the rest are in `unposted`.
    TooBig { unposted: Vec<ResultLine> },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }

    pub fn unposted(&self) -> &[ResultLine] {
        match self {
            DeliveryOutcome::Delivered => &[],
            DeliveryOutcome::Failed { unposted } | DeliveryOutcome::TooBig { unposted } => unposted,
        }
    }

    pub fn into_unposted(self) -> Vec<ResultLine> {
        match self {
            DeliveryOutcome::Delivered => Vec::new(),
            DeliveryOutcome::Failed { unposted } | DeliveryOutcome::TooBig { unposted } => unposted,
        }
    }
}

/// Splits result lines into bounded chunks and posts them in order.
///
/// A chunk holds at most `lines_per_post` lines and
/// `lines_per_post * max_line_size` bytes. Posting stops at the first failure.
#[derive(Clone)]
pub struct Poster {
    transport: Arc<dyn Transport>,
    lines_per_post: usize,
    max_line_size: usize,
}

impl Poster {
    pub fn new(transport: Arc<dyn Transport>, lines_per_post: usize, max_line_size: usize) -> Self {
        Self {
            transport,
            lines_per_post: lines_per_post.max(1),
            max_line_size,
        }
    }

    pub fn lines_per_post(&self) -> usize {
        self.lines_per_post
    }

    pub fn max_line_size(&self) -> usize {
        self.max_line_size
    }

    /// Byte limit of one chunk.
    pub fn max_chunk_size(&self) -> usize {
        self.lines_per_post.saturating_mul(self.max_line_size)
    }

    pub async fn deliver(&self, lines: Vec<ResultLine>) -> DeliveryOutcome {
        let mut start = 0;
        while start < lines.len() {
            let end = (start + self.lines_per_post).min(lines.len());
            let chunk = &lines[start..end];
            let input = encode(chunk);

            if input.len() > self.max_chunk_size() {
                error!(
                    target: "pcr.deliver.post",
                    bytes = input.len(),
                    limit = self.max_chunk_size(),
                    "result too big, posting stopped"
                );
                let unposted = self.drop_unfittable(lines.into_iter().skip(start));
                return DeliveryOutcome::TooBig { unposted };
            }

            if let Err(e) = self.transport.post(&input).await {
                warn!(
                    target: "pcr.deliver.post",
                    error = %e,
                    unposted = lines.len() - start,
                    "post failed"
                );
                let unposted = lines.into_iter().skip(start).collect();
                return DeliveryOutcome::Failed { unposted };
            }
            debug!(target: "pcr.deliver.post", lines = chunk.len(), bytes = input.len(), "posted");
            start = end;
        }
        DeliveryOutcome::Delivered
    }

    fn drop_unfittable(&self, lines: impl Iterator<Item = ResultLine>) -> Vec<ResultLine> {
        lines
            .filter(|line| {
                let fits = line.encoded_len() <= self.max_line_size;
                if !fits {
                    warn!(
                        target: "pcr.deliver.post",
                        len = line.encoded_len(),
                        max_line_size = self.max_line_size,
                        "result line can never be posted, dropped"
                    );
                }
                fits
            })
            .collect()
    }
}

/// Concatenate lines, each newline-terminated.
pub(crate) fn encode(lines: &[ResultLine]) -> String {
    let mut out = String::with_capacity(lines.iter().map(ResultLine::encoded_len).sum());
    for line in lines {
        out.push_str(line.as_str());
        out.push('\n');
    }
    out
}
