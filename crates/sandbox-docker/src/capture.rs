use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub(crate) enum CaptureError {
    #[error("combined output exceeded {0} bytes")]
    LimitExceeded(usize),

    #[error("read pipe: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte budget shared by the stdout and stderr readers of one process.
pub(crate) struct OutputBudget {
    limit: usize,
    used: AtomicUsize,
}

impl OutputBudget {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit,
            used: AtomicUsize::new(0),
        }
    }

    fn consume(&self, n: usize) -> Result<(), CaptureError> {
        let total = self.used.fetch_add(n, Ordering::Relaxed).saturating_add(n);
        if total > self.limit {
            return Err(CaptureError::LimitExceeded(self.limit));
        }
        Ok(())
    }
}

/// Read `pipe` to EOF, charging every chunk against `budget`.
///
/// Stops at the first chunk that overdraws the budget so the caller can kill
/// the writer instead of buffering unbounded output.
pub(crate) async fn drain<R>(mut pipe: R, budget: &OutputBudget) -> Result<Vec<u8>, CaptureError>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    loop {
        captured.reserve(CHUNK_SIZE);
        let n = pipe.read_buf(&mut captured).await?;
        if n == 0 {
            return Ok(captured);
        }
        budget.consume(n)?;
    }
}
