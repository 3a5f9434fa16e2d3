use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use anyhow::Context as _;
use counter::{Clock, SystemClock};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::instrument;

use crate::endpoint::Endpoint;
use crate::progress::Progress;

/// Error type for copy operations that preserves operation summary even on failure.
///
/// # Logging Convention
/// The Display implementation automatically shows the full error chain, so you can log it
/// with any format specifier:
/// ```ignore
/// tracing::error!("copy failed: {}", &error);   // ✅ Shows full chain
/// tracing::error!("copy failed: {:#}", &error); // ✅ Shows full chain
/// ```
#[derive(Debug, thiserror::Error)]
#[error("{source:#}")]
pub struct Error {
    #[source]
    pub source: anyhow::Error,
    pub summary: Summary,
}

impl Error {
    #[must_use]
    pub fn new(source: anyhow::Error, summary: Summary) -> Self {
        Error { source, summary }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Settings {
    pub chunk_size: usize,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub bytes_copied: u64,
    pub duration: Duration,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secs = self.duration.as_secs_f64();
        let rate = if secs > 0.0 {
            self.bytes_copied as f64 / secs
        } else {
            0.0
        };
        write!(
            f,
            "bytes copied: {}\n\
            duration: {:.2}s\n\
            average rate: {}/s",
            bytesize::ByteSize(self.bytes_copied),
            secs,
            bytesize::ByteSize(rate as u64),
        )
    }
}

/// Wraps a writer and records every successful write in the transfer's [`Progress`].
pub struct MeteredWriter<'a, W, C = SystemClock> {
    inner: W,
    progress: &'a Progress<C>,
    written: u64,
}

impl<'a, W, C: Clock> MeteredWriter<'a, W, C> {
    pub fn new(inner: W, progress: &'a Progress<C>) -> Self {
        Self {
            inner,
            progress,
            written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl<W: AsyncWrite + Unpin, C: Clock> AsyncWrite for MeteredWriter<'_, W, C> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            let n = *n as u64;
            this.written += n;
            this.progress.add_bytes(n);
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[instrument(skip(progress))]
pub async fn copy<C: Clock>(
    progress: &Progress<C>,
    src: &Endpoint,
    dst: &Endpoint,
    settings: &Settings,
) -> Result<Summary, Error> {
    let started = std::time::Instant::now();
    tracing::debug!("opening 'src' for reading and 'dst' for writing");
    let reader = src
        .reader()
        .await
        .map_err(|err| Error::new(err, Default::default()))?;
    let writer = dst
        .writer()
        .await
        .map_err(|err| Error::new(err, Default::default()))?;
    let mut reader = tokio::io::BufReader::with_capacity(settings.chunk_size, reader);
    let mut writer = MeteredWriter::new(writer, progress);
    let result = async {
        tokio::io::copy_buf(&mut reader, &mut writer)
            .await
            .with_context(|| format!("failed copying data from {src} to {dst}"))?;
        writer
            .shutdown()
            .await
            .with_context(|| format!("failed closing {dst}"))?;
        Ok::<_, anyhow::Error>(())
    }
    .await;
    let summary = Summary {
        bytes_copied: writer.bytes_written(),
        duration: started.elapsed(),
    };
    match result {
        Ok(()) => {
            tracing::debug!("copied {} bytes", summary.bytes_copied);
            Ok(summary)
        }
        Err(err) => Err(Error::new(err, summary)),
    }
}
