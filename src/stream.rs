//! Streaming delivery of a sealed archive.
//!
//! The archive is read from disk in fixed-size chunks and handed to the HTTP
//! body as it is read. The job's workspace travels with the stream and is
//! released exactly once: at end-of-file, on a read error, or when the
//! stream is dropped early because the client went away.

use crate::convert::PreparedArchive;
use crate::error::Pdf2ZipError;
use crate::job::JobState;
use futures::stream::{self, Stream};
use std::io;
use std::pin::Pin;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Read size for each body chunk.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// A boxed stream of archive bytes.
pub type ArchiveStream = Pin<Box<dyn Stream<Item = io::Result<Vec<u8>>> + Send>>;

/// Everything needed to send an archive as a download.
pub struct ArchiveDownload {
    /// Suggested client-side file name.
    pub file_name: String,
    pub size_bytes: u64,
    pub stream: ArchiveStream,
}

impl std::fmt::Debug for ArchiveDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveDownload")
            .field("file_name", &self.file_name)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

/// Releases the job when delivery ends, however it ends.
struct Delivery {
    prepared: Option<PreparedArchive>,
}

impl Delivery {
    async fn complete(mut self, how: &str) {
        if let Some(prepared) = self.prepared.take() {
            debug!("Job {}: delivery ended ({})", prepared.job.id, how);
            prepared.close().await;
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if let Some(mut prepared) = self.prepared.take() {
            warn!("Job {}: download dropped before completion", prepared.job.id);
            prepared.finish();
        }
    }
}

impl PreparedArchive {
    /// Open the sealed archive and turn it into a self-cleaning byte stream.
    pub async fn into_download(mut self) -> Result<ArchiveDownload, Pdf2ZipError> {
        let archive = self.archive().clone();
        let file = match tokio::fs::File::open(&archive.path).await {
            Ok(f) => f,
            Err(e) => {
                self.close().await;
                return Err(Pdf2ZipError::PackagingFailure {
                    path: archive.path,
                    detail: format!("reopen for streaming: {}", e),
                });
            }
        };
        self.job.advance(JobState::Streaming)?;

        let file_name = archive
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "converted.zip".to_string());

        let delivery = Delivery {
            prepared: Some(self),
        };
        let chunks = stream::unfold(Some((file, delivery)), |state| async move {
            let (mut file, delivery) = state?;
            let mut buf = vec![0u8; CHUNK_SIZE];
            match file.read(&mut buf).await {
                Ok(0) => {
                    drop(file);
                    delivery.complete("complete").await;
                    None
                }
                Ok(n) => {
                    buf.truncate(n);
                    Some((Ok(buf), Some((file, delivery))))
                }
                Err(e) => {
                    drop(file);
                    delivery.complete("read error").await;
                    Some((Err(e), None))
                }
            }
        });

        Ok(ArchiveDownload {
            file_name,
            size_bytes: archive.size_bytes,
            stream: Box::pin(chunks),
        })
    }
}
