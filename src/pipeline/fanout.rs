//! Parallel render coordination: fan out one task per page, fan back in.
//!
//! Every page from 1 to `page_count` is scheduled; at most `concurrency`
//! render tasks run at once (`buffer_unordered`). The coordinator waits for
//! all of them to settle before looking at the results, so no render task is
//! still writing into the job directory when cleanup runs. Results come back
//! in completion order and are re-sorted by page number.

use crate::error::Pdf2ZipError;
use crate::job::{PageImage, RenderStatus};
use crate::pipeline::backend::RasterBackend;
use crate::pipeline::render::{self, PageRenderOptions};
use crate::workspace::JobWorkspace;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of rendering every page of a document.
#[derive(Debug)]
pub struct RenderBatch {
    /// One entry per page, in page order.
    pub pages: Vec<PageImage>,
    /// The first failure observed, in completion order.
    pub first_failure: Option<Pdf2ZipError>,
}

impl RenderBatch {
    pub fn done_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.status == RenderStatus::Done)
            .count()
    }

    /// Fail the whole batch if any page failed.
    pub fn into_result(self) -> Result<Vec<PageImage>, Pdf2ZipError> {
        match self.first_failure {
            Some(e) => Err(e),
            None => Ok(self.pages),
        }
    }
}

/// Render pages `1..=page_count` of `source` into the workspace.
///
/// Every page path is registered with `workspace` before its task starts, so
/// whatever a task manages to write is released with the job even when other
/// pages fail.
pub async fn render_all(
    backend: &Arc<dyn RasterBackend>,
    workspace: &mut JobWorkspace,
    source: &Path,
    page_count: usize,
    options: &PageRenderOptions,
    concurrency: usize,
) -> RenderBatch {
    let mut pages: Vec<PageImage> = (1..=page_count)
        .map(|index| PageImage {
            index,
            path: workspace.register(options.page_path(index)),
            status: RenderStatus::Pending,
        })
        .collect();

    let settled: Vec<(usize, Result<_, Pdf2ZipError>)> =
        stream::iter((1..=page_count).map(|page| async move {
            (page, render::render(backend, source, page, options).await)
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut first_failure = None;
    for (page, result) in settled {
        let slot = &mut pages[page - 1];
        match result {
            Ok(path) => {
                debug_assert_eq!(path, slot.path);
                slot.status = RenderStatus::Done;
            }
            Err(e) => {
                warn!("Page {}/{} failed: {}", page, page_count, e);
                slot.status = RenderStatus::Failed;
                first_failure.get_or_insert(e);
            }
        }
    }

    let batch = RenderBatch {
        pages,
        first_failure,
    };
    info!("Rendered {}/{} pages", batch.done_count(), page_count);
    batch
}
