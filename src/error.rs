//! Error taxonomy for the archiving pipeline.
//!
//! Every stage of the pipeline is fatal-on-error: an [`EbookError`] propagates
//! to `main`, which prints the diagnostic and exits. The single soft fallback
//! (a missing "All weeks" expander) is handled inside the fetcher and never
//! becomes an error.

use std::time::Duration;
use thiserror::Error;

/// Fatal errors raised by the scraping and assembly pipeline.
#[derive(Debug, Error)]
pub enum EbookError {
    /// No anchors matching the weekly content pattern were found on the
    /// overview page. Also raised when the course genuinely has zero weeks;
    /// the two cases cannot be told apart and both abort the run.
    #[error("no weekly content links found on the overview page; the page structure may have changed")]
    Discovery,

    /// A page failed to signal readiness within the configured bound.
    #[error("timed out after {timeout:?} waiting for `{selector}` to appear")]
    NavigationTimeout { selector: String, timeout: Duration },

    /// The DevTools endpoint did not describe a debuggable browser.
    #[error("could not attach to the Chrome debugging endpoint: {0}")]
    Attach(String),

    /// Transport or protocol failure talking to the attached browser.
    #[error("browser session error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    /// Querying the DevTools HTTP endpoint failed.
    #[error("DevTools endpoint request failed: {0}")]
    Endpoint(#[from] reqwest::Error),

    /// The overview page URL could not be parsed as an absolute URL.
    #[error("invalid page URL: {0}")]
    BadUrl(#[from] url::ParseError),

    /// The browser's print-to-PDF conversion failed.
    #[error("rendering markup to PDF failed: {0}")]
    Render(chromiumoxide::error::CdpError),

    /// The PDF library rejected an input while concatenating documents.
    #[error("merging PDFs failed: {0}")]
    Merge(lopdf::Error),

    /// The PDF library rejected the merged document while overlaying
    /// page numbers.
    #[error("overlaying page numbers failed: {0}")]
    Pagination(lopdf::Error),

    /// A filesystem write of a rendered artifact failed.
    #[error("file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
