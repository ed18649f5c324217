//! Chrome session attachment, page fetching, and PDF rendering.
//!
//! The browser is an external, long-lived resource: this module attaches to
//! an already-running Chrome via its remote debugging endpoint and never
//! launches or closes the browser process. The one tab opened for the run is
//! closed again by [`Session::detach`]; everything else is left for the
//! operator to inspect.
//!
//! Readiness is condition-based: instead of fixed sleeps, waits poll for a
//! known CSS selector (or for the weekly-anchor count to grow after the
//! "All weeks" expander is clicked), bounded by the configured timeout.

use crate::error::EbookError;
use crate::extract::count_content_anchors;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{info, instrument, warn};

/// Moodle's expander control that reveals every week at once.
const EXPAND_ALL_SELECTOR: &str = "button[data-visiblelabel='All weeks']";

/// Element whose presence marks a week's content page as rendered.
const WEEK_READY_SELECTOR: &str = "#region-main";

/// Interval between readiness polls.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A scraping session on one tab of an attached Chrome instance.
///
/// Holding the [`Browser`] keeps the DevTools connection alive for the
/// lifetime of the session; dropping it disconnects without closing the
/// browser.
pub struct Session {
    browser: Browser,
    page: Page,
    nav_timeout: Duration,
}

impl Session {
    /// Attach to the Chrome instance listening on `host:port` and open one
    /// blank tab for this run.
    ///
    /// The WebSocket debugger URL is discovered through the endpoint's
    /// `/json/version` document.
    #[instrument(level = "info", skip_all, fields(host = %host, port))]
    pub async fn attach(host: &str, port: u16, nav_timeout: Duration) -> Result<Self, EbookError> {
        let version_url = format!("http://{host}:{port}/json/version");
        let version: serde_json::Value = reqwest::get(&version_url).await?.json().await?;
        let ws_url = version
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                EbookError::Attach(format!("no webSocketDebuggerUrl in {version_url} response"))
            })?
            .to_string();

        let (browser, mut handler) = Browser::connect(ws_url).await?;
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        info!(%version_url, "Attached to running Chrome session");
        Ok(Self {
            browser,
            page,
            nav_timeout,
        })
    }

    /// Load the overview page, try to expand all weeks, and return its
    /// rendered markup along with the page's final URL (used to resolve
    /// relative links).
    ///
    /// A missing or unclickable expander is the pipeline's only soft
    /// fallback: a warning is logged and whatever content is already visible
    /// is used.
    #[instrument(level = "info", skip_all, fields(url = %url))]
    pub async fn fetch_overview(&self, url: &str) -> Result<(String, String), EbookError> {
        self.page.goto(url).await?;
        self.wait_for_selector("body").await?;

        let before = count_content_anchors(&self.page.content().await?);
        match self.page.find_element(EXPAND_ALL_SELECTOR).await {
            Ok(button) => match button.click().await {
                Ok(_) => {
                    info!("Clicked the 'All weeks' expander");
                    let after = self.wait_for_anchor_growth(before).await?;
                    if after <= before {
                        warn!(
                            before,
                            after,
                            "Week list did not grow after expanding; continuing with visible content"
                        );
                    }
                }
                Err(e) => warn!(
                    error = %e,
                    "Could not click the 'All weeks' expander; continuing with visible content"
                ),
            },
            Err(_) => {
                warn!("No 'All weeks' expander found; continuing with visible content");
            }
        }

        let html = self.page.content().await?;
        let current_url = self.page.url().await?.unwrap_or_else(|| url.to_string());
        Ok((html, current_url))
    }

    /// Load one week's printable content page and return its markup once the
    /// main content region has rendered.
    #[instrument(level = "info", skip_all, fields(url = %url))]
    pub async fn fetch_week(&self, url: &str) -> Result<String, EbookError> {
        self.page.goto(url).await?;
        self.wait_for_selector(WEEK_READY_SELECTOR).await?;
        Ok(self.page.content().await?)
    }

    /// Render `html` to a single-file PDF at `path` via the browser's
    /// print-to-PDF conversion. Overwrites any existing file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn render_pdf(&self, html: &str, path: &Path) -> Result<(), EbookError> {
        self.page.set_content(html).await.map_err(EbookError::Render)?;
        let params = PrintToPdfParams {
            print_background: Some(true),
            ..Default::default()
        };
        let bytes = self.page.pdf(params).await.map_err(EbookError::Render)?;
        tokio::fs::write(path, bytes).await?;
        info!(path = %path.display(), "Rendered PDF");
        Ok(())
    }

    /// Title of the currently loaded page, for diagnostics.
    pub async fn page_title(&self) -> Result<Option<String>, EbookError> {
        Ok(self.page.get_title().await?)
    }

    /// Close the tab this run opened. The attached browser stays open for
    /// the operator.
    pub async fn detach(self) -> Result<(), EbookError> {
        self.page.close().await?;
        drop(self.browser);
        Ok(())
    }

    /// Poll until `selector` is present, bounded by the navigation timeout.
    async fn wait_for_selector(&self, selector: &str) -> Result<(), EbookError> {
        let deadline = Instant::now() + self.nav_timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(EbookError::NavigationTimeout {
                    selector: selector.to_string(),
                    timeout: self.nav_timeout,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Poll until the number of weekly anchors exceeds `before`, returning
    /// the final count. Expiry is not an error; the caller decides whether a
    /// static count is worth a warning.
    async fn wait_for_anchor_growth(&self, before: usize) -> Result<usize, EbookError> {
        let deadline = Instant::now() + self.nav_timeout;
        loop {
            let count = count_content_anchors(&self.page.content().await?);
            if count > before {
                return Ok(count);
            }
            if Instant::now() >= deadline {
                return Ok(count);
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}
