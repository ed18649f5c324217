//! # coursebook
//!
//! Archives a weekly online course as a single page-numbered PDF eBook.
//! Attaches to an already-running Chrome session, scrapes the course
//! overview page for weekly content links, renders each week's printable
//! page to PDF, builds a table of contents, merges everything, and overlays
//! sequential page numbers.
//!
//! ## Usage
//!
//! Start Chrome with remote debugging and log in to the course site, then:
//!
//! ```sh
//! coursebook -o 'https://learn.example.edu/course/view.php?name=MU123-123'
//! ```
//!
//! ## Pipeline
//!
//! A strictly sequential run with no retries; any stage failure aborts:
//! 1. **Discover**: load the overview page, expand all weeks, collect links
//! 2. **Collect**: per week, fetch the printable page, extract headings,
//!    render `week_<n>.pdf`
//! 3. **TOC**: render `table_of_contents.pdf` from the collected headings
//! 4. **Merge**: concatenate TOC + weeks into `coursework_ebook_with_toc.pdf`
//! 5. **Paginate**: overlay page numbers into `coursework_ebook_final.pdf`
//!
//! The attached browser is left open after the run; only the tab opened by
//! this process is closed. Partial intermediate files are not cleaned up on
//! failure.

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browser;
mod cli;
mod error;
mod extract;
mod models;
mod pdf;
mod toc;
mod utils;

use browser::Session;
use cli::Cli;
use models::WeekHeadings;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("coursebook starting up");

    let args = Cli::parse();
    debug!(?args.overview_url, ?args.output_dir, "Parsed CLI arguments");

    // Early check: fail before touching the browser if output is unwritable.
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }
    let out_dir = Path::new(&args.output_dir);

    let session = Session::attach(
        &args.debug_host,
        args.debug_port,
        Duration::from_secs(args.nav_timeout_secs),
    )
    .await?;

    // ---- Discover weekly links ----
    let (overview_html, overview_url) = session.fetch_overview(&args.overview_url).await?;
    let weekly_links = match extract::extract_weekly_links(&overview_html, &overview_url) {
        Ok(links) => links,
        Err(e) => {
            let title = session.page_title().await.ok().flatten();
            error!(
                %overview_url,
                title = title.as_deref().unwrap_or("<unknown>"),
                error = %e,
                "No weekly content links found; check the page structure"
            );
            return Err(e.into());
        }
    };
    info!(count = weekly_links.len(), "Found unique weekly links");

    // ---- Collect content, headings, and per-week PDFs ----
    let mut week_files = Vec::with_capacity(weekly_links.len());
    let mut all_headings: Vec<WeekHeadings> = Vec::with_capacity(weekly_links.len());
    for (i, link) in weekly_links.iter().enumerate() {
        let week = i + 1;
        let html = session.fetch_week(link).await?;
        let headings = extract::extract_headings(&html);
        if headings.is_empty() {
            warn!(week, %link, "Week page has no headings");
        }
        info!(week, headings = headings.len(), "Collected week content");
        all_headings.push(WeekHeadings { week, headings });

        let week_path = out_dir.join(format!("week_{week}.pdf"));
        session.render_pdf(&html, &week_path).await?;
        week_files.push(week_path);
    }

    // ---- Table of contents ----
    let toc_html = toc::build_toc(&all_headings);
    let toc_path = out_dir.join("table_of_contents.pdf");
    session.render_pdf(&toc_html, &toc_path).await?;

    // ---- Merge, TOC first ----
    let mut ordered = vec![toc_path];
    ordered.extend(week_files);
    let merged_path = out_dir.join("coursework_ebook_with_toc.pdf");
    pdf::merge_pdfs(&ordered, &merged_path)?;
    info!(inputs = ordered.len(), path = %merged_path.display(), "Merged weekly PDFs behind the table of contents");

    // ---- Page numbers ----
    let final_path = out_dir.join("coursework_ebook_final.pdf");
    pdf::add_page_numbers(&merged_path, &final_path)?;
    info!(path = %final_path.display(), "Created final eBook");

    // Close only the tab this run opened; the browser stays up for the
    // operator to inspect or reuse.
    session.detach().await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
