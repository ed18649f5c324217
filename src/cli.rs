//! Command-line interface definitions for coursebook.
//!
//! The overview URL, debugging endpoint, and output directory are explicit
//! configuration rather than compile-time constants, so the same binary works
//! across course instances.

use clap::Parser;

/// Command-line arguments for the coursebook archiver.
///
/// # Examples
///
/// ```sh
/// # Archive a course through the local Chrome debugging endpoint
/// coursebook -o 'https://learn.example.edu/course/view.php?name=MU123-123'
///
/// # Write the PDFs somewhere else and allow slow pages more time
/// coursebook -o URL -d ./out --nav-timeout-secs 30
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// URL of the course overview page listing the weekly content
    #[arg(short, long)]
    pub overview_url: String,

    /// Host of the Chrome remote debugging endpoint
    #[arg(long, default_value = "localhost")]
    pub debug_host: String,

    /// Port of the Chrome remote debugging endpoint
    #[arg(long, env = "CHROME_DEBUG_PORT", default_value_t = 9222)]
    pub debug_port: u16,

    /// Directory the PDFs are written into
    #[arg(short = 'd', long, default_value = ".")]
    pub output_dir: String,

    /// Seconds to wait for a page to signal readiness before aborting
    #[arg(long, default_value_t = 10)]
    pub nav_timeout_secs: u64,
}
