//! Data models for extracted course structure.
//!
//! Everything here is derived, read-only data produced once per run:
//! - [`Heading`]: a section title scraped from one week's content page
//! - [`WeekHeadings`]: all headings of one week, tagged with its 1-based index
//!
//! Rendered PDFs are plain files on disk and carry no in-memory model beyond
//! their paths.

/// Depth of a section title within a content page.
///
/// Only the two levels the course pages actually use are modelled: `h1`
/// elements map to [`Top`](HeadingLevel::Top), `h2` to
/// [`Sub`](HeadingLevel::Sub).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    /// A top-level section title (`h1`).
    Top,
    /// A second-level section title (`h2`), indented in the table of contents.
    Sub,
}

/// A single section title in document order, whitespace-trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// The nesting depth of the title.
    pub level: HeadingLevel,
    /// The trimmed title text.
    pub text: String,
}

/// The ordered headings of one week's content page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekHeadings {
    /// 1-based week index in discovery order.
    pub week: usize,
    /// Headings in document order; empty when a week has no section titles.
    pub headings: Vec<Heading>,
}
