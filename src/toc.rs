//! Table of contents generation.
//!
//! Builds the HTML document that becomes `table_of_contents.pdf`: one
//! "Week N" block per week with that week's headings listed beneath it,
//! second-level headings indented with non-breaking spaces. The output is a
//! pure function of the input, byte-identical across runs.

use crate::models::{HeadingLevel, WeekHeadings};

/// Indent prefix for second-level headings.
const SUB_INDENT: &str = "&nbsp;&nbsp;&nbsp;&nbsp;";

/// Render the table of contents markup for all weeks, in week order.
pub fn build_toc(weeks: &[WeekHeadings]) -> String {
    let mut html = String::from("<h1>Table of Contents</h1>");
    for week in weeks {
        html.push_str(&format!("<h2>Week {}</h2>", week.week));
        for heading in &week.headings {
            let indent = match heading.level {
                HeadingLevel::Top => "",
                HeadingLevel::Sub => SUB_INDENT,
            };
            html.push_str(&format!("<p>{}{}</p>", indent, heading.text));
        }
    }
    html
}
