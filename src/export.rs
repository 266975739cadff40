//! Plain-text rendering of a generated report.

use crate::llm::report::{Report, SourceRef};

/// Render a report as plain text: title, summary, sections, then a
/// numbered reference list filtered to the sources the report actually
/// cited (when it says which).
pub fn report_to_text(report: &Report) -> String {
    let mut out = format!("{}\n\n{}\n", report.title, report.summary);

    for section in &report.sections {
        out.push_str(&format!("\n{}\n{}\n", section.title, section.content));
    }

    let references = cited_sources(report);
    if !references.is_empty() {
        out.push_str("\nReferences:\n");
        for (i, source) in references.iter().enumerate() {
            out.push_str(&format!("{}. {} - {}\n", i + 1, source.name, source.url));
        }
    }

    out.trim().to_string()
}

/// `used_sources` holds 1-based indices; absent or empty means keep all.
fn cited_sources(report: &Report) -> Vec<&SourceRef> {
    match &report.used_sources {
        Some(used) if !used.is_empty() => report
            .sources
            .iter()
            .enumerate()
            .filter(|(i, _)| used.contains(&(i + 1)))
            .map(|(_, s)| s)
            .collect(),
        _ => report.sources.iter().collect(),
    }
}
