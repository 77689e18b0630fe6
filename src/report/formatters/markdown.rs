use crate::report::summary::PermitSummary;

/// Markdown formatter for permit summaries
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    /// Format summary and free-text body as a Markdown report
    ///
    /// Categories that were not provided are left out entirely; provided
    /// categories with no intersections keep their header with no bullets.
    pub fn format(summary: &PermitSummary, body: &str) -> String {
        let mut md = String::with_capacity(1024 + body.len());

        md.push_str("# Permit Summary:\n\n");
        md.push_str("### Intersecting Locations:\n\n");

        Self::format_category(&mut md, "Cities", summary.cities.as_deref());
        Self::format_category(&mut md, "Counties", summary.counties.as_deref());
        Self::format_category(
            &mut md,
            "Protected Areas (PADUS)",
            summary.protected_areas.as_deref(),
        );
        Self::format_category(&mut md, "Rail Intersections", summary.rail.as_deref());

        // Separator before the summarizer's text
        md.push_str("\n\n---\n\n");
        md.push_str(body);

        md
    }

    fn format_category(md: &mut String, title: &str, entries: Option<&[String]>) {
        let Some(entries) = entries else {
            return;
        };
        md.push_str(&format!("**{}:**\n", title));
        for entry in entries {
            md.push_str(&format!("- {}\n", entry));
        }
        md.push('\n');
    }
}
