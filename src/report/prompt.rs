//! Text summarizer collaborator
//!
//! The summarizer itself lives outside this crate (a generative-text service);
//! it receives the aggregated lists plus a fixed two-message prompt and
//! returns prose. Absent categories are rendered as the placeholder strings
//! below so the prompt stays well-formed.

use super::summary::PermitSummary;
use crate::error::BoxError;
use serde::{Deserialize, Serialize};

pub const CITIES_NOT_PROVIDED: &str = "Cities information was not provided.";
pub const COUNTIES_NOT_PROVIDED: &str = "Counties information was not provided.";
pub const PADUS_NOT_PROVIDED: &str = "PADUS information was not provided.";
pub const RAIL_NOT_PROVIDED: &str = "Rail information was not provided.";

/// Rendered for a provided category with no intersections
pub const NO_INTERSECTIONS: &str = "No intersections found.";

const SYSTEM_MESSAGE: &str = "You are a permitting specialist for long-haul fiber optic installations, \
responsible for ensuring only verified and working websites are referenced for permitting and \
regulatory information.";

const INSTRUCTIONS: &str = "I am conducting a long-haul fiber optic installation across multiple states and \
jurisdictions. Please create a highly detailed and well-organized permitting report that is divided \
into clear sections for **Cities**, **Counties**, **PADUS (Protected Areas)**, and **Railway Crossings**. \
If any of the information is not provided, a string will be given that says that it was not provided. \
In this case, state that the data was not provided and you can come up with an answer yourself. For each section:

- **Cities**: List each city that the installation route intersects, detailing the specific permitting \
departments or agencies to contact, along with relevant URLs for each department's main or permitting \
page. Provide essential contact information, including emails or phone numbers where available.

- **Counties**: List each intersecting county along the route, noting any specific considerations such \
as local regulations, environmental restrictions, or zoning requirements. Include relevant county \
permitting agencies with URLs and contact details. Provide links to official directories or permitting \
portals when direct URLs are unavailable. Prioritize verified links to main pages or high-level \
directories of official government and regulatory websites. Avoid creating specific URLs that may not \
exist; if a specific permit page isn't known, provide the main website link.

- **Protected Areas (PADUS)**: Identify each protected area crossed, specifying the name and type (e.g., \
national forest, wildlife refuge, recreation area). Provide guidance on necessary permits or special \
permissions required for these lands, along with contacts and URLs for the respective federal, state, \
or local agencies that manage these areas.

- **Railway Crossings**: For each railway segment that the route intersects, detail the rail company \
(e.g., 'Owner: X') and provide essential contacts for obtaining crossing permits. Include any additional \
details like track rights, subdivision information, and any FRA-related identifiers, where available. \
If known, specify any unique procedural steps or fees related to the crossing permits.

Make sure each section is separated and clearly labeled. Provide details as bullet points or structured \
lists for easy reading, and prioritize clarity and accessibility of contact information and URLs. If \
information is unavailable, indicate 'information not found.'";

const CLOSING: &str = "Additionally, emphasize any considerations for environmental impact, protected \
species, or cultural sites that may require special permissions along the fiber optic route, especially \
within sensitive or restricted areas. Be sure to provide working links where you can.";

/// System and user messages for one summarizer call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryPrompt {
    pub system: String,
    pub user: String,
}

impl SummaryPrompt {
    pub fn new(summary: &PermitSummary) -> Self {
        let user = format!(
            "{}\n\n**Intersecting Locations**:\n\
             - **Cities**: {}\n\
             - **Counties**: {}\n\
             - **PADUS Areas**: {}\n\
             - **Rail Intersections**: {}\n\n{}",
            INSTRUCTIONS,
            render_category(summary.cities.as_deref(), CITIES_NOT_PROVIDED),
            render_category(summary.counties.as_deref(), COUNTIES_NOT_PROVIDED),
            render_category(summary.protected_areas.as_deref(), PADUS_NOT_PROVIDED),
            render_category(summary.rail.as_deref(), RAIL_NOT_PROVIDED),
            CLOSING,
        );

        Self {
            system: SYSTEM_MESSAGE.to_string(),
            user,
        }
    }
}

fn render_category(entries: Option<&[String]>, placeholder: &str) -> String {
    match entries {
        None => placeholder.to_string(),
        Some([]) => NO_INTERSECTIONS.to_string(),
        Some(entries) => entries.join("; "),
    }
}

/// Produces the free-text body of the report
pub trait TextSummarizer {
    fn summarize(&self, summary: &PermitSummary, prompt: &SummaryPrompt) -> Result<String, BoxError>;
}

impl<F> TextSummarizer for F
where
    F: Fn(&PermitSummary, &SummaryPrompt) -> Result<String, BoxError>,
{
    fn summarize(&self, summary: &PermitSummary, prompt: &SummaryPrompt) -> Result<String, BoxError> {
        self(summary, prompt)
    }
}
