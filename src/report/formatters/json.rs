use crate::report::summary::PermitSummary;
use serde_json;

/// JSON formatter for permit summaries
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format summary as pretty-printed JSON
    pub fn format(summary: &PermitSummary) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(summary)
    }

    /// Format summary as compact JSON (no whitespace)
    pub fn format_compact(summary: &PermitSummary) -> Result<String, serde_json::Error> {
        serde_json::to_string(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> PermitSummary {
        PermitSummary {
            cities: Some(vec!["Fresno".to_string()]),
            counties: Some(vec![]),
            protected_areas: None,
            rail: Some(vec![
                "Tehachapi, CA, Owner: UP, Track Rights: BNSF, FRA ID: 301245".to_string(),
            ]),
        }
    }

    #[test]
    fn test_format_json() {
        let json = JsonFormatter::format(&summary()).unwrap();

        assert!(json.contains("\"cities\": [\n    \"Fresno\"\n  ]"));
        assert!(json.contains("\"counties\": []"));
        assert!(json.contains("\"protected_areas\": null"));
    }

    #[test]
    fn test_format_compact_roundtrips() {
        let json = JsonFormatter::format_compact(&summary()).unwrap();

        assert!(!json.contains("\n  "));
        let parsed: PermitSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary());
    }
}
