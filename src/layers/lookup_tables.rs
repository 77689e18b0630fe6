//! State FIPS code lookup
//!
//! Two-digit state/territory codes used by county datasets (`STATEFP`), mapped
//! to full English names: 50 states, the District of Columbia and 5 territories.

/// A single state or territory entry
#[derive(Debug, Clone, Copy)]
pub struct StateCode {
    pub code: &'static str,
    pub name: &'static str,
}

// ============================================================================
// EMBEDDED STATE TABLE
// ============================================================================

static STATES: &[StateCode] = &[
    StateCode { code: "01", name: "Alabama" },
    StateCode { code: "02", name: "Alaska" },
    StateCode { code: "04", name: "Arizona" },
    StateCode { code: "05", name: "Arkansas" },
    StateCode { code: "06", name: "California" },
    StateCode { code: "08", name: "Colorado" },
    StateCode { code: "09", name: "Connecticut" },
    StateCode { code: "10", name: "Delaware" },
    StateCode { code: "11", name: "District of Columbia" },
    StateCode { code: "12", name: "Florida" },
    StateCode { code: "13", name: "Georgia" },
    StateCode { code: "15", name: "Hawaii" },
    StateCode { code: "16", name: "Idaho" },
    StateCode { code: "17", name: "Illinois" },
    StateCode { code: "18", name: "Indiana" },
    StateCode { code: "19", name: "Iowa" },
    StateCode { code: "20", name: "Kansas" },
    StateCode { code: "21", name: "Kentucky" },
    StateCode { code: "22", name: "Louisiana" },
    StateCode { code: "23", name: "Maine" },
    StateCode { code: "24", name: "Maryland" },
    StateCode { code: "25", name: "Massachusetts" },
    StateCode { code: "26", name: "Michigan" },
    StateCode { code: "27", name: "Minnesota" },
    StateCode { code: "28", name: "Mississippi" },
    StateCode { code: "29", name: "Missouri" },
    StateCode { code: "30", name: "Montana" },
    StateCode { code: "31", name: "Nebraska" },
    StateCode { code: "32", name: "Nevada" },
    StateCode { code: "33", name: "New Hampshire" },
    StateCode { code: "34", name: "New Jersey" },
    StateCode { code: "35", name: "New Mexico" },
    StateCode { code: "36", name: "New York" },
    StateCode { code: "37", name: "North Carolina" },
    StateCode { code: "38", name: "North Dakota" },
    StateCode { code: "39", name: "Ohio" },
    StateCode { code: "40", name: "Oklahoma" },
    StateCode { code: "41", name: "Oregon" },
    StateCode { code: "42", name: "Pennsylvania" },
    StateCode { code: "44", name: "Rhode Island" },
    StateCode { code: "45", name: "South Carolina" },
    StateCode { code: "46", name: "South Dakota" },
    StateCode { code: "47", name: "Tennessee" },
    StateCode { code: "48", name: "Texas" },
    StateCode { code: "49", name: "Utah" },
    StateCode { code: "50", name: "Vermont" },
    StateCode { code: "51", name: "Virginia" },
    StateCode { code: "53", name: "Washington" },
    StateCode { code: "54", name: "West Virginia" },
    StateCode { code: "55", name: "Wisconsin" },
    StateCode { code: "56", name: "Wyoming" },
    StateCode { code: "60", name: "American Samoa" },
    StateCode { code: "66", name: "Guam" },
    StateCode { code: "69", name: "Northern Mariana Islands" },
    StateCode { code: "72", name: "Puerto Rico" },
    StateCode { code: "74", name: "U.S. Minor Outlying Islands" },
    StateCode { code: "78", name: "Virgin Islands" },
];

// ============================================================================
// LOOKUP
// ============================================================================

pub fn state_codes() -> &'static [StateCode] {
    STATES
}

/// Full name for a two-digit state code
///
/// Codes are matched exactly after trimming; `"6"` does not match `"06"`.
pub fn state_name(code: &str) -> Option<&'static str> {
    let code = code.trim();
    STATES
        .iter()
        .find(|entry| entry.code == code)
        .map(|entry| entry.name)
}
