// 📅 Date Tokens & Period Keys
// Human dates pulled out of agenda text, and MM_DD keys pulled out of file names.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static ORDINAL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})(?:st|nd|rd|th)\b").expect("ordinal suffix regex"));

static PERIOD_IN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})[_/-](\d{1,2})").expect("period key regex"));

// ============================================================================
// DATE TOKEN
// ============================================================================

/// A date exactly as it appeared in a document, e.g. "March 3rd, 2024".
/// Never synthesized: only ever built from matched text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateToken(String);

impl DateToken {
    pub fn new(raw: impl Into<String>) -> Self {
        DateToken(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse into a calendar date ("March 3rd, 2024", "Mar 3, 2024")
    pub fn to_date(&self) -> Option<NaiveDate> {
        let cleaned = ORDINAL_SUFFIX.replace_all(self.0.trim(), "$1");
        ["%B %d, %Y", "%b %d, %Y"]
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
    }

    /// MM/DD/YYYY rendering used in generated file names
    pub fn to_us_format(&self) -> Option<String> {
        self.to_date().map(|d| d.format("%m/%d/%Y").to_string())
    }
}

impl fmt::Display for DateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// PERIOD KEY
// ============================================================================

/// Zero-padded "MM_DD" join key for the weekly pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeriodKey(String);

impl PeriodKey {
    /// Extract the first `M_D`, `M/D` or `M-D` group of a file name that is a
    /// calendar day. Year ranges like "24-25" are skipped.
    ///
    /// Example: "FR 4_1 FY25.csv" → "04_01"
    pub fn from_file_name(name: &str) -> Option<PeriodKey> {
        PERIOD_IN_NAME.captures_iter(name).find_map(|caps| {
            let month: u32 = caps.get(1)?.as_str().parse().ok()?;
            let day: u32 = caps.get(2)?.as_str().parse().ok()?;
            // Leap year, so 2_29 is accepted
            NaiveDate::from_ymd_opt(2000, month, day)?;
            Some(PeriodKey(format!("{:02}_{:02}", month, day)))
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_token_parses_ordinals() {
        let token = DateToken::new("March 3rd, 2024");
        assert_eq!(token.to_date(), NaiveDate::from_ymd_opt(2024, 3, 3));
        assert_eq!(token.to_us_format().as_deref(), Some("03/03/2024"));
    }

    #[test]
    fn test_date_token_abbreviated_month() {
        let token = DateToken::new("Oct 21st, 2024");
        assert_eq!(token.to_date(), NaiveDate::from_ymd_opt(2024, 10, 21));
    }

    #[test]
    fn test_date_token_unparseable_keeps_raw_text() {
        let token = DateToken::new("Someday 99th, 2024");
        assert_eq!(token.to_date(), None);
        assert_eq!(token.as_str(), "Someday 99th, 2024");
    }

    #[test]
    fn test_period_key_zero_pads() {
        assert_eq!(PeriodKey::from_file_name("FR 4_1 FY25").unwrap().as_str(), "04_01");
        assert_eq!(PeriodKey::from_file_name("Ficomm 4-08").unwrap().as_str(), "04_08");
        assert_eq!(
            PeriodKey::from_file_name("Ficomm-Cont-03/03/2024-GF").unwrap().as_str(),
            "03_03"
        );
        assert_eq!(PeriodKey::from_file_name("roster.csv"), None);
    }

    #[test]
    fn test_period_key_skips_impossible_days() {
        assert_eq!(PeriodKey::from_file_name("FR 24-25 4_1").unwrap().as_str(), "04_01");
        assert_eq!(PeriodKey::from_file_name("FR 2024-2025 4_8").unwrap().as_str(), "04_08");
        assert_eq!(PeriodKey::from_file_name("FR 2_29").unwrap().as_str(), "02_29");
        assert_eq!(PeriodKey::from_file_name("FR 13_45"), None);
        assert_eq!(PeriodKey::from_file_name("FR 4_31"), None);
    }

    #[test]
    fn test_period_keys_sort_chronologically_within_year() {
        let mut keys = vec![
            PeriodKey::from_file_name("10_2").unwrap(),
            PeriodKey::from_file_name("4_8").unwrap(),
            PeriodKey::from_file_name("4_15").unwrap(),
        ];
        keys.sort();
        let rendered: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        assert_eq!(rendered, vec!["04_08", "04_15", "10_02"]);
    }
}
