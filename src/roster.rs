// 🏛️ Roster & Funding-Request Helpers
//
// - Roster: project to the identity columns used for matching
// - Funding requests: keep one request type, project to name + amount
// - Student-government offices: tag names the roster never lists

use crate::config::ColumnConfig;
use crate::error::Result;
use crate::schema::{SchemaValidator, TableKind};
use crate::table::Table;
use serde::{Deserialize, Serialize};

pub const COL_YEAR: &str = "Year";
pub const COL_DESIGNATION: &str = "ASUC Designation";

// ============================================================================
// ROSTER
// ============================================================================

/// Roster restricted to the required columns, without nameless rows
pub fn project_roster(roster: &Table, columns: &ColumnConfig) -> Result<Table> {
    let required: Vec<&str> = columns.roster_required.iter().map(String::as_str).collect();
    SchemaValidator::validate(roster, TableKind::Roster, &required)?;

    let projected = roster.select(&required, TableKind::Roster.name())?;
    let kept = projected.filter_rows(|t, i| {
        t.get(i, &columns.roster_name)
            .map(|name| !name.trim().is_empty())
            .unwrap_or(false)
    });

    let dropped = projected.len() - kept.len();
    if dropped > 0 {
        tracing::warn!(dropped, "roster rows without a name were dropped");
    }
    Ok(kept)
}

/// Projected roster stamped with its fiscal year
pub fn abridge_roster(roster: &Table, columns: &ColumnConfig, year_label: &str) -> Result<Table> {
    let mut table = project_roster(roster, columns)?;
    table.ensure_column(COL_YEAR);
    for row in 0..table.len() {
        table.set(row, COL_YEAR, Some(year_label.to_string()));
    }
    Ok(table)
}

// ============================================================================
// FUNDING REQUESTS
// ============================================================================

/// Keep requests of the configured type (trimmed, case-insensitive) and
/// project to (name, amount requested)
pub fn filter_funding_requests(sheet: &Table, columns: &ColumnConfig) -> Result<Table> {
    let required = columns.funding_required();
    SchemaValidator::validate(sheet, TableKind::FundingRequest, &required)?;

    let filtered = match &columns.funding_type_filter {
        Some(wanted) => sheet.filter_rows(|t, i| {
            t.get(i, &columns.funding_type)
                .map(|ty| ty.trim().eq_ignore_ascii_case(wanted.trim()))
                .unwrap_or(false)
        }),
        None => sheet.clone(),
    };

    filtered.select(&required[..2], TableKind::FundingRequest.name())
}

// ============================================================================
// STUDENT-GOVERNMENT DESIGNATIONS
// ============================================================================

/// Offices of the student government itself. They apply for funds but are
/// not registered organizations, so the roster never resolves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Designation {
    Senator,
    Executive,
    Commission,
    CharteredProgram,
    AppointedOffice,
}

const EXECUTIVE_OFFICES: &[&str] = &[
    "executive vice president",
    "office of the president",
    "academic affairs vice president",
    "external affairs vice president",
    "student advocate",
];

const COMMISSIONS: &[&str] = &[
    "mental health commission",
    "disabled students commission",
    "sustainability commission",
    "sexual violence commission",
];

const CHARTERED_PROGRAMS: &[&str] =
    &["grants and scholarships foundation", "innovative design", "superb"];

const APPOINTED_OFFICES: &[&str] = &[
    "chief finance officer",
    "chief communications officer",
    "chief legal officer",
    "chief personnel officer",
    "chief technology officer",
];

impl Designation {
    pub fn label(&self) -> &'static str {
        match self {
            Designation::Senator => "ASUC: Senator",
            Designation::Executive => "ASUC: Executive",
            Designation::Commission => "ASUC: Commission",
            Designation::CharteredProgram => "ASUC: Chartered Program",
            Designation::AppointedOffice => "ASUC: Appointed Office",
        }
    }

    /// Classify an organization name. Chartered programs do not always carry
    /// the "ASUC" prefix; every other office must.
    pub fn classify(name: &str) -> Option<Designation> {
        let lower = name.to_lowercase();
        let contains_any = |list: &[&str]| list.iter().any(|phrase| lower.contains(phrase));

        if contains_any(CHARTERED_PROGRAMS) {
            return Some(Designation::CharteredProgram);
        }
        if !lower.contains("asuc") {
            return None;
        }

        if lower.contains("senator") {
            Some(Designation::Senator)
        } else if contains_any(EXECUTIVE_OFFICES) {
            Some(Designation::Executive)
        } else if contains_any(COMMISSIONS) {
            Some(Designation::Commission)
        } else if contains_any(APPOINTED_OFFICES) {
            Some(Designation::AppointedOffice)
        } else {
            None
        }
    }
}

/// Add a designation column, taking the first present name among `name_columns`
pub fn tag_designations(table: &Table, name_columns: &[&str]) -> Table {
    let mut tagged = table.clone();
    tagged.ensure_column(COL_DESIGNATION);

    for row in 0..tagged.len() {
        let designation = name_columns
            .iter()
            .find_map(|col| tagged.get(row, col))
            .and_then(Designation::classify);
        tagged.set(row, COL_DESIGNATION, designation.map(|d| d.label().to_string()));
    }

    tagged
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn roster() -> Table {
        let mut table =
            Table::new(["club_name", "Org Type", "BlueHeart", "Org ID Status", "Email"]);
        table.push_row(vec![
            Some("Chess Club".to_string()),
            Some("Sponsored".to_string()),
            Some("No".to_string()),
            Some("Active".to_string()),
            Some("chess@example.org".to_string()),
        ]);
        table.push_row(vec![None, Some("Sponsored".to_string()), None, None, None]);
        table
    }

    #[test]
    fn test_project_roster_drops_extra_columns_and_nameless_rows() {
        let projected = project_roster(&roster(), &ColumnConfig::default()).unwrap();
        assert_eq!(projected.columns(), &["Org Type", "BlueHeart", "Org ID Status", "club_name"]);
        assert_eq!(projected.len(), 1);
    }

    #[test]
    fn test_project_roster_requires_columns() {
        let table = Table::new(["club_name"]);
        let err = project_roster(&table, &ColumnConfig::default()).unwrap_err();
        match err {
            Error::Schema { errors, .. } => assert_eq!(errors.len(), 3),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_abridge_roster_adds_year() {
        let table = abridge_roster(&roster(), &ColumnConfig::default(), "FY25").unwrap();
        assert_eq!(table.get(0, COL_YEAR), Some("FY25"));
    }

    #[test]
    fn test_filter_funding_requests_by_type() {
        let sheet = Table::new(["club_name", "Amount Requested", "Type", "Notes"])
            .with_row(["Chess Club", "200", " Contingency ", "x"])
            .with_row(["Debate", "50", "Sponsorship", "y"]);

        let filtered = filter_funding_requests(&sheet, &ColumnConfig::default()).unwrap();
        assert_eq!(filtered.columns(), &["club_name", "Amount Requested"]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get(0, "club_name"), Some("Chess Club"));
    }

    #[test]
    fn test_filter_funding_requests_requires_type_column() {
        let sheet = Table::new(["club_name", "Amount Requested"]);
        assert!(filter_funding_requests(&sheet, &ColumnConfig::default()).is_err());

        let columns = ColumnConfig {
            funding_type_filter: None,
            ..ColumnConfig::default()
        };
        assert!(filter_funding_requests(&sheet, &columns).is_ok());
    }

    #[test]
    fn test_designation_classification() {
        assert_eq!(Designation::classify("ASUC Office of Senator Lee"), Some(Designation::Senator));
        assert_eq!(
            Designation::classify("ASUC Office of the Executive Vice President"),
            Some(Designation::Executive)
        );
        assert_eq!(Designation::classify("SUPERB"), Some(Designation::CharteredProgram));
        assert_eq!(Designation::classify("Senator Fan Club"), None);
        assert_eq!(Designation::classify("Chess Club"), None);
    }

    #[test]
    fn test_tag_designations_uses_first_present_name() {
        let mut table = Table::new(["Organization Name", "club_name"]);
        table.push_row(vec![None, Some("ASUC Sustainability Commission".to_string())]);
        table.push_row(vec![Some("Chess Club".to_string()), None]);

        let tagged = tag_designations(&table, &["Organization Name", "club_name"]);
        assert_eq!(tagged.get(0, COL_DESIGNATION), Some("ASUC: Commission"));
        assert_eq!(tagged.get(1, COL_DESIGNATION), None);
    }
}
