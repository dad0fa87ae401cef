// 📐 Shape Layer - Schema Validation
// Required-column preconditions, checked before any processing begins

use crate::error::{Error, Result};
use crate::table::Table;

// ============================================================================
// TABLE KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Master roster of registered organizations
    Roster,
    /// Funding-request sheet (raw, before filtering by request type)
    FundingRequest,
    /// Decisions table produced from agenda minutes
    Decisions,
}

impl TableKind {
    pub fn name(&self) -> &str {
        match self {
            TableKind::Roster => "Roster",
            TableKind::FundingRequest => "FundingRequest",
            TableKind::Decisions => "Decisions",
        }
    }
}

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl ValidationError {
    pub fn missing_column(field: &str, context: &str) -> Self {
        ValidationError {
            field: field.to_string(),
            message: "Required column is absent".to_string(),
            context: context.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// SCHEMA VALIDATOR
// ============================================================================

pub struct SchemaValidator;

impl SchemaValidator {
    /// Fail with every absent column at once, not just the first
    pub fn require_columns(table: &Table, columns: &[&str], context: &str) -> Result<()> {
        let errors: Vec<ValidationError> = columns
            .iter()
            .filter(|c| !table.has_column(c))
            .map(|c| ValidationError::missing_column(c, context))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Schema {
                context: context.to_string(),
                errors,
            })
        }
    }

    /// Validate a table against the columns its kind needs
    pub fn validate(table: &Table, kind: TableKind, required: &[&str]) -> Result<()> {
        Self::require_columns(table, required, kind.name())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_columns_present() {
        let table = Table::new(["club_name", "Org Type"]);
        assert!(SchemaValidator::require_columns(&table, &["club_name"], "roster").is_ok());
    }

    #[test]
    fn test_require_columns_reports_all_missing() {
        let table = Table::new(["club_name"]);
        let err = SchemaValidator::validate(
            &table,
            TableKind::Roster,
            &["club_name", "Org Type", "BlueHeart"],
        )
        .unwrap_err();

        match err {
            Error::Schema { context, errors } => {
                assert_eq!(context, "Roster");
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].field, "Org Type");
                assert_eq!(errors[1].field, "BlueHeart");
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::missing_column("Type", "FundingRequest");
        assert_eq!(err.to_string(), "[FundingRequest] Type: Required column is absent");
    }
}
