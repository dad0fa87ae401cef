// 🏷️ Decision Rules - Rules as Data
// Ordered keyword rules mapping a club's motion text to a funding decision
//
// When several contradictory motions were recorded for one club, the rule
// order decides: rejection > temporary tabling > approval > no record > error.
// When in doubt, assume rejection.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static APPROVED_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)approve\s(?:for\s)?\$?(\d[\d,]*)").expect("approved amount regex")
});

// ============================================================================
// DECISION LABELS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionLabel {
    Approved,
    ApprovedAmountUnlisted,
    DeniedOrTabledIndefinitely,
    Tabled,
    NoRecord,
    ErrorInconclusive,
}

impl DecisionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionLabel::Approved => "Approved",
            DecisionLabel::ApprovedAmountUnlisted => "Approved but dollar amount not listed",
            DecisionLabel::DeniedOrTabledIndefinitely => "Denied or Tabled Indefinitely",
            DecisionLabel::Tabled => "Tabled",
            DecisionLabel::NoRecord => "No record on input doc",
            DecisionLabel::ErrorInconclusive => "ERROR could not find conclusive motion",
        }
    }

    /// Labels that need a human to look at the minutes
    pub fn needs_review(&self) -> bool {
        matches!(
            self,
            DecisionLabel::ErrorInconclusive | DecisionLabel::ApprovedAmountUnlisted
        )
    }
}

impl fmt::Display for DecisionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ALLOCATION
// ============================================================================

/// Amount tied to a decision. `Allocated` only ever accompanies `Approved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Allocation {
    /// Dollar figure parsed from an approval motion
    Allocated(u64),
    /// Denied or tabled: nothing allocated
    Zero,
    /// Not recorded or not recognizable
    Unknown,
}

impl Allocation {
    pub fn amount(&self) -> Option<u64> {
        match self {
            Allocation::Allocated(n) => Some(*n),
            Allocation::Zero => Some(0),
            Allocation::Unknown => None,
        }
    }

    /// Cell value for output tables (unknown renders as an empty cell)
    pub fn to_cell(&self) -> Option<String> {
        self.amount().map(|n| n.to_string())
    }
}

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Fixed label with nothing allocated
    Fixed(DecisionLabel),
    /// Approval: look for a dollar figure after "approve"
    Approval,
}

#[derive(Debug, Clone)]
pub struct DecisionRule {
    /// Rule ID for tracking
    pub id: String,

    /// Pattern searched for in the joined motion text
    pub pattern: Regex,

    pub outcome: RuleOutcome,

    /// Priority (higher = applied first)
    pub priority: i32,
}

impl DecisionRule {
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    fn apply(&self, text: &str) -> (DecisionLabel, Allocation) {
        match self.outcome {
            RuleOutcome::Fixed(label) => (label, Allocation::Zero),
            RuleOutcome::Approval => match extract_approved_amount(text) {
                Some(amount) => (DecisionLabel::Approved, Allocation::Allocated(amount)),
                None => (DecisionLabel::ApprovedAmountUnlisted, Allocation::Unknown),
            },
        }
    }
}

// ============================================================================
// CLASSIFICATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: DecisionLabel,
    pub allocation: Allocation,
    pub rule_id: Option<String>,
}

// ============================================================================
// DECISION CLASSIFIER
// ============================================================================

pub struct DecisionClassifier {
    rules: Vec<DecisionRule>,
}

impl DecisionClassifier {
    /// Classifier with the finance committee's standard motion phrasing
    pub fn with_defaults() -> Self {
        let rule = |id: &str, pattern: &str, outcome: RuleOutcome, priority: i32| DecisionRule {
            id: id.to_string(),
            pattern: Regex::new(pattern).expect("built-in decision rule pattern"),
            outcome,
            priority,
        };

        Self::from_rules(vec![
            rule(
                "denied_or_tabled_indefinitely",
                r"(?i)tabled?\sindefin[ie]te?ly|deny",
                RuleOutcome::Fixed(DecisionLabel::DeniedOrTabledIndefinitely),
                30,
            ),
            rule(
                "tabled",
                r"(?i)tabled?\s(?:until|for)",
                RuleOutcome::Fixed(DecisionLabel::Tabled),
                20,
            ),
            rule("approved", r"(?i)approve", RuleOutcome::Approval, 10),
        ])
    }

    /// Create classifier from a list of rules
    pub fn from_rules(mut rules: Vec<DecisionRule>) -> Self {
        // Sort by priority (higher first); stable, so ties keep insertion order
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        DecisionClassifier { rules }
    }

    /// Classify every motion line recorded for one club
    pub fn classify<S: AsRef<str>>(&self, lines: &[S]) -> ClassificationResult {
        let text = lines
            .iter()
            .map(|l| l.as_ref())
            .collect::<Vec<_>>()
            .join(" ");

        if let Some(rule) = self.rules.iter().find(|r| r.matches(&text)) {
            let (label, allocation) = rule.apply(&text);
            return ClassificationResult {
                label,
                allocation,
                rule_id: Some(rule.id.clone()),
            };
        }

        // No rule fired: either nothing was recorded, or the phrasing is new
        let label = if text.trim().is_empty() {
            DecisionLabel::NoRecord
        } else {
            DecisionLabel::ErrorInconclusive
        };

        ClassificationResult {
            label,
            allocation: Allocation::Unknown,
            rule_id: None,
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for DecisionClassifier {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// "$1,500" after "approve [for]" → 1500
fn extract_approved_amount(text: &str) -> Option<u64> {
    let caps = APPROVED_AMOUNT.captures(text)?;
    let digits: String = caps.get(1)?.as_str().chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}

// ============================================================================
// TESTS
// ============================================================================
