//! Rule entity

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

/// A named, versionable rule body. `expression` is the raw DSL source;
/// compilation into an [`crate::dsl::Ast`] happens in
/// [`crate::registry::RuleRegistry`], not here, so a `Rule` can be stored and
/// transmitted even while its expression is being re-validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub severity: Severity,
    pub expression: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
}

impl Rule {
    /// Structural validation independent of DSL compilation: non-empty
    /// name/expression. A missing `id` is not an error here: the registry
    /// assigns a fresh one to a rule created without one, so `id` is only
    /// required to be non-empty once a rule is stored.
    pub fn validate(&self) -> Result<()> {
        if self.tenant_id.is_empty() {
            return Err(EngineError::Validation(
                "rule tenant_id must not be empty".into(),
            ));
        }
        if self.name.is_empty() {
            return Err(EngineError::Validation(
                "rule name must not be empty".into(),
            ));
        }
        if self.expression.trim().is_empty() {
            return Err(EngineError::Validation(
                "rule expression must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rule() -> Rule {
        let now = Utc::now();
        Rule {
            id: "rule-1".to_string(),
            tenant_id: "tenant-a".to_string(),
            name: "error-status".to_string(),
            description: None,
            severity: Severity::High,
            expression: r#"span.status == "ERROR""#.to_string(),
            enabled: true,
            created_at: now,
            updated_at: now,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn validate_accepts_well_formed_rule() {
        assert!(make_rule().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_name() {
        let mut rule = make_rule();
        rule.name = String::new();
        assert!(rule.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_expression() {
        let mut rule = make_rule();
        rule.expression = "   ".to_string();
        assert!(rule.validate().is_err());
    }

    #[test]
    fn severity_orders_low_to_critical() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }
}
