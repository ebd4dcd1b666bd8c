//! YAML rule import
//!
//! Import is multi-status: a malformed rule in the middle of a batch does
//! not abort the rest. Each entry is validated and compiled independently,
//! so one bad `condition` string never blocks its siblings from loading.

use crate::registry::RuleRegistry;
use crate::rule::{Rule, Severity};
use chrono::Utc;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ImportFile {
    rules: Vec<serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct ImportRule {
    id: Option<String>,
    name: String,
    description: Option<String>,
    #[serde(default)]
    severity: Option<Severity>,
    #[serde(default)]
    compliance_frameworks: Vec<String>,
    condition: String,
    /// Descriptive only; never evaluated.
    #[serde(default)]
    example_violation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImportError {
    pub index: usize,
    pub rule_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<ImportError>,
    pub imported: Vec<String>,
}

/// Imports a YAML document of rules into `registry` for `tenant_id`,
/// returning a multi-status report instead of failing the whole batch on
/// the first bad entry.
pub fn import_yaml(registry: &RuleRegistry, tenant_id: &str, yaml: &str) -> ImportReport {
    let parsed: ImportFile = match serde_yaml::from_str(yaml) {
        Ok(file) => file,
        Err(e) => {
            return ImportReport {
                total: 0,
                succeeded: 0,
                failed: 1,
                errors: vec![ImportError {
                    index: 0,
                    rule_id: None,
                    message: format!("invalid YAML: {e}"),
                }],
                imported: Vec::new(),
            };
        }
    };

    let mut report = ImportReport {
        total: parsed.rules.len(),
        ..Default::default()
    };

    for (index, raw) in parsed.rules.into_iter().enumerate() {
        let entry: ImportRule = match serde_yaml::from_value(raw) {
            Ok(entry) => entry,
            Err(e) => {
                report.failed += 1;
                report.errors.push(ImportError {
                    index,
                    rule_id: None,
                    message: describe_missing_field(&e),
                });
                continue;
            }
        };
        let rule_id = entry.id.clone().unwrap_or_else(|| {
            format!(
                "imported-{}",
                uuid::Uuid::new_v4().simple().to_string().get(0..8).unwrap_or("rule")
            )
        });
        let now = Utc::now();
        let mut metadata = std::collections::BTreeMap::new();
        if !entry.compliance_frameworks.is_empty() {
            metadata.insert(
                "compliance_frameworks".to_string(),
                entry.compliance_frameworks.join(","),
            );
        }
        if let Some(example) = entry.example_violation {
            metadata.insert("example_violation".to_string(), example);
        }

        let rule = Rule {
            id: rule_id.clone(),
            tenant_id: tenant_id.to_string(),
            name: entry.name,
            description: entry.description,
            severity: entry.severity.unwrap_or(Severity::Medium),
            expression: entry.condition,
            enabled: true,
            created_at: now,
            updated_at: now,
            metadata,
        };

        match registry.register(rule) {
            Ok(_) => {
                report.succeeded += 1;
                report.imported.push(rule_id);
            }
            Err(e) => {
                report.failed += 1;
                report.errors.push(ImportError {
                    index,
                    rule_id: Some(rule_id),
                    message: e.to_string(),
                });
            }
        }
    }

    report
}

/// Turns a `serde_yaml` per-entry deserialize failure into the
/// human-readable message the import report surfaces. `serde_yaml` already
/// names the offending field in its error text (e.g. "missing field
/// `condition`"); this just normalizes the phrasing callers can match on.
fn describe_missing_field(e: &serde_yaml::Error) -> String {
    let msg = e.to_string();
    if let Some(field) = msg
        .split("missing field `")
        .nth(1)
        .and_then(|rest| rest.split('`').next())
    {
        format!("Missing required field: {field}")
    } else {
        format!("invalid rule entry: {msg}")
    }
}
